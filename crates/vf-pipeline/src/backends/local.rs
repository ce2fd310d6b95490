//! In-process ffmpeg transcoder.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use vf_av::{FfmpegProgress, ToolCommand, ToolRegistry, Workspace};
use vf_core::MediaKind;

use crate::artifact::Artifact;
use crate::backend::{backend_error, ExecutionBackend, ExecutionRequest};
use crate::context::ProgressSender;

const NAME: &str = "local";

/// The scheduler bounds each copy; this only guards against a runaway child
/// when the backend is driven directly.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(24 * 3600);

/// Runs video programs with the ffmpeg found by the [`ToolRegistry`].
///
/// ffmpeg writes into a temp [`Workspace`]; only a complete, non-empty file
/// is moved into the output directory.
#[derive(Debug, Clone)]
pub struct LocalTranscoder {
    tools: Arc<ToolRegistry>,
}

impl LocalTranscoder {
    pub fn new(tools: Arc<ToolRegistry>) -> Self {
        Self { tools }
    }

    /// Full ffmpeg command for one request, writing to `output`.
    pub fn command(
        &self,
        req: &ExecutionRequest<'_>,
        output: &std::path::Path,
    ) -> vf_core::Result<ToolCommand> {
        let ffmpeg = self.tools.require("ffmpeg")?;
        let mut cmd = ToolCommand::new(ffmpeg.to_path_buf());
        cmd.timeout(COMMAND_TIMEOUT);
        cmd.args(["-hide_banner", "-nostats", "-progress", "pipe:2"]);
        cmd.args(req.program.ffmpeg_args(&req.source.path, output));
        Ok(cmd)
    }
}

#[async_trait]
impl ExecutionBackend for LocalTranscoder {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supports(&self, kind: MediaKind) -> bool {
        kind == MediaKind::Video
    }

    async fn execute(
        &self,
        req: ExecutionRequest<'_>,
        progress: &ProgressSender,
    ) -> vf_core::Result<Artifact> {
        let name = req.output_name();
        let workspace = Workspace::new(&name).map_err(|e| backend_error(NAME, e))?;
        let cmd = self
            .command(&req, &workspace.output())
            .map_err(|e| backend_error(NAME, e))?;

        let time_scale = req
            .params
            .video()
            .map(|v| v.speed)
            .filter(|s| *s > 0.0)
            .map_or(1.0, |s| 1.0 / s);
        let mut tracker = FfmpegProgress::new(req.program.trim.map(|t| t.duration * time_scale));

        tracing::info!(
            backend = NAME,
            source = %req.source.path.display(),
            variant = req.params.variant_index,
            "transcoding"
        );
        progress.send(0.0, "encoding");

        cmd.execute_with_stderr_callback(|line| {
            if let Some(pct) = tracker.feed(line, time_scale) {
                progress.send(pct, "encoding");
            }
        })
        .await
        .map_err(|e| backend_error(NAME, e))?;

        let dest = req.output_dir.join(&name);
        let size = workspace
            .finalize(&dest)
            .map_err(|e| backend_error(NAME, e))?;

        progress.send(100.0, "done");
        Ok(Artifact::new(dest, size, req.params.clone()))
    }
}
