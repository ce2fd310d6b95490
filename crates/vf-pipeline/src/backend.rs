//! The [`ExecutionBackend`] trait and backend selection.
//!
//! A backend turns one [`TransformProgram`] and one source file into exactly
//! one [`Artifact`], or fails with a typed error. Backends never touch queue
//! state; the scheduler owns that.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use vf_av::ToolRegistry;
use vf_core::config::{Config, VideoBackendKind};
use vf_core::{Error, MediaKind, ParameterSet, Preset};
use vf_variants::TransformProgram;

use crate::artifact::{Artifact, SourceFile};
use crate::backends::{CanvasBackend, LocalTranscoder, RemoteBackend};
use crate::context::ProgressSender;

/// Everything a backend needs for one copy.
#[derive(Debug, Clone, Copy)]
pub struct ExecutionRequest<'a> {
    pub source: &'a SourceFile,
    /// The preset the parameters were sampled from (sent to remote relays).
    pub preset: &'a Preset,
    pub params: &'a ParameterSet,
    pub program: &'a TransformProgram,
    /// Directory the artifact must be written to.
    pub output_dir: &'a Path,
}

impl ExecutionRequest<'_> {
    /// `<stem>_v<index+1>.<ext>` inside the output directory.
    pub fn output_name(&self) -> String {
        format!(
            "{}_v{}.{}",
            self.source.stem(),
            self.params.variant_index + 1,
            self.program.output.extension()
        )
    }
}

/// One way of executing transform programs.
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    /// Short identifier used in logs and errors (e.g. "local").
    fn name(&self) -> &'static str;

    /// Whether this backend can render the given media kind.
    fn supports(&self, kind: MediaKind) -> bool;

    /// Produce exactly one artifact.
    async fn execute(
        &self,
        req: ExecutionRequest<'_>,
        progress: &ProgressSender,
    ) -> vf_core::Result<Artifact>;
}

/// Re-tag lower-level failures as backend failures. Timeouts and errors that
/// already name a backend pass through.
pub(crate) fn backend_error(backend: &str, err: Error) -> Error {
    match err {
        Error::Timeout(_) | Error::Backend { .. } => err,
        Error::Tool { tool, message } => Error::backend(backend, format!("{tool}: {message}")),
        other => Error::backend(backend, other.to_string()),
    }
}

/// The backend used for each media kind.
#[derive(Clone)]
pub struct BackendSet {
    video: Arc<dyn ExecutionBackend>,
    image: Arc<dyn ExecutionBackend>,
}

impl BackendSet {
    /// Pair a video and an image backend, checking each supports its kind.
    pub fn new(
        video: Arc<dyn ExecutionBackend>,
        image: Arc<dyn ExecutionBackend>,
    ) -> vf_core::Result<Self> {
        if !video.supports(MediaKind::Video) {
            return Err(Error::Validation(format!(
                "backend '{}' cannot render video",
                video.name()
            )));
        }
        if !image.supports(MediaKind::Image) {
            return Err(Error::Validation(format!(
                "backend '{}' cannot render images",
                image.name()
            )));
        }
        Ok(Self { video, image })
    }

    /// Build the configured set: local or remote video, canvas images.
    pub fn from_config(config: &Config, tools: Arc<ToolRegistry>) -> vf_core::Result<Self> {
        let video: Arc<dyn ExecutionBackend> = match config.backend.video {
            VideoBackendKind::Local => Arc::new(LocalTranscoder::new(tools)),
            VideoBackendKind::Remote => {
                let url = config
                    .backend
                    .remote_url
                    .as_deref()
                    .filter(|u| !u.trim().is_empty())
                    .ok_or_else(|| {
                        Error::Validation("backend.remote_url is required for the remote backend".into())
                    })?;
                Arc::new(RemoteBackend::new(url, config.queue.copy_timeout())?)
            }
        };
        Self::new(video, Arc::new(CanvasBackend::new()))
    }

    pub fn for_kind(&self, kind: MediaKind) -> &Arc<dyn ExecutionBackend> {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Image => &self.image,
        }
    }
}

impl std::fmt::Debug for BackendSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSet")
            .field("video", &self.video.name())
            .field("image", &self.image.name())
            .finish()
    }
}
