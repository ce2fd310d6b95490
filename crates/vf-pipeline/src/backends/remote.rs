//! Remote relay backend.
//!
//! Uploads the source together with the sampled parameters to a relay's
//! `POST /process-video`; the relay rebuilds the program itself. The
//! processed file is then downloaded from the returned `videoUrl`.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use vf_core::{content_type_for, Error, MediaKind, Preset};

use crate::artifact::Artifact;
use crate::backend::{ExecutionBackend, ExecutionRequest};
use crate::context::ProgressSender;

const NAME: &str = "remote";

/// Success body of `POST /process-video`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayResponse {
    pub success: bool,
    pub video_url: String,
    pub filename: String,
    pub size: u64,
    #[serde(default)]
    pub applied_effects: Vec<String>,
}

/// Sends video copies to a remote relay over HTTP.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteBackend {
    /// `base_url` is the relay root, e.g. `http://transcoder:3001`.
    pub fn new(base_url: &str, timeout: Duration) -> vf_core::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Internal(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}/{}", self.base_url, url.trim_start_matches('/'))
        }
    }

    async fn upload(&self, req: &ExecutionRequest<'_>) -> vf_core::Result<RelayResponse> {
        let bytes = tokio::fs::read(&req.source.path).await?;
        let mime = content_type_for(&req.source.path);

        let params = serde_json::to_string(req.params)
            .map_err(|e| Error::Internal(format!("params serialize error: {e}")))?;
        let settings = match req.preset {
            Preset::Video(p) => serde_json::to_string(p),
            Preset::Image(p) => serde_json::to_string(p),
        }
        .map_err(|e| Error::Internal(format!("preset serialize error: {e}")))?;

        let video = Part::bytes(bytes)
            .file_name(req.source.file_name.clone())
            .mime_str(mime)
            .map_err(|e| Error::backend(NAME, format!("invalid mime type {mime}: {e}")))?;
        let form = Form::new()
            .part("video", video)
            .text("params", params)
            .text("settings", settings);

        let resp = self
            .client
            .post(format!("{}/process-video", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::backend(
                NAME,
                format!("relay returned {status}: {}", body.trim()),
            ));
        }

        let body: RelayResponse = resp
            .json()
            .await
            .map_err(|e| Error::backend(NAME, format!("invalid relay response: {e}")))?;
        if !body.success {
            return Err(Error::backend(NAME, "relay reported failure"));
        }
        Ok(body)
    }

    /// Stream `url` into a temp file inside `dir`. The file is deleted on
    /// drop unless the caller persists it.
    async fn download(&self, url: &str, dir: &std::path::Path) -> vf_core::Result<NamedTempFile> {
        let mut resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::backend(NAME, format!("download returned {status}")));
        }

        let mut tmp = tempfile::Builder::new()
            .prefix(".download-")
            .tempfile_in(dir)?;
        while let Some(chunk) = resp.chunk().await.map_err(|e| request_error(&e))? {
            tmp.write_all(&chunk)?;
        }
        tmp.flush()?;
        Ok(tmp)
    }
}

fn request_error(e: &reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::backend(NAME, format!("request timed out: {e}"))
    } else {
        Error::backend(NAME, format!("request failed: {e}"))
    }
}

#[async_trait]
impl ExecutionBackend for RemoteBackend {
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
        tracing::info!(
            backend = NAME,
            relay = %self.base_url,
            variant = req.params.variant_index,
            "uploading to relay"
        );
        progress.send(0.0, "uploading");

        let body = self.upload(&req).await?;
        tracing::debug!(
            filename = %body.filename,
            effects = ?body.applied_effects,
            "relay processed variant"
        );
        progress.send(50.0, "downloading");

        tokio::fs::create_dir_all(req.output_dir).await?;
        let tmp = self.download(&self.resolve(&body.video_url), req.output_dir).await?;

        let size = tmp.as_file().metadata()?.len();
        if size == 0 {
            return Err(Error::backend(NAME, "relay returned an empty file"));
        }

        let dest = req.output_dir.join(req.output_name());
        tmp.persist(&dest).map_err(|e| Error::from(e.error))?;

        progress.send(100.0, "done");
        Ok(Artifact::new(dest, size, req.params.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_urls_resolve_against_base() {
        let backend = RemoteBackend::new("http://relay:3001/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            backend.resolve("/download/a.mp4"),
            "http://relay:3001/download/a.mp4"
        );
        assert_eq!(
            backend.resolve("https://cdn.example.com/a.mp4"),
            "https://cdn.example.com/a.mp4"
        );
    }

    #[test]
    fn relay_response_is_camel_case() {
        let body: RelayResponse = serde_json::from_str(
            r#"{"success":true,"videoUrl":"/download/x.mp4","filename":"x.mp4","size":3,"appliedEffects":["speed"]}"#,
        )
        .unwrap();
        assert_eq!(body.video_url, "/download/x.mp4");
        assert_eq!(body.applied_effects, vec!["speed"]);
    }
}
