//! Transcoding relay: `POST /process-video` and `GET /download/{filename}`.
//!
//! The relay accepts one uploaded video plus the parameters a client
//! already sampled, rebuilds the transform program with the shared
//! [`CommandBuilder`], renders it with the context's relay backend and
//! serves the result back for download.

use std::path::{Path as FsPath, PathBuf};

use axum::body::Body;
use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio_util::io::ReaderStream;

use vf_core::{content_type_for, Error, MediaKind, ParameterSet, Preset, VideoPreset};
use vf_pipeline::{ExecutionRequest, ProgressSender, SourceFile};
use vf_variants::{CommandBuilder, Sampler};

use crate::context::AppContext;
use crate::error::AppError;

/// Successful `/process-video` response.
#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProcessVideoResponse {
    pub success: bool,
    /// Relative URL the processed file can be fetched from.
    pub video_url: String,
    pub filename: String,
    pub size: u64,
    pub applied_effects: Vec<String>,
}

/// Fields collected from the multipart body.
#[derive(Default)]
struct Upload {
    video: Option<(Vec<u8>, Option<String>)>,
    params: Option<ParameterSet>,
    settings: Option<VideoPreset>,
}

fn multipart_error(e: MultipartError) -> Error {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge(e.body_text())
    } else {
        Error::Validation(format!("invalid multipart body: {}", e.body_text()))
    }
}

async fn read_upload(mut multipart: Multipart) -> vf_core::Result<Upload> {
    let mut upload = Upload::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "video" => {
                if upload.video.is_some() {
                    return Err(Error::Validation(
                        "send exactly one field named 'video'".into(),
                    ));
                }
                let content_type = field.content_type().unwrap_or_default().to_string();
                if MediaKind::from_mime(&content_type) != Some(MediaKind::Video) {
                    return Err(Error::Validation(format!(
                        "only video uploads are accepted, got '{content_type}'"
                    )));
                }
                let file_name = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(multipart_error)?;
                upload.video = Some((data.to_vec(), file_name));
            }
            "params" => {
                let text = field.text().await.map_err(multipart_error)?;
                let params = serde_json::from_str(&text)
                    .map_err(|e| Error::Validation(format!("invalid params JSON: {e}")))?;
                upload.params = Some(params);
            }
            "settings" => {
                let text = field.text().await.map_err(multipart_error)?;
                let settings = serde_json::from_str(&text)
                    .map_err(|e| Error::Validation(format!("invalid settings JSON: {e}")))?;
                upload.settings = Some(settings);
            }
            other => {
                tracing::debug!(field = other, "ignoring unknown multipart field");
            }
        }
    }

    Ok(upload)
}

/// Pick the parameters to render: the client's own sample when present,
/// otherwise a fresh sample from the settings.
fn resolve_params(
    params: Option<ParameterSet>,
    settings: Option<VideoPreset>,
) -> vf_core::Result<ParameterSet> {
    match (params, settings) {
        (Some(params), _) => {
            if params.kind() != MediaKind::Video {
                return Err(Error::Validation("params must describe a video variant".into()));
            }
            Ok(params)
        }
        (None, Some(settings)) => {
            let mut preset = Preset::Video(settings);
            for warning in preset.normalize()? {
                tracing::warn!("{warning}");
            }
            Ok(Sampler::new().sample(&preset, 0))
        }
        (None, None) => Err(Error::Validation(
            "either 'params' or 'settings' is required".into(),
        )),
    }
}

/// Extension to store the upload under; unknown names fall back to mp4.
fn upload_extension(file_name: Option<&str>) -> String {
    file_name
        .map(FsPath::new)
        .filter(|p| MediaKind::from_path(p) == Some(MediaKind::Video))
        .and_then(|p| p.extension())
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_else(|| "mp4".to_string())
}

/// POST /process-video
#[utoipa::path(
    post,
    path = "/process-video",
    request_body(content = inline(Object), content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Video processed", body = ProcessVideoResponse),
        (status = 400, description = "Invalid input"),
        (status = 413, description = "Upload too large"),
        (status = 502, description = "Engine failure"),
        (status = 504, description = "Processing timed out")
    )
)]
pub async fn process_video(
    State(ctx): State<AppContext>,
    multipart: Multipart,
) -> Result<Json<ProcessVideoResponse>, AppError> {
    let upload = read_upload(multipart).await?;
    let (data, file_name) = upload
        .video
        .ok_or_else(|| Error::Validation("no video file provided".into()))?;
    if data.is_empty() {
        return Err(Error::Validation("uploaded video is empty".into()).into());
    }
    let settings = upload.settings.clone().unwrap_or_default();
    let params = resolve_params(upload.params, upload.settings)?;
    let program = CommandBuilder::new().build(&params, MediaKind::Video)?;
    for note in &program.diagnostics {
        tracing::warn!("{note}");
    }

    // The upload lives in a scratch directory removed on drop; its unique
    // stem keeps output names from colliding.
    let scratch = tempfile::Builder::new()
        .prefix("variantforge-upload-")
        .tempdir()?;
    let input = scratch.path().join(format!(
        "{}.{}",
        uuid::Uuid::new_v4().simple(),
        upload_extension(file_name.as_deref())
    ));
    tokio::fs::write(&input, &data).await?;
    drop(data);
    let source = SourceFile::from_path(&input)?;

    let relay_config = &ctx.config.relay;
    tokio::fs::create_dir_all(&relay_config.output_dir).await?;
    let preset = Preset::Video(settings);
    let req = ExecutionRequest {
        source: &source,
        preset: &preset,
        params: &params,
        program: &program,
        output_dir: &relay_config.output_dir,
    };

    tracing::info!(
        upload = file_name.as_deref().unwrap_or("unnamed"),
        bytes = source.size,
        backend = ctx.relay.name(),
        "processing relay upload"
    );
    let timeout = relay_config.timeout();
    let artifact = tokio::time::timeout(timeout, ctx.relay.execute(req, &ProgressSender::noop()))
        .await
        .map_err(|_| Error::Timeout(timeout))??;

    tracing::info!(file = %artifact.name, size = artifact.size, "relay upload processed");
    Ok(Json(ProcessVideoResponse {
        success: true,
        video_url: format!("/download/{}", artifact.name),
        filename: artifact.name,
        size: artifact.size,
        applied_effects: program.applied_effects(),
    }))
}

/// Reject names that could escape the output directory.
pub fn check_filename(name: &str) -> vf_core::Result<()> {
    if name.is_empty() || name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(Error::Validation(format!("invalid filename '{name}'")));
    }
    Ok(())
}

/// GET /download/{filename}
#[utoipa::path(
    get,
    path = "/download/{filename}",
    params(("filename" = String, Path, description = "Name returned by /process-video")),
    responses(
        (status = 200, description = "File contents"),
        (status = 400, description = "Unsafe file name"),
        (status = 404, description = "No such file")
    )
)]
pub async fn download(
    State(ctx): State<AppContext>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    check_filename(&filename)?;
    let path: PathBuf = ctx.config.relay.output_dir.join(&filename);

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|_| Error::not_found("file", &filename))?;
    if !metadata.is_file() {
        return Err(Error::not_found("file", &filename).into());
    }
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|_| Error::not_found("file", &filename))?;

    let stream = ReaderStream::with_capacity(file, 64 * 1024);
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type_for(&path).to_string()),
            (header::CONTENT_LENGTH, metadata.len().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vf_core::{Parameters, RangeParameter, VideoParameters};

    #[test]
    fn traversal_names_are_rejected() {
        for name in ["../../etc/passwd", "..", "a/b.mp4", "a\\b.mp4", "x..y.mp4", ""] {
            assert!(
                matches!(check_filename(name), Err(Error::Validation(_))),
                "{name} should be rejected"
            );
        }
        assert!(check_filename("clip_v1.mp4").is_ok());
    }

    #[test]
    fn explicit_params_win_over_settings() {
        let params = ParameterSet {
            variant_index: 2,
            values: Parameters::Video(VideoParameters {
                speed: 1.2,
                ..Default::default()
            }),
        };
        let settings = VideoPreset {
            speed: RangeParameter::new(0.5, 0.6),
            ..Default::default()
        };
        let resolved = resolve_params(Some(params.clone()), Some(settings)).unwrap();
        assert_eq!(resolved, params);
    }

    #[test]
    fn settings_alone_are_sampled() {
        let settings = VideoPreset {
            speed: RangeParameter::new(0.9, 1.1),
            ..Default::default()
        };
        let resolved = resolve_params(None, Some(settings)).unwrap();
        let speed = resolved.video().unwrap().speed;
        assert!((0.9..=1.1).contains(&speed));
    }

    #[test]
    fn image_params_or_nothing_is_rejected() {
        let image = ParameterSet {
            variant_index: 0,
            values: Parameters::Image(Default::default()),
        };
        assert!(matches!(resolve_params(Some(image), None), Err(Error::Validation(_))));
        assert!(matches!(resolve_params(None, None), Err(Error::Validation(_))));
    }

    #[test]
    fn upload_extension_prefers_known_video_names() {
        assert_eq!(upload_extension(Some("Holiday.MOV")), "mov");
        assert_eq!(upload_extension(Some("notes.txt")), "mp4");
        assert_eq!(upload_extension(None), "mp4");
    }
}
