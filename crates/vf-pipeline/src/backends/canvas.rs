//! Still-image backend applying pixel steps in process.

use async_trait::async_trait;

use vf_av::CanvasOps;
use vf_core::{Error, MediaKind};
use vf_variants::{OutputSettings, TransformProgram};

use crate::artifact::Artifact;
use crate::backend::{backend_error, ExecutionBackend, ExecutionRequest};
use crate::context::ProgressSender;

const NAME: &str = "canvas";

/// Decodes the source, applies the program's pixel steps and re-encodes JPEG.
#[derive(Debug, Clone, Copy, Default)]
pub struct CanvasBackend;

impl CanvasBackend {
    pub fn new() -> Self {
        Self
    }
}

/// Read the pixel operations back out of an image program.
pub(crate) fn canvas_ops(program: &TransformProgram) -> vf_core::Result<CanvasOps> {
    let mut ops = CanvasOps::default();

    for step in program.pixel_steps() {
        match step.operation.as_str() {
            "filter" => {
                for (key, value) in step.args.iter() {
                    let v = parse_arg(key, value)?;
                    match key {
                        "brightness" => ops.brightness = v,
                        "contrast" => ops.contrast = v,
                        "saturate" => ops.saturation = v,
                        other => {
                            return Err(Error::Build(format!("unknown filter term '{other}'")))
                        }
                    }
                }
            }
            "hflip" => ops.flip_horizontal = true,
            "border" => {
                let width = step.args.get("width").unwrap_or("0");
                ops.border = width
                    .parse()
                    .map_err(|_| Error::Build(format!("invalid border width '{width}'")))?;
            }
            other => return Err(Error::Build(format!("unsupported pixel step '{other}'"))),
        }
    }

    match program.output {
        OutputSettings::Jpeg { quality } => ops.quality = quality,
        OutputSettings::Mp4 { .. } => {
            return Err(Error::Build("canvas backend cannot encode video".into()))
        }
    }

    Ok(ops)
}

fn parse_arg(key: &str, value: &str) -> vf_core::Result<f32> {
    value
        .parse()
        .map_err(|_| Error::Build(format!("invalid value '{value}' for {key}")))
}

#[async_trait]
impl ExecutionBackend for CanvasBackend {
    fn name(&self) -> &'static str {
        NAME
    }

    fn supports(&self, kind: MediaKind) -> bool {
        kind == MediaKind::Image
    }

    async fn execute(
        &self,
        req: ExecutionRequest<'_>,
        progress: &ProgressSender,
    ) -> vf_core::Result<Artifact> {
        let ops = canvas_ops(req.program)?;
        progress.send(0.0, "decoding");

        let data = tokio::fs::read(&req.source.path).await?;
        let jpeg = tokio::task::spawn_blocking(move || ops.render(&data))
            .await
            .map_err(|e| Error::Internal(format!("canvas task failed: {e}")))?
            .map_err(|e| backend_error(NAME, e))?;

        if jpeg.is_empty() {
            return Err(Error::backend(NAME, "encoder produced no data"));
        }

        tokio::fs::create_dir_all(req.output_dir).await?;
        let dest = req.output_dir.join(req.output_name());
        tokio::fs::write(&dest, &jpeg).await?;

        tracing::debug!(
            backend = NAME,
            variant = req.params.variant_index,
            bytes = jpeg.len(),
            "image variant written"
        );
        progress.send(100.0, "done");
        Ok(Artifact::new(dest, jpeg.len() as u64, req.params.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use vf_core::{ImageParameters, ImagePreset, ParameterSet, Parameters, Preset};
    use vf_variants::CommandBuilder;

    use crate::artifact::SourceFile;

    fn image_params(flip: bool) -> ParameterSet {
        ParameterSet {
            variant_index: 0,
            values: Parameters::Image(ImageParameters {
                brightness: 1.1,
                contrast: 0.9,
                saturation: 1.3,
                compression: 0.8,
                flip_horizontal: flip,
                blur_border: 3,
            }),
        }
    }

    #[test]
    fn ops_mirror_the_program() {
        let program = CommandBuilder
            .build(&image_params(true), MediaKind::Image)
            .unwrap();
        let ops = canvas_ops(&program).unwrap();
        assert!((ops.brightness - 1.1).abs() < 1e-6);
        assert!((ops.contrast - 0.9).abs() < 1e-6);
        assert!((ops.saturation - 1.3).abs() < 1e-6);
        assert!(ops.flip_horizontal);
        assert_eq!(ops.border, 3);
        assert_eq!(ops.quality, 80);
    }

    #[tokio::test]
    async fn writes_a_jpeg_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("photo.png");
        let mut png = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 12, Rgb([90, 140, 200])))
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .unwrap();
        std::fs::write(&input, &png).unwrap();

        let source = SourceFile::from_path(&input).unwrap();
        let params = image_params(false);
        let program = CommandBuilder.build(&params, MediaKind::Image).unwrap();
        let preset = Preset::Image(ImagePreset::default());
        let out = dir.path().join("out");
        let req = ExecutionRequest {
            source: &source,
            preset: &preset,
            params: &params,
            program: &program,
            output_dir: &out,
        };

        let artifact = CanvasBackend.execute(req, &ProgressSender::noop()).await.unwrap();
        assert_eq!(artifact.name, "photo_v1.jpg");
        assert_eq!(artifact.content_type, "image/jpeg");
        let bytes = std::fs::read(&artifact.location).unwrap();
        assert_eq!(bytes.len() as u64, artifact.size);
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[tokio::test]
    async fn undecodable_input_is_backend_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.jpg");
        std::fs::write(&input, b"not really a jpeg").unwrap();
        let source = SourceFile::from_path(&input).unwrap();
        let params = image_params(false);
        let program = CommandBuilder.build(&params, MediaKind::Image).unwrap();
        let preset = Preset::Image(ImagePreset::default());
        let req = ExecutionRequest {
            source: &source,
            preset: &preset,
            params: &params,
            program: &program,
            output_dir: dir.path(),
        };
        let err = CanvasBackend.execute(req, &ProgressSender::noop()).await.unwrap_err();
        assert!(matches!(err, Error::Backend { .. }));
        assert!(!dir.path().join("broken_v1.jpg").exists());
    }
}
