//! Workspace management for one variant render.
//!
//! A [`Workspace`] provides a temporary directory the transcoder writes into.
//! Only a finished, non-empty output is moved to its destination; anything
//! left behind is removed with the directory when the workspace drops.

use std::path::{Path, PathBuf};
use tempfile::TempDir;

use vf_core::Error;

/// Scratch directory for a single render.
///
/// # Example
///
/// ```no_run
/// use vf_av::Workspace;
///
/// let workspace = Workspace::new("variant_0.mp4").unwrap();
/// // ... run ffmpeg with workspace.output() as its target ...
/// let size = workspace.finalize(std::path::Path::new("/out/variant_0.mp4")).unwrap();
/// ```
pub struct Workspace {
    temp_dir: TempDir,
    output_name: String,
}

impl Workspace {
    /// Create a workspace whose output file is named `output_name`.
    pub fn new(output_name: &str) -> vf_core::Result<Self> {
        let temp_dir = tempfile::Builder::new()
            .prefix("variantforge-")
            .tempdir()
            .map_err(|e| Error::tool("workspace", format!("failed to create temp dir: {e}")))?;

        Ok(Self {
            temp_dir,
            output_name: output_name.to_string(),
        })
    }

    /// Where the tool should write its output.
    pub fn output(&self) -> PathBuf {
        self.temp_dir.path().join(&self.output_name)
    }

    /// Path to the temporary directory.
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Move the output to `dest` and return its size in bytes.
    ///
    /// # Errors
    ///
    /// Fails if the output is missing or empty, or if the move fails. The
    /// destination is never created in those cases.
    pub fn finalize(self, dest: &Path) -> vf_core::Result<u64> {
        let output = self.output();

        let size = match std::fs::metadata(&output) {
            Ok(meta) => meta.len(),
            Err(_) => {
                return Err(Error::tool(
                    "workspace",
                    format!("output file does not exist: {}", output.display()),
                ))
            }
        };
        if size == 0 {
            return Err(Error::tool("workspace", "output file is empty"));
        }

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }

        // Rename when on the same filesystem, otherwise copy and let the
        // temp dir clean up the original.
        if std::fs::rename(&output, dest).is_err() {
            if let Err(e) = std::fs::copy(&output, dest) {
                let _ = std::fs::remove_file(dest);
                return Err(Error::tool(
                    "workspace",
                    format!("failed to copy output to destination: {e}"),
                ));
            }
        }

        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn output_lives_inside_temp_dir() {
        let ws = Workspace::new("variant_1.mp4").unwrap();
        assert!(ws.output().starts_with(ws.temp_dir()));
        assert_eq!(ws.output().file_name().unwrap(), "variant_1.mp4");
    }

    #[test]
    fn finalize_moves_output() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested").join("out.mp4");

        let ws = Workspace::new("out.mp4").unwrap();
        fs::write(ws.output(), b"processed").unwrap();

        let size = ws.finalize(&dest).unwrap();
        assert_eq!(size, 9);
        assert_eq!(fs::read_to_string(&dest).unwrap(), "processed");
    }

    #[test]
    fn finalize_fails_when_output_missing() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.mp4");
        let ws = Workspace::new("out.mp4").unwrap();
        assert!(ws.finalize(&dest).is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn finalize_rejects_empty_output() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out.mp4");
        let ws = Workspace::new("out.mp4").unwrap();
        fs::write(ws.output(), b"").unwrap();
        assert!(ws.finalize(&dest).is_err());
        assert!(!dest.exists());
    }

    #[test]
    fn temp_dir_removed_on_drop() {
        let ws = Workspace::new("out.mp4").unwrap();
        let dir = ws.temp_dir().to_path_buf();
        fs::write(ws.output(), b"partial").unwrap();
        drop(ws);
        assert!(!dir.exists());
    }
}
