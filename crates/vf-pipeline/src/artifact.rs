//! Inputs and outputs of a backend call.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use vf_core::{content_type_for, Error, MediaKind, ParameterSet};

/// A validated source file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub path: PathBuf,
    pub file_name: String,
    pub kind: MediaKind,
    pub size: u64,
}

impl SourceFile {
    /// Check that `path` is a non-empty regular file of a known media kind.
    pub fn from_path(path: &Path) -> vf_core::Result<Self> {
        let meta = std::fs::metadata(path)
            .map_err(|_| Error::Validation(format!("input file not found: {}", path.display())))?;
        if !meta.is_file() {
            return Err(Error::Validation(format!(
                "input is not a regular file: {}",
                path.display()
            )));
        }
        if meta.len() == 0 {
            return Err(Error::Validation(format!(
                "input file is empty: {}",
                path.display()
            )));
        }
        let kind = MediaKind::from_path(path).ok_or_else(|| {
            Error::Validation(format!("unsupported media type: {}", path.display()))
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            kind,
            size: meta.len(),
        })
    }

    /// File name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("variant")
    }
}

/// One produced variant plus the parameters that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub name: String,
    /// Where the variant was written.
    pub location: PathBuf,
    pub size: u64,
    pub content_type: String,
    pub variant_index: usize,
    pub parameters: ParameterSet,
}

impl Artifact {
    pub fn new(location: PathBuf, size: u64, parameters: ParameterSet) -> Self {
        let name = location
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            content_type: content_type_for(&location).to_string(),
            name,
            location,
            size,
            variant_index: parameters.variant_index,
            parameters,
        }
    }
}
