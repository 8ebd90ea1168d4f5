//! Request data model: the source file handle, the request itself, and the
//! read-only snapshot handed to observers.

use crate::error::VidConvError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::debug;

/// Lifecycle state of the controller's active request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// No request.
    #[default]
    Idle,
    /// A valid file is loaded; waiting for a target and a submit.
    FileAccepted,
    /// The conversion service call is outstanding.
    Converting,
    Succeeded,
    Failed,
}

impl Status {
    /// `Succeeded` or `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Succeeded | Status::Failed)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Status::Idle => "idle",
            Status::FileAccepted => "file accepted",
            Status::Converting => "converting",
            Status::Succeeded => "succeeded",
            Status::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Opaque handle to a candidate input file.
///
/// The content is held as [`Bytes`] so handing it to the conversion service
/// never copies the video.
#[derive(Clone)]
pub struct SourceFile {
    name: String,
    content: Bytes,
}

impl fmt::Debug for SourceFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFile")
            .field("name", &self.name)
            .field("size_bytes", &self.content.len())
            .finish()
    }
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Read a local file into memory.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, VidConvError> {
        let path = path.as_ref();
        let content = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                VidConvError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                VidConvError::ReadFailed {
                    path: path.to_path_buf(),
                    source: e,
                }
            }
        })?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!("Read {} ({} bytes)", path.display(), content.len());
        Ok(Self::new(name, content))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.content.len() as u64
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// Lower-cased text after the last `.` of the name.
    ///
    /// A name without a dot yields the whole name.
    pub fn extension(&self) -> String {
        self.name
            .rsplit('.')
            .next()
            .unwrap_or_default()
            .to_lowercase()
    }

    /// The name up to (not including) the first `.`.
    pub fn base_name(&self) -> &str {
        self.name.split('.').next().unwrap_or_default()
    }
}

/// The unit of work owned by the controller.
#[derive(Debug, Clone)]
pub struct ConversionRequest {
    pub source_file: SourceFile,
    /// Derived from the file extension at intake; never changes afterwards.
    pub source_format: String,
    /// Percent in `[0, 100]`, non-decreasing for the life of the request.
    pub progress: f64,
    pub status: Status,
    /// Set only while `status == Failed`.
    pub error_detail: Option<String>,
    pub generation: u64,
}

impl ConversionRequest {
    pub(crate) fn accepted(source_file: SourceFile, source_format: String, generation: u64) -> Self {
        Self {
            source_file,
            source_format,
            progress: 0.0,
            status: Status::FileAccepted,
            error_detail: None,
            generation,
        }
    }
}

/// Returned by a successful intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedFile {
    pub name: String,
    pub size_bytes: u64,
    pub source_format: String,
    pub generation: u64,
}

/// Read-only view of the controller for the presentation layer.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RequestSnapshot {
    pub status: Status,
    pub progress: f64,
    pub file_name: Option<String>,
    pub size_bytes: Option<u64>,
    /// `size_bytes` formatted for display, e.g. `"1.5 MB"`.
    pub size_display: Option<String>,
    pub source_format: Option<String>,
    pub target_format: Option<String>,
    pub error_detail: Option<String>,
    /// A file and a distinct target are set and nothing is converting.
    pub can_submit: bool,
    pub drag_over: bool,
    pub generation: u64,
}

/// Format a byte count with binary units, up to two decimals.
///
/// `0` → `"0 Bytes"`, `1536` → `"1.5 KB"`.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];
    if bytes == 0 {
        return "0 Bytes".to_string();
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let rounded = (value * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
