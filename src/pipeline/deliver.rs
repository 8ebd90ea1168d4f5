//! Result delivery: save the converted payload under a derived file name.
//!
//! [`FileSystemSink`] never exposes a half-written file: the payload goes to
//! a temp file inside the output directory and is then persisted (renamed)
//! to the final name. The temp handle is released right after, on success
//! or failure, so nothing lingers if the rename fails.

use crate::error::ConversionError;
use crate::request::SourceFile;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Characters that cannot appear in a single path component.
static RE_UNSAFE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[/\\:*?"<>|\x00-\x1f]"#).unwrap());

/// Used when the original name has nothing before its first `.`.
const FALLBACK_BASE_NAME: &str = "video";

/// A delivered conversion result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConvertedFile {
    pub file_name: String,
    pub size_bytes: u64,
    /// Where the sink put the file, when it lives on disk.
    pub location: Option<PathBuf>,
}

/// Receives converted payloads.
pub trait DeliverySink: Send + Sync {
    fn deliver(
        &self,
        payload: Bytes,
        file_name: String,
    ) -> BoxFuture<'_, Result<ConvertedFile, ConversionError>>;
}

/// Name of the converted file: the source base name (text before the first
/// `.`) plus the target extension. `movie.mkv` → `movie.mp4`.
pub fn delivered_file_name(source: &SourceFile, target_format: &str) -> String {
    let base = RE_UNSAFE_NAME.replace_all(source.base_name(), "_");
    let base = if base.trim().is_empty() {
        FALLBACK_BASE_NAME
    } else {
        base.as_ref()
    };
    format!("{base}.{target_format}")
}

/// Writes payloads into a directory.
#[derive(Debug, Clone)]
pub struct FileSystemSink {
    dir: PathBuf,
}

impl FileSystemSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DeliverySink for FileSystemSink {
    fn deliver(
        &self,
        payload: Bytes,
        file_name: String,
    ) -> BoxFuture<'_, Result<ConvertedFile, ConversionError>> {
        let dir = self.dir.clone();
        async move {
            let name = file_name.clone();
            let result = tokio::task::spawn_blocking(move || write_atomic(&dir, &name, &payload))
                .await
                .map_err(|e| ConversionError::DeliveryFailed {
                    file_name: file_name.clone(),
                    reason: format!("Write task panicked: {e}"),
                })?;
            result.map_err(|e| ConversionError::DeliveryFailed {
                file_name: file_name.clone(),
                reason: e.to_string(),
            })
        }
        .boxed()
    }
}

/// Blocking write: temp file in `dir`, then persist to `dir/file_name`.
fn write_atomic(dir: &Path, file_name: &str, payload: &[u8]) -> std::io::Result<ConvertedFile> {
    std::fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    debug!("Staging {} bytes in {}", payload.len(), tmp.path().display());
    tmp.write_all(payload)?;
    tmp.flush()?;

    let target = dir.join(file_name);
    // On failure the PersistError hands the temp file back; dropping it
    // removes it from disk.
    tmp.persist(&target).map_err(|e| e.error)?;

    info!("Saved {}", target.display());
    Ok(ConvertedFile {
        file_name: file_name.to_string(),
        size_bytes: payload.len() as u64,
        location: Some(target),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(name: &str) -> SourceFile {
        SourceFile::new(name, Vec::new())
    }

    #[test]
    fn name_swaps_extension() {
        assert_eq!(delivered_file_name(&src("movie.mkv"), "mp4"), "movie.mp4");
    }

    #[test]
    fn name_uses_text_before_first_dot() {
        assert_eq!(
            delivered_file_name(&src("my.holiday.clip.mov"), "webm"),
            "my.webm"
        );
    }

    #[test]
    fn name_sanitises_separators() {
        assert_eq!(
            delivered_file_name(&src("clips/2024/intro.mkv"), "mp4"),
            "clips_2024_intro.mp4"
        );
        assert_eq!(delivered_file_name(&src("a\\b.avi"), "ogv"), "a_b.ogv");
    }

    #[test]
    fn empty_base_falls_back() {
        assert_eq!(delivered_file_name(&src(".mkv"), "mp4"), "video.mp4");
    }

    #[tokio::test]
    async fn filesystem_sink_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FileSystemSink::new(dir.path().join("out"));

        let out = sink
            .deliver(Bytes::from_static(b"converted"), "movie.mp4".into())
            .await
            .unwrap();

        let path = out.location.clone().unwrap();
        assert_eq!(out.file_name, "movie.mp4");
        assert_eq!(out.size_bytes, 9);
        assert_eq!(std::fs::read(&path).unwrap(), b"converted");

        // Only the final file remains; the staging file is gone.
        let entries: Vec<_> = std::fs::read_dir(dir.path().join("out"))
            .unwrap()
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn filesystem_sink_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp4"), b"old").unwrap();
        let sink = FileSystemSink::new(dir.path());

        sink.deliver(Bytes::from_static(b"new"), "clip.mp4".into())
            .await
            .unwrap();
        assert_eq!(std::fs::read(dir.path().join("clip.mp4")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn filesystem_sink_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the output directory should be.
        let blocker = dir.path().join("blocked");
        std::fs::write(&blocker, b"x").unwrap();
        let sink = FileSystemSink::new(&blocker);

        let err = sink
            .deliver(Bytes::from_static(b"data"), "a.mp4".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ConversionError::DeliveryFailed { .. }));
    }
}
