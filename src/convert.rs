//! One-shot conversion entry points.
//!
//! These wrap the [`Controller`] lifecycle for callers that have a file on
//! disk and just want the converted file next to it (or in
//! `config.output_dir`). Interactive front-ends should drive a
//! [`Controller`] directly instead.

use crate::config::ControllerConfig;
use crate::controller::Controller;
use crate::error::VidConvError;
use crate::pipeline::deliver::ConvertedFile;
use crate::request::SourceFile;
use std::path::Path;
use std::time::Instant;
use tracing::info;

/// Convert a local video file to `target_format` through the configured
/// HTTP service.
///
/// # Errors
/// - [`VidConvError::FileNotFound`] / [`VidConvError::ReadFailed`] when the
///   input cannot be read
/// - [`VidConvError::Validation`] for an unsupported source or target format
/// - [`VidConvError::Submission`] when source and target are the same
/// - [`VidConvError::Conversion`] when the service or delivery failed
pub async fn convert_file(
    input: impl AsRef<Path>,
    target_format: &str,
    config: &ControllerConfig,
) -> Result<ConvertedFile, VidConvError> {
    let start = Instant::now();
    let input = input.as_ref();
    info!("Starting conversion: {} → {}", input.display(), target_format);

    let controller = Controller::http(config.clone())?;
    let output = run(&controller, SourceFile::from_path(input).await?, target_format).await?;

    info!(
        "Conversion complete: {} in {}ms",
        output.file_name,
        start.elapsed().as_millis()
    );
    Ok(output)
}

/// Drive `controller` through intake, target selection, and submission.
pub async fn run(
    controller: &Controller,
    file: SourceFile,
    target_format: &str,
) -> Result<ConvertedFile, VidConvError> {
    controller.intake(file)?;
    controller.select_target(target_format)?;
    controller.submit().await
}

/// Synchronous wrapper around [`convert_file`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input: impl AsRef<Path>,
    target_format: &str,
    config: &ControllerConfig,
) -> Result<ConvertedFile, VidConvError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| VidConvError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_file(input, target_format, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SubmissionError, ValidationError};

    #[tokio::test]
    async fn missing_input_is_reported_before_any_request() {
        let config = ControllerConfig::default();
        let err = convert_file("/no/such/video.mkv", "mp4", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, VidConvError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn unsupported_source_rejected_locally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("song.xyz");
        std::fs::write(&path, b"not a video").unwrap();

        let err = convert_file(&path, "mp4", &ControllerConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VidConvError::Validation(ValidationError::UnsupportedFormat { .. })
        ));
    }

    #[tokio::test]
    async fn same_format_rejected_locally() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mkv");
        std::fs::write(&path, b"frames").unwrap();

        let err = convert_file(&path, "MKV", &ControllerConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VidConvError::Submission(SubmissionError::IdenticalFormats { .. })
        ));
    }
}
