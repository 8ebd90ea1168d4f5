//! Error types for the vidconv library.
//!
//! Errors are split by where they arise in a request's lifetime:
//!
//! * [`ValidationError`] — intake or target selection rejected a format.
//!   Purely local; the controller state is untouched.
//!
//! * [`SubmissionError`] — `submit()` preconditions failed. No network call
//!   was made and the request stays in the state it was in.
//!
//! * [`ConversionError`] — the remote service, the transport, or the
//!   delivery hand-off failed. The request moves to `Failed`, except for
//!   [`ConversionError::Superseded`], which mutates nothing.
//!
//! [`VidConvError`] wraps all three for callers that only want one type,
//! and adds the configuration and file-reading failures of the one-shot API.

use crate::request::Status;
use std::path::PathBuf;
use thiserror::Error;

/// A file or format was rejected before any request was created or changed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The extension is not in the format catalog.
    #[error("Unsupported file format: .{}. Please select a supported video file.", extension.to_uppercase())]
    UnsupportedFormat { extension: String },

    /// The target format can only change before submission.
    #[error("Output format cannot be changed while the request is {status}")]
    TargetLocked { status: Status },
}

/// `submit()` was called without a submittable request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmissionError {
    #[error("Please select a file and output format.")]
    MissingFile,

    #[error("Please select a file and output format.")]
    MissingTarget,

    #[error("Source and target formats cannot be the same ({format}).")]
    IdenticalFormats { format: String },

    /// A conversion is already outstanding for the active request.
    #[error("A conversion is already in progress")]
    AlreadyConverting,
}

/// The conversion itself failed, or its result no longer applies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    /// Non-success response or transport fault from the conversion service.
    #[error("Conversion failed: {message}")]
    ServiceFailure {
        /// HTTP status, when the service answered at all.
        status: Option<u16>,
        message: String,
    },

    /// The service did not answer within the configured timeout.
    #[error("Conversion failed: no response after {secs}s")]
    Timeout { secs: u64 },

    /// The converted payload could not be handed to the delivery sink.
    #[error("Failed to save '{file_name}': {reason}")]
    DeliveryFailed { file_name: String, reason: String },

    /// A newer intake or an explicit reset replaced this request while it
    /// was converting; the late result was discarded.
    #[error("Request was superseded before the conversion finished")]
    Superseded,
}

/// All errors returned by the vidconv library.
#[derive(Debug, Error)]
pub enum VidConvError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error(transparent)]
    Conversion(#[from] ConversionError),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Video file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Input file exists but could not be read.
    #[error("Failed to read '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
