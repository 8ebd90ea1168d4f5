//! # vidconv
//!
//! Client-side orchestration for converting a video between container
//! formats through a remote conversion service.
//!
//! The crate does not transcode anything itself. It validates the input
//! against a format catalog, submits the file and target format to the
//! service, shows an estimated progress while the (progress-less) remote
//! call runs, saves the result, and returns to idle.
//!
//! ## Request Lifecycle
//!
//! ```text
//! Idle
//!  │
//!  ├─ 1. Intake    file name → extension → catalog check
//!  ├─ 2. Target    pick an output format from the catalog
//!  ├─ 3. Submit    preconditions, then one multipart POST
//!  ├─ 4. Estimate  time-driven progress, capped below 90% until the reply
//!  ├─ 5. Deliver   save as <base name>.<target>
//!  └─ 6. Reset     back to Idle 3 s after success or failure
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vidconv::{convert_file, ControllerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ControllerConfig::builder()
//!         .output_dir("converted")
//!         .build()?;
//!     let out = convert_file("movie.mkv", "mp4", &config).await?;
//!     println!("saved {}", out.file_name);
//!     Ok(())
//! }
//! ```
//!
//! Interactive front-ends drive a [`Controller`] directly and render its
//! [`RequestSnapshot`]s or callback events.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `vidconv` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod catalog;
pub mod config;
pub mod controller;
pub mod convert;
pub mod error;
pub mod estimate;
pub mod pipeline;
pub mod progress;
pub mod request;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use catalog::{FormatCatalog, FormatOption, DEFAULT_FORMATS};
pub use config::{ControllerConfig, ControllerConfigBuilder, DEFAULT_SERVICE_URL};
pub use controller::Controller;
pub use convert::{convert_file, convert_sync};
pub use error::{ConversionError, SubmissionError, ValidationError, VidConvError};
pub use estimate::{ProgressEstimator, SimulatedProgress};
pub use pipeline::deliver::{delivered_file_name, ConvertedFile, DeliverySink, FileSystemSink};
pub use pipeline::input::{DropZone, InputEvent};
pub use pipeline::service::{ConversionService, HttpConversionService};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use request::{format_file_size, AcceptedFile, RequestSnapshot, SourceFile, Status};
pub use stream::SnapshotStream;
