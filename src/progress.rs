//! Observer trait for controller events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ControllerConfigBuilder::progress_callback`] to receive
//! events as a request moves through its lifecycle. Rendering (the CLI's
//! progress bar, for one) lives behind this trait.
//!
//! For a pull-style view, see [`crate::stream::SnapshotStream`].
//!
//! # Example
//!
//! ```rust
//! use vidconv::{ConversionProgressCallback, ControllerConfig};
//! use std::sync::{Arc, Mutex};
//!
//! struct LastPercent(Mutex<f64>);
//!
//! impl ConversionProgressCallback for LastPercent {
//!     fn on_progress(&self, percent: f64) {
//!         *self.0.lock().unwrap() = percent;
//!     }
//! }
//!
//! let config = ControllerConfig::builder()
//!     .progress_callback(Arc::new(LastPercent(Mutex::new(0.0))))
//!     .build()
//!     .unwrap();
//! ```

use crate::request::Status;
use std::sync::Arc;

/// Called by the controller on every observable change.
///
/// Callbacks run while the controller's internal lock is NOT held, but they
/// may be invoked from a Tokio worker thread (ticker and timer tasks), so
/// implementations must be `Send + Sync`. All methods default to no-ops.
pub trait ConversionProgressCallback: Send + Sync {
    /// The request moved between lifecycle states.
    fn on_status_change(&self, from: Status, to: Status) {
        let _ = (from, to);
    }

    /// New progress estimate, percent in `[0, 100]`.
    fn on_progress(&self, percent: f64) {
        let _ = percent;
    }

    /// A local validation or precondition failure, already formatted for
    /// display.
    fn on_rejected(&self, message: &str) {
        let _ = message;
    }

    /// The converted file was handed to the delivery sink.
    ///
    /// # Arguments
    /// * `file_name`  — name the payload was saved under
    /// * `size_bytes` — payload size
    fn on_delivered(&self, file_name: &str, size_bytes: u64) {
        let _ = (file_name, size_bytes);
    }

    /// The request entered `Failed`.
    fn on_failed(&self, detail: &str) {
        let _ = detail;
    }

    /// The controller returned to `Idle`, explicitly or after the dwell.
    fn on_reset(&self) {}
}

/// A no-op implementation for callers that don't need events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ControllerConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
