//! Configuration for the conversion request controller.
//!
//! Every compiled-in constant of the workflow (the format catalog, the
//! progress tick, the terminal-state dwell, the service endpoint) lives in
//! [`ControllerConfig`] and is injected into the controller, so tests can
//! run against a small catalog and millisecond timers without touching any
//! global state.

use crate::catalog::FormatCatalog;
use crate::error::VidConvError;
use crate::estimate::{ProgressEstimator, SimulatedProgress};
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Endpoint of the reference conversion service.
pub const DEFAULT_SERVICE_URL: &str = "https://server-qm7m.onrender.com/convert";

/// Configuration for a [`crate::controller::Controller`].
///
/// # Example
/// ```rust
/// use vidconv::ControllerConfig;
/// use std::time::Duration;
///
/// let config = ControllerConfig::builder()
///     .reset_delay(Duration::from_secs(5))
///     .output_dir("/tmp/converted")
///     .build()
///     .unwrap();
/// assert_eq!(config.reset_delay, Duration::from_secs(5));
/// ```
#[derive(Clone)]
pub struct ControllerConfig {
    /// Supported extensions. Default: the ten-entry reference catalog.
    pub catalog: FormatCatalog,

    /// Period of the simulated progress ticker. Default: 200 ms.
    pub tick_interval: Duration,

    /// Upper bound (exclusive) of one simulated progress step, in percent.
    /// Default: 10.
    pub max_increment: f64,

    /// How long `Succeeded`/`Failed` stays observable before the controller
    /// returns to `Idle` on its own. Default: 3 s.
    pub reset_delay: Duration,

    /// Conversion service endpoint. Default: [`DEFAULT_SERVICE_URL`].
    pub service_url: String,

    /// Per-call timeout for the conversion service in seconds. Default: none.
    ///
    /// Transcoding large files can take minutes; a timeout is opt-in.
    pub request_timeout_secs: Option<u64>,

    /// Directory the converted file is saved into. Default: current directory.
    pub output_dir: PathBuf,

    /// Replaces the simulated estimator. Default: None.
    pub estimator: Option<Arc<dyn ProgressEstimator>>,

    /// Observer for lifecycle events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            catalog: FormatCatalog::default(),
            tick_interval: Duration::from_millis(200),
            max_increment: 10.0,
            reset_delay: Duration::from_secs(3),
            service_url: DEFAULT_SERVICE_URL.to_string(),
            request_timeout_secs: None,
            output_dir: PathBuf::from("."),
            estimator: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("catalog", &self.catalog)
            .field("tick_interval", &self.tick_interval)
            .field("max_increment", &self.max_increment)
            .field("reset_delay", &self.reset_delay)
            .field("service_url", &self.service_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("output_dir", &self.output_dir)
            .field(
                "estimator",
                &self.estimator.as_ref().map(|_| "<dyn ProgressEstimator>"),
            )
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ControllerConfig {
    /// Create a new builder for `ControllerConfig`.
    pub fn builder() -> ControllerConfigBuilder {
        ControllerConfigBuilder {
            config: Self::default(),
        }
    }

    /// The estimator the controller should use for a new submission.
    pub fn resolve_estimator(&self) -> Arc<dyn ProgressEstimator> {
        match self.estimator {
            Some(ref e) => Arc::clone(e),
            None => Arc::new(SimulatedProgress::new(self.tick_interval, self.max_increment)),
        }
    }
}

/// Builder for [`ControllerConfig`].
#[derive(Debug)]
pub struct ControllerConfigBuilder {
    config: ControllerConfig,
}

impl ControllerConfigBuilder {
    pub fn catalog(mut self, catalog: FormatCatalog) -> Self {
        self.config.catalog = catalog;
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.config.tick_interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn max_increment(mut self, pct: f64) -> Self {
        self.config.max_increment = pct.clamp(0.0, 100.0);
        self
    }

    pub fn reset_delay(mut self, delay: Duration) -> Self {
        self.config.reset_delay = delay;
        self
    }

    pub fn service_url(mut self, url: impl Into<String>) -> Self {
        self.config.service_url = url.into();
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn estimator(mut self, estimator: Arc<dyn ProgressEstimator>) -> Self {
        self.config.estimator = Some(estimator);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ControllerConfig, VidConvError> {
        let c = &self.config;
        if c.catalog.is_empty() {
            return Err(VidConvError::InvalidConfig(
                "Format catalog must contain at least one format".into(),
            ));
        }
        if !(c.service_url.starts_with("http://") || c.service_url.starts_with("https://")) {
            return Err(VidConvError::InvalidConfig(format!(
                "Service URL must be http(s), got '{}'",
                c.service_url
            )));
        }
        if c.request_timeout_secs == Some(0) {
            return Err(VidConvError::InvalidConfig(
                "Request timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}
