//! Conversion service client: ship the source bytes and target format to the
//! remote transcoder and bring back the converted payload.
//!
//! The service is a single long-running POST with no progress channel. The
//! trait seam lets tests (and alternative transports) stand in for the HTTP
//! implementation; the controller only ever sees [`ConversionService`].
//!
//! ## Wire format
//!
//! `multipart/form-data` with two fields:
//!
//! | Field       | Content |
//! |-------------|---------|
//! | `file`      | raw file bytes, with the original file name |
//! | `to_format` | target extension, e.g. `mp4` |
//!
//! A 2xx response body is the converted file. Anything else is a failure.

use crate::error::{ConversionError, VidConvError};
use crate::request::SourceFile;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::multipart::{Form, Part};
use tracing::{debug, info, warn};

/// Performs one conversion round trip.
pub trait ConversionService: Send + Sync {
    /// Convert `file` to `target_format` and return the converted bytes.
    fn convert(
        &self,
        file: SourceFile,
        target_format: String,
    ) -> BoxFuture<'_, Result<Bytes, ConversionError>>;
}

/// [`ConversionService`] over HTTP via `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpConversionService {
    client: reqwest::Client,
    url: String,
}

impl HttpConversionService {
    pub fn new(url: impl Into<String>) -> Result<Self, VidConvError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| VidConvError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, url))
    }

    /// Use a preconfigured client (proxies, custom TLS roots, etc.).
    pub fn with_client(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, file: SourceFile, target_format: String) -> Result<Bytes, ConversionError> {
        info!(
            "Uploading {} ({} bytes) for conversion to {}",
            file.name(),
            file.size_bytes(),
            target_format
        );

        let form = build_form(&file, &target_format);
        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                warn!("Conversion request failed: {}", e);
                ConversionError::ServiceFailure {
                    status: e.status().map(|s| s.as_u16()),
                    message: e.to_string(),
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            warn!("Conversion service answered {}", status);
            return Err(ConversionError::ServiceFailure {
                status: Some(status.as_u16()),
                message: format!("HTTP {status}"),
            });
        }

        let payload = response
            .bytes()
            .await
            .map_err(|e| ConversionError::ServiceFailure {
                status: Some(status.as_u16()),
                message: format!("Failed to read response body: {e}"),
            })?;

        debug!("Received {} converted bytes", payload.len());
        Ok(payload)
    }
}

impl ConversionService for HttpConversionService {
    fn convert(
        &self,
        file: SourceFile,
        target_format: String,
    ) -> BoxFuture<'_, Result<Bytes, ConversionError>> {
        self.post(file, target_format).boxed()
    }
}

/// Build the multipart body. The file part streams from the shared buffer
/// with a known length so the request carries a `Content-Length`.
fn build_form(file: &SourceFile, target_format: &str) -> Form {
    let part = Part::stream_with_length(file.content().clone(), file.size_bytes())
        .file_name(file.name().to_string());
    Form::new()
        .part("file", part)
        .text("to_format", target_format.to_string())
}
