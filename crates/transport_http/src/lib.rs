//! Blocking HTTP delivery transport backed by reqwest.

use std::time::Duration;

use log::debug;
use timeonsite_platform::{CancelToken, Transport, TransportError, TransportRequest};

/// Collectors historically expect an explicit charset on the body.
const CONTENT_TYPE: &str = "application/json;charset=UTF-8";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Posts one serialized record per request and returns the collector's
/// acknowledgment body verbatim.
///
/// Cancellation is cooperative: a token cancelled before the call starts
/// fails fast, one cancelled mid-request takes effect on the next call.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| TransportError::Other(format!("client setup failed: {err}")))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post(
        &self,
        request: &TransportRequest<'_>,
        cancel: &CancelToken,
    ) -> Result<String, TransportError> {
        if cancel.is_cancelled() {
            return Err(TransportError::Cancelled);
        }
        let mut builder = self
            .client
            .post(request.url)
            .header("Content-Type", CONTENT_TYPE)
            .body(request.body.to_string());
        for (name, value) in request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        debug!("posting record to {}", request.url);
        let response = builder
            .send()
            .map_err(|err| TransportError::Other(format!("request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        response
            .text()
            .map_err(|err| TransportError::Other(format!("unreadable acknowledgment: {err}")))
    }
}
