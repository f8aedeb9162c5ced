//! External HTTP API reachability.
//!
//! A 5xx answer is treated as a connectivity failure so it counts toward a
//! wrapping circuit breaker. Any other unexpected status means the service is
//! up but misbehaving and reports Degraded.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::time::{Duration, Instant};

use crate::probe::{CheckResult, Probe, ProbeError, ProbeResult};

#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    expected_status: StatusCode,
    slow_threshold: Option<Duration>,
}

impl HttpProbe {
    pub fn new(client: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            expected_status: StatusCode::OK,
            slow_threshold: None,
        }
    }

    /// Build with a dedicated client bounded by `request_timeout`
    pub fn with_timeout(url: impl Into<String>, request_timeout: Duration) -> Result<Self, ProbeError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout)
            .build()
            .map_err(|e| ProbeError::validation(format!("invalid HTTP client configuration: {e}")))?;
        Ok(Self::new(client, url))
    }

    pub fn expect_status(mut self, status: StatusCode) -> Self {
        self.expected_status = status;
        self
    }

    pub fn with_slow_threshold(mut self, slow_threshold: Duration) -> Self {
        self.slow_threshold = Some(slow_threshold);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

fn classify_reqwest_error(error: &reqwest::Error) -> ProbeError {
    if error.is_timeout() {
        ProbeError::timeout(format!("request timed out: {error}"))
    } else if error.is_builder() {
        ProbeError::validation(format!("invalid request: {error}"))
    } else {
        ProbeError::connection(format!("request failed: {error}"))
    }
}

/// Map a response status onto a result
fn classify_status(
    status: StatusCode,
    expected: StatusCode,
    elapsed: Duration,
    slow_threshold: Option<Duration>,
) -> ProbeResult {
    if status.is_server_error() {
        return Err(ProbeError::connection(format!("HTTP {}", status.as_u16())));
    }
    if status != expected {
        return Ok(CheckResult::degraded(format!(
            "unexpected HTTP {} (expected {})",
            status.as_u16(),
            expected.as_u16()
        )));
    }
    match slow_threshold {
        Some(limit) if elapsed > limit => Ok(CheckResult::degraded(format!(
            "responded slowly ({} ms)",
            elapsed.as_millis()
        ))),
        _ => Ok(CheckResult::healthy(format!("HTTP {}", status.as_u16()))),
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check(&self) -> ProbeResult {
        let start = Instant::now();
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;
        let elapsed = start.elapsed();

        classify_status(
            response.status(),
            self.expected_status,
            elapsed,
            self.slow_threshold,
        )
        .map(|result| {
            result
                .with_detail("url", self.url.clone())
                .with_detail("status_code", response.status().as_u16())
                .with_detail("response_time_ms", elapsed.as_millis() as u64)
        })
    }
}
