// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! HTTP probing
//!
//! [`HealthProber`] issues single or bounded-retry probes against a service
//! endpoint. The endpoint is always a parameter so the same classification
//! applies to the plain service and to the containerized one.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::PreflightResult;

/// Host and port a probed unit listens on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Local endpoint on `port`
    pub fn local(port: u16) -> Self {
        Self::new("127.0.0.1", port)
    }

    /// Full URL for `path` on this endpoint
    pub fn url(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        format!("http://{}:{}/{}", self.host, self.port, path)
    }
}

/// Outcome of one probe request
#[derive(Debug, Clone)]
pub struct ProbeResult {
    /// Probed URL
    pub url: String,
    /// Response status, `None` when no response was received
    pub status: Option<u16>,
    /// Raw response body
    pub body: String,
    /// Transport error, if any
    pub error: Option<String>,
    /// When the probe completed
    pub at: DateTime<Utc>,
}

impl ProbeResult {
    fn responded(url: &str, status: u16, body: String) -> Self {
        Self {
            url: url.to_string(),
            status: Some(status),
            body,
            error: None,
            at: Utc::now(),
        }
    }

    fn unreachable(url: &str, error: String) -> Self {
        Self {
            url: url.to_string(),
            status: None,
            body: String::new(),
            error: Some(error),
            at: Utc::now(),
        }
    }

    /// Whether the endpoint answered with a success status
    pub fn is_healthy(&self) -> bool {
        matches!(self.status, Some(status) if (200..300).contains(&status))
    }

    /// Whether the endpoint answered at all, whatever the status
    pub fn is_reachable(&self) -> bool {
        self.status.is_some()
    }

    /// Short human-readable classification
    pub fn describe(&self) -> String {
        match (self.status, &self.error) {
            (Some(status), _) => format!("HTTP {}", status),
            (None, Some(error)) => format!("unreachable ({})", error),
            (None, None) => "unreachable".to_string(),
        }
    }
}

/// Result of a bounded-retry health probe
#[derive(Debug, Clone)]
pub enum HealthVerdict {
    /// A probe within the attempt budget succeeded
    Healthy { attempts: u32, result: ProbeResult },
    /// Every attempt failed
    Unhealthy { attempts: u32, last: ProbeResult },
}

impl HealthVerdict {
    pub fn is_healthy(&self) -> bool {
        matches!(self, Self::Healthy { .. })
    }

    /// Number of probes issued
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Healthy { attempts, .. } | Self::Unhealthy { attempts, .. } => *attempts,
        }
    }
}

/// Prediction request issued after the health check passes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionCheck {
    /// Path of the prediction endpoint
    #[serde(default = "default_predict_path")]
    pub path: String,

    /// JSON body sent with the request
    #[serde(default = "default_payload")]
    pub payload: Value,

    /// Keyword that must appear in the raw response body
    #[serde(default = "default_keyword")]
    pub keyword: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_predict_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for PredictionCheck {
    fn default() -> Self {
        Self {
            path: default_predict_path(),
            payload: default_payload(),
            keyword: default_keyword(),
            timeout_ms: default_predict_timeout_ms(),
        }
    }
}

fn default_predict_path() -> String {
    "/predict".to_string()
}

fn default_payload() -> Value {
    serde_json::json!({
        "features": [15.0, 20.0, 100.0, 500.0, 0.1, 0.09, 0.03, 0.02, 0.18, 0.06]
    })
}

fn default_keyword() -> String {
    "prediction".to_string()
}

fn default_predict_timeout_ms() -> u64 {
    10_000
}

impl PredictionCheck {
    /// Check a prediction response, returning the reason it was rejected
    pub fn evaluate(&self, result: &ProbeResult) -> Result<(), String> {
        if !result.is_healthy() {
            return Err(result.describe());
        }
        if !result.body.contains(&self.keyword) {
            return Err(format!("response is missing '{}'", self.keyword));
        }
        Ok(())
    }
}

/// Everything probed once a unit is ready
#[derive(Debug, Clone)]
pub struct ProbePlan {
    pub health_path: String,
    pub attempts: u32,
    pub interval: Duration,
    pub prediction: Option<PredictionCheck>,
}

/// Issues HTTP probes and classifies responses
#[derive(Debug, Clone)]
pub struct HealthProber {
    client: reqwest::Client,
}

impl HealthProber {
    /// Create a prober whose requests time out after `request_timeout`
    pub fn new(request_timeout: Duration) -> PreflightResult<Self> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self { client })
    }

    /// Issue one GET request against `url`
    pub async fn probe(&self, url: &str) -> ProbeResult {
        let result = match self.client.get(url).send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                ProbeResult::responded(url, status, body)
            }
            Err(e) => ProbeResult::unreachable(url, e.to_string()),
        };
        debug!(url, outcome = %result.describe(), "probe");
        result
    }

    /// Issue one POST request with a JSON body against `url`
    pub async fn probe_json(&self, url: &str, payload: &Value, timeout: Duration) -> ProbeResult {
        let request = self.client.post(url).json(payload).timeout(timeout);
        let result = match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                ProbeResult::responded(url, status, body)
            }
            Err(e) => ProbeResult::unreachable(url, e.to_string()),
        };
        debug!(url, outcome = %result.describe(), "json probe");
        result
    }

    /// Probe `url` up to `max_attempts` times, `interval` apart
    ///
    /// Returns on the first healthy response. A budget of zero still issues
    /// one probe.
    pub async fn probe_until_healthy(
        &self,
        url: &str,
        max_attempts: u32,
        interval: Duration,
    ) -> HealthVerdict {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let result = self.probe(url).await;

            if result.is_healthy() {
                return HealthVerdict::Healthy {
                    attempts: attempt,
                    result,
                };
            }

            if attempt >= max_attempts {
                warn!(url, attempts = attempt, outcome = %result.describe(), "health probe exhausted");
                return HealthVerdict::Unhealthy {
                    attempts: attempt,
                    last: result,
                };
            }

            tokio::time::sleep(interval).await;
        }
    }

    /// Run `check` against `url`
    pub async fn check_prediction(&self, url: &str, check: &PredictionCheck) -> Result<ProbeResult, String> {
        let result = self
            .probe_json(url, &check.payload, Duration::from_millis(check.timeout_ms))
            .await;
        check.evaluate(&result).map(|()| result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn prober() -> HealthProber {
        HealthProber::new(Duration::from_secs(2)).unwrap()
    }

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[test]
    fn test_endpoint_url() {
        let endpoint = Endpoint::local(5001);
        assert_eq!(endpoint.url("/health"), "http://127.0.0.1:5001/health");
        assert_eq!(endpoint.url("predict"), "http://127.0.0.1:5001/predict");
    }

    #[tokio::test]
    async fn test_probe_success_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"ok"}"#))
            .mount(&server)
            .await;

        let result = prober().probe(&format!("{}/health", server.uri())).await;
        assert!(result.is_healthy());
        assert_eq!(result.status, Some(200));
        assert!(result.body.contains("ok"));
    }

    #[tokio::test]
    async fn test_probe_error_status_is_unhealthy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = prober().probe(&format!("{}/health", server.uri())).await;
        assert!(!result.is_healthy());
        assert!(result.is_reachable());
        assert_eq!(result.describe(), "HTTP 503");
    }

    #[tokio::test]
    async fn test_probe_network_failure_is_unhealthy() {
        let url = Endpoint::local(closed_port()).url("/health");
        let result = prober().probe(&url).await;
        assert!(!result.is_healthy());
        assert!(!result.is_reachable());
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn test_healthy_on_last_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .with_priority(2)
            .mount(&server)
            .await;

        let verdict = prober()
            .probe_until_healthy(&format!("{}/health", server.uri()), 3, Duration::from_millis(10))
            .await;

        assert!(verdict.is_healthy());
        assert_eq!(verdict.attempts(), 3);
    }

    #[tokio::test]
    async fn test_unhealthy_throughout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(500))
            .expect(4)
            .mount(&server)
            .await;

        let verdict = prober()
            .probe_until_healthy(&format!("{}/health", server.uri()), 4, Duration::from_millis(10))
            .await;

        match verdict {
            HealthVerdict::Unhealthy { attempts, last } => {
                assert_eq!(attempts, 4);
                assert_eq!(last.status, Some(500));
            }
            other => panic!("expected unhealthy, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_zero_attempts_still_probes_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let verdict = prober()
            .probe_until_healthy(&format!("{}/health", server.uri()), 0, Duration::from_millis(10))
            .await;
        assert!(verdict.is_healthy());
    }

    #[tokio::test]
    async fn test_prediction_check_requires_keyword() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"prediction": 1, "status": "success"}"#),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status": "success"}"#))
            .mount(&server)
            .await;

        let check = PredictionCheck::default();
        let prober = prober();

        assert!(prober
            .check_prediction(&format!("{}/predict", server.uri()), &check)
            .await
            .is_ok());

        let err = prober
            .check_prediction(&format!("{}/broken", server.uri()), &check)
            .await
            .unwrap_err();
        assert!(err.contains("missing 'prediction'"));
    }

    #[test]
    fn test_prediction_rejects_error_status() {
        let check = PredictionCheck::default();
        let result = ProbeResult::responded("http://x/predict", 503, r#"{"error":"prediction unavailable"}"#.into());
        assert_eq!(check.evaluate(&result).unwrap_err(), "HTTP 503");
    }
}
