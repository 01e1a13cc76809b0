// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 preflight contributors

//! Supervision of long-running units
//!
//! A [`Supervisable`] unit is something started in the background that
//! serves HTTP once its own startup completes: the plain service process or
//! a container instance. [`supervise`] waits for readiness, runs the probe
//! plan and always stops the unit, whatever the probes returned.

mod process;

pub use process::{ProcessSupervisor, SupervisedProcess};

#[cfg(test)]
pub(crate) use process::pid_alive;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::errors::{PreflightError, PreflightResult};
use crate::probe::{Endpoint, HealthProber, HealthVerdict, ProbePlan};
use crate::utils::create_spinner;

/// State of a unit as seen by one readiness check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The endpoint answered
    Ready,
    /// Still starting
    NotYet,
    /// The unit terminated on its own
    Exited(Option<i32>),
}

/// Kind of unit, which decides how failures are reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitKind {
    Service,
    Container,
}

impl UnitKind {
    fn start_timeout(self, unit: &str, url: &str, waited: Duration, attempts: u32) -> PreflightError {
        match self {
            Self::Service => PreflightError::ServiceStartTimeout {
                unit: unit.to_string(),
                url: url.to_string(),
                waited_ms: waited.as_millis() as u64,
            },
            Self::Container => PreflightError::ContainerUnhealthy {
                unit: unit.to_string(),
                url: url.to_string(),
                attempts,
                detail: format!("no response within {}ms", waited.as_millis()),
            },
        }
    }

    fn exited(self, unit: &str, url: &str, exit_code: Option<i32>) -> PreflightError {
        match self {
            Self::Service => PreflightError::ServiceExited {
                unit: unit.to_string(),
                exit_code,
            },
            Self::Container => PreflightError::ContainerUnhealthy {
                unit: unit.to_string(),
                url: url.to_string(),
                attempts: 0,
                detail: "container exited before becoming ready".to_string(),
            },
        }
    }

    fn unhealthy(self, unit: &str, url: &str, attempts: u32, detail: String) -> PreflightError {
        match self {
            Self::Service => PreflightError::ServiceUnhealthy {
                unit: unit.to_string(),
                url: url.to_string(),
                attempts,
                detail,
            },
            Self::Container => PreflightError::ContainerUnhealthy {
                unit: unit.to_string(),
                url: url.to_string(),
                attempts,
                detail,
            },
        }
    }
}

/// A background unit with a readiness check and an idempotent stop
#[async_trait]
pub trait Supervisable: Send {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Where the unit serves HTTP
    fn endpoint(&self) -> &Endpoint;

    fn kind(&self) -> UnitKind;

    /// Check once whether the unit answers on `path`
    async fn is_ready(&mut self, prober: &HealthProber, path: &str) -> Readiness;

    /// Terminate the unit; calling it again is a no-op
    async fn stop(&mut self) -> PreflightResult<()>;
}

/// How long to wait for a freshly started unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum ReadinessPolicy {
    /// Sleep once, then check exactly once
    FixedDelay { delay_ms: u64 },

    /// Check repeatedly with a doubling interval until the budget runs out
    Backoff {
        initial_ms: u64,
        max_interval_ms: u64,
        budget_ms: u64,
    },
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self::Backoff {
            initial_ms: 100,
            max_interval_ms: 2_000,
            budget_ms: 30_000,
        }
    }
}

/// Result of waiting for readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
    Ready { attempts: u32, waited: Duration },
    TimedOut { attempts: u32, waited: Duration },
    Exited { exit_code: Option<i32> },
}

/// Wait for `unit` to answer on `path` according to `policy`
pub async fn await_ready<U>(
    unit: &mut U,
    prober: &HealthProber,
    policy: &ReadinessPolicy,
    path: &str,
) -> ReadyOutcome
where
    U: Supervisable + ?Sized,
{
    let start = Instant::now();

    match *policy {
        ReadinessPolicy::FixedDelay { delay_ms } => {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            match unit.is_ready(prober, path).await {
                Readiness::Ready => ReadyOutcome::Ready {
                    attempts: 1,
                    waited: start.elapsed(),
                },
                Readiness::NotYet => ReadyOutcome::TimedOut {
                    attempts: 1,
                    waited: start.elapsed(),
                },
                Readiness::Exited(exit_code) => ReadyOutcome::Exited { exit_code },
            }
        }
        ReadinessPolicy::Backoff {
            initial_ms,
            max_interval_ms,
            budget_ms,
        } => {
            let budget = Duration::from_millis(budget_ms);
            let max_interval = Duration::from_millis(max_interval_ms.max(1));
            let mut interval = Duration::from_millis(initial_ms.max(1)).min(max_interval);
            let mut attempts = 0;

            loop {
                attempts += 1;
                match unit.is_ready(prober, path).await {
                    Readiness::Ready => {
                        return ReadyOutcome::Ready {
                            attempts,
                            waited: start.elapsed(),
                        }
                    }
                    Readiness::Exited(exit_code) => return ReadyOutcome::Exited { exit_code },
                    Readiness::NotYet => {}
                }

                let waited = start.elapsed();
                if waited >= budget {
                    return ReadyOutcome::TimedOut { attempts, waited };
                }

                debug!(unit = unit.name(), attempts, next_ms = interval.as_millis() as u64, "not ready yet");
                tokio::time::sleep(interval.min(budget - waited)).await;
                interval = (interval * 2).min(max_interval);
            }
        }
    }
}

/// Wait for readiness, run the probe plan, then stop the unit
///
/// The unit is stopped on every path out of this function. A stop failure
/// is returned only when the probes passed; otherwise the probe error wins
/// and the stop failure is logged.
pub async fn supervise<U>(
    unit: &mut U,
    prober: &HealthProber,
    policy: &ReadinessPolicy,
    plan: &ProbePlan,
) -> PreflightResult<()>
where
    U: Supervisable + ?Sized,
{
    let checked = exercise(unit, prober, policy, plan).await;
    let stopped = unit.stop().await;

    match (checked, stopped) {
        (Ok(()), stopped) => stopped,
        (Err(e), Ok(())) => Err(e),
        (Err(e), Err(stop_err)) => {
            warn!(unit = unit.name(), error = %stop_err, "teardown failed after probe failure");
            Err(e)
        }
    }
}

async fn exercise<U>(
    unit: &mut U,
    prober: &HealthProber,
    policy: &ReadinessPolicy,
    plan: &ProbePlan,
) -> PreflightResult<()>
where
    U: Supervisable + ?Sized,
{
    let kind = unit.kind();
    let name = unit.name().to_string();
    let health_url = unit.endpoint().url(&plan.health_path);

    let spinner = create_spinner(&format!("waiting for {} on {}", name, health_url));
    let outcome = await_ready(unit, prober, policy, &plan.health_path).await;
    spinner.finish_and_clear();

    match outcome {
        ReadyOutcome::Ready { attempts, waited } => {
            info!(unit = %name, attempts, waited_ms = waited.as_millis() as u64, "unit ready");
        }
        ReadyOutcome::TimedOut { attempts, waited } => {
            return Err(kind.start_timeout(&name, &health_url, waited, attempts));
        }
        ReadyOutcome::Exited { exit_code } => {
            return Err(kind.exited(&name, &health_url, exit_code));
        }
    }

    match prober
        .probe_until_healthy(&health_url, plan.attempts, plan.interval)
        .await
    {
        HealthVerdict::Healthy { result, .. } => {
            info!(unit = %name, body = %result.body.trim(), "health check passed");
        }
        HealthVerdict::Unhealthy { attempts, last } => {
            return Err(kind.unhealthy(&name, &health_url, attempts, last.describe()));
        }
    }

    if let Some(check) = &plan.prediction {
        let predict_url = unit.endpoint().url(&check.path);
        let result = prober
            .check_prediction(&predict_url, check)
            .await
            .map_err(|detail| PreflightError::PredictionRejected {
                url: predict_url.clone(),
                detail,
            })?;
        info!(unit = %name, body = %result.body.trim(), "prediction check passed");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Unit whose readiness follows a script and which counts stops
    struct ScriptedUnit {
        endpoint: Endpoint,
        script: Vec<Readiness>,
        checks: usize,
        stops: Arc<AtomicU32>,
        fail_stop: bool,
    }

    impl ScriptedUnit {
        fn new(endpoint: Endpoint, script: Vec<Readiness>) -> Self {
            Self {
                endpoint,
                script,
                checks: 0,
                stops: Arc::new(AtomicU32::new(0)),
                fail_stop: false,
            }
        }
    }

    #[async_trait]
    impl Supervisable for ScriptedUnit {
        fn name(&self) -> &str {
            "scripted"
        }

        fn endpoint(&self) -> &Endpoint {
            &self.endpoint
        }

        fn kind(&self) -> UnitKind {
            UnitKind::Service
        }

        async fn is_ready(&mut self, _prober: &HealthProber, _path: &str) -> Readiness {
            let state = self
                .script
                .get(self.checks)
                .or(self.script.last())
                .copied()
                .unwrap_or(Readiness::NotYet);
            self.checks += 1;
            state
        }

        async fn stop(&mut self) -> PreflightResult<()> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            if self.fail_stop {
                return Err(PreflightError::TeardownFailed {
                    unit: "scripted".into(),
                    detail: "refused".into(),
                });
            }
            Ok(())
        }
    }

    fn prober() -> HealthProber {
        HealthProber::new(Duration::from_secs(2)).unwrap()
    }

    fn endpoint_of(server: &MockServer) -> Endpoint {
        let address = server.address();
        Endpoint::new(address.ip().to_string(), address.port())
    }

    fn plan() -> ProbePlan {
        ProbePlan {
            health_path: "/health".into(),
            attempts: 2,
            interval: Duration::from_millis(10),
            prediction: None,
        }
    }

    const FAST_BACKOFF: ReadinessPolicy = ReadinessPolicy::Backoff {
        initial_ms: 5,
        max_interval_ms: 20,
        budget_ms: 200,
    };

    #[tokio::test]
    async fn test_backoff_waits_until_ready() {
        let mut unit = ScriptedUnit::new(
            Endpoint::local(1),
            vec![Readiness::NotYet, Readiness::NotYet, Readiness::Ready],
        );

        let outcome = await_ready(&mut unit, &prober(), &FAST_BACKOFF, "/health").await;
        assert!(matches!(outcome, ReadyOutcome::Ready { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_backoff_times_out_within_budget() {
        let mut unit = ScriptedUnit::new(Endpoint::local(1), vec![Readiness::NotYet]);

        let outcome = await_ready(&mut unit, &prober(), &FAST_BACKOFF, "/health").await;
        match outcome {
            ReadyOutcome::TimedOut { waited, .. } => {
                assert!(waited >= Duration::from_millis(200));
                assert!(waited < Duration::from_secs(2));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fixed_delay_checks_exactly_once() {
        let mut unit = ScriptedUnit::new(Endpoint::local(1), vec![Readiness::NotYet, Readiness::Ready]);
        let policy = ReadinessPolicy::FixedDelay { delay_ms: 10 };

        let outcome = await_ready(&mut unit, &prober(), &policy, "/health").await;
        assert!(matches!(outcome, ReadyOutcome::TimedOut { attempts: 1, .. }));
        assert_eq!(unit.checks, 1);
    }

    #[tokio::test]
    async fn test_exited_unit_fails_fast() {
        let mut unit = ScriptedUnit::new(Endpoint::local(1), vec![Readiness::Exited(Some(1))]);

        let outcome = await_ready(&mut unit, &prober(), &ReadinessPolicy::default(), "/health").await;
        assert_eq!(outcome, ReadyOutcome::Exited { exit_code: Some(1) });
    }

    #[tokio::test]
    async fn test_supervise_stops_after_health_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let mut unit = ScriptedUnit::new(endpoint_of(&server), vec![Readiness::Ready]);
        let stops = unit.stops.clone();

        let err = supervise(&mut unit, &prober(), &FAST_BACKOFF, &plan())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "ServiceUnhealthy");
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_supervise_stops_after_start_timeout() {
        let mut unit = ScriptedUnit::new(Endpoint::local(1), vec![Readiness::NotYet]);
        let stops = unit.stops.clone();

        let err = supervise(&mut unit, &prober(), &FAST_BACKOFF, &plan())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "ServiceStartTimeout");
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stop_failure_escalates_only_on_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let mut unit = ScriptedUnit::new(endpoint_of(&server), vec![Readiness::Ready]);
        unit.fail_stop = true;
        let err = supervise(&mut unit, &prober(), &FAST_BACKOFF, &plan())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "TeardownFailed");

        let mut unit = ScriptedUnit::new(Endpoint::local(1), vec![Readiness::Exited(None)]);
        unit.fail_stop = true;
        let err = supervise(&mut unit, &prober(), &FAST_BACKOFF, &plan())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "ServiceExited");
    }

    #[tokio::test]
    async fn test_prediction_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"success"}"#))
            .mount(&server)
            .await;

        let mut unit = ScriptedUnit::new(endpoint_of(&server), vec![Readiness::Ready]);
        let stops = unit.stops.clone();
        let mut plan = plan();
        plan.prediction = Some(crate::probe::PredictionCheck::default());

        let err = supervise(&mut unit, &prober(), &FAST_BACKOFF, &plan)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "PredictionRejected");
        assert_eq!(stops.load(Ordering::SeqCst), 1);
    }
}
