//! Readiness probing.
//!
//! A service is ready once its readiness URL answers with a 2xx or 3xx
//! status. Response bodies are never inspected.

mod http;
#[cfg(test)]
mod mock;

use std::time::Duration;

use overture_types::ReadinessPolicy;
use tokio::time::{sleep, timeout, Instant};

use crate::error::{Error, Result};

pub use http::ReqwestCheck;
#[cfg(test)]
pub(crate) use mock::{Behavior, ScriptedCheck};

/// Result of a single readiness attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Ready(u16),
    NotReady(String),
}

/// Accepted readiness status codes.
#[must_use]
pub fn is_ready_status(status: u16) -> bool {
    (200..400).contains(&status)
}

/// One readiness attempt against a URL.
#[async_trait::async_trait]
pub trait HttpCheck: Send + Sync {
    /// Probe `url` once, giving up after `limit`.
    ///
    /// Transport failures are reported as [`CheckOutcome::NotReady`].
    async fn check(&self, url: &str, limit: Duration) -> CheckOutcome;
}

/// Polls a readiness URL until it answers or the policy's timeout elapses.
#[derive(Debug, Clone)]
pub struct Prober<C = ReqwestCheck> {
    check: C,
}

impl<C: HttpCheck> Prober<C> {
    pub fn new(check: C) -> Self {
        Self { check }
    }

    /// Blocks until `url` reports ready.
    ///
    /// Waits `initial_delay`, then checks every `interval`. The overall
    /// `timeout` covers the initial delay and any in-flight request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadinessTimeout`] naming `service` if the URL never
    /// answered with an accepted status in time.
    pub async fn wait_ready(
        &self,
        service: &str,
        url: &str,
        policy: &ReadinessPolicy,
    ) -> Result<Duration> {
        let started = Instant::now();

        let poll = async {
            sleep(policy.initial_delay).await;

            let mut attempt: u32 = 0;
            loop {
                attempt += 1;
                match self.check.check(url, policy.interval).await {
                    CheckOutcome::Ready(status) => {
                        tracing::debug!(
                            "`{service}` answered {status} on attempt {attempt} ({url})"
                        );
                        return;
                    }
                    CheckOutcome::NotReady(reason) => {
                        tracing::debug!("`{service}` not ready on attempt {attempt}: {reason}");
                    }
                }
                sleep(policy.interval).await;
            }
        };

        match timeout(policy.timeout, poll).await {
            Ok(()) => Ok(started.elapsed()),
            Err(_) => Err(Error::ReadinessTimeout {
                service: service.to_owned(),
                elapsed: started.elapsed(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial_delay: u64, interval: u64, timeout: u64) -> ReadinessPolicy {
        ReadinessPolicy {
            initial_delay: Duration::from_millis(initial_delay),
            interval: Duration::from_millis(interval),
            timeout: Duration::from_millis(timeout),
        }
    }

    #[test]
    fn test_ready_status_range() {
        assert!(is_ready_status(200));
        assert!(is_ready_status(204));
        assert!(is_ready_status(302));
        assert!(is_ready_status(399));
        assert!(!is_ready_status(199));
        assert!(!is_ready_status(404));
        assert!(!is_ready_status(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_after_retries() {
        let check = ScriptedCheck::default();
        check.set("http://svc/", Behavior::ReadyAfter(3));
        let prober = Prober::new(check.clone());

        let elapsed = prober
            .wait_ready("svc", "http://svc/", &ReadinessPolicy::default())
            .await
            .unwrap();

        // 1000ms initial delay, then attempts at 1000, 3000 and 5000.
        assert!(elapsed >= Duration::from_millis(5000));
        assert!(elapsed < Duration::from_millis(5100));
        assert_eq!(check.attempts("http://svc/"), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_after_initial_delay() {
        let check = ScriptedCheck::default();
        check.set("http://svc/", Behavior::ReadyAfter(1));
        let prober = Prober::new(check.clone());

        let elapsed = prober
            .wait_ready("svc", "http://svc/", &policy(250, 100, 1000))
            .await
            .unwrap();

        assert!(elapsed >= Duration::from_millis(250));
        assert!(elapsed < Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_names_service() {
        let check = ScriptedCheck::default();
        check.set("http://svc/", Behavior::Never);
        let prober = Prober::new(check.clone());

        let err = prober
            .wait_ready("search", "http://svc/", &ReadinessPolicy::default())
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("service `search` did not become ready after"));
        match err {
            Error::ReadinessTimeout { service, elapsed } => {
                assert_eq!(service, "search");
                assert!(elapsed >= Duration::from_millis(60000));
                assert!(elapsed < Duration::from_millis(60100));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        // Attempts at 1s, 3s, ..., 59s.
        assert_eq!(check.attempts("http://svc/"), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_request_cannot_overrun_timeout() {
        let check = ScriptedCheck::default();
        check.set("http://svc/", Behavior::Hang);
        let prober = Prober::new(check);

        let started = Instant::now();
        let result = prober
            .wait_ready("svc", "http://svc/", &policy(0, 10_000, 3000))
            .await;

        assert!(matches!(result, Err(Error::ReadinessTimeout { .. })));
        assert!(started.elapsed() < Duration::from_millis(3100));
    }
}
