//! Concurrent execution of selected probes and aggregation into one report

use super::probe::Probe;
use super::registry::{Groups, ProbeRegistry};
use super::results::HealthCheckResult;
use crate::error::{HealthError, Result};
use chrono::Utc;
use futures_util::future::join_all;
use std::ops::{Deref, DerefMut};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Selection and budget for one run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Budget for the whole run. `None` or zero means unbounded.
    pub timeout: Option<Duration>,
    pub with_groups: Groups,
    pub skip_required: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_groups(mut self, groups: impl Into<Groups>) -> Self {
        self.with_groups = groups.into();
        self
    }

    pub fn skip_required(mut self, skip_required: bool) -> Self {
        self.skip_required = skip_required;
        self
    }
}

/// Runs registered probes and aggregates their results.
///
/// Registration goes through the wrapped [`ProbeRegistry`] (available via
/// `Deref`/`DerefMut`). Share it as `Arc<HealthChecker>` once set up; any
/// number of runs may then proceed at the same time.
#[derive(Default)]
pub struct HealthChecker {
    registry: ProbeRegistry,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration of a required probe.
    pub fn add_check<P: Probe + 'static>(mut self, probe: P) -> Self {
        self.registry.add_probe(probe, Groups::none());
        self
    }

    /// Builder-style registration of a probe into one or more groups.
    pub fn add_grouped_check<P: Probe + 'static>(mut self, probe: P, groups: impl Into<Groups>) -> Self {
        self.registry.add_probe(probe, groups);
        self
    }

    /// Required probes only, no run-wide timeout.
    pub async fn check_all(&self) -> Result<HealthCheckResult> {
        self.run(RunOptions::default()).await
    }

    /// Runs the selected probes concurrently and reports them in submission
    /// order. Failing probes only turn the report's `ok` off; the one way
    /// for the run itself to fail is the run-wide timeout expiring, in which
    /// case every probe still in flight is dropped and no report is built.
    pub async fn run(&self, options: RunOptions) -> Result<HealthCheckResult> {
        let RunOptions {
            timeout,
            with_groups,
            skip_required,
        } = options;

        let probes = self.registry.probes_for(&with_groups, skip_required);
        let run_id = Uuid::new_v4();

        debug!(
            %run_id,
            probes = probes.len(),
            groups = ?with_groups,
            skip_required,
            "Starting health check run"
        );

        let started_at = Utc::now();
        let start = Instant::now();

        let gather = join_all(probes.iter().map(|probe| probe.run_check()));

        let checks = match timeout.filter(|limit| !limit.is_zero()) {
            Some(limit) => match tokio::time::timeout(limit, gather).await {
                Ok(checks) => checks,
                Err(_) => {
                    error!(%run_id, timeout_ms = limit.as_millis() as u64, "Health check run timed out");
                    return Err(HealthError::Timeout(limit));
                }
            },
            None => gather.await,
        };

        for check in checks.iter().filter(|check| !check.ok()) {
            warn!(
                %run_id,
                probe = check.name(),
                error = check.error().unwrap_or("returned false"),
                elapsed_ms = check.elapsed().as_millis() as u64,
                "Health check '{}' failed",
                check.name()
            );
        }

        let result = HealthCheckResult::new(
            self.registry.info().clone(),
            started_at,
            start.elapsed(),
            checks,
        );

        if result.ok() {
            info!(%run_id, checks = result.checks().len(), elapsed = ?result.total_elapsed(), "Health check completed - all probes passed");
        } else {
            warn!(
                %run_id,
                checks = result.checks().len(),
                failed = result.failed_checks().count(),
                elapsed = ?result.total_elapsed(),
                "Health check completed - some probes failed"
            );
        }

        Ok(result)
    }
}

impl Deref for HealthChecker {
    type Target = ProbeRegistry;

    fn deref(&self) -> &ProbeRegistry {
        &self.registry
    }
}

impl DerefMut for HealthChecker {
    fn deref_mut(&mut self) -> &mut ProbeRegistry {
        &mut self.registry
    }
}
