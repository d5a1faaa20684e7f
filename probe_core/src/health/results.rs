//! Outcome records produced by probes and by a whole health check run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Free-form metadata echoed in every report.
pub type Info = serde_json::Map<String, serde_json::Value>;

/// Outcome of a single probe invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeResult {
    ok: bool,
    name: String,
    #[serde(rename = "startedAtMs", with = "chrono::serde::ts_milliseconds")]
    started_at: DateTime<Utc>,
    #[serde(rename = "elapsedMs", with = "duration_ms")]
    elapsed: Duration,
    error: Option<String>,
}

impl ProbeResult {
    pub fn new(
        name: impl Into<String>,
        ok: bool,
        error: Option<String>,
        started_at: DateTime<Utc>,
        elapsed: Duration,
    ) -> Self {
        Self {
            ok,
            name: name.into(),
            started_at,
            elapsed,
            error,
        }
    }

    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// Aggregate report for one run. `checks` keeps submission order.
///
/// A deserialized report recomputes `ok` from its checks; any `ok` in the
/// input is ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "ReportFields")]
pub struct HealthCheckResult {
    ok: bool,
    info: Info,
    started_at: DateTime<Utc>,
    #[serde(rename = "totalElapsedMs", with = "duration_ms")]
    total_elapsed: Duration,
    checks: Vec<ProbeResult>,
}

impl HealthCheckResult {
    /// Builds the report, deriving `ok` from the checks (true when there are none).
    pub fn new(
        info: Info,
        started_at: DateTime<Utc>,
        total_elapsed: Duration,
        checks: Vec<ProbeResult>,
    ) -> Self {
        let ok = checks.iter().all(ProbeResult::ok);
        Self {
            ok,
            info,
            started_at,
            total_elapsed,
            checks,
        }
    }

    pub fn ok(&self) -> bool {
        self.ok
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn total_elapsed(&self) -> Duration {
        self.total_elapsed
    }

    pub fn checks(&self) -> &[ProbeResult] {
        &self.checks
    }

    pub fn failed_checks(&self) -> impl Iterator<Item = &ProbeResult> {
        self.checks.iter().filter(|check| !check.ok())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportFields {
    info: Info,
    started_at: DateTime<Utc>,
    #[serde(rename = "totalElapsedMs", with = "duration_ms")]
    total_elapsed: Duration,
    checks: Vec<ProbeResult>,
}

impl From<ReportFields> for HealthCheckResult {
    fn from(fields: ReportFields) -> Self {
        HealthCheckResult::new(fields.info, fields.started_at, fields.total_elapsed, fields.checks)
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
