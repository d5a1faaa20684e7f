//! The probe contract and the adapter that turns async functions into probes

use super::results::ProbeResult;
use async_trait::async_trait;
use chrono::Utc;
use futures_util::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tracing::debug;

/// What a successful check reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail,
}

impl From<bool> for Verdict {
    fn from(value: bool) -> Self {
        if value {
            Verdict::Pass
        } else {
            Verdict::Fail
        }
    }
}

impl From<()> for Verdict {
    fn from(_: ()) -> Self {
        Verdict::Pass
    }
}

/// A failed check carries its error; the message ends up in `ProbeResult::error`.
pub type CheckOutcome = anyhow::Result<Verdict>;

/// Conversion from the values a check function may return.
///
/// `()` and `true` pass, `false` fails without an error, and any `Err`
/// fails with the error's message.
pub trait IntoCheckOutcome {
    fn into_check_outcome(self) -> CheckOutcome;
}

impl IntoCheckOutcome for () {
    fn into_check_outcome(self) -> CheckOutcome {
        Ok(Verdict::Pass)
    }
}

impl IntoCheckOutcome for bool {
    fn into_check_outcome(self) -> CheckOutcome {
        Ok(self.into())
    }
}

impl IntoCheckOutcome for Verdict {
    fn into_check_outcome(self) -> CheckOutcome {
        Ok(self)
    }
}

impl<T, E> IntoCheckOutcome for Result<T, E>
where
    T: Into<Verdict>,
    E: Into<anyhow::Error>,
{
    fn into_check_outcome(self) -> CheckOutcome {
        self.map(Into::into).map_err(Into::into)
    }
}

#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;

    /// Own time budget, independent of any run-wide timeout.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn check(&self) -> CheckOutcome;

    /// Runs the check and records its outcome. Errors, panics and an expired
    /// probe timeout all become a failed `ProbeResult`; this never fails.
    async fn run_check(&self) -> ProbeResult {
        let started_at = Utc::now();
        let start = Instant::now();

        let guarded = AssertUnwindSafe(self.check()).catch_unwind();
        let outcome = match self.timeout().filter(|limit| !limit.is_zero()) {
            Some(limit) => match tokio::time::timeout(limit, guarded).await {
                Ok(caught) => caught,
                Err(_) => Ok(Err(anyhow::anyhow!("probe timed out after {:?}", limit))),
            },
            None => guarded.await,
        };

        let (ok, error) = match outcome {
            Ok(Ok(Verdict::Pass)) => (true, None),
            Ok(Ok(Verdict::Fail)) => (false, None),
            Ok(Err(e)) => (false, Some(format!("{:#}", e))),
            Err(payload) => (false, Some(panic_message(payload))),
        };

        let elapsed = start.elapsed();
        debug!(probe = self.name(), ok, elapsed_ms = elapsed.as_millis() as u64, "probe finished");

        ProbeResult::new(self.name(), ok, error, started_at, elapsed)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("probe panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("probe panicked: {}", message)
    } else {
        "probe panicked".to_string()
    }
}

/// Wraps a zero-argument async function as a [`Probe`].
pub struct CallableProbe<F> {
    func: F,
    name: String,
    timeout: Option<Duration>,
}

impl<F, Fut> CallableProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future + Send + 'static,
    Fut::Output: IntoCheckOutcome,
{
    /// The name defaults to the function's own name.
    pub fn new(func: F) -> Self {
        Self {
            func,
            name: callable_name::<F>(),
            timeout: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl<F, Fut> Probe for CallableProbe<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future + Send + 'static,
    Fut::Output: IntoCheckOutcome,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn check(&self) -> CheckOutcome {
        (self.func)().await.into_check_outcome()
    }
}

/// Last path segment of the callable's type, skipping `{{closure}}` markers,
/// so `app::checks::ping_db` becomes `ping_db` and a closure takes the name
/// of the function that defines it.
pub(crate) fn callable_name<F>() -> String {
    let path = std::any::type_name::<F>();
    path.split("::")
        .filter(|segment| !segment.starts_with('{'))
        .last()
        .unwrap_or(path)
        .to_string()
}
