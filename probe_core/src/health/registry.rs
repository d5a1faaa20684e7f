//! Registration of required probes, optional probe groups and report metadata

use super::probe::{CallableProbe, IntoCheckOutcome, Probe};
use super::results::Info;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A normalized selection of group names.
///
/// An empty string selects nothing, any other string selects exactly that
/// group. Lists are kept as given, order included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Groups(Vec<String>);

impl Groups {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn push(&mut self, group: impl Into<String>) {
        let group = group.into();
        if !group.is_empty() {
            self.0.push(group);
        }
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<&str> for Groups {
    fn from(group: &str) -> Self {
        group.to_string().into()
    }
}

impl From<String> for Groups {
    fn from(group: String) -> Self {
        if group.is_empty() {
            Self::none()
        } else {
            Self(vec![group])
        }
    }
}

impl From<&String> for Groups {
    fn from(group: &String) -> Self {
        group.as_str().into()
    }
}

impl From<Vec<String>> for Groups {
    fn from(groups: Vec<String>) -> Self {
        Self(groups)
    }
}

impl From<Vec<&str>> for Groups {
    fn from(groups: Vec<&str>) -> Self {
        Self(groups.into_iter().map(str::to_string).collect())
    }
}

impl From<&[&str]> for Groups {
    fn from(groups: &[&str]) -> Self {
        Self(groups.iter().map(|group| group.to_string()).collect())
    }
}

impl From<&[String]> for Groups {
    fn from(groups: &[String]) -> Self {
        Self(groups.to_vec())
    }
}

impl<const N: usize> From<[&str; N]> for Groups {
    fn from(groups: [&str; N]) -> Self {
        Self(groups.iter().map(|group| group.to_string()).collect())
    }
}

impl<T: Into<Groups>> From<Option<T>> for Groups {
    fn from(groups: Option<T>) -> Self {
        groups.map(Into::into).unwrap_or_default()
    }
}

/// Options for registering a plain async function as a probe.
#[derive(Debug, Clone, Default)]
pub struct ProbeOptions {
    pub name: Option<String>,
    pub timeout: Option<Duration>,
    pub groups: Groups,
}

impl ProbeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn groups(mut self, groups: impl Into<Groups>) -> Self {
        self.groups = groups.into();
        self
    }
}

/// Holds the probes a run can choose from plus the metadata every report
/// carries. Registration needs `&mut self`, so it cannot overlap a run.
#[derive(Default)]
pub struct ProbeRegistry {
    required: Vec<Arc<dyn Probe>>,
    groups: HashMap<String, Vec<Arc<dyn Probe>>>,
    info: Info,
}

impl ProbeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Without groups the probes are required; otherwise they are appended
    /// to every named group and are not required.
    pub fn add_probes<I>(&mut self, probes: I, groups: impl Into<Groups>) -> &mut Self
    where
        I: IntoIterator<Item = Arc<dyn Probe>>,
    {
        let groups = groups.into();
        let probes: Vec<Arc<dyn Probe>> = probes.into_iter().collect();

        if groups.is_empty() {
            debug!(count = probes.len(), "registering required probes");
            self.required.extend(probes);
            return self;
        }

        for group in groups.iter() {
            debug!(count = probes.len(), group, "registering optional probes");
            self.groups
                .entry(group.to_string())
                .or_default()
                .extend(probes.iter().cloned());
        }
        self
    }

    pub fn add_probe<P>(&mut self, probe: P, groups: impl Into<Groups>) -> &mut Self
    where
        P: Probe + 'static,
    {
        self.add_probes([Arc::new(probe) as Arc<dyn Probe>], groups)
    }

    /// Wraps `func` in a [`CallableProbe`] and registers it. The caller's
    /// function is left untouched and stays callable on its own.
    pub fn register<F, Fut>(&mut self, options: ProbeOptions, func: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future + Send + 'static,
        Fut::Output: IntoCheckOutcome,
    {
        let mut probe = CallableProbe::new(func);
        if let Some(name) = options.name {
            probe = probe.with_name(name);
        }
        if let Some(timeout) = options.timeout {
            probe = probe.with_timeout(timeout);
        }
        self.add_probe(probe, options.groups)
    }

    /// Last write wins for a repeated name.
    pub fn add_info(&mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> &mut Self {
        self.info.insert(name.into(), value.into());
        self
    }

    pub fn info(&self) -> &Info {
        &self.info
    }

    pub fn required_len(&self) -> usize {
        self.required.len()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    /// Probes for one run in submission order: required ones first (unless
    /// skipped), then each requested group in the order asked for. A probe in
    /// several requested groups shows up once per group.
    pub fn probes_for(&self, with_groups: &Groups, skip_required: bool) -> Vec<Arc<dyn Probe>> {
        let mut selected = Vec::new();
        if !skip_required {
            selected.extend(self.required.iter().cloned());
        }
        for group in with_groups.iter() {
            if let Some(probes) = self.groups.get(group) {
                selected.extend(probes.iter().cloned());
            }
        }
        selected
    }
}
