//! Ready-made probes for common dependencies

use super::checker::HealthChecker;
use super::probe::{CheckOutcome, Probe, Verdict};
use super::registry::Groups;
use crate::config::AppConfig;
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

/// Runs `SELECT 1` against a SQLite pool.
pub struct DatabaseProbe {
    name: String,
    pool: sqlx::SqlitePool,
}

impl DatabaseProbe {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            name: "database".to_string(),
            pool,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Probe for DatabaseProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckOutcome {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database connection failed")?;
        Ok(Verdict::Pass)
    }
}

/// Every path must exist and accept a write.
pub struct FilesystemProbe {
    name: String,
    paths: Vec<PathBuf>,
}

impl FilesystemProbe {
    pub fn new<P: Into<PathBuf>>(paths: impl IntoIterator<Item = P>) -> Self {
        Self {
            name: "filesystem".to_string(),
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[async_trait]
impl Probe for FilesystemProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckOutcome {
        let mut issues = Vec::new();

        for path in &self.paths {
            if fs::metadata(path).await.is_err() {
                issues.push(format!("Path does not exist: {}", path.display()));
                continue;
            }

            let dir = if path.is_dir() {
                Some(path.as_path())
            } else {
                path.parent()
            };

            let writable = match dir {
                Some(dir) => {
                    let temp_file = dir.join(".health_check_temp");
                    match fs::write(&temp_file, "test").await {
                        Ok(_) => {
                            let _ = fs::remove_file(&temp_file).await;
                            true
                        }
                        Err(_) => false,
                    }
                }
                None => false,
            };

            if !writable {
                issues.push(format!("Cannot write to path: {}", path.display()));
            }
        }

        debug!(probe = %self.name, paths = self.paths.len(), issues = issues.len(), "filesystem probe checked paths");

        if issues.is_empty() {
            Ok(Verdict::Pass)
        } else {
            anyhow::bail!("Filesystem access failed: {}", issues.join(", "))
        }
    }
}

/// The disk holding `path` must keep at least `min_free_percent` free.
pub struct DiskSpaceProbe {
    name: String,
    path: PathBuf,
    min_free_percent: f64,
}

impl DiskSpaceProbe {
    pub fn new(path: impl Into<PathBuf>, min_free_percent: f64) -> Self {
        Self {
            name: "disk_space".to_string(),
            path: path.into(),
            min_free_percent,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Free space percentage of the disk whose mount point is the longest
/// prefix of `path`, which must already be absolute.
fn free_percent_for(path: &Path) -> Option<(PathBuf, f64)> {
    let disks = sysinfo::Disks::new_with_refreshed_list();
    disks
        .iter()
        .filter(|disk| path.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().components().count())
        .map(|disk| {
            let total = disk.total_space();
            let percent = if total > 0 {
                disk.available_space() as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            (disk.mount_point().to_path_buf(), percent)
        })
}

#[async_trait]
impl Probe for DiskSpaceProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn check(&self) -> CheckOutcome {
        let path = fs::canonicalize(&self.path)
            .await
            .with_context(|| format!("Cannot resolve disk path {}", self.path.display()))?;
        let found = tokio::task::spawn_blocking(move || free_percent_for(&path))
            .await
            .context("Disk inspection task failed")?;

        let (mount_point, free_percent) = found
            .with_context(|| format!("No disk mounted for {}", self.path.display()))?;

        debug!(probe = %self.name, mount_point = %mount_point.display(), free_percent, "disk space probe checked disk");

        if free_percent < self.min_free_percent {
            anyhow::bail!(
                "Low disk space on {}: {:.1}% free, need {:.1}%",
                mount_point.display(),
                free_percent,
                self.min_free_percent
            );
        }
        Ok(Verdict::Pass)
    }
}

/// Opens a TCP connection to check that a service is reachable.
pub struct TcpProbe {
    name: String,
    address: String,
    timeout: Option<Duration>,
}

impl TcpProbe {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Probe for TcpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn check(&self) -> CheckOutcome {
        tokio::net::TcpStream::connect(&self.address)
            .await
            .with_context(|| format!("Cannot connect to {}", self.address))?;
        Ok(Verdict::Pass)
    }
}

impl HealthChecker {
    /// Registers the probes enabled in `config` along with its info entries
    /// and the running version.
    pub fn from_config(config: &AppConfig) -> crate::Result<Self> {
        let mut checker = HealthChecker::new();
        checker.add_info("version", env!("CARGO_PKG_VERSION"));
        for (name, value) in &config.info {
            checker.add_info(name.clone(), value.clone());
        }

        let probes = &config.probes;

        if let Some(url) = &probes.database_url {
            let pool = sqlx::SqlitePool::connect_lazy(url)?;
            checker.add_probe(DatabaseProbe::new(pool), probes.database_group.as_str());
        }

        if !probes.filesystem_paths.is_empty() {
            checker.add_probe(
                FilesystemProbe::new(probes.filesystem_paths.iter().cloned()),
                probes.filesystem_group.as_str(),
            );
        }

        if let Some(disk) = &probes.disk {
            checker.add_probe(
                DiskSpaceProbe::new(disk.mount_point.clone(), disk.min_free_percent),
                disk.group.as_str(),
            );
        }

        for target in &probes.tcp {
            let mut probe = TcpProbe::new(target.name.clone(), target.address.clone());
            if target.timeout_ms > 0 {
                probe = probe.with_timeout(Duration::from_millis(target.timeout_ms));
            }
            checker.add_probe(probe, Groups::from(target.group.as_str()));
        }

        info!(
            required = checker.required_len(),
            groups = ?checker.group_names().collect::<Vec<_>>(),
            "Health checker configured"
        );

        Ok(checker)
    }
}
