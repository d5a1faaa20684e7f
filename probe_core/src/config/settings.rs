use crate::handlers::health::EndpointConfig;
use axum::http::StatusCode;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub health: HealthConfig,
    pub probes: ProbesConfig,
    /// Extra entries for the report's `info` section.
    pub info: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Run-wide budget; 0 disables it.
    pub timeout_ms: u64,
    pub with_groups: Vec<String>,
    pub skip_required: bool,
    pub return_results: bool,
    pub success_code: u16,
    pub error_code: u16,
    pub timeout_code: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbesConfig {
    pub database_url: Option<String>,
    pub database_group: String,
    pub filesystem_paths: Vec<PathBuf>,
    pub filesystem_group: String,
    pub disk: Option<DiskProbeConfig>,
    pub tcp: Vec<TcpProbeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiskProbeConfig {
    pub mount_point: PathBuf,
    pub min_free_percent: f64,
    #[serde(default)]
    pub group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpProbeConfig {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub group: String,
    #[serde(default = "default_tcp_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_tcp_timeout_ms() -> u64 {
    1000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 5000,
            with_groups: Vec::new(),
            skip_required: false,
            return_results: true,
            success_code: 200,
            error_code: 503,
            timeout_code: 504,
        }
    }
}

impl Default for ProbesConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            database_group: String::new(),
            filesystem_paths: Vec::new(),
            filesystem_group: String::new(),
            disk: None,
            tcp: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Defaults, then `config.toml` if present, then `APP_` variables such as
    /// `APP_HEALTH__TIMEOUT_MS=2000` or `APP_HEALTH__WITH_GROUPS=deep,cache`.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("health.with_groups")
                .with_list_parse_key("probes.filesystem_paths")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        for (field, code) in [
            ("success_code", self.health.success_code),
            ("error_code", self.health.error_code),
            ("timeout_code", self.health.timeout_code),
        ] {
            if !(100..=599).contains(&code) {
                return Err(ConfigError::Message(format!(
                    "health.{} must be an HTTP status code, got {}",
                    field, code
                )));
            }
        }

        if let Some(url) = &self.probes.database_url {
            if url.is_empty() {
                return Err(ConfigError::Message(
                    "Database URL cannot be empty".to_string(),
                ));
            }
        }

        if let Some(disk) = &self.probes.disk {
            if !(0.0..=100.0).contains(&disk.min_free_percent) {
                return Err(ConfigError::Message(
                    "Disk min_free_percent must be between 0 and 100".to_string(),
                ));
            }
        }

        for target in &self.probes.tcp {
            if target.address.is_empty() {
                return Err(ConfigError::Message(format!(
                    "TCP probe '{}' has no address",
                    target.name
                )));
            }
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn global_timeout(&self) -> Option<Duration> {
        match self.health.timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        }
    }

    pub fn endpoint_config(&self) -> Result<EndpointConfig, ConfigError> {
        let status = |code: u16| {
            StatusCode::from_u16(code)
                .map_err(|e| ConfigError::Message(format!("Invalid status code {}: {}", code, e)))
        };

        Ok(EndpointConfig {
            timeout: self.global_timeout(),
            with_groups: self.health.with_groups.clone().into(),
            skip_required: self.health.skip_required,
            return_results: self.health.return_results,
            success_code: status(self.health.success_code)?,
            error_code: status(self.health.error_code)?,
            timeout_code: status(self.health.timeout_code)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.health.timeout_ms, 5000);
        assert!(config.probes.database_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();

        config.server.port = 0;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.health.error_code = 42;
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.probes.disk = Some(DiskProbeConfig {
            mount_point: PathBuf::from("/"),
            min_free_percent: 120.0,
            group: String::new(),
        });
        assert!(config.validate().is_err());

        config = AppConfig::default();
        config.probes.tcp.push(TcpProbeConfig {
            name: "redis".to_string(),
            address: String::new(),
            group: "cache".to_string(),
            timeout_ms: 500,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_address() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:3000");

        let mut config = AppConfig::default();
        config.server.host = "0.0.0.0".to_string();
        config.server.port = 8080;
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_global_timeout_zero_disables() {
        let mut config = AppConfig::default();
        assert_eq!(config.global_timeout(), Some(Duration::from_secs(5)));

        config.health.timeout_ms = 0;
        assert_eq!(config.global_timeout(), None);
    }

    #[test]
    fn test_endpoint_config_from_settings() {
        let mut config = AppConfig::default();
        config.health.with_groups = vec!["deep".to_string()];
        config.health.return_results = false;

        let endpoint = config.endpoint_config().unwrap();
        assert_eq!(endpoint.timeout, Some(Duration::from_secs(5)));
        assert_eq!(endpoint.with_groups.iter().collect::<Vec<_>>(), vec!["deep"]);
        assert!(!endpoint.return_results);
        assert_eq!(endpoint.success_code, StatusCode::OK);
        assert_eq!(endpoint.error_code, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(endpoint.timeout_code, StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_config_loading() {
        let config = AppConfig::load().expect("Should load default configuration");

        assert!(config.validate().is_ok());
        assert!(!config.server.host.is_empty());
        assert!(config.server.port > 0);
    }
}
