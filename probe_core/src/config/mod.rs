pub mod settings;

pub use settings::{AppConfig, DiskProbeConfig, HealthConfig, ProbesConfig, ServerConfig, TcpProbeConfig};
