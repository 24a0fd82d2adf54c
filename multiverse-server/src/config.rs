use std::net::IpAddr;

use multiverse_orchestrator::OrchestratorConfig;
use serde::Serialize;

const DEFAULT_WS_HOST: &str = "0.0.0.0";
const DEFAULT_WS_PORT: u16 = 8000;
const DEFAULT_MAX_FRAME_BYTES: usize = 65536;
const DEFAULT_MAX_CONNECTIONS: usize = 10_000;

/// Bind address, frame/connection caps, and the embedded
/// [`OrchestratorConfig`] the server runs with. Built from CLI flags that
/// fall back to environment variables and then to these documented
/// defaults, mirroring `SimulatorConfig`'s `Option<T>` + `unwrap_or`
/// accessor style.
#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    pub ws_host: IpAddr,
    pub ws_port: u16,
    pub max_frame_bytes: usize,
    pub max_connections: usize,
    pub orchestrator: OrchestratorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            ws_host: DEFAULT_WS_HOST.parse().expect("valid default host"),
            ws_port: DEFAULT_WS_PORT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

/// Errors in configuration resolution, mapped to exit code `1`.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid WS_HOST: {0}")]
    InvalidHost(String),
    #[error(transparent)]
    Orchestrator(#[from] multiverse_orchestrator::ConfigError),
}

impl ServerConfig {
    /// Reads the documented environment options, falling back to defaults
    /// for anything unset or unparseable — the same precedence
    /// `OrchestratorConfig::from_env` uses.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let ws_host = match std::env::var("WS_HOST") {
            Ok(raw) => raw
                .parse()
                .map_err(|_| ConfigError::InvalidHost(raw.clone()))?,
            Err(_) => defaults.ws_host,
        };
        Ok(Self {
            ws_host,
            ws_port: env_u16("WS_PORT").unwrap_or(defaults.ws_port),
            max_frame_bytes: env_usize("MAX_FRAME_BYTES").unwrap_or(defaults.max_frame_bytes),
            max_connections: env_usize("MAX_CONNECTIONS").unwrap_or(defaults.max_connections),
            orchestrator: OrchestratorConfig::from_env(),
        })
    }

    /// Checks the fully-resolved config — after env and CLI overrides are
    /// both applied — against the constraints the orchestrator needs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.orchestrator.validate()?;
        Ok(())
    }
}

fn env_u16(var: &str) -> Option<u16> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}

fn env_usize(var: &str) -> Option<usize> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}
