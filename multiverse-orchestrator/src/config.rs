use std::time::Duration;

use serde::Serialize;

/// Errors in orchestrator configuration, surfaced by the embedding
/// binary as exit code `1` per §6.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("control_tick_divisor must be >= 1, got 0")]
    ZeroControlTickDivisor,
}

const DEFAULT_TICK_PERIOD_MS: u64 = 100;
const DEFAULT_CONTROL_TICK_DIVISOR: u64 = 10;
const DEFAULT_BUFFER_MAX: usize = 5000;
const DEFAULT_QUEUE_MAX: usize = 256;
const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 5000;
/// The per-registration draining window used outside of full shutdown; see
/// DESIGN.md for why this value was chosen.
const DEFAULT_DRAIN_TIMEOUT_MS: u64 = 1000;

/// The orchestrator's tick/capacity configuration.
#[derive(Clone, Debug, Serialize)]
pub struct OrchestratorConfig {
    pub tick_period_ms: u64,
    pub control_tick_divisor: u64,
    pub buffer_max: usize,
    pub queue_max: usize,
    pub shutdown_grace_ms: u64,
    pub drain_timeout_ms: u64,
}

impl OrchestratorConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_period_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout_ms)
    }

    /// Rejects values the tick task cannot run with. `control_tick_divisor`
    /// gates a modulo in the local-tick hot path, so a `0` here would panic
    /// the tick task on its first tick.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.control_tick_divisor == 0 {
            return Err(ConfigError::ZeroControlTickDivisor);
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tick_period_ms: DEFAULT_TICK_PERIOD_MS,
            control_tick_divisor: DEFAULT_CONTROL_TICK_DIVISOR,
            buffer_max: DEFAULT_BUFFER_MAX,
            queue_max: DEFAULT_QUEUE_MAX,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT_MS,
        }
    }
}

/// Reads the environment options below, falling back to the documented
/// defaults for anything unset or unparseable.
impl OrchestratorConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            tick_period_ms: env_u64("TICK_PERIOD_MS").unwrap_or(defaults.tick_period_ms),
            control_tick_divisor: env_u64("CONTROL_TICK_DIVISOR")
                .unwrap_or(defaults.control_tick_divisor),
            buffer_max: env_u64("BUFFER_MAX")
                .map(|v| v as usize)
                .unwrap_or(defaults.buffer_max),
            queue_max: env_u64("PER_SUBSCRIBER_QUEUE_MAX")
                .map(|v| v as usize)
                .unwrap_or(defaults.queue_max),
            shutdown_grace_ms: env_u64("SHUTDOWN_GRACE_MS").unwrap_or(defaults.shutdown_grace_ms),
            drain_timeout_ms: defaults.drain_timeout_ms,
        }
    }
}

fn env_u64(var: &str) -> Option<u64> {
    std::env::var(var).ok().and_then(|v| v.parse().ok())
}
