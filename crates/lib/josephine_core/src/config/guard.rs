//! Write-guard configuration: circuit-breaker thresholds, the global write
//! switch and the idempotency lookup failure policy.

use std::str::FromStr;
use std::time::Duration;

use super::ConfigError;

/// Default number of errors inside the window that trips a breaker.
pub const DEFAULT_BREAKER_THRESHOLD: u32 = 10;

/// Default rolling window for counting errors: 60 seconds.
pub const DEFAULT_BREAKER_WINDOW_MS: u64 = 60_000;

/// Default time a tripped breaker stays open: 60 seconds.
pub const DEFAULT_BREAKER_COOLDOWN_MS: u64 = 60_000;

/// Lower bound for the trip threshold.
pub const MIN_BREAKER_THRESHOLD: u32 = 1;

/// Lower bound for both time-based breaker settings.
pub const MIN_BREAKER_DURATION_MS: u64 = 1_000;

pub const ENV_BREAKER_THRESHOLD: &str = "JOSEPHINE_MCP_BREAKER_THRESHOLD";
pub const ENV_BREAKER_WINDOW_MS: &str = "JOSEPHINE_MCP_BREAKER_WINDOW_MS";
pub const ENV_BREAKER_COOLDOWN_MS: &str = "JOSEPHINE_MCP_BREAKER_COOLDOWN_MS";
pub const ENV_WRITES_ENABLED: &str = "JOSEPHINE_MCP_WRITES_ENABLED";
pub const ENV_IDEMPOTENCY_FAIL_MODE: &str = "JOSEPHINE_MCP_IDEMPOTENCY_FAIL_MODE";

/// Circuit-breaker tunables. Construct through [`BreakerConfig::new`] so the
/// floors are always applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    threshold: u32,
    window: Duration,
    cooldown: Duration,
}

impl BreakerConfig {
    /// Build a config, clamping each value to its floor.
    pub fn new(threshold: u32, window_ms: u64, cooldown_ms: u64) -> Self {
        Self {
            threshold: threshold.max(MIN_BREAKER_THRESHOLD),
            window: Duration::from_millis(window_ms.max(MIN_BREAKER_DURATION_MS)),
            cooldown: Duration::from_millis(cooldown_ms.max(MIN_BREAKER_DURATION_MS)),
        }
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::new(
            DEFAULT_BREAKER_THRESHOLD,
            DEFAULT_BREAKER_WINDOW_MS,
            DEFAULT_BREAKER_COOLDOWN_MS,
        )
    }
}

/// What to do when the idempotency store cannot be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdempotencyFailMode {
    /// Let the write proceed without dedup (availability first).
    #[default]
    Open,
    /// Reject the write with an upstream error (consistency first).
    Closed,
}

impl FromStr for IdempotencyFailMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "closed" => Ok(Self::Closed),
            other => Err(format!("expected \"open\" or \"closed\", got \"{other}\"")),
        }
    }
}

/// Everything the write guard needs, resolved once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardConfig {
    pub breaker: BreakerConfig,
    pub writes_enabled: bool,
    pub idempotency_fail_mode: IdempotencyFailMode,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            breaker: BreakerConfig::default(),
            writes_enabled: false,
            idempotency_fail_mode: IdempotencyFailMode::Open,
        }
    }
}

impl GuardConfig {
    /// Reads configuration from environment variables.
    ///
    /// | Variable                              | Default | Floor |
    /// |---------------------------------------|---------|-------|
    /// | `JOSEPHINE_MCP_BREAKER_THRESHOLD`     | `10`    | `1`   |
    /// | `JOSEPHINE_MCP_BREAKER_WINDOW_MS`     | `60000` | `1000`|
    /// | `JOSEPHINE_MCP_BREAKER_COOLDOWN_MS`   | `60000` | `1000`|
    /// | `JOSEPHINE_MCP_WRITES_ENABLED`        | `false` |       |
    /// | `JOSEPHINE_MCP_IDEMPOTENCY_FAIL_MODE` | `open`  |       |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve the config through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let threshold = parse_or(&lookup, ENV_BREAKER_THRESHOLD, DEFAULT_BREAKER_THRESHOLD)?;
        let window_ms = parse_or(&lookup, ENV_BREAKER_WINDOW_MS, DEFAULT_BREAKER_WINDOW_MS)?;
        let cooldown_ms = parse_or(&lookup, ENV_BREAKER_COOLDOWN_MS, DEFAULT_BREAKER_COOLDOWN_MS)?;

        let writes_enabled = match lookup(ENV_WRITES_ENABLED) {
            Some(raw) => parse_bool(ENV_WRITES_ENABLED, &raw)?,
            None => false,
        };
        let idempotency_fail_mode =
            parse_or(&lookup, ENV_IDEMPOTENCY_FAIL_MODE, IdempotencyFailMode::Open)?;

        Ok(Self {
            breaker: BreakerConfig::new(threshold, window_ms, cooldown_ms),
            writes_enabled,
            idempotency_fail_mode,
        })
    }
}

/// Parse `key` with `FromStr`, falling back to `default` when unset or blank.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: raw.clone(),
                    reason: e.to_string(),
                })
        }
        _ => Ok(default),
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
