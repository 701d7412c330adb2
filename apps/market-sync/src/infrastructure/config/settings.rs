//! Market Sync Configuration Settings
//!
//! Configuration types for the sync service, loaded from environment
//! variables. Every setting has a default; a value that is present but
//! cannot be parsed is an error.

use std::time::Duration;

use crate::application::services::AlertGateConfig;

/// Largest accepted duration setting (one week).
pub const MAX_DURATION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Gateway connection settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    /// WebSocket URL (`ws://` or `wss://`).
    pub url: String,
    /// Delay unit for linear reconnect backoff.
    pub reconnect_base_delay: Duration,
    /// Maximum reconnection attempts before giving up.
    pub max_reconnect_attempts: u32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            url: "ws://127.0.0.1:8000/ws/market".to_string(),
            reconnect_base_delay: Duration::from_millis(3000),
            max_reconnect_attempts: 5,
        }
    }
}

/// Alert gate settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertSettings {
    /// Minimum time between two displays of the same alert.
    pub cooldown: Duration,
    /// Lifetime of a notification record.
    pub retention: Duration,
    /// Whether the display starts with permission granted.
    pub notifications_enabled: bool,
}

impl Default for AlertSettings {
    fn default() -> Self {
        Self {
            cooldown: Duration::from_secs(30),
            retention: Duration::from_secs(300),
            notifications_enabled: true,
        }
    }
}

impl From<&AlertSettings> for AlertGateConfig {
    fn from(settings: &AlertSettings) -> Self {
        Self {
            cooldown: settings.cooldown,
            retention: settings.retention,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// Status HTTP port (health, metrics, price reads).
    pub status_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { status_port: 8083 }
    }
}

/// Complete sync service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncConfig {
    /// Gateway connection settings.
    pub gateway: GatewaySettings,
    /// Alert gate settings.
    pub alerts: AlertSettings,
    /// Server port settings.
    pub server: ServerSettings,
    /// Symbols subscribed at startup.
    pub symbols: Vec<String>,
}

impl SyncConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Lookup(lookup);

        let gateway_defaults = GatewaySettings::default();
        let url = match env.get("MARKET_GATEWAY_URL") {
            Some(url) => validate_url("MARKET_GATEWAY_URL", url)?,
            None => gateway_defaults.url,
        };

        let gateway = GatewaySettings {
            url,
            reconnect_base_delay: env.duration_millis(
                "SYNC_RECONNECT_BASE_DELAY_MS",
                gateway_defaults.reconnect_base_delay,
            )?,
            max_reconnect_attempts: env.parse(
                "SYNC_MAX_RECONNECT_ATTEMPTS",
                gateway_defaults.max_reconnect_attempts,
            )?,
        };

        let alert_defaults = AlertSettings::default();
        let alerts = AlertSettings {
            cooldown: env.duration_secs("ALERT_COOLDOWN_SECS", alert_defaults.cooldown)?,
            retention: env.duration_secs("ALERT_RETENTION_SECS", alert_defaults.retention)?,
            notifications_enabled: env.bool(
                "NOTIFICATIONS_ENABLED",
                alert_defaults.notifications_enabled,
            )?,
        };

        let server = ServerSettings {
            status_port: env.parse("SYNC_STATUS_PORT", ServerSettings::default().status_port)?,
        };

        let symbols = env
            .get("MARKET_SYMBOLS")
            .map(|raw| parse_symbols(&raw))
            .unwrap_or_default();

        Ok(Self {
            gateway,
            alerts,
            server,
            symbols,
        })
    }
}

/// Configuration error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable could not be parsed.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Raw value.
        value: String,
        /// What was expected.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: &str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

// =============================================================================
// Parsing Helpers
// =============================================================================

struct Lookup<F>(F);

impl<F> Lookup<F>
where
    F: Fn(&str) -> Option<String>,
{
    /// Raw value, with unset and blank treated alike.
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> Result<T, ConfigError> {
        self.get(key).map_or(Ok(default), |raw| {
            raw.parse()
                .map_err(|_| ConfigError::invalid(key, &raw, "expected a non-negative integer"))
        })
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.get(key).map_or(Ok(default), |raw| {
            raw.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| ConfigError::invalid(key, &raw, "expected whole seconds"))
                .and_then(|d| within_limit(key, &raw, d))
        })
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        self.get(key).map_or(Ok(default), |raw| {
            raw.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| ConfigError::invalid(key, &raw, "expected whole milliseconds"))
                .and_then(|d| within_limit(key, &raw, d))
        })
    }

    fn bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        self.get(key).map_or(Ok(default), |raw| {
            match raw.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(ConfigError::invalid(key, &raw, "expected true or false")),
            }
        })
    }
}

fn within_limit(key: &str, raw: &str, duration: Duration) -> Result<Duration, ConfigError> {
    if duration > MAX_DURATION {
        Err(ConfigError::invalid(key, raw, "expected at most one week"))
    } else {
        Ok(duration)
    }
}

fn validate_url(key: &str, url: String) -> Result<String, ConfigError> {
    if url.starts_with("ws://") || url.starts_with("wss://") {
        Ok(url)
    } else {
        Err(ConfigError::invalid(key, &url, "expected a ws:// or wss:// URL"))
    }
}

fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
