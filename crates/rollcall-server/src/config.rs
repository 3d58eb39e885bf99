use rollcall_cache::{CacheError, TtlPolicy, TtlTier};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheSettings,
    /// Per-user request rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    /// Out-of-band attendance notices
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default derived via field defaults

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Cache validation
        self.cache
            .ttl_policy()
            .map_err(|e| format!("cache.ttl: {e}"))?;
        if self.cache.utc_offset_minutes.abs() >= 24 * 60 {
            return Err("cache.utc_offset_minutes must be within +/-1439".into());
        }
        if self.cache.max_entries == 0 {
            return Err("cache.max_entries must be > 0".into());
        }
        if self.cache.cleanup_interval_secs == 0 {
            return Err("cache.cleanup_interval_secs must be > 0".into());
        }
        // Rate limit validation
        if self.rate_limit.enabled {
            if self.rate_limit.capacity == 0 {
                return Err("rate_limit.capacity must be > 0".into());
            }
            if !(self.rate_limit.refill_per_sec.is_finite() && self.rate_limit.refill_per_sec > 0.0)
            {
                return Err("rate_limit.refill_per_sec must be > 0".into());
            }
        }
        // Notifications validation
        if self.notifications.enabled
            && self
                .notifications
                .webhook_url
                .as_deref()
                .unwrap_or("")
                .is_empty()
        {
            return Err("notifications.enabled=true requires notifications.webhook_url".into());
        }
        if self.notifications.timeout_ms == 0 {
            return Err("notifications.timeout_ms must be > 0".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8080
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// When false every read goes straight to the store
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// School timezone as minutes east of UTC; decides when the creation day rolls over
    #[serde(default)]
    pub utc_offset_minutes: i32,

    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,

    /// Interval of the background sweep of expired entries
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    #[serde(default)]
    pub ttl: TtlSettings,
}

fn default_true() -> bool {
    true
}
fn default_cache_max_entries() -> usize {
    10_000
}
fn default_cleanup_interval_secs() -> u64 {
    60
}

impl CacheSettings {
    pub fn ttl_policy(&self) -> Result<TtlPolicy, CacheError> {
        TtlPolicy::from_secs(self.ttl.short, self.ttl.standard, self.ttl.long)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            utc_offset_minutes: 0,
            max_entries: default_cache_max_entries(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            ttl: TtlSettings::default(),
        }
    }
}

/// TTL per tier, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtlSettings {
    #[serde(default = "default_short_ttl")]
    pub short: u64,
    #[serde(default = "default_standard_ttl")]
    pub standard: u64,
    #[serde(default = "default_long_ttl")]
    pub long: u64,
}

fn default_short_ttl() -> u64 {
    TtlTier::Short.default_secs()
}
fn default_standard_ttl() -> u64 {
    TtlTier::Standard.default_secs()
}
fn default_long_ttl() -> u64 {
    TtlTier::Long.default_secs()
}

impl Default for TtlSettings {
    fn default() -> Self {
        Self {
            short: default_short_ttl(),
            standard: default_standard_ttl(),
            long: default_long_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Burst size per user
    #[serde(default = "default_rate_capacity")]
    pub capacity: u32,
    #[serde(default = "default_refill_per_sec")]
    pub refill_per_sec: f64,
}

fn default_rate_capacity() -> u32 {
    60
}
fn default_refill_per_sec() -> f64 {
    1.0
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capacity: default_rate_capacity(),
            refill_per_sec: default_refill_per_sec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StorageConfig {
    /// JSON file with initial sections and students
    #[serde(default)]
    pub seed_file: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// When false notices are only logged
    #[serde(default)]
    pub enabled: bool,
    /// URL of the hosted push function
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_notification_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_notification_timeout_ms() -> u64 {
    5000
}

impl NotificationsConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: None,
            api_key: None,
            webhook_secret: None,
            timeout_ms: default_notification_timeout_ms(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Default configuration file, relative to the working directory.
    pub const DEFAULT_CONFIG_PATH: &str = "rollcall.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or(DEFAULT_CONFIG_PATH));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., ROLLCALL__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("ROLLCALL")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        // Validate
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.cache.ttl.short, 30);
        assert_eq!(cfg.cache.ttl.standard, 60);
        assert_eq!(cfg.cache.ttl.long, 300);
        assert_eq!(cfg.addr().port(), 8080);
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.cache.ttl.short = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.starts_with("cache.ttl"), "{err}");
    }

    #[test]
    fn offset_must_be_within_a_day() {
        let mut cfg = AppConfig::default();
        cfg.cache.utc_offset_minutes = 8 * 60;
        assert!(cfg.validate().is_ok());
        cfg.cache.utc_offset_minutes = -24 * 60;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn enabled_notifications_need_a_url() {
        let mut cfg = AppConfig::default();
        cfg.notifications.enabled = true;
        assert!(cfg.validate().is_err());
        cfg.notifications.webhook_url = Some("https://push.example.test/notify".into());
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rate_limit_checked_only_when_enabled() {
        let mut cfg = AppConfig::default();
        cfg.rate_limit.refill_per_sec = 0.0;
        assert!(cfg.validate().is_ok());
        cfg.rate_limit.enabled = true;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn invalid_log_level_is_rejected() {
        let mut cfg = AppConfig::default();
        cfg.logging.level = "verbose".into();
        assert!(cfg.validate().is_err());
    }
}
