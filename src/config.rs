/*!
 * Configuration types for hookguard
 */

use hookguard_core_resilience::CircuitBreakerConfig;
use hookguard_events::BusConfig;
use hookguard_lifecycle::LifecycleConfig;
use hookguard_sentinel::{FreshnessPolicy, HeartbeatPolicy, NotificationPolicy, RecoveryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GuardError, Result};

/// Default config file name looked up in the repository root
pub const CONFIG_FILE_NAME: &str = "hookguard.toml";

/// Main configuration for the guard
///
/// Every section is optional in TOML; missing sections and keys take their
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
    pub bus: BusConfig,
    pub lifecycle: LifecycleConfig,
    pub breaker: BreakerSettings,
    pub recovery: RecoveryPolicy,
    pub freshness: FreshnessPolicy,
    pub heartbeat: HeartbeatPolicy,
    pub notifications: NotificationPolicy,
}

/// Log output settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,

    /// Log file path (None = stdout). File output is JSON.
    pub file: Option<PathBuf>,

    /// Shorthand for level = debug
    pub verbose: bool,
}

/// Where the guard keeps its own state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for persisted records such as the lifecycle state
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".audit_tmp"),
        }
    }
}

/// Circuit breaker settings shared by the guarded dependencies
///
/// The refresh breaker uses `freshness.refresh_timeout_ms` as its call timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    /// Consecutive failures before the circuit opens
    pub failure_threshold: u32,

    /// How long an open circuit rejects calls
    pub reset_timeout_ms: u64,

    /// Deadline for each guarded call
    pub call_timeout_ms: u64,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            reset_timeout_ms: defaults.reset_timeout.as_millis() as u64,
            call_timeout_ms: defaults.call_timeout.as_millis() as u64,
        }
    }
}

impl BreakerSettings {
    pub fn to_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: Duration::from_millis(self.reset_timeout_ms),
            call_timeout: Duration::from_millis(self.call_timeout_ms),
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be at least 1".to_string());
        }
        if self.reset_timeout_ms == 0 {
            return Err("reset_timeout_ms must be greater than 0".to_string());
        }
        if self.call_timeout_ms == 0 {
            return Err("call_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl GuardConfig {
    /// Load configuration from a TOML file and validate it
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| GuardError::io(path, e))?;
        let config: GuardConfig = toml::from_str(&contents)
            .map_err(|e| GuardError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `<repo_root>/hookguard.toml` if present, defaults otherwise
    pub fn discover(repo_root: &Path) -> Result<Self> {
        let path = repo_root.join(CONFIG_FILE_NAME);
        if path.is_file() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| GuardError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, contents).map_err(|e| GuardError::io(path, e))
    }

    /// Reject values the components cannot run with
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("bus", self.bus.validate()),
            ("lifecycle", self.lifecycle.validate()),
            ("breaker", self.breaker.validate()),
            ("recovery", self.recovery.validate()),
            ("freshness", self.freshness.validate()),
            ("heartbeat", self.heartbeat.validate()),
            ("notifications", self.notifications.validate()),
        ];
        for (section, check) in checks {
            check.map_err(|msg| GuardError::Config(format!("[{}] {}", section, msg)))?;
        }
        Ok(())
    }

    /// Make every relative path absolute against `repo_root`
    pub fn resolve_paths(mut self, repo_root: &Path) -> Self {
        let resolve = |path: &mut PathBuf| {
            if path.is_relative() {
                *path = repo_root.join(&*path);
            }
        };

        resolve(&mut self.storage.state_dir);
        resolve(&mut self.recovery.restart_script);
        resolve(&mut self.freshness.artifact);
        resolve(&mut self.heartbeat.path);
        if let Some(script) = self.freshness.update_script.as_mut() {
            resolve(script);
        }
        if let Some(file) = self.logging.file.as_mut() {
            resolve(file);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = GuardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.recovery.max_attempts, 5);
        assert_eq!(config.freshness.threshold_seconds, 180);
        assert_eq!(config.bus.max_processed, 500);
        assert_eq!(config.breaker.to_config().reset_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let toml_str = r#"
            [logging]
            level = "debug"

            [recovery]
            max_attempts = 3

            [freshness]
            threshold_seconds = 600
            platforms = ["1", "3"]
        "#;

        let config: GuardConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.recovery.max_attempts, 3);
        assert_eq!(config.recovery.base_backoff_ms, 2000);
        assert_eq!(config.freshness.threshold_seconds, 600);
        assert_eq!(config.freshness.platforms, vec!["1", "3"]);
        assert_eq!(config.heartbeat, HeartbeatPolicy::default());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);

        let mut config = GuardConfig::default();
        config.breaker.failure_threshold = 3;
        config.notifications.cooldowns.insert("custom".into(), 1_000);
        config.save_to_file(&path).unwrap();

        let loaded = GuardConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(GuardConfig::discover(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_invalid_values_are_configuration_errors() {
        let mut config = GuardConfig::default();
        config.recovery.jitter = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("[recovery]"));
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);

        let mut config = GuardConfig::default();
        config.breaker.failure_threshold = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[recovery\nmax_attempts = ").unwrap();
        let err = GuardConfig::from_file(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);

        let missing = GuardConfig::from_file(&dir.path().join("nope.toml")).unwrap_err();
        assert_eq!(missing.kind(), crate::error::ErrorKind::Io);
    }

    #[test]
    fn test_resolve_paths() {
        let config = GuardConfig::default().resolve_paths(Path::new("/repo"));
        assert_eq!(config.storage.state_dir, PathBuf::from("/repo/.audit_tmp"));
        assert_eq!(config.freshness.artifact, PathBuf::from("/repo/.AI_EVIDENCE.json"));
        assert_eq!(
            config.heartbeat.path,
            PathBuf::from("/repo/.audit_tmp/guard-heartbeat.json")
        );
        assert_eq!(config.freshness.update_script, None);

        let mut absolute = GuardConfig::default();
        absolute.recovery.restart_script = PathBuf::from("/opt/guard/start.sh");
        let absolute = absolute.resolve_paths(Path::new("/repo"));
        assert_eq!(absolute.recovery.restart_script, PathBuf::from("/opt/guard/start.sh"));
    }
}
