use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::workflow::stages::{ApprovalStage, ConfigError, StagePlan};

/// Main configuration structure for signoff
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignoffConfig {
    /// Ordered approval stage definitions
    pub stages: Vec<StageSettings>,
    /// Notification boundary settings
    pub notifications: NotificationSettings,
    /// Snapshot storage settings for the CLI host
    pub storage: StorageSettings,
    /// Logging settings
    pub observability: ObservabilitySettings,
}

/// One configured approval stage, as written in `signoff.toml`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StageSettings {
    pub id: String,
    pub name: String,
    pub order: u32,
    pub approvers: Vec<String>,
    pub min_approvals: u32,
    #[serde(default)]
    pub optional: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationSettings {
    /// Emit notification events (log notifier) after transitions
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Path to the JSON store snapshot used between CLI invocations
    pub snapshot_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilitySettings {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit logs as JSON instead of human-readable lines
    pub json_logs: bool,
}

impl Default for SignoffConfig {
    fn default() -> Self {
        Self {
            stages: vec![
                StageSettings {
                    id: "content-review".to_string(),
                    name: "Content Review".to_string(),
                    order: 1,
                    approvers: vec!["reviewer".to_string()],
                    min_approvals: 1,
                    optional: false,
                },
                StageSettings {
                    id: "final-signoff".to_string(),
                    name: "Final Sign-off".to_string(),
                    order: 2,
                    approvers: vec!["manager".to_string()],
                    min_approvals: 1,
                    optional: false,
                },
            ],
            notifications: NotificationSettings { enabled: true },
            storage: StorageSettings {
                snapshot_path: ".signoff/items.json".to_string(),
            },
            observability: ObservabilitySettings {
                log_level: "info".to_string(),
                json_logs: false,
            },
        }
    }
}

impl SignoffConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (signoff.toml)
    /// 3. Environment variables (prefixed with SIGNOFF_)
    pub fn load() -> Result<Self> {
        let defaults = Config::try_from(&SignoffConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        if Path::new("signoff.toml").exists() {
            builder = builder.add_source(File::with_name("signoff"));
        }

        builder = builder.add_source(
            Environment::with_prefix("SIGNOFF")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let signoff_config: SignoffConfig = config.try_deserialize()?;
        Ok(signoff_config)
    }

    /// Build the validated stage plan. `ConfigError` here is fatal at
    /// startup: no coordinator can exist without a well-formed plan.
    pub fn build_plan(&self) -> Result<StagePlan, ConfigError> {
        let stages = self
            .stages
            .iter()
            .map(|s| ApprovalStage {
                id: s.id.clone(),
                name: s.name.clone(),
                order: s.order,
                required_approvers: s.approvers.iter().cloned().collect(),
                min_approvals: s.min_approvals,
                optional: s.optional,
            })
            .collect();
        StagePlan::new(stages)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<SignoffConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = SignoffConfig::load_env_file();
        SignoffConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static SignoffConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

/// Initialize configuration (called at startup)
pub fn init_config() -> Result<()> {
    let config = config()?;
    // Surface stage misconfiguration immediately rather than at first use.
    config.build_plan()?;
    tracing::info!(stages = config.stages.len(), "Configuration loaded successfully");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_builds_valid_plan() {
        let config = SignoffConfig::default();
        let plan = config.build_plan().expect("default plan is valid");
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.ordered_stages()[0].id, "content-review");
    }

    #[test]
    fn test_misconfigured_quorum_fails_plan_build() {
        let mut config = SignoffConfig::default();
        config.stages[0].min_approvals = 5;
        let err = config.build_plan().unwrap_err();
        assert!(matches!(err, ConfigError::QuorumTooLarge { .. }));
    }

    #[test]
    fn test_global_accessor_serves_loaded_config() {
        // No signoff.toml in the test environment, so the defaults apply.
        init_config().expect("init succeeds");
        let loaded = config().expect("global config available");
        assert!(!loaded.stages.is_empty());
        assert!(loaded.build_plan().is_ok());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = SignoffConfig::default();
        let text = toml::to_string_pretty(&config).expect("serialize");
        let parsed: SignoffConfig = toml::from_str(&text).expect("parse");
        assert_eq!(parsed.stages.len(), config.stages.len());
        assert_eq!(parsed.storage.snapshot_path, config.storage.snapshot_path);
    }
}
