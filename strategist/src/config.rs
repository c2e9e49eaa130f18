//! Strategist configuration.
//!
//! Loaded from TOML or YAML (chosen by file extension). Every field has a
//! default, so a missing file or a partial one is fine. Credentials are never
//! stored here, only the names of the environment variables holding them.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use cc_agent::backend::{AnthropicBackend, HuggingFaceBackend, OpenAiBackend};
use cc_agent::{LlmBackend, ServiceConfig};
use ideaspace::{ContextPolicy, LifecyclePolicy};

use crate::error::{Result, StrategistError};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategistConfig {
    /// Reasoning model
    pub reasoning: ReasoningConfig,
    /// Calibrated forecaster
    pub forecaster: ForecasterConfig,
    /// Automatic promotion
    pub lifecycle: LifecyclePolicy,
    /// Signal fusion
    pub fusion: FusionConfig,
    /// Context discovery
    pub context: ContextPolicy,
    /// Record storage
    pub store: StoreConfig,
    /// Process-wide settings
    pub general: GeneralConfig,
}

/// Which API the reasoning model speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Anthropic,
    OpenAi,
}

/// Reasoning model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    pub provider: Provider,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the API key
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub timeout_ms: u64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Anthropic,
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            max_tokens: 1024,
            temperature: None,
            timeout_ms: 60_000,
        }
    }
}

/// Calibrated forecaster configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecasterConfig {
    pub enabled: bool,
    pub base_url: String,
    pub model: String,
    /// Environment variable holding the access token
    pub token_env: String,
    pub max_new_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api-inference.huggingface.co/models".to_string(),
            model: "nikhilchandak/OpenForecaster-8B".to_string(),
            token_env: "HUGGINGFACE_TOKEN".to_string(),
            max_new_tokens: 1024,
            temperature: 0.3,
            timeout_ms: 30_000,
        }
    }
}

/// Fusion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Gap between the two signals that is reported as divergence
    pub divergence_threshold: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            divergence_threshold: cc_agent::fusion::DEFAULT_DIVERGENCE_THRESHOLD,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot the CLI loads and saves between invocations
    pub snapshot_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: PathBuf::from("commandcenter.json"),
        }
    }
}

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Default tracing directive when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "strategist=info,cc_agent=info".to_string(),
        }
    }
}

impl StrategistConfig {
    /// Parse from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| StrategistError::Config(e.to_string()))
    }

    /// Parse from TOML.
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| StrategistError::Config(e.to_string()))
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| StrategistError::Config(e.to_string()))
    }

    /// Load from a file, or fall back to defaults when it does not exist.
    ///
    /// `.yaml`/`.yml` files are read as YAML, anything else as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            info!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| StrategistError::Config(format!("{}: {}", path.display(), e)))?;

        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content)?,
            _ => Self::from_toml(&content)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(StrategistError::Config(format!("{name} must lie in [0, 1], got {value}")))
            }
        };
        unit("lifecycle.promotion_threshold", self.lifecycle.promotion_threshold)?;
        unit("fusion.divergence_threshold", self.fusion.divergence_threshold)?;

        if self.context.depth_target == 0 {
            return Err(StrategistError::Config("context.depth_target must be at least 1".into()));
        }
        if self.reasoning.timeout_ms == 0 || self.forecaster.timeout_ms == 0 {
            return Err(StrategistError::Config("timeouts must be positive".into()));
        }
        Ok(())
    }

    /// Settings for the validation service.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            estimate_timeout_ms: self.forecaster.timeout_ms,
            reasoning_timeout_ms: self.reasoning.timeout_ms,
            reasoning_max_tokens: self.reasoning.max_tokens,
            reasoning_temperature: self.reasoning.temperature,
            forecaster_max_tokens: self.forecaster.max_new_tokens,
            forecaster_temperature: self.forecaster.temperature,
            divergence_threshold: self.fusion.divergence_threshold,
        }
    }

    /// Build the reasoning backend. A missing key is logged; calls will then
    /// fail as unavailable.
    pub fn reasoning_backend(&self) -> Result<Arc<dyn LlmBackend>> {
        let key = read_secret(&self.reasoning.api_key_env);
        if key.is_none() {
            warn!(env = %self.reasoning.api_key_env, "Reasoning API key not set");
        }

        let backend: Arc<dyn LlmBackend> = match self.reasoning.provider {
            Provider::Anthropic => Arc::new(AnthropicBackend::new(
                &self.reasoning.base_url,
                &self.reasoning.model,
                key,
            )?),
            Provider::OpenAi => Arc::new(OpenAiBackend::new(
                &self.reasoning.base_url,
                &self.reasoning.model,
                key,
            )?),
        };
        Ok(backend)
    }

    /// Build the forecaster backend, or `None` when disabled or without a
    /// token. Validation then runs reasoning-only.
    pub fn forecaster_backend(&self) -> Result<Option<Arc<dyn LlmBackend>>> {
        if !self.forecaster.enabled {
            return Ok(None);
        }
        let Some(token) = read_secret(&self.forecaster.token_env) else {
            info!(env = %self.forecaster.token_env, "Forecaster token not set, calibration disabled");
            return Ok(None);
        };

        let backend = HuggingFaceBackend::new(
            &self.forecaster.base_url,
            &self.forecaster.model,
            Some(token),
        )?;
        Ok(Some(Arc::new(backend)))
    }
}

fn read_secret(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaspace::IdeaStatus;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = StrategistConfig::default();
        assert_eq!(config.reasoning.provider, Provider::Anthropic);
        assert_eq!(config.forecaster.model, "nikhilchandak/OpenForecaster-8B");
        assert_eq!(config.forecaster.timeout_ms, 30_000);
        assert_eq!(config.lifecycle.promotion_threshold, 0.5);
        assert_eq!(config.context.max_questions, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = StrategistConfig::default();
        let yaml = config.to_yaml().unwrap();
        let parsed = StrategistConfig::from_yaml(&yaml).unwrap();
        assert_eq!(parsed.reasoning.model, config.reasoning.model);
        assert_eq!(parsed.store.snapshot_path, config.store.snapshot_path);
    }

    #[test]
    fn test_partial_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[reasoning]\nprovider = \"openai\"\nbase_url = \"http://localhost:11434/v1\"\n\n[lifecycle]\npromotion_threshold = 0.65\n"
        )
        .unwrap();

        let config = StrategistConfig::load(file.path()).unwrap();
        assert_eq!(config.reasoning.provider, Provider::OpenAi);
        assert_eq!(config.reasoning.base_url, "http://localhost:11434/v1");
        assert_eq!(config.reasoning.timeout_ms, 60_000);
        assert_eq!(config.lifecycle.promotion_threshold, 0.65);
        assert_eq!(config.fusion.divergence_threshold, 0.25);
    }

    #[test]
    fn test_yaml_file_by_extension() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "forecaster:\n  enabled: false\ncontext:\n  max_questions: 3\n").unwrap();

        let config = StrategistConfig::load(file.path()).unwrap();
        assert!(!config.forecaster.enabled);
        assert_eq!(config.context.max_questions, 3);
        assert!(config.forecaster_backend().unwrap().is_none());
    }

    #[test]
    fn test_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = StrategistConfig::load(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.general.log_level, "strategist=info,cc_agent=info");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[fusion]\ndivergence_threshold = 1.5\n").unwrap();
        assert!(matches!(
            StrategistConfig::load(file.path()),
            Err(StrategistError::Config(_))
        ));

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[reasoning\nmodel = ").unwrap();
        assert!(StrategistConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_promotion_ceiling_is_not_configurable() {
        for ceiling in ["task", "resonance"] {
            let text = format!("[lifecycle]\npromotion_ceiling = \"{ceiling}\"\n");
            assert!(matches!(
                StrategistConfig::from_toml(&text),
                Err(StrategistError::Config(_))
            ));
        }
        assert!(StrategistConfig::from_yaml("lifecycle:\n  promotion_ceiling: task\n").is_err());

        let config = StrategistConfig::from_toml("[lifecycle]\npromotion_threshold = 0.0\n").unwrap();
        assert_eq!(
            config.lifecycle.promotion_for(IdeaStatus::Hypothesis, 0.9),
            None
        );
        assert_eq!(
            config.lifecycle.promotion_for(IdeaStatus::Idea, 0.62),
            Some(IdeaStatus::Hypothesis)
        );
    }

    #[test]
    fn test_service_config_mapping() {
        let mut config = StrategistConfig::default();
        config.forecaster.timeout_ms = 5_000;
        config.fusion.divergence_threshold = 0.4;

        let service = config.service_config();
        assert_eq!(service.estimate_timeout_ms, 5_000);
        assert_eq!(service.divergence_threshold, 0.4);
        assert_eq!(service.forecaster_temperature, 0.3);
    }
}
