//! Configuration loading and scorer factory.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use mockprep_core::config::EngineConfig;
use mockprep_core::error::EngineError;
use mockprep_core::scoring::ScoreWeights;
use mockprep_core::traits::Scorer;

use crate::anthropic::AnthropicScorer;
use crate::mock::MockScorer;
use crate::ollama::OllamaScorer;
use crate::openai::OpenAiScorer;

pub const CONFIG_FILE_NAME: &str = "mockprep.toml";

/// Configuration for a single scorer backend.
///
/// `Debug` masks API keys.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProviderConfig {
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        org_id: Option<String>,
    },
    Anthropic {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
    },
    /// Offline heuristic scorer.
    Mock,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderConfig::OpenAI {
                base_url, org_id, ..
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("org_id", org_id)
                .finish(),
            ProviderConfig::Anthropic { base_url, .. } => f
                .debug_struct("Anthropic")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Ollama { base_url } => f
                .debug_struct("Ollama")
                .field("base_url", base_url)
                .finish(),
            ProviderConfig::Mock => f.write_str("Mock"),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

/// The `[engine]` table: tunables for evaluation, coaching and memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    pub weights: ScoreWeights,
    pub scorer_timeout_secs: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_weak_skills: usize,
    pub cross_difficulty_fallback: bool,
    pub system_prompt: Option<String>,
}

impl Default for EngineSection {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            weights: engine.weights,
            scorer_timeout_secs: engine.scorer_timeout.as_secs(),
            max_retries: engine.max_retries,
            retry_delay_ms: engine.retry_delay.as_millis() as u64,
            max_tokens: engine.max_tokens,
            temperature: engine.temperature,
            top_weak_skills: engine.top_weak_skills,
            cross_difficulty_fallback: engine.cross_difficulty_fallback,
            system_prompt: engine.system_prompt_override,
        }
    }
}

/// Top-level mockprep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MockprepConfig {
    /// Provider configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default = "default_provider")]
    pub default_provider: String,
    #[serde(default = "default_model")]
    pub default_model: String,
    /// Where `run` writes session reports.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub engine: EngineSection,
}

fn default_provider() -> String {
    "mock".to_string()
}
fn default_model() -> String {
    "mock-scorer".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./mockprep-sessions")
}

impl Default for MockprepConfig {
    fn default() -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider(),
            default_model: default_model(),
            output_dir: default_output_dir(),
            engine: EngineSection::default(),
        }
    }
}

impl MockprepConfig {
    /// Build a validated [`EngineConfig`], using `model` in place of the
    /// configured default when given.
    pub fn engine_config(&self, model: Option<&str>) -> Result<EngineConfig, EngineError> {
        let section = &self.engine;
        let config = EngineConfig {
            weights: section.weights,
            scorer_timeout: Duration::from_secs(section.scorer_timeout_secs),
            max_retries: section.max_retries,
            retry_delay: Duration::from_millis(section.retry_delay_ms),
            model: model.unwrap_or(&self.default_model).to_string(),
            max_tokens: section.max_tokens,
            temperature: section.temperature,
            system_prompt_override: section.system_prompt.clone(),
            top_weak_skills: section.top_weak_skills,
            cross_difficulty_fallback: section.cross_difficulty_fallback,
        };
        config.validate()?;
        Ok(config)
    }

    /// Look up a provider by name.
    ///
    /// `mock` and `ollama` work without an entry in the file; remote
    /// providers need an API key and must be configured.
    pub fn provider(&self, name: &str) -> Result<ProviderConfig> {
        if let Some(config) = self.providers.get(name) {
            return Ok(config.clone());
        }
        match name {
            "mock" => Ok(ProviderConfig::Mock),
            "ollama" => Ok(ProviderConfig::Ollama {
                base_url: default_ollama_url(),
            }),
            _ => anyhow::bail!(
                "provider '{name}' is not configured (add [providers.{name}] to {CONFIG_FILE_NAME})"
            ),
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(len) = result[start..].find('}') else {
            break;
        };
        let value = std::env::var(&result[start + 2..start + len]).unwrap_or_default();
        result.replace_range(start..start + len + 1, &value);
    }
    result
}

fn resolve_provider_config(config: ProviderConfig) -> ProviderConfig {
    match config {
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => ProviderConfig::OpenAI {
            api_key: resolve_env_vars(&api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
            org_id: org_id.as_deref().map(resolve_env_vars),
        },
        ProviderConfig::Anthropic { api_key, base_url } => ProviderConfig::Anthropic {
            api_key: resolve_env_vars(&api_key),
            base_url: base_url.as_deref().map(resolve_env_vars),
        },
        ProviderConfig::Ollama { base_url } => ProviderConfig::Ollama {
            base_url: resolve_env_vars(&base_url),
        },
        ProviderConfig::Mock => ProviderConfig::Mock,
    }
}

/// Put API keys from the environment into the provider table, creating the
/// entry when the file has none.
fn apply_key_overrides(
    config: &mut MockprepConfig,
    anthropic_key: Option<String>,
    openai_key: Option<String>,
) {
    if let Some(key) = anthropic_key {
        match config.providers.get_mut("anthropic") {
            Some(ProviderConfig::Anthropic { api_key, .. }) => *api_key = key,
            _ => {
                config.providers.insert(
                    "anthropic".into(),
                    ProviderConfig::Anthropic {
                        api_key: key,
                        base_url: None,
                    },
                );
            }
        }
    }

    if let Some(key) = openai_key {
        match config.providers.get_mut("openai") {
            Some(ProviderConfig::OpenAI { api_key, .. }) => *api_key = key,
            _ => {
                config.providers.insert(
                    "openai".into(),
                    ProviderConfig::OpenAI {
                        api_key: key,
                        base_url: None,
                        org_id: None,
                    },
                );
            }
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `mockprep.toml` in the current directory
/// 2. `~/.config/mockprep/config.toml`
///
/// Environment variable overrides: `MOCKPREP_ANTHROPIC_KEY`, `MOCKPREP_OPENAI_KEY`.
pub fn load_config() -> Result<MockprepConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<MockprepConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() {
                Some(local)
            } else {
                global_config_path().filter(|p| p.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<MockprepConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => MockprepConfig::default(),
    };

    apply_key_overrides(
        &mut config,
        std::env::var("MOCKPREP_ANTHROPIC_KEY").ok(),
        std::env::var("MOCKPREP_OPENAI_KEY").ok(),
    );

    config.providers = config
        .providers
        .into_iter()
        .map(|(name, provider)| (name, resolve_provider_config(provider)))
        .collect();

    Ok(config)
}

fn global_config_path() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(|h| {
        PathBuf::from(h)
            .join(".config")
            .join("mockprep")
            .join("config.toml")
    })
}

/// Create a scorer from its configuration.
pub fn create_scorer(config: &ProviderConfig) -> Result<Arc<dyn Scorer>> {
    Ok(match config {
        ProviderConfig::Anthropic { api_key, base_url } => {
            if api_key.is_empty() {
                anyhow::bail!("anthropic api_key is empty (set MOCKPREP_ANTHROPIC_KEY)");
            }
            Arc::new(AnthropicScorer::new(api_key, base_url.clone()))
        }
        ProviderConfig::OpenAI {
            api_key,
            base_url,
            org_id,
        } => {
            if api_key.is_empty() {
                anyhow::bail!("openai api_key is empty (set MOCKPREP_OPENAI_KEY)");
            }
            Arc::new(OpenAiScorer::new(api_key, base_url.clone(), org_id.clone()))
        }
        ProviderConfig::Ollama { base_url } => Arc::new(OllamaScorer::new(base_url)),
        ProviderConfig::Mock => Arc::new(MockScorer::default()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_MOCKPREP_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_MOCKPREP_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_MOCKPREP_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        assert_eq!(resolve_env_vars("${_MOCKPREP_UNSET_VAR}"), "");
        assert_eq!(resolve_env_vars("${unterminated"), "${unterminated");
        std::env::remove_var("_MOCKPREP_TEST_VAR");
    }

    #[test]
    fn default_config() {
        let config = MockprepConfig::default();
        assert_eq!(config.default_provider, "mock");
        let engine = config.engine_config(None).unwrap();
        assert_eq!(engine.model, "mock-scorer");
        assert_eq!(engine.top_weak_skills, 5);
        assert_eq!(engine.weights, ScoreWeights::DEFAULT);
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
default_provider = "anthropic"
default_model = "claude-sonnet-4-20250514"

[providers.anthropic]
type = "anthropic"
api_key = "sk-test"

[providers.local]
type = "ollama"

[providers.offline]
type = "mock"

[engine]
scorer_timeout_secs = 10
max_retries = 4
top_weak_skills = 3
cross_difficulty_fallback = true

[engine.weights]
technical = 0.4
communication = 0.1
confidence = 0.1
logic = 0.2
depth = 0.2
"#;
        let config: MockprepConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.providers.len(), 3);
        assert!(matches!(
            config.providers.get("local"),
            Some(ProviderConfig::Ollama { base_url }) if base_url == "http://localhost:11434"
        ));
        assert!(matches!(
            config.providers.get("offline"),
            Some(ProviderConfig::Mock)
        ));

        let engine = config.engine_config(Some("claude-haiku-4-5-20251001")).unwrap();
        assert_eq!(engine.scorer_timeout, Duration::from_secs(10));
        assert_eq!(engine.max_retries, 4);
        assert_eq!(engine.top_weak_skills, 3);
        assert!(engine.cross_difficulty_fallback);
        assert_eq!(engine.model, "claude-haiku-4-5-20251001");
        // Untouched keys keep their defaults.
        assert_eq!(engine.max_tokens, EngineConfig::default().max_tokens);
    }

    #[test]
    fn weights_not_summing_to_one_are_rejected() {
        let toml_str = r#"
[engine.weights]
technical = 0.5
communication = 0.5
confidence = 0.5
logic = 0.0
depth = 0.0
"#;
        let config: MockprepConfig = toml::from_str(toml_str).unwrap();
        let err = config.engine_config(None).unwrap_err();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn debug_masks_api_keys() {
        let config = ProviderConfig::OpenAI {
            api_key: "sk-secret".into(),
            base_url: None,
            org_id: Some("org-1".into()),
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("sk-secret"));
        assert!(printed.contains("***"));
        assert!(printed.contains("org-1"));
    }

    #[test]
    fn key_overrides_create_or_replace_entries() {
        let mut config: MockprepConfig = toml::from_str(
            r#"
[providers.anthropic]
type = "anthropic"
api_key = "from-file"
base_url = "http://proxy"
"#,
        )
        .unwrap();

        apply_key_overrides(&mut config, Some("from-env".into()), Some("oa-env".into()));

        assert!(matches!(
            config.providers.get("anthropic"),
            Some(ProviderConfig::Anthropic { api_key, base_url: Some(url) })
                if api_key == "from-env" && url == "http://proxy"
        ));
        assert!(matches!(
            config.providers.get("openai"),
            Some(ProviderConfig::OpenAI { api_key, .. }) if api_key == "oa-env"
        ));
    }

    #[test]
    fn provider_lookup_falls_back_for_local_backends() {
        let config = MockprepConfig::default();
        assert!(matches!(config.provider("mock").unwrap(), ProviderConfig::Mock));
        assert!(matches!(
            config.provider("ollama").unwrap(),
            ProviderConfig::Ollama { .. }
        ));
        let err = config.provider("anthropic").unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }

    #[test]
    fn load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "default_provider = \"offline\"\n\n[providers.offline]\ntype = \"mock\"\n",
        )
        .unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.default_provider, "offline");
        let scorer = create_scorer(&config.provider("offline").unwrap()).unwrap();
        assert_eq!(scorer.name(), "mock");

        assert!(load_config_from(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let err = create_scorer(&ProviderConfig::Anthropic {
            api_key: String::new(),
            base_url: None,
        })
        .err()
        .unwrap();
        assert!(err.to_string().contains("MOCKPREP_ANTHROPIC_KEY"));
    }
}
