//! Configuration for model access, workflow limits, logging and tools.
//!
//! Configuration is read from a TOML file whose sections mirror the structs
//! below; every field has a default, so an empty file is valid. Credentials
//! and a few common settings can be overridden from the environment.

use crate::errors::ConfigError;
use crate::llm::DEFAULT_MAX_TOOL_ROUNDS;
use crate::stages::TestTarget;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the API key. Takes precedence over the file.
pub const ENV_API_KEY: &str = "TESTFLOW_API_KEY";
/// Fallback API key variable, used only when no key is configured.
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Environment variable overriding the model name.
pub const ENV_MODEL: &str = "TESTFLOW_MODEL";
/// Environment variable overriding the endpoint URL.
pub const ENV_ENDPOINT: &str = "TESTFLOW_ENDPOINT";

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestflowConfig {
    /// Model endpoint settings.
    #[serde(default)]
    pub llm: LlmConfig,
    /// Workflow limits and persistence.
    #[serde(default)]
    pub workflow: WorkflowConfig,
    /// Language and libraries the tests target.
    #[serde(default)]
    pub target: TestTarget,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Project tools offered to the analysis stages.
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl TestflowConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed input.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Applies overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_from(|key| std::env::var(key).ok());
    }

    /// Applies overrides from a variable lookup. Blank values are ignored.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.llm.api_key = Some(key);
        } else if self.llm.api_key.is_none() {
            self.llm.api_key = get(ENV_OPENAI_API_KEY);
        }
        if let Some(model) = get(ENV_MODEL) {
            self.llm.model = model;
        }
        if let Some(endpoint) = get(ENV_ENDPOINT) {
            self.llm.endpoint = endpoint;
        }
    }

    /// Checks that values are in range.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if !self.llm.endpoint.starts_with("http://") && !self.llm.endpoint.starts_with("https://") {
            return invalid("llm.endpoint must be an http(s) URL");
        }
        if self.llm.model.trim().is_empty() {
            return invalid("llm.model must not be empty");
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return invalid("llm.temperature must be between 0 and 2");
        }
        if self.llm.timeout_secs == 0 {
            return invalid("llm.timeout_secs must be positive");
        }
        if self.llm.max_tool_rounds == 0 {
            return invalid("llm.max_tool_rounds must be positive");
        }
        if self.workflow.stage_timeout_seconds == Some(0) {
            return invalid("workflow.stage_timeout_seconds must be positive when set");
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return invalid("logging.level must be one of trace, debug, info, warn, error");
        }
        if self.tools.source_extension.trim_start_matches('.').is_empty() {
            return invalid("tools.source_extension must not be empty");
        }
        Ok(())
    }

    /// Sets the model configuration.
    #[must_use]
    pub fn with_llm(mut self, llm: LlmConfig) -> Self {
        self.llm = llm;
        self
    }

    /// Sets the workflow configuration.
    #[must_use]
    pub fn with_workflow(mut self, workflow: WorkflowConfig) -> Self {
        self.workflow = workflow;
        self
    }

    /// Sets the test target.
    #[must_use]
    pub fn with_target(mut self, target: TestTarget) -> Self {
        self.target = target;
        self
    }

    /// Sets the tools configuration.
    #[must_use]
    pub fn with_tools(mut self, tools: ToolsConfig) -> Self {
        self.tools = tools;
        self
    }
}

/// Loads, overrides and validates a configuration file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
pub fn load_config(path: &Path) -> Result<TestflowConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let mut config = TestflowConfig::from_toml_str(&text)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Model endpoint settings (OpenAI-compatible chat completions).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Full URL of the chat-completions endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Bearer token. Never serialized.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Default sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// HTTP request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Maximum tool-call rounds per stage.
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_tool_rounds() -> usize {
    DEFAULT_MAX_TOOL_ROUNDS
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
            max_tool_rounds: default_max_tool_rounds(),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_tool_rounds", &self.max_tool_rounds)
            .finish()
    }
}

impl LlmConfig {
    /// Sets the endpoint URL.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the tool round limit.
    #[must_use]
    pub const fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }
}

/// Workflow limits and persistence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Per-stage timeout in seconds. `None` disables the timeout.
    #[serde(default)]
    pub stage_timeout_seconds: Option<u64>,
    /// Directory for file checkpoints. `None` keeps checkpoints in memory.
    #[serde(default)]
    pub checkpoint_dir: Option<PathBuf>,
}

impl WorkflowConfig {
    /// Returns the per-stage timeout.
    #[must_use]
    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_seconds.map(Duration::from_secs)
    }

    /// Sets the per-stage timeout.
    #[must_use]
    pub const fn with_stage_timeout_seconds(mut self, seconds: u64) -> Self {
        self.stage_timeout_seconds = Some(seconds);
        self
    }

    /// Sets the checkpoint directory.
    #[must_use]
    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Fallback level when `RUST_LOG` is not set.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

/// Project tools offered to the analysis stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Whether the stages get tools at all.
    #[serde(default = "default_tools_enabled")]
    pub enabled: bool,
    /// Root of the project the source file belongs to.
    #[serde(default)]
    pub project_root: Option<PathBuf>,
    /// Extension of source files searched by the context tools.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,
}

fn default_tools_enabled() -> bool {
    true
}

fn default_source_extension() -> String {
    "java".to_string()
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enabled: default_tools_enabled(),
            project_root: None,
            source_extension: default_source_extension(),
        }
    }
}

impl ToolsConfig {
    /// Sets the project root.
    #[must_use]
    pub fn with_project_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.project_root = Some(root.into());
        self
    }

    /// Returns the project root when tools are enabled and a root is set.
    #[must_use]
    pub fn active_root(&self) -> Option<&Path> {
        self.project_root.as_deref().filter(|_| self.enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = TestflowConfig::from_toml_str("").unwrap();
        assert_eq!(config, TestflowConfig::default());
        assert_eq!(config.llm.max_tool_rounds, DEFAULT_MAX_TOOL_ROUNDS);
        assert_eq!(config.workflow.stage_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parses_sections() {
        let config = TestflowConfig::from_toml_str(
            r#"
            [llm]
            model = "local-model"
            endpoint = "http://localhost:8080/v1/chat/completions"
            temperature = 0.0

            [workflow]
            stage_timeout_seconds = 90
            checkpoint_dir = "/tmp/testflow"

            [target]
            framework = "JUnit 4"

            [logging]
            level = "debug"
            json = true

            [tools]
            project_root = "/src/app"
            "#,
        )
        .unwrap();

        assert_eq!(config.llm.model, "local-model");
        assert_eq!(config.workflow.stage_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.target, TestTarget::new("Java", "JUnit 4", "Mockito"));
        assert!(config.logging.json);
        assert_eq!(config.tools.active_root(), Some(Path::new("/src/app")));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_malformed_toml() {
        let err = TestflowConfig::from_toml_str("[llm\nmodel = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_OPENAI_API_KEY, "sk-openai"),
            (ENV_MODEL, "gpt-test"),
            (ENV_ENDPOINT, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = TestflowConfig::default();
        config.apply_env_overrides_from(|k| env.get(k).map(|v| (*v).to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-openai"));
        assert_eq!(config.llm.model, "gpt-test");
        assert_eq!(config.llm.endpoint, default_endpoint());

        let mut config = TestflowConfig::default().with_llm(LlmConfig::default().with_api_key("from-file"));
        config.apply_env_overrides_from(|k| env.get(k).map(|v| (*v).to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("from-file"));

        config.apply_env_overrides_from(|k| (k == ENV_API_KEY).then(|| "sk-testflow".to_string()));
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-testflow"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let bad = [
            TestflowConfig::default().with_llm(LlmConfig::default().with_endpoint("ftp://x")),
            TestflowConfig::default().with_llm(LlmConfig::default().with_temperature(3.5)),
            TestflowConfig::default().with_llm(LlmConfig::default().with_max_tool_rounds(0)),
            TestflowConfig::default()
                .with_workflow(WorkflowConfig::default().with_stage_timeout_seconds(0)),
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_api_key_is_redacted_and_not_serialized() {
        let llm = LlmConfig::default().with_api_key("secret");
        assert!(!format!("{llm:?}").contains("secret"));
        assert!(!toml::to_string(&llm).unwrap().contains("secret"));
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("testflow.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.logging.level, "warn");

        let missing = load_config(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
