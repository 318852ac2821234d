//! Configuration loading and default resolution for RustedFlow.
//!
//! Loads dispatch settings from a TOML file with environment variable
//! overrides. Numeric limits that are absent, unparsable or non-positive are
//! replaced by their defaults in one place ([`DispatchConfig::normalize`]),
//! never rejected.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Environment variable for the tool response preview length.
pub const ENV_TOOL_RESPONSE_PREVIEW_CHARS: &str = "TOOL_RESPONSE_PREVIEW_CHARS";
/// Environment variable for the tool response context length.
pub const ENV_TOOL_RESPONSE_CONTEXT_CHARS: &str = "TOOL_RESPONSE_CONTEXT_CHARS";
/// Environment variable for the max files read per dispatch.
pub const ENV_FILE_MAX_FILES: &str = "FILE_MAX_FILES";
/// Environment variable selecting inline file metadata mode.
pub const ENV_FILE_INLINE_METADATA: &str = "FILE_INLINE_METADATA";
/// Environment variable toggling automatic file content injection.
pub const ENV_FILE_AUTO_INJECT_CONTENT: &str = "FILE_AUTO_INJECT_CONTENT";

/// The root configuration structure for agent dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Upper bound on tool-call rounds per dispatch
    #[serde(default = "default_max_run_tool_times")]
    pub max_run_tool_times: u32,

    /// Per-turn char budget of the history preview in node responses
    #[serde(default = "default_history_preview_chars")]
    pub history_preview_chars: usize,

    /// Tool response truncation limits
    #[serde(default)]
    pub tool_response: ToolResponseLimits,

    /// Global file handling defaults
    #[serde(default)]
    pub files: FileConfig,

    /// Point prices per model (model name → price per 1K tokens)
    #[serde(default)]
    pub pricing: HashMap<String, PricingConfig>,
}

fn default_max_run_tool_times() -> u32 {
    100
}
fn default_history_preview_chars() -> usize {
    10_000
}
fn default_preview_chars() -> usize {
    500
}
fn default_context_chars() -> usize {
    8000
}
fn default_max_files() -> usize {
    20
}
fn default_true() -> bool {
    true
}

/// How much of each tool response survives, per audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResponseLimits {
    /// Chars kept at each end for user-facing previews
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,

    /// Chars kept at each end for next-round context
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
}

impl Default for ToolResponseLimits {
    fn default() -> Self {
        Self {
            preview_chars: default_preview_chars(),
            context_chars: default_context_chars(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Inline (true) or traditional (false) file metadata mode
    #[serde(default)]
    pub inline_file_metadata: bool,

    /// Quote file content into the system prompt automatically
    #[serde(default = "default_true")]
    pub auto_inject_file_content: bool,

    #[serde(default)]
    pub custom_pdf_parse: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            inline_file_metadata: false,
            auto_inject_file_content: true,
            custom_pdf_parse: false,
        }
    }
}

/// Points charged per 1K tokens for one model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub input_per_k: f64,
    pub output_per_k: f64,
}

/// Per-chat file selection overrides, as sent by the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSelectConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_files: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_pdf_parse: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_inject_file_content: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_file_metadata: Option<bool>,
}

/// File settings in effect for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSettings {
    pub max_files: usize,
    pub custom_pdf_parse: bool,
    pub auto_inject_file_content: bool,
    pub inline_file_metadata: bool,
}

impl FileSettings {
    /// Merge per-chat overrides onto the global defaults.
    ///
    /// A per-chat `max_files` of 0 falls back to the global value.
    pub fn resolve(global: &FileConfig, chat: Option<&FileSelectConfig>) -> Self {
        let chat = chat.cloned().unwrap_or_default();
        Self {
            max_files: chat
                .max_files
                .filter(|n| *n > 0)
                .unwrap_or(global.max_files),
            custom_pdf_parse: chat.custom_pdf_parse.unwrap_or(global.custom_pdf_parse),
            auto_inject_file_content: chat
                .auto_inject_file_content
                .unwrap_or(global.auto_inject_file_content),
            inline_file_metadata: chat
                .inline_file_metadata
                .unwrap_or(global.inline_file_metadata),
        }
    }
}

impl DispatchConfig {
    /// Load configuration from a file, then apply environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path.
    ///
    /// A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        config.normalize();
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.tool_response.preview_chars = positive_or(
            lookup(ENV_TOOL_RESPONSE_PREVIEW_CHARS),
            self.tool_response.preview_chars,
        );
        self.tool_response.context_chars = positive_or(
            lookup(ENV_TOOL_RESPONSE_CONTEXT_CHARS),
            self.tool_response.context_chars,
        );
        self.files.max_files = positive_or(lookup(ENV_FILE_MAX_FILES), self.files.max_files);

        if let Some(flag) = lookup(ENV_FILE_INLINE_METADATA).as_deref().and_then(parse_flag) {
            self.files.inline_file_metadata = flag;
        }
        if let Some(flag) = lookup(ENV_FILE_AUTO_INJECT_CONTENT)
            .as_deref()
            .and_then(parse_flag)
        {
            self.files.auto_inject_file_content = flag;
        }

        self.normalize();
    }

    /// File settings for one dispatch given the chat's overrides.
    pub fn file_settings(&self, chat: Option<&FileSelectConfig>) -> FileSettings {
        FileSettings::resolve(&self.files, chat)
    }

    /// Replace non-positive limits with their defaults.
    fn normalize(&mut self) {
        if self.tool_response.preview_chars == 0 {
            self.tool_response.preview_chars = default_preview_chars();
        }
        if self.tool_response.context_chars == 0 {
            self.tool_response.context_chars = default_context_chars();
        }
        if self.files.max_files == 0 {
            self.files.max_files = default_max_files();
        }
        if self.max_run_tool_times == 0 {
            self.max_run_tool_times = default_max_run_tool_times();
        }
        if self.history_preview_chars == 0 {
            self.history_preview_chars = default_history_preview_chars();
        }
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        for (model, price) in &self.pricing {
            if price.input_per_k < 0.0 || price.output_per_k < 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "pricing for {model} must not be negative"
                )));
            }
        }
        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_run_tool_times: default_max_run_tool_times(),
            history_preview_chars: default_history_preview_chars(),
            tool_response: ToolResponseLimits::default(),
            files: FileConfig::default(),
            pricing: HashMap::new(),
        }
    }
}

/// Parse a positive integer, keeping `current` otherwise.
fn positive_or(raw: Option<String>, current: usize) -> usize {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|n| *n > 0)
        .map(|n| n as usize)
        .unwrap_or(current)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
