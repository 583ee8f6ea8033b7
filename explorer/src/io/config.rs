//! Explorer configuration stored as TOML (default `explorer.toml`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::extract::ExtractOptions;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "explorer.toml";

/// Explorer configuration (TOML).
///
/// Intended to be edited by humans. Missing fields fall back to the defaults
/// below, so an empty file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Upper bound on exploration rounds per session.
    pub max_rounds: u32,

    /// Two nodes whose centers are at most this many pixels apart are the same element.
    pub min_dist: f64,

    /// Pause after each executed action and after each reflection.
    pub request_interval_secs: u64,

    /// Draw labels for a dark UI theme.
    pub dark_mode: bool,

    pub long_press_ms: u64,

    /// Use the short (100 ms) swipe duration instead of 400 ms.
    pub swipe_quick: bool,

    /// Early-exit similarity at or above this value completes the task.
    pub similarity_threshold: f64,

    /// Append the node's `index` attribute to its element id.
    pub append_sibling_index: bool,

    pub reasoning: ReasoningConfig,

    pub device: DeviceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReasoningConfig {
    /// OpenAI-compatible chat completions URL.
    pub endpoint: String,
    pub model: String,
    /// Environment variable holding the bearer token.
    pub api_key_env: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// USD per 1k prompt tokens, used for cost logging only.
    pub prompt_cost_per_1k: f64,
    /// USD per 1k completion tokens, used for cost logging only.
    pub completion_cost_per_1k: f64,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4-vision-preview".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.0,
            max_tokens: 300,
            timeout_secs: 120,
            prompt_cost_per_1k: 0.01,
            completion_cost_per_1k: 0.03,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    /// Path or name of the `adb` binary.
    pub adb: String,
    /// Device serial. When unset the single attached device is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    pub remote_screenshot_dir: String,
    pub remote_xml_dir: String,
    pub command_timeout_secs: u64,
    /// Truncate captured `adb` stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            adb: "adb".to_string(),
            serial: None,
            remote_screenshot_dir: "/sdcard".to_string(),
            remote_xml_dir: "/sdcard".to_string(),
            command_timeout_secs: 30,
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            max_rounds: 20,
            min_dist: 30.0,
            request_interval_secs: 10,
            dark_mode: false,
            long_press_ms: 1000,
            swipe_quick: false,
            similarity_threshold: 0.8,
            append_sibling_index: true,
            reasoning: ReasoningConfig::default(),
            device: DeviceConfig::default(),
        }
    }
}

impl ExplorerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(anyhow!("max_rounds must be > 0"));
        }
        if !self.min_dist.is_finite() || self.min_dist < 0.0 {
            return Err(anyhow!("min_dist must be a non-negative number"));
        }
        if self.long_press_ms == 0 {
            return Err(anyhow!("long_press_ms must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(anyhow!("similarity_threshold must be within 0.0..=1.0"));
        }
        if self.reasoning.endpoint.trim().is_empty() {
            return Err(anyhow!("reasoning.endpoint must be non-empty"));
        }
        if self.reasoning.model.trim().is_empty() {
            return Err(anyhow!("reasoning.model must be non-empty"));
        }
        if self.reasoning.max_tokens == 0 {
            return Err(anyhow!("reasoning.max_tokens must be > 0"));
        }
        if self.reasoning.timeout_secs == 0 {
            return Err(anyhow!("reasoning.timeout_secs must be > 0"));
        }
        if self.device.adb.trim().is_empty() {
            return Err(anyhow!("device.adb must be non-empty"));
        }
        if self.device.command_timeout_secs == 0 {
            return Err(anyhow!("device.command_timeout_secs must be > 0"));
        }
        if self.device.output_limit_bytes == 0 {
            return Err(anyhow!("device.output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions {
            min_dist: self.min_dist,
            append_sibling_index: self.append_sibling_index,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `ExplorerConfig::default()`.
pub fn load_config(path: &Path) -> Result<ExplorerConfig> {
    if !path.exists() {
        let cfg = ExplorerConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ExplorerConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &ExplorerConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    super::write_atomic(path, buf.as_bytes())
}
