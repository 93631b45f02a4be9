//! Application configuration for copyforge.
//!
//! User config lives at `~/.copyforge/copyforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CopyforgeError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "copyforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".copyforge";

// ---------------------------------------------------------------------------
// Config structs (matching copyforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Quality-loop and scheduling policy.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Generation model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// External-call retry/timeout discipline.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Table column names used by the result assembler.
    #[serde(default)]
    pub columns: ColumnsConfig,

    /// Quality-audit scoring knobs.
    #[serde(default)]
    pub audit: AuditConfig,
}

/// `[pipeline]` section — quality-loop and batch policy constants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Audit score a bundle must reach to be accepted.
    #[serde(default = "default_min_score_target")]
    pub min_score_target: u32,

    /// Maximum generate/refine attempts per row.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Admission-pool size: rows processed concurrently.
    #[serde(default = "default_max_concurrent_rows")]
    pub max_concurrent_rows: usize,

    /// Capacity of the batch event channel before workers backpressure.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// Attribute holding the reference-document URL.
    #[serde(default = "default_reference_attr")]
    pub reference_attr: String,

    /// Attribute carrying the upstream validation flag.
    #[serde(default = "default_validated_attr")]
    pub validated_attr: String,

    /// Sentinel value the validation flag must equal (case-insensitive).
    #[serde(default = "default_validated_sentinel")]
    pub validated_sentinel: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_score_target: default_min_score_target(),
            max_attempts: default_max_attempts(),
            max_concurrent_rows: default_max_concurrent_rows(),
            event_buffer: default_event_buffer(),
            reference_attr: default_reference_attr(),
            validated_attr: default_validated_attr(),
            validated_sentinel: default_validated_sentinel(),
        }
    }
}

fn default_min_score_target() -> u32 {
    95
}
fn default_max_attempts() -> u32 {
    3
}
fn default_max_concurrent_rows() -> usize {
    10
}
fn default_event_buffer() -> usize {
    256
}
fn default_reference_attr() -> String {
    "reference_url".into()
}
fn default_validated_attr() -> String {
    "validated".into()
}
fn default_validated_sentinel() -> String {
    "yes".into()
}

/// `[model]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Text-generation service endpoint.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model identifier sent with each request.
    #[serde(default = "default_model_id")]
    pub model_id: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model_id: default_model_id(),
            api_key_env: default_api_key_env(),
        }
    }
}

fn default_endpoint() -> String {
    "https://api.example-llm.com/v1/generate".into()
}
fn default_model_id() -> String {
    "copywriter-2.5".into()
}
fn default_api_key_env() -> String {
    "COPYFORGE_API_KEY".into()
}

/// `[gateway]` section — retry/backoff/timeout for every external call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Total call attempts for a transiently failing operation.
    #[serde(default = "default_call_max_retries")]
    pub call_max_retries: u32,

    /// First backoff delay in milliseconds; doubles per retry.
    #[serde(default = "default_call_base_backoff_ms")]
    pub call_base_backoff_ms: u64,

    /// Backoff ceiling in milliseconds.
    #[serde(default = "default_call_max_backoff_ms")]
    pub call_max_backoff_ms: u64,

    /// Per-call timeout in seconds (distinct from backoff).
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            call_max_retries: default_call_max_retries(),
            call_base_backoff_ms: default_call_base_backoff_ms(),
            call_max_backoff_ms: default_call_max_backoff_ms(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

fn default_call_max_retries() -> u32 {
    4
}
fn default_call_base_backoff_ms() -> u64 {
    1_000
}
fn default_call_max_backoff_ms() -> u64 {
    60_000
}
fn default_call_timeout_secs() -> u64 {
    120
}

impl GatewayConfig {
    /// Per-call timeout as a [`Duration`].
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// First backoff delay as a [`Duration`].
    pub fn base_backoff(&self) -> Duration {
        Duration::from_millis(self.call_base_backoff_ms)
    }

    /// Backoff ceiling as a [`Duration`].
    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.call_max_backoff_ms)
    }
}

/// `[columns]` section — where generated content lands in the output table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnsConfig {
    /// Stable row-key column (product identifier).
    #[serde(default = "default_key_column")]
    pub key: String,

    /// Column receiving the SEO title.
    #[serde(default = "default_title_column")]
    pub title: String,

    /// Column receiving the meta-description.
    #[serde(default = "default_meta_column")]
    pub meta_description: String,

    /// Column receiving the HTML body.
    #[serde(default = "default_body_column")]
    pub body: String,
}

impl Default for ColumnsConfig {
    fn default() -> Self {
        Self {
            key: default_key_column(),
            title: default_title_column(),
            meta_description: default_meta_column(),
            body: default_body_column(),
        }
    }
}

fn default_key_column() -> String {
    "_SKU".into()
}
fn default_title_column() -> String {
    "seo_title".into()
}
fn default_meta_column() -> String {
    "meta_description".into()
}
fn default_body_column() -> String {
    "html_body".into()
}

/// `[audit]` section — scoring knobs for the quality auditor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Domain suffix an external link must carry to count as an authority
    /// citation.
    #[serde(default = "default_authority_suffix")]
    pub authority_suffix: String,

    /// Word ceiling for the average paragraph before readability is docked.
    #[serde(default = "default_paragraph_word_ceiling")]
    pub paragraph_word_ceiling: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            authority_suffix: default_authority_suffix(),
            paragraph_word_ceiling: default_paragraph_word_ceiling(),
        }
    }
}

fn default_authority_suffix() -> String {
    ".gov".into()
}
fn default_paragraph_word_ceiling() -> usize {
    80
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.copyforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CopyforgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.copyforge/copyforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CopyforgeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| CopyforgeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CopyforgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CopyforgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CopyforgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the model API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    let var_name = &config.model.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(()),
        _ => Err(CopyforgeError::config(format!(
            "model API key not found. Set the {var_name} environment variable."
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("min_score_target"));
        assert!(toml_str.contains("COPYFORGE_API_KEY"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.pipeline.min_score_target, 95);
        assert_eq!(parsed.pipeline.max_attempts, 3);
        assert_eq!(parsed.gateway.call_max_retries, 4);
        assert_eq!(parsed.columns.key, "_SKU");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[pipeline]
max_concurrent_rows = 25

[model]
model_id = "copywriter-pro"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.pipeline.max_concurrent_rows, 25);
        assert_eq!(config.pipeline.min_score_target, 95);
        assert_eq!(config.model.model_id, "copywriter-pro");
        assert_eq!(config.gateway.call_base_backoff_ms, 1_000);
    }

    #[test]
    fn gateway_durations() {
        let gateway = GatewayConfig::default();
        assert_eq!(gateway.base_backoff(), Duration::from_secs(1));
        assert_eq!(gateway.max_backoff(), Duration::from_secs(60));
        assert_eq!(gateway.call_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn api_key_validation() {
        let mut config = AppConfig::default();
        // Use a unique env var name to avoid interfering with other tests
        config.model.api_key_env = "CF_TEST_NONEXISTENT_KEY_12345".into();
        let result = validate_api_key(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("API key not found"));
    }
}
