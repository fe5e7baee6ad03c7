use crate::errors::ConfigError;
use crate::eval::validate::Tolerance;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

/// Eval settings as read from a YAML file. Every field is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EvalConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default = "default_module")]
    pub module: String,
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    #[serde(default = "default_initial")]
    pub initial: f64,
    #[serde(default)]
    pub tolerance: Tolerance,
}

fn default_version() -> u32 {
    SUPPORTED_CONFIG_VERSION
}

fn default_module() -> String {
    "hello".to_string()
}

fn default_iterations() -> u32 {
    4
}

fn default_initial() -> f64 {
    1.0
}

impl Default for EvalConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            module: default_module(),
            iterations: default_iterations(),
            initial: default_initial(),
            tolerance: Tolerance::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<EvalConfig, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read config {}: {}", path.display(), e)))?;
    parse_config(&raw)
}

pub fn parse_config(raw: &str) -> Result<EvalConfig, ConfigError> {
    let cfg: EvalConfig = serde_yaml::from_str(raw)
        .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;
    if cfg.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: {})",
            cfg.version, SUPPORTED_CONFIG_VERSION
        )));
    }
    if cfg.module.trim().is_empty() {
        return Err(ConfigError("module name must not be empty".into()));
    }
    if !cfg.initial.is_finite() {
        return Err(ConfigError("initial value must be finite".into()));
    }
    if cfg.tolerance.rtol < 0.0 || cfg.tolerance.atol < 0.0 {
        return Err(ConfigError("tolerances must be non-negative".into()));
    }
    Ok(cfg)
}
