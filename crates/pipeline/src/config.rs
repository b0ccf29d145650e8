//! Calculator configuration.
//!
//! Loaded from TOML; every key is optional.
//!
//! ```toml
//! [evaluator]
//! default_timezone = "America/Denver"
//! max_recursion_depth = 8
//!
//! [output]
//! error_placeholder = "___ERROR___"
//! ```

use std::path::Path;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tally_eval::{EvaluatorOptions, DEFAULT_MAX_DEPTH};

use crate::ERROR_PLACEHOLDER;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("could not parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("unknown default timezone '{0}'")]
    Timezone(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalculatorConfig {
    pub evaluator: EvaluatorConfig,
    pub output: OutputConfig,
}

/// `[evaluator]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// IANA zone applied by `AS_TIMESTAMP` when no zone is given.
    pub default_timezone: String,
    pub max_recursion_depth: usize,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        EvaluatorConfig {
            default_timezone: "UTC".to_string(),
            max_recursion_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Written in place of a failed output when rows are rendered.
    pub error_placeholder: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            error_placeholder: ERROR_PLACEHOLDER.to_string(),
        }
    }
}

impl CalculatorConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn evaluator_options(&self) -> Result<EvaluatorOptions, ConfigError> {
        let tz: Tz = self
            .evaluator
            .default_timezone
            .parse()
            .map_err(|_| ConfigError::Timezone(self.evaluator.default_timezone.clone()))?;
        Ok(EvaluatorOptions {
            default_timezone: tz,
            max_depth: self.evaluator.max_recursion_depth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = CalculatorConfig::from_toml_str("").unwrap();
        assert_eq!(config, CalculatorConfig::default());
        assert_eq!(config.output.error_placeholder, "___ERROR___");
        let opts = config.evaluator_options().unwrap();
        assert_eq!(opts.default_timezone, Tz::UTC);
        assert_eq!(opts.max_depth, 16);
    }

    #[test]
    fn partial_sections() {
        let config = CalculatorConfig::from_toml_str(
            "[evaluator]\ndefault_timezone = \"America/Denver\"\n",
        )
        .unwrap();
        assert_eq!(config.evaluator.max_recursion_depth, 16);
        assert_eq!(
            config.evaluator_options().unwrap().default_timezone,
            chrono_tz::America::Denver
        );
    }

    #[test]
    fn bad_timezone() {
        let config = CalculatorConfig::from_toml_str(
            "[evaluator]\ndefault_timezone = \"Nowhere/Special\"\n",
        )
        .unwrap();
        assert!(matches!(
            config.evaluator_options(),
            Err(ConfigError::Timezone(_))
        ));
    }

    #[test]
    fn malformed_toml() {
        assert!(matches!(
            CalculatorConfig::from_toml_str("[evaluator\n"),
            Err(ConfigError::Parse(_))
        ));
    }
}
