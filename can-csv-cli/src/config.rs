//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_csv_decoder::DecoderConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
///
/// Every section is optional; command-line flags override what is set here.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub decoding: DecoderConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InputConfig {
    pub csv_file: Option<PathBuf>,
    #[serde(default)]
    pub dbc_files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_file")]
    pub file: PathBuf,
    #[serde(default)]
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file: default_output_file(),
            format: OutputFormat::default(),
        }
    }
}

fn default_output_file() -> PathBuf {
    PathBuf::from("decoded_signals.csv")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Csv,
    Jsonl,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProcessingConfig {
    /// Decode rows on the rayon thread pool
    #[serde(default)]
    pub parallel: bool,
    /// Stop after this many input rows
    pub max_rows: Option<usize>,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [input]
            csv_file = "can_log.csv"
            dbc_files = ["Small_CAR_CANbus.dbc", "body.dbc"]

            [output]
            file = "out.jsonl"
            format = "jsonl"

            [decoding]
            allow_truncated = false

            [processing]
            parallel = true
            max_rows = 1000
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.input.csv_file, Some(PathBuf::from("can_log.csv")));
        assert_eq!(config.input.dbc_files.len(), 2);
        assert_eq!(config.output.format, OutputFormat::Jsonl);
        assert!(!config.decoding.allow_truncated);
        assert!(config.decoding.decode_choices);
        assert!(config.processing.parallel);
        assert_eq!(config.processing.max_rows, Some(1000));
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert!(config.input.csv_file.is_none());
        assert_eq!(config.output.file, PathBuf::from("decoded_signals.csv"));
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.decoding, DecoderConfig::default());
        assert!(!config.processing.parallel);
    }

    #[test]
    fn test_invalid_format_rejected() {
        let result: std::result::Result<AppConfig, _> = toml::from_str("[output]\nformat = \"html\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_missing_config() {
        assert!(load_config(Path::new("missing_config.toml")).is_err());
    }
}
