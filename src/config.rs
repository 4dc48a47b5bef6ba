use serde::Deserialize;
use std::{fs, path::Path};
use anyhow::{Context, Result};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: Storage,
    #[serde(default)]
    pub purse: Purse,
    #[serde(default)]
    pub indexer: Indexer,
    #[serde(default)]
    pub metrics: Metrics,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Storage {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Purse {
    /// 32-byte owner secret as hex. Generated and persisted when absent.
    #[serde(default)]
    pub secret_hex: Option<String>,
    #[serde(default = "default_fee_per_kb")]
    pub fee_per_kb: u64,
    #[serde(default = "default_change_splits")]
    pub change_splits: u8,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Indexer {
    #[serde(default = "default_indexer_url")]
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Metrics {
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_fee_per_kb() -> u64 { 10 }
fn default_change_splits() -> u8 { 1 }
fn default_indexer_url() -> String { "https://api.whatsonchain.com/v1/bsv/main".into() }
fn default_bind() -> String { "0.0.0.0:9100".into() }

impl Default for Purse {
    fn default() -> Self {
        Purse { secret_hex: None, fee_per_kb: default_fee_per_kb(), change_splits: default_change_splits() }
    }
}

impl Default for Indexer {
    fn default() -> Self {
        Indexer { base_url: default_indexer_url() }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics { bind: default_bind() }
    }
}

/// Read the TOML file at `p` and deserialize into `Config`.
/// *Adds context* so user errors print a friendlier message.
///
/// # Errors
/// * Returns an anyhow::Error if the file cannot be read or parsed.
pub fn load<P: AsRef<Path>>(p: P) -> Result<Config> {
    let text = fs::read_to_string(&p)
        .with_context(|| format!("🗂️  couldn't read config file {}", p.as_ref().display()))?;
    load_from_str(&text)
}

pub fn load_from_str(text: &str) -> Result<Config> {
    toml::from_str(text).with_context(|| "📝  invalid TOML in config file".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = load_from_str("[storage]\npath = \"/tmp/purse\"\n").unwrap();
        assert_eq!(cfg.purse.fee_per_kb, 10);
        assert_eq!(cfg.purse.change_splits, 1);
        assert!(cfg.purse.secret_hex.is_none());
        assert!(!cfg.indexer.base_url.is_empty());
        assert_eq!(cfg.metrics.bind, "0.0.0.0:9100");
    }

    #[test]
    fn missing_storage_section_is_an_error() {
        assert!(load_from_str("[purse]\nfee_per_kb = 5\n").is_err());
    }
}
