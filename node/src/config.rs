//! Node configuration with TOML file support.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tessera_types::{Address, ProtocolParams};
use tessera_witness::validate_witness_list;

use crate::{LogFormat, NodeError};

/// Configuration for a Tessera node.
///
/// Can be loaded from a TOML file via [`NodeConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Data directory for the LMDB environment.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum size of the LMDB memory map in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    #[serde(default = "default_lmdb_max_dbs")]
    pub lmdb_max_dbs: u32,

    #[serde(default)]
    pub log_format: LogFormat,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// The witness list this node trusts when catching up.
    #[serde(default)]
    pub witnesses: Vec<Address>,

    /// Protocol constants; every field defaults independently.
    #[serde(default)]
    pub params: ProtocolParams,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./tessera_data")
}

fn default_lmdb_map_size() -> usize {
    1 << 30
}

fn default_lmdb_max_dbs() -> u32 {
    32
}

fn default_log_level() -> String {
    "info".to_string()
}

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| NodeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String, NodeError> {
        toml::to_string_pretty(self).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Check the parameters and, when one is configured, the witness list.
    pub fn validate(&self) -> Result<(), NodeError> {
        self.params.validate()?;
        if !self.witnesses.is_empty() {
            validate_witness_list(&self.witnesses, &self.params)?;
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            lmdb_map_size: default_lmdb_map_size(),
            lmdb_max_dbs: default_lmdb_max_dbs(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
            witnesses: Vec::new(),
            params: ProtocolParams::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = NodeConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = NodeConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.lmdb_map_size, config.lmdb_map_size);
        assert_eq!(parsed.params, config.params);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = NodeConfig::from_toml_str("").unwrap();
        assert_eq!(config.log_format, LogFormat::Human);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.params, ProtocolParams::default());
        assert!(config.witnesses.is_empty());
        config.validate().unwrap();
    }

    #[test]
    fn nested_params_override_single_fields() {
        let toml = r#"
            log_format = "json"
            data_dir = "/var/lib/tessera"

            [params]
            skiplist_interval = 4
        "#;
        let config = NodeConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/tessera"));
        assert_eq!(config.params.skiplist_interval, 4);
        assert_eq!(config.params.count_witnesses, 12);
    }

    #[test]
    fn invalid_params_are_rejected() {
        let toml = r#"
            [params]
            count_witnesses = 4
            majority_of_witnesses = 2
        "#;
        let config = NodeConfig::from_toml_str(toml).unwrap();
        assert!(matches!(config.validate(), Err(NodeError::Params(_))));
    }

    #[test]
    fn short_witness_list_is_rejected() {
        let mut config = NodeConfig::default();
        config.witnesses = vec![Address::new("A"), Address::new("B")];
        assert!(matches!(config.validate(), Err(NodeError::Witness(_))));
    }

    #[test]
    fn unknown_log_format_fails_to_parse() {
        assert!(NodeConfig::from_toml_str(r#"log_format = "xml""#).is_err());
    }
}
