//! Runner configuration files
//!
//! ```toml
//! algorithm = "sha3-256"
//!
//! [[runners]]
//! name = "cpu0"
//! weight = 2.0
//!
//! [[runners]]
//! name = "gpu0"
//! device_type = "gpu"
//! weight = 6.0
//! memory_capacity = 268435456
//! ```

use crate::algorithm::Algorithm;
use crate::error::{Error, Result};
use crate::hasher::{validate_algorithm, Hasher};
use crate::runner::Runner;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use warp_device::{DeviceType, Queue, QueueConfig};

fn default_weight() -> f64 {
    1.0
}

/// One runner entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Device name
    pub name: String,
    /// Device type
    #[serde(default)]
    pub device_type: DeviceType,
    /// Relative share of each batch
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Live device memory limit in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_capacity: Option<usize>,
}

impl RunnerConfig {
    fn queue_config(&self) -> QueueConfig {
        let config = QueueConfig::new(&self.name).with_device_type(self.device_type);
        match self.memory_capacity {
            Some(bytes) => config.with_memory_capacity(bytes),
            None => config,
        }
    }
}

/// Algorithm and runner set loaded from TOML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Algorithm name, e.g. `"sha256"` or `"blake2b-256"`
    pub algorithm: String,
    /// Blake2b key as UTF-8 text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    /// Runners in dispatch order
    #[serde(default)]
    pub runners: Vec<RunnerConfig>,
}

impl DispatchConfig {
    /// Parse a TOML document
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        Ok(toml::from_str(toml)?)
    }

    /// Read and parse a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parsed algorithm
    pub fn algorithm(&self) -> Result<Algorithm> {
        self.algorithm.parse()
    }

    /// Key bytes, empty when unkeyed
    pub fn key_bytes(&self) -> &[u8] {
        self.key.as_deref().map(str::as_bytes).unwrap_or_default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        validate_algorithm(self.algorithm()?, self.key_bytes())?;

        if self.runners.is_empty() {
            return Err(Error::invalid("at least one runner is required"));
        }
        let mut names = HashSet::new();
        for runner in &self.runners {
            if !names.insert(runner.name.as_str()) {
                return Err(Error::invalid(format!(
                    "duplicate runner name {:?}",
                    runner.name
                )));
            }
            if !runner.weight.is_finite() || runner.weight < 0.0 {
                return Err(Error::invalid(format!(
                    "runner {} has invalid weight {}",
                    runner.name, runner.weight
                )));
            }
            runner.queue_config().validate()?;
        }
        if self.runners.iter().map(|r| r.weight).sum::<f64>() <= 0.0 {
            return Err(Error::invalid("runner weights must sum to a positive value"));
        }
        Ok(())
    }

    /// Create one queue per runner entry
    pub fn build_runners(&self) -> Result<Vec<Runner>> {
        self.validate()?;
        self.runners
            .iter()
            .map(|r| Ok(Runner::new(Queue::new(r.queue_config())?, r.weight)))
            .collect()
    }

    /// Create the runners and a hasher over them
    pub fn build_hasher(&self) -> Result<Hasher> {
        let runners = self.build_runners()?;
        Hasher::with_key(self.algorithm()?, &runners, self.key_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
algorithm = "sha3-256"

[[runners]]
name = "cpu0"
weight = 2.0

[[runners]]
name = "gpu0"
device_type = "gpu"
weight = 6.0
memory_capacity = 268435456
"#;

    #[test]
    fn test_parse_sample() {
        let config = DispatchConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.algorithm().unwrap(), Algorithm::Sha3 { bits: 256 });
        assert_eq!(config.runners.len(), 2);
        assert_eq!(config.runners[0].device_type, DeviceType::Cpu);
        assert_eq!(config.runners[1].device_type, DeviceType::Gpu);
        assert_eq!(config.runners[1].memory_capacity, Some(268_435_456));
        config.validate().unwrap();
    }

    #[test]
    fn test_default_weight() {
        let config =
            DispatchConfig::from_toml_str("algorithm = \"md5\"\n[[runners]]\nname = \"a\"\n")
                .unwrap();
        assert_eq!(config.runners[0].weight, 1.0);
    }

    #[test]
    fn test_validate_rejects() {
        let mut config = DispatchConfig::from_toml_str(SAMPLE).unwrap();
        config.runners[1].name = "cpu0".into();
        assert!(config.validate().is_err());

        let mut config = DispatchConfig::from_toml_str(SAMPLE).unwrap();
        config.key = Some("secret".into());
        assert!(config.validate().is_err());

        let mut config = DispatchConfig::from_toml_str(SAMPLE).unwrap();
        config.runners.clear();
        assert!(config.validate().is_err());

        let mut config = DispatchConfig::from_toml_str(SAMPLE).unwrap();
        config.algorithm = "sha3-100".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_error() {
        let err = DispatchConfig::from_toml_str("algorithm = ").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_build_hasher() {
        let config = DispatchConfig::from_toml_str(
            r#"
algorithm = "blake2b-512"
key = "def"

[[runners]]
name = "cpu0"

[[runners]]
name = "cpu1"
weight = 3.0
"#,
        )
        .unwrap();
        let hasher = config.build_hasher().unwrap();
        assert_eq!(hasher.runners().len(), 2);
        assert_eq!(hasher.runners()[1].queue.name(), "cpu1");
        assert_eq!(hasher.output_size(), 64);
    }
}
