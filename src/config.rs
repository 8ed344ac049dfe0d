//! Pipeline configuration, loaded from JSON. Missing fields take defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, ZkError};
use crate::field::Fr;
use crate::groth16::powers_of_tau::MAX_POWER;
use crate::poseidon2::SUPPORTED_WIDTHS;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Poseidon2 state width t
    pub width: usize,

    /// Phase 1 supports circuits up to 2^power constraints
    pub power: u32,

    pub phase1_contributors: usize,
    pub phase2_contributors: usize,

    /// Seed for every random choice; absent means OS entropy
    pub seed: Option<u64>,

    /// Capacity element the hash state starts with
    pub capacity: Fr,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            width: 3,
            power: 12,
            phase1_contributors: 1,
            phase2_contributors: 1,
            seed: None,
            capacity: Fr::zero(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PipelineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Seeded runs derive every ceremony secret from `seed`, so their keys
    /// are only fit for testing
    pub fn is_seeded(&self) -> bool {
        self.seed.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if !SUPPORTED_WIDTHS.contains(&self.width) {
            return Err(ZkError::MalformedCircuitDefinition(format!(
                "width {} is not one of {SUPPORTED_WIDTHS:?}",
                self.width
            )));
        }
        if self.power == 0 || self.power > MAX_POWER {
            return Err(ZkError::SetupArtifactMismatched(format!(
                "power must be in 1..={MAX_POWER}, got {}",
                self.power
            )));
        }
        if self.phase1_contributors == 0 || self.phase2_contributors == 0 {
            return Err(ZkError::SetupArtifactMissing(
                "each phase needs at least one contributor".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_json("{}").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.width, 3);
        assert_eq!(config.power, 12);
        assert!(config.seed.is_none());
        assert!(!config.is_seeded());
    }

    #[test]
    fn test_partial_override() {
        let config = PipelineConfig::from_json(r#"{"width": 2, "seed": 7, "capacity": "5"}"#).unwrap();
        assert_eq!(config.width, 2);
        assert_eq!(config.seed, Some(7));
        assert!(config.is_seeded());
        assert_eq!(config.capacity, Fr::from_u64(5));
        assert_eq!(config.phase1_contributors, 1);
    }

    #[test]
    fn test_invalid_configs() {
        assert!(PipelineConfig::from_json(r#"{"width": 4}"#).is_err());
        assert!(PipelineConfig::from_json(r#"{"power": 0}"#).is_err());
        assert!(PipelineConfig::from_json(r#"{"phase2_contributors": 0}"#).is_err());
        assert!(matches!(
            PipelineConfig::from_json("[1, 2]"),
            Err(ZkError::Serialization(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            PipelineConfig::from_file("/nonexistent/pipeline.json"),
            Err(ZkError::Io(_))
        ));
    }
}
