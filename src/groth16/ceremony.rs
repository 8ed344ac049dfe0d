//! Trusted Setup Ceremony
//!
//! Drives Phase 1 and Phase 2 as one state machine:
//!
//! ```text
//! Uninitialized → Phase1Started → Phase1Contributed → Phase1Finalized
//!               → Phase2KeysGenerated → Phase2Contributed → Exported
//! ```
//!
//! Every step consumes the ceremony and returns the next state. A step
//! called out of order fails and the ceremony is gone; restart from a
//! saved artifact.

use rand::{CryptoRng, RngCore};

use super::powers_of_tau::{ContributionRecord, PowersOfTau, PreparedPowersOfTau};
use super::setup::Phase2Params;
use super::types::{ProvingKey, VerifyingKey};
use crate::circuit::ConstraintMatrices;
use crate::error::{Result, ZkError};

#[derive(Clone, Debug)]
pub enum Stage {
    Uninitialized,
    Phase1Started(PowersOfTau),
    Phase1Contributed(PowersOfTau),
    Phase1Finalized(PreparedPowersOfTau),
    Phase2KeysGenerated(Phase2Params),
    Phase2Contributed(Phase2Params),
    Exported(ProvingKey, VerifyingKey),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Uninitialized => "Uninitialized",
            Stage::Phase1Started(_) => "Phase1Started",
            Stage::Phase1Contributed(_) => "Phase1Contributed",
            Stage::Phase1Finalized(_) => "Phase1Finalized",
            Stage::Phase2KeysGenerated(_) => "Phase2KeysGenerated",
            Stage::Phase2Contributed(_) => "Phase2Contributed",
            Stage::Exported(..) => "Exported",
        }
    }
}

/// The ceremony and its append-only contribution log
#[derive(Clone, Debug)]
pub struct Ceremony {
    stage: Stage,
    log: Vec<ContributionRecord>,
}

impl Default for Ceremony {
    fn default() -> Self {
        Self::new()
    }
}

impl Ceremony {
    pub fn new() -> Self {
        Ceremony {
            stage: Stage::Uninitialized,
            log: Vec::new(),
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn stage_name(&self) -> &'static str {
        self.stage.name()
    }

    /// Every contribution so far, both phases. Public data only.
    pub fn log(&self) -> &[ContributionRecord] {
        &self.log
    }

    fn out_of_order(&self, op: &str, expected: &str) -> ZkError {
        ZkError::SetupArtifactMissing(format!(
            "{op} requires {expected}, ceremony is at {}",
            self.stage_name()
        ))
    }

    fn advance(self, stage: Stage, log: Vec<ContributionRecord>) -> Self {
        tracing::debug!(from = self.stage_name(), to = stage.name(), "ceremony advanced");
        Ceremony { stage, log }
    }

    pub fn start_phase1(self, power: u32) -> Result<Self> {
        match self.stage {
            Stage::Uninitialized => {
                let acc = PowersOfTau::new(power)?;
                tracing::info!(power, "phase 1 started");
                Ok(self.advance(Stage::Phase1Started(acc), Vec::new()))
            }
            _ => Err(self.out_of_order("start_phase1", "Uninitialized")),
        }
    }

    pub fn contribute_phase1<R: RngCore + CryptoRng>(self, participant: &str, rng: &mut R) -> Result<Self> {
        let acc = match &self.stage {
            Stage::Phase1Started(acc) | Stage::Phase1Contributed(acc) => acc.contribute(participant, rng)?,
            _ => return Err(self.out_of_order("contribute_phase1", "Phase1Started or Phase1Contributed")),
        };
        let log = acc.contributions.clone();
        Ok(self.advance(Stage::Phase1Contributed(acc), log))
    }

    pub fn finalize_phase1(self) -> Result<Self> {
        let prepared = match &self.stage {
            Stage::Phase1Contributed(acc) => acc.finalize()?,
            _ => return Err(self.out_of_order("finalize_phase1", "Phase1Contributed")),
        };
        let log = self.log.clone();
        Ok(self.advance(Stage::Phase1Finalized(prepared), log))
    }

    pub fn setup_phase2(self, matrices: &ConstraintMatrices) -> Result<Self> {
        let params = match &self.stage {
            Stage::Phase1Finalized(prepared) => Phase2Params::new(prepared, matrices)?,
            _ => return Err(self.out_of_order("setup_phase2", "Phase1Finalized")),
        };
        let log = self.log.clone();
        Ok(self.advance(Stage::Phase2KeysGenerated(params), log))
    }

    pub fn contribute_phase2<R: RngCore + CryptoRng>(self, participant: &str, rng: &mut R) -> Result<Self> {
        let params = match &self.stage {
            Stage::Phase2KeysGenerated(p) | Stage::Phase2Contributed(p) => p.contribute(participant, rng)?,
            _ => {
                return Err(self.out_of_order(
                    "contribute_phase2",
                    "Phase2KeysGenerated or Phase2Contributed",
                ))
            }
        };
        let log = params.contributions.clone();
        Ok(self.advance(Stage::Phase2Contributed(params), log))
    }

    pub fn export(self) -> Result<Self> {
        let (pk, vk) = match &self.stage {
            Stage::Phase2Contributed(params) => params.export()?,
            _ => return Err(self.out_of_order("export", "Phase2Contributed")),
        };
        tracing::info!(contributions = self.log.len(), "ceremony exported");
        let log = self.log.clone();
        Ok(self.advance(Stage::Exported(pk, vk), log))
    }

    /// The exported keys
    pub fn into_keys(self) -> Result<(ProvingKey, VerifyingKey)> {
        match self.stage {
            Stage::Exported(pk, vk) => Ok((pk, vk)),
            _ => Err(self.out_of_order("into_keys", "Exported")),
        }
    }
}
