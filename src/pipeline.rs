//! End-to-end flow: circuit → ceremony → witness → proof → verification.

use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};

use crate::circuit::{ConstraintSystem, Poseidon2Circuit, WitnessGenerator, WitnessInput};
use crate::config::PipelineConfig;
use crate::error::{Result, ZkError};
use crate::field::Fr;
use crate::groth16::{
    verify, Ceremony, ContributionRecord, Proof, Prover, ProvingKey, VerifyingKey,
};
use crate::poseidon2::{Poseidon2, Poseidon2Params};

/// Everything a run produces
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub num_constraints: usize,
    pub num_variables: usize,
    pub proving_key: ProvingKey,
    pub verifying_key: VerifyingKey,
    pub proof: Proof,
    pub public_signals: Vec<Fr>,
    pub verified: bool,
    pub log: Vec<ContributionRecord>,
}

pub struct Pipeline {
    config: PipelineConfig,
    circuit: Poseidon2Circuit,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let circuit = Poseidon2Circuit::new(Poseidon2Params::bn254(config.width)?, config.capacity)?;
        Ok(Pipeline { config, circuit })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn circuit(&self) -> &Poseidon2Circuit {
        &self.circuit
    }

    /// Native Poseidon2 hash of one preimage block
    pub fn hash(&self, preimage: &[Fr]) -> Result<Fr> {
        let rate = self.circuit.params().rate();
        if preimage.len() != rate {
            return Err(ZkError::MalformedInput(format!(
                "preimage has {} elements, width {} takes {rate}",
                preimage.len(),
                self.config.width
            )));
        }
        Poseidon2::new(self.circuit.params().clone())?.hash(self.circuit.capacity(), preimage)
    }

    /// Signal map for a preimage, with the matching hash filled in
    pub fn witness_input(&self, preimage: &[Fr]) -> Result<WitnessInput> {
        let hash = self.hash(preimage)?;
        Ok(WitnessInput::new().with_array("preimage", preimage).with("hash", hash))
    }

    fn rng(&self) -> ChaCha20Rng {
        match self.config.seed {
            Some(seed) => ChaCha20Rng::seed_from_u64(seed),
            None => ChaCha20Rng::from_entropy(),
        }
    }

    /// Run a full ceremony for the configured circuit
    #[tracing::instrument(skip_all, name = "Pipeline::setup", fields(width = self.config.width))]
    pub fn setup(&self) -> Result<(ProvingKey, VerifyingKey, Vec<ContributionRecord>)> {
        if self.config.is_seeded() {
            tracing::warn!("ceremony secrets derive from the configured seed; keys are not fit for production");
        }
        let mut rng = self.rng();
        let (cs, _) = ConstraintSystem::from_circuit(&self.circuit)?;
        let matrices = cs.export();
        tracing::info!(
            constraints = cs.num_constraints(),
            variables = cs.num_variables(),
            digest = %matrices.digest(),
            "constraint system built"
        );

        let mut ceremony = Ceremony::new().start_phase1(self.config.power)?;
        for i in 0..self.config.phase1_contributors {
            ceremony = ceremony.contribute_phase1(&format!("phase1-{i}"), &mut rng)?;
        }
        ceremony = ceremony.finalize_phase1()?.setup_phase2(&matrices)?;
        for i in 0..self.config.phase2_contributors {
            ceremony = ceremony.contribute_phase2(&format!("phase2-{i}"), &mut rng)?;
        }
        let ceremony = ceremony.export()?;
        let log = ceremony.log().to_vec();
        let (pk, vk) = ceremony.into_keys()?;
        Ok((pk, vk, log))
    }

    /// Set up, prove knowledge of `preimage`, and verify the proof
    #[tracing::instrument(skip_all, name = "Pipeline::run")]
    pub fn run(&self, preimage: &[Fr]) -> Result<PipelineOutput> {
        let input = self.witness_input(preimage)?;
        let (proving_key, verifying_key, log) = self.setup()?;

        let witness = WitnessGenerator::generate(&self.circuit, &input)?;
        // blinding uses its own stream so it does not depend on ceremony size
        let mut rng = self.rng();
        rng.set_stream(1);
        let (proof, public_signals) = Prover::new(&proving_key)?.prove_with_rng(&witness, &mut rng)?;

        let verified = verify(&verifying_key, &public_signals, &proof);
        tracing::info!(verified, public = public_signals.len(), "pipeline finished");

        Ok(PipelineOutput {
            num_constraints: proving_key.matrices.num_constraints(),
            num_variables: proving_key.num_variables(),
            proving_key,
            verifying_key,
            proof,
            public_signals,
            verified,
            log,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groth16::verify_json;

    fn config(width: usize, seed: u64) -> PipelineConfig {
        PipelineConfig {
            width,
            power: 8,
            seed: Some(seed),
            ..PipelineConfig::default()
        }
    }

    fn preimage() -> Vec<Fr> {
        vec![Fr::from_u64(123), Fr::from_u64(456)]
    }

    #[test]
    fn test_poseidon2_round_trip() {
        let pipeline = Pipeline::new(config(3, 1)).unwrap();
        let out = pipeline.run(&preimage()).unwrap();

        assert!(out.verified);
        assert_eq!(out.num_constraints, 241);
        assert_eq!(out.public_signals, vec![pipeline.hash(&preimage()).unwrap()]);
        assert_eq!(out.verifying_key.ic.len(), 2);
        assert_eq!(out.log.len(), 2);

        // JSON artifacts verify on their own
        let public_json = crate::groth16::public_signals_to_json(&out.public_signals).unwrap();
        let vk = VerifyingKey::from_json(&out.verifying_key.to_json().unwrap()).unwrap();
        assert!(verify_json(&vk, &public_json, &out.proof.to_json().unwrap()));

        // tampered public signal
        let mut tampered = out.public_signals.clone();
        tampered[0] += Fr::one();
        assert!(!verify(&out.verifying_key, &tampered, &out.proof));

        // repeated verification agrees
        for _ in 0..3 {
            assert!(verify(&out.verifying_key, &out.public_signals, &out.proof));
        }
    }

    #[test]
    fn test_proof_fails_under_other_circuit_key() {
        let t3 = Pipeline::new(config(3, 2)).unwrap().run(&preimage()).unwrap();
        let t2 = Pipeline::new(config(2, 3)).unwrap();
        let (_, vk_t2, _) = t2.setup().unwrap();

        assert_eq!(vk_t2.ic.len(), 2);
        assert!(!verify(&vk_t2, &t3.public_signals, &t3.proof));
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        assert!(config(2, 4).is_seeded());
        let a = Pipeline::new(config(2, 4)).unwrap().run(&[Fr::from_u64(9)]).unwrap();
        let b = Pipeline::new(config(2, 4)).unwrap().run(&[Fr::from_u64(9)]).unwrap();
        assert!(a.verified);
        assert_eq!(a.proof, b.proof);
        assert_eq!(a.verifying_key, b.verifying_key);
    }

    #[test]
    fn test_ceremony_too_small_for_circuit() {
        let pipeline = Pipeline::new(PipelineConfig {
            power: 7,
            ..config(3, 5)
        })
        .unwrap();
        assert!(matches!(
            pipeline.setup(),
            Err(ZkError::SetupArtifactMismatched(_))
        ));
    }

    #[test]
    fn test_preimage_must_fill_rate() {
        let pipeline = Pipeline::new(config(3, 6)).unwrap();
        assert!(matches!(
            pipeline.run(&[Fr::from_u64(1)]),
            Err(ZkError::MalformedInput(_))
        ));
    }
}
