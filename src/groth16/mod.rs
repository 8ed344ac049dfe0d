//! Groth16 over BN254
//!
//! Trusted setup in two phases (a universal Powers of Tau, then a
//! circuit-specific Phase 2), a prover, and a single-equation verifier.
//! Keys and proofs use the snarkjs JSON layout.

pub mod ceremony;
pub mod powers_of_tau;
pub mod prover;
pub mod setup;
mod toxic;
pub mod types;
pub mod verifier;

pub use ceremony::{Ceremony, Stage};
pub use powers_of_tau::{ContributionRecord, LagrangeBasis, PowersOfTau, PreparedPowersOfTau};
pub use prover::Prover;
pub use setup::{domain_size, Phase2Params};
pub use types::*;
pub use verifier::{verify, verify_json, PreparedVerifyingKey};

/// Keys for `circuit` from a single-contributor ceremony sized to fit it
#[cfg(test)]
pub(crate) fn test_keys<C: crate::circuit::Circuit>(circuit: &C, seed: u64) -> (ProvingKey, VerifyingKey) {
    use crate::circuit::ConstraintSystem;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let matrices = ConstraintSystem::from_circuit(circuit).unwrap().0.export();
    let power = domain_size(&matrices).trailing_zeros();
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    Ceremony::new()
        .start_phase1(power)
        .unwrap()
        .contribute_phase1("test", &mut rng)
        .unwrap()
        .finalize_phase1()
        .unwrap()
        .setup_phase2(&matrices)
        .unwrap()
        .contribute_phase2("test", &mut rng)
        .unwrap()
        .export()
        .unwrap()
        .into_keys()
        .unwrap()
}
