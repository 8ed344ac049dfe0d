//! Groth16 Verifier
//!
//! Accepts iff
//!
//!   e(π_A, π_B) = e(α, β) · e(IC₀ + Σ x_i·IC_i, γ) · e(π_C, δ)
//!
//! checked as a single multi-pairing against a cached e(α, β). Anything
//! malformed (wrong tags, wrong signal count, points off the curve or out of
//! the subgroup) is a reject, not an error.

use super::types::{public_signals_from_json, Proof, VerifyingKey, CURVE, PROTOCOL};
use crate::curve::{multi_pairing, pairing, G1Projective, Gt};
use crate::error::{Result, ZkError};
use crate::field::Fr;

/// A verifying key with e(α, β) precomputed
#[derive(Clone, Debug)]
pub struct PreparedVerifyingKey {
    vk: VerifyingKey,
    alpha_beta: Gt,
}

impl PreparedVerifyingKey {
    pub fn new(vk: &VerifyingKey) -> Result<Self> {
        vk.validate()?;
        let points_valid = vk.vk_alpha_1.is_valid()
            && vk.vk_beta_2.is_valid()
            && vk.vk_gamma_2.is_valid()
            && vk.vk_delta_2.is_valid()
            && vk.ic.iter().all(|p| p.is_valid());
        if !points_valid {
            return Err(ZkError::MalformedProofOrKey(
                "verifying key contains an invalid point".to_string(),
            ));
        }
        Ok(PreparedVerifyingKey {
            vk: vk.clone(),
            alpha_beta: pairing(&vk.vk_alpha_1, &vk.vk_beta_2),
        })
    }

    pub fn vk(&self) -> &VerifyingKey {
        &self.vk
    }

    #[tracing::instrument(skip_all, name = "PreparedVerifyingKey::verify")]
    pub fn verify(&self, public: &[Fr], proof: &Proof) -> bool {
        let vk = &self.vk;
        if proof.protocol != PROTOCOL || proof.curve != CURVE {
            tracing::debug!("proof rejected: unsupported protocol or curve");
            return false;
        }
        if public.len() + 1 != vk.ic.len() {
            tracing::debug!(
                expected = vk.ic.len() - 1,
                got = public.len(),
                "proof rejected: wrong number of public signals"
            );
            return false;
        }
        if !(proof.pi_a.is_valid() && proof.pi_b.is_valid() && proof.pi_c.is_valid()) {
            tracing::debug!("proof rejected: invalid group element");
            return false;
        }

        let acc = vk.ic[0].to_projective() + G1Projective::msm(&vk.ic[1..], public);
        let lhs = multi_pairing(&[
            (proof.pi_a, proof.pi_b),
            (acc.to_affine().neg(), vk.vk_gamma_2),
            (proof.pi_c.neg(), vk.vk_delta_2),
        ]);
        let valid = lhs == self.alpha_beta;
        tracing::debug!(valid, "proof checked");
        valid
    }
}

/// Verify a proof against a verifying key
pub fn verify(vk: &VerifyingKey, public: &[Fr], proof: &Proof) -> bool {
    match PreparedVerifyingKey::new(vk) {
        Ok(pvk) => pvk.verify(public, proof),
        Err(e) => {
            tracing::debug!(error = %e, "proof rejected: unusable verifying key");
            false
        }
    }
}

/// Verify snarkjs JSON artifacts. Any decoding failure is a reject.
pub fn verify_json(vk: &VerifyingKey, public_json: &str, proof_json: &str) -> bool {
    let (public, proof) = match (public_signals_from_json(public_json), Proof::from_json(proof_json)) {
        (Ok(public), Ok(proof)) => (public, proof),
        _ => {
            tracing::debug!("proof rejected: malformed JSON");
            return false;
        }
    };
    verify(vk, &public, &proof)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{LinearHashCircuit, WitnessGenerator, WitnessInput};
    use crate::curve::{G1Affine, G2Affine};
    use crate::groth16::prover::Prover;
    use crate::groth16::test_keys;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn proof_for(p0: u64, p1: u64, seed: u64) -> (VerifyingKey, Proof, Vec<Fr>) {
        let (pk, vk) = test_keys(&LinearHashCircuit, seed);
        let (p0, p1) = (Fr::from_u64(p0), Fr::from_u64(p1));
        let input = WitnessInput::new()
            .with_array("preimage", &[p0, p1])
            .with("hash", LinearHashCircuit::hash(p0, p1));
        let witness = WitnessGenerator::generate(&LinearHashCircuit, &input).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let (proof, public) = Prover::new(&pk).unwrap().prove_with_rng(&witness, &mut rng).unwrap();
        (vk, proof, public)
    }

    #[test]
    fn test_valid_proof_and_determinism() {
        let (vk, proof, public) = proof_for(123, 456, 31);
        let pvk = PreparedVerifyingKey::new(&vk).unwrap();
        assert!(pvk.verify(&public, &proof));
        assert!(pvk.verify(&public, &proof));
        assert!(verify(&vk, &public, &proof));
    }

    #[test]
    fn test_tampered_public_signal() {
        let (vk, proof, mut public) = proof_for(123, 456, 32);
        public[0] += Fr::one();
        assert!(!verify(&vk, &public, &proof));
    }

    #[test]
    fn test_wrong_signal_count() {
        let (vk, proof, public) = proof_for(1, 2, 33);
        assert!(!verify(&vk, &[], &proof));
        assert!(!verify(&vk, &[public[0], public[0]], &proof));
    }

    #[test]
    fn test_tampered_proof() {
        let (vk, proof, public) = proof_for(1, 2, 34);

        let mut bad = proof.clone();
        bad.pi_a = G1Affine::generator();
        assert!(!verify(&vk, &public, &bad));

        let mut bad = proof.clone();
        bad.pi_b = G2Affine::identity();
        assert!(!verify(&vk, &public, &bad));

        let mut bad = proof;
        bad.protocol = "plonk".into();
        assert!(!verify(&vk, &public, &bad));
    }

    #[test]
    fn test_json_artifacts() {
        let (vk, proof, public) = proof_for(123, 456, 35);
        let proof_json = proof.to_json().unwrap();
        let public_json = r#"["1614"]"#;
        assert!(verify_json(&vk, public_json, &proof_json));

        assert!(!verify_json(&vk, r#"["1615"]"#, &proof_json));
        assert!(!verify_json(&vk, "not json", &proof_json));
        assert!(!verify_json(&vk, public_json, r#"{"pi_a": ["1", "3", "1"]}"#));

        // off-curve pi_a
        let mut value: serde_json::Value = serde_json::from_str(&proof_json).unwrap();
        value["pi_a"][1] = serde_json::json!("3");
        assert!(!verify_json(&vk, public_json, &value.to_string()));
        assert_eq!(public, vec![Fr::from_u64(1614)]);
    }
}
