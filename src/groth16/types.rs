//! Groth16 Type Definitions
//!
//! Keys and proofs, serialized in the snarkjs JSON layout.

use serde::{Deserialize, Serialize};

use crate::circuit::ConstraintMatrices;
use crate::curve::{G1Affine, G2Affine};
use crate::error::{Result, ZkError};
use crate::field::Fr;

/// Protocol tag carried by keys and proofs
pub const PROTOCOL: &str = "groth16";

/// Curve tag carried by keys and proofs
pub const CURVE: &str = "bn128";

/// Verifying key, field names as snarkjs writes them
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyingKey {
    pub protocol: String,
    pub curve: String,
    /// Number of public signals
    #[serde(rename = "nPublic")]
    pub n_public: usize,
    pub vk_alpha_1: G1Affine,
    pub vk_beta_2: G2Affine,
    pub vk_gamma_2: G2Affine,
    pub vk_delta_2: G2Affine,
    /// One point for the constant term, then one per public signal
    #[serde(rename = "IC")]
    pub ic: Vec<G1Affine>,
}

impl VerifyingKey {
    /// Tags and IC length agree with `n_public`
    pub fn validate(&self) -> Result<()> {
        if self.protocol != PROTOCOL || self.curve != CURVE {
            return Err(ZkError::MalformedProofOrKey(format!(
                "unsupported protocol/curve {}/{}",
                self.protocol, self.curve
            )));
        }
        if self.ic.len() != self.n_public + 1 {
            return Err(ZkError::MalformedProofOrKey(format!(
                "IC has {} points for {} public signals",
                self.ic.len(),
                self.n_public
            )));
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let vk: VerifyingKey = serde_json::from_str(json)
            .map_err(|e| ZkError::MalformedProofOrKey(format!("verifying key: {e}")))?;
        vk.validate()?;
        Ok(vk)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Proving key. Holds the constraint matrices it was derived from, keyed by
/// their digest, so a key cannot silently be used with another circuit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvingKey {
    pub circuit_digest: String,
    /// QAP evaluation domain size
    pub domain_size: usize,
    pub matrices: ConstraintMatrices,
    pub alpha_g1: G1Affine,
    pub beta_g1: G1Affine,
    pub beta_g2: G2Affine,
    pub delta_g1: G1Affine,
    pub delta_g2: G2Affine,
    /// [u_j(τ)]₁ for every variable
    pub a_query: Vec<G1Affine>,
    /// [v_j(τ)]₁ for every variable
    pub b_g1_query: Vec<G1Affine>,
    /// [v_j(τ)]₂ for every variable
    pub b_g2_query: Vec<G2Affine>,
    /// [τ^i Z(τ) / δ]₁ for i < domain_size - 1
    pub h_query: Vec<G1Affine>,
    /// [(β u_j + α v_j + w_j)(τ) / δ]₁ for every non-input variable
    pub l_query: Vec<G1Affine>,
    pub vk: VerifyingKey,
}

impl ProvingKey {
    pub fn num_variables(&self) -> usize {
        self.matrices.n_variables
    }

    /// Query lengths agree with the matrices and the digest matches them
    pub fn validate(&self) -> Result<()> {
        let mismatched = |msg: String| Err(ZkError::SetupArtifactMismatched(msg));

        self.matrices.validate()?;
        self.vk.validate()?;
        if self.matrices.digest() != self.circuit_digest {
            return mismatched("constraint matrices do not match the key's circuit digest".into());
        }
        let m = self.num_variables();
        if self.a_query.len() != m || self.b_g1_query.len() != m || self.b_g2_query.len() != m {
            return mismatched(format!("variable queries do not have {m} entries"));
        }
        if self.l_query.len() != self.matrices.witness_indices().len() {
            return mismatched("L query does not cover the private variables".into());
        }
        if !self.domain_size.is_power_of_two()
            || self.domain_size < self.matrices.num_constraints() + self.matrices.num_public() + 1
            || self.h_query.len() != self.domain_size - 1
        {
            return mismatched(format!("H query does not fit domain size {}", self.domain_size));
        }
        if self.vk.n_public != self.matrices.num_public() {
            return mismatched("verifying key and matrices disagree on public inputs".into());
        }
        Ok(())
    }
}

/// Proof: three group elements plus tags
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub pi_a: G1Affine,
    pub pi_b: G2Affine,
    pub pi_c: G1Affine,
    pub protocol: String,
    pub curve: String,
}

impl Proof {
    pub fn new(pi_a: G1Affine, pi_b: G2Affine, pi_c: G1Affine) -> Self {
        Proof {
            pi_a,
            pi_b,
            pi_c,
            protocol: PROTOCOL.to_string(),
            curve: CURVE.to_string(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| ZkError::MalformedProofOrKey(format!("proof: {e}")))
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Decode a public-signal list: a JSON array of decimal strings
pub fn public_signals_from_json(json: &str) -> Result<Vec<Fr>> {
    serde_json::from_str(json)
        .map_err(|e| ZkError::MalformedProofOrKey(format!("public signals: {e}")))
}

pub fn public_signals_to_json(signals: &[Fr]) -> Result<String> {
    Ok(serde_json::to_string(signals)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proof_json_layout() {
        let proof = Proof::new(
            G1Affine::generator(),
            G2Affine::generator(),
            G1Affine::identity(),
        );
        let value: serde_json::Value = serde_json::from_str(&proof.to_json().unwrap()).unwrap();
        assert_eq!(value["protocol"], "groth16");
        assert_eq!(value["curve"], "bn128");
        assert_eq!(value["pi_a"], serde_json::json!(["1", "2", "1"]));
        assert_eq!(value["pi_c"], serde_json::json!(["0", "1", "0"]));
        assert_eq!(value["pi_b"][2], serde_json::json!(["1", "0"]));

        let back = Proof::from_json(&proof.to_json().unwrap()).unwrap();
        assert_eq!(back, proof);
    }

    #[test]
    fn test_public_signals_json() {
        let signals = vec![Fr::from_u64(1614)];
        let json = public_signals_to_json(&signals).unwrap();
        assert_eq!(json, r#"["1614"]"#);
        assert_eq!(public_signals_from_json(&json).unwrap(), signals);
        assert!(public_signals_from_json("[1614]").is_err());
    }

    #[test]
    fn test_verifying_key_validation() {
        let vk = VerifyingKey {
            protocol: PROTOCOL.into(),
            curve: CURVE.into(),
            n_public: 1,
            vk_alpha_1: G1Affine::generator(),
            vk_beta_2: G2Affine::generator(),
            vk_gamma_2: G2Affine::generator(),
            vk_delta_2: G2Affine::generator(),
            ic: vec![G1Affine::generator(); 2],
        };
        assert!(vk.validate().is_ok());

        let json = vk.to_json().unwrap();
        assert!(json.contains("\"nPublic\": 1"));
        assert!(json.contains("\"IC\""));
        assert_eq!(VerifyingKey::from_json(&json).unwrap(), vk);

        let mut bad = vk.clone();
        bad.ic.pop();
        assert!(bad.validate().is_err());

        let mut bad = vk;
        bad.curve = "bls12381".into();
        assert!(matches!(bad.validate(), Err(ZkError::MalformedProofOrKey(_))));
    }
}
