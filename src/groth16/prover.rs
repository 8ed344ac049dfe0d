//! Groth16 Prover
//!
//! 1. Check the witness against the constraint matrices in the key
//! 2. Evaluate A·w, B·w, C·w over the domain (plus the input rows)
//! 3. h(X) = (a(X)·b(X) - c(X)) / Z(X), computed on the coset gH
//! 4. Three MSMs with fresh blinding r, s:
//!    - π_A = α + Σ w_j A_j + r·δ
//!    - π_B = β + Σ w_j B_j + s·δ            (in G2, and its twin B₁ in G1)
//!    - π_C = Σ_private w_j L_j + Σ h_i H_i + s·π_A + r·B₁ - r·s·δ

use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use rayon::prelude::*;

use super::types::{Proof, ProvingKey};
use crate::circuit::constraint::eval_row;
use crate::circuit::Witness;
use crate::curve::{G1Projective, G2Projective};
use crate::error::{Result, ZkError};
use crate::fft::Domain;
use crate::field::Fr;

/// The Groth16 prover for one proving key
pub struct Prover<'a> {
    pk: &'a ProvingKey,
    domain: Domain,
}

impl<'a> Prover<'a> {
    pub fn new(pk: &'a ProvingKey) -> Result<Self> {
        pk.validate()?;
        let domain = Domain::new(pk.domain_size).ok_or_else(|| {
            ZkError::SetupArtifactMismatched(format!("no evaluation domain of size {}", pk.domain_size))
        })?;
        Ok(Prover { pk, domain })
    }

    /// Prove with blinding drawn from a freshly seeded ChaCha20 stream.
    /// Returns the proof and the public signals it commits to.
    pub fn prove(&self, witness: &Witness) -> Result<(Proof, Vec<Fr>)> {
        let mut rng = ChaCha20Rng::from_entropy();
        self.prove_with_rng(witness, &mut rng)
    }

    #[tracing::instrument(skip_all, name = "Prover::prove")]
    pub fn prove_with_rng<R: RngCore + CryptoRng>(
        &self,
        witness: &Witness,
        rng: &mut R,
    ) -> Result<(Proof, Vec<Fr>)> {
        let pk = self.pk;
        let matrices = &pk.matrices;
        let w = &witness.values;

        if w.len() != pk.num_variables() {
            return Err(ZkError::SetupArtifactMismatched(format!(
                "witness has {} values, proving key expects {}",
                w.len(),
                pk.num_variables()
            )));
        }
        if !w[0].is_one() {
            return Err(ZkError::MalformedInput("witness must start with the constant one".into()));
        }
        matrices.is_satisfied(w)?;

        let h = self.compute_h(w)?;

        let r = Fr::random(rng);
        let s = Fr::random(rng);

        let private: Vec<Fr> = matrices.witness_indices().iter().map(|&j| w[j]).collect();
        let ((a_sum, b1_sum), (b2_sum, (l_sum, h_sum))) = rayon::join(
            || {
                rayon::join(
                    || G1Projective::msm(&pk.a_query, w),
                    || G1Projective::msm(&pk.b_g1_query, w),
                )
            },
            || {
                rayon::join(
                    || G2Projective::msm(&pk.b_g2_query, w),
                    || {
                        rayon::join(
                            || G1Projective::msm(&pk.l_query, &private),
                            || G1Projective::msm(&pk.h_query, &h),
                        )
                    },
                )
            },
        );

        let delta_g1 = pk.delta_g1.to_projective();
        let pi_a = pk.alpha_g1.to_projective() + a_sum + delta_g1 * r;
        let pi_b = pk.beta_g2.to_projective() + b2_sum + pk.delta_g2.to_projective() * s;
        let b1 = pk.beta_g1.to_projective() + b1_sum + delta_g1 * s;
        let pi_c = l_sum + h_sum + pi_a * s + b1 * r - delta_g1 * (r * s);

        let public: Vec<Fr> = matrices.public_inputs.iter().map(|&j| w[j]).collect();
        tracing::debug!(
            variables = w.len(),
            public = public.len(),
            domain_size = self.domain.n,
            "proof generated"
        );
        Ok((Proof::new(pi_a.to_affine(), pi_b.to_affine(), pi_c.to_affine()), public))
    }

    /// Prove many witnesses in parallel. Witness i draws its blinding from
    /// stream i of a ChaCha20 generator seeded with `seed`.
    #[tracing::instrument(skip_all, name = "Prover::prove_batch", fields(count = witnesses.len()))]
    pub fn prove_batch(&self, witnesses: &[Witness], seed: u64) -> Result<Vec<(Proof, Vec<Fr>)>> {
        witnesses
            .par_iter()
            .enumerate()
            .map(|(i, witness)| {
                let mut rng = ChaCha20Rng::seed_from_u64(seed);
                rng.set_stream(i as u64);
                self.prove_with_rng(witness, &mut rng)
            })
            .collect()
    }

    /// Coefficients of h(X), n - 1 of them
    fn compute_h(&self, w: &[Fr]) -> Result<Vec<Fr>> {
        let matrices = &self.pk.matrices;
        let domain = &self.domain;
        let n = domain.n;

        let mut a = vec![Fr::zero(); n];
        let mut b = vec![Fr::zero(); n];
        let mut c = vec![Fr::zero(); n];
        for (i, [ra, rb, rc]) in matrices.constraints.iter().enumerate() {
            a[i] = eval_row(ra, w);
            b[i] = eval_row(rb, w);
            c[i] = eval_row(rc, w);
        }
        let offset = matrices.num_constraints();
        for (j, var) in matrices.input_indices().into_iter().enumerate() {
            a[offset + j] = w[var];
        }

        let g = Fr::multiplicative_generator();
        let on_coset = |evals: &[Fr]| domain.coset_fft(&domain.ifft(evals), g);
        let ((a, b), c) = rayon::join(
            || rayon::join(|| on_coset(&a[..]), || on_coset(&b[..])),
            || on_coset(&c[..]),
        );

        // Z is the constant g^n - 1 on the whole coset
        let z_inv = domain.vanishing_eval(&g).inverse().ok_or_else(|| {
            ZkError::SetupArtifactMismatched("coset generator lies in the domain".to_string())
        })?;
        let quotient: Vec<Fr> = a
            .par_iter()
            .zip(b.par_iter())
            .zip(c.par_iter())
            .map(|((a, b), c)| (*a * *b - *c) * z_inv)
            .collect();

        let mut h = domain.coset_ifft(&quotient, g);
        h.truncate(n - 1);
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{LinearHashCircuit, WitnessGenerator, WitnessInput};
    use crate::groth16::test_keys;
    use crate::groth16::verifier::verify;

    fn mock_witness(p0: u64, p1: u64) -> Witness {
        let (p0, p1) = (Fr::from_u64(p0), Fr::from_u64(p1));
        let input = WitnessInput::new()
            .with_array("preimage", &[p0, p1])
            .with("hash", LinearHashCircuit::hash(p0, p1));
        WitnessGenerator::generate(&LinearHashCircuit, &input).unwrap()
    }

    #[test]
    fn test_proof_verifies() {
        let (pk, vk) = test_keys(&LinearHashCircuit, 21);
        let prover = Prover::new(&pk).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(1);

        let (proof, public) = prover.prove_with_rng(&mock_witness(123, 456), &mut rng).unwrap();
        assert_eq!(public, vec![Fr::from_u64(1614)]);
        assert!(verify(&vk, &public, &proof));
    }

    #[test]
    fn test_blinding_changes_proof() {
        let (pk, vk) = test_keys(&LinearHashCircuit, 22);
        let prover = Prover::new(&pk).unwrap();
        let witness = mock_witness(1, 2);

        let (p1, public) = prover.prove(&witness).unwrap();
        let (p2, _) = prover.prove(&witness).unwrap();
        assert_ne!(p1.pi_a, p2.pi_a);
        assert!(verify(&vk, &public, &p1));
        assert!(verify(&vk, &public, &p2));
    }

    #[test]
    fn test_rejects_bad_witness() {
        let (pk, _) = test_keys(&LinearHashCircuit, 23);
        let prover = Prover::new(&pk).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(2);

        let mut short = mock_witness(1, 2);
        short.values.pop();
        assert!(matches!(
            prover.prove_with_rng(&short, &mut rng),
            Err(ZkError::SetupArtifactMismatched(_))
        ));

        let mut wrong = mock_witness(1, 2);
        wrong.values[1] += Fr::one();
        assert!(matches!(
            prover.prove_with_rng(&wrong, &mut rng),
            Err(ZkError::ConstraintViolation { index: 0, .. })
        ));
    }

    #[test]
    fn test_batch_proving() {
        let (pk, vk) = test_keys(&LinearHashCircuit, 24);
        let prover = Prover::new(&pk).unwrap();
        let witnesses: Vec<Witness> = (0..4).map(|i| mock_witness(i, i + 10)).collect();

        let proofs = prover.prove_batch(&witnesses, 99).unwrap();
        assert_eq!(proofs.len(), 4);
        for (proof, public) in &proofs {
            assert!(verify(&vk, public, proof));
        }
        assert_ne!(proofs[0].0, proofs[1].0);

        // same seed, same proofs
        assert_eq!(prover.prove_batch(&witnesses, 99).unwrap(), proofs);
    }

    #[test]
    fn test_rejects_inconsistent_key() {
        let (mut pk, _) = test_keys(&LinearHashCircuit, 25);
        pk.h_query.pop();
        assert!(Prover::new(&pk).is_err());
    }
}
