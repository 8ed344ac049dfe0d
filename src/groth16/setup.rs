//! Phase 2: Circuit-Specific Setup
//!
//! Binds a finalized Powers of Tau to one constraint system. The QAP is
//! read straight off the matrices: constraint i lives at ω^i, and one extra
//! A-row per input variable (the constant one and each public signal) lives
//! after the constraints so the IC points stay linearly independent.
//!
//! Key material (γ = δ = 1 before any contribution):
//! - a_query:  [u_j(τ)]₁
//! - b_query:  [v_j(τ)]₁, [v_j(τ)]₂
//! - IC:       [β u_j(τ) + α v_j(τ) + w_j(τ)]₁ / γ  for inputs
//! - l_query:  [β u_j(τ) + α v_j(τ) + w_j(τ)]₁ / δ  for everything else
//! - h_query:  [τ^i Z(τ)]₁ / δ                     for i < n - 1
//!
//! Contributions only touch δ, so every participant can re-randomize the
//! key without knowing anything about the circuit.

use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use zeroize::Zeroizing;

use super::powers_of_tau::{check_appended, ContributionRecord, LagrangeBasis, PreparedPowersOfTau};
use super::toxic::ToxicWaste;
use super::types::{ProvingKey, VerifyingKey, CURVE, PROTOCOL};
use crate::circuit::ConstraintMatrices;
use crate::curve::{multi_pairing, G1Affine, G1Projective, G2Affine, G2Projective};
use crate::error::{Result, ZkError};
use crate::field::Fr;
use crate::transcript::Transcript;

/// Per-variable QAP columns: (row, coefficient) pairs
struct QapColumns {
    a: Vec<Vec<(usize, Fr)>>,
    b: Vec<Vec<(usize, Fr)>>,
    c: Vec<Vec<(usize, Fr)>>,
}

impl QapColumns {
    fn from_matrices(matrices: &ConstraintMatrices) -> Self {
        let m = matrices.n_variables;
        let mut columns = QapColumns {
            a: vec![Vec::new(); m],
            b: vec![Vec::new(); m],
            c: vec![Vec::new(); m],
        };
        for (row, [a, b, c]) in matrices.constraints.iter().enumerate() {
            for (var, coeff) in a {
                columns.a[*var].push((row, *coeff));
            }
            for (var, coeff) in b {
                columns.b[*var].push((row, *coeff));
            }
            for (var, coeff) in c {
                columns.c[*var].push((row, *coeff));
            }
        }
        let offset = matrices.num_constraints();
        for (j, var) in matrices.input_indices().into_iter().enumerate() {
            columns.a[var].push((offset + j, Fr::one()));
        }
        columns
    }
}

/// QAP domain size for a constraint system
pub fn domain_size(matrices: &ConstraintMatrices) -> usize {
    (matrices.num_constraints() + matrices.num_public() + 1).next_power_of_two()
}

fn column_g1(bases: &[G1Affine], column: &[(usize, Fr)]) -> G1Projective {
    let points: Vec<G1Affine> = column.iter().map(|(row, _)| bases[*row]).collect();
    let scalars: Vec<Fr> = column.iter().map(|(_, c)| *c).collect();
    G1Projective::msm(&points, &scalars)
}

fn column_g2(bases: &[G2Affine], column: &[(usize, Fr)]) -> G2Projective {
    let points: Vec<G2Affine> = column.iter().map(|(row, _)| bases[*row]).collect();
    let scalars: Vec<Fr> = column.iter().map(|(_, c)| *c).collect();
    G2Projective::msm(&points, &scalars)
}

/// Hash of every point a Phase 2 contribution can change, plus the circuit
/// digest it is bound to
pub fn proving_key_digest(pk: &ProvingKey) -> String {
    let mut t = Transcript::new(b"poseidon2-groth16/proving-key");
    t.absorb_bytes("circuit", pk.circuit_digest.as_bytes());
    t.absorb_u64("domain_size", pk.domain_size as u64);
    t.absorb_g1("alpha", &pk.alpha_g1);
    t.absorb_g1("beta", &pk.beta_g1);
    t.absorb_g2("beta", &pk.beta_g2);
    t.absorb_g1("delta", &pk.delta_g1);
    t.absorb_g2("delta", &pk.delta_g2);
    for p in &pk.vk.ic {
        t.absorb_g1("ic", p);
    }
    for p in &pk.l_query {
        t.absorb_g1("l", p);
    }
    for p in &pk.h_query {
        t.absorb_g1("h", p);
    }
    t.finalize_hex()
}

/// Phase 2 state: the current proving key and the full ceremony log
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Phase2Params {
    pub proving_key: ProvingKey,
    pub contributions: Vec<ContributionRecord>,
}

impl Phase2Params {
    /// Derive the initial keys for `matrices` from a finalized Phase 1
    #[tracing::instrument(skip_all, name = "Phase2Params::new")]
    pub fn new(prepared: &PreparedPowersOfTau, matrices: &ConstraintMatrices) -> Result<Self> {
        matrices.validate()?;
        let n = domain_size(matrices);
        if n > prepared.size() {
            return Err(ZkError::SetupArtifactMismatched(format!(
                "circuit needs a domain of {n} but phase 1 supports at most {}",
                prepared.size()
            )));
        }
        let basis: &LagrangeBasis = prepared.lagrange_basis(n).ok_or_else(|| {
            ZkError::SetupArtifactMissing(format!("phase 1 has no Lagrange basis of size {n}"))
        })?;
        if basis.g1.len() != n || prepared.tau_g1.len() < 2 * n - 1 {
            return Err(ZkError::SetupArtifactMismatched(
                "phase 1 basis has the wrong length".to_string(),
            ));
        }

        let columns = QapColumns::from_matrices(matrices);
        let vars: Vec<usize> = (0..matrices.n_variables).collect();

        let a_query: Vec<G1Projective> = vars
            .par_iter()
            .map(|&j| column_g1(&basis.g1, &columns.a[j]))
            .collect();
        let b_g1_query: Vec<G1Projective> = vars
            .par_iter()
            .map(|&j| column_g1(&basis.g1, &columns.b[j]))
            .collect();
        let b_g2_query: Vec<G2Projective> = vars
            .par_iter()
            .map(|&j| column_g2(&basis.g2, &columns.b[j]))
            .collect();
        let k_query: Vec<G1Projective> = vars
            .par_iter()
            .map(|&j| {
                column_g1(&basis.beta_g1, &columns.a[j])
                    + column_g1(&basis.alpha_g1, &columns.b[j])
                    + column_g1(&basis.g1, &columns.c[j])
            })
            .collect();
        let k_query = G1Projective::batch_to_affine(&k_query);

        let ic: Vec<G1Affine> = matrices.input_indices().iter().map(|&j| k_query[j]).collect();
        let l_query: Vec<G1Affine> = matrices.witness_indices().iter().map(|&j| k_query[j]).collect();

        // τ^i (τ^n - 1) = τ^{i+n} - τ^i
        let h_query: Vec<G1Projective> = (0..n - 1)
            .into_par_iter()
            .map(|i| prepared.tau_g1[i + n].to_projective() - prepared.tau_g1[i].to_projective())
            .collect();

        let g1 = G1Affine::generator();
        let g2 = G2Affine::generator();
        let vk = VerifyingKey {
            protocol: PROTOCOL.to_string(),
            curve: CURVE.to_string(),
            n_public: matrices.num_public(),
            vk_alpha_1: prepared.alpha_g1,
            vk_beta_2: prepared.beta_g2,
            vk_gamma_2: g2,
            vk_delta_2: g2,
            ic,
        };
        let proving_key = ProvingKey {
            circuit_digest: matrices.digest(),
            domain_size: n,
            matrices: matrices.clone(),
            alpha_g1: prepared.alpha_g1,
            beta_g1: prepared.beta_g1,
            beta_g2: prepared.beta_g2,
            delta_g1: g1,
            delta_g2: g2,
            a_query: G1Projective::batch_to_affine(&a_query),
            b_g1_query: G1Projective::batch_to_affine(&b_g1_query),
            b_g2_query: G2Projective::batch_to_affine(&b_g2_query),
            h_query: G1Projective::batch_to_affine(&h_query),
            l_query,
            vk,
        };
        proving_key.validate()?;

        tracing::info!(
            domain_size = n,
            variables = matrices.n_variables,
            constraints = matrices.num_constraints(),
            public = matrices.num_public(),
            "phase 2 keys generated"
        );
        Ok(Phase2Params {
            proving_key,
            contributions: prepared.contributions.clone(),
        })
    }

    pub fn phase2_contributions(&self) -> usize {
        self.contributions.iter().filter(|r| r.phase == 2).count()
    }

    /// Re-randomize δ and append a log record
    #[tracing::instrument(skip_all, name = "Phase2Params::contribute")]
    pub fn contribute<R: RngCore + CryptoRng>(&self, participant: &str, rng: &mut R) -> Result<Self> {
        let waste = ToxicWaste::<1>::sample(rng);
        let delta = waste.get(0);
        let delta_inv = Zeroizing::new(delta.inverse().ok_or_else(|| {
            ZkError::SetupArtifactMismatched("sampled a non-invertible delta".to_string())
        })?);

        let pk = &self.proving_key;
        let scale = |points: &[G1Affine]| -> Vec<G1Affine> {
            let scaled: Vec<G1Projective> = points
                .par_iter()
                .map(|p| p.to_projective() * *delta_inv)
                .collect();
            G1Projective::batch_to_affine(&scaled)
        };

        let mut next = pk.clone();
        next.delta_g1 = (pk.delta_g1.to_projective() * *delta).to_affine();
        next.delta_g2 = (pk.delta_g2.to_projective() * *delta).to_affine();
        next.vk.vk_delta_2 = next.delta_g2;
        next.l_query = scale(&pk.l_query[..]);
        next.h_query = scale(&pk.h_query[..]);
        let public_key = vec![(G2Projective::generator() * *delta).to_affine()];
        drop(delta_inv);
        drop(waste);

        let index = self.phase2_contributions();
        let hash = ContributionRecord::chain_hash(
            self.contributions.last(),
            2,
            index,
            participant,
            &public_key,
            &proving_key_digest(&next),
        );
        tracing::info!(participant, index, hash = %hash, "phase 2 contribution");

        let mut contributions = self.contributions.clone();
        contributions.push(ContributionRecord {
            phase: 2,
            index,
            participant: participant.to_string(),
            public_key,
            hash,
        });
        Ok(Phase2Params {
            proving_key: next,
            contributions,
        })
    }

    /// Check that `next` is `prev` with one δ contribution applied and
    /// nothing else changed
    #[tracing::instrument(skip_all, name = "Phase2Params::verify_contribution")]
    pub fn verify_contribution(prev: &Phase2Params, next: &Phase2Params) -> Result<()> {
        let mismatched = |msg: &str| Err(ZkError::SetupArtifactMismatched(msg.to_string()));
        let (p, q) = (&prev.proving_key, &next.proving_key);

        let record = check_appended(
            &prev.contributions,
            &next.contributions,
            2,
            1,
            &proving_key_digest(q),
        )?;
        q.validate()?;

        let mut q_vk = q.vk.clone();
        q_vk.vk_delta_2 = p.vk.vk_delta_2;
        if p.circuit_digest != q.circuit_digest
            || p.domain_size != q.domain_size
            || p.matrices != q.matrices
            || p.alpha_g1 != q.alpha_g1
            || p.beta_g1 != q.beta_g1
            || p.beta_g2 != q.beta_g2
            || p.a_query != q.a_query
            || p.b_g1_query != q.b_g1_query
            || p.b_g2_query != q.b_g2_query
            || p.l_query.len() != q.l_query.len()
            || p.h_query.len() != q.h_query.len()
            || p.vk.vk_delta_2 != p.delta_g2
            || q_vk != p.vk
        {
            return mismatched("contribution changed more than delta");
        }
        if q.vk.vk_delta_2 != q.delta_g2 {
            return mismatched("verifying key delta disagrees with the proving key");
        }

        let g1 = G1Affine::generator();
        let g2 = G2Affine::generator();
        // e(δ_new, 1) = e(δ_old, δ'), and δ agrees across groups
        if !multi_pairing(&[(q.delta_g1, g2), (p.delta_g1.neg(), record.public_key[0])]).is_identity()
            || !multi_pairing(&[(q.delta_g1, g2), (g1.neg(), q.delta_g2)]).is_identity()
        {
            return mismatched("delta update does not match the contribution public key");
        }

        // L and H were divided by the same δ': e(Σρ X_new, δ_new) = e(Σρ X_old, δ_old)
        let mut t = Transcript::new(b"poseidon2-groth16/phase2/verify");
        t.absorb_bytes("prev", proving_key_digest(p).as_bytes());
        t.absorb_bytes("next", record.hash.as_bytes());
        let rho = t.squeeze_challenges("rho", p.l_query.len() + p.h_query.len());

        let old: Vec<G1Affine> = p.l_query.iter().chain(&p.h_query).copied().collect();
        let new: Vec<G1Affine> = q.l_query.iter().chain(&q.h_query).copied().collect();
        let old = G1Projective::msm(&old, &rho).to_affine();
        let new = G1Projective::msm(&new, &rho).to_affine();
        if !multi_pairing(&[(new, q.delta_g2), (old.neg(), p.delta_g2)]).is_identity() {
            return mismatched("L and H queries were not rescaled by the contributed delta");
        }
        Ok(())
    }

    /// Final keys. Requires at least one Phase 2 contribution.
    pub fn export(&self) -> Result<(ProvingKey, VerifyingKey)> {
        if self.phase2_contributions() == 0 {
            return Err(ZkError::SetupArtifactMissing(
                "phase 2 needs at least one contribution before export".to_string(),
            ));
        }
        self.proving_key.validate()?;
        Ok((self.proving_key.clone(), self.proving_key.vk.clone()))
    }
}
