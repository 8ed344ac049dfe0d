//! Phase 1: Powers of Tau
//!
//! A universal accumulator for circuits of up to N = 2^power constraints:
//!
//! - [τ^i]₁ for i < 2N - 1
//! - [τ^i]₂ for i < N
//! - [α τ^i]₁, [β τ^i]₁ for i < N
//! - [β]₂
//!
//! A fresh accumulator has τ = α = β = 1. Each participant multiplies in
//! secret (τ', α', β') and publishes ([τ']₂, [α']₂, [β']₂). As long as one
//! participant discards their secrets, nobody knows τ, α or β.
//!
//! Finalizing changes basis: an inverse FFT over group elements turns
//! [τ^i] into [L_i(τ)] for every domain size up to N, which is what Phase 2
//! consumes.

use rand::{CryptoRng, RngCore};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::toxic::ToxicWaste;
use crate::curve::{multi_pairing, G1Affine, G1Projective, G2Affine, G2Projective};
use crate::error::{Result, ZkError};
use crate::fft::Domain;
use crate::field::Fr;
use crate::transcript::Transcript;

/// Largest supported accumulator: BN254's Fr has 2^28-th roots of unity
pub const MAX_POWER: u32 = 28;

/// One entry of the ceremony log. Holds only public data.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    /// 1 or 2
    pub phase: u8,
    /// Position within its phase, starting at 0
    pub index: usize,
    pub participant: String,
    /// G2 images of the contribution's secret multipliers
    pub public_key: Vec<G2Affine>,
    /// Hash chaining this record to the previous one and to the artifact
    /// it produced
    pub hash: String,
}

impl ContributionRecord {
    pub(crate) fn chain_hash(
        previous: Option<&ContributionRecord>,
        phase: u8,
        index: usize,
        participant: &str,
        public_key: &[G2Affine],
        artifact_digest: &str,
    ) -> String {
        let mut t = Transcript::new(b"poseidon2-groth16/contribution");
        t.absorb_bytes("previous", previous.map_or(&[][..], |r| r.hash.as_bytes()));
        t.absorb_u64("phase", phase as u64);
        t.absorb_u64("index", index as u64);
        t.absorb_bytes("participant", participant.as_bytes());
        for p in public_key {
            t.absorb_g2("public_key", p);
        }
        t.absorb_bytes("artifact", artifact_digest.as_bytes());
        t.finalize_hex()
    }
}

/// Check that `next` is `prev` plus one record whose hash is consistent
pub(crate) fn check_appended(
    prev: &[ContributionRecord],
    next: &[ContributionRecord],
    phase: u8,
    key_len: usize,
    artifact_digest: &str,
) -> Result<ContributionRecord> {
    let mismatched = |msg: &str| Err(ZkError::SetupArtifactMismatched(msg.to_string()));

    if next.len() != prev.len() + 1 || next[..prev.len()] != *prev {
        return mismatched("contribution log is not the previous log plus one record");
    }
    let record = next[prev.len()].clone();
    let phase_index = prev.iter().filter(|r| r.phase == phase).count();
    if record.phase != phase || record.index != phase_index {
        return mismatched("contribution record has the wrong phase or index");
    }
    if record.public_key.len() != key_len || record.public_key.iter().any(|p| p.is_identity()) {
        return mismatched("contribution public key is malformed");
    }
    let expected = ContributionRecord::chain_hash(
        prev.last(),
        phase,
        record.index,
        &record.participant,
        &record.public_key,
        artifact_digest,
    );
    if expected != record.hash {
        return mismatched("contribution hash does not match");
    }
    Ok(record)
}

/// The Phase 1 accumulator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowersOfTau {
    pub power: u32,
    pub tau_g1: Vec<G1Affine>,
    pub tau_g2: Vec<G2Affine>,
    pub alpha_tau_g1: Vec<G1Affine>,
    pub beta_tau_g1: Vec<G1Affine>,
    pub beta_g2: G2Affine,
    pub contributions: Vec<ContributionRecord>,
}

impl PowersOfTau {
    /// A fresh accumulator of size 2^power (τ = α = β = 1)
    pub fn new(power: u32) -> Result<Self> {
        if power == 0 || power > MAX_POWER {
            return Err(ZkError::SetupArtifactMismatched(format!(
                "power must be in 1..={MAX_POWER}, got {power}"
            )));
        }
        let n = 1usize << power;
        let g1 = G1Affine::generator();
        let g2 = G2Affine::generator();
        Ok(PowersOfTau {
            power,
            tau_g1: vec![g1; 2 * n - 1],
            tau_g2: vec![g2; n],
            alpha_tau_g1: vec![g1; n],
            beta_tau_g1: vec![g1; n],
            beta_g2: g2,
            contributions: Vec::new(),
        })
    }

    /// N, the largest supported domain
    pub fn size(&self) -> usize {
        1 << self.power
    }

    /// Hash of every point in the accumulator
    pub fn digest(&self) -> String {
        let mut t = Transcript::new(b"poseidon2-groth16/powers-of-tau");
        t.absorb_u64("power", self.power as u64);
        for p in &self.tau_g1 {
            t.absorb_g1("tau_g1", p);
        }
        for p in &self.tau_g2 {
            t.absorb_g2("tau_g2", p);
        }
        for p in &self.alpha_tau_g1 {
            t.absorb_g1("alpha_tau_g1", p);
        }
        for p in &self.beta_tau_g1 {
            t.absorb_g1("beta_tau_g1", p);
        }
        t.absorb_g2("beta_g2", &self.beta_g2);
        t.finalize_hex()
    }

    /// Re-randomize with fresh (τ', α', β') and append a log record.
    /// The secrets are dropped before this returns.
    #[tracing::instrument(skip_all, name = "PowersOfTau::contribute", fields(power = self.power))]
    pub fn contribute<R: RngCore + CryptoRng>(&self, participant: &str, rng: &mut R) -> Result<Self> {
        let waste = ToxicWaste::<3>::sample(rng);
        let (tau, alpha, beta) = (waste.get(0), waste.get(1), waste.get(2));

        let mut powers = Zeroizing::new(Vec::with_capacity(self.tau_g1.len()));
        let mut acc = Zeroizing::new(Fr::one());
        for _ in 0..self.tau_g1.len() {
            powers.push(*acc);
            *acc *= *tau;
        }
        let n = self.size();

        let scale_g1 = |points: &[G1Affine], factor: Fr| -> Vec<G1Affine> {
            let scaled: Vec<G1Projective> = points
                .par_iter()
                .zip(powers[..].par_iter())
                .map(|(p, s)| p.to_projective() * (*s * factor))
                .collect();
            G1Projective::batch_to_affine(&scaled)
        };

        let tau_g1 = scale_g1(&self.tau_g1, Fr::one());
        let alpha_tau_g1 = scale_g1(&self.alpha_tau_g1, *alpha);
        let beta_tau_g1 = scale_g1(&self.beta_tau_g1, *beta);
        let tau_g2_proj: Vec<G2Projective> = self
            .tau_g2
            .par_iter()
            .zip(powers[..n].par_iter())
            .map(|(p, s)| p.to_projective() * *s)
            .collect();
        let tau_g2 = G2Projective::batch_to_affine(&tau_g2_proj);
        let beta_g2 = (self.beta_g2.to_projective() * *beta).to_affine();

        let g2 = G2Projective::generator();
        let public_key = vec![
            (g2 * *tau).to_affine(),
            (g2 * *alpha).to_affine(),
            (g2 * *beta).to_affine(),
        ];
        drop(powers);
        drop(waste);

        let mut next = PowersOfTau {
            power: self.power,
            tau_g1,
            tau_g2,
            alpha_tau_g1,
            beta_tau_g1,
            beta_g2,
            contributions: self.contributions.clone(),
        };
        let index = next.contributions.len();
        let hash = ContributionRecord::chain_hash(
            self.contributions.last(),
            1,
            index,
            participant,
            &public_key,
            &next.digest(),
        );
        tracing::info!(participant, index, hash = %hash, "phase 1 contribution");
        next.contributions.push(ContributionRecord {
            phase: 1,
            index,
            participant: participant.to_string(),
            public_key,
            hash,
        });
        Ok(next)
    }

    /// Internal consistency: every list is a geometric sequence in the same
    /// τ, and [β]₁ matches [β]₂. Consecutive-ratio checks are batched with
    /// coefficients derived from the accumulator's digest.
    #[tracing::instrument(skip_all, name = "PowersOfTau::verify", fields(power = self.power))]
    pub fn verify(&self) -> Result<()> {
        let mismatched = |msg: &str| Err(ZkError::SetupArtifactMismatched(msg.to_string()));

        let n = self.size();
        if self.power == 0
            || self.power > MAX_POWER
            || self.tau_g1.len() != 2 * n - 1
            || self.tau_g2.len() != n
            || self.alpha_tau_g1.len() != n
            || self.beta_tau_g1.len() != n
        {
            return mismatched("accumulator lengths do not match its power");
        }
        let g1 = G1Affine::generator();
        let g2 = G2Affine::generator();
        if self.tau_g1[0] != g1 || self.tau_g2[0] != g2 {
            return mismatched("accumulator does not start at the generators");
        }
        if self.tau_g1[1].is_identity()
            || self.alpha_tau_g1[0].is_identity()
            || self.beta_tau_g1[0].is_identity()
        {
            return mismatched("accumulator contains a degenerate secret");
        }

        let mut t = Transcript::new(b"poseidon2-groth16/powers-of-tau/verify");
        t.absorb_bytes("digest", self.digest().as_bytes());
        let rho = t.squeeze_challenges("rho", self.tau_g1.len() - 1);
        let tau_2 = self.tau_g2[1];

        for (name, points) in [
            ("tau_g1", &self.tau_g1),
            ("alpha_tau_g1", &self.alpha_tau_g1),
            ("beta_tau_g1", &self.beta_tau_g1),
        ] {
            let (lo, hi) = ratio_pair_g1(points, &rho);
            // e(Σ ρ_i P_{i+1}, [1]₂) = e(Σ ρ_i P_i, [τ]₂)
            if !multi_pairing(&[(hi, g2), (lo.neg(), tau_2)]).is_identity() {
                return Err(ZkError::SetupArtifactMismatched(format!(
                    "{name} is not a sequence of powers of tau"
                )));
            }
        }

        let m = self.tau_g2.len() - 1;
        let lo = G2Projective::msm(&self.tau_g2[..m], &rho[..m]).to_affine();
        let hi = G2Projective::msm(&self.tau_g2[1..], &rho[..m]).to_affine();
        // e([τ]₁, Σ ρ_i Q_i) = e([1]₁, Σ ρ_i Q_{i+1})
        if !multi_pairing(&[(self.tau_g1[1], lo), (g1.neg(), hi)]).is_identity() {
            return mismatched("tau_g2 is not a sequence of powers of tau");
        }

        if !multi_pairing(&[(self.beta_tau_g1[0], g2), (g1.neg(), self.beta_g2)]).is_identity() {
            return mismatched("beta in G1 and G2 disagree");
        }
        Ok(())
    }

    /// Check that `next` is `prev` with exactly one well-formed contribution
    /// applied, and that `next` is internally consistent
    pub fn verify_contribution(prev: &PowersOfTau, next: &PowersOfTau) -> Result<()> {
        if prev.power != next.power {
            return Err(ZkError::SetupArtifactMismatched(
                "accumulators have different sizes".to_string(),
            ));
        }
        let record = check_appended(&prev.contributions, &next.contributions, 1, 3, &next.digest())?;
        next.verify()?;

        let g2 = G2Affine::generator();
        let checks = [
            ("tau", next.tau_g1[1], prev.tau_g1[1], record.public_key[0]),
            ("alpha", next.alpha_tau_g1[0], prev.alpha_tau_g1[0], record.public_key[1]),
            ("beta", next.beta_tau_g1[0], prev.beta_tau_g1[0], record.public_key[2]),
        ];
        for (name, new, old, key) in checks {
            // e(new, [1]₂) = e(old, [s']₂)
            if !multi_pairing(&[(new, g2), (old.neg(), key)]).is_identity() {
                return Err(ZkError::SetupArtifactMismatched(format!(
                    "{name} update does not match the contribution public key"
                )));
            }
        }
        Ok(())
    }

    /// Change to the Lagrange basis for every domain size 2^k ≤ N.
    /// Requires at least one contribution.
    #[tracing::instrument(skip_all, name = "PowersOfTau::finalize", fields(power = self.power))]
    pub fn finalize(&self) -> Result<PreparedPowersOfTau> {
        if self.contributions.is_empty() {
            return Err(ZkError::SetupArtifactMissing(
                "phase 1 needs at least one contribution before it can be finalized".to_string(),
            ));
        }
        self.verify()?;

        let lagrange = (0..=self.power)
            .into_par_iter()
            .map(|k| self.lagrange_basis(1 << k))
            .collect::<Result<Vec<_>>>()?;

        tracing::info!(levels = lagrange.len(), "phase 1 finalized");
        Ok(PreparedPowersOfTau {
            power: self.power,
            tau_g1: self.tau_g1.clone(),
            alpha_g1: self.alpha_tau_g1[0],
            beta_g1: self.beta_tau_g1[0],
            beta_g2: self.beta_g2,
            lagrange,
            contributions: self.contributions.clone(),
        })
    }

    fn lagrange_basis(&self, size: usize) -> Result<LagrangeBasis> {
        let domain = Domain::new(size).ok_or_else(|| {
            ZkError::SetupArtifactMismatched(format!("no evaluation domain of size {size}"))
        })?;
        let g1 = |points: &[G1Affine]| {
            let proj: Vec<G1Projective> = points[..size].iter().map(|p| p.to_projective()).collect();
            G1Projective::batch_to_affine(&domain.ifft_elements(&proj))
        };
        let g2_proj: Vec<G2Projective> = self.tau_g2[..size].iter().map(|p| p.to_projective()).collect();

        Ok(LagrangeBasis {
            size,
            g1: g1(&self.tau_g1[..]),
            alpha_g1: g1(&self.alpha_tau_g1[..]),
            beta_g1: g1(&self.beta_tau_g1[..]),
            g2: G2Projective::batch_to_affine(&domain.ifft_elements(&g2_proj)),
        })
    }
}

/// Split a point list into the two batched sums Σ ρ_i P_i and Σ ρ_i P_{i+1}
fn ratio_pair_g1(points: &[G1Affine], rho: &[Fr]) -> (G1Affine, G1Affine) {
    let m = points.len() - 1;
    let lo = G1Projective::msm(&points[..m], &rho[..m]).to_affine();
    let hi = G1Projective::msm(&points[1..], &rho[..m]).to_affine();
    (lo, hi)
}

/// [L_i(τ)] over the domain of one size
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LagrangeBasis {
    pub size: usize,
    pub g1: Vec<G1Affine>,
    pub alpha_g1: Vec<G1Affine>,
    pub beta_g1: Vec<G1Affine>,
    pub g2: Vec<G2Affine>,
}

/// Finalized Phase 1 output, ready to be bound to a circuit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedPowersOfTau {
    pub power: u32,
    /// Monomial powers, kept for the H query
    pub tau_g1: Vec<G1Affine>,
    pub alpha_g1: G1Affine,
    pub beta_g1: G1Affine,
    pub beta_g2: G2Affine,
    /// Entry k holds the basis for the domain of size 2^k
    pub lagrange: Vec<LagrangeBasis>,
    pub contributions: Vec<ContributionRecord>,
}

impl PreparedPowersOfTau {
    pub fn size(&self) -> usize {
        1 << self.power
    }

    /// Basis for a domain of exactly `size` elements
    pub fn lagrange_basis(&self, size: usize) -> Option<&LagrangeBasis> {
        if !size.is_power_of_two() {
            return None;
        }
        self.lagrange.get(size.trailing_zeros() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    fn contributed(power: u32, participants: usize) -> Vec<PowersOfTau> {
        let mut rng = ChaCha20Rng::seed_from_u64(42);
        let mut chain = vec![PowersOfTau::new(power).unwrap()];
        for i in 0..participants {
            let next = chain[i].contribute(&format!("participant-{i}"), &mut rng).unwrap();
            chain.push(next);
        }
        chain
    }

    #[test]
    fn test_fresh_accumulator_is_consistent() {
        let acc = PowersOfTau::new(3).unwrap();
        assert_eq!(acc.tau_g1.len(), 15);
        assert_eq!(acc.tau_g2.len(), 8);
        assert!(acc.verify().is_ok());
        assert!(PowersOfTau::new(0).is_err());
        assert!(PowersOfTau::new(MAX_POWER + 1).is_err());
    }

    #[test]
    fn test_contributions_verify() {
        let chain = contributed(4, 3);
        for pair in chain.windows(2) {
            PowersOfTau::verify_contribution(&pair[0], &pair[1]).unwrap();
        }
        let last = chain.last().unwrap();
        assert_eq!(last.contributions.len(), 3);
        assert_eq!(last.contributions[2].index, 2);
        assert_ne!(last.tau_g1[1], G1Affine::generator());
    }

    #[test]
    fn test_tampered_accumulator_is_rejected() {
        let chain = contributed(3, 1);
        let mut bad = chain[1].clone();
        bad.tau_g1[5] = bad.tau_g1[4];
        assert!(matches!(bad.verify(), Err(ZkError::SetupArtifactMismatched(_))));
        assert!(PowersOfTau::verify_contribution(&chain[0], &bad).is_err());

        let mut bad = chain[1].clone();
        bad.beta_g2 = G2Affine::generator();
        assert!(bad.verify().is_err());
    }

    #[test]
    fn test_forged_record_is_rejected() {
        let chain = contributed(3, 1);
        let mut forged = chain[1].clone();
        forged.contributions[0].participant = "someone else".into();
        assert!(PowersOfTau::verify_contribution(&chain[0], &forged).is_err());

        let mut forged = chain[1].clone();
        forged.contributions[0].public_key[0] = G2Affine::generator();
        assert!(PowersOfTau::verify_contribution(&chain[0], &forged).is_err());

        // skipping a contribution breaks the chain
        let chain = contributed(3, 2);
        assert!(PowersOfTau::verify_contribution(&chain[0], &chain[2]).is_err());
    }

    #[test]
    fn test_finalize_requires_contribution() {
        let acc = PowersOfTau::new(3).unwrap();
        assert!(matches!(acc.finalize(), Err(ZkError::SetupArtifactMissing(_))));
    }

    #[test]
    fn test_lagrange_basis_sums_to_generator() {
        // Σ L_i(τ) = 1 on any domain
        let chain = contributed(3, 1);
        let prepared = chain[1].finalize().unwrap();
        assert_eq!(prepared.lagrange.len(), 4);

        for k in 0..=3 {
            let basis = prepared.lagrange_basis(1 << k).unwrap();
            let sum = basis
                .g1
                .iter()
                .fold(G1Projective::identity(), |acc, p| acc + p.to_projective());
            assert_eq!(sum.to_affine(), G1Affine::generator());

            let sum_alpha = basis
                .alpha_g1
                .iter()
                .fold(G1Projective::identity(), |acc, p| acc + p.to_projective());
            assert_eq!(sum_alpha.to_affine(), prepared.alpha_g1);
        }
        assert!(prepared.lagrange_basis(16).is_none());
        assert!(prepared.lagrange_basis(3).is_none());
    }
}
