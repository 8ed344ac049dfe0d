//! Poseidon2 Parameters and Native Permutation
//!
//! Parameters for the Poseidon2 permutation over the BN254 scalar field:
//! - State width t ∈ {2, 3} (capacity 1, rate t - 1)
//! - S-box x^d with d = 5, the smallest exponent that is a permutation of Fr
//! - R_F = 8 full rounds (4 at the beginning, 4 at the end)
//! - R_P = 56 partial rounds
//!
//! Round constants are expanded from a ChaCha20 stream seeded with the
//! SHA-256 digest of a parameter label, so anyone can regenerate them.

use num_bigint::BigUint;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, ZkError};
use crate::field::Fr;

/// Total number of full rounds (split evenly at start and end)
pub const FULL_ROUNDS: usize = 8;

/// Number of partial rounds
pub const PARTIAL_ROUNDS: usize = 56;

/// S-box exponent
pub const ALPHA: u64 = 5;

/// Supported state widths
pub const SUPPORTED_WIDTHS: [usize; 2] = [2, 3];

/// Which lanes a round sends through the S-box
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundKind {
    /// Every lane
    Full,
    /// Lane 0 only
    Partial,
}

/// Fixed parameters of one Poseidon2 instance
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poseidon2Params {
    /// State width
    pub t: usize,
    /// S-box exponent
    pub d: u64,
    pub rounds_full: usize,
    pub rounds_partial: usize,
    /// One vector of t constants per round, in round order
    pub round_constants: Vec<Vec<Fr>>,
    /// t×t linear layer
    pub mds: Vec<Vec<Fr>>,
}

impl Poseidon2Params {
    /// Build and validate a parameter set
    pub fn new(
        t: usize,
        d: u64,
        rounds_full: usize,
        rounds_partial: usize,
        round_constants: Vec<Vec<Fr>>,
        mds: Vec<Vec<Fr>>,
    ) -> Result<Self> {
        let params = Poseidon2Params {
            t,
            d,
            rounds_full,
            rounds_partial,
            round_constants,
            mds,
        };
        params.validate()?;
        Ok(params)
    }

    /// The default BN254 instance of width t
    pub fn bn254(t: usize) -> Result<Self> {
        if !SUPPORTED_WIDTHS.contains(&t) {
            return Err(ZkError::MalformedCircuitDefinition(format!(
                "state width {t} is not supported (expected 2 or 3)"
            )));
        }
        let round_constants = generate_round_constants(t, ALPHA, FULL_ROUNDS, PARTIAL_ROUNDS);
        Self::new(t, ALPHA, FULL_ROUNDS, PARTIAL_ROUNDS, round_constants, default_mds(t))
    }

    /// Elements absorbed per permutation
    pub fn rate(&self) -> usize {
        self.t - 1
    }

    pub fn total_rounds(&self) -> usize {
        self.rounds_full + self.rounds_partial
    }

    /// Round order: R_F/2 full, R_P partial, R_F/2 full
    pub fn schedule(&self) -> impl Iterator<Item = (usize, RoundKind)> {
        let half = self.rounds_full / 2;
        let partial_end = half + self.rounds_partial;
        (0..self.total_rounds()).map(move |r| {
            let kind = if r < half || r >= partial_end {
                RoundKind::Full
            } else {
                RoundKind::Partial
            };
            (r, kind)
        })
    }

    /// Number of multiplication constraints one S-box costs
    pub fn sbox_cost(&self) -> usize {
        sbox_chain(self.d).len()
    }

    /// Multiplication constraints of the whole permutation
    pub fn constraint_count(&self) -> usize {
        (self.t * self.rounds_full + self.rounds_partial) * self.sbox_cost()
    }

    pub fn validate(&self) -> Result<()> {
        let malformed = |msg: String| Err(ZkError::MalformedCircuitDefinition(msg));

        if !SUPPORTED_WIDTHS.contains(&self.t) {
            return malformed(format!("state width {} is not supported", self.t));
        }
        if self.rounds_full == 0 || self.rounds_full % 2 != 0 {
            return malformed(format!(
                "full round count must be even and positive, got {}",
                self.rounds_full
            ));
        }
        if !is_permutation_exponent(self.d) {
            return malformed(format!("x^{} is not a permutation of the field", self.d));
        }
        if self.round_constants.len() != self.total_rounds() {
            return malformed(format!(
                "expected {} round constant vectors, got {}",
                self.total_rounds(),
                self.round_constants.len()
            ));
        }
        if let Some(r) = self.round_constants.iter().position(|rc| rc.len() != self.t) {
            return malformed(format!("round constants of round {r} do not have width {}", self.t));
        }
        if self.mds.len() != self.t || self.mds.iter().any(|row| row.len() != self.t) {
            return malformed(format!("linear layer is not {0}x{0}", self.t));
        }
        if !is_mds(&self.mds) {
            return malformed("linear layer is not maximum distance separable".to_string());
        }
        Ok(())
    }
}

/// circ(2, 1) and circ(2, 1, 1)
fn default_mds(t: usize) -> Vec<Vec<Fr>> {
    (0..t)
        .map(|i| {
            (0..t)
                .map(|j| if i == j { Fr::from_u64(2) } else { Fr::one() })
                .collect()
        })
        .collect()
}

/// Expand round constants from the parameter label
/// `Poseidon2_BN254_t{t}_d{d}_RF{rf}_RP{rp}`
pub fn generate_round_constants(t: usize, d: u64, rf: usize, rp: usize) -> Vec<Vec<Fr>> {
    let label = format!("Poseidon2_BN254_t{t}_d{d}_RF{rf}_RP{rp}");
    let seed: [u8; 32] = Sha256::digest(label.as_bytes()).into();
    let mut rng = ChaCha20Rng::from_seed(seed);

    (0..rf + rp)
        .map(|_| (0..t).map(|_| Fr::random(&mut rng)).collect())
        .collect()
}

/// x ↦ x^d permutes Fr iff gcd(d, p - 1) = 1. Only odd primes are accepted.
fn is_permutation_exponent(d: u64) -> bool {
    let is_odd_prime = d >= 3 && d % 2 == 1 && (3..).step_by(2).take_while(|k| k * k <= d).all(|k| d % k != 0);
    if !is_odd_prime {
        return false;
    }
    match BigUint::parse_bytes(Fr::MODULUS_DECIMAL.as_bytes(), 10) {
        Some(p) => (p - 1u32) % d != BigUint::from(0u32),
        None => false,
    }
}

/// Every square submatrix is nonsingular
fn is_mds(matrix: &[Vec<Fr>]) -> bool {
    let n = matrix.len();
    (1..=n).all(|k| {
        subsets(n, k).iter().all(|rows| {
            subsets(n, k).iter().all(|cols| {
                let sub: Vec<Vec<Fr>> = rows
                    .iter()
                    .map(|&r| cols.iter().map(|&c| matrix[r][c]).collect())
                    .collect();
                !determinant(sub).is_zero()
            })
        })
    })
}

fn subsets(n: usize, k: usize) -> Vec<Vec<usize>> {
    (0u32..1 << n)
        .filter(|mask| mask.count_ones() as usize == k)
        .map(|mask| (0..n).filter(|i| mask & (1 << i) != 0).collect())
        .collect()
}

/// Determinant by Gaussian elimination
fn determinant(mut m: Vec<Vec<Fr>>) -> Fr {
    let n = m.len();
    let mut det = Fr::one();
    for col in 0..n {
        let Some(pivot) = (col..n).find(|&r| !m[r][col].is_zero()) else {
            return Fr::zero();
        };
        if pivot != col {
            m.swap(pivot, col);
            det = -det;
        }
        det *= m[col][col];
        let Some(inv) = m[col][col].inverse() else {
            return Fr::zero();
        };
        for r in col + 1..n {
            let factor = m[r][col] * inv;
            for c in col..n {
                let sub = factor * m[col][c];
                m[r][c] -= sub;
            }
        }
    }
    det
}

/// One step of the S-box addition chain
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainStep {
    /// acc ← acc · acc
    Square,
    /// acc ← acc · x
    MulInput,
}

/// Left-to-right square-and-multiply over the bits of d, starting from
/// acc = x. For d = 5 this is [Square, Square, MulInput].
pub fn sbox_chain(d: u64) -> Vec<ChainStep> {
    let bits = 64 - d.leading_zeros();
    let mut steps = Vec::new();
    for i in (0..bits.saturating_sub(1)).rev() {
        steps.push(ChainStep::Square);
        if (d >> i) & 1 == 1 {
            steps.push(ChainStep::MulInput);
        }
    }
    steps
}

/// The native (out-of-circuit) permutation
#[derive(Clone, Debug)]
pub struct Poseidon2 {
    params: Poseidon2Params,
}

impl Poseidon2 {
    pub fn new(params: Poseidon2Params) -> Result<Self> {
        params.validate()?;
        Ok(Poseidon2 { params })
    }

    pub fn params(&self) -> &Poseidon2Params {
        &self.params
    }

    /// Apply the full permutation to a width-t state
    pub fn permute(&self, state: &[Fr]) -> Result<Vec<Fr>> {
        let p = &self.params;
        if state.len() != p.t {
            return Err(ZkError::MalformedInput(format!(
                "state has {} elements, permutation width is {}",
                state.len(),
                p.t
            )));
        }

        let mut state = state.to_vec();
        for (r, kind) in p.schedule() {
            for (lane, c) in state.iter_mut().zip(&p.round_constants[r]) {
                *lane += *c;
            }
            match kind {
                RoundKind::Full => state.iter_mut().for_each(|x| *x = x.pow(p.d)),
                RoundKind::Partial => state[0] = state[0].pow(p.d),
            }
            state = mds_multiply(&p.mds, &state);
        }
        Ok(state)
    }

    /// Permute (capacity || input) and return the first rate element
    pub fn hash(&self, capacity: Fr, input: &[Fr]) -> Result<Fr> {
        if input.len() != self.params.rate() {
            return Err(ZkError::MalformedInput(format!(
                "expected {} preimage elements, got {}",
                self.params.rate(),
                input.len()
            )));
        }
        let mut state = Vec::with_capacity(self.params.t);
        state.push(capacity);
        state.extend_from_slice(input);
        Ok(self.permute(&state)?[1])
    }
}

/// M · state
pub fn mds_multiply(mds: &[Vec<Fr>], state: &[Fr]) -> Vec<Fr> {
    mds.iter()
        .map(|row| {
            row.iter()
                .zip(state)
                .fold(Fr::zero(), |acc, (m, s)| acc + *m * *s)
        })
        .collect()
}
