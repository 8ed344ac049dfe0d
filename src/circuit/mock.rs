//! Linear mock hash, `hash = 2·preimage[0] + 3·preimage[1]`.
//!
//! A one-constraint fixture with the same signal interface as the Poseidon2
//! circuit. It exercises witness generation, setup and proving quickly; it
//! hides nothing about its preimage.

use super::constraint::{LinearCombination, Variable};
use super::{Circuit, Synthesizer};
use crate::error::Result;
use crate::field::Fr;

#[derive(Clone, Copy, Debug, Default)]
pub struct LinearHashCircuit;

impl LinearHashCircuit {
    /// Native evaluation
    pub fn hash(p0: Fr, p1: Fr) -> Fr {
        Fr::from_u64(2) * p0 + Fr::from_u64(3) * p1
    }
}

impl Circuit for LinearHashCircuit {
    fn synthesize<S: Synthesizer>(&self, s: &mut S) -> Result<Variable> {
        let hash = s.alloc_public("hash")?;
        let p0 = s.alloc_private("preimage[0]")?;
        let p1 = s.alloc_private("preimage[1]")?;

        let combined = LinearCombination::zero()
            .add_term(p0, Fr::from_u64(2))
            .add_term(p1, Fr::from_u64(3));
        s.enforce(
            || "hash output".to_string(),
            combined,
            LinearCombination::one(),
            hash.into(),
        )?;
        Ok(hash)
    }
}
