//! Rank-1 Constraint Systems
//!
//! A circuit is a list of constraints over a witness vector w with w[0] = 1:
//!
//!   (A·w) * (B·w) = (C·w)
//!
//! where A, B, C are sparse linear combinations of variables.
//!
//! Circuits describe themselves once against [`Synthesizer`]. The
//! [`ConstraintSystem`] records the structure and ignores values; the
//! [`WitnessGenerator`] records values and checks every constraint as it is
//! enforced. Both walk the same code, so a witness always lines up with the
//! constraint system it was generated for.

pub mod constraint;
pub mod mock;
pub mod poseidon2;
pub mod witness;

pub use constraint::{
    Constraint, ConstraintMatrices, ConstraintSystem, LinearCombination, Variable, VariableKind,
};
pub use mock::LinearHashCircuit;
pub use poseidon2::Poseidon2Circuit;
pub use witness::{Witness, WitnessGenerator, WitnessInput};

use crate::error::Result;
use crate::field::Fr;

/// The allocation and enforcement primitives a circuit is written against
pub trait Synthesizer {
    /// Allocate a public input, looked up by signal name
    fn alloc_public(&mut self, name: &str) -> Result<Variable>;

    /// Allocate a private input, looked up by signal name
    fn alloc_private(&mut self, name: &str) -> Result<Variable>;

    /// Allocate an internal signal. `value` is `None` while only the
    /// structure is being recorded.
    fn alloc_internal(&mut self, value: Option<Fr>) -> Result<Variable>;

    /// Enforce a · b = c. The label is only built when needed.
    fn enforce<L: FnOnce() -> String>(
        &mut self,
        label: L,
        a: LinearCombination,
        b: LinearCombination,
        c: LinearCombination,
    ) -> Result<()>;

    /// Current value of a linear combination, if values are tracked
    fn eval(&self, lc: &LinearCombination) -> Option<Fr>;
}

/// A statement expressed as constraints
pub trait Circuit {
    /// Emit allocations and constraints; returns the designated public
    /// output variable
    fn synthesize<S: Synthesizer>(&self, s: &mut S) -> Result<Variable>;
}
