//! Poseidon2 Preimage Circuit
//!
//! Proves knowledge of a preimage block whose Poseidon2 hash is the public
//! signal `hash`.
//!
//! Circuit structure:
//! - State starts as (capacity || preimage), capacity a constant
//! - Round constants are added to the linear combinations (free)
//! - S-box x^5: 3 multiplication constraints
//!   - t1 = x * x
//!   - t2 = t1 * t1
//!   - y  = t2 * x
//! - Linear layer: folded into the linear combinations (free)
//! - Full rounds: t S-boxes, partial rounds: 1 S-box
//! - Output gate: state[1] * 1 = hash
//!
//! Variable layout: 0 = one, 1 = hash, 2.. = preimage, then S-box
//! intermediates in round order.

use super::constraint::{LinearCombination, Variable};
use super::{Circuit, Synthesizer};
use crate::error::Result;
use crate::field::Fr;
use crate::poseidon2::{sbox_chain, ChainStep, Poseidon2Params, RoundKind};

#[derive(Clone, Debug)]
pub struct Poseidon2Circuit {
    params: Poseidon2Params,
    capacity: Fr,
}

impl Poseidon2Circuit {
    pub fn new(params: Poseidon2Params, capacity: Fr) -> Result<Self> {
        params.validate()?;
        Ok(Poseidon2Circuit { params, capacity })
    }

    /// Default BN254 parameters of width t with a zero capacity
    pub fn bn254(t: usize) -> Result<Self> {
        Self::new(Poseidon2Params::bn254(t)?, Fr::zero())
    }

    pub fn params(&self) -> &Poseidon2Params {
        &self.params
    }

    pub fn capacity(&self) -> Fr {
        self.capacity
    }

    /// Constraints emitted by `synthesize`
    pub fn num_constraints(&self) -> usize {
        self.params.constraint_count() + 1
    }

    /// Symbolic S-box. Returns the output as a single-variable combination.
    fn sbox<S: Synthesizer>(
        &self,
        s: &mut S,
        x: &LinearCombination,
        round: usize,
        lane: usize,
    ) -> Result<LinearCombination> {
        let x_val = s.eval(x);
        let mut acc = x.clone();
        let mut acc_val = x_val;
        let mut power = 1u64;

        for step in sbox_chain(self.params.d) {
            let (rhs, rhs_val, next_power) = match step {
                ChainStep::Square => (acc.clone(), acc_val, power * 2),
                ChainStep::MulInput => (x.clone(), x_val, power + 1),
            };
            let value = acc_val.zip(rhs_val).map(|(a, b)| a * b);
            let out = s.alloc_internal(value)?;
            s.enforce(
                || format!("round {round} sbox lane {lane}: x^{next_power}"),
                acc,
                rhs,
                out.into(),
            )?;
            acc = out.into();
            acc_val = value;
            power = next_power;
        }
        Ok(acc)
    }

    fn mix(&self, state: &[LinearCombination]) -> Vec<LinearCombination> {
        self.params
            .mds
            .iter()
            .map(|row| {
                row.iter()
                    .zip(state)
                    .fold(LinearCombination::zero(), |acc, (m, lc)| &acc + &(lc * *m))
            })
            .collect()
    }
}

impl Circuit for Poseidon2Circuit {
    fn synthesize<S: Synthesizer>(&self, s: &mut S) -> Result<Variable> {
        let p = &self.params;
        let hash = s.alloc_public("hash")?;

        let mut state = Vec::with_capacity(p.t);
        state.push(LinearCombination::constant(self.capacity));
        for i in 0..p.rate() {
            let v = s.alloc_private(&format!("preimage[{i}]"))?;
            state.push(v.into());
        }

        for (round, kind) in p.schedule() {
            for (lane, c) in state.iter_mut().zip(&p.round_constants[round]) {
                *lane = std::mem::take(lane) + *c;
            }
            let sbox_lanes = match kind {
                RoundKind::Full => p.t,
                RoundKind::Partial => 1,
            };
            for lane in 0..sbox_lanes {
                state[lane] = self.sbox(s, &state[lane], round, lane)?;
            }
            state = self.mix(&state);
        }

        s.enforce(
            || "hash output".to_string(),
            state[1].clone(),
            LinearCombination::one(),
            hash.into(),
        )?;
        Ok(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{ConstraintSystem, VariableKind, WitnessGenerator, WitnessInput};
    use crate::error::ZkError;
    use crate::poseidon2::Poseidon2;

    fn preimage() -> [Fr; 2] {
        [Fr::from_u64(123), Fr::from_u64(456)]
    }

    fn native_hash(circuit: &Poseidon2Circuit, input: &[Fr]) -> Fr {
        Poseidon2::new(circuit.params().clone())
            .unwrap()
            .hash(circuit.capacity(), input)
            .unwrap()
    }

    #[test]
    fn test_constraint_count_is_stable() {
        let circuit = Poseidon2Circuit::bn254(3).unwrap();
        let (cs1, _) = ConstraintSystem::from_circuit(&circuit).unwrap();
        let (cs2, _) = ConstraintSystem::from_circuit(&circuit).unwrap();

        assert_eq!(cs1.num_constraints(), 241);
        assert_eq!(cs1.num_constraints(), circuit.num_constraints());
        assert_eq!(cs1.num_variables(), 244);
        assert_eq!(cs1.export().to_bytes(), cs2.export().to_bytes());

        let (cs_t2, _) = ConstraintSystem::from_circuit(&Poseidon2Circuit::bn254(2).unwrap()).unwrap();
        assert_eq!(cs_t2.num_constraints(), 217);
    }

    #[test]
    fn test_variable_layout() {
        let (cs, output) = ConstraintSystem::from_circuit(&Poseidon2Circuit::bn254(3).unwrap()).unwrap();
        assert_eq!(output, Variable(1));
        assert_eq!(cs.kind(Variable(0)), Some(VariableKind::One));
        assert_eq!(cs.kind(Variable(1)), Some(VariableKind::Public));
        assert_eq!(cs.kind(Variable(2)), Some(VariableKind::Private));
        assert_eq!(cs.kind(Variable(3)), Some(VariableKind::Private));
        assert_eq!(cs.kind(Variable(4)), Some(VariableKind::Internal));
        assert_eq!(cs.public_indices(), vec![1]);
        assert_eq!(cs.private_input_indices(), vec![2, 3]);
    }

    #[test]
    fn test_witness_matches_native_hash() {
        let circuit = Poseidon2Circuit::bn254(3).unwrap();
        let hash = native_hash(&circuit, &preimage());
        let input = WitnessInput::new()
            .with_array("preimage", &preimage())
            .with("hash", hash);

        let witness = WitnessGenerator::generate(&circuit, &input).unwrap();
        assert_eq!(witness.public_signals().unwrap(), vec![hash]);

        let (cs, _) = ConstraintSystem::from_circuit(&circuit).unwrap();
        assert_eq!(witness.len(), cs.num_variables());
        assert!(cs.is_satisfied(&witness.values).is_ok());
    }

    #[test]
    fn test_witness_is_deterministic() {
        let circuit = Poseidon2Circuit::bn254(2).unwrap();
        let hash = native_hash(&circuit, &[Fr::from_u64(42)]);
        let input = WitnessInput::new()
            .with_array("preimage", &[Fr::from_u64(42)])
            .with("hash", hash);

        let w1 = WitnessGenerator::generate(&circuit, &input).unwrap();
        let w2 = WitnessGenerator::generate(&circuit, &input).unwrap();
        assert_eq!(
            serde_json::to_vec(&w1).unwrap(),
            serde_json::to_vec(&w2).unwrap()
        );
    }

    #[test]
    fn test_wrong_hash_fails_at_output_gate() {
        let circuit = Poseidon2Circuit::bn254(3).unwrap();
        let hash = native_hash(&circuit, &preimage());
        let input = WitnessInput::new()
            .with_array("preimage", &preimage())
            .with("hash", hash + Fr::one());

        match WitnessGenerator::generate(&circuit, &input) {
            Err(ZkError::ConstraintViolation { index, label }) => {
                assert_eq!(index, 240);
                assert_eq!(label, "hash output");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_tampered_internal_value_is_detected() {
        let circuit = Poseidon2Circuit::bn254(3).unwrap();
        let hash = native_hash(&circuit, &preimage());
        let input = WitnessInput::new()
            .with_array("preimage", &preimage())
            .with("hash", hash);
        let mut witness = WitnessGenerator::generate(&circuit, &input).unwrap();
        witness.values[10] += Fr::one();

        let (cs, _) = ConstraintSystem::from_circuit(&circuit).unwrap();
        assert!(matches!(
            cs.is_satisfied(&witness.values),
            Err(ZkError::ConstraintViolation { .. })
        ));
    }

    #[test]
    fn test_rejects_invalid_params() {
        let mut params = Poseidon2Params::bn254(3).unwrap();
        params.round_constants.truncate(10);
        assert!(matches!(
            Poseidon2Circuit::new(params, Fr::zero()),
            Err(ZkError::MalformedCircuitDefinition(_))
        ));
    }
}
