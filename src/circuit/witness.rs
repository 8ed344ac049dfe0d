//! Witness Generation
//!
//! Replays a circuit on concrete inputs and produces a value for every
//! variable. Each constraint is checked the moment it is enforced, so an
//! input that does not satisfy the circuit (for example a `hash` that is not
//! the hash of the preimage) is reported as a [`ZkError::ConstraintViolation`]
//! naming the failing constraint, never returned as an inconsistent witness.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use super::constraint::{LinearCombination, Variable};
use super::{Circuit, Synthesizer};
use crate::error::{Result, ZkError};
use crate::field::Fr;

/// Named input signals, flattened: `preimage[0]`, `preimage[1]`, `hash`
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WitnessInput {
    signals: BTreeMap<String, Fr>,
}

impl WitnessInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: Fr) -> Self {
        self.signals.insert(name.to_string(), value);
        self
    }

    /// Add `name[0]`, `name[1]`, ...
    pub fn with_array(mut self, name: &str, values: &[Fr]) -> Self {
        for (i, v) in values.iter().enumerate() {
            self.signals.insert(format!("{name}[{i}]"), *v);
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Fr> {
        self.signals.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.signals.keys().map(String::as_str)
    }

    /// Parse snarkjs-style input JSON: `{"preimage": ["123", "456"], "hash": "1614"}`.
    /// Values may be decimal strings or non-negative integers; arrays may nest.
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)?;
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(ZkError::MalformedInput(
                "input must be a JSON object".to_string(),
            ));
        };
        let mut input = WitnessInput::new();
        for (name, v) in map {
            input.flatten(name.clone(), v)?;
        }
        Ok(input)
    }

    fn flatten(&mut self, name: String, value: &Value) -> Result<()> {
        match value {
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.flatten(format!("{name}[{i}]"), item)?;
                }
                Ok(())
            }
            Value::String(s) => {
                let fr = Fr::from_decimal(s).ok_or_else(|| {
                    ZkError::MalformedInput(format!("signal {name}: {s:?} is not a canonical field element"))
                })?;
                self.signals.insert(name, fr);
                Ok(())
            }
            Value::Number(n) => {
                let v = n.as_u64().ok_or_else(|| {
                    ZkError::MalformedInput(format!(
                        "signal {name}: {n} is not a non-negative integer; use a decimal string"
                    ))
                })?;
                self.signals.insert(name, Fr::from_u64(v));
                Ok(())
            }
            other => Err(ZkError::MalformedInput(format!(
                "signal {name}: unsupported value {other}"
            ))),
        }
    }
}

/// A full assignment, one value per variable, w[0] = 1
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    pub values: Vec<Fr>,
    pub public_indices: Vec<usize>,
}

impl Witness {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Public signals in variable order
    pub fn public_signals(&self) -> Result<Vec<Fr>> {
        self.public_indices
            .iter()
            .map(|&i| {
                self.values.get(i).copied().ok_or_else(|| {
                    ZkError::MalformedInput(format!(
                        "public index {i} is outside a witness of {} values",
                        self.values.len()
                    ))
                })
            })
            .collect()
    }
}

/// A [`Synthesizer`] that computes values and checks constraints
pub struct WitnessGenerator<'a> {
    input: &'a WitnessInput,
    values: Vec<Fr>,
    public_indices: Vec<usize>,
    used: BTreeSet<String>,
    constraint_index: usize,
}

impl<'a> WitnessGenerator<'a> {
    pub fn new(input: &'a WitnessInput) -> Self {
        WitnessGenerator {
            input,
            values: vec![Fr::one()],
            public_indices: Vec::new(),
            used: BTreeSet::new(),
            constraint_index: 0,
        }
    }

    /// Replay `circuit` on `input`
    #[tracing::instrument(skip_all, name = "WitnessGenerator::generate")]
    pub fn generate<C: Circuit>(circuit: &C, input: &WitnessInput) -> Result<Witness> {
        let mut generator = WitnessGenerator::new(input);
        circuit.synthesize(&mut generator)?;
        generator.finish()
    }

    fn finish(self) -> Result<Witness> {
        if let Some(unused) = self.input.names().find(|n| !self.used.contains(*n)) {
            return Err(ZkError::MalformedInput(format!(
                "signal {unused} is not an input of this circuit"
            )));
        }
        tracing::debug!(
            variables = self.values.len(),
            constraints = self.constraint_index,
            "witness generated"
        );
        Ok(Witness {
            values: self.values,
            public_indices: self.public_indices,
        })
    }

    fn alloc_input(&mut self, name: &str) -> Result<Variable> {
        let value = self
            .input
            .get(name)
            .ok_or_else(|| ZkError::MalformedInput(format!("missing input signal {name}")))?;
        self.used.insert(name.to_string());
        self.values.push(value);
        Ok(Variable(self.values.len() - 1))
    }
}

impl Synthesizer for WitnessGenerator<'_> {
    fn alloc_public(&mut self, name: &str) -> Result<Variable> {
        let var = self.alloc_input(name)?;
        self.public_indices.push(var.0);
        Ok(var)
    }

    fn alloc_private(&mut self, name: &str) -> Result<Variable> {
        self.alloc_input(name)
    }

    fn alloc_internal(&mut self, value: Option<Fr>) -> Result<Variable> {
        let value = value.ok_or_else(|| {
            ZkError::MalformedCircuitDefinition(format!(
                "internal variable {} allocated without a value",
                self.values.len()
            ))
        })?;
        self.values.push(value);
        Ok(Variable(self.values.len() - 1))
    }

    fn enforce<L: FnOnce() -> String>(
        &mut self,
        label: L,
        a: LinearCombination,
        b: LinearCombination,
        c: LinearCombination,
    ) -> Result<()> {
        let index = self.constraint_index;
        self.constraint_index += 1;

        let sides = a
            .evaluate(&self.values)
            .zip(b.evaluate(&self.values))
            .zip(c.evaluate(&self.values));
        match sides {
            Some(((a, b), c)) if a * b == c => Ok(()),
            Some(_) => Err(ZkError::ConstraintViolation {
                index,
                label: label(),
            }),
            None => Err(ZkError::MalformedCircuitDefinition(format!(
                "constraint {index} ({}) references unallocated variable",
                label()
            ))),
        }
    }

    fn eval(&self, lc: &LinearCombination) -> Option<Fr> {
        lc.evaluate(&self.values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_from_json() {
        let input =
            WitnessInput::from_json(r#"{"preimage": ["123", 456], "hash": "1614"}"#).unwrap();
        assert_eq!(input.get("preimage[0]"), Some(Fr::from_u64(123)));
        assert_eq!(input.get("preimage[1]"), Some(Fr::from_u64(456)));
        assert_eq!(input.get("hash"), Some(Fr::from_u64(1614)));

        let built = WitnessInput::new()
            .with_array("preimage", &[Fr::from_u64(123), Fr::from_u64(456)])
            .with("hash", Fr::from_u64(1614));
        assert_eq!(input, built);
    }

    #[test]
    fn test_input_rejects_bad_values() {
        for json in [
            r#"{"hash": "-1"}"#,
            r#"{"hash": -1}"#,
            r#"{"hash": 1.5}"#,
            r#"{"hash": true}"#,
            r#"["1"]"#,
            r#"{"hash": "21888242871839275222246405745257275088548364400416034343698204186575808495617"}"#,
        ] {
            assert!(
                matches!(WitnessInput::from_json(json), Err(ZkError::MalformedInput(_))),
                "{json}"
            );
        }
    }

    #[test]
    fn test_public_signals() {
        let w = Witness {
            values: vec![Fr::one(), Fr::from_u64(9), Fr::from_u64(3)],
            public_indices: vec![1],
        };
        assert_eq!(w.public_signals().unwrap(), vec![Fr::from_u64(9)]);
        assert_eq!(w.len(), 3);

        let json = r#"{"values":["1","9"],"public_indices":[4]}"#;
        let inconsistent: Witness = serde_json::from_str(json).unwrap();
        assert!(matches!(
            inconsistent.public_signals(),
            Err(ZkError::MalformedInput(_))
        ));
    }
}
