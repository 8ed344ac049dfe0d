//! Constraint System Definition
//!
//! Variables, linear combinations and the R1CS container. Variable 0 is the
//! constant one; constants in a linear combination are coefficients on it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ops::{Add, Mul, Neg, Sub};

use super::{Circuit, Synthesizer};
use crate::error::{Result, ZkError};
use crate::field::Fr;

/// Index into the witness vector
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Variable(pub usize);

impl Variable {
    /// The constant-one variable, always at index 0
    pub const ONE: Variable = Variable(0);

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Role of a variable in the witness
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VariableKind {
    One,
    Public,
    Private,
    Internal,
}

/// Sparse Σ coeff_i · var_i, sorted by variable index with no duplicate
/// variables and no zero coefficients
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LinearCombination {
    terms: Vec<(Variable, Fr)>,
}

impl LinearCombination {
    pub fn zero() -> Self {
        LinearCombination { terms: Vec::new() }
    }

    /// The constant `c`
    pub fn constant(c: Fr) -> Self {
        Self::zero().add_term(Variable::ONE, c)
    }

    pub fn one() -> Self {
        Self::constant(Fr::one())
    }

    pub fn terms(&self) -> &[(Variable, Fr)] {
        &self.terms
    }

    pub fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }

    /// Add coeff · var, merging with an existing term for var
    pub fn add_term(mut self, var: Variable, coeff: Fr) -> Self {
        match self.terms.binary_search_by_key(&var, |(v, _)| *v) {
            Ok(pos) => {
                self.terms[pos].1 += coeff;
                if self.terms[pos].1.is_zero() {
                    self.terms.remove(pos);
                }
            }
            Err(pos) => {
                if !coeff.is_zero() {
                    self.terms.insert(pos, (var, coeff));
                }
            }
        }
        self
    }

    pub fn scale(&self, k: Fr) -> Self {
        if k.is_zero() {
            return Self::zero();
        }
        LinearCombination {
            terms: self.terms.iter().map(|(v, c)| (*v, *c * k)).collect(),
        }
    }

    /// Evaluate against a full or partial assignment. `None` if a referenced
    /// variable has no value yet.
    pub fn evaluate(&self, values: &[Fr]) -> Option<Fr> {
        self.terms.iter().try_fold(Fr::zero(), |acc, (v, c)| {
            values.get(v.0).map(|x| acc + *c * *x)
        })
    }

    /// Highest variable index referenced
    pub fn max_variable(&self) -> Option<Variable> {
        self.terms.last().map(|(v, _)| *v)
    }

    fn merge(&self, other: &LinearCombination, sign: Fr) -> Self {
        let mut terms = Vec::with_capacity(self.terms.len() + other.terms.len());
        let (mut i, mut j) = (0, 0);
        while i < self.terms.len() || j < other.terms.len() {
            let left = self.terms.get(i);
            let right = other.terms.get(j).map(|(v, c)| (*v, *c * sign));
            let next = match (left, right) {
                (Some(&(lv, lc)), Some((rv, rc))) if lv == rv => {
                    i += 1;
                    j += 1;
                    (lv, lc + rc)
                }
                (Some(&(lv, lc)), Some((rv, _))) if lv < rv => {
                    i += 1;
                    (lv, lc)
                }
                (Some(&(lv, lc)), None) => {
                    i += 1;
                    (lv, lc)
                }
                (_, Some(term)) => {
                    j += 1;
                    term
                }
                (None, None) => break,
            };
            if !next.1.is_zero() {
                terms.push(next);
            }
        }
        LinearCombination { terms }
    }
}

impl From<Variable> for LinearCombination {
    fn from(var: Variable) -> Self {
        LinearCombination::zero().add_term(var, Fr::one())
    }
}

impl Add<&LinearCombination> for &LinearCombination {
    type Output = LinearCombination;
    fn add(self, rhs: &LinearCombination) -> LinearCombination {
        self.merge(rhs, Fr::one())
    }
}

impl Sub<&LinearCombination> for &LinearCombination {
    type Output = LinearCombination;
    fn sub(self, rhs: &LinearCombination) -> LinearCombination {
        self.merge(rhs, -Fr::one())
    }
}

impl Add<Fr> for LinearCombination {
    type Output = LinearCombination;
    fn add(self, rhs: Fr) -> LinearCombination {
        self.add_term(Variable::ONE, rhs)
    }
}

impl Mul<Fr> for &LinearCombination {
    type Output = LinearCombination;
    fn mul(self, rhs: Fr) -> LinearCombination {
        self.scale(rhs)
    }
}

impl Neg for &LinearCombination {
    type Output = LinearCombination;
    fn neg(self) -> LinearCombination {
        self.scale(-Fr::one())
    }
}

/// A · B = C
#[derive(Clone, Debug)]
pub struct Constraint {
    pub a: LinearCombination,
    pub b: LinearCombination,
    pub c: LinearCombination,
    /// Human-readable origin, used in violation reports
    pub label: String,
}

impl Constraint {
    /// Evaluate both sides; `None` if the assignment is too short
    pub fn sides(&self, values: &[Fr]) -> Option<(Fr, Fr)> {
        let a = self.a.evaluate(values)?;
        let b = self.b.evaluate(values)?;
        let c = self.c.evaluate(values)?;
        Some((a * b, c))
    }
}

/// The complete constraint system for a circuit
#[derive(Clone, Debug)]
pub struct ConstraintSystem {
    kinds: Vec<VariableKind>,
    constraints: Vec<Constraint>,
}

impl Default for ConstraintSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstraintSystem {
    /// An empty system holding only the constant-one variable
    pub fn new() -> Self {
        ConstraintSystem {
            kinds: vec![VariableKind::One],
            constraints: Vec::new(),
        }
    }

    /// Record the structure of a circuit, returning the system and the
    /// circuit's public output variable
    pub fn from_circuit<C: Circuit>(circuit: &C) -> Result<(Self, Variable)> {
        let mut cs = ConstraintSystem::new();
        let output = circuit.synthesize(&mut cs)?;
        cs.validate()?;
        Ok((cs, output))
    }

    pub fn num_variables(&self) -> usize {
        self.kinds.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn kind(&self, var: Variable) -> Option<VariableKind> {
        self.kinds.get(var.0).copied()
    }

    /// Public input indices in allocation order
    pub fn public_indices(&self) -> Vec<usize> {
        self.indices_of(VariableKind::Public)
    }

    pub fn num_public(&self) -> usize {
        self.public_indices().len()
    }

    /// Private input indices in allocation order
    pub fn private_input_indices(&self) -> Vec<usize> {
        self.indices_of(VariableKind::Private)
    }

    fn indices_of(&self, kind: VariableKind) -> Vec<usize> {
        self.kinds
            .iter()
            .enumerate()
            .filter(|(_, k)| **k == kind)
            .map(|(i, _)| i)
            .collect()
    }

    fn alloc(&mut self, kind: VariableKind) -> Variable {
        self.kinds.push(kind);
        Variable(self.kinds.len() - 1)
    }

    /// Every constraint references only allocated variables
    pub fn validate(&self) -> Result<()> {
        for (index, constraint) in self.constraints.iter().enumerate() {
            for lc in [&constraint.a, &constraint.b, &constraint.c] {
                if let Some(var) = lc.max_variable() {
                    if var.0 >= self.kinds.len() {
                        return Err(ZkError::MalformedCircuitDefinition(format!(
                            "constraint {index} ({}) references unallocated variable {}",
                            constraint.label, var.0
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Check a full assignment; reports the first violated constraint
    pub fn is_satisfied(&self, witness: &[Fr]) -> Result<()> {
        if witness.len() != self.num_variables() {
            return Err(ZkError::MalformedInput(format!(
                "assignment has {} values, circuit has {} variables",
                witness.len(),
                self.num_variables()
            )));
        }
        if witness[0] != Fr::one() {
            return Err(ZkError::ConstraintViolation {
                index: 0,
                label: "w[0] must be one".to_string(),
            });
        }
        for (index, constraint) in self.constraints.iter().enumerate() {
            match constraint.sides(witness) {
                Some((ab, c)) if ab == c => {}
                _ => {
                    return Err(ZkError::ConstraintViolation {
                        index,
                        label: constraint.label.clone(),
                    })
                }
            }
        }
        Ok(())
    }

    /// Canonical export consumed by the setup and by independent checkers
    pub fn export(&self) -> ConstraintMatrices {
        let to_sparse = |lc: &LinearCombination| -> Vec<(usize, Fr)> {
            lc.terms().iter().map(|(v, c)| (v.0, *c)).collect()
        };
        ConstraintMatrices {
            n_variables: self.num_variables(),
            public_inputs: self.public_indices(),
            constraints: self
                .constraints
                .iter()
                .map(|c| [to_sparse(&c.a), to_sparse(&c.b), to_sparse(&c.c)])
                .collect(),
        }
    }
}

impl Synthesizer for ConstraintSystem {
    fn alloc_public(&mut self, _name: &str) -> Result<Variable> {
        Ok(self.alloc(VariableKind::Public))
    }

    fn alloc_private(&mut self, _name: &str) -> Result<Variable> {
        Ok(self.alloc(VariableKind::Private))
    }

    fn alloc_internal(&mut self, _value: Option<Fr>) -> Result<Variable> {
        Ok(self.alloc(VariableKind::Internal))
    }

    fn enforce<L: FnOnce() -> String>(
        &mut self,
        label: L,
        a: LinearCombination,
        b: LinearCombination,
        c: LinearCombination,
    ) -> Result<()> {
        let label = label();
        for lc in [&a, &b, &c] {
            if let Some(var) = lc.max_variable() {
                if var.0 >= self.kinds.len() {
                    return Err(ZkError::MalformedCircuitDefinition(format!(
                        "constraint {} ({label}) references unallocated variable {}",
                        self.constraints.len(),
                        var.0
                    )));
                }
            }
        }
        self.constraints.push(Constraint { a, b, c, label });
        Ok(())
    }

    fn eval(&self, _lc: &LinearCombination) -> Option<Fr> {
        None
    }
}

/// Sparse row: (variable index, coefficient) pairs sorted by index
pub type SparseRow = Vec<(usize, Fr)>;

/// Canonical, serializable form of a constraint system.
///
/// The JSON form lists each constraint as `[A, B, C]` with every linear
/// combination written `[[index, "coeff"], ...]`. Exports of the same
/// circuit are byte-identical.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintMatrices {
    pub n_variables: usize,
    /// Public variable indices, in order (variable 0 is implicit)
    pub public_inputs: Vec<usize>,
    pub constraints: Vec<[SparseRow; 3]>,
}

impl ConstraintMatrices {
    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    pub fn num_public(&self) -> usize {
        self.public_inputs.len()
    }

    /// Variable 0 followed by the public inputs: the variables the verifier
    /// weights with known values
    pub fn input_indices(&self) -> Vec<usize> {
        std::iter::once(0)
            .chain(self.public_inputs.iter().copied())
            .collect()
    }

    /// Everything the verifier does not see
    pub fn witness_indices(&self) -> Vec<usize> {
        let mut is_input = vec![false; self.n_variables];
        for i in self.input_indices() {
            if let Some(flag) = is_input.get_mut(i) {
                *flag = true;
            }
        }
        (0..self.n_variables).filter(|&i| !is_input[i]).collect()
    }

    /// Indices in range, rows sorted and free of duplicates, public set
    /// strictly increasing and disjoint from variable 0
    pub fn validate(&self) -> Result<()> {
        let malformed = |msg: String| Err(ZkError::MalformedCircuitDefinition(msg));

        if self.n_variables == 0 {
            return malformed("no constant-one variable".to_string());
        }
        if !self.public_inputs.windows(2).all(|w| w[0] < w[1])
            || self.public_inputs.first() == Some(&0)
            || self.public_inputs.iter().any(|&i| i >= self.n_variables)
        {
            return malformed("public input indices are not a valid ordered set".to_string());
        }
        for (index, rows) in self.constraints.iter().enumerate() {
            for row in rows {
                if !row.windows(2).all(|w| w[0].0 < w[1].0) {
                    return malformed(format!("constraint {index} is not in canonical order"));
                }
                if let Some((var, _)) = row.iter().find(|(v, _)| *v >= self.n_variables) {
                    return malformed(format!(
                        "constraint {index} references unallocated variable {var}"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Check a full assignment without labels. The matrices are validated
    /// first, so deserialized input never indexes past the assignment.
    pub fn is_satisfied(&self, witness: &[Fr]) -> Result<()> {
        self.validate()?;
        if witness.len() != self.n_variables {
            return Err(ZkError::MalformedInput(format!(
                "assignment has {} values, circuit has {} variables",
                witness.len(),
                self.n_variables
            )));
        }
        if !witness[0].is_one() {
            return Err(ZkError::ConstraintViolation {
                index: 0,
                label: "w[0] must be one".to_string(),
            });
        }
        for (index, [a, b, c]) in self.constraints.iter().enumerate() {
            if eval_row(a, witness) * eval_row(b, witness) != eval_row(c, witness) {
                return Err(ZkError::ConstraintViolation {
                    index,
                    label: format!("constraint {index}"),
                });
            }
        }
        Ok(())
    }

    /// Canonical little-endian bytes: counts as u64, coefficients as
    /// 32-byte field encodings
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"R1CS");
        out.extend_from_slice(&(self.n_variables as u64).to_le_bytes());
        out.extend_from_slice(&(self.public_inputs.len() as u64).to_le_bytes());
        for i in &self.public_inputs {
            out.extend_from_slice(&(*i as u64).to_le_bytes());
        }
        out.extend_from_slice(&(self.constraints.len() as u64).to_le_bytes());
        for rows in &self.constraints {
            for row in rows {
                out.extend_from_slice(&(row.len() as u64).to_le_bytes());
                for (var, coeff) in row {
                    out.extend_from_slice(&(*var as u64).to_le_bytes());
                    out.extend_from_slice(&coeff.to_bytes());
                }
            }
        }
        out
    }

    /// SHA-256 of the canonical bytes, hex encoded
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.to_bytes()))
    }
}

pub(crate) fn eval_row(row: &[(usize, Fr)], witness: &[Fr]) -> Fr {
    row.iter()
        .fold(Fr::zero(), |acc, (i, c)| acc + *c * witness[*i])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(i: usize) -> Variable {
        Variable(i)
    }

    #[test]
    fn test_lc_merges_and_sorts() {
        let lc = LinearCombination::zero()
            .add_term(var(3), Fr::from_u64(2))
            .add_term(var(1), Fr::from_u64(5))
            .add_term(var(3), Fr::from_u64(4));
        assert_eq!(
            lc.terms(),
            &[(var(1), Fr::from_u64(5)), (var(3), Fr::from_u64(6))]
        );

        let cancelled = lc.clone().add_term(var(1), -Fr::from_u64(5));
        assert_eq!(cancelled.terms(), &[(var(3), Fr::from_u64(6))]);
    }

    #[test]
    fn test_lc_arithmetic() {
        let x = LinearCombination::from(var(1));
        let y = LinearCombination::from(var(2));
        let sum = &(&x * Fr::from_u64(2)) + &y;
        let diff = &sum - &y;
        assert_eq!(diff, &x * Fr::from_u64(2));
        assert!((&x - &x).is_zero());

        let values = vec![Fr::one(), Fr::from_u64(10), Fr::from_u64(7)];
        let with_const = sum + Fr::from_u64(3);
        assert_eq!(with_const.evaluate(&values), Some(Fr::from_u64(30)));
        assert_eq!(with_const.evaluate(&values[..2]), None);
    }

    fn square_system() -> ConstraintSystem {
        // x * x = y, y public
        let mut cs = ConstraintSystem::new();
        let y = cs.alloc_public("y").unwrap();
        let x = cs.alloc_private("x").unwrap();
        cs.enforce(|| "square".into(), x.into(), x.into(), y.into())
            .unwrap();
        cs
    }

    #[test]
    fn test_is_satisfied() {
        let cs = square_system();
        let good = vec![Fr::one(), Fr::from_u64(9), Fr::from_u64(3)];
        assert!(cs.is_satisfied(&good).is_ok());
        assert!(cs.export().is_satisfied(&good).is_ok());

        let bad = vec![Fr::one(), Fr::from_u64(10), Fr::from_u64(3)];
        match cs.is_satisfied(&bad) {
            Err(ZkError::ConstraintViolation { index, label }) => {
                assert_eq!(index, 0);
                assert_eq!(label, "square");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(cs.is_satisfied(&good[..2]).is_err());
    }

    #[test]
    fn test_enforce_rejects_unallocated_variable() {
        let mut cs = ConstraintSystem::new();
        let result = cs.enforce(
            || "dangling".into(),
            Variable(5).into(),
            LinearCombination::one(),
            LinearCombination::zero(),
        );
        assert!(matches!(
            result,
            Err(ZkError::MalformedCircuitDefinition(_))
        ));
    }

    #[test]
    fn test_export_layout() {
        let cs = square_system();
        let m = cs.export();
        assert_eq!(m.n_variables, 3);
        assert_eq!(m.public_inputs, vec![1]);
        assert_eq!(m.input_indices(), vec![0, 1]);
        assert_eq!(m.witness_indices(), vec![2]);
        assert!(m.validate().is_ok());

        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(
            json,
            r#"{"n_variables":3,"public_inputs":[1],"constraints":[[[[2,"1"]],[[2,"1"]],[[1,"1"]]]]}"#
        );
        let back: ConstraintMatrices = serde_json::from_str(&json).unwrap();
        assert_eq!(back.digest(), m.digest());
    }

    #[test]
    fn test_matrices_validate_rejects_bad_rows() {
        let mut m = square_system().export();
        m.constraints[0][0] = vec![(2, Fr::one()), (1, Fr::one())];
        assert!(m.validate().is_err());

        let mut m = square_system().export();
        m.constraints[0][2] = vec![(7, Fr::one())];
        assert!(m.validate().is_err());

        let mut m = square_system().export();
        m.public_inputs = vec![0];
        assert!(m.validate().is_err());
    }

    #[test]
    fn test_matrices_is_satisfied_on_untrusted_input() {
        let json = r#"{"n_variables":3,"public_inputs":[1],"constraints":[[[[7,"1"]],[[2,"1"]],[[1,"1"]]]]}"#;
        let m: ConstraintMatrices = serde_json::from_str(json).unwrap();
        let w = vec![Fr::one(), Fr::from_u64(9), Fr::from_u64(3)];
        assert!(matches!(
            m.is_satisfied(&w),
            Err(ZkError::MalformedCircuitDefinition(_))
        ));

        let m = square_system().export();
        let shifted = vec![Fr::from_u64(2), Fr::from_u64(9), Fr::from_u64(3)];
        assert!(matches!(
            m.is_satisfied(&shifted),
            Err(ZkError::ConstraintViolation { index: 0, .. })
        ));
        assert!(m.is_satisfied(&[]).is_err());
    }

    #[test]
    fn test_digest_changes_with_structure() {
        let a = square_system().export();
        let mut b = a.clone();
        b.constraints[0][2][0].1 = Fr::from_u64(2);
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.to_bytes(), square_system().export().to_bytes());
    }
}
