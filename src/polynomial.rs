//! Polynomial Operations
//!
//! Polynomials over Fr in coefficient form: f(X) = c_0 + c_1*X + c_2*X^2 + ...
//! The prover only needs interpolation results and evaluation; the heavier
//! arithmetic runs pointwise over FFT domains.

use crate::field::Fr;

/// A polynomial over Fr in coefficient form
/// coeffs[i] is the coefficient of X^i
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Polynomial {
    pub coeffs: Vec<Fr>,
}

impl Polynomial {
    pub fn zero() -> Self {
        Polynomial { coeffs: vec![] }
    }

    /// Create from coefficient vector, dropping leading zeros
    pub fn from_coeffs(coeffs: Vec<Fr>) -> Self {
        let mut poly = Polynomial { coeffs };
        poly.normalize();
        poly
    }

    /// Degree of the polynomial (-1 for the zero polynomial)
    pub fn degree(&self) -> isize {
        self.coeffs.len() as isize - 1
    }

    pub fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|c| c.is_zero())
    }

    /// Remove leading zeros
    pub fn normalize(&mut self) {
        while self.coeffs.last().map_or(false, |c| c.is_zero()) {
            self.coeffs.pop();
        }
    }

    /// Evaluate the polynomial at a point with Horner's method
    pub fn evaluate(&self, x: &Fr) -> Fr {
        self.coeffs
            .iter()
            .rev()
            .fold(Fr::zero(), |acc, c| acc * *x + *c)
    }
}
