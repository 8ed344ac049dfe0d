//! Fast Fourier Transform over Finite Fields
//!
//! FFT and IFFT over multiplicative subgroups H = {ω^0, ..., ω^{n-1}} of the
//! scalar field. The butterfly is written once for any value that can be
//! added, subtracted and scaled by a field element, so the same routine
//! interpolates field vectors (the prover's QAP polynomials) and group
//! vectors (the Lagrange-basis change at the end of Phase 1).

use crate::field::Fr;
use crate::polynomial::Polynomial;
use rayon::prelude::*;
use std::ops::{Add, Mul, Sub};

/// Values an FFT can run over: field elements or group elements
pub trait FftElement:
    Copy + Send + Sync + Add<Output = Self> + Sub<Output = Self> + Mul<Fr, Output = Self>
{
}

impl<T> FftElement for T where
    T: Copy + Send + Sync + Add<Output = T> + Sub<Output = T> + Mul<Fr, Output = T>
{
}

/// In-place FFT using the iterative Cooley-Tukey algorithm
fn fft_in_place<T: FftElement>(values: &mut [T], omega: &Fr) {
    let n = values.len();
    if n == 1 {
        return;
    }

    bit_reverse_permutation(values);

    let mut m = 1;
    while m < n {
        let omega_m = omega.pow((n / (2 * m)) as u64);
        let mut k = 0;
        while k < n {
            let mut omega_power = Fr::one();
            for j in 0..m {
                let t = values[k + j + m] * omega_power;
                let u = values[k + j];
                values[k + j] = u + t;
                values[k + j + m] = u - t;
                omega_power *= omega_m;
            }
            k += 2 * m;
        }
        m *= 2;
    }
}

fn bit_reverse_permutation<T>(values: &mut [T]) {
    let n = values.len();
    let log_n = n.trailing_zeros();

    for i in 0..n {
        let j = bit_reverse(i, log_n);
        if i < j {
            values.swap(i, j);
        }
    }
}

fn bit_reverse(mut x: usize, bits: u32) -> usize {
    let mut result = 0;
    for _ in 0..bits {
        result = (result << 1) | (x & 1);
        x >>= 1;
    }
    result
}

/// Domain: multiplicative subgroup H = {ω^0, ω^1, ..., ω^{n-1}}
#[derive(Clone, Debug)]
pub struct Domain {
    /// Size of the domain (power of 2)
    pub n: usize,
    /// Primitive n-th root of unity
    pub omega: Fr,
    pub omega_inv: Fr,
    /// 1/n in the field
    pub n_inv: Fr,
}

impl Domain {
    /// Create a domain of exactly `n` elements
    pub fn new(n: usize) -> Option<Self> {
        let omega = Fr::get_root_of_unity(n)?;
        let omega_inv = omega.inverse()?;
        let n_inv = Fr::from_u64(n as u64).inverse()?;

        Some(Domain {
            n,
            omega,
            omega_inv,
            n_inv,
        })
    }

    /// Smallest domain holding at least `size` elements
    pub fn at_least(size: usize) -> Option<Self> {
        Self::new(size.max(1).checked_next_power_of_two()?)
    }

    pub fn elements(&self) -> impl Iterator<Item = Fr> + '_ {
        std::iter::successors(Some(Fr::one()), move |x| Some(*x * self.omega)).take(self.n)
    }

    /// Evaluate the vanishing polynomial Z_H(X) = X^n - 1 at a point
    pub fn vanishing_eval(&self, x: &Fr) -> Fr {
        x.pow(self.n as u64) - Fr::one()
    }

    /// Evaluate the polynomial on H (coefficients are padded to n)
    pub fn fft(&self, poly: &Polynomial) -> Vec<Fr> {
        let mut values = poly.coeffs.clone();
        values.resize(self.n, Fr::zero());
        fft_in_place(&mut values, &self.omega);
        values
    }

    /// Interpolate evaluations on H back to coefficients
    pub fn ifft(&self, evals: &[Fr]) -> Polynomial {
        Polynomial::from_coeffs(self.ifft_elements(evals))
    }

    /// Evaluate on the coset k·H: f(k·X) has coefficients c_i·k^i
    pub fn coset_fft(&self, poly: &Polynomial, k: Fr) -> Vec<Fr> {
        let mut scaled = poly.coeffs.clone();
        scaled.resize(self.n, Fr::zero());
        let mut k_power = Fr::one();
        for c in scaled.iter_mut() {
            *c *= k_power;
            k_power *= k;
        }
        fft_in_place(&mut scaled, &self.omega);
        scaled
    }

    /// Interpolate evaluations on the coset k·H, returning n coefficients
    pub fn coset_ifft(&self, evals: &[Fr], k: Fr) -> Vec<Fr> {
        let mut coeffs = self.ifft_elements(evals);
        if let Some(k_inv) = k.inverse() {
            let mut k_inv_power = Fr::one();
            for c in coeffs.iter_mut() {
                *c *= k_inv_power;
                k_inv_power *= k_inv;
            }
        }
        coeffs
    }

    /// Inverse FFT over arbitrary elements, padded or truncated to n.
    ///
    /// Applied to [τ^0]..[τ^{n-1}] in a group this yields [L_0(τ)]..[L_{n-1}(τ)].
    pub fn ifft_elements<T: FftElement + Default>(&self, evals: &[T]) -> Vec<T> {
        let mut values: Vec<T> = evals.iter().copied().take(self.n).collect();
        values.resize(self.n, T::default());
        fft_in_place(&mut values, &self.omega_inv);
        let n_inv = self.n_inv;
        values.par_iter_mut().for_each(|v| *v = *v * n_inv);
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{G1Affine, G1Projective};

    #[test]
    fn test_fft_ifft_roundtrip() {
        let domain = Domain::new(8).unwrap();
        let poly = Polynomial::from_coeffs(vec![
            Fr::from_u64(1),
            Fr::from_u64(2),
            Fr::from_u64(3),
            Fr::from_u64(4),
        ]);

        let evals = domain.fft(&poly);
        assert_eq!(domain.ifft(&evals), poly);
    }

    #[test]
    fn test_fft_evaluates_correctly() {
        let domain = Domain::new(4).unwrap();
        let poly = Polynomial::from_coeffs(vec![Fr::from_u64(1), Fr::from_u64(2), Fr::from_u64(3)]);

        let evals = domain.fft(&poly);
        for (i, x) in domain.elements().enumerate() {
            assert_eq!(evals[i], poly.evaluate(&x));
        }
    }

    #[test]
    fn test_coset_fft_evaluates_on_shifted_points() {
        let domain = Domain::new(8).unwrap();
        let k = Fr::multiplicative_generator();
        let poly = Polynomial::from_coeffs((1..=6).map(Fr::from_u64).collect());

        let evals = domain.coset_fft(&poly, k);
        for (i, x) in domain.elements().enumerate() {
            assert_eq!(evals[i], poly.evaluate(&(k * x)));
        }

        let coeffs = domain.coset_ifft(&evals, k);
        assert_eq!(Polynomial::from_coeffs(coeffs), poly);
    }

    #[test]
    fn test_domain() {
        let domain = Domain::new(8).unwrap();
        assert_eq!(domain.omega.pow(8), Fr::one());

        let elems: Vec<Fr> = domain.elements().collect();
        assert_eq!(elems.len(), 8);
        assert_eq!(elems[0], Fr::one());
        assert_eq!(elems[1], domain.omega);

        assert_eq!(Domain::at_least(243).unwrap().n, 256);
        assert_eq!(Domain::at_least(256).unwrap().n, 256);
        assert!(Domain::new(12).is_none());
    }

    #[test]
    fn test_vanishing_polynomial() {
        let domain = Domain::new(4).unwrap();
        for x in domain.elements() {
            assert!(domain.vanishing_eval(&x).is_zero());
        }
        assert!(!domain.vanishing_eval(&Fr::from_u64(123)).is_zero());
    }

    #[test]
    fn test_group_ifft_gives_lagrange_basis() {
        let domain = Domain::new(8).unwrap();
        let tau = Fr::from_u64(1234567);
        let g = G1Projective::generator();

        let powers: Vec<G1Projective> = (0..8).map(|i| g * tau.pow(i)).collect();
        let lagrange = domain.ifft_elements(&powers);

        for (i, point) in lagrange.iter().enumerate() {
            let expected = g * Fr::lagrange_basis_eval(i, &tau, &domain.omega, 8);
            assert_eq!(point.to_affine(), expected.to_affine());
        }
        assert_ne!(lagrange[0].to_affine(), G1Affine::identity());
    }
}
