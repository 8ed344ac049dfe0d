//! BN254 Scalar Field Operations
//!
//! This module provides the scalar field Fr of the BN254 (alt_bn128) curve.
//! Every circuit signal, witness value and public input lives here.
//!
//! External artifacts carry field elements as base-10 strings of the
//! canonical representative in [0, p).

use ark_bn254::Fr as ArkFr;
use ark_ff::{FftField, Field, One, PrimeField, Zero};
use ark_std::UniformRand;
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;
use zeroize::Zeroize;

/// The scalar field of BN254.
///
/// Field modulus p = 21888242871839275222246405745257275088548364400416034343698204186575808495617
/// (254 bits, two-adicity 28)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fr(pub ArkFr);

impl Fr {
    /// The field modulus in decimal
    pub const MODULUS_DECIMAL: &'static str =
        "21888242871839275222246405745257275088548364400416034343698204186575808495617";

    /// Number of bits in the modulus
    pub const MODULUS_BITS: u32 = 254;

    /// Largest n = 2^k with an n-th root of unity in the field
    pub const TWO_ADICITY: u32 = 28;

    pub fn from_u64(val: u64) -> Self {
        Fr(ArkFr::from(val))
    }

    pub fn zero() -> Self {
        Fr(ArkFr::zero())
    }

    pub fn one() -> Self {
        Fr(ArkFr::one())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_one(&self) -> bool {
        self.0.is_one()
    }

    /// Compute the multiplicative inverse (1/x)
    /// Returns None if x is zero
    pub fn inverse(&self) -> Option<Self> {
        self.0.inverse().map(Fr)
    }

    /// Compute x^n using square-and-multiply
    pub fn pow(&self, exp: u64) -> Self {
        let mut result = Fr::one();
        let mut base = *self;
        let mut e = exp;

        while e > 0 {
            if e & 1 == 1 {
                result *= base;
            }
            base = base * base;
            e >>= 1;
        }
        result
    }

    /// Generate a uniformly random field element
    pub fn random<R: rand::Rng + ?Sized>(rng: &mut R) -> Self {
        Fr(ArkFr::rand(rng))
    }

    /// Reduce arbitrary little-endian bytes modulo p
    pub fn from_le_bytes_mod_order(bytes: &[u8]) -> Self {
        Fr(ArkFr::from_le_bytes_mod_order(bytes))
    }

    /// Canonical 32-byte little-endian encoding
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        let bigint = self.0.into_bigint();
        for (i, limb) in bigint.0.iter().enumerate() {
            bytes[i * 8..(i + 1) * 8].copy_from_slice(&limb.to_le_bytes());
        }
        bytes
    }

    /// Parse a canonical base-10 representative.
    ///
    /// Rejects signs, whitespace, empty strings and values >= p.
    pub fn from_decimal(s: &str) -> Option<Self> {
        parse_decimal::<ArkFr>(s).map(Fr)
    }

    /// Base-10 string of the canonical representative
    pub fn to_decimal(&self) -> String {
        decimal(&self.0)
    }

    /// The field's multiplicative generator, used as the coset shift
    pub fn multiplicative_generator() -> Self {
        Fr(ArkFr::GENERATOR)
    }

    /// Get the primitive n-th root of unity
    /// Returns ω such that ω^n = 1 and ω^k ≠ 1 for 0 < k < n
    pub fn get_root_of_unity(n: usize) -> Option<Self> {
        if !n.is_power_of_two() || n.trailing_zeros() > Self::TWO_ADICITY {
            return None;
        }
        ArkFr::get_root_of_unity(n as u64).map(Fr)
    }

    /// Compute the Lagrange basis polynomial L_i(x) over the size-n subgroup
    /// generated by ω: L_i(x) = ω^i · (x^n - 1) / (n · (x - ω^i))
    pub fn lagrange_basis_eval(i: usize, x: &Fr, omega: &Fr, n: usize) -> Fr {
        let omega_i = omega.pow(i as u64);
        let denom = Fr::from_u64(n as u64) * (*x - omega_i);

        match denom.inverse() {
            Some(inv) => omega_i * (x.pow(n as u64) - Fr::one()) * inv,
            // x = ω^i
            None => Fr::one(),
        }
    }
}

/// Parse a canonical decimal representative of any prime field
pub(crate) fn parse_decimal<F: PrimeField>(s: &str) -> Option<F> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = BigUint::from_str(s).ok()?;
    let modulus: BigUint = F::MODULUS.into();
    if value >= modulus {
        return None;
    }
    Some(F::from(value))
}

/// Decimal string of the canonical representative of any prime field element
pub(crate) fn decimal<F: PrimeField>(f: &F) -> String {
    let value: BigUint = (*f).into();
    value.to_string()
}

impl Add for Fr {
    type Output = Fr;
    fn add(self, rhs: Fr) -> Fr {
        Fr(self.0 + rhs.0)
    }
}

impl Sub for Fr {
    type Output = Fr;
    fn sub(self, rhs: Fr) -> Fr {
        Fr(self.0 - rhs.0)
    }
}

impl Mul for Fr {
    type Output = Fr;
    fn mul(self, rhs: Fr) -> Fr {
        Fr(self.0 * rhs.0)
    }
}

impl Neg for Fr {
    type Output = Fr;
    fn neg(self) -> Fr {
        Fr(-self.0)
    }
}

impl AddAssign for Fr {
    fn add_assign(&mut self, rhs: Fr) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Fr {
    fn sub_assign(&mut self, rhs: Fr) {
        self.0 -= rhs.0;
    }
}

impl MulAssign for Fr {
    fn mul_assign(&mut self, rhs: Fr) {
        self.0 *= rhs.0;
    }
}

impl From<u64> for Fr {
    fn from(val: u64) -> Self {
        Fr::from_u64(val)
    }
}

impl Zeroize for Fr {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Default for Fr {
    fn default() -> Self {
        Fr::zero()
    }
}

impl std::fmt::Display for Fr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_decimal())
    }
}

impl Serialize for Fr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Fr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Fr::from_decimal(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("not a canonical field element: {s}")))
    }
}
