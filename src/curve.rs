//! BN254 Elliptic Curve Groups and Pairing
//!
//! This module provides the groups G1, G2, GT and the bilinear pairing
//! e: G1 × G2 → GT of BN254 (called `bn128` in the artifact formats).
//!
//! # Encoding
//! Points travel as decimal coordinate strings, the layout snarkjs uses:
//! - G1: `[x, y, "1"]`, identity `["0", "1", "0"]`
//! - G2: `[[x.c0, x.c1], [y.c0, y.c1], ["1", "0"]]`
//!
//! Decoding checks canonical coordinates, curve membership and subgroup
//! membership, so a decoded point is always usable.

use ark_bn254::{
    Bn254, Fq, Fq2, G1Affine as ArkG1Affine, G1Projective as ArkG1Projective,
    G2Affine as ArkG2Affine, G2Projective as ArkG2Projective,
};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup, Group, VariableBaseMSM};
use ark_ff::{One, PrimeField, Zero};
use ark_serialize::CanonicalSerialize;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use crate::field::{decimal, parse_decimal, Fr};

/// G1 point in affine coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct G1Affine(pub ArkG1Affine);

/// G1 point in projective coordinates (for efficient arithmetic)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct G1Projective(pub ArkG1Projective);

/// G2 point in affine coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct G2Affine(pub ArkG2Affine);

/// G2 point in projective coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct G2Projective(pub ArkG2Projective);

/// Target group element (result of pairing)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Gt(pub <Bn254 as Pairing>::TargetField);

// ============================================================================
// G1 Implementation
// ============================================================================

impl G1Affine {
    pub fn generator() -> Self {
        G1Affine(ArkG1Affine::generator())
    }

    /// The point at infinity
    pub fn identity() -> Self {
        G1Affine(ArkG1Affine::zero())
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_projective(&self) -> G1Projective {
        G1Projective(self.0.into())
    }

    /// On the curve and in the prime-order subgroup
    pub fn is_valid(&self) -> bool {
        self.0.is_on_curve() && self.0.is_in_correct_subgroup_assuming_on_curve()
    }

    /// Compressed arkworks encoding (32 bytes), used for hashing
    pub fn to_compressed_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.0.compressed_size());
        // Writing into a Vec cannot fail.
        let _ = self.0.serialize_compressed(&mut bytes);
        bytes
    }

    /// snarkjs coordinate strings `[x, y, z]`
    pub fn to_coordinates(&self) -> [String; 3] {
        if self.is_identity() {
            return ["0".into(), "1".into(), "0".into()];
        }
        [decimal(&self.0.x), decimal(&self.0.y), "1".into()]
    }

    /// Decode snarkjs coordinate strings, rejecting anything that is not a
    /// valid subgroup point
    pub fn from_coordinates(coords: &[String]) -> Option<Self> {
        let [x, y, z] = coords else {
            return None;
        };
        let x = parse_decimal::<Fq>(x)?;
        let y = parse_decimal::<Fq>(y)?;
        let point = match z.as_str() {
            "0" if x.is_zero() && y.is_one() => return Some(G1Affine::identity()),
            "1" => G1Affine(ArkG1Affine::new_unchecked(x, y)),
            _ => return None,
        };
        point.is_valid().then_some(point)
    }

    pub fn neg(&self) -> Self {
        G1Affine(-self.0)
    }
}

impl G1Projective {
    pub fn generator() -> Self {
        G1Projective(ArkG1Projective::generator())
    }

    pub fn identity() -> Self {
        G1Projective(ArkG1Projective::zero())
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_affine(&self) -> G1Affine {
        G1Affine(self.0.into_affine())
    }

    /// Normalize many points with a single inversion
    pub fn batch_to_affine(points: &[G1Projective]) -> Vec<G1Affine> {
        let ark_points: Vec<_> = points.iter().map(|p| p.0).collect();
        ArkG1Projective::normalize_batch(&ark_points)
            .into_iter()
            .map(G1Affine)
            .collect()
    }

    /// Scalar multiplication: scalar * P
    pub fn scalar_mul(&self, scalar: &Fr) -> Self {
        G1Projective(self.0 * scalar.0)
    }

    /// Multi-scalar multiplication (MSM): Σ scalars[i] * points[i]
    pub fn msm(points: &[G1Affine], scalars: &[Fr]) -> Self {
        let ark_points: Vec<_> = points.iter().map(|p| p.0).collect();
        let ark_scalars: Vec<_> = scalars.iter().map(|s| s.0.into_bigint()).collect();
        G1Projective(ArkG1Projective::msm_bigint(&ark_points, &ark_scalars))
    }
}

impl Add for G1Projective {
    type Output = G1Projective;
    fn add(self, rhs: G1Projective) -> G1Projective {
        G1Projective(self.0 + rhs.0)
    }
}

impl AddAssign for G1Projective {
    fn add_assign(&mut self, rhs: G1Projective) {
        self.0 += rhs.0;
    }
}

impl Sub for G1Projective {
    type Output = G1Projective;
    fn sub(self, rhs: G1Projective) -> G1Projective {
        G1Projective(self.0 - rhs.0)
    }
}

impl Neg for G1Projective {
    type Output = G1Projective;
    fn neg(self) -> G1Projective {
        G1Projective(-self.0)
    }
}

impl Mul<Fr> for G1Projective {
    type Output = G1Projective;
    fn mul(self, rhs: Fr) -> G1Projective {
        self.scalar_mul(&rhs)
    }
}

impl From<G1Affine> for G1Projective {
    fn from(p: G1Affine) -> Self {
        p.to_projective()
    }
}

impl From<G1Projective> for G1Affine {
    fn from(p: G1Projective) -> Self {
        p.to_affine()
    }
}

impl Default for G1Affine {
    fn default() -> Self {
        G1Affine::identity()
    }
}

impl Default for G1Projective {
    fn default() -> Self {
        G1Projective::identity()
    }
}

// ============================================================================
// G2 Implementation
// ============================================================================

impl G2Affine {
    pub fn generator() -> Self {
        G2Affine(ArkG2Affine::generator())
    }

    pub fn identity() -> Self {
        G2Affine(ArkG2Affine::zero())
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_projective(&self) -> G2Projective {
        G2Projective(self.0.into())
    }

    /// On the twist and in the prime-order subgroup. The G2 cofactor of
    /// BN254 is not one, so the subgroup check matters here.
    pub fn is_valid(&self) -> bool {
        self.0.is_on_curve() && self.0.is_in_correct_subgroup_assuming_on_curve()
    }

    /// Compressed arkworks encoding (64 bytes), used for hashing
    pub fn to_compressed_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.0.compressed_size());
        // Writing into a Vec cannot fail.
        let _ = self.0.serialize_compressed(&mut bytes);
        bytes
    }

    /// snarkjs coordinate strings `[[x.c0, x.c1], [y.c0, y.c1], [z.c0, z.c1]]`
    pub fn to_coordinates(&self) -> [[String; 2]; 3] {
        if self.is_identity() {
            return [
                ["0".into(), "0".into()],
                ["1".into(), "0".into()],
                ["0".into(), "0".into()],
            ];
        }
        [
            [decimal(&self.0.x.c0), decimal(&self.0.x.c1)],
            [decimal(&self.0.y.c0), decimal(&self.0.y.c1)],
            ["1".into(), "0".into()],
        ]
    }

    pub fn from_coordinates(coords: &[Vec<String>]) -> Option<Self> {
        let [x, y, z] = coords else {
            return None;
        };
        let x = parse_fq2(x)?;
        let y = parse_fq2(y)?;
        let z = parse_fq2(z)?;
        let point = if z.is_zero() {
            if !(x.is_zero() && y.is_one()) {
                return None;
            }
            G2Affine::identity()
        } else if z.is_one() {
            G2Affine(ArkG2Affine::new_unchecked(x, y))
        } else {
            return None;
        };
        point.is_valid().then_some(point)
    }

    pub fn neg(&self) -> Self {
        G2Affine(-self.0)
    }
}

fn parse_fq2(pair: &[String]) -> Option<Fq2> {
    let [c0, c1] = pair else {
        return None;
    };
    Some(Fq2::new(parse_decimal::<Fq>(c0)?, parse_decimal::<Fq>(c1)?))
}

impl G2Projective {
    pub fn generator() -> Self {
        G2Projective(ArkG2Projective::generator())
    }

    pub fn identity() -> Self {
        G2Projective(ArkG2Projective::zero())
    }

    pub fn is_identity(&self) -> bool {
        self.0.is_zero()
    }

    pub fn to_affine(&self) -> G2Affine {
        G2Affine(self.0.into_affine())
    }

    pub fn batch_to_affine(points: &[G2Projective]) -> Vec<G2Affine> {
        let ark_points: Vec<_> = points.iter().map(|p| p.0).collect();
        ArkG2Projective::normalize_batch(&ark_points)
            .into_iter()
            .map(G2Affine)
            .collect()
    }

    pub fn scalar_mul(&self, scalar: &Fr) -> Self {
        G2Projective(self.0 * scalar.0)
    }

    pub fn msm(points: &[G2Affine], scalars: &[Fr]) -> Self {
        let ark_points: Vec<_> = points.iter().map(|p| p.0).collect();
        let ark_scalars: Vec<_> = scalars.iter().map(|s| s.0.into_bigint()).collect();
        G2Projective(ArkG2Projective::msm_bigint(&ark_points, &ark_scalars))
    }
}

impl Add for G2Projective {
    type Output = G2Projective;
    fn add(self, rhs: G2Projective) -> G2Projective {
        G2Projective(self.0 + rhs.0)
    }
}

impl AddAssign for G2Projective {
    fn add_assign(&mut self, rhs: G2Projective) {
        self.0 += rhs.0;
    }
}

impl Sub for G2Projective {
    type Output = G2Projective;
    fn sub(self, rhs: G2Projective) -> G2Projective {
        G2Projective(self.0 - rhs.0)
    }
}

impl Neg for G2Projective {
    type Output = G2Projective;
    fn neg(self) -> G2Projective {
        G2Projective(-self.0)
    }
}

impl Mul<Fr> for G2Projective {
    type Output = G2Projective;
    fn mul(self, rhs: Fr) -> G2Projective {
        self.scalar_mul(&rhs)
    }
}

impl From<G2Affine> for G2Projective {
    fn from(p: G2Affine) -> Self {
        p.to_projective()
    }
}

impl Default for G2Affine {
    fn default() -> Self {
        G2Affine::identity()
    }
}

impl Default for G2Projective {
    fn default() -> Self {
        G2Projective::identity()
    }
}

// ============================================================================
// Pairing Implementation
// ============================================================================

impl Gt {
    pub fn is_identity(&self) -> bool {
        self.0.is_one()
    }
}

/// Compute the pairing e(P, Q) for P ∈ G1 and Q ∈ G2
pub fn pairing(p: &G1Affine, q: &G2Affine) -> Gt {
    Gt(Bn254::pairing(p.0, q.0).0)
}

/// Compute the product of pairings ∏ e(P_i, Q_i) with a single final
/// exponentiation
pub fn multi_pairing(pairs: &[(G1Affine, G2Affine)]) -> Gt {
    Gt(Bn254::multi_pairing(
        pairs.iter().map(|(p, _)| p.0),
        pairs.iter().map(|(_, q)| q.0),
    )
    .0)
}

// ============================================================================
// Serde Implementation
// ============================================================================

impl Serialize for G1Affine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_coordinates().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for G1Affine {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let coords = Vec::<String>::deserialize(deserializer)?;
        G1Affine::from_coordinates(&coords)
            .ok_or_else(|| serde::de::Error::custom("invalid G1 point"))
    }
}

impl Serialize for G2Affine {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_coordinates().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for G2Affine {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let coords = Vec::<Vec<String>>::deserialize(deserializer)?;
        G2Affine::from_coordinates(&coords)
            .ok_or_else(|| serde::de::Error::custom("invalid G2 point"))
    }
}
