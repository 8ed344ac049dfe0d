//! Poseidon2 Preimage Proofs with Groth16
//!
//! Proves knowledge of a preimage whose Poseidon2 hash over BN254 equals a
//! public value, without revealing the preimage.
//!
//! # Modules
//! - `field`: BN254 scalar field
//! - `curve`: G1, G2, GT and the pairing, snarkjs point encoding
//! - `polynomial`, `fft`: polynomial arithmetic and (coset) FFTs
//! - `transcript`: SHA-256 transcript for artifact hashes and challenges
//! - `poseidon2`: permutation parameters and native evaluation
//! - `circuit`: R1CS, witness generation, the Poseidon2 circuit
//! - `groth16`: trusted setup ceremony, prover, verifier
//! - `config`, `pipeline`: the end-to-end flow behind the binary

pub mod circuit;
pub mod config;
pub mod curve;
pub mod error;
pub mod fft;
pub mod field;
pub mod groth16;
pub mod pipeline;
pub mod polynomial;
pub mod poseidon2;
pub mod transcript;

pub use circuit::{ConstraintMatrices, ConstraintSystem, Poseidon2Circuit, Witness, WitnessGenerator, WitnessInput};
pub use config::PipelineConfig;
pub use curve::{G1Affine, G1Projective, G2Affine, G2Projective};
pub use error::{Result, ZkError};
pub use field::Fr;
pub use groth16::{Ceremony, Proof, Prover, ProvingKey, VerifyingKey};
pub use pipeline::{Pipeline, PipelineOutput};
pub use poseidon2::{Poseidon2, Poseidon2Params};
