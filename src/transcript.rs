//! SHA-256 Transcript
//!
//! A running hash that absorbs labelled data and squeezes field elements.
//! The setup ceremony uses it twice: to chain contribution hashes, and to
//! derive the random-linear-combination coefficients of the batched
//! "same ratio" pairing checks, so that an artifact cannot be crafted
//! against the coefficients it will be checked with.

use crate::curve::{G1Affine, G2Affine};
use crate::field::Fr;
use sha2::{Digest, Sha256};

#[derive(Clone, Debug)]
pub struct Transcript {
    hasher: Sha256,
}

impl Transcript {
    /// Create a new transcript with a domain separator
    pub fn new(domain_separator: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(domain_separator);
        Transcript { hasher }
    }

    /// Absorb raw bytes. Labels and lengths are hashed too, so distinct
    /// sequences of absorbs never collide.
    pub fn absorb_bytes(&mut self, label: &str, data: &[u8]) {
        self.hasher.update(label.as_bytes());
        self.hasher.update((data.len() as u64).to_le_bytes());
        self.hasher.update(data);
    }

    pub fn absorb_fr(&mut self, label: &str, fr: &Fr) {
        self.absorb_bytes(label, &fr.to_bytes());
    }

    pub fn absorb_g1(&mut self, label: &str, point: &G1Affine) {
        self.absorb_bytes(label, &point.to_compressed_bytes());
    }

    pub fn absorb_g2(&mut self, label: &str, point: &G2Affine) {
        self.absorb_bytes(label, &point.to_compressed_bytes());
    }

    pub fn absorb_u64(&mut self, label: &str, value: u64) {
        self.absorb_bytes(label, &value.to_le_bytes());
    }

    /// Squeeze a challenge; the transcript keeps chaining from the output
    pub fn squeeze_challenge(&mut self, label: &str) -> Fr {
        self.hasher.update(label.as_bytes());
        let hash = self.hasher.finalize_reset();
        self.hasher.update(hash);
        Fr::from_le_bytes_mod_order(&hash)
    }

    /// Squeeze `count` challenges
    pub fn squeeze_challenges(&mut self, label: &str, count: usize) -> Vec<Fr> {
        (0..count).map(|_| self.squeeze_challenge(label)).collect()
    }

    /// Final digest as lowercase hex
    pub fn finalize_hex(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_deterministic() {
        let mut t1 = Transcript::new(b"test");
        let mut t2 = Transcript::new(b"test");

        t1.absorb_fr("value", &Fr::from_u64(42));
        t2.absorb_fr("value", &Fr::from_u64(42));

        assert_eq!(t1.squeeze_challenge("challenge"), t2.squeeze_challenge("challenge"));
    }

    #[test]
    fn test_transcript_different_input() {
        let mut t1 = Transcript::new(b"test");
        let mut t2 = Transcript::new(b"test");

        t1.absorb_fr("value", &Fr::from_u64(42));
        t2.absorb_fr("value", &Fr::from_u64(43));

        assert_ne!(t1.squeeze_challenge("challenge"), t2.squeeze_challenge("challenge"));
    }

    #[test]
    fn test_successive_challenges_differ() {
        let mut t = Transcript::new(b"test");
        t.absorb_g1("generator", &G1Affine::generator());
        t.absorb_g2("generator", &G2Affine::generator());
        let cs = t.squeeze_challenges("rho", 3);
        assert_ne!(cs[0], cs[1]);
        assert_ne!(cs[1], cs[2]);
    }

    #[test]
    fn test_finalize_hex_length() {
        let mut t = Transcript::new(b"test");
        t.absorb_u64("n", 7);
        assert_eq!(t.finalize_hex().len(), 64);
    }
}
