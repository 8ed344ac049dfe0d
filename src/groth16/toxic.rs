//! Contribution secrets.
//!
//! `ToxicWaste` cannot be cloned, printed or serialized, it never leaves the
//! module that samples it, and its scalars are zeroized when it is dropped
//! at the end of a contribution. Callers borrow the scalars instead of
//! copying them out.

use rand::{CryptoRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::field::Fr;

pub(crate) struct ToxicWaste<const K: usize> {
    scalars: [Fr; K],
}

impl<const K: usize> ToxicWaste<K> {
    /// Sample K nonzero scalars
    pub(crate) fn sample<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut waste = ToxicWaste {
            scalars: [Fr::zero(); K],
        };
        for s in waste.scalars.iter_mut() {
            while s.is_zero() {
                *s = Fr::random(rng);
            }
        }
        waste
    }

    pub(crate) fn get(&self, i: usize) -> &Fr {
        &self.scalars[i]
    }
}

impl<const K: usize> Zeroize for ToxicWaste<K> {
    fn zeroize(&mut self) {
        self.scalars.zeroize();
    }
}

impl<const K: usize> ZeroizeOnDrop for ToxicWaste<K> {}

impl<const K: usize> Drop for ToxicWaste<K> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    #[test]
    fn test_sampled_scalars_are_nonzero_and_distinct() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let waste = ToxicWaste::<3>::sample(&mut rng);
        assert!((0..3).all(|i| !waste.get(i).is_zero()));
        assert_ne!(waste.get(0), waste.get(1));
    }

    #[test]
    fn test_zeroize_clears_scalars() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let mut waste = ToxicWaste::<2>::sample(&mut rng);
        waste.zeroize();
        assert!((0..2).all(|i| waste.get(i).is_zero()));
    }

    #[test]
    fn test_field_element_zeroize() {
        let mut secrets = vec![Fr::from_u64(3), Fr::from_u64(5)];
        secrets.zeroize();
        assert!(secrets.is_empty());

        let mut x = Fr::from_u64(11);
        x.zeroize();
        assert!(x.is_zero());
    }
}
