//! Hash functions mapping a key onto the 32 bit address space.
//!
//! The directory only ever looks at the low bits of a hash, so a hasher has
//! to be deterministic for the life of the file and should spread keys
//! evenly across those low bits. Swapping the hasher of an existing file
//! makes every record unreachable.

use crate::record::Key;
use twox_hash::XxHash32;

pub trait KeyHasher {
    fn hash(&self, key: &Key) -> u32;
}

impl<F> KeyHasher for F
where
    F: Fn(&Key) -> u32,
{
    fn hash(&self, key: &Key) -> u32 {
        self(key)
    }
}

/// XxHash32 over the padded key bytes, the default hasher
#[derive(Debug, Clone, Copy, Default)]
pub struct XxHasher {
    seed: u32,
}

impl XxHasher {
    pub fn with_seed(seed: u32) -> Self {
        Self { seed }
    }
}

impl KeyHasher for XxHasher {
    fn hash(&self, key: &Key) -> u32 {
        XxHash32::oneshot(self.seed, key.as_bytes())
    }
}

/// Folds the key two bytes at a time: `sum = (sum + 100 * b[j] + b[j + 1]) mod (2^31 - 1)`
///
/// Cheap and stable, but sequential numeric keys only differ in a few low
/// bits so it splits far more often than [XxHasher].
#[derive(Debug, Clone, Copy, Default)]
pub struct FoldHasher;

const FOLD_MODULUS: u32 = 2_147_483_647;

impl KeyHasher for FoldHasher {
    fn hash(&self, key: &Key) -> u32 {
        key.as_bytes().chunks(2).fold(0_u32, |sum, pair| {
            let high = pair[0] as u32;
            let low = pair.get(1).copied().unwrap_or(0) as u32;
            (sum + 100 * high + low) % FOLD_MODULUS
        })
    }
}
