//! RNG per worker - deterministik per seed
//!
//! LCG 64-bit (konstanta Knuth/PCG) dengan output xorshift. Cukup untuk
//! nilai item dan jeda idle; bukan untuk kriptografi.

use std::time::Duration;

use crate::config::IdleRange;
use crate::core::Item;

/// Rentang nilai item yang dihasilkan producer
pub const ITEM_MIN: Item = 100;
pub const ITEM_MAX: Item = 999;

const MULTIPLIER: u64 = 6364136223846793005;
const INCREMENT: u64 = 1442695040888963407;

#[derive(Debug, Clone)]
pub struct ItemRng {
    state: u64,
}

impl ItemRng {
    pub fn new(seed: u64) -> Self {
        let mut rng = Self { state: seed };
        // Buang beberapa output pertama supaya seed kecil tetap tersebar
        for _ in 0..4 {
            rng.next_u64();
        }
        rng
    }

    /// Seed turunan untuk worker ke-`index` dari satu seed dasar
    pub fn derive_seed(base: u64, index: u64) -> u64 {
        base ^ index.wrapping_add(1).wrapping_mul(0x9E3779B97F4A7C15)
    }

    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        let x = self.state;
        (x ^ (x >> 33)).wrapping_mul(0xff51afd7ed558ccd) ^ (x >> 29)
    }

    /// Angka di `[lo, hi]` inklusif
    pub fn range(&mut self, lo: u64, hi: u64) -> u64 {
        if hi <= lo {
            return lo;
        }
        lo + self.next_u64() % (hi - lo + 1)
    }

    /// Nilai item di `ITEM_MIN..=ITEM_MAX`
    pub fn item(&mut self) -> Item {
        self.range(ITEM_MIN as u64, ITEM_MAX as u64) as Item
    }

    /// Jeda idle acak di dalam `range`
    pub fn idle(&mut self, range: &IdleRange) -> Duration {
        let lo = range.min.as_micros() as u64;
        let hi = range.max.as_micros() as u64;
        Duration::from_micros(self.range(lo, hi))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_sequence() {
        let mut a = ItemRng::new(42);
        let mut b = ItemRng::new(42);
        for _ in 0..100 {
            assert_eq!(a.item(), b.item());
        }
    }

    #[test]
    fn test_items_stay_in_range() {
        let mut rng = ItemRng::new(7);
        for _ in 0..10_000 {
            let item = rng.item();
            assert!((ITEM_MIN..=ITEM_MAX).contains(&item));
        }
    }

    #[test]
    fn test_idle_within_bounds() {
        let range = IdleRange::from_millis(100, 600);
        let mut rng = ItemRng::new(3);
        for _ in 0..1000 {
            let d = rng.idle(&range);
            assert!(d >= range.min && d <= range.max);
        }
        assert_eq!(rng.idle(&IdleRange::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_derived_seeds_differ() {
        let a = ItemRng::derive_seed(99, 0);
        let b = ItemRng::derive_seed(99, 1);
        assert_ne!(a, b);
        assert_ne!(ItemRng::new(a).item_sequence(20), ItemRng::new(b).item_sequence(20));
    }

    impl ItemRng {
        fn item_sequence(mut self, n: usize) -> Vec<Item> {
            (0..n).map(|_| self.item()).collect()
        }
    }
}
