//! Tile RNG
//!
//! Xorshift128+ seeded through SplitMix64. Every random choice the puzzle
//! makes (spawn cell, 2 or 4) is drawn from here, so a game is fully
//! described by its seed and its move list.

use serde::{Serialize, Deserialize};

/// Seeded Xorshift128+ generator.
///
/// ```
/// use ba2048::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), 6233086606872742541);
/// assert_eq!(b.next_u64(), 6233086606872742541);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    s0: u64,
    s1: u64,
}

impl DeterministicRng {
    /// Generator for `seed`.
    pub fn new(seed: u64) -> Self {
        let mut mix = seed;
        let s0 = splitmix64(&mut mix);
        let s1 = splitmix64(&mut mix);

        // All-zero state is a fixed point of xorshift.
        if s0 | s1 == 0 {
            return Self { s0: 1, s1: 1 };
        }
        Self { s0, s1 }
    }

    /// Generator seeded from a v4 UUID, plus the seed it used.
    pub fn from_entropy() -> (Self, u64) {
        let uuid = uuid::Uuid::new_v4();
        let (high, _) = uuid.as_u64_pair();
        (Self::new(high), high)
    }

    /// Next raw 64-bit output.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let out = self.s0.wrapping_add(self.s1);

        let x = self.s1 ^ self.s0;
        self.s0 = self.s0.rotate_left(24) ^ x ^ (x << 16);
        self.s1 = x.rotate_left(37);

        out
    }

    /// Uniform-ish value in `0..bound`; 0 when `bound` is 0.
    ///
    /// Plain modulo. The bias is negligible for the board's 16 cells.
    #[inline]
    pub fn next_int(&mut self, bound: u32) -> u32 {
        match bound {
            0 => 0,
            n => (self.next_u64() % u64::from(n)) as u32,
        }
    }

    /// `true` with probability `numerator / denominator`.
    #[inline]
    pub fn next_chance(&mut self, numerator: u32, denominator: u32) -> bool {
        self.next_int(denominator) < numerator
    }

    /// One element of `items`, `None` when empty.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.next_int(items.len() as u32) as usize)
    }
}

#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_42_sequence() {
        // Recorded seeds stop replaying if these change.
        let mut rng = DeterministicRng::new(42);
        assert_eq!(rng.next_u64(), 16629283624882167704);
        assert_eq!(rng.next_u64(), 1420492921613871959);
        assert_eq!(rng.next_u64(), 9768315062676884790);
    }

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = DeterministicRng::new(777);
        let mut b = a.clone();
        assert!((0..500).all(|_| a.next_u64() == b.next_u64()));

        let mut c = DeterministicRng::new(778);
        assert_ne!(DeterministicRng::new(777).next_u64(), c.next_u64());
    }

    #[test]
    fn test_next_int_bounds() {
        let mut rng = DeterministicRng::new(1234);
        assert!((0..1000).all(|_| rng.next_int(16) < 16));
        assert_eq!(rng.next_int(0), 0);
        assert_eq!(rng.next_int(1), 0);
    }

    #[test]
    fn test_spawn_odds() {
        let mut rng = DeterministicRng::new(2048);
        assert!(rng.next_chance(10, 10));
        assert!(!rng.next_chance(0, 10));

        let twos = (0..10_000).filter(|_| rng.next_chance(9, 10)).count();
        assert!((8_700..=9_300).contains(&twos), "twos = {}", twos);
    }

    #[test]
    fn test_choose() {
        let mut rng = DeterministicRng::new(5);
        assert!(rng.choose::<(usize, usize)>(&[]).is_none());

        let cells = [(0, 0), (1, 2), (3, 3)];
        for _ in 0..50 {
            assert!(cells.contains(rng.choose(&cells).unwrap()));
        }
    }

    #[test]
    fn test_from_entropy_replays() {
        let (mut live, seed) = DeterministicRng::from_entropy();
        let mut replay = DeterministicRng::new(seed);
        assert_eq!(live.next_u64(), replay.next_u64());
    }

    #[test]
    fn test_state_serializes() {
        let mut rng = DeterministicRng::new(9);
        rng.next_u64();
        let saved = serde_json::to_string(&rng).unwrap();

        let mut restored: DeterministicRng = serde_json::from_str(&saved).unwrap();
        assert_eq!(restored.next_u64(), rng.next_u64());
    }
}
