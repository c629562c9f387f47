/// Deterministic per-frame random source for desync offsets and hologram jitter.
///
/// Same seed, same sequence, on every platform.
#[derive(Debug, Clone)]
pub struct FrameRng {
    state: u64,
}

impl FrameRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform integer in `lo..=hi`.
    pub fn range_i32(&mut self, lo: i32, hi: i32) -> i32 {
        if hi <= lo {
            return lo;
        }
        let span = (hi as i64 - lo as i64 + 1) as u64;
        (lo as i64 + (self.next_u64() % span) as i64) as i32
    }
}

impl Default for FrameRng {
    fn default() -> Self {
        Self::new(0x5eed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = FrameRng::new(42);
        let mut b = FrameRng::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn range_stays_in_bounds() {
        let mut rng = FrameRng::default();
        for _ in 0..1000 {
            let v = rng.range_i32(-32, 31);
            assert!((-32..=31).contains(&v));
        }
        assert_eq!(rng.range_i32(5, 5), 5);
    }
}
