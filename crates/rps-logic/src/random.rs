//! Seeded pseudo-random number generator
//!
//! Deterministic PRNG owned by each strategy instance, so a game's outcome
//! depends only on its seed and never on which worker thread played it.
//! Uses xorshift64* for the stream and implements [`rand::RngCore`] so the
//! `rand` distributions can sample from it.

use rand::RngCore;

/// Seeded random number generator
///
/// Deterministic: same seed + stream = same sequence
#[derive(Clone, Debug)]
pub struct SeededRng {
    state: u64,
}

impl SeededRng {
    /// Create a new RNG from a tournament seed and a stream index
    pub fn new(seed: u64, stream: u64) -> Self {
        let mut state = seed.wrapping_add(0x9e3779b97f4a7c15);
        state ^= stream.wrapping_mul(0x517cc1b727220a95);
        // xorshift has a fixed point at zero
        if state == 0 {
            state = 0x2545f4914f6cdd1d;
        }

        let mut rng = Self { state };
        for _ in 0..8 {
            rng.next_u64();
        }
        rng
    }

    /// Derive an independent child stream, e.g. one per seat in a game
    pub fn fork(&self, salt: u64) -> Self {
        let mut state = self.state ^ salt.wrapping_add(1).wrapping_mul(0x9e3779b97f4a7c15);
        if state == 0 {
            state = 0x2545f4914f6cdd1d;
        }
        let mut rng = Self { state };
        rng.next_u64(); // Mix
        rng
    }

    /// Generate next u64
    pub fn next_u64(&mut self) -> u64 {
        // xorshift64*
        self.state ^= self.state >> 12;
        self.state ^= self.state << 25;
        self.state ^= self.state >> 27;
        self.state.wrapping_mul(0x2545f4914f6cdd1d)
    }

    /// Generate next u32
    pub fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    /// Uniform float in [0, 1)
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Generate a value in range [0, max)
    pub fn next_range(&mut self, max: u32) -> u32 {
        if max == 0 {
            return 0;
        }
        self.next_u32() % max
    }

    /// Inclusive range [lo, hi]
    pub fn between(&mut self, lo: u32, hi: u32) -> u32 {
        if hi <= lo {
            return lo;
        }
        lo + self.next_range(hi - lo + 1)
    }

    /// True with probability `p`
    pub fn chance(&mut self, p: f64) -> bool {
        p > 0.0 && self.next_f64() < p
    }

    /// Uniform choice from a slice
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        items.get(self.next_range(items.len() as u32) as usize)
    }

    /// Standard normal sample (Box-Muller)
    pub fn next_gaussian(&mut self) -> f64 {
        let u1 = 1.0 - self.next_f64();
        let u2 = self.next_f64();
        (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }

    /// Gamma(shape, 1) sample via Marsaglia-Tsang
    pub fn gamma(&mut self, shape: f64) -> f64 {
        if shape <= 0.0 {
            return 0.0;
        }
        if shape < 1.0 {
            let boost = self.next_f64().max(f64::MIN_POSITIVE).powf(1.0 / shape);
            return self.gamma(shape + 1.0) * boost;
        }
        let d = shape - 1.0 / 3.0;
        let c = 1.0 / (9.0 * d).sqrt();
        loop {
            let x = self.next_gaussian();
            let v = (1.0 + c * x).powi(3);
            if v <= 0.0 {
                continue;
            }
            let u = self.next_f64();
            if u < 1.0 - 0.0331 * x.powi(4) {
                return d * v;
            }
            if u.max(f64::MIN_POSITIVE).ln() < 0.5 * x * x + d * (1.0 - v + v.ln()) {
                return d * v;
            }
        }
    }

    /// Beta(alpha, beta) sample built from two gamma draws
    pub fn beta(&mut self, alpha: f64, beta: f64) -> f64 {
        let x = self.gamma(alpha);
        let y = self.gamma(beta);
        if x + y <= 0.0 {
            0.5
        } else {
            x / (x + y)
        }
    }
}

impl RngCore for SeededRng {
    fn next_u32(&mut self) -> u32 {
        SeededRng::next_u32(self)
    }

    fn next_u64(&mut self) -> u64 {
        SeededRng::next_u64(self)
    }

    fn fill_bytes(&mut self, dst: &mut [u8]) {
        for chunk in dst.chunks_mut(8) {
            let bytes = SeededRng::next_u64(self).to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_determinism() {
        let mut r1 = SeededRng::new(42, 0);
        let mut r2 = SeededRng::new(42, 0);

        for _ in 0..100 {
            assert_eq!(r1.next_u64(), r2.next_u64());
        }
    }

    #[test]
    fn test_different_seeds() {
        let mut rng1 = SeededRng::new(1, 0);
        let mut rng2 = SeededRng::new(2, 0);

        let vals1: Vec<_> = (0..10).map(|_| rng1.next_u64()).collect();
        let vals2: Vec<_> = (0..10).map(|_| rng2.next_u64()).collect();

        assert_ne!(vals1, vals2);
    }

    #[test]
    fn test_different_streams() {
        let mut rng1 = SeededRng::new(42, 0);
        let mut rng2 = SeededRng::new(42, 1);

        assert_ne!(rng1.next_u64(), rng2.next_u64());
    }

    #[test]
    fn test_fork_is_independent_of_parent_progress() {
        let parent = SeededRng::new(7, 3);
        let mut a = parent.fork(0);
        let mut b = parent.fork(1);
        let mut a_again = parent.fork(0);

        assert_ne!(a.next_u64(), b.next_u64());
        let mut a = parent.fork(0);
        assert_eq!(a.next_u64(), a_again.next_u64());
    }

    #[test]
    fn test_zero_seed_still_produces_values() {
        let mut rng = SeededRng::new(0, 0);
        let vals: Vec<_> = (0..4).map(|_| rng.next_u64()).collect();
        assert!(vals.iter().any(|v| *v != 0));
    }

    #[test]
    fn test_f64_range() {
        let mut rng = SeededRng::new(42, 0);
        for _ in 0..1000 {
            let x = rng.next_f64();
            assert!((0.0..1.0).contains(&x));
        }
    }

    #[test]
    fn test_next_range() {
        let mut rng = SeededRng::new(42, 0);

        for max in [1, 3, 10, 1000].iter() {
            for _ in 0..100 {
                let val = rng.next_range(*max);
                assert!(val < *max, "next_range({}) returned {}", max, val);
            }
        }

        assert_eq!(rng.next_range(0), 0);
    }

    #[test]
    fn test_between_inclusive() {
        let mut rng = SeededRng::new(42, 0);
        let mut seen = [false; 4];
        for _ in 0..500 {
            let v = rng.between(3, 6);
            assert!((3..=6).contains(&v));
            seen[(v - 3) as usize] = true;
        }
        assert!(seen.iter().all(|s| *s));
        assert_eq!(rng.between(5, 5), 5);
    }

    #[test]
    fn test_chance_extremes() {
        let mut rng = SeededRng::new(42, 0);
        for _ in 0..100 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
        }
    }

    #[test]
    fn test_pick_empty() {
        let mut rng = SeededRng::new(42, 0);
        let empty: [u8; 0] = [];
        assert!(rng.pick(&empty).is_none());
        assert_eq!(rng.pick(&[9]), Some(&9));
    }

    #[test]
    fn test_gamma_mean() {
        let mut rng = SeededRng::new(42, 0);
        for shape in [0.5, 1.0, 3.0, 20.0] {
            let samples = 4000;
            let mean = (0..samples).map(|_| rng.gamma(shape)).sum::<f64>() / samples as f64;
            assert!(
                (mean - shape).abs() < shape * 0.1 + 0.05,
                "gamma({}) mean {} too far off",
                shape,
                mean
            );
        }
    }

    #[test]
    fn test_beta_in_unit_interval() {
        let mut rng = SeededRng::new(42, 0);
        let mut total = 0.0;
        for _ in 0..2000 {
            let x = rng.beta(8.0, 2.0);
            assert!((0.0..=1.0).contains(&x));
            total += x;
        }
        let mean = total / 2000.0;
        assert!((mean - 0.8).abs() < 0.03, "beta(8,2) mean {}", mean);
    }

    #[test]
    fn test_fill_bytes_partial_chunk() {
        let mut rng = SeededRng::new(42, 0);
        let mut buf = [0u8; 13];
        rng.fill_bytes(&mut buf);
        assert!(buf.iter().any(|b| *b != 0));
    }
}
