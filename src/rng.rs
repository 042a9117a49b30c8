use std::collections::HashMap;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Hands out one deterministic ChaCha stream per named consumer, all derived
/// from a single run seed.
pub struct RngManager {
    seed: u64,
    streams: HashMap<String, ChaCha8Rng>,
}

impl RngManager {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            streams: HashMap::new(),
        }
    }

    /// Stream for `name`. The derived seed depends only on the run seed and
    /// the name, so adding or reordering phases leaves other streams intact.
    pub fn stream(&mut self, name: &str) -> PhaseRng<'_> {
        let seed = self.seed;
        let entry = self
            .streams
            .entry(name.to_string())
            .or_insert_with(|| ChaCha8Rng::seed_from_u64(mix(seed, name)));
        PhaseRng { inner: entry }
    }
}

fn mix(seed: u64, name: &str) -> u64 {
    let mut state = seed;
    for byte in name.bytes() {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        state ^= u64::from(byte).wrapping_mul(1103515245);
    }
    state
}

pub struct PhaseRng<'a> {
    inner: &'a mut ChaCha8Rng,
}

impl<'a> RngCore for PhaseRng<'a> {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

/// Stateless coordinate hash. Same `(x, y, seed)` always gives the same value.
pub fn hash_coords(x: i32, y: i32, seed: u64) -> u32 {
    let mut n = (x as u32 as u64).wrapping_mul(374761393)
        ^ (y as u32 as u64).wrapping_mul(668265263)
        ^ seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    n = (n ^ (n >> 13)).wrapping_mul(1274126177);
    n ^= n >> 16;
    n = n.wrapping_mul(0x2545_F491_4F6C_DD1D);
    (n >> 32) as u32
}

/// Coordinate noise in `[0, 1)`.
pub fn noise01(x: i32, y: i32, seed: u64) -> f64 {
    f64::from(hash_coords(x, y, seed)) / (f64::from(u32::MAX) + 1.0)
}
