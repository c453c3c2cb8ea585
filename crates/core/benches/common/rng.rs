use braian_core::utils::{Point, Rect};

/// Deterministic xorshift generator for scene synthesis.
#[derive(Clone)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    pub fn gen_f64(&mut self, min: f64, max: f64) -> f64 {
        let n = self.next_u64() as f64 / u64::MAX as f64;
        min + (max - min) * n
    }

    /// A uniformly drawn point inside `bounds`.
    pub fn gen_point(&mut self, (x0, y0, x1, y1): Rect) -> Point {
        (self.gen_f64(x0, x1), self.gen_f64(y0, y1))
    }
}
