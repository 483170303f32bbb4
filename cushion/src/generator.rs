//! Deterministic values for synthetic document fields.
use crate::words::WordPool;
use cushion_core::MAX_EXTRA_WORDS;
use rand::Rng;
use std::sync::Arc;

/// Reproducible pseudo-random source of document field values.
///
/// The output sequence is a pure function of the five seed integers: two generators seeded
/// identically return the same values call for call, independent of platform or run. Word
/// content comes from the shared [`WordPool`].
#[derive(Debug, Clone)]
pub struct ValueGenerator {
    state: [u32; 5],
    words: Arc<WordPool>,
    buf: String,
}

impl ValueGenerator {
    pub fn new(words: Arc<WordPool>, seeds: [i32; 5]) -> Self {
        Self {
            state: seeds.map(|s| s as u32),
            words,
            buf: String::new(),
        }
    }

    /// Seeds the generator with five integers drawn from `rng`.
    pub fn from_rng<R: Rng + ?Sized>(words: Arc<WordPool>, rng: &mut R) -> Self {
        let seeds = [rng.gen(), rng.gen(), rng.gen(), rng.gen(), rng.gen()];
        Self::new(words, seeds)
    }

    pub fn words(&self) -> &WordPool {
        &self.words
    }

    fn next(&mut self, bits: u32) -> u32 {
        let [s1, s2, s3, s4, s5] = self.state;
        let t = s1 ^ (s1 >> 7);
        let s5_next = (s5 ^ (s5 << 6)) ^ (t ^ (t << 13));
        self.state = [s2, s3, s4, s5, s5_next];

        let value = s2.wrapping_mul(2).wrapping_add(1).wrapping_mul(s5_next);
        value >> (32 - bits)
    }

    pub fn next_bool(&mut self) -> bool {
        self.next(1) != 0
    }

    /// Full-range `i32`.
    pub fn next_i32(&mut self) -> i32 {
        self.next(32) as i32
    }

    /// Uniform value in `[0, n)`.
    ///
    /// # Panics
    ///
    /// Panics if `n` is not positive.
    pub fn next_i32_below(&mut self, n: i32) -> i32 {
        assert!(n > 0, "bound must be positive, got {n}");

        if n & n.wrapping_neg() == n {
            return ((i64::from(n) * i64::from(self.next(31))) >> 31) as i32;
        }

        loop {
            let bits = self.next(31) as i32;
            let val = bits % n;
            // Draws from the incomplete final bucket would skew the result toward small values.
            if (bits - val).checked_add(n - 1).is_some() {
                return val;
            }
        }
    }

    /// Uniform value in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        self.next(24) as f32 / (1 << 24) as f32
    }

    /// Between 1 and 4 pool words, inclusive, joined by single spaces in draw order.
    ///
    /// Words are accumulated in a reusable growable buffer, so unusually long caller-supplied
    /// words cost a reallocation rather than an overflow.
    pub fn next_string(&mut self) -> String {
        self.buf.clear();

        let num_words = 1 + self.next_i32_below(MAX_EXTRA_WORDS);
        // `WordPool` guarantees a non-empty pool that fits in an i32.
        let pool_size = self.words.len() as i32;
        for i in 0..num_words {
            let idx = self.next_i32_below(pool_size) as usize;
            if i > 0 {
                self.buf.push(' ');
            }
            self.buf.push_str(&self.words[idx]);
        }

        self.buf.clone()
    }
}
