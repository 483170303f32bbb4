use std::num::NonZeroUsize;

/// Number of words in the shared word pool.
pub const NUM_WORDS: usize = 4096;

/// Shortest generated word (inclusive).
pub const MIN_WORD_LENGTH: usize = 3;

/// Longest generated word (exclusive).
pub const MAX_WORD_LENGTH: usize = 16;

/// Symbols a generated word is drawn from.
pub const ALPHABET: &[u8; 64] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789!?";

/// Upper bound (exclusive) on the extra words appended to a generated string, so strings hold
/// between 1 and `MAX_EXTRA_WORDS` words inclusive.
pub const MAX_EXTRA_WORDS: i32 = 4;

pub const DEFAULT_DATABASE_URL: &str = "http://127.0.0.1:5984";
pub const DEFAULT_DATABASE_NAME: &str = "cushion_benchmark";
pub const DEFAULT_NUM_CONNECTIONS: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(10) };
pub const DEFAULT_BULK_INSERTS: usize = 20;
pub const DEFAULT_DOCS_PER_BULK_INSERT: NonZeroUsize = unsafe { NonZeroUsize::new_unchecked(100) };
