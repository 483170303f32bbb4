//! The shared vocabulary generated strings are built from.
use crate::error::GeneratorError;
use cushion_core::{ALPHABET, MAX_WORD_LENGTH, MIN_WORD_LENGTH, NUM_WORDS};
use rand::Rng;
use std::ops::Index;

/// Immutable pool of synthetic words.
///
/// Built once per run and handed to every [`ValueGenerator`](crate::ValueGenerator) behind an
/// `Arc`; nothing mutates it after construction so no locking is involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordPool {
    words: Box<[String]>,
}

impl WordPool {
    /// Generates [`NUM_WORDS`] words with lengths uniform in `[MIN_WORD_LENGTH,
    /// MAX_WORD_LENGTH)`, every character uniform over [`ALPHABET`].
    ///
    /// `rng` is only used here; the word content is not part of the reproducibility contract of
    /// the value generator, but a seeded `rng` gives the same pool every time.
    pub fn create<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut chars = Vec::with_capacity(MAX_WORD_LENGTH);
        let words = (0..NUM_WORDS)
            .map(|_| {
                let len = rng.gen_range(MIN_WORD_LENGTH..MAX_WORD_LENGTH);
                chars.clear();
                chars.extend((0..len).map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char));
                chars.iter().collect::<String>()
            })
            .collect();

        Self { words }
    }

    /// Wraps caller-supplied words.
    ///
    /// The pool must be non-empty and indexable by a positive `i32`.
    pub fn from_words(words: Vec<String>) -> Result<Self, GeneratorError> {
        if words.is_empty() {
            return Err(GeneratorError::EmptyWordPool);
        }
        if i32::try_from(words.len()).is_err() {
            return Err(GeneratorError::WordPoolTooLarge(words.len()));
        }

        Ok(Self {
            words: words.into_boxed_slice(),
        })
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.words.iter().map(String::as_str)
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.iter().any(|w| w == word)
    }
}

impl Index<usize> for WordPool {
    type Output = str;

    fn index(&self, index: usize) -> &str {
        &self.words[index]
    }
}
