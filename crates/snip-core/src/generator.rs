//! Slug generators
//!
//! Generators only propose candidates. Uniqueness is settled by the resolver,
//! which skips candidates already present in its transaction, and finally by
//! the store, which refuses to insert a slug twice.

use rand::distributions::Alphanumeric;
use rand::Rng;

const CONSONANTS: &[u8] = b"bcdfghjklmnpqrstvwxyz";
const VOWELS: &[u8] = b"aeiou";

/// Default key length for short links
pub const DEFAULT_URL_LENGTH: usize = 7;

/// Default key length for pastes
pub const DEFAULT_PASTE_LENGTH: usize = 10;

/// Produces candidate slugs
pub trait SlugGenerator: Send + Sync {
    /// Propose a new slug; `is_url` selects the short-link key shape
    fn generate(&self, is_url: bool) -> String;
}

/// Key lengths shared by the built-in generators
#[derive(Debug, Clone, Copy)]
struct KeyLengths {
    url: usize,
    paste: usize,
}

impl KeyLengths {
    fn new(url: usize, paste: usize) -> Self {
        // Keys shorter than the minimum slug length would never validate
        Self {
            url: url.max(crate::slug::MIN_SLUG_LENGTH),
            paste: paste.max(crate::slug::MIN_SLUG_LENGTH),
        }
    }

    fn pick(&self, is_url: bool) -> usize {
        if is_url {
            self.url
        } else {
            self.paste
        }
    }
}

impl Default for KeyLengths {
    fn default() -> Self {
        Self::new(DEFAULT_URL_LENGTH, DEFAULT_PASTE_LENGTH)
    }
}

/// Alternating consonant/vowel keys that are easy to read out loud
#[derive(Debug, Clone, Default)]
pub struct PhoneticGenerator {
    lengths: KeyLengths,
}

impl PhoneticGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lengths(url_length: usize, paste_length: usize) -> Self {
        Self {
            lengths: KeyLengths::new(url_length, paste_length),
        }
    }
}

impl SlugGenerator for PhoneticGenerator {
    fn generate(&self, is_url: bool) -> String {
        let mut rng = rand::thread_rng();
        let start_with_vowel = rng.gen_bool(0.5);

        (0..self.lengths.pick(is_url))
            .map(|i| {
                let set = if (i % 2 == 0) == start_with_vowel {
                    VOWELS
                } else {
                    CONSONANTS
                };
                set[rng.gen_range(0..set.len())] as char
            })
            .collect()
    }
}

/// Uniformly random alphanumeric keys
#[derive(Debug, Clone, Default)]
pub struct RandomGenerator {
    lengths: KeyLengths,
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lengths(url_length: usize, paste_length: usize) -> Self {
        Self {
            lengths: KeyLengths::new(url_length, paste_length),
        }
    }
}

impl SlugGenerator for RandomGenerator {
    fn generate(&self, is_url: bool) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.lengths.pick(is_url))
            .map(char::from)
            .collect()
    }
}
