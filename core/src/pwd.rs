use rand::Rng;
use tracing::{debug, instrument};

use crate::CharacterClasses;

// Consts

pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
pub const NUMBERS: &str = "0123456789";
pub const SYMBOLS: &str = "!@#$%^&*()_+~`|}{[]:;?><,./-=";
pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

// Traits

#[cfg_attr(any(test, feature = "mock"), mockall::automock)]
pub trait PasswordGenerator: Send + Sync {
    fn generate(&self, length: usize, classes: CharacterClasses) -> String;
}

// Charset

/// Sampling domain of one generation.
///
/// Alphabets of enabled classes are concatenated in the order uppercase,
/// lowercase, numbers, symbols. The charset is never empty: with no class
/// enabled it falls back to the lowercase alphabet.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Charset(Vec<u8>);

impl Charset {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn contains(&self, c: char) -> bool {
        c.is_ascii() && self.0.contains(&(c as u8))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<CharacterClasses> for Charset {
    fn from(classes: CharacterClasses) -> Self {
        if classes.is_empty() {
            return Self(LOWERCASE.as_bytes().to_vec());
        }
        let alphabets = [
            (classes.uppercase, UPPERCASE),
            (classes.lowercase, LOWERCASE),
            (classes.numbers, NUMBERS),
            (classes.symbols, SYMBOLS),
        ];
        let charset = alphabets
            .into_iter()
            .filter(|(enabled, _)| *enabled)
            .flat_map(|(_, alphabet)| alphabet.bytes())
            .collect();
        Self(charset)
    }
}

// DefaultPasswordGenerator

pub struct DefaultPasswordGenerator;

impl PasswordGenerator for DefaultPasswordGenerator {
    #[instrument(skip(self))]
    fn generate(&self, length: usize, classes: CharacterClasses) -> String {
        debug!("generating password");
        generate_with(&mut rand::thread_rng(), length, classes)
    }
}

// Functions

pub fn generate_with<RNG: Rng + ?Sized>(
    rng: &mut RNG,
    length: usize,
    classes: CharacterClasses,
) -> String {
    let charset = Charset::from(classes);
    let bytes = charset.as_bytes();
    (0..length)
        .map(|_| bytes[rng.gen_range(0..bytes.len())] as char)
        .collect()
}

// Tests
