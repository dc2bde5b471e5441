//! Salted XOR obfuscation for secrets embedded in config files.
//!
//! This keeps keys out of casual view (grep, screenshots). It is not
//! encryption.

use crate::error::{Error, Result};

pub const DEFAULT_SALT: &str = "DefaultObfuscatorDate";

#[derive(Debug, Clone)]
pub struct Obfuscator {
    salt: Vec<u8>,
}

impl Obfuscator {
    pub fn new(salt: &str) -> Result<Self> {
        if salt.is_empty() {
            return Err(Error::EmptySalt);
        }
        Ok(Self {
            salt: salt.as_bytes().to_vec(),
        })
    }

    /// XOR the UTF-8 bytes of `text` with the cycled salt.
    #[must_use]
    pub fn obfuscate(&self, text: &str) -> Vec<u8> {
        self.xor(text.as_bytes())
    }

    /// Inverse of [`Obfuscator::obfuscate`].
    pub fn reveal(&self, bytes: &[u8]) -> Result<String> {
        Ok(String::from_utf8(self.xor(bytes))?)
    }

    fn xor(&self, bytes: &[u8]) -> Vec<u8> {
        bytes
            .iter()
            .zip(self.salt.iter().cycle())
            .map(|(b, s)| b ^ s)
            .collect()
    }
}

impl Default for Obfuscator {
    fn default() -> Self {
        Self {
            salt: DEFAULT_SALT.as_bytes().to_vec(),
        }
    }
}
