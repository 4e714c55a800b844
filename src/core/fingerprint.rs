use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;

/// Content-derived identity of a section: SHA-256 of the trimmed text, hex encoded.
///
/// Only `fingerprint()` builds one, so the value is always a full digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight hex characters, enough to tell sections apart in logs
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(self.0.as_str())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fingerprint a block of text. Only leading and trailing whitespace is ignored.
pub fn fingerprint(text: &str) -> Fingerprint {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    Fingerprint(format!("{:x}", hasher.finalize()))
}
