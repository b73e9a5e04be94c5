use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Normalized-content hash of a request text. Two requests that differ only
/// in case or whitespace produce the same signature and therefore share one
/// learned preference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestSignature(String);

impl RequestSignature {
    pub fn of(text: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize_text(text).as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RequestSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short prefix is enough for log correlation
        write!(f, "{}", &self.0[..12.min(self.0.len())])
    }
}

/// Lowercase, trim, collapse internal whitespace runs to single spaces.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
