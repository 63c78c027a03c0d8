//! Digest algorithm keywords and digest text validation
//!
//! A digest specification is only fused into a digest token when the text
//! after the colon has exactly the length a hex or base64 encoding of that
//! algorithm's output would have. Hex is checked first since a hex run is
//! also a valid base64 alphabet run.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DigestAlg {
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

impl DigestAlg {
    /// Digest output length in bytes
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Sha224 => 28,
            Self::Sha256 => 32,
            Self::Sha384 => 48,
            Self::Sha512 => 64,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sha224 => "sha224",
            Self::Sha256 => "sha256",
            Self::Sha384 => "sha384",
            Self::Sha512 => "sha512",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sha224" => Some(Self::Sha224),
            "sha256" => Some(Self::Sha256),
            "sha384" => Some(Self::Sha384),
            "sha512" => Some(Self::Sha512),
            _ => None,
        }
    }
}

fn is_hex(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_hexdigit())
}

fn is_base64_shape(text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    let trimmed = text.trim_end_matches('=');
    if text.len() - trimmed.len() > 2 {
        return false;
    }
    trimmed
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/')
}

/// Check whether `text` has the exact length of a hex or base64 encoding of
/// a digest produced by `alg`
pub fn is_valid_digest(text: &str, alg: DigestAlg) -> bool {
    let n = alg.digest_len();

    if is_hex(text) && text.len() == 2 * n {
        return true;
    }

    let padded = 4 * n.div_ceil(3);
    let unpadded = (4 * n + 2) / 3;
    (text.len() == padded || text.len() == unpadded) && is_base64_shape(text)
}
