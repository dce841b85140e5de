//! Secret tokens for share links.

use sha2::{Digest, Sha256};

/// Produces fresh share-link secrets.
pub trait TokenSource {
    /// A new token. Never returns the same value twice in practice.
    fn token(&self) -> String;
}

/// Hex tokens from hashed random UUIDs.
#[derive(Debug, Clone, Copy)]
pub struct RandomTokens {
    length: usize,
}

impl RandomTokens {
    pub const DEFAULT_LENGTH: usize = 40;
    pub const MIN_LENGTH: usize = 16;
    /// One SHA-256 digest in hex
    pub const MAX_LENGTH: usize = 64;

    /// Tokens of `length` hex characters, clamped to the supported range.
    pub fn new(length: usize) -> Self {
        Self {
            length: length.clamp(Self::MIN_LENGTH, Self::MAX_LENGTH),
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }
}

impl Default for RandomTokens {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LENGTH)
    }
}

impl TokenSource for RandomTokens {
    fn token(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(uuid::Uuid::new_v4().as_bytes());
        let hash_hex = format!("{:x}", hasher.finalize());
        hash_hex[..self.length].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_length() {
        assert_eq!(RandomTokens::default().token().len(), 40);
        assert_eq!(RandomTokens::new(16).token().len(), 16);
        assert_eq!(RandomTokens::new(500).length(), 64);
        assert_eq!(RandomTokens::new(1).length(), 16);
    }

    #[test]
    fn test_tokens_are_fresh() {
        let tokens = RandomTokens::default();
        assert_ne!(tokens.token(), tokens.token());
    }

    #[test]
    fn test_token_is_hex() {
        let token = RandomTokens::default().token();
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
