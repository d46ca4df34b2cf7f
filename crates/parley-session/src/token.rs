//! Session token generation.

use rand::Rng;

/// Produces candidate session tokens.
///
/// Uniqueness is not the generator's job: the registry rejects a token
/// that is already in use and the caller asks for another.
pub trait TokenGenerator: Send + 'static {
    /// Returns a new candidate token.
    fn generate(&mut self) -> String;
}

/// Random 32-character lowercase hex tokens (128 bits of randomness).
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomTokens;

impl TokenGenerator for RandomTokens {
    fn generate(&mut self) -> String {
        let bytes: [u8; 16] = rand::rng().random();
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_tokens_are_32_hex_chars() {
        let token = RandomTokens.generate();
        assert_eq!(token.len(), 32);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_random_tokens_differ() {
        let mut tokens = RandomTokens;
        let a = tokens.generate();
        let b = tokens.generate();
        assert_ne!(a, b);
    }
}
