//! # Order Code Generation
//!
//! Short human-readable order codes: 5 characters drawn from `[A-Z0-9]`.
//!
//! ## Why a Trait?
//! Code assignment retries on unique-constraint collisions. To test the
//! retry loop deterministically, the generator is pluggable: production
//! wires [`RandomCodeGenerator`], tests inject a scripted sequence and
//! assert exactly how many attempts were consumed.

use rand::Rng;

use crate::{ORDER_CODE_ALPHABET, ORDER_CODE_LENGTH};

/// Source of candidate order codes.
///
/// Implementations must return codes of [`ORDER_CODE_LENGTH`] characters
/// from [`ORDER_CODE_ALPHABET`]. Uniqueness is NOT the generator's job -
/// the database's unique index is the arbiter, and the caller retries.
pub trait CodeGenerator: Send + Sync {
    /// Produces one candidate code.
    fn generate(&self) -> String;
}

/// Default generator: uniform random draw from the 36-symbol alphabet.
#[derive(Debug, Clone, Default)]
pub struct RandomCodeGenerator;

impl CodeGenerator for RandomCodeGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..ORDER_CODE_LENGTH)
            .map(|_| {
                let idx = rng.gen_range(0..ORDER_CODE_ALPHABET.len());
                ORDER_CODE_ALPHABET[idx] as char
            })
            .collect()
    }
}

/// Checks that a code has the expected shape: exactly
/// [`ORDER_CODE_LENGTH`] characters from [`ORDER_CODE_ALPHABET`].
pub fn is_valid_code(code: &str) -> bool {
    code.len() == ORDER_CODE_LENGTH
        && code.bytes().all(|b| ORDER_CODE_ALPHABET.contains(&b))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_codes_have_valid_shape() {
        let gen = RandomCodeGenerator;
        for _ in 0..100 {
            let code = gen.generate();
            assert!(is_valid_code(&code), "bad code: {code}");
        }
    }

    #[test]
    fn test_is_valid_code() {
        assert!(is_valid_code("ABC12"));
        assert!(is_valid_code("ZZZZZ"));
        assert!(is_valid_code("00000"));
        assert!(!is_valid_code("abc12")); // lowercase
        assert!(!is_valid_code("ABCD")); // too short
        assert!(!is_valid_code("ABCDEF")); // too long
        assert!(!is_valid_code("AB-12")); // outside alphabet
    }
}
