//! Property-based tests for token-format compliance.

use proptest::prelude::*;
use uuid::Uuid;
use vault_service::tokenization::generator::luhn_valid;
use vault_service::tokenization::{TokenFormat, MAX_TOKEN_LEN};

// =============================================================================
// Property 4: Format Compliance
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_numeric_tokens_are_digits(length in 1usize..=MAX_TOKEN_LEN) {
        let token = TokenFormat::Numeric.generate(length).unwrap();
        prop_assert_eq!(token.len(), length);
        prop_assert!(token.bytes().all(|b| b.is_ascii_digit()));
        prop_assert!(TokenFormat::Numeric.validate(&token).is_ok());
    }

    #[test]
    fn prop_alphanumeric_tokens_are_alphanumeric(length in 1usize..=MAX_TOKEN_LEN) {
        let token = TokenFormat::Alphanumeric.generate(length).unwrap();
        prop_assert_eq!(token.len(), length);
        prop_assert!(token.bytes().all(|b| b.is_ascii_alphanumeric()));
        prop_assert!(TokenFormat::Alphanumeric.validate(&token).is_ok());
    }

    #[test]
    fn prop_luhn_tokens_carry_valid_check_digit(length in 2usize..=MAX_TOKEN_LEN) {
        let token = TokenFormat::LuhnPreserving.generate(length).unwrap();
        prop_assert_eq!(token.len(), length);
        prop_assert!(token.bytes().all(|b| b.is_ascii_digit()));
        prop_assert!(luhn_valid(&token));
        prop_assert!(TokenFormat::LuhnPreserving.validate(&token).is_ok());
    }

    #[test]
    fn prop_uuid_tokens_parse_as_v7(length in 0usize..10_000) {
        // The length argument is ignored for the uuid format
        let token = TokenFormat::Uuid.generate(length).unwrap();
        let parsed = Uuid::parse_str(&token).unwrap();
        prop_assert_eq!(parsed.get_version_num(), 7);
    }

    #[test]
    fn prop_luhn_flip_breaks_check(length in 2usize..=64) {
        let token = TokenFormat::LuhnPreserving.generate(length).unwrap();

        // Changing the check digit must break the Luhn rule
        let bytes = token.as_bytes();
        let last = bytes[length - 1] - b'0';
        let mut broken = token.clone().into_bytes();
        broken[length - 1] = b'0' + ((last + 1) % 10);
        let broken = String::from_utf8(broken).unwrap();
        prop_assert!(!luhn_valid(&broken));
    }
}

// =============================================================================
// Length Bounds
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_oversized_lengths_rejected(length in (MAX_TOKEN_LEN + 1)..=10_000usize) {
        for format in [
            TokenFormat::Numeric,
            TokenFormat::LuhnPreserving,
            TokenFormat::Alphanumeric,
        ] {
            prop_assert!(format.generate(length).is_err());
        }
    }
}

#[test]
fn prop_zero_length_rejected_for_preserving_formats() {
    assert!(TokenFormat::Numeric.generate(0).is_err());
    assert!(TokenFormat::LuhnPreserving.generate(0).is_err());
    assert!(TokenFormat::LuhnPreserving.generate(1).is_err());
    assert!(TokenFormat::Alphanumeric.generate(0).is_err());
}

// =============================================================================
// Non-Determinism of Generators
// =============================================================================

#[test]
fn prop_generated_tokens_are_distinct() {
    // 16-digit numeric space is large enough that 100 draws should not
    // collide; a repeat indicates a broken RNG path.
    let mut seen = std::collections::HashSet::new();
    for _ in 0..100 {
        let token = TokenFormat::Numeric.generate(16).unwrap();
        assert!(seen.insert(token));
    }
}
