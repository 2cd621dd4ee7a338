//! Property-based tests for error classification and transport mapping.

use proptest::prelude::*;
use uuid::Uuid;
use vault_service::{ErrorKind, VaultError};

/// Arbitrary error message generator
fn arb_error_message() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,100}".prop_map(|s| s.to_string())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Classification is stable regardless of the carried message.
    #[test]
    fn prop_kind_is_message_independent(msg in arb_error_message()) {
        prop_assert_eq!(
            VaultError::TokenizationKeyNotFound(msg.clone()).kind(),
            ErrorKind::NotFound
        );
        prop_assert_eq!(VaultError::AlreadyExists(msg.clone()).kind(), ErrorKind::Conflict);
        prop_assert_eq!(VaultError::Conflict(msg.clone()).kind(), ErrorKind::Conflict);
        prop_assert_eq!(
            VaultError::InvalidInput(msg.clone()).kind(),
            ErrorKind::InvalidInput
        );
        prop_assert_eq!(VaultError::Unauthorized(msg.clone()).kind(), ErrorKind::Unauthorized);
        prop_assert_eq!(VaultError::Forbidden(msg.clone()).kind(), ErrorKind::Forbidden);
        prop_assert_eq!(VaultError::Locked(msg.clone()).kind(), ErrorKind::Locked);
        prop_assert_eq!(VaultError::Internal(msg).kind(), ErrorKind::Internal);
    }

    /// Every kind maps to exactly one transport status in the agreed table.
    #[test]
    fn prop_status_codes_are_stable(size in 65_537usize..1_000_000) {
        prop_assert_eq!(VaultError::TokenNotFound.kind().http_status(), 404);
        prop_assert_eq!(VaultError::PlaintextEmpty.kind().http_status(), 422);
        prop_assert_eq!(VaultError::PlaintextTooLarge(size).kind().http_status(), 422);
        prop_assert_eq!(
            VaultError::KekNotFound(Uuid::now_v7()).kind().http_status(),
            404
        );
        prop_assert_eq!(VaultError::DecryptionFailed.kind().http_status(), 500);
    }

    /// The opaque decryption failure never carries caller-visible detail.
    #[test]
    fn prop_decryption_failure_stays_opaque(msg in arb_error_message()) {
        let rendered = VaultError::DecryptionFailed.to_string();
        prop_assert!(!rendered.contains(&msg));
        prop_assert!(!rendered.contains("unwrap"));
        prop_assert!(!rendered.contains("KEK"));
        prop_assert!(!rendered.contains("stage"));
    }
}

#[test]
fn kind_strings_are_distinct() {
    let kinds = [
        ErrorKind::NotFound,
        ErrorKind::Conflict,
        ErrorKind::InvalidInput,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::Locked,
        ErrorKind::DecryptionFailed,
        ErrorKind::Internal,
    ];
    let mut seen = std::collections::HashSet::new();
    for kind in kinds {
        assert!(seen.insert(kind.as_str()));
    }
}
