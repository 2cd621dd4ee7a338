//! Token label generators for the four supported formats.
//!
//! All randomness is drawn from the OS CSPRNG; format-preserving modes
//! mirror the plaintext length so a generated label can stand in for the
//! original value.

use crate::error::VaultError;
use rand::rngs::OsRng;
use rand::Rng;
use uuid::Uuid;

/// Minimum accepted length for format-preserving tokens.
pub const MIN_TOKEN_LEN: usize = 1;

/// Maximum accepted length for format-preserving tokens.
pub const MAX_TOKEN_LEN: usize = 255;

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Token label format bound to a tokenization key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFormat {
    /// Opaque UUIDv7 string; plaintext length is ignored
    Uuid,
    /// Random ASCII digits of the plaintext length
    Numeric,
    /// Digits of the plaintext length ending in a Luhn check digit
    LuhnPreserving,
    /// Random `[A-Za-z0-9]` characters of the plaintext length
    Alphanumeric,
}

impl TokenFormat {
    /// Parse format from its stored tag.
    pub fn from_str(s: &str) -> Result<Self, VaultError> {
        match s.to_lowercase().as_str() {
            "uuid" => Ok(Self::Uuid),
            "numeric" => Ok(Self::Numeric),
            "luhn-preserving" => Ok(Self::LuhnPreserving),
            "alphanumeric" => Ok(Self::Alphanumeric),
            _ => Err(VaultError::invalid_input(format!(
                "invalid token format: {}",
                s
            ))),
        }
    }

    /// Get the stored tag for this format.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Numeric => "numeric",
            Self::LuhnPreserving => "luhn-preserving",
            Self::Alphanumeric => "alphanumeric",
        }
    }

    /// Generate a token label of the given length.
    ///
    /// `length` is the plaintext byte length and is ignored for
    /// [`TokenFormat::Uuid`]. Format-preserving modes reject lengths
    /// outside `1..=255`; `luhn-preserving` additionally rejects `< 2`.
    pub fn generate(&self, length: usize) -> Result<String, VaultError> {
        match self {
            Self::Uuid => Ok(Uuid::now_v7().to_string()),
            Self::Numeric => {
                check_length(length)?;
                Ok(random_digits(length).into_iter().map(digit_char).collect())
            }
            Self::LuhnPreserving => {
                check_length(length)?;
                if length < 2 {
                    return Err(VaultError::invalid_input(
                        "luhn-preserving tokens require length >= 2",
                    ));
                }
                let mut digits = random_digits(length - 1);
                digits.push(luhn_check_digit(&digits));
                Ok(digits.into_iter().map(digit_char).collect())
            }
            Self::Alphanumeric => {
                check_length(length)?;
                let mut out = String::with_capacity(length);
                for _ in 0..length {
                    let idx = OsRng.gen_range(0..ALPHANUMERIC.len());
                    out.push(ALPHANUMERIC[idx] as char);
                }
                Ok(out)
            }
        }
    }

    /// Validate that a token string conforms to this format.
    pub fn validate(&self, token: &str) -> Result<(), VaultError> {
        match self {
            Self::Uuid => {
                let parsed = Uuid::parse_str(token).map_err(|_| {
                    VaultError::invalid_input("token is not a valid UUID")
                })?;
                if parsed.get_version_num() != 7 {
                    return Err(VaultError::invalid_input("token is not a UUIDv7"));
                }
                Ok(())
            }
            Self::Numeric => {
                check_length(token.len())?;
                if !token.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(VaultError::invalid_input("token is not all digits"));
                }
                Ok(())
            }
            Self::LuhnPreserving => {
                check_length(token.len())?;
                if token.len() < 2 || !token.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(VaultError::invalid_input("token is not a digit string"));
                }
                if !luhn_valid(token) {
                    return Err(VaultError::invalid_input("token fails the Luhn check"));
                }
                Ok(())
            }
            Self::Alphanumeric => {
                check_length(token.len())?;
                if !token.bytes().all(|b| b.is_ascii_alphanumeric()) {
                    return Err(VaultError::invalid_input("token is not alphanumeric"));
                }
                Ok(())
            }
        }
    }
}

impl TryFrom<String> for TokenFormat {
    type Error = VaultError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_str(&value)
    }
}

fn check_length(length: usize) -> Result<(), VaultError> {
    if !(MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&length) {
        return Err(VaultError::invalid_input(format!(
            "token length must be within {}..={}, got {}",
            MIN_TOKEN_LEN, MAX_TOKEN_LEN, length
        )));
    }
    Ok(())
}

fn random_digits(count: usize) -> Vec<u8> {
    (0..count).map(|_| OsRng.gen_range(0..10u8)).collect()
}

const fn digit_char(d: u8) -> char {
    (b'0' + d) as char
}

/// Compute the Luhn check digit for a digit payload.
///
/// The returned digit, appended to `digits`, makes the whole string sum
/// to 0 mod 10 under the Luhn rule.
fn luhn_check_digit(digits: &[u8]) -> u8 {
    let mut sum: u32 = 0;
    // Walk the payload right to left; with the check digit appended, these
    // positions alternate starting from doubled.
    for (i, &d) in digits.iter().rev().enumerate() {
        let mut value = u32::from(d);
        if i % 2 == 0 {
            value *= 2;
            if value > 9 {
                value -= 9;
            }
        }
        sum += value;
    }
    ((10 - (sum % 10)) % 10) as u8
}

/// Check whether a digit string satisfies the Luhn rule.
#[must_use]
pub fn luhn_valid(token: &str) -> bool {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let mut sum: u32 = 0;
    for (i, b) in token.bytes().rev().enumerate() {
        let mut value = u32::from(b - b'0');
        if i % 2 == 1 {
            value *= 2;
            if value > 9 {
                value -= 9;
            }
        }
        sum += value;
    }
    sum % 10 == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!(TokenFormat::from_str("uuid").unwrap(), TokenFormat::Uuid);
        assert_eq!(
            TokenFormat::from_str("luhn-preserving").unwrap(),
            TokenFormat::LuhnPreserving
        );
        assert_eq!(
            TokenFormat::from_str("ALPHANUMERIC").unwrap(),
            TokenFormat::Alphanumeric
        );
        assert!(TokenFormat::from_str("hex").is_err());
    }

    #[test]
    fn test_uuid_tokens_parse_as_v7() {
        let token = TokenFormat::Uuid.generate(0).unwrap();
        let parsed = Uuid::parse_str(&token).unwrap();
        assert_eq!(parsed.get_version_num(), 7);
        assert!(TokenFormat::Uuid.validate(&token).is_ok());
    }

    #[test]
    fn test_numeric_tokens_are_digits_of_requested_length() {
        for length in [1, 16, 255] {
            let token = TokenFormat::Numeric.generate(length).unwrap();
            assert_eq!(token.len(), length);
            assert!(token.bytes().all(|b| b.is_ascii_digit()));
            assert!(TokenFormat::Numeric.validate(&token).is_ok());
        }
    }

    #[test]
    fn test_luhn_tokens_validate() {
        for length in [2, 16, 19, 255] {
            let token = TokenFormat::LuhnPreserving.generate(length).unwrap();
            assert_eq!(token.len(), length);
            assert!(luhn_valid(&token), "token {} fails Luhn", token);
            assert!(TokenFormat::LuhnPreserving.validate(&token).is_ok());
        }
    }

    #[test]
    fn test_luhn_known_values() {
        // Standard card-number test vectors
        assert!(luhn_valid("4111111111111111"));
        assert!(luhn_valid("79927398713"));
        assert!(!luhn_valid("4111111111111112"));
        assert!(!luhn_valid("79927398710"));
        assert_eq!(luhn_check_digit(&[7, 9, 9, 2, 7, 3, 9, 8, 7, 1]), 3);
    }

    #[test]
    fn test_alphanumeric_charset() {
        let token = TokenFormat::Alphanumeric.generate(64).unwrap();
        assert_eq!(token.len(), 64);
        assert!(token.bytes().all(|b| b.is_ascii_alphanumeric()));
        assert!(TokenFormat::Alphanumeric.validate(&token).is_ok());
    }

    #[test]
    fn test_length_bounds() {
        for format in [
            TokenFormat::Numeric,
            TokenFormat::LuhnPreserving,
            TokenFormat::Alphanumeric,
        ] {
            assert!(format.generate(0).is_err());
            assert!(format.generate(256).is_err());
        }
        assert!(TokenFormat::LuhnPreserving.generate(1).is_err());
        assert!(TokenFormat::Numeric.generate(1).is_ok());
        // uuid ignores the length argument entirely
        assert!(TokenFormat::Uuid.generate(0).is_ok());
        assert!(TokenFormat::Uuid.generate(10_000).is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed() {
        assert!(TokenFormat::Numeric.validate("12a4").is_err());
        assert!(TokenFormat::Alphanumeric.validate("ab-cd").is_err());
        assert!(TokenFormat::Uuid.validate("not-a-uuid").is_err());
        assert!(TokenFormat::LuhnPreserving.validate("4111111111111112").is_err());
    }
}
