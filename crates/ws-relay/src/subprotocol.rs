//! Identity smuggled through WebSocket subprotocol tokens.
//!
//! Subprotocol tokens may not contain `=` or `/`, so impersonated identity
//! is carried as standard base64 with `=` mapped to `_` and `/` mapped to
//! `-`, prefixed with the header name it stands in for.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use thiserror::Error;

/// Token prefix carrying an impersonated user name.
pub const USER_PREFIX: &str = "Impersonate-User.";
/// Token prefix carrying an impersonated group name.
pub const GROUP_PREFIX: &str = "Impersonate-Group.";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed base64 payload")]
    Base64(#[from] base64::DecodeError),
    #[error("payload is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Decode the payload of an impersonation token back into an identity.
pub fn decode(payload: &str) -> Result<String, DecodeError> {
    let restored = payload.replace('_', "=").replace('-', "/");
    let bytes = STANDARD.decode(restored)?;
    Ok(String::from_utf8(bytes)?)
}

/// Encode an identity into the token-safe alphabet.
pub fn encode(identity: &str) -> String {
    STANDARD.encode(identity).replace('=', "_").replace('/', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_simple_identity() {
        let encoded = encode("alice");
        assert_eq!(decode(&encoded).unwrap(), "alice");
    }

    #[test]
    fn round_trip_identity_requiring_padding() {
        // Lengths 1 and 2 mod 3 force one or two `=` padding characters.
        for identity in ["a", "ab", "abcd", "kube:admin"] {
            let encoded = encode(identity);
            assert!(!encoded.contains('='));
            assert!(!encoded.contains('/'));
            assert_eq!(decode(&encoded).unwrap(), *identity, "{identity}");
        }
    }

    #[test]
    fn round_trip_identity_whose_encoding_contains_slash() {
        // High code points produce `/` in the standard base64 alphabet.
        let identity = "\u{7ff}\u{7ff}\u{7ff}";
        let encoded = encode(identity);
        assert!(!encoded.contains('/'));
        assert_eq!(decode(&encoded).unwrap(), identity);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(decode("!!!"), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn decode_rejects_non_utf8_payload() {
        let encoded = STANDARD.encode([0xff, 0xfe]).replace('=', "_");
        assert!(matches!(decode(&encoded), Err(DecodeError::Utf8(_))));
    }
}
