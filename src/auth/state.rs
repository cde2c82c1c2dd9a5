//! Round-trip state carried through the provider redirect.
//!
//! The state is not stored server-side and not signed. The nonce inside it is
//! the only secret: it must reappear inside the provider-signed ID token, so
//! a forged or replayed state fails at the nonce check.

use base64::{
    Engine as _,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// URL-safe alphabet, unpadded on encode, padding tolerated on decode.
const STATE_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Upper bound on an encoded state; anything longer is rejected before decoding.
const MAX_STATE_LEN: usize = 4096;

/// Bytes of entropy in a nonce.
const NONCE_BYTES: usize = 32;

/// State for one authorization round trip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub provider_id: Uuid,
    pub return_url: Option<String>,
    pub nonce: String,
}

impl AuthState {
    /// Build a state with a freshly generated nonce.
    pub fn new(provider_id: Uuid, return_url: Option<String>) -> Self {
        Self {
            provider_id,
            return_url,
            nonce: generate_nonce(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("state is empty")]
    Empty,

    #[error("state exceeds {MAX_STATE_LEN} bytes")]
    TooLong,

    #[error("state is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("state payload is malformed: {0}")]
    Payload(#[from] serde_json::Error),
}

/// Encodes and decodes [`AuthState`] as URL-safe base64 JSON.
pub struct StateCodec;

impl StateCodec {
    pub fn encode(state: &AuthState) -> Result<String, StateError> {
        let json = serde_json::to_vec(state)?;
        Ok(STATE_ENGINE.encode(json))
    }

    pub fn decode(token: &str) -> Result<AuthState, StateError> {
        if token.is_empty() {
            return Err(StateError::Empty);
        }
        if token.len() > MAX_STATE_LEN {
            return Err(StateError::TooLong);
        }

        let bytes = STATE_ENGINE.decode(token)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Generate an unguessable nonce (32 random bytes, base64url).
pub fn generate_nonce() -> String {
    let mut bytes = [0u8; NONCE_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    STATE_ENGINE.encode(bytes)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Some("https://app.example.com/after?tab=links&x=1"))]
    #[case(Some("/dashboard"))]
    #[case(Some("https://app.example.com/ünïcode/päth"))]
    #[case(Some(""))]
    #[case(None)]
    fn test_round_trip(#[case] return_url: Option<&str>) {
        let state = AuthState::new(Uuid::new_v4(), return_url.map(String::from));

        let token = StateCodec::encode(&state).unwrap();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'),
            "state must be URL-safe: {token}"
        );

        assert_eq!(StateCodec::decode(&token).unwrap(), state);
    }

    #[test]
    fn test_decode_accepts_padding() {
        let state = AuthState::new(Uuid::new_v4(), None);
        let json = serde_json::to_vec(&state).unwrap();
        let padded = base64::engine::general_purpose::URL_SAFE.encode(json);

        assert_eq!(StateCodec::decode(&padded).unwrap(), state);
    }

    #[test]
    fn test_payload_is_plain_json() {
        let provider_id = Uuid::new_v4();
        let state = AuthState {
            provider_id,
            return_url: Some("/home".into()),
            nonce: "n".into(),
        };
        let token = StateCodec::encode(&state).unwrap();
        let value: serde_json::Value =
            serde_json::from_slice(&STATE_ENGINE.decode(token).unwrap()).unwrap();

        assert_eq!(value["provider_id"], provider_id.to_string());
        assert_eq!(value["return_url"], "/home");
        assert_eq!(value["nonce"], "n");
    }

    #[rstest]
    #[case("")]
    #[case("not base64!")]
    #[case("aGVsbG8")] // "hello"
    #[case("eyJub25jZSI6Im4ifQ")] // {"nonce":"n"}
    fn test_decode_malformed(#[case] token: &str) {
        assert!(StateCodec::decode(token).is_err());
    }

    #[test]
    fn test_decode_rejects_oversized() {
        let token = "A".repeat(MAX_STATE_LEN + 1);
        assert!(matches!(
            StateCodec::decode(&token),
            Err(StateError::TooLong)
        ));
    }

    #[test]
    fn test_nonces_are_unique_and_sized() {
        let a = generate_nonce();
        let b = generate_nonce();
        assert_ne!(a, b);
        // 32 bytes -> 43 unpadded base64 characters
        assert_eq!(a.len(), 43);
    }
}
