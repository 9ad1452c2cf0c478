//! Ed25519 key handling. The private key seed lives in the credential vault
//! as base64; the public key is what peers and the relay register.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::{SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;

use crate::error::{PeerError, Result};

/// Generate a fresh keypair (first-run provisioning).
pub fn generate() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

pub fn signing_key_to_base64(key: &SigningKey) -> String {
    BASE64.encode(key.to_bytes())
}

pub fn verifying_key_to_base64(key: &VerifyingKey) -> String {
    BASE64.encode(key.to_bytes())
}

pub fn signing_key_from_base64(raw: &str) -> Result<SigningKey> {
    let bytes = BASE64
        .decode(raw.trim())
        .map_err(|e| PeerError::BadKey(e.to_string()))?;
    let seed: [u8; SECRET_KEY_LENGTH] = bytes
        .try_into()
        .map_err(|_| PeerError::BadKey("signing key must be 32 bytes".to_string()))?;
    Ok(SigningKey::from_bytes(&seed))
}

pub fn verifying_key_from_base64(raw: &str) -> Result<VerifyingKey> {
    let bytes = BASE64
        .decode(raw.trim())
        .map_err(|e| PeerError::BadKey(e.to_string()))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| PeerError::BadKey("verifying key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&arr).map_err(|e| PeerError::BadKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_round_trip_through_base64() {
        let key = generate();
        let restored = signing_key_from_base64(&signing_key_to_base64(&key)).unwrap();
        assert_eq!(key.to_bytes(), restored.to_bytes());

        let pubkey = key.verifying_key();
        let restored_pub =
            verifying_key_from_base64(&verifying_key_to_base64(&pubkey)).unwrap();
        assert_eq!(pubkey, restored_pub);
    }

    #[test]
    fn malformed_key_material_is_rejected() {
        assert!(signing_key_from_base64("not base64!!!").is_err());
        assert!(signing_key_from_base64(&BASE64.encode([1u8; 16])).is_err());
        assert!(verifying_key_from_base64(&BASE64.encode([1u8; 31])).is_err());
    }
}
