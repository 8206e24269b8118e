//! Stateless identity tokens for the keyhole URL shortener.
//!
//! A token is the hex form of the AES-256-GCM ciphertext of a freshly
//! generated user identifier. The key is derived from a configured secret
//! with SHA-256 and the nonce is taken from the key tail, so token validity
//! is verifiable without any server-side session state and the same
//! identifier always maps to the same token. The `random-nonce` feature
//! trades that stability for per-encode nonces prepended to the ciphertext.

use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;

#[derive(Debug, Error)]
pub enum IdentityError {
    /// The token is missing, malformed or fails authentication.
    #[error("token authentication failed")]
    InvalidAuth,
    /// The cipher itself failed; surfaces as the *Internal* class.
    #[error("encryption failed: {0}")]
    Cipher(String),
}

/// A freshly issued identity: the user id and the token encoding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub user_id: String,
    pub token: String,
}

/// Process-wide token codec. Read-only after construction and lock-free.
pub struct Identity {
    cipher: Aes256Gcm,
    #[cfg_attr(feature = "random-nonce", allow(dead_code))]
    nonce: [u8; NONCE_SIZE],
}

impl Identity {
    /// Derives the encryption context from the configured secret.
    ///
    /// Key = SHA-256(secret); nonce = the last [`NONCE_SIZE`] bytes of the
    /// key.
    pub fn new(secret: &str) -> Self {
        let key: [u8; KEY_SIZE] = Sha256::digest(secret.as_bytes()).into();
        let cipher = Aes256Gcm::new(GenericArray::from_slice(&key));
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&key[KEY_SIZE - NONCE_SIZE..]);
        Self { cipher, nonce }
    }

    /// Returns the hex form of the authenticated ciphertext of `payload`.
    #[cfg(not(feature = "random-nonce"))]
    pub fn encode(&self, payload: &[u8]) -> Result<String> {
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&self.nonce), payload)
            .map_err(|e| IdentityError::Cipher(e.to_string()))?;
        Ok(hex::encode(sealed))
    }

    /// Returns the hex form of a fresh nonce followed by the authenticated
    /// ciphertext of `payload`.
    #[cfg(feature = "random-nonce")]
    pub fn encode(&self, payload: &[u8]) -> Result<String> {
        use rand::RngCore;

        let mut nonce = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce);
        let sealed = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), payload)
            .map_err(|e| IdentityError::Cipher(e.to_string()))?;
        let mut out = nonce.to_vec();
        out.extend_from_slice(&sealed);
        Ok(hex::encode(out))
    }

    /// Hex-decodes and opens a token. Any failure — bad hex, wrong length,
    /// authentication failure — collapses to [`IdentityError::InvalidAuth`].
    pub fn decode(&self, token: &str) -> Result<Vec<u8>> {
        let bytes = hex::decode(token).map_err(|_| IdentityError::InvalidAuth)?;
        self.open(&bytes)
    }

    #[cfg(not(feature = "random-nonce"))]
    fn open(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        self.cipher
            .decrypt(Nonce::from_slice(&self.nonce), bytes)
            .map_err(|_| IdentityError::InvalidAuth)
    }

    #[cfg(feature = "random-nonce")]
    fn open(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        if bytes.len() < NONCE_SIZE {
            return Err(IdentityError::InvalidAuth);
        }
        let (nonce, sealed) = bytes.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| IdentityError::InvalidAuth)
    }

    /// Issues a token for a freshly generated user identifier (a v4 UUID in
    /// canonical text form).
    pub fn issue(&self) -> Result<IssuedToken> {
        let user_id = Uuid::new_v4().to_string();
        let token = self.encode(user_id.as_bytes())?;
        Ok(IssuedToken { user_id, token })
    }

    /// Validates a token and returns the user identifier it encodes.
    pub fn validate(&self, token: &str) -> Result<String> {
        let payload = self.decode(token)?;
        String::from_utf8(payload).map_err(|_| IdentityError::InvalidAuth)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity").field("key", &"[REDACTED]").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new("jds__63h3_7ds")
    }

    #[test]
    fn issue_then_validate_roundtrips() {
        let id = identity();
        let issued = id.issue().unwrap();
        let user_id = id.validate(&issued.token).unwrap();
        assert_eq!(user_id, issued.user_id);
    }

    #[test]
    fn encode_decode_roundtrips_arbitrary_payload() {
        let id = identity();
        let token = id.encode(b"some payload").unwrap();
        assert_eq!(id.decode(&token).unwrap(), b"some payload");
    }

    #[cfg(not(feature = "random-nonce"))]
    #[test]
    fn encoding_is_deterministic_per_payload() {
        let id = identity();
        let a = id.encode(b"user-1").unwrap();
        let b = id.encode(b"user-1").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_secrets_reject_each_others_tokens() {
        let issued = identity().issue().unwrap();
        let other = Identity::new("another secret entirely");
        assert!(matches!(
            other.validate(&issued.token),
            Err(IdentityError::InvalidAuth)
        ));
    }

    #[test]
    fn bad_hex_is_invalid_auth() {
        assert!(matches!(
            identity().validate("not hex at all"),
            Err(IdentityError::InvalidAuth)
        ));
    }

    #[test]
    fn tampered_token_is_invalid_auth() {
        let id = identity();
        let mut token = id.issue().unwrap().token;
        // Flip one hex digit somewhere in the middle of the ciphertext.
        let mid = token.len() / 2;
        let replacement = if &token[mid..=mid] == "0" { "1" } else { "0" };
        token.replace_range(mid..=mid, replacement);
        assert!(matches!(id.validate(&token), Err(IdentityError::InvalidAuth)));
    }

    #[test]
    fn truncated_token_is_invalid_auth() {
        let id = identity();
        let token = id.issue().unwrap().token;
        assert!(matches!(
            id.validate(&token[..8]),
            Err(IdentityError::InvalidAuth)
        ));
    }
}
