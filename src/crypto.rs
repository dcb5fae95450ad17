//! Hashing and software ECDSA P-256
//!
//! Offline verification lives here, independent of any device session.
//! The key helpers are shared with the software secure element.

use crate::error::{EcletError, Result};
use crate::types::{Digest, PublicKey, Signature};
use crate::validate::ArgumentError;
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{self, SigningKey, VerifyingKey};
use rand_core::OsRng;
use sha2::{Digest as _, Sha256};
use tracing::debug;

/// SHA-256 of `data`
pub fn sha256(data: &[u8]) -> Digest {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&Sha256::digest(data));
    Digest::from_bytes(bytes)
}

/// Verify `signature` over a pre-computed `digest` in software.
///
/// A signature that does not match, including one whose R or S is not a
/// valid scalar, is `Ok(false)`. A public key that is not a point on the
/// curve is an error.
pub fn verify_signature(pub_key: &PublicKey, digest: &Digest, signature: &Signature) -> Result<bool> {
    let verifying_key = VerifyingKey::from_sec1_bytes(pub_key.as_bytes())
        .map_err(|e| EcletError::crypto_with_source("public key is not a P-256 curve point", e))?;

    let signature = match ecdsa::Signature::from_slice(signature.as_bytes()) {
        Ok(signature) => signature,
        Err(e) => {
            debug!("Signature scalars rejected: {}", e);
            return Ok(false);
        }
    };

    Ok(verifying_key
        .verify_prehash(digest.as_bytes(), &signature)
        .is_ok())
}

/// Fresh random P-256 private key
pub(crate) fn generate_signing_key() -> SigningKey {
    SigningKey::random(&mut OsRng)
}

/// Uncompressed public key belonging to `key`
pub(crate) fn public_key_of(key: &SigningKey) -> std::result::Result<PublicKey, ArgumentError> {
    let point = key.verifying_key().to_encoded_point(false);
    let mut bytes = [0u8; PublicKey::LEN];
    bytes.copy_from_slice(point.as_bytes());
    PublicKey::from_bytes(bytes)
}

/// Deterministic ECDSA signature over a pre-computed digest
pub(crate) fn sign_digest(key: &SigningKey, digest: &Digest) -> std::result::Result<Signature, ecdsa::Error> {
    let signature: ecdsa::Signature = key.sign_prehash(digest.as_bytes())?;
    let mut bytes = [0u8; Signature::LEN];
    bytes.copy_from_slice(&signature.to_bytes());
    Ok(Signature::from_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        let digest = sha256(b"abc");
        assert_eq!(
            digest.to_string(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sign_then_verify_offline() {
        let key = generate_signing_key();
        let public_key = public_key_of(&key).unwrap();
        let digest = sha256(b"message");

        let signature = sign_digest(&key, &digest).unwrap();
        assert!(verify_signature(&public_key, &digest, &signature).unwrap());

        let other = sha256(b"other message");
        assert!(!verify_signature(&public_key, &other, &signature).unwrap());
    }

    #[test]
    fn test_zero_signature_is_a_negative_verdict() {
        let public_key = public_key_of(&generate_signing_key()).unwrap();
        let digest = sha256(b"message");
        let signature = Signature::from_bytes([0u8; 64]);

        assert!(!verify_signature(&public_key, &digest, &signature).unwrap());
    }

    #[test]
    fn test_off_curve_public_key_is_an_error() {
        let mut bytes = [0x11u8; PublicKey::LEN];
        bytes[0] = 0x04;
        let public_key = PublicKey::from_bytes(bytes).unwrap();
        let signature = Signature::from_bytes([0x22u8; 64]);

        let err = verify_signature(&public_key, &sha256(b"x"), &signature).unwrap_err();
        assert!(matches!(err, EcletError::Crypto { .. }));
    }
}
