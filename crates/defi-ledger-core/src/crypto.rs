//! Hashing and key helpers for secp256k1.
//!
//! The device signs the double SHA-256 digest of a message. The host needs
//! the same digest to ask the device to verify a signature, and it needs to
//! parse the SEC1 public keys the device returns.
//!
//! # Example
//!
//! ```
//! use defi_ledger_core::crypto::double_sha256;
//!
//! let digest = double_sha256(b"hello");
//! assert_eq!(digest.len(), 32);
//! ```

use k256::PublicKey;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Length of a SHA-256 digest.
pub const DIGEST_LEN: usize = 32;

/// Computes `SHA256(SHA256(message))`.
#[must_use]
pub fn double_sha256(message: &[u8]) -> [u8; DIGEST_LEN] {
    let first = Sha256::digest(message);
    Sha256::digest(first).into()
}

/// Parses a compressed or uncompressed SEC1 secp256k1 public key.
///
/// # Errors
///
/// Returns [`Error::InvalidPublicKey`] if the bytes are not a point on the curve.
pub fn parse_public_key(sec1: &[u8]) -> Result<PublicKey> {
    PublicKey::from_sec1_bytes(sec1).map_err(|e| Error::InvalidPublicKey(e.to_string()))
}

#[cfg(test)]
mod tests {
    use k256::elliptic_curve::sec1::ToEncodedPoint;

    use super::*;

    #[test]
    fn double_sha256_empty() {
        // SHA256(SHA256("")), a well-known constant.
        assert_eq!(
            hex::encode(double_sha256(b"")),
            "5df6e0e2761359d30a8275058e299fcc0381534545f55cf43e41983f5d4c9456"
        );
    }

    #[test]
    fn double_sha256_hello() {
        assert_eq!(
            hex::encode(double_sha256(b"hello")),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
    }

    #[test]
    fn parse_generator_point() {
        let compressed =
            hex::decode("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")
                .unwrap();
        let key = parse_public_key(&compressed).unwrap();

        let uncompressed = key.to_encoded_point(false);
        assert_eq!(uncompressed.as_bytes().len(), 65);
        assert_eq!(parse_public_key(uncompressed.as_bytes()).unwrap(), key);
    }

    #[test]
    fn parse_invalid_key() {
        assert!(matches!(
            parse_public_key(&[0x04; 10]),
            Err(Error::InvalidPublicKey(_))
        ));
    }
}
