//! Decoders for variable-length response payloads.
//!
//! All functions take the response data with the status word already
//! stripped (see [`ApduResponse::data`](crate::apdu::ApduResponse::data)).
//!
//! # Public Key Response
//!
//! ```text
//! | pk_len | pk_bytes | addr_len | addr_bytes (UTF-8) |
//! |--------|----------|----------|--------------------|
//! | 1B     | pk_len   | 1B       | addr_len           |
//! ```

use k256::PublicKey;
use serde::{Deserialize, Serialize};

use crate::crypto::parse_public_key;
use crate::error::{Error, Result};

/// Public key and address returned by `GET_PUBKEY`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyInfo {
    /// SEC1-encoded public key, as sent by the device.
    #[serde(with = "hex::serde")]
    pub public_key: Vec<u8>,

    /// Address string for the requested format.
    pub address: String,
}

impl PublicKeyInfo {
    /// Parses the SEC1 bytes into a secp256k1 public key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPublicKey`] if the bytes are not a curve point.
    pub fn parsed_public_key(&self) -> Result<PublicKey> {
        parse_public_key(&self.public_key)
    }
}

/// Decodes a `GET_PUBKEY` payload.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] if a length field reads past the end
/// of `data`, or if the address is not valid UTF-8.
///
/// # Example
///
/// ```
/// use defi_ledger_core::response::decode_public_key;
///
/// let data = [2, 0xAA, 0xBB, 3, b'a', b'b', b'c'];
/// let info = decode_public_key(&data).unwrap();
/// assert_eq!(info.public_key, vec![0xAA, 0xBB]);
/// assert_eq!(info.address, "abc");
/// ```
pub fn decode_public_key(data: &[u8]) -> Result<PublicKeyInfo> {
    let mut reader = LengthPrefixed::new(data);

    let public_key = reader.field("public key")?.to_vec();
    let address = reader.field("address")?;
    let address = String::from_utf8(address.to_vec())
        .map_err(|e| Error::MalformedResponse(format!("address is not UTF-8: {e}")))?;

    Ok(PublicKeyInfo {
        public_key,
        address,
    })
}

/// Decodes a `GET_VERSION` payload.
///
/// The whole payload is the version; it is returned as bytes because the app
/// does not promise any particular encoding.
#[must_use]
pub fn decode_version(data: &[u8]) -> Vec<u8> {
    data.to_vec()
}

/// Walks a buffer of one-byte-length-prefixed fields.
#[derive(Debug)]
struct LengthPrefixed<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> LengthPrefixed<'a> {
    const fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn field(&mut self, what: &str) -> Result<&'a [u8]> {
        let len = *self.data.get(self.offset).ok_or_else(|| {
            Error::MalformedResponse(format!(
                "{what} length missing at offset {}",
                self.offset
            ))
        })? as usize;

        let start = self.offset + 1;
        let end = start + len;
        let field = self.data.get(start..end).ok_or_else(|| {
            Error::MalformedResponse(format!(
                "{what} of {len} bytes overruns a {}-byte response",
                self.data.len()
            ))
        })?;

        self.offset = end;
        Ok(field)
    }
}
