//! Recoverable secp256k1 signatures.
//!
//! The device returns signatures in a DER-like form:
//!
//! ```text
//! 30|31  len  02  r_len  r_bytes  02  s_len  s_bytes
//! ```
//!
//! A component is 33 bytes when DER had to prepend a zero to keep the high
//! bit clear. The first byte doubles as the recovery parity: `0x31` marks an
//! odd `y` coordinate of the ephemeral point.
//!
//! Applications consume the canonical 65-byte form `r || s || recovery`.
//!
//! # Example
//!
//! ```
//! use defi_ledger_core::Signature;
//!
//! let mut der = vec![0x31, 0x44, 0x02, 0x20];
//! der.extend_from_slice(&[0x11; 32]);
//! der.extend_from_slice(&[0x02, 0x20]);
//! der.extend_from_slice(&[0x22; 32]);
//!
//! let sig = Signature::from_device(&der).unwrap();
//! assert_eq!(sig.r(), &[0x11; 32]);
//! assert_eq!(sig.s(), &[0x22; 32]);
//! assert_eq!(sig.recovery(), 1);
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// First byte the device uses to flag odd recovery parity.
pub const ODD_PARITY_MARKER: u8 = 0x31;

/// Offset of `r_len` in the device-native signature.
const R_LEN_OFFSET: usize = 3;

/// A canonical recoverable signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// The R component of the signature (32 bytes).
    #[serde(with = "hex_bytes")]
    r: [u8; 32],

    /// The S component of the signature (32 bytes).
    #[serde(with = "hex_bytes")]
    s: [u8; 32],

    /// Recovery flag (`0` or `1`).
    recovery: u8,
}

/// Serde helper for hex encoding/decoding 32-byte arrays.
mod hex_bytes {
    use hex::{decode, encode};
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub(super) fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&encode(bytes))
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = decode(&s).map_err(de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| de::Error::custom("expected 32 bytes"))
    }
}

impl Signature {
    /// The length of a canonical signature in bytes.
    pub const BYTE_LEN: usize = 65;

    /// Creates a new signature from raw components.
    #[must_use]
    pub const fn new(r: [u8; 32], s: [u8; 32], recovery: u8) -> Self {
        Self { r, s, recovery }
    }

    /// Canonicalizes a device-native signature.
    ///
    /// `r_len` is read at offset 3 and `s_len` at `5 + r_len`. A 33-byte
    /// component loses its leading zero; shorter components are left-padded
    /// to 32 bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSignature`] if a length field points past the
    /// end of the buffer or a component does not fit in 32 bytes.
    pub fn from_device(raw: &[u8]) -> Result<Self> {
        let r_len = byte_at(raw, R_LEN_OFFSET, "r length")? as usize;
        let r_start = R_LEN_OFFSET + 1;
        let s_len_offset = r_start + r_len + 1;
        let s_len = byte_at(raw, s_len_offset, "s length")? as usize;
        let s_start = s_len_offset + 1;

        let r = component(raw, r_start, r_len, "r")?;
        let s = component(raw, s_start, s_len, "s")?;

        let mut recovery = 0x00;
        if raw[0] == ODD_PARITY_MARKER {
            recovery |= 0x01;
        }

        Ok(Self { r, s, recovery })
    }

    /// Creates a signature from a 65-byte slice (`r || s || recovery`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedSignature`] if the slice is not 65 bytes or the
    /// recovery flag is not `0` or `1`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; Self::BYTE_LEN] = bytes.try_into().map_err(|_| {
            Error::MalformedSignature(format!(
                "expected {} bytes, got {}",
                Self::BYTE_LEN,
                bytes.len()
            ))
        })?;

        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[0..32]);
        s.copy_from_slice(&bytes[32..64]);
        let recovery = bytes[64];

        if recovery > 1 {
            return Err(Error::MalformedSignature(format!(
                "recovery flag {recovery} is not 0 or 1"
            )));
        }

        Ok(Self::new(r, s, recovery))
    }

    /// Serializes the signature to a 65-byte array.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::BYTE_LEN] {
        let mut bytes = [0u8; Self::BYTE_LEN];
        bytes[0..32].copy_from_slice(&self.r);
        bytes[32..64].copy_from_slice(&self.s);
        bytes[64] = self.recovery;
        bytes
    }

    /// Returns the R component.
    #[must_use]
    pub const fn r(&self) -> &[u8; 32] {
        &self.r
    }

    /// Returns the S component.
    #[must_use]
    pub const fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// Returns the recovery flag.
    #[must_use]
    pub const fn recovery(&self) -> u8 {
        self.recovery
    }

    /// Encodes the signature as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Parses a signature from a hex string, optionally prefixed with `0x`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HexDecodeFailed`] for invalid hex, or
    /// [`Error::MalformedSignature`] if the bytes are not a canonical signature.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let hex_str = hex_str.strip_prefix("0x").unwrap_or(hex_str);
        let bytes = hex::decode(hex_str)?;
        Self::from_bytes(&bytes)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

fn byte_at(raw: &[u8], offset: usize, what: &str) -> Result<u8> {
    raw.get(offset).copied().ok_or_else(|| {
        Error::MalformedSignature(format!(
            "{what} at offset {offset} is past the end of a {}-byte signature",
            raw.len()
        ))
    })
}

fn component(raw: &[u8], start: usize, len: usize, what: &str) -> Result<[u8; 32]> {
    let bytes = raw.get(start..start + len).ok_or_else(|| {
        Error::MalformedSignature(format!(
            "{what} spans {start}..{} in a {}-byte signature",
            start + len,
            raw.len()
        ))
    })?;

    let bytes = if len == 33 { &bytes[1..] } else { bytes };
    if bytes.len() > 32 {
        return Err(Error::MalformedSignature(format!(
            "{what} component is {len} bytes"
        )));
    }

    let mut out = [0u8; 32];
    out[32 - bytes.len()..].copy_from_slice(bytes);
    Ok(out)
}
