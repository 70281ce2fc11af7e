//! APDU (Application Protocol Data Unit) command and response types.
//!
//! This module provides the command and response framing spoken by the
//! DeFiChain Ledger app.
//!
//! # APDU Command Structure
//!
//! ```text
//! | CLA  | INS | P1 | P2 | Lc | Data |
//! |------|-----|----|----|----|------|
//! | 0xE0 | 1B  | 1B | 1B | 1B | Var  |
//! ```
//!
//! The header is always five bytes, `Lc` included, even for an empty
//! payload. The payload therefore never exceeds 255 bytes; longer messages
//! are split by the command encoder before they reach this type.
//!
//! # APDU Response Structure
//!
//! ```text
//! | Data | SW1 | SW2 |
//! |------|-----|-----|
//! | Var  | 1B  | 1B  |
//! ```
//!
//! # Example
//!
//! ```
//! use defi_ledger_core::apdu::{Apdu, ApduResponse, Instruction};
//!
//! let apdu = Apdu::new(Instruction::GetVersion, 0x00, 0x00, vec![]).unwrap();
//! assert_eq!(apdu.to_bytes(), vec![0xE0, 0x01, 0x00, 0x00, 0x00]);
//!
//! let response = ApduResponse::new(vec![0x01, 0x02, 0x90, 0x00]).unwrap();
//! assert!(response.is_success());
//! assert_eq!(response.data(), &[0x01, 0x02]);
//! ```

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::status::{SW_OK, StatusWord, check_status};

/// Class byte shared by every DeFiChain app instruction.
pub const CLA: u8 = 0xE0;

/// Instructions understood by the DeFiChain Ledger app.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Instruction {
    /// Read the app version string.
    GetVersion = 0x01,

    /// Derive a public key and address for a key index.
    GetPublicKey = 0x02,

    /// Sign a (chunked) message.
    SignMessage = 0x04,

    /// Verify a signature over a pre-hashed message.
    VerifyMessage = 0x08,

    /// Quit the app and return to the dashboard.
    Exit = 0xFF,
}

impl Instruction {
    /// Returns the instruction byte.
    #[must_use]
    pub const fn ins(self) -> u8 {
        self as u8
    }

    /// Parses an instruction byte.
    #[must_use]
    pub const fn from_ins(ins: u8) -> Option<Self> {
        match ins {
            0x01 => Some(Self::GetVersion),
            0x02 => Some(Self::GetPublicKey),
            0x04 => Some(Self::SignMessage),
            0x08 => Some(Self::VerifyMessage),
            0xFF => Some(Self::Exit),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::GetVersion => "GET_VERSION",
            Self::GetPublicKey => "GET_PUBKEY",
            Self::SignMessage => "SIGN_MSG",
            Self::VerifyMessage => "VERIFY_MSG",
            Self::Exit => "EXIT",
        };
        f.write_str(name)
    }
}

/// An APDU command.
///
/// Built once and never mutated; [`to_bytes`](Self::to_bytes) assembles the
/// wire form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apdu {
    /// Instruction.
    ins: Instruction,

    /// Parameter 1.
    p1: u8,

    /// Parameter 2.
    p2: u8,

    /// Command data.
    data: Vec<u8>,
}

impl Apdu {
    /// Maximum data length expressible in the one-byte `Lc` field.
    pub const MAX_DATA: usize = 255;

    /// Length of the fixed header (`CLA INS P1 P2 Lc`).
    pub const HEADER_LEN: usize = 5;

    /// Creates a new APDU command.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLong`] if `data` is longer than
    /// [`MAX_DATA`](Self::MAX_DATA).
    ///
    /// # Example
    ///
    /// ```
    /// use defi_ledger_core::apdu::{Apdu, Instruction};
    ///
    /// assert!(Apdu::new(Instruction::SignMessage, 0x00, 0x03, vec![0; 256]).is_err());
    /// ```
    pub fn new(ins: Instruction, p1: u8, p2: u8, data: Vec<u8>) -> Result<Self> {
        if data.len() > Self::MAX_DATA {
            return Err(Error::PayloadTooLong { len: data.len() });
        }
        Ok(Self { ins, p1, p2, data })
    }

    /// Creates a command whose payload length is fixed by construction.
    pub(crate) fn fixed(ins: Instruction, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        debug_assert!(data.len() <= Self::MAX_DATA);
        Self { ins, p1, p2, data }
    }

    /// Returns the class byte.
    #[must_use]
    pub const fn cla(&self) -> u8 {
        CLA
    }

    /// Returns the instruction.
    #[must_use]
    pub const fn ins(&self) -> Instruction {
        self.ins
    }

    /// Returns parameter 1.
    #[must_use]
    pub const fn p1(&self) -> u8 {
        self.p1
    }

    /// Returns parameter 2.
    #[must_use]
    pub const fn p2(&self) -> u8 {
        self.p2
    }

    /// Returns the command data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Serializes the APDU to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(Self::HEADER_LEN + self.data.len());
        bytes.extend_from_slice(&[
            CLA,
            self.ins.ins(),
            self.p1,
            self.p2,
            self.data.len() as u8,
        ]);
        bytes.extend_from_slice(&self.data);
        bytes
    }
}

/// An APDU response from the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApduResponse {
    /// Response data.
    data: Vec<u8>,

    /// Status word 1.
    sw1: u8,

    /// Status word 2.
    sw2: u8,
}

impl ApduResponse {
    /// Success status word (0x9000).
    pub const SW_SUCCESS: u16 = SW_OK;

    /// Creates a new APDU response from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedResponse`] if fewer than two bytes were received.
    pub fn new(mut bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(Error::MalformedResponse(format!(
                "response of {} bytes has no status word",
                bytes.len()
            )));
        }

        let sw2 = bytes.pop().unwrap_or_default();
        let sw1 = bytes.pop().unwrap_or_default();

        Ok(Self {
            data: bytes,
            sw1,
            sw2,
        })
    }

    /// Returns the response data (status word excluded).
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the response and returns the data.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Returns status word 1.
    #[must_use]
    pub const fn sw1(&self) -> u8 {
        self.sw1
    }

    /// Returns status word 2.
    #[must_use]
    pub const fn sw2(&self) -> u8 {
        self.sw2
    }

    /// Returns the full status word as a [`u16`].
    #[must_use]
    pub const fn status_word(&self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }

    /// Checks if the response indicates success (`SW = 0x9000`).
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_word() == Self::SW_SUCCESS
    }

    /// Looks the status word up in the status table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownStatus`] if the code has no known meaning.
    pub fn status(&self) -> Result<StatusWord> {
        StatusWord::from_code(self.status_word())
    }

    /// Checks the response status and returns an error if not successful.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceStatus`] or [`Error::UnknownStatus`] for any
    /// status other than `0x9000`.
    pub fn check(&self) -> Result<()> {
        check_status(self.status_word())
    }
}
