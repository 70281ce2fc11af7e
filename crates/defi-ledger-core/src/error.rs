//! Error types for the DeFiChain Ledger driver.
//!
//! This module provides a single error type [`enum@Error`] covering every
//! failure mode between the caller and the device.
//!
//! # Error Categories
//!
//! - **Transport errors**: platform support, opening a device, I/O and timeouts
//! - **Device errors**: non-OK status words returned by the Ledger app
//! - **Framing errors**: responses or signatures whose length fields do not fit
//! - **Session errors**: operating on a closed or busy session
//!
//! # Example
//!
//! ```
//! use defi_ledger_core::Error;
//!
//! fn example() -> Result<(), Error> {
//!     let err = Error::NotConnected;
//!     assert!(matches!(err, Error::NotConnected));
//!     Ok(())
//! }
//! ```

use core::result::Result as CoreResult;
use hex::FromHexError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// The main error type for the DeFiChain Ledger driver.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The platform transport is not available.
    #[error("transport is not supported on this platform")]
    TransportUnsupported,

    /// Opening the transport to the device failed.
    #[error("failed to open transport: {0}")]
    TransportOpen(String),

    /// Reading from or writing to an open transport failed.
    #[error("transport I/O failed: {0}")]
    TransportIo(String),

    /// The transport did not answer within its timeout.
    #[error("transport exchange timed out")]
    Timeout,

    // =========================================================================
    // Device Errors
    // =========================================================================
    /// The device answered with a known non-OK status word.
    #[error("device returned status {code:#06x}: {message}")]
    DeviceStatus {
        /// Raw status word.
        code: u16,
        /// Human-readable meaning of the status word.
        message: &'static str,
    },

    /// The device answered with a status word missing from the status table.
    #[error("unknown device status {0:#06x}")]
    UnknownStatus(u16),

    // =========================================================================
    // Framing Errors
    // =========================================================================
    /// The response from the device was malformed.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// The device-native signature could not be canonicalized.
    #[error("malformed signature: {0}")]
    MalformedSignature(String),

    /// A command payload does not fit in the one-byte length field.
    #[error("APDU payload of {len} bytes exceeds 255")]
    PayloadTooLong {
        /// Length of the rejected payload.
        len: usize,
    },

    /// The public key bytes returned by the device are not a valid SEC1 point.
    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    // =========================================================================
    // Session Errors
    // =========================================================================
    /// The session has no open transport.
    #[error("session is not connected")]
    NotConnected,

    /// Another exchange is in flight on this session.
    #[error("session is busy with another exchange")]
    SessionBusy,

    // =========================================================================
    // Configuration and Serialization Errors
    // =========================================================================
    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to parse hex data.
    #[error("hex decoding failed: {0}")]
    HexDecodeFailed(String),

    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    JsonError(String),
}

impl Error {
    /// Returns the raw status word when this error came from the device.
    #[must_use]
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::DeviceStatus { code, .. } | Self::UnknownStatus(code) => Some(*code),
            _ => None,
        }
    }
}

impl From<FromHexError> for Error {
    fn from(err: FromHexError) -> Self {
        Error::HexDecodeFailed(err.to_string())
    }
}

impl From<SerdeJsonError> for Error {
    fn from(err: SerdeJsonError) -> Self {
        Error::JsonError(err.to_string())
    }
}

/// A specialized [`Result`] type for Ledger driver operations.
pub type Result<T> = CoreResult<T, Error>;
