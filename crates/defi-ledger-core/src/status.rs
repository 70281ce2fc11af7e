//! Status words returned by the Ledger device.
//!
//! Every response ends with a big-endian two-byte status word. `0x9000`
//! means success; everything else is looked up in a fixed table so callers
//! get a readable message. Codes missing from the table are reported as
//! [`Error::UnknownStatus`] with the raw value.
//!
//! # Example
//!
//! ```
//! use defi_ledger_core::status::{StatusWord, SW_OK};
//!
//! let status = StatusWord::from_code(SW_OK).unwrap();
//! assert!(status.is_ok());
//!
//! let denied = StatusWord::from_code(0x6985).unwrap();
//! assert!(!denied.is_ok());
//! ```

use core::fmt;

use crate::error::{Error, Result};

/// The success status word.
pub const SW_OK: u16 = 0x9000;

/// Status word for data the app rejected (also a failed verification).
pub const SW_INCORRECT_DATA: u16 = 0x6A80;

/// Known status words and their meaning.
const STATUS_TABLE: &[(u16, &str)] = &[
    (SW_OK, "Ok"),
    (0x5102, "Not enough space"),
    (0x5501, "Action refused on device"),
    (0x5515, "Device is locked"),
    (0x6300, "GP authentication failed"),
    (0x63C0, "PIN remaining attempts"),
    (0x662E, "Custom image empty"),
    (0x662F, "Custom image bootloader"),
    (0x6700, "Incorrect length"),
    (0x6800, "Missing critical parameter"),
    (0x6981, "Command incompatible with file structure"),
    (
        0x6982,
        "Security not satisfied (dongle locked or have invalid access rights)",
    ),
    (
        0x6985,
        "Condition of use not satisfied (denied by the user?)",
    ),
    (SW_INCORRECT_DATA, "Invalid data received"),
    (0x6A84, "Not enough memory space"),
    (0x6A88, "Referenced data not found"),
    (0x6A89, "File already exists"),
    (0x6B00, "Invalid parameter received"),
    (0x6D00, "Instruction not supported"),
    (0x6D02, "Unknown APDU"),
    (0x6E00, "Class not supported"),
    (0x6F00, "Internal error, please report"),
    (0x6F42, "Licensing error"),
    (0x6FAA, "Device halted"),
    (0x9240, "Memory problem"),
    (0x9400, "No EF selected"),
    (0x9402, "Invalid offset"),
    (0x9404, "File not found"),
    (0x9408, "Inconsistent file"),
    (0x9484, "Algorithm not supported"),
    (0x9485, "Invalid KCV"),
    (0x9802, "Code not initialized"),
    (0x9804, "Access condition not fulfilled"),
    (0x9808, "Contradiction with secret code status"),
    (0x9810, "Contradiction invalidation"),
    (0x9840, "Code blocked"),
    (0x9850, "Max value reached"),
];

/// A status word with a known meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    code: u16,
    message: &'static str,
}

impl StatusWord {
    /// Looks up a raw status word.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownStatus`] if the code is not in the table.
    pub fn from_code(code: u16) -> Result<Self> {
        STATUS_TABLE
            .iter()
            .find(|(known, _)| *known == code)
            .map(|&(code, message)| Self { code, message })
            .ok_or(Error::UnknownStatus(code))
    }

    /// Returns the raw status word.
    #[must_use]
    pub const fn code(self) -> u16 {
        self.code
    }

    /// Returns the human-readable meaning.
    #[must_use]
    pub const fn message(self) -> &'static str {
        self.message
    }

    /// Checks if this is the success status.
    #[must_use]
    pub const fn is_ok(self) -> bool {
        self.code == SW_OK
    }

    /// Converts a non-OK status into an error, passing OK through.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceStatus`] for every status other than `0x9000`.
    pub const fn check(self) -> Result<()> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(Error::DeviceStatus {
                code: self.code,
                message: self.message,
            })
        }
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x} ({})", self.code, self.message)
    }
}

/// Maps a raw status word to an `Ok` or a typed error.
///
/// # Errors
///
/// Returns [`Error::DeviceStatus`] for known non-OK codes and
/// [`Error::UnknownStatus`] for codes outside the table.
pub fn check_status(code: u16) -> Result<()> {
    StatusWord::from_code(code)?.check()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn ok_status() {
        let status = StatusWord::from_code(0x9000).unwrap();
        assert!(status.is_ok());
        assert_eq!(status.message(), "Ok");
        assert!(check_status(0x9000).is_ok());
    }

    #[test]
    fn known_error_status() {
        let err = check_status(0x6985).unwrap_err();
        assert!(matches!(err, Error::DeviceStatus { code: 0x6985, .. }));
    }

    #[test]
    fn unknown_status_keeps_code() {
        let err = StatusWord::from_code(0x1234).unwrap_err();
        assert!(matches!(err, Error::UnknownStatus(0x1234)));
    }

    #[test]
    fn table_has_no_duplicates() {
        let codes: HashSet<u16> = STATUS_TABLE.iter().map(|(code, _)| *code).collect();
        assert_eq!(codes.len(), STATUS_TABLE.len());
    }

    #[test]
    fn status_display() {
        let status = StatusWord::from_code(0x6700).unwrap();
        assert_eq!(status.to_string(), "0x6700 (Incorrect length)");
    }
}
