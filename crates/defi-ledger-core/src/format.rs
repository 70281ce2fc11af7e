//! Parameter bytes for the DeFiChain app instructions.
//!
//! # Public Key Parameters
//!
//! | Format        | P2   |
//! |---------------|------|
//! | legacy        | 0x00 |
//! | p2sh (segwit) | 0x01 |
//! | bech32        | 0x02 |
//! | cashaddr      | 0x03 |
//!
//! # Sign/Verify Parameters
//!
//! P1 tells the app whether the payload still needs hashing. P2 is a bitmask:
//! bit 0 set means more APDUs follow (clear means last), bit 1 set means this
//! is the first APDU and starts with the 4-byte key index.
//!
//! # Example
//!
//! ```
//! use defi_ledger_core::format::{AddressFormat, ChunkFlags};
//!
//! assert_eq!(AddressFormat::NativeSegwit.p2(), 0x02);
//! assert_eq!((ChunkFlags::FIRST | ChunkFlags::MORE).bits(), 0x03);
//! ```

use core::fmt;
use core::ops::BitOr;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Address encoding requested from the device.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum AddressFormat {
    /// Base58 pay-to-pubkey-hash.
    #[default]
    Legacy = 0x00,

    /// Segwit wrapped in pay-to-script-hash.
    #[serde(rename = "p2sh")]
    P2shSegwit = 0x01,

    /// Native segwit (bech32).
    #[serde(rename = "bech32")]
    NativeSegwit = 0x02,

    /// Cash address encoding.
    CashAddr = 0x03,
}

impl AddressFormat {
    /// Every supported format, in parameter order.
    pub const ALL: [Self; 4] = [
        Self::Legacy,
        Self::P2shSegwit,
        Self::NativeSegwit,
        Self::CashAddr,
    ];

    /// Returns the P2 byte for `GET_PUBKEY`.
    #[must_use]
    pub const fn p2(self) -> u8 {
        self as u8
    }

    /// Returns the name used in configuration and on the command line.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::P2shSegwit => "p2sh",
            Self::NativeSegwit => "bech32",
            Self::CashAddr => "cashaddr",
        }
    }
}

impl fmt::Display for AddressFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AddressFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::InvalidConfig(format!("unknown address format `{s}`")))
    }
}

/// What the device shows on screen while answering `GET_PUBKEY`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum AddressDisplay {
    /// Answer silently.
    NoDisplay = 0x00,

    /// Show the address for confirmation.
    #[default]
    Address = 0x01,

    /// Show the public key for confirmation.
    PublicKey = 0x02,

    /// Show both.
    Both = 0x03,
}

impl AddressDisplay {
    /// Returns the P1 byte for `GET_PUBKEY`.
    #[must_use]
    pub const fn p1(self) -> u8 {
        self as u8
    }
}

/// P1 for `SIGN_MSG` / `VERIFY_MSG`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HashMode {
    /// The device hashes the payload itself.
    NeedsHash = 0x00,

    /// The payload already carries the digest.
    AlreadyHashed = 0x01,
}

impl HashMode {
    /// Returns the P1 byte.
    #[must_use]
    pub const fn p1(self) -> u8 {
        self as u8
    }
}

/// P2 bitmask for `SIGN_MSG` / `VERIFY_MSG`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkFlags(u8);

impl ChunkFlags {
    /// No bits set: the last APDU of a sequence.
    pub const LAST: Self = Self(0x00);

    /// More APDUs follow.
    pub const MORE: Self = Self(0x01);

    /// First APDU; payload starts with the key index.
    pub const FIRST: Self = Self(0x02);

    /// Returns the P2 byte.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Checks whether every bit of `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Reinterprets a raw P2 byte.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }
}

impl BitOr for ChunkFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
