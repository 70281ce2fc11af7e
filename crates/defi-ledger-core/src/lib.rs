//! DeFiChain Ledger Driver Core Library
//!
//! This crate talks to the DeFiChain app on a Ledger hardware wallet using
//! the APDU protocol. It fetches keys by index, signs messages and verifies
//! signatures without private keys ever leaving the device.
//!
//! # Overview
//!
//! This library provides:
//!
//! - **Command Encoding**: byte-exact APDUs for version, public key, signing,
//!   verification and exit, including the four-chunk signing split
//! - **Response Decoding**: status-word mapping and length-prefixed payloads
//! - **Signature Canonicalization**: device-native DER-like signatures to the
//!   65-byte `R || S || recovery` form
//! - **Session Management**: discovery, connection and serialized exchanges
//!   over a pluggable transport
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Application Layer                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │   Session   │   Config   │  Signature   │  Public Key Info  │
//! │ (lock, ops) │ (env/json) │ (canonical)  │     (decoded)     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                      APDU Layer                             │
//! │  ┌─────────┐  ┌─────────┐  ┌──────────┐  ┌───────────────┐  │
//! │  │ Command │  │  APDU   │  │ Response │  │  Status Word  │  │
//! │  │ Encode  │  │ Framing │  │  Decode  │  │    Mapping    │  │
//! │  └─────────┘  └─────────┘  └──────────┘  └───────────────┘  │
//! ├─────────────────────────────────────────────────────────────┤
//! │           Transport Layer (Speculos TCP / USB HID)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ## Building Commands
//!
//! ```rust
//! use defi_ledger_core::command;
//! use defi_ledger_core::format::{AddressDisplay, AddressFormat};
//!
//! let apdu = command::get_public_key(0, AddressFormat::NativeSegwit, AddressDisplay::Address);
//! assert_eq!(
//!     apdu.to_bytes(),
//!     vec![0xE0, 0x02, 0x01, 0x02, 0x04, 0x00, 0x00, 0x00, 0x00]
//! );
//!
//! let chunks = command::sign_commands(0, b"hello").unwrap();
//! assert_eq!(chunks.len(), 4);
//! ```
//!
//! ## Canonicalizing a Device Signature
//!
//! ```rust
//! use defi_ledger_core::Signature;
//!
//! let mut raw = vec![0x31, 0x44, 0x02, 0x20];
//! raw.extend_from_slice(&[0x11; 32]);
//! raw.extend_from_slice(&[0x02, 0x20]);
//! raw.extend_from_slice(&[0x22; 32]);
//!
//! let signature = Signature::from_device(&raw).unwrap();
//! assert_eq!(signature.recovery(), 1);
//! assert_eq!(signature.to_bytes().len(), 65);
//! ```
//!
//! # Device Sessions
//!
//! A [`LedgerSession`] wraps a [`transport::TransportProvider`]. Implement the
//! [`transport::Transport`] trait to reach a device some other way:
//!
//! - **Emulator**: [`transport::SpeculosProvider`] over TCP (default)
//! - **Hardware**: `transport::HidProvider` over USB HID (feature `hid`)
//!
//! ```ignore
//! use defi_ledger_core::{LedgerConfig, AddressFormat};
//!
//! let config = LedgerConfig::default().with_env_overrides()?;
//! let session = config.session()?;
//! session.connect(None)?;
//!
//! let info = session.get_public_key(0, AddressFormat::Legacy)?;
//! let signature = session.sign_message(0, b"hello")?;
//! assert!(session.verify_message(0, b"hello", &device_signature)?);
//! ```
//!
//! # Feature Flags
//!
//! - `hid`: enables the USB HID transport through `ledger-lib`
//!
//! # Security Considerations
//!
//! - Private keys never leave the device
//! - Every signature and address is confirmed on the device screen
//! - Only one exchange is on the wire at a time; concurrent callers get
//!   [`Error::SessionBusy`]

// Modules
pub mod apdu;
pub mod command;
pub mod config;
pub mod crypto;
pub mod error;
pub mod format;
pub mod response;
pub mod session;
pub mod signature;
pub mod status;
pub mod transport;

// Re-exports for convenience
pub use apdu::{Apdu, ApduResponse, Instruction};
pub use config::{LedgerConfig, TransportKind};
pub use error::{Error, Result};
pub use format::{AddressDisplay, AddressFormat};
pub use response::PublicKeyInfo;
pub use session::{LedgerSession, SignOutcome};
pub use signature::Signature;
pub use status::StatusWord;
