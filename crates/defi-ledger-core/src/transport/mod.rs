//! Transport abstraction for reaching a Ledger device.
//!
//! Two traits split the concerns:
//!
//! - [`TransportProvider`]: discovery and opening, one per transport kind
//! - [`Transport`]: an open channel with a single blocking round-trip,
//!   [`exchange`](Transport::exchange)
//!
//! The channel has no message boundaries of its own beyond one command and
//! one response per exchange. APDU framing lives in [`crate::apdu`].
//!
//! # Implementations
//!
//! Both providers open devices through `ledger-lib` and hand out a
//! [`LedgerTransport`]:
//!
//! - [`SpeculosProvider`]: TCP to the Speculos emulator's APDU port
//! - `HidProvider`: USB HID, behind the `hid` feature
//!
//! # Example
//!
//! ```ignore
//! use defi_ledger_core::transport::{SpeculosProvider, TransportProvider};
//!
//! let provider = SpeculosProvider::default();
//! let mut transport = provider.open(None)?;
//! let response = transport.exchange(&[0xE0, 0x01, 0x00, 0x00, 0x00])?;
//! ```

mod bridge;
pub mod speculos;

#[cfg(feature = "hid")]
pub mod hid;

pub use bridge::LedgerTransport;
pub use speculos::SpeculosProvider;

#[cfg(feature = "hid")]
pub use hid::HidProvider;

use crate::error::Result;

/// An open channel to a device.
pub trait Transport: Send {
    /// Sends one command and blocks until its response arrives.
    ///
    /// # Arguments
    ///
    /// * `command` - The serialized APDU
    ///
    /// # Returns
    ///
    /// The raw response, status word included.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportIo`](crate::Error::TransportIo) if communication fails, or
    /// [`Error::Timeout`](crate::Error::Timeout) if the device does not answer in time.
    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>>;

    /// Returns a short description of the device on the other end.
    fn describe(&self) -> String;
}

/// Discovery and opening for one kind of transport.
pub trait TransportProvider: Send + Sync {
    /// Checks whether this transport can work on the current platform.
    fn is_supported(&self) -> bool;

    /// Lists identifiers of reachable devices, in a stable order.
    ///
    /// An empty list means no device was found; it is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only when discovery itself fails.
    fn list(&self) -> Result<Vec<String>>;

    /// Opens a device, the first one found when `identifier` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportOpen`](crate::Error::TransportOpen) if the device cannot be opened.
    fn open(&self, identifier: Option<&str>) -> Result<Box<dyn Transport>>;
}


#[cfg(test)]
mod tests {
    use super::mock::MockTransport;
    use super::*;

    #[test]
    fn mock_transport() {
        let mut transport = MockTransport::new(vec![vec![0x90, 0x00]]);

        let result = transport.exchange(&[0xE0, 0x01, 0x00, 0x00, 0x00]);

        assert_eq!(result.unwrap(), vec![0x90, 0x00]);
        assert_eq!(transport.sent(), vec![vec![0xE0, 0x01, 0x00, 0x00, 0x00]]);
        assert!(transport.exchange(&[]).is_err());
    }
}
