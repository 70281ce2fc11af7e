//! Transport to the Speculos Ledger emulator.
//!
//! Speculos exposes the app's APDU channel on a TCP port (9999 by default).
//! The connection goes through `ledger-lib`'s TCP transport, which handles
//! the emulator's length-prefixed framing.
//!
//! # Example
//!
//! ```ignore
//! use defi_ledger_core::transport::{SpeculosProvider, TransportProvider};
//!
//! let provider = SpeculosProvider::new("127.0.0.1:9999".parse()?);
//! let transport = provider.open(None)?;
//! ```

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use ledger_lib::LedgerInfo;
use ledger_lib::info::Model;
use ledger_lib::transport::TcpInfo;
use tracing::debug;

use super::bridge::LedgerBridge;
use super::{Transport, TransportProvider};
use crate::error::{Error, Result};

/// Default Speculos APDU port address.
pub const DEFAULT_SPECULOS_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 9999));

/// Exchange timeout when none is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Opens emulator transports at a configured address.
#[derive(Debug, Clone)]
pub struct SpeculosProvider {
    addr: SocketAddr,
    timeout: Duration,
}

impl Default for SpeculosProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SPECULOS_ADDR)
    }
}

impl SpeculosProvider {
    /// Creates a provider for the emulator at `addr`.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Sets the timeout applied to each exchange.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the configured address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn resolve(&self, identifier: Option<&str>) -> Result<SocketAddr> {
        match identifier {
            Some(id) => id
                .parse()
                .map_err(|e| Error::TransportOpen(format!("invalid address `{id}`: {e}"))),
            None => Ok(self.addr),
        }
    }
}

/// Describes the emulator at `addr` for `ledger-lib`.
pub(crate) fn emulator_info(addr: SocketAddr) -> LedgerInfo {
    LedgerInfo {
        model: Model::NanoSPlus,
        conn: TcpInfo { addr }.into(),
    }
}

impl TransportProvider for SpeculosProvider {
    fn is_supported(&self) -> bool {
        true
    }

    fn list(&self) -> Result<Vec<String>> {
        // The emulator is reachable or it is not; a refused connection is
        // simply an empty list.
        match self.open(None) {
            Ok(_) => Ok(vec![self.addr.to_string()]),
            Err(e) => {
                debug!(addr = %self.addr, error = %e, "speculos not reachable");
                Ok(Vec::new())
            }
        }
    }

    fn open(&self, identifier: Option<&str>) -> Result<Box<dyn Transport>> {
        let addr = self.resolve(identifier)?;
        let bridge = LedgerBridge::shared()?;
        let label = format!("speculos@{addr}");
        let transport = bridge.connect(emulator_info(addr), label, self.timeout)?;
        Ok(Box::new(transport))
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    use super::*;

    #[test]
    fn defaults_to_local_emulator() {
        let provider = SpeculosProvider::default();
        assert_eq!(provider.addr().to_string(), "127.0.0.1:9999");
        assert!(provider.is_supported());
    }

    #[test]
    fn emulator_info_carries_address() {
        let addr: SocketAddr = "10.1.2.3:4000".parse().unwrap();
        let info = emulator_info(addr);
        assert!(matches!(info.model, Model::NanoSPlus));
        assert!(format!("{:?}", info.conn).contains("10.1.2.3:4000"));
    }

    #[test]
    fn open_rejects_bad_identifier() {
        let provider = SpeculosProvider::default();
        assert!(matches!(
            provider.open(Some("not an address")),
            Err(Error::TransportOpen(_))
        ));
    }

    #[test]
    fn list_is_empty_when_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let provider = SpeculosProvider::new(addr).with_timeout(Duration::from_millis(200));
        assert!(provider.list().unwrap().is_empty());
    }

    #[test]
    fn exchange_with_emulator_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        // Answers one APDU the way Speculos frames it.
        let emulator = thread::spawn(move || {
            let (mut socket, _) = listener.accept().unwrap();
            let mut len = [0u8; 4];
            socket.read_exact(&mut len).unwrap();
            let mut command = vec![0u8; u32::from_be_bytes(len) as usize];
            socket.read_exact(&mut command).unwrap();

            socket.write_all(&[0, 0, 0, 3, b'1', b'.', b'0', 0x90, 0x00]).unwrap();
            command
        });

        let provider = SpeculosProvider::new(addr).with_timeout(Duration::from_secs(5));
        let mut transport = provider.open(None).unwrap();
        let response = transport.exchange(&[0xE0, 0x01, 0x00, 0x00, 0x00]).unwrap();

        assert_eq!(response, vec![b'1', b'.', b'0', 0x90, 0x00]);
        assert_eq!(emulator.join().unwrap(), vec![0xE0, 0x01, 0x00, 0x00, 0x00]);
        assert_eq!(transport.describe(), format!("speculos@{addr}"));
    }
}
