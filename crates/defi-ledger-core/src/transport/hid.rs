//! USB HID transport for physical Ledger devices.
//!
//! Discovery and report framing come from `ledger-lib`'s USB transport;
//! this module only picks a device and wraps its handle.
//!
//! This module requires the `hid` feature.

use std::time::Duration;

use ledger_lib::{Filters, LedgerInfo};
use tracing::debug;

use super::bridge::LedgerBridge;
use super::{Transport, TransportProvider};
use crate::error::{Error, Result};

/// Default exchange timeout.
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Enumerates and opens Ledger devices over USB HID.
#[derive(Debug, Clone)]
pub struct HidProvider {
    timeout: Duration,
}

impl Default for HidProvider {
    fn default() -> Self {
        Self::with_timeout_ms(DEFAULT_TIMEOUT_MS)
    }
}

impl HidProvider {
    /// Creates a provider with the given exchange timeout in milliseconds.
    #[must_use]
    pub const fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
        }
    }

    fn devices() -> Result<Vec<LedgerInfo>> {
        LedgerBridge::shared()?.list(Filters::Hid)
    }
}

/// Stable identifier for a discovered device.
fn identifier(info: &LedgerInfo) -> String {
    format!("{:?}", info.conn)
}

/// Picks the device named by `identifier`, or the first one.
fn select(devices: Vec<LedgerInfo>, identifier: Option<&str>) -> Result<LedgerInfo> {
    let mut devices = devices.into_iter();
    match identifier {
        Some(id) => devices
            .find(|info| self::identifier(info) == id)
            .ok_or_else(|| Error::TransportOpen(format!("no Ledger device `{id}`"))),
        None => devices
            .next()
            .ok_or_else(|| Error::TransportOpen("no Ledger device found".to_string())),
    }
}

impl TransportProvider for HidProvider {
    fn is_supported(&self) -> bool {
        LedgerBridge::shared().is_ok()
    }

    fn list(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = Self::devices()?.iter().map(identifier).collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn open(&self, identifier: Option<&str>) -> Result<Box<dyn Transport>> {
        let info = select(Self::devices()?, identifier)?;
        let label = format!("hid:{}", self::identifier(&info));
        debug!(device = %label, model = ?info.model, "opening Ledger HID device");

        let transport = LedgerBridge::shared()?.connect(info, label, self.timeout)?;
        Ok(Box::new(transport))
    }
}
