//! Driver configuration.
//!
//! [`LedgerConfig`] selects the transport and its timeout. It deserializes
//! from JSON with every field optional, and environment variables override
//! whatever was loaded:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `DEFI_LEDGER_TRANSPORT` | `transport` (`speculos` or `hid`) |
//! | `DEFI_LEDGER_SPECULOS_ADDR` | `speculos_addr` |
//! | `DEFI_LEDGER_TIMEOUT_MS` | `timeout_ms` |
//!
//! # Example
//!
//! ```
//! use defi_ledger_core::config::{LedgerConfig, TransportKind};
//!
//! let config = LedgerConfig::from_json_str(r#"{ "timeout_ms": 5000 }"#).unwrap();
//! assert_eq!(config.transport, TransportKind::Speculos);
//! assert_eq!(config.timeout_ms, 5000);
//! ```

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::format::AddressFormat;
use crate::session::LedgerSession;
use crate::transport::speculos::DEFAULT_SPECULOS_ADDR;
use crate::transport::{SpeculosProvider, TransportProvider};

/// Environment variable selecting the transport.
pub const ENV_TRANSPORT: &str = "DEFI_LEDGER_TRANSPORT";

/// Environment variable overriding the emulator address.
pub const ENV_SPECULOS_ADDR: &str = "DEFI_LEDGER_SPECULOS_ADDR";

/// Environment variable overriding the exchange timeout.
pub const ENV_TIMEOUT_MS: &str = "DEFI_LEDGER_TIMEOUT_MS";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Which transport to open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// TCP to the Speculos emulator.
    #[default]
    Speculos,

    /// USB HID to a physical device. Needs the `hid` feature.
    Hid,
}

impl TransportKind {
    /// Returns the configuration name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Speculos => "speculos",
            Self::Hid => "hid",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TransportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "speculos" => Ok(Self::Speculos),
            "hid" => Ok(Self::Hid),
            other => Err(Error::InvalidConfig(format!("unknown transport `{other}`"))),
        }
    }
}

/// Transport selection and defaults for the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Transport to open.
    pub transport: TransportKind,

    /// Emulator APDU port, used by the Speculos transport.
    pub speculos_addr: SocketAddr,

    /// Read timeout of a single exchange, in milliseconds.
    pub timeout_ms: u64,

    /// Address format used when a caller does not pick one.
    pub address_format: AddressFormat,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            transport: TransportKind::default(),
            speculos_addr: DEFAULT_SPECULOS_ADDR,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            address_format: AddressFormat::default(),
        }
    }
}

impl LedgerConfig {
    /// Parses a JSON document; missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::JsonError`] if the JSON is malformed, or
    /// [`Error::InvalidConfig`] if the timeout is zero.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Applies the `DEFI_LEDGER_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a variable does not parse.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, keyed by the `DEFI_LEDGER_*` names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if a value does not parse.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(value) = lookup(ENV_TRANSPORT) {
            self.transport = value.parse()?;
            debug!(transport = %self.transport, "transport overridden");
        }

        if let Some(value) = lookup(ENV_SPECULOS_ADDR) {
            self.speculos_addr = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!("{ENV_SPECULOS_ADDR}=`{value}`: {e}"))
            })?;
            debug!(addr = %self.speculos_addr, "speculos address overridden");
        }

        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = value.trim().parse().map_err(|e| {
                Error::InvalidConfig(format!("{ENV_TIMEOUT_MS}=`{value}`: {e}"))
            })?;
            debug!(timeout_ms = self.timeout_ms, "timeout overridden");
        }

        self.validate()?;
        Ok(self)
    }

    /// Returns the exchange timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Builds the provider for the selected transport.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportUnsupported`] if the HID transport is
    /// selected but the crate was built without the `hid` feature.
    pub fn provider(&self) -> Result<Box<dyn TransportProvider>> {
        match self.transport {
            TransportKind::Speculos => Ok(Box::new(
                SpeculosProvider::new(self.speculos_addr).with_timeout(self.timeout()),
            )),
            TransportKind::Hid => self.hid_provider(),
        }
    }

    /// Builds a disconnected session over the selected transport.
    ///
    /// # Errors
    ///
    /// Same as [`provider`](Self::provider).
    pub fn session(&self) -> Result<LedgerSession> {
        Ok(LedgerSession::from_boxed(self.provider()?))
    }

    #[cfg(feature = "hid")]
    #[expect(clippy::unnecessary_wraps, reason = "matches the non-hid signature")]
    fn hid_provider(&self) -> Result<Box<dyn TransportProvider>> {
        Ok(Box::new(crate::transport::HidProvider::with_timeout_ms(
            self.timeout_ms,
        )))
    }

    #[cfg(not(feature = "hid"))]
    #[expect(clippy::unused_self, reason = "matches the hid signature")]
    fn hid_provider(&self) -> Result<Box<dyn TransportProvider>> {
        Err(Error::TransportUnsupported)
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = LedgerConfig::default();
        assert_eq!(config.transport, TransportKind::Speculos);
        assert_eq!(config.speculos_addr.to_string(), "127.0.0.1:9999");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.address_format, AddressFormat::Legacy);
    }

    #[test]
    fn json_fills_missing_fields() {
        let config = LedgerConfig::from_json_str(
            r#"{ "transport": "hid", "address_format": "bech32" }"#,
        )
        .unwrap();

        assert_eq!(config.transport, TransportKind::Hid);
        assert_eq!(config.address_format, AddressFormat::NativeSegwit);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.speculos_addr, DEFAULT_SPECULOS_ADDR);
    }

    #[test]
    fn json_errors() {
        assert!(matches!(
            LedgerConfig::from_json_str(r#"{ "transport": "bluetooth" }"#),
            Err(Error::JsonError(_))
        ));
        assert!(matches!(
            LedgerConfig::from_json_str(r#"{ "timeout_ms": 0 }"#),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn json_roundtrip() {
        let config = LedgerConfig {
            transport: TransportKind::Hid,
            speculos_addr: "10.0.0.2:40000".parse().unwrap(),
            timeout_ms: 1_500,
            address_format: AddressFormat::P2shSegwit,
        };
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(LedgerConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn overrides_apply() {
        let config = LedgerConfig::default()
            .with_overrides(lookup(&[
                (ENV_TRANSPORT, "HID"),
                (ENV_SPECULOS_ADDR, "192.168.1.5:9998"),
                (ENV_TIMEOUT_MS, " 250 "),
            ]))
            .unwrap();

        assert_eq!(config.transport, TransportKind::Hid);
        assert_eq!(config.speculos_addr.to_string(), "192.168.1.5:9998");
        assert_eq!(config.timeout_ms, 250);
    }

    #[test]
    fn overrides_absent_keep_values() {
        let config = LedgerConfig::default().with_overrides(lookup(&[])).unwrap();
        assert_eq!(config, LedgerConfig::default());
    }

    #[test]
    fn overrides_reject_garbage() {
        for vars in [
            [(ENV_TRANSPORT, "usb")],
            [(ENV_SPECULOS_ADDR, "localhost")],
            [(ENV_TIMEOUT_MS, "soon")],
            [(ENV_TIMEOUT_MS, "0")],
        ] {
            assert!(matches!(
                LedgerConfig::default().with_overrides(lookup(&vars)),
                Err(Error::InvalidConfig(_))
            ));
        }
    }

    #[test]
    fn speculos_provider_from_config() {
        let provider = LedgerConfig::default().provider().unwrap();
        assert!(provider.is_supported());
    }

    #[cfg(not(feature = "hid"))]
    #[test]
    fn hid_needs_feature() {
        let config = LedgerConfig {
            transport: TransportKind::Hid,
            ..LedgerConfig::default()
        };
        assert!(matches!(
            config.provider(),
            Err(Error::TransportUnsupported)
        ));
    }
}
