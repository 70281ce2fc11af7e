//! Blocking bridge over the asynchronous `ledger-lib` provider.
//!
//! `ledger-lib` discovers and opens devices through an async
//! [`LedgerProvider`]. The driver API is synchronous, so one process-wide
//! bridge owns a small tokio runtime plus the provider, and every call blocks
//! on it. Sessions must therefore not be driven from inside an async runtime.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use ledger_lib::{Exchange, Filters, LedgerHandle, LedgerInfo, LedgerProvider, Transport as _};
use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use super::Transport;
use crate::error::{Error, Result};

/// Time the provider worker needs before it answers requests.
const PROVIDER_WARMUP: Duration = Duration::from_millis(100);

static BRIDGE: Mutex<Option<Arc<LedgerBridge>>> = Mutex::new(None);

/// Runtime and provider shared by every `ledger-lib` transport.
pub(crate) struct LedgerBridge {
    runtime: Runtime,
    provider: Mutex<LedgerProvider>,
}

impl fmt::Debug for LedgerBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerBridge").finish_non_exhaustive()
    }
}

impl LedgerBridge {
    /// Returns the process-wide bridge, starting it on first use.
    pub(crate) fn shared() -> Result<Arc<Self>> {
        let mut slot = BRIDGE.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bridge) = slot.as_ref() {
            return Ok(Arc::clone(bridge));
        }

        let bridge = Arc::new(Self::start()?);
        *slot = Some(Arc::clone(&bridge));
        Ok(bridge)
    }

    fn start() -> Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .map_err(|e| Error::TransportOpen(format!("failed to start runtime: {e}")))?;

        let provider = runtime.block_on(async {
            let provider = LedgerProvider::init().await;
            tokio::time::sleep(PROVIDER_WARMUP).await;
            provider
        });
        debug!("ledger provider started");

        Ok(Self {
            runtime,
            provider: Mutex::new(provider),
        })
    }

    fn provider(&self) -> MutexGuard<'_, LedgerProvider> {
        self.provider.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lists devices matching `filters`.
    pub(crate) fn list(&self, filters: Filters) -> Result<Vec<LedgerInfo>> {
        let mut provider = self.provider();
        self.runtime
            .block_on(provider.list(filters))
            .map_err(|e| Error::TransportIo(format!("device discovery failed: {e}")))
    }

    /// Opens `info` as a [`LedgerTransport`].
    pub(crate) fn connect(
        self: &Arc<Self>,
        info: LedgerInfo,
        label: String,
        timeout: Duration,
    ) -> Result<LedgerTransport> {
        let mut provider = self.provider();
        let handle = self
            .runtime
            .block_on(provider.connect(info))
            .map_err(|e| Error::TransportOpen(format!("failed to connect to {label}: {e}")))?;
        debug!(device = %label, "ledger handle opened");

        Ok(LedgerTransport {
            bridge: Arc::clone(self),
            handle,
            label,
            timeout,
        })
    }
}

/// An open `ledger-lib` device handle.
pub struct LedgerTransport {
    bridge: Arc<LedgerBridge>,
    handle: LedgerHandle,
    label: String,
    timeout: Duration,
}

impl fmt::Debug for LedgerTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerTransport")
            .field("label", &self.label)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Transport for LedgerTransport {
    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>> {
        self.bridge
            .runtime
            .block_on(self.handle.exchange(command, self.timeout))
            .map_err(|e| exchange_error(&e.to_string()))
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

/// Maps a failed exchange, keeping timeouts distinct.
pub(crate) fn exchange_error(message: &str) -> Error {
    if message.to_ascii_lowercase().contains("timeout") {
        Error::Timeout
    } else {
        Error::TransportIo(format!("exchange failed: {message}"))
    }
}
