//! Session management and device operations.
//!
//! A [`LedgerSession`] owns at most one open [`Transport`] and runs every
//! DeFiChain app operation over it: version, public key, chunked signing,
//! verification and exit.
//!
//! # Concurrency
//!
//! The wire carries one exchange at a time. The session guards its
//! transport with a mutex taken by `try_lock`: a call issued while another
//! is in flight fails at once with [`Error::SessionBusy`] instead of
//! queueing. A signing sequence holds the guard for all of its chunks.
//!
//! # Example
//!
//! ```ignore
//! use defi_ledger_core::format::AddressFormat;
//! use defi_ledger_core::session::LedgerSession;
//! use defi_ledger_core::transport::SpeculosProvider;
//!
//! let session = LedgerSession::new(SpeculosProvider::default());
//! session.connect(None)?;
//!
//! let info = session.get_public_key(0, AddressFormat::Legacy)?;
//! let signature = session.sign_message(0, b"hello")?;
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, TryLockError};

use tracing::{debug, info, instrument, warn};

use crate::apdu::{Apdu, ApduResponse};
use crate::command::{self, SIGN_CHUNKS};
use crate::error::{Error, Result};
use crate::format::{AddressDisplay, AddressFormat};
use crate::response::{PublicKeyInfo, decode_public_key, decode_version};
use crate::signature::Signature;
use crate::status::{SW_INCORRECT_DATA, StatusWord};
use crate::transport::{Transport, TransportProvider};

/// Progress of a signing sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignState {
    /// Nothing sent yet.
    Idle,

    /// The chunk with this index was acknowledged and more follow.
    ChunkSent(usize),

    /// The last chunk was acknowledged.
    Complete,

    /// The chunk with this index got a non-OK status.
    Aborted(usize),
}

impl SignState {
    /// Applies the outcome of chunk `chunk`.
    #[must_use]
    pub const fn on_response(self, chunk: usize, ok: bool) -> Self {
        if !ok {
            Self::Aborted(chunk)
        } else if chunk + 1 == SIGN_CHUNKS {
            Self::Complete
        } else {
            Self::ChunkSent(chunk)
        }
    }

    /// Checks whether no further chunk may be sent.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Aborted(_))
    }
}

/// Result of a signing sequence that reached the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutcome {
    /// Every chunk was accepted; holds the device-native signature.
    Complete(Vec<u8>),

    /// The device refused a chunk and nothing more was sent.
    Aborted {
        /// Index of the refused chunk.
        chunk: usize,
        /// Status word the device answered with.
        code: u16,
    },
}

impl SignOutcome {
    /// Returns the device-native signature of a completed sequence.
    #[must_use]
    pub fn signature(&self) -> Option<&[u8]> {
        match self {
            Self::Complete(raw) => Some(raw),
            Self::Aborted { .. } => None,
        }
    }
}

/// A session with the DeFiChain Ledger app.
pub struct LedgerSession {
    /// Discovery and opening.
    provider: Box<dyn TransportProvider>,

    /// The open transport, if any.
    transport: Mutex<Option<Box<dyn Transport>>>,

    /// Mirrors `transport.is_some()` without taking the lock.
    connected: AtomicBool,
}

impl fmt::Debug for LedgerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerSession")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl LedgerSession {
    /// Creates a disconnected session using `provider`.
    #[must_use]
    pub fn new(provider: impl TransportProvider + 'static) -> Self {
        Self::from_boxed(Box::new(provider))
    }

    /// Creates a disconnected session from a boxed provider.
    #[must_use]
    pub fn from_boxed(provider: Box<dyn TransportProvider>) -> Self {
        Self {
            provider,
            transport: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Lists reachable devices.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransportUnsupported`] if the provider cannot work on
    /// this platform. An empty list is not an error.
    pub fn list_devices(&self) -> Result<Vec<String>> {
        if !self.provider.is_supported() {
            return Err(Error::TransportUnsupported);
        }

        let devices = self.provider.list()?;
        debug!(count = devices.len(), "listed devices");
        Ok(devices)
    }

    /// Opens a device and keeps its transport.
    ///
    /// On failure the session is left disconnected.
    ///
    /// # Errors
    ///
    /// - [`Error::TransportUnsupported`] if the provider cannot work here
    /// - [`Error::TransportOpen`] if the device cannot be opened
    /// - [`Error::SessionBusy`] if an exchange is in flight
    #[instrument(skip(self))]
    pub fn connect(&self, identifier: Option<&str>) -> Result<()> {
        let mut slot = self.lock()?;
        *slot = None;
        self.connected.store(false, Ordering::SeqCst);

        if !self.provider.is_supported() {
            warn!("transport not supported");
            return Err(Error::TransportUnsupported);
        }

        match self.provider.open(identifier) {
            Ok(transport) => {
                info!(device = %transport.describe(), "connected");
                *slot = Some(transport);
                self.connected.store(true, Ordering::SeqCst);
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "connection failed");
                Err(e)
            }
        }
    }

    /// Releases the transport. Calling it again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SessionBusy`] if an exchange is in flight.
    pub fn disconnect(&self) -> Result<()> {
        let mut slot = self.lock()?;
        if let Some(transport) = slot.take() {
            info!(device = %transport.describe(), "disconnected");
        }
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Checks whether a transport is open.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Reads the app version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`], a transport error, or the device status.
    #[instrument(skip(self))]
    pub fn get_version(&self) -> Result<Vec<u8>> {
        self.with_transport(|transport| {
            let response = exchange(transport, &command::get_version())?;
            response.check()?;
            Ok(decode_version(response.data()))
        })
    }

    /// Fetches the public key and address for `index`, showing the address on
    /// the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`], a transport error, the device status,
    /// or [`Error::MalformedResponse`].
    pub fn get_public_key(&self, index: u32, format: AddressFormat) -> Result<PublicKeyInfo> {
        self.get_public_key_with_display(index, format, AddressDisplay::Address)
    }

    /// Fetches the public key and address for `index` with a chosen display mode.
    ///
    /// # Errors
    ///
    /// Same as [`get_public_key`](Self::get_public_key).
    #[instrument(skip(self))]
    pub fn get_public_key_with_display(
        &self,
        index: u32,
        format: AddressFormat,
        mode: AddressDisplay,
    ) -> Result<PublicKeyInfo> {
        self.with_transport(|transport| {
            let response = exchange(transport, &command::get_public_key(index, format, mode))?;
            response.check()?;
            let info = decode_public_key(response.data())?;
            debug!(address = %info.address, "public key received");
            Ok(info)
        })
    }

    /// Runs the four-chunk `SIGN_MSG` sequence.
    ///
    /// The sequence stops at the first non-OK status and reports it as
    /// [`SignOutcome::Aborted`]; no chunk is retried and a new call starts
    /// over from the first chunk.
    ///
    /// # Errors
    ///
    /// - [`Error::PayloadTooLong`] if the message cannot be split into four APDUs
    /// - [`Error::NotConnected`], [`Error::SessionBusy`]
    /// - transport errors, which also end the sequence
    #[instrument(skip(self, message), fields(len = message.len()))]
    pub fn sign(&self, index: u32, message: &[u8]) -> Result<SignOutcome> {
        let commands = command::sign_commands(index, message)?;

        self.with_transport(|transport| {
            let mut state = SignState::Idle;
            let mut signature = Vec::new();

            for (chunk, apdu) in commands.iter().enumerate() {
                let response = exchange(transport, apdu)?;
                state = state.on_response(chunk, response.is_success());
                debug!(chunk, ?state, "sign chunk answered");

                match state {
                    SignState::Aborted(chunk) => {
                        let code = response.status_word();
                        warn!(chunk, status = format_args!("{code:#06x}"), "signing aborted");
                        return Ok(SignOutcome::Aborted { chunk, code });
                    }
                    SignState::Complete => signature = response.into_data(),
                    SignState::Idle | SignState::ChunkSent(_) => {}
                }
            }

            Ok(SignOutcome::Complete(signature))
        })
    }

    /// Signs `message` and returns the canonical signature.
    ///
    /// # Errors
    ///
    /// Everything [`sign`](Self::sign) returns, plus the refusing status as
    /// [`Error::DeviceStatus`] / [`Error::UnknownStatus`], and
    /// [`Error::MalformedSignature`] if the device signature cannot be decoded.
    pub fn sign_message(&self, index: u32, message: &[u8]) -> Result<Signature> {
        match self.sign(index, message)? {
            SignOutcome::Complete(raw) => Signature::from_device(&raw),
            SignOutcome::Aborted { code, .. } => Err(refusal(code)),
        }
    }

    /// Asks the device to verify a device-native `signature` over `message`.
    ///
    /// Returns the raw response; the caller interprets its status.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PayloadTooLong`], [`Error::NotConnected`] or a
    /// transport error.
    #[instrument(skip(self, message, signature), fields(len = message.len()))]
    pub fn verify(&self, index: u32, message: &[u8], signature: &[u8]) -> Result<ApduResponse> {
        let apdu = command::verify(index, message, signature)?;
        self.with_transport(|transport| exchange(transport, &apdu))
    }

    /// Verifies a device-native signature, mapping the status to a boolean.
    ///
    /// `0x9000` is `true` and `0x6A80` (incorrect data) is `false`.
    ///
    /// # Errors
    ///
    /// Everything [`verify`](Self::verify) returns, plus any other status.
    pub fn verify_message(&self, index: u32, message: &[u8], signature: &[u8]) -> Result<bool> {
        let response = self.verify(index, message, signature)?;
        match response.status_word() {
            ApduResponse::SW_SUCCESS => Ok(true),
            SW_INCORRECT_DATA => Ok(false),
            _ => response.check().map(|()| false),
        }
    }

    /// Quits the app on the device.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`], a transport error, or the device status.
    #[instrument(skip(self))]
    pub fn exit_app(&self) -> Result<()> {
        self.with_transport(|transport| exchange(transport, &command::exit_app())?.check())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<Box<dyn Transport>>>> {
        match self.transport.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::Poisoned(poisoned)) => Ok(poisoned.into_inner()),
            Err(TryLockError::WouldBlock) => Err(Error::SessionBusy),
        }
    }

    fn with_transport<T>(&self, f: impl FnOnce(&mut dyn Transport) -> Result<T>) -> Result<T> {
        let mut slot = self.lock()?;
        let transport = slot.as_deref_mut().ok_or(Error::NotConnected)?;
        f(transport)
    }
}

/// Error for a status the device refused a chunk with.
fn refusal(code: u16) -> Error {
    match StatusWord::from_code(code).and_then(StatusWord::check) {
        Err(e) => e,
        Ok(()) => Error::MalformedResponse(format!("refusal reported with status {code:#06x}")),
    }
}

/// Sends one APDU and splits off the status word.
fn exchange(transport: &mut dyn Transport, apdu: &Apdu) -> Result<ApduResponse> {
    let command = apdu.to_bytes();
    debug!(ins = %apdu.ins(), apdu = %hex::encode(&command), "=> command");

    let response = ApduResponse::new(transport.exchange(&command)?)?;
    debug!(
        status = format_args!("{:#06x}", response.status_word()),
        len = response.data().len(),
        "<= response"
    );
    Ok(response)
}
