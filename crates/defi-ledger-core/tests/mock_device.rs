//! End-to-end sessions against a simulated DeFiChain Ledger app.
//!
//! The simulated app keeps the same state a real one does: it reassembles
//! chunked `SIGN_MSG` payloads, signs the double SHA-256 digest with a
//! secp256k1 key derived from the key index, and checks signatures sent with
//! `VERIFY_MSG`.

// Silence unused crate dependency warnings for test binary
use hex as _;
use ledger_lib as _;
use serde as _;
use serde_json as _;
use sha2 as _;
use thiserror as _;
use tokio as _;
use tracing as _;
use tracing_subscriber as _;

use std::sync::{Arc, Mutex};

use defi_ledger_core::command::MAX_SIGN_MESSAGE_LEN;
use defi_ledger_core::crypto::double_sha256;
use defi_ledger_core::transport::{Transport, TransportProvider};
use defi_ledger_core::{AddressDisplay, AddressFormat, Error, LedgerSession, SignOutcome};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};

const P2_MORE: u8 = 0x01;
const P2_FIRST: u8 = 0x02;

fn signing_key(index: u32) -> SigningKey {
    let mut secret = [0x42u8; 32];
    secret[28..].copy_from_slice(&index.to_be_bytes());
    SigningKey::from_slice(&secret).unwrap()
}

fn key_index(bytes: &[u8]) -> u32 {
    u32::from_le_bytes(bytes[..4].try_into().unwrap())
}

fn with_status(mut data: Vec<u8>, status: u16) -> Vec<u8> {
    data.extend_from_slice(&status.to_be_bytes());
    data
}

#[derive(Debug, Default)]
struct AppState {
    /// Key index and message bytes of the signing sequence in progress.
    pending: Option<(u32, Vec<u8>)>,
    /// Chunk counter of the sequence in progress.
    chunk: usize,
    /// Refuse this chunk with 0x6985 (user rejected).
    refuse_chunk: Option<usize>,
    /// Last fully reassembled message.
    last_message: Option<Vec<u8>>,
    /// Every command received.
    log: Vec<Vec<u8>>,
}

#[derive(Debug, Clone, Default)]
struct MockLedger {
    state: Arc<Mutex<AppState>>,
}

impl MockLedger {
    fn handle(state: &mut AppState, command: &[u8]) -> Vec<u8> {
        let (ins, p1, p2) = (command[1], command[2], command[3]);
        let data = &command[5..];
        assert_eq!(command[0], 0xE0);
        assert_eq!(command[4] as usize, data.len());

        match ins {
            0x01 => with_status(vec![1, 0, 3], 0x9000),
            0x02 => {
                assert_eq!(data.len(), 4);
                let index = key_index(data);
                let point = signing_key(index).verifying_key().to_encoded_point(false);
                let address = format!("df{p1}{p2}-{index}");

                let mut response = vec![point.len() as u8];
                response.extend_from_slice(point.as_bytes());
                response.push(address.len() as u8);
                response.extend_from_slice(address.as_bytes());
                with_status(response, 0x9000)
            }
            0x04 => Self::sign_chunk(state, p2, data),
            0x08 => {
                assert_eq!(p1, 0x01);
                assert_eq!(p2, 0x02);
                let index = key_index(data);
                let (signature, digest) = data[4..].split_at(data.len() - 4 - 32);

                let mut der = signature.to_vec();
                der[0] = 0x30;
                let valid = EcdsaSignature::from_der(&der).is_ok_and(|sig| {
                    signing_key(index)
                        .verifying_key()
                        .verify_prehash(digest, &sig)
                        .is_ok()
                });
                with_status(Vec::new(), if valid { 0x9000 } else { 0x6A80 })
            }
            0xFF => with_status(Vec::new(), 0x9000),
            _ => with_status(Vec::new(), 0x6D00),
        }
    }

    fn sign_chunk(state: &mut AppState, p2: u8, data: &[u8]) -> Vec<u8> {
        if p2 & P2_FIRST != 0 {
            state.pending = Some((key_index(data), data[4..].to_vec()));
            state.chunk = 0;
        } else if let Some((_, message)) = state.pending.as_mut() {
            message.extend_from_slice(data);
            state.chunk += 1;
        } else {
            return with_status(Vec::new(), 0x6A80);
        }

        if state.refuse_chunk == Some(state.chunk) {
            state.pending = None;
            return with_status(Vec::new(), 0x6985);
        }

        if p2 & P2_MORE != 0 {
            return with_status(Vec::new(), 0x9000);
        }

        let Some((index, message)) = state.pending.take() else {
            return with_status(Vec::new(), 0x6A80);
        };
        let digest = double_sha256(&message);
        state.last_message = Some(message);

        let (signature, recovery_id) = signing_key(index)
            .sign_prehash_recoverable(&digest)
            .unwrap();
        let mut der = signature.to_der().as_bytes().to_vec();
        der[0] = 0x30 | u8::from(recovery_id.is_y_odd());
        with_status(der, 0x9000)
    }
}

impl Transport for MockLedger {
    fn exchange(&mut self, command: &[u8]) -> defi_ledger_core::Result<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        state.log.push(command.to_vec());
        Ok(Self::handle(&mut state, command))
    }

    fn describe(&self) -> String {
        "mock-ledger".to_string()
    }
}

#[derive(Debug, Default)]
struct MockLedgerProvider {
    device: MockLedger,
}

impl TransportProvider for MockLedgerProvider {
    fn is_supported(&self) -> bool {
        true
    }

    fn list(&self) -> defi_ledger_core::Result<Vec<String>> {
        Ok(vec!["mock-ledger".to_string()])
    }

    fn open(&self, _identifier: Option<&str>) -> defi_ledger_core::Result<Box<dyn Transport>> {
        Ok(Box::new(self.device.clone()))
    }
}

fn connected() -> (LedgerSession, Arc<Mutex<AppState>>) {
    let provider = MockLedgerProvider::default();
    let state = Arc::clone(&provider.device.state);
    let session = LedgerSession::new(provider);
    session.connect(None).unwrap();
    (session, state)
}

#[test]
fn discovery_and_version() {
    let (session, _) = connected();

    assert_eq!(session.list_devices().unwrap(), vec!["mock-ledger"]);
    assert_eq!(session.get_version().unwrap(), vec![1, 0, 3]);
}

#[test]
fn public_key_matches_device_key() {
    let (session, state) = connected();

    let info = session
        .get_public_key_with_display(5, AddressFormat::NativeSegwit, AddressDisplay::Both)
        .unwrap();

    assert_eq!(info.public_key.len(), 65);
    assert_eq!(info.address, "df32-5");
    let expected = signing_key(5).verifying_key().to_encoded_point(false);
    assert_eq!(info.public_key, expected.as_bytes());
    assert_eq!(
        info.parsed_public_key().unwrap(),
        k256::PublicKey::from(signing_key(5).verifying_key())
    );
    assert_eq!(state.lock().unwrap().log.len(), 1);
}

#[test]
fn signature_recovers_device_key() {
    let (session, state) = connected();
    let message = b"DeFiChain signed message";

    let signature = session.sign_message(7, message).unwrap();

    assert_eq!(state.lock().unwrap().log.len(), 4);
    assert_eq!(
        state.lock().unwrap().last_message.as_deref(),
        Some(&message[..])
    );

    let bytes = signature.to_bytes();
    let ecdsa = EcdsaSignature::from_slice(&bytes[..64]).unwrap();
    let recovery_id = RecoveryId::from_byte(bytes[64]).unwrap();
    let recovered =
        VerifyingKey::recover_from_prehash(&double_sha256(message), &ecdsa, recovery_id).unwrap();

    assert_eq!(&recovered, signing_key(7).verifying_key());
}

#[test]
fn many_signatures_canonicalize() {
    // Exercises short and 33-byte DER components across different digests.
    let (session, _) = connected();

    for i in 0..32u8 {
        let message = vec![i; usize::from(i) * 7];
        let signature = session.sign_message(1, &message).unwrap();
        assert!(signature.recovery() <= 1);

        let ecdsa = EcdsaSignature::from_slice(&signature.to_bytes()[..64]).unwrap();
        signing_key(1)
            .verifying_key()
            .verify_prehash(&double_sha256(&message), &ecdsa)
            .unwrap();
    }
}

#[test]
fn device_verifies_own_signature() {
    let (session, _) = connected();
    let message = b"verify me";

    let SignOutcome::Complete(raw) = session.sign(2, message).unwrap() else {
        panic!("signing was aborted");
    };

    assert!(session.verify_message(2, message, &raw).unwrap());
    assert!(!session.verify_message(2, b"something else", &raw).unwrap());
    assert!(!session.verify_message(3, message, &raw).unwrap());

    let response = session.verify(2, message, &raw).unwrap();
    assert!(response.is_success());
}

#[test]
fn refusal_on_second_chunk_stops_sequence() {
    let (session, state) = connected();
    state.lock().unwrap().refuse_chunk = Some(1);

    let outcome = session.sign(0, b"abcdefghijkl").unwrap();

    assert_eq!(
        outcome,
        SignOutcome::Aborted {
            chunk: 1,
            code: 0x6985
        }
    );
    assert_eq!(state.lock().unwrap().log.len(), 2);

    let err = session.sign_message(0, b"abcdefghijkl").unwrap_err();
    assert_eq!(err.status_code(), Some(0x6985));

    // A fresh sequence works once the device stops refusing.
    state.lock().unwrap().refuse_chunk = None;
    assert!(session.sign_message(0, b"abcdefghijkl").is_ok());
}

#[test]
fn empty_message_signs() {
    let (session, state) = connected();

    session.sign_message(0, b"").unwrap();

    let state = state.lock().unwrap();
    assert_eq!(state.last_message.as_deref(), Some(&[][..]));
    // Chunk 0 carries only the key index.
    assert_eq!(state.log[0], vec![0xE0, 0x04, 0x00, 0x03, 0x04, 0, 0, 0, 0]);
}

#[test]
fn longest_message_signs_and_longer_is_rejected() {
    let (session, state) = connected();
    let message: Vec<u8> = (0..MAX_SIGN_MESSAGE_LEN).map(|i| i as u8).collect();

    session.sign_message(9, &message).unwrap();
    assert_eq!(state.lock().unwrap().last_message.as_deref(), Some(&message[..]));

    let sent = state.lock().unwrap().log.len();
    let too_long = vec![0u8; MAX_SIGN_MESSAGE_LEN + 1];
    assert!(matches!(
        session.sign_message(9, &too_long),
        Err(Error::PayloadTooLong { .. })
    ));
    assert_eq!(state.lock().unwrap().log.len(), sent);
}

#[test]
fn exit_and_disconnect() {
    let (session, state) = connected();

    session.exit_app().unwrap();
    assert_eq!(
        state.lock().unwrap().log.last().unwrap(),
        &vec![0xE0, 0xFF, 0x00, 0x00, 0x00]
    );

    session.disconnect().unwrap();
    assert!(matches!(session.get_version(), Err(Error::NotConnected)));
}

#[test]
fn unknown_instruction_status() {
    let mut device = MockLedger::default();
    let response = device.exchange(&[0xE0, 0x10, 0x00, 0x00, 0x00]).unwrap();
    assert_eq!(response, vec![0x6D, 0x00]);
}
