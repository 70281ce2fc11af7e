//! Command encoders for the DeFiChain app.
//!
//! Every function here is pure: inputs in, finished [`Apdu`]s out. Nothing
//! touches a transport, which keeps the framing rules testable on their own.
//!
//! # Message Chunking
//!
//! `SIGN_MSG` always travels as exactly [`SIGN_CHUNKS`] APDUs, whatever the
//! message length. With `part = len / 4 + 1`, chunk `i` carries
//! `message[i * part .. (i + 1) * part]` clamped to the message end, so the
//! trailing chunk may be empty. The first chunk is prefixed with the
//! little-endian key index.

use crate::apdu::{Apdu, Instruction};
use crate::crypto::{DIGEST_LEN, double_sha256};
use crate::error::{Error, Result};
use crate::format::{AddressDisplay, AddressFormat, ChunkFlags, HashMode};

/// Number of APDUs a `SIGN_MSG` sequence is split into.
pub const SIGN_CHUNKS: usize = 4;

/// Length of the serialized key index.
pub const KEY_INDEX_LEN: usize = 4;

/// Longest message [`sign_commands`] accepts.
///
/// The first chunk carries the key index plus `len / 4 + 1` message bytes
/// and must fit in a single APDU.
pub const MAX_SIGN_MESSAGE_LEN: usize = (Apdu::MAX_DATA - KEY_INDEX_LEN) * SIGN_CHUNKS - 1;

/// Builds `GET_VERSION`.
#[must_use]
pub fn get_version() -> Apdu {
    simple(Instruction::GetVersion)
}

/// Builds `EXIT`.
#[must_use]
pub fn exit_app() -> Apdu {
    simple(Instruction::Exit)
}

fn simple(ins: Instruction) -> Apdu {
    Apdu::fixed(ins, 0x00, 0x00, Vec::new())
}

/// Builds `GET_PUBKEY` for `index`.
///
/// Payload: `index as u32 LE`; the header's Lc carries its length of 4.
#[must_use]
pub fn get_public_key(index: u32, format: AddressFormat, display: AddressDisplay) -> Apdu {
    let data = index.to_le_bytes().to_vec();

    Apdu::fixed(Instruction::GetPublicKey, display.p1(), format.p2(), data)
}

/// Splits `message` into the [`SIGN_CHUNKS`] slices sent by `SIGN_MSG`.
///
/// # Example
///
/// ```
/// use defi_ledger_core::command::split_message;
///
/// let parts = split_message(b"abcdefgh");
/// assert_eq!(parts, [&b"abc"[..], &b"def"[..], &b"gh"[..], &b""[..]]);
/// ```
#[must_use]
pub fn split_message(message: &[u8]) -> [&[u8]; SIGN_CHUNKS] {
    let len = message.len();
    let part = len / SIGN_CHUNKS + 1;

    core::array::from_fn(|i| {
        let start = (i * part).min(len);
        let end = ((i + 1) * part).min(len);
        &message[start..end]
    })
}

/// P2 flags for chunk `index` of a `SIGN_MSG` sequence.
#[must_use]
pub fn sign_chunk_flags(index: usize) -> ChunkFlags {
    match index {
        0 => ChunkFlags::FIRST | ChunkFlags::MORE,
        i if i + 1 == SIGN_CHUNKS => ChunkFlags::LAST,
        _ => ChunkFlags::MORE,
    }
}

/// Builds the [`SIGN_CHUNKS`] APDUs of a `SIGN_MSG` sequence.
///
/// # Errors
///
/// Returns [`Error::PayloadTooLong`] if `message` is longer than
/// [`MAX_SIGN_MESSAGE_LEN`]; nothing has been sent at that point.
pub fn sign_commands(index: u32, message: &[u8]) -> Result<Vec<Apdu>> {
    if message.len() > MAX_SIGN_MESSAGE_LEN {
        return Err(Error::PayloadTooLong {
            len: KEY_INDEX_LEN + message.len() / SIGN_CHUNKS + 1,
        });
    }

    split_message(message)
        .into_iter()
        .enumerate()
        .map(|(i, part)| {
            let mut data = Vec::with_capacity(KEY_INDEX_LEN + part.len());
            if i == 0 {
                data.extend_from_slice(&index.to_le_bytes());
            }
            data.extend_from_slice(part);

            Apdu::new(
                Instruction::SignMessage,
                HashMode::NeedsHash.p1(),
                sign_chunk_flags(i).bits(),
                data,
            )
        })
        .collect()
}

/// Builds `VERIFY_MSG` for a device-native `signature` over `message`.
///
/// Payload: `index (u32 LE) || signature || SHA256(SHA256(message))`, sent as
/// a single first-and-last APDU.
///
/// # Errors
///
/// Returns [`Error::PayloadTooLong`] if the signature is too long for the
/// payload to fit in one APDU.
pub fn verify(index: u32, message: &[u8], signature: &[u8]) -> Result<Apdu> {
    let digest = double_sha256(message);

    let mut data = Vec::with_capacity(KEY_INDEX_LEN + signature.len() + DIGEST_LEN);
    data.extend_from_slice(&index.to_le_bytes());
    data.extend_from_slice(signature);
    data.extend_from_slice(&digest);

    Apdu::new(
        Instruction::VerifyMessage,
        HashMode::AlreadyHashed.p1(),
        (ChunkFlags::FIRST | ChunkFlags::LAST).bits(),
        data,
    )
}
