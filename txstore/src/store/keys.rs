use alloy::primitives::{Address, B256};

use crate::record::Slot;

/// 20-byte signer followed by the big-endian nonce, so a signer prefix scan
/// yields ascending nonces.
pub(crate) const SLOT_KEY_LEN: usize = 28;

pub(crate) type SlotKey = [u8; SLOT_KEY_LEN];

pub(crate) fn slot_key(slot: &Slot) -> SlotKey {
    let mut key = [0u8; SLOT_KEY_LEN];
    key[..20].copy_from_slice(slot.signer.as_slice());
    key[20..].copy_from_slice(&slot.nonce.to_be_bytes());
    key
}

pub(crate) fn decode_slot_key(bytes: &[u8]) -> Option<Slot> {
    if bytes.len() != SLOT_KEY_LEN {
        return None;
    }
    let signer = Address::from_slice(&bytes[..20]);
    let nonce = u64::from_be_bytes(bytes[20..].try_into().ok()?);
    Some(Slot::new(signer, nonce))
}

/// The closed set of lookups the store understands.
///
/// Only the collection layer turns these into tree operations; nothing outside the
/// store sees the engine's key layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TxQuery {
    ByTxId(B256),
    BySlot(Slot),
    /// Every slot of `signer` with nonce `<= max_nonce`
    BySignerNonceRange { signer: Address, max_nonce: u64 },
    BySigner(Address),
    All,
}
