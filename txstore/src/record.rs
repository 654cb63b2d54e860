use alloy::{
    consensus::{SignableTransaction, Signed, TxLegacy},
    primitives::{Address, B256, Bytes, Signature, TxKind, U256},
};
use serde::{Deserialize, Serialize};

use crate::{
    canonical::{address_hex, tx_id_hex},
    error::TxStoreError,
};

/// One logical position in a signer's transaction sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Slot {
    pub signer: Address,
    pub nonce: u64,
}

impl Slot {
    pub fn new(signer: Address, nonce: u64) -> Self {
        Self { signer, nonce }
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", address_hex(&self.signer), self.nonce)
    }
}

/// A legacy transaction as built by the submission component, before or after signing
#[derive(Debug, Clone)]
pub enum ChainTransaction {
    Unsigned(TxLegacy),
    Signed(Signed<TxLegacy>),
}

impl ChainTransaction {
    pub fn tx(&self) -> &TxLegacy {
        match self {
            ChainTransaction::Unsigned(tx) => tx,
            ChainTransaction::Signed(signed) => signed.tx(),
        }
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self {
            ChainTransaction::Unsigned(_) => None,
            ChainTransaction::Signed(signed) => Some(signed.signature()),
        }
    }

    /// Content hash: the envelope hash once signed, the signing hash before that.
    pub fn hash(&self) -> B256 {
        match self {
            ChainTransaction::Unsigned(tx) => tx.signature_hash(),
            ChainTransaction::Signed(signed) => *signed.hash(),
        }
    }
}

impl PartialEq for ChainTransaction {
    fn eq(&self, other: &Self) -> bool {
        self.tx() == other.tx() && self.signature() == other.signature()
    }
}

impl Eq for ChainTransaction {}

impl From<TxLegacy> for ChainTransaction {
    fn from(tx: TxLegacy) -> Self {
        ChainTransaction::Unsigned(tx)
    }
}

impl From<Signed<TxLegacy>> for ChainTransaction {
    fn from(signed: Signed<TxLegacy>) -> Self {
        ChainTransaction::Signed(signed)
    }
}

/// Canonical persisted form of one submitted transaction attempt.
///
/// Addresses, hashes, `data` and the 256-bit words serialize as lowercase `0x` hex,
/// `gas`, `gasPrice` and `nonce` as plain integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRecord {
    pub from: Address,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub gas: u64,
    pub gas_price: u128,
    pub data: Bytes,
    pub nonce: u64,
    #[serde(default)]
    pub value: U256,
    pub tx_id: B256,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<U256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<U256>,
}

impl TransactionRecord {
    pub fn from_chain_transaction(tx: &ChainTransaction, from: Address, attempts: u32) -> Self {
        let inner = tx.tx();
        let signature = tx.signature();

        Self {
            from,
            to: inner.to.to().copied(),
            gas: inner.gas_limit,
            gas_price: inner.gas_price,
            data: inner.input.clone(),
            nonce: inner.nonce,
            value: inner.value,
            tx_id: tx.hash(),
            attempts,
            chain_id: inner.chain_id,
            v: signature.map(|sig| U256::from(legacy_v(sig.v(), inner.chain_id))),
            r: signature.map(|sig| sig.r()),
            s: signature.map(|sig| sig.s()),
        }
    }

    /// Rebuild the transaction for re-signing or rebroadcast. The hash is recomputed
    /// from the stored content, never taken from `tx_id`.
    pub fn to_chain_transaction(&self) -> Result<ChainTransaction, TxStoreError> {
        let tx = TxLegacy {
            chain_id: self.chain_id,
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas,
            to: self.to.map(TxKind::Call).unwrap_or(TxKind::Create),
            value: self.value,
            input: self.data.clone(),
        };

        match (self.v, self.r, self.s) {
            (None, None, None) => Ok(ChainTransaction::Unsigned(tx)),
            (Some(v), Some(r), Some(s)) => {
                let (parity, chain_id) = decode_legacy_v(v)?;
                if chain_id != self.chain_id {
                    return Err(TxStoreError::validation(format!(
                        "signature v={v} implies chain id {chain_id:?}, record has {:?}",
                        self.chain_id
                    )));
                }
                let signature = Signature::new(r, s, parity);
                Ok(ChainTransaction::Signed(tx.into_signed(signature)))
            }
            _ => Err(TxStoreError::validation(format!(
                "transaction {} carries an incomplete signature",
                tx_id_hex(&self.tx_id)
            ))),
        }
    }

    pub fn slot(&self) -> Slot {
        Slot::new(self.from, self.nonce)
    }

    /// Checks required before any persistence attempt
    pub fn validate(&self) -> Result<(), TxStoreError> {
        if self.tx_id == B256::ZERO {
            return Err(TxStoreError::validation(format!(
                "missing txId for slot {}",
                self.slot()
            )));
        }
        if self.attempts < 1 {
            return Err(TxStoreError::validation(format!(
                "attempts must be at least 1, got {} for {}",
                self.attempts,
                tx_id_hex(&self.tx_id)
            )));
        }
        Ok(())
    }
}

/// Legacy wire `v`: 27/28 before EIP-155, `35 + 2 * chain_id + parity` after.
fn legacy_v(parity: bool, chain_id: Option<u64>) -> u128 {
    match chain_id {
        Some(id) => 35 + 2 * id as u128 + parity as u128,
        None => 27 + parity as u128,
    }
}

fn decode_legacy_v(v: U256) -> Result<(bool, Option<u64>), TxStoreError> {
    let raw = u128::try_from(v)
        .map_err(|_| TxStoreError::validation(format!("signature v={v} out of range")))?;
    match raw {
        27 | 28 => Ok((raw == 28, None)),
        35.. => {
            let chain_id = u64::try_from((raw - 35) / 2).map_err(|_| {
                TxStoreError::validation(format!("signature v={v} encodes an invalid chain id"))
            })?;
            Ok(((raw - 35) % 2 == 1, Some(chain_id)))
        }
        _ => Err(TxStoreError::validation(format!(
            "signature v={v} is not a legacy value"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::{address, bytes};

    use super::*;

    fn legacy_tx(chain_id: Option<u64>) -> TxLegacy {
        TxLegacy {
            chain_id,
            nonce: 7,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: TxKind::Call(address!("0x3535353535353535353535353535353535353535")),
            value: U256::from(1_000_000_000_000_000_000u128),
            input: bytes!("deadbeef"),
        }
    }

    fn signature(parity: bool) -> Signature {
        Signature::new(U256::from(0x1234_5678u64), U256::from(0x9abc_def0u64), parity)
    }

    #[test]
    fn signed_round_trip_reproduces_every_field() {
        let signed = legacy_tx(Some(1)).into_signed(signature(true));
        let original = ChainTransaction::Signed(signed.clone());
        let from = address!("0x00000000000000000000000000000000000000aa");

        let record = TransactionRecord::from_chain_transaction(&original, from, 1);
        assert_eq!(record.tx_id, *signed.hash());
        assert_eq!(record.v, Some(U256::from(38u64)));

        let rebuilt = record.to_chain_transaction().unwrap();
        assert_eq!(rebuilt.tx(), signed.tx());
        assert_eq!(rebuilt.signature(), Some(signed.signature()));
        assert_eq!(rebuilt.hash(), *signed.hash());
    }

    #[test]
    fn pre_eip155_signature_round_trips() {
        let signed = legacy_tx(None).into_signed(signature(false));
        let record = TransactionRecord::from_chain_transaction(
            &ChainTransaction::Signed(signed.clone()),
            Address::ZERO,
            3,
        );
        assert_eq!(record.v, Some(U256::from(27u64)));
        assert_eq!(
            record.to_chain_transaction().unwrap(),
            ChainTransaction::Signed(signed)
        );
    }

    #[test]
    fn unsigned_transaction_uses_signing_hash() {
        let tx = legacy_tx(Some(5));
        let record = TransactionRecord::from_chain_transaction(
            &ChainTransaction::Unsigned(tx.clone()),
            Address::ZERO,
            1,
        );
        assert_eq!(record.tx_id, tx.signature_hash());
        assert_eq!((record.v, record.r, record.s), (None, None, None));
        assert_eq!(
            record.to_chain_transaction().unwrap(),
            ChainTransaction::Unsigned(tx)
        );
    }

    #[test]
    fn contract_creation_has_no_recipient() {
        let mut tx = legacy_tx(Some(1));
        tx.to = TxKind::Create;
        let record =
            TransactionRecord::from_chain_transaction(&tx.clone().into(), Address::ZERO, 1);
        assert_eq!(record.to, None);
        assert_eq!(record.to_chain_transaction().unwrap().tx().to, TxKind::Create);
    }

    #[test]
    fn partial_signature_is_rejected() {
        let signed = legacy_tx(Some(1)).into_signed(signature(false));
        let mut record =
            TransactionRecord::from_chain_transaction(&signed.into(), Address::ZERO, 1);
        record.s = None;
        assert!(matches!(
            record.to_chain_transaction(),
            Err(TxStoreError::ValidationError { .. })
        ));
    }

    #[test]
    fn inconsistent_v_is_rejected() {
        let signed = legacy_tx(Some(1)).into_signed(signature(false));
        let mut record =
            TransactionRecord::from_chain_transaction(&signed.into(), Address::ZERO, 1);
        record.v = Some(U256::from(30u64));
        assert!(record.to_chain_transaction().is_err());

        record.v = Some(U256::from(27u64));
        assert!(record.to_chain_transaction().is_err());
    }

    #[test]
    fn validation_requires_tx_id_and_attempts() {
        let mut record = TransactionRecord::from_chain_transaction(
            &legacy_tx(None).into(),
            Address::ZERO,
            1,
        );
        assert!(record.validate().is_ok());

        record.attempts = 0;
        assert!(matches!(
            record.validate(),
            Err(TxStoreError::ValidationError { .. })
        ));

        record.attempts = 1;
        record.tx_id = B256::ZERO;
        assert!(record.validate().is_err());
    }

    #[test]
    fn serializes_canonical_lowercase_hex() {
        let signed = legacy_tx(Some(1)).into_signed(signature(true));
        let from = address!("0x52908400098527886E0F7030069857D2E4169EE7");
        let record = TransactionRecord::from_chain_transaction(&signed.into(), from, 2);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["from"], "0x52908400098527886e0f7030069857d2e4169ee7");
        assert_eq!(json["data"], "0xdeadbeef");
        assert_eq!(json["gas"], 21_000);
        assert_eq!(json["nonce"], 7);
        assert_eq!(json["attempts"], 2);
        let tx_id = json["txId"].as_str().unwrap();
        assert_eq!(tx_id, tx_id.to_lowercase());

        let back: TransactionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn missing_value_defaults_to_zero() {
        let mut json = serde_json::to_value(TransactionRecord::from_chain_transaction(
            &legacy_tx(None).into(),
            Address::ZERO,
            1,
        ))
        .unwrap();
        json.as_object_mut().unwrap().remove("value");
        let record: TransactionRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.value, U256::ZERO);
    }
}
