use sled::{
    Db, Transactional, Tree,
    transaction::{ConflictableTransactionError, ConflictableTransactionResult},
};
use serde::{Deserialize, Serialize};

use crate::{
    canonical::tx_id_hex,
    config::TxStoreConfig,
    error::{TxStoreError, UniqueIndex},
    record::{Slot, TransactionRecord},
    store::{
        StoredTransaction,
        keys::{SlotKey, TxQuery, decode_slot_key, slot_key},
    },
};

const TRANSACTIONS_TREE: &str = "transactions";
const NONCE_SIGNER_TREE: &str = "nonce_signer";

/// Persisted document: the record plus the composite index field and engine timestamps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TransactionDocument {
    pub record: TransactionRecord,
    pub nonce_signer: Slot,
    pub created_at: u64,
    pub updated_at: u64,
}

impl TransactionDocument {
    fn decode(bytes: &[u8]) -> Result<Self, TxStoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn into_stored(self) -> StoredTransaction {
        StoredTransaction {
            record: self.record,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Engine adapter. Owns the sled trees and translates [`TxQuery`] into tree
/// operations. Every method blocks.
///
/// Layout:
/// - `transactions`: txId (32 bytes) -> JSON [`TransactionDocument`]
/// - `nonce_signer`: signer ++ nonce (28 bytes) -> txId, the composite unique index
#[derive(Clone)]
pub(crate) struct Collection {
    db: Db,
    transactions: Tree,
    nonce_signer: Tree,
    sync_writes: bool,
}

fn abort<T>(error: TxStoreError) -> ConflictableTransactionResult<T, TxStoreError> {
    Err(ConflictableTransactionError::Abort(error))
}

fn decode_in_tx(bytes: &[u8]) -> ConflictableTransactionResult<TransactionDocument, TxStoreError> {
    TransactionDocument::decode(bytes).map_err(ConflictableTransactionError::Abort)
}

impl Collection {
    pub fn open(config: &TxStoreConfig) -> Result<Self, TxStoreError> {
        let engine = match config.store_path() {
            Some(path) => sled::Config::new().path(path),
            None => sled::Config::new().temporary(true),
        };
        let db = engine.open()?;
        let transactions = db.open_tree(TRANSACTIONS_TREE)?;
        let nonce_signer = db.open_tree(NONCE_SIGNER_TREE)?;

        Ok(Self {
            db,
            transactions,
            nonce_signer,
            sync_writes: config.sync_writes,
        })
    }

    fn flush(&self) -> Result<(), TxStoreError> {
        if self.sync_writes {
            self.db.flush()?;
        }
        Ok(())
    }

    /// Insert-or-replace keyed by the slot, as one transaction over both trees.
    ///
    /// The slot is checked and written inside the same transaction, so two writers
    /// racing for one slot cannot both insert.
    pub fn upsert(
        &self,
        record: &TransactionRecord,
        update_existing: bool,
        now: u64,
    ) -> Result<UpsertOutcome, TxStoreError> {
        let slot = record.slot();
        let index_key = slot_key(&slot);
        let tx_key = record.tx_id.0;

        let outcome = (&self.transactions, &self.nonce_signer).transaction(
            |(transactions, nonce_signer)| -> ConflictableTransactionResult<UpsertOutcome, TxStoreError> {
                let occupant = nonce_signer.get(&index_key[..])?;

                let (created_at, outcome) = match occupant {
                    Some(_) if !update_existing => {
                        return abort(TxStoreError::DuplicateKey {
                            index: UniqueIndex::NonceSigner,
                            key: slot.to_string(),
                        });
                    }
                    Some(existing_id) => {
                        let created_at = match transactions.get(&existing_id)? {
                            Some(bytes) => decode_in_tx(&bytes)?.created_at,
                            None => now,
                        };
                        if existing_id[..] != tx_key[..] {
                            if transactions.get(&tx_key[..])?.is_some() {
                                return abort(TxStoreError::DuplicateKey {
                                    index: UniqueIndex::TxId,
                                    key: tx_id_hex(&record.tx_id),
                                });
                            }
                            transactions.remove(existing_id)?;
                        }
                        (created_at, UpsertOutcome::Replaced)
                    }
                    None => {
                        if transactions.get(&tx_key[..])?.is_some() {
                            return abort(TxStoreError::DuplicateKey {
                                index: UniqueIndex::TxId,
                                key: tx_id_hex(&record.tx_id),
                            });
                        }
                        (now, UpsertOutcome::Inserted)
                    }
                };

                let document = TransactionDocument {
                    record: record.clone(),
                    nonce_signer: slot,
                    created_at,
                    updated_at: now,
                };
                let bytes = serde_json::to_vec(&document)
                    .map_err(|e| ConflictableTransactionError::Abort(e.into()))?;

                transactions.insert(&tx_key[..], bytes)?;
                nonce_signer.insert(&index_key[..], &tx_key[..])?;
                Ok(outcome)
            },
        )?;

        self.flush()?;
        Ok(outcome)
    }

    pub fn find_one(&self, query: TxQuery) -> Result<Option<StoredTransaction>, TxStoreError> {
        match query {
            TxQuery::ByTxId(tx_id) => self
                .transactions
                .get(tx_id.as_slice())?
                .map(|bytes| TransactionDocument::decode(&bytes).map(|d| d.into_stored()))
                .transpose(),
            TxQuery::BySlot(slot) => {
                let key = slot_key(&slot);
                // Read index and document from one snapshot
                let found = (&self.transactions, &self.nonce_signer).transaction(
                    |(transactions, nonce_signer)| -> ConflictableTransactionResult<
                        Option<TransactionDocument>,
                        TxStoreError,
                    > {
                        let Some(tx_id) = nonce_signer.get(&key[..])? else {
                            return Ok(None);
                        };
                        match transactions.get(&tx_id)? {
                            Some(bytes) => Ok(Some(decode_in_tx(&bytes)?)),
                            None => Ok(None),
                        }
                    },
                )?;
                Ok(found.map(TransactionDocument::into_stored))
            }
            other => Ok(self.find(other)?.into_iter().next()),
        }
    }

    /// Multi-record lookup, ordered ascending by nonce
    pub fn find(&self, query: TxQuery) -> Result<Vec<StoredTransaction>, TxStoreError> {
        match query {
            TxQuery::ByTxId(_) | TxQuery::BySlot(_) => {
                Ok(self.find_one(query)?.into_iter().collect())
            }
            TxQuery::BySigner(_) | TxQuery::BySignerNonceRange { .. } => {
                let mut found = Vec::new();
                for slot in self.indexed_slots(query)? {
                    // The slot may have been pruned since the index scan
                    if let Some(stored) = self.find_one(TxQuery::BySlot(slot))? {
                        found.push(stored);
                    }
                }
                Ok(found)
            }
            TxQuery::All => {
                let mut found = self
                    .transactions
                    .iter()
                    .values()
                    .map(|bytes| -> Result<StoredTransaction, TxStoreError> {
                        Ok(TransactionDocument::decode(&bytes?)?.into_stored())
                    })
                    .collect::<Result<Vec<_>, TxStoreError>>()?;
                found.sort_by_key(|stored| stored.record.nonce);
                Ok(found)
            }
        }
    }

    /// Delete every record matching `query`, returning how many were removed
    pub fn delete(&self, query: TxQuery) -> Result<usize, TxStoreError> {
        let removed = match query {
            TxQuery::ByTxId(tx_id) => {
                let key = tx_id.0;
                (&self.transactions, &self.nonce_signer).transaction(
                    |(transactions, nonce_signer)| -> ConflictableTransactionResult<usize, TxStoreError> {
                        let Some(bytes) = transactions.remove(&key[..])? else {
                            return Ok(0);
                        };
                        let slot = slot_key(&decode_in_tx(&bytes)?.nonce_signer);
                        if nonce_signer
                            .get(&slot[..])?
                            .is_some_and(|occupant| occupant[..] == key[..])
                        {
                            nonce_signer.remove(&slot[..])?;
                        }
                        Ok(1)
                    },
                )?
            }
            TxQuery::BySlot(slot) => self.remove_slots(&[slot_key(&slot)])?,
            TxQuery::BySigner(_) | TxQuery::BySignerNonceRange { .. } => {
                let keys: Vec<SlotKey> = self
                    .indexed_slots(query)?
                    .iter()
                    .map(slot_key)
                    .collect();
                self.remove_slots(&keys)?
            }
            TxQuery::All => self.remove_all()?,
        };

        self.flush()?;
        Ok(removed)
    }

    fn remove_slots(&self, keys: &[SlotKey]) -> Result<usize, TxStoreError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let removed = (&self.transactions, &self.nonce_signer).transaction(
            |(transactions, nonce_signer)| {
                let mut removed = 0;
                for key in keys {
                    if let Some(tx_id) = nonce_signer.remove(&key[..])? {
                        transactions.remove(tx_id)?;
                        removed += 1;
                    }
                }
                Ok::<_, ConflictableTransactionError<TxStoreError>>(removed)
            },
        )?;
        Ok(removed)
    }

    /// Empty both trees in one transaction.
    ///
    /// Entries are scanned first and removed transactionally, so a put committing
    /// during the clear is either removed whole or survives whole. Documents are
    /// removed together with the index entry pointing at them.
    fn remove_all(&self) -> Result<usize, TxStoreError> {
        let index_keys = self
            .nonce_signer
            .iter()
            .keys()
            .collect::<Result<Vec<_>, _>>()?;
        let tx_keys = self
            .transactions
            .iter()
            .keys()
            .collect::<Result<Vec<_>, _>>()?;
        if index_keys.is_empty() && tx_keys.is_empty() {
            return Ok(0);
        }

        let removed = (&self.transactions, &self.nonce_signer).transaction(
            |(transactions, nonce_signer)| -> ConflictableTransactionResult<usize, TxStoreError> {
                let mut removed = 0;
                for key in &index_keys {
                    if let Some(tx_id) = nonce_signer.remove(key.clone())? {
                        if transactions.remove(tx_id)?.is_some() {
                            removed += 1;
                        }
                    }
                }
                for key in &tx_keys {
                    let Some(bytes) = transactions.remove(key.clone())? else {
                        continue;
                    };
                    removed += 1;
                    // Unreadable documents are dropped without touching the index
                    let Ok(document) = TransactionDocument::decode(&bytes) else {
                        continue;
                    };
                    let slot = slot_key(&document.nonce_signer);
                    if nonce_signer
                        .get(&slot[..])?
                        .is_some_and(|occupant| occupant[..] == key[..])
                    {
                        nonce_signer.remove(&slot[..])?;
                    }
                }
                Ok(removed)
            },
        )?;
        Ok(removed)
    }

    /// Slots present in the composite index for a signer-scoped query, ascending by nonce
    fn indexed_slots(&self, query: TxQuery) -> Result<Vec<Slot>, TxStoreError> {
        let entries = match query {
            TxQuery::BySigner(signer) => self.nonce_signer.scan_prefix(signer.as_slice()),
            TxQuery::BySignerNonceRange { signer, max_nonce } => {
                let start = slot_key(&Slot::new(signer, 0));
                let end = slot_key(&Slot::new(signer, max_nonce));
                self.nonce_signer.range(start..=end)
            }
            _ => return Ok(Vec::new()),
        };

        let mut slots = Vec::new();
        for entry in entries.keys() {
            let key = entry?;
            match decode_slot_key(&key) {
                Some(slot) => slots.push(slot),
                None => {
                    return Err(TxStoreError::SerializationError {
                        message: format!("malformed nonce_signer index key of {} bytes", key.len()),
                    });
                }
            }
        }
        Ok(slots)
    }
}
