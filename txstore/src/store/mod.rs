use std::ops::Deref;

use alloy::primitives::{Address, B256};
use serde::Serialize;

use crate::{
    canonical::{address_hex, tx_id_hex},
    config::TxStoreConfig,
    error::TxStoreError,
    record::{Slot, TransactionRecord},
};

mod collection;
mod keys;

use collection::{Collection, UpsertOutcome};
use keys::TxQuery;

/// A record as read back from the store, with the engine-maintained timestamps
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredTransaction {
    #[serde(flatten)]
    pub record: TransactionRecord,
    /// Unix timestamp in milliseconds, kept across replacements of the slot
    pub created_at: u64,
    /// Unix timestamp in milliseconds of the last insert or replacement
    pub updated_at: u64,
}

impl Deref for StoredTransaction {
    type Target = TransactionRecord;
    fn deref(&self) -> &Self::Target {
        &self.record
    }
}

/// Durable bookkeeping of in-flight transactions.
///
/// Enforces one record per txId and one record per `(signer, nonce)` slot. The store
/// never decides when to resubmit: the submission component supplies `attempts` and
/// asks for replacement explicitly, and the confirmation watcher prunes confirmed
/// nonces.
///
/// Cloning is cheap and clones share the same underlying collection.
#[derive(Clone)]
pub struct TransactionStore {
    collection: Collection,
}

impl TransactionStore {
    /// Open (or create) the collection described by `config`.
    ///
    /// Fails with [`TxStoreError::StorageIoError`] when the durable medium cannot be
    /// opened. Callers must not operate without it.
    pub async fn open(config: TxStoreConfig) -> Result<Self, TxStoreError> {
        let location = config
            .store_path()
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "memory".to_string());

        let collection = tokio::task::spawn_blocking(move || Collection::open(&config))
            .await?
            .inspect_err(|e| {
                tracing::error!(location = %location, error = %e, "Failed to open transaction store");
            })?;

        tracing::info!(location = %location, "Transaction store opened");
        Ok(Self { collection })
    }

    async fn run_blocking<T, F>(&self, operation: F) -> Result<T, TxStoreError>
    where
        F: FnOnce(&Collection) -> Result<T, TxStoreError> + Send + 'static,
        T: Send + 'static,
    {
        let collection = self.collection.clone();
        let result = tokio::task::spawn_blocking(move || operation(&collection)).await?;
        if let Err(e) = &result {
            if e.is_fatal() {
                tracing::error!(error = %e, "Transaction store operation failed");
            }
        }
        result
    }

    /// Record a transaction attempt in its slot.
    ///
    /// With `update_existing = false` an occupied slot fails with
    /// [`TxStoreError::DuplicateKey`]. With `true`, the occupant is replaced in the same
    /// atomic step: new txId, signature and attempts, same slot.
    #[tracing::instrument(skip_all, fields(
        signer = %address_hex(&record.from),
        nonce = record.nonce,
        tx_id = %tx_id_hex(&record.tx_id),
        attempts = record.attempts,
    ))]
    pub async fn put(
        &self,
        record: &TransactionRecord,
        update_existing: bool,
    ) -> Result<(), TxStoreError> {
        record.validate()?;

        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        let owned = record.clone();
        let outcome = self
            .run_blocking(move |collection| collection.upsert(&owned, update_existing, now))
            .await;

        match outcome {
            Ok(UpsertOutcome::Inserted) => {
                tracing::debug!("Stored transaction in empty slot");
                Ok(())
            }
            Ok(UpsertOutcome::Replaced) => {
                tracing::debug!("Replaced transaction in occupied slot");
                Ok(())
            }
            Err(e @ TxStoreError::DuplicateKey { .. }) => {
                tracing::warn!(error = %e, update_existing, "Rejected transaction");
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Point lookup on the `(signer, nonce)` slot
    pub async fn get_by_nonce(
        &self,
        signer: Address,
        nonce: u64,
    ) -> Result<Option<StoredTransaction>, TxStoreError> {
        let query = TxQuery::BySlot(Slot::new(signer, nonce));
        self.run_blocking(move |collection| collection.find_one(query))
            .await
    }

    /// Point lookup by transaction hash
    pub async fn get_by_id(&self, tx_id: B256) -> Result<Option<StoredTransaction>, TxStoreError> {
        self.run_blocking(move |collection| collection.find_one(TxQuery::ByTxId(tx_id)))
            .await
    }

    /// Delete whatever occupies the slot. Returns the number of records removed.
    #[tracing::instrument(skip_all, fields(signer = %address_hex(&signer), nonce = nonce))]
    pub async fn remove_by_nonce(&self, signer: Address, nonce: u64) -> Result<usize, TxStoreError> {
        let query = TxQuery::BySlot(Slot::new(signer, nonce));
        let removed = self
            .run_blocking(move |collection| collection.delete(query))
            .await?;
        tracing::debug!(removed, "Removed transaction by nonce");
        Ok(removed)
    }

    /// Delete every record of `signer` with nonce `<= nonce`.
    ///
    /// Used once a nonce is confirmed on chain: anything still pending at or below it
    /// can never be mined.
    #[tracing::instrument(skip_all, fields(signer = %address_hex(&signer), nonce = nonce))]
    pub async fn remove_up_to(&self, signer: Address, nonce: u64) -> Result<usize, TxStoreError> {
        let query = TxQuery::BySignerNonceRange {
            signer,
            max_nonce: nonce,
        };
        let removed = self
            .run_blocking(move |collection| collection.delete(query))
            .await?;
        tracing::debug!(removed, "Pruned transactions up to nonce");
        Ok(removed)
    }

    /// All records of `signer`, ascending by nonce
    pub async fn list_by_signer(
        &self,
        signer: Address,
    ) -> Result<Vec<StoredTransaction>, TxStoreError> {
        self.run_blocking(move |collection| collection.find(TxQuery::BySigner(signer)))
            .await
    }

    /// Every record, ascending by nonce. Order between signers sharing a nonce is unspecified.
    pub async fn list_all(&self) -> Result<Vec<StoredTransaction>, TxStoreError> {
        self.run_blocking(|collection| collection.find(TxQuery::All))
            .await
    }

    /// Drop every record. Administrative and test use only.
    pub async fn clear(&self) -> Result<(), TxStoreError> {
        let removed = self
            .run_blocking(|collection| collection.delete(TxQuery::All))
            .await?;
        tracing::info!(removed, "Cleared transaction store");
        Ok(())
    }
}
