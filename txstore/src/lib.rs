//! Durable bookkeeping of the transactions a relay has submitted on behalf of its clients.
//!
//! A [`TransactionStore`] holds at most one [`TransactionRecord`] per transaction hash and
//! per `(signer, nonce)` slot. Stuck transactions are replaced in their slot rather than
//! duplicated, and confirmed nonces are pruned by the confirmation watcher.

pub mod canonical;
pub mod config;
pub mod error;
pub mod record;
pub mod store;

pub use canonical::{parse_address, parse_nonce, parse_tx_id};
pub use config::{TXSTORE_FILENAME, TxStoreConfig};
pub use error::{TxStoreError, UniqueIndex};
pub use record::{ChainTransaction, Slot, TransactionRecord};
pub use store::{StoredTransaction, TransactionStore};
