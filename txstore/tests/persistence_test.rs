use fixtures::*;

use relay_txstore::{TXSTORE_FILENAME, TransactionStore, TxStoreConfig};

#[tokio::test]
async fn test_records_survive_reopen() {
    init_tracing();
    let workdir = tempfile::tempdir().unwrap();
    let config = TxStoreConfig::at(workdir.path());

    let rec = signed_record(SIGNER_A, 1, 5_000_000_000, 1);
    {
        let store = TransactionStore::open(config.clone()).await.unwrap();
        store.put(&rec, false).await.unwrap();
        store
            .put(&record(SIGNER_A, 2, tx_id(0x77), 1), false)
            .await
            .unwrap();
        store.remove_by_nonce(SIGNER_A, 2).await.unwrap();
    }

    assert!(workdir.path().join(TXSTORE_FILENAME).exists());

    let reopened = TransactionStore::open(config).await.unwrap();
    let stored = reopened.get_by_id(rec.tx_id).await.unwrap().unwrap();
    assert_eq!(stored.record, rec);
    assert!(reopened.get_by_nonce(SIGNER_A, 2).await.unwrap().is_none());

    // Index survived too: the slot is still occupied
    assert!(reopened.put(&signed_record(SIGNER_A, 1, 6_000_000_000, 2), false).await.is_err());
}

#[tokio::test]
async fn test_open_fails_when_workdir_is_unusable() {
    init_tracing();
    let workdir = tempfile::tempdir().unwrap();
    let blocker = workdir.path().join("not-a-dir");
    std::fs::write(&blocker, b"occupied").unwrap();

    let result = TransactionStore::open(TxStoreConfig::at(&blocker)).await;

    let err = result.err().expect("open must fail");
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_in_memory_stores_are_isolated() {
    let first = memory_store().await;
    let second = memory_store().await;

    first.put(&record(SIGNER_A, 0, tx_id(1), 1), false).await.unwrap();

    assert!(second.list_all().await.unwrap().is_empty());
}
