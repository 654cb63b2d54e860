use relay_txstore::{TransactionStore, parse_address, parse_nonce, parse_tx_id};
use serde_json::{Value, json};

use crate::cli::{Command, SlotArgs};

/// Run one command against the store and render its result as JSON
pub async fn run(store: &TransactionStore, command: Command) -> anyhow::Result<Value> {
    let output = match command {
        Command::List { signer: Some(signer) } => {
            serde_json::to_value(store.list_by_signer(parse_address(&signer)?).await?)?
        }
        Command::List { signer: None } => serde_json::to_value(store.list_all().await?)?,
        Command::Get { tx_id } => serde_json::to_value(store.get_by_id(parse_tx_id(&tx_id)?).await?)?,
        Command::GetSlot(slot) => {
            let (signer, nonce) = parse_slot(&slot)?;
            serde_json::to_value(store.get_by_nonce(signer, nonce).await?)?
        }
        Command::RemoveNonce(slot) => {
            let (signer, nonce) = parse_slot(&slot)?;
            json!({ "removed": store.remove_by_nonce(signer, nonce).await? })
        }
        Command::Prune(slot) => {
            let (signer, nonce) = parse_slot(&slot)?;
            json!({ "removed": store.remove_up_to(signer, nonce).await? })
        }
        Command::Clear => {
            store.clear().await?;
            json!({ "cleared": true })
        }
    };
    Ok(output)
}

fn parse_slot(slot: &SlotArgs) -> anyhow::Result<(alloy::primitives::Address, u64)> {
    Ok((parse_address(&slot.signer)?, parse_nonce(&slot.nonce)?))
}
