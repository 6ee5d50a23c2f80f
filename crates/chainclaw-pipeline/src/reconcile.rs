//! Boot-time reconciliation of transactions left in a non-terminal state
//! across a restart (spec.md §9 Open Question 1, resolved in `DESIGN.md`):
//! re-query the chain for each non-terminal transaction's hash and advance
//! its status before the scheduler or server start accepting new work.

use std::sync::Arc;

use chainclaw_memory::Store;
use chainclaw_providers::ChainRpc;
use chainclaw_types::tx::TxStatus;
use tracing::{info, warn};

/// Returns the number of records advanced.
pub async fn reconcile_pending(store: &Arc<Store>, chain: &Arc<dyn ChainRpc>) -> anyhow::Result<usize> {
    let pending = store.list_non_terminal_txs().await?;
    let mut advanced = 0usize;
    for record in pending {
        let Some(hash) = record.hash.clone() else {
            // Crashed before broadcast produced a hash; nothing to reconcile
            // against the chain, so it can never progress on its own.
            store
                .advance_tx(
                    &record.id,
                    TxStatus::Failed,
                    None,
                    None,
                    None,
                    None,
                    None,
                    None,
                    Some("reconciled at startup: no broadcast hash recorded"),
                )
                .await?;
            advanced += 1;
            continue;
        };
        match chain.receipt(record.chain_id, &hash).await {
            Ok(Some(receipt)) if receipt.status => {
                store
                    .advance_tx(
                        &record.id,
                        TxStatus::Confirmed,
                        None,
                        None,
                        None,
                        Some(&receipt.gas_used),
                        None,
                        Some(receipt.block_number),
                        None,
                    )
                    .await?;
                advanced += 1;
            }
            Ok(Some(_failed_receipt)) => {
                store
                    .advance_tx(
                        &record.id,
                        TxStatus::Failed,
                        None,
                        None,
                        None,
                        None,
                        None,
                        None,
                        Some("reconciled at startup: transaction reverted on-chain"),
                    )
                    .await?;
                advanced += 1;
            }
            Ok(None) => {
                // Still pending on-chain; leave it for the pipeline's own
                // confirmation watch (none is running for it yet, but the
                // next poll driven by the owning skill will pick it up).
                info!(tx_id = %record.id, "reconciliation: tx still unconfirmed on-chain");
            }
            Err(err) => {
                warn!(tx_id = %record.id, error = %err, "reconciliation: chain lookup failed, leaving as-is");
            }
        }
    }
    Ok(advanced)
}
