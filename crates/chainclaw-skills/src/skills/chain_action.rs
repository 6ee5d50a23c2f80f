//! Shared quote-then-broadcast plumbing for `swap`/`bridge`/`lend`
//! (spec.md §4.1: "resolve a quote ...; when no signing credentials are
//! available, degrades to quote-only mode and still returns success").

use std::sync::Arc;

use chainclaw_pipeline::{TransactionPipeline, TxRequest};
use chainclaw_providers::Signer;
use chainclaw_types::skill::{SkillContext, SkillResult};
use serde_json::{json, Value};

/// Runs `req` through the pipeline when signing credentials are configured,
/// otherwise returns the quote as a successful quote-only result.
pub async fn execute_or_quote(
    signer: &Arc<dyn Signer>,
    pipeline: &Arc<TransactionPipeline>,
    quote: Value,
    req: TxRequest,
    ctx: &SkillContext,
) -> SkillResult {
    if !signer.is_configured() {
        return SkillResult::ok_with_data(
            "no signing credentials configured; returning quote only".to_string(),
            json!({"mode": "quote_only", "quote": quote}),
        );
    }
    match pipeline.execute(req, ctx).await {
        Ok(record) => SkillResult::ok_with_data(
            format!("transaction {} submitted", record.id),
            json!({"mode": "broadcast", "quote": quote, "tx": record}),
        ),
        Err(err) => SkillResult::fail(err.to_string()),
    }
}
