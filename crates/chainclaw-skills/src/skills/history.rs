//! `history` skill (spec.md §4.1): serialises transaction records for the
//! caller user as text, CSV, or JSON. Empty history returns success with a
//! "no transactions" message.

use std::sync::Arc;

use async_trait::async_trait;
use chainclaw_memory::Store;
use chainclaw_types::skill::{Skill, SkillContext, SkillResult};
use chainclaw_types::tx::TxRecord;
use serde_json::{json, Value};

pub struct HistorySkill {
    store: Arc<Store>,
}

impl HistorySkill {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Skill for HistorySkill {
    fn name(&self) -> &'static str {
        "history"
    }

    fn description(&self) -> &'static str {
        "Lists this user's transaction history as text, CSV, or JSON."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "format": {"type": "string", "enum": ["text", "csv", "json"], "default": "text"}
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &SkillContext) -> SkillResult {
        let format = params.get("format").and_then(|v| v.as_str()).unwrap_or("text");
        let txs = match self.store.list_user_txs(&ctx.user_id).await {
            Ok(t) => t,
            Err(err) => return SkillResult::fail(format!("could not load transaction history: {err}")),
        };
        if txs.is_empty() {
            return SkillResult::ok("no transactions");
        }

        match format {
            "json" => SkillResult::ok_with_data(
                format!("{} transaction(s)", txs.len()),
                serde_json::to_value(&txs).unwrap_or(json!([])),
            ),
            "csv" => match render_csv(&txs) {
                Ok(csv) => SkillResult::ok_with_data(format!("{} transaction(s)", txs.len()), json!({"csv": csv})),
                Err(err) => SkillResult::fail(format!("could not render CSV: {err}")),
            },
            _ => SkillResult::ok_with_data(format!("{} transaction(s)", txs.len()), json!({"text": render_text(&txs)})),
        }
    }
}

fn render_text(txs: &[TxRecord]) -> String {
    txs.iter()
        .map(|t| {
            format!(
                "{} {:?} {} -> {} (${:.2}) [{}]",
                t.created_at.to_rfc3339(),
                t.status,
                t.from,
                t.to,
                t.value_usd,
                t.skill_name
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_csv(txs: &[TxRecord]) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["id", "created_at", "status", "from", "to", "value_usd", "skill_name", "hash"])?;
    for t in txs {
        wtr.write_record([
            t.id.as_str(),
            &t.created_at.to_rfc3339(),
            &format!("{:?}", t.status),
            t.from.as_str(),
            t.to.as_str(),
            &format!("{:.2}", t.value_usd),
            t.skill_name.as_str(),
            t.hash.as_deref().unwrap_or(""),
        ])?;
    }
    Ok(String::from_utf8(wtr.into_inner()?)?)
}
