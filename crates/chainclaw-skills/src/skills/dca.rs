//! `dca` skill (spec.md §4.1): CRUD-like facade over DCA jobs (spec.md §4.6).

use std::sync::Arc;

use async_trait::async_trait;
use chainclaw_memory::Store;
use chainclaw_types::dca::{DcaFrequency, DcaStatus};
use chainclaw_types::skill::{Skill, SkillContext, SkillResult};
use serde_json::{json, Value};

pub struct DcaSkill {
    store: Arc<Store>,
}

impl DcaSkill {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Skill for DcaSkill {
    fn name(&self) -> &'static str {
        "dca"
    }

    fn description(&self) -> &'static str {
        "Creates, lists, pauses, resumes or cancels recurring dollar-cost-average jobs."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["create", "list", "pause", "resume", "cancel"]},
                "from_token": {"type": "string"},
                "to_token": {"type": "string"},
                "amount": {"type": "string"},
                "chain_id": {"type": "integer"},
                "frequency": {"type": "string", "enum": ["daily", "weekly", "monthly"]},
                "job_id": {"type": "integer"}
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, params: Value, ctx: &SkillContext) -> SkillResult {
        let action = params.get("action").and_then(|v| v.as_str()).unwrap_or("list");
        match action {
            "create" => self.create(&params, ctx).await,
            "list" => self.list(ctx).await,
            "pause" => self.set_status(&params, DcaStatus::Paused).await,
            "resume" => self.set_status(&params, DcaStatus::Active).await,
            "cancel" => self.set_status(&params, DcaStatus::Cancelled).await,
            other => SkillResult::fail(format!("action: unknown action '{other}'")),
        }
    }
}

impl DcaSkill {
    async fn create(&self, params: &Value, ctx: &SkillContext) -> SkillResult {
        let Some(from_token) = params.get("from_token").and_then(|v| v.as_str()) else {
            return SkillResult::fail("from_token: must be a string");
        };
        let Some(to_token) = params.get("to_token").and_then(|v| v.as_str()) else {
            return SkillResult::fail("to_token: must be a string");
        };
        let Some(amount) = params.get("amount").and_then(|v| v.as_str()) else {
            return SkillResult::fail("amount: must be a string");
        };
        let frequency = match params.get("frequency").and_then(|v| v.as_str()) {
            Some("weekly") => DcaFrequency::Weekly,
            Some("monthly") => DcaFrequency::Monthly,
            Some("daily") | None => DcaFrequency::Daily,
            Some(other) => return SkillResult::fail(format!("frequency: unknown frequency '{other}'")),
        };
        let chain_id = params.get("chain_id").and_then(|v| v.as_u64()).unwrap_or(ctx.preferences.default_chain_id);

        match self
            .store
            .create_dca_job(&ctx.user_id, from_token, to_token, amount, chain_id, frequency, ctx.wallet_address.as_deref())
            .await
        {
            Ok(job) => SkillResult::ok_with_data(format!("created DCA job {}", job.id), serde_json::to_value(&job).unwrap_or(json!({}))),
            Err(err) => SkillResult::fail(format!("could not create DCA job: {err}")),
        }
    }

    async fn list(&self, ctx: &SkillContext) -> SkillResult {
        match self.store.list_user_dca_jobs(&ctx.user_id).await {
            Ok(jobs) if jobs.is_empty() => SkillResult::ok("no DCA jobs"),
            Ok(jobs) => SkillResult::ok_with_data(format!("{} DCA job(s)", jobs.len()), serde_json::to_value(&jobs).unwrap_or(json!([]))),
            Err(err) => SkillResult::fail(format!("could not list DCA jobs: {err}")),
        }
    }

    async fn set_status(&self, params: &Value, status: DcaStatus) -> SkillResult {
        let Some(job_id) = params.get("job_id").and_then(|v| v.as_i64()) else {
            return SkillResult::fail("job_id: must be an integer");
        };
        match self.store.set_dca_status(job_id, status).await {
            Ok(()) => SkillResult::ok(format!("DCA job {job_id} set to {status:?}")),
            Err(err) => SkillResult::fail(format!("could not update DCA job {job_id}: {err}")),
        }
    }
}
