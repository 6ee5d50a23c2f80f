//! `agent` skill (spec.md §4.1): CRUD-like facade over the Agent Runner
//! (spec.md §4.9) — list available strategies, start/pause/resume/stop a
//! running instance, list running instances.

use std::sync::Arc;

use async_trait::async_trait;
use chainclaw_strategy::{AgentRunner, StrategyRegistry};
use chainclaw_types::agent::AgentMode;
use chainclaw_types::skill::{Skill, SkillContext, SkillResult};
use serde_json::{json, Value};

pub struct AgentSkill {
    registry: StrategyRegistry,
    runner: AgentRunner,
}

impl AgentSkill {
    pub fn new(registry: StrategyRegistry, runner: AgentRunner) -> Self {
        Self { registry, runner }
    }
}

#[async_trait]
impl Skill for AgentSkill {
    fn name(&self) -> &'static str {
        "agent"
    }

    fn description(&self) -> &'static str {
        "Lists available trading agent strategies and controls running instances."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {"type": "string", "enum": ["list_strategies", "start", "pause", "resume", "stop", "list_running"]},
                "agent_name": {"type": "string"},
                "agent_version": {"type": "string"},
                "mode": {"type": "string", "enum": ["dry_run", "live"]},
                "instance_id": {"type": "string"},
                "config_options": {"type": "object"}
            },
            "required": ["action"]
        })
    }

    async fn execute(&self, params: Value, ctx: &SkillContext) -> SkillResult {
        let action = params.get("action").and_then(|v| v.as_str()).unwrap_or("list_strategies");
        match action {
            "list_strategies" => {
                let defs = self.registry.list().await;
                SkillResult::ok_with_data(format!("{} strategy(ies) available", defs.len()), serde_json::to_value(&defs).unwrap_or(json!([])))
            }
            "start" => self.start(&params, ctx).await,
            "pause" => self.toggle(&params, Toggle::Pause).await,
            "resume" => self.toggle(&params, Toggle::Resume).await,
            "stop" => self.toggle(&params, Toggle::Stop).await,
            "list_running" => {
                let running: Vec<_> =
                    self.runner.list_running().await.into_iter().filter(|i| i.user_id == ctx.user_id).collect();
                SkillResult::ok_with_data(format!("{} running instance(s)", running.len()), serde_json::to_value(&running).unwrap_or(json!([])))
            }
            other => SkillResult::fail(format!("action: unknown action '{other}'")),
        }
    }
}

enum Toggle {
    Pause,
    Resume,
    Stop,
}

impl AgentSkill {
    async fn start(&self, params: &Value, ctx: &SkillContext) -> SkillResult {
        let Some(agent_name) = params.get("agent_name").and_then(|v| v.as_str()) else {
            return SkillResult::fail("agent_name: must be a string");
        };
        let agent_version = params.get("agent_version").and_then(|v| v.as_str()).unwrap_or("1.0.0");
        let mode = match params.get("mode").and_then(|v| v.as_str()) {
            Some("live") => AgentMode::Live,
            _ => AgentMode::DryRun,
        };
        let Some(strategy) = self.registry.get(agent_name, agent_version).await else {
            return SkillResult::fail(format!("no strategy registered for {agent_name} {agent_version}"));
        };
        let config_options = params.get("config_options").cloned().unwrap_or(json!({}));
        match self.runner.start_agent(strategy.definition, &ctx.user_id, mode, config_options).await {
            Ok(id) => SkillResult::ok_with_data(format!("started agent instance {id}"), json!({"instance_id": id})),
            Err(err) => SkillResult::fail(err.to_string()),
        }
    }

    async fn toggle(&self, params: &Value, action: Toggle) -> SkillResult {
        let Some(instance_id) = params.get("instance_id").and_then(|v| v.as_str()) else {
            return SkillResult::fail("instance_id: must be a string");
        };
        match action {
            Toggle::Pause => self.runner.pause_agent(instance_id).await,
            Toggle::Resume => self.runner.resume_agent(instance_id).await,
            Toggle::Stop => self.runner.stop_agent(instance_id).await,
        }
        SkillResult::ok(format!("agent instance {instance_id} updated"))
    }
}
