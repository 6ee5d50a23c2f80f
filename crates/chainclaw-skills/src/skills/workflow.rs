//! `workflow` skill (spec.md §4.1): executes an ordered list of
//! `(skillName, params)` steps sequentially. Refuses to nest `workflow`
//! inside itself; stops at the first failing step and returns a partial
//! result including every completed step.

use async_trait::async_trait;
use chainclaw_types::skill::{Skill, SkillContext, SkillResult};
use serde_json::{json, Value};

use crate::registry::SkillRegistry;

/// Upper bound on steps per workflow invocation (spec.md §8: "with 11
/// steps likewise" rejected).
const MAX_STEPS: usize = 10;

pub struct WorkflowSkill {
    registry: SkillRegistry,
}

impl WorkflowSkill {
    pub fn new(registry: SkillRegistry) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Skill for WorkflowSkill {
    fn name(&self) -> &'static str {
        "workflow"
    }

    fn description(&self) -> &'static str {
        "Runs a sequence of other skills as one ordered workflow, stopping on the first failure."
    }

    fn parameter_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "steps": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "skill": {"type": "string"},
                            "params": {"type": "object"}
                        },
                        "required": ["skill"]
                    }
                }
            },
            "required": ["steps"]
        })
    }

    async fn execute(&self, params: Value, ctx: &SkillContext) -> SkillResult {
        let Some(steps) = params.get("steps").and_then(|v| v.as_array()) else {
            return SkillResult::fail("steps: must be an array");
        };
        if steps.is_empty() {
            return SkillResult::fail("steps: must not be empty");
        }
        if steps.len() > MAX_STEPS {
            return SkillResult::fail(format!("steps: must not exceed {MAX_STEPS} steps"));
        }

        let total = steps.len();
        let mut completed = Vec::new();
        for (i, step) in steps.iter().enumerate() {
            let Some(skill_name) = step.get("skill").and_then(|v| v.as_str()) else {
                return SkillResult::fail(format!("steps[{i}].skill: must be a string"));
            };
            if skill_name == "workflow" {
                return SkillResult::fail("workflow: a workflow cannot nest itself");
            }
            let Some(skill) = self.registry.get(skill_name).await else {
                return SkillResult::fail(format!("steps[{i}].skill: unknown skill '{skill_name}'"));
            };
            let step_params = step.get("params").cloned().unwrap_or(json!({}));
            let result = skill.execute(step_params, ctx).await;
            let succeeded = result.success;
            if !succeeded {
                return SkillResult {
                    success: false,
                    message: format!("Workflow Stopped: {i}/{total} steps completed (failed at '{skill_name}')"),
                    data: Some(json!({"completed": completed})),
                };
            }
            completed.push(json!({"skill": skill_name, "result": result}));
        }

        SkillResult::ok_with_data(format!("workflow completed all {} step(s)", completed.len()), json!({"completed": completed}))
    }
}
