//! Team Delegation
//!
//! An agent with a team gets one extra tool, [`DelegateTool`], through which
//! the model hands a sub-task to a team member. The member runs its own,
//! independent loop on a fresh conversation; only its final response comes
//! back, as an ordinary tool result.
//!
//! Members are shared by reference. Nothing stops a member from delegating
//! back up the chain; each level is still bounded by its own iteration
//! budget, so a cyclic team recurses deeply but not forever.

use std::sync::{Arc, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AgentError, Result};
use crate::reasoning::Agent;
use crate::tool::{InputSchema, ParameterSchema, Tool, ToolInput, ToolOutput, ToolSchema};

/// Name under which the delegation tool is registered
pub const DELEGATE_TOOL_NAME: &str = "delegate_task";

const NO_DESCRIPTION: &str = "No description available";

/// Ordered list of agents a parent may delegate to
#[derive(Default)]
pub struct Team {
    members: RwLock<Vec<Arc<Agent>>>,
}

impl Team {
    pub fn new(members: Vec<Arc<Agent>>) -> Self {
        Self {
            members: RwLock::new(members),
        }
    }

    /// Append a member
    pub fn push(&self, member: Arc<Agent>) {
        self.members
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(member);
    }

    /// Member at `idx`
    pub fn get(&self, idx: usize) -> Option<Arc<Agent>> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(idx)
            .cloned()
    }

    /// Snapshot of the current members
    pub fn members(&self) -> Vec<Arc<Agent>> {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.members
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Tool that routes a task to `team[agent_idx]`
///
/// Owned by the agent whose team it routes to, never by a registry, so
/// agents sharing a registry keep separate teams. Holds the team weakly.
pub struct DelegateTool {
    team: Weak<Team>,
}

impl DelegateTool {
    pub fn new(team: &Arc<Team>) -> Self {
        Self {
            team: Arc::downgrade(team),
        }
    }

    fn member_lines(members: &[Arc<Agent>]) -> String {
        members
            .iter()
            .enumerate()
            .map(|(idx, member)| {
                let summary = member
                    .config()
                    .system_prompt
                    .as_deref()
                    .and_then(first_sentence)
                    .unwrap_or_else(|| NO_DESCRIPTION.to_string());
                format!("{idx}: {} - {summary}", member.name())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Delegate `task` to member `agent_idx` and return its final response
    pub async fn delegate(&self, task: &str, agent_idx: usize) -> Result<ToolOutput> {
        let team = self
            .team
            .upgrade()
            .ok_or_else(|| AgentError::NotAvailable("team is no longer available".into()))?;

        let size = team.len();
        if size == 0 {
            return Err(AgentError::NotAvailable("no team members to delegate to".into()));
        }

        let member = team.get(agent_idx).ok_or_else(|| {
            AgentError::InvalidArgument(format!(
                "agent_idx {agent_idx} is out of range, expected 0..{size}"
            ))
        })?;
        drop(team);

        tracing::info!(member = %member.name(), agent_idx, "Delegating task");
        let response = member.invoke(task).await?;
        ToolOutput::json(&response)
    }
}

#[async_trait]
impl Tool for DelegateTool {
    fn schema(&self) -> ToolSchema {
        let members = self.team.upgrade().map(|t| t.members()).unwrap_or_default();
        let indices: Vec<Value> = (0..members.len()).map(Value::from).collect();

        ToolSchema {
            name: DELEGATE_TOOL_NAME.into(),
            description: "Delegate a task to a member of your team. The member works on \
                          the task independently and returns its final answer."
                .into(),
            input_schema: InputSchema::new()
                .param(
                    ParameterSchema::string("task", "The task to hand to the team member")
                        .required(),
                )
                .param(
                    ParameterSchema::integer(
                        "agent_idx",
                        format!(
                            "Index of the team member to delegate to:\n{}",
                            Self::member_lines(&members)
                        ),
                    )
                    .required()
                    .with_enum(indices),
                ),
        }
    }

    // Range and availability are checked in `execute` so they surface as
    // InvalidArgument / NotAvailable rather than schema violations.
    fn validate(&self, _input: &ToolInput) -> Result<()> {
        Ok(())
    }

    async fn execute(&self, input: &ToolInput) -> Result<ToolOutput> {
        let task = input
            .get("task")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::InvalidArgument("task must be a string".into()))?;
        let agent_idx = parse_index(input.get("agent_idx"))?;

        self.delegate(task, agent_idx).await
    }
}

fn parse_index(value: Option<&Value>) -> Result<usize> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_u64(),
        Some(Value::String(s)) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    parsed
        .and_then(|idx| usize::try_from(idx).ok())
        .ok_or_else(|| {
            AgentError::InvalidArgument(format!(
                "agent_idx must be a non-negative integer, got {}",
                value.map_or_else(|| "nothing".to_string(), Value::to_string)
            ))
        })
}

/// First sentence of a prompt, trimmed
fn first_sentence(text: &str) -> Option<String> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    let mut chars = text.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            let at_boundary = chars.peek().is_none_or(|(_, next)| next.is_whitespace());
            if at_boundary {
                return Some(text[..i + c.len_utf8()].to_string());
            }
        }
    }

    Some(text.to_string())
}
