use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::executor::AgentAction;
use crate::llm::VisionClient;

use super::observer::Observation;

/// One planned interaction plus what the agent expects to see afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedStep {
    pub action: AgentAction,
    pub expected_state: String,
    #[serde(default)]
    pub expected_elements: Vec<String>,
    /// A confirmed prediction on this step achieves the current goal.
    #[serde(default)]
    pub completes_goal: bool,
}

impl PlannedStep {
    pub fn new(action: AgentAction, expected_state: impl Into<String>) -> Self {
        Self {
            action,
            expected_state: expected_state.into(),
            expected_elements: Vec::new(),
            completes_goal: false,
        }
    }

    pub fn expecting(mut self, elements: &[&str]) -> Self {
        self.expected_elements = elements.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn completing_goal(mut self) -> Self {
        self.completes_goal = true;
        self
    }
}

pub struct PlanningContext<'a> {
    pub goal: &'a str,
    pub observation: &'a Observation,
    pub iteration: u32,
    pub last_result: Option<&'a str>,
}

/// Supplies the next step of a run. `Ok(None)` ends the run.
#[async_trait]
pub trait StepPlanner: Send + Sync {
    async fn next_step(&self, context: &PlanningContext<'_>) -> Result<Option<PlannedStep>>;
}

/// Replays a fixed list of steps in order.
#[derive(Debug, Default)]
pub struct ScriptedPlanner {
    steps: Mutex<VecDeque<PlannedStep>>,
}

impl ScriptedPlanner {
    pub fn new(steps: impl IntoIterator<Item = PlannedStep>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
        }
    }

    pub fn remaining(&self) -> usize {
        match self.steps.lock() {
            Ok(steps) => steps.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[async_trait]
impl StepPlanner for ScriptedPlanner {
    async fn next_step(&self, _context: &PlanningContext<'_>) -> Result<Option<PlannedStep>> {
        let mut steps = match self.steps.lock() {
            Ok(steps) => steps,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(steps.pop_front())
    }
}

/// Asks the language model for the next step as a JSON object.
pub struct LlmPlanner {
    client: VisionClient,
}

impl LlmPlanner {
    pub fn new(client: VisionClient) -> Self {
        Self { client }
    }

    fn prompt(context: &PlanningContext<'_>) -> String {
        format!(
            "You operate a mobile app by touch.\n\
             Goal: {goal}\n\
             Current screen: {state}\n\
             Visible labels: {labels}\n\
             Last result: {last}\n\n\
             Reply with one JSON object and nothing else:\n\
             {{\"action\": {{\"type\": \"tap\", \"label\": \"...\"}} | {{\"type\": \"tap_icon\", \"name\": \"...\"}} | \
             {{\"type\": \"type\", \"text\": \"...\", \"field\": \"...\"}} | {{\"type\": \"swipe\", \"from\": \"...\", \"to\": \"...\"}} | \
             {{\"type\": \"wait\", \"duration_ms\": 1000}},\n\
             \"expected_state\": \"screen name after the action\", \"expected_elements\": [\"...\"], \"completes_goal\": false}}\n\
             If the goal is already reached reply {{\"done\": true}}.",
            goal = context.goal,
            state = context.observation.state,
            labels = context.observation.elements.join(", "),
            last = context.last_result.unwrap_or("none"),
        )
    }
}

#[async_trait]
impl StepPlanner for LlmPlanner {
    async fn next_step(&self, context: &PlanningContext<'_>) -> Result<Option<PlannedStep>> {
        let reply = self
            .client
            .generate(&Self::prompt(context), None)
            .await
            .context("planner model request failed")?;
        parse_planner_reply(&reply)
    }
}

/// Extracts the first balanced JSON object from a model reply.
pub fn parse_planner_reply(reply: &str) -> Result<Option<PlannedStep>> {
    let Some(json) = first_json_object(reply) else {
        bail!("planner reply contains no JSON object: {reply}");
    };
    let value: serde_json::Value =
        serde_json::from_str(json).context("planner reply is not valid JSON")?;
    if value.get("done").and_then(serde_json::Value::as_bool) == Some(true) {
        return Ok(None);
    }
    let step = serde_json::from_value(value).context("planner reply is not a step")?;
    Ok(Some(step))
}

fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}
