//! Exploration and planning prompts.
//!
//! Both run against the reasoning backend and share its strictness: the
//! reply must be a JSON array of the expected records.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::backend::traits::{CompletionRequest, LlmBackend};
use crate::reasoning::DEFAULT_REASONING_TIMEOUT;
use crate::response::{excerpt, parse_json};
use crate::service::ServiceError;

#[cfg(feature = "typescript")]
use ts_rs::TS;

const MAX_EXPLORED: usize = 5;
const MAX_ACTIONS: usize = 7;

/// A nascent idea proposed while exploring a problem space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ExploredIdea {
    pub title: String,
    pub description: String,
    pub why_relevant: String,
}

/// Rough size of a plan action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    /// Under a day
    Low,
    /// One to five days
    Medium,
    /// More than five days
    High,
}

/// One step of an action plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PlanAction {
    pub action: String,
    pub why: String,
    pub effort: Effort,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

async fn ask(
    backend: &Arc<dyn LlmBackend>,
    timeout: Duration,
    max_tokens: u32,
    prompt: String,
) -> Result<String, ServiceError> {
    let request = CompletionRequest::user(prompt).with_max_tokens(max_tokens);
    let response = tokio::time::timeout(timeout, backend.complete(request))
        .await
        .map_err(|_| ServiceError::Timeout(timeout))??;
    debug!(backend = backend.id(), response_chars = response.content.len(), "Strategy reply");
    Ok(response.content)
}

/// Generates nascent ideas for a problem space.
pub struct Explorer {
    backend: Arc<dyn LlmBackend>,
    timeout: Duration,
    max_tokens: u32,
}

impl Explorer {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_REASONING_TIMEOUT,
            max_tokens: 1024,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn build_prompt(exploration: &str, goal: &str, context: Option<&str>) -> String {
        let mut prompt = String::new();

        prompt.push_str(&format!("You are a strategic advisor helping identify paths to: {}\n\n", goal));
        prompt.push_str(&format!("The user wants to explore: {}\n", exploration));
        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            prompt.push_str(&format!("\nWhat is known so far:\n{}\n", context));
        }

        prompt.push_str("\nGenerate 3-5 nascent ideas worth investigating. For each:\n");
        prompt.push_str("- title: concise name (3-6 words)\n");
        prompt.push_str("- description: 2-3 sentences on what this is\n");
        prompt.push_str("- why_relevant: one sentence on how it connects to the goal\n\n");
        prompt.push_str(
            "Be creative but grounded. These are starting points for exploration, not complete \
             solutions. Look for non-obvious angles, underexplored opportunities, and strategic \
             leverage points.\n\n",
        );
        prompt.push_str("Return ONLY a JSON array, no other text:\n");
        prompt.push_str("[{\"title\": \"...\", \"description\": \"...\", \"why_relevant\": \"...\"}]\n");

        prompt
    }

    /// Explore a problem space in service of `goal`.
    pub async fn explore(
        &self,
        exploration: &str,
        goal: &str,
        context: Option<&str>,
    ) -> Result<Vec<ExploredIdea>, ServiceError> {
        let text = ask(
            &self.backend,
            self.timeout,
            self.max_tokens,
            Self::build_prompt(exploration, goal, context),
        )
        .await?;

        let mut ideas: Vec<ExploredIdea> = parse_json(&text)
            .map_err(|e| ServiceError::Exploration(format!("{e} (reply: {})", excerpt(&text, 200))))?;

        ideas.retain(|idea| !idea.title.trim().is_empty());
        if ideas.is_empty() {
            return Err(ServiceError::Exploration("no ideas returned".to_string()));
        }
        ideas.truncate(MAX_EXPLORED);

        info!(count = ideas.len(), "Exploration produced ideas");
        Ok(ideas)
    }
}

/// Turns a validated idea into concrete next actions.
pub struct Planner {
    backend: Arc<dyn LlmBackend>,
    timeout: Duration,
    max_tokens: u32,
}

impl Planner {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_REASONING_TIMEOUT,
            max_tokens: 1024,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn build_prompt(idea: &str, goal: &str, constraints: Option<&str>) -> String {
        let mut prompt = String::new();

        prompt.push_str("Create an action plan to execute this idea.\n\n");
        prompt.push_str(&format!("Goal: {}\n", goal));
        prompt.push_str(&format!("Validated idea: {}\n", idea));
        if let Some(constraints) = constraints.filter(|c| !c.trim().is_empty()) {
            prompt.push_str(&format!("Constraints: {}\n", constraints));
        }

        prompt.push_str("\nGenerate 3-7 concrete next actions. For each:\n");
        prompt.push_str("- action: specific, measurable step (starts with a verb)\n");
        prompt.push_str("- why: one sentence on how it advances toward the goal\n");
        prompt.push_str("- effort: \"low\" (< 1 day), \"medium\" (1-5 days), or \"high\" (> 5 days)\n");
        prompt.push_str("- dependencies: list of actions that must happen first (empty list if none)\n\n");
        prompt.push_str("Requirements:\n");
        prompt.push_str("- First action should be doable THIS WEEK\n");
        prompt.push_str(
            "- Actions should be concrete, not vague (\"Talk to 5 potential customers\" not \
             \"Do market research\")\n",
        );
        prompt.push_str("- Order by priority/sequence\n\n");
        prompt.push_str("Return ONLY a JSON array, no other text:\n");
        prompt.push_str(
            "[{\"action\": \"...\", \"why\": \"...\", \"effort\": \"low|medium|high\", \"dependencies\": []}]\n",
        );

        prompt
    }

    /// Plan the execution of `idea` toward `goal`.
    pub async fn plan(
        &self,
        idea: &str,
        goal: &str,
        constraints: Option<&str>,
    ) -> Result<Vec<PlanAction>, ServiceError> {
        let text = ask(
            &self.backend,
            self.timeout,
            self.max_tokens,
            Self::build_prompt(idea, goal, constraints),
        )
        .await?;

        let mut actions: Vec<PlanAction> = parse_json(&text)
            .map_err(|e| ServiceError::Planning(format!("{e} (reply: {})", excerpt(&text, 200))))?;

        if actions.is_empty() {
            return Err(ServiceError::Planning("no actions returned".to_string()));
        }
        actions.truncate(MAX_ACTIONS);

        info!(count = actions.len(), "Plan produced actions");
        Ok(actions)
    }
}
