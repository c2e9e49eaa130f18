//! Core records: projects, ideas and the connections between them.
//!
//! With the `typescript` feature enabled, these types can be exported to TypeScript
//! using ts-rs so the canvas frontend shares the same shapes.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Crystallization stage of an idea.
///
/// Variants are declared in lifecycle order, so the derived `Ord` is the
/// forward direction of the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum IdeaStatus {
    /// Something resonates, not yet articulated
    Resonance,
    /// Articulated idea
    Idea,
    /// Testable claim backed by a validation
    Hypothesis,
    /// Actionable work, terminal for this state machine
    Task,
}

impl IdeaStatus {
    /// All stages in forward order.
    pub const ALL: [IdeaStatus; 4] = [
        IdeaStatus::Resonance,
        IdeaStatus::Idea,
        IdeaStatus::Hypothesis,
        IdeaStatus::Task,
    ];

    /// The immediate successor, or `None` at the terminal stage.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Resonance => Some(Self::Idea),
            Self::Idea => Some(Self::Hypothesis),
            Self::Hypothesis => Some(Self::Task),
            Self::Task => None,
        }
    }

    /// Whether no further transition exists.
    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resonance => "resonance",
            Self::Idea => "idea",
            Self::Hypothesis => "hypothesis",
            Self::Task => "task",
        }
    }

    /// Parse a stage name (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
    }
}

impl Default for IdeaStatus {
    fn default() -> Self {
        Self::Resonance
    }
}

impl fmt::Display for IdeaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Position of an idea on the 2-D canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct CanvasPosition {
    pub x: f64,
    pub y: f64,
}

impl CanvasPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// An idea on a project's canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Idea {
    /// Unique identifier
    pub id: String,
    /// Owning project
    pub project_id: String,
    /// Short title
    pub title: String,
    /// Free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Crystallization stage
    #[serde(default)]
    pub status: IdeaStatus,
    /// Reasoning engine's confidence from the last validation (0.0 - 1.0)
    #[serde(default)]
    pub reasoned_confidence: Option<f64>,
    /// Calibrated forecaster's probability from the last validation (0.0 - 1.0)
    #[serde(default)]
    pub calibrated_confidence: Option<f64>,
    /// Why the last validation landed where it did
    #[serde(default)]
    pub reasoning_text: Option<String>,
    /// Idea this one crystallized from. Lookup only, never ownership.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// Canvas coordinates
    #[serde(default)]
    pub position: CanvasPosition,
    /// When the idea was created
    pub created_at: DateTime<Utc>,
    /// When the idea last changed
    pub updated_at: DateTime<Utc>,
}

impl Idea {
    /// Create an idea captured directly by the user (starts at `idea`).
    pub fn captured(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::with_status(project_id, title, IdeaStatus::Idea)
    }

    /// Create an idea surfaced by exploration (starts at `resonance`).
    pub fn resonance(project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::with_status(project_id, title, IdeaStatus::Resonance)
    }

    fn with_status(
        project_id: impl Into<String>,
        title: impl Into<String>,
        status: IdeaStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            title: title.into(),
            description: None,
            status,
            reasoned_confidence: None,
            calibrated_confidence: None,
            reasoning_text: None,
            parent_id: None,
            position: CanvasPosition::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Builder: set description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Builder: set parent idea.
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Builder: set canvas position.
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = CanvasPosition::new(x, y);
        self
    }

    /// The claim submitted for validation: title, plus description when present.
    pub fn claim(&self) -> String {
        match self.description.as_deref().map(str::trim) {
            Some(description) if !description.is_empty() => {
                format!("{}: {}", self.title.trim(), description)
            }
            _ => self.title.trim().to_string(),
        }
    }

    /// Record the outcome of a validation. Confidences are clamped to [0, 1].
    pub fn record_confidences(
        &mut self,
        reasoned: f64,
        calibrated: Option<f64>,
        reasoning: impl Into<String>,
    ) {
        self.reasoned_confidence = Some(reasoned.clamp(0.0, 1.0));
        self.calibrated_confidence = calibrated.map(|c| c.clamp(0.0, 1.0));
        self.reasoning_text = Some(reasoning.into());
        self.touch();
    }

    /// Preferred confidence for display: calibrated when present, else reasoned.
    pub fn display_confidence(&self) -> Option<f64> {
        self.calibrated_confidence.or(self.reasoned_confidence)
    }

    /// Whether stored confidences respect the [0, 1] invariant.
    pub fn confidences_in_range(&self) -> bool {
        [self.reasoned_confidence, self.calibrated_confidence]
            .into_iter()
            .flatten()
            .all(|c| (0.0..=1.0).contains(&c))
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// A labelled edge between two ideas of the same project.
///
/// Stored as source → target, but carries no direction in meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Connection {
    /// Unique identifier
    pub id: String,
    /// Source idea
    pub source_id: String,
    /// Target idea
    pub target_id: String,
    /// Optional edge label
    #[serde(default)]
    pub label: Option<String>,
    /// When the connection was drawn
    pub created_at: DateTime<Utc>,
}

impl Connection {
    /// Create a new connection.
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            label: None,
            created_at: Utc::now(),
        }
    }

    /// Builder: set label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Whether the given idea is one of the endpoints.
    pub fn touches(&self, idea_id: &str) -> bool {
        self.source_id == idea_id || self.target_id == idea_id
    }
}

/// A project with a goal (e.g. "100M ARR by 2027") and discovered context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Project {
    /// Unique identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// What the project is working toward
    #[serde(default)]
    pub goal: Option<String>,
    /// Question → answer pairs gathered by context discovery
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// How much of the needed context is known (0.0 - 1.0)
    #[serde(default)]
    pub context_completeness: f64,
    /// When the project was created
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Create a new project.
    pub fn new(name: impl Into<String>, goal: Option<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            goal: goal.filter(|g| !g.trim().is_empty()),
            context: BTreeMap::new(),
            context_completeness: 0.0,
            created_at: Utc::now(),
        }
    }

    /// Goal text for prompts, with a neutral fallback.
    pub fn goal_or_default(&self) -> &str {
        self.goal
            .as_deref()
            .filter(|g| !g.trim().is_empty())
            .unwrap_or("achieving strategic objectives")
    }
}

/// Field changes for a project. `None` leaves a field alone; a blank goal
/// clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ProjectUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
}

impl ProjectUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.goal.is_none()
    }

    /// Apply to `project`. The name must already be known non-blank.
    pub fn apply_to(&self, project: &mut Project) {
        if let Some(name) = &self.name {
            project.name = name.trim().to_string();
        }
        if let Some(goal) = &self.goal {
            project.goal = non_blank(goal);
        }
    }
}

/// Field changes for an idea. Status is not here: it only moves through
/// crystallization. A blank description or parent clears it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct IdeaUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub position: Option<CanvasPosition>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl IdeaUpdate {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.position.is_none()
            && self.parent_id.is_none()
    }

    /// The parent this update links to, if it sets one.
    pub fn new_parent(&self) -> Option<&str> {
        self.parent_id.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }

    /// Apply to `idea`. Title and parent must already be checked.
    pub fn apply_to(&self, idea: &mut Idea) {
        if let Some(title) = &self.title {
            idea.title = title.trim().to_string();
        }
        if let Some(description) = &self.description {
            idea.description = non_blank(description);
        }
        if let Some(position) = self.position {
            idea.position = position;
        }
        if let Some(parent_id) = &self.parent_id {
            idea.parent_id = non_blank(parent_id);
        }
        idea.touch();
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
