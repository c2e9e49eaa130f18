//! Workspace - the operations a user performs on projects and ideas.
//!
//! Glues the repository, context tracker, validation service and lifecycle
//! together. Every operation reads what it needs, does its (possibly slow)
//! work without holding anything, and commits once at the end. Dropping an
//! in-flight future therefore leaves the stored records exactly as they were.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use cc_agent::{PlanAction, ValidationResult, ValidationService};
use ideaspace::lifecycle::crystallize;
use ideaspace::{
    Connection, ContextPolicy, ContextTracker, CrystallizeTarget, Discovery, Idea, IdeaRepository,
    IdeaStatus, IdeaUpdate, IngestReport, LifecyclePolicy, Project, ProjectUpdate, Transition,
};

use crate::config::StrategistConfig;
use crate::error::{Result, StrategistError};

const EXPLORE_ORIGIN_X: f64 = 120.0;
const EXPLORE_ORIGIN_Y: f64 = 80.0;
const EXPLORE_SPACING: f64 = 240.0;

/// Result of validating an idea.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationOutcome {
    /// The idea as stored after validation
    pub idea: Idea,
    /// What the two sources said
    pub validation: ValidationResult,
    /// Automatic promotion, if any
    pub transition: Transition,
}

/// Result of an explicit crystallize.
#[derive(Debug, Clone, Serialize)]
pub struct CrystallizeOutcome {
    pub idea: Idea,
    pub transition: Transition,
}

/// Projects, ideas and the operations over them.
pub struct Workspace {
    repo: Arc<dyn IdeaRepository>,
    service: ValidationService,
    lifecycle: LifecyclePolicy,
    tracker: ContextTracker,
}

impl Workspace {
    /// Create a workspace with default policies.
    pub fn new(repo: Arc<dyn IdeaRepository>, service: ValidationService) -> Self {
        Self {
            repo,
            service,
            lifecycle: LifecyclePolicy::default(),
            tracker: ContextTracker::default(),
        }
    }

    /// Build from configuration, creating the backends it names.
    pub fn from_config(config: &StrategistConfig, repo: Arc<dyn IdeaRepository>) -> Result<Self> {
        config.validate()?;
        let service = ValidationService::new(config.reasoning_backend()?, config.forecaster_backend()?)
            .with_config(config.service_config());

        info!(
            forecaster = service.forecaster_enabled(),
            promotion_threshold = config.lifecycle.promotion_threshold,
            "Workspace ready"
        );

        Ok(Self::new(repo, service)
            .with_lifecycle(config.lifecycle)
            .with_context_policy(config.context))
    }

    /// Set the promotion policy.
    pub fn with_lifecycle(mut self, policy: LifecyclePolicy) -> Self {
        self.lifecycle = policy;
        self
    }

    /// Set the discovery policy.
    pub fn with_context_policy(mut self, policy: ContextPolicy) -> Self {
        self.tracker = ContextTracker::new(policy);
        self
    }

    pub fn repository(&self) -> &Arc<dyn IdeaRepository> {
        &self.repo
    }

    // ---- projects ----

    pub async fn create_project(&self, name: &str, goal: Option<String>) -> Result<Project> {
        let name = required(name, "project name")?;
        let project = Project::new(name, goal.map(|g| g.trim().to_string()));
        self.repo.put_project(project.clone()).await?;
        info!(project_id = %project.id, name = %project.name, "Project created");
        Ok(project)
    }

    pub async fn projects(&self) -> Vec<Project> {
        self.repo.projects().await
    }

    pub async fn project(&self, id: &str) -> Result<Project> {
        Ok(self.repo.project(id).await?)
    }

    /// Rename a project or change its goal.
    pub async fn update_project(&self, id: &str, update: ProjectUpdate) -> Result<Project> {
        if let Some(name) = &update.name {
            required(name, "project name")?;
        }
        let mut project = self.repo.project(id).await?;
        if update.is_empty() {
            return Ok(project);
        }
        update.apply_to(&mut project);
        self.repo.put_project(project.clone()).await?;
        info!(project_id = %project.id, "Project updated");
        Ok(project)
    }

    /// Delete a project with its ideas and their connections.
    pub async fn delete_project(&self, id: &str) -> Result<()> {
        self.repo.delete_project(id).await?;
        info!(project_id = %id, "Project deleted");
        Ok(())
    }

    // ---- ideas ----

    /// Capture an idea directly. It starts at `idea`.
    ///
    /// A parent must be an idea of the same project.
    pub async fn capture_idea(
        &self,
        project_id: &str,
        title: &str,
        description: Option<String>,
        position: Option<(f64, f64)>,
        parent_id: Option<&str>,
    ) -> Result<Idea> {
        let title = required(title, "idea title")?;
        let project = self.repo.project(project_id).await?;

        let mut idea = Idea::captured(&project.id, title);
        if let Some(description) = description.filter(|d| !d.trim().is_empty()) {
            idea = idea.with_description(description.trim());
        }
        if let Some((x, y)) = position {
            idea = idea.at(x, y);
        }
        if let Some(parent_id) = parent_id.map(str::trim).filter(|p| !p.is_empty()) {
            self.check_parent(&idea, parent_id).await?;
            idea = idea.with_parent(parent_id);
        }

        self.repo.put_idea(idea.clone()).await?;
        info!(idea_id = %idea.id, project_id = %project.id, "Idea captured");
        Ok(idea)
    }

    pub async fn ideas(&self, project_id: &str) -> Result<Vec<Idea>> {
        self.repo.project(project_id).await?;
        Ok(self.repo.ideas_for_project(project_id).await)
    }

    pub async fn idea(&self, id: &str) -> Result<Idea> {
        Ok(self.repo.idea(id).await?)
    }

    /// Edit an idea's title, description, canvas position or parent.
    ///
    /// Status never changes here; use [`Workspace::crystallize`].
    pub async fn update_idea(&self, id: &str, update: IdeaUpdate) -> Result<Idea> {
        if let Some(title) = &update.title {
            required(title, "idea title")?;
        }
        let mut idea = self.repo.idea(id).await?;
        if update.is_empty() {
            return Ok(idea);
        }
        if let Some(parent_id) = update.new_parent() {
            self.check_parent(&idea, parent_id).await?;
        }
        update.apply_to(&mut idea);
        self.repo.put_idea(idea.clone()).await?;
        debug!(idea_id = %idea.id, "Idea updated");
        Ok(idea)
    }

    async fn check_parent(&self, idea: &Idea, parent_id: &str) -> Result<()> {
        if parent_id == idea.id {
            return Err(StrategistError::InvalidInput(format!(
                "idea {} cannot be its own parent",
                idea.id
            )));
        }
        let parent = self.repo.idea(parent_id).await?;
        if parent.project_id != idea.project_id {
            return Err(StrategistError::InvalidInput(format!(
                "parent {} belongs to a different project",
                parent.id
            )));
        }
        Ok(())
    }

    /// Delete an idea and its connections. Returns the connections removed.
    pub async fn delete_idea(&self, id: &str) -> Result<usize> {
        let removed = self.repo.delete_idea(id).await?;
        info!(idea_id = %id, connections = removed, "Idea deleted");
        Ok(removed)
    }

    /// Connect two ideas of the same project.
    pub async fn connect(
        &self,
        source_id: &str,
        target_id: &str,
        label: Option<String>,
    ) -> Result<Connection> {
        let mut connection = Connection::new(source_id, target_id);
        if let Some(label) = label.filter(|l| !l.trim().is_empty()) {
            connection = connection.with_label(label.trim());
        }
        self.repo
            .put_connection(connection.clone())
            .await
            .map_err(|e| match e {
                ideaspace::StoreError::Invalid(msg) => StrategistError::InvalidInput(msg),
                other => other.into(),
            })?;
        debug!(connection_id = %connection.id, "Ideas connected");
        Ok(connection)
    }

    pub async fn connections(&self, project_id: &str) -> Result<Vec<Connection>> {
        self.repo.project(project_id).await?;
        Ok(self.repo.connections_for_project(project_id).await)
    }

    pub async fn disconnect(&self, connection_id: &str) -> Result<()> {
        Ok(self.repo.delete_connection(connection_id).await?)
    }

    // ---- lifecycle ----

    /// Validate an idea against both sources and apply automatic promotion.
    ///
    /// Nothing is written unless validation succeeds.
    pub async fn validate_idea(&self, idea_id: &str) -> Result<ValidationOutcome> {
        let idea = self.repo.idea(idea_id).await?;
        let project = self.repo.project(&idea.project_id).await?;
        let context = self.tracker.render_context(&project);

        let validation = self.service.validate(&idea.claim(), context.as_deref()).await?;

        // Re-read so edits made while the backends were busy are kept.
        let mut idea = self.repo.idea(idea_id).await?;
        idea.record_confidences(
            validation.reasoned_confidence(),
            validation.calibrated_confidence(),
            validation.reasoning.clone(),
        );
        let transition = self
            .lifecycle
            .promote(&mut idea, validation.primary_confidence());

        self.repo.put_idea(idea.clone()).await?;
        info!(
            idea_id = %idea.id,
            confidence = validation.primary_confidence(),
            status = %idea.status,
            "Idea validated"
        );

        Ok(ValidationOutcome {
            idea,
            validation,
            transition,
        })
    }

    /// Explicitly move an idea forward.
    pub async fn crystallize(&self, idea_id: &str, target: CrystallizeTarget) -> Result<CrystallizeOutcome> {
        let mut idea = self.repo.idea(idea_id).await?;
        let transition = crystallize(&mut idea, target)?;
        if transition.is_advanced() {
            self.repo.put_idea(idea.clone()).await?;
        }
        Ok(CrystallizeOutcome { idea, transition })
    }

    // ---- context ----

    /// Next clarifying questions for a project.
    pub async fn discover(&self, project_id: &str) -> Result<Discovery> {
        let project = self.repo.project(project_id).await?;
        Ok(self.tracker.discover(&project))
    }

    /// Fold answers into a project's context.
    pub async fn ingest(&self, project_id: &str, answers: &BTreeMap<String, String>) -> Result<IngestReport> {
        let mut project = self.repo.project(project_id).await?;
        let report = self.tracker.ingest(&mut project, answers);
        self.repo.put_project(project).await?;
        debug!(project_id = %project_id, accepted = report.accepted, "Context ingested");
        Ok(report)
    }

    // ---- exploration and planning ----

    /// Explore a problem space. The ideas found are stored at `resonance`.
    pub async fn explore(&self, project_id: &str, exploration: &str) -> Result<Vec<Idea>> {
        let exploration = required(exploration, "exploration prompt")?;
        let project = self.repo.project(project_id).await?;
        let context = self.tracker.render_context(&project);

        let explored = self
            .service
            .explorer()
            .explore(exploration, project.goal_or_default(), context.as_deref())
            .await?;

        let ideas: Vec<Idea> = explored
            .into_iter()
            .enumerate()
            .map(|(i, found)| {
                let description = format!(
                    "{}\n\nWhy relevant: {}",
                    found.description.trim(),
                    found.why_relevant.trim()
                );
                Idea::resonance(&project.id, found.title.trim())
                    .with_description(description)
                    .at(EXPLORE_ORIGIN_X + EXPLORE_SPACING * i as f64, EXPLORE_ORIGIN_Y)
            })
            .collect();
        self.repo.put_ideas(ideas.clone()).await?;

        info!(project_id = %project.id, count = ideas.len(), "Exploration stored");
        Ok(ideas)
    }

    /// Plan the execution of an idea. The idea must be at least a hypothesis.
    pub async fn plan(&self, idea_id: &str, constraints: Option<&str>) -> Result<Vec<PlanAction>> {
        let idea = self.repo.idea(idea_id).await?;
        if idea.status < IdeaStatus::Hypothesis {
            return Err(StrategistError::InvalidInput(format!(
                "idea {} is at {}; only hypotheses and tasks can be planned",
                idea.id, idea.status
            )));
        }
        let project = self.repo.project(&idea.project_id).await?;

        Ok(self
            .service
            .planner()
            .plan(&idea.claim(), project.goal_or_default(), constraints)
            .await?)
    }
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(StrategistError::InvalidInput(format!("{what} must not be empty")));
    }
    Ok(trimmed)
}
