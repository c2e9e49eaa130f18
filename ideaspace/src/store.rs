//! Record storage.
//!
//! Persistence sits behind [`IdeaRepository`] so the lifecycle and context
//! logic never depends on a particular database. [`MemoryRepository`] keeps
//! everything in memory behind a single lock, which makes every put and every
//! cascading delete atomic, and can round-trip its contents through a JSON
//! snapshot file.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::types::{Connection, Idea, Project};

/// Error types for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Record not found
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Record violates an invariant
    #[error("Invalid record: {0}")]
    Invalid(String),

    /// Snapshot could not be read or written
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be encoded or decoded
    #[error("Snapshot format error: {0}")]
    Format(#[from] serde_json::Error),
}

impl StoreError {
    fn not_found(kind: &'static str, id: &str) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

/// Storage boundary for projects, ideas and connections.
///
/// Writes are last-write-wins; every call commits atomically.
#[async_trait]
pub trait IdeaRepository: Send + Sync {
    /// Insert or replace a project.
    async fn put_project(&self, project: Project) -> Result<(), StoreError>;

    /// Get a project by ID.
    async fn project(&self, id: &str) -> Result<Project, StoreError>;

    /// All projects, newest first.
    async fn projects(&self) -> Vec<Project>;

    /// Delete a project with its ideas and their connections.
    async fn delete_project(&self, id: &str) -> Result<(), StoreError>;

    /// Insert or replace an idea. The owning project must exist.
    async fn put_idea(&self, idea: Idea) -> Result<(), StoreError>;

    /// Insert or replace several ideas in one commit. Either all are stored
    /// or none are.
    async fn put_ideas(&self, ideas: Vec<Idea>) -> Result<(), StoreError>;

    /// Get an idea by ID.
    async fn idea(&self, id: &str) -> Result<Idea, StoreError>;

    /// Ideas of a project, newest first.
    async fn ideas_for_project(&self, project_id: &str) -> Vec<Idea>;

    /// Delete an idea and every connection touching it.
    ///
    /// Returns the number of connections removed.
    async fn delete_idea(&self, id: &str) -> Result<usize, StoreError>;

    /// Insert a connection. Both endpoints must exist in the same project.
    async fn put_connection(&self, connection: Connection) -> Result<(), StoreError>;

    /// Connections with at least one endpoint in the project.
    async fn connections_for_project(&self, project_id: &str) -> Vec<Connection>;

    /// Delete a connection.
    async fn delete_connection(&self, id: &str) -> Result<(), StoreError>;
}

/// Serializable copy of a repository's contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub ideas: Vec<Idea>,
    #[serde(default)]
    pub connections: Vec<Connection>,
}

#[derive(Debug, Default)]
struct Records {
    projects: HashMap<String, Project>,
    ideas: HashMap<String, Idea>,
    connections: HashMap<String, Connection>,
}

/// In-memory repository.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    records: Arc<RwLock<Records>>,
}

impl MemoryRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository holding a snapshot's records.
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let records = Records {
            projects: snapshot
                .projects
                .into_iter()
                .map(|p| (p.id.clone(), p))
                .collect(),
            ideas: snapshot.ideas.into_iter().map(|i| (i.id.clone(), i)).collect(),
            connections: snapshot
                .connections
                .into_iter()
                .map(|c| (c.id.clone(), c))
                .collect(),
        };
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }

    /// Copy the current contents.
    pub async fn snapshot(&self) -> Snapshot {
        let records = self.records.read().await;
        let mut snapshot = Snapshot {
            projects: records.projects.values().cloned().collect(),
            ideas: records.ideas.values().cloned().collect(),
            connections: records.connections.values().cloned().collect(),
        };
        snapshot.projects.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        snapshot.ideas.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        snapshot
            .connections
            .sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        snapshot
    }

    /// Load a snapshot file. A missing file yields an empty repository.
    pub async fn load_snapshot(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if !tokio::fs::try_exists(path).await? {
            tracing::debug!(path = %path.display(), "No snapshot, starting empty");
            return Ok(Self::new());
        }
        let bytes = tokio::fs::read(path).await?;
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        tracing::debug!(
            path = %path.display(),
            projects = snapshot.projects.len(),
            ideas = snapshot.ideas.len(),
            "Loaded snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write the current contents to a snapshot file.
    pub async fn save_snapshot(&self, path: impl AsRef<Path>) -> Result<(), StoreError> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(&self.snapshot().await)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, json).await?;
        Ok(())
    }
}

#[async_trait]
impl IdeaRepository for MemoryRepository {
    async fn put_project(&self, project: Project) -> Result<(), StoreError> {
        if !(0.0..=1.0).contains(&project.context_completeness) {
            return Err(StoreError::Invalid(format!(
                "context completeness {} outside [0, 1]",
                project.context_completeness
            )));
        }
        let mut records = self.records.write().await;
        records.projects.insert(project.id.clone(), project);
        Ok(())
    }

    async fn project(&self, id: &str) -> Result<Project, StoreError> {
        let records = self.records.read().await;
        records
            .projects
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Project", id))
    }

    async fn projects(&self) -> Vec<Project> {
        let records = self.records.read().await;
        let mut projects: Vec<Project> = records.projects.values().cloned().collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        projects
    }

    async fn delete_project(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        if records.projects.remove(id).is_none() {
            return Err(StoreError::not_found("Project", id));
        }

        let idea_ids: Vec<String> = records
            .ideas
            .values()
            .filter(|i| i.project_id == id)
            .map(|i| i.id.clone())
            .collect();
        for idea_id in &idea_ids {
            records.ideas.remove(idea_id);
        }
        records
            .connections
            .retain(|_, c| !idea_ids.iter().any(|i| c.touches(i)));

        tracing::debug!(project_id = %id, ideas = idea_ids.len(), "Deleted project");
        Ok(())
    }

    async fn put_idea(&self, idea: Idea) -> Result<(), StoreError> {
        self.put_ideas(vec![idea]).await
    }

    async fn put_ideas(&self, ideas: Vec<Idea>) -> Result<(), StoreError> {
        if let Some(idea) = ideas.iter().find(|i| !i.confidences_in_range()) {
            return Err(StoreError::Invalid(format!(
                "idea {} has a confidence outside [0, 1]",
                idea.id
            )));
        }
        let mut records = self.records.write().await;
        if let Some(idea) = ideas
            .iter()
            .find(|i| !records.projects.contains_key(&i.project_id))
        {
            return Err(StoreError::not_found("Project", &idea.project_id));
        }
        for idea in ideas {
            records.ideas.insert(idea.id.clone(), idea);
        }
        Ok(())
    }

    async fn idea(&self, id: &str) -> Result<Idea, StoreError> {
        let records = self.records.read().await;
        records
            .ideas
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("Idea", id))
    }

    async fn ideas_for_project(&self, project_id: &str) -> Vec<Idea> {
        let records = self.records.read().await;
        let mut ideas: Vec<Idea> = records
            .ideas
            .values()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect();
        ideas.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        ideas
    }

    async fn delete_idea(&self, id: &str) -> Result<usize, StoreError> {
        let mut records = self.records.write().await;
        if records.ideas.remove(id).is_none() {
            return Err(StoreError::not_found("Idea", id));
        }
        let before = records.connections.len();
        records.connections.retain(|_, c| !c.touches(id));
        let removed = before - records.connections.len();

        tracing::debug!(idea_id = %id, connections = removed, "Deleted idea");
        Ok(removed)
    }

    async fn put_connection(&self, connection: Connection) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let source = records
            .ideas
            .get(&connection.source_id)
            .ok_or_else(|| StoreError::not_found("Idea", &connection.source_id))?;
        let target = records
            .ideas
            .get(&connection.target_id)
            .ok_or_else(|| StoreError::not_found("Idea", &connection.target_id))?;
        if source.project_id != target.project_id {
            return Err(StoreError::Invalid(format!(
                "ideas {} and {} belong to different projects",
                source.id, target.id
            )));
        }
        records.connections.insert(connection.id.clone(), connection);
        Ok(())
    }

    async fn connections_for_project(&self, project_id: &str) -> Vec<Connection> {
        let records = self.records.read().await;
        let in_project = |idea_id: &str| {
            records
                .ideas
                .get(idea_id)
                .is_some_and(|i| i.project_id == project_id)
        };
        let mut connections: Vec<Connection> = records
            .connections
            .values()
            .filter(|c| in_project(&c.source_id) || in_project(&c.target_id))
            .cloned()
            .collect();
        connections.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        connections
    }

    async fn delete_connection(&self, id: &str) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        records
            .connections
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("Connection", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IdeaStatus;

    async fn seeded() -> (MemoryRepository, Project, Idea, Idea) {
        let repo = MemoryRepository::new();
        let project = Project::new("Launch", Some("100M ARR by 2027".to_string()));
        repo.put_project(project.clone()).await.unwrap();

        let a = Idea::captured(&project.id, "Self-serve onboarding");
        let b = Idea::resonance(&project.id, "Partner channel");
        repo.put_idea(a.clone()).await.unwrap();
        repo.put_idea(b.clone()).await.unwrap();
        (repo, project, a, b)
    }

    #[tokio::test]
    async fn test_delete_idea_cascades_connections() {
        let (repo, project, a, b) = seeded().await;
        let c = Idea::captured(&project.id, "Annual plans");
        repo.put_idea(c.clone()).await.unwrap();

        repo.put_connection(Connection::new(&a.id, &b.id)).await.unwrap();
        repo.put_connection(Connection::new(&b.id, &a.id).with_label("feeds"))
            .await
            .unwrap();
        repo.put_connection(Connection::new(&b.id, &c.id)).await.unwrap();

        let removed = repo.delete_idea(&a.id).await.unwrap();
        assert_eq!(removed, 2);

        let remaining = repo.connections_for_project(&project.id).await;
        assert_eq!(remaining.len(), 1);
        assert!(remaining.iter().all(|conn| !conn.touches(&a.id)));
        assert!(matches!(
            repo.idea(&a.id).await,
            Err(StoreError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_connection_across_projects_rejected() {
        let (repo, _project, a, _b) = seeded().await;
        let other = Project::new("Other", None);
        repo.put_project(other.clone()).await.unwrap();
        let foreign = Idea::captured(&other.id, "Elsewhere");
        repo.put_idea(foreign.clone()).await.unwrap();

        let result = repo.put_connection(Connection::new(&a.id, &foreign.id)).await;
        assert!(matches!(result, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_put_idea_rejects_out_of_range_confidence() {
        let (repo, _project, mut a, _b) = seeded().await;
        a.reasoned_confidence = Some(1.7);
        assert!(matches!(repo.put_idea(a).await, Err(StoreError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_put_idea_requires_project() {
        let repo = MemoryRepository::new();
        let orphan = Idea::captured("missing", "Orphan");
        assert!(matches!(
            repo.put_idea(orphan).await,
            Err(StoreError::NotFound { kind: "Project", .. })
        ));
    }

    #[tokio::test]
    async fn test_put_ideas_is_all_or_nothing() {
        let (repo, project, _a, _b) = seeded().await;
        let good = Idea::resonance(&project.id, "Referral loop");
        let orphan = Idea::resonance("missing", "Lost");

        let result = repo.put_ideas(vec![good.clone(), orphan]).await;
        assert!(matches!(result, Err(StoreError::NotFound { kind: "Project", .. })));
        assert!(repo.idea(&good.id).await.is_err());

        let mut bad = Idea::resonance(&project.id, "Overconfident");
        bad.calibrated_confidence = Some(2.0);
        assert!(repo.put_ideas(vec![good.clone(), bad]).await.is_err());
        assert_eq!(repo.ideas_for_project(&project.id).await.len(), 2);

        let other = Idea::resonance(&project.id, "Usage alerts");
        repo.put_ideas(vec![good.clone(), other]).await.unwrap();
        assert_eq!(repo.ideas_for_project(&project.id).await.len(), 4);
    }

    #[tokio::test]
    async fn test_delete_project_cascades() {
        let (repo, project, a, b) = seeded().await;
        repo.put_connection(Connection::new(&a.id, &b.id)).await.unwrap();

        repo.delete_project(&project.id).await.unwrap();
        assert!(repo.ideas_for_project(&project.id).await.is_empty());
        assert!(repo.snapshot().await.connections.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_file_roundtrip() {
        let (repo, project, a, b) = seeded().await;
        repo.put_connection(Connection::new(&a.id, &b.id)).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        repo.save_snapshot(&path).await.unwrap();

        let loaded = MemoryRepository::load_snapshot(&path).await.unwrap();
        assert_eq!(loaded.snapshot().await, repo.snapshot().await);
        assert_eq!(loaded.idea(&b.id).await.unwrap().status, IdeaStatus::Resonance);
        assert_eq!(loaded.project(&project.id).await.unwrap().name, "Launch");
    }

    #[test]
    fn test_missing_snapshot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let repo = tokio_test::block_on(MemoryRepository::load_snapshot(
            dir.path().join("absent.json"),
        ))
        .unwrap();
        assert!(tokio_test::block_on(repo.projects()).is_empty());
    }
}
