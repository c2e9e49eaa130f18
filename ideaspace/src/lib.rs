//! Ideaspace - idea lifecycle and project context for CommandCenter
//!
//! This crate owns the records a user works with and the rules that govern
//! how they change:
//!
//! - **Ideas** crystallize forward through `resonance → idea → hypothesis → task`
//! - **Connections** link ideas within a project (a mind map, not a DAG)
//! - **Projects** carry a goal and a growing question → answer context
//!
//! # Key Components
//!
//! - [`IdeaStatus`] / [`lifecycle`]: the forward-only crystallization state machine
//! - [`ContextTracker`]: clarifying questions and context completeness scoring
//! - [`IdeaRepository`]: storage boundary, with [`MemoryRepository`] as the
//!   in-process implementation
//!
//! # Example
//!
//! ```ignore
//! use ideaspace::{ContextTracker, Idea, Project};
//!
//! let mut project = Project::new("Launch", Some("100M ARR by 2027".into()));
//! let tracker = ContextTracker::default();
//! let discovery = tracker.discover(&project);
//! let report = tracker.ingest(&mut project, &answers);
//! ```

pub mod context;
pub mod lifecycle;
pub mod store;
pub mod types;

// Re-export main types
pub use context::{
    ContextCategory, ContextPolicy, ContextQuestion, ContextTracker, Discovery, IngestReport,
    Priority,
};
pub use lifecycle::{CrystallizeTarget, LifecycleError, LifecyclePolicy, Transition};
pub use store::{IdeaRepository, MemoryRepository, Snapshot, StoreError};
pub use types::*;
