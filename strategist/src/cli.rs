//! Command-line interface for workspace operations.
//!
//! Every command prints its result as pretty JSON.

use std::collections::BTreeMap;

use clap::Subcommand;
use serde::Serialize;

use ideaspace::{CanvasPosition, CrystallizeTarget, IdeaStatus, IdeaUpdate, ProjectUpdate};

use crate::error::{Result, StrategistError};
use crate::workspace::Workspace;

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage projects
    #[command(subcommand)]
    Project(ProjectCommands),

    /// Manage ideas
    #[command(subcommand)]
    Idea(IdeaCommands),

    /// Connect two ideas of the same project
    Connect {
        source_id: String,
        target_id: String,
        /// Edge label
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Explore a problem space and store the ideas found
    Explore {
        project_id: String,
        /// What to explore
        prompt: String,
    },

    /// Validate an idea against the forecaster and the reasoning model
    Validate { idea_id: String },

    /// Move an idea forward
    Crystallize {
        idea_id: String,
        /// Target stage (resonance, idea, hypothesis, task); next stage when omitted
        #[arg(long, value_parser = parse_status)]
        to: Option<IdeaStatus>,
    },

    /// Show the next clarifying questions for a project
    Discover { project_id: String },

    /// Answer clarifying questions
    Answer {
        project_id: String,
        /// "question=answer", repeatable
        #[arg(short, long = "answer", value_parser = parse_answer, required = true)]
        answers: Vec<(String, String)>,
    },

    /// Plan the execution of a hypothesis or task
    Plan {
        idea_id: String,
        /// Time, budget or resource constraints
        #[arg(short, long)]
        constraints: Option<String>,
    },
}

/// Project commands
#[derive(Debug, Subcommand)]
pub enum ProjectCommands {
    /// Create a project
    Create {
        name: String,
        /// What the project is working toward
        #[arg(short, long)]
        goal: Option<String>,
    },
    /// Rename a project or change its goal
    Update {
        project_id: String,
        #[arg(short, long)]
        name: Option<String>,
        /// New goal; an empty string clears it
        #[arg(short, long)]
        goal: Option<String>,
    },
    /// List projects
    List,
    /// Show a project with its ideas and connections
    Show { project_id: String },
    /// Delete a project with everything in it
    Delete { project_id: String },
}

/// Idea commands
#[derive(Debug, Subcommand)]
pub enum IdeaCommands {
    /// Capture an idea
    Capture {
        project_id: String,
        title: String,
        #[arg(short, long)]
        description: Option<String>,
        /// Canvas x coordinate
        #[arg(long, requires = "y", allow_hyphen_values = true)]
        x: Option<f64>,
        /// Canvas y coordinate
        #[arg(long, requires = "x", allow_hyphen_values = true)]
        y: Option<f64>,
        /// Idea this one grew out of
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// Show one idea
    Show { idea_id: String },
    /// Edit an idea (status changes go through crystallize)
    Update {
        idea_id: String,
        #[arg(short, long)]
        title: Option<String>,
        /// New description; an empty string clears it
        #[arg(short, long)]
        description: Option<String>,
        /// Canvas x coordinate
        #[arg(long, requires = "y", allow_hyphen_values = true)]
        x: Option<f64>,
        /// Canvas y coordinate
        #[arg(long, requires = "x", allow_hyphen_values = true)]
        y: Option<f64>,
        /// Parent idea; an empty string clears it
        #[arg(short, long)]
        parent: Option<String>,
    },
    /// List a project's ideas
    List { project_id: String },
    /// Delete an idea and its connections
    Delete { idea_id: String },
}

fn parse_status(s: &str) -> std::result::Result<IdeaStatus, String> {
    IdeaStatus::parse(s).ok_or_else(|| {
        format!("unknown status '{s}' (expected resonance, idea, hypothesis or task)")
    })
}

fn parse_answer(s: &str) -> std::result::Result<(String, String), String> {
    let (question, answer) = s
        .split_once('=')
        .ok_or_else(|| "expected \"question=answer\"".to_string())?;
    if question.trim().is_empty() {
        return Err("question must not be empty".to_string());
    }
    Ok((question.trim().to_string(), answer.to_string()))
}

#[derive(Serialize)]
struct ProjectView {
    project: ideaspace::Project,
    ideas: Vec<ideaspace::Idea>,
    connections: Vec<ideaspace::Connection>,
}

#[derive(Serialize)]
struct Deleted<'a> {
    deleted: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    connections_removed: Option<usize>,
}

fn render<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| StrategistError::InvalidInput(format!("unrenderable output: {e}")))
}

/// Run one command against the workspace.
pub async fn execute_command(workspace: &Workspace, command: Commands) -> Result<String> {
    match command {
        Commands::Project(ProjectCommands::Create { name, goal }) => {
            render(&workspace.create_project(&name, goal).await?)
        }
        Commands::Project(ProjectCommands::Update {
            project_id,
            name,
            goal,
        }) => render(
            &workspace
                .update_project(&project_id, ProjectUpdate { name, goal })
                .await?,
        ),
        Commands::Project(ProjectCommands::List) => render(&workspace.projects().await),
        Commands::Project(ProjectCommands::Show { project_id }) => {
            let view = ProjectView {
                project: workspace.project(&project_id).await?,
                ideas: workspace.ideas(&project_id).await?,
                connections: workspace.connections(&project_id).await?,
            };
            render(&view)
        }
        Commands::Project(ProjectCommands::Delete { project_id }) => {
            workspace.delete_project(&project_id).await?;
            render(&Deleted {
                deleted: &project_id,
                connections_removed: None,
            })
        }

        Commands::Idea(IdeaCommands::Capture {
            project_id,
            title,
            description,
            x,
            y,
            parent,
        }) => {
            let position = x.zip(y);
            render(
                &workspace
                    .capture_idea(&project_id, &title, description, position, parent.as_deref())
                    .await?,
            )
        }
        Commands::Idea(IdeaCommands::Show { idea_id }) => render(&workspace.idea(&idea_id).await?),
        Commands::Idea(IdeaCommands::Update {
            idea_id,
            title,
            description,
            x,
            y,
            parent,
        }) => {
            let update = IdeaUpdate {
                title,
                description,
                position: x.zip(y).map(|(x, y)| CanvasPosition::new(x, y)),
                parent_id: parent,
            };
            render(&workspace.update_idea(&idea_id, update).await?)
        }
        Commands::Idea(IdeaCommands::List { project_id }) => render(&workspace.ideas(&project_id).await?),
        Commands::Idea(IdeaCommands::Delete { idea_id }) => {
            let removed = workspace.delete_idea(&idea_id).await?;
            render(&Deleted {
                deleted: &idea_id,
                connections_removed: Some(removed),
            })
        }

        Commands::Connect {
            source_id,
            target_id,
            label,
        } => render(&workspace.connect(&source_id, &target_id, label).await?),

        Commands::Explore { project_id, prompt } => {
            render(&workspace.explore(&project_id, &prompt).await?)
        }

        Commands::Validate { idea_id } => render(&workspace.validate_idea(&idea_id).await?),

        Commands::Crystallize { idea_id, to } => {
            let target = to.map_or(CrystallizeTarget::Next, CrystallizeTarget::To);
            render(&workspace.crystallize(&idea_id, target).await?)
        }

        Commands::Discover { project_id } => render(&workspace.discover(&project_id).await?),

        Commands::Answer { project_id, answers } => {
            let answers: BTreeMap<String, String> = answers.into_iter().collect();
            render(&workspace.ingest(&project_id, &answers).await?)
        }

        Commands::Plan {
            idea_id,
            constraints,
        } => render(&workspace.plan(&idea_id, constraints.as_deref()).await?),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer() {
        assert_eq!(
            parse_answer("Who is the customer?=Platform teams").unwrap(),
            ("Who is the customer?".to_string(), "Platform teams".to_string())
        );
        assert_eq!(parse_answer("Q=a=b").unwrap().1, "a=b");
        assert!(parse_answer("no separator").is_err());
        assert!(parse_answer(" =x").is_err());
    }

    #[test]
    fn test_idea_update_arguments() {
        use clap::Parser;

        #[derive(Parser)]
        struct Harness {
            #[command(subcommand)]
            command: Commands,
        }

        let parsed = Harness::try_parse_from([
            "commandcenter", "idea", "update", "i-1", "--x", "-20", "--y", "35.5", "--parent", "",
        ])
        .unwrap();
        match parsed.command {
            Commands::Idea(IdeaCommands::Update { x, y, parent, title, .. }) => {
                assert_eq!(x.zip(y), Some((-20.0, 35.5)));
                assert_eq!(parent.as_deref(), Some(""));
                assert!(title.is_none());
            }
            _ => panic!("expected idea update"),
        }

        assert!(Harness::try_parse_from(["commandcenter", "idea", "update", "i-1", "--x", "3"]).is_err());
    }

    #[test]
    fn test_parse_status() {
        assert_eq!(parse_status("hypothesis").unwrap(), IdeaStatus::Hypothesis);
        assert!(parse_status("done").is_err());
    }
}
