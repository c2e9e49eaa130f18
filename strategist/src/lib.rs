//! Strategist - the CommandCenter workspace
//!
//! Ties the pieces together for a user working on a project:
//!
//! - capture ideas, connect them, explore a problem space for new ones
//! - discover and answer clarifying questions about the project
//! - validate ideas against a calibrated forecaster and a reasoning model,
//!   promoting them when confidence clears the threshold
//! - crystallize ideas forward explicitly and plan the execution of hypotheses
//!
//! The `commandcenter` binary exposes the same operations on the command line.

pub mod cli;
pub mod config;
pub mod error;
pub mod workspace;

pub use config::StrategistConfig;
pub use error::{Result, StrategistError};
pub use workspace::{CrystallizeOutcome, ValidationOutcome, Workspace};
