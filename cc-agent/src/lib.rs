//! CommandCenter Agent - two-source idea validation
//!
//! Judges a claim with two independent signals and fuses them:
//! - A calibrated forecaster that returns a probability (soft-fails to nothing)
//! - A reasoning model that returns structured analysis (hard-fails on bad output)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           ValidationService             │
//! │   estimate ─▶ assess(hint) ─▶ fuse      │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌──────────────┐      ┌──────────────┐
//! │ Probability  │      │  Reasoning   │
//! │ Estimator    │      │  Engine      │
//! │ (HF forecast)│      │ (Anthropic/  │
//! │              │      │  OpenAI)     │
//! └──────────────┘      └──────────────┘
//! ```
//!
//! The same reasoning backend also drives exploration (nascent ideas for a
//! problem space) and planning (actions for a validated idea).

pub mod backend;
pub mod estimator;
pub mod fusion;
pub mod reasoning;
pub mod response;
pub mod service;
pub mod strategy;

// Re-export main types for convenience
pub use backend::traits::{CompletionRequest, CompletionResponse, LlmBackend, LlmError};
pub use estimator::{parse_probability, ProbabilityEstimator};
pub use fusion::{CalibrationBand, Confidence, ConfidenceFusion, Divergence, ValidationResult};
pub use reasoning::{Assessment, ReasoningEngine, ReasoningError};
pub use service::{ServiceConfig, ServiceError, ValidationService};
pub use strategy::{Effort, ExploredIdea, Explorer, PlanAction, Planner};
