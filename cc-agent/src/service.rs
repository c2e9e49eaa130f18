//! ValidationService - main entry point for validating a claim.
//!
//! Runs the estimator, then the reasoning engine with the estimate as a
//! calibration hint, then fuses the two.

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::backend::traits::{LlmBackend, LlmError};
use crate::estimator::ProbabilityEstimator;
use crate::fusion::{ConfidenceFusion, ValidationResult, DEFAULT_DIVERGENCE_THRESHOLD};
use crate::reasoning::{ReasoningEngine, ReasoningError};
use crate::strategy::{Explorer, Planner};

/// Error types for the service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Reasoning failed; the validation has no result
    #[error(transparent)]
    Reasoning(#[from] ReasoningError),

    /// Backend error outside of reasoning
    #[error("Backend error: {0}")]
    Backend(#[from] LlmError),

    /// Backend did not answer in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// Exploration reply was not a list of ideas
    #[error("Malformed exploration output: {0}")]
    Exploration(String),

    /// Planning reply was not a list of actions
    #[error("Malformed planning output: {0}")]
    Planning(String),
}

/// Configuration for the ValidationService.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Deadline for the forecaster (ms)
    pub estimate_timeout_ms: u64,
    /// Deadline for reasoning, exploration and planning (ms)
    pub reasoning_timeout_ms: u64,
    /// Token budget for reasoning replies
    pub reasoning_max_tokens: u32,
    /// Reasoning temperature (provider default when unset)
    pub reasoning_temperature: Option<f32>,
    /// Token budget for forecaster replies
    pub forecaster_max_tokens: u32,
    /// Forecaster temperature
    pub forecaster_temperature: f32,
    /// Gap at which the two signals are flagged as divergent
    pub divergence_threshold: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            estimate_timeout_ms: 30_000,
            reasoning_timeout_ms: 60_000,
            reasoning_max_tokens: 1024,
            reasoning_temperature: None,
            forecaster_max_tokens: 1024,
            forecaster_temperature: 0.3,
            divergence_threshold: DEFAULT_DIVERGENCE_THRESHOLD,
        }
    }
}

/// Two-source validation over a reasoning backend and an optional forecaster.
pub struct ValidationService {
    config: ServiceConfig,
    reasoning_backend: Arc<dyn LlmBackend>,
    forecaster_backend: Option<Arc<dyn LlmBackend>>,
    estimator: ProbabilityEstimator,
    engine: ReasoningEngine,
    fusion: ConfidenceFusion,
}

impl ValidationService {
    /// Create a service. Without a forecaster every result is reasoning-only.
    pub fn new(reasoning: Arc<dyn LlmBackend>, forecaster: Option<Arc<dyn LlmBackend>>) -> Self {
        Self::build(ServiceConfig::default(), reasoning, forecaster)
    }

    /// Create with configuration.
    pub fn with_config(self, config: ServiceConfig) -> Self {
        Self::build(config, self.reasoning_backend, self.forecaster_backend)
    }

    fn build(
        config: ServiceConfig,
        reasoning: Arc<dyn LlmBackend>,
        forecaster: Option<Arc<dyn LlmBackend>>,
    ) -> Self {
        let estimator = match &forecaster {
            Some(backend) => ProbabilityEstimator::new(backend.clone()),
            None => ProbabilityEstimator::disabled(),
        }
        .with_timeout(Duration::from_millis(config.estimate_timeout_ms))
        .with_generation(config.forecaster_max_tokens, config.forecaster_temperature);

        let engine = ReasoningEngine::new(reasoning.clone())
            .with_timeout(Duration::from_millis(config.reasoning_timeout_ms))
            .with_generation(config.reasoning_max_tokens, config.reasoning_temperature);

        Self {
            fusion: ConfidenceFusion::new(config.divergence_threshold),
            config,
            reasoning_backend: reasoning,
            forecaster_backend: forecaster,
            estimator,
            engine,
        }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Whether calibrated estimates can be produced.
    pub fn forecaster_enabled(&self) -> bool {
        self.estimator.is_enabled()
    }

    /// Validate `claim`.
    ///
    /// The estimator always finishes (or times out) before reasoning starts.
    /// Only a reasoning failure fails the validation.
    pub async fn validate(
        &self,
        claim: &str,
        context: Option<&str>,
    ) -> Result<ValidationResult, ServiceError> {
        let estimate = self.estimator.estimate(claim, context).await;

        let assessment = match self.engine.assess(claim, context, estimate).await {
            Ok(assessment) => assessment,
            Err(e) => {
                warn!(error = %e, "Validation failed");
                return Err(e.into());
            }
        };

        let result = self.fusion.fuse(estimate, assessment);

        info!(
            reasoned = result.reasoned_confidence(),
            calibrated = ?result.calibrated_confidence(),
            divergent = result.divergence.is_some(),
            "Validation complete"
        );
        Ok(result)
    }

    /// Explorer over the reasoning backend.
    pub fn explorer(&self) -> Explorer {
        Explorer::new(self.reasoning_backend.clone())
            .with_timeout(Duration::from_millis(self.config.reasoning_timeout_ms))
            .with_max_tokens(self.config.reasoning_max_tokens)
    }

    /// Planner over the reasoning backend.
    pub fn planner(&self) -> Planner {
        Planner::new(self.reasoning_backend.clone())
            .with_timeout(Duration::from_millis(self.config.reasoning_timeout_ms))
            .with_max_tokens(self.config.reasoning_max_tokens)
    }
}
