//! Structured reasoning about a claim.
//!
//! Unlike the forecaster, the reasoning model is load-bearing: its output is
//! the analysis the user reads. Malformed output is an error, never patched
//! up with defaults.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::traits::{CompletionRequest, FinishReason, LlmBackend, LlmError};
use crate::fusion::CalibrationBand;
use crate::response::{excerpt, parse_json};

#[cfg(feature = "typescript")]
use ts_rs::TS;

/// Default deadline for a reasoning call.
pub const DEFAULT_REASONING_TIMEOUT: Duration = Duration::from_secs(60);

/// Errors from the reasoning engine. All of them fail the validation.
#[derive(Debug, thiserror::Error)]
pub enum ReasoningError {
    #[error("Reasoning backend error: {0}")]
    Backend(#[from] LlmError),

    #[error("Reasoning timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed reasoning output: {reason} (reply: {excerpt})")]
    Malformed { reason: String, excerpt: String },
}

impl ReasoningError {
    fn malformed(reason: impl Into<String>, text: &str) -> Self {
        Self::Malformed {
            reason: reason.into(),
            excerpt: excerpt(text, 200),
        }
    }
}

/// The reasoning model's verdict on a claim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Assessment {
    pub confidence: f64,
    pub reasoning: String,
    pub risks: Vec<String>,
    pub next_steps: Vec<String>,
}

/// Parse a reasoning reply.
///
/// A surrounding code fence is tolerated. The rest must deserialize into an
/// `Assessment` with every key present and a finite confidence in [0, 1].
pub fn parse_assessment(text: &str) -> Result<Assessment, ReasoningError> {
    let assessment: Assessment =
        parse_json(text).map_err(|e| ReasoningError::malformed(e.to_string(), text))?;

    if !assessment.confidence.is_finite() || !(0.0..=1.0).contains(&assessment.confidence) {
        return Err(ReasoningError::malformed(
            format!("confidence {} outside [0, 1]", assessment.confidence),
            text,
        ));
    }

    Ok(assessment)
}

/// Asks the reasoning model for a calibrated, critical assessment.
pub struct ReasoningEngine {
    backend: Arc<dyn LlmBackend>,
    timeout: Duration,
    max_tokens: u32,
    temperature: Option<f32>,
}

impl ReasoningEngine {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend,
            timeout: DEFAULT_REASONING_TIMEOUT,
            max_tokens: 1024,
            temperature: None,
        }
    }

    /// Set the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set generation parameters.
    pub fn with_generation(mut self, max_tokens: u32, temperature: Option<f32>) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// The backend in use.
    pub fn backend(&self) -> &Arc<dyn LlmBackend> {
        &self.backend
    }

    /// Build the assessment prompt.
    pub fn build_prompt(claim: &str, context: Option<&str>, calibration_hint: Option<f64>) -> String {
        let mut prompt = String::new();

        prompt.push_str("Evaluate this hypothesis:\n\n");
        prompt.push_str(&format!("\"{}\"\n", claim));

        if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
            prompt.push_str(&format!("\nAdditional context:\n{}\n", context));
        }

        if let Some(hint) = calibration_hint {
            prompt.push_str(&format!(
                "\nA calibrated forecasting model estimates the probability of this hypothesis \
                 at {:.0}%. Its estimates have been validated to be well-calibrated. Factor it \
                 into your assessment but do your own analysis. If your confidence differs \
                 from it by a wide margin, explain the divergence explicitly in your reasoning.\n",
                hint * 100.0
            ));
        }

        prompt.push_str("\nBe rigorous and intellectually honest. Consider:\n");
        prompt.push_str("1. What evidence or reasoning supports this?\n");
        prompt.push_str("2. What evidence or reasoning contradicts this?\n");
        prompt.push_str("3. What is unknown that would significantly affect the assessment?\n");
        prompt.push_str("4. What could go wrong if this is acted upon?\n\n");

        prompt.push_str("Calibration guide:\n");
        prompt.push_str(&CalibrationBand::rubric());
        prompt.push_str("\n\n");

        prompt.push_str("Return ONLY a JSON object with exactly these keys, no other text:\n");
        prompt.push_str("{\n");
        prompt.push_str("  \"confidence\": <number between 0.0 and 1.0>,\n");
        prompt.push_str("  \"reasoning\": \"<your honest assessment in 2-4 sentences>\",\n");
        prompt.push_str("  \"risks\": [\"<risk>\", ...],\n");
        prompt.push_str("  \"next_steps\": [\"<what to do to increase confidence>\", ...]\n");
        prompt.push_str("}\n\n");

        prompt.push_str("Do NOT be agreeable. If it's a bad idea, say so clearly.\n");

        prompt
    }

    /// Assess `claim`, optionally informed by a calibrated estimate.
    pub async fn assess(
        &self,
        claim: &str,
        context: Option<&str>,
        calibration_hint: Option<f64>,
    ) -> Result<Assessment, ReasoningError> {
        let mut request = CompletionRequest::user(Self::build_prompt(claim, context, calibration_hint))
            .with_max_tokens(self.max_tokens)
            .with_json_output();
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        debug!(
            backend = self.backend.id(),
            prompt_chars = request.flattened_prompt().len(),
            has_hint = calibration_hint.is_some(),
            "Requesting assessment"
        );

        let response = tokio::time::timeout(self.timeout, self.backend.complete(request))
            .await
            .map_err(|_| ReasoningError::Timeout(self.timeout))??;

        debug!(
            backend = self.backend.id(),
            response_chars = response.content.len(),
            tokens = response.usage.total(),
            "Assessment received"
        );
        if response.finish_reason == FinishReason::Length {
            warn!(
                backend = self.backend.id(),
                max_tokens = self.max_tokens,
                "Assessment cut off at the token limit"
            );
        }

        parse_assessment(&response.content).inspect_err(|e| {
            warn!(backend = self.backend.id(), error = %e, "Rejected reasoning output");
        })
    }
}
