//! Calibrated probability estimation.
//!
//! The forecaster answers in free text. This module owns turning that text
//! into a probability and never lets a forecaster problem escape: every
//! failure degrades to "no estimate".

use regex::Regex;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::traits::{CompletionRequest, LlmBackend};
use crate::response::excerpt;

/// Default deadline for a forecaster call.
pub const DEFAULT_ESTIMATE_TIMEOUT: Duration = Duration::from_secs(30);

fn number_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[0-9]+(?:\.[0-9]+)?|\.[0-9]+").ok())
        .as_ref()
}

/// Extract a probability from forecaster text.
///
/// The first ASCII numeric token wins. A value above 1 is read as a
/// percentage. The result is clamped to [0, 1].
///
/// ```
/// use cc_agent::parse_probability;
///
/// assert_eq!(parse_probability("0.62"), Some(0.62));
/// assert_eq!(parse_probability("About 70% likely"), Some(0.7));
/// assert_eq!(parse_probability("no idea"), None);
/// ```
pub fn parse_probability(text: &str) -> Option<f64> {
    let token = number_pattern()?.find(text)?;
    let value: f64 = token.as_str().parse().ok()?;
    // A digit run too long for f64 is still far above 100.
    if value.is_infinite() {
        return Some(1.0);
    }
    let value = if value > 1.0 { value / 100.0 } else { value };
    Some(value.clamp(0.0, 1.0))
}

/// Calls the calibrated forecaster and normalizes its answer.
pub struct ProbabilityEstimator {
    backend: Option<Arc<dyn LlmBackend>>,
    timeout: Duration,
    max_tokens: u32,
    temperature: f32,
}

impl ProbabilityEstimator {
    /// Estimator backed by `backend`.
    pub fn new(backend: Arc<dyn LlmBackend>) -> Self {
        Self {
            backend: Some(backend),
            timeout: DEFAULT_ESTIMATE_TIMEOUT,
            max_tokens: 1024,
            temperature: 0.3,
        }
    }

    /// Estimator with no forecaster configured. Every estimate is `None`.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            timeout: DEFAULT_ESTIMATE_TIMEOUT,
            max_tokens: 1024,
            temperature: 0.3,
        }
    }

    /// Set the per-call deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set generation parameters.
    pub fn with_generation(mut self, max_tokens: u32, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    /// Whether a forecaster is configured.
    pub fn is_enabled(&self) -> bool {
        self.backend.is_some()
    }

    /// Build the forecasting prompt for a claim.
    pub fn build_prompt(claim: &str, context: Option<&str>) -> String {
        let mut prompt = String::new();

        prompt.push_str(
            "Question: What is the probability that the following hypothesis is true or will succeed?\n\n",
        );
        prompt.push_str(&format!("Hypothesis: {}\n", claim));
        if let Some(background) = context.filter(|c| !c.trim().is_empty()) {
            prompt.push_str(&format!("\nBackground: {}\n", background));
        }
        prompt.push_str(
            "\nResolution Criteria: The hypothesis is considered resolved TRUE if the stated \
             outcome occurs or the claim is validated.\n\n",
        );
        prompt.push_str(
            "Start your reply with your probability estimate as a decimal between 0.0 and 1.0 \
             on its own line, then briefly list the factors that support and oppose the \
             hypothesis.\n",
        );

        prompt
    }

    /// Estimate the probability that `claim` holds.
    ///
    /// Returns `None` when no forecaster is configured, on any backend error
    /// or timeout, and when the reply holds no number.
    pub async fn estimate(&self, claim: &str, context: Option<&str>) -> Option<f64> {
        let backend = self.backend.as_ref()?;

        let request = CompletionRequest::user(Self::build_prompt(claim, context))
            .with_max_tokens(self.max_tokens)
            .with_temperature(self.temperature);

        let response = match tokio::time::timeout(self.timeout, backend.complete(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                warn!(backend = backend.id(), error = %e, "Forecaster call failed");
                return None;
            }
            Err(_) => {
                warn!(
                    backend = backend.id(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Forecaster timed out"
                );
                return None;
            }
        };

        let probability = parse_probability(&response.content);
        match probability {
            Some(p) => debug!(backend = backend.id(), probability = p, "Forecaster estimate"),
            None => warn!(
                backend = backend.id(),
                reply = %excerpt(&response.content, 120),
                "Forecaster reply held no probability"
            ),
        }
        probability
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;

    #[test]
    fn test_parse_fraction_unchanged() {
        assert_eq!(parse_probability("0.62"), Some(0.62));
        assert_eq!(parse_probability("1"), Some(1.0));
        assert_eq!(parse_probability("0"), Some(0.0));
        assert_eq!(parse_probability(".35 seems right"), Some(0.35));
    }

    #[test]
    fn test_parse_percentage() {
        assert_eq!(parse_probability("I'd say 70"), Some(0.7));
        assert_eq!(parse_probability("45.5%"), Some(0.455));
    }

    #[test]
    fn test_parse_clamps() {
        assert_eq!(parse_probability("250"), Some(1.0));
        // The sign is not part of the token.
        assert_eq!(parse_probability("-0.4"), Some(0.4));
    }

    #[test]
    fn test_first_number_wins() {
        assert_eq!(parse_probability("0.3\nFactors: 2 competitors, 0.9 margin"), Some(0.3));
        assert_eq!(parse_probability("Out of 3 scenarios, 0.8"), Some(0.03));
    }

    #[test]
    fn test_parse_ignores_non_ascii_digits() {
        assert_eq!(parse_probability("\u{663} then 0.4"), Some(0.4));
        assert_eq!(parse_probability("\u{967}\u{968}"), None);
    }

    #[test]
    fn test_parse_overlong_number_clamps() {
        assert_eq!(parse_probability(&"9".repeat(400)), Some(1.0));
    }

    #[test]
    fn test_parse_nothing() {
        assert_eq!(parse_probability(""), None);
        assert_eq!(parse_probability("unclear"), None);
    }

    #[test]
    fn test_prompt_includes_background() {
        let prompt = ProbabilityEstimator::build_prompt("Teams will pay", Some("B2B SaaS"));
        assert!(prompt.contains("Hypothesis: Teams will pay"));
        assert!(prompt.contains("Background: B2B SaaS"));

        let bare = ProbabilityEstimator::build_prompt("Teams will pay", None);
        assert!(!bare.contains("Background"));
    }

    #[tokio::test]
    async fn test_disabled_returns_none() {
        let estimator = ProbabilityEstimator::disabled();
        assert!(!estimator.is_enabled());
        assert_eq!(estimator.estimate("anything", None).await, None);
    }

    #[tokio::test]
    async fn test_estimate_parses_reply() {
        let backend = Arc::new(MockBackend::default().with_response("0.62\nMostly supported."));
        let estimator = ProbabilityEstimator::new(backend.clone());

        assert_eq!(estimator.estimate("claim", None).await, Some(0.62));
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_estimate_soft_fails() {
        let failing = ProbabilityEstimator::new(Arc::new(MockBackend::default().with_failure("503")));
        assert_eq!(failing.estimate("claim", None).await, None);

        let wordy = ProbabilityEstimator::new(Arc::new(MockBackend::default().with_response("hard to say")));
        assert_eq!(wordy.estimate("claim", None).await, None);
    }

    #[tokio::test]
    async fn test_estimate_times_out() {
        let slow = MockBackend::default()
            .with_response("0.9")
            .with_delay(Duration::from_secs(5));
        let estimator =
            ProbabilityEstimator::new(Arc::new(slow)).with_timeout(Duration::from_millis(50));

        assert_eq!(estimator.estimate("claim", None).await, None);
    }
}
