//! Forward-only crystallization of ideas.
//!
//! Two things move an idea forward:
//!
//! - an explicit user crystallize, which may step to the successor or jump
//!   to any later stage
//! - automatic promotion after a validation whose primary confidence clears
//!   the promotion threshold, which moves at most one stage and never past
//!   `hypothesis`
//!
//! Nothing moves an idea backward. Crystallizing at `task` is a no-op.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::{Idea, IdeaStatus};

/// Default primary confidence at which validation promotes an idea.
pub const DEFAULT_PROMOTION_THRESHOLD: f64 = 0.5;

/// Furthest stage automatic promotion reaches. `task` is only ever entered
/// by an explicit crystallize.
pub const PROMOTION_CEILING: IdeaStatus = IdeaStatus::Hypothesis;

/// Error types for lifecycle transitions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LifecycleError {
    /// Requested stage lies behind the current one
    #[error("Cannot move idea backward from {from} to {to}")]
    Backward { from: IdeaStatus, to: IdeaStatus },
}

/// Where an explicit crystallize should take the idea.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "status")]
pub enum CrystallizeTarget {
    /// The immediate successor
    Next,
    /// A specific later stage (skipping is allowed for explicit requests)
    To(IdeaStatus),
}

/// Outcome of a transition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Transition {
    /// The idea moved forward
    Advanced { from: IdeaStatus, to: IdeaStatus },
    /// The idea stayed where it was
    Unchanged { status: IdeaStatus },
}

impl Transition {
    /// Whether the status changed.
    pub fn is_advanced(&self) -> bool {
        matches!(self, Self::Advanced { .. })
    }

    /// Status after the transition.
    pub fn status(&self) -> IdeaStatus {
        match *self {
            Self::Advanced { to, .. } => to,
            Self::Unchanged { status } => status,
        }
    }
}

/// Tunables for automatic promotion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LifecyclePolicy {
    /// Minimum primary confidence that promotes an idea after validation
    pub promotion_threshold: f64,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            promotion_threshold: DEFAULT_PROMOTION_THRESHOLD,
        }
    }
}

impl LifecyclePolicy {
    /// Create a policy with a custom threshold, clamped to [0, 1].
    pub fn with_threshold(threshold: f64) -> Self {
        Self {
            promotion_threshold: threshold.clamp(0.0, 1.0),
        }
    }

    /// Stage the idea would reach after a validation with `primary_confidence`.
    ///
    /// Returns `None` when the idea stays where it is.
    pub fn promotion_for(&self, current: IdeaStatus, primary_confidence: f64) -> Option<IdeaStatus> {
        if !primary_confidence.is_finite() || primary_confidence < self.promotion_threshold {
            return None;
        }
        current.next().filter(|next| *next <= PROMOTION_CEILING)
    }

    /// Apply automatic promotion to an idea.
    pub fn promote(&self, idea: &mut Idea, primary_confidence: f64) -> Transition {
        let from = idea.status;
        match self.promotion_for(from, primary_confidence) {
            Some(to) => {
                apply(idea, to);
                info!(
                    idea_id = %idea.id,
                    from = %from,
                    to = %to,
                    confidence = primary_confidence,
                    "Idea promoted by validation"
                );
                Transition::Advanced { from, to }
            }
            None => Transition::Unchanged { status: from },
        }
    }
}

/// Resolve an explicit crystallize request without mutating anything.
pub fn plan_crystallize(
    current: IdeaStatus,
    target: CrystallizeTarget,
) -> Result<Transition, LifecycleError> {
    match target {
        CrystallizeTarget::Next => Ok(match current.next() {
            Some(to) => Transition::Advanced { from: current, to },
            None => Transition::Unchanged { status: current },
        }),
        CrystallizeTarget::To(to) if to > current => Ok(Transition::Advanced { from: current, to }),
        CrystallizeTarget::To(to) if to == current => Ok(Transition::Unchanged { status: current }),
        CrystallizeTarget::To(to) => Err(LifecycleError::Backward { from: current, to }),
    }
}

/// Explicit user crystallize.
///
/// On error the idea is left untouched.
pub fn crystallize(idea: &mut Idea, target: CrystallizeTarget) -> Result<Transition, LifecycleError> {
    let transition = plan_crystallize(idea.status, target)?;
    if let Transition::Advanced { from, to } = transition {
        apply(idea, to);
        info!(idea_id = %idea.id, from = %from, to = %to, "Idea crystallized");
    }
    Ok(transition)
}

fn apply(idea: &mut Idea, to: IdeaStatus) {
    idea.status = to;
    idea.touch();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn idea_at(status: IdeaStatus) -> Idea {
        let mut idea = Idea::captured("project", "Usage-based pricing");
        idea.status = status;
        idea
    }

    #[test]
    fn test_crystallize_next_walks_forward() {
        let mut idea = idea_at(IdeaStatus::Resonance);
        for expected in [IdeaStatus::Idea, IdeaStatus::Hypothesis, IdeaStatus::Task] {
            let transition = crystallize(&mut idea, CrystallizeTarget::Next).unwrap();
            assert!(transition.is_advanced());
            assert_eq!(idea.status, expected);
        }
    }

    #[test]
    fn test_crystallize_at_task_is_noop() {
        let mut idea = idea_at(IdeaStatus::Task);
        let before = idea.updated_at;

        let transition = crystallize(&mut idea, CrystallizeTarget::Next).unwrap();
        assert_eq!(transition, Transition::Unchanged { status: IdeaStatus::Task });
        assert_eq!(idea.status, IdeaStatus::Task);
        assert_eq!(idea.updated_at, before);

        let again = crystallize(&mut idea, CrystallizeTarget::To(IdeaStatus::Task)).unwrap();
        assert!(!again.is_advanced());
    }

    #[test]
    fn test_explicit_override_may_skip() {
        let mut idea = idea_at(IdeaStatus::Resonance);
        let transition = crystallize(&mut idea, CrystallizeTarget::To(IdeaStatus::Task)).unwrap();
        assert_eq!(
            transition,
            Transition::Advanced {
                from: IdeaStatus::Resonance,
                to: IdeaStatus::Task
            }
        );
    }

    #[test]
    fn test_backward_target_rejected_and_untouched() {
        let mut idea = idea_at(IdeaStatus::Hypothesis);
        let snapshot = idea.clone();

        let err = crystallize(&mut idea, CrystallizeTarget::To(IdeaStatus::Idea)).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::Backward {
                from: IdeaStatus::Hypothesis,
                to: IdeaStatus::Idea
            }
        );
        assert_eq!(idea, snapshot);
    }

    #[test]
    fn test_promotion_then_low_confidence_never_demotes() {
        let policy = LifecyclePolicy::default();
        let mut idea = idea_at(IdeaStatus::Idea);

        assert!(policy.promote(&mut idea, 0.62).is_advanced());
        assert_eq!(idea.status, IdeaStatus::Hypothesis);

        let transition = policy.promote(&mut idea, 0.2);
        assert_eq!(transition, Transition::Unchanged { status: IdeaStatus::Hypothesis });
        assert_eq!(idea.status, IdeaStatus::Hypothesis);
    }

    #[test]
    fn test_promotion_moves_one_step_only() {
        let policy = LifecyclePolicy::default();
        assert_eq!(
            policy.promotion_for(IdeaStatus::Resonance, 0.95),
            Some(IdeaStatus::Idea)
        );
        assert_eq!(policy.promotion_for(IdeaStatus::Hypothesis, 0.95), None);
        assert_eq!(policy.promotion_for(IdeaStatus::Task, 0.95), None);
    }

    #[test]
    fn test_no_threshold_reaches_task() {
        let eager = LifecyclePolicy::with_threshold(0.0);
        let mut idea = idea_at(IdeaStatus::Hypothesis);
        assert_eq!(
            eager.promote(&mut idea, 1.0),
            Transition::Unchanged { status: IdeaStatus::Hypothesis }
        );
        assert_eq!(eager.promotion_for(IdeaStatus::Idea, 0.62), Some(IdeaStatus::Hypothesis));
    }

    #[test]
    fn test_promotion_threshold_is_inclusive() {
        let policy = LifecyclePolicy::default();
        assert_eq!(policy.promotion_for(IdeaStatus::Idea, 0.5), Some(IdeaStatus::Hypothesis));
        assert_eq!(policy.promotion_for(IdeaStatus::Idea, 0.4999), None);
        assert_eq!(policy.promotion_for(IdeaStatus::Idea, f64::NAN), None);

        let strict = LifecyclePolicy::with_threshold(0.8);
        assert_eq!(strict.promotion_for(IdeaStatus::Idea, 0.62), None);
    }
}
