//! Progressive context discovery for a project.
//!
//! The tracker inverts the usual flow: instead of the user volunteering
//! background, it asks for what it is missing. Each round it looks at what
//! the project already knows, proposes a bounded set of clarifying questions
//! biased toward empty categories, and folds answers back into the project.
//!
//! Completeness is derived from the answers alone:
//!
//! ```text
//! breadth      = categories with >= 1 answer / 5
//! depth        = mean over categories of min(answers, depth_target) / depth_target
//! completeness = max(previous, 0.6 * breadth + 0.4 * depth)
//! ```
//!
//! Answers only ever add keys or overwrite them, and a key's category never
//! changes, so adding information cannot lower the score.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::Project;

#[cfg(feature = "typescript")]
use ts_rs::TS;

const BREADTH_WEIGHT: f64 = 0.6;
const DEPTH_WEIGHT: f64 = 0.4;

/// Question asked when a project has no goal.
pub const GOAL_QUESTION: &str = "What concrete outcome should this project reach, and by when?";

/// Area of knowledge a question belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "snake_case")]
pub enum ContextCategory {
    Product,
    Market,
    Team,
    Finance,
    Strategy,
}

impl ContextCategory {
    /// All categories in discovery order.
    pub const ALL: [ContextCategory; 5] = [
        ContextCategory::Product,
        ContextCategory::Market,
        ContextCategory::Team,
        ContextCategory::Finance,
        ContextCategory::Strategy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Market => "market",
            Self::Team => "team",
            Self::Finance => "finance",
            Self::Strategy => "strategy",
        }
    }

    /// Built-in questions for this category, most important first.
    pub fn question_bank(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::Product => &[
                (
                    "What does the product do today, in one or two sentences?",
                    "Ideas must build on what already exists rather than reinvent it.",
                ),
                (
                    "What problem does it solve that customers would pay to have solved?",
                    "Separates must-have value from nice-to-have features.",
                ),
                (
                    "What is the biggest gap or weakness in the current product?",
                    "Weak spots are where new ideas have the most leverage.",
                ),
            ],
            Self::Market => &[
                (
                    "Who is the primary customer, and who makes the buying decision?",
                    "Validation depends on knowing whose behavior has to change.",
                ),
                (
                    "Who are the main competitors or alternatives customers use today?",
                    "Claims about differentiation need a reference point.",
                ),
                (
                    "How large is the reachable market, roughly?",
                    "Bounds how far any single idea can move the goal.",
                ),
            ],
            Self::Team => &[
                (
                    "Who is on the team and what are their core strengths?",
                    "Ideas that match existing skills are cheaper to execute.",
                ),
                (
                    "What skills or roles are missing right now?",
                    "Gaps constrain which plans are realistic this quarter.",
                ),
                (
                    "How much time can the team devote to new initiatives?",
                    "Capacity limits how many hypotheses can be tested at once.",
                ),
            ],
            Self::Finance => &[
                (
                    "What is current revenue or monthly recurring revenue?",
                    "Anchors the distance between today and the goal.",
                ),
                (
                    "How much runway or budget is available?",
                    "Determines how long an idea can take to pay off.",
                ),
                (
                    "What does it cost to acquire and serve a customer?",
                    "Unit economics decide whether growth ideas are viable.",
                ),
            ],
            Self::Strategy => &[
                (
                    "What has already been tried, and what happened?",
                    "Avoids re-proposing ideas that already failed.",
                ),
                (
                    "What constraints are non-negotiable (regulatory, ethical, technical)?",
                    "Rules out ideas that cannot be acted on.",
                ),
                (
                    "What would make this goal clearly unreachable?",
                    "Surfaces the risks validation should weigh most.",
                ),
            ],
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Product => &["product", "feature", "build", "roadmap", "technology", "platform", "user experience"],
            Self::Market => &["customer", "market", "competitor", "segment", "buyer", "audience", "demand", "niche"],
            Self::Team => &["team", "hire", "hiring", "founder", "staff", "skill", "engineer", "people", "role"],
            Self::Finance => &["revenue", "arr", "mrr", "price", "pricing", "cost", "budget", "runway", "funding", "margin", "profit", "cash"],
            Self::Strategy => &["strategy", "goal", "vision", "risk", "constraint", "priority", "tried", "partnership"],
        }
    }

    /// Category of an arbitrary question.
    ///
    /// Bank questions map exactly; anything else goes to the category whose
    /// keywords it mentions first, defaulting to strategy.
    pub fn classify(question: &str) -> Self {
        let trimmed = question.trim();
        if trimmed == GOAL_QUESTION {
            return Self::Strategy;
        }
        for category in Self::ALL {
            if category.question_bank().iter().any(|(q, _)| *q == trimmed) {
                return category;
            }
        }

        let lower = trimmed.to_lowercase();
        Self::ALL
            .into_iter()
            .filter_map(|category| {
                category
                    .keywords()
                    .iter()
                    .filter_map(|kw| lower.find(kw))
                    .min()
                    .map(|pos| (pos, category))
            })
            .min()
            .map(|(_, category)| category)
            .unwrap_or(Self::Strategy)
    }
}

impl fmt::Display for ContextCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority tier of a clarifying question. Declared highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// A clarifying question. Generated fresh every round and never stored;
/// only its answer is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct ContextQuestion {
    /// The question text (also the key its answer is stored under)
    pub question: String,
    /// Why the answer matters
    pub why_it_matters: String,
    /// Priority tier
    pub priority: Priority,
    /// Knowledge area
    pub category: ContextCategory,
}

/// Result of a discovery round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Discovery {
    /// Questions, high priority first
    pub questions: Vec<ContextQuestion>,
    /// Current completeness (0.0 - 1.0)
    pub context_completeness: f64,
    /// What is known so far
    pub summary: String,
}

/// Result of ingesting a batch of answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct IngestReport {
    /// Completeness after ingestion (0.0 - 1.0)
    pub context_completeness: f64,
    /// What is known so far
    pub summary: String,
    /// Number of non-empty answers merged
    pub accepted: usize,
}

/// Tunables for discovery and scoring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextPolicy {
    /// Maximum questions per discovery round
    pub max_questions: usize,
    /// Answers per category that count as full depth
    pub depth_target: usize,
}

impl Default for ContextPolicy {
    fn default() -> Self {
        Self {
            max_questions: 5,
            depth_target: 3,
        }
    }
}

/// Tracks what a project knows and what to ask next.
#[derive(Debug, Clone, Default)]
pub struct ContextTracker {
    policy: ContextPolicy,
}

impl ContextTracker {
    /// Create a tracker with a custom policy.
    pub fn new(policy: ContextPolicy) -> Self {
        Self {
            policy: ContextPolicy {
                max_questions: policy.max_questions,
                depth_target: policy.depth_target.max(1),
            },
        }
    }

    /// Propose the next clarifying questions. Does not mutate the project.
    pub fn discover(&self, project: &Project) -> Discovery {
        let counts = category_counts(&project.context);
        let mut questions = Vec::new();

        if project.goal.is_none() && !project.context.contains_key(GOAL_QUESTION) {
            questions.push(ContextQuestion {
                question: GOAL_QUESTION.to_string(),
                why_it_matters: "Every idea is judged by how far it moves the goal.".to_string(),
                priority: Priority::High,
                category: ContextCategory::Strategy,
            });
        }

        for category in ContextCategory::ALL {
            let answered = counts.get(&category).copied().unwrap_or(0);
            let priority = if answered == 0 {
                Priority::High
            } else if answered < self.policy.depth_target {
                Priority::Medium
            } else {
                Priority::Low
            };

            questions.extend(
                category
                    .question_bank()
                    .iter()
                    .filter(|(q, _)| !project.context.contains_key(*q))
                    .map(|(q, why)| ContextQuestion {
                        question: (*q).to_string(),
                        why_it_matters: (*why).to_string(),
                        priority,
                        category,
                    }),
            );
        }

        // Stable: within a tier, categories keep discovery order and each
        // category keeps its bank order. Take one question per category per
        // tier first so a single empty category cannot crowd out the rest.
        questions.sort_by_key(|q| q.priority);
        let questions = spread_across_categories(questions, self.policy.max_questions);

        let completeness = self.score(project);
        debug!(
            project_id = %project.id,
            questions = questions.len(),
            completeness,
            "Context discovery round"
        );

        Discovery {
            questions,
            context_completeness: completeness,
            summary: self.summarize(project),
        }
    }

    /// Merge answers into the project's context and rescore it.
    ///
    /// Blank answers are ignored. Later answers overwrite earlier ones for the
    /// same question. An answer to the goal question becomes the project goal
    /// when it has none. Completeness never decreases.
    pub fn ingest(&self, project: &mut Project, answers: &BTreeMap<String, String>) -> IngestReport {
        let mut accepted = 0;
        for (question, answer) in answers {
            let question = question.trim();
            let answer = answer.trim();
            if question.is_empty() || answer.is_empty() {
                continue;
            }
            if question == GOAL_QUESTION && project.goal.is_none() {
                project.goal = Some(answer.to_string());
            }
            project.context.insert(question.to_string(), answer.to_string());
            accepted += 1;
        }

        project.context_completeness = self.score(project);

        debug!(
            project_id = %project.id,
            accepted,
            completeness = project.context_completeness,
            "Context answers ingested"
        );

        IngestReport {
            context_completeness: project.context_completeness,
            summary: self.summarize(project),
            accepted,
        }
    }

    /// Completeness implied by the project's answers, never below its stored value.
    pub fn score(&self, project: &Project) -> f64 {
        let computed = self.completeness_of(&project.context);
        let previous = if project.context_completeness.is_finite() {
            project.context_completeness.clamp(0.0, 1.0)
        } else {
            0.0
        };
        computed.max(previous)
    }

    /// Completeness computed from answers alone.
    pub fn completeness_of(&self, context: &BTreeMap<String, String>) -> f64 {
        let counts = category_counts(context);
        let total = ContextCategory::ALL.len() as f64;
        let target = self.policy.depth_target as f64;

        let breadth = counts.values().filter(|n| **n > 0).count() as f64 / total;
        let depth = ContextCategory::ALL
            .iter()
            .map(|c| counts.get(c).copied().unwrap_or(0).min(self.policy.depth_target) as f64 / target)
            .sum::<f64>()
            / total;

        (BREADTH_WEIGHT * breadth + DEPTH_WEIGHT * depth).clamp(0.0, 1.0)
    }

    /// Human-readable account of what is known and what is missing.
    pub fn summarize(&self, project: &Project) -> String {
        let counts = category_counts(&project.context);
        if counts.is_empty() {
            return match &project.goal {
                Some(goal) => format!("Goal: {goal}. No context gathered yet."),
                None => "No goal or context gathered yet.".to_string(),
            };
        }

        let known: Vec<String> = ContextCategory::ALL
            .iter()
            .filter_map(|c| counts.get(c).map(|n| format!("{c} ({n})")))
            .collect();
        let missing: Vec<&str> = ContextCategory::ALL
            .iter()
            .filter(|c| !counts.contains_key(c))
            .map(|c| c.as_str())
            .collect();

        let mut summary = String::new();
        if let Some(goal) = &project.goal {
            summary.push_str(&format!("Goal: {goal}. "));
        }
        summary.push_str(&format!("Known: {}.", known.join(", ")));
        if !missing.is_empty() {
            summary.push_str(&format!(" Missing: {}.", missing.join(", ")));
        }
        summary
    }

    /// Background block for prompts: goal plus known answers by category.
    ///
    /// Returns `None` when there is nothing worth sending.
    pub fn render_context(&self, project: &Project) -> Option<String> {
        if project.goal.is_none() && project.context.is_empty() {
            return None;
        }

        let mut out = String::new();
        if let Some(goal) = &project.goal {
            out.push_str(&format!("Project goal: {goal}\n"));
        }

        let mut by_category: BTreeMap<ContextCategory, Vec<(&str, &str)>> = BTreeMap::new();
        for (question, answer) in &project.context {
            by_category
                .entry(ContextCategory::classify(question))
                .or_default()
                .push((question.as_str(), answer.as_str()));
        }
        for (category, entries) in by_category {
            out.push_str(&format!("\n[{category}]\n"));
            for (question, answer) in entries {
                out.push_str(&format!("- {question} {answer}\n"));
            }
        }

        Some(out.trim_end().to_string())
    }
}

fn category_counts(context: &BTreeMap<String, String>) -> BTreeMap<ContextCategory, usize> {
    let mut counts = BTreeMap::new();
    for (question, answer) in context {
        if answer.trim().is_empty() {
            continue;
        }
        *counts.entry(ContextCategory::classify(question)).or_insert(0) += 1;
    }
    counts
}

/// Pick up to `limit` questions from a priority-sorted list, round-robin
/// across categories within each tier, preserving tier order.
fn spread_across_categories(sorted: Vec<ContextQuestion>, limit: usize) -> Vec<ContextQuestion> {
    let mut picked: Vec<ContextQuestion> = Vec::with_capacity(limit);
    let mut tiers: BTreeMap<Priority, Vec<ContextQuestion>> = BTreeMap::new();
    for q in sorted {
        tiers.entry(q.priority).or_default().push(q);
    }

    for (_, mut tier) in tiers {
        while !tier.is_empty() && picked.len() < limit {
            let mut seen = BTreeSet::new();
            let mut rest = Vec::new();
            for q in tier {
                if picked.len() < limit && seen.insert(q.category) {
                    picked.push(q);
                } else {
                    rest.push(q);
                }
            }
            tier = rest;
        }
        if picked.len() >= limit {
            break;
        }
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(q, a)| (q.to_string(), a.to_string()))
            .collect()
    }

    fn bank(category: ContextCategory, i: usize) -> &'static str {
        category.question_bank()[i].0
    }

    #[test]
    fn test_classify_bank_and_keywords() {
        assert_eq!(
            ContextCategory::classify(bank(ContextCategory::Finance, 1)),
            ContextCategory::Finance
        );
        assert_eq!(
            ContextCategory::classify("Which customer segment churns most?"),
            ContextCategory::Market
        );
        assert_eq!(
            ContextCategory::classify("How many engineers can we hire?"),
            ContextCategory::Team
        );
        assert_eq!(ContextCategory::classify("Q1"), ContextCategory::Strategy);
    }

    #[test]
    fn test_discover_fresh_project_is_all_high_priority() {
        let tracker = ContextTracker::default();
        let project = Project::new("Launch", Some("100M ARR by 2027".to_string()));

        let discovery = tracker.discover(&project);
        assert_eq!(discovery.questions.len(), 5);
        assert!(discovery.questions.iter().all(|q| q.priority == Priority::High));

        let categories: BTreeSet<_> = discovery.questions.iter().map(|q| q.category).collect();
        assert_eq!(categories.len(), 5);
        assert_eq!(discovery.context_completeness, 0.0);
    }

    #[test]
    fn test_discover_asks_for_missing_goal_first() {
        let tracker = ContextTracker::default();
        let project = Project::new("Launch", None);

        let discovery = tracker.discover(&project);
        assert_eq!(discovery.questions[0].question, GOAL_QUESTION);
        assert_eq!(discovery.questions[0].priority, Priority::High);
    }

    #[test]
    fn test_discover_orders_by_priority_and_skips_answered() {
        let tracker = ContextTracker::new(ContextPolicy {
            max_questions: 20,
            depth_target: 3,
        });
        let mut project = Project::new("Launch", Some("goal".to_string()));
        tracker.ingest(
            &mut project,
            &answers(&[
                (bank(ContextCategory::Product, 0), "A scheduling tool"),
                (bank(ContextCategory::Product, 1), "Double booking"),
                (bank(ContextCategory::Product, 2), "No mobile app"),
                (bank(ContextCategory::Market, 0), "Clinics"),
            ]),
        );

        let discovery = tracker.discover(&project);
        let priorities: Vec<Priority> = discovery.questions.iter().map(|q| q.priority).collect();
        let mut sorted = priorities.clone();
        sorted.sort();
        assert_eq!(priorities, sorted);

        assert!(discovery
            .questions
            .iter()
            .all(|q| !project.context.contains_key(&q.question)));
        assert!(discovery
            .questions
            .iter()
            .filter(|q| q.category == ContextCategory::Market)
            .all(|q| q.priority == Priority::Medium));
        assert!(discovery
            .questions
            .iter()
            .filter(|q| q.category == ContextCategory::Team)
            .all(|q| q.priority == Priority::High));
    }

    #[test]
    fn test_ingest_same_answer_twice_is_idempotent() {
        let tracker = ContextTracker::default();
        let mut project = Project::new("Launch", None);

        let first = tracker.ingest(&mut project, &answers(&[("Q1", "answer")]));
        let second = tracker.ingest(&mut project, &answers(&[("Q1", "answer")]));

        assert_eq!(first.context_completeness, second.context_completeness);
        assert_eq!(project.context.len(), 1);
        assert!(first.context_completeness > 0.0);
    }

    #[test]
    fn test_ingest_ignores_blank_and_overwrites() {
        let tracker = ContextTracker::default();
        let mut project = Project::new("Launch", None);

        let report = tracker.ingest(&mut project, &answers(&[("Q1", "first"), ("Q2", "   ")]));
        assert_eq!(report.accepted, 1);
        assert!(!project.context.contains_key("Q2"));

        tracker.ingest(&mut project, &answers(&[("Q1", "second")]));
        assert_eq!(project.context["Q1"], "second");
    }

    #[test]
    fn test_goal_answer_sets_missing_goal() {
        let tracker = ContextTracker::default();
        let mut project = Project::new("Launch", None);

        tracker.ingest(&mut project, &answers(&[(GOAL_QUESTION, " 100M ARR by 2027 ")]));
        assert_eq!(project.goal.as_deref(), Some("100M ARR by 2027"));
        assert!(tracker
            .discover(&project)
            .questions
            .iter()
            .all(|q| q.question != GOAL_QUESTION));

        tracker.ingest(&mut project, &answers(&[(GOAL_QUESTION, "Profitability")]));
        assert_eq!(project.goal.as_deref(), Some("100M ARR by 2027"));
    }

    #[test]
    fn test_completeness_never_decreases() {
        let tracker = ContextTracker::default();
        let mut project = Project::new("Launch", None);
        let mut last = 0.0;

        let rounds = [
            (bank(ContextCategory::Finance, 0), "$40k MRR"),
            (bank(ContextCategory::Finance, 1), "18 months"),
            (bank(ContextCategory::Team, 0), "Two founders"),
            (bank(ContextCategory::Finance, 0), "$45k MRR"),
            ("Anything else?", "Not really"),
        ];
        for (q, a) in rounds {
            let report = tracker.ingest(&mut project, &answers(&[(q, a)]));
            assert!(report.context_completeness >= last);
            last = report.context_completeness;
        }

        // A stored score from an earlier scorer is never lowered.
        project.context_completeness = 0.99;
        let report = tracker.ingest(&mut project, &answers(&[("Q", "a")]));
        assert_eq!(report.context_completeness, 0.99);
    }

    #[test]
    fn test_full_context_scores_one() {
        let tracker = ContextTracker::default();
        let mut project = Project::new("Launch", Some("goal".to_string()));
        let all: BTreeMap<String, String> = ContextCategory::ALL
            .iter()
            .flat_map(|c| c.question_bank().iter())
            .map(|(q, _)| (q.to_string(), "known".to_string()))
            .collect();

        let report = tracker.ingest(&mut project, &all);
        assert!((report.context_completeness - 1.0).abs() < 1e-9);
        assert!(tracker.discover(&project).questions.is_empty());
        assert!(!report.summary.contains("Missing"));
    }

    #[test]
    fn test_render_context_groups_by_category() {
        let tracker = ContextTracker::default();
        let mut project = Project::new("Launch", Some("100M ARR by 2027".to_string()));
        assert!(tracker.render_context(&Project::new("Empty", None)).is_none());

        tracker.ingest(
            &mut project,
            &answers(&[(bank(ContextCategory::Market, 1), "Calendly, paper")]),
        );
        let rendered = tracker.render_context(&project).unwrap();
        assert!(rendered.starts_with("Project goal: 100M ARR by 2027"));
        assert!(rendered.contains("[market]"));
        assert!(rendered.contains("Calendly, paper"));
    }
}
