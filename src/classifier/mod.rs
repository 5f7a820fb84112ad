//! Tiered intent classification.
//!
//! Each call walks `pattern → heuristic → llm`, stopping at the first tier
//! whose confidence meets its threshold. The LLM tier is terminal. Context
//! evaluation runs once up front and is attached to whatever result comes
//! out.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::patterns::{PatternMatch, PatternStore, PriorityEntry};
use crate::types::{Category, Method, SubCategory};

pub mod context;
pub mod heuristics;
pub mod llm;

pub use context::{
    ClassificationContext, ContextError, ContextEvaluation, EmotionalTone, UrgencyLevel,
};
pub use heuristics::HeuristicVerdict;
pub use llm::{IntentModel, ModelError, ModelRequest, ModelVerdict};

/// Per-tier acceptance thresholds and the LLM bound.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Minimum base confidence for a pattern match to be accepted.
    pub pattern_threshold: f64,
    /// Minimum heuristic confidence to stop before the LLM tier.
    pub heuristic_threshold: f64,
    /// Upper bound on one LLM call, in milliseconds.
    pub llm_timeout_ms: u64,
    /// Attach a diagnostics headline to results that miss the pattern tier.
    pub diagnose_failures: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            pattern_threshold: 0.7,
            heuristic_threshold: 0.6,
            llm_timeout_ms: 5000,
            diagnose_failures: true,
        }
    }
}

impl ClassifierConfig {
    /// The LLM timeout as a [`Duration`].
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_millis(self.llm_timeout_ms)
    }
}

/// What one tier proposed and whether it was accepted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierAttempt {
    /// Tier that ran.
    pub tier: Method,
    /// Category it proposed, if any.
    pub category: Option<Category>,
    /// Confidence of the proposal.
    pub confidence: f64,
    /// Whether the proposal met the tier threshold.
    pub accepted: bool,
    /// Pattern id, heuristic rule, or model id.
    pub detail: String,
}

/// Final outcome of one classification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    /// Trimmed input.
    pub text: String,
    /// Chosen category.
    pub category: Category,
    /// Chosen sub-category.
    pub sub_category: SubCategory,
    /// Confidence of the deciding tier; 0.0 when degraded.
    pub confidence: f64,
    /// Tier that produced the result.
    pub method: Method,
    /// `group.name` of the pattern behind the result, if any.
    pub matched_pattern: Option<String>,
    /// Scheduling priority for the caller.
    pub priority: u8,
    /// Urgency, tone, and entity signals.
    pub context: ContextEvaluation,
    /// Every tier that ran, in order.
    pub tiers: Vec<TierAttempt>,
    /// Degradation notes and diagnostics headlines.
    pub notes: Vec<String>,
    /// Wall-clock time spent classifying.
    pub elapsed_ms: f64,
}

impl ClassificationResult {
    /// Whether no tier produced a usable answer.
    pub fn is_degraded(&self) -> bool {
        self.method == Method::PatternFailed || self.confidence <= 0.0
    }
}

/// Best answer seen so far, carried forward for degradation.
#[derive(Debug, Clone)]
struct Candidate {
    category: Category,
    sub_category: SubCategory,
    confidence: f64,
    matched_pattern: Option<String>,
}

impl Candidate {
    fn from_pattern(found: &PatternMatch, entry: &PriorityEntry) -> Self {
        Self {
            category: entry.category,
            sub_category: found.sub_category.clone(),
            confidence: entry.base_confidence,
            matched_pattern: Some(found.pattern_id()),
        }
    }

    fn from_heuristic(verdict: &HeuristicVerdict) -> Self {
        Self {
            category: verdict.category,
            sub_category: verdict.sub_category.clone(),
            confidence: verdict.confidence,
            matched_pattern: None,
        }
    }

    fn fallback() -> Self {
        Self {
            category: Category::Conversation,
            sub_category: SubCategory::general(),
            confidence: 0.0,
            matched_pattern: None,
        }
    }
}

/// Orchestrates the three tiers over a shared store and optional model.
pub struct Classifier {
    store: Arc<PatternStore>,
    model: Option<Arc<dyn IntentModel>>,
    config: ClassifierConfig,
}

impl Classifier {
    /// Classifier without an LLM tier; calls that reach it degrade.
    pub fn new(store: Arc<PatternStore>, config: ClassifierConfig) -> Self {
        Self {
            store,
            model: None,
            config,
        }
    }

    /// Attach the LLM collaborator.
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn IntentModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Current thresholds.
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// The shared pattern store.
    pub fn store(&self) -> &Arc<PatternStore> {
        &self.store
    }

    /// Walk the priority order; the first group with a match wins.
    pub fn pattern_tier(&self, text: &str) -> Option<(PatternMatch, PriorityEntry)> {
        self.store.priority().entries().iter().find_map(|entry| {
            self.store
                .match_first(&entry.group, text)
                .map(|found| (found, entry.clone()))
        })
    }

    /// Classify one utterance. Never fails: model errors, timeouts, and
    /// unusable replies produce a degraded result with a note.
    pub async fn classify(
        &self,
        text: &str,
        context: &ClassificationContext,
    ) -> ClassificationResult {
        let started = Instant::now();
        let text = text.trim();
        let evaluation = context::evaluate(text, context);
        let mut tiers = Vec::new();
        let mut notes = Vec::new();
        let mut best: Option<Candidate> = None;

        let finish = |method: Method,
                      candidate: Candidate,
                      tiers: Vec<TierAttempt>,
                      notes: Vec<String>,
                      evaluation: ContextEvaluation| {
            let priority = context::priority_score(candidate.category, evaluation.urgency);
            debug!(
                method = %method,
                category = %candidate.category,
                confidence = candidate.confidence,
                "classification decided"
            );
            ClassificationResult {
                text: text.to_owned(),
                category: candidate.category,
                sub_category: candidate.sub_category,
                confidence: candidate.confidence,
                method,
                matched_pattern: candidate.matched_pattern,
                priority,
                context: evaluation,
                tiers,
                notes,
                elapsed_ms: started.elapsed().as_secs_f64() * 1000.0,
            }
        };

        // Pattern tier.
        match self.pattern_tier(text) {
            Some((found, entry)) => {
                let candidate = Candidate::from_pattern(&found, &entry);
                let accepted = candidate.confidence >= self.config.pattern_threshold;
                tiers.push(TierAttempt {
                    tier: Method::Pattern,
                    category: Some(candidate.category),
                    confidence: candidate.confidence,
                    accepted,
                    detail: found.pattern_id(),
                });
                if accepted {
                    return finish(Method::Pattern, candidate, tiers, notes, evaluation);
                }
                debug!(pattern = %found.pattern_id(), "pattern below threshold, escalating");
                best = Some(candidate);
            }
            None => {
                tiers.push(TierAttempt {
                    tier: Method::Pattern,
                    category: None,
                    confidence: 0.0,
                    accepted: false,
                    detail: "no match".to_owned(),
                });
            }
        }

        // Heuristic tier.
        let verdict = {
            let input = heuristics::HeuristicInput::new(text, context, &evaluation);
            heuristics::evaluate(&input)
        };
        let accepted = verdict.confidence >= self.config.heuristic_threshold;
        tiers.push(TierAttempt {
            tier: Method::Heuristic,
            category: Some(verdict.category),
            confidence: verdict.confidence,
            accepted,
            detail: verdict.rule.to_owned(),
        });
        let heuristic = Candidate::from_heuristic(&verdict);
        if accepted {
            return finish(Method::Heuristic, heuristic, tiers, notes, evaluation);
        }
        let heuristic_is_better = match &best {
            Some(b) => heuristic.confidence > b.confidence,
            None => true,
        };
        if heuristic_is_better {
            best = Some(heuristic);
        }

        // LLM tier.
        let Some(model) = &self.model else {
            notes.push("llm tier not configured".to_owned());
            return finish(
                Method::PatternFailed,
                degrade(best),
                tiers,
                notes,
                evaluation,
            );
        };

        let timeout = self.config.llm_timeout();
        let reply =
            match tokio::time::timeout(timeout, model.complete(ModelRequest::classify(text))).await
            {
                Ok(reply) => reply,
                Err(_) => Err(ModelError::Timeout(timeout)),
            };

        match reply {
            Ok(reply) => match llm::parse_reply(&reply) {
                Ok(verdict) => {
                    tiers.push(TierAttempt {
                        tier: Method::Llm,
                        category: Some(verdict.category),
                        confidence: verdict.confidence,
                        accepted: true,
                        detail: model.model_id().to_owned(),
                    });
                    let candidate = Candidate {
                        category: verdict.category,
                        sub_category: verdict.sub_category,
                        confidence: verdict.confidence,
                        matched_pattern: None,
                    };
                    finish(Method::Llm, candidate, tiers, notes, evaluation)
                }
                Err(e) => {
                    warn!(model = %model.model_id(), error = %e, "unusable model reply");
                    tiers.push(TierAttempt {
                        tier: Method::Llm,
                        category: None,
                        confidence: 0.0,
                        accepted: true,
                        detail: model.model_id().to_owned(),
                    });
                    notes.push(format!("model reply rejected: {e}"));
                    finish(Method::Llm, Candidate::fallback(), tiers, notes, evaluation)
                }
            },
            Err(e) => {
                warn!(model = %model.model_id(), error = %e, "model call failed, degrading");
                tiers.push(TierAttempt {
                    tier: Method::Llm,
                    category: None,
                    confidence: 0.0,
                    accepted: false,
                    detail: model.model_id().to_owned(),
                });
                notes.push(e.to_string());
                finish(
                    Method::PatternFailed,
                    degrade(best),
                    tiers,
                    notes,
                    evaluation,
                )
            }
        }
    }
}

/// Keep the best pre-LLM category, zero the confidence.
fn degrade(best: Option<Candidate>) -> Candidate {
    let mut candidate = best.unwrap_or_else(Candidate::fallback);
    candidate.confidence = 0.0;
    candidate
}
