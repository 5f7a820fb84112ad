//! Health report generation.
//!
//! Four issue kinds are detected from the retained records. Reports are
//! derived on demand and never stored.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{agree, ClassificationRecord, MonitorConfig, MonitorState};
use crate::types::Method;

/// How urgently an issue needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueSeverity {
    /// Worth a look.
    Info,
    /// Classification quality is affected.
    Warning,
}

impl IssueSeverity {
    fn rank(self) -> u8 {
        match self {
            Self::Info => 0,
            Self::Warning => 1,
        }
    }
}

/// Kind of systemic problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    /// One normalized input, several outcomes.
    InconsistentClassification,
    /// A pattern keeps narrowly missing the same input.
    FrequentNearMiss,
    /// Too many outcomes not decided by a pattern.
    HighFailureRate,
    /// Mean confidence of the last `min_samples` records sits below the
    /// floor, whatever the overall average.
    ConfidenceDrift,
}

/// Evidence supporting an issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    /// Human-readable summary.
    pub summary: String,
    /// Key-value details.
    pub details: serde_json::Value,
}

/// A detected problem with evidence and a suggested remedy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthIssue {
    /// Which problem.
    pub kind: IssueKind,
    /// How urgent.
    pub severity: IssueSeverity,
    /// Supporting data.
    pub evidence: Evidence,
    /// What an operator should do.
    pub suggested_action: String,
    /// Whether a diagnostics suggestion can fix it without a human rewrite.
    pub auto_fixable: bool,
}

/// Aggregate snapshot of classification health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// When the snapshot was taken.
    pub generated_at: DateTime<Utc>,
    /// Retained records.
    pub total_records: usize,
    /// Distinct normalized inputs.
    pub unique_inputs: usize,
    /// Inputs whose records disagree.
    pub inconsistent_inputs: usize,
    /// Share of inputs with consistent outcomes; 1.0 with no history.
    pub consistency_score: f64,
    /// Mean confidence over all records; 0.0 with no history.
    pub average_confidence: f64,
    /// Mean confidence over the last `min_samples` records; the drift check
    /// compares this against the floor.
    pub recent_confidence: f64,
    /// Share of records per deciding tier.
    pub method_rates: BTreeMap<Method, f64>,
    /// Share of records the pattern tier did not decide.
    pub failure_rate: f64,
    /// Near misses per pattern id, across all inputs.
    pub near_miss_counts: BTreeMap<String, u64>,
    /// Failure reasons across recorded near misses.
    pub failure_reasons: BTreeMap<String, u64>,
    /// Detected problems, warnings first.
    pub issues: Vec<HealthIssue>,
    /// Deduplicated remedies, in issue order.
    pub recommendations: Vec<String>,
}

impl HealthReport {
    /// Issues of one kind.
    pub fn issues_of(&self, kind: IssueKind) -> impl Iterator<Item = &HealthIssue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    /// Whether no warning-level issue was found.
    pub fn is_healthy(&self) -> bool {
        self.issues
            .iter()
            .all(|i| i.severity != IssueSeverity::Warning)
    }
}

const ALL_METHODS: [Method; 4] = [
    Method::Pattern,
    Method::Heuristic,
    Method::Llm,
    Method::PatternFailed,
];

pub(super) fn build(state: &MonitorState, config: &MonitorConfig) -> HealthReport {
    let records = state.records();
    let total = records.len();
    let total_u64 = u64::try_from(total).unwrap_or(u64::MAX);

    let mut hashes: Vec<&String> = state.by_hash.keys().collect();
    hashes.sort();
    let unique_inputs = hashes.len();

    let mut issues = Vec::new();
    let mut inconsistent_inputs: usize = 0;
    for hash in hashes {
        let Some(bucket) = state.by_hash.get(hash) else {
            continue;
        };
        if agree(bucket) {
            continue;
        }
        inconsistent_inputs = inconsistent_inputs.saturating_add(1);
        let records: Vec<&ClassificationRecord> = bucket.iter().collect();
        issues.push(inconsistency_issue(hash, &records));
    }

    let consistency_score = if unique_inputs == 0 {
        1.0
    } else {
        share(
            unique_inputs.saturating_sub(inconsistent_inputs),
            unique_inputs,
        )
    };

    let method_rates: BTreeMap<Method, f64> = ALL_METHODS
        .iter()
        .map(|m| {
            let count = state.counters.methods.get(m).copied().unwrap_or(0);
            (*m, share_u64(count, total_u64))
        })
        .collect();
    let decided_by_pattern = state
        .counters
        .methods
        .get(&Method::Pattern)
        .copied()
        .unwrap_or(0);
    let failure_rate = if total == 0 {
        0.0
    } else {
        share_u64(total_u64.saturating_sub(decided_by_pattern), total_u64)
    };

    let average_confidence = mean(records.iter().map(|r| r.confidence));
    let enough = total >= config.min_samples && total > 0;

    if enough && failure_rate > config.failure_rate_threshold {
        issues.push(HealthIssue {
            kind: IssueKind::HighFailureRate,
            severity: IssueSeverity::Warning,
            evidence: Evidence {
                summary: format!(
                    "{:.0}% of {total} classifications missed the pattern tier",
                    failure_rate * 100.0
                ),
                details: json!({
                    "failure_rate": failure_rate,
                    "threshold": config.failure_rate_threshold,
                    "total": total,
                }),
            },
            suggested_action: "Add patterns for frequent inputs that reach the heuristic or model tiers"
                .to_owned(),
            auto_fixable: false,
        });
    }

    let mut frequent: Vec<(&str, &str, u64)> = state
        .counters
        .near_miss_pairs
        .iter()
        .filter(|(_, count)| **count >= config.near_miss_repeat_threshold)
        .map(|((id, hash), count)| (id.as_str(), hash.as_str(), *count))
        .collect();
    frequent.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| (a.0, a.1).cmp(&(b.0, b.1))));
    for (id, hash, count) in frequent {
        let same_input: Vec<&ClassificationRecord> = state
            .by_hash
            .get(hash)
            .map(|r| r.iter().collect())
            .unwrap_or_default();
        issues.push(near_miss_issue(id, hash, count, &same_input));
    }

    let window = config.min_samples.max(1);
    let recent_confidence = mean(records.iter().rev().take(window).map(|r| r.confidence));
    if enough && recent_confidence < config.confidence_floor {
        issues.push(HealthIssue {
            kind: IssueKind::ConfidenceDrift,
            severity: IssueSeverity::Info,
            evidence: Evidence {
                summary: format!(
                    "average confidence of the last {window} classifications is {recent_confidence:.2}"
                ),
                details: json!({
                    "recent_average": recent_confidence,
                    "overall_average": average_confidence,
                    "floor": config.confidence_floor,
                    "window": window,
                }),
            },
            suggested_action: "Review recent low-confidence inputs and tune thresholds or patterns"
                .to_owned(),
            auto_fixable: false,
        });
    }

    issues.sort_by(|a, b| b.severity.rank().cmp(&a.severity.rank()));

    let mut recommendations: Vec<String> = Vec::new();
    for issue in &issues {
        if !recommendations.contains(&issue.suggested_action) {
            recommendations.push(issue.suggested_action.clone());
        }
    }

    HealthReport {
        generated_at: Utc::now(),
        total_records: total,
        unique_inputs,
        inconsistent_inputs,
        consistency_score,
        average_confidence,
        recent_confidence,
        method_rates,
        failure_rate,
        near_miss_counts: state.counters.near_misses.clone(),
        failure_reasons: state.counters.failure_reasons.clone(),
        issues,
        recommendations,
    }
}

fn inconsistency_issue(hash: &str, records: &[&ClassificationRecord]) -> HealthIssue {
    let mut outcomes: BTreeMap<String, u64> = BTreeMap::new();
    for record in records {
        let key = format!("{}/{}", record.category, record.sub_category.as_str());
        let count = outcomes.entry(key).or_default();
        *count = count.saturating_add(1);
    }
    let text = records.first().map(|r| r.text.as_str()).unwrap_or_default();
    HealthIssue {
        kind: IssueKind::InconsistentClassification,
        severity: IssueSeverity::Warning,
        evidence: Evidence {
            summary: format!("\"{text}\" was classified {} different ways", outcomes.len()),
            details: json!({
                "input_hash": hash,
                "text": text,
                "outcomes": outcomes,
            }),
        },
        suggested_action: format!("Add or tighten a pattern so \"{text}\" always resolves the same way"),
        auto_fixable: false,
    }
}

fn near_miss_issue(
    id: &str,
    hash: &str,
    count: u64,
    records: &[&ClassificationRecord],
) -> HealthIssue {
    let mut reasons: BTreeMap<&str, u64> = BTreeMap::new();
    for miss in records
        .iter()
        .flat_map(|r| r.near_misses.iter())
        .filter(|m| m.pattern == id)
    {
        let n = reasons.entry(miss.failure_reason.as_str()).or_default();
        *n = n.saturating_add(1);
    }
    let text = records.first().map(|r| r.text.as_str()).unwrap_or_default();
    HealthIssue {
        kind: IssueKind::FrequentNearMiss,
        severity: IssueSeverity::Info,
        evidence: Evidence {
            summary: format!("pattern {id} narrowly missed \"{text}\" {count} times"),
            details: json!({
                "pattern": id,
                "input_hash": hash,
                "text": text,
                "count": count,
                "failure_reasons": reasons,
            }),
        },
        suggested_action: format!("Apply the diagnostics suggestion for {id}"),
        auto_fixable: true,
    }
}

#[allow(clippy::cast_precision_loss)]
fn share(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64
}

#[allow(clippy::cast_precision_loss)]
fn share_u64(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64
}

#[allow(clippy::cast_precision_loss)]
fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0_u64), |(sum, n), v| (sum + v, n.saturating_add(1)));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}
