//! Classification health monitor.
//!
//! Every classification is recorded under the hash of its normalized input.
//! Records that share a hash are expected to agree on category and
//! sub-category; when they do not, the report says so. Old records are
//! evicted inline on every `record` call, by age and by count.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::classifier::ClassificationResult;
use crate::diagnostics::{FailureReason, NearMiss};
use crate::types::{Category, Method, SubCategory};

pub mod report;

pub use report::{Evidence, HealthIssue, HealthReport, IssueKind, IssueSeverity};

/// Invalid monitor configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MonitorError {
    /// A ratio threshold outside `[0, 1]`.
    #[error("monitor.{field} must be within [0, 1], got {value}")]
    RatioOutOfRange {
        /// Offending field.
        field: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A count or duration that must be positive.
    #[error("monitor.{0} must be greater than zero")]
    Zero(&'static str),
}

/// Retention and alerting thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Records older than this are evicted.
    pub retention_hours: u64,
    /// Hard cap on retained records; the oldest go first.
    pub max_records: usize,
    /// Near misses of one pattern on one normalized input before the pair
    /// is reported.
    pub near_miss_repeat_threshold: u64,
    /// Share of outcomes not decided by a pattern that counts as a high
    /// failure rate.
    pub failure_rate_threshold: f64,
    /// Mean confidence of the last `min_samples` records below this is
    /// reported as drift.
    pub confidence_floor: f64,
    /// Records required before rate and drift issues are raised; also the
    /// size of the drift window.
    pub min_samples: usize,
    /// Raw text kept per record, in characters.
    pub max_text_chars: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            retention_hours: 168,
            max_records: 10_000,
            near_miss_repeat_threshold: 3,
            failure_rate_threshold: 0.3,
            confidence_floor: 0.6,
            min_samples: 20,
            max_text_chars: 100,
        }
    }
}

impl MonitorConfig {
    /// Check every threshold.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError`] for out-of-range ratios or zero limits.
    pub fn validate(&self) -> Result<(), MonitorError> {
        for (field, value) in [
            ("failure_rate_threshold", self.failure_rate_threshold),
            ("confidence_floor", self.confidence_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(MonitorError::RatioOutOfRange { field, value });
            }
        }
        if self.retention_hours == 0 {
            return Err(MonitorError::Zero("retention_hours"));
        }
        if self.max_records == 0 {
            return Err(MonitorError::Zero("max_records"));
        }
        if self.near_miss_repeat_threshold == 0 {
            return Err(MonitorError::Zero("near_miss_repeat_threshold"));
        }
        Ok(())
    }

    fn retention(&self) -> TimeDelta {
        i64::try_from(self.retention_hours)
            .ok()
            .and_then(TimeDelta::try_hours)
            .unwrap_or(TimeDelta::MAX)
    }
}

/// One retained classification outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationRecord {
    /// SHA-256 of the normalized input, hex encoded.
    pub input_hash: String,
    /// Input truncated to `max_text_chars`.
    pub text: String,
    /// Chosen category.
    pub category: Category,
    /// Chosen sub-category.
    pub sub_category: SubCategory,
    /// Final confidence.
    pub confidence: f64,
    /// Deciding tier.
    pub method: Method,
    /// Pattern behind the result, if any.
    pub matched_pattern: Option<String>,
    /// Failing patterns that came close, closest first.
    pub near_misses: Vec<RecordedMiss>,
    /// Why the closest pattern failed.
    pub failure_reason: Option<FailureReason>,
    /// When the outcome was recorded.
    pub timestamp: DateTime<Utc>,
}

/// A near miss as kept on a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedMiss {
    /// `group.name` of the pattern.
    pub pattern: String,
    /// Why it failed.
    pub failure_reason: FailureReason,
}

impl From<&NearMiss> for RecordedMiss {
    fn from(miss: &NearMiss) -> Self {
        Self {
            pattern: format!("{}.{}", miss.group, miss.name),
            failure_reason: miss.failure_reason,
        }
    }
}

/// Record and bucket counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    /// Retained records.
    pub records: usize,
    /// Distinct normalized inputs.
    pub unique_inputs: usize,
}

/// Counters kept in step with the retained records.
#[derive(Debug, Default)]
struct Counters {
    methods: BTreeMap<Method, u64>,
    near_misses: BTreeMap<String, u64>,
    /// Keyed by (pattern id, input hash).
    near_miss_pairs: BTreeMap<(String, String), u64>,
    failure_reasons: BTreeMap<String, u64>,
}

impl Counters {
    fn add(&mut self, record: &ClassificationRecord) {
        bump(self.methods.entry(record.method).or_default());
        for miss in &record.near_misses {
            bump(self.near_misses.entry(miss.pattern.clone()).or_default());
            bump(
                self.near_miss_pairs
                    .entry((miss.pattern.clone(), record.input_hash.clone()))
                    .or_default(),
            );
        }
        if let Some(reason) = record.failure_reason {
            bump(
                self.failure_reasons
                    .entry(reason.as_str().to_owned())
                    .or_default(),
            );
        }
    }

    fn remove(&mut self, record: &ClassificationRecord) {
        drop_count(&mut self.methods, &record.method);
        for miss in &record.near_misses {
            drop_count(&mut self.near_misses, miss.pattern.as_str());
            drop_count(
                &mut self.near_miss_pairs,
                &(miss.pattern.clone(), record.input_hash.clone()),
            );
        }
        if let Some(reason) = record.failure_reason {
            drop_count(&mut self.failure_reasons, reason.as_str());
        }
    }
}

fn bump(count: &mut u64) {
    *count = count.saturating_add(1);
}

fn drop_count<K, Q>(map: &mut BTreeMap<K, u64>, key: &Q)
where
    K: std::borrow::Borrow<Q> + Ord,
    Q: Ord + ?Sized,
{
    if let Some(count) = map.get_mut(key) {
        *count = count.saturating_sub(1);
        if *count == 0 {
            map.remove(key);
        }
    }
}

#[derive(Debug, Default)]
struct MonitorState {
    by_hash: HashMap<String, VecDeque<ClassificationRecord>>,
    /// Arrival order across all hashes: (timestamp, hash).
    order: VecDeque<(DateTime<Utc>, String)>,
    counters: Counters,
}

impl MonitorState {
    fn evict_oldest(&mut self) -> bool {
        let Some((_, hash)) = self.order.pop_front() else {
            return false;
        };
        let emptied = match self.by_hash.get_mut(&hash) {
            Some(bucket) => {
                if let Some(record) = bucket.pop_front() {
                    self.counters.remove(&record);
                }
                bucket.is_empty()
            }
            None => false,
        };
        if emptied {
            self.by_hash.remove(&hash);
        }
        true
    }

    /// Every retained record in arrival order.
    fn records(&self) -> Vec<&ClassificationRecord> {
        let mut cursors: HashMap<&str, usize> = HashMap::new();
        self.order
            .iter()
            .filter_map(|(_, hash)| {
                let cursor = cursors.entry(hash.as_str()).or_default();
                let record = self.by_hash.get(hash)?.get(*cursor);
                *cursor = cursor.saturating_add(1);
                record
            })
            .collect()
    }
}

/// Normalize an utterance for hashing: lowercase, whitespace collapsed.
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Hex SHA-256 of the normalized input.
pub fn input_hash(text: &str) -> String {
    hex::encode(Sha256::digest(normalize(text).as_bytes()))
}

/// Process-local classification history with inline eviction.
#[derive(Debug, Default)]
pub struct HealthMonitor {
    config: MonitorConfig,
    state: RwLock<MonitorState>,
}

impl HealthMonitor {
    /// Monitor with validated thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError`] if `config` fails validation.
    pub fn new(config: MonitorConfig) -> Result<Self, MonitorError> {
        config.validate()?;
        Ok(Self {
            config,
            state: RwLock::new(MonitorState::default()),
        })
    }

    /// Current thresholds.
    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Record a classification now.
    pub fn record(
        &self,
        result: &ClassificationResult,
        near_misses: &[NearMiss],
    ) -> ClassificationRecord {
        self.record_at(result, near_misses, Utc::now())
    }

    /// Record a classification with an explicit timestamp.
    ///
    /// Eviction treats arrival order as age, so timestamps are expected to
    /// be non-decreasing.
    pub fn record_at(
        &self,
        result: &ClassificationResult,
        near_misses: &[NearMiss],
        at: DateTime<Utc>,
    ) -> ClassificationRecord {
        let record = ClassificationRecord {
            input_hash: input_hash(&result.text),
            text: result
                .text
                .trim()
                .chars()
                .take(self.config.max_text_chars)
                .collect(),
            category: result.category,
            sub_category: result.sub_category.clone(),
            confidence: result.confidence,
            method: result.method,
            matched_pattern: result.matched_pattern.clone(),
            near_misses: near_misses.iter().map(RecordedMiss::from).collect(),
            failure_reason: near_misses.first().map(|m| m.failure_reason),
            timestamp: at,
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.counters.add(&record);
        state
            .order
            .push_back((record.timestamp, record.input_hash.clone()));
        state
            .by_hash
            .entry(record.input_hash.clone())
            .or_default()
            .push_back(record.clone());

        let cutoff = at.checked_sub_signed(self.config.retention());
        let mut evicted: usize = 0;
        loop {
            let expired = match (state.order.front(), cutoff) {
                (Some((ts, _)), Some(cutoff)) => *ts < cutoff,
                _ => false,
            };
            if !expired && state.order.len() <= self.config.max_records {
                break;
            }
            if !state.evict_oldest() {
                break;
            }
            evicted = evicted.saturating_add(1);
        }
        if evicted > 0 {
            debug!(
                evicted,
                retained = state.order.len(),
                "classification records pruned"
            );
        }
        record
    }

    /// Whether every record for `hash` agrees on category and sub-category.
    /// Unknown hashes are consistent.
    pub fn check_consistency(&self, hash: &str) -> bool {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.by_hash.get(hash).map_or(true, agree)
    }

    /// Records retained for `hash`, oldest first.
    pub fn records_for(&self, hash: &str) -> Vec<ClassificationRecord> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state
            .by_hash
            .get(hash)
            .map(|records| records.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Record and bucket counts.
    pub fn stats(&self) -> MonitorStats {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        MonitorStats {
            records: state.order.len(),
            unique_inputs: state.by_hash.len(),
        }
    }

    /// Drop all history.
    pub fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *state = MonitorState::default();
    }

    /// Build a report from a consistent snapshot. Has no side effects.
    pub fn generate_report(&self) -> HealthReport {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        report::build(&state, &self.config)
    }
}

fn agree(records: &VecDeque<ClassificationRecord>) -> bool {
    let mut outcomes = records.iter().map(|r| (r.category, &r.sub_category));
    match outcomes.next() {
        Some(first) => outcomes.all(|o| o == first),
        None => true,
    }
}
