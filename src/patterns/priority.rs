//! The fixed tier sequence the pattern fast path walks.
//!
//! Order is business logic: the first group in this list that matches an
//! utterance decides its category, so the list is an explicit `Vec`, never a
//! map or set.

use serde::{Deserialize, Serialize};

use super::PatternError;
use crate::types::Category;

/// One tier: which group to try, which category it yields, and the
/// confidence a match in it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityEntry {
    /// Pattern group name.
    pub group: String,
    /// Category reported when the group matches.
    pub category: Category,
    /// Confidence reported when the group matches.
    pub base_confidence: f64,
}

impl PriorityEntry {
    fn new(group: &str, category: Category, base_confidence: f64) -> Self {
        Self {
            group: group.to_owned(),
            category,
            base_confidence,
        }
    }
}

/// Validated, immutable tier order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PriorityEntry>", into = "Vec<PriorityEntry>")]
pub struct PriorityOrder {
    entries: Vec<PriorityEntry>,
}

impl Default for PriorityOrder {
    /// emergency > instant > gesture > self-improvement > action > memory > query
    fn default() -> Self {
        Self {
            entries: vec![
                PriorityEntry::new("emergency", Category::Emergency, 0.95),
                PriorityEntry::new("instant", Category::Instant, 0.95),
                PriorityEntry::new("gesture", Category::Gesture, 0.9),
                PriorityEntry::new("self_improvement", Category::SelfImprovement, 0.85),
                PriorityEntry::new("action", Category::Action, 0.9),
                PriorityEntry::new("memory", Category::Memory, 0.85),
                PriorityEntry::new("query", Category::Query, 0.8),
            ],
        }
    }
}

impl PriorityOrder {
    /// Validate a tier list: non-empty, unique group names, confidences in
    /// `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::InvalidPriority`] describing the first problem.
    pub fn new(entries: Vec<PriorityEntry>) -> Result<Self, PatternError> {
        if entries.is_empty() {
            return Err(PatternError::InvalidPriority(
                "priority order must name at least one group".to_owned(),
            ));
        }
        for (i, entry) in entries.iter().enumerate() {
            if !(0.0..=1.0).contains(&entry.base_confidence) {
                return Err(PatternError::InvalidPriority(format!(
                    "group {} has base confidence {} outside [0, 1]",
                    entry.group, entry.base_confidence
                )));
            }
            if entries.iter().take(i).any(|e| e.group == entry.group) {
                return Err(PatternError::InvalidPriority(format!(
                    "group {} appears more than once",
                    entry.group
                )));
            }
        }
        Ok(Self { entries })
    }

    /// Tiers in the order they are tried.
    pub fn entries(&self) -> &[PriorityEntry] {
        &self.entries
    }

    /// Tier index of a group, if it is part of the order.
    pub fn position(&self, group: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.group == group)
    }

    /// Tier entry for a group.
    pub fn entry(&self, group: &str) -> Option<&PriorityEntry> {
        self.entries.iter().find(|e| e.group == group)
    }
}

impl TryFrom<Vec<PriorityEntry>> for PriorityOrder {
    type Error = PatternError;

    fn try_from(value: Vec<PriorityEntry>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PriorityOrder> for Vec<PriorityEntry> {
    fn from(value: PriorityOrder) -> Self {
        value.entries
    }
}
