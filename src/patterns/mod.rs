//! Pattern definitions, the decoded configuration document, and the store
//! that owns them.
//!
//! A pattern is a regular expression that must match from the start of the
//! utterance. Patterns live in named groups; each group is an ordered list
//! and the first enabled pattern that matches wins.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::SubCategory;

pub mod audit;
pub mod matcher;
pub mod priority;
pub mod store;

pub use audit::{ChangeLog, ChangeRecord};
pub use matcher::Matcher;
pub use priority::{PriorityEntry, PriorityOrder};
pub use store::{PatternGroup, PatternMatch, PatternStore};

/// Built-in pattern document shipped with the crate.
const BUILTIN_PATTERNS: &str = include_str!("../../config/patterns.toml");

/// Errors raised while loading or mutating patterns.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    /// A raw pattern is not a valid regular expression.
    #[error("pattern {group}.{name} failed to compile: {cause}")]
    Compile {
        /// Group holding the pattern.
        group: String,
        /// Pattern name within the group.
        name: String,
        /// Regex engine message.
        cause: String,
    },
    /// Two entries in one group share a name.
    #[error("pattern {group}.{name} is defined more than once")]
    DuplicateName {
        /// Group holding the duplicates.
        group: String,
        /// Repeated name.
        name: String,
    },
    /// Confidence outside `[0.0, 1.0]`.
    #[error("pattern {group}.{name} has confidence {value} outside [0, 1]")]
    InvalidConfidence {
        /// Group holding the pattern.
        group: String,
        /// Pattern name within the group.
        name: String,
        /// Offending value.
        value: f64,
    },
    /// The tier priority list is malformed.
    #[error("invalid priority order: {0}")]
    InvalidPriority(String),
    /// No group with this name is loaded.
    #[error("unknown pattern group: {0}")]
    UnknownGroup(String),
    /// The group exists but has no pattern with this name.
    #[error("unknown pattern {group}.{name}")]
    UnknownPattern {
        /// Group that was searched.
        group: String,
        /// Missing name.
        name: String,
    },
    /// The document itself could not be decoded.
    #[error("failed to parse pattern document: {0}")]
    Parse(#[from] toml::de::Error),
    /// One or more groups were rejected during a load; the rest were installed.
    #[error("{} pattern error(s) while loading; rejected groups: {}", .errors.len(), .rejected.join(", "))]
    Load {
        /// Groups that kept their previous contents.
        rejected: Vec<String>,
        /// Groups that were installed.
        loaded: Vec<String>,
        /// Every individual failure.
        errors: Vec<PatternError>,
    },
}

/// One matchable rule as it appears in the configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternDefinition {
    /// Name, unique within its group.
    pub name: String,
    /// Raw regular expression, matched from the start of the input.
    pub pattern: String,
    /// Sub-category reported on a match.
    pub sub_category: SubCategory,
    /// Author's confidence in the rule; surfaced to operators and used to
    /// order equally similar near misses.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
    /// Disabled patterns are never matched but stay visible.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Free-text description for operators.
    #[serde(default)]
    pub description: String,
    /// Utterances this pattern is expected to match.
    #[serde(default)]
    pub examples: Vec<String>,
    /// Misspelling → canonical word, applied to the input on a retry match.
    #[serde(default)]
    pub typo_variants: BTreeMap<String, String>,
}

fn default_confidence() -> f64 {
    0.8
}

fn default_true() -> bool {
    true
}

/// Decoded configuration document: group name → ordered pattern list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternDocument {
    /// Pattern groups keyed by name; list order is match order.
    #[serde(default)]
    pub patterns: BTreeMap<String, Vec<PatternDefinition>>,
}

impl PatternDocument {
    /// Decode a document from TOML.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::Parse`] on malformed TOML or invalid fields.
    pub fn from_toml(source: &str) -> Result<Self, PatternError> {
        Ok(toml::from_str(source)?)
    }

    /// The document bundled with the crate (`config/patterns.toml`).
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::Parse`] if the bundled file is malformed.
    pub fn builtin() -> Result<Self, PatternError> {
        Self::from_toml(BUILTIN_PATTERNS)
    }

    /// Total number of pattern entries across all groups.
    pub fn len(&self) -> usize {
        self.patterns.values().map(Vec::len).sum()
    }

    /// Whether the document holds no patterns at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Field changes for [`PatternStore::update`]. `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternUpdate {
    /// Replacement raw pattern.
    pub pattern: Option<String>,
    /// Replacement sub-category.
    pub sub_category: Option<SubCategory>,
    /// Replacement confidence.
    pub confidence: Option<f64>,
    /// Enable or disable the pattern.
    pub enabled: Option<bool>,
    /// Replacement description.
    pub description: Option<String>,
    /// Replacement example list.
    pub examples: Option<Vec<String>>,
    /// Replacement typo dictionary.
    pub typo_variants: Option<BTreeMap<String, String>>,
}

impl PatternUpdate {
    /// Names of the fields this update touches, for audit records.
    pub fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.pattern.is_some() {
            fields.push("pattern");
        }
        if self.sub_category.is_some() {
            fields.push("sub_category");
        }
        if self.confidence.is_some() {
            fields.push("confidence");
        }
        if self.enabled.is_some() {
            fields.push("enabled");
        }
        if self.description.is_some() {
            fields.push("description");
        }
        if self.examples.is_some() {
            fields.push("examples");
        }
        if self.typo_variants.is_some() {
            fields.push("typo_variants");
        }
        fields
    }

    /// Apply this update to a copy of `definition`.
    pub fn apply_to(&self, definition: &PatternDefinition) -> PatternDefinition {
        let mut next = definition.clone();
        if let Some(pattern) = &self.pattern {
            next.pattern.clone_from(pattern);
        }
        if let Some(sub) = &self.sub_category {
            next.sub_category = sub.clone();
        }
        if let Some(confidence) = self.confidence {
            next.confidence = confidence;
        }
        if let Some(enabled) = self.enabled {
            next.enabled = enabled;
        }
        if let Some(description) = &self.description {
            next.description.clone_from(description);
        }
        if let Some(examples) = &self.examples {
            next.examples.clone_from(examples);
        }
        if let Some(typos) = &self.typo_variants {
            next.typo_variants.clone_from(typos);
        }
        next
    }
}

/// Check the invariants of one definition before it enters the store.
pub(crate) fn validate_definition(
    group: &str,
    definition: &PatternDefinition,
) -> Result<(), PatternError> {
    if !(0.0..=1.0).contains(&definition.confidence) {
        return Err(PatternError::InvalidConfidence {
            group: group.to_owned(),
            name: definition.name.clone(),
            value: definition.confidence,
        });
    }
    Matcher::compile(&definition.pattern).map_err(|e| PatternError::Compile {
        group: group.to_owned(),
        name: definition.name.clone(),
        cause: e.to_string(),
    })?;
    Ok(())
}
