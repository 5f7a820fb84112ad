//! Closed vocabulary shared by every tier: categories, sub-categories, and
//! the classification method that produced a result.
//!
//! Free-form strings coming from configuration or the model collaborator are
//! validated once here; everything downstream works with typed values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Errors raised when boundary strings do not fit the closed vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// The category name is not one of the known intents.
    #[error("unknown category: {0:?}")]
    UnknownCategory(String),
    /// The sub-category is empty or contains characters outside `[a-z0-9_]`.
    #[error("invalid sub-category: {0:?}")]
    InvalidSubCategory(String),
}

/// Top-level intent bucket routing to a downstream handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Life-safety requests that pre-empt everything else.
    Emergency,
    /// Fast answers that need no handler state (time, date).
    Instant,
    /// Short social signals (greetings, thanks).
    Gesture,
    /// Requests to change the assistant's own behavior.
    SelfImprovement,
    /// Device control and other side-effecting commands.
    Action,
    /// Requests to store or recall personal facts.
    Memory,
    /// Information lookups.
    Query,
    /// Open-ended conversation and the low-confidence fallback.
    Conversation,
}

impl Category {
    /// Every category, in a stable order.
    pub const ALL: [Category; 8] = [
        Self::Emergency,
        Self::Instant,
        Self::Gesture,
        Self::SelfImprovement,
        Self::Action,
        Self::Memory,
        Self::Query,
        Self::Conversation,
    ];

    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Emergency => "emergency",
            Self::Instant => "instant",
            Self::Gesture => "gesture",
            Self::SelfImprovement => "self_improvement",
            Self::Action => "action",
            Self::Memory => "memory",
            Self::Query => "query",
            Self::Conversation => "conversation",
        }
    }

    /// Scheduling priority before any urgency boost (1 = lowest, 10 = highest).
    pub fn base_priority(self) -> u8 {
        match self {
            Self::Emergency => 10,
            Self::Instant => 7,
            Self::Gesture => 4,
            Self::SelfImprovement => 3,
            Self::Action => 6,
            Self::Memory => 5,
            Self::Query => 5,
            Self::Conversation => 3,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| TypeError::UnknownCategory(s.to_owned()))
    }
}

/// Handler-specific refinement of a category (e.g. `switch`, `time_query`).
///
/// Always a non-empty lowercase identifier made of `[a-z0-9_]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubCategory(String);

impl SubCategory {
    /// Validate and wrap a sub-category name.
    ///
    /// # Errors
    ///
    /// Returns [`TypeError::InvalidSubCategory`] for empty names or names
    /// with characters outside `[a-z0-9_]`.
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        let valid = !value.is_empty()
            && value
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
        if valid {
            Ok(Self(value))
        } else {
            Err(TypeError::InvalidSubCategory(value))
        }
    }

    /// Sub-category used when a tier knows the category but nothing finer.
    pub fn general() -> Self {
        Self("general".to_owned())
    }

    /// Wrap a name known at compile time to be valid.
    pub(crate) fn fixed(value: &'static str) -> Self {
        debug_assert!(Self::new(value).is_ok(), "invalid fixed sub-category {value}");
        Self(value.to_owned())
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SubCategory {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SubCategory> for String {
    fn from(value: SubCategory) -> Self {
        value.0
    }
}

/// Which tier produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    /// Deterministic pattern fast path.
    Pattern,
    /// Structural heuristic rules.
    Heuristic,
    /// External model collaborator.
    Llm,
    /// No tier produced an acceptable answer; degraded result.
    PatternFailed,
}

impl Method {
    /// Lowercase wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pattern => "pattern",
            Self::Heuristic => "heuristic",
            Self::Llm => "llm",
            Self::PatternFailed => "pattern_failed",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
