//! Boundary to the external model collaborator.
//!
//! The core never talks to a model transport itself. Callers hand in an
//! [`IntentModel`] implementation; this module fixes the request contract
//! and turns whatever text comes back into a typed verdict or a typed
//! parse error.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::types::{Category, SubCategory, TypeError};

/// Fixed instruction sent with every classification request.
pub const CLASSIFICATION_SYSTEM_PROMPT: &str = "\
You are an intent classifier for a home assistant. Classify the user's utterance.

Respond with a JSON object:
{
  \"category\": \"emergency\" | \"instant\" | \"gesture\" | \"self_improvement\" | \"action\" | \"memory\" | \"query\" | \"conversation\",
  \"confidence\": number between 0 and 1,
  \"sub_category\": \"short_snake_case_label\"
}

Output ONLY the JSON object, no other text.";

/// Token cap requested for a classification reply.
const MAX_REPLY_TOKENS: u32 = 128;

/// Request handed to the model collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRequest {
    /// System instruction; always [`CLASSIFICATION_SYSTEM_PROMPT`].
    pub system: String,
    /// Raw utterance.
    pub text: String,
    /// Maximum tokens in the reply.
    pub max_tokens: u32,
}

impl ModelRequest {
    /// Build the fixed classification request for `text`.
    pub fn classify(text: &str) -> Self {
        Self {
            system: CLASSIFICATION_SYSTEM_PROMPT.to_owned(),
            text: text.to_owned(),
            max_tokens: MAX_REPLY_TOKENS,
        }
    }
}

/// Errors a model collaborator may report.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Network or protocol failure.
    #[error("model transport failed: {0}")]
    Transport(String),
    /// The collaborator cannot serve requests right now.
    #[error("model unavailable: {0}")]
    Unavailable(String),
    /// No reply within the configured bound.
    #[error("model did not reply within {0:?}")]
    Timeout(Duration),
}

/// Async request/response handle to a classification model.
///
/// Implementations must be `Send + Sync` so one handle can serve concurrent
/// classifications.
#[async_trait]
pub trait IntentModel: Send + Sync {
    /// Send `request` and return the raw reply text.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] on transport failure or unavailability.
    async fn complete(&self, request: ModelRequest) -> Result<String, ModelError>;

    /// Identifier of the model behind this handle, for logs.
    fn model_id(&self) -> &str;
}

/// Typed reply from the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelVerdict {
    /// Parsed category.
    pub category: Category,
    /// Confidence clamped to `[0, 1]`.
    pub confidence: f64,
    /// Parsed sub-category; `general` if absent or unusable.
    pub sub_category: SubCategory,
}

/// Why a model reply could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ReplyError {
    /// No `{...}` object in the reply.
    #[error("reply contains no JSON object")]
    NoJson,
    /// The object did not match the contract.
    #[error("reply JSON does not match the contract: {0}")]
    Json(#[from] serde_json::Error),
    /// The category is not part of the closed vocabulary.
    #[error("reply category rejected: {0}")]
    Category(#[from] TypeError),
    /// Confidence is not a finite number.
    #[error("reply confidence is not finite")]
    Confidence,
}

#[derive(Deserialize)]
struct RawReply {
    category: String,
    confidence: f64,
    #[serde(default)]
    sub_category: Option<String>,
}

/// Parse a model reply, tolerating prose around the JSON object.
///
/// # Errors
///
/// Returns [`ReplyError`] when the reply has no object, the object does not
/// match the contract, or the category is unknown.
pub fn parse_reply(text: &str) -> Result<ModelVerdict, ReplyError> {
    let trimmed = text.trim();
    let start = trimmed.find('{').ok_or(ReplyError::NoJson)?;
    let end = trimmed.rfind('}').ok_or(ReplyError::NoJson)?;
    if end < start {
        return Err(ReplyError::NoJson);
    }
    let json = trimmed.get(start..=end).ok_or(ReplyError::NoJson)?;

    let raw: RawReply = serde_json::from_str(json)?;
    if !raw.confidence.is_finite() {
        return Err(ReplyError::Confidence);
    }
    let category: Category = raw.category.parse()?;
    let sub_category = raw
        .sub_category
        .map(|s| s.trim().to_lowercase().replace([' ', '-'], "_"))
        .and_then(|s| match SubCategory::new(s) {
            Ok(sub) => Some(sub),
            Err(e) => {
                warn!(error = %e, "model sub-category unusable, using general");
                None
            }
        })
        .unwrap_or_else(SubCategory::general);

    Ok(ModelVerdict {
        category,
        confidence: raw.confidence.clamp(0.0, 1.0),
        sub_category,
    })
}
