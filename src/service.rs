//! Service facade.
//!
//! Owns one pattern store, one monitor, the classifier, and the diagnostics
//! engine, and wires them together: every classification is recorded, and
//! classifications that miss the pattern tier can be diagnosed on the way
//! out. Callers hold the service by handle; there is no global state.

use std::sync::Arc;

use anyhow::Context;
use tracing::{debug, info};

use crate::classifier::{
    ClassificationContext, ClassificationResult, Classifier, ContextError, IntentModel,
};
use crate::config::ParlanceConfig;
use crate::diagnostics::{DiagnosticsEngine, DiagnosticsReport, PatternModification};
use crate::health::{HealthMonitor, HealthReport};
use crate::patterns::{
    ChangeLog, ChangeRecord, PatternDefinition, PatternError, PatternStore, PatternUpdate,
};
use crate::types::Method;

/// Classification, diagnostics, health, and pattern administration behind
/// one handle.
pub struct IntentService {
    store: Arc<PatternStore>,
    monitor: Arc<HealthMonitor>,
    classifier: Classifier,
    diagnostics: DiagnosticsEngine,
}

impl IntentService {
    /// Assemble a service from parts.
    pub fn new(
        store: Arc<PatternStore>,
        monitor: Arc<HealthMonitor>,
        classifier: Classifier,
        diagnostics: DiagnosticsEngine,
    ) -> Self {
        Self {
            store,
            monitor,
            classifier,
            diagnostics,
        }
    }

    /// Build everything from configuration, loading the configured pattern
    /// document. No model is attached.
    ///
    /// # Errors
    ///
    /// Fails if the pattern document cannot be read or any group fails to
    /// load, or if the monitor thresholds are invalid.
    pub fn from_config(config: &ParlanceConfig) -> anyhow::Result<Self> {
        let store = PatternStore::with_priority(config.priority.clone(), ChangeLog::new());
        let document = config.pattern_document()?;
        let loaded = store.load(&document).context("pattern document rejected")?;
        info!(groups = loaded.len(), patterns = document.len(), "patterns loaded");

        let store = Arc::new(store);
        let monitor = Arc::new(HealthMonitor::new(config.monitor.clone())?);
        let classifier = Classifier::new(Arc::clone(&store), config.classifier.clone());
        let diagnostics = DiagnosticsEngine::new(config.diagnostics.clone());
        Ok(Self::new(store, monitor, classifier, diagnostics))
    }

    /// Attach the LLM collaborator.
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn IntentModel>) -> Self {
        self.classifier = self.classifier.with_model(model);
        self
    }

    /// Shared pattern store.
    pub fn store(&self) -> &Arc<PatternStore> {
        &self.store
    }

    /// Shared health monitor.
    pub fn monitor(&self) -> &Arc<HealthMonitor> {
        &self.monitor
    }

    /// Validate `context`, classify `text`, and record the outcome.
    ///
    /// When the pattern tier did not decide and failure diagnosis is on, the
    /// near misses are recorded with the outcome and the diagnostics
    /// headline is added to the result notes.
    ///
    /// # Errors
    ///
    /// Returns [`ContextError`] for malformed caller context. Classification
    /// itself never fails.
    pub async fn classify(
        &self,
        text: &str,
        context: ClassificationContext,
    ) -> Result<ClassificationResult, ContextError> {
        let context = context.validated()?;
        let mut result = self.classifier.classify(text, &context).await;

        let mut near_misses = Vec::new();
        if result.method != Method::Pattern && self.classifier.config().diagnose_failures {
            let report = self.diagnose(&result.text);
            result.notes.push(report.headline());
            near_misses = report.near_misses;
        }

        let record = self.monitor.record(&result, &near_misses);
        debug!(
            input_hash = %record.input_hash,
            method = %result.method,
            category = %result.category,
            "classification recorded"
        );
        Ok(result)
    }

    /// Explain how every enabled pattern fares against `text`.
    pub fn diagnose(&self, text: &str) -> DiagnosticsReport {
        self.diagnostics
            .diagnose(text, &self.store.groups(), self.store.priority())
    }

    /// Current health snapshot.
    pub fn health_report(&self) -> HealthReport {
        self.monitor.generate_report()
    }

    /// One pattern definition.
    pub fn get_pattern(&self, group: &str, name: &str) -> Option<PatternDefinition> {
        self.store.get(group, name)
    }

    /// Loaded group names.
    pub fn list_groups(&self) -> Vec<String> {
        self.store.list()
    }

    /// Audited single-pattern mutation.
    ///
    /// # Errors
    ///
    /// See [`PatternStore::update`].
    pub fn update_pattern(
        &self,
        group: &str,
        name: &str,
        update: &PatternUpdate,
        user: &str,
        reason: &str,
    ) -> Result<ChangeRecord, PatternError> {
        self.store.update(group, name, update, user, reason)
    }

    /// Apply a diagnostics suggestion through the audited update path.
    ///
    /// # Errors
    ///
    /// See [`PatternStore::update`].
    pub fn apply_modification(
        &self,
        modification: &PatternModification,
        user: &str,
    ) -> Result<ChangeRecord, PatternError> {
        let current = self
            .store
            .get(&modification.group, &modification.name)
            .ok_or_else(|| PatternError::UnknownPattern {
                group: modification.group.clone(),
                name: modification.name.clone(),
            })?;
        let reason = format!("diagnostics {}: {}", modification.reason, modification.note);
        self.store.update(
            &modification.group,
            &modification.name,
            &modification.to_update(&current),
            user,
            &reason,
        )
    }

    /// Change history, optionally for one pattern.
    pub fn history(&self, pattern: Option<(&str, &str)>) -> Vec<ChangeRecord> {
        self.store.history(pattern)
    }
}
