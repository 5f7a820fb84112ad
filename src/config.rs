//! Configuration loading.
//!
//! Loads `./parlance.toml` (or `$PARLANCE_CONFIG`). Every section has
//! defaults, so a missing or empty file is valid.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierConfig;
use crate::diagnostics::DiagnosticsConfig;
use crate::health::MonitorConfig;
use crate::patterns::{PatternDocument, PriorityOrder};

/// Default config file, relative to the working directory.
const DEFAULT_CONFIG_FILE: &str = "parlance.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParlanceConfig {
    /// Tier thresholds and the LLM bound (`[classifier]`).
    pub classifier: ClassifierConfig,
    /// Tier order walked by the pattern fast path (`[[priority]]`).
    pub priority: PriorityOrder,
    /// Near-miss and typo tunables (`[diagnostics]`).
    pub diagnostics: DiagnosticsConfig,
    /// Retention and alert thresholds (`[monitor]`).
    pub monitor: MonitorConfig,
    /// Pattern document to load instead of the built-in one.
    pub patterns_path: Option<PathBuf>,
}

impl ParlanceConfig {
    /// Load with precedence env vars > TOML file > defaults, then validate.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed, or if the
    /// resulting thresholds are invalid.
    pub fn load() -> Result<Self> {
        let env = |key: &str| std::env::var(key).ok();
        let path = config_path_with(env);
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(env);
        config.validate()?;
        Ok(config)
    }

    /// Load one file without env overrides. A missing file yields defaults.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::info!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("invalid config file {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("failed to read config file {}", path.display()))
            }
        }
    }

    /// Parse a TOML string.
    ///
    /// # Errors
    ///
    /// Fails on malformed TOML or invalid values.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Check cross-field invariants not covered by deserialization.
    ///
    /// # Errors
    ///
    /// Fails on thresholds outside `[0, 1]` or invalid monitor limits.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("classifier.pattern_threshold", self.classifier.pattern_threshold),
            ("classifier.heuristic_threshold", self.classifier.heuristic_threshold),
            ("diagnostics.similarity_floor", self.diagnostics.similarity_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                anyhow::bail!("{name} must be within [0, 1], got {value}");
            }
        }
        self.monitor.validate()?;
        Ok(())
    }

    /// The pattern document named by `patterns_path`, or the built-in one.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or decoded.
    pub fn pattern_document(&self) -> Result<PatternDocument> {
        match &self.patterns_path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read patterns {}", path.display()))?;
                PatternDocument::from_toml(&contents)
                    .with_context(|| format!("invalid pattern document {}", path.display()))
            }
            None => PatternDocument::builtin().context("built-in pattern document is invalid"),
        }
    }

    /// Apply environment overrides. Invalid values are ignored with a warning.
    ///
    /// Takes a resolver so tests never touch the process environment.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("PARLANCE_PATTERNS") {
            self.patterns_path = Some(PathBuf::from(v));
        }
        if let Some(v) = env("PARLANCE_SIMILARITY_FLOOR") {
            match v.parse::<f64>() {
                Ok(n) if (0.0..=1.0).contains(&n) => self.diagnostics.similarity_floor = n,
                _ => tracing::warn!(
                    var = "PARLANCE_SIMILARITY_FLOOR",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("PARLANCE_MAX_RECORDS") {
            match v.parse::<usize>() {
                Ok(n) if n > 0 => self.monitor.max_records = n,
                _ => tracing::warn!(
                    var = "PARLANCE_MAX_RECORDS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }
}

/// Resolve the config file path: `$PARLANCE_CONFIG` or `./parlance.toml`.
pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> PathBuf {
    env("PARLANCE_CONFIG").map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
}
