//! Pattern store: owns the loaded groups and the change history.
//!
//! Groups are held as `Arc<PatternGroup>` behind a read-write lock. Readers
//! clone the `Arc` and release the lock before matching, and every writer
//! swaps in a complete new group, so a reader always sees either the old or
//! the new version of a group, never a mix.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::audit::{content_hash, ChangeLog, ChangeRecord};
use super::matcher::{apply_typo_variants, Matcher};
use super::priority::PriorityOrder;
use super::{validate_definition, PatternDefinition, PatternDocument, PatternError, PatternUpdate};
use crate::types::SubCategory;

/// A definition plus its lazily compiled matcher.
#[derive(Debug, Clone)]
struct StoredPattern {
    definition: PatternDefinition,
    matcher: OnceLock<Option<Matcher>>,
}

impl StoredPattern {
    fn compiled(definition: PatternDefinition, matcher: Matcher) -> Self {
        Self {
            definition,
            matcher: OnceLock::from(Some(matcher)),
        }
    }

    fn lazy(definition: PatternDefinition) -> Self {
        Self {
            definition,
            matcher: OnceLock::new(),
        }
    }

    fn matcher(&self) -> Option<&Matcher> {
        self.matcher
            .get_or_init(|| match Matcher::compile(&self.definition.pattern) {
                Ok(m) => Some(m),
                Err(e) => {
                    warn!(
                        name = %self.definition.name,
                        error = %e,
                        "pattern failed to recompile"
                    );
                    None
                }
            })
            .as_ref()
    }
}

/// An ordered, immutable set of patterns sharing a name.
#[derive(Debug, Clone)]
pub struct PatternGroup {
    name: String,
    patterns: Vec<StoredPattern>,
}

impl PatternGroup {
    /// Compile every definition. All entries must be valid for the group to
    /// be built; every failure is reported, not just the first.
    fn build(name: &str, definitions: &[PatternDefinition]) -> Result<Self, Vec<PatternError>> {
        let mut patterns = Vec::with_capacity(definitions.len());
        let mut errors = Vec::new();

        for definition in definitions {
            if patterns
                .iter()
                .any(|p: &StoredPattern| p.definition.name == definition.name)
            {
                errors.push(PatternError::DuplicateName {
                    group: name.to_owned(),
                    name: definition.name.clone(),
                });
                continue;
            }
            if let Err(e) = validate_definition(name, definition) {
                errors.push(e);
                continue;
            }
            match Matcher::compile(&definition.pattern) {
                Ok(m) => patterns.push(StoredPattern::compiled(definition.clone(), m)),
                Err(e) => errors.push(PatternError::Compile {
                    group: name.to_owned(),
                    name: definition.name.clone(),
                    cause: e.to_string(),
                }),
            }
        }

        if errors.is_empty() {
            Ok(Self {
                name: name.to_owned(),
                patterns,
            })
        } else {
            Err(errors)
        }
    }

    /// Group name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Definitions in match order, enabled or not.
    pub fn definitions(&self) -> impl Iterator<Item = &PatternDefinition> {
        self.patterns.iter().map(|p| &p.definition)
    }

    /// Enabled definitions in match order, paired with their matcher.
    pub fn enabled(&self) -> impl Iterator<Item = (&PatternDefinition, Option<&Matcher>)> {
        self.patterns
            .iter()
            .filter(|p| p.definition.enabled)
            .map(|p| (&p.definition, p.matcher()))
    }

    /// Definition by name.
    pub fn get(&self, name: &str) -> Option<&PatternDefinition> {
        self.definitions().find(|d| d.name == name)
    }

    /// Number of patterns, enabled or not.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether the group has no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// First enabled pattern matching `text` from its start.
    ///
    /// Patterns with typo variants get a second attempt against the input
    /// with known misspellings replaced.
    pub fn match_first(&self, text: &str) -> Option<PatternMatch> {
        self.enabled().find_map(|(definition, matcher)| {
            let matcher = matcher?;
            if let Some(span) = matcher.find_at_start(text) {
                return Some(PatternMatch::new(&self.name, definition, span, false));
            }
            let corrected = apply_typo_variants(text, &definition.typo_variants)?;
            matcher
                .find_at_start(&corrected)
                .map(|span| PatternMatch::new(&self.name, definition, span, true))
        })
    }
}

/// A successful fast-path match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternMatch {
    /// Group that matched.
    pub group: String,
    /// Pattern name within the group.
    pub name: String,
    /// Sub-category declared by the pattern.
    pub sub_category: SubCategory,
    /// The pattern's own confidence.
    pub pattern_confidence: f64,
    /// Byte span of the match in the (possibly typo-corrected) input.
    pub span: (usize, usize),
    /// Whether the match needed typo correction.
    pub typo_corrected: bool,
}

impl PatternMatch {
    fn new(group: &str, definition: &PatternDefinition, span: (usize, usize), typo: bool) -> Self {
        Self {
            group: group.to_owned(),
            name: definition.name.clone(),
            sub_category: definition.sub_category.clone(),
            pattern_confidence: definition.confidence,
            span,
            typo_corrected: typo,
        }
    }

    /// `group.name` identifier.
    pub fn pattern_id(&self) -> String {
        format!("{}.{}", self.group, self.name)
    }
}

/// An example utterance that its own pattern does not match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExampleFailure {
    /// Group holding the pattern.
    pub group: String,
    /// Pattern name.
    pub name: String,
    /// The example that failed.
    pub example: String,
}

/// Pattern counts for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupStats {
    /// Group name.
    pub group: String,
    /// All patterns.
    pub total: usize,
    /// Enabled patterns.
    pub enabled: usize,
}

/// Owner of all pattern groups, the tier priority order, and the change
/// history.
pub struct PatternStore {
    groups: RwLock<HashMap<String, Arc<PatternGroup>>>,
    priority: PriorityOrder,
    changes: ChangeLog,
}

impl Default for PatternStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PatternStore {
    /// Empty store with the default priority order and an in-memory change
    /// log.
    pub fn new() -> Self {
        Self::with_priority(PriorityOrder::default(), ChangeLog::new())
    }

    /// Empty store with an explicit priority order, recording changes into
    /// `changes`. The order is fixed for the lifetime of the store.
    pub fn with_priority(priority: PriorityOrder, changes: ChangeLog) -> Self {
        Self {
            groups: RwLock::new(HashMap::new()),
            priority,
            changes,
        }
    }

    /// The tier order the classifier walks.
    pub fn priority(&self) -> &PriorityOrder {
        &self.priority
    }

    /// Store loaded with the bundled pattern document.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError`] if the bundled document fails to parse or load.
    pub fn with_defaults() -> Result<Self, PatternError> {
        let store = Self::new();
        store.load(&PatternDocument::builtin()?)?;
        Ok(store)
    }

    /// Replace every group named in `document`.
    ///
    /// Each group is replaced atomically and independently: a group with any
    /// invalid entry keeps its previous contents, while valid groups are
    /// installed. Groups absent from the document are left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::Load`] listing every failure when at least one
    /// group was rejected.
    pub fn load(&self, document: &PatternDocument) -> Result<Vec<String>, PatternError> {
        let mut loaded = Vec::new();
        let mut rejected = Vec::new();
        let mut errors = Vec::new();

        for (name, definitions) in &document.patterns {
            match PatternGroup::build(name, definitions) {
                Ok(group) => {
                    info!(group = %name, patterns = group.len(), "pattern group loaded");
                    self.install(group);
                    loaded.push(name.clone());
                }
                Err(group_errors) => {
                    for e in &group_errors {
                        warn!(group = %name, error = %e, "pattern group rejected");
                    }
                    rejected.push(name.clone());
                    errors.extend(group_errors);
                }
            }
        }

        for failure in self.verify_examples() {
            warn!(
                group = %failure.group,
                name = %failure.name,
                example = %failure.example,
                "pattern does not match its own example"
            );
        }

        if errors.is_empty() {
            Ok(loaded)
        } else {
            Err(PatternError::Load {
                rejected,
                loaded,
                errors,
            })
        }
    }

    /// Atomically replace a single group.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::Load`] if any entry is invalid; the previous
    /// group stays in place.
    pub fn reload_group(
        &self,
        name: &str,
        definitions: &[PatternDefinition],
    ) -> Result<(), PatternError> {
        let group = PatternGroup::build(name, definitions).map_err(|errors| PatternError::Load {
            rejected: vec![name.to_owned()],
            loaded: vec![],
            errors,
        })?;
        info!(group = %name, patterns = group.len(), "pattern group reloaded");
        self.install(group);
        Ok(())
    }

    fn install(&self, group: PatternGroup) {
        self.groups
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(group.name.clone(), Arc::new(group));
    }

    /// Current version of a group.
    pub fn get_group(&self, name: &str) -> Option<Arc<PatternGroup>> {
        self.groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Current definition of one pattern.
    pub fn get(&self, group: &str, name: &str) -> Option<PatternDefinition> {
        self.get_group(group)?.get(name).cloned()
    }

    /// Loaded group names, sorted.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Every loaded group, sorted by name.
    pub fn groups(&self) -> Vec<Arc<PatternGroup>> {
        let mut groups: Vec<Arc<PatternGroup>> = self
            .groups
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        groups
    }

    /// First enabled pattern in `group` matching `text` from its start.
    pub fn match_first(&self, group: &str, text: &str) -> Option<PatternMatch> {
        let found = self.get_group(group)?.match_first(text);
        if let Some(m) = &found {
            debug!(pattern = %m.pattern_id(), typo_corrected = m.typo_corrected, "pattern matched");
        }
        found
    }

    /// Mutate one pattern and record the change.
    ///
    /// The compiled matcher is discarded and rebuilt on next use. This is the
    /// only mutation path; patterns are never deleted, only disabled.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::UnknownGroup`] / [`PatternError::UnknownPattern`]
    /// for missing targets, or a validation error if the updated definition
    /// would not compile or has an out-of-range confidence.
    pub fn update(
        &self,
        group: &str,
        name: &str,
        update: &PatternUpdate,
        user: &str,
        reason: &str,
    ) -> Result<ChangeRecord, PatternError> {
        let mut groups = self.groups.write().unwrap_or_else(PoisonError::into_inner);
        let current = groups
            .get(group)
            .ok_or_else(|| PatternError::UnknownGroup(group.to_owned()))?;
        let index = current
            .patterns
            .iter()
            .position(|p| p.definition.name == name)
            .ok_or_else(|| PatternError::UnknownPattern {
                group: group.to_owned(),
                name: name.to_owned(),
            })?;

        let mut next = PatternGroup::clone(current);
        let Some(slot) = next.patterns.get_mut(index) else {
            return Err(PatternError::UnknownPattern {
                group: group.to_owned(),
                name: name.to_owned(),
            });
        };
        let before = slot.definition.clone();
        let after = update.apply_to(&before);
        validate_definition(group, &after)?;

        let record = ChangeRecord {
            change_id: Uuid::new_v4(),
            group: group.to_owned(),
            name: name.to_owned(),
            before_hash: content_hash(&before),
            after_hash: content_hash(&after),
            fields: update
                .changed_fields()
                .into_iter()
                .map(str::to_owned)
                .collect(),
            user: user.to_owned(),
            reason: reason.to_owned(),
            timestamp: Utc::now(),
        };

        *slot = StoredPattern::lazy(after);
        groups.insert(group.to_owned(), Arc::new(next));
        drop(groups);

        info!(
            group = %group,
            name = %name,
            user = %user,
            fields = ?record.fields,
            "pattern updated"
        );
        self.changes.append(record.clone());
        Ok(record)
    }

    /// Change history, optionally narrowed to one pattern.
    pub fn history(&self, pattern: Option<(&str, &str)>) -> Vec<ChangeRecord> {
        match pattern {
            Some((group, name)) => self.changes.for_pattern(group, name),
            None => self.changes.all(),
        }
    }

    /// Examples that their own enabled pattern fails to match.
    pub fn verify_examples(&self) -> Vec<ExampleFailure> {
        let mut failures = Vec::new();
        for group in self.groups() {
            for (definition, matcher) in group.enabled() {
                let Some(matcher) = matcher else { continue };
                for example in &definition.examples {
                    let corrected = apply_typo_variants(example, &definition.typo_variants);
                    let ok = matcher.is_match(example)
                        || corrected.is_some_and(|c| matcher.is_match(&c));
                    if !ok {
                        failures.push(ExampleFailure {
                            group: group.name.clone(),
                            name: definition.name.clone(),
                            example: example.clone(),
                        });
                    }
                }
            }
        }
        failures
    }

    /// Current contents as a document, for an external persistence layer.
    pub fn snapshot(&self) -> PatternDocument {
        let patterns: BTreeMap<String, Vec<PatternDefinition>> = self
            .groups()
            .into_iter()
            .map(|g| (g.name.clone(), g.definitions().cloned().collect()))
            .collect();
        PatternDocument { patterns }
    }

    /// Per-group pattern counts, sorted by group name.
    pub fn stats(&self) -> Vec<GroupStats> {
        self.groups()
            .iter()
            .map(|g| GroupStats {
                group: g.name.clone(),
                total: g.len(),
                enabled: g.patterns.iter().filter(|p| p.definition.enabled).count(),
            })
            .collect()
    }
}
