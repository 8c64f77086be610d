//! Loading and merge reports
//!
//! Loading records issues instead of failing on the first problem, so a
//! caller gets the full picture of a document in one pass. Merging records
//! one action per keyword it touched.

use serde::Serialize;
use std::fmt;

use crate::pointer::JsonPath;

// =============================================================================
// Severity
// =============================================================================

/// Issue severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Issue Kinds
// =============================================================================

/// Category of a loading issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum IssueKind {
    // === Digestion ===
    /// Key is not a keyword of any active draft (strict mode)
    KeywordNotFound,
    /// Keyword value has the wrong JSON shape for every candidate
    TypeMismatch,
    /// Keyword value has the right shape but an unusable value
    InvalidValue,
    /// `pattern`/`patternProperties` regex does not compile
    InvalidPattern,
    /// `$schema` names an unknown meta-schema
    UnknownMetaSchema,
    /// `$id`/`id` cannot be resolved against the current scope
    InvalidIdentifier,

    // === Resolution ===
    /// `$ref` value is not a valid URI reference
    MalformedReference,
    /// `$ref` target exists nowhere
    UnresolvedReference,
    /// Remote document could not be fetched
    DocumentNotFound,
    /// `$ref` chain exceeded the configured hop limit
    ReferenceHopLimit,
    /// `$ref` chain loops without reaching a schema
    ReferenceCycle,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeywordNotFound => "L001",
            Self::TypeMismatch => "L002",
            Self::InvalidValue => "L003",
            Self::InvalidPattern => "L004",
            Self::UnknownMetaSchema => "L005",
            Self::InvalidIdentifier => "L006",
            Self::MalformedReference => "R001",
            Self::UnresolvedReference => "R002",
            Self::DocumentNotFound => "R003",
            Self::ReferenceHopLimit => "R004",
            Self::ReferenceCycle => "R005",
        }
    }

    /// Resolution problems abort the load regardless of strictness
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::MalformedReference
                | Self::UnresolvedReference
                | Self::DocumentNotFound
                | Self::ReferenceHopLimit
                | Self::ReferenceCycle
        )
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Loading Report
// =============================================================================

/// A single problem found while loading
#[derive(Debug, Clone, Serialize)]
pub struct LoadingIssue {
    /// Node path from the document root
    pub path: JsonPath,
    /// Document the node belongs to
    pub document: String,
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for LoadingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {} (at {}{})",
            self.kind,
            self.severity,
            self.message,
            self.document,
            self.path.to_uri_fragment()
        )
    }
}

/// Issues accumulated over one load
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadingReport {
    issues: Vec<LoadingIssue>,
}

impl LoadingReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: LoadingIssue) {
        self.issues.push(issue);
    }

    /// Record an issue with an explicit severity
    pub fn record(
        &mut self,
        severity: Severity,
        kind: IssueKind,
        document: impl Into<String>,
        path: &JsonPath,
        message: impl Into<String>,
    ) {
        self.push(LoadingIssue {
            path: path.clone(),
            document: document.into(),
            kind,
            severity,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &LoadingIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LoadingIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }

    /// Issues of one kind, in recording order
    pub fn of_kind(&self, kind: IssueKind) -> impl Iterator<Item = &LoadingIssue> {
        self.issues.iter().filter(move |i| i.kind == kind)
    }

    pub fn issues(&self) -> &[LoadingIssue] {
        &self.issues
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn merge(&mut self, other: LoadingReport) {
        self.issues.extend(other.issues);
    }

    /// One-line summary, used in error messages
    pub fn summary(&self) -> String {
        match self.errors().next() {
            Some(first) if self.error_count() > 1 => {
                format!("{} ({} more error(s))", first, self.error_count() - 1)
            }
            Some(first) => first.to_string(),
            None => format!("{} warning(s)", self.warning_count()),
        }
    }

    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for issue in &self.issues {
            output.push_str(&format!("{}\n", issue));
        }

        if self.has_errors() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        } else if !self.is_empty() {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for LoadingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for LoadingReport {
    type Item = LoadingIssue;
    type IntoIter = std::vec::IntoIter<LoadingIssue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl<'a> IntoIterator for &'a LoadingReport {
    type Item = &'a LoadingIssue;
    type IntoIter = std::slice::Iter<'a, LoadingIssue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.iter()
    }
}

// =============================================================================
// Merge Report
// =============================================================================

/// What the merge engine did at one path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MergeActionType {
    /// Keyword present only on the override was copied
    Add,
    /// Keyword present on both sides was combined
    Merge,
    /// Values were incompatible; the override won
    Conflict,
    /// Keyword merge failed; the base value was kept
    Error,
}

impl fmt::Display for MergeActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Add => write!(f, "ADD"),
            Self::Merge => write!(f, "MERGE"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

/// A single merge action
#[derive(Debug, Clone, Serialize)]
pub struct MergeAction {
    pub path: JsonPath,
    pub action: MergeActionType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl fmt::Display for MergeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.action, self.path)?;
        if let Some(message) = &self.message {
            write!(f, ": {}", message)?;
        }
        Ok(())
    }
}

/// Actions accumulated over one merge
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    actions: Vec<MergeAction>,
}

impl MergeReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, action: MergeActionType, path: &JsonPath, message: Option<String>) {
        self.actions.push(MergeAction {
            path: path.clone(),
            action,
            message,
        });
    }

    pub fn add(&mut self, path: &JsonPath) {
        self.record(MergeActionType::Add, path, None);
    }

    pub fn merged(&mut self, path: &JsonPath) {
        self.record(MergeActionType::Merge, path, None);
    }

    pub fn conflict(&mut self, path: &JsonPath, message: impl Into<String>) {
        self.record(MergeActionType::Conflict, path, Some(message.into()));
    }

    pub fn error(&mut self, path: &JsonPath, message: impl Into<String>) {
        self.record(MergeActionType::Error, path, Some(message.into()));
    }

    /// Any override value replaced an incompatible base value
    pub fn is_conflict(&self) -> bool {
        self.has(MergeActionType::Conflict)
    }

    /// Any keyword was added or combined
    pub fn is_merge(&self) -> bool {
        self.has(MergeActionType::Add) || self.has(MergeActionType::Merge)
    }

    pub fn has_errors(&self) -> bool {
        self.has(MergeActionType::Error)
    }

    fn has(&self, action: MergeActionType) -> bool {
        self.actions.iter().any(|a| a.action == action)
    }

    pub fn actions(&self) -> &[MergeAction] {
        &self.actions
    }

    /// Actions recorded at exactly `path`
    pub fn at<'a>(&'a self, path: &'a JsonPath) -> impl Iterator<Item = &'a MergeAction> {
        self.actions.iter().filter(move |a| &a.path == path)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for action in &self.actions {
            writeln!(f, "{}", action)?;
        }
        Ok(())
    }
}
