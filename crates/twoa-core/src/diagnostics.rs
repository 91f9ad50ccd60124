//! # Diagnostics
//!
//! Categorized events emitted by the codec.
//!
//! The codec never owns a logger. Callers hand a [`DiagnosticSink`] to the
//! [`crate::Codec`] they construct; the default sink forwards to `tracing`.
//! Every failure is emitted once at `Error` severity before the `Err` is
//! returned, and missing optional sections are emitted at `Warning`.

use crate::CodecError;
use std::fmt;
use std::sync::{Mutex, PoisonError};

/// Target used for every `tracing` event emitted by [`TracingSink`].
pub const TRACING_TARGET: &str = "twoa::codec";

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// What part of the document or model a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    /// The source itself (absent, oversized, not XML, wrong root).
    Input,
    /// An optional section was absent or skipped.
    Section,
    /// A numeric field failed to parse.
    Value,
    /// A required attribute or element is missing.
    Attribute,
    /// An identifier could not be resolved or was defined twice.
    Reference,
    /// The shape of the knowledge structure is wrong.
    Structure,
    /// Predecessor/successor lists disagree.
    Adjacency,
    /// Codec configuration.
    Config,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Input => "input",
            Self::Section => "section",
            Self::Value => "value",
            Self::Attribute => "attribute",
            Self::Reference => "reference",
            Self::Structure => "structure",
            Self::Adjacency => "adjacency",
            Self::Config => "config",
        };
        f.write_str(name)
    }
}

/// A single diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub category: DiagnosticCategory,
    pub message: String,
}

impl Diagnostic {
    /// Create a diagnostic.
    #[must_use]
    pub fn new(severity: Severity, category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
        }
    }

    /// Shorthand for a `Warning` diagnostic.
    #[must_use]
    pub fn warning(category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, message)
    }

    /// Shorthand for a `Debug` diagnostic.
    #[must_use]
    pub fn debug(category: DiagnosticCategory, message: impl Into<String>) -> Self {
        Self::new(Severity::Debug, category, message)
    }
}

impl From<&CodecError> for Diagnostic {
    fn from(err: &CodecError) -> Self {
        Self::new(Severity::Error, err.category(), err.to_string())
    }
}

impl CodecError {
    /// The diagnostic category this error is reported under.
    #[must_use]
    pub fn category(&self) -> DiagnosticCategory {
        match self {
            Self::InvalidInput(_) | Self::DocumentTooLarge { .. } | Self::Xml(_) => {
                DiagnosticCategory::Input
            }
            Self::MalformedValue { .. } => DiagnosticCategory::Value,
            Self::MissingAttribute { .. } | Self::MissingElement { .. } => {
                DiagnosticCategory::Attribute
            }
            Self::UnresolvedReference { .. } | Self::DuplicateDefinition { .. } => {
                DiagnosticCategory::Reference
            }
            Self::DuplicateMembership { .. } | Self::InvalidStructure(_) => {
                DiagnosticCategory::Structure
            }
            Self::CyclicReference(_) => DiagnosticCategory::Adjacency,
            Self::Config(_) => DiagnosticCategory::Config,
        }
    }
}

// =============================================================================
// SINK TRAIT
// =============================================================================

/// Receiver of codec diagnostics.
///
/// Sinks must be `Send + Sync`: one codec may serve concurrent calls, and the
/// sink is the only state they share.
pub trait DiagnosticSink: Send + Sync {
    /// Record one diagnostic.
    fn emit(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing` under [`TRACING_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        let category = diagnostic.category;
        let message = diagnostic.message;
        match diagnostic.severity {
            Severity::Debug => {
                tracing::debug!(target: TRACING_TARGET, %category, "{}", message);
            }
            Severity::Info => tracing::info!(target: TRACING_TARGET, %category, "{}", message),
            Severity::Warning => tracing::warn!(target: TRACING_TARGET, %category, "{}", message),
            Severity::Error => tracing::error!(target: TRACING_TARGET, %category, "{}", message),
        }
    }
}

/// Keeps every diagnostic in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of recorded diagnostics at the given severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Drop everything recorded so far.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl DiagnosticSink for CollectingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }
}
