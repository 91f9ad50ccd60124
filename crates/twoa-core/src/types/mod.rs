//! # Core Type Definitions
//!
//! This module contains the data model the codec serializes:
//! - Identifiers (`CategoryId`, `StateId`)
//! - Proficiency categories and their rank order (`Category`, `Rank`, `RankOrder`)
//! - Knowledge states and knowledge ranks (`KState`, `KSRank`)
//! - Error types (`CodecError`)
//!
//! The aggregate `KStructure` lives in [`crate::graph`].
//!
//! ## Sharing
//!
//! A category is defined once and referenced from many places (its rank in the
//! order, and every state that lists it). All of those places hold the same
//! `Arc<Category>`. State adjacency is expressed through `StateId`s instead, so
//! the progression graph never forms ownership cycles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Unique identifier of a proficiency category.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CategoryId(pub String);

impl CategoryId {
    /// Create a new category identifier.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of a knowledge state.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct StateId(pub String);

impl StateId {
    /// Create a new state identifier.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// CATEGORIES & RANK ORDER
// =============================================================================

/// A proficiency category: one dimension of the knowledge structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    /// The unique identifier.
    pub id: CategoryId,
    /// The numeric rating (difficulty) of the category.
    pub rating: f64,
}

impl Category {
    /// Create a new category.
    #[must_use]
    pub fn new(id: impl Into<String>, rating: f64) -> Self {
        Self {
            id: CategoryId::new(id),
            rating,
        }
    }

    /// Create a new shared category, ready to be referenced from several places.
    #[must_use]
    pub fn shared(id: impl Into<String>, rating: f64) -> Arc<Self> {
        Arc::new(Self::new(id, rating))
    }
}

/// One rank of the rank order: an indexed group of categories.
#[derive(Debug, Clone, PartialEq)]
pub struct Rank {
    /// Position of this rank in the order.
    pub index: i32,
    /// Member categories, in document order.
    pub categories: Vec<Arc<Category>>,
}

impl Rank {
    /// Create an empty rank.
    #[must_use]
    pub fn new(index: i32) -> Self {
        Self {
            index,
            categories: Vec::new(),
        }
    }

    /// Create a rank holding the given categories.
    #[must_use]
    pub fn with_categories(index: i32, categories: Vec<Arc<Category>>) -> Self {
        Self { index, categories }
    }
}

/// The rank order: categories grouped into ranks plus the global threshold.
///
/// A rank order with zero ranks is considered absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RankOrder {
    /// Global threshold parameter.
    pub threshold: f64,
    /// Ranks, sorted ascending by index before encoding.
    pub ranks: Vec<Rank>,
}

impl RankOrder {
    /// Create an empty rank order with the given threshold.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            ranks: Vec::new(),
        }
    }

    /// Append a rank.
    pub fn push_rank(&mut self, rank: Rank) {
        self.ranks.push(rank);
    }

    /// True when the order holds no ranks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// Stable sort of the ranks by ascending index.
    pub fn sort_ascending(&mut self) {
        self.ranks.sort_by_key(|rank| rank.index);
    }

    /// Every member category, in rank-then-category order.
    pub fn categories(&self) -> impl Iterator<Item = &Arc<Category>> {
        self.ranks.iter().flat_map(|rank| rank.categories.iter())
    }

    /// Look up a member category by identifier.
    #[must_use]
    pub fn category(&self, id: &CategoryId) -> Option<&Arc<Category>> {
        self.categories().find(|category| &category.id == id)
    }
}

// =============================================================================
// KNOWLEDGE STATES
// =============================================================================

/// A knowledge state: one node of the progression graph.
///
/// `previous` and `next` hold identifiers of neighbouring states. Use
/// [`crate::KStructure::link`] to connect two states; it keeps both directions
/// in step.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KState {
    /// The unique identifier.
    pub id: StateId,
    /// Type tag. Empty for the root state.
    pub state_type: String,
    /// Categories mastered in this state.
    pub categories: Vec<Arc<Category>>,
    /// Predecessor states.
    pub previous: Vec<StateId>,
    /// Successor states.
    pub next: Vec<StateId>,
}

impl KState {
    /// Create a state with the given type and no categories or neighbours.
    #[must_use]
    pub fn new(id: impl Into<String>, state_type: impl Into<String>) -> Self {
        Self {
            id: StateId::new(id),
            state_type: state_type.into(),
            ..Self::default()
        }
    }

    /// Create the root state: an identifier and nothing else.
    #[must_use]
    pub fn root(id: impl Into<String>) -> Self {
        Self {
            id: StateId::new(id),
            ..Self::default()
        }
    }

    /// Builder-style helper attaching categories.
    #[must_use]
    pub fn with_categories(mut self, categories: Vec<Arc<Category>>) -> Self {
        self.categories = categories;
        self
    }

    /// True when `id` is listed as a predecessor.
    #[must_use]
    pub fn has_previous(&self, id: &StateId) -> bool {
        self.previous.contains(id)
    }

    /// True when `id` is listed as a successor.
    #[must_use]
    pub fn has_next(&self, id: &StateId) -> bool {
        self.next.contains(id)
    }
}

/// A knowledge rank: the states sharing one rank index.
///
/// Rank 0 holds exactly one state, the root.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KSRank {
    /// Rank index.
    pub index: i32,
    /// States in this rank, in document order.
    pub states: Vec<KState>,
}

impl KSRank {
    /// Create an empty knowledge rank.
    #[must_use]
    pub fn new(index: i32) -> Self {
        Self {
            index,
            states: Vec::new(),
        }
    }

    /// Append a state.
    pub fn push_state(&mut self, state: KState) {
        self.states.push(state);
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Kind of identifier a reference points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// A `PCategory` identifier.
    Category,
    /// A `KState` identifier.
    State,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Category => f.write_str("category"),
            Self::State => f.write_str("state"),
        }
    }
}

/// Errors that can occur while encoding or decoding a knowledge structure.
///
/// - Every failure aborts the whole operation; there is no partial output
/// - Context strings name the offending element (rank index, state id, category id)
/// - The codec never panics; all errors are returned
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The source is absent or not a TwoA document at all.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A numeric field (rating, threshold, index) failed to parse.
    #[error("Malformed {field} value {value:?} in {context}")]
    MalformedValue {
        field: String,
        value: String,
        context: String,
    },

    /// A required attribute (identifier, type, index) is absent.
    #[error("Missing attribute {attribute} on {context}")]
    MissingAttribute { attribute: String, context: String },

    /// A required child element is absent.
    #[error("Missing element {element} in {context}")]
    MissingElement { element: String, context: String },

    /// An identifier is not present in the relevant table at lookup time.
    #[error("Unresolved {kind} reference '{id}' in {context}")]
    UnresolvedReference {
        kind: ReferenceKind,
        id: String,
        context: String,
    },

    /// The same identifier is defined twice.
    #[error("Duplicate {kind} definition '{id}'")]
    DuplicateDefinition { kind: ReferenceKind, id: String },

    /// A category is a member of more than one rank of the rank order.
    #[error("Category '{id}' is a member of rank {first} and rank {second}")]
    DuplicateMembership { id: String, first: i32, second: i32 },

    /// The progression graph is not acyclic.
    #[error("Cyclic predecessor reference through state '{0}'")]
    CyclicReference(String),

    /// The shape of the knowledge structure is invalid (e.g. root rank layout).
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// The text payload exceeds the configured size limit.
    #[error("Document size {size} exceeds maximum allowed {limit}")]
    DocumentTooLarge { size: usize, limit: usize },

    /// The text payload is not well-formed XML.
    #[error("XML error: {0}")]
    Xml(String),

    /// The codec configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

// =============================================================================
// TESTS
// =============================================================================
