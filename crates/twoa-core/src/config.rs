//! # Codec Configuration
//!
//! Options that change how strictly a document is read and how it is written.
//!
//! All fields are optional in TOML; missing ones take their defaults:
//!
//! ```toml
//! decode_order = "two_pass"
//! unique_membership = true
//! verify_next_states = true
//! indent = 2
//! max_document_bytes = 16777216
//! ```
//!
//! File I/O is left to the host; this module only parses text.

use crate::CodecError;
use crate::primitives::{DEFAULT_INDENT, DEFAULT_MAX_DOCUMENT_BYTES};
use serde::{Deserialize, Serialize};

/// How the decoder resolves `PreviousStates` references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodeOrder {
    /// Resolve each reference as the state is read. Predecessors must appear
    /// earlier in the document than their successors.
    #[default]
    Sequential,
    /// Register every state first, then resolve all references. Any document
    /// order is accepted; cycles are rejected.
    TwoPass,
}

/// Codec configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CodecConfig {
    /// Reference resolution strategy for knowledge states.
    pub decode_order: DecodeOrder,
    /// Reject a category that is a member of more than one rank.
    pub unique_membership: bool,
    /// Compare declared `NextStates` with derived successors after decoding.
    pub verify_next_states: bool,
    /// Indentation width of rendered documents.
    pub indent: usize,
    /// Largest text payload the decoder accepts.
    pub max_document_bytes: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            decode_order: DecodeOrder::default(),
            unique_membership: true,
            verify_next_states: true,
            indent: DEFAULT_INDENT,
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
        }
    }
}

impl CodecConfig {
    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::Config` on invalid TOML or unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, CodecError> {
        toml::from_str(text).map_err(|e| CodecError::Config(e.to_string()))
    }

    /// Builder: set the decode order.
    #[must_use]
    pub fn with_decode_order(mut self, order: DecodeOrder) -> Self {
        self.decode_order = order;
        self
    }
}
