//! # twoa-core
//!
//! The knowledge-structure codec for TwoA.
//!
//! This crate converts between an in-memory [`KStructure`] and the TwoA XML
//! document:
//! - proficiency categories with ratings, grouped into a rank order
//! - a ranked, acyclic progression graph of knowledge states
//!
//! ## Define Once, Reference Many
//!
//! Categories are shared nodes. The document defines each one once
//! (`PCategory[@xsd:id]`) and refers to it everywhere else
//! (`PCategory[@xsd:idref]`). Decoding rebuilds a single `Arc<Category>` per
//! identifier and hands it to every referrer.
//!
//! ## Architectural Constraints
//!
//! - Pure transformations: no I/O, no async, no global state
//! - All-or-nothing decoding: the first violation voids the whole document
//! - Diagnostics go to the [`DiagnosticSink`] the caller provides
//!
//! ## Usage
//!
//! ```
//! use twoa_core::{Category, Codec, KSRank, KState, KStructure, Rank, RankOrder, StateId};
//!
//! let c1 = Category::shared("c1", 0.5);
//! let mut order = RankOrder::new(0.1);
//! order.push_rank(Rank::with_categories(0, vec![c1.clone()]));
//!
//! let mut structure = KStructure::new(order);
//! let mut root = KSRank::new(0);
//! root.push_state(KState::root("s0"));
//! let mut first = KSRank::new(1);
//! first.push_state(KState::new("s1", "core").with_categories(vec![c1]));
//! structure.push_rank(root);
//! structure.push_rank(first);
//! structure.link(&StateId::new("s0"), &StateId::new("s1"))?;
//!
//! let codec = Codec::default();
//! let text = codec.encode_to_string(&mut structure)?;
//! let decoded = codec.decode_str(&text)?;
//! assert_eq!(decoded.root().map(|s| s.next.len()), Some(1));
//! # Ok::<(), twoa_core::CodecError>(())
//! ```

// =============================================================================
// MODULES
// =============================================================================

pub mod codec;
pub mod config;
pub mod decoder;
pub mod diagnostics;
pub mod document;
pub mod encoder;
pub mod graph;
pub mod primitives;
pub mod query;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Category, CategoryId, CodecError, KSRank, KState, Rank, RankOrder, ReferenceKind, StateId,
};

// =============================================================================
// RE-EXPORTS: Graph & Codec
// =============================================================================

pub use codec::{Codec, decode_kstructure, encode_kstructure};
pub use config::{CodecConfig, DecodeOrder};
pub use decoder::Decoder;
pub use diagnostics::{
    CollectingSink, Diagnostic, DiagnosticCategory, DiagnosticSink, Severity, TracingSink,
};
pub use document::{Document, Element, Namespace, QName};
pub use encoder::Encoder;
pub use graph::KStructure;
pub use query::{select_descendants, select_single};
