//! # Encoder
//!
//! Flattens a `KStructure` into a TwoA [`Document`].
//!
//! Categories are shared graph nodes, so each one is written exactly once as a
//! definition (`PCategory[@xsd:id]` with a `Rating`) and everywhere else as a
//! reference (`PCategory[@xsd:idref]`). State adjacency is written in both
//! directions even though one is derivable from the other.

use crate::config::CodecConfig;
use crate::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSink};
use crate::document::{Document, Element, QName};
use crate::primitives::{
    ID_ATTR, IDREF_ATTR, INDEX_ATTR, KSRANK_ELEM, KSTATE_ELEM, KSTRUCTURE_ELEM, NEXT_STATES_ELEM,
    PARAMS_ELEM, PCATEGORIES_ELEM, PCATEGORY_ELEM, PREVIOUS_STATES_ELEM, RANK_ELEM,
    RANKORDER_ELEM, RANKS_ELEM, RATING_ELEM, ROOT_RANK_INDEX, THRESHOLD_ELEM, TWOA_ELEM,
    TYPE_ATTR,
};
use crate::{
    Category, CategoryId, CodecError, KSRank, KState, KStructure, RankOrder, ReferenceKind, StateId,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Builds documents from knowledge structures.
pub struct Encoder<'a> {
    config: &'a CodecConfig,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> Encoder<'a> {
    /// Create an encoder reporting to `sink`.
    #[must_use]
    pub fn new(config: &'a CodecConfig, sink: &'a dyn DiagnosticSink) -> Self {
        Self { config, sink }
    }

    /// Encode `structure` into a document.
    ///
    /// Sorts the rank order and the knowledge ranks in place first. Absent
    /// sections are skipped with a warning; the root element is always
    /// produced.
    ///
    /// # Errors
    ///
    /// - `CodecError::InvalidStructure` if rank 0 does not hold exactly one state,
    ///   or an identifier carries surrounding whitespace
    /// - `CodecError::MissingAttribute` for an empty identifier or state type
    /// - `CodecError::DuplicateMembership` if a category sits in two ranks and
    ///   `unique_membership` is set
    /// - `CodecError::DuplicateDefinition` if two states share an identifier
    /// - `CodecError::UnresolvedReference` if a state lists a category missing
    ///   from the rank order, or an adjacent state missing from the structure
    pub fn encode(&self, structure: &mut KStructure) -> Result<Document, CodecError> {
        structure.sort_ascending();

        let mut root = Element::twoa(TWOA_ELEM);

        if structure.rank_order.is_empty() {
            self.sink.emit(Diagnostic::warning(
                DiagnosticCategory::Section,
                "RankOrder has no ranks; PCategories and RankOrder are omitted",
            ));
        } else {
            root.push_child(self.encode_categories(&structure.rank_order)?);
            root.push_child(encode_rank_order(&structure.rank_order));
        }

        if structure.is_empty() {
            self.sink.emit(Diagnostic::warning(
                DiagnosticCategory::Section,
                "KStructure has no ranks; KStructure is omitted",
            ));
        } else {
            root.push_child(encode_kstructure(&structure.rank_order, &structure.ranks)?);
        }

        self.sink.emit(Diagnostic::debug(
            DiagnosticCategory::Section,
            format!(
                "encoded {} rank(s) and {} state(s)",
                structure.rank_order.ranks.len(),
                structure.state_count()
            ),
        ));

        Ok(Document::new(root))
    }

    /// One definition per category, in rank-then-category order.
    fn encode_categories(&self, rank_order: &RankOrder) -> Result<Element, CodecError> {
        let mut defined: BTreeMap<&CategoryId, i32> = BTreeMap::new();
        let mut element = Element::twoa(PCATEGORIES_ELEM);

        for rank in &rank_order.ranks {
            for category in &rank.categories {
                check_identifier(
                    category.id.as_str(),
                    &format!("{} in {} {}", PCATEGORY_ELEM, RANK_ELEM, rank.index),
                )?;
                if let Some(&first) = defined.get(&category.id) {
                    if self.config.unique_membership {
                        return Err(CodecError::DuplicateMembership {
                            id: category.id.to_string(),
                            first,
                            second: rank.index,
                        });
                    }
                    continue;
                }
                defined.insert(&category.id, rank.index);
                element.push_child(category_definition(category));
            }
        }

        Ok(element)
    }
}

fn category_definition(category: &Category) -> Element {
    Element::twoa(PCATEGORY_ELEM)
        .with_attribute(QName::schema(ID_ATTR), category.id.as_str())
        .with_child(Element::twoa(RATING_ELEM).with_text(category.rating.to_string()))
}

fn category_reference(category: &Arc<Category>) -> Element {
    Element::twoa(PCATEGORY_ELEM).with_attribute(QName::schema(IDREF_ATTR), category.id.as_str())
}

fn state_reference(id: &StateId) -> Element {
    Element::twoa(KSTATE_ELEM).with_attribute(QName::schema(IDREF_ATTR), id.as_str())
}

fn encode_rank_order(rank_order: &RankOrder) -> Element {
    let params = Element::twoa(PARAMS_ELEM)
        .with_child(Element::twoa(THRESHOLD_ELEM).with_text(rank_order.threshold.to_string()));

    let mut ranks = Element::twoa(RANKS_ELEM);
    for rank in &rank_order.ranks {
        let mut element =
            Element::twoa(RANK_ELEM).with_attribute(QName::plain(INDEX_ATTR), rank.index.to_string());
        for category in &rank.categories {
            element.push_child(category_reference(category));
        }
        ranks.push_child(element);
    }

    Element::twoa(RANKORDER_ELEM)
        .with_child(params)
        .with_child(ranks)
}

/// Identifiers are written verbatim and read back trimmed, so they must be
/// non-empty and free of surrounding whitespace.
fn check_identifier(id: &str, context: &str) -> Result<(), CodecError> {
    if id.trim().is_empty() {
        return Err(CodecError::MissingAttribute {
            attribute: format!("xsd:{}", ID_ATTR),
            context: context.to_string(),
        });
    }
    if id.trim() != id {
        return Err(CodecError::InvalidStructure(format!(
            "{}: identifier '{}' has surrounding whitespace",
            context, id
        )));
    }
    Ok(())
}

/// Every state id, checked for shape and uniqueness.
fn collect_states(ranks: &[KSRank]) -> Result<BTreeSet<&StateId>, CodecError> {
    let mut known = BTreeSet::new();
    for rank in ranks {
        for state in &rank.states {
            check_identifier(
                state.id.as_str(),
                &format!("{} in {} {}", KSTATE_ELEM, KSRANK_ELEM, rank.index),
            )?;
            if !known.insert(&state.id) {
                return Err(CodecError::DuplicateDefinition {
                    kind: ReferenceKind::State,
                    id: state.id.to_string(),
                });
            }
        }
    }
    Ok(known)
}

fn encode_kstructure(rank_order: &RankOrder, ranks: &[KSRank]) -> Result<Element, CodecError> {
    let defined: BTreeSet<&CategoryId> = rank_order.categories().map(|c| &c.id).collect();
    let known = collect_states(ranks)?;
    let mut element = Element::twoa(KSTRUCTURE_ELEM);

    for rank in ranks {
        let mut rank_element =
            Element::twoa(KSRANK_ELEM).with_attribute(QName::plain(INDEX_ATTR), rank.index.to_string());

        if rank.index == ROOT_RANK_INDEX {
            let [root] = rank.states.as_slice() else {
                return Err(CodecError::InvalidStructure(format!(
                    "KSRank {} holds {} states; expected exactly one root state",
                    ROOT_RANK_INDEX,
                    rank.states.len()
                )));
            };
            rank_element.push_child(
                Element::twoa(KSTATE_ELEM).with_attribute(QName::schema(ID_ATTR), root.id.as_str()),
            );
        } else {
            for state in &rank.states {
                let context = format!(
                    "{} '{}' in {} {}",
                    KSTATE_ELEM, state.id, KSRANK_ELEM, rank.index
                );
                check_state(state, &defined, &known, &context)?;
                rank_element.push_child(encode_state(state));
            }
        }

        element.push_child(rank_element);
    }

    Ok(element)
}

/// A non-root state must carry a type, and every reference must land on
/// something the document defines.
fn check_state(
    state: &KState,
    defined: &BTreeSet<&CategoryId>,
    known: &BTreeSet<&StateId>,
    context: &str,
) -> Result<(), CodecError> {
    if state.state_type.trim().is_empty() {
        return Err(CodecError::MissingAttribute {
            attribute: TYPE_ATTR.to_string(),
            context: context.to_string(),
        });
    }

    if let Some(category) = state.categories.iter().find(|c| !defined.contains(&c.id)) {
        return Err(CodecError::UnresolvedReference {
            kind: ReferenceKind::Category,
            id: category.id.to_string(),
            context: context.to_string(),
        });
    }

    if let Some(id) = state
        .previous
        .iter()
        .chain(&state.next)
        .find(|id| !known.contains(id))
    {
        return Err(CodecError::UnresolvedReference {
            kind: ReferenceKind::State,
            id: id.to_string(),
            context: context.to_string(),
        });
    }

    Ok(())
}

fn encode_state(state: &KState) -> Element {
    let mut categories = Element::twoa(PCATEGORIES_ELEM);
    for category in &state.categories {
        categories.push_child(category_reference(category));
    }

    let mut previous = Element::twoa(PREVIOUS_STATES_ELEM);
    for id in &state.previous {
        previous.push_child(state_reference(id));
    }

    let mut next = Element::twoa(NEXT_STATES_ELEM);
    for id in &state.next {
        next.push_child(state_reference(id));
    }

    Element::twoa(KSTATE_ELEM)
        .with_attribute(QName::schema(ID_ATTR), state.id.as_str())
        .with_attribute(QName::plain(TYPE_ATTR), state.state_type.as_str())
        .with_child(categories)
        .with_child(previous)
        .with_child(next)
}

// =============================================================================
// TESTS
// =============================================================================
