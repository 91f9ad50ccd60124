//! # Decoder
//!
//! Rebuilds a `KStructure` from a TwoA [`Document`].
//!
//! Decoding is strictly sequential and all-or-nothing:
//! 1. Category definitions -> Category Table
//! 2. Rank-order threshold
//! 3. Rank-order ranks, resolved against the Category Table
//! 4. Knowledge ranks in document order, resolved against the Category Table
//!    and the running State Table
//!
//! The first violation aborts the whole decode. No partial graph escapes.
//!
//! Successor lists are never read as a source of truth. They are derived from
//! `PreviousStates`, one link at a time, through the same step that records the
//! predecessor.

use crate::config::{CodecConfig, DecodeOrder};
use crate::diagnostics::{Diagnostic, DiagnosticCategory, DiagnosticSink};
use crate::document::{Document, Element, Namespace};
use crate::graph::StateSlot;
use crate::primitives::{
    ID_ATTR, IDREF_ATTR, INDEX_ATTR, KSRANK_ELEM, KSTATE_ELEM, KSTRUCTURE_ELEM, NEXT_STATES_ELEM,
    PARAMS_ELEM, PCATEGORIES_ELEM, PCATEGORY_ELEM, PREVIOUS_STATES_ELEM, RANK_ELEM,
    RANKORDER_ELEM, RANKS_ELEM, RATING_ELEM, ROOT_RANK_INDEX, THRESHOLD_ELEM, TWOA_ELEM,
    TYPE_ATTR,
};
use crate::query::{select_descendants, select_single};
use crate::{
    Category, CategoryId, CodecError, KSRank, KState, KStructure, Rank, RankOrder, ReferenceKind,
    StateId,
};
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;

/// Category Table: identifier -> shared definition.
type CategoryTable = BTreeMap<CategoryId, Arc<Category>>;

/// State Table: identifier -> position in the structure being built.
type StateTable = BTreeMap<StateId, StateSlot>;

/// Predecessor references waiting for resolution (two-pass decoding).
struct PendingLinks {
    state: StateSlot,
    previous: Vec<StateId>,
    context: String,
}

/// Builds knowledge structures from documents.
pub struct Decoder<'a> {
    config: &'a CodecConfig,
    sink: &'a dyn DiagnosticSink,
}

impl<'a> Decoder<'a> {
    /// Create a decoder reporting to `sink`.
    #[must_use]
    pub fn new(config: &'a CodecConfig, sink: &'a dyn DiagnosticSink) -> Self {
        Self { config, sink }
    }

    /// Decode `document` into a fresh `KStructure`.
    ///
    /// # Errors
    ///
    /// Returns the first `CodecError` encountered; see the crate-level error
    /// taxonomy. No partial structure is returned.
    pub fn decode(&self, document: &Document) -> Result<KStructure, CodecError> {
        let root = &document.root;
        if !root.is(TWOA_ELEM) {
            return Err(CodecError::InvalidInput(format!(
                "root element is <{}>, expected <{}>",
                root.name, TWOA_ELEM
            )));
        }

        let categories = self.decode_categories(root)?;
        let rank_order = self.decode_rank_order(root, &categories)?;

        let mut structure = KStructure::new(rank_order);
        let states = self.decode_kstructure(root, &categories, &mut structure)?;

        if self.config.verify_next_states {
            self.verify_next_states(root, &structure, &states);
        }

        self.sink.emit(Diagnostic::debug(
            DiagnosticCategory::Section,
            format!(
                "decoded {} categories, {} rank(s), {} state(s)",
                categories.len(),
                structure.rank_order.ranks.len(),
                structure.state_count()
            ),
        ));

        Ok(structure)
    }

    // -------------------------------------------------------------------------
    // Step 1: Category Table
    // -------------------------------------------------------------------------

    fn decode_categories(&self, root: &Element) -> Result<CategoryTable, CodecError> {
        let mut table = CategoryTable::new();

        for element in select_descendants(root, &[PCATEGORIES_ELEM, PCATEGORY_ELEM]) {
            let id = required_attribute(element, &Namespace::Schema, ID_ATTR, PCATEGORY_ELEM)?;
            let context = format!("PCategory '{}'", id);

            let rating = element
                .child(RATING_ELEM)
                .ok_or_else(|| CodecError::MissingElement {
                    element: RATING_ELEM.to_string(),
                    context: context.clone(),
                })?;
            let rating: f64 = parse_value(rating.text().unwrap_or_default(), RATING_ELEM, &context)?;

            let id = CategoryId::new(id);
            if table.contains_key(&id) {
                return Err(CodecError::DuplicateDefinition {
                    kind: ReferenceKind::Category,
                    id: id.to_string(),
                });
            }
            table.insert(id.clone(), Arc::new(Category { id, rating }));
        }

        if table.is_empty() {
            self.sink.emit(Diagnostic::warning(
                DiagnosticCategory::Section,
                "document defines no PCategory elements",
            ));
        }

        Ok(table)
    }

    // -------------------------------------------------------------------------
    // Steps 2 & 3: Rank Order
    // -------------------------------------------------------------------------

    fn decode_rank_order(
        &self,
        root: &Element,
        categories: &CategoryTable,
    ) -> Result<RankOrder, CodecError> {
        let Some(order_element) = select_single(root, &[RANKORDER_ELEM]) else {
            self.sink.emit(Diagnostic::warning(
                DiagnosticCategory::Section,
                "document has no RankOrder; rank order is empty",
            ));
            return Ok(RankOrder::default());
        };

        let threshold = select_single(order_element, &[PARAMS_ELEM, THRESHOLD_ELEM]).ok_or_else(
            || CodecError::MissingElement {
                element: THRESHOLD_ELEM.to_string(),
                context: format!("{}/{}", RANKORDER_ELEM, PARAMS_ELEM),
            },
        )?;
        let threshold: f64 = parse_value(
            threshold.text().unwrap_or_default(),
            THRESHOLD_ELEM,
            RANKORDER_ELEM,
        )?;

        let mut rank_order = RankOrder::new(threshold);
        let mut membership: BTreeMap<CategoryId, i32> = BTreeMap::new();

        for element in select_descendants(order_element, &[RANKS_ELEM, RANK_ELEM]) {
            let index = parse_index(element, RANK_ELEM)?;
            let context = format!("{} {}", RANK_ELEM, index);
            let mut rank = Rank::new(index);

            for reference in element.children_named(PCATEGORY_ELEM) {
                let category = resolve_category(reference, categories, &context)?;
                if let Some(&first) = membership.get(&category.id) {
                    if self.config.unique_membership {
                        return Err(CodecError::DuplicateMembership {
                            id: category.id.to_string(),
                            first,
                            second: index,
                        });
                    }
                } else {
                    membership.insert(category.id.clone(), index);
                }
                rank.categories.push(category);
            }

            rank_order.push_rank(rank);
        }

        Ok(rank_order)
    }

    // -------------------------------------------------------------------------
    // Step 4: Knowledge ranks
    // -------------------------------------------------------------------------

    fn decode_kstructure(
        &self,
        root: &Element,
        categories: &CategoryTable,
        structure: &mut KStructure,
    ) -> Result<StateTable, CodecError> {
        let mut states = StateTable::new();
        let Some(ks_element) = select_single(root, &[KSTRUCTURE_ELEM]) else {
            self.sink.emit(Diagnostic::warning(
                DiagnosticCategory::Section,
                "document has no KStructure; knowledge graph is empty",
            ));
            return Ok(states);
        };

        let mut pending: Vec<PendingLinks> = Vec::new();

        for rank_element in ks_element.children_named(KSRANK_ELEM) {
            let index = parse_index(rank_element, KSRANK_ELEM)?;
            structure.push_rank(KSRank::new(index));
            let rank_pos = structure.ranks.len() - 1;

            if index == ROOT_RANK_INDEX {
                let root_state = decode_root_state(rank_element)?;
                register(structure, &mut states, rank_pos, root_state)?;
                continue;
            }

            for state_element in rank_element.children_named(KSTATE_ELEM) {
                let (state, previous, context) =
                    decode_state(state_element, index, categories)?;

                match self.config.decode_order {
                    DecodeOrder::Sequential => {
                        // Predecessors resolve before this state is registered,
                        // so a state can never be its own predecessor.
                        let resolved = resolve_states(&previous, &states, &context)?;
                        let slot = register(structure, &mut states, rank_pos, state)?;
                        for from in resolved {
                            structure.push_edge(from, slot);
                        }
                    }
                    DecodeOrder::TwoPass => {
                        let slot = register(structure, &mut states, rank_pos, state)?;
                        pending.push(PendingLinks {
                            state: slot,
                            previous,
                            context,
                        });
                    }
                }
            }
        }

        if !pending.is_empty() {
            for links in &pending {
                for from in resolve_states(&links.previous, &states, &links.context)? {
                    structure.push_edge(from, links.state);
                }
            }
            if let Some(id) = structure.find_cycle() {
                return Err(CodecError::CyclicReference(id.to_string()));
            }
        }

        Ok(states)
    }

    /// Compare every declared `NextStates` list with the derived successors.
    ///
    /// Disagreement is reported, not fatal: successors are always derived.
    fn verify_next_states(&self, root: &Element, structure: &KStructure, states: &StateTable) {
        for state_element in select_descendants(root, &[KSTRUCTURE_ELEM, KSRANK_ELEM])
            .flat_map(|rank| rank.children_named(KSTATE_ELEM))
        {
            let Some(next_element) = state_element.child(NEXT_STATES_ELEM) else {
                continue;
            };
            let Some(id) = state_element.attribute(&Namespace::Schema, ID_ATTR) else {
                continue;
            };
            let Some(state) = states
                .get(&StateId::new(id.trim()))
                .and_then(|slot| structure.state_at(*slot))
            else {
                continue;
            };

            let declared: BTreeSet<&str> = next_element
                .children_named(KSTATE_ELEM)
                .filter_map(|r| r.attribute(&Namespace::Schema, IDREF_ATTR))
                .map(str::trim)
                .collect();
            let derived: BTreeSet<&str> = state.next.iter().map(StateId::as_str).collect();

            if declared != derived {
                self.sink.emit(Diagnostic::warning(
                    DiagnosticCategory::Adjacency,
                    format!(
                        "KState '{}' declares NextStates {:?} but predecessors imply {:?}",
                        id, declared, derived
                    ),
                ));
            }
        }
    }
}

// =============================================================================
// ELEMENT HELPERS
// =============================================================================

fn required_attribute<'e>(
    element: &'e Element,
    namespace: &Namespace,
    name: &str,
    context: &str,
) -> Result<&'e str, CodecError> {
    element
        .attribute(namespace, name)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CodecError::MissingAttribute {
            attribute: match namespace {
                Namespace::Schema => format!("xsd:{}", name),
                _ => name.to_string(),
            },
            context: context.to_string(),
        })
}

fn parse_value<T: FromStr>(raw: &str, field: &str, context: &str) -> Result<T, CodecError> {
    raw.trim()
        .parse()
        .map_err(|_| CodecError::MalformedValue {
            field: field.to_string(),
            value: raw.to_string(),
            context: context.to_string(),
        })
}

fn parse_index(element: &Element, element_name: &str) -> Result<i32, CodecError> {
    let raw = required_attribute(element, &Namespace::None, INDEX_ATTR, element_name)?;
    parse_value(raw, INDEX_ATTR, element_name)
}

fn resolve_category(
    reference: &Element,
    categories: &CategoryTable,
    context: &str,
) -> Result<Arc<Category>, CodecError> {
    let id = required_attribute(reference, &Namespace::Schema, IDREF_ATTR, context)?;
    categories
        .get(&CategoryId::new(id))
        .cloned()
        .ok_or_else(|| CodecError::UnresolvedReference {
            kind: ReferenceKind::Category,
            id: id.to_string(),
            context: context.to_string(),
        })
}

/// Resolve predecessor ids to slots, keeping the first of any repeats.
fn resolve_states(
    ids: &[StateId],
    table: &StateTable,
    context: &str,
) -> Result<Vec<StateSlot>, CodecError> {
    let mut seen = BTreeSet::new();
    let mut slots = Vec::with_capacity(ids.len());
    for id in ids {
        let slot = table
            .get(id)
            .copied()
            .ok_or_else(|| CodecError::UnresolvedReference {
                kind: ReferenceKind::State,
                id: id.to_string(),
                context: context.to_string(),
            })?;
        if seen.insert(slot) {
            slots.push(slot);
        }
    }
    Ok(slots)
}

/// The single identifier-only state of rank 0.
fn decode_root_state(rank_element: &Element) -> Result<KState, CodecError> {
    let context = format!("{} {}", KSRANK_ELEM, ROOT_RANK_INDEX);
    let mut candidates = rank_element.children_named(KSTATE_ELEM);

    let element = candidates
        .next()
        .ok_or_else(|| CodecError::MissingElement {
            element: KSTATE_ELEM.to_string(),
            context: context.clone(),
        })?;
    if candidates.next().is_some() {
        return Err(CodecError::InvalidStructure(format!(
            "{} holds more than one {}; expected exactly one root state",
            context, KSTATE_ELEM
        )));
    }

    let id = required_attribute(element, &Namespace::Schema, ID_ATTR, &context)?;
    Ok(KState::root(id))
}

/// A non-root state plus its unresolved predecessor identifiers.
fn decode_state(
    element: &Element,
    rank_index: i32,
    categories: &CategoryTable,
) -> Result<(KState, Vec<StateId>, String), CodecError> {
    let rank_context = format!("{} {}", KSRANK_ELEM, rank_index);
    let id = required_attribute(element, &Namespace::Schema, ID_ATTR, &rank_context)?;
    let context = format!("{} '{}' in {}", KSTATE_ELEM, id, rank_context);
    let state_type = required_attribute(element, &Namespace::None, TYPE_ATTR, &context)?;

    let mut state = KState::new(id, state_type);
    for reference in select_descendants(element, &[PCATEGORIES_ELEM, PCATEGORY_ELEM]) {
        state
            .categories
            .push(resolve_category(reference, categories, &context)?);
    }

    let previous = select_descendants(element, &[PREVIOUS_STATES_ELEM, KSTATE_ELEM])
        .map(|reference| {
            required_attribute(reference, &Namespace::Schema, IDREF_ATTR, &context)
                .map(StateId::new)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((state, previous, context))
}

/// Append `state` to `structure.ranks[rank_pos]` and record it in the table.
fn register(
    structure: &mut KStructure,
    table: &mut StateTable,
    rank_pos: usize,
    state: KState,
) -> Result<StateSlot, CodecError> {
    if table.contains_key(&state.id) {
        return Err(CodecError::DuplicateDefinition {
            kind: ReferenceKind::State,
            id: state.id.to_string(),
        });
    }

    let rank = structure
        .ranks
        .get_mut(rank_pos)
        .ok_or_else(|| CodecError::InvalidStructure(format!("no rank at position {}", rank_pos)))?;
    let slot = StateSlot {
        rank: rank_pos,
        state: rank.states.len(),
    };
    table.insert(state.id.clone(), slot);
    rank.push_state(state);
    Ok(slot)
}

// =============================================================================
// TESTS
// =============================================================================
