//! # Knowledge Structure
//!
//! The top-level aggregate handed to and returned from the codec.
//!
//! A `KStructure` owns the rank order and the knowledge ranks. States refer to
//! each other by `StateId`. Adjacency is only ever added in pairs: both
//! [`KStructure::link`] and the decoder's edge insertion write both directions
//! in the same step.

use crate::{CodecError, KSRank, KState, RankOrder, ReferenceKind, StateId};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Position of a state inside `KStructure::ranks`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct StateSlot {
    pub(crate) rank: usize,
    pub(crate) state: usize,
}

/// A knowledge structure: the rank order plus the ranked progression graph.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KStructure {
    /// Categories grouped into ranks.
    pub rank_order: RankOrder,
    /// Knowledge ranks, sorted ascending by index before encoding.
    pub ranks: Vec<KSRank>,
}

impl KStructure {
    /// Create a structure with the given rank order and no knowledge ranks.
    #[must_use]
    pub fn new(rank_order: RankOrder) -> Self {
        Self {
            rank_order,
            ranks: Vec::new(),
        }
    }

    /// Append a knowledge rank.
    pub fn push_rank(&mut self, rank: KSRank) {
        self.ranks.push(rank);
    }

    /// True when there are no knowledge ranks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    /// Sort the rank order and the knowledge ranks by ascending index.
    ///
    /// Reorders in place. States inside a rank keep their order.
    pub fn sort_ascending(&mut self) {
        self.rank_order.sort_ascending();
        self.ranks.sort_by_key(|rank| rank.index);
    }

    /// The single state of rank 0, if present.
    #[must_use]
    pub fn root(&self) -> Option<&KState> {
        self.ranks
            .iter()
            .find(|rank| rank.index == crate::primitives::ROOT_RANK_INDEX)
            .and_then(|rank| rank.states.first())
    }

    /// Every state, rank by rank.
    pub fn states(&self) -> impl Iterator<Item = &KState> {
        self.ranks.iter().flat_map(|rank| rank.states.iter())
    }

    /// Total number of states across all ranks.
    #[must_use]
    pub fn state_count(&self) -> usize {
        self.ranks.iter().map(|rank| rank.states.len()).sum()
    }

    /// Look up a state by identifier.
    #[must_use]
    pub fn state(&self, id: &StateId) -> Option<&KState> {
        self.states().find(|state| &state.id == id)
    }

    /// The predecessor states of `id`. Empty if `id` is unknown.
    #[must_use]
    pub fn predecessors(&self, id: &StateId) -> Vec<&KState> {
        self.state(id)
            .map(|state| state.previous.iter().filter_map(|p| self.state(p)).collect())
            .unwrap_or_default()
    }

    /// The successor states of `id`. Empty if `id` is unknown.
    #[must_use]
    pub fn successors(&self, id: &StateId) -> Vec<&KState> {
        self.state(id)
            .map(|state| state.next.iter().filter_map(|n| self.state(n)).collect())
            .unwrap_or_default()
    }

    /// Connect `previous -> next`, writing both directions.
    ///
    /// Linking an already linked pair is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CodecError::UnresolvedReference` if either state is unknown.
    pub fn link(&mut self, previous: &StateId, next: &StateId) -> Result<(), CodecError> {
        let from = self.slot_of(previous).ok_or_else(|| unresolved(previous, next))?;
        let to = self.slot_of(next).ok_or_else(|| unresolved(next, previous))?;
        self.link_slots(from, to);
        Ok(())
    }

    /// Find the first pair whose adjacency is one-sided.
    ///
    /// Returns `(a, b)` where `a` lists `b` (as successor or predecessor) but
    /// `b` does not list `a` back, or `b` does not exist.
    #[must_use]
    pub fn find_asymmetry(&self) -> Option<(StateId, StateId)> {
        // (predecessor, successor) pairs as seen from each end.
        let mut forward: BTreeSet<(&StateId, &StateId)> = BTreeSet::new();
        let mut backward: BTreeSet<(&StateId, &StateId)> = BTreeSet::new();
        for state in self.states() {
            forward.extend(state.next.iter().map(|next| (&state.id, next)));
            backward.extend(state.previous.iter().map(|previous| (previous, &state.id)));
        }

        for state in self.states() {
            for next in &state.next {
                if !backward.contains(&(&state.id, next)) {
                    return Some((state.id.clone(), next.clone()));
                }
            }
            for previous in &state.previous {
                if !forward.contains(&(previous, &state.id)) {
                    return Some((state.id.clone(), previous.clone()));
                }
            }
        }
        None
    }

    /// True when every adjacency is mirrored.
    #[must_use]
    pub fn is_symmetric(&self) -> bool {
        self.find_asymmetry().is_none()
    }

    /// Find a state lying on a predecessor cycle, if any.
    ///
    /// Kahn's algorithm over the `next` lists; any state never released
    /// belongs to (or hangs off) a cycle.
    #[must_use]
    pub fn find_cycle(&self) -> Option<StateId> {
        let index = self.index();
        let mut in_degree: BTreeMap<&StateId, usize> = BTreeMap::new();
        for state in self.states() {
            in_degree.entry(&state.id).or_insert(0);
            for next in &state.next {
                *in_degree.entry(next).or_insert(0) += 1;
            }
        }

        let mut ready: VecDeque<&StateId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(id, _)| *id)
            .collect();

        while let Some(id) = ready.pop_front() {
            let Some(state) = index.get(id) else {
                continue;
            };
            for next in &state.next {
                if let Some(degree) = in_degree.get_mut(next) {
                    *degree = degree.saturating_sub(1);
                    if *degree == 0 {
                        ready.push_back(next);
                    }
                }
            }
        }

        in_degree
            .into_iter()
            .find(|(_, degree)| *degree > 0)
            .map(|(id, _)| id.clone())
    }

    // -------------------------------------------------------------------------
    // Slot access (decoder fast path)
    // -------------------------------------------------------------------------

    /// Identifier -> state, built once per whole-graph walk.
    fn index(&self) -> BTreeMap<&StateId, &KState> {
        self.states().map(|state| (&state.id, state)).collect()
    }

    fn slot_of(&self, id: &StateId) -> Option<StateSlot> {
        self.ranks.iter().enumerate().find_map(|(rank, ks_rank)| {
            ks_rank
                .states
                .iter()
                .position(|state| &state.id == id)
                .map(|state| StateSlot { rank, state })
        })
    }

    pub(crate) fn state_at(&self, slot: StateSlot) -> Option<&KState> {
        self.ranks.get(slot.rank)?.states.get(slot.state)
    }

    fn state_at_mut(&mut self, slot: StateSlot) -> Option<&mut KState> {
        self.ranks.get_mut(slot.rank)?.states.get_mut(slot.state)
    }

    /// Write `from -> to` into both states unless the pair is already linked.
    fn link_slots(&mut self, from: StateSlot, to: StateSlot) {
        let already = match (self.state_at(from), self.state_at(to)) {
            (Some(source), Some(target)) => source.has_next(&target.id),
            _ => return,
        };
        if !already {
            self.push_edge(from, to);
        }
    }

    /// Append `from -> to` to both adjacency lists without a membership scan.
    ///
    /// The caller guarantees the edge is new. Unknown slots are ignored.
    pub(crate) fn push_edge(&mut self, from: StateSlot, to: StateSlot) {
        let (Some(from_id), Some(to_id)) = (
            self.state_at(from).map(|s| s.id.clone()),
            self.state_at(to).map(|s| s.id.clone()),
        ) else {
            return;
        };

        if let Some(state) = self.state_at_mut(from) {
            state.next.push(to_id);
        }
        if let Some(state) = self.state_at_mut(to) {
            state.previous.push(from_id);
        }
    }
}

fn unresolved(missing: &StateId, other: &StateId) -> CodecError {
    CodecError::UnresolvedReference {
        kind: ReferenceKind::State,
        id: missing.to_string(),
        context: format!("link with state '{}'", other),
    }
}

// =============================================================================
// TESTS
// =============================================================================
