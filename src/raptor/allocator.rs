use bitvec::prelude::*;

use crate::{
    network::{Network, flat_matrix},
    raptor::state::{LabelState, Parent, Update},
    shared::Time,
};

/// Per-query scratch for the solver: the `(round x stop)` label matrices,
/// the marked sets, and the update buffer. Pre-allocated once and reusable
/// across queries of the same network so the hot path never touches the
/// heap.
pub struct Allocator {
    rows: usize,
    stop_count: usize,
    /// Earliest arrival per `(round, stop)`; `None` is unreachable.
    arrivals: Vec<Option<Time>>,
    /// Cost and carried-vehicle state, aligned with `arrivals`.
    states: Vec<LabelState>,
    /// Provenance per `(round, stop)`; `Some` only where that round improved
    /// the stop.
    parents: Vec<Option<Parent>>,
    /// Stops improved in the previous round; seeds this round's scans.
    pub(crate) prev_marked: BitVec<usize, Lsb0>,
    /// Stops improved so far in the current round.
    pub(crate) marked: BitVec<usize, Lsb0>,
    /// Staged relaxations, applied in deterministic order.
    pub(crate) updates: Vec<Update>,
    /// `route_idx -> earliest marked position`, valid where the mask is set.
    pub(crate) active: Vec<u32>,
    pub(crate) active_mask: BitVec<usize, Lsb0>,
}

impl Allocator {
    /// Sizes the scratch for `rounds` riding rounds over the given network.
    /// Must only be used with the network it was sized for.
    pub fn new(network: &Network, rounds: usize) -> Self {
        let stop_count = network.stop_count();
        let rows = rounds + 1;
        Self {
            rows,
            stop_count,
            arrivals: vec![None; rows * stop_count],
            states: vec![LabelState::default(); rows * stop_count],
            parents: vec![None; rows * stop_count],
            prev_marked: bitvec!(usize, Lsb0; 0; stop_count),
            marked: bitvec!(usize, Lsb0; 0; stop_count),
            updates: Vec::with_capacity(1024),
            active: vec![u32::MAX; network.routes.len()],
            active_mask: bitvec!(usize, Lsb0; 0; network.routes.len()),
        }
    }

    pub fn reset(&mut self) {
        self.arrivals.fill(None);
        self.states.fill(LabelState::default());
        self.parents.fill(None);
        self.prev_marked.fill(false);
        self.marked.fill(false);
        self.updates.clear();
        self.active.fill(u32::MAX);
        self.active_mask.fill(false);
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    pub(crate) fn stop_count(&self) -> usize {
        self.stop_count
    }

    pub(crate) fn arrival(&self, round: usize, stop_idx: u32) -> Option<Time> {
        self.arrivals[flat_matrix(round, stop_idx as usize, self.stop_count)]
    }

    pub(crate) fn state(&self, round: usize, stop_idx: u32) -> &LabelState {
        &self.states[flat_matrix(round, stop_idx as usize, self.stop_count)]
    }

    pub(crate) fn parent(&self, round: usize, stop_idx: u32) -> Option<&Parent> {
        self.parents[flat_matrix(round, stop_idx as usize, self.stop_count)].as_ref()
    }

    /// Writes a round-0 seed label under the strict-improvement rule.
    pub(crate) fn seed(&mut self, update: Update) {
        let slot = flat_matrix(0, update.stop_idx as usize, self.stop_count);
        if self.arrivals[slot].is_none_or(|best| update.arrival < best) {
            self.arrivals[slot] = Some(update.arrival);
            self.states[slot] = update.state;
            self.parents[slot] = Some(update.parent);
            self.marked.set(update.stop_idx as usize, true);
        }
    }

    /// Starts round `k`: labels inherit round `k-1` (keeping arrivals
    /// monotone across rounds by construction), the current marks become the
    /// previous marks, and the scan-cursor table clears.
    pub(crate) fn begin_round(&mut self, round: usize) {
        let (prev_rows, curr_rows) = self.arrivals.split_at_mut(round * self.stop_count);
        let prev_start = (round - 1) * self.stop_count;
        curr_rows[..self.stop_count]
            .copy_from_slice(&prev_rows[prev_start..prev_start + self.stop_count]);
        let (prev_states, curr_states) = self.states.split_at_mut(round * self.stop_count);
        curr_states[..self.stop_count]
            .clone_from_slice(&prev_states[prev_start..prev_start + self.stop_count]);

        std::mem::swap(&mut self.prev_marked, &mut self.marked);
        self.marked.fill(false);
        self.active.fill(u32::MAX);
        self.active_mask.fill(false);
    }

    /// Applies staged updates to round `k` with strict improvement, in a
    /// deterministic order so identical inputs produce identical labels.
    pub(crate) fn run_updates(&mut self, round: usize) {
        let mut updates = std::mem::take(&mut self.updates);
        updates.sort_by(|a, b| {
            a.stop_idx
                .cmp(&b.stop_idx)
                .then_with(|| a.arrival.cmp(&b.arrival))
                .then_with(|| a.state.cost.cmp(&b.state.cost))
        });
        for update in updates.drain(..) {
            let slot = flat_matrix(round, update.stop_idx as usize, self.stop_count);
            if self.arrivals[slot].is_none_or(|best| update.arrival < best) {
                self.arrivals[slot] = Some(update.arrival);
                self.states[slot] = update.state;
                self.parents[slot] = Some(update.parent);
                self.marked.set(update.stop_idx as usize, true);
            }
        }
        self.updates = updates;
    }

    /// Applies one relaxation immediately (used by the saturating transfer
    /// closure). Returns whether the label improved.
    pub(crate) fn relax_now(&mut self, round: usize, update: Update) -> bool {
        let slot = flat_matrix(round, update.stop_idx as usize, self.stop_count);
        if self.arrivals[slot].is_none_or(|best| update.arrival < best) {
            self.arrivals[slot] = Some(update.arrival);
            self.states[slot] = update.state;
            self.parents[slot] = Some(update.parent);
            self.marked.set(update.stop_idx as usize, true);
            true
        } else {
            false
        }
    }
}
