//! Coupled orthogonal/diagonal decay fields carrying directive tags.
//!
//! The constants are hand-tuned so that the orthogonal and diagonal channels
//! together approximate Euclidean falloff from a source. They are calibrated
//! simulation parameters; keep them exact.

use luminary_topology::Topology;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decay applied across one orthogonal hop, in both channels.
pub const ORTHOGONAL_QUANTUM: i32 = 17;
/// Decay from a diagonal neighbor into the orthogonal channel.
pub const DIAGONAL_TO_ORTHOGONAL: i32 = 21;
/// Decay from a diagonal neighbor into the diagonal channel.
pub const DIAGONAL_TO_DIAGONAL: i32 = 24;
/// Bounded mode: cap on orthogonal re-acceleration from a diagonal hop.
pub const ORTHOGONAL_BOUND: i32 = 150;
/// Bounded mode: cap on diagonal re-acceleration from a diagonal hop.
pub const DIAGONAL_BOUND: i32 = 55;

/// Cap policy for diagonal candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayMode {
    /// Diagonal candidates are capped relative to the cell's own orthogonal value.
    #[default]
    Bounded,
    /// Diagonal candidates are uncapped.
    Square,
}

/// One cell of a decay field pair plus the directives riding on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecayCell {
    pub orth: i32,
    pub diag: i32,
    /// Pattern currently carried by this cell.
    pub directive0: i32,
    /// Pattern to fall back to when the current one times out.
    pub directive1: i32,
}

impl DecayCell {
    /// A cell with both channels set to `value` and the given directives.
    #[must_use]
    pub const fn source(value: i32, directive0: i32, directive1: i32) -> Self {
        Self {
            orth: value,
            diag: value,
            directive0,
            directive1,
        }
    }

    #[inline]
    fn take_orth(&mut self, candidate: i32, from: &DecayCell) {
        if candidate > self.orth {
            self.orth = candidate;
            self.directive0 = from.directive0;
            self.directive1 = from.directive1;
        }
    }

    #[inline]
    fn take_diag(&mut self, candidate: i32, from: &DecayCell) {
        if candidate > self.diag {
            self.diag = candidate;
            self.directive0 = from.directive0;
            self.directive1 = from.directive1;
        }
    }
}

/// Computes the next state of cell `xy` from the `current` snapshot.
///
/// Both channels start at zero and take the maximum candidate over the valid
/// neighbors; whichever neighbor raises a channel hands over its directives,
/// and later ties never overwrite them. Once the orthogonal channel has
/// bottomed out (`<= ORTHOGONAL_QUANTUM`) the directives freeze to the cell's
/// own pre-step tags.
#[must_use]
pub fn decay_step(current: &[DecayCell], topology: &Topology, mode: DecayMode, xy: usize) -> DecayCell {
    let here = current[xy];
    let mut next = DecayCell {
        orth: 0,
        diag: 0,
        directive0: here.directive0,
        directive1: here.directive1,
    };
    for neighbor in topology.neighbors_of(xy) {
        let source = &current[neighbor.index];
        if neighbor.is_orthogonal() {
            let candidate = source.orth - ORTHOGONAL_QUANTUM;
            next.take_orth(candidate, source);
            next.take_diag(candidate, source);
        } else {
            let mut orth = source.diag - DIAGONAL_TO_ORTHOGONAL;
            let mut diag = source.diag - DIAGONAL_TO_DIAGONAL;
            if mode == DecayMode::Bounded {
                orth = orth.min(here.orth.saturating_add(ORTHOGONAL_BOUND));
                diag = diag.min(here.orth.saturating_add(DIAGONAL_BOUND));
            }
            next.take_orth(orth, source);
            next.take_diag(diag, source);
        }
    }
    if next.orth <= ORTHOGONAL_QUANTUM {
        next.directive0 = here.directive0;
        next.directive1 = here.directive1;
    }
    next
}

/// Double-buffered decay field over every cell of a topology.
#[derive(Debug, Clone)]
pub struct DecayField {
    mode: DecayMode,
    current: Vec<DecayCell>,
    next: Vec<DecayCell>,
}

impl DecayField {
    /// A field of `len` zeroed cells tagged with `directive`.
    #[must_use]
    pub fn new(len: usize, mode: DecayMode, directive: i32) -> Self {
        let cell = DecayCell::source(0, directive, directive);
        Self {
            mode,
            current: vec![cell; len],
            next: vec![cell; len],
        }
    }

    #[must_use]
    pub const fn mode(&self) -> DecayMode {
        self.mode
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.current.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    #[must_use]
    pub fn current(&self) -> &[DecayCell] {
        &self.current
    }

    #[must_use]
    pub fn current_mut(&mut self) -> &mut [DecayCell] {
        &mut self.current
    }

    #[must_use]
    pub fn next(&self) -> &[DecayCell] {
        &self.next
    }

    #[must_use]
    pub fn next_mut(&mut self) -> &mut [DecayCell] {
        &mut self.next
    }

    /// Next state of a single cell, without touching any buffer.
    #[must_use]
    pub fn step_cell(&self, topology: &Topology, xy: usize) -> DecayCell {
        decay_step(&self.current, topology, self.mode, xy)
    }

    /// Advance cell `xy` into the next buffer.
    pub fn evolve(&mut self, topology: &Topology, xy: usize) {
        self.next[xy] = decay_step(&self.current, topology, self.mode, xy);
    }

    /// Advance every active cell into the next buffer.
    pub fn step(&mut self, topology: &Topology) {
        let Self {
            mode,
            current,
            next,
        } = self;
        let current = current.as_slice();
        let mode = *mode;
        next.par_iter_mut().enumerate().for_each(|(xy, slot)| {
            if topology.is_active(xy) {
                *slot = decay_step(current, topology, mode, xy);
            }
        });
    }

    /// Copy the next buffer into the current one.
    ///
    /// The next buffer keeps its values so cells skipped by a later partial
    /// step still hold their last state.
    pub fn commit(&mut self) {
        self.current.copy_from_slice(&self.next);
    }
}
