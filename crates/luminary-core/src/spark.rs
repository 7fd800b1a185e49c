//! Short-lived spark ("hanabi") field.
//!
//! A cell lives for one epoch. A dead cell is reborn only when exactly two
//! neighbors are live, which turns each trigger into a ragged expanding ring
//! that burns out on its own.

use crate::decay::{DIAGONAL_TO_DIAGONAL, DIAGONAL_TO_ORTHOGONAL, ORTHOGONAL_QUANTUM};
use luminary_topology::Topology;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Field magnitude stamped on an ignited neighbor.
pub const IGNITED: i32 = 340;
/// A neighbor counts as live above this orthogonal value.
pub const LIVE_THRESHOLD: i32 = ORTHOGONAL_QUANTUM;
/// Live neighbors required for rebirth.
pub const REQUIRED_LIVE_NEIGHBORS: usize = 2;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SparkCell {
    pub color: i32,
    pub orth: i32,
    pub diag: i32,
}

impl SparkCell {
    #[must_use]
    pub const fn is_lit(&self) -> bool {
        self.orth > 0
    }
}

/// Next state of spark cell `xy`.
#[must_use]
pub fn spark_step(current: &[SparkCell], topology: &Topology, xy: usize) -> SparkCell {
    let here = current[xy];
    let mut next = SparkCell {
        color: here.color,
        orth: 0,
        diag: 0,
    };
    if here.is_lit() {
        return next;
    }
    let mut live = 0usize;
    for neighbor in topology.neighbors_of(xy) {
        let source = &current[neighbor.index];
        if source.orth <= LIVE_THRESHOLD {
            continue;
        }
        live += 1;
        let (orth, diag) = if neighbor.is_orthogonal() {
            let value = source.orth - ORTHOGONAL_QUANTUM;
            (value, value)
        } else {
            (
                source.diag - DIAGONAL_TO_ORTHOGONAL,
                source.diag - DIAGONAL_TO_DIAGONAL,
            )
        };
        if orth > next.orth {
            next.orth = orth;
            next.color = source.color;
        }
        if diag > next.diag {
            next.diag = diag;
            next.color = source.color;
        }
    }
    if live != REQUIRED_LIVE_NEIGHBORS {
        next.orth = 0;
        next.diag = 0;
    }
    next
}

/// Ignite the neighbors of `xy` in `cells`: each gets `color` and, on a
/// two-in-three coin, the [`IGNITED`] magnitude (else zero).
pub fn trigger_spark<R: Rng + ?Sized>(
    cells: &mut [SparkCell],
    topology: &Topology,
    xy: usize,
    color: i32,
    rng: &mut R,
) {
    for neighbor in topology.neighbors_of(xy) {
        let value = if rng.random_range(0..3) != 0 { IGNITED } else { 0 };
        cells[neighbor.index] = SparkCell {
            color,
            orth: value,
            diag: value,
        };
    }
}

/// Double-buffered spark field.
#[derive(Debug, Clone)]
pub struct SparkField {
    current: Vec<SparkCell>,
    next: Vec<SparkCell>,
}

impl SparkField {
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            current: vec![SparkCell::default(); len],
            next: vec![SparkCell::default(); len],
        }
    }

    #[must_use]
    pub fn current(&self) -> &[SparkCell] {
        &self.current
    }

    #[must_use]
    pub fn current_mut(&mut self) -> &mut [SparkCell] {
        &mut self.current
    }

    #[must_use]
    pub fn next(&self) -> &[SparkCell] {
        &self.next
    }

    #[must_use]
    pub fn next_mut(&mut self) -> &mut [SparkCell] {
        &mut self.next
    }

    /// Advance every active cell into the next buffer.
    pub fn step(&mut self, topology: &Topology) {
        let current = self.current.as_slice();
        self.next.par_iter_mut().enumerate().for_each(|(xy, slot)| {
            if topology.is_active(xy) {
                *slot = spark_step(current, topology, xy);
            }
        });
    }

    /// Ignite around `xy` in the next buffer.
    pub fn trigger<R: Rng + ?Sized>(&mut self, topology: &Topology, xy: usize, color: i32, rng: &mut R) {
        trigger_spark(&mut self.next, topology, xy, color, rng);
    }

    /// Extinguish cell `xy` in the next buffer, keeping its color.
    pub fn extinguish(&mut self, xy: usize) {
        self.next[xy].orth = 0;
        self.next[xy].diag = 0;
    }

    pub fn commit(&mut self) {
        self.current.copy_from_slice(&self.next);
    }
}
