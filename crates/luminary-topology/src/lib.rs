//! Grid geometry and neighbor tables for the floor and petal display regions.
//!
//! The display is a rectangular floor with an optional band of petals stacked
//! above it. Every cell owns a 9-slot offset table laid out column-major
//! around the cell:
//!
//! ```text
//!   slot:  0 3 6      NW N NE
//!          1 4 7  =   W  .  E
//!          2 5 8      SW S SE
//! ```
//!
//! Odd slots are orthogonal neighbors, even slots (other than the center)
//! are diagonal. A zero offset marks "no neighbor". Low slots (`0..3`) face
//! west and high slots (`6..9`) face east, so a cell on a petal seam can drop
//! a whole side by narrowing its valid range.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use thiserror::Error;

/// Number of slots in every offset table.
pub const SLOTS: usize = 9;
/// Slot holding the cell itself; its offset is always zero.
pub const SELF_SLOT: usize = 4;
/// Orthogonal north slot, reused by petal tips to reach the adjacent petal.
pub const NORTH_SLOT: usize = 3;

/// Errors emitted while validating grid geometry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// Geometry values that cannot describe a usable grid.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),
}

/// How neighboring petals are joined along their shared columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PetalJoin {
    /// Petals are independent strips linked only at their outer tips.
    #[default]
    Separated,
    /// The band is one continuous cylinder wrapping at its left and right edges.
    Connected,
}

/// Static dimensions of the floor and petal regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridGeometry {
    /// Rows in the rectangular floor.
    pub floor_rows: u32,
    /// Columns in the rectangular floor, counted from the left edge.
    pub floor_cols: u32,
    /// Number of petals in the band; zero disables the band entirely.
    pub petals: u32,
    /// Columns owned by each petal.
    pub petal_cols: u32,
    /// Rows in the petal band, stacked above the floor.
    pub petal_rows: u32,
    /// Seam behavior between petals.
    pub petal_join: PetalJoin,
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self {
            floor_rows: 32,
            floor_cols: 64,
            petals: 5,
            petal_cols: 16,
            petal_rows: 16,
            petal_join: PetalJoin::Separated,
        }
    }
}

impl GridGeometry {
    /// Geometry with only the rectangular floor.
    #[must_use]
    pub const fn floor_only(floor_cols: u32, floor_rows: u32) -> Self {
        Self {
            floor_rows,
            floor_cols,
            petals: 0,
            petal_cols: 0,
            petal_rows: 0,
            petal_join: PetalJoin::Separated,
        }
    }

    /// Checks that the dimensions describe a grid the resolver can link.
    pub fn validate(&self) -> Result<(), TopologyError> {
        if self.floor_rows == 0 || self.floor_cols == 0 {
            return Err(TopologyError::InvalidGeometry(
                "floor dimensions must be non-zero",
            ));
        }
        if self.has_petals() {
            if self.petal_cols < 2 {
                return Err(TopologyError::InvalidGeometry(
                    "petal_cols must be at least 2",
                ));
            }
            if self.petal_rows == 0 {
                return Err(TopologyError::InvalidGeometry(
                    "petal_rows must be non-zero when petals are enabled",
                ));
            }
            if self.floor_cols > self.petals * self.petal_cols {
                return Err(TopologyError::InvalidGeometry(
                    "floor_cols must not exceed the petal band width",
                ));
            }
        }
        Ok(())
    }

    #[must_use]
    pub const fn has_petals(&self) -> bool {
        self.petals > 0
    }

    /// Rows occupied by the petal band (zero without petals).
    #[must_use]
    pub const fn band_rows(&self) -> u32 {
        if self.has_petals() {
            self.petal_rows
        } else {
            0
        }
    }

    #[must_use]
    pub const fn cols(&self) -> u32 {
        if self.has_petals() {
            self.petals * self.petal_cols
        } else {
            self.floor_cols
        }
    }

    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.band_rows() + self.floor_rows
    }

    /// Total cells in the addressable rectangle, active or not.
    #[must_use]
    pub const fn cell_count(&self) -> usize {
        self.rows() as usize * self.cols() as usize
    }

    /// Linear index for `(x, y)`.
    #[inline]
    #[must_use]
    pub const fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.cols() as usize + x as usize
    }

    /// Coordinates for linear index `xy`.
    #[inline]
    #[must_use]
    pub const fn coords(&self, xy: usize) -> (u32, u32) {
        let cols = self.cols() as usize;
        ((xy % cols) as u32, (xy / cols) as u32)
    }

    /// Returns true when `(x, y)` lies inside the grid rectangle.
    #[must_use]
    pub const fn contains(&self, x: u32, y: u32) -> bool {
        x < self.cols() && y < self.rows()
    }

    /// Active cells are the petal band plus the floor columns beneath it.
    #[must_use]
    pub const fn is_active(&self, x: u32, y: u32) -> bool {
        self.contains(x, y) && (y < self.band_rows() || x < self.floor_cols)
    }

    /// Petal that owns column `x`, if the band exists.
    #[must_use]
    pub const fn petal_of(&self, x: u32) -> Option<u32> {
        if self.has_petals() && x < self.cols() {
            Some(x / self.petal_cols)
        } else {
            None
        }
    }
}

/// Row/column class of a cell, which selects its neighbor table shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellClass {
    /// Outside the floor below the petal band; never simulated.
    Inactive,
    /// Full 8-neighbor cell.
    Interior,
    /// Row zero outside a petal tip: no northern neighbors.
    Top,
    /// Row zero, first column of a petal.
    PetalTipFirst,
    /// Row zero, last column of a petal.
    PetalTipLast,
    /// Last grid row: no southern neighbors.
    Bottom,
    /// Left edge of a connected petal band.
    WrapLeft,
    /// Right edge of a connected petal band.
    WrapRight,
    /// Last band row beyond the floor width: treated as a bottom row.
    JoinEdge,
}

/// Offset table plus the slot range a field engine may visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighborhood {
    offsets: [isize; SLOTS],
    start: u8,
    end: u8,
}

impl Neighborhood {
    const EMPTY: Self = Self {
        offsets: [0; SLOTS],
        start: 0,
        end: 0,
    };

    /// Raw linear-index deltas; zero means no neighbor.
    #[must_use]
    pub const fn offsets(&self) -> &[isize; SLOTS] {
        &self.offsets
    }

    /// Slots a field engine is allowed to visit.
    #[must_use]
    pub fn valid_range(&self) -> Range<usize> {
        usize::from(self.start)..usize::from(self.end)
    }

    /// Iterate `(slot, offset)` pairs inside the valid range, skipping sentinels.
    pub fn iter(&self) -> impl Iterator<Item = (usize, isize)> + '_ {
        self.valid_range()
            .map(|slot| (slot, self.offsets[slot]))
            .filter(|&(_, offset)| offset != 0)
    }

    /// Number of real neighbors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Returns true when `slot` holds an orthogonal neighbor.
#[inline]
#[must_use]
pub const fn is_orthogonal(slot: usize) -> bool {
    slot % 2 == 1
}

/// Unit step `(dx, dy)` encoded by `slot`.
#[inline]
#[must_use]
pub const fn slot_direction(slot: usize) -> (i64, i64) {
    ((slot / 3) as i64 - 1, (slot % 3) as i64 - 1)
}

/// One resolved neighbor of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    /// Slot in the offset table.
    pub slot: usize,
    /// Linear index of the neighbor cell.
    pub index: usize,
}

impl Neighbor {
    #[inline]
    #[must_use]
    pub const fn is_orthogonal(&self) -> bool {
        is_orthogonal(self.slot)
    }
}

/// Immutable neighbor tables for every cell of a geometry.
#[derive(Debug, Clone)]
pub struct Topology {
    geometry: GridGeometry,
    tables: Vec<Neighborhood>,
    active: Vec<usize>,
}

impl Topology {
    /// Validate `geometry` and resolve every cell's neighbor table.
    pub fn new(geometry: GridGeometry) -> Result<Self, TopologyError> {
        geometry.validate()?;
        let mut tables = Vec::with_capacity(geometry.cell_count());
        let mut active = Vec::new();
        for y in 0..geometry.rows() {
            for x in 0..geometry.cols() {
                if geometry.is_active(x, y) {
                    active.push(geometry.index(x, y));
                    tables.push(build_neighborhood(&geometry, x, y));
                } else {
                    tables.push(Neighborhood::EMPTY);
                }
            }
        }
        Ok(Self {
            geometry,
            tables,
            active,
        })
    }

    #[must_use]
    pub const fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.tables.len()
    }

    /// Linear indices of active cells in ascending order.
    #[must_use]
    pub fn active_cells(&self) -> &[usize] {
        &self.active
    }

    #[must_use]
    pub fn is_active(&self, xy: usize) -> bool {
        if xy >= self.tables.len() {
            return false;
        }
        let (x, y) = self.geometry.coords(xy);
        self.geometry.is_active(x, y)
    }

    /// Neighbor table for `(x, y)`.
    ///
    /// # Panics
    ///
    /// Panics when `(x, y)` lies outside the grid.
    #[must_use]
    pub fn neighbors(&self, x: u32, y: u32) -> &Neighborhood {
        assert!(
            self.geometry.contains(x, y),
            "cell ({x}, {y}) outside {}x{} grid",
            self.geometry.cols(),
            self.geometry.rows()
        );
        &self.tables[self.geometry.index(x, y)]
    }

    /// Neighbor table for linear index `xy`.
    ///
    /// # Panics
    ///
    /// Panics when `xy` lies outside the grid.
    #[inline]
    #[must_use]
    pub fn neighborhood(&self, xy: usize) -> &Neighborhood {
        assert!(
            xy < self.tables.len(),
            "cell index {xy} outside grid of {} cells",
            self.tables.len()
        );
        &self.tables[xy]
    }

    /// Resolved neighbors of `xy` in slot order.
    pub fn neighbors_of(&self, xy: usize) -> impl Iterator<Item = Neighbor> + '_ {
        self.neighborhood(xy).iter().map(move |(slot, offset)| Neighbor {
            slot,
            index: xy.wrapping_add_signed(offset),
        })
    }

    /// Classify `(x, y)` by the table shape it receives.
    #[must_use]
    pub fn class(&self, x: u32, y: u32) -> CellClass {
        classify(&self.geometry, x, y)
    }
}

fn classify(geometry: &GridGeometry, x: u32, y: u32) -> CellClass {
    if !geometry.is_active(x, y) {
        return CellClass::Inactive;
    }
    let band = y < geometry.band_rows();
    if y == 0 {
        if band {
            let column = x % geometry.petal_cols;
            if column == 0 {
                return CellClass::PetalTipFirst;
            }
            if column == geometry.petal_cols - 1 {
                return CellClass::PetalTipLast;
            }
        }
        return CellClass::Top;
    }
    if y == geometry.rows() - 1 {
        return CellClass::Bottom;
    }
    if band && geometry.petal_join == PetalJoin::Connected {
        if x == 0 {
            return CellClass::WrapLeft;
        }
        if x == geometry.cols() - 1 {
            return CellClass::WrapRight;
        }
    }
    if y + 1 == geometry.band_rows() && x >= geometry.floor_cols {
        return CellClass::JoinEdge;
    }
    CellClass::Interior
}

fn valid_slots(geometry: &GridGeometry, x: u32, y: u32) -> (u8, u8) {
    let (low, high) = if y < geometry.band_rows() {
        match geometry.petal_join {
            PetalJoin::Separated => {
                let column = x % geometry.petal_cols;
                (column == 0, column == geometry.petal_cols - 1)
            }
            PetalJoin::Connected => (false, false),
        }
    } else {
        (x == 0, x + 1 == geometry.cols())
    };
    (if low { 3 } else { 0 }, if high { 6 } else { SLOTS as u8 })
}

fn build_neighborhood(geometry: &GridGeometry, x: u32, y: u32) -> Neighborhood {
    let (start, end) = valid_slots(geometry, x, y);
    let here = geometry.index(x, y) as isize;
    let class = classify(geometry, x, y);
    let mut offsets = [0isize; SLOTS];
    for slot in usize::from(start)..usize::from(end) {
        if slot == SELF_SLOT {
            continue;
        }
        let target = if slot == NORTH_SLOT && geometry.petal_join == PetalJoin::Separated {
            match class {
                CellClass::PetalTipFirst | CellClass::PetalTipLast => tip_link(geometry, x, class),
                _ => link(geometry, x, y, slot),
            }
        } else {
            link(geometry, x, y, slot)
        };
        if let Some((nx, ny)) = target {
            offsets[slot] = geometry.index(nx, ny) as isize - here;
        }
    }
    Neighborhood {
        offsets,
        start,
        end,
    }
}

/// Across-seam partner of a petal tip: the edge column of the adjacent petal.
fn tip_link(geometry: &GridGeometry, x: u32, class: CellClass) -> Option<(u32, u32)> {
    let petal = x / geometry.petal_cols;
    let target = match class {
        CellClass::PetalTipFirst => {
            let previous = (petal + geometry.petals - 1) % geometry.petals;
            previous * geometry.petal_cols + geometry.petal_cols - 1
        }
        CellClass::PetalTipLast => ((petal + 1) % geometry.petals) * geometry.petal_cols,
        _ => return None,
    };
    Some((target, 0))
}

fn link(geometry: &GridGeometry, x: u32, y: u32, slot: usize) -> Option<(u32, u32)> {
    let (dx, dy) = slot_direction(slot);
    let cols = i64::from(geometry.cols());
    let band = i64::from(geometry.band_rows());
    let ny = i64::from(y) + dy;
    if ny < 0 || ny >= i64::from(geometry.rows()) {
        return None;
    }
    let mut nx = i64::from(x) + dx;
    if nx < 0 || nx >= cols {
        let wraps = geometry.petal_join == PetalJoin::Connected
            && i64::from(y) < band
            && ny < band;
        if !wraps {
            return None;
        }
        nx = nx.rem_euclid(cols);
    }
    let (nx, ny) = (nx as u32, ny as u32);
    if !geometry.is_active(nx, ny) {
        return None;
    }
    let band_rows = geometry.band_rows();
    let touches_band = y < band_rows || ny < band_rows;
    if touches_band
        && geometry.petal_join == PetalJoin::Separated
        && geometry.petal_of(x) != geometry.petal_of(nx)
    {
        return None;
    }
    // Crossing the join: the band-side cell must sit over the floor.
    if (y < band_rows) != (ny < band_rows) {
        let band_column = if y < band_rows { x } else { nx };
        if band_column >= geometry.floor_cols {
            return None;
        }
    }
    Some((nx, ny))
}
