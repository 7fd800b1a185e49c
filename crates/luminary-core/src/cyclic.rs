//! Stochastic cyclic color automaton.
//!
//! Cells drift toward the color one or two steps ahead of their own when a
//! neighbor already shows it. Diagonals are sampled only part of the time,
//! which bends the growth into spirals. An impatience counter forces random
//! recolors when a cell stagnates.

use luminary_topology::Topology;
use rand::Rng;

/// Number of hues in the color wheel.
pub const COLORS: i32 = 12;
/// Sentinel for a suppressed ("off") cell.
pub const OFF: i32 = -1;
/// Chance that any given diagonal neighbor is sampled this epoch.
pub const DIAGONAL_SAMPLE_P: f64 = 0.6;
/// Chance that a neighbor two steps ahead lets the cell skip forward.
pub const SKIP_AHEAD_P: f64 = 0.22;
/// Neighbor share that forces conformity with little impatience.
pub const STRONG_MAJORITY: f64 = 0.79;
/// Impatience required for the strong-majority snap.
pub const STRONG_MAJORITY_IMPATIENCE: u32 = 5;
/// Neighbor share that forces conformity with more impatience.
pub const WEAK_MAJORITY: f64 = 0.62;
/// Impatience required for the weak-majority snap.
pub const WEAK_MAJORITY_IMPATIENCE: u32 = 30;
/// Halved impatience above this reshuffles an advancing cell.
pub const RESHUFFLE_IMPATIENCE: u32 = 50;
/// Impatience above this reshuffles unconditionally.
pub const PRECIPITATE_IMPATIENCE: u32 = 200;
/// Pressure above which the masked variant turns the cell off.
pub const SPOTLIGHT_PRESSURE: i32 = 17;

/// Next color for cell `xy`, updating its impatience in place.
///
/// A cell holding [`OFF`] evolves as if it showed the last hue, so it
/// re-enters the wheel on its next step.
pub fn cyclic_step<R: Rng + ?Sized>(
    colors: &[i32],
    impatience: &mut [u32],
    topology: &Topology,
    xy: usize,
    rng: &mut R,
) -> i32 {
    impatience[xy] = impatience[xy].saturating_add(1);
    let own = colors[xy];
    let base = own.rem_euclid(COLORS);
    let one_ahead = (base + 1) % COLORS;
    let two_ahead = (base + 2) % COLORS;

    let mut histogram = [0u32; COLORS as usize];
    let mut sampled = 0u32;
    let mut increment = 0;
    for neighbor in topology.neighbors_of(xy) {
        if !neighbor.is_orthogonal() && !rng.random_bool(DIAGONAL_SAMPLE_P) {
            continue;
        }
        sampled += 1;
        let color = colors[neighbor.index];
        if color < 0 {
            continue;
        }
        histogram[color as usize] += 1;
        if increment == 2 {
            continue;
        }
        if color == two_ahead && rng.random_bool(SKIP_AHEAD_P) {
            increment = 2;
        } else if color == one_ahead {
            increment = 1;
        }
    }

    let patience = impatience[xy];
    let share = |count: u32, fraction: f64| f64::from(count) > fraction * f64::from(sampled);
    for (color, &count) in histogram.iter().enumerate() {
        let color = color as i32;
        if color == own {
            continue;
        }
        if (share(count, STRONG_MAJORITY) && patience > STRONG_MAJORITY_IMPATIENCE)
            || (share(count, WEAK_MAJORITY) && patience > WEAK_MAJORITY_IMPATIENCE)
        {
            return color;
        }
    }

    if increment != 0 {
        impatience[xy] /= 2;
        if impatience[xy] > RESHUFFLE_IMPATIENCE {
            return rng.random_range(0..COLORS);
        }
    }
    if impatience[xy] > PRECIPITATE_IMPATIENCE {
        return rng.random_range(0..COLORS);
    }
    (base + increment) % COLORS
}

/// Double-buffered cyclic color field with a shared impatience counter.
#[derive(Debug, Clone)]
pub struct CyclicField {
    current: Vec<i32>,
    next: Vec<i32>,
    impatience: Vec<u32>,
}

impl CyclicField {
    /// A field of `len` cells, all showing `color`.
    #[must_use]
    pub fn new(len: usize, color: i32) -> Self {
        Self {
            current: vec![color; len],
            next: vec![color; len],
            impatience: vec![0; len],
        }
    }

    /// A field of `len` cells with uniformly random colors.
    pub fn random<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        let current: Vec<i32> = (0..len).map(|_| rng.random_range(0..COLORS)).collect();
        Self {
            next: current.clone(),
            current,
            impatience: vec![0; len],
        }
    }

    #[must_use]
    pub fn current(&self) -> &[i32] {
        &self.current
    }

    #[must_use]
    pub fn current_mut(&mut self) -> &mut [i32] {
        &mut self.current
    }

    #[must_use]
    pub fn next(&self) -> &[i32] {
        &self.next
    }

    #[must_use]
    pub fn next_mut(&mut self) -> &mut [i32] {
        &mut self.next
    }

    #[must_use]
    pub fn impatience(&self) -> &[u32] {
        &self.impatience
    }

    /// Advance cell `xy` into the next buffer.
    pub fn evolve<R: Rng + ?Sized>(&mut self, topology: &Topology, xy: usize, rng: &mut R) {
        self.next[xy] = cyclic_step(&self.current, &mut self.impatience, topology, xy, rng);
    }

    /// Like [`evolve`](Self::evolve), but turns the cell off while `pressure`
    /// exceeds [`SPOTLIGHT_PRESSURE`].
    pub fn evolve_masked<R: Rng + ?Sized>(
        &mut self,
        topology: &Topology,
        xy: usize,
        pressure: i32,
        rng: &mut R,
    ) {
        if pressure > SPOTLIGHT_PRESSURE {
            self.next[xy] = OFF;
        } else {
            self.evolve(topology, xy, rng);
        }
    }

    pub fn commit(&mut self) {
        self.current.copy_from_slice(&self.next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luminary_topology::GridGeometry;
    use rand::{RngCore, SeedableRng, rngs::SmallRng};

    /// Every draw returns the same word: `0` makes each Bernoulli draw
    /// succeed, `u64::MAX` makes each one fail.
    struct FixedRng(u64);

    impl RngCore for FixedRng {
        fn next_u32(&mut self) -> u32 {
            self.0 as u32
        }

        fn next_u64(&mut self) -> u64 {
            self.0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(self.0 as u8);
        }
    }

    const ALWAYS: u64 = 0;
    const NEVER: u64 = u64::MAX;

    fn topology() -> Topology {
        Topology::new(GridGeometry::floor_only(5, 5)).expect("topology")
    }

    #[test]
    fn uniform_neighborhood_holds_color_and_grows_impatient() {
        let topology = topology();
        let mut rng = SmallRng::seed_from_u64(1);
        let colors = vec![0; 25];
        let mut impatience = vec![0; 25];
        let next = cyclic_step(&colors, &mut impatience, &topology, 12, &mut rng);
        assert_eq!(next, 0);
        assert_eq!(impatience[12], 1);
    }

    #[test]
    fn orthogonal_successor_advances_color() {
        let topology = topology();
        let mut rng = SmallRng::seed_from_u64(2);
        let mut colors = vec![4; 25];
        colors[topology.geometry().index(2, 1)] = 5;
        let mut impatience = vec![0; 25];
        impatience[12] = 9;
        let next = cyclic_step(&colors, &mut impatience, &topology, 12, &mut rng);
        assert_eq!(next, 5);
        assert_eq!(impatience[12], 5);
    }

    #[test]
    fn majority_snaps_impatient_cell() {
        let topology = topology();
        let mut rng = SmallRng::seed_from_u64(3);
        let mut colors = vec![7; 25];
        colors[12] = 2;
        let mut impatience = vec![0; 25];
        impatience[12] = 6;
        let next = cyclic_step(&colors, &mut impatience, &topology, 12, &mut rng);
        assert_eq!(next, 7);
    }

    #[test]
    fn stagnant_cell_precipitates() {
        let topology = topology();
        let mut rng = SmallRng::seed_from_u64(4);
        let colors = vec![3; 25];
        let mut impatience = vec![0; 25];
        impatience[12] = PRECIPITATE_IMPATIENCE;
        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            impatience[12] = PRECIPITATE_IMPATIENCE;
            seen.insert(cyclic_step(&colors, &mut impatience, &topology, 12, &mut rng));
        }
        assert!(seen.len() > 1, "precipitation should randomize the color");
    }

    #[test]
    fn colors_stay_in_domain() {
        let topology = topology();
        let mut rng = SmallRng::seed_from_u64(5);
        let mut field = CyclicField::random(25, &mut rng);
        field.current_mut()[0] = OFF;
        for _ in 0..200 {
            for xy in 0..25 {
                field.evolve(&topology, xy, &mut rng);
            }
            field.commit();
            assert!(field.current().iter().all(|c| (0..COLORS).contains(c)));
        }
    }

    #[test]
    fn pressure_masks_output() {
        let topology = topology();
        let mut rng = SmallRng::seed_from_u64(6);
        let mut field = CyclicField::new(25, 1);
        field.evolve_masked(&topology, 12, SPOTLIGHT_PRESSURE + 1, &mut rng);
        assert_eq!(field.next()[12], OFF);
        field.evolve_masked(&topology, 12, SPOTLIGHT_PRESSURE, &mut rng);
        assert_eq!(field.next()[12], 1);
    }

    #[test]
    fn weak_majority_needs_long_impatience() {
        let topology = topology();
        let geometry = *topology.geometry();
        let mut colors = vec![7; 25];
        colors[12] = 0;
        // Three of the four orthogonal neighbors agree: 0.75 of the sample.
        colors[geometry.index(2, 1)] = 0;
        let mut impatience = vec![0; 25];

        impatience[12] = WEAK_MAJORITY_IMPATIENCE - 1;
        let next = cyclic_step(&colors, &mut impatience, &topology, 12, &mut FixedRng(NEVER));
        assert_eq!(next, 0);

        impatience[12] = WEAK_MAJORITY_IMPATIENCE;
        let next = cyclic_step(&colors, &mut impatience, &topology, 12, &mut FixedRng(NEVER));
        assert_eq!(next, 7);
    }

    #[test]
    fn two_ahead_neighbor_skips_a_color() {
        let topology = topology();
        let geometry = *topology.geometry();
        let mut colors = vec![4; 25];
        colors[geometry.index(1, 2)] = 6;

        let mut impatience = vec![0; 25];
        let next = cyclic_step(&colors, &mut impatience, &topology, 12, &mut FixedRng(ALWAYS));
        assert_eq!(next, 6);
        assert_eq!(impatience[12], 0);

        let mut impatience = vec![0; 25];
        let next = cyclic_step(&colors, &mut impatience, &topology, 12, &mut FixedRng(NEVER));
        assert_eq!(next, 4);
        assert_eq!(impatience[12], 1);
    }

    #[test]
    fn halved_impatience_past_threshold_reshuffles() {
        let topology = topology();
        let geometry = *topology.geometry();
        let mut colors = vec![4; 25];
        colors[geometry.index(2, 1)] = 5;
        let mut impatience = vec![0; 25];

        // 90 + 1 halves to 45: still under the reshuffle threshold.
        impatience[12] = 90;
        let mut rng = SmallRng::seed_from_u64(8);
        assert_eq!(cyclic_step(&colors, &mut impatience, &topology, 12, &mut rng), 5);
        assert_eq!(impatience[12], 45);

        let mut seen = std::collections::HashSet::new();
        for _ in 0..64 {
            impatience[12] = 110;
            seen.insert(cyclic_step(&colors, &mut impatience, &topology, 12, &mut rng));
            assert_eq!(impatience[12], 55);
        }
        assert!(seen.len() > 1, "reshuffle should randomize the color");
    }
}
