//! Cellular-automaton light engine: field engines, pattern renderer, and the
//! epoch scheduler that ties them to a render sink.

pub mod control;
pub mod cyclic;
pub mod decay;
pub mod pattern;
pub mod reaction;
pub mod sink;
pub mod spark;
pub mod timing;

pub use control::{
    ChannelDecoder, ChannelError, ChannelFrame, ChannelSnapshot, ControlCommand, Scene,
    apply_control_command,
};
pub use cyclic::{COLORS, CyclicField, OFF};
pub use decay::{DecayCell, DecayField, DecayMode};
pub use luminary_topology::{GridGeometry, PetalJoin, Topology, TopologyError};
pub use pattern::{CellView, Pattern, Swatch, render_cell, state_key};
pub use reaction::{ReactionConfig, ReactionDiffusion};
pub use sink::{DiscardSink, FrameBuffer, RenderSink};
pub use spark::{SparkCell, SparkField};
pub use timing::{EpochBudget, EpochReport, FrameBudgeter, PhaseSample, PhaseTimings};

use decay::ORTHOGONAL_QUANTUM;
use pattern::{AGGRESSIVE_REVERSION, HANABI_CYCLE, RAINBOW_TONE_EPOCHS};
use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

/// Baseline epochs per second.
pub const BASE_HZ: u32 = 10;
/// Multiple of [`BASE_HZ`] at which waves and control decay run.
pub const WILDFIRE_SPEEDUP: u32 = 4;
/// Lifetime of a freshly ignited pattern.
pub const TRANSITION_TICKS: i32 = 3000;
/// Lifetime granted when a cell falls back to its secondary pattern.
pub const SECONDARY_TRANSITION_TICKS: i32 = 300;
/// Control values at or above this never revert.
pub const HIBERNATION_TICKS: i32 = 70_000;
/// Epochs computed without rendering at startup.
pub const INITIALIZATION_EPOCHS: u64 = 200 * WILDFIRE_SPEEDUP as u64;
/// Wildfire epochs a pressed cell keeps pumping pressure.
pub const PRESSURE_DELAY_EPOCHS: u32 = 5;
/// Pressure magnitude injected by a press.
pub const PRESSURE_RADIUS_TICKS: i32 = 76;
/// Minimum control value held by the no-hibernation scene anchor.
pub const NO_HIBERNATION_FLOOR: i32 = 10_000;
/// Extra lifetime for an extended (or cold-started) rainbow.
pub const EXTENDED_LIFETIME_BONUS: i32 = 10_000;
/// Wave steps at the start of each hanabi cycle during which sparks are quenched.
pub const SPARK_QUIET_STEPS: i32 = 12;
/// Control lifetime added when a source cell changes tone pattern.
pub const TONE_CHANGE_BONUS: i32 = 18;
/// Wave shift applied by a color change: ten and a half tone cycles.
pub const CHANGE_COLOR_STEP: i32 = 21 * RAINBOW_TONE_EPOCHS * COLORS / 2;
/// Petal slots addressable from the keyboard when the band is disabled.
pub const PETAL_KEYS: u32 = 5;

/// Radial wave profile, indexed from [`WAVE_PROFILE_CENTER`] at the floor midline.
pub const WAVE_PROFILE: [i32; 97] = [
    -331, -319, -307, -295, -283, -271, -260, -249, -237, -226, -215, -205, -194, -184, -173,
    -163, -154, -144, -135, -125, -116, -108, -99, -91, -83, -75, -68, -61, -54, -47, -41, -35,
    -29, -24, -18, -14, -9, -5, -1, 2, 4, 6, 6, 7, 8, 8, 9, 9, 9, 9, 9, 8, 8, 7, 6, 6, 4, 2, -1, -5,
    -9, -14, -18, -24, -29, -35, -41, -47, -54, -61, -68, -75, -83, -91, -99, -108, -116, -125,
    -135, -144, -154, -163, -173, -184, -194, -205, -215, -226, -237, -249, -260, -271, -283,
    -295, -307, -319, -331,
];
pub const WAVE_PROFILE_CENTER: usize = 48;

/// How the source row drives the wave field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveSource {
    /// Every source cell climbs one quantum per epoch.
    #[default]
    Flat,
    /// A fixed bowl-shaped profile riding on a rising base.
    Radial,
}

/// Rule that drives the primary color field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvolutionRule {
    #[default]
    Cyclic,
    ReactionDiffusion,
}

/// Errors raised while building an [`Engine`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Static configuration for the light engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LuminaryConfig {
    pub geometry: GridGeometry,
    pub base_hz: u32,
    pub wildfire_speedup: u32,
    pub transition_ticks: i32,
    pub secondary_transition_ticks: i32,
    pub hibernation_ticks: i32,
    pub pressure_radius_ticks: i32,
    pub pressure_delay_epochs: u32,
    /// Epochs to run before the first frame is drawn.
    pub initialization_epochs: u64,
    /// Share of the epoch usable before the scheduler sleeps.
    pub usable_budget_fraction: f64,
    /// Weight kept by the phase timing averages per sample.
    pub timing_smoothing: f64,
    pub decay_mode: DecayMode,
    pub wave_source: WaveSource,
    pub evolution: EvolutionRule,
    pub reaction: ReactionConfig,
    /// Scene active at startup.
    pub scene: Scene,
    /// One-in-N chance per floor cell per epoch of an ambient press.
    /// `None` derives it from the floor size; zero disables presses.
    pub ambient_press_odds: Option<u32>,
    /// One-in-N chance per cell per epoch of a scene-policy reversion.
    /// `None` derives it from the grid size; zero disables random reversion.
    pub secondary_transition_odds: Option<u32>,
    /// Optional RNG seed for reproducible runs.
    pub rng_seed: Option<u64>,
}

impl Default for LuminaryConfig {
    fn default() -> Self {
        Self {
            geometry: GridGeometry::default(),
            base_hz: BASE_HZ,
            wildfire_speedup: WILDFIRE_SPEEDUP,
            transition_ticks: TRANSITION_TICKS,
            secondary_transition_ticks: SECONDARY_TRANSITION_TICKS,
            hibernation_ticks: HIBERNATION_TICKS,
            pressure_radius_ticks: PRESSURE_RADIUS_TICKS,
            pressure_delay_epochs: PRESSURE_DELAY_EPOCHS,
            initialization_epochs: INITIALIZATION_EPOCHS,
            usable_budget_fraction: timing::DEFAULT_USABLE_FRACTION,
            timing_smoothing: timing::DEFAULT_SMOOTHING,
            decay_mode: DecayMode::Bounded,
            wave_source: WaveSource::Flat,
            evolution: EvolutionRule::Cyclic,
            reaction: ReactionConfig::default(),
            scene: Scene::Base,
            ambient_press_odds: None,
            secondary_transition_odds: None,
            rng_seed: None,
        }
    }
}

impl LuminaryConfig {
    /// Validates the configuration, returning an error if it is inconsistent.
    pub fn validate(&self) -> Result<(), EngineError> {
        self.geometry.validate()?;
        if self.geometry.floor_rows < 3 {
            return Err(EngineError::InvalidConfig(
                "floor_rows must be at least 3 to host the source row",
            ));
        }
        if self.base_hz == 0 || self.wildfire_speedup == 0 {
            return Err(EngineError::InvalidConfig(
                "base_hz and wildfire_speedup must be non-zero",
            ));
        }
        if self.pressure_radius_ticks <= 0 {
            return Err(EngineError::InvalidConfig(
                "pressure_radius_ticks must be positive",
            ));
        }
        if self.transition_ticks < 0
            || self.secondary_transition_ticks < 0
            || self.hibernation_ticks < 0
        {
            return Err(EngineError::InvalidConfig(
                "transition and hibernation lifetimes must be non-negative",
            ));
        }
        if !(self.usable_budget_fraction > 0.0 && self.usable_budget_fraction <= 1.0) {
            return Err(EngineError::InvalidConfig(
                "usable_budget_fraction must be in (0, 1]",
            ));
        }
        if !(0.0..1.0).contains(&self.timing_smoothing) {
            return Err(EngineError::InvalidConfig(
                "timing_smoothing must be in [0, 1)",
            ));
        }
        if self.evolution == EvolutionRule::ReactionDiffusion {
            if self.reaction.scales.is_empty() {
                return Err(EngineError::InvalidConfig(
                    "reaction-diffusion needs at least one scale",
                ));
            }
            if self
                .reaction
                .scales
                .iter()
                .any(|scale| scale.activator_radius >= scale.inhibitor_radius)
            {
                return Err(EngineError::InvalidConfig(
                    "each activator radius must be smaller than its inhibitor radius",
                ));
            }
        }
        Ok(())
    }

    /// Wall-clock budget implied by the rate settings.
    #[must_use]
    pub fn budget(&self) -> EpochBudget {
        EpochBudget::new(
            self.base_hz,
            self.wildfire_speedup,
            self.usable_budget_fraction,
        )
    }

    fn press_odds(&self) -> u32 {
        self.ambient_press_odds.unwrap_or_else(|| {
            self.geometry
                .floor_rows
                .saturating_mul(self.geometry.floor_cols)
                .saturating_mul(100)
        })
    }

    fn transition_odds(&self) -> u32 {
        self.secondary_transition_odds
            .unwrap_or_else(|| u32::try_from(self.geometry.cell_count()).unwrap_or(u32::MAX))
    }

    fn seeded_rng(&self) -> (u64, SmallRng) {
        let seed = self.rng_seed.unwrap_or_else(rand::random);
        (seed, SmallRng::seed_from_u64(seed))
    }
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnginePhase {
    /// Rendering is suppressed while the fields settle.
    Initializing { percent: u8 },
    Running,
}

/// One-in-`odds` draw; zero odds never fire.
fn one_in(rng: &mut SmallRng, odds: u32) -> bool {
    odds > 0 && rng.random_range(0..odds) == 0
}

/// Radial source value for floor column `x`.
fn radial_wave(base: i32, x: u32, floor_cols: u32) -> i32 {
    let last = WAVE_PROFILE.len() as i64 - 1;
    let offset = (i64::from(x) + WAVE_PROFILE_CENTER as i64 - i64::from(floor_cols / 2))
        .clamp(0, last) as usize;
    base.saturating_add(WAVE_PROFILE[offset]).max(0)
}

/// The light engine: every state field plus the scheduler that advances them.
#[derive(Debug)]
pub struct Engine {
    config: LuminaryConfig,
    topology: Topology,
    rng: SmallRng,
    seed: u64,
    epoch: u64,
    scene: Scene,
    control: DecayField,
    waves: DecayField,
    pressure: DecayField,
    rainbow: CyclicField,
    spotlight: CyclicField,
    sparks: SparkField,
    reaction: Option<ReactionDiffusion>,
    tone: Vec<i32>,
    pressure_self: Vec<u32>,
    seed_colors: Vec<i32>,
    wave_base: i32,
    channel: ChannelDecoder,
    pending_presses: Vec<usize>,
    pending_sparks: Vec<(usize, i32)>,
    press_odds: u32,
    transition_odds: u32,
}

impl Engine {
    /// Build an engine from a validated configuration.
    pub fn new(config: LuminaryConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let topology = Topology::new(config.geometry)?;
        let (seed, mut rng) = config.seeded_rng();
        let len = topology.cell_count();
        let base = Pattern::Base.code();
        let rainbow = CyclicField::random(len, &mut rng);
        let spotlight = CyclicField::random(len, &mut rng);
        let seed_colors = (0..len).map(|_| rng.random_range(0..COLORS)).collect();
        let geometry = topology.geometry();
        let reaction = match config.evolution {
            EvolutionRule::Cyclic => None,
            EvolutionRule::ReactionDiffusion => Some(ReactionDiffusion::new(
                geometry.cols() as usize,
                geometry.rows() as usize,
                &config.reaction,
                &mut rng,
            )),
        };
        info!(
            cols = geometry.cols(),
            rows = geometry.rows(),
            active = topology.active_cells().len(),
            seed,
            evolution = ?config.evolution,
            "engine initialized"
        );
        Ok(Self {
            press_odds: config.press_odds(),
            transition_odds: config.transition_odds(),
            scene: config.scene,
            control: DecayField::new(len, config.decay_mode, base),
            waves: DecayField::new(len, config.decay_mode, base),
            pressure: DecayField::new(len, config.decay_mode, base),
            rainbow,
            spotlight,
            sparks: SparkField::new(len),
            reaction,
            tone: vec![0; len],
            pressure_self: vec![0; len],
            seed_colors,
            wave_base: 0,
            channel: ChannelDecoder::new(),
            pending_presses: Vec::new(),
            pending_sparks: Vec::new(),
            epoch: 0,
            seed,
            rng,
            topology,
            config,
        })
    }

    /// Advance one epoch, drawing into `sink` once initialization is over.
    pub fn run_epoch(&mut self, sink: &mut dyn RenderSink) -> EpochReport {
        let started = Instant::now();
        self.epoch += 1;
        let wildfire = self
            .epoch
            .is_multiple_of(u64::from(self.config.wildfire_speedup));

        self.stage_fields(wildfire);
        self.stage_source_row();
        self.stage_presses(wildfire);
        self.stage_tone();
        let computed = started.elapsed();

        let rendered = self.epoch > self.config.initialization_epochs;
        if rendered {
            self.stage_render(sink);
        }
        let drawn = started.elapsed();
        let dirty = if rendered { sink.flush(self.epoch) } else { 0 };
        let refreshed = started.elapsed();

        self.stage_commit();
        if rendered {
            self.stage_scene_hold();
        }

        if rendered && self.epoch == self.config.initialization_epochs + 1 {
            info!(epoch = self.epoch, "initialization complete");
        }
        EpochReport {
            epoch: self.epoch,
            rendered,
            dirty,
            compute: computed,
            draw: drawn.saturating_sub(computed),
            refresh: refreshed.saturating_sub(drawn),
        }
    }

    /// Advance one epoch without a display.
    pub fn step(&mut self) -> EpochReport {
        self.run_epoch(&mut DiscardSink)
    }

    /// Decay steps, scene-policy reversions, and the wildfire sub-steps.
    fn stage_fields(&mut self, wildfire: bool) {
        let topology = &self.topology;
        self.control.step(topology);
        self.waves.step(topology);
        if wildfire {
            self.pressure.step(topology);
            self.sparks.step(topology);
            if let Some(reaction) = self.reaction.as_mut() {
                reaction.step();
            }
        }

        let hibernation = self.config.hibernation_ticks;
        let secondary = self.config.secondary_transition_ticks;
        let radius = self.config.pressure_radius_ticks;
        let odds = self.transition_odds;
        let base = Pattern::Base.code();
        for &xy in topology.active_cells() {
            let before = self.control.current()[xy];
            let cell = &mut self.control.next_mut()[xy];
            if cell.orth < hibernation
                && cell.orth < before.orth
                && cell.directive0 != cell.directive1
            {
                let roll = one_in(&mut self.rng, odds);
                if roll || cell.directive0 > AGGRESSIVE_REVERSION {
                    cell.directive0 = cell.directive1;
                    cell.orth = cell.orth.saturating_add(secondary);
                }
            }
            if cell.orth == 0 && cell.directive0 != base && one_in(&mut self.rng, odds) {
                cell.directive0 = base;
                cell.directive1 = base;
                cell.orth = secondary;
            }

            if wildfire {
                match self.reaction.as_ref() {
                    Some(reaction) => self.rainbow.next_mut()[xy] = reaction.phase_color(xy),
                    None => self.rainbow.evolve(topology, xy, &mut self.rng),
                }
                let pressure = self.pressure.current()[xy].orth;
                self.spotlight
                    .evolve_masked(topology, xy, pressure, &mut self.rng);
                if self.pressure_self[xy] > 0 {
                    self.pressure_self[xy] -= 1;
                    let cell = &mut self.pressure.next_mut()[xy];
                    cell.orth = radius;
                    cell.diag = radius;
                }
                let wave_step = self.waves.next()[xy].orth / ORTHOGONAL_QUANTUM;
                if wave_step % HANABI_CYCLE < SPARK_QUIET_STEPS {
                    self.sparks.extinguish(xy);
                }
            } else if self.reaction.is_none()
                && self.rng.random_range(0..radius) < self.pressure.current()[xy].orth
            {
                self.rainbow.evolve(topology, xy, &mut self.rng);
            }
        }
    }

    /// Drive the source row and apply row-level scene policy.
    fn stage_source_row(&mut self) {
        self.wave_base = self.wave_base.saturating_add(ORTHOGONAL_QUANTUM);
        let geometry = *self.topology.geometry();
        let row = self.source_row();
        let sweep = (self.epoch % u64::from(geometry.cols())) as u32;
        let lifetime = self.config.hibernation_ticks + self.config.transition_ticks;
        let tones = Pattern::NTones(2).code()..=Pattern::NTones(Pattern::MAX_TONES).code();

        for x in 0..geometry.floor_cols {
            let xy = geometry.index(x, row);
            let wave = match self.config.wave_source {
                WaveSource::Flat => self.waves.next()[xy]
                    .orth
                    .max(self.waves.current()[xy].orth)
                    .saturating_add(ORTHOGONAL_QUANTUM),
                WaveSource::Radial => radial_wave(self.wave_base, x, geometry.floor_cols),
            };
            let cell = &mut self.waves.next_mut()[xy];
            cell.orth = wave;
            cell.diag = wave;

            if tones.contains(&self.control.next()[xy].directive0) {
                let cycle = wave / ORTHOGONAL_QUANTUM / RAINBOW_TONE_EPOCHS / COLORS;
                let level = 2 + (2 * self.tone[xy] + cycle).rem_euclid(3);
                let directive = Pattern::NTones(level as u8).code();
                let changed = directive != self.control.current()[xy].directive0;
                let cell = &mut self.control.next_mut()[xy];
                cell.directive0 = directive;
                cell.directive1 = directive;
                if changed {
                    cell.orth = cell.orth.saturating_add(TONE_CHANGE_BONUS);
                }
            }

            match self.scene {
                Scene::CirclingRainbows if x == sweep => {
                    let cell = &mut self.control.next_mut()[xy];
                    cell.directive0 = Pattern::FullRainbow.aggressive();
                    cell.directive1 = Pattern::TwoTones.code();
                    cell.orth = lifetime;
                }
                Scene::Q2 => {
                    let above = geometry.index(x, row - 1);
                    let q2 = Pattern::Q2.code();
                    let changed = self.control.current()[above].directive0 != q2;
                    let cell = &mut self.control.next_mut()[above];
                    cell.directive0 = q2;
                    cell.directive1 = q2;
                    if changed {
                        cell.orth = cell.orth.saturating_add(TONE_CHANGE_BONUS);
                    }
                }
                _ => {}
            }
        }
    }

    /// Ambient presses (wildfire epochs only), then queued presses and sparks.
    fn stage_presses(&mut self, wildfire: bool) {
        if wildfire {
            let geometry = *self.topology.geometry();
            let band = geometry.band_rows();
            for &xy in self.topology.active_cells() {
                let (x, y) = geometry.coords(xy);
                if y > band && x < geometry.floor_cols && one_in(&mut self.rng, self.press_odds) {
                    self.pending_presses.push(xy);
                }
            }
        }

        let delay = self.config.pressure_delay_epochs;
        for &xy in &self.pending_presses {
            if self.pressure_self[xy] < delay {
                self.sparks
                    .trigger(&self.topology, xy, self.seed_colors[xy], &mut self.rng);
            }
            self.pressure_self[xy] = delay;
        }
        self.pending_presses.clear();

        for (xy, color) in self.pending_sparks.drain(..) {
            self.sparks.trigger(&self.topology, xy, color, &mut self.rng);
        }
    }

    /// Re-derive tones from the wave phase where the color moved.
    fn stage_tone(&mut self) {
        let full_rainbow = Pattern::FullRainbow.code();
        for &xy in self.topology.active_cells() {
            if self.control.current()[xy].directive0 == full_rainbow
                || self.rainbow.next()[xy] != self.rainbow.current()[xy]
            {
                self.tone[xy] = (self.waves.next()[xy].orth / ORTHOGONAL_QUANTUM
                    / RAINBOW_TONE_EPOCHS)
                    .rem_euclid(COLORS);
            }
        }
    }

    fn stage_render(&self, sink: &mut dyn RenderSink) {
        for &xy in self.topology.active_cells() {
            let view = self.cell_view(xy);
            let swatch = render_cell(&view);
            sink.draw_cell(xy, swatch, state_key(view.directive, swatch));
        }
    }

    fn stage_commit(&mut self) {
        self.control.commit();
        self.waves.commit();
        self.pressure.commit();
        self.rainbow.commit();
        self.spotlight.commit();
        self.sparks.commit();
    }

    fn stage_scene_hold(&mut self) {
        if self.scene == Scene::NoHibernation {
            let anchor = self.petal_source(2);
            let cell = &mut self.control.current_mut()[anchor];
            cell.orth = cell.orth.max(NO_HIBERNATION_FLOOR);
        }
    }

    /// Settled state of cell `xy` as the renderer sees it.
    #[must_use]
    pub fn cell_view(&self, xy: usize) -> CellView {
        CellView {
            xy,
            directive: self.control.next()[xy].directive0,
            rainbow: self.rainbow.next()[xy],
            spotlight: self.spotlight.next()[xy],
            tone: self.tone[xy],
            wave: self.waves.next()[xy].orth,
            spark: self.sparks.next()[xy],
        }
    }

    /// Row whose floor cells drive the wave field.
    #[must_use]
    pub fn source_row(&self) -> u32 {
        self.topology.geometry().band_rows() + 2
    }

    /// Source cell beneath `petal` (or the matching floor slot without a band).
    #[must_use]
    pub fn petal_source(&self, petal: u32) -> usize {
        let geometry = self.topology.geometry();
        let slots = if geometry.has_petals() {
            geometry.petals
        } else {
            PETAL_KEYS
        };
        let petal = petal % slots;
        let x = ((2 * petal + 1) * geometry.floor_cols) / (2 * slots);
        geometry.index(x.min(geometry.floor_cols - 1), self.source_row())
    }

    /// Shift the wave phase of the whole source row.
    pub fn change_color(&mut self) {
        for xy in self.source_cells() {
            let cell = &mut self.waves.current_mut()[xy];
            cell.orth = cell.orth.saturating_add(CHANGE_COLOR_STEP);
        }
    }

    /// Full rainbow across the source row.
    pub fn centered_rainbow(&mut self, extended: bool) {
        for xy in self.source_cells() {
            let cold = self.control.current()[xy].orth == 0;
            let bonus = if extended || cold {
                EXTENDED_LIFETIME_BONUS
            } else {
                0
            };
            self.ignite_rainbow(xy, bonus);
        }
    }

    /// Full rainbow from the source cell under `petal`.
    pub fn petal_rainbow(&mut self, petal: u32) {
        let xy = self.petal_source(petal);
        self.ignite_rainbow(xy, 0);
    }

    fn ignite_rainbow(&mut self, xy: usize, bonus: i32) {
        let lifetime = self.config.hibernation_ticks + self.config.transition_ticks + bonus;
        let cell = &mut self.control.current_mut()[xy];
        cell.directive0 = Pattern::FullRainbow.code();
        cell.directive1 = Pattern::NTones(2).code();
        cell.orth = lifetime;
        let wave = &mut self.waves.current_mut()[xy];
        wave.orth = wave.orth.saturating_add(CHANGE_COLOR_STEP);
    }

    pub fn set_scene(&mut self, scene: Scene) {
        if scene != self.scene {
            info!(from = %self.scene, to = %scene, epoch = self.epoch, "scene changed");
        }
        self.scene = scene;
    }

    /// Queue a press on `xy` for the next epoch.
    pub fn press(&mut self, xy: usize) {
        if !self.topology.is_active(xy) {
            warn!(xy, "ignoring press outside the active grid");
            return;
        }
        self.pending_presses.push(xy);
    }

    /// Queue a spark around `xy` for the next epoch.
    pub fn spark(&mut self, xy: usize, color: i32) {
        if !self.topology.is_active(xy) {
            warn!(xy, "ignoring spark outside the active grid");
            return;
        }
        self.pending_sparks.push((xy, color.rem_euclid(COLORS)));
    }

    /// Decode a control-channel frame and, when active, override the source row.
    pub fn apply_channel_frame(&mut self, frame: &ChannelFrame) {
        let Some(snapshot) = self.channel.accept(frame) else {
            return;
        };
        if snapshot.is_active() {
            self.apply_channel_snapshot(snapshot);
        }
    }

    fn apply_channel_snapshot(&mut self, snapshot: ChannelSnapshot) {
        let directive = snapshot.directive();
        let fallback = Pattern::NTones(2).code();
        let lifetime = self.config.hibernation_ticks + self.config.transition_ticks;
        let tone_span = ORTHOGONAL_QUANTUM * RAINBOW_TONE_EPOCHS;
        let period = tone_span * COLORS;
        let target = i32::from(snapshot.color) * tone_span;
        for xy in self.source_cells() {
            let cell = &mut self.control.current_mut()[xy];
            cell.directive0 = directive;
            cell.directive1 = fallback;
            cell.orth = cell.orth.max(lifetime);

            // Advance the wave to the next point whose tone matches the color.
            let wave = &mut self.waves.current_mut()[xy];
            let mut aligned = (wave.orth - wave.orth.rem_euclid(period)).saturating_add(target);
            if aligned < wave.orth {
                aligned = aligned.saturating_add(period);
            }
            wave.orth = aligned;
            self.tone[xy] = i32::from(snapshot.color);
        }
    }

    fn source_cells(&self) -> Vec<usize> {
        let geometry = self.topology.geometry();
        let row = self.source_row();
        (0..geometry.floor_cols)
            .map(|x| geometry.index(x, row))
            .collect()
    }

    #[must_use]
    pub fn config(&self) -> &LuminaryConfig {
        &self.config
    }

    #[must_use]
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    #[must_use]
    pub const fn epoch(&self) -> u64 {
        self.epoch
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    #[must_use]
    pub const fn scene(&self) -> Scene {
        self.scene
    }

    #[must_use]
    pub fn phase(&self) -> EnginePhase {
        let total = self.config.initialization_epochs;
        if self.epoch >= total {
            EnginePhase::Running
        } else {
            EnginePhase::Initializing {
                percent: (self.epoch * 100 / total) as u8,
            }
        }
    }

    #[must_use]
    pub fn control(&self) -> &DecayField {
        &self.control
    }

    #[must_use]
    pub fn waves(&self) -> &DecayField {
        &self.waves
    }

    #[must_use]
    pub fn pressure(&self) -> &DecayField {
        &self.pressure
    }

    #[must_use]
    pub fn rainbow(&self) -> &CyclicField {
        &self.rainbow
    }

    #[must_use]
    pub fn spotlight(&self) -> &CyclicField {
        &self.spotlight
    }

    #[must_use]
    pub fn sparks(&self) -> &SparkField {
        &self.sparks
    }

    #[must_use]
    pub fn reaction(&self) -> Option<&ReactionDiffusion> {
        self.reaction.as_ref()
    }

    #[must_use]
    pub fn tone(&self) -> &[i32] {
        &self.tone
    }

    #[must_use]
    pub fn pressure_self(&self) -> &[u32] {
        &self.pressure_self
    }

    #[must_use]
    pub fn seed_colors(&self) -> &[i32] {
        &self.seed_colors
    }

    #[must_use]
    pub fn channel(&self) -> &ChannelDecoder {
        &self.channel
    }
}
