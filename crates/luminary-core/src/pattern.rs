//! Visual patterns selected by control directives, and the swatches they paint.

use crate::cyclic::{COLORS, OFF};
use crate::decay::ORTHOGONAL_QUANTUM;
use crate::spark::SparkCell;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Offset added to a directive to make it revert to its secondary eagerly.
pub const AGGRESSIVE_REVERSION: i32 = 1000;
/// Epochs of wave phase spent on each tone.
pub const RAINBOW_TONE_EPOCHS: i32 = 120;
/// Length of the hanabi shimmer cycle, in wave steps.
pub const HANABI_CYCLE: i32 = 480;

/// Enumerated visual pattern carried by directive tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    /// Hibernation: dim tone band over grey.
    Base,
    /// The raw cyclic color field.
    FullRainbow,
    /// Single tone just past the current one.
    Solid,
    /// Rainbow with grey spotlights carved by pressure.
    SpotlightsOnGrey,
    /// Two-tone band with rainbow spotlights.
    SpotlightsOnTwoTones,
    /// Band of two adjacent tones.
    TwoTones,
    /// Band of up to four tones; level zero behaves like [`Pattern::Base`].
    NTones(u8),
    /// Quiet pattern driven by the secondary color field.
    Q2,
    /// Fireworks over a shimmering grey.
    Hanabi,
}

impl Pattern {
    /// Highest supported [`Pattern::NTones`] level.
    pub const MAX_TONES: u8 = 4;

    /// Integer directive code for this pattern.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Pattern::Base => 0,
            Pattern::FullRainbow => 10,
            Pattern::Solid => 11,
            Pattern::SpotlightsOnGrey => 12,
            Pattern::SpotlightsOnTwoTones => 13,
            Pattern::TwoTones => 14,
            Pattern::NTones(level) => 20 + level as i32,
            Pattern::Q2 => 30,
            Pattern::Hanabi => 31,
        }
    }

    /// Directive code that also requests eager reversion.
    #[must_use]
    pub const fn aggressive(self) -> i32 {
        self.code() + AGGRESSIVE_REVERSION
    }

    /// Decode a directive, ignoring the aggressive-reversion offset.
    #[must_use]
    pub fn from_directive(directive: i32) -> Option<Self> {
        let pattern = match directive.rem_euclid(AGGRESSIVE_REVERSION) {
            0 => Pattern::Base,
            10 => Pattern::FullRainbow,
            11 => Pattern::Solid,
            12 => Pattern::SpotlightsOnGrey,
            13 => Pattern::SpotlightsOnTwoTones,
            14 => Pattern::TwoTones,
            code @ 20..=24 => Pattern::NTones((code - 20) as u8),
            30 => Pattern::Q2,
            31 => Pattern::Hanabi,
            _ => return None,
        };
        Some(pattern)
    }

    /// Pattern this one inherits its rendering from.
    ///
    /// `SpotlightsOnTwoTones` paints as `TwoTones` outside a spotlight, and
    /// `NTones(1)` narrows its band further after applying `NTones(2)`'s
    /// narrowing.
    #[must_use]
    pub const fn delegate(self) -> Option<Pattern> {
        match self {
            Pattern::SpotlightsOnTwoTones => Some(Pattern::TwoTones),
            Pattern::NTones(1) => Some(Pattern::NTones(2)),
            _ => None,
        }
    }

    /// Band narrowing this pattern applies at tone distance `distance`,
    /// including what it inherits from its delegate.
    fn tone_reduction(self, distance: i32) -> i32 {
        let own = match self {
            Pattern::NTones(1) | Pattern::NTones(3) => i32::from(distance > 1),
            Pattern::NTones(2) => {
                if distance > 2 {
                    2
                } else if distance > 0 {
                    1
                } else {
                    0
                }
            }
            _ => 0,
        };
        own + self
            .delegate()
            .map_or(0, |delegate| delegate.tone_reduction(distance))
    }

    /// Short label for diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Pattern::Base => "base",
            Pattern::FullRainbow => "full rainbow",
            Pattern::Solid => "solid",
            Pattern::SpotlightsOnGrey => "spotlights/grey",
            Pattern::SpotlightsOnTwoTones => "spotlights/two tones",
            Pattern::TwoTones => "two tones",
            Pattern::NTones(_) => "n tones",
            Pattern::Q2 => "q2",
            Pattern::Hanabi => "hanabi",
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::NTones(level) => write!(f, "{level} tones"),
            other => f.write_str(other.label()),
        }
    }
}

const RAINBOW_RGB: [[u8; 3]; COLORS as usize] = [
    [0x6d, 0x3f, 0xa9],
    [0xb1, 0x3c, 0xb1],
    [0xed, 0x43, 0x95],
    [0xff, 0x5d, 0x63],
    [0xff, 0x8b, 0x38],
    [0xd8, 0xc1, 0x31],
    [0xaf, 0xef, 0x5a],
    [0x60, 0xf6, 0x60],
    [0x28, 0xea, 0x8c],
    [0x19, 0xc7, 0xc1],
    [0x2f, 0x96, 0xdf],
    [0x53, 0x65, 0xd6],
];

const DARK_RGB: [[u8; 3]; COLORS as usize] = [
    [0x38, 0x27, 0x79],
    [0x57, 0x28, 0x87],
    [0x76, 0x2b, 0x79],
    [0x8b, 0x36, 0x57],
    [0x8d, 0x4c, 0x30],
    [0x7a, 0x6b, 0x11],
    [0x57, 0x8e, 0x16],
    [0x2a, 0x8e, 0x43],
    [0x15, 0x81, 0x77],
    [0x15, 0x6a, 0x67],
    [0x22, 0x50, 0x70],
    [0x31, 0x38, 0x66],
];

/// A paintable color produced by a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Swatch {
    Rainbow(u8),
    Dark(u8),
    /// Grey ramp indexed by a color position in `-1..=COLORS`; brightness
    /// peaks at the ends and bottoms out mid-wheel.
    Grey(i8),
    DarkGrey(i8),
    /// Unlit. Patterns never produce it; a fresh frame buffer starts here.
    Black,
}

impl Swatch {
    #[must_use]
    pub fn rainbow(color: i32) -> Self {
        Swatch::Rainbow(color.rem_euclid(COLORS) as u8)
    }

    #[must_use]
    pub fn dark(color: i32) -> Self {
        Swatch::Dark(color.rem_euclid(COLORS) as u8)
    }

    #[must_use]
    pub fn grey(level: i32) -> Self {
        Swatch::Grey(level.clamp(-1, COLORS) as i8)
    }

    #[must_use]
    pub fn dark_grey(level: i32) -> Self {
        Swatch::DarkGrey(level.clamp(-1, COLORS) as i8)
    }

    /// Stable palette index: rainbow `0..12`, greys `19..=32`, darks `40..52`,
    /// dark greys `59..=72`, black `99`.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Swatch::Rainbow(c) => c as u16,
            Swatch::Grey(g) => (20 + g as i16) as u16,
            Swatch::Dark(c) => 40 + c as u16,
            Swatch::DarkGrey(g) => (60 + g as i16) as u16,
            Swatch::Black => 99,
        }
    }

    #[must_use]
    pub fn rgb(self) -> [u8; 3] {
        match self {
            Swatch::Rainbow(c) => RAINBOW_RGB[usize::from(c) % RAINBOW_RGB.len()],
            Swatch::Dark(c) => DARK_RGB[usize::from(c) % DARK_RGB.len()],
            Swatch::Grey(g) => {
                let value = 0x3a + 0x16 * grey_step(g);
                [value; 3]
            }
            Swatch::DarkGrey(g) => {
                let value = 0x12 + 0x0c * grey_step(g);
                [value; 3]
            }
            Swatch::Black => [0, 0, 0],
        }
    }
}

/// Brightness step `0..=6` of a grey ramp position.
fn grey_step(level: i8) -> u8 {
    if level < 0 {
        return 0;
    }
    let level = i32::from(level);
    (6 - (6 - level).abs()).clamp(0, 6) as u8
}

/// Settled per-cell state the renderer needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellView {
    pub xy: usize,
    pub directive: i32,
    /// Primary cyclic color.
    pub rainbow: i32,
    /// Secondary cyclic color, [`OFF`] inside a spotlight.
    pub spotlight: i32,
    pub tone: i32,
    /// Orthogonal wave value.
    pub wave: i32,
    pub spark: SparkCell,
}

/// Paint one cell. Unknown directives show a diagnostic `xy mod COLORS` hue.
#[must_use]
pub fn render_cell(view: &CellView) -> Swatch {
    match Pattern::from_directive(view.directive) {
        Some(pattern) => render_pattern(pattern, view),
        None => Swatch::rainbow((view.xy % COLORS as usize) as i32),
    }
}

/// Opaque dedup key for a painted cell.
#[must_use]
pub fn state_key(directive: i32, swatch: Swatch) -> u32 {
    ((directive.rem_euclid(AGGRESSIVE_REVERSION) as u32) << 8) | u32::from(swatch.code())
}

fn render_pattern(pattern: Pattern, view: &CellView) -> Swatch {
    let rainbow = view.rainbow.rem_euclid(COLORS);
    let tone = view.tone.rem_euclid(COLORS);
    let distance = (rainbow - tone).rem_euclid(COLORS);
    match pattern {
        Pattern::FullRainbow => Swatch::rainbow(rainbow),
        Pattern::Solid => Swatch::rainbow(tone + 1),
        Pattern::SpotlightsOnGrey => {
            if view.spotlight == OFF {
                Swatch::rainbow(rainbow)
            } else {
                Swatch::grey(view.spotlight)
            }
        }
        Pattern::SpotlightsOnTwoTones => {
            if view.spotlight == OFF {
                Swatch::rainbow(rainbow)
            } else {
                render_pattern(Pattern::TwoTones, view)
            }
        }
        Pattern::TwoTones => match distance {
            d if d == COLORS - 1 => Swatch::dark(tone),
            0 | 1 => Swatch::rainbow(rainbow),
            2 => Swatch::dark(rainbow - 1),
            _ => Swatch::dark_grey(-1),
        },
        Pattern::NTones(level) if level > 0 => {
            let shift = distance - pattern.tone_reduction(distance);
            match distance {
                d if d == COLORS - 1 => Swatch::dark(tone),
                0..=3 => Swatch::rainbow(tone + shift),
                4 => Swatch::dark(tone + shift - 1),
                _ => Swatch::dark_grey(-1),
            }
        }
        Pattern::Base | Pattern::NTones(_) => {
            if distance == COLORS - 1 || distance == 0 {
                Swatch::dark(tone)
            } else {
                Swatch::dark_grey(-1)
            }
        }
        Pattern::Q2 => {
            if view.spotlight < 4 {
                Swatch::rainbow(rainbow)
            } else if view.spotlight < 6 || view.spotlight > 9 {
                Swatch::dark(rainbow)
            } else {
                Swatch::dark_grey(-1)
            }
        }
        Pattern::Hanabi => {
            if view.spark.is_lit() {
                return Swatch::rainbow(view.spark.color);
            }
            let phase = (view.wave / ORTHOGONAL_QUANTUM) % HANABI_CYCLE;
            let shimmer = phase.min(COLORS - phase);
            let spotlight = view.spotlight.min(COLORS - view.spotlight);
            Swatch::dark_grey((spotlight + shimmer).max(6))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(directive: i32, rainbow: i32, tone: i32) -> CellView {
        CellView {
            xy: 17,
            directive,
            rainbow,
            spotlight: OFF,
            tone,
            wave: 0,
            spark: SparkCell::default(),
        }
    }

    #[test]
    fn directive_codes_round_trip_through_reversion_offset() {
        for pattern in [
            Pattern::Base,
            Pattern::FullRainbow,
            Pattern::Solid,
            Pattern::SpotlightsOnGrey,
            Pattern::SpotlightsOnTwoTones,
            Pattern::TwoTones,
            Pattern::NTones(3),
            Pattern::Q2,
            Pattern::Hanabi,
        ] {
            assert_eq!(Pattern::from_directive(pattern.code()), Some(pattern));
            assert_eq!(Pattern::from_directive(pattern.aggressive()), Some(pattern));
        }
        assert_eq!(Pattern::from_directive(99), None);
    }

    #[test]
    fn unknown_directive_renders_diagnostic_hue() {
        assert_eq!(render_cell(&view(77, 3, 0)), Swatch::Rainbow(5));
    }

    #[test]
    fn full_rainbow_shows_primary_color() {
        assert_eq!(
            render_cell(&view(Pattern::FullRainbow.code(), 9, 2)),
            Swatch::Rainbow(9)
        );
    }

    #[test]
    fn two_tones_band() {
        let code = Pattern::TwoTones.code();
        assert_eq!(render_cell(&view(code, 4, 4)), Swatch::Rainbow(4));
        assert_eq!(render_cell(&view(code, 5, 4)), Swatch::Rainbow(5));
        assert_eq!(render_cell(&view(code, 6, 4)), Swatch::Dark(5));
        assert_eq!(render_cell(&view(code, 3, 4)), Swatch::Dark(4));
        assert_eq!(render_cell(&view(code, 9, 4)), Swatch::DarkGrey(-1));
    }

    #[test]
    fn spotlights_delegate_outside_the_light() {
        let mut cell = view(Pattern::SpotlightsOnTwoTones.code(), 9, 4);
        assert_eq!(render_cell(&cell), Swatch::Rainbow(9));
        cell.spotlight = 2;
        assert_eq!(
            render_cell(&cell),
            render_cell(&CellView {
                directive: Pattern::TwoTones.code(),
                ..cell
            })
        );
        cell.directive = Pattern::SpotlightsOnGrey.code();
        assert_eq!(render_cell(&cell), Swatch::Grey(2));
    }

    #[test]
    fn n_tones_narrow_with_level() {
        let tones = |level: u8| -> Vec<Swatch> {
            (0..4)
                .map(|d| render_cell(&view(Pattern::NTones(level).code(), d, 0)))
                .collect()
        };
        let rainbow = |colors: [u8; 4]| colors.map(Swatch::Rainbow).to_vec();
        assert_eq!(tones(4), rainbow([0, 1, 2, 3]));
        assert_eq!(tones(3), rainbow([0, 1, 1, 2]));
        assert_eq!(tones(2), rainbow([0, 0, 1, 1]));
        assert_eq!(tones(1), rainbow([0, 0, 0, 0]));
        assert_eq!(
            render_cell(&view(Pattern::NTones(0).code(), 0, 0)),
            render_cell(&view(Pattern::Base.code(), 0, 0))
        );
    }

    #[test]
    fn hanabi_prefers_live_sparks() {
        let mut cell = view(Pattern::Hanabi.code(), 1, 0);
        cell.spotlight = 3;
        assert_eq!(render_cell(&cell), Swatch::DarkGrey(6));
        cell.spark = SparkCell {
            color: 8,
            orth: 200,
            diag: 200,
        };
        assert_eq!(render_cell(&cell), Swatch::Rainbow(8));
    }

    #[test]
    fn swatch_codes_do_not_collide() {
        let mut codes = std::collections::HashSet::new();
        for c in 0..COLORS {
            assert!(codes.insert(Swatch::rainbow(c).code()));
            assert!(codes.insert(Swatch::dark(c).code()));
        }
        for g in -1..=COLORS {
            assert!(codes.insert(Swatch::grey(g).code()));
            assert!(codes.insert(Swatch::dark_grey(g).code()));
        }
        assert!(codes.insert(Swatch::Black.code()));
        assert_eq!(Swatch::grey(0).rgb(), Swatch::grey(COLORS).rgb());
    }
}
