//! Control commands, scenes, and the external control-channel decoder.
//!
//! Everything here is latched: commands are queued by the caller and applied
//! between epochs, never while a step is in flight.

use crate::Engine;
use crate::pattern::Pattern;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

/// Scene policy layered over the per-cell overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scene {
    #[default]
    Base,
    /// Keeps one source cell from ever hibernating.
    NoHibernation,
    /// A full-rainbow source sweeps across the source row.
    CirclingRainbows,
    /// Forces the row above the source row to the Q2 pattern.
    Q2,
}

impl Scene {
    pub const ALL: [Scene; 4] = [
        Scene::Base,
        Scene::NoHibernation,
        Scene::CirclingRainbows,
        Scene::Q2,
    ];

    /// Scene bound to a menu digit.
    #[must_use]
    pub fn from_index(index: u32) -> Option<Self> {
        Self::ALL.get(index as usize).copied()
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Scene::Base => "base",
            Scene::NoHibernation => "no hibernation",
            Scene::CirclingRainbows => "circling rainbows",
            Scene::Q2 => "q2",
        }
    }
}

impl fmt::Display for Scene {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One external input, applied at an epoch boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Shift the wave phase of the whole source row.
    ChangeColor,
    /// Full rainbow across the source row; `extended` adds lifetime.
    CenteredRainbow { extended: bool },
    /// Full rainbow from the source cell under `petal`.
    PetalRainbow { petal: u32 },
    SetScene(Scene),
    /// Press a floor cell: pressure burst plus, if rested, a spark.
    Press { xy: usize },
    /// Ignite a spark around `xy` with `color`.
    Spark { xy: usize, color: i32 },
    Channel(ChannelFrame),
}

/// Apply `command` to `engine`. Invalid targets are logged and ignored.
pub fn apply_control_command(engine: &mut Engine, command: ControlCommand) {
    debug!(?command, epoch = engine.epoch(), "applying control command");
    match command {
        ControlCommand::ChangeColor => engine.change_color(),
        ControlCommand::CenteredRainbow { extended } => engine.centered_rainbow(extended),
        ControlCommand::PetalRainbow { petal } => engine.petal_rainbow(petal),
        ControlCommand::SetScene(scene) => engine.set_scene(scene),
        ControlCommand::Press { xy } => engine.press(xy),
        ControlCommand::Spark { xy, color } => engine.spark(xy, color),
        ControlCommand::Channel(frame) => engine.apply_channel_frame(&frame),
    }
}

/// Channel preceding the five control channels.
pub const CHANNEL_BASE: usize = 253;
pub const MODE_CHANNEL: usize = CHANNEL_BASE + 1;
pub const INTENSITY_CHANNEL: usize = CHANNEL_BASE + 2;
pub const COLOR_CHANNEL: usize = CHANNEL_BASE + 3;
pub const PATTERN_CHANNEL: usize = CHANNEL_BASE + 4;
pub const TRANSITION_CHANNEL: usize = CHANNEL_BASE + 5;
/// Frames this far behind the last accepted sequence are stale.
pub const SEQUENCE_WINDOW: i8 = 20;

/// Raw control-channel frame: a wrapping sequence number and channel levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelFrame {
    pub sequence: u8,
    pub levels: Vec<u8>,
}

/// Decoded control-channel values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSnapshot {
    /// `0` leaves the engine alone; `1..=3` overrides the source row.
    pub mode: u8,
    pub intensity: u8,
    /// Hue in `0..12`.
    pub color: u8,
    /// Pattern slot in `0..4`.
    pub pattern: u8,
    /// Transition style in `0..4`; `2` and above revert eagerly.
    pub transition: u8,
}

impl ChannelSnapshot {
    /// Decode from channel levels. The caller checks the frame length.
    fn from_levels(levels: &[u8]) -> Self {
        Self {
            mode: levels[MODE_CHANNEL] / 85,
            intensity: levels[INTENSITY_CHANNEL],
            color: levels[COLOR_CHANNEL] / 22,
            pattern: levels[PATTERN_CHANNEL] / 64,
            transition: levels[TRANSITION_CHANNEL] / 64,
        }
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.mode > 0
    }

    /// Pattern requested by this snapshot; zero intensity hibernates.
    #[must_use]
    pub const fn pattern(&self) -> Pattern {
        if self.intensity == 0 {
            return Pattern::Base;
        }
        match self.pattern {
            0 => Pattern::Base,
            1 => Pattern::FullRainbow,
            2 => Pattern::NTones(2),
            _ => Pattern::Hanabi,
        }
    }

    /// Primary directive code, including eager reversion when requested.
    #[must_use]
    pub const fn directive(&self) -> i32 {
        let pattern = self.pattern();
        if self.transition >= 2 {
            pattern.aggressive()
        } else {
            pattern.code()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("control frame has {len} channels, too few to decode")]
    Truncated { len: usize },
    #[error("control frame {sequence} is out of order (last accepted {last})")]
    OutOfOrder { sequence: u8, last: u8 },
}

/// Validates frames and latches the last good snapshot.
#[derive(Debug, Clone, Default)]
pub struct ChannelDecoder {
    last_sequence: Option<u8>,
    latched: Option<ChannelSnapshot>,
    rejected: u64,
}

impl ChannelDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `frame`. On error the previously latched snapshot is kept.
    pub fn decode(&mut self, frame: &ChannelFrame) -> Result<ChannelSnapshot, ChannelError> {
        let result = self.check(frame);
        if result.is_err() {
            self.rejected += 1;
        }
        result
    }

    fn check(&mut self, frame: &ChannelFrame) -> Result<ChannelSnapshot, ChannelError> {
        if frame.levels.len() <= TRANSITION_CHANNEL {
            return Err(ChannelError::Truncated {
                len: frame.levels.len(),
            });
        }
        if let Some(last) = self.last_sequence {
            let delta = frame.sequence.wrapping_sub(last) as i8;
            if delta <= 0 && delta > -SEQUENCE_WINDOW {
                return Err(ChannelError::OutOfOrder {
                    sequence: frame.sequence,
                    last,
                });
            }
        }
        let snapshot = ChannelSnapshot::from_levels(&frame.levels);
        self.last_sequence = Some(frame.sequence);
        self.latched = Some(snapshot);
        Ok(snapshot)
    }

    #[must_use]
    pub const fn latched(&self) -> Option<ChannelSnapshot> {
        self.latched
    }

    #[must_use]
    pub const fn rejected(&self) -> u64 {
        self.rejected
    }

    /// Decode and report; rejected frames are logged and dropped.
    pub(crate) fn accept(&mut self, frame: &ChannelFrame) -> Option<ChannelSnapshot> {
        match self.decode(frame) {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                warn!(%err, "discarding control-channel frame");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u8, mode: u8, color: u8, pattern: u8, transition: u8) -> ChannelFrame {
        let mut levels = vec![0u8; 512];
        levels[MODE_CHANNEL] = mode;
        levels[INTENSITY_CHANNEL] = 255;
        levels[COLOR_CHANNEL] = color;
        levels[PATTERN_CHANNEL] = pattern;
        levels[TRANSITION_CHANNEL] = transition;
        ChannelFrame { sequence, levels }
    }

    #[test]
    fn decodes_logical_values() {
        let mut decoder = ChannelDecoder::new();
        let snapshot = decoder
            .decode(&frame(1, 170, 255, 130, 200))
            .expect("valid frame");
        assert_eq!(snapshot.mode, 2);
        assert_eq!(snapshot.color, 11);
        assert_eq!(snapshot.pattern, 2);
        assert_eq!(snapshot.transition, 3);
        assert_eq!(snapshot.pattern(), Pattern::NTones(2));
        assert_eq!(snapshot.directive(), Pattern::NTones(2).aggressive());
        assert_eq!(decoder.latched(), Some(snapshot));
    }

    #[test]
    fn truncated_frame_keeps_latched_state() {
        let mut decoder = ChannelDecoder::new();
        let good = decoder.decode(&frame(1, 90, 0, 64, 0)).expect("valid frame");
        let short = ChannelFrame {
            sequence: 2,
            levels: vec![0; TRANSITION_CHANNEL],
        };
        assert_eq!(
            decoder.decode(&short),
            Err(ChannelError::Truncated {
                len: TRANSITION_CHANNEL
            })
        );
        assert_eq!(decoder.latched(), Some(good));
        assert_eq!(decoder.rejected(), 1);
    }

    #[test]
    fn stale_sequences_are_rejected() {
        let mut decoder = ChannelDecoder::new();
        decoder.decode(&frame(100, 90, 0, 0, 0)).expect("first frame");
        assert_eq!(
            decoder.decode(&frame(100, 90, 0, 0, 0)),
            Err(ChannelError::OutOfOrder {
                sequence: 100,
                last: 100
            })
        );
        assert!(decoder.decode(&frame(90, 90, 0, 0, 0)).is_err());
        // Far enough behind to count as a sender restart.
        assert!(decoder.decode(&frame(60, 90, 0, 0, 0)).is_ok());
        assert!(decoder.decode(&frame(61, 90, 0, 0, 0)).is_ok());
    }

    #[test]
    fn sequence_wraps_around() {
        let mut decoder = ChannelDecoder::new();
        decoder.decode(&frame(250, 90, 0, 0, 0)).expect("first frame");
        assert!(decoder.decode(&frame(3, 90, 0, 0, 0)).is_ok());
        assert!(decoder.decode(&frame(254, 90, 0, 0, 0)).is_err());
    }

    #[test]
    fn zero_intensity_hibernates() {
        let mut levels = frame(1, 255, 0, 255, 0).levels;
        levels[INTENSITY_CHANNEL] = 0;
        let snapshot = ChannelSnapshot::from_levels(&levels);
        assert_eq!(snapshot.pattern(), Pattern::Base);
        assert_eq!(snapshot.directive(), Pattern::Base.code());
    }

    #[test]
    fn scene_menu_indices() {
        assert_eq!(Scene::from_index(2), Some(Scene::CirclingRainbows));
        assert_eq!(Scene::from_index(4), None);
        assert_eq!(Scene::Q2.to_string(), "q2");
    }
}
