//! Multi-scale Turing-pattern evolution rule.
//!
//! Two coupled fields `u` and `v` live on the unit circle. Each epoch every
//! field is blurred at several activator/inhibitor radius pairs; each cell
//! follows the scale where activator and inhibitor are closest, stepping up
//! or down by that scale's increment, and the pair is then renormalized. The
//! phase angle of `(u, v)` picks the hue.

use crate::cyclic::COLORS;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// Activator/inhibitor radius pair and the nudge applied when it is selected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TuringScale {
    pub activator_radius: usize,
    pub inhibitor_radius: usize,
    pub increment: f32,
}

/// How neighborhood averages are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Averaging {
    /// Horizontal then vertical running mean.
    #[default]
    BoxBlur,
    /// Mean over the full square window.
    Direct,
}

/// Divisor used to pull `(u, v)` back toward the unit circle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Divide by `sqrt(u² + v²)`.
    #[default]
    Euclidean,
    /// Divide by `u² + v²`; cheaper and only approximately unit length.
    Squared,
}

/// Tunables for the reaction-diffusion rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactionConfig {
    pub scales: Vec<TuringScale>,
    pub averaging: Averaging,
    pub normalization: Normalization,
}

impl Default for ReactionConfig {
    fn default() -> Self {
        Self {
            scales: vec![
                TuringScale {
                    activator_radius: 1,
                    inhibitor_radius: 3,
                    increment: 0.05,
                },
                TuringScale {
                    activator_radius: 3,
                    inhibitor_radius: 6,
                    increment: 0.04,
                },
                TuringScale {
                    activator_radius: 5,
                    inhibitor_radius: 10,
                    increment: 0.03,
                },
            ],
            averaging: Averaging::BoxBlur,
            normalization: Normalization::Euclidean,
        }
    }
}

/// One of the two coupled state fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldId {
    U,
    V,
}

impl FieldId {
    const ALL: [FieldId; 2] = [FieldId::U, FieldId::V];

    const fn slot(self) -> usize {
        match self {
            FieldId::U => 0,
            FieldId::V => 1,
        }
    }
}

#[derive(Debug, Clone)]
struct ScaleBuffers {
    activator: Vec<f32>,
    inhibitor: Vec<f32>,
}

/// Reaction-diffusion state over a `width × height` rectangle.
#[derive(Debug, Clone)]
pub struct ReactionDiffusion {
    width: usize,
    height: usize,
    fields: [Vec<f32>; 2],
    scales: Vec<TuringScale>,
    averaging: Averaging,
    normalization: Normalization,
    /// Indexed by `[field][scale]`.
    buffers: [Vec<ScaleBuffers>; 2],
    scratch: Vec<f32>,
}

impl ReactionDiffusion {
    /// Seed both fields with random unit vectors.
    pub fn new<R: Rng + ?Sized>(
        width: usize,
        height: usize,
        config: &ReactionConfig,
        rng: &mut R,
    ) -> Self {
        let len = width * height;
        let mut u = Vec::with_capacity(len);
        let mut v = Vec::with_capacity(len);
        for _ in 0..len {
            let angle = rng.random_range(0.0..TAU);
            u.push(angle.cos());
            v.push(angle.sin());
        }
        let buffers = || {
            config
                .scales
                .iter()
                .map(|_| ScaleBuffers {
                    activator: vec![0.0; len],
                    inhibitor: vec![0.0; len],
                })
                .collect::<Vec<_>>()
        };
        Self {
            width,
            height,
            fields: [u, v],
            scales: config.scales.clone(),
            averaging: config.averaging,
            normalization: config.normalization,
            buffers: [buffers(), buffers()],
            scratch: vec![0.0; len],
        }
    }

    #[must_use]
    pub fn field(&self, field: FieldId) -> &[f32] {
        &self.fields[field.slot()]
    }

    /// Activator average of `field` at `scale` from the last step.
    #[must_use]
    pub fn activator(&self, field: FieldId, scale: usize) -> &[f32] {
        &self.buffers[field.slot()][scale].activator
    }

    /// Inhibitor average of `field` at `scale` from the last step.
    #[must_use]
    pub fn inhibitor(&self, field: FieldId, scale: usize) -> &[f32] {
        &self.buffers[field.slot()][scale].inhibitor
    }

    /// Advance both fields by one epoch.
    pub fn step(&mut self) {
        let Self {
            width,
            height,
            fields,
            scales,
            averaging,
            normalization,
            buffers,
            scratch,
        } = self;
        let (width, height) = (*width, *height);

        for field in FieldId::ALL {
            let state = &fields[field.slot()];
            for (scale, slot) in scales.iter().zip(buffers[field.slot()].iter_mut()) {
                average(
                    *averaging,
                    state,
                    &mut slot.activator,
                    scratch,
                    width,
                    height,
                    scale.activator_radius,
                );
                average(
                    *averaging,
                    state,
                    &mut slot.inhibitor,
                    scratch,
                    width,
                    height,
                    scale.inhibitor_radius,
                );
            }
        }

        let [u, v] = fields;
        let [u_buffers, v_buffers] = &*buffers;
        let scales = scales.as_slice();
        let normalization = *normalization;
        u.par_iter_mut()
            .zip(v.par_iter_mut())
            .enumerate()
            .for_each(|(xy, (u, v))| {
                *u += nudge(scales, u_buffers, xy);
                *v += nudge(scales, v_buffers, xy);
                let (nu, nv) = normalize(*u, *v, normalization);
                *u = nu;
                *v = nv;
            });
    }

    /// Hue for cell `xy` from the phase angle of `(u, v)`.
    #[must_use]
    pub fn phase_color(&self, xy: usize) -> i32 {
        phase_to_color(self.fields[0][xy], self.fields[1][xy])
    }
}

/// Signed increment from the scale with the smallest activator/inhibitor gap.
fn nudge(scales: &[TuringScale], buffers: &[ScaleBuffers], xy: usize) -> f32 {
    let mut best: Option<(f32, f32)> = None;
    for (scale, slot) in scales.iter().zip(buffers) {
        let gap = slot.activator[xy] - slot.inhibitor[xy];
        let step = if gap > 0.0 {
            scale.increment
        } else {
            -scale.increment
        };
        match best {
            Some((best_gap, _)) if best_gap <= gap.abs() => {}
            _ => best = Some((gap.abs(), step)),
        }
    }
    best.map_or(0.0, |(_, step)| step)
}

fn normalize(u: f32, v: f32, normalization: Normalization) -> (f32, f32) {
    let squared = u * u + v * v;
    let radius = match normalization {
        Normalization::Euclidean => squared.sqrt(),
        Normalization::Squared => squared,
    };
    if radius <= f32::EPSILON {
        (1.0, 0.0)
    } else {
        (u / radius, v / radius)
    }
}

/// Map a phase angle onto the color wheel.
#[must_use]
pub fn phase_to_color(u: f32, v: f32) -> i32 {
    let turn = (v.atan2(u) + PI) / TAU;
    ((turn * COLORS as f32).floor() as i32).rem_euclid(COLORS)
}

fn average(
    averaging: Averaging,
    src: &[f32],
    dst: &mut [f32],
    scratch: &mut [f32],
    width: usize,
    height: usize,
    radius: usize,
) {
    match averaging {
        Averaging::BoxBlur => box_blur(src, dst, scratch, width, height, radius),
        Averaging::Direct => direct_mean(src, dst, width, height, radius),
    }
}

/// Clamped window `[center - radius, center + radius]` within `0..len`.
fn window(center: usize, radius: usize, len: usize) -> (usize, usize) {
    (center.saturating_sub(radius), (center + radius).min(len - 1))
}

/// Separable running mean: rows into `scratch`, then columns into `dst`.
fn box_blur(
    src: &[f32],
    dst: &mut [f32],
    scratch: &mut [f32],
    width: usize,
    height: usize,
    radius: usize,
) {
    scratch
        .par_chunks_mut(width)
        .zip(src.par_chunks(width))
        .for_each(|(out, row)| {
            let mut prefix = Vec::with_capacity(width + 1);
            prefix.push(0.0f32);
            for value in row {
                let last = prefix[prefix.len() - 1];
                prefix.push(last + value);
            }
            for (x, slot) in out.iter_mut().enumerate() {
                let (lo, hi) = window(x, radius, width);
                *slot = (prefix[hi + 1] - prefix[lo]) / (hi - lo + 1) as f32;
            }
        });
    let rows = &*scratch;
    dst.par_chunks_mut(width).enumerate().for_each(|(y, out)| {
        let (lo, hi) = window(y, radius, height);
        let count = (hi - lo + 1) as f32;
        for (x, slot) in out.iter_mut().enumerate() {
            let sum: f32 = (lo..=hi).map(|yy| rows[yy * width + x]).sum();
            *slot = sum / count;
        }
    });
}

fn direct_mean(src: &[f32], dst: &mut [f32], width: usize, height: usize, radius: usize) {
    dst.par_chunks_mut(width).enumerate().for_each(|(y, out)| {
        let (y_lo, y_hi) = window(y, radius, height);
        for (x, slot) in out.iter_mut().enumerate() {
            let (x_lo, x_hi) = window(x, radius, width);
            let mut sum = 0.0;
            for yy in y_lo..=y_hi {
                sum += src[yy * width + x_lo..=yy * width + x_hi].iter().sum::<f32>();
            }
            *slot = sum / ((y_hi - y_lo + 1) * (x_hi - x_lo + 1)) as f32;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::SmallRng};

    #[test]
    fn blurs_preserve_constant_fields() {
        let (width, height) = (7, 5);
        let src = vec![0.25; width * height];
        let mut dst = vec![0.0; width * height];
        let mut scratch = vec![0.0; width * height];
        box_blur(&src, &mut dst, &mut scratch, width, height, 2);
        assert!(dst.iter().all(|v| (v - 0.25).abs() < 1e-6));
        direct_mean(&src, &mut dst, width, height, 3);
        assert!(dst.iter().all(|v| (v - 0.25).abs() < 1e-6));
    }

    #[test]
    fn box_blur_matches_direct_mean() {
        let (width, height) = (9, 6);
        let src: Vec<f32> = (0..width * height).map(|i| (i % 7) as f32).collect();
        let mut blurred = vec![0.0; width * height];
        let mut direct = vec![0.0; width * height];
        let mut scratch = vec![0.0; width * height];
        box_blur(&src, &mut blurred, &mut scratch, width, height, 2);
        direct_mean(&src, &mut direct, width, height, 2);
        for (a, b) in blurred.iter().zip(&direct) {
            assert!((a - b).abs() < 1e-4, "{a} != {b}");
        }
    }

    #[test]
    fn nudge_follows_most_balanced_scale() {
        let scales = [
            TuringScale {
                activator_radius: 1,
                inhibitor_radius: 2,
                increment: 0.5,
            },
            TuringScale {
                activator_radius: 2,
                inhibitor_radius: 4,
                increment: 0.1,
            },
        ];
        let buffers = [
            ScaleBuffers {
                activator: vec![1.0],
                inhibitor: vec![0.0],
            },
            ScaleBuffers {
                activator: vec![0.2],
                inhibitor: vec![0.3],
            },
        ];
        assert_eq!(nudge(&scales, &buffers, 0), -0.1);
    }

    #[test]
    fn euclidean_step_keeps_unit_length() {
        let mut rng = SmallRng::seed_from_u64(21);
        let mut rd = ReactionDiffusion::new(12, 8, &ReactionConfig::default(), &mut rng);
        for _ in 0..5 {
            rd.step();
        }
        for (u, v) in rd.field(FieldId::U).iter().zip(rd.field(FieldId::V)) {
            assert!(((u * u + v * v).sqrt() - 1.0).abs() < 1e-4);
        }
        assert_eq!(rd.activator(FieldId::V, 2).len(), 96);
        assert!((0..96).all(|xy| (0..COLORS).contains(&rd.phase_color(xy))));
    }

    #[test]
    fn seeded_runs_are_identical() {
        let config = ReactionConfig {
            averaging: Averaging::Direct,
            normalization: Normalization::Squared,
            ..ReactionConfig::default()
        };
        let run = || {
            let mut rng = SmallRng::seed_from_u64(5);
            let mut rd = ReactionDiffusion::new(10, 10, &config, &mut rng);
            for _ in 0..3 {
                rd.step();
            }
            (0..100).map(|xy| rd.phase_color(xy)).collect::<Vec<_>>()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn phase_maps_quadrants() {
        assert_eq!(phase_to_color(-1.0, -0.0001), 0);
        assert_eq!(phase_to_color(1.0, 0.0), 6);
        assert_eq!(phase_to_color(-1.0, 0.0001), 11);
    }
}
