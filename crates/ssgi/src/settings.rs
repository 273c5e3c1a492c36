use std::fmt;

use serde::{Deserialize, Serialize};

/// Documented ranges for every numeric tunable.
///
/// The core assumes settings already sit inside these ranges; hosts that
/// accept free-form input clamp with [`Settings::clamped`] or reject values
/// outright (see the `ssgiconfig` crate).
pub mod ranges {
    use std::ops::RangeInclusive;

    pub const SAMPLE_COUNT: RangeInclusive<u32> = 1..=128;
    pub const MAX_GI_RAY_DISTANCE: RangeInclusive<f32> = 0.1..=100.0;
    pub const MAX_AO_RAY_DISTANCE: RangeInclusive<f32> = 0.1..=20.0;
    pub const INTERSECTION_THICKNESS: RangeInclusive<f32> = 0.01..=5.0;
    pub const GI_INTENSITY: RangeInclusive<f32> = 0.01..=5.0;
    pub const AO_INTENSITY: RangeInclusive<f32> = 0.0..=5.0;
    pub const SAMPLE_CLAMP_VALUE: RangeInclusive<f32> = 1.0..=20.0;
    pub const RESOLUTION_SCALE: RangeInclusive<f32> = 0.25..=1.0;
    pub const FILTER_ITERATIONS: RangeInclusive<u32> = 0..=8;
    pub const FILTER_RADIUS: RangeInclusive<f32> = 0.0..=2.0;
    pub const DEPTH_WEIGHT: RangeInclusive<f32> = 0.0..=50.0;
    pub const NORMAL_WEIGHT: RangeInclusive<f32> = 0.0..=100.0;
}

/// Shading branch taken by the ray-march program.
///
/// Exactly one mode is active per frame; it travels with the parameter block
/// as a plain value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Indirect lighting only.
    Gi,
    /// Indirect lighting with ambient occlusion.
    #[default]
    GiAo,
}

impl RenderMode {
    /// Numeric selector handed to pass programs.
    pub fn index(self) -> i32 {
        match self {
            RenderMode::Gi => 0,
            RenderMode::GiAo => 1,
        }
    }
}

impl fmt::Display for RenderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderMode::Gi => f.write_str("gi"),
            RenderMode::GiAo => f.write_str("gi_ao"),
        }
    }
}

/// Tunables for one frame of the effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Rays traced per pixel.
    pub sample_count: u32,
    /// View-space distance a GI ray may travel before giving up.
    pub max_gi_ray_distance: f32,
    /// View-space distance an AO ray may travel before giving up.
    pub max_ao_ray_distance: f32,
    /// Depth slab treated as a hit when a ray passes behind the depth buffer.
    pub intersection_thickness: f32,
    pub gi_intensity: f32,
    pub ao_intensity: f32,
    /// Upper bound on a single sample's radiance, to tame fireflies.
    pub sample_clamp_value: f32,
    /// Use cosine-weighted hemisphere sampling for GI rays.
    pub cosine_weighted_sampling: bool,
    /// Ray-march resolution relative to the camera output.
    pub resolution_scale: f32,
    /// Number of edge-aware blur iterations; 0 disables filtering.
    pub filter_iterations: u32,
    /// Blur footprint in full-resolution texels; 0 disables filtering.
    pub filter_radius: f32,
    pub depth_weight: f32,
    pub normal_weight: f32,
    pub render_mode: RenderMode,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sample_count: 16,
            max_gi_ray_distance: 25.0,
            max_ao_ray_distance: 2.0,
            intersection_thickness: 2.5,
            gi_intensity: 1.0,
            ao_intensity: 1.0,
            sample_clamp_value: 5.0,
            cosine_weighted_sampling: true,
            resolution_scale: 0.5,
            filter_iterations: 1,
            filter_radius: 1.0,
            depth_weight: 10.0,
            normal_weight: 20.0,
            render_mode: RenderMode::GiAo,
        }
    }
}

impl Settings {
    /// Whether the spatial filter stage runs this frame.
    pub fn filter_enabled(&self) -> bool {
        self.filter_iterations > 0 && self.filter_radius > 0.0
    }

    /// Returns a copy with every numeric field pulled into its documented range.
    ///
    /// NaN inputs fall back to the range's lower bound.
    pub fn clamped(self) -> Self {
        Self {
            sample_count: clamp_u32(self.sample_count, ranges::SAMPLE_COUNT),
            max_gi_ray_distance: clamp_f32(self.max_gi_ray_distance, ranges::MAX_GI_RAY_DISTANCE),
            max_ao_ray_distance: clamp_f32(self.max_ao_ray_distance, ranges::MAX_AO_RAY_DISTANCE),
            intersection_thickness: clamp_f32(
                self.intersection_thickness,
                ranges::INTERSECTION_THICKNESS,
            ),
            gi_intensity: clamp_f32(self.gi_intensity, ranges::GI_INTENSITY),
            ao_intensity: clamp_f32(self.ao_intensity, ranges::AO_INTENSITY),
            sample_clamp_value: clamp_f32(self.sample_clamp_value, ranges::SAMPLE_CLAMP_VALUE),
            cosine_weighted_sampling: self.cosine_weighted_sampling,
            resolution_scale: clamp_f32(self.resolution_scale, ranges::RESOLUTION_SCALE),
            filter_iterations: clamp_u32(self.filter_iterations, ranges::FILTER_ITERATIONS),
            filter_radius: clamp_f32(self.filter_radius, ranges::FILTER_RADIUS),
            depth_weight: clamp_f32(self.depth_weight, ranges::DEPTH_WEIGHT),
            normal_weight: clamp_f32(self.normal_weight, ranges::NORMAL_WEIGHT),
            render_mode: self.render_mode,
        }
    }
}

fn clamp_u32(value: u32, range: std::ops::RangeInclusive<u32>) -> u32 {
    value.clamp(*range.start(), *range.end())
}

fn clamp_f32(value: f32, range: std::ops::RangeInclusive<f32>) -> f32 {
    if value.is_nan() {
        *range.start()
    } else {
        value.clamp(*range.start(), *range.end())
    }
}
