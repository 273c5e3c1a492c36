//! Per-frame globals published to every pass program.

use glam::{Mat4, Vec4};
use serde::{Deserialize, Serialize};

use crate::settings::Settings;
use crate::target::Extent;

/// What the host camera hands over each frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    /// Projection in OpenGL clip convention (z in -w..w).
    pub projection: Mat4,
    /// World to camera.
    pub view: Mat4,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl CameraFrame {
    /// A right-handed perspective camera at the origin.
    pub fn perspective_gl(fov_y_radians: f32, extent: Extent, near: f32, far: f32) -> Self {
        let aspect = extent.width.max(1) as f32 / extent.height.max(1) as f32;
        Self {
            projection: Mat4::perspective_rh_gl(fov_y_radians, aspect, near, far),
            view: Mat4::IDENTITY,
            pixel_width: extent.width,
            pixel_height: extent.height,
        }
    }

    pub fn extent(&self) -> Extent {
        Extent::new(self.pixel_width, self.pixel_height)
    }
}

/// Depth convention of the device the passes run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClipSpace {
    /// OpenGL: depth in -1..1, projection used as-is.
    NegativeOneToOne,
    /// Vulkan, Metal, D3D and wgpu: depth in 0..1.
    #[default]
    ZeroToOne,
    /// Depth in 1..0, near plane at 1.
    ReversedZ,
}

impl ClipSpace {
    /// Converts an OpenGL-convention projection to this convention.
    pub fn gpu_projection(self, projection: Mat4) -> Mat4 {
        let remap = match self {
            ClipSpace::NegativeOneToOne => return projection,
            ClipSpace::ZeroToOne => depth_remap(0.5),
            ClipSpace::ReversedZ => depth_remap(-0.5),
        };
        remap * projection
    }
}

/// `z' = scale * z + 0.5 * w`
fn depth_remap(scale: f32) -> Mat4 {
    Mat4::from_cols(
        Vec4::X,
        Vec4::Y,
        Vec4::new(0.0, 0.0, scale, 0.0),
        Vec4::new(0.0, 0.0, 0.5, 1.0),
    )
}

/// Jitter seed carried from frame to frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameState {
    index: u32,
}

impl FrameState {
    pub fn new(start: u32) -> Self {
        Self { index: start }
    }

    /// Index published by the most recent frame.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Moves to the next frame and returns its index, wrapping at `u32::MAX`.
    pub fn advance(&mut self) -> u32 {
        self.index = self.index.wrapping_add(1);
        self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("projection matrix cannot be inverted")]
pub struct SingularProjection;

/// A published value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i32),
    Uint(u32),
    Float(f32),
    Vector(Vec4),
    Matrix(Mat4),
}

/// Write-once, read-many globals for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterBlock {
    pub frame_index: u32,
    /// Projection in the device's clip convention.
    pub projection: Mat4,
    pub inverse_projection: Mat4,
    pub view: Mat4,
    /// `(1/width, 1/height, width, 0)` of the camera output.
    pub full_res_texel_size: Vec4,
    pub extent: Extent,
    pub settings: Settings,
}

impl ParameterBlock {
    /// Derives this frame's globals and advances `state`.
    ///
    /// A singular projection leaves `state` untouched.
    pub fn prepare(
        state: &mut FrameState,
        camera: &CameraFrame,
        settings: &Settings,
        clip_space: ClipSpace,
    ) -> Result<Self, SingularProjection> {
        let projection = clip_space.gpu_projection(camera.projection);
        if projection.determinant() == 0.0 {
            return Err(SingularProjection);
        }
        let inverse_projection = projection.inverse();
        if !inverse_projection.is_finite() {
            return Err(SingularProjection);
        }

        let extent = camera.extent();
        let [x, y, z] = extent.texel_size();
        Ok(Self {
            frame_index: state.advance(),
            projection,
            inverse_projection,
            view: camera.view,
            full_res_texel_size: Vec4::new(x, y, z, 0.0),
            extent,
            settings: *settings,
        })
    }

    /// Every published name and value, in a stable order.
    pub fn values(&self) -> Vec<(&'static str, ParamValue)> {
        let s = &self.settings;
        vec![
            ("frame_index", ParamValue::Uint(self.frame_index)),
            ("projection", ParamValue::Matrix(self.projection)),
            ("inverse_projection", ParamValue::Matrix(self.inverse_projection)),
            ("world_to_camera", ParamValue::Matrix(self.view)),
            ("full_res_texel_size", ParamValue::Vector(self.full_res_texel_size)),
            ("sample_count", ParamValue::Uint(s.sample_count)),
            ("gi_intensity", ParamValue::Float(s.gi_intensity)),
            ("ao_intensity", ParamValue::Float(s.ao_intensity)),
            ("max_gi_ray_distance", ParamValue::Float(s.max_gi_ray_distance)),
            ("max_ao_ray_distance", ParamValue::Float(s.max_ao_ray_distance)),
            (
                "cosine_weighted_sampling",
                ParamValue::Float(if s.cosine_weighted_sampling { 1.0 } else { 0.0 }),
            ),
            ("intersection_thickness", ParamValue::Float(s.intersection_thickness)),
            ("sample_clamp_value", ParamValue::Float(s.sample_clamp_value)),
            ("resolution_scale", ParamValue::Float(s.resolution_scale)),
            ("blur_radius", ParamValue::Float(s.filter_radius)),
            ("blur_depth_weight", ParamValue::Float(s.depth_weight)),
            ("blur_normal_weight", ParamValue::Float(s.normal_weight)),
            ("render_mode", ParamValue::Int(s.render_mode.index())),
        ]
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values()
            .into_iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::RenderMode;

    fn camera() -> CameraFrame {
        CameraFrame::perspective_gl(60f32.to_radians(), Extent::new(1920, 1080), 0.1, 100.0)
    }

    #[test]
    fn frame_state_wraps_at_the_limit() {
        let mut state = FrameState::new(u32::MAX - 1);
        assert_eq!(state.advance(), u32::MAX);
        assert_eq!(state.advance(), 0);
        assert_eq!(state.index(), 0);
    }

    #[test]
    fn zero_to_one_maps_near_and_far_planes() {
        let projection = ClipSpace::ZeroToOne.gpu_projection(camera().projection);
        let near = projection * Vec4::new(0.0, 0.0, -0.1, 1.0);
        let far = projection * Vec4::new(0.0, 0.0, -100.0, 1.0);
        assert!((near.z / near.w).abs() < 1e-4);
        assert!((far.z / far.w - 1.0).abs() < 1e-4);

        let reversed = ClipSpace::ReversedZ.gpu_projection(camera().projection);
        let near = reversed * Vec4::new(0.0, 0.0, -0.1, 1.0);
        assert!((near.z / near.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn prepare_publishes_inverse_and_texel_size() {
        let mut state = FrameState::default();
        let block = ParameterBlock::prepare(
            &mut state,
            &camera(),
            &Settings::default(),
            ClipSpace::ZeroToOne,
        )
        .unwrap();

        assert_eq!(block.frame_index, 1);
        assert_eq!(state.index(), 1);
        let identity = block.projection * block.inverse_projection;
        assert!(identity.abs_diff_eq(Mat4::IDENTITY, 1e-4));
        assert_eq!(block.full_res_texel_size.z, 1920.0);
        assert_eq!(block.get("render_mode"), Some(ParamValue::Int(1)));
        assert_eq!(block.get("frame_index"), Some(ParamValue::Uint(1)));
        assert_eq!(block.get("missing"), None);
    }

    #[test]
    fn singular_projection_does_not_advance_the_index() {
        let mut state = FrameState::new(41);
        let broken = CameraFrame {
            projection: Mat4::ZERO,
            ..camera()
        };
        let result =
            ParameterBlock::prepare(&mut state, &broken, &Settings::default(), ClipSpace::ZeroToOne);
        assert_eq!(result, Err(SingularProjection));
        assert_eq!(state.index(), 41);
    }

    #[test]
    fn render_mode_travels_as_a_value() {
        let settings = Settings {
            render_mode: RenderMode::Gi,
            ..Settings::default()
        };
        let block = ParameterBlock::prepare(
            &mut FrameState::default(),
            &camera(),
            &settings,
            ClipSpace::NegativeOneToOne,
        )
        .unwrap();
        assert_eq!(block.get("render_mode"), Some(ParamValue::Int(0)));
        assert_eq!(block.projection, camera().projection);
    }
}
