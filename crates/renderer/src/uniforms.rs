use bytemuck::{Pod, Zeroable};
use ssgi::ParameterBlock;

/// `FrameUniforms` as declared in the WGSL prelude; field order is binding.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub projection: [[f32; 4]; 4],
    pub inverse_projection: [[f32; 4]; 4],
    pub world_to_camera: [[f32; 4]; 4],
    pub full_res_texel_size: [f32; 4],
    pub frame_index: u32,
    pub sample_count: u32,
    pub render_mode: i32,
    pub cosine_weighted_sampling: f32,
    pub gi_intensity: f32,
    pub ao_intensity: f32,
    pub max_gi_ray_distance: f32,
    pub max_ao_ray_distance: f32,
    pub intersection_thickness: f32,
    pub sample_clamp_value: f32,
    pub blur_radius: f32,
    pub blur_depth_weight: f32,
    pub blur_normal_weight: f32,
    pub resolution_scale: f32,
    pub _padding: [f32; 2],
}

impl FrameUniforms {
    pub fn from_block(block: &ParameterBlock) -> Self {
        let s = &block.settings;
        Self {
            projection: block.projection.to_cols_array_2d(),
            inverse_projection: block.inverse_projection.to_cols_array_2d(),
            world_to_camera: block.view.to_cols_array_2d(),
            full_res_texel_size: block.full_res_texel_size.to_array(),
            frame_index: block.frame_index,
            sample_count: s.sample_count,
            render_mode: s.render_mode.index(),
            cosine_weighted_sampling: if s.cosine_weighted_sampling { 1.0 } else { 0.0 },
            gi_intensity: s.gi_intensity,
            ao_intensity: s.ao_intensity,
            max_gi_ray_distance: s.max_gi_ray_distance,
            max_ao_ray_distance: s.max_ao_ray_distance,
            intersection_thickness: s.intersection_thickness,
            sample_clamp_value: s.sample_clamp_value,
            blur_radius: s.filter_radius,
            blur_depth_weight: s.depth_weight,
            blur_normal_weight: s.normal_weight,
            resolution_scale: s.resolution_scale,
            _padding: [0.0; 2],
        }
    }

    pub fn size() -> wgpu::BufferAddress {
        std::mem::size_of::<Self>() as wgpu::BufferAddress
    }
}
