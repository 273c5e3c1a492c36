//! Pipelines for the indexed pass programs and the built-in resample.
//!
//! Every program is a WGSL fragment module written against [`PRELUDE`], which
//! fixes the bind group layout shared by all passes:
//!
//! | group | binding | resource |
//! |-------|---------|----------|
//! | 0     | 0       | `frame: FrameUniforms` |
//! | 1     | 0, 1    | pass source texture and its sampler |
//! | 2     | 0..=2   | `blur_source`, `accumulated_result`, `scene_color` slots |
//! | 2     | 3       | camera depth-normals |
//! | 2     | 4       | slot sampler |
//!
//! The prelude also provides the full-screen triangle vertex stage `vs_main`;
//! programs only define `fs_main`.

use std::borrow::Cow;

use anyhow::{anyhow, Result};
use ssgi::{PassProgram, Slot};

use crate::targets::HDR_FORMAT;

pub const FRAGMENT_ENTRY: &str = "fs_main";
pub const VERTEX_ENTRY: &str = "vs_main";

/// Depth-normals binding inside the slot group, after the named slots.
pub const DEPTH_NORMALS_BINDING: u32 = Slot::ALL.len() as u32;
pub const SLOT_SAMPLER_BINDING: u32 = DEPTH_NORMALS_BINDING + 1;

pub const PRELUDE: &str = r#"
struct FrameUniforms {
    projection: mat4x4<f32>,
    inverse_projection: mat4x4<f32>,
    world_to_camera: mat4x4<f32>,
    full_res_texel_size: vec4<f32>,
    frame_index: u32,
    sample_count: u32,
    render_mode: i32,
    cosine_weighted_sampling: f32,
    gi_intensity: f32,
    ao_intensity: f32,
    max_gi_ray_distance: f32,
    max_ao_ray_distance: f32,
    intersection_thickness: f32,
    sample_clamp_value: f32,
    blur_radius: f32,
    blur_depth_weight: f32,
    blur_normal_weight: f32,
    resolution_scale: f32,
    _padding: vec2<f32>,
};

const RENDER_GI: i32 = 0;
const RENDER_GI_AO: i32 = 1;

@group(0) @binding(0) var<uniform> frame: FrameUniforms;

@group(1) @binding(0) var source_texture: texture_2d<f32>;
@group(1) @binding(1) var source_sampler: sampler;

@group(2) @binding(0) var blur_source: texture_2d<f32>;
@group(2) @binding(1) var accumulated_result: texture_2d<f32>;
@group(2) @binding(2) var scene_color: texture_2d<f32>;
@group(2) @binding(3) var camera_depth_normals: texture_2d<f32>;
@group(2) @binding(4) var slot_sampler: sampler;

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_main(@builtin(vertex_index) index: u32) -> VertexOutput {
    let uv = vec2<f32>(f32((index << 1u) & 2u), f32(index & 2u));
    var out: VertexOutput;
    out.position = vec4<f32>(uv * vec2<f32>(2.0, -2.0) + vec2<f32>(-1.0, 1.0), 0.0, 1.0);
    out.uv = uv;
    return out;
}
"#;

const RESAMPLE_FRAGMENT: &str = r#"
@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return textureSample(source_texture, source_sampler, in.uv);
}
"#;

/// Prepends the shared declarations to a program's fragment source.
pub fn wrap_pass_fragment(source: &str) -> String {
    let mut wrapped = String::with_capacity(PRELUDE.len() + source.len() + 1);
    wrapped.push_str(PRELUDE);
    wrapped.push('\n');
    wrapped.push_str(source);
    wrapped
}

/// Format the program renders into.
pub fn program_target_format(
    program: Option<PassProgram>,
    camera_format: wgpu::TextureFormat,
) -> wgpu::TextureFormat {
    match program {
        Some(PassProgram::Composite) => camera_format,
        Some(PassProgram::Ssgi | PassProgram::Gaussian) | None => HDR_FORMAT,
    }
}

pub struct PassLayouts {
    pub uniforms: wgpu::BindGroupLayout,
    pub source: wgpu::BindGroupLayout,
    pub slots: wgpu::BindGroupLayout,
    pipeline: wgpu::PipelineLayout,
}

impl PassLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniforms = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ssgi uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let source = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ssgi source layout"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });

        let mut slot_entries: Vec<wgpu::BindGroupLayoutEntry> =
            (0..=DEPTH_NORMALS_BINDING).map(texture_entry).collect();
        slot_entries.push(sampler_entry(SLOT_SAMPLER_BINDING));
        let slots = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ssgi slot layout"),
            entries: &slot_entries,
        });

        let pipeline = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("ssgi pass layout"),
            bind_group_layouts: &[&uniforms, &source, &slots],
            push_constant_ranges: &[],
        });

        Self {
            uniforms,
            source,
            slots,
            pipeline,
        }
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

/// The resample pipeline plus whichever programs have been loaded.
pub struct PassPrograms {
    pub layouts: PassLayouts,
    camera_format: wgpu::TextureFormat,
    resample: wgpu::RenderPipeline,
    programs: [Option<wgpu::RenderPipeline>; 3],
}

impl PassPrograms {
    pub fn new(device: &wgpu::Device, camera_format: wgpu::TextureFormat) -> Result<Self> {
        let layouts = PassLayouts::new(device);
        let resample = build_pipeline(
            device,
            &layouts,
            "ssgi resample",
            RESAMPLE_FRAGMENT,
            HDR_FORMAT,
        )?;
        Ok(Self {
            layouts,
            camera_format,
            resample,
            programs: [None, None, None],
        })
    }

    pub fn camera_format(&self) -> wgpu::TextureFormat {
        self.camera_format
    }

    /// Compiles `fragment_source` (WGSL defining `fs_main`) for `program`.
    pub fn load(
        &mut self,
        device: &wgpu::Device,
        program: PassProgram,
        fragment_source: &str,
    ) -> Result<()> {
        let format = program_target_format(Some(program), self.camera_format);
        let label = format!("ssgi {} pass", program.name());
        let pipeline = build_pipeline(device, &self.layouts, &label, fragment_source, format)?;
        self.programs[program.index()] = Some(pipeline);
        tracing::debug!(program = program.name(), ?format, "loaded pass program");
        Ok(())
    }

    pub fn is_loaded(&self, program: PassProgram) -> bool {
        self.programs[program.index()].is_some()
    }

    pub fn all_loaded(&self) -> bool {
        PassProgram::ALL.iter().all(|program| self.is_loaded(*program))
    }

    /// `None` selects the resample.
    pub fn pipeline(&self, program: Option<PassProgram>) -> Result<&wgpu::RenderPipeline> {
        match program {
            None => Ok(&self.resample),
            Some(program) => self.programs[program.index()]
                .as_ref()
                .ok_or_else(|| anyhow!("pass program '{}' is not loaded", program.name())),
        }
    }
}

fn build_pipeline(
    device: &wgpu::Device,
    layouts: &PassLayouts,
    label: &str,
    fragment_source: &str,
    format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(Cow::Owned(wrap_pass_fragment(fragment_source))),
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layouts.pipeline),
        vertex: wgpu::VertexState {
            module: &module,
            entry_point: Some(VERTEX_ENTRY),
            buffers: &[],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: &module,
            entry_point: Some(FRAGMENT_ENTRY),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(anyhow!("failed to build {label}: {err}"));
    }
    Ok(pipeline)
}
