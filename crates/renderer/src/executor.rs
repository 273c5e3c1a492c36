use anyhow::{bail, Context, Result};
use ssgi::{
    Attachment, Command, CommandList, FilterMode, FrameHost, ParameterBlock, PassDescriptor,
    PassProgram, Slot,
};

use crate::context::GpuContext;
use crate::programs::{PassPrograms, DEPTH_NORMALS_BINDING, SLOT_SAMPLER_BINDING};
use crate::targets::{DeviceLimits, TransientTextures, HDR_FORMAT};
use crate::uniforms::FrameUniforms;

/// The embedder's camera buffers for the frame about to be submitted.
pub struct CameraTargets {
    /// Needs `RENDER_ATTACHMENT | COPY_SRC`.
    pub color: wgpu::Texture,
    /// View-space normal in `xyz`, linear depth in `w`.
    pub depth_normals: wgpu::TextureView,
}

struct Samplers {
    point: wgpu::Sampler,
    bilinear: wgpu::Sampler,
}

impl Samplers {
    fn new(device: &wgpu::Device) -> Self {
        let make = |label, filter| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: Some(label),
                address_mode_u: wgpu::AddressMode::ClampToEdge,
                address_mode_v: wgpu::AddressMode::ClampToEdge,
                address_mode_w: wgpu::AddressMode::ClampToEdge,
                mag_filter: filter,
                min_filter: filter,
                ..Default::default()
            })
        };
        Self {
            point: make("ssgi point sampler", wgpu::FilterMode::Nearest),
            bilinear: make("ssgi bilinear sampler", wgpu::FilterMode::Linear),
        }
    }

    fn for_filter(&self, filter: FilterMode) -> &wgpu::Sampler {
        match filter {
            FilterMode::Point => &self.point,
            FilterMode::Bilinear => &self.bilinear,
        }
    }
}

/// [`FrameHost`] that encodes each command batch into one wgpu submission.
pub struct GpuExecutor {
    context: GpuContext,
    programs: PassPrograms,
    textures: TransientTextures,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    samplers: Samplers,
    placeholder: wgpu::TextureView,
    camera: Option<(CameraTargets, wgpu::TextureView)>,
    submitted: u64,
}

impl GpuExecutor {
    pub fn new(context: GpuContext, camera_format: wgpu::TextureFormat) -> Result<Self> {
        let device = &context.device;
        let programs =
            PassPrograms::new(device, camera_format).context("failed to build resample pipeline")?;

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ssgi frame uniforms"),
            size: FrameUniforms::size(),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ssgi uniform bind group"),
            layout: &programs.layouts.uniforms,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let placeholder = device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("ssgi placeholder"),
                size: wgpu::Extent3d {
                    width: 1,
                    height: 1,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: HDR_FORMAT,
                usage: wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default());

        let samplers = Samplers::new(device);
        Ok(Self {
            context,
            programs,
            textures: TransientTextures::new(),
            uniform_buffer,
            uniform_bind_group,
            samplers,
            placeholder,
            camera: None,
            submitted: 0,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Allocator for an [`ssgi::SsgiEffect`] driving this executor.
    pub fn allocator(&self) -> DeviceLimits {
        DeviceLimits::from_device(&self.context.device)
    }

    pub fn load_program(&mut self, program: PassProgram, fragment_source: &str) -> Result<()> {
        self.programs
            .load(&self.context.device, program, fragment_source)
            .with_context(|| format!("failed to load pass program '{}'", program.name()))
    }

    pub fn set_camera(&mut self, camera: CameraTargets) -> Result<()> {
        let expected = self.programs.camera_format();
        if camera.color.format() != expected {
            bail!(
                "camera color format {:?} does not match the configured {:?}",
                camera.color.format(),
                expected
            );
        }
        let view = camera
            .color
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.camera = Some((camera, view));
        Ok(())
    }

    pub fn textures(&self) -> &TransientTextures {
        &self.textures
    }

    pub fn submitted_frames(&self) -> u64 {
        self.submitted
    }
}

impl FrameHost for GpuExecutor {
    fn programs_ready(&self) -> bool {
        self.programs.all_loaded()
    }

    fn submit(&mut self, params: &ParameterBlock, commands: &CommandList) -> Result<()> {
        commands
            .check_lifetimes()
            .context("refusing to encode a batch with broken target lifetimes")?;

        let Self {
            context,
            programs,
            textures,
            uniform_buffer,
            uniform_bind_group,
            samplers,
            placeholder,
            camera,
            submitted,
        } = self;
        let (camera, camera_view) = camera
            .as_ref()
            .context("no camera targets set for this frame")?;
        if camera.color.width() != params.extent.width
            || camera.color.height() != params.extent.height
        {
            bail!(
                "camera color is {}x{} but the frame is {}",
                camera.color.width(),
                camera.color.height(),
                params.extent
            );
        }

        context.queue.write_buffer(
            uniform_buffer,
            0,
            bytemuck::bytes_of(&FrameUniforms::from_block(params)),
        );

        let device = &context.device;
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("ssgi frame"),
        });
        let frame = FrameResources {
            device,
            programs: &*programs,
            uniform_bind_group: &*uniform_bind_group,
            samplers: &*samplers,
            placeholder: &*placeholder,
            camera,
            camera_view,
        };

        let encoded = commands.iter().try_for_each(|command| match command {
            Command::Allocate(target) => textures.acquire(device, target, programs.camera_format()),
            Command::Pass(pass) => frame.encode_pass(&mut encoder, textures, pass),
            Command::CopyCameraColor { destination } => {
                let texture = textures.texture(destination)?;
                encoder.copy_texture_to_texture(
                    camera.color.as_image_copy(),
                    texture.as_image_copy(),
                    wgpu::Extent3d {
                        width: destination.extent.width,
                        height: destination.extent.height,
                        depth_or_array_layers: 1,
                    },
                );
                Ok(())
            }
            Command::Release(target) => textures.release(target),
        });
        if let Err(err) = encoded {
            let stranded = textures.release_all();
            tracing::warn!(
                frame = params.frame_index,
                stranded,
                "failed to encode ssgi frame"
            );
            return Err(err);
        }

        context.queue.submit(Some(encoder.finish()));
        *submitted += 1;
        tracing::debug!(
            frame = params.frame_index,
            commands = commands.len(),
            textures_created = textures.created_count(),
            "submitted ssgi frame to the GPU"
        );
        Ok(())
    }
}

struct FrameResources<'a> {
    device: &'a wgpu::Device,
    programs: &'a PassPrograms,
    uniform_bind_group: &'a wgpu::BindGroup,
    samplers: &'a Samplers,
    placeholder: &'a wgpu::TextureView,
    camera: &'a CameraTargets,
    camera_view: &'a wgpu::TextureView,
}

impl FrameResources<'_> {
    fn encode_pass(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        textures: &TransientTextures,
        pass: &PassDescriptor,
    ) -> Result<()> {
        let pipeline = self.programs.pipeline(pass.program)?;

        let (source_view, source_filter) = match &pass.source {
            Some(Attachment::Target(target)) => {
                let pooled = textures.get(target)?;
                (&pooled.view, pooled.filter)
            }
            Some(Attachment::Camera) => (self.camera_view, FilterMode::Bilinear),
            None => (self.placeholder, FilterMode::Point),
        };
        let source_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ssgi source bind group"),
            layout: &self.programs.layouts.source,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(
                        self.samplers.for_filter(source_filter),
                    ),
                },
            ],
        });

        let mut slot_entries = Vec::with_capacity(Slot::ALL.len() + 2);
        for (binding, slot) in Slot::ALL.iter().enumerate() {
            let view = match pass.slot(*slot) {
                Some(target) => &textures.get(target)?.view,
                None => self.placeholder,
            };
            slot_entries.push(wgpu::BindGroupEntry {
                binding: binding as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        slot_entries.push(wgpu::BindGroupEntry {
            binding: DEPTH_NORMALS_BINDING,
            resource: wgpu::BindingResource::TextureView(&self.camera.depth_normals),
        });
        slot_entries.push(wgpu::BindGroupEntry {
            binding: SLOT_SAMPLER_BINDING,
            resource: wgpu::BindingResource::Sampler(&self.samplers.bilinear),
        });
        let slot_bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ssgi slot bind group"),
            layout: &self.programs.layouts.slots,
            entries: &slot_entries,
        });

        let (destination, load) = match &pass.destination {
            Attachment::Target(target) => (
                &textures.get(target)?.view,
                wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            ),
            Attachment::Camera => (self.camera_view, wgpu::LoadOp::Load),
        };

        let label = format!("ssgi {}", pass.kind);
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label.as_str()),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: destination,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, self.uniform_bind_group, &[]);
        render_pass.set_bind_group(1, &source_bind_group, &[]);
        render_pass.set_bind_group(2, &slot_bind_group, &[]);
        render_pass.draw(0..3, 0..1);
        Ok(())
    }
}
