//! wgpu host for the ssgi effect.
//!
//! The core crate decides *what* runs each frame; this crate runs it:
//!
//! ```text
//!   SsgiEffect::render_frame
//!          │ ParameterBlock + CommandList
//!          ▼
//!   GpuExecutor::submit ──▶ FrameUniforms ─▶ uniform buffer
//!          │
//!          ├─ Allocate / Release ──▶ TransientTextures (recycled by size + format)
//!          ├─ Pass ───────────────▶ PassPrograms (resample or loaded WGSL)
//!          └─ CopyCameraColor ────▶ copy_texture_to_texture
//!          ▼
//!   one CommandEncoder, one queue submission
//! ```
//!
//! `GpuExecutor` owns every GPU object it creates. The embedder supplies the
//! camera color and depth-normals textures each frame and the WGSL for the
//! three indexed programs; until all three are loaded the executor reports
//! itself as not ready and the effect skips frames.

mod context;
mod executor;
mod programs;
mod targets;
mod uniforms;

pub use context::{AdapterProfile, GpuContext, GpuPowerPreference};
pub use executor::{CameraTargets, GpuExecutor};
pub use programs::{
    program_target_format, wrap_pass_fragment, PassLayouts, PassPrograms, FRAGMENT_ENTRY, PRELUDE,
    VERTEX_ENTRY,
};
pub use targets::{texture_format, DeviceLimits, RecycleBin, TextureKey, TransientTextures, HDR_FORMAT};
pub use uniforms::FrameUniforms;
