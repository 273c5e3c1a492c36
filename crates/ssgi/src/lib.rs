//! Per-frame render graph for screen-space global illumination.
//!
//! Each frame the effect refreshes the parameter block, asks the sequencer
//! for a command batch, and hands that batch to the host in one submission:
//!
//! ```text
//!   CameraFrame ──▶ ParameterBlock::prepare ──▶ frame_index + 1
//!        │                    │
//!        ▼                    ▼
//!   ResourcePool ◀──▶ PassSequencer ──▶ CommandList ──▶ FrameHost::submit
//!        │
//!        └─▶ TargetAllocator (host textures / memory budget)
//! ```
//!
//! The pool owns transient target identity for the duration of one frame and
//! refuses to close a frame that still holds live targets. The sequencer is
//! the only thing that allocates or releases, and it does so through typed
//! [`TargetHandle`]s, never through labels.

pub mod commands;
pub mod effect;
pub mod frame;
pub mod host;
pub mod pool;
pub mod sequencer;
pub mod settings;
pub mod target;

pub use commands::{
    Attachment, Command, CommandList, LifetimeError, PassDescriptor, PassKind, PassProgram, Slot,
    SlotBinding,
};
pub use effect::{
    CameraInputs, FrameError, FrameHost, FrameOutcome, FrameReport, SkipReason, SsgiEffect,
};
pub use frame::{CameraFrame, ClipSpace, FrameState, ParamValue, ParameterBlock};
pub use host::{RecordedFrame, RecordingHost};
pub use pool::{
    AllocError, FrameUsage, MemoryBudget, PoolError, ResourcePool, TargetAllocator, Unbounded,
};
pub use sequencer::{FilterOutcome, FrameSchedule, FrameStage, PassSequencer, PingPong};
pub use settings::{RenderMode, Settings};
pub use target::{Extent, FilterMode, TargetDesc, TargetFormat, TargetHandle, TargetId, TargetSize};
