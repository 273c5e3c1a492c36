use serde::Serialize;

use crate::commands::CommandList;
use crate::frame::{CameraFrame, ClipSpace, FrameState, ParameterBlock};
use crate::pool::{FrameUsage, PoolError, ResourcePool, TargetAllocator, Unbounded};
use crate::sequencer::{FrameStage, PassSequencer};
use crate::settings::Settings;
use crate::target::Extent;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("projection matrix cannot be inverted")]
    SingularProjection,
    #[error("host rejected the frame: {0:#}")]
    Submit(anyhow::Error),
}

/// Command submission side of the host.
pub trait FrameHost {
    /// Whether every pass program is compiled and bindable.
    fn programs_ready(&self) -> bool;

    /// Executes one frame's batch, in order, with `params` bound for every pass.
    fn submit(&mut self, params: &ParameterBlock, commands: &CommandList) -> anyhow::Result<()>;
}

impl<H: FrameHost + ?Sized> FrameHost for &mut H {
    fn programs_ready(&self) -> bool {
        (**self).programs_ready()
    }

    fn submit(&mut self, params: &ParameterBlock, commands: &CommandList) -> anyhow::Result<()> {
        (**self).submit(params, commands)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Disabled,
    ProgramsMissing,
    EmptyViewport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub frame_index: u32,
    pub extent: Extent,
    pub passes: usize,
    pub commands: usize,
    pub usage: FrameUsage,
    pub path: Vec<FrameStage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum FrameOutcome {
    Submitted(FrameReport),
    Skipped { reason: SkipReason },
}

impl FrameOutcome {
    pub fn report(&self) -> Option<&FrameReport> {
        match self {
            FrameOutcome::Submitted(report) => Some(report),
            FrameOutcome::Skipped { .. } => None,
        }
    }
}

/// Camera buffers the ray march samples besides color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CameraInputs {
    pub depth: bool,
    pub depth_normals: bool,
}

/// Owns everything that persists between frames and drives one frame at a time.
pub struct SsgiEffect<A = Unbounded> {
    settings: Settings,
    clip_space: ClipSpace,
    state: FrameState,
    pool: ResourcePool<A>,
    enabled: bool,
}

impl<A: TargetAllocator> SsgiEffect<A> {
    pub fn new(settings: Settings, allocator: A) -> Self {
        Self {
            settings,
            clip_space: ClipSpace::default(),
            state: FrameState::default(),
            pool: ResourcePool::new(allocator),
            enabled: true,
        }
    }

    pub fn with_clip_space(mut self, clip_space: ClipSpace) -> Self {
        self.clip_space = clip_space;
        self
    }

    pub fn with_frame_state(mut self, state: FrameState) -> Self {
        self.state = state;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: Settings) {
        self.settings = settings;
    }

    pub fn clip_space(&self) -> ClipSpace {
        self.clip_space
    }

    pub fn frame_state(&self) -> FrameState {
        self.state
    }

    pub fn pool(&self) -> &ResourcePool<A> {
        &self.pool
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn enable(&mut self) {
        if !self.enabled {
            tracing::debug!("ssgi enabled");
        }
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        if self.enabled {
            tracing::debug!("ssgi disabled");
        }
        self.enabled = false;
    }

    pub fn camera_inputs(&self) -> CameraInputs {
        CameraInputs {
            depth: true,
            depth_normals: true,
        }
    }

    /// Builds and submits one frame.
    ///
    /// Skipped frames allocate nothing and leave the frame index alone. If
    /// building fails, the frame is aborted before anything reaches the host.
    pub fn render_frame<H: FrameHost>(
        &mut self,
        camera: &CameraFrame,
        host: &mut H,
    ) -> Result<FrameOutcome, FrameError> {
        if !self.enabled {
            return Ok(FrameOutcome::Skipped {
                reason: SkipReason::Disabled,
            });
        }
        if !host.programs_ready() {
            tracing::debug!("pass programs not ready; skipping frame");
            return Ok(FrameOutcome::Skipped {
                reason: SkipReason::ProgramsMissing,
            });
        }
        let extent = camera.extent();
        if extent.is_empty() {
            tracing::warn!(%extent, "camera has an empty viewport; skipping frame");
            return Ok(FrameOutcome::Skipped {
                reason: SkipReason::EmptyViewport,
            });
        }

        let params =
            ParameterBlock::prepare(&mut self.state, camera, &self.settings, self.clip_space)
                .map_err(|_| FrameError::SingularProjection)?;

        self.pool.begin_frame(extent)?;
        let built = PassSequencer::new(&self.settings)
            .build(&mut self.pool)
            .and_then(|schedule| Ok((self.pool.end_frame()?, schedule)));
        let (usage, schedule) = match built {
            Ok(built) => built,
            Err(err) => {
                self.pool.abort_frame();
                tracing::warn!(
                    frame = params.frame_index,
                    error = %err,
                    "aborted ssgi frame before submission"
                );
                return Err(err.into());
            }
        };

        host.submit(&params, &schedule.commands)
            .map_err(FrameError::Submit)?;

        let report = FrameReport {
            frame_index: params.frame_index,
            extent,
            passes: schedule.commands.passes().count(),
            commands: schedule.commands.len(),
            usage,
            path: schedule.path,
        };
        tracing::debug!(
            frame = report.frame_index,
            passes = report.passes,
            peak_bytes = report.usage.peak_bytes,
            "submitted ssgi frame"
        );
        Ok(FrameOutcome::Submitted(report))
    }
}
