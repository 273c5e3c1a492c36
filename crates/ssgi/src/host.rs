use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::commands::CommandList;
use crate::effect::FrameHost;
use crate::frame::ParameterBlock;

/// A submitted frame as the host received it.
#[derive(Debug, Clone, Serialize)]
pub struct RecordedFrame {
    pub params: ParameterBlock,
    pub commands: CommandList,
}

/// In-memory [`FrameHost`] that validates and keeps every submitted batch.
///
/// Used by the CLI's `plan` command and by tests; no GPU involved.
#[derive(Debug, Default)]
pub struct RecordingHost {
    not_ready: bool,
    fail_submissions: bool,
    frames: Vec<RecordedFrame>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host whose pass programs never become ready.
    pub fn not_ready() -> Self {
        Self {
            not_ready: true,
            ..Self::default()
        }
    }

    /// Rejects every submission after validating it.
    pub fn fail_submissions(mut self) -> Self {
        self.fail_submissions = true;
        self
    }

    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<RecordedFrame> {
        self.frames
    }
}

impl FrameHost for RecordingHost {
    fn programs_ready(&self) -> bool {
        !self.not_ready
    }

    fn submit(&mut self, params: &ParameterBlock, commands: &CommandList) -> Result<()> {
        commands
            .check_lifetimes()
            .with_context(|| format!("frame {} has a broken target lifetime", params.frame_index))?;
        if self.fail_submissions {
            bail!("submission refused for frame {}", params.frame_index);
        }
        self.frames.push(RecordedFrame {
            params: params.clone(),
            commands: commands.clone(),
        });
        Ok(())
    }
}
