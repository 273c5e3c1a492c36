use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::target::{TargetHandle, TargetId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassKind {
    RayMarch,
    Upscale,
    Blur,
    Composite,
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            PassKind::RayMarch => "ray_march",
            PassKind::Upscale => "upscale",
            PassKind::Blur => "blur",
            PassKind::Composite => "composite",
        })
    }
}

/// Indexed GPU programs a pass may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassProgram {
    Ssgi,
    Composite,
    Gaussian,
}

impl PassProgram {
    pub const ALL: [PassProgram; 3] = [
        PassProgram::Ssgi,
        PassProgram::Composite,
        PassProgram::Gaussian,
    ];

    pub fn index(self) -> usize {
        match self {
            PassProgram::Ssgi => 0,
            PassProgram::Composite => 1,
            PassProgram::Gaussian => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PassProgram::Ssgi => "ssgi",
            PassProgram::Composite => "composite",
            PassProgram::Gaussian => "gaussian",
        }
    }
}

/// Where a pass reads from or writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Attachment {
    Target(TargetHandle),
    /// The camera's own color buffer; owned by the host, never pooled.
    Camera,
}

impl Attachment {
    pub fn target(&self) -> Option<&TargetHandle> {
        match self {
            Attachment::Target(target) => Some(target),
            Attachment::Camera => None,
        }
    }
}

impl fmt::Display for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attachment::Target(target) => target.fmt(f),
            Attachment::Camera => f.write_str("camera"),
        }
    }
}

/// Named texture inputs a pass program samples besides its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    BlurSource,
    AccumulatedResult,
    SceneColor,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::BlurSource, Slot::AccumulatedResult, Slot::SceneColor];

    pub fn name(self) -> &'static str {
        match self {
            Slot::BlurSource => "blur_source",
            Slot::AccumulatedResult => "accumulated_result",
            Slot::SceneColor => "scene_color",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotBinding {
    pub slot: Slot,
    pub target: TargetHandle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassDescriptor {
    pub kind: PassKind,
    /// `None` for a plain resample.
    pub program: Option<PassProgram>,
    /// `None` when the program generates its input (full-screen ray march).
    pub source: Option<Attachment>,
    pub destination: Attachment,
    pub slots: Vec<SlotBinding>,
}

impl PassDescriptor {
    pub fn slot(&self, slot: Slot) -> Option<&TargetHandle> {
        self.slots
            .iter()
            .find(|binding| binding.slot == slot)
            .map(|binding| &binding.target)
    }

    /// Every pooled target this pass touches.
    pub fn targets(&self) -> impl Iterator<Item = &TargetHandle> {
        self.source
            .iter()
            .filter_map(Attachment::target)
            .chain(self.destination.target())
            .chain(self.slots.iter().map(|binding| &binding.target))
    }
}

impl fmt::Display for PassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<9} ", self.kind)?;
        match &self.source {
            Some(source) => write!(f, "{source}")?,
            None => f.write_str("fullscreen")?,
        }
        write!(f, " -> {}", self.destination)?;
        if let Some(program) = self.program {
            write!(f, " [{}={}]", program.name(), program.index())?;
        }
        for binding in &self.slots {
            write!(f, " {}={}", binding.slot.name(), binding.target)?;
        }
        Ok(())
    }
}

/// One step of a frame's command batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    Allocate(TargetHandle),
    Pass(PassDescriptor),
    /// Direct copy of the camera color buffer; no program involved.
    CopyCameraColor { destination: TargetHandle },
    Release(TargetHandle),
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Allocate(target) => write!(
                f,
                "allocate  {target} {} {:?}",
                target.extent, target.desc.format
            ),
            Command::Pass(pass) => pass.fmt(f),
            Command::CopyCameraColor { destination } => {
                write!(f, "copy      camera -> {destination} {}", destination.extent)
            }
            Command::Release(target) => write!(f, "release   {target}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifetimeError {
    #[error("command {index} allocates {id} twice")]
    DuplicateAllocation { id: TargetId, index: usize },
    #[error("command {index} uses {id} before it is allocated")]
    UseBeforeAllocate { id: TargetId, index: usize },
    #[error("command {index} uses {id} after it was released")]
    UseAfterRelease { id: TargetId, index: usize },
    #[error("command {index} releases {id}, which is not live")]
    NotLive { id: TargetId, index: usize },
    #[error("batch ends with live targets {0:?}")]
    Leaked(Vec<TargetId>),
}

/// Ordered batch of commands for one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }

    pub fn as_slice(&self) -> &[Command] {
        &self.commands
    }

    pub fn passes(&self) -> impl Iterator<Item = &PassDescriptor> {
        self.commands.iter().filter_map(|command| match command {
            Command::Pass(pass) => Some(pass),
            _ => None,
        })
    }

    pub fn allocations(&self) -> impl Iterator<Item = &TargetHandle> {
        self.commands.iter().filter_map(|command| match command {
            Command::Allocate(target) => Some(target),
            _ => None,
        })
    }

    pub fn releases(&self) -> impl Iterator<Item = &TargetHandle> {
        self.commands.iter().filter_map(|command| match command {
            Command::Release(target) => Some(target),
            _ => None,
        })
    }

    /// Verifies allocate-before-use, release-after-last-use, single release,
    /// and that nothing is left live at the end of the batch.
    pub fn check_lifetimes(&self) -> Result<(), LifetimeError> {
        let mut live: HashSet<TargetId> = HashSet::new();
        let mut released: HashSet<TargetId> = HashSet::new();

        let ensure_live = |live: &HashSet<TargetId>,
                           released: &HashSet<TargetId>,
                           id: TargetId,
                           index: usize| {
            if live.contains(&id) {
                Ok(())
            } else if released.contains(&id) {
                Err(LifetimeError::UseAfterRelease { id, index })
            } else {
                Err(LifetimeError::UseBeforeAllocate { id, index })
            }
        };

        for (index, command) in self.commands.iter().enumerate() {
            match command {
                Command::Allocate(target) => {
                    if live.contains(&target.id) || released.contains(&target.id) {
                        return Err(LifetimeError::DuplicateAllocation {
                            id: target.id,
                            index,
                        });
                    }
                    live.insert(target.id);
                }
                Command::Pass(pass) => {
                    for target in pass.targets() {
                        ensure_live(&live, &released, target.id, index)?;
                    }
                }
                Command::CopyCameraColor { destination } => {
                    ensure_live(&live, &released, destination.id, index)?;
                }
                Command::Release(target) => {
                    if !live.remove(&target.id) {
                        return Err(LifetimeError::NotLive {
                            id: target.id,
                            index,
                        });
                    }
                    released.insert(target.id);
                }
            }
        }

        if live.is_empty() {
            Ok(())
        } else {
            let mut leaked: Vec<TargetId> = live.into_iter().collect();
            leaked.sort();
            Err(LifetimeError::Leaked(leaked))
        }
    }
}

impl<'a> IntoIterator for &'a CommandList {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.commands.iter()
    }
}

impl FromIterator<Command> for CommandList {
    fn from_iter<I: IntoIterator<Item = Command>>(iter: I) -> Self {
        Self {
            commands: iter.into_iter().collect(),
        }
    }
}
