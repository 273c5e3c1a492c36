//! Builds one frame's command batch.
//!
//! ```text
//!  RayMarch ──▶ low_res ──┬─────────────────────────────┐
//!                         │ filter enabled              │ filter skipped
//!                         ▼                             │
//!              Upscale ──▶ upscaled ◀─┐                 │
//!                            │  Blur  │ ping-pong       │
//!                            ▼        │                 │
//!                        blur_buffer ─┘                 │
//!                            │                          │
//!                            ▼                          ▼
//!                        last_result ──▶ Composite ◀── scene_copy ◀── camera
//! ```
//!
//! Every target is allocated right before its first use and released right
//! after its last, so at most three targets are live at once.

use serde::Serialize;

use crate::commands::{
    Attachment, Command, CommandList, PassDescriptor, PassKind, PassProgram, Slot, SlotBinding,
};
use crate::pool::{PoolError, ResourcePool, TargetAllocator};
use crate::settings::Settings;
use crate::target::{Extent, TargetDesc, TargetFormat, TargetHandle, TargetSize};

pub const LOW_RES_LABEL: &str = "ssgi_low_res";
pub const UPSCALED_LABEL: &str = "ssgi_upscaled";
pub const BLUR_BUFFER_LABEL: &str = "ssgi_blur_buffer";
pub const SCENE_COPY_LABEL: &str = "ssgi_scene_copy";

/// Per-frame construction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStage {
    Idle,
    RayMarched,
    Filtered,
    Unfiltered,
    Composited,
}

/// Two targets alternating as blur source and destination.
#[derive(Debug, Clone, Copy)]
pub struct PingPong {
    current: TargetHandle,
    spare: TargetHandle,
}

impl PingPong {
    pub fn new(current: TargetHandle, spare: TargetHandle) -> Self {
        Self { current, spare }
    }

    /// Holds the latest result.
    pub fn current(&self) -> TargetHandle {
        self.current
    }

    /// Free to be overwritten by the next iteration.
    pub fn spare(&self) -> TargetHandle {
        self.spare
    }

    pub fn swap(&mut self) {
        std::mem::swap(&mut self.current, &mut self.spare);
    }

    /// `(current, spare)`.
    pub fn into_parts(self) -> (TargetHandle, TargetHandle) {
        (self.current, self.spare)
    }
}

/// What the spatial filter stage did with its two full-resolution targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterOutcome {
    pub upscaled: TargetHandle,
    pub blur_buffer: TargetHandle,
    pub iterations: u32,
    /// The member released right after the blur loop.
    pub released: TargetHandle,
    /// The final current member, carried into the composite.
    pub result: TargetHandle,
}

/// A built frame: the command batch plus the handles used to build it.
#[derive(Debug, Clone, Serialize)]
pub struct FrameSchedule {
    pub commands: CommandList,
    pub ray_march: TargetHandle,
    pub filter: Option<FilterOutcome>,
    pub scene_copy: TargetHandle,
    /// The result composited onto the camera.
    pub last_result: TargetHandle,
    /// Stages visited, starting at `Idle`.
    pub path: Vec<FrameStage>,
}

impl FrameSchedule {
    pub fn stage(&self) -> FrameStage {
        self.path.last().copied().unwrap_or(FrameStage::Idle)
    }
}

pub struct PassSequencer<'a> {
    settings: &'a Settings,
    commands: CommandList,
    path: Vec<FrameStage>,
}

impl<'a> PassSequencer<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Self {
            settings,
            commands: CommandList::new(),
            path: vec![FrameStage::Idle],
        }
    }

    /// Builds the frame inside the pool's open frame scope.
    ///
    /// On error the pool may hold live targets from the stages already built;
    /// the caller aborts the frame.
    pub fn build<A: TargetAllocator>(
        mut self,
        pool: &mut ResourcePool<A>,
    ) -> Result<FrameSchedule, PoolError> {
        let camera = pool.frame_extent().ok_or(PoolError::NoFrame)?;

        let ray_march = self.ray_march(pool, camera)?;
        let filter = if self.settings.filter_enabled() {
            let outcome = self.filter(pool, camera, ray_march)?;
            self.path.push(FrameStage::Filtered);
            Some(outcome)
        } else {
            self.path.push(FrameStage::Unfiltered);
            None
        };
        let last_result = filter.map_or(ray_march, |outcome| outcome.result);

        let scene_copy = self.composite(pool, last_result)?;

        pool.release(&last_result)?;
        self.commands.push(Command::Release(last_result));

        tracing::debug!(
            commands = self.commands.len(),
            filtered = filter.is_some(),
            last_result = %last_result,
            "built ssgi frame"
        );

        Ok(FrameSchedule {
            commands: self.commands,
            ray_march,
            filter,
            scene_copy,
            last_result,
            path: self.path,
        })
    }

    fn ray_march<A: TargetAllocator>(
        &mut self,
        pool: &mut ResourcePool<A>,
        camera: Extent,
    ) -> Result<TargetHandle, PoolError> {
        let extent = camera.scaled(self.settings.resolution_scale);
        let low_res = self.allocate(
            pool,
            TargetDesc::new(LOW_RES_LABEL, TargetSize::Pixels(extent)),
        )?;
        self.commands.push(Command::Pass(PassDescriptor {
            kind: PassKind::RayMarch,
            program: Some(PassProgram::Ssgi),
            source: None,
            destination: Attachment::Target(low_res),
            slots: Vec::new(),
        }));
        self.path.push(FrameStage::RayMarched);
        Ok(low_res)
    }

    fn filter<A: TargetAllocator>(
        &mut self,
        pool: &mut ResourcePool<A>,
        camera: Extent,
        low_res: TargetHandle,
    ) -> Result<FilterOutcome, PoolError> {
        let full_res = TargetSize::Pixels(camera);

        let upscaled = self.allocate(pool, TargetDesc::new(UPSCALED_LABEL, full_res))?;
        self.commands.push(Command::Pass(PassDescriptor {
            kind: PassKind::Upscale,
            program: None,
            source: Some(Attachment::Target(low_res)),
            destination: Attachment::Target(upscaled),
            slots: Vec::new(),
        }));
        self.release(pool, low_res)?;

        let blur_buffer = self.allocate(pool, TargetDesc::new(BLUR_BUFFER_LABEL, full_res))?;
        let mut pair = PingPong::new(upscaled, blur_buffer);
        for _ in 0..self.settings.filter_iterations {
            let source = pair.current();
            self.commands.push(Command::Pass(PassDescriptor {
                kind: PassKind::Blur,
                program: Some(PassProgram::Gaussian),
                source: Some(Attachment::Target(source)),
                destination: Attachment::Target(pair.spare()),
                slots: vec![SlotBinding {
                    slot: Slot::BlurSource,
                    target: source,
                }],
            }));
            pair.swap();
        }

        let (result, released) = pair.into_parts();
        self.release(pool, released)?;

        Ok(FilterOutcome {
            upscaled,
            blur_buffer,
            iterations: self.settings.filter_iterations,
            released,
            result,
        })
    }

    fn composite<A: TargetAllocator>(
        &mut self,
        pool: &mut ResourcePool<A>,
        last_result: TargetHandle,
    ) -> Result<TargetHandle, PoolError> {
        let scene_copy = self.allocate(
            pool,
            TargetDesc::new(SCENE_COPY_LABEL, TargetSize::Camera).format(TargetFormat::Camera),
        )?;
        self.commands.push(Command::CopyCameraColor {
            destination: scene_copy,
        });
        self.commands.push(Command::Pass(PassDescriptor {
            kind: PassKind::Composite,
            program: Some(PassProgram::Composite),
            source: Some(Attachment::Target(scene_copy)),
            destination: Attachment::Camera,
            slots: vec![
                SlotBinding {
                    slot: Slot::AccumulatedResult,
                    target: last_result,
                },
                SlotBinding {
                    slot: Slot::SceneColor,
                    target: scene_copy,
                },
            ],
        }));
        self.release(pool, scene_copy)?;
        self.path.push(FrameStage::Composited);
        Ok(scene_copy)
    }

    fn allocate<A: TargetAllocator>(
        &mut self,
        pool: &mut ResourcePool<A>,
        desc: TargetDesc,
    ) -> Result<TargetHandle, PoolError> {
        let target = pool.allocate(desc)?;
        self.commands.push(Command::Allocate(target));
        Ok(target)
    }

    fn release<A: TargetAllocator>(
        &mut self,
        pool: &mut ResourcePool<A>,
        target: TargetHandle,
    ) -> Result<(), PoolError> {
        pool.release(&target)?;
        self.commands.push(Command::Release(target));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Unbounded;

    fn build(settings: &Settings, extent: Extent) -> FrameSchedule {
        let mut pool = ResourcePool::<Unbounded>::default();
        pool.begin_frame(extent).unwrap();
        let schedule = PassSequencer::new(settings).build(&mut pool).unwrap();
        pool.end_frame().unwrap();
        schedule
    }

    #[test]
    fn ping_pong_swaps_roles() {
        let mut pool = ResourcePool::<Unbounded>::default();
        pool.begin_frame(Extent::new(4, 4)).unwrap();
        let a = pool.allocate(TargetDesc::new("a", TargetSize::Camera)).unwrap();
        let b = pool.allocate(TargetDesc::new("b", TargetSize::Camera)).unwrap();

        let mut pair = PingPong::new(a, b);
        assert_eq!((pair.current(), pair.spare()), (a, b));
        pair.swap();
        assert_eq!((pair.current(), pair.spare()), (b, a));
        pair.swap();
        assert_eq!(pair.into_parts(), (a, b));
    }

    #[test]
    fn unfiltered_frame_composites_the_ray_march_target() {
        let settings = Settings {
            filter_iterations: 0,
            ..Settings::default()
        };
        let schedule = build(&settings, Extent::new(1920, 1080));
        assert_eq!(schedule.last_result, schedule.ray_march);
        assert_eq!(schedule.ray_march.extent, Extent::new(960, 540));
        assert!(schedule.filter.is_none());
        assert_eq!(
            schedule.path,
            vec![
                FrameStage::Idle,
                FrameStage::RayMarched,
                FrameStage::Unfiltered,
                FrameStage::Composited
            ]
        );
    }

    #[test]
    fn scene_copy_matches_camera_size_and_format() {
        let schedule = build(&Settings::default(), Extent::new(800, 600));
        assert_eq!(schedule.scene_copy.extent, Extent::new(800, 600));
        assert_eq!(schedule.scene_copy.desc.format, TargetFormat::Camera);
        assert_eq!(schedule.scene_copy.label(), SCENE_COPY_LABEL);
    }

    #[test]
    fn build_without_an_open_frame_fails() {
        let mut pool = ResourcePool::<Unbounded>::default();
        let result = PassSequencer::new(&Settings::default()).build(&mut pool);
        assert!(matches!(result, Err(PoolError::NoFrame)));
    }

    #[test]
    fn composite_binds_result_and_scene_copy_slots() {
        let schedule = build(&Settings::default(), Extent::new(64, 64));
        let composite = schedule
            .commands
            .passes()
            .find(|pass| pass.kind == PassKind::Composite)
            .unwrap();
        assert_eq!(composite.destination, Attachment::Camera);
        assert_eq!(
            composite.slot(Slot::AccumulatedResult),
            Some(&schedule.last_result)
        );
        assert_eq!(composite.slot(Slot::SceneColor), Some(&schedule.scene_copy));
    }
}
