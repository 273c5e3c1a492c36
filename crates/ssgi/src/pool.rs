//! Transient target bookkeeping for one frame at a time.
//!
//! The pool issues handles, forwards every allocate/release to the host's
//! [`TargetAllocator`], and tracks which handles are live inside the current
//! frame scope. It never cleans up on its own: a frame that ends with live
//! targets is reported as [`PoolError::Leaked`] and stays open until the caller
//! aborts it.

use serde::Serialize;

use crate::target::{Extent, TargetDesc, TargetHandle, TargetId};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AllocError {
    #[error("needs {requested} bytes but only {available} of the {budget} byte budget remain")]
    BudgetExceeded {
        requested: u64,
        available: u64,
        budget: u64,
    },
    #[error("extent {extent} exceeds the maximum texture dimension {max}")]
    TooLarge { extent: Extent, max: u32 },
    #[error("{0}")]
    Host(String),
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum PoolError {
    #[error("a frame is already being built; end or abort it first")]
    FrameInProgress,
    #[error("no frame is being built")]
    NoFrame,
    #[error("failed to allocate target '{label}': {source}")]
    Allocation {
        label: &'static str,
        #[source]
        source: AllocError,
    },
    #[error("target {0} is not live (already released or never allocated)")]
    NotLive(TargetId),
    #[error("frame ended with {} live target(s): {:?}", .0.len(), .0)]
    Leaked(Vec<TargetId>),
}

/// Host-side texture allocator consulted by the pool.
pub trait TargetAllocator {
    /// Reserves storage for `target`; a rejection aborts the frame being built.
    fn allocate(&mut self, target: &TargetHandle) -> Result<(), AllocError>;

    /// Returns `target` to the host's free pool.
    fn release(&mut self, target: &TargetHandle);
}

impl<T: TargetAllocator + ?Sized> TargetAllocator for Box<T> {
    fn allocate(&mut self, target: &TargetHandle) -> Result<(), AllocError> {
        (**self).allocate(target)
    }

    fn release(&mut self, target: &TargetHandle) {
        (**self).release(target)
    }
}

/// Accepts every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl TargetAllocator for Unbounded {
    fn allocate(&mut self, _target: &TargetHandle) -> Result<(), AllocError> {
        Ok(())
    }

    fn release(&mut self, _target: &TargetHandle) {}
}

/// Rejects allocations that would push estimated usage over a byte cap.
#[derive(Debug, Clone)]
pub struct MemoryBudget {
    budget: u64,
    in_use: u64,
    peak: u64,
}

impl MemoryBudget {
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            in_use: 0,
            peak: 0,
        }
    }

    pub fn from_mib(mib: u64) -> Self {
        Self::new(mib.saturating_mul(1024 * 1024))
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn in_use(&self) -> u64 {
        self.in_use
    }

    pub fn peak(&self) -> u64 {
        self.peak
    }
}

impl TargetAllocator for MemoryBudget {
    fn allocate(&mut self, target: &TargetHandle) -> Result<(), AllocError> {
        let requested = target.estimated_bytes();
        let available = self.budget.saturating_sub(self.in_use);
        if requested > available {
            return Err(AllocError::BudgetExceeded {
                requested,
                available,
                budget: self.budget,
            });
        }
        self.in_use += requested;
        self.peak = self.peak.max(self.in_use);
        Ok(())
    }

    fn release(&mut self, target: &TargetHandle) {
        self.in_use = self.in_use.saturating_sub(target.estimated_bytes());
    }
}

/// Allocation statistics for one completed frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameUsage {
    pub allocations: u32,
    pub releases: u32,
    pub peak_live: u32,
    pub peak_bytes: u64,
}

struct FrameScope {
    extent: Extent,
    live: Vec<TargetHandle>,
    live_bytes: u64,
    usage: FrameUsage,
}

pub struct ResourcePool<A = Unbounded> {
    allocator: A,
    next_id: u64,
    frame: Option<FrameScope>,
}

impl<A: Default> Default for ResourcePool<A> {
    fn default() -> Self {
        Self::new(A::default())
    }
}

impl<A> ResourcePool<A> {
    pub fn new(allocator: A) -> Self {
        Self {
            allocator,
            next_id: 1,
            frame: None,
        }
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    pub fn allocator_mut(&mut self) -> &mut A {
        &mut self.allocator
    }

    /// Extent of the frame being built, if any.
    pub fn frame_extent(&self) -> Option<Extent> {
        self.frame.as_ref().map(|scope| scope.extent)
    }

    pub fn in_frame(&self) -> bool {
        self.frame.is_some()
    }

    pub fn live_count(&self) -> usize {
        self.frame.as_ref().map_or(0, |scope| scope.live.len())
    }

    pub fn is_live(&self, target: &TargetHandle) -> bool {
        self.frame
            .as_ref()
            .is_some_and(|scope| scope.live.contains(target))
    }

    /// Opens a frame scope. [`TargetSize::Camera`] resolves to `extent` until
    /// the scope closes.
    ///
    /// [`TargetSize::Camera`]: crate::TargetSize::Camera
    pub fn begin_frame(&mut self, extent: Extent) -> Result<(), PoolError> {
        if self.frame.is_some() {
            return Err(PoolError::FrameInProgress);
        }
        self.frame = Some(FrameScope {
            extent,
            live: Vec::new(),
            live_bytes: 0,
            usage: FrameUsage::default(),
        });
        Ok(())
    }
}

impl<A: TargetAllocator> ResourcePool<A> {
    pub fn allocate(&mut self, desc: TargetDesc) -> Result<TargetHandle, PoolError> {
        let scope = self.frame.as_mut().ok_or(PoolError::NoFrame)?;
        let target = TargetHandle {
            id: TargetId(self.next_id),
            desc,
            extent: desc.size.resolve(scope.extent),
        };
        self.allocator
            .allocate(&target)
            .map_err(|source| PoolError::Allocation {
                label: desc.label,
                source,
            })?;
        self.next_id += 1;

        scope.live.push(target);
        scope.live_bytes += target.estimated_bytes();
        scope.usage.allocations += 1;
        scope.usage.peak_live = scope.usage.peak_live.max(scope.live.len() as u32);
        scope.usage.peak_bytes = scope.usage.peak_bytes.max(scope.live_bytes);
        tracing::debug!(
            handle = %target,
            extent = %target.extent,
            format = ?desc.format,
            "allocated transient target"
        );
        Ok(target)
    }

    pub fn release(&mut self, target: &TargetHandle) -> Result<(), PoolError> {
        let scope = self.frame.as_mut().ok_or(PoolError::NoFrame)?;
        let index = scope
            .live
            .iter()
            .position(|live| live == target)
            .ok_or(PoolError::NotLive(target.id))?;
        let released = scope.live.remove(index);
        self.allocator.release(&released);

        scope.live_bytes = scope.live_bytes.saturating_sub(released.estimated_bytes());
        scope.usage.releases += 1;
        tracing::debug!(handle = %released, "released transient target");
        Ok(())
    }

    /// Closes the frame scope if every allocation has been released.
    ///
    /// On a leak the scope stays open so the caller can inspect it and then
    /// call [`ResourcePool::abort_frame`].
    pub fn end_frame(&mut self) -> Result<FrameUsage, PoolError> {
        let scope = self.frame.as_ref().ok_or(PoolError::NoFrame)?;
        if !scope.live.is_empty() {
            return Err(PoolError::Leaked(
                scope.live.iter().map(|target| target.id).collect(),
            ));
        }
        let usage = scope.usage;
        self.frame = None;
        Ok(usage)
    }

    /// Releases every live target, newest first, and closes the frame scope.
    ///
    /// Returns how many targets were still live.
    pub fn abort_frame(&mut self) -> usize {
        let Some(mut scope) = self.frame.take() else {
            return 0;
        };
        let count = scope.live.len();
        while let Some(target) = scope.live.pop() {
            self.allocator.release(&target);
        }
        if count > 0 {
            tracing::warn!(released = count, "aborted frame with live transient targets");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{TargetFormat, TargetSize};

    fn hdr(label: &'static str, width: u32, height: u32) -> TargetDesc {
        TargetDesc::new(label, TargetSize::Pixels(Extent::new(width, height)))
    }

    #[test]
    fn allocate_and_release_balance_the_frame() {
        let mut pool = ResourcePool::<Unbounded>::default();
        pool.begin_frame(Extent::new(64, 64)).unwrap();
        let a = pool.allocate(hdr("a", 32, 32)).unwrap();
        let b = pool.allocate(TargetDesc::new("b", TargetSize::Camera)).unwrap();
        assert_eq!(b.extent, Extent::new(64, 64));
        assert_ne!(a, b);
        assert_eq!(pool.live_count(), 2);

        pool.release(&a).unwrap();
        pool.release(&b).unwrap();
        let usage = pool.end_frame().unwrap();
        assert_eq!(usage.allocations, 2);
        assert_eq!(usage.releases, 2);
        assert_eq!(usage.peak_live, 2);
        assert_eq!(usage.peak_bytes, 32 * 32 * 8 + 64 * 64 * 8);
        assert!(!pool.in_frame());
    }

    #[test]
    fn double_release_is_reported() {
        let mut pool = ResourcePool::<Unbounded>::default();
        pool.begin_frame(Extent::new(8, 8)).unwrap();
        let a = pool.allocate(hdr("a", 8, 8)).unwrap();
        pool.release(&a).unwrap();
        assert_eq!(pool.release(&a), Err(PoolError::NotLive(a.id)));
    }

    #[test]
    fn allocate_outside_a_frame_fails() {
        let mut pool = ResourcePool::<Unbounded>::default();
        assert_eq!(pool.allocate(hdr("a", 8, 8)), Err(PoolError::NoFrame));
    }

    #[test]
    fn reentrant_begin_frame_is_rejected() {
        let mut pool = ResourcePool::<Unbounded>::default();
        pool.begin_frame(Extent::new(8, 8)).unwrap();
        assert_eq!(
            pool.begin_frame(Extent::new(8, 8)),
            Err(PoolError::FrameInProgress)
        );
    }

    #[test]
    fn leaked_frame_stays_open_until_aborted() {
        let mut pool = ResourcePool::new(MemoryBudget::from_mib(1));
        pool.begin_frame(Extent::new(16, 16)).unwrap();
        let a = pool.allocate(hdr("a", 16, 16)).unwrap();

        assert_eq!(pool.end_frame(), Err(PoolError::Leaked(vec![a.id])));
        assert!(pool.in_frame());
        assert_eq!(pool.abort_frame(), 1);
        assert_eq!(pool.allocator().in_use(), 0);
        assert!(pool.begin_frame(Extent::new(16, 16)).is_ok());
    }

    #[test]
    fn ids_are_never_reused_across_frames() {
        let mut pool = ResourcePool::<Unbounded>::default();
        pool.begin_frame(Extent::new(8, 8)).unwrap();
        let first = pool.allocate(hdr("a", 8, 8)).unwrap();
        pool.release(&first).unwrap();
        pool.end_frame().unwrap();

        pool.begin_frame(Extent::new(8, 8)).unwrap();
        let second = pool.allocate(hdr("a", 8, 8)).unwrap();
        assert_ne!(first, second);
        assert_eq!(pool.release(&first), Err(PoolError::NotLive(first.id)));
    }

    #[test]
    fn memory_budget_rejects_oversized_requests() {
        let mut pool = ResourcePool::new(MemoryBudget::new(64 * 64 * 8));
        pool.begin_frame(Extent::new(64, 64)).unwrap();
        let a = pool.allocate(hdr("a", 64, 64)).unwrap();
        let err = pool
            .allocate(TargetDesc::new("b", TargetSize::Camera).format(TargetFormat::Camera))
            .unwrap_err();
        assert!(matches!(
            err,
            PoolError::Allocation {
                label: "b",
                source: AllocError::BudgetExceeded { available: 0, .. }
            }
        ));
        assert_eq!(pool.live_count(), 1);
        pool.release(&a).unwrap();
        assert_eq!(pool.allocator().in_use(), 0);
        assert_eq!(pool.allocator().peak(), 64 * 64 * 8);
    }
}
