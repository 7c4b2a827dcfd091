//! Fault injection untuk semaphore set
//!
//! Membungkus backend apa pun dan menggagalkan SATU panggilan tertentu
//! (misalnya release ke-3 untuk pasangan `[Mutex, FilledSlots]`). Dipakai
//! untuk mendemonstrasikan apa yang terjadi kalau worker mati sambil
//! memegang mutex.

use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::warn;

use super::semaphore::{Resource, ResourceValues, SemaphoreSet};
use crate::error::SyncError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultOp {
    Acquire,
    Release,
}

impl FaultOp {
    fn name(self) -> &'static str {
        match self {
            FaultOp::Acquire => "acquire",
            FaultOp::Release => "release",
        }
    }
}

/// Panggilan mana yang digagalkan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultPlan {
    pub op: FaultOp,
    /// Hanya panggilan dengan resource persis ini yang dihitung; `None` = semua
    pub resources: Option<Vec<Resource>>,
    /// Panggilan ke-berapa (1-based) yang gagal
    pub on_call: usize,
}

impl FaultPlan {
    /// Gagalkan release producer ke-`n` (`[Mutex, FilledSlots]`)
    pub fn producer_release(n: usize) -> Self {
        Self {
            op: FaultOp::Release,
            resources: Some(vec![Resource::Mutex, Resource::FilledSlots]),
            on_call: n,
        }
    }

    /// Gagalkan release consumer ke-`n` (`[Mutex, FreeSlots]`)
    pub fn consumer_release(n: usize) -> Self {
        Self {
            op: FaultOp::Release,
            resources: Some(vec![Resource::Mutex, Resource::FreeSlots]),
            on_call: n,
        }
    }

    fn matches(&self, op: FaultOp, resources: &[Resource]) -> bool {
        self.op == op
            && self
                .resources
                .as_deref()
                .map_or(true, |wanted| wanted == resources)
    }
}

pub struct FaultySemaphores<S> {
    inner: S,
    plan: FaultPlan,
    calls: AtomicUsize,
}

impl<S: SemaphoreSet> FaultySemaphores<S> {
    pub fn new(inner: S, plan: FaultPlan) -> Self {
        Self {
            inner,
            plan,
            calls: AtomicUsize::new(0),
        }
    }

    /// Apakah fault sudah terpicu
    pub fn fired(&self) -> bool {
        self.calls.load(Ordering::Acquire) >= self.plan.on_call
    }

    fn check(&self, op: FaultOp, resources: &[Resource]) -> Result<(), SyncError> {
        if !self.plan.matches(op, resources) {
            return Ok(());
        }

        let call = self.calls.fetch_add(1, Ordering::AcqRel) + 1;
        if call == self.plan.on_call {
            warn!(op = op.name(), call, ?resources, "injecting semaphore failure");
            return Err(SyncError::Injected {
                op: op.name(),
                call,
                resources: resources.to_vec(),
            });
        }
        Ok(())
    }
}

impl<S: SemaphoreSet> SemaphoreSet for FaultySemaphores<S> {
    fn acquire(&self, resources: &[Resource]) -> Result<(), SyncError> {
        self.check(FaultOp::Acquire, resources)?;
        self.inner.acquire(resources)
    }

    fn release(&self, resources: &[Resource]) -> Result<(), SyncError> {
        self.check(FaultOp::Release, resources)?;
        self.inner.release(resources)
    }

    fn values(&self) -> Result<ResourceValues, SyncError> {
        self.inner.values()
    }

    fn backend(&self) -> &'static str {
        self.inner.backend()
    }

    fn teardown(&self) -> Result<(), SyncError> {
        self.inner.teardown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::LocalSemaphores;

    #[test]
    fn test_fails_only_the_planned_call() {
        let sems = FaultySemaphores::new(
            LocalSemaphores::new(5).unwrap(),
            FaultPlan::producer_release(2),
        );
        let produce = [Resource::FreeSlots, Resource::Mutex];
        let signal = [Resource::Mutex, Resource::FilledSlots];

        sems.acquire(&produce).unwrap();
        sems.release(&signal).unwrap();
        assert!(!sems.fired());

        sems.acquire(&produce).unwrap();
        let err = sems.release(&signal).unwrap_err();
        assert!(matches!(err, SyncError::Injected { call: 2, .. }));
        assert!(sems.fired());

        // Release yang gagal tidak diteruskan: mutex masih dipegang
        assert_eq!(sems.values().unwrap().as_array(), [0, 3, 1]);

        // Panggilan berikutnya normal lagi
        sems.release(&signal).unwrap();
        assert_eq!(sems.values().unwrap().as_array(), [1, 3, 2]);
    }

    #[test]
    fn test_other_pairs_are_not_counted() {
        let sems = FaultySemaphores::new(
            LocalSemaphores::new(5).unwrap(),
            FaultPlan::producer_release(1),
        );

        sems.release(&[Resource::Mutex, Resource::FreeSlots]).unwrap();
        assert!(!sems.fired());
    }

    #[test]
    fn test_failed_acquire_takes_nothing() {
        let sems = FaultySemaphores::new(
            LocalSemaphores::new(5).unwrap(),
            FaultPlan {
                op: FaultOp::Acquire,
                resources: None,
                on_call: 1,
            },
        );

        assert!(sems.acquire(&[Resource::FreeSlots, Resource::Mutex]).is_err());
        assert_eq!(sems.values().unwrap().as_array(), [1, 5, 0]);
    }
}
