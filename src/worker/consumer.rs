//! Consumer worker (tepat satu per run)
//!
//! Setiap iterasi: dual acquire (FilledSlots, Mutex) -> remove ->
//! dual release (Mutex, FreeSlots) -> catat item -> idle acak.
//! Berhenti setelah `total` item = jumlah output semua producer.

use std::sync::Arc;
use std::thread;

use tracing::{debug, error, info};

use super::observer::{BufferObserver, TracingObserver};
use super::rng::ItemRng;
use super::state::{StateCell, WorkerState};
use crate::config::IdleRange;
use crate::core::Item;
use crate::error::SyncError;
use crate::sync::{BoundedBuffer, SemaphoreSet, Side};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerReport {
    /// Item dalam urutan remove
    pub consumed: Vec<Item>,
}

pub struct ConsumerWorker<S> {
    name: String,
    buffer: Arc<BoundedBuffer<S>>,
    total: usize,
    idle: IdleRange,
    rng: ItemRng,
    observer: Arc<dyn BufferObserver>,
    status: Arc<StateCell>,
}

impl<S: SemaphoreSet> ConsumerWorker<S> {
    pub fn new(buffer: Arc<BoundedBuffer<S>>, total: usize) -> Self {
        Self {
            name: "consumer".to_string(),
            buffer,
            total,
            idle: IdleRange::ZERO,
            rng: ItemRng::new(0),
            observer: Arc::new(TracingObserver),
            status: Arc::new(StateCell::default()),
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.rng = ItemRng::new(seed);
        self
    }

    pub fn idle(mut self, idle: IdleRange) -> Self {
        self.idle = idle;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn BufferObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> Arc<StateCell> {
        Arc::clone(&self.status)
    }

    pub fn run(mut self) -> Result<ConsumerReport, SyncError> {
        let mut consumed = Vec::new();

        match self.consume_all(&mut consumed) {
            Ok(()) => {
                self.status.set(&self.name, WorkerState::Terminated);
                info!(worker = %self.name, items = consumed.len(), "finished consuming");
                Ok(ConsumerReport { consumed })
            }
            Err(e) => {
                self.status.set(&self.name, WorkerState::Failed);
                error!(
                    worker = %self.name,
                    consumed = consumed.len(),
                    error = %e,
                    "synchronization failure, consumer aborting"
                );
                Err(e)
            }
        }
    }

    fn consume_all(&mut self, consumed: &mut Vec<Item>) -> Result<(), SyncError> {
        for _ in 0..self.total {
            debug!(worker = %self.name, "waiting to consume");

            self.status.set(&self.name, WorkerState::Acquiring);
            let mut cs = self.buffer.enter(Side::Consume)?;

            self.status.set(&self.name, WorkerState::InCriticalSection);
            let item = cs.remove();
            self.observer.on_remove(&self.name, item, &cs.snapshot());

            self.status.set(&self.name, WorkerState::Releasing);
            cs.leave()?;

            consumed.push(item);
            debug!(worker = %self.name, item, "consumed item");

            self.status.set(&self.name, WorkerState::Idle);
            let pause = self.rng.idle(&self.idle);
            if !pause.is_zero() {
                thread::sleep(pause);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SharedRegion;
    use crate::sync::{
        ExitPolicy, FaultOp, FaultPlan, FaultySemaphores, LocalSemaphores, Resource,
    };

    #[test]
    fn test_consumer_drains_in_fifo_order() {
        let buffer = Arc::new(BoundedBuffer::new(
            SharedRegion::create(5).unwrap(),
            LocalSemaphores::new(5).unwrap(),
            ExitPolicy::Abandon,
        ));
        for item in [104, 101, 103] {
            buffer.produce(item).unwrap();
        }

        let worker = ConsumerWorker::new(Arc::clone(&buffer), 3);
        let status = worker.status();
        let report = worker.run().unwrap();

        assert_eq!(report.consumed, vec![104, 101, 103]);
        assert_eq!(status.get(), WorkerState::Terminated);
        assert!(buffer.snapshot().unwrap().is_drained());
        assert_eq!(buffer.values().unwrap().as_array(), [1, 5, 0]);
    }

    #[test]
    fn test_huge_total_does_not_preallocate() {
        let buffer = Arc::new(BoundedBuffer::new(
            SharedRegion::create(5).unwrap(),
            FaultySemaphores::new(
                LocalSemaphores::new(5).unwrap(),
                FaultPlan {
                    op: FaultOp::Acquire,
                    resources: Some(vec![Resource::FilledSlots, Resource::Mutex]),
                    on_call: 2,
                },
            ),
            ExitPolicy::Abandon,
        ));
        buffer.produce(250).unwrap();

        let worker = ConsumerWorker::new(Arc::clone(&buffer), usize::MAX / 2);
        let status = worker.status();
        let err = worker.run().unwrap_err();

        assert!(matches!(err, SyncError::Injected { call: 2, .. }));
        assert_eq!(status.get(), WorkerState::Failed);
        assert!(buffer.snapshot().unwrap().is_drained());
    }
}
