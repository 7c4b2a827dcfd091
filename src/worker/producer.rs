//! Producer worker
//!
//! Setiap iterasi: generate item -> dual acquire (FreeSlots, Mutex) ->
//! insert -> dual release (Mutex, FilledSlots) -> idle acak.

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

/// Hasil producer yang selesai normal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerReport {
    pub id: usize,
    pub produced: Vec<Item>,
}

pub struct ProducerWorker<S> {
    id: usize,
    name: String,
    buffer: Arc<BoundedBuffer<S>>,
    items: usize,
    idle: IdleRange,
    rng: ItemRng,
    observer: Arc<dyn BufferObserver>,
    status: Arc<StateCell>,
}

impl<S: SemaphoreSet> ProducerWorker<S> {
    /// Producer dengan id 1-based, menghasilkan `items` item
    pub fn new(id: usize, buffer: Arc<BoundedBuffer<S>>, items: usize) -> Self {
        Self {
            id,
            name: format!("producer-{}", id),
            buffer,
            items,
            idle: IdleRange::ZERO,
            rng: ItemRng::new(id as u64),
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

    /// Handle state yang bisa dibaca thread lain
    pub fn status(&self) -> Arc<StateCell> {
        Arc::clone(&self.status)
    }

    /// Jalankan semua iterasi. Error sinkronisasi langsung menghentikan
    /// worker (tidak ada retry).
    pub fn run(mut self) -> Result<ProducerReport, SyncError> {
        let mut produced = Vec::new();

        match self.produce_all(&mut produced) {
            Ok(()) => {
                self.status.set(&self.name, WorkerState::Terminated);
                info!(worker = %self.name, items = produced.len(), "finished producing");
                Ok(ProducerReport {
                    id: self.id,
                    produced,
                })
            }
            Err(e) => {
                self.status.set(&self.name, WorkerState::Failed);
                error!(
                    worker = %self.name,
                    produced = produced.len(),
                    error = %e,
                    "synchronization failure, producer aborting"
                );
                Err(e)
            }
        }
    }

    fn produce_all(&mut self, produced: &mut Vec<Item>) -> Result<(), SyncError> {
        for _ in 0..self.items {
            let item = self.rng.item();
            debug!(worker = %self.name, item, "producing item");

            self.status.set(&self.name, WorkerState::Acquiring);
            let mut cs = self.buffer.enter(Side::Produce)?;

            self.status.set(&self.name, WorkerState::InCriticalSection);
            cs.insert(item);
            self.observer.on_insert(&self.name, item, &cs.snapshot());
            produced.push(item);

            self.status.set(&self.name, WorkerState::Releasing);
            cs.leave()?;

            self.status.set(&self.name, WorkerState::Idle);
            let pause = self.rng.idle(&self.idle);
            if !pause.is_zero() {
                thread::sleep(pause);
            }
        }
        Ok(())
    }
}
