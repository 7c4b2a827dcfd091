//! Observer operasi buffer
//!
//! Dipanggil oleh worker DI DALAM critical section setelah insert/remove,
//! jadi urutan event yang diterima observer = urutan operasi pada buffer.

use std::sync::Mutex;

use tracing::info;

use crate::core::{BufferSnapshot, Item};

pub trait BufferObserver: Send + Sync {
    fn on_insert(&self, worker: &str, item: Item, snapshot: &BufferSnapshot);

    fn on_remove(&self, worker: &str, item: Item, snapshot: &BufferSnapshot);
}

/// Default: tulis isi buffer ke log setiap operasi
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl BufferObserver for TracingObserver {
    fn on_insert(&self, worker: &str, item: Item, snapshot: &BufferSnapshot) {
        info!(worker, item, buffer = %snapshot, "inserted item");
    }

    fn on_remove(&self, worker: &str, item: Item, snapshot: &BufferSnapshot) {
        info!(worker, item, buffer = %snapshot, "removed item");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferOp {
    Insert,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferEvent {
    pub worker: String,
    pub op: BufferOp,
    pub item: Item,
    pub count: usize,
}

/// Merekam semua event, untuk verifikasi FIFO / konservasi
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<BufferEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, worker: &str, op: BufferOp, item: Item, snapshot: &BufferSnapshot) {
        let event = BufferEvent {
            worker: worker.to_string(),
            op,
            item,
            count: snapshot.count,
        };
        // Observer tidak boleh menjatuhkan worker; lock poisoned tetap dipakai
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        events.push(event);
    }

    pub fn events(&self) -> Vec<BufferEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Item dalam urutan insert global
    pub fn inserted(&self) -> Vec<Item> {
        self.filter(BufferOp::Insert)
    }

    /// Item dalam urutan remove
    pub fn removed(&self) -> Vec<Item> {
        self.filter(BufferOp::Remove)
    }

    fn filter(&self, op: BufferOp) -> Vec<Item> {
        self.events()
            .into_iter()
            .filter(|e| e.op == op)
            .map(|e| e.item)
            .collect()
    }
}

impl BufferObserver for RecordingObserver {
    fn on_insert(&self, worker: &str, item: Item, snapshot: &BufferSnapshot) {
        self.push(worker, BufferOp::Insert, item, snapshot);
    }

    fn on_remove(&self, worker: &str, item: Item, snapshot: &BufferSnapshot) {
        self.push(worker, BufferOp::Remove, item, snapshot);
    }
}
