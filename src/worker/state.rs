//! State machine worker
//!
//! `Idle -> Acquiring -> InCriticalSection -> Releasing -> Idle`, diulang
//! sejumlah iterasi tetap, lalu `Terminated` (atau `Failed` kalau primitive
//! sinkronisasi gagal).

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use tracing::trace;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle = 0,
    Acquiring = 1,
    InCriticalSection = 2,
    Releasing = 3,
    Terminated = 4,
    Failed = 5,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Idle,
            1 => WorkerState::Acquiring,
            2 => WorkerState::InCriticalSection,
            3 => WorkerState::Releasing,
            4 => WorkerState::Terminated,
            _ => WorkerState::Failed,
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, WorkerState::Terminated | WorkerState::Failed)
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// State yang bisa dibaca dari luar thread worker (supervisor, test)
#[derive(Debug)]
pub struct StateCell {
    state: AtomicU8,
}

impl Default for StateCell {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Idle as u8),
        }
    }
}

impl StateCell {
    pub fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, worker: &str, next: WorkerState) {
        let prev = self.state.swap(next as u8, Ordering::AcqRel);
        trace!(worker, from = %WorkerState::from_u8(prev), to = %next, "state");
    }
}
