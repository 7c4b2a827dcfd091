//! Error taxonomy
//!
//! - `SetupError`: gagal membuat region / semaphore set, fatal sebelum worker jalan
//! - `SyncError`: operasi primitive acquire/release gagal, fatal untuk worker itu

use std::io;

use thiserror::Error;

use crate::sync::Resource;

/// ResourceSetupFailure
#[derive(Error, Debug)]
pub enum SetupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("capacity must be between 1 and {max} slots (got {got})")]
    InvalidCapacity { got: usize, max: usize },

    #[error("shared region mapping failed: {0}")]
    RegionMap(#[source] io::Error),

    #[error("semaphore set creation failed: {0}")]
    SemaphoreCreate(#[source] io::Error),

    #[error("semaphore set initialization failed: {0}")]
    SemaphoreInit(#[source] io::Error),

    #[error("failed to spawn worker {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
}

/// SynchronizationOperationFailure
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("{op} on {resources:?} failed: {source}")]
    Os {
        op: &'static str,
        resources: Vec<Resource>,
        #[source]
        source: io::Error,
    },

    #[error("semaphore state lock poisoned during {op}")]
    Poisoned { op: &'static str },

    #[error("semaphore set was removed during {op}")]
    Removed { op: &'static str },

    #[error("injected failure on {op} call #{call} ({resources:?})")]
    Injected {
        op: &'static str,
        call: usize,
        resources: Vec<Resource>,
    },
}

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error("worker {worker} aborted: {source}")]
    Worker {
        worker: String,
        #[source]
        source: SyncError,
    },

    #[error("worker {0} panicked")]
    Panicked(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
