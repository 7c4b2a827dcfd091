//! semring - bounded buffer producer/consumer di atas shared region dan
//! semaphore set dengan operasi grouped
//!
//! Arsitektur:
//! - `core`: circular buffer + shared region (memmap2)
//! - `sync`: semaphore set (in-process / System V) + protocol dual acquire/release
//! - `worker`: producer dan consumer
//! - `runner`: bootstrap, supervisi, teardown

pub mod config;
pub mod core;
pub mod error;
pub mod runner;
pub mod sync;
pub mod trace;
pub mod worker;

pub use config::{Backend, IdleRange, RunConfig};
pub use error::{Error, Result, SetupError, SyncError};
pub use runner::{run, run_with_observer, RunReport};
