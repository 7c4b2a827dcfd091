//! Sync module: semaphore set + protocol dual acquire/release
//!
//! Backend:
//! - `LocalSemaphores`: Mutex + Condvar, in-process
//! - `SysvSemaphores`: System V semaphore set, grouped `semop` (Linux)
//! - `FaultySemaphores`: wrapper untuk fault injection

mod fault;
mod protocol;
mod semaphore;
#[cfg(target_os = "linux")]
mod sysv;

pub use fault::{FaultOp, FaultPlan, FaultySemaphores};
pub use protocol::{BoundedBuffer, CriticalProbe, CriticalSection, ExitPolicy, Side};
pub use semaphore::{LocalSemaphores, Resource, ResourceValues, SemaphoreSet};
#[cfg(target_os = "linux")]
pub use sysv::{SysvSemaphores, SEMVMX};
