//! Semaphore set dengan operasi grouped (semua-atau-tidak-sama-sekali)
//!
//! Setiap backend menyimpan tiga resource `[Mutex, FreeSlots, FilledSlots]`
//! dengan nilai awal `[1, N, 0]`. `acquire` mengurangi semua resource yang
//! diminta dalam satu langkah atomik, atau blok sampai semuanya bisa.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard};

use tracing::trace;

use crate::error::{SetupError, SyncError};

/// Index resource di dalam set, urutan sama dengan layout semaphore set
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Mutex = 0,
    FreeSlots = 1,
    FilledSlots = 2,
}

impl Resource {
    pub const ALL: [Resource; 3] = [Resource::Mutex, Resource::FreeSlots, Resource::FilledSlots];

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Resource::Mutex => "mutex",
            Resource::FreeSlots => "free",
            Resource::FilledSlots => "filled",
        })
    }
}

/// Nilai ketiga resource pada satu titik waktu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceValues {
    pub mutex: u32,
    pub free_slots: u32,
    pub filled_slots: u32,
}

impl ResourceValues {
    /// Nilai awal untuk buffer berkapasitas `capacity`
    pub const fn initial(capacity: u32) -> Self {
        Self {
            mutex: 1,
            free_slots: capacity,
            filled_slots: 0,
        }
    }

    pub fn as_array(&self) -> [u32; 3] {
        [self.mutex, self.free_slots, self.filled_slots]
    }

    pub fn from_array(values: [u32; 3]) -> Self {
        Self {
            mutex: values[0],
            free_slots: values[1],
            filled_slots: values[2],
        }
    }
}

/// Grouped semaphore set.
///
/// `acquire` harus atomik untuk seluruh slice: caller tidak pernah memegang
/// sebagian resource sambil menunggu sisanya. `release` tidak pernah blok.
pub trait SemaphoreSet: Send + Sync {
    fn acquire(&self, resources: &[Resource]) -> Result<(), SyncError>;

    fn release(&self, resources: &[Resource]) -> Result<(), SyncError>;

    fn values(&self) -> Result<ResourceValues, SyncError>;

    /// Nama backend untuk log
    fn backend(&self) -> &'static str;

    /// Hapus set sekarang, walaupun masih ada yang memegang referensi.
    /// Waiter yang sedang blok bangun dengan `SyncError::Removed`, dan
    /// acquire/release berikutnya juga gagal.
    fn teardown(&self) -> Result<(), SyncError> {
        Ok(())
    }
}

/// Jumlah unit yang diminta per resource (resource boleh muncul lebih dari sekali)
fn demand(resources: &[Resource]) -> [u32; 3] {
    let mut need = [0u32; 3];
    for r in resources {
        need[r.index()] += 1;
    }
    need
}

/// Backend in-process: satu lock menjaga ketiga counter, satu condvar untuk
/// semua waiter. Predikat waiter ("semua counter cukup") dievaluasi di bawah
/// lock, jadi acquire tetap semua-atau-tidak.
pub struct LocalSemaphores {
    counters: Mutex<[u32; 3]>,
    // notify_all karena waiter producer dan consumer menunggu predikat berbeda
    changed: Condvar,
    // Hanya diubah sambil memegang `counters`
    removed: AtomicBool,
}

impl LocalSemaphores {
    pub fn new(capacity: usize) -> Result<Self, SetupError> {
        let capacity = u32::try_from(capacity).map_err(|_| SetupError::InvalidCapacity {
            got: capacity,
            max: u32::MAX as usize,
        })?;

        Ok(Self::with_values(ResourceValues::initial(capacity)))
    }

    pub fn with_values(values: ResourceValues) -> Self {
        Self {
            counters: Mutex::new(values.as_array()),
            changed: Condvar::new(),
            removed: AtomicBool::new(false),
        }
    }

    fn lock(&self, op: &'static str) -> Result<MutexGuard<'_, [u32; 3]>, SyncError> {
        self.counters.lock().map_err(|_| SyncError::Poisoned { op })
    }

    fn check_live(&self, op: &'static str) -> Result<(), SyncError> {
        if self.removed.load(Ordering::Acquire) {
            return Err(SyncError::Removed { op });
        }
        Ok(())
    }
}

impl SemaphoreSet for LocalSemaphores {
    fn acquire(&self, resources: &[Resource]) -> Result<(), SyncError> {
        let need = demand(resources);
        let mut counters = self.lock("acquire")?;
        self.check_live("acquire")?;

        while counters.iter().zip(need.iter()).any(|(have, want)| have < want) {
            trace!(?resources, ?counters, "acquire blocked");
            counters = self
                .changed
                .wait(counters)
                .map_err(|_| SyncError::Poisoned { op: "acquire" })?;
            self.check_live("acquire")?;
        }

        for (have, want) in counters.iter_mut().zip(need.iter()) {
            *have -= want;
        }
        Ok(())
    }

    fn release(&self, resources: &[Resource]) -> Result<(), SyncError> {
        let need = demand(resources);
        let mut counters = self.lock("release")?;
        self.check_live("release")?;

        for (have, give) in counters.iter_mut().zip(need.iter()) {
            *have = have.saturating_add(*give);
        }
        drop(counters);

        self.changed.notify_all();
        Ok(())
    }

    fn values(&self) -> Result<ResourceValues, SyncError> {
        let counters = self.lock("values")?;
        Ok(ResourceValues::from_array(*counters))
    }

    fn backend(&self) -> &'static str {
        "local"
    }

    fn teardown(&self) -> Result<(), SyncError> {
        let counters = self.lock("teardown")?;
        self.removed.store(true, Ordering::Release);
        drop(counters);

        self.changed.notify_all();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_initial_values() {
        let sems = LocalSemaphores::new(5).unwrap();
        assert_eq!(sems.values().unwrap(), ResourceValues::initial(5));
        assert_eq!(sems.values().unwrap().as_array(), [1, 5, 0]);
    }

    #[test]
    fn test_grouped_acquire_release() {
        let sems = LocalSemaphores::new(2).unwrap();

        sems.acquire(&[Resource::FreeSlots, Resource::Mutex]).unwrap();
        assert_eq!(sems.values().unwrap().as_array(), [0, 1, 0]);

        sems.release(&[Resource::Mutex, Resource::FilledSlots]).unwrap();
        assert_eq!(sems.values().unwrap().as_array(), [1, 1, 1]);
    }

    #[test]
    fn test_acquire_is_all_or_nothing() {
        // filled = 0: consumer harus blok TANPA mengambil mutex
        let sems = Arc::new(LocalSemaphores::new(3).unwrap());
        let done = Arc::new(AtomicBool::new(false));

        let waiter = {
            let sems = Arc::clone(&sems);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                sems.acquire(&[Resource::FilledSlots, Resource::Mutex]).unwrap();
                done.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!done.load(Ordering::SeqCst));
        assert_eq!(sems.values().unwrap().mutex, 1);

        // Mutex masih bisa diambil pihak lain selama consumer menunggu
        sems.acquire(&[Resource::FreeSlots, Resource::Mutex]).unwrap();
        sems.release(&[Resource::Mutex, Resource::FilledSlots]).unwrap();

        waiter.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(sems.values().unwrap().as_array(), [0, 2, 0]);
    }

    #[test]
    fn test_duplicate_resource_demand() {
        let sems = LocalSemaphores::new(3).unwrap();
        sems.acquire(&[Resource::FreeSlots, Resource::FreeSlots]).unwrap();
        assert_eq!(sems.values().unwrap().free_slots, 1);
    }

    #[test]
    fn test_teardown_wakes_blocked_waiter() {
        let sems = Arc::new(LocalSemaphores::new(2).unwrap());

        let waiter = {
            let sems = Arc::clone(&sems);
            thread::spawn(move || sems.acquire(&[Resource::FilledSlots, Resource::Mutex]))
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!waiter.is_finished());

        sems.teardown().unwrap();
        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(SyncError::Removed { op: "acquire" })));

        assert!(matches!(
            sems.release(&[Resource::Mutex]),
            Err(SyncError::Removed { .. })
        ));
    }
}
