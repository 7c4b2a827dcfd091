//! Dual acquire / dual release protocol
//!
//! Producer: `acquire(FreeSlots, Mutex)` -> insert -> `release(Mutex, FilledSlots)`
//! Consumer: `acquire(FilledSlots, Mutex)` -> remove -> `release(Mutex, FreeSlots)`
//!
//! Counting resource dan mutex selalu diambil dalam SATU operasi grouped,
//! jadi worker tidak pernah memegang slot sambil menunggu lock (atau
//! sebaliknya). Critical section direpresentasikan oleh `CriticalSection`:
//! hanya guard ini yang bisa menyentuh buffer di shared region.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tracing::{error, warn};

use super::semaphore::{Resource, ResourceValues, SemaphoreSet};
use crate::core::{BufferSnapshot, Item, SharedRegion};
use crate::error::SyncError;

/// Apa yang terjadi pada resource yang sedang dipegang kalau worker keluar
/// dari critical section tanpa release yang sukses (error atau panic).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExitPolicy {
    /// Resource ditinggal apa adanya. Kalau mutex sedang dipegang, semua
    /// worker lain blok selamanya.
    #[default]
    Abandon,
    /// Resource dikembalikan di setiap exit path. Kalau buffer sudah diubah,
    /// pasangan penyelesai (`Mutex` + counting resource lawan) yang dirilis;
    /// kalau belum, pasangan yang tadi diambil dikembalikan.
    ReleaseOnExit,
}

/// Sisi protocol yang dijalankan sebuah worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Produce,
    Consume,
}

impl Side {
    /// Pasangan untuk dual acquire
    pub const fn acquire_pair(self) -> [Resource; 2] {
        match self {
            Side::Produce => [Resource::FreeSlots, Resource::Mutex],
            Side::Consume => [Resource::FilledSlots, Resource::Mutex],
        }
    }

    /// Pasangan untuk dual release setelah operasi buffer
    pub const fn release_pair(self) -> [Resource; 2] {
        match self {
            Side::Produce => [Resource::Mutex, Resource::FilledSlots],
            Side::Consume => [Resource::Mutex, Resource::FreeSlots],
        }
    }

    /// Pasangan untuk mengembalikan acquire yang belum dipakai
    const fn rollback_pair(self) -> [Resource; 2] {
        let [counter, mutex] = self.acquire_pair();
        [mutex, counter]
    }
}

/// Instrumentasi critical section: berapa worker di dalam sekarang, dan
/// puncaknya selama run. Puncak > 1 berarti mutual exclusion bocor.
#[derive(Debug, Default)]
pub struct CriticalProbe {
    active: AtomicUsize,
    peak: AtomicUsize,
    entries: AtomicU64,
}

impl CriticalProbe {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        self.entries.fetch_add(1, Ordering::Relaxed);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Acquire)
    }

    pub fn entries(&self) -> u64 {
        self.entries.load(Ordering::Relaxed)
    }
}

/// Shared region + semaphore set + policy. Dibagikan ke worker lewat `Arc`.
pub struct BoundedBuffer<S> {
    region: SharedRegion,
    sems: S,
    policy: ExitPolicy,
    probe: CriticalProbe,
}

impl<S: SemaphoreSet> BoundedBuffer<S> {
    /// `sems` harus sudah diinisialisasi ke `[1, capacity, 0]` dan region
    /// sudah di-`init()`.
    pub fn new(region: SharedRegion, sems: S, policy: ExitPolicy) -> Self {
        Self {
            region,
            sems,
            policy,
            probe: CriticalProbe::default(),
        }
    }

    #[inline]
    pub fn dual_acquire(&self, a: Resource, b: Resource) -> Result<(), SyncError> {
        self.sems.acquire(&[a, b])
    }

    #[inline]
    pub fn dual_release(&self, a: Resource, b: Resource) -> Result<(), SyncError> {
        self.sems.release(&[a, b])
    }

    /// Blok sampai counting resource untuk `side` DAN mutex tersedia, lalu
    /// kembalikan guard critical section.
    pub fn enter(&self, side: Side) -> Result<CriticalSection<'_, S>, SyncError> {
        let [a, b] = side.acquire_pair();
        self.dual_acquire(a, b)?;
        self.probe.enter();

        Ok(CriticalSection {
            owner: self,
            side,
            mutated: false,
            inside: true,
            released: false,
        })
    }

    /// Satu putaran producer lengkap. Returns snapshot setelah insert.
    pub fn produce(&self, item: Item) -> Result<BufferSnapshot, SyncError> {
        let mut cs = self.enter(Side::Produce)?;
        cs.insert(item);
        let snapshot = cs.snapshot();
        cs.leave()?;
        Ok(snapshot)
    }

    /// Satu putaran consumer lengkap.
    pub fn consume(&self) -> Result<(Item, BufferSnapshot), SyncError> {
        let mut cs = self.enter(Side::Consume)?;
        let item = cs.remove();
        let snapshot = cs.snapshot();
        cs.leave()?;
        Ok((item, snapshot))
    }

    /// Snapshot di bawah mutex saja (tanpa counting resource).
    /// Blok selamanya kalau mutex ditinggal worker yang mati.
    pub fn snapshot(&self) -> Result<BufferSnapshot, SyncError> {
        self.sems.acquire(&[Resource::Mutex])?;
        // SAFETY: mutex dipegang
        let snapshot = unsafe { self.region.buffer() }.snapshot();
        self.sems.release(&[Resource::Mutex])?;
        Ok(snapshot)
    }

    pub fn values(&self) -> Result<ResourceValues, SyncError> {
        self.sems.values()
    }

    pub fn capacity(&self) -> usize {
        self.region.capacity()
    }

    pub fn probe(&self) -> &CriticalProbe {
        &self.probe
    }

    /// Hapus semaphore set sebelum referensi terakhir di-drop. Worker yang
    /// masih blok bangun dengan `SyncError::Removed`.
    pub fn teardown(&self) -> Result<(), SyncError> {
        self.sems.teardown()
    }
}

/// Guard critical section. Memegang `Mutex` + satu counting resource.
///
/// Tutup dengan `leave()`. Kalau guard di-drop tanpa `leave()` yang sukses,
/// `ExitPolicy` milik buffer yang menentukan nasib resource.
pub struct CriticalSection<'a, S: SemaphoreSet> {
    owner: &'a BoundedBuffer<S>,
    side: Side,
    mutated: bool,
    inside: bool,
    released: bool,
}

impl<'a, S: SemaphoreSet> CriticalSection<'a, S> {
    /// Insert ke buffer. Slot kosong dijamin oleh `FreeSlots` yang dipegang.
    pub fn insert(&mut self, item: Item) {
        debug_assert_eq!(self.side, Side::Produce, "insert outside produce section");
        // SAFETY: guard hidup = mutex dipegang
        unsafe { self.owner.region.buffer() }.insert(item);
        self.mutated = true;
    }

    /// Remove dari buffer. Item tersedia dijamin oleh `FilledSlots`.
    pub fn remove(&mut self) -> Item {
        debug_assert_eq!(self.side, Side::Consume, "remove outside consume section");
        // SAFETY: guard hidup = mutex dipegang
        let item = unsafe { self.owner.region.buffer() }.remove();
        self.mutated = true;
        item
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        // SAFETY: guard hidup = mutex dipegang
        unsafe { self.owner.region.buffer() }.snapshot()
    }

    /// Dual release. Kalau release gagal, error dikembalikan dan guard
    /// di-drop dengan resource masih dipegang (lihat `ExitPolicy`).
    pub fn leave(mut self) -> Result<(), SyncError> {
        let [a, b] = self.side.release_pair();

        self.inside = false;
        self.owner.probe.exit();

        self.owner.dual_release(a, b)?;
        self.released = true;
        Ok(())
    }
}

impl<'a, S: SemaphoreSet> Drop for CriticalSection<'a, S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if self.inside {
            self.owner.probe.exit();
        }

        match self.owner.policy {
            ExitPolicy::Abandon => {
                warn!(
                    side = ?self.side,
                    mutated = self.mutated,
                    "critical section abandoned with mutex held"
                );
            }
            ExitPolicy::ReleaseOnExit => {
                let [a, b] = if self.mutated {
                    self.side.release_pair()
                } else {
                    self.side.rollback_pair()
                };
                if let Err(e) = self.owner.dual_release(a, b) {
                    error!(side = ?self.side, error = %e, "release on exit failed");
                } else {
                    warn!(
                        side = ?self.side,
                        mutated = self.mutated,
                        "critical section released on exit"
                    );
                }
            }
        }
    }
}
