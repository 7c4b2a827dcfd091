//! System V semaphore set backend (Linux)
//!
//! Satu set berisi tiga semaphore. Grouped acquire/release = satu panggilan
//! `semop` dengan beberapa `sembuf`, yang dieksekusi kernel secara atomik.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use super::semaphore::{Resource, ResourceValues, SemaphoreSet};
use crate::error::{SetupError, SyncError};

/// Nilai maksimum satu semaphore di Linux
pub const SEMVMX: usize = 32767;

const NSEMS: libc::c_int = 3;

pub struct SysvSemaphores {
    id: libc::c_int,
    removed: AtomicBool,
}

impl SysvSemaphores {
    /// Membuat set private baru dan SETALL ke `[1, capacity, 0]`
    pub fn new(capacity: usize) -> Result<Self, SetupError> {
        if capacity == 0 || capacity > SEMVMX {
            return Err(SetupError::InvalidCapacity {
                got: capacity,
                max: SEMVMX,
            });
        }

        // SAFETY: semget tidak menyentuh memori user
        let id = unsafe { libc::semget(libc::IPC_PRIVATE, NSEMS, libc::IPC_CREAT | 0o600) };
        if id == -1 {
            return Err(SetupError::SemaphoreCreate(io::Error::last_os_error()));
        }

        // Dari sini Drop yang akan IPC_RMID kalau init gagal
        let set = Self {
            id,
            removed: AtomicBool::new(false),
        };

        let initial = ResourceValues::initial(capacity as u32).as_array();
        let mut values: [libc::c_ushort; 3] = [
            initial[0] as libc::c_ushort,
            initial[1] as libc::c_ushort,
            initial[2] as libc::c_ushort,
        ];

        // SAFETY: SETALL membaca NSEMS c_ushort dari pointer yang valid
        let rc = unsafe { libc::semctl(set.id, 0, libc::SETALL, values.as_mut_ptr()) };
        if rc == -1 {
            return Err(SetupError::SemaphoreInit(io::Error::last_os_error()));
        }

        debug!(sem_id = set.id, capacity, "sysv semaphore set created");
        Ok(set)
    }

    pub fn id(&self) -> libc::c_int {
        self.id
    }

    /// IPC_RMID, paling banyak sekali. Id yang sudah dihapus bisa dipakai
    /// ulang kernel untuk set lain.
    fn remove(&self) -> io::Result<bool> {
        if self.removed.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        // SAFETY: IPC_RMID hanya butuh id
        let rc = unsafe { libc::semctl(self.id, 0, libc::IPC_RMID) };
        if rc == -1 {
            return Err(io::Error::last_os_error());
        }
        Ok(true)
    }

    fn semop(&self, op: &'static str, resources: &[Resource], delta: i16) -> Result<(), SyncError> {
        let mut ops: Vec<libc::sembuf> = resources
            .iter()
            .map(|r| libc::sembuf {
                sem_num: r.index() as libc::c_ushort,
                sem_op: delta,
                sem_flg: 0,
            })
            .collect();

        loop {
            // SAFETY: `ops` hidup sampai semop selesai
            let rc = unsafe { libc::semop(self.id, ops.as_mut_ptr(), ops.len()) };
            if rc == 0 {
                return Ok(());
            }

            let err = io::Error::last_os_error();
            // Signal yang menginterupsi wait bukan kegagalan operasi
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            // EIDRM: dihapus saat kita menunggu, EINVAL: sudah dihapus
            if self.removed.load(Ordering::Acquire)
                && matches!(err.raw_os_error(), Some(libc::EIDRM) | Some(libc::EINVAL))
            {
                return Err(SyncError::Removed { op });
            }
            return Err(SyncError::Os {
                op,
                resources: resources.to_vec(),
                source: err,
            });
        }
    }
}

impl SemaphoreSet for SysvSemaphores {
    fn acquire(&self, resources: &[Resource]) -> Result<(), SyncError> {
        self.semop("acquire", resources, -1)
    }

    fn release(&self, resources: &[Resource]) -> Result<(), SyncError> {
        self.semop("release", resources, 1)
    }

    fn values(&self) -> Result<ResourceValues, SyncError> {
        let mut values = [0u32; 3];
        for r in Resource::ALL {
            // SAFETY: GETVAL tidak butuh argumen tambahan
            let rc = unsafe { libc::semctl(self.id, r.index() as libc::c_int, libc::GETVAL) };
            if rc == -1 {
                return Err(SyncError::Os {
                    op: "getval",
                    resources: vec![r],
                    source: io::Error::last_os_error(),
                });
            }
            values[r.index()] = rc as u32;
        }
        Ok(ResourceValues::from_array(values))
    }

    fn backend(&self) -> &'static str {
        "sysv"
    }

    fn teardown(&self) -> Result<(), SyncError> {
        match self.remove() {
            Ok(removed) => {
                if removed {
                    debug!(sem_id = self.id, "sysv semaphore set torn down");
                }
                Ok(())
            }
            Err(source) => Err(SyncError::Os {
                op: "ipc_rmid",
                resources: Resource::ALL.to_vec(),
                source,
            }),
        }
    }
}

impl Drop for SysvSemaphores {
    fn drop(&mut self) {
        match self.remove() {
            Ok(true) => debug!(sem_id = self.id, "sysv semaphore set removed"),
            Ok(false) => {}
            Err(e) => warn!(sem_id = self.id, error = %e, "semctl IPC_RMID failed"),
        }
    }
}
