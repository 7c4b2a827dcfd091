//! Shared memory region untuk bounded buffer
//!
//! Layout region (satu anonymous mmap, terlihat oleh semua worker):
//! - Header 64 bytes: magic, version, capacity, `RingState`
//! - Slots: `capacity` x `Item`
//!
//! Lifecycle: `create` (map + init) -> worker attach lewat `Arc` ->
//! worker selesai -> drop (unmap).

use std::ptr::NonNull;

use memmap2::{MmapMut, MmapOptions};
use tracing::debug;

use super::ring_buffer::{BufferSnapshot, CircularBuffer, Item, RingState};
use crate::error::SetupError;

/// Header region - metadata + posisi ring
#[repr(C, align(64))]
struct RegionHeader {
    magic: u64,     // Magic number untuk validasi
    version: u32,   // Versi layout
    capacity: u32,  // Jumlah slot
    ring: RingState,
}

const MAGIC: u64 = 0x53454D52494E4730; // "SEMRING0" in hex
const VERSION: u32 = 1;
const HEADER_SIZE: usize = std::mem::size_of::<RegionHeader>();

/// Batas atas jumlah slot per region
pub const MAX_CAPACITY: usize = 1 << 20;

/// Region yang memiliki memori buffer. Tidak ada singleton global: setiap run
/// membuat region sendiri dan membagikannya lewat `Arc`.
pub struct SharedRegion {
    // Dipegang untuk lifetime mapping; akses lewat `base`
    _mmap: MmapMut,
    base: NonNull<u8>,
    capacity: usize,
}

// SAFETY: Region hanya berisi plain data. Akses ke isinya lewat `buffer()`
// yang unsafe dan mensyaratkan pemanggil memegang mutex dari semaphore set.
unsafe impl Send for SharedRegion {}
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Map region baru dan langsung `init()` buffer di dalamnya
    pub fn create(capacity: usize) -> Result<Self, SetupError> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(SetupError::InvalidCapacity {
                got: capacity,
                max: MAX_CAPACITY,
            });
        }

        let total_size = HEADER_SIZE + capacity * std::mem::size_of::<Item>();

        let mut mmap = MmapOptions::new()
            .len(total_size)
            .map_anon()
            .map_err(SetupError::RegionMap)?;

        // mmap tidak pernah mengembalikan null untuk mapping yang sukses
        let base = NonNull::new(mmap.as_mut_ptr()).ok_or_else(|| {
            SetupError::RegionMap(std::io::Error::new(
                std::io::ErrorKind::Other,
                "mmap returned null pointer",
            ))
        })?;

        let mut region = Self {
            _mmap: mmap,
            base,
            capacity,
        };

        // SAFETY: Header berada di awal region, alignment page >= 64
        let header = unsafe { &mut *(region.base.as_ptr() as *mut RegionHeader) };
        header.magic = MAGIC;
        header.version = VERSION;
        header.capacity = capacity as u32;

        region.init();

        debug!(capacity, bytes = total_size, "shared region mapped");
        Ok(region)
    }

    /// Reset buffer ke kondisi kosong. Butuh `&mut`, jadi hanya sebelum
    /// region dibagikan ke worker.
    pub fn init(&mut self) {
        // SAFETY: `&mut self` menjamin tidak ada view lain yang hidup
        unsafe { self.buffer() }.init();
    }

    /// View ke buffer di dalam region.
    ///
    /// # Safety
    ///
    /// Pemanggil harus memegang akses eksklusif ke buffer (resource `Mutex`
    /// dari semaphore set, atau `&mut self`) selama view masih hidup.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn buffer(&self) -> CircularBuffer<'_> {
        let header = &mut *(self.base.as_ptr() as *mut RegionHeader);
        debug_assert_eq!(header.magic, MAGIC);

        let slots_ptr = self.base.as_ptr().add(HEADER_SIZE) as *mut Item;
        let slots = std::slice::from_raw_parts_mut(slots_ptr, self.capacity);

        CircularBuffer::new(&mut header.ring, slots)
    }

    /// Snapshot lewat exclusive borrow (misalnya setelah semua worker selesai)
    pub fn snapshot(&mut self) -> BufferSnapshot {
        // SAFETY: `&mut self`
        unsafe { self.buffer() }.snapshot()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Drop for SharedRegion {
    fn drop(&mut self) {
        debug!(capacity = self.capacity, "shared region unmapped");
    }
}
