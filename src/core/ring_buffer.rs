//! Circular buffer dengan kapasitas tetap
//!
//! Buffer ini TIDAK melakukan sinkronisasi sendiri. Pemanggil harus sudah
//! memegang akses eksklusif (mutex dari semaphore set) dan sudah tahu bahwa
//! slot tersedia. Lihat `sync::protocol` untuk disiplin acquire/release.

use std::fmt;

/// Nilai item yang disimpan di slot. Slot kosong bernilai 0.
pub type Item = i32;

/// Posisi head/tail/count, disimpan di shared region tepat sebelum slots
#[repr(C)]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RingState {
    pub head: u32,
    pub tail: u32,
    pub count: u32,
}

/// View mutable ke ring yang berada di memori lain (shared region atau heap)
pub struct CircularBuffer<'a> {
    state: &'a mut RingState,
    slots: &'a mut [Item],
}

impl<'a> CircularBuffer<'a> {
    /// Membungkus state + slots. Kapasitas = `slots.len()`.
    ///
    /// # Panics
    /// Panic jika `slots` kosong
    pub fn new(state: &'a mut RingState, slots: &'a mut [Item]) -> Self {
        assert!(!slots.is_empty(), "capacity must be non-zero");
        Self { state, slots }
    }

    /// Reset ke kondisi kosong: head=tail=count=0, semua slot di-clear
    pub fn init(&mut self) {
        *self.state = RingState::default();
        self.slots.fill(0);
    }

    /// Tulis item di `head` lalu majukan head (modulo N).
    ///
    /// Precondition: `count < N`. Tidak dicek - memanggil saat penuh akan
    /// menimpa slot yang masih terisi.
    #[inline]
    pub fn insert(&mut self, item: Item) {
        let head = self.state.head as usize;
        self.slots[head] = item;
        self.state.head = self.advance(head);
        self.state.count = self.state.count.wrapping_add(1);
    }

    /// Ambil item di `tail`, clear slot-nya, majukan tail (modulo N).
    ///
    /// Precondition: `count > 0`. Tidak dicek.
    #[inline]
    pub fn remove(&mut self) -> Item {
        let tail = self.state.tail as usize;
        let item = std::mem::take(&mut self.slots[tail]);
        self.state.tail = self.advance(tail);
        self.state.count = self.state.count.wrapping_sub(1);
        item
    }

    #[inline(always)]
    fn advance(&self, index: usize) -> u32 {
        ((index + 1) % self.slots.len()) as u32
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        self.state.count as usize
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.state.count == 0
    }

    #[inline(always)]
    pub fn is_full(&self) -> bool {
        self.len() >= self.slots.len()
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        BufferSnapshot {
            slots: self.slots.to_vec(),
            head: self.state.head as usize,
            tail: self.state.tail as usize,
            count: self.state.count as usize,
        }
    }
}

/// Salinan isi buffer untuk display / assertion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferSnapshot {
    pub slots: Vec<Item>,
    pub head: usize,
    pub tail: usize,
    pub count: usize,
}

impl BufferSnapshot {
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Kosong dan head sudah menyusul tail
    pub fn is_drained(&self) -> bool {
        self.count == 0 && self.head == self.tail
    }
}

impl fmt::Display for BufferSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, slot) in self.slots.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", slot)?;
        }
        write!(
            f,
            "] (count={}, head={}, tail={})",
            self.count, self.head, self.tail
        )
    }
}
