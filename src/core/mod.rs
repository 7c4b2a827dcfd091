//! Core module: circular buffer + shared region tempat buffer itu tinggal
//!
//! Prinsip desain:
//! - Buffer tidak tahu apa-apa soal sinkronisasi
//! - Region dimiliki secara eksplisit, dibagikan lewat `Arc`
//! - No-Allocation: slot dialokasikan sekali saat `create`

mod ring_buffer;
mod shared_region;

pub use ring_buffer::{BufferSnapshot, CircularBuffer, Item, RingState};
pub use shared_region::{SharedRegion, MAX_CAPACITY};
