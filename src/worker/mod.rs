//! Worker: producer dan consumer yang menjalankan protocol di sekitar
//! operasi buffer. State worker (seed, counter) private per worker.

mod consumer;
mod observer;
mod producer;
mod rng;
mod state;

pub use consumer::{ConsumerReport, ConsumerWorker};
pub use observer::{BufferEvent, BufferObserver, BufferOp, RecordingObserver, TracingObserver};
pub use producer::{ProducerReport, ProducerWorker};
pub use rng::{ItemRng, ITEM_MAX, ITEM_MIN};
pub use state::{StateCell, WorkerState};
