//! Bootstrap satu run: buat region + semaphore set, spawn worker thread,
//! tunggu semua selesai, lalu lepas semua resource.
//!
//! Kalau ada worker yang gagal, run langsung mengembalikan error setelah
//! semaphore set di-teardown. Worker lain yang masih blok bangun dengan
//! `SyncError::Removed` lalu berhenti; region di-unmap saat `Arc` terakhir
//! mereka di-drop.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use crate::config::{Backend, RunConfig};
use crate::core::{BufferSnapshot, Item, SharedRegion};
use crate::error::{Error, Result, SetupError, SyncError};
use crate::sync::{
    BoundedBuffer, ExitPolicy, FaultySemaphores, LocalSemaphores, ResourceValues, SemaphoreSet,
};
use crate::worker::{
    BufferObserver, ConsumerReport, ConsumerWorker, ItemRng, ProducerReport, ProducerWorker,
    TracingObserver,
};

/// Ringkasan run yang selesai normal
#[derive(Debug, Clone)]
pub struct RunReport {
    pub seed: u64,
    pub capacity: usize,
    pub producers: Vec<ProducerReport>,
    pub consumer: ConsumerReport,
    pub final_snapshot: BufferSnapshot,
    pub final_values: ResourceValues,
    /// Puncak jumlah worker di critical section secara bersamaan
    pub peak_in_critical: usize,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn produced(&self) -> Vec<Item> {
        self.producers
            .iter()
            .flat_map(|p| p.produced.iter().copied())
            .collect()
    }

    /// Tidak ada item hilang / dobel, buffer kosong, resource kembali ke awal
    pub fn is_conserved(&self) -> bool {
        let mut produced = self.produced();
        let mut consumed = self.consumer.consumed.clone();
        produced.sort_unstable();
        consumed.sort_unstable();

        produced == consumed
            && self.final_snapshot.is_drained()
            && self.final_values == ResourceValues::initial(self.capacity as u32)
    }
}

/// Run dengan observer default (log isi buffer setiap operasi)
pub fn run(config: &RunConfig) -> Result<RunReport> {
    run_with_observer(config, Arc::new(TracingObserver))
}

pub fn run_with_observer(config: &RunConfig, observer: Arc<dyn BufferObserver>) -> Result<RunReport> {
    config.validate()?;
    let seed = config.resolved_seed();

    let region = SharedRegion::create(config.capacity)?;
    info!(capacity = config.capacity, "shared buffer initialized");

    match config.backend {
        Backend::Local => {
            let sems = LocalSemaphores::new(config.capacity)?;
            with_fault(config, seed, region, sems, observer)
        }
        #[cfg(target_os = "linux")]
        Backend::Sysv => {
            let sems = crate::sync::SysvSemaphores::new(config.capacity)?;
            info!(sem_id = sems.id(), "sysv semaphore set created");
            with_fault(config, seed, region, sems, observer)
        }
        #[cfg(not(target_os = "linux"))]
        Backend::Sysv => Err(SetupError::InvalidConfig(
            "sysv backend is only available on Linux".into(),
        )
        .into()),
    }
}

fn with_fault<S: SemaphoreSet + 'static>(
    config: &RunConfig,
    seed: u64,
    region: SharedRegion,
    sems: S,
    observer: Arc<dyn BufferObserver>,
) -> Result<RunReport> {
    match &config.fault {
        Some(plan) => {
            let sems = FaultySemaphores::new(sems, plan.clone());
            execute(config, seed, region, sems, observer)
        }
        None => execute(config, seed, region, sems, observer),
    }
}

enum Outcome {
    Producer(String, std::result::Result<ProducerReport, SyncError>),
    Consumer(String, std::result::Result<ConsumerReport, SyncError>),
    Panicked(String),
}

/// Kirim `Panicked` kalau thread worker unwind sebelum sempat lapor
struct Reporter {
    tx: mpsc::Sender<Outcome>,
    name: String,
    sent: bool,
}

impl Reporter {
    fn send(mut self, outcome: Outcome) {
        self.sent = true;
        let _ = self.tx.send(outcome);
    }
}

impl Drop for Reporter {
    fn drop(&mut self) {
        if !self.sent {
            let _ = self.tx.send(Outcome::Panicked(self.name.clone()));
        }
    }
}

fn spawn<F>(name: &str, tx: &mpsc::Sender<Outcome>, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() -> Outcome + Send + 'static,
{
    let reporter = Reporter {
        tx: tx.clone(),
        name: name.to_string(),
        sent: false,
    };

    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let outcome = body();
            reporter.send(outcome);
        })
        .map_err(|source| {
            SetupError::Spawn {
                name: name.to_string(),
                source,
            }
            .into()
        })
}

/// Dipanggil di jalur gagal, saat worker lain masih memegang `Arc` buffer
fn teardown<S: SemaphoreSet>(buffer: &BoundedBuffer<S>) {
    if let Err(e) = buffer.teardown() {
        warn!(error = %e, "semaphore set teardown failed");
    }
}

fn execute<S: SemaphoreSet + 'static>(
    config: &RunConfig,
    seed: u64,
    region: SharedRegion,
    sems: S,
    observer: Arc<dyn BufferObserver>,
) -> Result<RunReport> {
    let start = Instant::now();

    info!(
        backend = sems.backend(),
        mutex = 1,
        empty = config.capacity,
        full = 0,
        "semaphores initialized"
    );
    if config.exit_policy == ExitPolicy::ReleaseOnExit {
        info!("exit policy: release held resources on worker failure");
    }

    let buffer = Arc::new(BoundedBuffer::new(region, sems, config.exit_policy));
    let (tx, rx) = mpsc::channel();
    let mut handles = Vec::with_capacity(config.producers + 1);

    for id in 1..=config.producers {
        let worker = ProducerWorker::new(id, Arc::clone(&buffer), config.items_per_producer)
            .seed(ItemRng::derive_seed(seed, id as u64))
            .idle(config.producer_idle)
            .observer(Arc::clone(&observer));
        let name = worker.name().to_string();
        let label = name.clone();
        handles.push(spawn(&name, &tx, move || Outcome::Producer(label, worker.run()))?);
    }

    let consumer = ConsumerWorker::new(Arc::clone(&buffer), config.total_items())
        .seed(ItemRng::derive_seed(seed, 0))
        .idle(config.consumer_idle)
        .observer(Arc::clone(&observer));
    let consumer_name = consumer.name().to_string();
    let label = consumer_name.clone();
    handles.push(spawn(&consumer_name, &tx, move || {
        Outcome::Consumer(label, consumer.run())
    })?);
    drop(tx);

    info!(
        producers = config.producers,
        items_per_producer = config.items_per_producer,
        consumer_total = config.total_items(),
        seed,
        "workers started"
    );

    let mut producers = Vec::with_capacity(config.producers);
    let mut consumer_report = None;

    for outcome in rx.iter() {
        match outcome {
            Outcome::Producer(_, Ok(report)) => producers.push(report),
            Outcome::Consumer(_, Ok(report)) => consumer_report = Some(report),
            Outcome::Producer(worker, Err(source)) | Outcome::Consumer(worker, Err(source)) => {
                error!(
                    worker = %worker,
                    policy = ?config.exit_policy,
                    "worker aborted, tearing down semaphore set"
                );
                teardown(&buffer);
                return Err(Error::Worker { worker, source });
            }
            Outcome::Panicked(worker) => {
                error!(worker = %worker, "worker panicked");
                teardown(&buffer);
                return Err(Error::Panicked(worker));
            }
        }
    }

    for handle in handles {
        let _ = handle.join();
    }

    let consumer = consumer_report.ok_or_else(|| Error::Panicked(consumer_name.clone()))?;
    producers.sort_by_key(|p| p.id);

    let final_snapshot = buffer.snapshot().map_err(|source| Error::Worker {
        worker: "runner".into(),
        source,
    })?;
    let final_values = buffer.values().map_err(|source| Error::Worker {
        worker: "runner".into(),
        source,
    })?;
    let peak_in_critical = buffer.probe().peak();

    info!(
        buffer = %final_snapshot,
        peak_in_critical,
        "all workers completed"
    );

    // Worker sudah di-join, jadi ini referensi terakhir: region di-unmap dan
    // semaphore set dihapus di sini
    drop(buffer);
    info!("shared region and semaphore set released");

    Ok(RunReport {
        seed,
        capacity: config.capacity,
        producers,
        consumer,
        final_snapshot,
        final_values,
        peak_in_critical,
        elapsed: start.elapsed(),
    })
}
