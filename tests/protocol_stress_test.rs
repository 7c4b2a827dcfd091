//! Protocol Stress Test - skenario end-to-end bounded buffer
//!
//! Mengecek invariant: mutual exclusion, kapasitas, konservasi, FIFO, dan
//! perilaku saat primitive sinkronisasi gagal di tengah run.
//!
//! Usage:
//!   cargo test --release --test protocol_stress_test -- --nocapture

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use semring::config::{IdleRange, RunConfig};
use semring::core::SharedRegion;
use semring::sync::{
    BoundedBuffer, ExitPolicy, FaultPlan, FaultySemaphores, LocalSemaphores, SemaphoreSet,
};
use semring::worker::{
    BufferOp, ConsumerWorker, ProducerReport, ProducerWorker, RecordingObserver, WorkerState,
};
use semring::{Error, SyncError};

const JITTER: IdleRange = IdleRange::from_millis(0, 2);

fn shared<S: SemaphoreSet>(capacity: usize, sems: S, policy: ExitPolicy) -> Arc<BoundedBuffer<S>> {
    Arc::new(BoundedBuffer::new(
        SharedRegion::create(capacity).unwrap(),
        sems,
        policy,
    ))
}

/// Tunggu sampai `pred` true atau timeout
fn wait_until(timeout: Duration, mut pred: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if pred() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    pred()
}

#[test]
fn test_reference_scenario_two_producers_one_consumer() {
    semring::trace::init_tracing();

    let recorder = Arc::new(RecordingObserver::new());
    let config = RunConfig {
        producer_idle: JITTER,
        consumer_idle: JITTER,
        seed: Some(2024),
        ..RunConfig::default()
    };

    let report = semring::run_with_observer(&config, recorder.clone()).unwrap();

    // Tepat 20 item, masing-masing diproduksi sekali dan dikonsumsi sekali
    assert_eq!(report.consumer.consumed.len(), 20);
    assert_eq!(report.produced().len(), 20);
    assert!(report.is_conserved());

    // Buffer kosong, head menyusul tail
    assert_eq!(report.final_snapshot.count, 0);
    assert_eq!(report.final_snapshot.head, report.final_snapshot.tail);
    assert_eq!(report.final_values.as_array(), [1, 5, 0]);

    // FIFO: urutan remove = urutan insert global
    assert_eq!(recorder.removed(), recorder.inserted());
    assert_eq!(recorder.removed(), report.consumer.consumed);

    // Count tidak pernah keluar dari [0, N]
    for event in recorder.events() {
        assert!(event.count <= 5, "count {} exceeds capacity", event.count);
        if event.op == BufferOp::Insert {
            assert!(event.count >= 1);
        }
    }

    assert_eq!(report.peak_in_critical, 1);
}

#[test]
fn test_many_producers_tiny_buffer() {
    let buffer = shared(2, LocalSemaphores::new(2).unwrap(), ExitPolicy::Abandon);
    let recorder = Arc::new(RecordingObserver::new());

    const PRODUCERS: usize = 6;
    const ITEMS: usize = 200;

    let producers: Vec<JoinHandle<ProducerReport>> = (1..=PRODUCERS)
        .map(|id| {
            let worker = ProducerWorker::new(id, Arc::clone(&buffer), ITEMS)
                .seed(id as u64 * 31)
                .observer(recorder.clone());
            thread::spawn(move || worker.run().unwrap())
        })
        .collect();

    let consumer = {
        let worker = ConsumerWorker::new(Arc::clone(&buffer), PRODUCERS * ITEMS)
            .observer(recorder.clone());
        thread::spawn(move || worker.run().unwrap())
    };

    let mut produced: Vec<i32> = producers
        .into_iter()
        .flat_map(|h| h.join().unwrap().produced)
        .collect();
    let consumed = consumer.join().unwrap().consumed;

    assert_eq!(consumed, recorder.inserted());

    let mut sorted = consumed.clone();
    sorted.sort_unstable();
    produced.sort_unstable();
    assert_eq!(sorted, produced);

    assert!(recorder.events().iter().all(|e| e.count <= 2));
    assert_eq!(buffer.probe().peak(), 1);
    assert_eq!(buffer.probe().entries(), (2 * PRODUCERS * ITEMS) as u64);
    assert!(buffer.snapshot().unwrap().is_drained());
}

fn check_sixth_insert_blocks_until_remove<S: SemaphoreSet + 'static>(sems: S) {
    let buffer = shared(5, sems, ExitPolicy::Abandon);

    for item in 101..=105 {
        buffer.produce(item).unwrap();
    }
    assert_eq!(buffer.values().unwrap().as_array(), [1, 0, 5]);

    let sixth = {
        let buffer = Arc::clone(&buffer);
        thread::spawn(move || buffer.produce(106).unwrap())
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!sixth.is_finished());

    // Producer yang blok tidak memegang mutex: snapshot masih bisa diambil
    let snap = buffer.snapshot().unwrap();
    assert_eq!(snap.slots, vec![101, 102, 103, 104, 105]);
    assert_eq!(snap.count, 5);

    let (item, _) = buffer.consume().unwrap();
    assert_eq!(item, 101);

    let after = sixth.join().unwrap();
    assert_eq!(after.count, 5);
    assert_eq!(after.slots, vec![106, 102, 103, 104, 105]);
    assert_eq!(buffer.values().unwrap().as_array(), [1, 0, 5]);
}

#[test]
fn test_sixth_insert_blocks_until_remove() {
    check_sixth_insert_blocks_until_remove(LocalSemaphores::new(5).unwrap());
}

#[cfg(target_os = "linux")]
#[test]
fn test_sixth_insert_blocks_until_remove_sysv() {
    check_sixth_insert_blocks_until_remove(semring::sync::SysvSemaphores::new(5).unwrap());
}

#[test]
fn test_failure_while_holding_mutex_blocks_everyone() {
    let sems = FaultySemaphores::new(LocalSemaphores::new(5).unwrap(), FaultPlan::producer_release(3));
    let buffer = shared(5, sems, ExitPolicy::Abandon);

    let mut producers = Vec::new();
    for id in 1..=2 {
        let worker = ProducerWorker::new(id, Arc::clone(&buffer), 10)
            .idle(JITTER)
            .observer(Arc::new(RecordingObserver::new()));
        let status = worker.status();
        producers.push((status, thread::spawn(move || worker.run())));
    }
    let consumer = ConsumerWorker::new(Arc::clone(&buffer), 20)
        .idle(JITTER)
        .observer(Arc::new(RecordingObserver::new()));
    let consumer_status = consumer.status();
    let consumer_handle = thread::spawn(move || consumer.run());

    assert!(wait_until(Duration::from_secs(5), || {
        producers.iter().any(|(_, h)| h.is_finished())
    }));

    // Beri waktu worker lain untuk (tidak) maju
    thread::sleep(Duration::from_millis(300));

    let (finished, blocked): (Vec<_>, Vec<_>) =
        producers.into_iter().partition(|(_, h)| h.is_finished());
    assert_eq!(finished.len(), 1);
    assert_eq!(blocked.len(), 1);

    let (failed_status, failed) = finished.into_iter().next().unwrap();
    let err = failed.join().unwrap().unwrap_err();
    assert!(matches!(err, SyncError::Injected { op: "release", call: 3, .. }));
    assert_eq!(failed_status.get(), WorkerState::Failed);

    // Mutex ditinggal: sisa worker blok permanen di acquire
    assert_eq!(buffer.values().unwrap().mutex, 0);
    let (blocked_status, blocked_handle) = &blocked[0];
    assert!(!blocked_handle.is_finished());
    assert_eq!(blocked_status.get(), WorkerState::Acquiring);
    assert!(!consumer_handle.is_finished());
    assert_eq!(consumer_status.get(), WorkerState::Acquiring);

    assert_eq!(buffer.probe().active(), 0);
    assert_eq!(buffer.probe().peak(), 1);
}

#[test]
fn test_release_on_exit_keeps_others_running() {
    let sems = FaultySemaphores::new(LocalSemaphores::new(5).unwrap(), FaultPlan::producer_release(3));
    let buffer = shared(5, sems, ExitPolicy::ReleaseOnExit);
    let recorder = Arc::new(RecordingObserver::new());

    let producer = ProducerWorker::new(1, Arc::clone(&buffer), 10)
        .idle(JITTER)
        .observer(recorder.clone());
    let producer_handle = thread::spawn(move || producer.run());

    // Insert ke-3 sudah masuk sebelum release gagal, jadi ada 3 item
    let consumer = ConsumerWorker::new(Arc::clone(&buffer), 3)
        .idle(JITTER)
        .observer(recorder.clone());
    let consumer_handle = thread::spawn(move || consumer.run());

    let err = producer_handle.join().unwrap().unwrap_err();
    assert!(matches!(err, SyncError::Injected { .. }));

    let consumed = consumer_handle.join().unwrap().unwrap().consumed;
    assert_eq!(consumed, recorder.inserted());
    assert_eq!(consumed.len(), 3);

    assert_eq!(buffer.values().unwrap().as_array(), [1, 5, 0]);
    assert!(buffer.snapshot().unwrap().is_drained());
}

#[test]
fn test_runner_reports_worker_failure() {
    let config = RunConfig {
        producer_idle: JITTER,
        consumer_idle: JITTER,
        seed: Some(9),
        exit_policy: ExitPolicy::ReleaseOnExit,
        fault: Some(FaultPlan::producer_release(4)),
        ..RunConfig::default()
    };

    match semring::run_with_observer(&config, Arc::new(RecordingObserver::new())) {
        Err(Error::Worker { worker, source }) => {
            assert!(worker.starts_with("producer-"));
            assert!(matches!(source, SyncError::Injected { call: 4, .. }));
        }
        other => panic!("expected worker failure, got {:?}", other.map(|r| r.seed)),
    }
}
