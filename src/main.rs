//! semring - Producer/Consumer dengan shared buffer dan semaphore set
//!
//! Usage:
//!   cargo run --release -- [OPTIONS]
//!
//! Contoh:
//!   cargo run -- --producers 2 --items 10 --capacity 5
//!   cargo run -- --backend sysv --producer-idle-ms 0 --consumer-idle-ms 0
//!   cargo run -- --fail-release-at 3            # demo deadlock (abandon)
//!   cargo run -- --fail-release-at 3 --exit-policy release

use clap::{Parser, ValueEnum};
use eyre::{bail, Result, WrapErr};
use tracing::{info, warn};

use semring::config::{Backend, IdleRange, RunConfig};
use semring::sync::{ExitPolicy, FaultPlan};
use semring::trace::init_tracing;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Local,
    Sysv,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    /// Worker yang gagal meninggalkan resource (mutex) yang dipegang
    Abandon,
    /// Resource dikembalikan di setiap exit path
    Release,
}

#[derive(Parser, Debug)]
#[clap(name = "semring")]
#[clap(about = "Bounded-buffer producer/consumer over a grouped semaphore set", long_about = None)]
struct Args {
    /// Jumlah slot buffer
    #[clap(short, long, default_value_t = 5)]
    capacity: usize,

    /// Jumlah producer
    #[clap(short, long, default_value_t = 2)]
    producers: usize,

    /// Item per producer
    #[clap(short, long, default_value_t = 10)]
    items: usize,

    /// Jeda idle producer, `MIN..MAX` milidetik
    #[clap(long, default_value = "100..600")]
    producer_idle_ms: IdleRange,

    /// Jeda idle consumer, `MIN..MAX` milidetik
    #[clap(long, default_value = "200..800")]
    consumer_idle_ms: IdleRange,

    /// Seed RNG (default: dari jam)
    #[clap(short, long)]
    seed: Option<u64>,

    #[clap(short, long, value_enum, default_value = "local")]
    backend: BackendArg,

    #[clap(long, value_enum, default_value = "abandon")]
    exit_policy: PolicyArg,

    /// Gagalkan release producer ke-N (fault injection)
    #[clap(long)]
    fail_release_at: Option<usize>,
}

impl From<Args> for RunConfig {
    fn from(args: Args) -> Self {
        RunConfig {
            capacity: args.capacity,
            producers: args.producers,
            items_per_producer: args.items,
            producer_idle: args.producer_idle_ms,
            consumer_idle: args.consumer_idle_ms,
            seed: args.seed,
            backend: match args.backend {
                BackendArg::Local => Backend::Local,
                BackendArg::Sysv => Backend::Sysv,
            },
            exit_policy: match args.exit_policy {
                PolicyArg::Abandon => ExitPolicy::Abandon,
                PolicyArg::Release => ExitPolicy::ReleaseOnExit,
            },
            fault: args.fail_release_at.map(FaultPlan::producer_release),
        }
    }
}

fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();
    let config = RunConfig::from(args);

    info!("=== Producer-Consumer with shared buffer and semaphores ===");
    if config.fault.is_some() && config.exit_policy == ExitPolicy::Abandon {
        warn!("fault injection with abandon policy: remaining workers stay blocked until exit");
    }

    let report = semring::run(&config).wrap_err("producer-consumer run failed")?;

    info!(
        produced = report.produced().len(),
        consumed = report.consumer.consumed.len(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        seed = report.seed,
        "run complete"
    );

    if !report.is_conserved() {
        bail!(
            "conservation check failed: produced {:?}, consumed {:?}, final buffer {}",
            report.produced(),
            report.consumer.consumed,
            report.final_snapshot
        );
    }

    info!("program terminated successfully");
    Ok(())
}
