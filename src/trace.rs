//! Setup tracing subscriber untuk binary dan test
//!
//! Filter default `semring=info`; override lewat `RUST_LOG`
//! (misalnya `RUST_LOG=semring=trace` untuk melihat transisi state worker).

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "semring=info";

/// Pasang subscriber global. Aman dipanggil berkali-kali (panggilan
/// berikutnya diabaikan).
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_names(true)
                .with_timer(fmt::time::uptime()),
        )
        .with(filter)
        .try_init();
}
