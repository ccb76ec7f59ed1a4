//! Logging setup (SPEC_FULL.md §10's ambient stack): a `tracing-subscriber`
//! `fmt` layer driven by `EnvFilter`, with the `tracing-log` bridge
//! installed so the `log`-facade calls made throughout `glass-core` and
//! `glass-proto` are captured by the same subscriber instead of going to
//! stderr unformatted.
//!
//! `GLASS_LOG` takes precedence over `--log-level`, mirroring `glass-app`'s
//! original `GLASS_LOG_LEVEL` environment override (SPEC_FULL.md §12).

use tracing_subscriber::EnvFilter;

pub fn init(log_level: &str, ansi: bool) {
    let filter = std::env::var("GLASS_LOG").ok().and_then(|v| EnvFilter::try_new(v).ok()).unwrap_or_else(|| EnvFilter::new(log_level));

    tracing_subscriber::fmt().with_env_filter(filter).with_ansi(ansi).with_target(true).init();

    if let Err(e) = tracing_log::LogTracer::init() {
        eprintln!("failed to bridge log crate into tracing: {e}");
    }
}
