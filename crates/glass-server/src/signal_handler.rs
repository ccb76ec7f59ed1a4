//! Graceful-shutdown signal handling, generalized from a SIGUSR1
//! debug-dump handler to SIGINT/SIGTERM driving the engine's
//! cooperative stop flag (spec.md §5 "Cancellation and timeouts:
//! Cooperative").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[cfg(unix)]
pub fn install(stop: Arc<AtomicBool>) {
    use signal_hook::consts::signal::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(s) => s,
        Err(e) => {
            log::error!("failed to install signal handler: {e}");
            return;
        }
    };

    std::thread::Builder::new()
        .name("signal-handler".into())
        .spawn(move || {
            for sig in signals.forever() {
                log::info!("received signal {sig}, shutting down");
                stop.store(true, Ordering::SeqCst);
                break;
            }
        })
        .expect("failed to spawn signal handler thread");
}

#[cfg(not(unix))]
pub fn install(_stop: Arc<AtomicBool>) {
    log::warn!("signal handling not available on this platform; shut down via stdin EOF");
}
