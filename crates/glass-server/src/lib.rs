//! The association-engine orchestrator: message dispatch, worker pools,
//! logging/metrics setup, and the process entry point (SPEC_FULL.md §0
//! "ambient" crate — the binary/runtime half of the workspace, split
//! from the pure `glass-core` domain library the same way a CLI crate
//! sits apart from its engine library).

pub mod config;
pub mod logging;
pub mod orchestrator;
pub mod server_metrics;
pub mod signal_handler;
pub mod site_registry;
pub mod stdin_reader;
pub mod worker;

pub use config::ServerConfig;
pub use orchestrator::Orchestrator;
