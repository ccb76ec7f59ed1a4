//! Prometheus metrics (SPEC_FULL.md §10/§12): an optional HTTP listener
//! exposing engine counters/gauges, installed only when `--metrics-bind`
//! is given. The counters mirror `CGlass::healthCheck()`'s surface plus
//! the pipeline stages spec.md §8 treats as testable properties: picks
//! ingested, duplicates dropped, triggers fired, hypos nucleated,
//! promoted, and canceled, plus eviction counts and worker heartbeat age.

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

pub const PICKS_INGESTED: &str = "glass_picks_ingested_total";
pub const PICKS_DUPLICATE: &str = "glass_picks_duplicate_total";
pub const PICKS_THROTTLED: &str = "glass_picks_throttled_total";
pub const PICKS_HELD_FOR_UNKNOWN_SITE: &str = "glass_picks_held_for_unknown_site_total";
pub const PICKS_DROPPED_UNKNOWN_SITE: &str = "glass_picks_dropped_unknown_site_total";
pub const CORRELATIONS_INGESTED: &str = "glass_correlations_ingested_total";
pub const TRIGGERS_FIRED: &str = "glass_triggers_fired_total";
pub const HYPOS_NUCLEATED: &str = "glass_hypos_nucleated_total";
pub const HYPOS_PROMOTED: &str = "glass_hypos_promoted_total";
pub const HYPOS_CANCELED: &str = "glass_hypos_canceled_total";
pub const PICKS_EVICTED: &str = "glass_picks_evicted_total";
pub const HYPOS_EVICTED: &str = "glass_hypos_evicted_total";
pub const MALFORMED_MESSAGES: &str = "glass_malformed_messages_total";
pub const WORKER_HEARTBEAT_AGE_SEC: &str = "glass_worker_heartbeat_age_seconds";

/// Installs the Prometheus recorder and starts its HTTP listener on
/// `bind`. Returns an error if the port can't be bound; callers should
/// treat that as fatal at startup but non-fatal afterward (SPEC_FULL.md
/// §12's exit-code contract only covers startup failures).
pub fn install(bind: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new().with_http_listener(bind).install()?;
    describe_metrics();
    Ok(())
}

fn describe_metrics() {
    metrics::describe_counter!(PICKS_INGESTED, "Total picks accepted into the pick list");
    metrics::describe_counter!(PICKS_DUPLICATE, "Total picks rejected as duplicates");
    metrics::describe_counter!(PICKS_THROTTLED, "Total picks rejected for exceeding a site's hourly pick limit");
    metrics::describe_counter!(PICKS_HELD_FOR_UNKNOWN_SITE, "Total picks held pending a site list update");
    metrics::describe_counter!(PICKS_DROPPED_UNKNOWN_SITE, "Total picks dropped for an unknown site");
    metrics::describe_counter!(CORRELATIONS_INGESTED, "Total correlation observations accepted");
    metrics::describe_counter!(TRIGGERS_FIRED, "Total nucleation triggers that cleared threshold");
    metrics::describe_counter!(HYPOS_NUCLEATED, "Total hypocenters created from a trigger");
    metrics::describe_counter!(HYPOS_PROMOTED, "Total hypocenters promoted to Reporting");
    metrics::describe_counter!(HYPOS_CANCELED, "Total hypocenters canceled");
    metrics::describe_counter!(PICKS_EVICTED, "Total picks evicted for exceeding list capacity");
    metrics::describe_counter!(HYPOS_EVICTED, "Total hypocenters evicted for exceeding list capacity");
    metrics::describe_counter!(MALFORMED_MESSAGES, "Total inbound messages dropped for failing to parse");
    metrics::describe_gauge!(WORKER_HEARTBEAT_AGE_SEC, "Seconds since a worker pool's oldest heartbeat");
}
