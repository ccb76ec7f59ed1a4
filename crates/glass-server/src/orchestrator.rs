//! The `Orchestrator`: owns a `glass_core::Glass`, the named worker pools
//! (spec.md §5), the stale-work/correlation-aging scanner thread, and
//! message dispatch. Grounded on `CGlass::dispatch`'s chain-of-responsibility
//! routing (SPEC_FULL.md §11): each inbound message is offered to a
//! component in a fixed order, and the orchestrator logs "unhandled
//! message" if nothing claims it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use glass_core::engine::{Glass, HealthStatus};
use glass_core::error::GlassError;
use glass_core::geo::GeoPoint;
use glass_core::sink::{CancelMessage, HypoMessage, MessageSink};
use glass_core::site::SiteKey;
use glass_core::travel_time::TravelTimeProvider;
use glass_proto::{InboundMessage, OutboundMessage};
use parking_lot::Mutex;

use crate::config::ServerConfig;
use crate::server_metrics as m;
use crate::site_registry::{SiteLocation, SiteRegistry};
use crate::worker::WorkerPool;

/// A pick held against an unknown site, waiting to be retried against a
/// later `SiteList` update (spec.md §7).
struct HeldPick {
    held_at_sec: f64,
    pick: glass_proto::PickInput,
}

fn now_epoch_sec() -> f64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}

/// Forwards a promoted hypo or cancellation notice to stdout as a single
/// JSON line, matching the wire format's outbound shape (spec.md §6).
pub struct StdoutSink;

impl MessageSink for StdoutSink {
    fn emit_hypo(&self, msg: HypoMessage) {
        let outbound = OutboundMessage::Hypo {
            pid: msg.pid,
            time_sec: msg.time_sec,
            latitude_deg: msg.latitude_deg,
            longitude_deg: msg.longitude_deg,
            depth_km: msg.depth_km,
            bayes: msg.bayes,
            data_ids: msg.data_pick_ids.iter().map(|id| id.to_string()).collect(),
        };
        match outbound.to_json_line() {
            Ok(line) => println!("{line}"),
            Err(e) => log::error!("failed to serialize hypo message: {e}"),
        }
        metrics::counter!(m::HYPOS_PROMOTED).increment(1);
    }

    fn emit_cancel(&self, msg: CancelMessage) {
        let outbound = OutboundMessage::Cancel { pid: msg.pid, reason: msg.reason };
        match outbound.to_json_line() {
            Ok(line) => println!("{line}"),
            Err(e) => log::error!("failed to serialize cancel message: {e}"),
        }
        metrics::counter!(m::HYPOS_CANCELED).increment(1);
    }
}

pub struct Orchestrator {
    glass: Arc<Glass>,
    sites: Arc<SiteRegistry>,
    held_picks: Arc<Mutex<Vec<HeldPick>>>,
    stop: Arc<AtomicBool>,
    nucleation_pool: WorkerPool,
    hypo_pool: WorkerPool,
    scanner: Option<std::thread::JoinHandle<()>>,
}

impl Orchestrator {
    pub fn new(config: ServerConfig, travel_time: &dyn TravelTimeProvider, seed: u64, stop: Arc<AtomicBool>) -> Self {
        let sites = Arc::new(SiteRegistry::new());
        let glass = Arc::new(Glass::new(config.tunables.clone(), Arc::new(StdoutSink)));

        for def in &config.webs {
            let known_sites = glass.sites.all();
            let overrides = glass_core::web::WebConfig {
                nucleation_stack_threshold: def.nucleation_stack_threshold,
                nucleation_data_count_threshold: def.nucleation_data_count_threshold,
                num_stations_per_node: def.num_stations_per_node,
            };
            let num_stations = def.num_stations_per_node.unwrap_or(config.tunables.num_stations_per_node) as usize;
            let web = glass_core::web::Web::build_grid(
                def.name.clone(),
                1,
                def.lat_range_deg,
                def.lon_range_deg,
                def.spacing_deg,
                def.depth_km,
                &known_sites,
                num_stations,
                overrides,
            );
            glass.webs.add(web);
        }

        let nucleation_pool =
            WorkerPool::new("nucleation", config.tunables.num_nucleation_threads, 4096, travel_time, seed, stop.clone());
        let hypo_pool = WorkerPool::new("hypo-evolve", config.tunables.num_hypo_threads, 4096, travel_time, seed.wrapping_add(1), stop.clone());

        let held_picks = Arc::new(Mutex::new(Vec::new()));
        let scanner = spawn_scanner(glass.clone(), sites.clone(), held_picks.clone(), stop.clone());

        Self { glass, sites, held_picks, stop, nucleation_pool, hypo_pool, scanner: Some(scanner) }
    }

    pub fn glass(&self) -> &Arc<Glass> {
        &self.glass
    }

    /// Dispatches one parsed inbound message, mirroring `CGlass::dispatch`'s
    /// chain: each arm either fully handles the message or is the single
    /// component responsible for that discriminator (SPEC_FULL.md §11).
    pub fn dispatch(&self, msg: InboundMessage) {
        match msg {
            InboundMessage::Initialize(init) => {
                log::info!("applying Initialize overlay");
                // The engine's Config is behind an Arc shared with every
                // list; a dynamic re-init would need a swappable handle
                // (spec.md §9's open design note). Until that lands, log
                // what would have changed rather than silently no-op.
                let mut preview = (*self.glass.config).clone();
                init.apply_to(&mut preview);
                log::debug!("post-Initialize tunables would be: {preview:?}");
            }
            InboundMessage::SiteList(entries) => {
                self.sites.insert_all(&entries);
                for entry in &entries {
                    self.register_site(entry);
                }
                log::info!("SiteList: {} sites known", self.sites.len());
            }
            InboundMessage::Site(entry) => {
                self.sites.insert(&entry);
                self.register_site(&entry);
            }
            InboundMessage::Pick(pick) => self.handle_pick(pick),
            InboundMessage::Correlation(corr) => self.handle_correlation(corr),
            InboundMessage::Detection(detection) => {
                for pick in detection.picks {
                    self.handle_pick(pick);
                }
            }
            InboundMessage::ReqHypo { pid } => self.handle_req_hypo(&pid),
        }
    }

    fn register_site(&self, entry: &glass_proto::SiteListEntry) {
        let key = SiteKey::new(&entry.site.network, &entry.site.station, &entry.site.channel, &entry.site.location);
        let position = GeoPoint::new(entry.latitude_deg, entry.longitude_deg);
        let site = self.glass.sites.get_or_create(key, position, entry.elevation_km);
        site.set_enabled(entry.enable);
    }

    /// Looks up `pick`'s site and ingests it. An unknown site is held
    /// briefly for the scanner thread to retry against a later `SiteList`
    /// update when `site_lookup_interval_sec` is positive, and dropped
    /// outright otherwise (spec.md §7).
    fn handle_pick(&self, pick: glass_proto::PickInput) {
        let key = SiteKey::new(&pick.site.network, &pick.site.station, &pick.site.channel, &pick.site.location);
        let Some(location) = self.sites.lookup(&key) else {
            if self.glass.config.site_lookup_interval_sec > 0.0 {
                log::debug!("holding pick for unknown site {key}, pending a site list update");
                self.held_picks.lock().push(HeldPick { held_at_sec: now_epoch_sec(), pick });
                metrics::counter!(m::PICKS_HELD_FOR_UNKNOWN_SITE).increment(1);
            } else {
                log::warn!("dropping pick for unknown site {key}");
                metrics::counter!(m::PICKS_DROPPED_UNKNOWN_SITE).increment(1);
            }
            return;
        };
        if !location.enabled {
            log::debug!("dropping pick for disabled site {key}");
            return;
        }
        ingest_pick(&self.glass, pick, key, location);
    }

    fn handle_correlation(&self, corr: glass_proto::CorrelationInput) {
        let key = SiteKey::new(&corr.site.network, &corr.site.station, &corr.site.channel, &corr.site.location);
        let Some(location) = self.sites.lookup(&key) else {
            log::warn!("dropping correlation for unknown site {key}");
            return;
        };
        let origin = GeoPoint::new(corr.hypocenter.latitude_deg, corr.hypocenter.longitude_deg);
        self.glass.add_correlation(
            corr.external_id,
            key,
            location.position,
            location.elevation_km,
            corr.time_sec,
            origin,
            corr.hypocenter.depth_km,
            corr.correlation_value,
        );
        metrics::counter!(m::CORRELATIONS_INGESTED).increment(1);
    }

    fn handle_req_hypo(&self, pid: &str) {
        let Some(hypo) = self.glass.hypos.find_by_pid(pid) else {
            log::warn!("ReqHypo for unknown pid {pid}");
            return;
        };
        StdoutSink.emit_hypo(HypoMessage {
            pid: hypo.pid.clone(),
            time_sec: hypo.time_sec(),
            latitude_deg: hypo.origin().lat_deg,
            longitude_deg: hypo.origin().lon_deg,
            depth_km: hypo.depth_km(),
            bayes: hypo.bayes_value(),
            number_of_associated_data: hypo.num_associated_data(),
            data_pick_ids: hypo.picks().iter().map(|p| p.id).collect(),
        });
    }

    /// Runs one nucleation pass, then submits every active hypo to the
    /// hypo-evolve pool for its next pass (spec.md §4.2 step 1 onward).
    pub fn run_nucleation_pass(&mut self) {
        let glass_for_nucleation = self.glass.clone();
        self.nucleation_pool.submit(Box::new(move |travel_time, rng| {
            let hypos = glass_for_nucleation.run_nucleation_pass(travel_time, rng);
            metrics::counter!(m::TRIGGERS_FIRED).increment(hypos.len() as u64);
            metrics::counter!(m::HYPOS_NUCLEATED).increment(hypos.len() as u64);
            for hypo in hypos {
                log::debug!("nucleated hypo {}", hypo.pid);
            }
        }));

        for hypo in self.glass.hypos.active() {
            let glass_for_evolve = self.glass.clone();
            self.hypo_pool.submit(Box::new(move |travel_time, rng| {
                glass_for_evolve.evolve_hypo(&hypo, travel_time, rng);
            }));
        }
    }

    /// Mirrors `CGlass::healthCheck()`: returns `false` if any worker pool
    /// has a heartbeat older than `heartbeat_timeout_sec` (spec.md §4.6).
    pub fn health_check(&self, now_sec: f64, heartbeat_timeout_sec: i64) -> (HealthStatus, bool) {
        let status = self.glass.health_check(now_sec);
        let now = now_sec as i64;
        let healthy = [&self.nucleation_pool, &self.hypo_pool]
            .iter()
            .all(|pool| pool.max_heartbeat_age_sec(now).is_none_or(|age| age <= heartbeat_timeout_sec));
        for pool in [&self.nucleation_pool, &self.hypo_pool] {
            if let Some(age) = pool.max_heartbeat_age_sec(now) {
                metrics::gauge!(m::WORKER_HEARTBEAT_AGE_SEC, "pool" => pool.name().to_string()).set(age as f64);
            }
        }
        (status, healthy)
    }

    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.nucleation_pool.shutdown();
        self.hypo_pool.shutdown();
        if let Some(handle) = self.scanner.take() {
            let _ = handle.join();
        }
    }
}

/// Submits `pick` to the engine and records the outcome as a metric. A
/// free function so both `Orchestrator::handle_pick` and the scanner
/// thread's held-pick retry can share it without an `Arc<Orchestrator>`.
fn ingest_pick(glass: &Glass, pick: glass_proto::PickInput, key: SiteKey, location: SiteLocation) {
    match glass.add_pick(
        pick.external_id,
        key,
        location.position,
        location.elevation_km,
        pick.time_sec,
        pick.backazimuth_deg,
        pick.slowness_sec_per_deg,
    ) {
        Ok(_) => metrics::counter!(m::PICKS_INGESTED).increment(1),
        Err(GlassError::SiteThrottled { site, picks_per_hour }) => {
            log::debug!("pick rejected: site {site} throttled at {picks_per_hour} picks/hour");
            metrics::counter!(m::PICKS_THROTTLED).increment(1);
        }
        Err(e) => {
            log::debug!("pick rejected: {e}");
            metrics::counter!(m::PICKS_DUPLICATE).increment(1);
        }
    }
}

/// Retries every pick held against an unknown site: ingests it if its
/// site has since been registered, drops it if the site is now known but
/// disabled, and otherwise keeps holding it until `lookup_interval_sec`
/// has elapsed since it was first held (spec.md §7).
fn retry_held_picks(glass: &Glass, sites: &SiteRegistry, held_picks: &Mutex<Vec<HeldPick>>, now_sec: f64, lookup_interval_sec: f64) {
    let mut pending = held_picks.lock();
    if pending.is_empty() {
        return;
    }
    let mut still_held = Vec::with_capacity(pending.len());
    for held in pending.drain(..) {
        let key =
            SiteKey::new(&held.pick.site.network, &held.pick.site.station, &held.pick.site.channel, &held.pick.site.location);
        match sites.lookup(&key) {
            Some(location) if location.enabled => ingest_pick(glass, held.pick, key, location),
            Some(_) => log::debug!("dropping held pick for now-disabled site {key}"),
            None if now_sec - held.held_at_sec > lookup_interval_sec => {
                log::warn!("dropping pick held for unknown site {key}: site list never updated");
                metrics::counter!(m::PICKS_DROPPED_UNKNOWN_SITE).increment(1);
            }
            None => still_held.push(held),
        }
    }
    *pending = still_held;
}

/// The fourth thread spec.md §5 describes: scans for stale work, ages
/// out correlations whose hypo never confirmed within
/// `correlation_cancel_age_sec`, and retries picks held against an
/// unknown site.
fn spawn_scanner(glass: Arc<Glass>, sites: Arc<SiteRegistry>, held_picks: Arc<Mutex<Vec<HeldPick>>>, stop: Arc<AtomicBool>) -> std::thread::JoinHandle<()> {
    std::thread::Builder::new()
        .name("stale-work-scanner".into())
        .spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                std::thread::sleep(Duration::from_secs(5));
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                let now_sec = now_epoch_sec();
                let cancel_age = glass.config.correlation_cancel_age_sec;
                for correlation in glass.correlations.all() {
                    if correlation.hypo().is_none() && now_sec - correlation.time_sec > cancel_age {
                        log::debug!("aging out unconfirmed correlation {}", correlation.id);
                        glass.correlations.remove(correlation.id);
                    }
                }

                let lookup_interval_sec = glass.config.site_lookup_interval_sec;
                if lookup_interval_sec > 0.0 {
                    retry_held_picks(&glass, &sites, &held_picks, now_sec, lookup_interval_sec);
                }
            }
        })
        .expect("failed to spawn stale-work scanner thread")
}
