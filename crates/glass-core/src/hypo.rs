//! Hypocenter hypotheses and their lifecycle (spec.md §3 "Hypo", §4.2/§4.4).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::correlation::Correlation;
use crate::geo::{azimuthal_gap_deg, GeoPoint};
use crate::pick::Pick;

/// A hypo's position in its lifecycle (spec.md §3).
///
/// `Pending` -> newly nucleated or correlation-seeded, not yet evolved.
/// `Processing` -> actively being relocated/re-associated by a worker.
/// `Reporting` -> cleared the reporting thresholds and has been (or is
/// about to be) emitted via the message sink.
/// `Canceled` -> withdrawn; a cancel message has been (or will be) sent
/// if it was ever reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HypoState {
    Pending,
    Processing,
    Reporting,
    Canceled,
}

#[derive(Debug, Clone, Copy)]
struct Geometry {
    origin: GeoPoint,
    depth_km: f64,
    time_sec: f64,
    bayes_value: f64,
}

/// A hypocenter hypothesis: an evolving estimate of an event's location,
/// origin time, and supporting data. All of a hypo's mutable state is
/// behind a single lock per concern (geometry, state, data lists) rather
/// than one lock for the whole struct, since a relocation pass and a
/// pick-count read never need to be atomic with each other.
#[derive(Debug)]
pub struct Hypo {
    pub id: u64,
    pub pid: String,
    geometry: Mutex<Geometry>,
    state: Mutex<HypoState>,
    picks: Mutex<Vec<Arc<Pick>>>,
    correlations: Mutex<Vec<Arc<Correlation>>>,
    process_count: AtomicU32,
    config: Arc<Config>,
}

impl Hypo {
    pub fn new(id: u64, pid: impl Into<String>, origin: GeoPoint, depth_km: f64, time_sec: f64, config: Arc<Config>) -> Self {
        Self {
            id,
            pid: pid.into(),
            geometry: Mutex::new(Geometry { origin, depth_km, time_sec, bayes_value: 0.0 }),
            state: Mutex::new(HypoState::Pending),
            picks: Mutex::new(Vec::new()),
            correlations: Mutex::new(Vec::new()),
            process_count: AtomicU32::new(0),
            config,
        }
    }

    pub fn origin(&self) -> GeoPoint {
        self.geometry.lock().origin
    }

    pub fn depth_km(&self) -> f64 {
        self.geometry.lock().depth_km
    }

    pub fn time_sec(&self) -> f64 {
        self.geometry.lock().time_sec
    }

    pub fn bayes_value(&self) -> f64 {
        self.geometry.lock().bayes_value
    }

    /// Replaces the hypo's geometry after a relocation pass (spec.md §4.3).
    pub fn set_geometry(&self, origin: GeoPoint, depth_km: f64, time_sec: f64, bayes_value: f64) {
        let mut g = self.geometry.lock();
        g.origin = origin;
        g.depth_km = depth_km.clamp(0.0, self.config.maximum_depth_km);
        g.time_sec = time_sec;
        g.bayes_value = bayes_value;
    }

    pub fn state(&self) -> HypoState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: HypoState) {
        *self.state.lock() = state;
    }

    pub fn process_count(&self) -> u32 {
        self.process_count.load(Ordering::Relaxed)
    }

    pub fn increment_process_count(&self) -> u32 {
        self.process_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Whether this hypo has reprocessed without converging more times
    /// than `hypo_process_count_limit` allows (spec.md §6).
    pub fn exceeded_process_limit(&self) -> bool {
        self.process_count() >= self.config.hypo_process_count_limit
    }

    /// Links `pick` to this hypo and adds it to the local data list.
    /// Returns the hypo that previously held `pick`, if any, so the
    /// evolve loop can remove it from that hypo's list too.
    pub fn add_pick(self: &Arc<Self>, pick: Arc<Pick>) -> Option<Arc<Hypo>> {
        let previous = pick.associate(self);
        self.picks.lock().push(pick);
        previous
    }

    pub fn remove_pick(&self, pick_id: u64) {
        let mut picks = self.picks.lock();
        if let Some(pos) = picks.iter().position(|p| p.id == pick_id) {
            let pick = picks.remove(pos);
            pick.clear_association();
        }
    }

    pub fn picks(&self) -> Vec<Arc<Pick>> {
        self.picks.lock().clone()
    }

    pub fn num_picks(&self) -> usize {
        self.picks.lock().len()
    }

    pub fn add_correlation(self: &Arc<Self>, correlation: Arc<Correlation>) {
        correlation.associate(self);
        self.correlations.lock().push(correlation);
    }

    pub fn correlations(&self) -> Vec<Arc<Correlation>> {
        self.correlations.lock().clone()
    }

    pub fn num_correlations(&self) -> usize {
        self.correlations.lock().len()
    }

    pub fn num_associated_data(&self) -> usize {
        self.num_picks() + self.num_correlations()
    }

    /// The azimuthal gap in station coverage around this hypo's current
    /// origin (spec.md §4.4), computed from its associated picks' sites.
    pub fn azimuthal_gap_deg(&self) -> f64 {
        let origin = self.origin();
        let azimuths: Vec<f64> =
            self.picks.lock().iter().map(|p| origin.azimuth_deg(&p.site.position)).collect();
        azimuthal_gap_deg(azimuths)
    }

    /// Whether this hypo looks like a deep-event-detection fragment rather
    /// than a real event: a poorly-constrained azimuthal gap combined with
    /// an implausible depth (spec.md §4.4, `event_fragment_depth_threshold_km`
    /// / `event_fragment_azimuth_threshold_deg`).
    pub fn looks_like_fragment(&self) -> bool {
        self.depth_km() >= self.config.event_fragment_depth_threshold_km
            && self.azimuthal_gap_deg() >= self.config.event_fragment_azimuth_threshold_deg
    }

    /// Whether this hypo clears the bars to be promoted/reported
    /// (spec.md §4.2 step 5, §6 `reporting_stack_threshold`/`reporting_data_threshold`).
    pub fn clears_reporting_threshold(&self) -> bool {
        self.bayes_value() >= self.config.reporting_stack_threshold()
            && self.num_associated_data() as u32 >= self.config.reporting_data_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::{Site, SiteKey};

    fn config() -> Arc<Config> {
        Arc::new(Config::default())
    }

    fn hypo() -> Arc<Hypo> {
        Arc::new(Hypo::new(1, "h1", GeoPoint::new(0.0, 0.0), 10.0, 0.0, config()))
    }

    fn pick_at(id: u64, lat: f64, lon: f64) -> Arc<Pick> {
        let site = Arc::new(Site::new(SiteKey::new("XX", "AAA", "HHZ", "00"), GeoPoint::new(lat, lon), 0.0, 10));
        Arc::new(Pick::new(id, format!("p{id}"), site, 0.0, None, None))
    }

    #[test]
    fn new_hypo_starts_pending_with_no_data() {
        let h = hypo();
        assert_eq!(h.state(), HypoState::Pending);
        assert_eq!(h.num_associated_data(), 0);
    }

    #[test]
    fn add_pick_links_and_steals() {
        let h1 = hypo();
        let h2 = hypo();
        let pick = pick_at(1, 1.0, 1.0);
        assert!(h1.add_pick(pick.clone()).is_none());
        assert_eq!(h1.num_picks(), 1);

        let stolen_from = h2.add_pick(pick.clone());
        assert!(Arc::ptr_eq(&stolen_from.unwrap(), &h1));
        assert!(Arc::ptr_eq(&pick.hypo().unwrap(), &h2));
    }

    #[test]
    fn remove_pick_clears_association() {
        let h = hypo();
        let pick = pick_at(1, 1.0, 1.0);
        h.add_pick(pick.clone());
        h.remove_pick(pick.id);
        assert_eq!(h.num_picks(), 0);
        assert!(pick.is_free());
    }

    #[test]
    fn process_limit_trips_after_threshold() {
        let h = hypo();
        for _ in 0..h.config.hypo_process_count_limit {
            h.increment_process_count();
        }
        assert!(h.exceeded_process_limit());
    }

    #[test]
    fn fragment_requires_both_depth_and_gap() {
        let h = hypo();
        h.set_geometry(GeoPoint::new(0.0, 0.0), 600.0, 0.0, 5.0);
        h.add_pick(pick_at(1, 0.1, 0.0));
        assert!(h.looks_like_fragment());

        h.set_geometry(GeoPoint::new(0.0, 0.0), 10.0, 0.0, 5.0);
        assert!(!h.looks_like_fragment());
    }
}
