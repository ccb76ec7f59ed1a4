//! Bounded, time-ordered stores for picks, correlations, and hypos
//! (spec.md §4.5). Each list enforces a capacity (`max_num_picks`,
//! `max_num_hypos`, `max_num_correlations`; `-1` means unbounded) by
//! evicting its oldest entry, and backs the id-based lookups the evolve
//! and nucleation passes need.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::correlation::Correlation;
use crate::error::{GlassError, Result};
use crate::geo::GeoPoint;
use crate::hypo::{Hypo, HypoState};
use crate::ids::IdGenerator;
use crate::pick::Pick;
use crate::site::{Site, SiteKey, SiteList};

fn bounded(len: usize, max: i64) -> bool {
    max >= 0 && len as i64 > max
}

/// All picks currently known to the engine, ordered by arrival time.
pub struct PickList {
    config: Arc<Config>,
    sites: Arc<SiteList>,
    ids: IdGenerator,
    entries: Mutex<VecDeque<Arc<Pick>>>,
    by_id: Mutex<HashMap<u64, Arc<Pick>>>,
}

impl PickList {
    pub fn new(config: Arc<Config>, sites: Arc<SiteList>) -> Self {
        Self { config, sites, ids: IdGenerator::new(), entries: Mutex::new(VecDeque::new()), by_id: Mutex::new(HashMap::new()) }
    }

    /// Admits a new phase pick (spec.md §3/§4.5). Rejects picks that
    /// duplicate an existing one at the same site within
    /// `pick_duplicate_time_window_sec`, unless `allow_pick_updates` is
    /// set, in which case the stale pick is evicted first.
    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &self,
        external_id: impl Into<String>,
        site_key: SiteKey,
        site_position: GeoPoint,
        site_elevation_km: f64,
        time_sec: f64,
        backazimuth_deg: Option<f64>,
        slowness_sec_per_deg: Option<f64>,
    ) -> Result<Arc<Pick>> {
        let site = self.sites.get_or_create(site_key, site_position, site_elevation_km);

        if self.config.site_maximum_picks_per_hour > 0 {
            let picks_per_hour = site.picks_per_hour();
            if picks_per_hour >= self.config.site_maximum_picks_per_hour as usize {
                return Err(GlassError::SiteThrottled { site: site.key.to_string(), picks_per_hour });
            }
        }

        if let Some(duplicate_id) = self.find_duplicate(&site, time_sec) {
            if self.config.allow_pick_updates {
                self.remove(duplicate_id);
            } else {
                return Err(GlassError::DuplicatePick { site: site.key.to_string(), time_sec });
            }
        }

        let id = self.ids.next();
        let pick = Arc::new(Pick::new(id, external_id, site.clone(), time_sec, backazimuth_deg, slowness_sec_per_deg));
        site.record_pick(id, time_sec);

        let mut entries = self.entries.lock();
        let pos = entries.partition_point(|p| p.time_sec <= time_sec);
        entries.insert(pos, pick.clone());
        self.by_id.lock().insert(id, pick.clone());
        drop(entries);

        self.evict_if_over_capacity();
        Ok(pick)
    }

    fn find_duplicate(&self, site: &Arc<Site>, time_sec: f64) -> Option<u64> {
        let by_id = self.by_id.lock();
        site.recent_pick_ids().into_iter().find(|id| {
            by_id.get(id).is_some_and(|p| (p.time_sec - time_sec).abs() <= self.config.pick_duplicate_time_window_sec)
        })
    }

    pub fn get(&self, id: u64) -> Option<Arc<Pick>> {
        self.by_id.lock().get(&id).cloned()
    }

    pub fn remove(&self, id: u64) -> Option<Arc<Pick>> {
        let removed = self.by_id.lock().remove(&id);
        if removed.is_some() {
            self.entries.lock().retain(|p| p.id != id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<Arc<Pick>> {
        self.entries.lock().iter().cloned().collect()
    }

    /// Picks not currently claimed by any hypo, the nucleation pass's
    /// working set (spec.md §4.1).
    pub fn free_picks(&self) -> Vec<Arc<Pick>> {
        self.entries.lock().iter().filter(|p| p.is_free()).cloned().collect()
    }

    fn evict_if_over_capacity(&self) {
        let mut entries = self.entries.lock();
        while bounded(entries.len(), self.config.max_num_picks) {
            if let Some(oldest) = entries.pop_front() {
                oldest.clear_association();
                self.by_id.lock().remove(&oldest.id);
            } else {
                break;
            }
        }
    }
}

/// All waveform correlations known to the engine, ordered by time.
pub struct CorrelationList {
    config: Arc<Config>,
    sites: Arc<SiteList>,
    ids: IdGenerator,
    entries: Mutex<VecDeque<Arc<Correlation>>>,
    by_id: Mutex<HashMap<u64, Arc<Correlation>>>,
}

impl CorrelationList {
    pub fn new(config: Arc<Config>, sites: Arc<SiteList>) -> Self {
        Self { config, sites, ids: IdGenerator::new(), entries: Mutex::new(VecDeque::new()), by_id: Mutex::new(HashMap::new()) }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add(
        &self,
        external_id: impl Into<String>,
        site_key: SiteKey,
        site_position: GeoPoint,
        site_elevation_km: f64,
        time_sec: f64,
        origin: GeoPoint,
        depth_km: f64,
        correlation_value: f64,
    ) -> Arc<Correlation> {
        let site = self.sites.get_or_create(site_key, site_position, site_elevation_km);
        let id = self.ids.next();
        let correlation = Arc::new(Correlation::new(id, external_id, site, time_sec, origin, depth_km, correlation_value));

        let mut entries = self.entries.lock();
        let pos = entries.partition_point(|c| c.time_sec <= time_sec);
        entries.insert(pos, correlation.clone());
        self.by_id.lock().insert(id, correlation.clone());
        drop(entries);

        self.evict_if_over_capacity();
        correlation
    }

    pub fn get(&self, id: u64) -> Option<Arc<Correlation>> {
        self.by_id.lock().get(&id).cloned()
    }

    pub fn remove(&self, id: u64) -> Option<Arc<Correlation>> {
        let removed = self.by_id.lock().remove(&id);
        if removed.is_some() {
            self.entries.lock().retain(|c| c.id != id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<Arc<Correlation>> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn free_correlations(&self) -> Vec<Arc<Correlation>> {
        self.entries.lock().iter().filter(|c| c.hypo().is_none()).cloned().collect()
    }

    /// Finds an existing correlation that `origin`/`time_sec` matches
    /// within the configured windows (spec.md §6), used to fold a new
    /// correlation into an already-seeded hypo instead of nucleating a
    /// second one.
    pub fn find_matching(&self, time_sec: f64, origin: GeoPoint) -> Option<Arc<Correlation>> {
        self.entries.lock().iter().find(|c| {
            c.matches(time_sec, origin, self.config.correlation_time_window_sec, self.config.correlation_distance_window_deg)
        }).cloned()
    }

    fn evict_if_over_capacity(&self) {
        let mut entries = self.entries.lock();
        while bounded(entries.len(), self.config.max_num_correlations) {
            if let Some(oldest) = entries.pop_front() {
                oldest.clear_association();
                self.by_id.lock().remove(&oldest.id);
            } else {
                break;
            }
        }
    }
}

/// All hypocenter hypotheses currently tracked, newest-created last.
/// Unlike picks/correlations, a hypo's time and origin drift as it
/// evolves, so entries are kept in creation order rather than resorted.
pub struct HypoList {
    config: Arc<Config>,
    ids: IdGenerator,
    entries: Mutex<VecDeque<Arc<Hypo>>>,
    by_id: Mutex<HashMap<u64, Arc<Hypo>>>,
}

impl HypoList {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config: config.clone(), ids: IdGenerator::new(), entries: Mutex::new(VecDeque::new()), by_id: Mutex::new(HashMap::new()) }
    }

    pub fn create(&self, pid: impl Into<String>, origin: GeoPoint, depth_km: f64, time_sec: f64) -> Arc<Hypo> {
        let id = self.ids.next();
        let hypo = Arc::new(Hypo::new(id, pid, origin, depth_km, time_sec, self.config.clone()));
        self.entries.lock().push_back(hypo.clone());
        self.by_id.lock().insert(id, hypo.clone());
        self.evict_if_over_capacity();
        hypo
    }

    pub fn get(&self, id: u64) -> Option<Arc<Hypo>> {
        self.by_id.lock().get(&id).cloned()
    }

    /// Looks up a hypo by its external pid string, used by `ReqHypo`
    /// (spec.md §6).
    pub fn find_by_pid(&self, pid: &str) -> Option<Arc<Hypo>> {
        self.entries.lock().iter().find(|h| h.pid == pid).cloned()
    }

    pub fn remove(&self, id: u64) -> Option<Arc<Hypo>> {
        let removed = self.by_id.lock().remove(&id);
        if removed.is_some() {
            self.entries.lock().retain(|h| h.id != id);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<Arc<Hypo>> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn active(&self) -> Vec<Arc<Hypo>> {
        self.all().into_iter().filter(|h| h.state() != HypoState::Canceled).collect()
    }

    /// Finds a hypo close enough in time and space to `origin`/`time_sec`
    /// to be a merge candidate (spec.md §4.4 `hypo_merging_time_window_sec`
    /// / `_distance_window_deg`), excluding `exclude_id` itself.
    pub fn find_merge_candidate(&self, exclude_id: u64, origin: GeoPoint, time_sec: f64) -> Option<Arc<Hypo>> {
        self.active().into_iter().find(|h| {
            h.id != exclude_id
                && (h.time_sec() - time_sec).abs() <= self.config.hypo_merging_time_window_sec
                && h.origin().distance_deg(&origin) <= self.config.hypo_merging_distance_window_deg
        })
    }

    fn evict_if_over_capacity(&self) {
        let mut entries = self.entries.lock();
        while bounded(entries.len(), self.config.max_num_hypos) {
            if let Some(oldest) = entries.pop_front() {
                oldest.set_state(HypoState::Canceled);
                self.by_id.lock().remove(&oldest.id);
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_pick_cap(n: i64) -> Arc<Config> {
        let mut c = Config::default();
        c.max_num_picks = n;
        Arc::new(c)
    }

    fn key(sta: &str) -> SiteKey {
        SiteKey::new("XX", sta, "HHZ", "00")
    }

    #[test]
    fn rejects_duplicate_picks_by_default() {
        let config = Arc::new(Config::default());
        let sites = Arc::new(SiteList::new(config.max_picks_per_site as usize));
        let list = PickList::new(config, sites);
        list.add("p1", key("AAA"), GeoPoint::new(0.0, 0.0), 0.0, 100.0, None, None).unwrap();
        let err = list.add("p2", key("AAA"), GeoPoint::new(0.0, 0.0), 0.0, 101.0, None, None);
        assert!(matches!(err, Err(GlassError::DuplicatePick { .. })));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn allow_pick_updates_replaces_duplicate() {
        let mut c = Config::default();
        c.allow_pick_updates = true;
        let config = Arc::new(c);
        let sites = Arc::new(SiteList::new(config.max_picks_per_site as usize));
        let list = PickList::new(config, sites);
        list.add("p1", key("AAA"), GeoPoint::new(0.0, 0.0), 0.0, 100.0, None, None).unwrap();
        let updated = list.add("p2", key("AAA"), GeoPoint::new(0.0, 0.0), 0.0, 100.5, None, None).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list.all()[0].id, updated.id);
    }

    #[test]
    fn throttles_a_site_over_its_hourly_pick_limit() {
        let mut c = Config::default();
        c.site_maximum_picks_per_hour = 2;
        let config = Arc::new(c);
        let sites = Arc::new(SiteList::new(config.max_picks_per_site as usize));
        let list = PickList::new(config, sites);
        list.add("p1", key("AAA"), GeoPoint::new(0.0, 0.0), 0.0, 100.0, None, None).unwrap();
        list.add("p2", key("AAA"), GeoPoint::new(0.0, 0.0), 0.0, 200.0, None, None).unwrap();
        let err = list.add("p3", key("AAA"), GeoPoint::new(0.0, 0.0), 0.0, 300.0, None, None);
        assert!(matches!(err, Err(GlassError::SiteThrottled { .. })));
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn pick_list_evicts_oldest_beyond_capacity() {
        let config = config_with_pick_cap(2);
        let sites = Arc::new(SiteList::new(10));
        let list = PickList::new(config, sites);
        let p1 = list.add("p1", key("AAA"), GeoPoint::new(0.0, 0.0), 0.0, 100.0, None, None).unwrap();
        list.add("p2", key("BBB"), GeoPoint::new(0.0, 0.0), 0.0, 200.0, None, None).unwrap();
        list.add("p3", key("CCC"), GeoPoint::new(0.0, 0.0), 0.0, 300.0, None, None).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.get(p1.id).is_none());
    }

    #[test]
    fn hypo_list_finds_merge_candidates_within_window() {
        let config = Arc::new(Config::default());
        let list = HypoList::new(config);
        let h1 = list.create("h1", GeoPoint::new(0.0, 0.0), 10.0, 1000.0);
        let found = list.find_merge_candidate(999, GeoPoint::new(0.5, 0.5), 1010.0);
        assert!(found.is_some());
        assert_eq!(found.unwrap().id, h1.id);

        let not_found = list.find_merge_candidate(999, GeoPoint::new(20.0, 20.0), 1010.0);
        assert!(not_found.is_none());
    }
}
