//! Station metadata and the site registry (spec.md §3 "Site"/"SiteList").

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::geo::GeoPoint;

/// A station's (network, station, channel, location) identity, matching
/// the SEED naming convention used in the inbound pick messages
/// (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SiteKey {
    pub network: String,
    pub station: String,
    pub channel: String,
    pub location: String,
}

impl SiteKey {
    pub fn new(
        network: impl Into<String>,
        station: impl Into<String>,
        channel: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            station: station.into(),
            channel: channel.into(),
            location: location.into(),
        }
    }
}

impl std::fmt::Display for SiteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}.{}", self.network, self.station, self.channel, self.location)
    }
}

/// A known seismic station. Created on first reference or by station-list
/// load, destroyed only at shutdown (spec.md §3). Sites own their local
/// pick ring; the ring holds non-owning pick ids, since picks themselves
/// live in the global `PickList`.
#[derive(Debug)]
pub struct Site {
    pub key: SiteKey,
    pub position: GeoPoint,
    pub elevation_km: f64,
    enabled: std::sync::atomic::AtomicBool,
    recent_pick_ids: Mutex<VecDeque<u64>>,
    max_picks: usize,
    last_pick_time_sec: Mutex<Option<f64>>,
    pick_count_in_window: Mutex<VecDeque<f64>>,
}

impl Site {
    pub fn new(key: SiteKey, position: GeoPoint, elevation_km: f64, max_picks: usize) -> Self {
        Self {
            key,
            position,
            elevation_km,
            enabled: std::sync::atomic::AtomicBool::new(true),
            recent_pick_ids: Mutex::new(VecDeque::new()),
            max_picks: max_picks.max(1),
            last_pick_time_sec: Mutex::new(None),
            pick_count_in_window: Mutex::new(VecDeque::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(std::sync::atomic::Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, std::sync::atomic::Ordering::Relaxed);
    }

    /// Records a newly-admitted pick in this site's ring, bounded by
    /// `MaxPicksPerSite` (spec.md §3), and updates the hourly pick-rate
    /// window used for site health.
    pub fn record_pick(&self, pick_id: u64, time_sec: f64) {
        let mut ring = self.recent_pick_ids.lock();
        ring.push_back(pick_id);
        while ring.len() > self.max_picks {
            ring.pop_front();
        }
        drop(ring);

        *self.last_pick_time_sec.lock() = Some(time_sec);

        let mut window = self.pick_count_in_window.lock();
        window.push_back(time_sec);
        while window.front().is_some_and(|&t| time_sec - t > 3600.0) {
            window.pop_front();
        }
    }

    pub fn last_pick_time_sec(&self) -> Option<f64> {
        *self.last_pick_time_sec.lock()
    }

    /// Picks seen by this site in the trailing hour.
    pub fn picks_per_hour(&self) -> usize {
        self.pick_count_in_window.lock().len()
    }

    pub fn recent_pick_ids(&self) -> Vec<u64> {
        self.recent_pick_ids.lock().iter().copied().collect()
    }

    /// Whether this site hasn't reported a pick in more than
    /// `hours_without_picking`, per spec.md §6's `SiteHoursWithoutPicking`.
    pub fn is_stale(&self, now_sec: f64, hours_without_picking: f64) -> bool {
        match self.last_pick_time_sec() {
            None => false,
            Some(t) => (now_sec - t) / 3600.0 > hours_without_picking,
        }
    }
}

/// The registry of all known stations, looked up by `(net, sta, chan,
/// loc)` (spec.md §3).
#[derive(Debug, Default)]
pub struct SiteList {
    sites: Mutex<HashMap<SiteKey, Arc<Site>>>,
    max_picks_per_site: usize,
}

impl SiteList {
    pub fn new(max_picks_per_site: usize) -> Self {
        Self { sites: Mutex::new(HashMap::new()), max_picks_per_site }
    }

    /// Looks up a site, or creates it on first reference (spec.md §3).
    pub fn get_or_create(
        &self,
        key: SiteKey,
        position: GeoPoint,
        elevation_km: f64,
    ) -> Arc<Site> {
        let mut sites = self.sites.lock();
        sites
            .entry(key.clone())
            .or_insert_with(|| {
                Arc::new(Site::new(key, position, elevation_km, self.max_picks_per_site))
            })
            .clone()
    }

    pub fn get(&self, key: &SiteKey) -> Option<Arc<Site>> {
        self.sites.lock().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.sites.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn all(&self) -> Vec<Arc<Site>> {
        self.sites.lock().values().cloned().collect()
    }

    pub fn enabled_sites(&self) -> Vec<Arc<Site>> {
        self.all().into_iter().filter(|s| s.is_enabled()).collect()
    }

    /// Sites that haven't reported a pick recently enough, for health
    /// reporting (spec.md §6 `SiteHoursWithoutPicking`).
    pub fn stale_sites(&self, now_sec: f64, hours_without_picking: f64) -> Vec<Arc<Site>> {
        self.all().into_iter().filter(|s| s.is_stale(now_sec, hours_without_picking)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(sta: &str) -> SiteKey {
        SiteKey::new("XX", sta, "HHZ", "00")
    }

    #[test]
    fn get_or_create_is_idempotent() {
        let list = SiteList::new(10);
        let a = list.get_or_create(key("AAA"), GeoPoint::new(0.0, 0.0), 0.0);
        let b = list.get_or_create(key("AAA"), GeoPoint::new(1.0, 1.0), 0.0);
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn pick_ring_is_bounded() {
        let site = Site::new(key("AAA"), GeoPoint::new(0.0, 0.0), 0.0, 3);
        for i in 0..10 {
            site.record_pick(i, i as f64);
        }
        assert_eq!(site.recent_pick_ids(), vec![7, 8, 9]);
    }

    #[test]
    fn stale_detection() {
        let site = Site::new(key("AAA"), GeoPoint::new(0.0, 0.0), 0.0, 10);
        assert!(!site.is_stale(1000.0, 24.0));
        site.record_pick(1, 0.0);
        assert!(site.is_stale(100_000.0, 24.0));
        assert!(!site.is_stale(1000.0, 24.0));
    }
}
