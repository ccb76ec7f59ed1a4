//! Tracks site positions learned from `SiteList`/`Site` wire messages
//! (spec.md §6). `glass_core::SiteList` only registers a site the first
//! time a pick arrives for it, so the orchestrator keeps its own
//! position lookup ahead of that: a `Pick` message carries a station
//! identity but not a position, so position must already be known.

use std::collections::HashMap;

use glass_core::geo::GeoPoint;
use glass_core::site::SiteKey;
use glass_proto::SiteListEntry;
use parking_lot::RwLock;

#[derive(Debug, Clone, Copy)]
pub struct SiteLocation {
    pub position: GeoPoint,
    pub elevation_km: f64,
    pub enabled: bool,
}

#[derive(Default)]
pub struct SiteRegistry {
    locations: RwLock<HashMap<SiteKey, SiteLocation>>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: &SiteListEntry) {
        let key = SiteKey::new(&entry.site.network, &entry.site.station, &entry.site.channel, &entry.site.location);
        let location = SiteLocation {
            position: GeoPoint::new(entry.latitude_deg, entry.longitude_deg),
            elevation_km: entry.elevation_km,
            enabled: entry.enable,
        };
        self.locations.write().insert(key, location);
    }

    pub fn insert_all(&self, entries: &[SiteListEntry]) {
        for entry in entries {
            self.insert(entry);
        }
    }

    pub fn lookup(&self, key: &SiteKey) -> Option<SiteLocation> {
        self.locations.read().get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.locations.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glass_proto::SiteRef;

    fn entry(sta: &str, lat: f64, lon: f64) -> SiteListEntry {
        SiteListEntry {
            site: SiteRef { station: sta.into(), channel: "HHZ".into(), network: "XX".into(), location: "00".into() },
            latitude_deg: lat,
            longitude_deg: lon,
            elevation_km: 0.0,
            enable: true,
        }
    }

    #[test]
    fn lookup_after_insert() {
        let registry = SiteRegistry::new();
        registry.insert(&entry("AAA", 1.0, 2.0));
        let key = SiteKey::new("XX", "AAA", "HHZ", "00");
        let loc = registry.lookup(&key).unwrap();
        assert_eq!(loc.position.lat_deg, 1.0);
        assert!(loc.enabled);
    }

    #[test]
    fn unknown_site_is_none() {
        let registry = SiteRegistry::new();
        assert!(registry.lookup(&SiteKey::new("XX", "ZZZ", "HHZ", "00")).is_none());
    }
}
