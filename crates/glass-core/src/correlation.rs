//! Waveform-correlation observations (spec.md §3 "Correlation").
//!
//! A correlation carries its own prior hypocentral estimate (from the
//! correlation detector that produced it), unlike a bare phase pick.
//! It can seed a hypo directly, or confirm/merge with an existing one
//! inside `correlation_time_window_sec` / `correlation_distance_window_deg`
//! (spec.md §6).

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::geo::GeoPoint;
use crate::hypo::Hypo;
use crate::site::Site;

#[derive(Debug)]
pub struct Correlation {
    pub id: u64,
    pub external_id: String,
    pub site: Arc<Site>,
    pub time_sec: f64,
    /// The correlation detector's own origin estimate.
    pub origin: GeoPoint,
    pub depth_km: f64,
    /// Correlation coefficient reported by the detector, in `[0, 1]`.
    pub correlation_value: f64,

    hypo: Mutex<Weak<Hypo>>,
}

impl Correlation {
    pub fn new(
        id: u64,
        external_id: impl Into<String>,
        site: Arc<Site>,
        time_sec: f64,
        origin: GeoPoint,
        depth_km: f64,
        correlation_value: f64,
    ) -> Self {
        Self {
            id,
            external_id: external_id.into(),
            site,
            time_sec,
            origin,
            depth_km,
            correlation_value,
            hypo: Mutex::new(Weak::new()),
        }
    }

    pub fn hypo(&self) -> Option<Arc<Hypo>> {
        self.hypo.lock().upgrade()
    }

    pub fn associate(&self, hypo: &Arc<Hypo>) {
        *self.hypo.lock() = Arc::downgrade(hypo);
    }

    pub fn clear_association(&self) {
        *self.hypo.lock() = Weak::new();
    }

    /// Whether `other` falls inside this correlation's matching window
    /// (spec.md §6 `correlation_time_window_sec` / `_distance_window_deg`).
    pub fn matches(&self, other_time_sec: f64, other_origin: GeoPoint, time_window_sec: f64, distance_window_deg: f64) -> bool {
        (self.time_sec - other_time_sec).abs() <= time_window_sec
            && self.origin.distance_deg(&other_origin) <= distance_window_deg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::SiteKey;

    fn site() -> Arc<Site> {
        Arc::new(Site::new(SiteKey::new("XX", "AAA", "HHZ", "00"), GeoPoint::new(0.0, 0.0), 0.0, 10))
    }

    #[test]
    fn matches_within_window() {
        let c = Correlation::new(1, "c1", site(), 100.0, GeoPoint::new(10.0, 10.0), 5.0, 0.8);
        assert!(c.matches(101.0, GeoPoint::new(10.0, 10.0), 2.5, 0.5));
        assert!(!c.matches(200.0, GeoPoint::new(10.0, 10.0), 2.5, 0.5));
        assert!(!c.matches(101.0, GeoPoint::new(50.0, 50.0), 2.5, 0.5));
    }
}
