//! Phase-pick observations (spec.md §3 "Pick").

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::hypo::Hypo;
use crate::site::Site;

/// Whether a pick is currently tied to a hypothesis. A pick starts
/// `Unassociated`, becomes `Associated` once some hypo claims it during
/// nucleation or evolution, and can be kicked back to `Unassociated` if
/// later pruned (spec.md §4.4 "pruning").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignState {
    Unassociated,
    Associated,
}

/// A single phase-pick observation (spec.md §3). Observation fields
/// (`site`, `time_sec`, backazimuth/slowness) never change after
/// construction; only the hypo link and assign state are mutable, and
/// only while holding this pick's own lock.
#[derive(Debug)]
pub struct Pick {
    pub id: u64,
    pub external_id: String,
    pub site: Arc<Site>,
    pub time_sec: f64,
    pub backazimuth_deg: Option<f64>,
    pub slowness_sec_per_deg: Option<f64>,

    hypo: Mutex<Weak<Hypo>>,
    state: Mutex<AssignState>,
    /// Diagnostic-only field carried from the original phase classifier
    /// (e.g. "P", "S"); never used to gate association (spec.md §11).
    associated_phase: Mutex<Option<String>>,
}

impl Pick {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u64,
        external_id: impl Into<String>,
        site: Arc<Site>,
        time_sec: f64,
        backazimuth_deg: Option<f64>,
        slowness_sec_per_deg: Option<f64>,
    ) -> Self {
        Self {
            id,
            external_id: external_id.into(),
            site,
            time_sec,
            backazimuth_deg,
            slowness_sec_per_deg,
            hypo: Mutex::new(Weak::new()),
            state: Mutex::new(AssignState::Unassociated),
            associated_phase: Mutex::new(None),
        }
    }

    pub fn state(&self) -> AssignState {
        *self.state.lock()
    }

    pub fn hypo(&self) -> Option<Arc<Hypo>> {
        self.hypo.lock().upgrade()
    }

    pub fn is_free(&self) -> bool {
        self.hypo().is_none()
    }

    /// Links this pick to `hypo`, marking it associated. Returns the
    /// previously-linked hypo, if any (used by callers that need to know
    /// whether this pick is being stolen from another hypothesis).
    pub fn associate(&self, hypo: &Arc<Hypo>) -> Option<Arc<Hypo>> {
        let previous = self.hypo().filter(|h| !Arc::ptr_eq(h, hypo));
        *self.hypo.lock() = Arc::downgrade(hypo);
        *self.state.lock() = AssignState::Associated;
        previous
    }

    /// Unlinks this pick from whatever hypo holds it (spec.md §4.4 pruning).
    pub fn clear_association(&self) {
        *self.hypo.lock() = Weak::new();
        *self.state.lock() = AssignState::Unassociated;
    }

    pub fn associated_phase(&self) -> Option<String> {
        self.associated_phase.lock().clone()
    }

    pub fn set_associated_phase(&self, phase: impl Into<String>) {
        *self.associated_phase.lock() = Some(phase.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::geo::GeoPoint;
    use crate::site::SiteKey;
    use std::sync::Arc;

    fn site() -> Arc<Site> {
        Arc::new(Site::new(SiteKey::new("XX", "AAA", "HHZ", "00"), GeoPoint::new(0.0, 0.0), 0.0, 10))
    }

    fn hypo() -> Arc<Hypo> {
        Arc::new(Hypo::new(1, "h1".to_string(), GeoPoint::new(0.0, 0.0), 10.0, 0.0, Arc::new(Config::default())))
    }

    #[test]
    fn starts_unassociated() {
        let p = Pick::new(1, "p1", site(), 0.0, None, None);
        assert_eq!(p.state(), AssignState::Unassociated);
        assert!(p.is_free());
    }

    #[test]
    fn associate_and_clear() {
        let p = Pick::new(1, "p1", site(), 0.0, None, None);
        let h = hypo();
        assert!(p.associate(&h).is_none());
        assert_eq!(p.state(), AssignState::Associated);
        assert!(Arc::ptr_eq(&p.hypo().unwrap(), &h));

        p.clear_association();
        assert_eq!(p.state(), AssignState::Unassociated);
        assert!(p.hypo().is_none());
    }

    #[test]
    fn reassociating_returns_previous_hypo() {
        let p = Pick::new(1, "p1", site(), 0.0, None, None);
        let h1 = hypo();
        let h2 = hypo();
        p.associate(&h1);
        let stolen_from = p.associate(&h2);
        assert!(Arc::ptr_eq(&stolen_from.unwrap(), &h1));
    }
}
