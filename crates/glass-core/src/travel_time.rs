//! The travel-time provider contract.
//!
//! spec.md §1 treats travel-time table computation as an external
//! collaborator: "The core requires from a travel-time provider the
//! operations `T(phase, delta)` -> seconds and `bestT(delta)` ->
//! (phase, seconds) with an ability to seed an origin (lat, lon, depth)."
//! §5 adds that providers are not thread-safe and each worker clones its
//! own instance from a master.

use crate::geo::GeoPoint;

/// A phase name, e.g. "P", "S", "PKPdf".
pub type Phase = String;

/// The taper applied to a phase's travel-time residual, per spec.md §4.3:
/// zero weight outside `[r0, r3]`, full weight in `[f0, f1]`, linear
/// ramps between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeTaper {
    pub r0: f64,
    pub f0: f64,
    pub f1: f64,
    pub r3: f64,
}

impl RangeTaper {
    /// Evaluates the taper weight in `[0, 1]` at distance `delta_deg`.
    pub fn weight(&self, delta_deg: f64) -> f64 {
        if delta_deg <= self.r0 || delta_deg >= self.r3 {
            return 0.0;
        }
        if delta_deg >= self.f0 && delta_deg <= self.f1 {
            return 1.0;
        }
        if delta_deg < self.f0 {
            return (delta_deg - self.r0) / (self.f0 - self.r0);
        }
        (self.r3 - delta_deg) / (self.r3 - self.f1)
    }
}

/// Implemented by whatever supplies travel-time curves to the engine.
/// Not required to be `Send + Sync`; per spec.md §5 each worker owns a
/// clone seeded from the master instance.
pub trait TravelTimeProvider {
    /// Re-seeds the provider's internal ray-path state for a new origin.
    /// Implementations that don't depend on origin (e.g. a 1-D model) may
    /// no-op.
    fn set_origin(&mut self, origin: GeoPoint, depth_km: f64);

    /// Predicted travel time in seconds for `phase` at angular distance
    /// `delta_deg`, or `None` if the phase doesn't exist at that distance.
    fn travel_time(&self, phase: &str, delta_deg: f64) -> Option<f64>;

    /// The best (first-arriving, typically) phase and its travel time at
    /// `delta_deg`.
    fn best_travel_time(&self, delta_deg: f64) -> Option<(Phase, f64)>;

    /// The taper configuration for `phase`, used to down-weight picks
    /// outside its valid distance range (spec.md §4.3).
    fn range_taper(&self, phase: &str) -> RangeTaper;

    /// Clones this provider into a fresh, independently-seedable instance
    /// for a worker thread (spec.md §5: "each worker owns a cloned
    /// instance seeded from the master").
    fn clone_box(&self) -> Box<dyn TravelTimeProvider + Send>;
}

/// A minimal travel-time model sufficient for the literal end-to-end
/// scenarios in spec.md §8 and for tests: constant apparent velocities for
/// "P" and "S", straight-line distance, no depth phases. Real deployments
/// supply their own provider (earth-model computation is out of scope,
/// spec.md §1).
#[derive(Debug, Clone)]
pub struct LinearTravelTime {
    /// km/s apparent velocity per phase.
    velocities_km_per_sec: Vec<(String, f64)>,
    taper: RangeTaper,
}

impl LinearTravelTime {
    pub fn new() -> Self {
        Self {
            velocities_km_per_sec: vec![("P".to_string(), 8.0), ("S".to_string(), 4.5)],
            taper: RangeTaper { r0: 0.0, f0: 0.0, f1: 95.0, r3: 100.0 },
        }
    }

    fn velocity(&self, phase: &str) -> Option<f64> {
        self.velocities_km_per_sec.iter().find(|(p, _)| p == phase).map(|(_, v)| *v)
    }
}

impl Default for LinearTravelTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TravelTimeProvider for LinearTravelTime {
    fn set_origin(&mut self, _origin: GeoPoint, _depth_km: f64) {
        // Pure-geometry model: travel time is a function of delta alone.
    }

    fn travel_time(&self, phase: &str, delta_deg: f64) -> Option<f64> {
        let v = self.velocity(phase)?;
        let km = crate::geo::deg_to_km(delta_deg);
        Some(km / v)
    }

    fn best_travel_time(&self, delta_deg: f64) -> Option<(Phase, f64)> {
        self.travel_time("P", delta_deg).map(|t| ("P".to_string(), t))
    }

    fn range_taper(&self, _phase: &str) -> RangeTaper {
        self.taper
    }

    fn clone_box(&self) -> Box<dyn TravelTimeProvider + Send> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_travel_time_scales_with_distance() {
        let tt = LinearTravelTime::new();
        let t1 = tt.travel_time("P", 1.0).unwrap();
        let t2 = tt.travel_time("P", 2.0).unwrap();
        assert!(t2 > t1);
        assert!((t2 - 2.0 * t1).abs() < 1e-9);
    }

    #[test]
    fn unknown_phase_returns_none() {
        let tt = LinearTravelTime::new();
        assert!(tt.travel_time("PKPdf", 1.0).is_none());
    }

    #[test]
    fn range_taper_shape() {
        let taper = RangeTaper { r0: 0.0, f0: 10.0, f1: 90.0, r3: 100.0 };
        assert_eq!(taper.weight(-1.0), 0.0);
        assert_eq!(taper.weight(101.0), 0.0);
        assert_eq!(taper.weight(50.0), 1.0);
        assert!((taper.weight(5.0) - 0.5).abs() < 1e-9);
        assert!((taper.weight(95.0) - 0.5).abs() < 1e-9);
    }
}
