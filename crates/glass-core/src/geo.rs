//! Spherical-earth geometry helpers.
//!
//! Glass reasons about station/node positions on a sphere of radius
//! `EARTH_RADIUS_KM`, kept as its own small, single-purpose math module.

use std::f64::consts::PI;

/// Mean earth radius in kilometers, per spec.md §3.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A point on the sphere, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl GeoPoint {
    pub fn new(lat_deg: f64, lon_deg: f64) -> Self {
        Self { lat_deg, lon_deg }
    }

    fn lat_rad(&self) -> f64 {
        self.lat_deg.to_radians()
    }

    fn lon_rad(&self) -> f64 {
        self.lon_deg.to_radians()
    }

    /// Great-circle distance to `other`, in kilometers (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let d_lat = other.lat_rad() - self.lat_rad();
        let d_lon = other.lon_rad() - self.lon_rad();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat_rad().cos() * other.lat_rad().cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().asin();
        EARTH_RADIUS_KM * c
    }

    /// Great-circle distance to `other`, in degrees of arc.
    pub fn distance_deg(&self, other: &GeoPoint) -> f64 {
        km_to_deg(self.distance_km(other))
    }

    /// Initial bearing from `self` to `other`, in degrees [0, 360).
    pub fn azimuth_deg(&self, other: &GeoPoint) -> f64 {
        let d_lon = other.lon_rad() - self.lon_rad();
        let y = d_lon.sin() * other.lat_rad().cos();
        let x = self.lat_rad().cos() * other.lat_rad().sin()
            - self.lat_rad().sin() * other.lat_rad().cos() * d_lon.cos();
        let theta = y.atan2(x);
        (theta.to_degrees() + 360.0) % 360.0
    }
}

/// Converts kilometers of great-circle arc to degrees.
pub fn km_to_deg(km: f64) -> f64 {
    (km / EARTH_RADIUS_KM).to_degrees()
}

/// Converts degrees of great-circle arc to kilometers.
pub fn deg_to_km(deg: f64) -> f64 {
    deg.to_radians() * EARTH_RADIUS_KM
}

/// Given a sorted set of azimuths (degrees) from a hypocenter to its
/// associated stations, returns the largest gap between consecutive
/// azimuths (wrapping through 0/360), per spec.md §4.4's azimuthal-gap
/// cancellation criterion.
pub fn azimuthal_gap_deg(mut azimuths: Vec<f64>) -> f64 {
    if azimuths.len() < 2 {
        return 360.0;
    }
    azimuths.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mut max_gap = 0.0_f64;
    for w in azimuths.windows(2) {
        max_gap = max_gap.max(w[1] - w[0]);
    }
    let wrap_gap = azimuths[0] + 360.0 - azimuths[azimuths.len() - 1];
    max_gap.max(wrap_gap)
}

/// Smallest signed difference `a - b` between two bearings in degrees,
/// wrapped into `(-180, 180]`. Used to compare an observed backazimuth
/// against an expected one without a spurious jump across 0/360 (spec.md
/// §6 beam matching).
pub fn angular_difference_deg(a: f64, b: f64) -> f64 {
    let diff = (a - b) % 360.0;
    if diff > 180.0 {
        diff - 360.0
    } else if diff <= -180.0 {
        diff + 360.0
    } else {
        diff
    }
}

/// The mean of the angular distances in `radius_rad`; used by the default
/// station-distance taper in node stacking (spec.md §4.1).
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// The median of `values`. Used by the evolve loop's distance-cutoff
/// calculation (spec.md §4.4).
pub fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Standard normal PDF, used by the annealing objective's Gaussian term.
pub fn gaussian_log_density(residual: f64, sigma: f64) -> f64 {
    let z = residual / sigma;
    -0.5 * z * z - (sigma * (2.0 * PI).sqrt()).ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_zero_for_identical_points() {
        let p = GeoPoint::new(40.0, -120.0);
        assert!(p.distance_km(&p) < 1e-9);
    }

    #[test]
    fn distance_one_degree_latitude_is_about_111km() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        let d = a.distance_km(&b);
        assert!((d - 111.19).abs() < 0.5, "got {d}");
    }

    #[test]
    fn azimuth_due_north_is_zero() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(1.0, 0.0);
        assert!(a.azimuth_deg(&b).abs() < 1e-6);
    }

    #[test]
    fn azimuthal_gap_full_ring_is_small() {
        let azs: Vec<f64> = (0..8).map(|i| i as f64 * 45.0).collect();
        let gap = azimuthal_gap_deg(azs);
        assert!((gap - 45.0).abs() < 1e-6);
    }

    #[test]
    fn azimuthal_gap_single_station_is_full_circle() {
        assert_eq!(azimuthal_gap_deg(vec![10.0]), 360.0);
    }

    #[test]
    fn angular_difference_wraps_across_zero() {
        assert!((angular_difference_deg(5.0, 355.0) - 10.0).abs() < 1e-9);
        assert!((angular_difference_deg(355.0, 5.0) + 10.0).abs() < 1e-9);
        assert!((angular_difference_deg(10.0, 200.0) - 170.0).abs() < 1e-9);
    }

    #[test]
    fn median_odd_even() {
        let mut odd = vec![3.0, 1.0, 2.0];
        assert_eq!(median(&mut odd), 2.0);
        let mut even = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(median(&mut even), 2.5);
    }
}
