//! Hypocenter relocation (spec.md §4.3): simulated-annealing search over
//! (origin, depth, time) that maximizes the Bayesian pick stack, with an
//! optional L1-residual locator (spec.md §6 `use_l1_residual_locator`) for
//! callers that want a more robust-but-less-probabilistic fit.

use rand::Rng;

use crate::config::Config;
use crate::geo::{gaussian_log_density, GeoPoint};
use crate::pick::Pick;
use crate::travel_time::TravelTimeProvider;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Solution {
    pub origin: GeoPoint,
    pub depth_km: f64,
    pub time_sec: f64,
    pub bayes_value: f64,
}

/// Evaluates the Bayesian stack value of `solution` against `picks`: the
/// sum, over picks within the phase's valid range, of a Gaussian density
/// in the travel-time residual (spec.md §4.3).
fn stack_value(
    origin: GeoPoint,
    _depth_km: f64,
    time_sec: f64,
    picks: &[&Pick],
    travel_time: &dyn TravelTimeProvider,
    sigma_sec: f64,
) -> f64 {
    let normalize = sigma_sec * (2.0 * std::f64::consts::PI).sqrt();
    picks
        .iter()
        .filter_map(|pick| {
            let delta = origin.distance_deg(&pick.site.position);
            let (phase, tt_sec) = travel_time.best_travel_time(delta)?;
            let taper = travel_time.range_taper(&phase);
            let weight = taper.weight(delta);
            if weight <= 0.0 {
                return None;
            }
            let residual = pick.time_sec - (time_sec + tt_sec);
            Some(weight * gaussian_log_density(residual, sigma_sec).exp() * normalize)
        })
        .sum::<f64>()
}

/// Sum of absolute travel-time residuals, used by the L1 locator
/// (spec.md §6 `use_l1_residual_locator`). Smaller is better.
fn l1_residual(
    origin: GeoPoint,
    time_sec: f64,
    picks: &[&Pick],
    travel_time: &dyn TravelTimeProvider,
) -> f64 {
    picks
        .iter()
        .filter_map(|pick| {
            let delta = origin.distance_deg(&pick.site.position);
            let (_, tt_sec) = travel_time.best_travel_time(delta)?;
            Some((pick.time_sec - (time_sec + tt_sec)).abs())
        })
        .sum()
}

fn perturb(origin: GeoPoint, depth_km: f64, step_deg: f64, step_depth_km: f64, rng: &mut impl Rng) -> (GeoPoint, f64) {
    let lat = origin.lat_deg + rng.random_range(-step_deg..=step_deg);
    let lon = origin.lon_deg + rng.random_range(-step_deg..=step_deg);
    let depth = (depth_km + rng.random_range(-step_depth_km..=step_depth_km)).max(0.0);
    (GeoPoint::new(lat.clamp(-90.0, 90.0), lon), depth)
}

/// Best origin time for a fixed (origin, depth): the data-weighted mean
/// of each pick's back-projected origin time, which is the closed-form
/// time optimum for a Gaussian residual model.
fn best_time(origin: GeoPoint, depth_km: f64, picks: &[&Pick], travel_time: &dyn TravelTimeProvider) -> f64 {
    let _ = depth_km;
    let projected: Vec<f64> = picks
        .iter()
        .filter_map(|pick| {
            let delta = origin.distance_deg(&pick.site.position);
            let (_, tt_sec) = travel_time.best_travel_time(delta)?;
            Some(pick.time_sec - tt_sec)
        })
        .collect();
    if projected.is_empty() {
        return 0.0;
    }
    projected.iter().sum::<f64>() / projected.len() as f64
}

/// Simulated-annealing relocation. Starts from `(initial_origin,
/// initial_depth_km)` and runs `iterations` perturb/accept steps with a
/// linearly-cooling temperature floored at `config.annealing_pmin`,
/// tracking the best stack value seen (spec.md §4.3).
pub fn anneal_locate(
    picks: &[&Pick],
    initial_origin: GeoPoint,
    initial_depth_km: f64,
    travel_time: &dyn TravelTimeProvider,
    config: &Config,
    iterations: u32,
    rng: &mut impl Rng,
) -> Solution {
    let sigma = config.association_seconds_per_sigma;
    let mut current_origin = initial_origin;
    let mut current_depth = initial_depth_km;
    let mut current_time = best_time(current_origin, current_depth, picks, travel_time);
    let mut current_score = stack_value(current_origin, current_depth, current_time, picks, travel_time, sigma);

    let mut best_origin = current_origin;
    let mut best_depth = current_depth;
    let mut best_time_sec = current_time;
    let mut best_score = current_score;

    for i in 0..iterations.max(1) {
        let progress = i as f64 / iterations.max(1) as f64;
        let temperature = (1.0 - progress).max(config.annealing_pmin);
        let step_deg = 2.0 * temperature;
        let step_depth_km = 20.0 * temperature;

        let (candidate_origin, candidate_depth) = perturb(current_origin, current_depth, step_deg, step_depth_km, rng);
        let candidate_time = best_time(candidate_origin, candidate_depth, picks, travel_time);
        let candidate_score = stack_value(candidate_origin, candidate_depth, candidate_time, picks, travel_time, sigma);

        let delta = candidate_score - current_score;
        let accept = delta > 0.0 || rng.random::<f64>() < (delta / temperature).exp();
        if accept {
            current_origin = candidate_origin;
            current_depth = candidate_depth;
            current_time = candidate_time;
            current_score = candidate_score;
        }
        if current_score > best_score {
            best_origin = current_origin;
            best_depth = current_depth;
            best_time_sec = current_time;
            best_score = current_score;
        }
    }

    Solution { origin: best_origin, depth_km: best_depth.clamp(0.0, config.maximum_depth_km), time_sec: best_time_sec, bayes_value: best_score }
}

/// L1-residual relocation (spec.md §6 `use_l1_residual_locator`): the same
/// annealing schedule, minimizing summed absolute residual instead of
/// maximizing the Gaussian stack. The returned `bayes_value` is still the
/// Gaussian stack at the chosen solution, so callers can apply reporting
/// thresholds uniformly regardless of which locator produced it.
pub fn l1_locate(
    picks: &[&Pick],
    initial_origin: GeoPoint,
    initial_depth_km: f64,
    travel_time: &dyn TravelTimeProvider,
    config: &Config,
    iterations: u32,
    rng: &mut impl Rng,
) -> Solution {
    let mut current_origin = initial_origin;
    let mut current_depth = initial_depth_km;
    let mut current_time = best_time(current_origin, current_depth, picks, travel_time);
    let mut current_residual = l1_residual(current_origin, current_time, picks, travel_time);

    let mut best_origin = current_origin;
    let mut best_depth = current_depth;
    let mut best_time_sec = current_time;
    let mut best_residual = current_residual;

    for i in 0..iterations.max(1) {
        let progress = i as f64 / iterations.max(1) as f64;
        let temperature = (1.0 - progress).max(config.annealing_pmin);
        let step_deg = 2.0 * temperature;
        let step_depth_km = 20.0 * temperature;

        let (candidate_origin, candidate_depth) = perturb(current_origin, current_depth, step_deg, step_depth_km, rng);
        let candidate_time = best_time(candidate_origin, candidate_depth, picks, travel_time);
        let candidate_residual = l1_residual(candidate_origin, candidate_time, picks, travel_time);

        let delta = current_residual - candidate_residual;
        let accept = delta > 0.0 || rng.random::<f64>() < (delta / temperature).exp();
        if accept {
            current_origin = candidate_origin;
            current_depth = candidate_depth;
            current_time = candidate_time;
            current_residual = candidate_residual;
        }
        if current_residual < best_residual {
            best_origin = current_origin;
            best_depth = current_depth;
            best_time_sec = current_time;
            best_residual = current_residual;
        }
    }

    let sigma = config.association_seconds_per_sigma;
    let bayes_value = stack_value(best_origin, best_depth, best_time_sec, picks, travel_time, sigma);
    Solution { origin: best_origin, depth_km: best_depth.clamp(0.0, config.maximum_depth_km), time_sec: best_time_sec, bayes_value }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::{Site, SiteKey};
    use crate::travel_time::LinearTravelTime;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::sync::Arc;

    fn make_pick(id: u64, lat: f64, lon: f64, arrival: f64) -> Arc<Pick> {
        let site = Arc::new(Site::new(SiteKey::new("XX", "AAA", "HHZ", "00"), GeoPoint::new(lat, lon), 0.0, 10));
        Arc::new(Pick::new(id, format!("p{id}"), site, arrival, None, None))
    }

    #[test]
    fn anneal_converges_toward_true_origin() {
        let tt = LinearTravelTime::new();
        let true_origin = GeoPoint::new(2.0, 3.0);
        let true_time = 500.0;
        let station_offsets = [(0.0, 0.0), (0.05, 0.0), (0.0, 0.05), (-0.05, 0.0), (0.0, -0.05)];
        let picks: Vec<Arc<Pick>> = station_offsets
            .iter()
            .enumerate()
            .map(|(i, (dlat, dlon))| {
                let lat = true_origin.lat_deg + dlat;
                let lon = true_origin.lon_deg + dlon;
                let delta = true_origin.distance_deg(&GeoPoint::new(lat, lon));
                let arrival = true_time + tt.travel_time("P", delta).unwrap();
                make_pick(i as u64 + 1, lat, lon, arrival)
            })
            .collect();
        let pick_refs: Vec<&Pick> = picks.iter().map(|p| p.as_ref()).collect();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let config = Config::default();
        let initial = GeoPoint::new(true_origin.lat_deg + 0.3, true_origin.lon_deg - 0.3);
        let solution = anneal_locate(&pick_refs, initial, 10.0, &tt, &config, 2000, &mut rng);

        assert!(solution.origin.distance_km(&true_origin) < 20.0, "got {:?}", solution.origin);
    }
}
