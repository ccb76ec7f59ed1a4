//! Detection webs and Bayesian nucleation stacking (spec.md §3 "Web",
//! §4.1 "Nucleation").
//!
//! A web is a named grid of `Node`s covering some region at one or more
//! depths. Nucleation walks each node, summing a Gaussian contribution
//! from every linked site's free picks at each candidate origin time, and
//! reports the best (time, stack-value) pair per node. A web may override
//! the process-wide nucleation threshold and station count for its own
//! grid (spec.md §3).

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::geo::{gaussian_log_density, GeoPoint};
use crate::node::Node;
use crate::pick::Pick;
use crate::site::{Site, SiteKey};
use crate::travel_time::TravelTimeProvider;
use crate::trigger::Trigger;

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub nucleation_stack_threshold: Option<f64>,
    pub nucleation_data_count_threshold: Option<u32>,
    pub num_stations_per_node: Option<u32>,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self { nucleation_stack_threshold: None, nucleation_data_count_threshold: None, num_stations_per_node: None }
    }
}

#[derive(Debug)]
pub struct Web {
    pub name: String,
    pub nodes: Vec<Node>,
    overrides: WebConfig,
}

impl Web {
    pub fn new(name: impl Into<String>, nodes: Vec<Node>, overrides: WebConfig) -> Self {
        Self { name: name.into(), nodes, overrides }
    }

    /// Builds a regular lat/lon grid of nodes at `depth_km`, each linked
    /// to its closest `num_stations` enabled sites (spec.md §4.1).
    pub fn build_grid(
        name: impl Into<String>,
        id_start: u64,
        lat_range: (f64, f64),
        lon_range: (f64, f64),
        spacing_deg: f64,
        depth_km: f64,
        sites: &[Arc<Site>],
        num_stations: usize,
        overrides: WebConfig,
    ) -> Self {
        let mut nodes = Vec::new();
        let mut id = id_start;
        let mut lat = lat_range.0;
        while lat <= lat_range.1 {
            let mut lon = lon_range.0;
            while lon <= lon_range.1 {
                nodes.push(Node::new(id, GeoPoint::new(lat, lon), depth_km, sites, num_stations));
                id += 1;
                lon += spacing_deg;
            }
            lat += spacing_deg;
        }
        Self::new(name, nodes, overrides)
    }

    fn stack_threshold(&self, config: &Config) -> f64 {
        self.overrides.nucleation_stack_threshold.unwrap_or(config.nucleation_stack_threshold)
    }

    fn data_count_threshold(&self, config: &Config) -> u32 {
        self.overrides.nucleation_data_count_threshold.unwrap_or(config.nucleation_data_count_threshold)
    }

    /// Groups `free_picks` by site so a node's stacking pass doesn't
    /// rescan the whole pick list for every node.
    fn group_by_site(free_picks: &[Arc<Pick>]) -> HashMap<SiteKey, Vec<Arc<Pick>>> {
        let mut by_site: HashMap<SiteKey, Vec<Arc<Pick>>> = HashMap::new();
        for pick in free_picks {
            by_site.entry(pick.site.key.clone()).or_default().push(pick.clone());
        }
        by_site
    }

    /// Evaluates the Bayesian stack at `node` for candidate origin time
    /// `candidate_time_sec`: the sum of each linked site's best-matching
    /// free pick's Gaussian weight, tapered by distance (spec.md §4.1).
    fn stack_at(
        node: &Node,
        by_site: &HashMap<SiteKey, Vec<Arc<Pick>>>,
        travel_time: &dyn TravelTimeProvider,
        sigma_sec: f64,
        candidate_time_sec: f64,
    ) -> (f64, Vec<Arc<Pick>>) {
        let mut stack = 0.0;
        let mut contributors = Vec::new();
        for link in &node.links {
            let Some((phase, tt_sec)) = travel_time.best_travel_time(link.distance_deg) else {
                continue;
            };
            let taper = travel_time.range_taper(&phase);
            let weight = taper.weight(link.distance_deg);
            if weight <= 0.0 {
                continue;
            }
            let predicted_arrival = candidate_time_sec + tt_sec;
            let Some(picks) = by_site.get(&link.site.key) else { continue };
            let mut best: Option<(f64, &Arc<Pick>)> = None;
            for pick in picks {
                let residual = pick.time_sec - predicted_arrival;
                if residual.abs() > 4.0 * sigma_sec {
                    continue;
                }
                let density = weight * gaussian_log_density(residual, sigma_sec).exp() * sigma_sec * (2.0 * std::f64::consts::PI).sqrt();
                if best.is_none_or(|(b, _)| density > b) {
                    best = Some((density, pick));
                }
            }
            if let Some((density, pick)) = best {
                stack += density;
                contributors.push(pick.clone());
            }
        }
        (stack, contributors)
    }

    /// Scans every node in the web for the highest-stacking origin time,
    /// returning a trigger for any node that clears its threshold
    /// (spec.md §4.1, §4.2 step 1).
    pub fn nucleate(&self, free_picks: &[Arc<Pick>], travel_time: &dyn TravelTimeProvider, config: &Config) -> Vec<Trigger> {
        if free_picks.is_empty() {
            return Vec::new();
        }
        let by_site = Self::group_by_site(free_picks);
        let stack_threshold = self.stack_threshold(config);
        let data_count_threshold = self.data_count_threshold(config);
        let sigma = config.nucleation_seconds_per_sigma;

        let mut triggers = Vec::new();
        for node in &self.nodes {
            // Candidate origin times: every linked site's best-phase
            // back-projection of each of its free picks.
            let mut candidate_times = Vec::new();
            for link in &node.links {
                let Some((phase, tt_sec)) = travel_time.best_travel_time(link.distance_deg) else { continue };
                let _ = &phase;
                if let Some(picks) = by_site.get(&link.site.key) {
                    for pick in picks {
                        candidate_times.push(pick.time_sec - tt_sec);
                    }
                }
            }
            let mut best: Option<(f64, f64, Vec<Arc<Pick>>)> = None;
            for t in candidate_times {
                let (stack, contributors) = Self::stack_at(node, &by_site, travel_time, sigma, t);
                if best.as_ref().is_none_or(|(b, _, _)| stack > *b) {
                    best = Some((stack, t, contributors));
                }
            }
            if let Some((stack, time_sec, contributors)) = best {
                let trigger = Trigger::new(self.name.clone(), node.position, node.depth_km, time_sec, stack, contributors);
                if trigger.clears_threshold(stack_threshold, data_count_threshold) {
                    triggers.push(trigger);
                }
            }
        }
        triggers
    }
}

/// All detection webs known to the engine (spec.md §3 "WebList").
#[derive(Debug, Default)]
pub struct WebList {
    webs: parking_lot::Mutex<Vec<Arc<Web>>>,
}

impl WebList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, web: Web) -> Arc<Web> {
        let web = Arc::new(web);
        self.webs.lock().push(web.clone());
        web
    }

    pub fn all(&self) -> Vec<Arc<Web>> {
        self.webs.lock().clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Web>> {
        self.webs.lock().iter().find(|w| w.name == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.webs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs nucleation across every web, pooling the resulting triggers
    /// (spec.md §4.1). Caller is responsible for dispatching each trigger
    /// to a worker that turns it into a `Hypo`.
    pub fn nucleate_all(&self, free_picks: &[Arc<Pick>], travel_time: &dyn TravelTimeProvider, config: &Config) -> Vec<Trigger> {
        self.all().iter().flat_map(|web| web.nucleate(free_picks, travel_time, config)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::travel_time::LinearTravelTime;

    fn site_at(name: &str, lat: f64, lon: f64) -> Arc<Site> {
        Arc::new(Site::new(SiteKey::new("XX", name, "HHZ", "00"), GeoPoint::new(lat, lon), 0.0, 10))
    }

    fn pick_at(id: u64, site: &Arc<Site>, time_sec: f64) -> Arc<Pick> {
        Arc::new(Pick::new(id, format!("p{id}"), site.clone(), time_sec, None, None))
    }

    #[test]
    fn nucleates_a_well_observed_node() {
        let sites: Vec<Arc<Site>> = vec![
            site_at("AAA", 0.0, 0.0),
            site_at("BBB", 0.05, 0.05),
            site_at("CCC", -0.05, 0.05),
            site_at("DDD", 0.05, -0.05),
            site_at("EEE", -0.05, -0.05),
            site_at("FFF", 0.08, 0.0),
            site_at("GGG", -0.08, 0.0),
        ];
        let web = Web::build_grid(
            "test",
            1,
            (0.0, 0.0),
            (0.0, 0.0),
            1.0,
            10.0,
            &sites,
            10,
            WebConfig::default(),
        );
        let tt = LinearTravelTime::new();
        let origin_time = 1000.0;
        let picks: Vec<Arc<Pick>> = sites
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let delta = GeoPoint::new(0.0, 0.0).distance_deg(&s.position);
                let arrival = origin_time + tt.travel_time("P", delta).unwrap();
                pick_at(i as u64 + 1, s, arrival)
            })
            .collect();

        let mut config = Config::default();
        config.nucleation_data_count_threshold = 5;
        config.nucleation_stack_threshold = 2.0;

        let triggers = web.nucleate(&picks, &tt, &config);
        assert!(!triggers.is_empty(), "expected at least one trigger");
        let best = triggers.iter().max_by(|a, b| a.bayes_value.total_cmp(&b.bayes_value)).unwrap();
        assert!((best.time_sec - origin_time).abs() < 1.0, "got time {}", best.time_sec);
    }

    #[test]
    fn empty_pick_list_yields_no_triggers() {
        let sites = vec![site_at("AAA", 0.0, 0.0)];
        let web = Web::build_grid("test", 1, (0.0, 0.0), (0.0, 0.0), 1.0, 10.0, &sites, 10, WebConfig::default());
        let tt = LinearTravelTime::new();
        let config = Config::default();
        assert!(web.nucleate(&[], &tt, &config).is_empty());
    }
}
