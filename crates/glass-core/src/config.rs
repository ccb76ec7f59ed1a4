//! Association-engine tunables.
//!
//! Mirrors `glasscore::CGlass`'s per-tunable static getters (`Glass.h`)
//! as a single plain struct instead of a static singleton, per spec.md §9's
//! design note: "Replace source's static singletons with a process-scoped
//! Config value passed explicitly to components at construction."
//!
//! Every field has the literal default spec.md §6 enumerates. A `Web` may
//! override the nucleation thresholds and station count for its own grid
//! (spec.md §3), everything else is process-global.

use serde::{Deserialize, Serialize};

/// Hard-coded suppression ratio for "an event has already been found,
/// decisively" (spec.md §4.2 step 1). spec.md §9 flags this factor as an
/// open question ("should this be tunable?") rather than asking us to
/// guess; until that's resolved it stays a named constant, not a
/// `Config` field.
pub const NUCLEATION_SUPPRESSION_BAYES_RATIO: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum number of data required to nucleate an event.
    pub nucleation_data_count_threshold: u32,
    /// Minimum bayesian stack value required to nucleate an event.
    pub nucleation_stack_threshold: f64,
    /// Number of closest stations wired to each node by default.
    pub num_stations_per_node: u32,

    /// Standard deviation cutoff used for associating a pick with a hypo.
    pub association_sd_cutoff: f64,
    /// Standard deviation cutoff used for pruning a pick from a hypo.
    pub pruning_sd_cutoff: f64,
    /// Exponential factor used when calculating pick affinity.
    pub pick_affinity_exp_factor: f64,

    /// Factor used to calculate a hypo's association distance cutoff.
    pub distance_cutoff_factor: f64,
    /// Ratio applied on top of `distance_cutoff_factor` (spec.md §4.4).
    pub distance_cutoff_ratio: f64,
    /// Minimum allowed association distance cutoff, in degrees.
    pub distance_cutoff_minimum_deg: f64,

    /// Maximum number of times a hypo can reprocess without new data.
    pub hypo_process_count_limit: u32,
    /// Whether to use the L1-residual locator instead of simulated annealing.
    pub use_l1_residual_locator: bool,

    /// Window in seconds used when checking for duplicate picks at a site.
    pub pick_duplicate_time_window_sec: f64,
    /// Whether a duplicate pick replaces the stored observation in place.
    pub allow_pick_updates: bool,

    /// Time window to check for matching/duplicate correlations, seconds.
    pub correlation_time_window_sec: f64,
    /// Distance window to check for matching correlations, degrees.
    pub correlation_distance_window_deg: f64,
    /// Age after which an unsupported correlation-seeded hypo is canceled.
    pub correlation_cancel_age_sec: f64,

    /// Azimuth window for matching a beam (backazimuth) to an existing hypo.
    pub beam_matching_azimuth_window_deg: f64,

    /// Time window used to decide whether two hypos should be merged.
    pub hypo_merging_time_window_sec: f64,
    /// Distance window used to decide whether two hypos should be merged.
    pub hypo_merging_distance_window_deg: f64,

    /// Minimum bayesian stack required to report (promote) a hypo.
    /// Defaults to `nucleation_stack_threshold` per spec.md §6.
    pub reporting_stack_threshold: Option<f64>,
    /// Minimum number of associated picks required to report a hypo.
    pub reporting_data_threshold: u32,

    /// -1 (unbounded) or a positive cap on stored picks.
    pub max_num_picks: i64,
    /// -1 (unbounded) or a positive cap on stored hypos.
    pub max_num_hypos: i64,
    /// -1 (unbounded) or a positive cap on stored correlations.
    pub max_num_correlations: i64,
    /// Maximum number of picks retained in each site's local ring buffer.
    pub max_picks_per_site: u32,

    /// Depth threshold (km) combined with azimuthal gap for fragment cancellation.
    pub event_fragment_depth_threshold_km: f64,
    /// Azimuthal-gap threshold (degrees) combined with depth for fragment cancellation.
    pub event_fragment_azimuth_threshold_deg: f64,

    /// Maximum depth a hypocenter may be relocated to, in km. spec.md §9
    /// flags a discrepancy between the doc comment (800 km) and the
    /// original source header's literal constant; we follow the documented
    /// 800 km value and record the discrepancy here rather than silently
    /// picking one.
    pub maximum_depth_km: f64,

    /// Standard deviation (seconds) used for the Gaussian nucleation stack.
    pub nucleation_seconds_per_sigma: f64,
    /// Standard deviation (seconds) used for association/pruning residual scoring.
    pub association_seconds_per_sigma: f64,

    /// Simulated-annealing iteration budget used during nucleation.
    pub nucleation_annealing_iterations: u32,
    /// Simulated-annealing iteration budget used during each evolve pass.
    pub evolve_annealing_iterations: u32,
    /// Minimum acceptance probability for the annealing cooling schedule.
    pub annealing_pmin: f64,

    /// Number of threads in the nucleation worker pool.
    pub num_nucleation_threads: u32,
    /// Number of threads in the hypo-evolve worker pool.
    pub num_hypo_threads: u32,
    /// Number of threads in the web-build worker pool (0 = synchronous).
    pub num_web_threads: u32,

    /// Hours a site can go without picking before being flagged unhealthy.
    pub site_hours_without_picking: f64,
    /// Interval, in seconds, between checks for site-list updates (0 = never).
    pub site_lookup_interval_sec: f64,
    /// Maximum picks per hour a site may report before being throttled.
    pub site_maximum_picks_per_hour: u32,
}

impl Config {
    /// The stack threshold above which a reporting hypo must exceed to be
    /// emitted; defaults to the nucleation threshold per spec.md §6.
    pub fn reporting_stack_threshold(&self) -> f64 {
        self.reporting_stack_threshold.unwrap_or(self.nucleation_stack_threshold)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            nucleation_data_count_threshold: 7,
            nucleation_stack_threshold: 2.5,
            num_stations_per_node: 20,

            association_sd_cutoff: 3.0,
            pruning_sd_cutoff: 3.0,
            pick_affinity_exp_factor: 2.5,

            distance_cutoff_factor: 4.0,
            distance_cutoff_ratio: 0.4,
            distance_cutoff_minimum_deg: 30.0,

            hypo_process_count_limit: 25,
            use_l1_residual_locator: false,

            pick_duplicate_time_window_sec: 2.5,
            allow_pick_updates: false,

            correlation_time_window_sec: 2.5,
            correlation_distance_window_deg: 0.5,
            correlation_cancel_age_sec: 900.0,

            beam_matching_azimuth_window_deg: 22.5,

            hypo_merging_time_window_sec: 30.0,
            hypo_merging_distance_window_deg: 3.0,

            reporting_stack_threshold: None,
            reporting_data_threshold: 0,

            max_num_picks: -1,
            max_num_hypos: -1,
            max_num_correlations: -1,
            max_picks_per_site: 200,

            event_fragment_depth_threshold_km: 550.0,
            event_fragment_azimuth_threshold_deg: 270.0,

            maximum_depth_km: 800.0,

            nucleation_seconds_per_sigma: 0.4,
            association_seconds_per_sigma: 1.0,

            nucleation_annealing_iterations: 15_000,
            evolve_annealing_iterations: 5_000,
            annealing_pmin: 0.1,

            num_nucleation_threads: 5,
            num_hypo_threads: 3,
            num_web_threads: 0,

            site_hours_without_picking: 24.0,
            site_lookup_interval_sec: 0.0,
            site_maximum_picks_per_hour: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.nucleation_stack_threshold, 2.5);
        assert_eq!(c.nucleation_data_count_threshold, 7);
        assert_eq!(c.reporting_stack_threshold(), 2.5);
        assert_eq!(c.maximum_depth_km, 800.0);
    }

    #[test]
    fn reporting_stack_threshold_override() {
        let mut c = Config::default();
        c.reporting_stack_threshold = Some(10.0);
        assert_eq!(c.reporting_stack_threshold(), 10.0);
    }

    #[test]
    fn deserialize_partial_json_keeps_defaults() {
        let c: Config = serde_json::from_str(r#"{"nucleation_stack_threshold": 99.0}"#).unwrap();
        assert_eq!(c.nucleation_stack_threshold, 99.0);
        assert_eq!(c.nucleation_data_count_threshold, 7);
    }
}
