//! `{Cmd:"Initialize", ...}` tunable payload (spec.md §6), named exactly
//! as the wire format enumerates them. Every field is optional so a
//! partial `Initialize` message only overrides what it mentions, leaving
//! the rest at `glass_core::Config`'s defaults.

use serde::Deserialize;

use glass_core::config::Config;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitConfig {
    #[serde(rename = "NucleationStackThreshold")]
    pub nucleation_stack_threshold: Option<f64>,
    #[serde(rename = "NucleationDataCountThreshold")]
    pub nucleation_data_count_threshold: Option<u32>,
    #[serde(rename = "NumStationsPerNode")]
    pub num_stations_per_node: Option<u32>,

    #[serde(rename = "AssociationStandardDeviationCutoff")]
    pub association_standard_deviation_cutoff: Option<f64>,
    #[serde(rename = "PruningStandardDeviationCutoff")]
    pub pruning_standard_deviation_cutoff: Option<f64>,
    #[serde(rename = "PickAffinityExponentialFactor")]
    pub pick_affinity_exponential_factor: Option<f64>,

    #[serde(rename = "DistanceCutoffFactor")]
    pub distance_cutoff_factor: Option<f64>,
    #[serde(rename = "DistanceCutoffRatio")]
    pub distance_cutoff_ratio: Option<f64>,
    #[serde(rename = "DistanceCutoffMinimum")]
    pub distance_cutoff_minimum: Option<f64>,

    #[serde(rename = "HypoProcessCountLimit")]
    pub hypo_process_count_limit: Option<u32>,
    #[serde(rename = "UseL1ResidualLocator")]
    pub use_l1_residual_locator: Option<bool>,

    #[serde(rename = "PickDuplicateWindow")]
    pub pick_duplicate_window: Option<f64>,
    #[serde(rename = "AllowPickUpdates")]
    pub allow_pick_updates: Option<bool>,

    #[serde(rename = "CorrelationTimeWindow")]
    pub correlation_time_window: Option<f64>,
    #[serde(rename = "CorrelationDistanceWindow")]
    pub correlation_distance_window: Option<f64>,
    #[serde(rename = "CorrelationCancelAge")]
    pub correlation_cancel_age: Option<f64>,

    #[serde(rename = "BeamMatchingAzimuthWindow")]
    pub beam_matching_azimuth_window: Option<f64>,

    #[serde(rename = "HypocenterTimeWindow")]
    pub hypocenter_time_window: Option<f64>,
    #[serde(rename = "HypocenterDistanceWindow")]
    pub hypocenter_distance_window: Option<f64>,

    #[serde(rename = "ReportingStackThreshold")]
    pub reporting_stack_threshold: Option<f64>,
    #[serde(rename = "ReportingDataThreshold")]
    pub reporting_data_threshold: Option<u32>,

    #[serde(rename = "MaximumNumberOfPicks")]
    pub maximum_number_of_picks: Option<i64>,
    #[serde(rename = "MaximumNumberOfHypos")]
    pub maximum_number_of_hypos: Option<i64>,
    #[serde(rename = "MaximumNumberOfCorrelations")]
    pub maximum_number_of_correlations: Option<i64>,

    #[serde(rename = "EventFragmentDepthThreshold")]
    pub event_fragment_depth_threshold: Option<f64>,
    #[serde(rename = "EventFragmentAzimuthThreshold")]
    pub event_fragment_azimuth_threshold: Option<f64>,

    #[serde(rename = "NumberOfNucleationThreads")]
    pub number_of_nucleation_threads: Option<u32>,
    #[serde(rename = "NumberOfHypoThreads")]
    pub number_of_hypo_threads: Option<u32>,
    #[serde(rename = "NumberOfWebThreads")]
    pub number_of_web_threads: Option<u32>,

    #[serde(rename = "SiteHoursWithoutPicking")]
    pub site_hours_without_picking: Option<f64>,
    #[serde(rename = "SiteLookupInterval")]
    pub site_lookup_interval: Option<f64>,
    #[serde(rename = "SiteMaximumPicksPerHour")]
    pub site_maximum_picks_per_hour: Option<u32>,
}

impl InitConfig {
    /// Overlays every field this message set onto `base`, leaving
    /// unmentioned tunables untouched (spec.md §8 "idempotent init").
    pub fn apply_to(&self, base: &mut Config) {
        macro_rules! overlay {
            ($field:ident) => {
                if let Some(v) = self.$field {
                    base.$field = v;
                }
            };
        }
        overlay!(nucleation_stack_threshold);
        overlay!(nucleation_data_count_threshold);
        overlay!(num_stations_per_node);
        if let Some(v) = self.association_standard_deviation_cutoff {
            base.association_sd_cutoff = v;
        }
        if let Some(v) = self.pruning_standard_deviation_cutoff {
            base.pruning_sd_cutoff = v;
        }
        if let Some(v) = self.pick_affinity_exponential_factor {
            base.pick_affinity_exp_factor = v;
        }
        overlay!(distance_cutoff_factor);
        overlay!(distance_cutoff_ratio);
        if let Some(v) = self.distance_cutoff_minimum {
            base.distance_cutoff_minimum_deg = v;
        }
        overlay!(hypo_process_count_limit);
        overlay!(use_l1_residual_locator);
        if let Some(v) = self.pick_duplicate_window {
            base.pick_duplicate_time_window_sec = v;
        }
        overlay!(allow_pick_updates);
        if let Some(v) = self.correlation_time_window {
            base.correlation_time_window_sec = v;
        }
        if let Some(v) = self.correlation_distance_window {
            base.correlation_distance_window_deg = v;
        }
        if let Some(v) = self.correlation_cancel_age {
            base.correlation_cancel_age_sec = v;
        }
        if let Some(v) = self.beam_matching_azimuth_window {
            base.beam_matching_azimuth_window_deg = v;
        }
        if let Some(v) = self.hypocenter_time_window {
            base.hypo_merging_time_window_sec = v;
        }
        if let Some(v) = self.hypocenter_distance_window {
            base.hypo_merging_distance_window_deg = v;
        }
        if self.reporting_stack_threshold.is_some() {
            base.reporting_stack_threshold = self.reporting_stack_threshold;
        }
        overlay!(reporting_data_threshold);
        if let Some(v) = self.maximum_number_of_picks {
            base.max_num_picks = v;
        }
        if let Some(v) = self.maximum_number_of_hypos {
            base.max_num_hypos = v;
        }
        if let Some(v) = self.maximum_number_of_correlations {
            base.max_num_correlations = v;
        }
        if let Some(v) = self.event_fragment_depth_threshold {
            base.event_fragment_depth_threshold_km = v;
        }
        if let Some(v) = self.event_fragment_azimuth_threshold {
            base.event_fragment_azimuth_threshold_deg = v;
        }
        if let Some(v) = self.number_of_nucleation_threads {
            base.num_nucleation_threads = v;
        }
        if let Some(v) = self.number_of_hypo_threads {
            base.num_hypo_threads = v;
        }
        if let Some(v) = self.number_of_web_threads {
            base.num_web_threads = v;
        }
        overlay!(site_hours_without_picking);
        if let Some(v) = self.site_lookup_interval {
            base.site_lookup_interval_sec = v;
        }
        overlay!(site_maximum_picks_per_hour);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_overlay_leaves_rest_default() {
        let json = r#"{"NucleationStackThreshold": 9.0}"#;
        let init: InitConfig = serde_json::from_str(json).unwrap();
        let mut config = Config::default();
        init.apply_to(&mut config);
        assert_eq!(config.nucleation_stack_threshold, 9.0);
        assert_eq!(config.nucleation_data_count_threshold, 7);
    }
}
