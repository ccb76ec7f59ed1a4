//! Process-level configuration: the tunables `glass_core::Config` already
//! defines, plus the web/grid definitions the wire protocol has no
//! message for (spec.md §4.6 lists "grid" among the things `Cmd`
//! dispatch routes, but §6's message catalog never defines its shape —
//! original `neic-glass3` builds its webs from a JSON config section at
//! startup, not a runtime command, so that's the behavior this follows;
//! see DESIGN.md's Open Question log).

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use glass_core::config::Config;

#[derive(Debug, Clone, Deserialize)]
pub struct WebDefinition {
    pub name: String,
    pub lat_range_deg: (f64, f64),
    pub lon_range_deg: (f64, f64),
    pub spacing_deg: f64,
    pub depth_km: f64,
    #[serde(default)]
    pub nucleation_stack_threshold: Option<f64>,
    #[serde(default)]
    pub nucleation_data_count_threshold: Option<u32>,
    #[serde(default)]
    pub num_stations_per_node: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    #[serde(flatten)]
    pub tunables: Config,
    pub webs: Vec<WebDefinition>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { tunables: Config::default(), webs: Vec::new() }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading config file {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("parsing config file {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tunables_alongside_webs() {
        let json = r#"{
            "nucleation_stack_threshold": 3.0,
            "webs": [{"name": "global", "lat_range_deg": [-10.0, 10.0], "lon_range_deg": [-10.0, 10.0], "spacing_deg": 1.0, "depth_km": 10.0}]
        }"#;
        let config: ServerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.tunables.nucleation_stack_threshold, 3.0);
        assert_eq!(config.webs.len(), 1);
        assert_eq!(config.webs[0].name, "global");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.tunables, Config::default());
        assert!(config.webs.is_empty());
    }
}
