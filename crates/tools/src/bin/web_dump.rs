//! Dumps a detection web's node grid and per-node station wiring to a
//! flat CSV for location-tuning, standing in for `glass-app.cpp`'s
//! `GraphicsOut`/`GraphicsOutFolder` node-graphics dump (SPEC_FULL.md
//! §11). Reads the same `webs` config shape `glass-server` consumes so a
//! grid definition can be tuned offline before being deployed.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use glass_core::config::Config;
use glass_core::geo::GeoPoint;
use glass_core::site::{Site, SiteKey};
use glass_core::web::{Web, WebConfig};
use tools::common::io::open_writer;

#[derive(Debug, Clone, Deserialize)]
struct WebDefinition {
    name: String,
    lat_range_deg: (f64, f64),
    lon_range_deg: (f64, f64),
    spacing_deg: f64,
    depth_km: f64,
    #[serde(default)]
    num_stations_per_node: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct DumpConfig {
    #[serde(default)]
    tunables: Config,
    webs: Vec<WebDefinition>,
    #[serde(default)]
    sites: Vec<SiteEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct SiteEntry {
    station: String,
    channel: String,
    network: String,
    location: String,
    latitude_deg: f64,
    longitude_deg: f64,
    #[serde(default)]
    elevation_km: f64,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Dump a detection web's node grid and station wiring to CSV", long_about = None)]
struct Args {
    /// glass-server style config file (must include a `sites` array for this tool).
    config: PathBuf,

    /// Which web, by name, to dump. Dumps every web if omitted.
    #[arg(long)]
    web: Option<String>,

    /// Output CSV path ('-' for stdout, '.gz' for gzip).
    #[arg(long, default_value = "-")]
    out: PathBuf,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let text = std::fs::read_to_string(&args.config).with_context(|| format!("reading {}", args.config.display()))?;
    let config: DumpConfig = serde_json::from_str(&text).with_context(|| format!("parsing {}", args.config.display()))?;

    let sites: Vec<Arc<Site>> = config
        .sites
        .iter()
        .map(|s| {
            Arc::new(Site::new(
                SiteKey::new(&s.network, &s.station, &s.channel, &s.location),
                GeoPoint::new(s.latitude_deg, s.longitude_deg),
                s.elevation_km,
                config.tunables.max_picks_per_site as usize,
            ))
        })
        .collect();
    if sites.is_empty() {
        log::warn!("config has no sites; every node will have zero station links");
    }

    let mut out = open_writer(&args.out).with_context(|| format!("opening {}", args.out.display()))?;
    writeln!(out, "web,node_id,lat_deg,lon_deg,depth_km,num_links,max_link_distance_deg,linked_stations")?;

    let mut id = 1u64;
    for def in &config.webs {
        if let Some(want) = &args.web {
            if want != &def.name {
                continue;
            }
        }
        let num_stations = def.num_stations_per_node.unwrap_or(config.tunables.num_stations_per_node) as usize;
        let web = Web::build_grid(
            def.name.clone(),
            id,
            def.lat_range_deg,
            def.lon_range_deg,
            def.spacing_deg,
            def.depth_km,
            &sites,
            num_stations,
            WebConfig::default(),
        );
        id += web.nodes.len() as u64 + 1;

        for node in &web.nodes {
            let linked: Vec<String> = node.links.iter().map(|l| l.site.key.to_string()).collect();
            writeln!(
                out,
                "{},{},{},{},{},{},{},\"{}\"",
                web.name,
                node.id,
                node.position.lat_deg,
                node.position.lon_deg,
                node.depth_km,
                node.num_links(),
                node.max_link_distance_deg(),
                linked.join(";"),
            )?;
        }
        log::info!("dumped web '{}': {} nodes", web.name, web.nodes.len());
    }

    out.close()?;
    Ok(())
}
