//! Detection-grid nodes (spec.md §3 "Node").
//!
//! A node is a fixed point on a `Web`'s spatial grid, pre-linked to the
//! `NumStationsPerNode` closest enabled sites at construction time
//! (spec.md §4.1). Nucleation stacking walks a node's links and sums each
//! linked pick's Gaussian contribution at the node's predicted arrival
//! time; nodes themselves hold no mutable state.

use std::sync::Arc;

use crate::geo::GeoPoint;
use crate::site::Site;

/// One station wired to a node, with its great-circle distance cached so
/// stacking doesn't recompute geometry on every pass.
#[derive(Debug, Clone)]
pub struct NodeSiteLink {
    pub site: Arc<Site>,
    pub distance_deg: f64,
}

#[derive(Debug)]
pub struct Node {
    pub id: u64,
    pub position: GeoPoint,
    pub depth_km: f64,
    pub links: Vec<NodeSiteLink>,
}

impl Node {
    /// Builds a node at `position`/`depth_km`, linking it to the
    /// `num_stations` closest sites among `candidates` (spec.md §4.1
    /// `NumStationsPerNode`).
    pub fn new(id: u64, position: GeoPoint, depth_km: f64, candidates: &[Arc<Site>], num_stations: usize) -> Self {
        let mut links: Vec<NodeSiteLink> = candidates
            .iter()
            .map(|site| NodeSiteLink { site: site.clone(), distance_deg: position.distance_deg(&site.position) })
            .collect();
        links.sort_by(|a, b| a.distance_deg.total_cmp(&b.distance_deg));
        links.truncate(num_stations);
        Self { id, position, depth_km, links }
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn max_link_distance_deg(&self) -> f64 {
        self.links.iter().map(|l| l.distance_deg).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::SiteKey;

    fn site_at(name: &str, lat: f64, lon: f64) -> Arc<Site> {
        Arc::new(Site::new(SiteKey::new("XX", name, "HHZ", "00"), GeoPoint::new(lat, lon), 0.0, 10))
    }

    #[test]
    fn links_to_closest_sites_only() {
        let candidates = vec![
            site_at("NEAR", 0.1, 0.0),
            site_at("MID", 1.0, 0.0),
            site_at("FAR", 10.0, 0.0),
        ];
        let node = Node::new(1, GeoPoint::new(0.0, 0.0), 10.0, &candidates, 2);
        assert_eq!(node.num_links(), 2);
        assert_eq!(node.links[0].site.key.station, "NEAR");
        assert_eq!(node.links[1].site.key.station, "MID");
    }
}
