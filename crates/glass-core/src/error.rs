//! Engine error types.
//!
//! Steady-state association errors are local and non-propagating
//! (spec.md §7): most of the paths that can fail here are logged and
//! dropped by the caller rather than bubbled up. `GlassError` exists for
//! the handful of cases that *do* need to be reported to a caller —
//! malformed config at initialization, and misuse of the public API.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GlassError {
    #[error("unknown site: {net}.{sta}.{chan}.{loc}")]
    UnknownSite { net: String, sta: String, chan: String, loc: String },

    #[error("travel-time lookup failed for phase {phase} at distance {delta_deg} deg")]
    TravelTimeUnavailable { phase: String, delta_deg: f64 },

    #[error("web {0} not found")]
    UnknownWeb(String),

    #[error("hypo {0} not found")]
    UnknownHypo(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("duplicate pick at {site} within {time_sec}s of an existing pick")]
    DuplicatePick { site: String, time_sec: f64 },

    #[error("site {site} throttled: {picks_per_hour} picks in the last hour")]
    SiteThrottled { site: String, picks_per_hour: usize },
}

pub type Result<T> = std::result::Result<T, GlassError>;
