//! Wire-protocol schema for the association engine (spec.md §6): JSON
//! message parsing/serialization and ISO8601 time conversion. The core
//! (`glass-core`) never depends on this crate; `glass-server` translates
//! between the two.

pub mod error;
pub mod init_config;
pub mod message;
pub mod time;

pub use error::{ProtoError, Result};
pub use init_config::InitConfig;
pub use message::{
    Beam, CorrelationInput, DetectionInput, HypocenterRef, InboundMessage, OutboundMessage, PickInput, SiteListEntry, SiteRef,
};
