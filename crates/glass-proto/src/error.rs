//! Wire-protocol error type (spec.md §7: "malformed input ... pick or
//! message is dropped; a warning is logged").

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtoError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("unrecognized discriminator: neither Cmd nor Type present, or value unknown")]
    UnknownDiscriminator,

    #[error("unparseable timestamp: {0}")]
    BadTimestamp(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProtoError>;
