//! Shared plumbing for the operational utility binaries (`glass-replay`,
//! `glass-web-dump`).

pub mod common;
