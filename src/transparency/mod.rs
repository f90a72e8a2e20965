//! Transparency module for the Focus Sensor Agent.
//!
//! This module tracks what the agent processed and exposes it to the
//! user, so camera-based sensing stays auditable.

pub mod log;

pub use log::{
    create_shared_log, create_shared_log_with_persistence, read_counts, Counter, Counts,
    SharedTransparencyLog, TransparencyLog, TransparencyStats,
};
