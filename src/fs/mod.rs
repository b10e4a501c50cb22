//! Filesystem utilities for tierwatch.
//!
//! The durable store and the config writer both go through [`atomic_write`],
//! so a crash mid-write never leaves a half-written state file behind.

pub mod atomic;

pub use atomic::{atomic_write, atomic_write_json, read_json_or_default};
