//! Spherical grid lookup for ground-track rendering.
//!
//! The data model lives in [`trackgrid_map`]. This crate adds file-based configuration and the `grid-export` tool.

mod config;

pub use config::{Config, ConfigError};

pub use trackgrid_core as core;
pub use trackgrid_map as map;
