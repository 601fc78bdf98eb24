//! Infrastructure layer for Bottastic.
//!
//! Concrete adapters around `bottastic-core`: TOML configuration loading,
//! data directory resolution, and an in-process simulated mesh that
//! implements the core's transport capability.

pub mod config;
pub mod data_dir;
pub mod sim;
