//! Shared domain types for Bottastic.
//!
//! This crate contains the types exchanged between the dispatch runtime and
//! the mesh transport: node addresses, decoded packets, node directory
//! records, send options, connection events, and their error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod error;
pub mod event;
pub mod node;
pub mod packet;
pub mod send;
