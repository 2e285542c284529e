//! services/api/src/lib.rs
//!
//! The HTTP surface of the card archive: the Postgres adapter, configuration
//! and the Axum router. The binaries in `src/bin` wire these together.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
