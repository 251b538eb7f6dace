//! airtime: core library for the broadcast archive.
//!
//! Rebuilds a station's daily schedule from its listing pages and assembles
//! one recording per programme out of fixed-length capture segments.
//! The `airtime` CLI and the headless tests consume this crate.

pub mod concat;
pub mod config;
pub mod error;
pub mod ingest;
pub mod listing;
pub mod pipeline;
pub mod planner;
pub mod programme;
pub mod segments;
pub mod source;
pub mod store;
pub mod sweeper;
pub mod timeline;
