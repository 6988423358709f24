//! Tees vdbench output to stdout and pushes the latest interval report to a
//! Prometheus Pushgateway.

pub mod agent;
pub mod config;
pub mod export;
pub mod handoff;
pub mod ingest;
pub mod lifecycle;
pub mod publisher;
pub mod record;
