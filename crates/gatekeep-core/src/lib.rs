//! Plumbing shared by Gatekeep services: tracing, env configuration and
//! request-id propagation.

pub mod config;
pub mod middleware;
pub mod tracing;
