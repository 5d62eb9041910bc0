//! respcache library
//!
//! A disk-backed TTL cache for upstream responses, plus the provider client
//! and CLI plumbing used by the `respcache` binary.

pub mod cache;
pub mod cli;
pub mod config;
pub mod provider;
