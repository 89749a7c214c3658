//! Sea Here Library
//!
//! Offline-first access to sea creature facts: a TTL cache over a pluggable
//! key-value store, a conditional API client, and a bundled fallback dataset,
//! tied together by the [`repository::Repository`].

pub mod announce;
pub mod app;
pub mod backoff;
pub mod cache;
pub mod cli;
pub mod data;
pub mod repository;
pub mod store;
