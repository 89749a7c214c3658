//! Cache module for storing API responses in a key-value store
//!
//! This module provides a cache engine that wraps a persistent key-value store
//! with per-entry TTL expiry, last-access tracking, a key namespace, and
//! explicit least-recently-used eviction.

mod engine;

pub use engine::{CacheEngine, CacheError, CacheLookup, CacheStats, EvictionReport, CACHE_NAMESPACE};
