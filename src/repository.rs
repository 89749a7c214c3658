//! Data repository: cache, then remote API, then bundled dataset
//!
//! The single entry point the rest of the application uses to obtain species
//! records, search results, and population series. Each accessor tries its
//! sources in order and never returns an error: transport failures, invalid
//! payloads, and cache failures are logged and the next source is tried.
//! "Not found" is reported as `None` or an empty list.
//!
//! Remote requests are conditional. The `ETag` of an accepted response is
//! cached under `etag:{path}` and sent back as `If-None-Match`, so an
//! unchanged resource costs a 304 instead of a download.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::backoff::{with_backoff, BackoffPolicy};
use crate::cache::{CacheEngine, CacheError, CacheLookup, CacheStats, EvictionReport};
use crate::data::client::{encode_path_segment, encode_query_value};
use crate::data::{
    parse_population, parse_species, parse_species_list, ApiError, BundledDataset,
    PopulationPoint, Species, Transport, ValidationError,
};

/// How long a species record stays cached
pub const SPECIES_TTL: Duration = Duration::from_secs(24 * 60 * 60);
/// How long a search result list stays cached
pub const SEARCH_TTL: Duration = Duration::from_secs(30 * 60);
/// How long a population series stays cached
pub const POPULATION_TTL: Duration = Duration::from_secs(6 * 60 * 60);
/// How long a response validator (ETag) stays cached
pub const VALIDATOR_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A place a species record can come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeciesSource {
    Cache,
    Remote,
    Bundled,
}

/// Order in which [`Repository::get_species`] consults its sources
pub const SPECIES_RESOLUTION_ORDER: [SpeciesSource; 3] = [
    SpeciesSource::Cache,
    SpeciesSource::Remote,
    SpeciesSource::Bundled,
];

pub fn species_key(id: &str) -> String {
    format!("species:{}", id)
}

pub fn search_key(query: &str) -> String {
    format!("search:{}", query)
}

pub fn population_key(id: &str) -> String {
    format!("population:{}", id)
}

/// Cache key of the validator stored for a request path
pub fn validator_key(path: &str) -> String {
    format!("etag:{}", path)
}

pub fn species_path(id: &str) -> String {
    format!("/api/species/{}", encode_path_segment(id))
}

pub fn search_path(query: &str) -> String {
    format!("/api/search?q={}", encode_query_value(query))
}

pub fn population_path(id: &str) -> String {
    format!("/api/population/{}", encode_path_segment(id))
}

/// Combines local and remote search results
///
/// Local results come first in their original order, followed by remote
/// results whose id has not been seen yet. Local wins on duplicate ids.
pub fn merge_results(local: Vec<Species>, remote: Vec<Species>) -> Vec<Species> {
    let mut seen: HashSet<String> = local.iter().map(|species| species.id.clone()).collect();
    let mut merged = local;
    for species in remote {
        if seen.insert(species.id.clone()) {
            merged.push(species);
        }
    }
    merged
}

/// Result of one conditional request
enum Fetched {
    /// 304: the server says our cached copy is current
    NotModified,
    /// 2xx: a new body, not yet validated
    Fresh {
        body: Option<Value>,
        etag: Option<String>,
    },
}

/// Resolves species, search, and population requests across cache, API, and bundled data
pub struct Repository {
    cache: CacheEngine,
    transport: Arc<dyn Transport>,
    dataset: Arc<BundledDataset>,
    backoff: BackoffPolicy,
}

impl Repository {
    /// Creates a repository with the default retry policy
    pub fn new(cache: CacheEngine, transport: Arc<dyn Transport>, dataset: Arc<BundledDataset>) -> Self {
        Self {
            cache,
            transport,
            dataset,
            backoff: BackoffPolicy::default(),
        }
    }

    /// Replaces the retry policy used for remote calls
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn cache(&self) -> &CacheEngine {
        &self.cache
    }

    pub fn dataset(&self) -> &BundledDataset {
        &self.dataset
    }

    /// Looks up a species by id
    ///
    /// Tries each source in [`SPECIES_RESOLUTION_ORDER`] and returns the
    /// first record found. Blank ids return `None` without touching the
    /// cache or the network.
    pub async fn get_species(&self, id: &str) -> Option<Species> {
        let id = id.trim();
        if id.is_empty() {
            return None;
        }

        for source in SPECIES_RESOLUTION_ORDER {
            if let Some(species) = self.resolve_species(source, id).await {
                debug!(id, ?source, "Species resolved");
                return Some(species);
            }
        }

        debug!(id, "Species not found in any source");
        None
    }

    /// Consults a single source for a species
    ///
    /// Remote and bundled hits are written back to the cache.
    pub async fn resolve_species(&self, source: SpeciesSource, id: &str) -> Option<Species> {
        match source {
            SpeciesSource::Cache => self.cached_species(id).await,
            SpeciesSource::Remote => self.fetch_species(id).await,
            SpeciesSource::Bundled => self.bundled_species(id).await,
        }
    }

    /// Searches bundled and remote species
    ///
    /// Bundled matches are always computed; remote matches are appended when
    /// the API answers with a valid list. The combined list is cached for
    /// [`SEARCH_TTL`].
    pub async fn search(&self, query: &str) -> Vec<Species> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        let key = search_key(query);
        if let Some(results) = self.cached_species_list(&key).await {
            debug!(query, count = results.len(), "Search served from cache");
            return results;
        }

        let local = self.dataset.search(query);
        let path = search_path(query);

        let (results, validator) = match self.fetch(&path).await {
            Some(Fetched::Fresh { body, etag }) => {
                match body.ok_or(ValidationError::MissingBody).and_then(parse_species_list) {
                    Ok(remote) => (merge_results(local, remote), etag),
                    Err(e) => {
                        warn!(query, error = %e, "Rejected remote search results");
                        (local, None)
                    }
                }
            }
            Some(Fetched::NotModified) => {
                let cached = self.cached_species_list(&key).await;
                (self.revalidated(&path, cached).await.unwrap_or(local), None)
            }
            None => (local, None),
        };

        self.store(&key, &results, SEARCH_TTL).await;
        self.store_validator(&path, validator).await;
        results
    }

    /// Returns the population series for a species
    ///
    /// There is no bundled population data: when neither the cache nor the
    /// API has a series, the result is empty.
    pub async fn get_population(&self, id: &str) -> Vec<PopulationPoint> {
        let id = id.trim();
        if id.is_empty() {
            return Vec::new();
        }

        let key = population_key(id);
        if let Some(points) = self.cached_population(&key).await {
            return points;
        }

        let path = population_path(id);
        match self.fetch(&path).await {
            Some(Fetched::Fresh { body, etag }) => {
                match body.ok_or(ValidationError::MissingBody).and_then(parse_population) {
                    Ok(points) => {
                        self.store(&key, &points, POPULATION_TTL).await;
                        self.store_validator(&path, etag).await;
                        points
                    }
                    Err(e) => {
                        warn!(id, error = %e, "Rejected remote population data");
                        Vec::new()
                    }
                }
            }
            Some(Fetched::NotModified) => {
                let cached = self.cached_population(&key).await;
                self.revalidated(&path, cached).await.unwrap_or_default()
            }
            None => Vec::new(),
        }
    }

    /// Removes every cached entry
    pub async fn clear_cache(&self) -> Result<usize, CacheError> {
        self.cache.clear().await
    }

    /// Runs an LRU eviction pass over the cache
    pub async fn evict_lru_if_needed(&self, max_entries: usize) -> Result<EvictionReport, CacheError> {
        self.cache.evict_lru_if_needed(max_entries).await
    }

    pub async fn cache_stats(&self) -> Result<CacheStats, CacheError> {
        self.cache.stats().await
    }

    // -- sources -----------------------------------------------------------

    async fn cached_species(&self, id: &str) -> Option<Species> {
        let species: Species = self.cached(&species_key(id)).await?;
        match species.validate() {
            Ok(()) => Some(species),
            Err(e) => {
                warn!(id, error = %e, "Ignoring invalid cached species");
                None
            }
        }
    }

    async fn cached_species_list(&self, key: &str) -> Option<Vec<Species>> {
        let list: Vec<Species> = self.cached(key).await?;
        match list.iter().try_for_each(Species::validate) {
            Ok(()) => Some(list),
            Err(e) => {
                warn!(key, error = %e, "Ignoring invalid cached species list");
                None
            }
        }
    }

    async fn cached_population(&self, key: &str) -> Option<Vec<PopulationPoint>> {
        let points: Vec<PopulationPoint> = self.cached(key).await?;
        match points.iter().try_for_each(PopulationPoint::validate) {
            Ok(()) => Some(points),
            Err(e) => {
                warn!(key, error = %e, "Ignoring invalid cached population");
                None
            }
        }
    }

    async fn fetch_species(&self, id: &str) -> Option<Species> {
        let path = species_path(id);
        match self.fetch(&path).await? {
            Fetched::NotModified => {
                let cached = self.cached_species(id).await;
                self.revalidated(&path, cached).await
            }
            Fetched::Fresh { body, etag } => {
                let parsed = body
                    .ok_or(ValidationError::MissingBody)
                    .and_then(parse_species)
                    .and_then(|species| {
                        if species.id == id {
                            Ok(species)
                        } else {
                            Err(ValidationError::IdMismatch {
                                expected: id.to_string(),
                                actual: species.id,
                            })
                        }
                    });

                match parsed {
                    Ok(species) => {
                        self.store(&species_key(id), &species, SPECIES_TTL).await;
                        self.store_validator(&path, etag).await;
                        Some(species)
                    }
                    Err(e) => {
                        warn!(id, error = %e, "Rejected remote species record");
                        None
                    }
                }
            }
        }
    }

    async fn bundled_species(&self, id: &str) -> Option<Species> {
        let species = self.dataset.get(id)?.clone();
        self.store(&species_key(id), &species, SPECIES_TTL).await;
        Some(species)
    }

    // -- remote ------------------------------------------------------------

    /// Issues a conditional request with retries
    ///
    /// Returns `None` when every attempt failed. Only transport failures and
    /// unexpected statuses are retried; body validation happens afterwards.
    async fn fetch(&self, path: &str) -> Option<Fetched> {
        let this = self;
        match with_backoff(&self.backoff, move || this.fetch_once(path)).await {
            Ok(fetched) => Some(fetched),
            Err(e) => {
                warn!(path, error = %e, "Remote fetch failed, falling back");
                None
            }
        }
    }

    async fn fetch_once(&self, path: &str) -> Result<Fetched, ApiError> {
        let validator: Option<String> = self.cached(&validator_key(path)).await;
        let response = self.transport.get(path, validator.as_deref()).await?;

        if response.is_not_modified() {
            debug!(path, "Remote resource not modified");
            return Ok(Fetched::NotModified);
        }
        if !response.is_success() {
            return Err(ApiError::Status(response.status));
        }

        Ok(Fetched::Fresh {
            body: response.body,
            etag: response.etag,
        })
    }

    /// Handles the cached side of a 304
    ///
    /// A 304 only helps if the data the validator describes is still cached.
    /// When it has expired or been evicted, the validator is dropped so the
    /// next request downloads the resource again.
    async fn revalidated<T>(&self, path: &str, cached: Option<T>) -> Option<T> {
        if cached.is_none() {
            warn!(path, "Not modified, but cached data is gone; dropping stale validator");
            if let Err(e) = self.cache.delete(&validator_key(path)).await {
                warn!(path, error = %e, "Failed to drop stale validator");
            }
        }
        cached
    }

    // -- cache helpers -----------------------------------------------------

    async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.cache.get(key).await {
            CacheLookup::Hit(value) => Some(value),
            CacheLookup::Miss => None,
            CacheLookup::Failed(e) => {
                warn!(key, error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    async fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: Duration) {
        if let Err(e) = self.cache.set(key, value, ttl).await {
            warn!(key, error = %e, "Failed to write cache entry");
        }
    }

    async fn store_validator(&self, path: &str, etag: Option<String>) {
        if let Some(etag) = etag {
            self.store(&validator_key(path), &etag, VALIDATOR_TTL).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ConservationStatus, OfflineTransport, SpeciesFacts};
    use crate::store::MemoryStore;

    fn species(id: &str, name: &str) -> Species {
        Species {
            id: id.to_string(),
            name: name.to_string(),
            status: ConservationStatus::Vulnerable,
            facts: SpeciesFacts {
                habitat: "Reef".to_string(),
                diet: "Plankton".to_string(),
                temperament: "Calm".to_string(),
            },
            images: vec![format!("images/{}.webp", id)],
        }
    }

    fn offline_repository() -> Repository {
        let cache = CacheEngine::new(Arc::new(MemoryStore::new()));
        let dataset = Arc::new(BundledDataset::load().expect("Bundled dataset should load"));
        Repository::new(cache, Arc::new(OfflineTransport), dataset)
            .with_backoff(BackoffPolicy::no_retries())
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(species_key("sea-otter"), "species:sea-otter");
        assert_eq!(search_key("kelp"), "search:kelp");
        assert_eq!(population_key("vaquita"), "population:vaquita");
        assert_eq!(validator_key("/api/species/vaquita"), "etag:/api/species/vaquita");
    }

    #[test]
    fn test_request_paths_are_encoded() {
        assert_eq!(species_path("sea-otter"), "/api/species/sea-otter");
        assert_eq!(species_path("sea otter"), "/api/species/sea%20otter");
        assert_eq!(population_path("sea otter"), "/api/population/sea%20otter");
        assert_eq!(search_path("sea otter"), "/api/search?q=sea+otter");
        assert_eq!(population_path("a/b"), "/api/population/a%2Fb");
    }

    #[test]
    fn test_merge_puts_local_first_and_dedups_by_id() {
        let local = vec![species("a", "Local A"), species("b", "Local B")];
        let remote = vec![
            species("b", "Remote B"),
            species("c", "Remote C"),
            species("c", "Remote C again"),
        ];

        let merged = merge_results(local, remote);

        let names: Vec<&str> = merged.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Local A", "Local B", "Remote C"]);
    }

    #[test]
    fn test_merge_with_empty_local() {
        let merged = merge_results(Vec::new(), vec![species("x", "X")]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_resolution_order() {
        assert_eq!(
            SPECIES_RESOLUTION_ORDER,
            [SpeciesSource::Cache, SpeciesSource::Remote, SpeciesSource::Bundled]
        );
    }

    #[tokio::test]
    async fn test_cache_source_alone_misses_on_empty_cache() {
        let repo = offline_repository();
        assert!(repo.resolve_species(SpeciesSource::Cache, "sea-otter").await.is_none());
    }

    #[tokio::test]
    async fn test_remote_source_alone_offline_is_none() {
        let repo = offline_repository();
        assert!(repo.resolve_species(SpeciesSource::Remote, "sea-otter").await.is_none());
    }

    #[tokio::test]
    async fn test_bundled_source_fills_cache() {
        let repo = offline_repository();

        let bundled = repo
            .resolve_species(SpeciesSource::Bundled, "vaquita")
            .await
            .expect("Vaquita is bundled");

        let cached = repo.resolve_species(SpeciesSource::Cache, "vaquita").await;
        assert_eq!(cached, Some(bundled));
    }

    #[tokio::test]
    async fn test_invalid_cached_species_is_ignored() {
        let repo = offline_repository();
        let mut broken = species("ghost", "Ghost");
        broken.images.clear();
        repo.cache()
            .set(&species_key("ghost"), &broken, SPECIES_TTL)
            .await
            .unwrap();

        assert!(repo.get_species("ghost").await.is_none());
    }

    #[tokio::test]
    async fn test_get_species_trims_id() {
        let repo = offline_repository();
        let species = repo.get_species("  blue-whale ").await.expect("Should resolve");
        assert_eq!(species.id, "blue-whale");
    }

    #[tokio::test]
    async fn test_blank_population_id_is_empty() {
        let repo = offline_repository();
        assert!(repo.get_population(" ").await.is_empty());
    }
}
