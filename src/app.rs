//! Command execution for Sea Here
//!
//! [`App`] runs one parsed [`Command`] against the repository, writes
//! plain-text output, and reports progress through an [`Announcer`].

use std::io::{self, Write};

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use crate::announce::{Announcer, Politeness};
use crate::cache::{CacheError, EvictionReport};
use crate::cli::{CacheCommand, Command};
use crate::data::{PopulationPoint, Species};
use crate::repository::Repository;

/// Failures that end a command
///
/// Lookups never fail; only writing output and explicit cache
/// administration can.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Failed to write output: {0}")]
    Output(#[from] io::Error),

    #[error("Cache operation failed: {0}")]
    Cache(#[from] CacheError),
}

/// Runs commands against a repository
pub struct App<'a> {
    repository: &'a Repository,
    announcer: &'a dyn Announcer,
    /// Eviction limit for maintenance and `cache evict` without `--max`
    max_entries: usize,
}

impl<'a> App<'a> {
    pub fn new(repository: &'a Repository, announcer: &'a dyn Announcer, max_entries: usize) -> Self {
        Self {
            repository,
            announcer,
            max_entries,
        }
    }

    /// Runs a command, writing its output to `out`
    pub async fn run<W: Write>(&self, command: &Command, out: &mut W) -> Result<(), AppError> {
        match command {
            Command::Species { id } => self.show_species(id, out).await,
            Command::Search { query } => self.search(&Command::search_query(query), out).await,
            Command::Population { id } => self.show_population(id, out).await,
            Command::List => self.list(out),
            Command::Warm => self.warm(out).await,
            Command::Cache { action } => self.cache(*action, out).await,
        }
    }

    /// Post-command maintenance: bounds the cache to `max_entries`
    ///
    /// Failures are logged and otherwise ignored.
    pub async fn maintain(&self) -> Option<EvictionReport> {
        match self.repository.evict_lru_if_needed(self.max_entries).await {
            Ok(report) => {
                debug!(
                    expired = report.expired,
                    evicted = report.evicted,
                    "Cache maintenance finished"
                );
                Some(report)
            }
            Err(e) => {
                warn!(error = %e, "Cache maintenance failed");
                None
            }
        }
    }

    async fn show_species<W: Write>(&self, id: &str, out: &mut W) -> Result<(), AppError> {
        let id = id.trim();
        if id.is_empty() {
            writeln!(out, "No species id given")?;
            return Ok(());
        }
        self.announcer
            .announce(&format!("Loading {}…", id), Politeness::Polite);

        match self.repository.get_species(id).await {
            Some(species) => {
                write!(out, "{}", render_card(&species))?;
                self.announcer
                    .announce(&format!("Loaded {}", species.name), Politeness::Polite);
            }
            None => {
                writeln!(out, "No species found for '{}'", id)?;
                self.announcer
                    .announce(&format!("{} not found", id), Politeness::Assertive);
            }
        }
        Ok(())
    }

    async fn search<W: Write>(&self, query: &str, out: &mut W) -> Result<(), AppError> {
        let query = query.trim();
        let results = self.repository.search(query).await;

        if results.is_empty() {
            writeln!(out, "No results for '{}'", query)?;
        } else {
            for species in &results {
                writeln!(out, "{}", summary_line(species))?;
            }
        }

        self.announcer
            .announce(&results_message(results.len(), query), Politeness::Polite);
        Ok(())
    }

    async fn show_population<W: Write>(&self, id: &str, out: &mut W) -> Result<(), AppError> {
        let id = id.trim();
        let points = self.repository.get_population(id).await;

        if points.is_empty() {
            writeln!(out, "No population data for '{}'", id)?;
            self.announcer.announce(
                &format!("No population data for {}", id),
                Politeness::Polite,
            );
        } else {
            write!(out, "{}", render_population(&points))?;
            self.announcer.announce(
                &format!("Loaded {} years of population data for {}", points.len(), id),
                Politeness::Polite,
            );
        }
        Ok(())
    }

    fn list<W: Write>(&self, out: &mut W) -> Result<(), AppError> {
        for species in self.repository.dataset().all() {
            writeln!(out, "{}", summary_line(species))?;
        }
        Ok(())
    }

    /// Resolves every bundled species concurrently, filling the cache
    async fn warm<W: Write>(&self, out: &mut W) -> Result<(), AppError> {
        let ids: Vec<&str> = self
            .repository
            .dataset()
            .all()
            .iter()
            .map(|species| species.id.as_str())
            .collect();

        let lookups = ids.iter().map(|id| self.repository.get_species(id));
        let resolved = join_all(lookups).await.into_iter().flatten().count();

        writeln!(out, "Warmed {} of {} species", resolved, ids.len())?;
        self.announcer
            .announce(&format!("Warmed {} species", resolved), Politeness::Polite);
        Ok(())
    }

    async fn cache<W: Write>(&self, action: CacheCommand, out: &mut W) -> Result<(), AppError> {
        match action {
            CacheCommand::Stats => {
                let stats = self.repository.cache_stats().await?;
                writeln!(out, "Entries: {}", stats.total)?;
                writeln!(out, "Valid:   {}", stats.valid)?;
                writeln!(out, "Expired: {}", stats.expired)?;
            }
            CacheCommand::Clear => {
                let removed = self.repository.clear_cache().await?;
                writeln!(out, "Removed {} cache entries", removed)?;
            }
            CacheCommand::Evict { max } => {
                let max = max.unwrap_or(self.max_entries);
                let report = self.repository.evict_lru_if_needed(max).await?;
                writeln!(
                    out,
                    "Purged {} expired and evicted {} entries (limit {})",
                    report.expired, report.evicted, max
                )?;
            }
        }
        Ok(())
    }
}

/// Plain-text fact card
pub fn render_card(species: &Species) -> String {
    let mut card = format!("{} ({})\n", species.name, species.id);
    card.push_str(&format!("Status:      {}\n", species.status));
    card.push_str(&format!("Habitat:     {}\n", species.facts.habitat));
    card.push_str(&format!("Diet:        {}\n", species.facts.diet));
    card.push_str(&format!("Temperament: {}\n", species.facts.temperament));
    card.push_str(&format!("Images:      {}\n", species.images.join(", ")));
    card
}

fn summary_line(species: &Species) -> String {
    format!("{:<24} {:<24} {}", species.id, species.name, species.status)
}

/// Year/count table, oldest year first
pub fn render_population(points: &[PopulationPoint]) -> String {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|point| point.year);
    sorted
        .iter()
        .map(|point| format!("{}  {}\n", point.year, point.count))
        .collect()
}

fn results_message(count: usize, query: &str) -> String {
    match count {
        1 => format!("1 result for {}", query),
        n => format!("{} results for {}", n, query),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::announce::MemoryAnnouncer;
    use crate::backoff::BackoffPolicy;
    use crate::cache::CacheEngine;
    use crate::data::{BundledDataset, OfflineTransport};
    use crate::store::MemoryStore;

    fn repository() -> Repository {
        let cache = CacheEngine::new(Arc::new(MemoryStore::new()));
        let dataset = Arc::new(BundledDataset::load().expect("Bundled dataset should load"));
        Repository::new(cache, Arc::new(OfflineTransport), dataset)
            .with_backoff(BackoffPolicy::no_retries())
    }

    async fn run(repository: &Repository, announcer: &MemoryAnnouncer, command: Command) -> String {
        let app = App::new(repository, announcer, 200);
        let mut out = Vec::new();
        app.run(&command, &mut out).await.expect("Command should succeed");
        String::from_utf8(out).expect("Output should be UTF-8")
    }

    #[tokio::test]
    async fn test_species_card_offline() {
        let repository = repository();
        let announcer = MemoryAnnouncer::new();

        let output = run(
            &repository,
            &announcer,
            Command::Species {
                id: "vaquita".to_string(),
            },
        )
        .await;

        assert!(output.starts_with("Vaquita (vaquita)\n"));
        assert!(output.contains("Status:      Critically Endangered"));
        let messages: Vec<String> = announcer.messages().into_iter().map(|(m, _)| m).collect();
        assert_eq!(messages, vec!["Loading vaquita…", "Loaded Vaquita"]);
    }

    #[tokio::test]
    async fn test_unknown_species_announces_assertively() {
        let repository = repository();
        let announcer = MemoryAnnouncer::new();

        let output = run(
            &repository,
            &announcer,
            Command::Species {
                id: "kraken".to_string(),
            },
        )
        .await;

        assert_eq!(output, "No species found for 'kraken'\n");
        let last = announcer.messages().pop().expect("Should announce");
        assert_eq!(last, ("kraken not found".to_string(), Politeness::Assertive));
    }

    #[tokio::test]
    async fn test_blank_species_id_is_not_announced() {
        let repository = repository();
        let announcer = MemoryAnnouncer::new();

        let output = run(
            &repository,
            &announcer,
            Command::Species {
                id: "   ".to_string(),
            },
        )
        .await;

        assert_eq!(output, "No species id given
");
        assert!(announcer.messages().is_empty());
    }

    #[tokio::test]
    async fn test_search_lists_matches() {
        let repository = repository();
        let announcer = MemoryAnnouncer::new();

        let output = run(
            &repository,
            &announcer,
            Command::Search {
                query: vec!["kelp".to_string()],
            },
        )
        .await;

        assert_eq!(output.lines().count(), 2);
        assert!(output.contains("sea-otter"));
        assert!(output.contains("leafy-seadragon"));
        assert_eq!(announcer.messages()[0].0, "2 results for kelp");
    }

    #[tokio::test]
    async fn test_population_offline_is_empty() {
        let repository = repository();
        let announcer = MemoryAnnouncer::new();

        let output = run(
            &repository,
            &announcer,
            Command::Population {
                id: "vaquita".to_string(),
            },
        )
        .await;

        assert_eq!(output, "No population data for 'vaquita'\n");
    }

    #[tokio::test]
    async fn test_list_shows_bundled_species() {
        let repository = repository();
        let announcer = MemoryAnnouncer::new();

        let output = run(&repository, &announcer, Command::List).await;
        assert_eq!(output.lines().count(), 6);
    }

    #[tokio::test]
    async fn test_warm_then_stats() {
        let repository = repository();
        let announcer = MemoryAnnouncer::new();

        let output = run(&repository, &announcer, Command::Warm).await;
        assert_eq!(output, "Warmed 6 of 6 species\n");

        let output = run(
            &repository,
            &announcer,
            Command::Cache {
                action: CacheCommand::Stats,
            },
        )
        .await;
        assert!(output.contains("Entries: 6"));
        assert!(output.contains("Valid:   6"));
    }

    #[tokio::test]
    async fn test_cache_evict_and_clear() {
        let repository = repository();
        let announcer = MemoryAnnouncer::new();
        run(&repository, &announcer, Command::Warm).await;

        let output = run(
            &repository,
            &announcer,
            Command::Cache {
                action: CacheCommand::Evict { max: Some(4) },
            },
        )
        .await;
        assert_eq!(output, "Purged 0 expired and evicted 2 entries (limit 4)\n");

        let output = run(
            &repository,
            &announcer,
            Command::Cache {
                action: CacheCommand::Clear,
            },
        )
        .await;
        assert_eq!(output, "Removed 4 cache entries\n");
    }

    #[tokio::test]
    async fn test_maintain_bounds_cache() {
        let repository = repository();
        let announcer = MemoryAnnouncer::new();
        run(&repository, &announcer, Command::Warm).await;

        let app = App::new(&repository, &announcer, 3);
        let report = app.maintain().await.expect("Maintenance should succeed");
        assert_eq!(report.evicted, 3);
    }

    #[test]
    fn test_render_population_sorts_by_year() {
        let points = [
            PopulationPoint { year: 2021, count: 10 },
            PopulationPoint { year: 2019, count: 30 },
        ];
        assert_eq!(render_population(&points), "2019  30\n2021  10\n");
    }

    #[test]
    fn test_results_message() {
        assert_eq!(results_message(0, "x"), "0 results for x");
        assert_eq!(results_message(1, "x"), "1 result for x");
    }
}
