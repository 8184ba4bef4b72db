//!
//! src/playlist.rs
//!
//! Batch side of the service: splits a document into entries, resolves
//! them with a bounded number in flight and renders the output document
//!

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::{sync::Semaphore, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{BatchConfig, OutputFormat};
use crate::errors::ResolverError;
use crate::provider::{CatalogProvider, ScrobbleProvider};
use crate::track::TrackRecord;

/// One entry per non-blank line, trimmed
pub fn parse_entries(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// A record after the batch is done with it, plus the reason it stopped
/// short of resolution when it did
#[derive(Debug)]
pub struct Outcome {
    pub record: TrackRecord,
    pub error: Option<ResolverError>
}

impl Outcome {
    fn failed(entry: &str, error: ResolverError) -> Self {
        Self { record: TrackRecord::new(entry), error: Some(error) }
    }
}

#[derive(Clone)]
pub struct Resolver {
    catalog: Arc<dyn CatalogProvider>,
    scrobbles: Option<Arc<dyn ScrobbleProvider>>,
    cfg: BatchConfig
}

impl Resolver {
    pub fn new(catalog: Arc<dyn CatalogProvider>, cfg: BatchConfig) -> Self {
        Self { catalog, scrobbles: None, cfg }
    }

    pub fn with_scrobbles(mut self, scrobbles: Arc<dyn ScrobbleProvider>) -> Self {
        self.scrobbles = Some(scrobbles);
        self
    }

    ///
    /// Resolves one entry: one step, a second to upgrade a search hit when
    /// configured, then scrobble enrichment for anything with a title.
    /// Enrichment failures are only logged
    ///
    pub async fn resolve_entry(&self, entry: &str) -> Outcome {
        let mut record = TrackRecord::new(entry);
        let catalog = self.catalog.as_ref();

        let mut resolved = record.resolve(catalog).await.map(|_| ());
        if resolved.is_ok() && self.cfg.upgrade_partial && record.is_partial() {
            resolved = record.resolve(catalog).await.map(|_| ());
        }

        if let Err(e) = &resolved {
            warn!(entry = %record.entry(), error = %e, "playlist.resolve.failed");
        }

        if let Some(scrobbles) = &self.scrobbles {
            if record.title().is_some() {
                let enriched = record.enrich(scrobbles.as_ref()).await.map(|_| ());
                if let Err(e) = enriched {
                    warn!(entry = %record.entry(), error = %e, "playlist.enrich.failed");
                }
            }
        }

        Outcome { record, error: resolved.err() }
    }

    ///
    /// Resolves every entry with at most `concurrency` in flight; output
    /// order matches input order. Entries still waiting when `cancel` fires
    /// come back unresolved
    ///
    pub async fn resolve_all(&self, entries: Vec<String>, cancel: &CancellationToken) ->
        Vec<Outcome> {
        info!(entries = entries.len(), concurrency = self.cfg.concurrency, "playlist.start");

        let permits = Arc::new(Semaphore::new(self.cfg.concurrency.max(1)));
        let mut tasks = JoinSet::new();

        for (index, entry) in entries.iter().cloned().enumerate() {
            let this    = self.clone();
            let permits = permits.clone();
            let cancel  = cancel.clone();
            tasks.spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    permit = permits.acquire_owned() => permit.ok(),
                };
                let outcome = match permit {
                    Some(_permit) if !cancel.is_cancelled() => this.resolve_entry(&entry).await,
                    _ => Outcome::failed(&entry, ResolverError::Cancelled)
                };
                (index, outcome)
            });
        }

        let mut slots: Vec<Option<Outcome>> = entries.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => error!(error = ?e, "playlist.task.failed")
            }
        }

        let outcomes: Vec<Outcome> = slots.into_iter()
            .zip(entries)
            .map(|(slot, entry)| slot.unwrap_or_else(||
                Outcome::failed(&entry, ResolverError::Task("resolver task aborted".to_string()))
            ))
            .collect();

        let failed = outcomes.iter().filter(|o| o.error.is_some()).count();
        info!(resolved = outcomes.len() - failed, failed, "playlist.done");
        outcomes
    }
}

/// One JSON output line
#[derive(Debug, Serialize)]
pub struct TrackSummary<'a> {
    pub entry: &'a str,
    pub id: Option<&'a str>,
    pub title: Option<&'a str>,
    pub artists: Option<String>,
    pub album: Option<&'a str>,
    pub popularity: Option<u32>,
    pub uri: Option<&'a str>,
    pub playcount: Option<i64>,
    pub error: Option<String>
}

impl<'a> From<&'a Outcome> for TrackSummary<'a> {
    fn from(outcome: &'a Outcome) -> Self {
        let record = &outcome.record;
        Self {
            entry: record.entry(),
            id: record.identifier(),
            title: record.title(),
            artists: record.artists(),
            album: record.album(),
            popularity: record.popularity(),
            uri: record.uri(),
            playcount: record.playcount(),
            error: outcome.error.as_ref().map(ToString::to_string)
        }
    }
}

///
/// Renders one line per outcome. `Uri` falls back to the raw entry so an
/// unresolved line survives a round trip; with `dedupe` a record equal to
/// an earlier one is dropped
///
pub fn render(outcomes: &[Outcome], format: OutputFormat, dedupe: bool) -> Result<String, ResolverError> {
    let mut seen: HashSet<&TrackRecord> = HashSet::new();
    let mut out = String::new();

    for outcome in outcomes {
        let record = &outcome.record;
        if dedupe && !seen.insert(record) {
            continue;
        }
        let line = match format {
            OutputFormat::Uri => record.uri().unwrap_or(record.entry()).to_string(),
            OutputFormat::Display => record.canonical_string(),
            OutputFormat::Json => serde_json::to_string(&TrackSummary::from(outcome))?
        };
        out.push_str(&line);
        out.push('\n');
    }
    Ok(out)
}
