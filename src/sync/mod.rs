//! Sync loop - drives the walker into storage until the listing is exhausted
//!
//! One pass walks every remaining item and upserts it. A failed pass is
//! logged, followed by a fixed pause, and then a fresh pass resumes from the
//! persisted checkpoint. Only operator cancellation ends the loop early.

mod stats;

pub use stats::SyncStats;

use crate::config::Config;
use crate::crawler::{Fetcher, ListingUrl, PaginationWalker, SelectorLayout, SiteLayout};
use crate::item::Item;
use crate::notify::Notifier;
use crate::state::{CheckpointStore, FileCheckpointStore};
use crate::storage::UpsertSink;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How a harvest run ended
#[derive(Debug)]
pub enum SyncOutcome {
    /// Every page was walked and the checkpoint cleared
    Completed(SyncStats),

    /// The operator interrupted the run; the checkpoint is kept
    Cancelled(SyncStats),
}

enum PassEnd {
    Completed,
    Cancelled,
}

/// Upserts every item of a listing into a sink, restarting on failure
pub struct SyncLoop<N: Notifier> {
    fetcher: Fetcher,
    layout: Arc<dyn SiteLayout>,
    store: Arc<dyn CheckpointStore>,
    listing: ListingUrl,
    sink: Box<dyn UpsertSink>,
    identity_key: Vec<String>,
    notifier: N,
    recipients: String,
    target: String,
    restart_delay: Duration,
    cancel: CancellationToken,
}

impl<N: Notifier> SyncLoop<N> {
    /// Wires the crawler, checkpoint store and sink described by `config`
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `sink` - Storage opened for `config.database.file_path`
    /// * `notifier` - Receives the completion and interrupt messages
    /// * `cancel` - Token that ends the run at the next item boundary
    pub fn from_config(
        config: &Config,
        sink: Box<dyn UpsertSink>,
        notifier: N,
        cancel: CancellationToken,
    ) -> crate::Result<Self> {
        let layout = SelectorLayout::from_config(&config.scraper.selectors)?;

        Ok(Self {
            fetcher: Fetcher::from_config(&config.scraper.fetcher)?,
            layout: Arc::new(layout),
            store: Arc::new(FileCheckpointStore::new(&config.scraper.state_file)),
            listing: ListingUrl::new(&config.scraper.url, &config.scraper.page_query)?,
            sink,
            identity_key: config.database.identity_key.clone(),
            notifier,
            recipients: config
                .mail
                .as_ref()
                .map(|mail| mail.recipients.clone())
                .unwrap_or_default(),
            target: config.database.file_path.clone(),
            restart_delay: config.scraper.restart_delay(),
            cancel,
        })
    }

    /// Replaces the checkpoint store
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = store;
        self
    }

    /// Runs passes until the listing is fully harvested or the run is cancelled
    pub async fn run(mut self) -> SyncOutcome {
        let mut stats = SyncStats::new();

        loop {
            match self.pass(&mut stats).await {
                Ok(PassEnd::Completed) => {
                    tracing::info!(
                        "The listing {} successfully harvested into {}",
                        self.listing.base(),
                        self.target
                    );
                    self.notifier
                        .notify(
                            &self.recipients,
                            "Harvest complete",
                            &format!(
                                "{} harvested into {}\n\n{}",
                                self.listing.base(),
                                self.target,
                                stats.summary()
                            ),
                        )
                        .await;
                    return SyncOutcome::Completed(stats);
                }
                Ok(PassEnd::Cancelled) => return self.interrupted(stats).await,
                Err(e) => {
                    stats.failed_passes += 1;
                    tracing::error!("Unexpected error: {}", e);
                    tracing::info!("Waiting {} seconds", self.restart_delay.as_secs());

                    let cancelled = tokio::select! {
                        _ = self.cancel.cancelled() => true,
                        _ = tokio::time::sleep(self.restart_delay) => false,
                    };
                    if cancelled {
                        return self.interrupted(stats).await;
                    }
                }
            }
        }
    }

    async fn pass(&mut self, stats: &mut SyncStats) -> crate::Result<PassEnd> {
        let mut walker = PaginationWalker::new(
            self.fetcher.clone(),
            Arc::clone(&self.layout),
            Arc::clone(&self.store),
            self.listing.clone(),
        );

        loop {
            if self.cancel.is_cancelled() {
                return Ok(PassEnd::Cancelled);
            }

            match walker.next_item().await? {
                Some(item) => self.upsert(item, stats)?,
                None => break,
            }
        }

        walker.clear_state()?;
        Ok(PassEnd::Completed)
    }

    fn upsert(&mut self, item: Item, stats: &mut SyncStats) -> crate::Result<()> {
        let Some(key) = item.key(&self.identity_key) else {
            tracing::warn!(
                "Item '{}' has no identity key, inserting it as-is",
                item.name
            );
            self.sink.insert(item)?;
            stats.degraded += 1;
            return Ok(());
        };

        if self.sink.find(&key)?.is_some() {
            tracing::debug!("Replacing {}", key);
            self.sink.replace(item, &key)?;
            stats.replaced += 1;
        } else {
            tracing::debug!("Inserting {}", key);
            self.sink.insert(item)?;
            stats.inserted += 1;
        }
        Ok(())
    }

    async fn interrupted(&self, stats: SyncStats) -> SyncOutcome {
        tracing::error!("Interrupted by user!");
        self.notifier
            .notify(
                &self.recipients,
                "Harvest interrupted",
                &format!(
                    "Harvesting {} was interrupted by the operator.\n\n{}",
                    self.listing.base(),
                    stats.summary()
                ),
            )
            .await;
        SyncOutcome::Cancelled(stats)
    }
}
