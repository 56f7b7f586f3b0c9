//! Pagination walker - the resumable crawl state machine
//!
//! The walker pulls one [`Item`] at a time out of a paginated listing:
//!
//! ```text
//! Idle --load checkpoint--> Paging --fetch listing--> Items --exhausted--> Paging | Done
//! ```
//!
//! The checkpoint is saved after every item is built and before it is
//! returned, so a crash between the two replays that single item on resume.

use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::{has_more_pages, ItemSummary, ListingPage, ParseError, SiteLayout};
use crate::item::Item;
use crate::state::{Checkpoint, CheckpointStore};
use std::mem;
use std::sync::Arc;
use url::Url;

/// Listing endpoint with its pagination query template
#[derive(Debug, Clone)]
pub struct ListingUrl {
    base: Url,
    page_query: String,
}

impl ListingUrl {
    /// Creates a listing URL; any query or fragment on `url` is dropped
    ///
    /// `page_query` is appended verbatim with `{page}` replaced by the page
    /// number, e.g. `"?page={page}"`.
    pub fn new(url: &str, page_query: &str) -> Result<Self, ParseError> {
        let mut base = Url::parse(url).map_err(|source| ParseError::ListingUrl {
            url: url.to_string(),
            source,
        })?;
        base.set_query(None);
        base.set_fragment(None);

        Ok(Self {
            base,
            page_query: page_query.to_string(),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Address of listing page `page_number`
    pub fn page(&self, page_number: u32) -> String {
        format!(
            "{}{}",
            self.base,
            self.page_query.replace("{page}", &page_number.to_string())
        )
    }

    /// Resolves a detail link found on a listing page
    pub fn resolve(&self, href: &str) -> Result<String, ParseError> {
        self.base
            .join(href)
            .map(String::from)
            .map_err(|source| ParseError::DetailLink {
                base: self.base.to_string(),
                href: href.to_string(),
                source,
            })
    }
}

#[derive(Debug)]
enum WalkState {
    /// Checkpoint not loaded yet
    Idle,

    /// Next step fetches the checkpoint's listing page
    Paging,

    /// Handing out items of a fetched page, starting at `next`
    Items { page: ListingPage, next: usize },

    Done,
}

/// Pull-based walker over every item of a paginated listing
///
/// Each call to [`next_item`](Self::next_item) performs the fetches needed
/// for exactly one item. An error aborts the current step and resets the
/// walker, so the following call resumes from the persisted checkpoint.
pub struct PaginationWalker {
    fetcher: Fetcher,
    layout: Arc<dyn SiteLayout>,
    store: Arc<dyn CheckpointStore>,
    listing: ListingUrl,
    checkpoint: Checkpoint,
    state: WalkState,
}

impl PaginationWalker {
    pub fn new(
        fetcher: Fetcher,
        layout: Arc<dyn SiteLayout>,
        store: Arc<dyn CheckpointStore>,
        listing: ListingUrl,
    ) -> Self {
        Self {
            fetcher,
            layout,
            store,
            listing,
            checkpoint: Checkpoint::default(),
            state: WalkState::Idle,
        }
    }

    /// Position of the most recently returned item
    pub fn checkpoint(&self) -> Checkpoint {
        self.checkpoint
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state, WalkState::Done)
    }

    /// Returns the next item, or `None` once the last page is exhausted
    ///
    /// # Errors
    ///
    /// * `HarvestError::Fetch` - A listing or detail page stayed unreachable
    /// * `HarvestError::Checkpoint` - The checkpoint could not be saved
    /// * `HarvestError::Parse` - A detail link could not be resolved
    pub async fn next_item(&mut self) -> crate::Result<Option<Item>> {
        loop {
            match mem::replace(&mut self.state, WalkState::Idle) {
                WalkState::Idle => {
                    self.checkpoint = match self.store.load_saved() {
                        Some(saved) => {
                            tracing::info!("Resuming from {}", saved);
                            saved
                        }
                        None => {
                            let start = Checkpoint::default();
                            tracing::info!("No checkpoint found, starting from {}", start);
                            start
                        }
                    };
                    self.state = WalkState::Paging;
                }

                WalkState::Paging => {
                    let url = self.listing.page(self.checkpoint.page_number);
                    tracing::info!(
                        "Processing page Nr.: {}, url: {}",
                        self.checkpoint.page_number,
                        url
                    );

                    let document = self.fetcher.fetch(&url).await?;
                    let page = self.layout.parse_listing(&document.body);
                    tracing::debug!(
                        "Page {} lists {} items",
                        self.checkpoint.page_number,
                        page.items.len()
                    );

                    self.state = WalkState::Items {
                        next: self.checkpoint.item_number,
                        page,
                    };
                }

                WalkState::Items { page, next } if next < page.items.len() => {
                    let item = self.build_item(&page.items[next]).await?;

                    let checkpoint = self.checkpoint.at_item(next);
                    self.store.save(checkpoint)?;
                    self.checkpoint = checkpoint;

                    tracing::debug!("Item {} complete", display_id(&item));
                    self.state = WalkState::Items {
                        page,
                        next: next + 1,
                    };
                    return Ok(Some(item));
                }

                WalkState::Items { page, .. } => {
                    if page.counter.as_deref().is_some_and(has_more_pages) {
                        let checkpoint = self.checkpoint.next_page();
                        self.store.save(checkpoint)?;
                        self.checkpoint = checkpoint;
                        self.state = WalkState::Paging;
                    } else {
                        tracing::info!(
                            "Last page reached at page {}",
                            self.checkpoint.page_number
                        );
                        self.state = WalkState::Done;
                    }
                }

                WalkState::Done => {
                    self.state = WalkState::Done;
                    return Ok(None);
                }
            }
        }
    }

    /// Deletes the persisted checkpoint after a complete pass
    pub fn clear_state(&self) -> crate::Result<()> {
        self.store.clear()?;
        Ok(())
    }

    async fn build_item(&self, summary: &ItemSummary) -> crate::Result<Item> {
        let mut item = Item {
            id: None,
            name: summary.name.clone(),
            description: summary.description.clone(),
            price: summary.price.clone(),
            details: Vec::new(),
        };

        match &summary.detail_link {
            Some(href) => {
                let url = self.listing.resolve(href)?;
                let document = self.fetcher.fetch(&url).await?;
                let record = self.layout.parse_detail(&document.body);
                item.id = record.id;
                item.details = record.details;
            }
            None => tracing::warn!("Item has no details {:?}", item),
        }

        Ok(item)
    }
}

fn display_id(item: &Item) -> &str {
    item.id.as_deref().unwrap_or("<no id>")
}
