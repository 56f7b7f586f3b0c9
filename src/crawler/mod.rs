//! Crawler module for catalog page fetching and walking
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with a bounded retry budget
//! - Listing and detail page parsing
//! - The resumable pagination walker

mod fetcher;
mod parser;
mod walker;

pub use fetcher::{build_http_client, Document, FetchError, FetchPolicy, Fetcher};
pub use parser::{
    has_more_pages, DetailRecord, ItemSummary, ListingPage, ParseError, SelectorLayout, SiteLayout,
};
pub use walker::{ListingUrl, PaginationWalker};
