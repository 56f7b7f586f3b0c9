//! HTML parser for listing and detail pages
//!
//! This module turns fetched catalog pages into plain data:
//! - Listing pages become an ordered list of [`ItemSummary`] plus the raw
//!   pagination counter text
//! - Detail pages become a [`DetailRecord`] (product code and size table)
//!
//! Parsing never fails: missing elements produce empty fields, and the
//! walker decides how to treat them.

use crate::config::SelectorConfig;
use crate::item::Detail;
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

/// Errors raised while turning page content into crawl targets
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid listing url '{url}': {source}")]
    ListingUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("Cannot resolve detail link '{href}' against {base}: {source}")]
    DetailLink {
        base: String,
        href: String,
        source: url::ParseError,
    },
}

/// One product card from a listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSummary {
    pub name: String,
    pub description: String,
    pub price: String,

    /// Link to the product's detail page, as written in the page
    pub detail_link: Option<String>,
}

/// Everything the walker needs from one listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Product cards in page order
    pub items: Vec<ItemSummary>,

    /// Text of the "current of max" counter, if the page has one
    pub counter: Option<String>,
}

/// Fields extracted from a product detail page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailRecord {
    pub id: Option<String>,
    pub details: Vec<Detail>,
}

/// Converts catalog HTML into listing and detail records
pub trait SiteLayout: Send + Sync {
    fn parse_listing(&self, html: &str) -> ListingPage;

    fn parse_detail(&self, html: &str) -> DetailRecord;
}

/// [`SiteLayout`] driven by configurable CSS selectors
#[derive(Debug)]
pub struct SelectorLayout {
    item: Selector,
    link: Selector,
    description: Selector,
    price: Selector,
    price_attribute: String,
    counter: Selector,
    detail_table: Selector,
    item_code: Selector,
    tbody: Selector,
    row: Selector,
    cell: Selector,
}

impl SelectorLayout {
    /// Compiles the configured selectors
    ///
    /// # Returns
    ///
    /// * `Ok(SelectorLayout)` - All selectors compiled
    /// * `Err(ConfigError::InvalidSelector)` - A selector is not valid CSS
    pub fn from_config(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            item: compile(&config.item)?,
            link: compile(&config.link)?,
            description: compile(&config.description)?,
            price: compile(&config.price)?,
            price_attribute: config.price_attribute.clone(),
            counter: compile(&config.counter)?,
            detail_table: compile(&config.detail_table)?,
            item_code: compile(&config.item_code)?,
            tbody: compile("tbody")?,
            row: compile("tr")?,
            cell: compile("td")?,
        })
    }

    fn summarize(&self, card: ElementRef<'_>) -> ItemSummary {
        let link = card.select(&self.link).next();

        let detail_link = link
            .and_then(|a| a.value().attr("href"))
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(String::from);

        let price = card
            .select(&self.price)
            .next()
            .and_then(|p| p.value().attr(&self.price_attribute))
            .map(|p| p.trim().to_string())
            .unwrap_or_default();

        ItemSummary {
            name: link.map(element_text).unwrap_or_default(),
            description: card
                .select(&self.description)
                .next()
                .map(element_text)
                .unwrap_or_default(),
            price,
            detail_link,
        }
    }
}

impl SiteLayout for SelectorLayout {
    fn parse_listing(&self, html: &str) -> ListingPage {
        let document = Html::parse_document(html);

        let items = document
            .select(&self.item)
            .map(|card| self.summarize(card))
            .collect();

        let counter = document.select(&self.counter).next().map(element_text);

        ListingPage { items, counter }
    }

    fn parse_detail(&self, html: &str) -> DetailRecord {
        let document = Html::parse_document(html);

        let Some(container) = document.select(&self.detail_table).next() else {
            return DetailRecord::default();
        };

        let id = container
            .select(&self.item_code)
            .next()
            .map(element_text)
            .filter(|code| !code.is_empty());

        // Only the first table holds dimensions; later ones are packaging
        let details = match container.select(&self.tbody).next() {
            Some(table) => table
                .select(&self.row)
                .filter_map(|row| {
                    let cells: Vec<ElementRef<'_>> = row.select(&self.cell).collect();
                    if cells.len() != 2 {
                        return None;
                    }
                    let key = element_text(cells[0]);
                    let key = key.trim_end_matches(':');
                    Some(Detail::new(key, element_text(cells[1])))
                })
                .collect(),
            None => Vec::new(),
        };

        DetailRecord { id, details }
    }
}

/// Returns true if a pagination counter announces a further page
///
/// The last whitespace-separated token must be a number that does not
/// already appear earlier in the text: `"24 of 96"` has more pages,
/// `"96 of 96"` does not.
///
/// # Example
///
/// ```
/// use shelf_harvest::crawler::has_more_pages;
///
/// assert!(has_more_pages("1 of 3"));
/// assert!(!has_more_pages("3 of 3"));
/// ```
pub fn has_more_pages(counter: &str) -> bool {
    let tokens: Vec<&str> = counter.split_whitespace().collect();
    match tokens.split_last() {
        Some((last, preceding)) => is_number(last) && !preceding.contains(last),
        None => false,
    }
}

fn is_number(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

fn compile(css: &str) -> Result<Selector, ConfigError> {
    Selector::parse(css)
        .map_err(|e| ConfigError::InvalidSelector(format!("'{}': {:?}", css, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> SelectorLayout {
        SelectorLayout::from_config(&SelectorConfig::default()).unwrap()
    }

    fn card(href: Option<&str>, name: &str, description: &str, price: &str) -> String {
        let link = match href {
            Some(href) => format!(r#"<a href="{}">{}</a>"#, href, name),
            None => format!("<span>{}</span>", name),
        };
        format!(
            r#"<div><div class="card-body">
                <div class="itemInfo v2-b">{}<h4>{}</h4></div>
                <div class="itemPrice-wrapper"><p class="itemNormalPrice">
                    <span data-price="{}">{} €</span></p></div>
            </div></div>"#,
            link, description, price, price
        )
    }

    fn listing(cards: &[String], counter: &str) -> String {
        format!(
            r#"<html><body>
            <div id="productFilterList"><div><div class="container p-0"><div><div>
            {}
            </div></div></div></div></div>
            <span class="showing_current_max">{}</span>
            </body></html>"#,
            cards.join("\n"),
            counter
        )
    }

    #[test]
    fn test_parse_listing_cards() {
        let html = listing(
            &[
                card(Some("/lt/products/malm-20455612"), "MALM", "Komoda", "99.99"),
                card(Some("/lt/products/hemnes-10318554"), "HEMNES", "Spinta", "249"),
            ],
            "24 iš 96",
        );
        let page = layout().parse_listing(&html);

        assert_eq!(page.items.len(), 2);
        assert_eq!(
            page.items[0],
            ItemSummary {
                name: "MALM".to_string(),
                description: "Komoda".to_string(),
                price: "99.99".to_string(),
                detail_link: Some("/lt/products/malm-20455612".to_string()),
            }
        );
        assert_eq!(page.items[1].name, "HEMNES");
        assert_eq!(page.counter.as_deref(), Some("24 iš 96"));
    }

    #[test]
    fn test_card_without_link() {
        let html = listing(&[card(None, "Mystery", "No link", "5")], "1 of 1");
        let page = layout().parse_listing(&html);

        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].detail_link, None);
        assert_eq!(page.items[0].name, "");
        assert_eq!(page.items[0].description, "No link");
    }

    #[test]
    fn test_listing_without_counter() {
        let page = layout().parse_listing("<html><body></body></html>");
        assert!(page.items.is_empty());
        assert_eq!(page.counter, None);
    }

    #[test]
    fn test_parse_detail() {
        let html = r#"<html><body>
            <div id="modal-product-size">
                <span class="item-code"> 204.556.12 </span>
                <table><tbody>
                    <tr><td>Width:</td><td>56,4 cm</td></tr>
                    <tr><td>Depth:</td><td> 54,2 cm </td></tr>
                    <tr><td colspan="2">Note row</td></tr>
                </tbody></table>
                <table><tbody>
                    <tr><td>Package:</td><td>1</td></tr>
                </tbody></table>
            </div></body></html>"#;

        let record = layout().parse_detail(html);
        assert_eq!(record.id.as_deref(), Some("204.556.12"));
        assert_eq!(
            record.details,
            vec![
                Detail::new("Width", "56,4 cm"),
                Detail::new("Depth", "54,2 cm"),
            ]
        );
    }

    #[test]
    fn test_detail_without_modal() {
        let record = layout().parse_detail("<html><body><p>gone</p></body></html>");
        assert_eq!(record, DetailRecord::default());
    }

    #[test]
    fn test_detail_without_table() {
        let html = r#"<div id="modal-product-size"><span class="item-code">1</span></div>"#;
        let record = layout().parse_detail(html);
        assert_eq!(record.id.as_deref(), Some("1"));
        assert!(record.details.is_empty());
    }

    #[test]
    fn test_has_more_pages() {
        assert!(has_more_pages("1 of 3"));
        assert!(has_more_pages("24 iš 96"));
        assert!(!has_more_pages("3 of 3"));
        assert!(!has_more_pages("96 iš 96"));
        assert!(!has_more_pages("1 of many"));
        assert!(!has_more_pages(""));
        assert!(!has_more_pages("   "));
    }

    #[test]
    fn test_has_more_pages_single_token() {
        assert!(has_more_pages("12"));
        assert!(!has_more_pages("-12"));
    }

    #[test]
    fn test_invalid_selector() {
        let config = SelectorConfig {
            item: "div[[".to_string(),
            ..SelectorConfig::default()
        };
        assert!(SelectorLayout::from_config(&config).is_err());
    }
}
