//! Spreadsheet storage
//!
//! Items live in two sheets: `products` (`id`, `name`, `description`,
//! `price`) and `product_details` (`product_row`, `key`, `value`). A detail
//! row points at its product by the product's 1-based position in the
//! `products` sheet. Every mutation rewrites the whole workbook to a
//! temporary file and renames it over the original.

use crate::item::{Detail, Item, ItemKey};
use crate::storage::traits::{StorageError, StorageResult, UpsertSink};
use crate::storage::{ensure_parent_dir, temp_path};
use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::{Workbook, XlsxError};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const PRODUCTS_SHEET: &str = "products";
const DETAILS_SHEET: &str = "product_details";
const PRODUCT_HEADERS: [&str; 4] = ["id", "name", "description", "price"];
const DETAIL_HEADERS: [&str; 3] = ["product_row", "key", "value"];

/// XLSX storage backend
#[derive(Debug)]
pub struct XlsxSink {
    path: PathBuf,
}

impl XlsxSink {
    /// Opens the workbook at `path`, creating it with header rows when absent
    pub fn new(path: &Path) -> StorageResult<Self> {
        ensure_parent_dir(path)?;
        let sink = Self {
            path: path.to_path_buf(),
        };
        if !sink.path.exists() {
            sink.save(&[])?;
        }
        Ok(sink)
    }

    fn load(&self) -> StorageResult<Vec<Item>> {
        let read_error = |e: calamine::XlsxError| StorageError::WorkbookRead {
            path: self.path.clone(),
            message: e.to_string(),
        };

        let mut workbook: Xlsx<_> = open_workbook(&self.path).map_err(read_error)?;
        let products = workbook.worksheet_range(PRODUCTS_SHEET).map_err(read_error)?;
        let detail_rows = workbook.worksheet_range(DETAILS_SHEET).map_err(read_error)?;

        let mut details: HashMap<usize, Vec<Detail>> = HashMap::new();
        for row in detail_rows.rows().skip(1) {
            let Some(product_row) = row_index(row.first()) else {
                tracing::warn!(
                    "Skipping detail row without product link in {}",
                    self.path.display()
                );
                continue;
            };
            details
                .entry(product_row)
                .or_default()
                .push(Detail::new(cell(row.get(1)), cell(row.get(2))));
        }

        Ok(products
            .rows()
            .skip(1)
            .enumerate()
            .map(|(index, row)| Item {
                details: details.remove(&(index + 1)).unwrap_or_default(),
                id: optional_cell(row.first()),
                name: cell(row.get(1)),
                description: cell(row.get(2)),
                price: cell(row.get(3)),
            })
            .collect())
    }

    fn save(&self, items: &[Item]) -> StorageResult<()> {
        let temp = temp_path(&self.path);
        let write_error = |source: XlsxError| StorageError::WorkbookWrite {
            path: self.path.clone(),
            source,
        };

        build_workbook(items)
            .and_then(|mut workbook| workbook.save(&temp))
            .map_err(write_error)?;
        fs::rename(&temp, &self.path).map_err(|e| StorageError::io(&self.path, e))
    }
}

fn build_workbook(items: &[Item]) -> Result<Workbook, XlsxError> {
    let mut workbook = Workbook::new();

    let products = workbook.add_worksheet().set_name(PRODUCTS_SHEET)?;
    for (col, header) in PRODUCT_HEADERS.iter().enumerate() {
        products.write_string(0, col as u16, *header)?;
    }
    for (index, item) in items.iter().enumerate() {
        let row = index as u32 + 1;
        if let Some(id) = &item.id {
            products.write_string(row, 0, id)?;
        }
        products.write_string(row, 1, &item.name)?;
        products.write_string(row, 2, &item.description)?;
        products.write_string(row, 3, &item.price)?;
    }

    let details = workbook.add_worksheet().set_name(DETAILS_SHEET)?;
    for (col, header) in DETAIL_HEADERS.iter().enumerate() {
        details.write_string(0, col as u16, *header)?;
    }
    let mut row = 1u32;
    for (index, item) in items.iter().enumerate() {
        for detail in &item.details {
            details.write_number(row, 0, (index + 1) as f64)?;
            details.write_string(row, 1, &detail.key)?;
            details.write_string(row, 2, &detail.value)?;
            row += 1;
        }
    }

    Ok(workbook)
}

fn cell(value: Option<&Data>) -> String {
    match value {
        None | Some(Data::Empty) => String::new(),
        Some(Data::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn optional_cell(value: Option<&Data>) -> Option<String> {
    Some(cell(value)).filter(|s| !s.is_empty())
}

fn row_index(value: Option<&Data>) -> Option<usize> {
    match value? {
        Data::Int(n) if *n > 0 => Some(*n as usize),
        Data::Float(f) if *f >= 1.0 && f.fract() == 0.0 => Some(*f as usize),
        Data::String(s) => s.trim().parse().ok().filter(|n| *n > 0),
        _ => None,
    }
}

impl UpsertSink for XlsxSink {
    fn find(&self, key: &ItemKey) -> StorageResult<Option<Item>> {
        Ok(self.load()?.into_iter().find(|item| item.matches(key)))
    }

    fn insert(&mut self, item: Item) -> StorageResult<Item> {
        let mut items = self.load()?;
        items.push(item.clone());
        self.save(&items)?;
        Ok(item)
    }

    fn replace(&mut self, item: Item, key: &ItemKey) -> StorageResult<Item> {
        let mut items = self.load()?;
        let Some(slot) = items.iter_mut().find(|stored| stored.matches(key)) else {
            return Err(StorageError::NotFound(key.to_string()));
        };
        *slot = item.clone();
        self.save(&items)?;
        Ok(item)
    }
}
