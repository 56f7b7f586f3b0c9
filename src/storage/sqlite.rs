//! SQLite storage implementation
//!
//! This module provides the relational [`UpsertSink`] backend, used for
//! `.db` files.

use crate::item::{Detail, Item, ItemKey};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{StorageError, StorageResult, UpsertSink};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Opens or creates the database at `path`
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSink)` - Database opened and schema in place
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn load_details(conn: &Connection, product_rowid: i64) -> StorageResult<Vec<Detail>> {
        let mut stmt = conn.prepare(
            "SELECT key, value FROM product_details WHERE product_rowid = ?1 ORDER BY rowid",
        )?;

        let details = stmt
            .query_map(params![product_rowid], |row| {
                Ok(Detail::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(details)
    }

    fn insert_details(tx: &Transaction<'_>, product_rowid: i64, item: &Item) -> StorageResult<()> {
        let mut stmt = tx.prepare(
            "INSERT INTO product_details (product_rowid, key, value) VALUES (?1, ?2, ?3)",
        )?;
        for detail in &item.details {
            stmt.execute(params![product_rowid, detail.key, detail.value])?;
        }
        Ok(())
    }
}

/// Builds `a = ?1 AND b = ?2` for the key's fields
///
/// Field names are checked against the item model before they reach SQL.
fn where_clause(key: &ItemKey) -> StorageResult<(String, Vec<String>)> {
    let mut clauses = Vec::with_capacity(key.len());
    let mut values = Vec::with_capacity(key.len());

    for (index, (field, value)) in key.iter().enumerate() {
        if !Item::is_field(field) {
            return Err(StorageError::UnknownField(field.to_string()));
        }
        clauses.push(format!("{} = ?{}", field, index + 1));
        values.push(value.to_string());
    }

    if clauses.is_empty() {
        clauses.push("1 = 1".to_string());
    }

    Ok((clauses.join(" AND "), values))
}

impl UpsertSink for SqliteSink {
    fn find(&self, key: &ItemKey) -> StorageResult<Option<Item>> {
        let (clause, values) = where_clause(key)?;
        let sql = format!(
            "SELECT rowid, id, name, description, price FROM products WHERE {} ORDER BY rowid LIMIT 1",
            clause
        );

        let found = self
            .conn
            .query_row(&sql, params_from_iter(values.iter()), |row| {
                let item = Item {
                    id: row.get(1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                    price: row.get(4)?,
                    details: Vec::new(),
                };
                Ok((row.get::<_, i64>(0)?, item))
            })
            .optional()?;

        match found {
            Some((rowid, mut item)) => {
                item.details = Self::load_details(&self.conn, rowid)?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn insert(&mut self, item: Item) -> StorageResult<Item> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO products (id, name, description, price) VALUES (?1, ?2, ?3, ?4)",
            params![item.id, item.name, item.description, item.price],
        )?;
        let rowid = tx.last_insert_rowid();
        Self::insert_details(&tx, rowid, &item)?;

        tx.commit()?;
        Ok(item)
    }

    fn replace(&mut self, item: Item, key: &ItemKey) -> StorageResult<Item> {
        let (clause, values) = where_clause(key)?;
        let tx = self.conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                &format!(
                    "SELECT rowid FROM products WHERE {} ORDER BY rowid LIMIT 1",
                    clause
                ),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .optional()?;

        let Some(rowid) = existing else {
            return Err(StorageError::NotFound(key.to_string()));
        };

        tx.execute(
            "DELETE FROM product_details WHERE product_rowid = ?1",
            params![rowid],
        )?;
        tx.execute(
            "UPDATE products SET id = ?1, name = ?2, description = ?3, price = ?4 WHERE rowid = ?5",
            params![item.id, item.name, item.description, item.price, rowid],
        )?;
        Self::insert_details(&tx, rowid, &item)?;

        tx.commit()?;
        Ok(item)
    }
}
