//! Product item model
//!
//! An [`Item`] is what the crawler produces for every product card on a
//! listing page and what every storage backend persists. Items are matched
//! in storage through an [`ItemKey`] built from the configured identity
//! fields.

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A harvested product record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Product code from the detail page, absent for degraded items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub price: String,

    /// Detail pairs in the order they appeared on the detail page
    #[serde(default)]
    pub details: Vec<Detail>,
}

impl Item {
    /// Field names that can take part in an identity key
    pub const FIELDS: [&'static str; 4] = ["id", "name", "description", "price"];

    /// Returns the value of a named field, or `None` when the field is
    /// unknown or (for `id`) absent
    pub fn field(&self, name: &str) -> Option<&str> {
        match name {
            "id" => self.id.as_deref(),
            "name" => Some(&self.name),
            "description" => Some(&self.description),
            "price" => Some(&self.price),
            _ => None,
        }
    }

    /// Returns true if `name` is a field this model knows about
    pub fn is_field(name: &str) -> bool {
        Self::FIELDS.contains(&name)
    }

    /// Builds the identity key of this item from the given field names
    ///
    /// Returns `None` if any of the fields has no value, which is the case
    /// for degraded items that never had a detail page.
    pub fn key(&self, fields: &[String]) -> Option<ItemKey> {
        let mut pairs = Vec::with_capacity(fields.len());
        for field in fields {
            let value = self.field(field)?;
            pairs.push((field.clone(), value.to_string()));
        }
        Some(ItemKey(pairs))
    }

    /// Returns true if every pair of `key` matches this item
    pub fn matches(&self, key: &ItemKey) -> bool {
        key.iter()
            .all(|(field, value)| self.field(field) == Some(value))
    }
}

/// A single `key: value` row from a product's detail table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Detail {
    pub key: String,
    pub value: String,
}

impl Detail {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

// Stored as a single-entry object (`{"Width": "56,4 cm"}`) so JSONL files
// stay readable and compatible with earlier exports.
impl Serialize for Detail {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.key, &self.value)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for Detail {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DetailVisitor;

        impl<'de> Visitor<'de> for DetailVisitor {
            type Value = Detail;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object with exactly one key")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Detail, A::Error> {
                let (key, value): (String, String) = map
                    .next_entry()?
                    .ok_or_else(|| de::Error::invalid_length(0, &self))?;
                if map.next_key::<String>()?.is_some() {
                    return Err(de::Error::invalid_length(2, &self));
                }
                Ok(Detail { key, value })
            }
        }

        deserializer.deserialize_map(DetailVisitor)
    }
}

/// Identity key of an item: ordered `field = value` pairs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemKey(Vec<(String, String)>);

impl ItemKey {
    /// Creates a key with a single field
    pub fn single(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self(vec![(field.into(), value.into())])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(f, v)| (f.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ItemKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}
