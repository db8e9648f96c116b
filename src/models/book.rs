use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::BookId;

/// One row of the catalog table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub book_id: BookId,
    pub title: String,
    /// Set on books a librarian curated
    pub librarian_pick: bool,
}

impl CatalogEntry {
    pub fn new(book_id: impl Into<String>, title: impl Into<String>, librarian_pick: bool) -> Self {
        Self {
            book_id: BookId(book_id.into()),
            title: title.into(),
            librarian_pick,
        }
    }
}

/// Catalog in file order, with an index for lookups by id
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
    index: HashMap<BookId, usize>,
}

impl Catalog {
    /// Builds a catalog, returning the first repeated id if any
    pub fn new(entries: Vec<CatalogEntry>) -> Result<Self, BookId> {
        let mut index = HashMap::with_capacity(entries.len());
        for (position, entry) in entries.iter().enumerate() {
            if index.insert(entry.book_id.clone(), position).is_some() {
                return Err(entry.book_id.clone());
            }
        }
        Ok(Self { entries, index })
    }

    /// Builds a catalog whose ids are `{prefix}1..={prefix}N`, one per row
    ///
    /// Rows are `(title, librarian_pick)`. Generated ids are always distinct.
    pub fn numbered(prefix: &str, rows: &[(&str, bool)]) -> Self {
        let entries: Vec<CatalogEntry> = rows
            .iter()
            .enumerate()
            .map(|(i, &(title, pick))| {
                CatalogEntry::new(format!("{}{}", prefix, i + 1), title, pick)
            })
            .collect();
        let index = entries
            .iter()
            .enumerate()
            .map(|(position, entry)| (entry.book_id.clone(), position))
            .collect();
        Self { entries, index }
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, book_id: &BookId) -> Option<&CatalogEntry> {
        self.index.get(book_id).map(|&position| &self.entries[position])
    }

    pub fn contains(&self, book_id: &BookId) -> bool {
        self.index.contains_key(book_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Librarian picks in catalog order
    pub fn picks(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(|entry| entry.librarian_pick)
    }
}
