use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::{
    models::{BookId, Catalog, CheckoutEvent, UserId},
    services::transitions::{histories_by_user, TransitionTable},
};

/// Read-only tables shared by every strategy
///
/// Built once per batch; derived views (histories, popularity, transitions)
/// are computed up front so strategies stay pure lookups.
#[derive(Debug, Clone, Default)]
pub struct ReferenceData {
    catalog: Catalog,
    checkouts: Vec<CheckoutEvent>,
    transitions: TransitionTable,
    histories: HashMap<UserId, Vec<BookId>>,
    popularity: HashMap<BookId, u32>,
}

impl ReferenceData {
    pub fn build(catalog: Catalog, checkouts: Vec<CheckoutEvent>) -> Self {
        let histories = histories_by_user(&checkouts);
        let transitions = TransitionTable::from_histories(histories.values().map(Vec::as_slice));

        let mut popularity: HashMap<BookId, u32> = HashMap::new();
        for event in &checkouts {
            *popularity.entry(event.book_id.clone()).or_insert(0) += 1;
        }

        tracing::debug!(
            catalog = catalog.len(),
            checkouts = checkouts.len(),
            users = histories.len(),
            transition_sources = transitions.len(),
            "Reference data built"
        );

        Self {
            catalog,
            checkouts,
            transitions,
            histories,
            popularity,
        }
    }

    /// New data set with `events` appended to this one's checkouts
    pub fn with_checkouts(&self, events: Vec<CheckoutEvent>) -> Self {
        let mut checkouts = self.checkouts.clone();
        checkouts.extend(events);
        Self::build(self.catalog.clone(), checkouts)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn checkouts(&self) -> &[CheckoutEvent] {
        &self.checkouts
    }

    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    /// Books the user read, oldest first. Unknown users have an empty history.
    pub fn history(&self, user_id: &UserId) -> &[BookId] {
        self.histories
            .get(user_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn last_book(&self, user_id: &UserId) -> Option<&BookId> {
        self.history(user_id).last()
    }

    pub fn read_set(&self, user_id: &UserId) -> HashSet<&BookId> {
        self.history(user_id).iter().collect()
    }

    /// Global checkout counts per book
    pub fn popularity(&self) -> &HashMap<BookId, u32> {
        &self.popularity
    }
}

/// Holder that swaps whole `ReferenceData` values
///
/// Readers take an `Arc` snapshot and never see a partially rebuilt table.
#[derive(Debug, Clone, Default)]
pub struct ReferenceStore {
    current: Arc<RwLock<Arc<ReferenceData>>>,
}

impl ReferenceStore {
    pub fn new(data: ReferenceData) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(data))),
        }
    }

    pub fn snapshot(&self) -> Arc<ReferenceData> {
        self.current.read().clone()
    }

    pub fn replace(&self, data: ReferenceData) {
        *self.current.write() = Arc::new(data);
    }

    /// Appends checkouts, rebuilds every derived table and swaps the result in
    pub fn append_checkouts(&self, events: Vec<CheckoutEvent>) -> Arc<ReferenceData> {
        let mut guard = self.current.write();
        let rebuilt = Arc::new(guard.with_checkouts(events));
        *guard = rebuilt.clone();
        rebuilt
    }
}
