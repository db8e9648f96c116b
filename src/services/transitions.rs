use std::collections::HashMap;

use crate::models::{BookId, CheckoutEvent, UserId};

/// Empirical first-order Markov table: book -> counts of books read right after it
///
/// A missing key means no data for that book, not an empty recommendation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransitionTable {
    next: HashMap<BookId, HashMap<BookId, u32>>,
}

impl TransitionTable {
    /// Builds the table from raw checkouts
    ///
    /// Events are grouped per user and ordered by `sequence_index`; every
    /// consecutive pair contributes one transition. Input order breaks ties
    /// between equal indices.
    pub fn build(checkouts: &[CheckoutEvent]) -> Self {
        let histories = histories_by_user(checkouts);
        Self::from_histories(histories.values().map(Vec::as_slice))
    }

    /// Builds the table from already ordered per-user reading lists
    pub fn from_histories<'a>(histories: impl IntoIterator<Item = &'a [BookId]>) -> Self {
        let mut next: HashMap<BookId, HashMap<BookId, u32>> = HashMap::new();

        for history in histories {
            for pair in history.windows(2) {
                *next
                    .entry(pair[0].clone())
                    .or_default()
                    .entry(pair[1].clone())
                    .or_insert(0) += 1;
            }
        }

        Self { next }
    }

    /// Next-book occurrence counts for `from`, if any were observed
    pub fn successors(&self, from: &BookId) -> Option<&HashMap<BookId, u32>> {
        self.next.get(from)
    }

    pub fn count(&self, from: &BookId, to: &BookId) -> u32 {
        self.next
            .get(from)
            .and_then(|targets| targets.get(to))
            .copied()
            .unwrap_or(0)
    }

    /// Share of `from`'s outgoing transitions that went to `to`
    pub fn probability(&self, from: &BookId, to: &BookId) -> f64 {
        let Some(targets) = self.next.get(from) else {
            return 0.0;
        };
        let total: u32 = targets.values().sum();
        if total == 0 {
            return 0.0;
        }
        f64::from(self.count(from, to)) / f64::from(total)
    }

    /// Number of distinct source books
    pub fn len(&self) -> usize {
        self.next.len()
    }

    pub fn is_empty(&self) -> bool {
        self.next.is_empty()
    }

    /// Total number of observed transitions
    pub fn total_transitions(&self) -> u64 {
        self.next
            .values()
            .flat_map(HashMap::values)
            .map(|&count| u64::from(count))
            .sum()
    }
}

/// Groups checkouts per user in reading order
pub fn histories_by_user(checkouts: &[CheckoutEvent]) -> HashMap<UserId, Vec<BookId>> {
    let mut grouped: HashMap<UserId, Vec<&CheckoutEvent>> = HashMap::new();
    for event in checkouts {
        grouped.entry(event.user_id.clone()).or_default().push(event);
    }

    grouped
        .into_iter()
        .map(|(user_id, mut events)| {
            // stable: equal indices keep input order
            events.sort_by_key(|event| event.sequence_index);
            let books = events.into_iter().map(|event| event.book_id.clone()).collect();
            (user_id, books)
        })
        .collect()
}
