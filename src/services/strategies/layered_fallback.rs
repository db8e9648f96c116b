use std::collections::HashSet;

use rand::{seq::SliceRandom, RngCore};
use serde::{Deserialize, Serialize};

use crate::{
    models::{BookId, ScoredRecommendation, UserId},
    store::ReferenceData,
};

use super::{librarian_picks_recs, next_book_recs, popularity_recs};

/// Tier that produced an item in a layered fallback result
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackTier {
    Transition,
    Popularity,
    Curated,
    Exploration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TieredRecommendation {
    pub tier: FallbackTier,
    pub recommendation: ScoredRecommendation,
}

/// Strategy: layered_fallback
///
/// See [`layered_fallback_tiered`]; this drops the tier labels.
pub fn layered_fallback_recs(
    user_id: &UserId,
    data: &ReferenceData,
    k: usize,
    recent_books: usize,
    rng: &mut dyn RngCore,
) -> Vec<ScoredRecommendation> {
    layered_fallback_tiered(user_id, data, k, recent_books, rng)
        .into_iter()
        .map(|item| item.recommendation)
        .collect()
}

/// Fills `k` slots from progressively less personalised tiers
///
/// Order: next_book, popularity, librarian picks, then unread catalog books
/// drawn uniformly without replacement (score 0). A tier is consulted only
/// while slots remain. Items keep the score their tier gave them and are not
/// re-sorted across tiers, so output order always follows tier order. Book
/// ids are unique across the whole list. Returns fewer than `k` only when the
/// user has read the rest of the catalog.
pub fn layered_fallback_tiered(
    user_id: &UserId,
    data: &ReferenceData,
    k: usize,
    recent_books: usize,
    rng: &mut dyn RngCore,
) -> Vec<TieredRecommendation> {
    let mut fill = Fill::new(k, data.catalog().len());
    if k == 0 {
        return fill.items;
    }

    let transitions = next_book_recs(user_id, data, k, recent_books);
    if transitions.len() >= k {
        fill.extend(FallbackTier::Transition, transitions);
        return fill.items;
    }
    fill.extend(FallbackTier::Transition, transitions);

    // Ask each later tier for enough extra items to cover duplicates.
    if !fill.is_full() {
        let wanted = k.saturating_add(fill.len());
        fill.extend(FallbackTier::Popularity, popularity_recs(user_id, data, wanted));
    }

    if !fill.is_full() {
        let wanted = k.saturating_add(fill.len());
        fill.extend(FallbackTier::Curated, librarian_picks_recs(user_id, data, wanted));
    }

    if !fill.is_full() {
        let read = data.read_set(user_id);
        let mut pool: Vec<&BookId> = data
            .catalog()
            .entries()
            .iter()
            .map(|entry| &entry.book_id)
            .filter(|book_id| !read.contains(book_id) && !fill.seen.contains(*book_id))
            .collect();

        let needed = fill.remaining();
        if pool.is_empty() {
            tracing::debug!(user_id = %user_id, "Catalog exhausted, returning partial list");
        }

        pool.shuffle(rng);
        let explored: Vec<ScoredRecommendation> = pool
            .into_iter()
            .take(needed)
            .map(|book_id| ScoredRecommendation::new(book_id.clone(), 0.0))
            .collect();
        fill.extend(FallbackTier::Exploration, explored);
    }

    tracing::debug!(
        user_id = %user_id,
        k,
        returned = fill.len(),
        "layered_fallback filled"
    );

    fill.items
}

/// Accumulator enforcing the size limit and book-id uniqueness
struct Fill {
    k: usize,
    items: Vec<TieredRecommendation>,
    seen: HashSet<BookId>,
}

impl Fill {
    /// `k` is caller supplied; buffers are sized to what the catalog can fill
    fn new(k: usize, catalog_len: usize) -> Self {
        let capacity = k.min(catalog_len);
        Self {
            k,
            items: Vec::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn remaining(&self) -> usize {
        self.k.saturating_sub(self.items.len())
    }

    fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    fn extend(&mut self, tier: FallbackTier, candidates: Vec<ScoredRecommendation>) {
        for recommendation in candidates {
            if self.is_full() {
                break;
            }
            if self.seen.insert(recommendation.book_id.clone()) {
                self.items.push(TieredRecommendation { tier, recommendation });
            }
        }
    }
}
