use std::collections::HashMap;

use crate::{
    models::{BookId, ScoredRecommendation, UserId},
    store::ReferenceData,
};

use super::rank_by_count;

/// Strategy: next_book
///
/// Looks up what other readers picked up right after the user's most recent
/// book(s) and ranks those candidates by how often that happened. With
/// `recent_books == 1` only the last book is consulted; larger values sum the
/// successor counts of the last `recent_books` books.
///
/// Empty when the user has no history, the books have no recorded
/// successors, or every successor was already read.
pub fn next_book_recs(
    user_id: &UserId,
    data: &ReferenceData,
    k: usize,
    recent_books: usize,
) -> Vec<ScoredRecommendation> {
    let history = data.history(user_id);
    if history.is_empty() || k == 0 {
        return Vec::new();
    }

    let read = data.read_set(user_id);
    let recent = &history[history.len().saturating_sub(recent_books.max(1))..];

    let mut counts: HashMap<&BookId, u32> = HashMap::new();
    for book in recent {
        let Some(successors) = data.transitions().successors(book) else {
            continue;
        };
        for (next, count) in successors {
            if !read.contains(next) {
                *counts.entry(next).or_insert(0) += count;
            }
        }
    }

    let recs = rank_by_count(counts, k);
    tracing::debug!(user_id = %user_id, returned = recs.len(), "next_book ranked");
    recs
}
