use std::collections::HashMap;

use crate::{
    models::{BookId, ScoredRecommendation, UserId},
    store::ReferenceData,
};

use super::rank_by_count;

/// Strategy: popularity
///
/// Global most-checked-out books the user has not read yet.
pub fn popularity_recs(user_id: &UserId, data: &ReferenceData, k: usize) -> Vec<ScoredRecommendation> {
    let read = data.read_set(user_id);

    let counts: HashMap<&BookId, u32> = data
        .popularity()
        .iter()
        .filter(|(book_id, _)| !read.contains(book_id))
        .map(|(book_id, count)| (book_id, *count))
        .collect();

    rank_by_count(counts, k)
}
