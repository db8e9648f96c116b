use crate::{
    models::{ScoredRecommendation, UserId},
    store::ReferenceData,
};

/// Strategy: librarian_picks
///
/// Unread curated books in catalog order. Picks are not ranked against each
/// other, so every one scores 1.0.
pub fn librarian_picks_recs(
    user_id: &UserId,
    data: &ReferenceData,
    k: usize,
) -> Vec<ScoredRecommendation> {
    let read = data.read_set(user_id);

    data.catalog()
        .picks()
        .filter(|entry| !read.contains(&entry.book_id))
        .take(k)
        .map(|entry| ScoredRecommendation::new(entry.book_id.clone(), 1.0))
        .collect()
}
