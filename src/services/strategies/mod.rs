//! Recommendation strategies
//!
//! Every strategy is a pure function over `ReferenceData` returning a ranked,
//! scored list that never contains a book the user already read. They are
//! registered with the experiment manager through the uniform `StrategyFn`
//! signature; only the layered fallback consumes the random source.
use std::collections::HashMap;
use std::sync::Arc;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::{
    models::{BookId, ScoredRecommendation, UserId},
    store::ReferenceData,
};

pub mod layered_fallback;
pub mod librarian_picks;
pub mod next_book;
pub mod popularity;

pub use layered_fallback::{layered_fallback_recs, layered_fallback_tiered, FallbackTier};
pub use librarian_picks::librarian_picks_recs;
pub use next_book::next_book_recs;
pub use popularity::popularity_recs;

pub const NEXT_BOOK: &str = "next_book";
pub const POPULARITY: &str = "popularity";
pub const LIBRARIAN_PICKS: &str = "librarian_picks";
pub const LAYERED_FALLBACK: &str = "layered_fallback";

/// Default arguments a strategy is registered with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyOptions {
    /// `k` used when the caller does not pass one
    pub default_k: usize,
    /// How many of the user's latest books seed the transition lookup
    pub recent_books: usize,
}

impl Default for StrategyOptions {
    fn default() -> Self {
        Self {
            default_k: 3,
            recent_books: 1,
        }
    }
}

/// Arguments for a single strategy invocation
#[derive(Debug, Clone, Copy)]
pub struct StrategyRequest<'a> {
    pub user_id: &'a UserId,
    pub data: &'a ReferenceData,
    pub k: usize,
    pub options: &'a StrategyOptions,
}

/// Uniform callable every registered strategy is stored as
pub type StrategyFn =
    Arc<dyn Fn(&StrategyRequest<'_>, &mut dyn RngCore) -> Vec<ScoredRecommendation> + Send + Sync>;

/// Wraps a closure as a `StrategyFn`
pub fn strategy_fn<F>(function: F) -> StrategyFn
where
    F: Fn(&StrategyRequest<'_>, &mut dyn RngCore) -> Vec<ScoredRecommendation>
        + Send
        + Sync
        + 'static,
{
    Arc::new(function)
}

/// Looks up one of the built-in strategies by name
pub fn builtin(name: &str) -> Option<StrategyFn> {
    let function = match name {
        NEXT_BOOK => strategy_fn(|req, _| {
            next_book_recs(req.user_id, req.data, req.k, req.options.recent_books)
        }),
        POPULARITY => strategy_fn(|req, _| popularity_recs(req.user_id, req.data, req.k)),
        LIBRARIAN_PICKS => strategy_fn(|req, _| librarian_picks_recs(req.user_id, req.data, req.k)),
        LAYERED_FALLBACK => strategy_fn(|req, rng| {
            layered_fallback_recs(req.user_id, req.data, req.k, req.options.recent_books, rng)
        }),
        _ => return None,
    };
    Some(function)
}

/// Ranks books by count (descending, then id ascending) and keeps the top `k`
///
/// Scores are `count / max count` over the kept set, so the head always scores 1.0.
pub(crate) fn rank_by_count(counts: HashMap<&BookId, u32>, k: usize) -> Vec<ScoredRecommendation> {
    let mut ranked: Vec<(&BookId, u32)> =
        counts.into_iter().filter(|(_, count)| *count > 0).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked.truncate(k);

    let Some(&(_, max)) = ranked.first() else {
        return Vec::new();
    };

    ranked
        .into_iter()
        .map(|(book_id, count)| {
            ScoredRecommendation::new(book_id.clone(), f64::from(count) / f64::from(max))
        })
        .collect()
}
