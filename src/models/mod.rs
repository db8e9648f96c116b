use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod book;
pub mod checkout;
pub mod experiment;

pub use book::{Catalog, CatalogEntry};
pub use checkout::CheckoutEvent;
pub use experiment::{
    ImpressionLogEntry, OutcomeEvent, OutcomeKind, StrategyAssignment, StrategySummary,
};

/// Identifier for a book in the catalog (e.g., "b4")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(pub String);

/// Identifier for a library patron (e.g., "u1")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl Display for BookId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BookId {
    fn from(id: &str) -> Self {
        BookId(id.to_string())
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        UserId(id.to_string())
    }
}

/// A single ranked candidate produced by a strategy
///
/// Scores lie in `[0, 1]` and are only comparable within one ranked list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRecommendation {
    pub book_id: BookId,
    pub score: f64,
}

impl ScoredRecommendation {
    pub fn new(book_id: BookId, score: f64) -> Self {
        Self { book_id, score }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display_raw_value() {
        assert_eq!(format!("{}", BookId::from("b4")), "b4");
        assert_eq!(format!("{}", UserId::from("u1")), "u1");
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let json = serde_json::to_string(&BookId::from("b2")).unwrap();
        assert_eq!(json, r#""b2""#);

        let user: UserId = serde_json::from_str(r#""u3""#).unwrap();
        assert_eq!(user, UserId::from("u3"));
    }

    #[test]
    fn test_scored_recommendation_serde() {
        let rec = ScoredRecommendation::new(BookId::from("b4"), 1.0);
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["book_id"], "b4");
        assert_eq!(json["score"], 1.0);
    }
}
