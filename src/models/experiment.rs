use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{BookId, UserId};

/// Binding of a user to one strategy for a window of requests
///
/// Never mutated once created; a new assignment supersedes it when the
/// window runs out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyAssignment {
    pub assignment_id: Uuid,
    pub user_id: UserId,
    pub strategy_name: String,
    pub assigned_at: DateTime<Utc>,
    /// Number of requests this assignment covers
    pub window: u32,
}

/// One recommendation call, as shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpressionLogEntry {
    pub user_id: UserId,
    pub strategy_name: String,
    pub assignment_id: Uuid,
    pub k: usize,
    /// Books in the order they were shown
    pub book_ids: Vec<BookId>,
    pub scores: Vec<f64>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeKind {
    Borrow,
}

/// Something a user did after being shown recommendations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeEvent {
    pub user_id: UserId,
    pub book_id: BookId,
    /// `None` when the user never received an assignment
    pub assignment_id: Option<Uuid>,
    pub strategy_name: Option<String>,
    pub event_type: OutcomeKind,
    pub timestamp: DateTime<Utc>,
}

/// Per-strategy tallies over the impression and outcome logs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategySummary {
    pub strategy_name: String,
    pub bid: f64,
    pub assignments: u64,
    pub impressions: u64,
    pub books_shown: u64,
    pub outcomes: u64,
    /// Outcomes whose book had been shown under the same assignment
    pub attributed_outcomes: u64,
}
