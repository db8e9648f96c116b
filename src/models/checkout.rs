use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BookId, UserId};

/// Historical checkout; `sequence_index` orders one user's reading
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutEvent {
    pub user_id: UserId,
    pub book_id: BookId,
    pub sequence_index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_out_at: Option<DateTime<Utc>>,
}

impl CheckoutEvent {
    pub fn new(user_id: &str, book_id: &str, sequence_index: u64) -> Self {
        Self {
            user_id: UserId::from(user_id),
            book_id: BookId::from(book_id),
            sequence_index,
            checked_out_at: None,
        }
    }
}
