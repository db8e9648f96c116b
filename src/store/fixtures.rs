//! Built-in demo tables used when no data files are configured.

use crate::models::{Catalog, CheckoutEvent};

use super::ReferenceData;

pub fn demo_catalog() -> Catalog {
    Catalog::numbered(
        "b",
        &[
            ("The Curious Robot", true),
            ("Mystery at Maple Street", true),
            ("Adventures in Space", false),
            ("The Hidden Garden", true),
            ("Journey to the Sea", false),
            ("Pirates of the Bay", true),
        ],
    )
}

pub fn demo_checkouts() -> Vec<CheckoutEvent> {
    vec![
        CheckoutEvent::new("u1", "b1", 1),
        CheckoutEvent::new("u1", "b2", 5),
        CheckoutEvent::new("u1", "b3", 10),
        CheckoutEvent::new("u2", "b2", 2),
        CheckoutEvent::new("u2", "b4", 6),
        CheckoutEvent::new("u2", "b5", 11),
        CheckoutEvent::new("u3", "b1", 3),
        CheckoutEvent::new("u3", "b4", 7),
        CheckoutEvent::new("u3", "b2", 12),
        CheckoutEvent::new("u4", "b6", 4),
        CheckoutEvent::new("u4", "b2", 8),
    ]
}

pub fn demo_reference_data() -> ReferenceData {
    ReferenceData::build(demo_catalog(), demo_checkouts())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BookId;

    #[test]
    fn test_demo_catalog_has_six_books() {
        let catalog = demo_catalog();
        assert_eq!(catalog.len(), 6);
        let picks: Vec<_> = catalog.picks().map(|e| e.book_id.0.as_str()).collect();
        assert_eq!(picks, vec!["b1", "b2", "b4", "b6"]);
        assert!(demo_checkouts().iter().all(|c| catalog.contains(&c.book_id)));
        assert_eq!(
            catalog.get(&BookId::from("b3")).map(|e| e.title.as_str()),
            Some("Adventures in Space")
        );
    }
}
