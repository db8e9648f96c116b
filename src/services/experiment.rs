//! Experiment manager
//!
//! Routes each recommendation request to one registered strategy. A user is
//! drawn onto a strategy with probability `bid / sum(bids)` and stays there
//! for `stickiness_window` requests; the next request after that draws again
//! (possibly landing on the same strategy). Every call appends one impression.
//!
//! Assignment state lives in a `DashMap`, so the read-modify-write of a user's
//! remaining count happens under that user's shard lock, and calls for
//! different users do not serialise on one mutex.
use std::collections::HashSet;
use std::io::Write;

use chrono::Utc;
use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::{Mutex, RwLock};
use rand::{distributions::WeightedIndex, prelude::Distribution, rngs::StdRng};
use uuid::Uuid;

use crate::{
    models::{
        BookId, ImpressionLogEntry, OutcomeEvent, OutcomeKind, ScoredRecommendation,
        StrategyAssignment, StrategySummary, UserId,
    },
    services::strategies::{StrategyFn, StrategyOptions, StrategyRequest},
    store::ReferenceStore,
};

#[derive(Debug, thiserror::Error)]
pub enum ExperimentError {
    #[error("no strategies registered")]
    NoStrategies,

    #[error("strategy {name} has invalid bid {bid}; bids must be positive")]
    InvalidBid { name: String, bid: f64 },

    #[error("bids cannot be turned into a traffic split: {0}")]
    InvalidBids(String),

    #[error("strategy {0} is already registered")]
    DuplicateStrategy(String),

    #[error("stickiness window must be at least 1, got {0}")]
    InvalidStickinessWindow(u32),

    #[error("assigned strategy {0} is not registered")]
    UnknownStrategy(String),
}

/// A strategy with its traffic bid and default arguments
#[derive(Clone)]
pub struct RegisteredStrategy {
    pub name: String,
    pub bid: f64,
    pub function: StrategyFn,
    pub default_options: StrategyOptions,
}

impl std::fmt::Debug for RegisteredStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredStrategy")
            .field("name", &self.name)
            .field("bid", &self.bid)
            .field("default_options", &self.default_options)
            .finish_non_exhaustive()
    }
}

/// Result of one `recommend` call
#[derive(Debug, Clone)]
pub struct Recommendation {
    pub assignment: StrategyAssignment,
    pub items: Vec<ScoredRecommendation>,
}

#[derive(Debug)]
struct AssignmentSlot {
    assignment: StrategyAssignment,
    remaining: u32,
}

pub struct ExperimentManager {
    store: ReferenceStore,
    stickiness_window: u32,
    strategies: RwLock<Vec<RegisteredStrategy>>,
    assignments: DashMap<UserId, AssignmentSlot>,
    impressions: Mutex<Vec<ImpressionLogEntry>>,
    outcomes: Mutex<Vec<OutcomeEvent>>,
    rng: Mutex<StdRng>,
}

impl ExperimentManager {
    pub fn new(
        store: ReferenceStore,
        stickiness_window: u32,
        rng: StdRng,
    ) -> Result<Self, ExperimentError> {
        if stickiness_window == 0 {
            return Err(ExperimentError::InvalidStickinessWindow(stickiness_window));
        }

        Ok(Self {
            store,
            stickiness_window,
            strategies: RwLock::new(Vec::new()),
            assignments: DashMap::new(),
            impressions: Mutex::new(Vec::new()),
            outcomes: Mutex::new(Vec::new()),
            rng: Mutex::new(rng),
        })
    }

    /// Adds a strategy to the traffic split
    pub fn register(
        &self,
        name: impl Into<String>,
        bid: f64,
        function: StrategyFn,
        default_options: StrategyOptions,
    ) -> Result<(), ExperimentError> {
        let name = name.into();
        if !bid.is_finite() || bid <= 0.0 {
            return Err(ExperimentError::InvalidBid { name, bid });
        }

        let mut strategies = self.strategies.write();
        if strategies.iter().any(|s| s.name == name) {
            return Err(ExperimentError::DuplicateStrategy(name));
        }

        tracing::info!(strategy = %name, bid, "Strategy registered");
        strategies.push(RegisteredStrategy {
            name,
            bid,
            function,
            default_options,
        });
        Ok(())
    }

    /// Registered strategies as `(name, bid)`, in registration order
    pub fn strategies(&self) -> Vec<(String, f64)> {
        self.strategies
            .read()
            .iter()
            .map(|s| (s.name.clone(), s.bid))
            .collect()
    }

    pub fn stickiness_window(&self) -> u32 {
        self.stickiness_window
    }

    pub fn reference_store(&self) -> &ReferenceStore {
        &self.store
    }

    /// Recommends `k` books using the user's sticky strategy
    pub fn recommend(&self, user_id: &UserId, k: usize) -> Result<Recommendation, ExperimentError> {
        self.recommend_with(user_id, Some(k))
    }

    /// Like [`recommend`](Self::recommend), using the assigned strategy's default `k`
    pub fn recommend_default(&self, user_id: &UserId) -> Result<Recommendation, ExperimentError> {
        self.recommend_with(user_id, None)
    }

    fn recommend_with(
        &self,
        user_id: &UserId,
        k: Option<usize>,
    ) -> Result<Recommendation, ExperimentError> {
        let (assignment, strategy) = self.take_assignment(user_id)?;
        let k = k.unwrap_or(strategy.default_options.default_k);

        let data = self.store.snapshot();
        let request = StrategyRequest {
            user_id,
            data: &data,
            k,
            options: &strategy.default_options,
        };
        let items = {
            let mut rng = self.rng.lock();
            (strategy.function)(&request, &mut *rng)
        };

        let entry = ImpressionLogEntry {
            user_id: user_id.clone(),
            strategy_name: assignment.strategy_name.clone(),
            assignment_id: assignment.assignment_id,
            k,
            book_ids: items.iter().map(|r| r.book_id.clone()).collect(),
            scores: items.iter().map(|r| r.score).collect(),
            timestamp: Utc::now(),
        };
        self.impressions.lock().push(entry);

        tracing::info!(
            user_id = %user_id,
            strategy = %assignment.strategy_name,
            k,
            shown = items.len(),
            "Recommendation served"
        );

        Ok(Recommendation { assignment, items })
    }

    /// Reuses or draws the user's assignment and consumes one request from it
    fn take_assignment(
        &self,
        user_id: &UserId,
    ) -> Result<(StrategyAssignment, RegisteredStrategy), ExperimentError> {
        let strategies = self.strategies.read();
        if strategies.is_empty() {
            return Err(ExperimentError::NoStrategies);
        }

        let mut slot = match self.assignments.entry(user_id.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().remaining == 0 {
                    occupied.insert(self.draw(user_id, &strategies)?);
                }
                occupied.into_ref()
            }
            Entry::Vacant(vacant) => vacant.insert(self.draw(user_id, &strategies)?),
        };
        slot.remaining -= 1;
        let assignment = slot.assignment.clone();
        drop(slot);

        let strategy = strategies
            .iter()
            .find(|s| s.name == assignment.strategy_name)
            .cloned()
            .ok_or_else(|| ExperimentError::UnknownStrategy(assignment.strategy_name.clone()))?;

        Ok((assignment, strategy))
    }

    fn draw(
        &self,
        user_id: &UserId,
        strategies: &[RegisteredStrategy],
    ) -> Result<AssignmentSlot, ExperimentError> {
        let weights = WeightedIndex::new(strategies.iter().map(|s| s.bid))
            .map_err(|e| ExperimentError::InvalidBids(e.to_string()))?;
        let index = weights.sample(&mut *self.rng.lock());
        let strategy = &strategies[index];

        let assignment = StrategyAssignment {
            assignment_id: Uuid::new_v4(),
            user_id: user_id.clone(),
            strategy_name: strategy.name.clone(),
            assigned_at: Utc::now(),
            window: self.stickiness_window,
        };

        tracing::debug!(
            user_id = %user_id,
            strategy = %strategy.name,
            assignment_id = %assignment.assignment_id,
            "New strategy assignment"
        );

        Ok(AssignmentSlot {
            assignment,
            remaining: self.stickiness_window,
        })
    }

    /// The user's assignment if it still covers another request
    pub fn current_assignment(&self, user_id: &UserId) -> Option<StrategyAssignment> {
        self.assignments
            .get(user_id)
            .filter(|slot| slot.remaining > 0)
            .map(|slot| slot.assignment.clone())
    }

    /// Requests left on the user's current assignment
    pub fn remaining_requests(&self, user_id: &UserId) -> Option<u32> {
        self.assignments.get(user_id).map(|slot| slot.remaining)
    }

    /// Logs a borrow, attributed to the user's most recent assignment
    pub fn record_outcome(&self, user_id: &UserId, book_id: BookId) -> OutcomeEvent {
        let assignment = self
            .assignments
            .get(user_id)
            .map(|slot| slot.assignment.clone());

        let event = OutcomeEvent {
            user_id: user_id.clone(),
            book_id,
            assignment_id: assignment.as_ref().map(|a| a.assignment_id),
            strategy_name: assignment.map(|a| a.strategy_name),
            event_type: OutcomeKind::Borrow,
            timestamp: Utc::now(),
        };

        tracing::info!(
            user_id = %user_id,
            book_id = %event.book_id,
            strategy = event.strategy_name.as_deref().unwrap_or("none"),
            "Outcome recorded"
        );

        self.outcomes.lock().push(event.clone());
        event
    }

    pub fn impressions(&self) -> Vec<ImpressionLogEntry> {
        self.impressions.lock().clone()
    }

    pub fn outcomes(&self) -> Vec<OutcomeEvent> {
        self.outcomes.lock().clone()
    }

    /// Per-strategy counts over both logs, in registration order
    pub fn summary(&self) -> Vec<StrategySummary> {
        let impressions = self.impressions.lock().clone();
        let outcomes = self.outcomes.lock().clone();

        let shown: HashSet<(Uuid, &BookId)> = impressions
            .iter()
            .flat_map(|entry| entry.book_ids.iter().map(move |b| (entry.assignment_id, b)))
            .collect();

        self.strategies
            .read()
            .iter()
            .map(|strategy| {
                let mut summary = StrategySummary {
                    strategy_name: strategy.name.clone(),
                    bid: strategy.bid,
                    ..StrategySummary::default()
                };

                let mut assignment_ids = HashSet::new();
                for entry in impressions.iter().filter(|e| e.strategy_name == strategy.name) {
                    assignment_ids.insert(entry.assignment_id);
                    summary.impressions += 1;
                    summary.books_shown += entry.book_ids.len() as u64;
                }
                summary.assignments = assignment_ids.len() as u64;

                for event in outcomes
                    .iter()
                    .filter(|e| e.strategy_name.as_deref() == Some(strategy.name.as_str()))
                {
                    summary.outcomes += 1;
                    if let Some(id) = event.assignment_id {
                        if shown.contains(&(id, &event.book_id)) {
                            summary.attributed_outcomes += 1;
                        }
                    }
                }

                summary
            })
            .collect()
    }

    /// Writes the impression log as JSON lines
    pub fn write_impressions_jsonl<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for entry in self.impressions.lock().iter() {
            serde_json::to_writer(&mut writer, entry)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::strategies::{self, builtin, strategy_fn};
    use crate::store::{fixtures, ReferenceData};
    use rand::SeedableRng;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn fixed(book: &'static str) -> StrategyFn {
        strategy_fn(move |req, _| {
            (0..req.k.min(1))
                .map(|_| ScoredRecommendation::new(BookId::from(book), 1.0))
                .collect()
        })
    }

    fn manager(window: u32, seed: u64) -> ExperimentManager {
        ExperimentManager::new(
            ReferenceStore::new(fixtures::demo_reference_data()),
            window,
            StdRng::seed_from_u64(seed),
        )
        .unwrap()
    }

    #[test]
    fn test_zero_window_rejected() {
        let result = ExperimentManager::new(
            ReferenceStore::new(ReferenceData::default()),
            0,
            StdRng::seed_from_u64(0),
        );
        assert!(matches!(
            result,
            Err(ExperimentError::InvalidStickinessWindow(0))
        ));
    }

    #[test]
    fn test_recommend_without_strategies_fails() {
        let exp = manager(3, 1);
        let err = exp.recommend(&UserId::from("u1"), 3).unwrap_err();
        assert!(matches!(err, ExperimentError::NoStrategies));
        assert!(exp.impressions().is_empty());
    }

    #[test]
    fn test_register_rejects_bad_bids_and_duplicates() {
        let exp = manager(3, 1);
        for bid in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                exp.register("a", bid, fixed("a"), StrategyOptions::default()),
                Err(ExperimentError::InvalidBid { .. })
            ));
        }

        exp.register("a", 1.0, fixed("a"), StrategyOptions::default())
            .unwrap();
        assert!(matches!(
            exp.register("a", 2.0, fixed("a"), StrategyOptions::default()),
            Err(ExperimentError::DuplicateStrategy(_))
        ));
        assert_eq!(exp.strategies(), vec![("a".to_string(), 1.0)]);
    }

    #[test]
    fn test_sticky_within_window_then_redraw() {
        let exp = manager(3, 5);
        exp.register("a", 1.0, fixed("a"), StrategyOptions::default())
            .unwrap();
        exp.register("b", 1.0, fixed("b"), StrategyOptions::default())
            .unwrap();
        let user = UserId::from("u1");

        let first = exp.recommend(&user, 1).unwrap();
        assert_eq!(exp.remaining_requests(&user), Some(2));
        for _ in 0..2 {
            let next = exp.recommend(&user, 1).unwrap();
            assert_eq!(next.assignment, first.assignment);
            assert_eq!(next.items, first.items);
        }
        assert_eq!(exp.remaining_requests(&user), Some(0));
        assert!(exp.current_assignment(&user).is_none());

        let fourth = exp.recommend(&user, 1).unwrap();
        assert_ne!(fourth.assignment.assignment_id, first.assignment.assignment_id);
        assert_eq!(exp.remaining_requests(&user), Some(2));
        assert_eq!(
            exp.current_assignment(&user).map(|a| a.assignment_id),
            Some(fourth.assignment.assignment_id)
        );
    }

    #[test]
    fn test_one_impression_per_call() {
        let exp = manager(2, 9);
        exp.register("a", 1.0, fixed("a"), StrategyOptions::default())
            .unwrap();

        exp.recommend(&UserId::from("u1"), 3).unwrap();
        exp.recommend(&UserId::from("u2"), 0).unwrap();

        let log = exp.impressions();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].book_ids, vec![BookId::from("a")]);
        assert_eq!(log[0].strategy_name, "a");
        assert_eq!(log[1].k, 0);
        assert!(log[1].book_ids.is_empty());
    }

    #[test]
    fn test_weighted_draw_converges_to_bid_share() {
        let exp = manager(1, 2024);
        exp.register("heavy", 2.0, fixed("h"), StrategyOptions::default())
            .unwrap();
        exp.register("light", 1.0, fixed("l"), StrategyOptions::default())
            .unwrap();
        exp.register("other", 1.0, fixed("o"), StrategyOptions::default())
            .unwrap();

        let trials = 10_000;
        let mut counts: HashMap<String, u32> = HashMap::new();
        for i in 0..trials {
            let rec = exp.recommend(&UserId(format!("user-{}", i)), 1).unwrap();
            *counts.entry(rec.assignment.strategy_name).or_default() += 1;
        }

        for (name, expected) in [("heavy", 0.5), ("light", 0.25), ("other", 0.25)] {
            let share = f64::from(counts[name]) / f64::from(trials);
            assert!(
                (share - expected).abs() < 0.05,
                "{} share {} not near {}",
                name,
                share,
                expected
            );
        }
    }

    #[test]
    fn test_same_seed_same_assignments() {
        let names = |seed| {
            let exp = manager(1, seed);
            exp.register("a", 1.0, fixed("a"), StrategyOptions::default())
                .unwrap();
            exp.register("b", 3.0, fixed("b"), StrategyOptions::default())
                .unwrap();
            (0..50)
                .map(|i| {
                    exp.recommend(&UserId(format!("u{}", i)), 1)
                        .unwrap()
                        .assignment
                        .strategy_name
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(names(77), names(77));
    }

    #[test]
    fn test_concurrent_calls_keep_windows_intact() {
        let exp = Arc::new(manager(4, 3));
        exp.register("a", 1.0, fixed("a"), StrategyOptions::default())
            .unwrap();
        exp.register("b", 1.0, fixed("b"), StrategyOptions::default())
            .unwrap();

        std::thread::scope(|scope| {
            for _ in 0..8 {
                let exp = exp.clone();
                scope.spawn(move || {
                    for _ in 0..100 {
                        exp.recommend(&UserId::from("shared"), 1).unwrap();
                        exp.recommend(&UserId::from("solo"), 1).unwrap();
                    }
                });
            }
        });

        let log = exp.impressions();
        assert_eq!(log.len(), 1600);

        let mut per_assignment: HashMap<Uuid, u32> = HashMap::new();
        for entry in &log {
            *per_assignment.entry(entry.assignment_id).or_default() += 1;
        }
        // 800 calls per user, each assignment serves exactly 4
        assert_eq!(per_assignment.len(), 400);
        assert!(per_assignment.values().all(|&n| n == 4));
    }

    #[test]
    fn test_outcome_attribution_and_summary() {
        let exp = manager(5, 4);
        exp.register("a", 1.0, fixed("a"), StrategyOptions::default())
            .unwrap();
        let user = UserId::from("u1");

        let orphan = exp.record_outcome(&UserId::from("ghost"), BookId::from("b1"));
        assert!(orphan.assignment_id.is_none());
        assert!(orphan.strategy_name.is_none());

        let rec = exp.recommend(&user, 1).unwrap();
        exp.recommend(&user, 1).unwrap();
        let hit = exp.record_outcome(&user, BookId::from("a"));
        exp.record_outcome(&user, BookId::from("zzz"));

        assert_eq!(hit.assignment_id, Some(rec.assignment.assignment_id));
        assert_eq!(hit.strategy_name.as_deref(), Some("a"));
        assert_eq!(exp.outcomes().len(), 3);

        let summary = exp.summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].assignments, 1);
        assert_eq!(summary[0].impressions, 2);
        assert_eq!(summary[0].books_shown, 2);
        assert_eq!(summary[0].outcomes, 2);
        assert_eq!(summary[0].attributed_outcomes, 1);
    }

    #[test]
    fn test_jsonl_export() {
        let exp = manager(2, 8);
        exp.register("a", 1.0, fixed("a"), StrategyOptions::default())
            .unwrap();
        exp.recommend(&UserId::from("u1"), 1).unwrap();
        exp.recommend(&UserId::from("u2"), 1).unwrap();

        let mut buffer = Vec::new();
        exp.write_impressions_jsonl(&mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: ImpressionLogEntry = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(parsed.user_id, UserId::from("u2"));
    }

    #[test]
    fn test_builtin_strategies_through_manager() {
        let exp = manager(3, 12);
        exp.register(
            strategies::LAYERED_FALLBACK,
            1.0,
            builtin(strategies::LAYERED_FALLBACK).unwrap(),
            StrategyOptions {
                default_k: 4,
                recent_books: 1,
            },
        )
        .unwrap();

        let user = UserId::from("u3");
        let rec = exp.recommend_default(&user).unwrap();
        assert_eq!(rec.items.len(), 3); // u3 has 3 unread books left
        assert_eq!(exp.impressions()[0].k, 4);

        let data = exp.reference_store().snapshot();
        let read = data.read_set(&user);
        assert!(rec.items.iter().all(|r| !read.contains(&r.book_id)));
    }

    #[test]
    fn test_new_checkouts_visible_to_next_call() {
        let exp = manager(10, 6);
        exp.register(
            strategies::NEXT_BOOK,
            1.0,
            builtin(strategies::NEXT_BOOK).unwrap(),
            StrategyOptions::default(),
        )
        .unwrap();
        let user = UserId::from("u1");
        assert!(exp.recommend(&user, 3).unwrap().items.is_empty());

        exp.reference_store().append_checkouts(vec![
            crate::models::CheckoutEvent::new("u9", "b3", 1),
            crate::models::CheckoutEvent::new("u9", "b6", 2),
        ]);

        let items = exp.recommend(&user, 3).unwrap().items;
        assert_eq!(items, vec![ScoredRecommendation::new(BookId::from("b6"), 1.0)]);
    }
}
