//! Attendance decision engine.
//!
//! Per observed face per frame: gate by the distance-like confidence score,
//! consult the session cache, and if the user has not been confirmed marked
//! this session, attempt exactly one ledger insert for today. The session
//! cache is a fast, non-authoritative filter; the ledger's uniqueness
//! constraint is the cross-session guarantee, so correctness never depends
//! on the cache being present or warm.

use std::collections::HashSet;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

use crate::types::{Observation, UserId};

/// Outcome of a single attendance insert attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// A new record was created for `(user, date)`.
    Created,
    /// A record already existed for `(user, date)`. A normal outcome,
    /// not an error.
    AlreadyMarked,
}

/// Durable attendance ledger: one record per user per day, enforced by
/// the implementation's uniqueness constraint (never silently overwritten).
pub trait Ledger {
    type Error;

    fn mark_present(
        &mut self,
        user_id: UserId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<MarkOutcome, Self::Error>;
}

/// Clock seam so tests can drive sessions across midnight.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Wall-clock time in the local timezone.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// In-memory set of users confirmed marked during the current session.
/// Never persisted; exists only to skip redundant ledger round-trips.
#[derive(Debug, Default)]
pub struct SessionCache {
    marked: HashSet<UserId>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, user_id: UserId) -> bool {
        self.marked.contains(&user_id)
    }

    pub fn add(&mut self, user_id: UserId) {
        self.marked.insert(user_id);
    }

    pub fn clear(&mut self) {
        self.marked.clear();
    }

    pub fn len(&self) -> usize {
        self.marked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marked.is_empty()
    }
}

/// State of one face after evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// No candidate, or confidence above the threshold. Nothing persisted.
    Unknown,
    /// A fresh attendance record was created; emit the one-time
    /// "attendance marked" notification for this user.
    MarkedNow(UserId),
    /// Already marked today, either per the session cache or the ledger.
    AlreadyMarked(UserId),
}

/// Confidence gating + duplicate prevention + persistence.
pub struct DecisionEngine<C = SystemClock> {
    threshold: f32,
    cache: SessionCache,
    /// Calendar day the cache entries belong to. A day rollover mid-session
    /// invalidates every session-scoped mark.
    session_date: Option<NaiveDate>,
    clock: C,
}

impl DecisionEngine<SystemClock> {
    pub fn new(threshold: f32) -> Self {
        Self::with_clock(threshold, SystemClock)
    }
}

impl<C: Clock> DecisionEngine<C> {
    pub fn with_clock(threshold: f32, clock: C) -> Self {
        Self {
            threshold,
            cache: SessionCache::new(),
            session_date: None,
            clock,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Users confirmed marked so far this session.
    pub fn marked_count(&self) -> usize {
        self.cache.len()
    }

    /// Forget all session-scoped marks, e.g. between two runs reusing
    /// one engine. The ledger remains the authoritative guard either way.
    pub fn reset_session(&mut self) {
        self.cache.clear();
        self.session_date = None;
    }

    /// Evaluate one observed face. Faces in the same frame are evaluated
    /// independently; each call issues at most one ledger insert attempt.
    ///
    /// The clock is read here, at mark-attempt time, never at frame-capture
    /// time, so a session crossing midnight marks afresh for the new day.
    pub fn evaluate<L: Ledger>(
        &mut self,
        observation: &Observation,
        ledger: &mut L,
    ) -> Result<Decision, L::Error> {
        let Some(user_id) = observation.candidate else {
            return Ok(Decision::Unknown);
        };
        // Inclusive: a score exactly at the threshold is identified.
        if observation.confidence > self.threshold {
            return Ok(Decision::Unknown);
        }

        let now = self.clock.now();
        if self.session_date != Some(now.date()) {
            self.cache.clear();
            self.session_date = Some(now.date());
        }

        if self.cache.contains(user_id) {
            return Ok(Decision::AlreadyMarked(user_id));
        }

        match ledger.mark_present(user_id, now.date(), now.time())? {
            MarkOutcome::Created => {
                self.cache.add(user_id);
                tracing::info!(user_id, date = %now.date(), time = %now.time(), "attendance marked");
                Ok(Decision::MarkedNow(user_id))
            }
            MarkOutcome::AlreadyMarked => {
                // Warm the cache: an earlier session today already marked
                // this user, so later frames skip the ledger entirely.
                self.cache.add(user_id);
                Ok(Decision::AlreadyMarked(user_id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use std::cell::Cell;
    use std::convert::Infallible;

    /// Ledger over a plain set, counting insert attempts.
    #[derive(Default)]
    struct MemoryLedger {
        rows: HashSet<(UserId, NaiveDate)>,
        calls: usize,
    }

    impl Ledger for MemoryLedger {
        type Error = Infallible;

        fn mark_present(
            &mut self,
            user_id: UserId,
            date: NaiveDate,
            _time: NaiveTime,
        ) -> Result<MarkOutcome, Infallible> {
            self.calls += 1;
            if self.rows.insert((user_id, date)) {
                Ok(MarkOutcome::Created)
            } else {
                Ok(MarkOutcome::AlreadyMarked)
            }
        }
    }

    struct ManualClock {
        now: Cell<NaiveDateTime>,
    }

    impl ManualClock {
        fn at(s: &str) -> Self {
            Self {
                now: Cell::new(s.parse().unwrap()),
            }
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> NaiveDateTime {
            self.now.get()
        }
    }

    fn seen(user: Option<UserId>, confidence: f32) -> Observation {
        Observation {
            bounding_box: BoundingBox {
                x: 0,
                y: 0,
                width: 10,
                height: 10,
            },
            candidate: user,
            confidence,
        }
    }

    #[test]
    fn test_no_candidate_is_unknown() {
        let mut engine = DecisionEngine::with_clock(70.0, ManualClock::at("2024-01-01T09:00:00"));
        let mut ledger = MemoryLedger::default();
        let decision = engine.evaluate(&seen(None, 5.0), &mut ledger).unwrap();
        assert_eq!(decision, Decision::Unknown);
        assert_eq!(ledger.calls, 0);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let mut engine = DecisionEngine::with_clock(70.0, ManualClock::at("2024-01-01T09:00:00"));
        let mut ledger = MemoryLedger::default();

        // Exactly at the threshold: identified and marked.
        let decision = engine.evaluate(&seen(Some(1), 70.0), &mut ledger).unwrap();
        assert_eq!(decision, Decision::MarkedNow(1));

        // One past the threshold: unknown, no persistence.
        let decision = engine.evaluate(&seen(Some(2), 71.0), &mut ledger).unwrap();
        assert_eq!(decision, Decision::Unknown);
        assert_eq!(ledger.calls, 1);
    }

    #[test]
    fn test_repeat_frames_mark_once() {
        let mut engine = DecisionEngine::with_clock(70.0, ManualClock::at("2024-01-01T09:00:00"));
        let mut ledger = MemoryLedger::default();

        assert_eq!(
            engine.evaluate(&seen(Some(1), 30.0), &mut ledger).unwrap(),
            Decision::MarkedNow(1)
        );
        for _ in 0..5 {
            assert_eq!(
                engine.evaluate(&seen(Some(1), 30.0), &mut ledger).unwrap(),
                Decision::AlreadyMarked(1)
            );
        }
        // One ledger round-trip total; later frames hit the session cache.
        assert_eq!(ledger.calls, 1);
        assert_eq!(engine.marked_count(), 1);
    }

    #[test]
    fn test_cache_warms_from_already_marked() {
        let clock = ManualClock::at("2024-01-01T13:00:00");
        let mut engine = DecisionEngine::with_clock(70.0, clock);
        let mut ledger = MemoryLedger::default();
        // A previous session this morning already marked user 1.
        ledger
            .rows
            .insert((1, "2024-01-01".parse::<NaiveDate>().unwrap()));
        ledger.calls = 0;

        assert_eq!(
            engine.evaluate(&seen(Some(1), 10.0), &mut ledger).unwrap(),
            Decision::AlreadyMarked(1)
        );
        assert_eq!(ledger.calls, 1);

        // Cache self-healed: no further ledger calls.
        assert_eq!(
            engine.evaluate(&seen(Some(1), 10.0), &mut ledger).unwrap(),
            Decision::AlreadyMarked(1)
        );
        assert_eq!(ledger.calls, 1);
    }

    #[test]
    fn test_midnight_crossing_marks_fresh() {
        let mut engine =
            DecisionEngine::with_clock(70.0, ManualClock::at("2024-01-01T23:59:00"));
        let mut ledger = MemoryLedger::default();

        assert_eq!(
            engine.evaluate(&seen(Some(1), 20.0), &mut ledger).unwrap(),
            Decision::MarkedNow(1)
        );

        engine
            .clock()
            .now
            .set("2024-01-02T00:01:00".parse().unwrap());

        // New calendar day: the same user gets a fresh record.
        assert_eq!(
            engine.evaluate(&seen(Some(1), 20.0), &mut ledger).unwrap(),
            Decision::MarkedNow(1)
        );
        assert_eq!(ledger.rows.len(), 2);
    }

    #[test]
    fn test_multiple_faces_independent() {
        let mut engine = DecisionEngine::with_clock(70.0, ManualClock::at("2024-01-01T09:00:00"));
        let mut ledger = MemoryLedger::default();

        // One frame with three faces: known, unknown, known.
        let frame = [seen(Some(1), 25.0), seen(None, 90.0), seen(Some(2), 40.0)];
        let decisions: Vec<_> = frame
            .iter()
            .map(|o| engine.evaluate(o, &mut ledger).unwrap())
            .collect();

        assert_eq!(
            decisions,
            vec![
                Decision::MarkedNow(1),
                Decision::Unknown,
                Decision::MarkedNow(2)
            ]
        );
        assert_eq!(engine.marked_count(), 2);
    }

    #[test]
    fn test_reset_session_clears_cache_not_ledger() {
        let mut engine = DecisionEngine::with_clock(70.0, ManualClock::at("2024-01-01T09:00:00"));
        let mut ledger = MemoryLedger::default();

        engine.evaluate(&seen(Some(1), 10.0), &mut ledger).unwrap();
        engine.reset_session();
        assert_eq!(engine.marked_count(), 0);

        // Next session consults the ledger again; the ledger still refuses
        // a duplicate for the same day.
        assert_eq!(
            engine.evaluate(&seen(Some(1), 10.0), &mut ledger).unwrap(),
            Decision::AlreadyMarked(1)
        );
        assert_eq!(ledger.rows.len(), 1);
    }
}
