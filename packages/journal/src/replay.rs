//! # Replay
//!
//! Folding an event log into state, for "now" or for any earlier point.
//!
//! ```text
//! initial ─e0─▶ s1 ─e1─▶ s2 ─ ... ─eN-1─▶ current
//!                  ▲                 ▲
//!             checkpoint        checkpoint        (every N events)
//! ```
//!
//! [`materialize`] is the reference fold: a pure function of the events
//! and the index. [`Journal`] keeps a [`MaterializedCache`] next to its log
//! so that reading the current state is free and historical reads resume
//! from the nearest checkpoint. The cache only ever holds values the cold
//! fold would produce; [`Journal::verify_cache`] checks exactly that.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::action::Action;
use crate::apply::apply_action;
use crate::error::JournalError;
use crate::log::EventLog;
use serde_json::Value;

/// Default distance between replay checkpoints
pub const DEFAULT_SNAPSHOT_INTERVAL: usize = 1000;

/// Pure state transition for one event
pub trait Reducer {
    type Event;
    type State: Clone + PartialEq;
    type Error;

    /// State before any event
    fn initial(&self) -> Self::State;

    fn reduce(&self, state: &Self::State, event: &Self::Event) -> Result<Self::State, Self::Error>;
}

/// History index a replay stops at.
///
/// Indices clamp into `[0, len]`. Fractional indices round down; NaN and
/// infinities mean the current state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ReplayIndex {
    #[default]
    Current,
    At(usize),
    Raw(f64),
}

impl ReplayIndex {
    pub fn resolve(self, len: usize) -> usize {
        match self {
            ReplayIndex::Current => len,
            ReplayIndex::At(index) => index.min(len),
            ReplayIndex::Raw(raw) if raw.is_finite() => {
                if raw <= 0.0 {
                    0
                } else {
                    (raw.floor() as usize).min(len)
                }
            }
            ReplayIndex::Raw(_) => len,
        }
    }
}

impl From<usize> for ReplayIndex {
    fn from(index: usize) -> Self {
        ReplayIndex::At(index)
    }
}

impl From<i64> for ReplayIndex {
    fn from(index: i64) -> Self {
        ReplayIndex::At(usize::try_from(index).unwrap_or(0))
    }
}

impl From<f64> for ReplayIndex {
    fn from(index: f64) -> Self {
        ReplayIndex::Raw(index)
    }
}

impl<T: Into<ReplayIndex>> From<Option<T>> for ReplayIndex {
    fn from(index: Option<T>) -> Self {
        index.map(Into::into).unwrap_or(ReplayIndex::Current)
    }
}

/// Cold replay of `events` up to `until`
pub fn materialize<R: Reducer>(
    reducer: &R,
    events: &[R::Event],
    until: impl Into<ReplayIndex>,
) -> Result<R::State, R::Error> {
    let until = until.into().resolve(events.len());
    fold_from(reducer, reducer.initial(), &events[..until])
}

fn fold_from<R: Reducer>(
    reducer: &R,
    start: R::State,
    events: &[R::Event],
) -> Result<R::State, R::Error> {
    events
        .iter()
        .try_fold(start, |state, event| reducer.reduce(&state, event))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalConfig {
    /// Store a checkpoint every this many events (0 disables)
    pub snapshot_interval: usize,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
        }
    }
}

/// Materialized states owned by a journal
#[derive(Debug, Clone)]
pub struct MaterializedCache<S> {
    current: S,
    /// `(index, state after the first index events)`, ascending
    checkpoints: Vec<(usize, S)>,
}

impl<S: Clone> MaterializedCache<S> {
    fn new(initial: S) -> Self {
        Self {
            checkpoints: vec![(0, initial.clone())],
            current: initial,
        }
    }

    /// Latest checkpoint at or before `index`
    fn nearest(&self, index: usize) -> Option<&(usize, S)> {
        self.checkpoints.iter().rev().find(|(at, _)| *at <= index)
    }

    pub fn checkpoint_count(&self) -> usize {
        self.checkpoints.len()
    }
}

/// A state computed ahead of appending its event
#[derive(Debug, Clone)]
pub struct Prepared<S> {
    state: S,
    base: usize,
}

impl<S> Prepared<S> {
    pub fn state(&self) -> &S {
        &self.state
    }
}

/// Event log plus reducer plus cache
pub struct Journal<R: Reducer> {
    log: EventLog<R::Event>,
    reducer: R,
    cache: MaterializedCache<R::State>,
    config: JournalConfig,
}

impl<R: Reducer> Journal<R> {
    pub fn new(reducer: R, config: JournalConfig) -> Self {
        let cache = MaterializedCache::new(reducer.initial());
        Self {
            log: EventLog::new(),
            reducer,
            cache,
            config,
        }
    }

    /// Rebuild a journal from stored events
    pub fn from_events(
        reducer: R,
        events: Vec<R::Event>,
        config: JournalConfig,
    ) -> Result<Self, R::Error> {
        let mut journal = Self::new(reducer, config);
        for event in events {
            journal.append(event)?;
        }
        debug!(events = journal.len(), "journal replayed");
        Ok(journal)
    }

    pub fn reducer(&self) -> &R {
        &self.reducer
    }

    pub fn events(&self) -> &[R::Event] {
        self.log.events()
    }

    pub fn log(&self) -> &EventLog<R::Event> {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    pub fn config(&self) -> JournalConfig {
        self.config
    }

    pub fn cache(&self) -> &MaterializedCache<R::State> {
        &self.cache
    }

    /// Current state
    pub fn state(&self) -> &R::State {
        &self.cache.current
    }

    /// State after the first `index` events
    pub fn state_at(&self, index: impl Into<ReplayIndex>) -> Result<R::State, R::Error> {
        let until = index.into().resolve(self.log.len());
        if until == self.log.len() {
            return Ok(self.cache.current.clone());
        }
        let (start, state) = match self.cache.nearest(until) {
            Some((at, state)) => (*at, state.clone()),
            None => (0, self.reducer.initial()),
        };
        trace!(until, from = start, "replaying from checkpoint");
        fold_from(&self.reducer, state, &self.log.events()[start..until])
    }

    /// Cold replay ignoring the cache
    pub fn materialize(&self, index: impl Into<ReplayIndex>) -> Result<R::State, R::Error> {
        materialize(&self.reducer, self.log.events(), index)
    }

    /// Compute the state `event` would produce without recording it
    pub fn preview(&self, event: &R::Event) -> Result<Prepared<R::State>, R::Error> {
        let state = self.reducer.reduce(&self.cache.current, event)?;
        Ok(Prepared {
            state,
            base: self.log.len(),
        })
    }

    /// Record `event` with a state from [`Journal::preview`].
    ///
    /// A preview taken before other events were appended is recomputed.
    pub fn commit(&mut self, event: R::Event, prepared: Prepared<R::State>) -> Result<usize, R::Error> {
        let state = if prepared.base == self.log.len() {
            prepared.state
        } else {
            self.reducer.reduce(&self.cache.current, &event)?
        };
        let index = self.log.append(event);
        self.cache.current = state;

        let len = self.log.len();
        if self.config.snapshot_interval > 0 && len % self.config.snapshot_interval == 0 {
            self.cache.checkpoints.push((len, self.cache.current.clone()));
            trace!(at = len, "checkpoint stored");
        }
        Ok(index)
    }

    /// Append an event, failing without recording it if the reducer rejects it
    pub fn append(&mut self, event: R::Event) -> Result<&R::State, R::Error> {
        let prepared = self.preview(&event)?;
        self.commit(event, prepared)?;
        Ok(&self.cache.current)
    }

    /// True if every cached state equals its cold replay
    pub fn verify_cache(&self) -> Result<bool, R::Error> {
        if self.materialize(ReplayIndex::Current)? != self.cache.current {
            return Ok(false);
        }
        for (at, state) in &self.cache.checkpoints {
            if &self.materialize(*at)? != state {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Reducer for [`Action`] records over a JSON state
#[derive(Debug, Clone, Default)]
pub struct ActionReducer {
    initial: Value,
}

impl ActionReducer {
    pub fn new(initial: Value) -> Self {
        Self { initial }
    }
}

impl Reducer for ActionReducer {
    type Event = Action;
    type State = Value;
    type Error = JournalError;

    fn initial(&self) -> Value {
        match &self.initial {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        }
    }

    fn reduce(&self, state: &Value, event: &Action) -> Result<Value, JournalError> {
        apply_action(state, event)
    }
}
