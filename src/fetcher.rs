//! Fetchers: keyed loads and submissions outside of navigation.
//!
//! Each key owns one slot. Starting a new call on a key aborts the previous
//! call on that key and bumps the slot's generation; a completion is only
//! recorded if its generation is still the slot's. Keys never affect each
//! other, and navigations never touch fetchers.

use crate::abort::{AbortController, AbortSignal};
use crate::error::RouteError;
use crate::trace_log;
use dashmap::DashMap;
use http::StatusCode;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetcherState {
    #[default]
    Idle,
    Loading,
    Submitting,
}

/// Snapshot of one fetcher.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fetcher {
    pub state: FetcherState,
    /// Last settled data; kept while a new call is in flight.
    pub data: Option<Value>,
    pub error: Option<RouteError>,
    pub status: Option<StatusCode>,
}

impl Fetcher {
    pub fn is_idle(&self) -> bool {
        self.state == FetcherState::Idle
    }
}

/// How a fetcher call settled.
#[derive(Debug, Clone, PartialEq)]
pub enum FetcherOutcome {
    Data { data: Value, status: StatusCode },
    Error(RouteError),
}

#[derive(Debug)]
struct FetcherSlot {
    fetcher: Fetcher,
    controller: Option<AbortController>,
    generation: u64,
}

/// A call started with [`FetcherRegistry::begin`].
#[derive(Debug, Clone)]
pub struct FetcherTicket {
    pub key: String,
    pub generation: u64,
    pub signal: AbortSignal,
}

#[derive(Debug, Default)]
pub struct FetcherRegistry {
    slots: DashMap<String, FetcherSlot>,
    generations: AtomicU64,
}

impl FetcherRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a call on `key`, superseding any call in flight on it.
    pub fn begin(&self, key: &str, state: FetcherState) -> FetcherTicket {
        let generation = self.generations.fetch_add(1, Ordering::AcqRel) + 1;
        let controller = AbortController::new();
        let signal = controller.signal();

        let mut slot = self
            .slots
            .entry(key.to_string())
            .or_insert_with(|| FetcherSlot {
                fetcher: Fetcher::default(),
                controller: None,
                generation: 0,
            });
        if let Some(previous) = slot.controller.replace(controller) {
            trace_log!("Fetcher '{}' superseded (gen {})", key, slot.generation);
            previous.abort();
        }
        slot.generation = generation;
        slot.fetcher.state = state;

        FetcherTicket {
            key: key.to_string(),
            generation,
            signal,
        }
    }

    /// Record the outcome of `ticket`. Returns `false` (and changes nothing)
    /// when the call was superseded or the fetcher deleted.
    pub fn complete(&self, ticket: &FetcherTicket, outcome: FetcherOutcome) -> bool {
        let Some(mut slot) = self.slots.get_mut(&ticket.key) else {
            return false;
        };
        if slot.generation != ticket.generation {
            trace_log!("Dropping stale result for fetcher '{}'", ticket.key);
            return false;
        }
        slot.controller = None;
        slot.fetcher.state = FetcherState::Idle;
        match outcome {
            FetcherOutcome::Data { data, status } => {
                slot.fetcher.data = Some(data);
                slot.fetcher.error = None;
                slot.fetcher.status = Some(status);
            }
            FetcherOutcome::Error(error) => {
                slot.fetcher.status = StatusCode::from_u16(error.status()).ok();
                slot.fetcher.error = Some(error);
            }
        }
        true
    }

    /// Back to idle without recording anything; used when the call redirected
    /// away or was aborted.
    pub fn settle(&self, ticket: &FetcherTicket) {
        if let Some(mut slot) = self.slots.get_mut(&ticket.key) {
            if slot.generation == ticket.generation {
                slot.controller = None;
                slot.fetcher.state = FetcherState::Idle;
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<Fetcher> {
        self.slots.get(key).map(|slot| slot.fetcher.clone())
    }

    /// Abort and forget `key`.
    pub fn delete(&self, key: &str) -> bool {
        match self.slots.remove(key) {
            Some((_, slot)) => {
                if let Some(controller) = slot.controller {
                    controller.abort();
                }
                true
            }
            None => false,
        }
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.slots.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_repeat_call_supersedes_previous() {
        let registry = FetcherRegistry::new();
        let first = registry.begin("search", FetcherState::Loading);
        let second = registry.begin("search", FetcherState::Loading);

        assert!(first.signal.is_aborted());
        assert!(!second.signal.is_aborted());

        let stale = FetcherOutcome::Data {
            data: json!("old"),
            status: StatusCode::OK,
        };
        assert!(!registry.complete(&first, stale));
        assert_eq!(registry.get("search").unwrap().state, FetcherState::Loading);

        let fresh = FetcherOutcome::Data {
            data: json!("new"),
            status: StatusCode::OK,
        };
        assert!(registry.complete(&second, fresh));
        let fetcher = registry.get("search").unwrap();
        assert!(fetcher.is_idle());
        assert_eq!(fetcher.data, Some(json!("new")));
    }

    #[test]
    fn test_keys_are_independent() {
        let registry = FetcherRegistry::new();
        let a = registry.begin("a", FetcherState::Submitting);
        let b = registry.begin("b", FetcherState::Loading);
        assert!(!a.signal.is_aborted());
        assert!(!b.signal.is_aborted());
        assert_eq!(registry.keys(), vec!["a", "b"]);
    }

    #[test]
    fn test_error_keeps_previous_data() {
        let registry = FetcherRegistry::new();
        let ticket = registry.begin("k", FetcherState::Loading);
        registry.complete(
            &ticket,
            FetcherOutcome::Data {
                data: json!(1),
                status: StatusCode::OK,
            },
        );
        let ticket = registry.begin("k", FetcherState::Loading);
        registry.complete(&ticket, FetcherOutcome::Error(RouteError::thrown("down")));

        let fetcher = registry.get("k").unwrap();
        assert_eq!(fetcher.data, Some(json!(1)));
        assert_eq!(fetcher.status, Some(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(fetcher.error.is_some());
    }

    #[test]
    fn test_delete_aborts_in_flight_call() {
        let registry = FetcherRegistry::new();
        let ticket = registry.begin("k", FetcherState::Loading);
        assert!(registry.delete("k"));
        assert!(ticket.signal.is_aborted());
        assert!(!registry.complete(
            &ticket,
            FetcherOutcome::Error(RouteError::thrown("late"))
        ));
        assert!(registry.is_empty());
    }
}
