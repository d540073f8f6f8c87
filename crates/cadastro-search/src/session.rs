//! Debounced search-as-you-type with last-write-wins results.
//!
//! Every input bumps a generation counter. A lookup only fires once the
//! input has been quiet for the debounce interval, and its results are
//! applied only if no newer input arrived while it was in flight.
//!
//! ```text
//! input("mar")  gen 1 ──┐
//! input("mari") gen 2 ──┼── quiet ≥ debounce ──► Ticket{gen 2} ──► store
//!                       │                                           │
//!                       └────────── accept(ticket, results) ◄───────┘
//!                                   applied iff gen 2 is newest
//! ```
//!
//! Time is passed in by the caller, which keeps the session free of
//! timers and deterministic under test.

use std::time::{Duration, Instant};

use tracing::debug;

use cadastro_core::{PatientStore, SearchField, SearchQuery, StoredPatient, ValidationConfig};

use crate::query::QueryPolicy;
use crate::response::SearchResult;

/// A lookup that was allowed to fire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub generation: u64,
    pub query: SearchQuery,
}

#[derive(Debug, Clone)]
struct Pending {
    query: SearchQuery,
    since: Instant,
}

/// Search state for one input box.
#[derive(Debug, Clone)]
pub struct SearchSession {
    debounce: Duration,
    policy: QueryPolicy,
    generation: u64,
    pending: Option<Pending>,
    results: Vec<StoredPatient>,
    applied: Option<u64>,
}

impl SearchSession {
    pub fn new(debounce: Duration, policy: QueryPolicy) -> Self {
        Self {
            debounce,
            policy,
            generation: 0,
            pending: None,
            results: Vec::new(),
            applied: None,
        }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(
            Duration::from_millis(config.search_debounce_ms),
            QueryPolicy::from_config(config),
        )
    }

    /// Current generation (number of inputs seen).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Results of the newest applied lookup.
    pub fn results(&self) -> &[StoredPatient] {
        &self.results
    }

    /// Generation whose results are currently shown.
    pub fn applied_generation(&self) -> Option<u64> {
        self.applied
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Record a keystroke. Returns the new generation.
    ///
    /// Input shorter than the minimum clears the results and cancels any
    /// pending lookup.
    pub fn input(&mut self, text: &str, field: Option<SearchField>, at: Instant) -> u64 {
        self.generation += 1;
        match self.policy.build(text, field) {
            Some(query) => {
                self.pending = Some(Pending { query, since: at });
            }
            None => {
                self.pending = None;
                self.results.clear();
                self.applied = Some(self.generation);
            }
        }
        self.generation
    }

    /// Fire the pending lookup if the input has been quiet long enough.
    pub fn poll(&mut self, at: Instant) -> Option<Ticket> {
        let ready = self
            .pending
            .as_ref()
            .is_some_and(|p| at.saturating_duration_since(p.since) >= self.debounce);
        if !ready {
            return None;
        }

        self.pending.take().map(|p| Ticket {
            generation: self.generation,
            query: p.query,
        })
    }

    /// Apply results for `ticket`. Stale results are dropped.
    pub fn accept(&mut self, ticket: &Ticket, results: Vec<StoredPatient>) -> bool {
        if ticket.generation != self.generation {
            debug!(
                ticket = ticket.generation,
                current = self.generation,
                "dropping stale search results"
            );
            return false;
        }

        debug!(
            generation = ticket.generation,
            field = %ticket.query.field,
            results = results.len(),
            "search results applied"
        );
        self.results = results;
        self.applied = Some(ticket.generation);
        true
    }

    /// Poll, query `store` synchronously and accept the results.
    ///
    /// Returns whether new results were applied.
    pub fn run<S: PatientStore + ?Sized>(&mut self, store: &S, at: Instant) -> SearchResult<bool> {
        let Some(ticket) = self.poll(at) else {
            return Ok(false);
        };
        let results = store.search(&ticket.query)?;
        Ok(self.accept(&ticket, results))
    }
}

impl Default for SearchSession {
    fn default() -> Self {
        Self::from_config(&ValidationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadastro_core::{InMemoryStore, PatientIdentity};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn session() -> SearchSession {
        SearchSession::new(ms(300), QueryPolicy::default())
    }

    fn store() -> InMemoryStore {
        InMemoryStore::with_patients(vec![
            StoredPatient::with_id("1", PatientIdentity::new("Maria da Silva")),
            StoredPatient::with_id("2", PatientIdentity::new("Mariana Costa")),
            StoredPatient::with_id("3", PatientIdentity::new("João Pereira")),
        ])
    }

    #[test]
    fn test_debounce_waits_for_quiet_period() {
        let t0 = Instant::now();
        let mut session = session();

        session.input("mar", None, t0);
        assert!(session.poll(t0 + ms(100)).is_none());
        assert!(session.has_pending());

        let ticket = session.poll(t0 + ms(300)).unwrap();
        assert_eq!(ticket.generation, 1);
        assert_eq!(ticket.query.text, "mar");
        assert!(!session.has_pending());
        assert!(session.poll(t0 + ms(600)).is_none());
    }

    #[test]
    fn test_typing_resets_debounce() {
        let t0 = Instant::now();
        let mut session = session();

        session.input("mar", None, t0);
        session.input("mari", None, t0 + ms(200));
        assert!(session.poll(t0 + ms(400)).is_none());

        let ticket = session.poll(t0 + ms(500)).unwrap();
        assert_eq!(ticket.generation, 2);
        assert_eq!(ticket.query.text, "mari");
    }

    #[test]
    fn test_stale_results_dropped() {
        let t0 = Instant::now();
        let mut session = session();

        session.input("mar", None, t0);
        let first = session.poll(t0 + ms(300)).unwrap();

        session.input("joão", None, t0 + ms(350));
        let second = session.poll(t0 + ms(700)).unwrap();

        let joao = vec![StoredPatient::with_id("3", PatientIdentity::new("João Pereira"))];
        assert!(session.accept(&second, joao));

        let maria = vec![StoredPatient::with_id("1", PatientIdentity::new("Maria da Silva"))];
        assert!(!session.accept(&first, maria));

        assert_eq!(session.results().len(), 1);
        assert_eq!(session.results()[0].id, "3");
        assert_eq!(session.applied_generation(), Some(2));
    }

    #[test]
    fn test_short_input_clears_results() {
        let t0 = Instant::now();
        let mut session = session();
        let store = store();

        session.input("mari", None, t0);
        assert!(session.run(&store, t0 + ms(300)).unwrap());
        assert_eq!(session.results().len(), 2);

        session.input("ma", None, t0 + ms(400));
        assert!(session.results().is_empty());
        assert!(!session.has_pending());
        assert!(!session.run(&store, t0 + ms(800)).unwrap());
    }

    #[test]
    fn test_run_against_store() {
        let t0 = Instant::now();
        let mut session = session();
        let store = store();

        session.input("MARIA", None, t0);
        assert!(!session.run(&store, t0 + ms(10)).unwrap());
        assert!(session.run(&store, t0 + ms(300)).unwrap());

        let mut ids: Vec<_> = session.results().iter().map(|p| p.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["1", "2"]);
    }
}
