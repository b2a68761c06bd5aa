use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, Runtime};
use tokio_util::sync::CancellationToken;

use crate::query::backend::{fetch, LineageBackend};
use crate::query::{CacheEntry, QueryData, QueryError, QueryKey, QueryStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A successful entry already exists; no round trip.
    Cached,
    Started,
    /// Started, and an in-flight request for the same key was cancelled.
    Superseded,
    /// Required key fields are missing; nothing was fetched.
    Disabled,
}

struct Completion {
    key: QueryKey,
    generation: u64,
    result: Result<QueryData, QueryError>,
}

struct InFlight {
    generation: u64,
    token: CancellationToken,
}

enum Exec {
    Owned(Runtime),
    Shared(Handle),
}

impl Exec {
    fn handle(&self) -> &Handle {
        match self {
            Exec::Owned(rt) => rt.handle(),
            Exec::Shared(h) => h,
        }
    }
}

/// Keyed query cache. Fetches run on tokio; completions come back over a
/// channel and are applied by `pump`, so all state is owned by one thread.
/// A completion is applied only if its generation is still the latest for its
/// key, which keeps stale responses from ever overwriting newer ones.
pub struct LineageQueries {
    backend: Arc<dyn LineageBackend>,
    exec: Exec,
    entries: HashMap<QueryKey, CacheEntry>,
    in_flight: HashMap<QueryKey, InFlight>,
    next_generation: u64,
    tx: Sender<Completion>,
    rx: Receiver<Completion>,
}

impl LineageQueries {
    /// Spins up a small private runtime.
    pub fn new(backend: Arc<dyn LineageBackend>) -> Result<Self> {
        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("lineage-query")
            .enable_all()
            .build()
            .context("build query runtime")?;
        Ok(Self::with_exec(backend, Exec::Owned(rt)))
    }

    /// Runs fetches on an existing runtime.
    pub fn with_handle(backend: Arc<dyn LineageBackend>, handle: Handle) -> Self {
        Self::with_exec(backend, Exec::Shared(handle))
    }

    fn with_exec(backend: Arc<dyn LineageBackend>, exec: Exec) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            backend,
            exec,
            entries: HashMap::new(),
            in_flight: HashMap::new(),
            next_generation: 0,
            tx,
            rx,
        }
    }

    pub fn entry(&self, key: &QueryKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn status(&self, key: &QueryKey) -> QueryStatus {
        self.entries
            .get(key)
            .map(|e| e.status)
            .unwrap_or_default()
    }

    pub fn data(&self, key: &QueryKey) -> Option<&QueryData> {
        self.entries.get(key).and_then(|e| e.data.as_ref())
    }

    pub fn is_loading(&self, key: &QueryKey) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Serves from cache when a successful entry exists, otherwise fetches.
    pub fn request(&mut self, key: QueryKey) -> RequestOutcome {
        if let Err(e) = key.check_enabled() {
            tracing::debug!(?key, "{e}");
            return RequestOutcome::Disabled;
        }
        if self.status(&key) == QueryStatus::Success {
            return RequestOutcome::Cached;
        }
        self.start(key)
    }

    /// Always fetches, superseding any in-flight request for the key.
    pub fn refetch(&mut self, key: QueryKey) -> RequestOutcome {
        if let Err(e) = key.check_enabled() {
            tracing::debug!(?key, "{e}");
            return RequestOutcome::Disabled;
        }
        self.start(key)
    }

    fn start(&mut self, key: QueryKey) -> RequestOutcome {
        let superseded = self.cancel_in_flight(&key);

        self.next_generation += 1;
        let generation = self.next_generation;
        let token = CancellationToken::new();

        let entry = self.entries.entry(key.clone()).or_default();
        entry.status = QueryStatus::Loading;
        entry.error = None;

        let fut = fetch(self.backend.as_ref(), &key);
        let tx = self.tx.clone();
        let cancelled = token.clone();
        let task_key = key.clone();
        self.exec.handle().spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {
                    tracing::trace!(key = ?task_key, generation, "query cancelled");
                }
                result = fut => {
                    let _ = tx.send(Completion { key: task_key, generation, result });
                }
            }
        });

        tracing::debug!(?key, generation, superseded, "query started");
        self.in_flight.insert(key, InFlight { generation, token });

        if superseded {
            RequestOutcome::Superseded
        } else {
            RequestOutcome::Started
        }
    }

    fn cancel_in_flight(&mut self, key: &QueryKey) -> bool {
        match self.in_flight.remove(key) {
            Some(prev) => {
                prev.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels an in-flight fetch. The entry keeps whatever data it had.
    pub fn cancel(&mut self, key: &QueryKey) -> bool {
        if !self.cancel_in_flight(key) {
            return false;
        }
        if let Some(entry) = self.entries.get_mut(key) {
            entry.status = if entry.data.is_some() {
                QueryStatus::Success
            } else {
                QueryStatus::Idle
            };
        }
        true
    }

    /// Drops the cached entry so the next `request` goes to the backend.
    pub fn invalidate(&mut self, key: &QueryKey) {
        self.cancel_in_flight(key);
        self.entries.remove(key);
    }

    pub fn invalidate_all(&mut self) {
        for (_, f) in self.in_flight.drain() {
            f.token.cancel();
        }
        self.entries.clear();
    }

    /// Applies every completion that has arrived. Returns the keys whose
    /// entries changed.
    pub fn pump(&mut self) -> Vec<QueryKey> {
        let arrived: Vec<Completion> = self.rx.try_iter().collect();
        arrived
            .into_iter()
            .filter_map(|c| self.apply(c))
            .collect()
    }

    /// Blocks until nothing is in flight or `timeout` elapses, applying
    /// completions as they arrive.
    pub fn wait_idle(&mut self, timeout: Duration) -> Vec<QueryKey> {
        let deadline = Instant::now() + timeout;
        let mut applied = self.pump();
        while !self.in_flight.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(c) => applied.extend(self.apply(c)),
                Err(RecvTimeoutError::Timeout) => {
                    tracing::warn!(pending = self.in_flight.len(), "queries still in flight");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        applied
    }

    fn apply(&mut self, c: Completion) -> Option<QueryKey> {
        match self.in_flight.get(&c.key) {
            Some(f) if f.generation == c.generation => {}
            _ => {
                tracing::debug!(key = ?c.key, generation = c.generation, "dropping stale response");
                return None;
            }
        }
        self.in_flight.remove(&c.key);

        let entry = self.entries.entry(c.key.clone()).or_default();
        match c.result {
            Ok(data) => {
                entry.status = QueryStatus::Success;
                entry.data = Some(data);
                entry.error = None;
                entry.last_fetched_at = Some(Instant::now());
            }
            Err(e) => {
                tracing::warn!(key = ?c.key, "query failed: {e}");
                entry.status = QueryStatus::Error;
                entry.error = Some(e);
            }
        }
        Some(c.key)
    }
}

impl Drop for LineageQueries {
    fn drop(&mut self) {
        for (_, f) in self.in_flight.drain() {
            f.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::testing::ScriptedBackend;
    use lineage_core::{LineageDirection, Urn};

    const WAIT: Duration = Duration::from_secs(5);

    fn summary() -> QueryKey {
        QueryKey::summary("warehouse", None, 500)
    }

    fn drill(depth: u32) -> QueryKey {
        QueryKey::drill(Urn::from("orders"), depth, LineageDirection::Both, 100)
    }

    fn node_count(q: &LineageQueries, key: &QueryKey) -> usize {
        q.data(key)
            .and_then(|d| d.graph())
            .map(|g| g.nodes.len())
            .unwrap_or(0)
    }

    #[test]
    fn identical_key_is_served_from_cache() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.respond(summary(), 0, Ok(ScriptedBackend::chain(&["a", "b"])));
        let mut q = LineageQueries::new(backend.clone()).expect("runtime");

        assert_eq!(q.request(summary()), RequestOutcome::Started);
        q.wait_idle(WAIT);
        assert_eq!(q.status(&summary()), QueryStatus::Success);
        assert!(q.entry(&summary()).and_then(|e| e.last_fetched_at).is_some());

        assert_eq!(q.request(summary()), RequestOutcome::Cached);
        assert_eq!(backend.calls(&summary()), 1);
    }

    #[test]
    fn keys_are_cached_independently() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.respond(drill(1), 0, Ok(ScriptedBackend::chain(&["orders", "x"])));
        backend.respond(
            drill(2),
            0,
            Ok(ScriptedBackend::chain(&["orders", "x", "y"])),
        );
        let mut q = LineageQueries::new(backend).expect("runtime");

        q.request(drill(1));
        q.request(drill(2));
        q.wait_idle(WAIT);

        assert_eq!(node_count(&q, &drill(1)), 2);
        assert_eq!(node_count(&q, &drill(2)), 3);
    }

    #[test]
    fn refired_key_supersedes_slow_response() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.respond(drill(1), 300, Ok(ScriptedBackend::chain(&["old"])));
        backend.respond(drill(1), 0, Ok(ScriptedBackend::chain(&["new", "er"])));
        let mut q = LineageQueries::new(backend).expect("runtime");

        assert_eq!(q.request(drill(1)), RequestOutcome::Started);
        assert_eq!(q.refetch(drill(1)), RequestOutcome::Superseded);
        q.wait_idle(WAIT);
        std::thread::sleep(Duration::from_millis(400));
        q.pump();

        assert_eq!(node_count(&q, &drill(1)), 2);
    }

    #[test]
    fn stale_generation_is_never_applied() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.respond(drill(1), 200, Ok(ScriptedBackend::chain(&["current"])));
        let mut q = LineageQueries::new(backend).expect("runtime");
        q.request(drill(1));

        let stale = Completion {
            key: drill(1),
            generation: 0,
            result: Ok(QueryData::Graph(Arc::new(ScriptedBackend::chain(&[
                "a", "b", "c",
            ])))),
        };
        assert!(q.apply(stale).is_none());
        assert!(q.is_loading(&drill(1)));

        q.wait_idle(WAIT);
        assert_eq!(node_count(&q, &drill(1)), 1);
    }

    #[test]
    fn failed_refetch_keeps_last_good_data() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.respond(summary(), 0, Ok(ScriptedBackend::chain(&["a", "b"])));
        backend.respond(
            summary(),
            0,
            Err(QueryError::Status {
                code: 503,
                body: "unavailable".into(),
            }),
        );
        let mut q = LineageQueries::new(backend).expect("runtime");

        q.request(summary());
        q.wait_idle(WAIT);
        q.refetch(summary());
        q.wait_idle(WAIT);

        let entry = q.entry(&summary()).expect("entry");
        assert_eq!(entry.status, QueryStatus::Error);
        assert!(matches!(entry.error, Some(QueryError::Status { code: 503, .. })));
        assert_eq!(node_count(&q, &summary()), 2);
    }

    #[test]
    fn invalidate_forces_round_trip_and_disabled_keys_never_fetch() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.respond(summary(), 0, Ok(ScriptedBackend::chain(&["a"])));
        backend.respond(summary(), 0, Ok(ScriptedBackend::chain(&["a", "b"])));
        let mut q = LineageQueries::new(backend.clone()).expect("runtime");

        q.request(summary());
        q.wait_idle(WAIT);
        q.invalidate(&summary());
        assert_eq!(q.status(&summary()), QueryStatus::Idle);
        assert_eq!(q.request(summary()), RequestOutcome::Started);
        q.wait_idle(WAIT);
        assert_eq!(node_count(&q, &summary()), 2);
        assert_eq!(backend.calls(&summary()), 2);

        let blank = QueryKey::provenance(Urn::from(""));
        assert_eq!(q.request(blank.clone()), RequestOutcome::Disabled);
        assert_eq!(backend.calls(&blank), 0);
        assert!(q.entry(&blank).is_none());
    }

    #[test]
    fn cancel_restores_previous_status() {
        let backend = Arc::new(ScriptedBackend::default());
        backend.respond(drill(3), 500, Ok(ScriptedBackend::chain(&["late"])));
        let mut q = LineageQueries::new(backend).expect("runtime");

        q.request(drill(3));
        assert!(q.cancel(&drill(3)));
        assert!(!q.cancel(&drill(3)));
        assert_eq!(q.status(&drill(3)), QueryStatus::Idle);
        assert!(q.is_idle());
    }
}
