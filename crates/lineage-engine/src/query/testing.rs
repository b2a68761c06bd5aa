use futures_util::future::{BoxFuture, FutureExt};
use lineage_core::{GraphPayload, LineageDirection, RawEdge, RawNode, TraceEvidence, Urn};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use crate::query::backend::{GraphFuture, LineageBackend};
use crate::query::{QueryData, QueryError, QueryKey};

type Scripted = (u64, Result<QueryData, QueryError>);

/// In-memory backend that replays queued responses per key, each after an
/// optional delay.
#[derive(Default)]
pub struct ScriptedBackend {
    script: Mutex<HashMap<QueryKey, VecDeque<Scripted>>>,
    calls: Mutex<HashMap<QueryKey, usize>>,
}

impl ScriptedBackend {
    pub fn chain(urns: &[&str]) -> GraphPayload {
        GraphPayload {
            nodes: urns.iter().map(|u| RawNode::new(u)).collect(),
            edges: urns.windows(2).map(|w| RawEdge::new(w[0], w[1])).collect(),
        }
    }

    pub fn respond(&self, key: QueryKey, delay_ms: u64, result: Result<GraphPayload, QueryError>) {
        let result = result.map(|g| QueryData::Graph(g.into()));
        self.push(key, delay_ms, result);
    }

    pub fn respond_trace(
        &self,
        key: QueryKey,
        delay_ms: u64,
        result: Result<TraceEvidence, QueryError>,
    ) {
        let result = result.map(|t| QueryData::Trace(t.into()));
        self.push(key, delay_ms, result);
    }

    fn push(&self, key: QueryKey, delay_ms: u64, result: Result<QueryData, QueryError>) {
        let mut script = self.script.lock().expect("script lock");
        script.entry(key).or_default().push_back((delay_ms, result));
    }

    pub fn calls(&self, key: &QueryKey) -> usize {
        let calls = self.calls.lock().expect("calls lock");
        calls.get(key).copied().unwrap_or(0)
    }

    fn next(&self, key: QueryKey) -> BoxFuture<'static, Result<QueryData, QueryError>> {
        *self
            .calls
            .lock()
            .expect("calls lock")
            .entry(key.clone())
            .or_default() += 1;
        let scripted = self
            .script
            .lock()
            .expect("script lock")
            .get_mut(&key)
            .and_then(|q| q.pop_front());
        async move {
            let Some((delay_ms, result)) = scripted else {
                return Err(QueryError::Backend(format!("no response scripted for {key:?}")));
            };
            if delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            result
        }
        .boxed()
    }

    fn graph(&self, key: QueryKey) -> GraphFuture {
        self.next(key)
            .map(|r| {
                r.and_then(|d| {
                    d.graph()
                        .cloned()
                        .ok_or_else(|| QueryError::Decode("expected a graph".into()))
                })
            })
            .boxed()
    }
}

impl LineageBackend for ScriptedBackend {
    fn summary(&self, scope: &str, data_source_id: Option<&str>, limit: u32) -> GraphFuture {
        self.graph(QueryKey::summary(scope, data_source_id, limit))
    }

    fn drill(
        &self,
        urn: &Urn,
        depth: u32,
        direction: LineageDirection,
        limit: u32,
    ) -> GraphFuture {
        self.graph(QueryKey::drill(urn.clone(), depth, direction, limit))
    }

    fn impacts(&self, urn: &Urn, radius: u32, limit: u32) -> GraphFuture {
        self.graph(QueryKey::impacts(urn.clone(), radius, limit))
    }

    fn provenance(&self, urn: &Urn) -> GraphFuture {
        self.graph(QueryKey::provenance(urn.clone()))
    }

    fn trace(&self, edge_id: &str) -> BoxFuture<'static, Result<TraceEvidence, QueryError>> {
        self.next(QueryKey::trace(edge_id))
            .map(|r| {
                r.and_then(|d| {
                    d.trace()
                        .cloned()
                        .ok_or_else(|| QueryError::Decode("expected trace evidence".into()))
                })
            })
            .boxed()
    }
}
