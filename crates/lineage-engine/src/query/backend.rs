use futures_util::future::{BoxFuture, FutureExt};
use lineage_core::{GraphPayload, LineageDirection, TraceEvidence, Urn};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use crate::query::{QueryData, QueryError, QueryKey};

pub type GraphFuture = BoxFuture<'static, Result<GraphPayload, QueryError>>;

/// The lineage service, treated as a black box. Futures are `'static` so they
/// can be spawned and cancelled independently of the owner.
pub trait LineageBackend: Send + Sync + 'static {
    fn summary(&self, scope: &str, data_source_id: Option<&str>, limit: u32) -> GraphFuture;

    fn drill(&self, urn: &Urn, depth: u32, direction: LineageDirection, limit: u32)
        -> GraphFuture;

    fn impacts(&self, urn: &Urn, radius: u32, limit: u32) -> GraphFuture;

    fn provenance(&self, urn: &Urn) -> GraphFuture;

    fn trace(&self, edge_id: &str) -> BoxFuture<'static, Result<TraceEvidence, QueryError>>;
}

pub fn fetch(
    backend: &dyn LineageBackend,
    key: &QueryKey,
) -> BoxFuture<'static, Result<QueryData, QueryError>> {
    let graph = |f: GraphFuture| f.map(|r| r.map(|g| QueryData::Graph(Arc::new(g)))).boxed();
    match key {
        QueryKey::Summary {
            scope,
            data_source_id,
            limit,
        } => graph(backend.summary(scope, data_source_id.as_deref(), *limit)),
        QueryKey::Drill {
            urn,
            depth,
            direction,
            limit,
        } => graph(backend.drill(urn, *depth, *direction, *limit)),
        QueryKey::Impacts { urn, radius, limit } => graph(backend.impacts(urn, *radius, *limit)),
        QueryKey::Provenance { urn } => graph(backend.provenance(urn)),
        QueryKey::Trace { edge_id } => backend
            .trace(edge_id)
            .map(|r| r.map(|t| QueryData::Trace(Arc::new(t))))
            .boxed(),
    }
}

/// A payload the service may return without the `{success, data, error}`
/// envelope. A bare body is only trusted when it carries one of `MARKERS`.
pub trait BarePayload: DeserializeOwned {
    const MARKERS: &'static [&'static str];
}

impl BarePayload for GraphPayload {
    const MARKERS: &'static [&'static str] = &["nodes", "edges"];
}

impl BarePayload for TraceEvidence {
    const MARKERS: &'static [&'static str] = &["edgeId"];
}

#[derive(Deserialize)]
struct Envelope<T> {
    success: bool,
    #[serde(default = "Option::default")]
    data: Option<T>,
    #[serde(default)]
    error: Option<String>,
}

fn decode<T: BarePayload>(body: &str) -> Result<T, QueryError> {
    let value: Value =
        serde_json::from_str(body).map_err(|e| QueryError::Decode(e.to_string()))?;
    let Value::Object(fields) = &value else {
        return Err(QueryError::Decode("expected a JSON object".to_string()));
    };

    if fields.contains_key("success") {
        let envelope: Envelope<T> =
            serde_json::from_value(value).map_err(|e| QueryError::Decode(e.to_string()))?;
        return match envelope {
            Envelope {
                success: true,
                data: Some(v),
                ..
            } => Ok(v),
            Envelope {
                success: true,
                data: None,
                ..
            } => Err(QueryError::Backend("response carried no data".to_string())),
            Envelope { error, .. } => Err(QueryError::Backend(
                error.unwrap_or_else(|| "success=false".to_string()),
            )),
        };
    }

    if !T::MARKERS.iter().any(|k| fields.contains_key(*k)) {
        return Err(QueryError::Decode(format!(
            "unrecognised response, expected one of {:?}",
            T::MARKERS
        )));
    }
    serde_json::from_value(value).map_err(|e| QueryError::Decode(e.to_string()))
}

/// REST/JSON client for the lineage endpoints under `{base}/lineage/...`.
#[derive(Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
    bearer: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: &str, bearer: Option<String>) -> anyhow::Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| anyhow::anyhow!("invalid backend url {base_url}: {e}"))?;
        if base.cannot_be_a_base() {
            anyhow::bail!("backend url {base_url} cannot carry a path");
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base,
            bearer: bearer.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push("lineage").extend(segments);
        }
        url
    }

    fn get_json<T>(
        &self,
        url: Url,
        query: Vec<(&'static str, String)>,
    ) -> BoxFuture<'static, Result<T, QueryError>>
    where
        T: BarePayload + Send + 'static,
    {
        let mut req = self.client.get(url.clone()).query(&query);
        if let Some(token) = &self.bearer {
            req = req.bearer_auth(token);
        }
        async move {
            tracing::debug!(%url, "lineage request");
            let response = req
                .send()
                .await
                .map_err(|e| QueryError::Transport(e.to_string()))?;
            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| QueryError::Transport(e.to_string()))?;
            if !status.is_success() {
                return Err(QueryError::Status {
                    code: status.as_u16(),
                    body,
                });
            }
            decode(&body)
        }
        .boxed()
    }
}

impl LineageBackend for HttpBackend {
    fn summary(&self, scope: &str, data_source_id: Option<&str>, limit: u32) -> GraphFuture {
        let mut query = vec![("scope", scope.to_string()), ("limit", limit.to_string())];
        if let Some(ds) = data_source_id {
            query.push(("dataSourceId", ds.to_string()));
        }
        self.get_json(self.endpoint(&["summary"]), query)
    }

    fn drill(
        &self,
        urn: &Urn,
        depth: u32,
        direction: LineageDirection,
        limit: u32,
    ) -> GraphFuture {
        let query = vec![
            ("urn", urn.0.clone()),
            ("depth", depth.to_string()),
            ("direction", direction.as_str().to_string()),
            ("limit", limit.to_string()),
        ];
        self.get_json(self.endpoint(&["drill"]), query)
    }

    fn impacts(&self, urn: &Urn, radius: u32, limit: u32) -> GraphFuture {
        let query = vec![
            ("urn", urn.0.clone()),
            ("radius", radius.to_string()),
            ("limit", limit.to_string()),
        ];
        self.get_json(self.endpoint(&["impacts"]), query)
    }

    fn provenance(&self, urn: &Urn) -> GraphFuture {
        self.get_json(
            self.endpoint(&["provenance"]),
            vec![("urn", urn.0.clone())],
        )
    }

    fn trace(&self, edge_id: &str) -> BoxFuture<'static, Result<TraceEvidence, QueryError>> {
        self.get_json(self.endpoint(&["trace", edge_id]), Vec::new())
    }
}
