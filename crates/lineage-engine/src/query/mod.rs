pub mod backend;
pub mod runner;
#[cfg(test)]
pub(crate) mod testing;

use lineage_core::{GraphPayload, LineageDirection, TraceEvidence, Urn};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub use backend::{fetch, HttpBackend, LineageBackend};
pub use runner::{LineageQueries, RequestOutcome};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("backend returned {code}: {body}")]
    Status { code: u16, body: String },
    #[error("backend reported failure: {0}")]
    Backend(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("query disabled: {0} is required")]
    Disabled(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    Summary,
    Drill,
    Impacts,
    Provenance,
    Trace,
}

/// Full parameter tuple of a lineage query; doubles as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    Summary {
        scope: String,
        data_source_id: Option<String>,
        limit: u32,
    },
    Drill {
        urn: Urn,
        depth: u32,
        direction: LineageDirection,
        limit: u32,
    },
    Impacts {
        urn: Urn,
        radius: u32,
        limit: u32,
    },
    Provenance {
        urn: Urn,
    },
    Trace {
        edge_id: String,
    },
}

fn blank(s: &str) -> bool {
    s.trim().is_empty()
}

impl QueryKey {
    pub fn summary(scope: &str, data_source_id: Option<&str>, limit: u32) -> Self {
        Self::Summary {
            scope: scope.to_string(),
            data_source_id: data_source_id
                .filter(|s| !blank(s))
                .map(str::to_string),
            limit,
        }
    }

    pub fn drill(urn: Urn, depth: u32, direction: LineageDirection, limit: u32) -> Self {
        Self::Drill {
            urn,
            depth,
            direction,
            limit,
        }
    }

    pub fn impacts(urn: Urn, radius: u32, limit: u32) -> Self {
        Self::Impacts { urn, radius, limit }
    }

    pub fn provenance(urn: Urn) -> Self {
        Self::Provenance { urn }
    }

    pub fn trace(edge_id: &str) -> Self {
        Self::Trace {
            edge_id: edge_id.to_string(),
        }
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            Self::Summary { .. } => QueryKind::Summary,
            Self::Drill { .. } => QueryKind::Drill,
            Self::Impacts { .. } => QueryKind::Impacts,
            Self::Provenance { .. } => QueryKind::Provenance,
            Self::Trace { .. } => QueryKind::Trace,
        }
    }

    /// The node a graph query is centred on, if any.
    pub fn focus_urn(&self) -> Option<&Urn> {
        match self {
            Self::Drill { urn, .. } | Self::Impacts { urn, .. } | Self::Provenance { urn } => {
                Some(urn)
            }
            Self::Summary { .. } | Self::Trace { .. } => None,
        }
    }

    pub fn is_graph(&self) -> bool {
        self.kind() != QueryKind::Trace
    }

    /// A query only runs once its identifying fields are present.
    pub fn check_enabled(&self) -> Result<(), QueryError> {
        match self {
            Self::Summary { scope, .. } if blank(scope) => Err(QueryError::Disabled("scope")),
            Self::Drill { urn, .. } | Self::Impacts { urn, .. } | Self::Provenance { urn }
                if blank(urn.as_str()) =>
            {
                Err(QueryError::Disabled("urn"))
            }
            Self::Trace { edge_id } if blank(edge_id) => Err(QueryError::Disabled("edge id")),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryData {
    Graph(Arc<GraphPayload>),
    Trace(Arc<TraceEvidence>),
}

impl QueryData {
    pub fn graph(&self) -> Option<&GraphPayload> {
        match self {
            Self::Graph(g) => Some(g),
            Self::Trace(_) => None,
        }
    }

    pub fn trace(&self) -> Option<&TraceEvidence> {
        match self {
            Self::Trace(t) => Some(t),
            Self::Graph(_) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct CacheEntry {
    pub status: QueryStatus,
    pub data: Option<QueryData>,
    pub error: Option<QueryError>,
    pub last_fetched_at: Option<Instant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_with_different_parameters_differ() {
        let a = QueryKey::drill(Urn::from("orders"), 1, LineageDirection::Both, 100);
        let b = QueryKey::drill(Urn::from("orders"), 2, LineageDirection::Both, 100);
        let c = QueryKey::drill(Urn::from("orders"), 1, LineageDirection::Upstream, 100);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(
            a,
            QueryKey::drill(Urn::from("orders"), 1, LineageDirection::Both, 100)
        );
    }

    #[test]
    fn missing_key_fields_disable_the_query() {
        assert_eq!(
            QueryKey::summary(" ", None, 10).check_enabled(),
            Err(QueryError::Disabled("scope"))
        );
        assert_eq!(
            QueryKey::provenance(Urn::from("")).check_enabled(),
            Err(QueryError::Disabled("urn"))
        );
        assert!(QueryKey::summary("warehouse", Some(""), 10)
            .check_enabled()
            .is_ok());
        assert_eq!(
            QueryKey::summary("warehouse", Some(""), 10),
            QueryKey::summary("warehouse", None, 10)
        );
    }
}
