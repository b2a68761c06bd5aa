use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Urn(pub String);

impl Urn {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Urn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Urn {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// Wire records are deliberately loose: anything malformed is dropped at
// normalization instead of failing the whole payload decode.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawNode {
    pub urn: Option<String>,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub node_type: Option<String>,
    pub layer: Option<i64>,
    pub confidence: Option<f64>,
    pub metadata: Map<String, Value>,
}

impl RawNode {
    pub fn new(urn: &str) -> Self {
        Self {
            urn: Some(urn.to_string()),
            ..Default::default()
        }
    }

    pub fn with_layer(mut self, layer: i64) -> Self {
        self.layer = Some(layer);
        self
    }

    pub fn with_label(mut self, label: &str) -> Self {
        self.label = Some(label.to_string());
        self
    }

    pub fn with_type(mut self, node_type: &str) -> Self {
        self.node_type = Some(node_type.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RawEdge {
    pub id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub relationship_type: Option<String>,
    pub confidence: Option<f64>,
    pub metadata: Map<String, Value>,
}

impl RawEdge {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: Some(from.to_string()),
            to: Some(to.to_string()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GraphPayload {
    pub nodes: Vec<RawNode>,
    pub edges: Vec<RawEdge>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Source,
    Database,
    Schema,
    Table,
    View,
    Column,
    Process,
    Transformation,
    Sink,
    #[serde(other)]
    Other,
}

impl NodeType {
    pub fn parse(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "source" | "datasource" | "data_source" => Self::Source,
            "database" | "db" => Self::Database,
            "schema" => Self::Schema,
            "table" => Self::Table,
            "view" | "materialized_view" => Self::View,
            "column" | "field" => Self::Column,
            "process" | "job" => Self::Process,
            "transformation" | "transform" => Self::Transformation,
            "sink" => Self::Sink,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Database => "database",
            Self::Schema => "schema",
            Self::Table => "table",
            Self::View => "view",
            Self::Column => "column",
            Self::Process => "process",
            Self::Transformation => "transformation",
            Self::Sink => "sink",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipType {
    #[default]
    Direct,
    TransformsTo,
    References,
    Joined,
    Aggregated,
    Derived,
    Cast,
    Manual,
    Suggested,
}

impl RelationshipType {
    // Unknown relationship names fall back to `Direct`.
    pub fn parse(input: &str) -> Self {
        match input.trim().to_ascii_lowercase().as_str() {
            "transforms_to" | "transforms" => Self::TransformsTo,
            "references" => Self::References,
            "joined" | "join" => Self::Joined,
            "aggregated" | "aggregate" => Self::Aggregated,
            "derived" => Self::Derived,
            "cast" => Self::Cast,
            "manual" => Self::Manual,
            "suggested" => Self::Suggested,
            _ => Self::Direct,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::TransformsTo => "transforms_to",
            Self::References => "references",
            Self::Joined => "joined",
            Self::Aggregated => "aggregated",
            Self::Derived => "derived",
            Self::Cast => "cast",
            Self::Manual => "manual",
            Self::Suggested => "suggested",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum LineageDirection {
    Upstream,
    Downstream,
    #[default]
    Both,
}

impl LineageDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Upstream => "upstream",
            Self::Downstream => "downstream",
            Self::Both => "both",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RowPair {
    pub source_row: Map<String, Value>,
    pub target_row: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeWindow {
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct TraceEvidence {
    pub edge_id: String,
    pub samples: Vec<RowPair>,
    pub coverage_pct: Option<f64>,
    pub confidence: Option<f64>,
    pub evidence_sources: Vec<String>,
    pub window: Option<TimeWindow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_records_tolerate_missing_fields() {
        let json = r#"{
            "nodes": [{"urn": "db.orders", "type": "table", "metadata": {"rowCount": 10}}, {}],
            "edges": [{"from": "db.orders", "relationshipType": "joined"}]
        }"#;
        let payload: GraphPayload = serde_json::from_str(json).expect("decode payload");

        assert_eq!(payload.nodes.len(), 2);
        assert_eq!(payload.nodes[0].node_type.as_deref(), Some("table"));
        assert!(payload.nodes[1].urn.is_none());
        assert_eq!(payload.edges[0].to, None);
        assert_eq!(
            payload.edges[0].relationship_type.as_deref(),
            Some("joined")
        );
    }

    #[test]
    fn unknown_kinds_fall_back() {
        assert_eq!(NodeType::parse("TABLE"), NodeType::Table);
        assert_eq!(NodeType::parse("dashboard"), NodeType::Other);
        assert_eq!(RelationshipType::parse("mystery"), RelationshipType::Direct);
        assert_eq!(
            RelationshipType::parse("transforms_to"),
            RelationshipType::TransformsTo
        );
    }

    #[test]
    fn trace_evidence_decodes_camel_case() {
        let json = r#"{
            "edgeId": "e1",
            "coveragePct": 87.5,
            "evidenceSources": ["query_log"],
            "samples": [{"sourceRow": {"id": 1}, "targetRow": {"order_id": 1}}]
        }"#;
        let ev: TraceEvidence = serde_json::from_str(json).expect("decode trace");
        assert_eq!(ev.edge_id, "e1");
        assert_eq!(ev.coverage_pct, Some(87.5));
        assert_eq!(ev.samples.len(), 1);
        assert!(ev.window.is_none());
    }
}
