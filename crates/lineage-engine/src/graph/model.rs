use lineage_core::{
    GraphPayload, LineageDirection, NodeType, RawEdge, RawNode, RelationshipType, Urn,
};
use serde_json::Value;
use smallvec::SmallVec;
use std::collections::{BTreeMap, HashMap, HashSet};

pub type NodeIx = usize;
pub type EdgeIx = usize;

/// Type-specific node data the engine actually interprets.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Source,
    Database,
    Schema,
    Table { row_count: Option<u64> },
    View { row_count: Option<u64> },
    Column { table: Option<Urn>, data_type: Option<String> },
    Process,
    Transformation,
    Sink,
    Other,
}

impl NodeKind {
    fn from_raw(node_type: NodeType, metadata: &BTreeMap<String, Value>) -> Self {
        let row_count = || metadata.get("rowCount").and_then(Value::as_u64);
        match node_type {
            NodeType::Source => Self::Source,
            NodeType::Database => Self::Database,
            NodeType::Schema => Self::Schema,
            NodeType::Table => Self::Table {
                row_count: row_count(),
            },
            NodeType::View => Self::View {
                row_count: row_count(),
            },
            NodeType::Column => Self::Column {
                table: metadata
                    .get("table")
                    .and_then(Value::as_str)
                    .map(Urn::from),
                data_type: metadata
                    .get("dataType")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            NodeType::Process => Self::Process,
            NodeType::Transformation => Self::Transformation,
            NodeType::Sink => Self::Sink,
            NodeType::Other => Self::Other,
        }
    }

    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Source => NodeType::Source,
            Self::Database => NodeType::Database,
            Self::Schema => NodeType::Schema,
            Self::Table { .. } => NodeType::Table,
            Self::View { .. } => NodeType::View,
            Self::Column { .. } => NodeType::Column,
            Self::Process => NodeType::Process,
            Self::Transformation => NodeType::Transformation,
            Self::Sink => NodeType::Sink,
            Self::Other => NodeType::Other,
        }
    }

    pub fn row_count(&self) -> Option<u64> {
        match self {
            Self::Table { row_count } | Self::View { row_count } => *row_count,
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineageNode {
    pub urn: Urn,
    pub label: String,
    pub kind: NodeKind,
    pub layer: Option<u32>,
    pub confidence: Option<f32>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub metadata: BTreeMap<String, Value>,
}

impl LineageNode {
    pub fn matches(&self, needle_lower: &str) -> bool {
        if self.urn.0.to_lowercase().contains(needle_lower)
            || self.label.to_lowercase().contains(needle_lower)
        {
            return true;
        }
        if let Some(desc) = &self.description {
            if desc.to_lowercase().contains(needle_lower) {
                return true;
            }
        }
        self.tags
            .iter()
            .any(|t| t.to_lowercase().contains(needle_lower))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineageEdge {
    pub id: String,
    pub from: NodeIx,
    pub to: NodeIx,
    pub relationship: RelationshipType,
    pub confidence: Option<f32>,
    pub metadata: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub dropped_nodes: usize,
    pub duplicate_nodes: usize,
    pub dropped_edges: usize,
    pub duplicate_edges: usize,
}

/// Normalized lineage snapshot. Nodes live in an arena in first-appearance
/// order; edges refer to them by index.
#[derive(Debug, Clone, Default)]
pub struct GraphModel {
    nodes: Vec<LineageNode>,
    edges: Vec<LineageEdge>,
    index: HashMap<Urn, NodeIx>,
    outgoing: Vec<SmallVec<[EdgeIx; 4]>>,
    incoming: Vec<SmallVec<[EdgeIx; 4]>>,
}

fn clamp_confidence(c: Option<f64>) -> Option<f32> {
    c.filter(|v| v.is_finite()).map(|v| v.clamp(0.0, 1.0) as f32)
}

fn non_blank(s: Option<&String>) -> Option<&str> {
    s.map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn lift_node(raw: &RawNode, urn: &str) -> LineageNode {
    let metadata: BTreeMap<String, Value> = raw
        .metadata
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let node_type = raw
        .node_type
        .as_deref()
        .map(NodeType::parse)
        .unwrap_or(NodeType::Other);
    let description = metadata
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string);
    let tags = metadata
        .get("tags")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    LineageNode {
        urn: Urn::new(urn),
        label: non_blank(raw.label.as_ref())
            .map(str::to_string)
            .unwrap_or_else(|| urn.to_string()),
        kind: NodeKind::from_raw(node_type, &metadata),
        layer: raw
            .layer
            .filter(|l| *l >= 0)
            .map(|l| l.min(u32::MAX as i64) as u32),
        confidence: clamp_confidence(raw.confidence),
        description,
        tags,
        metadata,
    }
}

pub fn normalize(raw_nodes: &[RawNode], raw_edges: &[RawEdge]) -> (GraphModel, NormalizeReport) {
    let mut report = NormalizeReport::default();
    let mut model = GraphModel::default();

    for raw in raw_nodes {
        let Some(urn) = non_blank(raw.urn.as_ref()) else {
            report.dropped_nodes += 1;
            continue;
        };
        let node = lift_node(raw, urn);
        match model.index.get(&node.urn) {
            Some(&ix) => {
                // last write wins, first position kept
                report.duplicate_nodes += 1;
                model.nodes[ix] = node;
            }
            None => {
                model.index.insert(node.urn.clone(), model.nodes.len());
                model.nodes.push(node);
            }
        }
    }

    model.outgoing = vec![SmallVec::new(); model.nodes.len()];
    model.incoming = vec![SmallVec::new(); model.nodes.len()];

    let mut edge_ids: HashMap<String, EdgeIx> = HashMap::new();
    for raw in raw_edges {
        let (Some(from), Some(to)) = (non_blank(raw.from.as_ref()), non_blank(raw.to.as_ref()))
        else {
            report.dropped_edges += 1;
            continue;
        };
        let (Some(&from_ix), Some(&to_ix)) = (
            model.index.get(&Urn::new(from)),
            model.index.get(&Urn::new(to)),
        ) else {
            report.dropped_edges += 1;
            continue;
        };

        let id = non_blank(raw.id.as_ref())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{from}->{to}"));
        let edge = LineageEdge {
            id: id.clone(),
            from: from_ix,
            to: to_ix,
            relationship: raw
                .relationship_type
                .as_deref()
                .map(RelationshipType::parse)
                .unwrap_or_default(),
            confidence: clamp_confidence(raw.confidence),
            metadata: raw
                .metadata
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        };

        match edge_ids.get(&id) {
            Some(&ex) => {
                report.duplicate_edges += 1;
                let old = std::mem::replace(&mut model.edges[ex], edge);
                if old.from != from_ix || old.to != to_ix {
                    model.outgoing[old.from].retain(|e| *e != ex);
                    model.incoming[old.to].retain(|e| *e != ex);
                    model.outgoing[from_ix].push(ex);
                    model.incoming[to_ix].push(ex);
                }
            }
            None => {
                let ex = model.edges.len();
                edge_ids.insert(id, ex);
                model.outgoing[from_ix].push(ex);
                model.incoming[to_ix].push(ex);
                model.edges.push(edge);
            }
        }
    }

    if report != NormalizeReport::default() {
        tracing::debug!(
            dropped_nodes = report.dropped_nodes,
            duplicate_nodes = report.duplicate_nodes,
            dropped_edges = report.dropped_edges,
            duplicate_edges = report.duplicate_edges,
            "normalized lineage payload"
        );
    }

    (model, report)
}

impl GraphModel {
    pub fn from_payload(payload: &GraphPayload) -> (Self, NormalizeReport) {
        normalize(&payload.nodes, &payload.edges)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[LineageNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[LineageEdge] {
        &self.edges
    }

    pub fn node(&self, ix: NodeIx) -> &LineageNode {
        &self.nodes[ix]
    }

    pub fn index_of(&self, urn: &Urn) -> Option<NodeIx> {
        self.index.get(urn).copied()
    }

    pub fn get(&self, urn: &Urn) -> Option<&LineageNode> {
        self.index_of(urn).map(|ix| &self.nodes[ix])
    }

    pub fn contains(&self, urn: &Urn) -> bool {
        self.index.contains_key(urn)
    }

    pub fn edge_by_id(&self, id: &str) -> Option<&LineageEdge> {
        self.edges.iter().find(|e| e.id == id)
    }

    pub fn edge_endpoints(&self, e: &LineageEdge) -> (&Urn, &Urn) {
        (&self.nodes[e.from].urn, &self.nodes[e.to].urn)
    }

    pub fn outgoing(&self, ix: NodeIx) -> impl Iterator<Item = &LineageEdge> + '_ {
        self.outgoing[ix].iter().map(move |e| &self.edges[*e])
    }

    pub fn incoming(&self, ix: NodeIx) -> impl Iterator<Item = &LineageEdge> + '_ {
        self.incoming[ix].iter().map(move |e| &self.edges[*e])
    }

    pub(crate) fn out_edge_ixs(&self, ix: NodeIx) -> &[EdgeIx] {
        &self.outgoing[ix]
    }

    pub(crate) fn in_edge_ixs(&self, ix: NodeIx) -> &[EdgeIx] {
        &self.incoming[ix]
    }

    pub(crate) fn neighbor_ixs(&self, ix: NodeIx, direction: LineageDirection) -> Vec<NodeIx> {
        let mut seen: HashSet<NodeIx> = HashSet::new();
        let mut out = Vec::new();
        if matches!(
            direction,
            LineageDirection::Downstream | LineageDirection::Both
        ) {
            for e in self.outgoing(ix) {
                if seen.insert(e.to) {
                    out.push(e.to);
                }
            }
        }
        if matches!(direction, LineageDirection::Upstream | LineageDirection::Both) {
            for e in self.incoming(ix) {
                if seen.insert(e.from) {
                    out.push(e.from);
                }
            }
        }
        out
    }

    /// Direct neighbors of `urn`, ordered by edge insertion. `Both` lists
    /// downstream before upstream. Unknown urns have no neighbors.
    pub fn neighbors(&self, urn: &Urn, direction: LineageDirection) -> Vec<Urn> {
        let Some(ix) = self.index_of(urn) else {
            return Vec::new();
        };
        self.neighbor_ixs(ix, direction)
            .into_iter()
            .map(|n| self.nodes[n].urn.clone())
            .collect()
    }

    /// Every node reachable from `urn` following edges in `direction`,
    /// excluding `urn` itself.
    pub fn reachable(&self, urn: &Urn, direction: LineageDirection) -> HashSet<Urn> {
        let Some(start) = self.index_of(urn) else {
            return HashSet::new();
        };
        let mut visited: HashSet<NodeIx> = HashSet::from([start]);
        let mut q = std::collections::VecDeque::from([start]);
        while let Some(cur) = q.pop_front() {
            for nb in self.neighbor_ixs(cur, direction) {
                if visited.insert(nb) {
                    q.push_back(nb);
                }
            }
        }
        visited.remove(&start);
        visited
            .into_iter()
            .map(|ix| self.nodes[ix].urn.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn drops_dangling_and_malformed_records() {
        let nodes = vec![
            RawNode::new("a"),
            RawNode::default(),
            RawNode::new("  "),
            RawNode::new("b"),
        ];
        let edges = vec![
            RawEdge::new("a", "b"),
            RawEdge::new("a", "ghost"),
            RawEdge {
                from: Some("a".to_string()),
                ..Default::default()
            },
        ];

        let (model, report) = normalize(&nodes, &edges);

        assert_eq!(model.len(), 2);
        assert_eq!(model.edges().len(), 1);
        assert_eq!(report.dropped_nodes, 2);
        assert_eq!(report.dropped_edges, 2);
        for e in model.edges() {
            let (from, to) = model.edge_endpoints(e);
            assert!(model.contains(from) && model.contains(to));
        }
    }

    #[test]
    fn duplicate_urns_are_last_write_wins_in_first_position() {
        let nodes = vec![
            RawNode::new("a").with_label("first"),
            RawNode::new("b"),
            RawNode::new("a").with_label("second"),
        ];
        let (model, report) = normalize(&nodes, &[]);

        assert_eq!(report.duplicate_nodes, 1);
        assert_eq!(model.nodes()[0].urn, Urn::from("a"));
        assert_eq!(model.nodes()[0].label, "second");
        assert_eq!(model.nodes()[1].urn, Urn::from("b"));
    }

    #[test]
    fn normalize_does_not_mutate_inputs() {
        let nodes = vec![RawNode::new("a"), RawNode::new("a")];
        let edges = vec![RawEdge::new("a", "zzz")];
        let before = (nodes.clone(), edges.clone());

        let _ = normalize(&nodes, &edges);

        assert_eq!(before, (nodes, edges));
    }

    #[test]
    fn lifts_typed_fields_out_of_metadata() {
        let mut raw = RawNode::new("db.orders").with_type("table").with_layer(-3);
        raw.confidence = Some(1.7);
        raw.metadata.insert("rowCount".to_string(), json!(42));
        raw.metadata
            .insert("tags".to_string(), json!(["pii", "finance"]));
        raw.metadata
            .insert("description".to_string(), json!("All orders"));

        let (model, _) = normalize(&[raw], &[]);
        let node = &model.nodes()[0];

        assert_eq!(node.kind, NodeKind::Table { row_count: Some(42) });
        assert_eq!(node.layer, None);
        assert_eq!(node.confidence, Some(1.0));
        assert_eq!(node.label, "db.orders");
        assert!(node.matches("finance"));
        assert!(node.matches("all ord"));
    }

    #[test]
    fn neighbors_are_ordered_and_deduplicated() {
        let nodes: Vec<RawNode> = ["a", "b", "c", "d"].iter().map(|u| RawNode::new(u)).collect();
        let edges = vec![
            RawEdge::new("a", "c"),
            RawEdge::new("a", "b"),
            RawEdge::new("d", "a"),
            RawEdge::new("a", "c").with_id("second-a-c"),
            RawEdge::new("b", "a"),
        ];
        let (model, _) = normalize(&nodes, &edges);
        let a = Urn::from("a");

        assert_eq!(
            model.neighbors(&a, LineageDirection::Downstream),
            vec![Urn::from("c"), Urn::from("b")]
        );
        assert_eq!(
            model.neighbors(&a, LineageDirection::Upstream),
            vec![Urn::from("d"), Urn::from("b")]
        );
        assert_eq!(
            model.neighbors(&a, LineageDirection::Both),
            vec![Urn::from("c"), Urn::from("b"), Urn::from("d")]
        );
        assert!(model
            .neighbors(&Urn::from("nope"), LineageDirection::Both)
            .is_empty());
    }

    #[test]
    fn duplicate_edge_ids_replace_earlier_edge() {
        let nodes: Vec<RawNode> = ["a", "b", "c"].iter().map(|u| RawNode::new(u)).collect();
        let edges = vec![
            RawEdge::new("a", "b").with_id("e1"),
            RawEdge::new("a", "c").with_id("e1"),
        ];
        let (model, report) = normalize(&nodes, &edges);

        assert_eq!(report.duplicate_edges, 1);
        assert_eq!(model.edges().len(), 1);
        assert_eq!(
            model.neighbors(&Urn::from("a"), LineageDirection::Downstream),
            vec![Urn::from("c")]
        );
        assert!(model
            .neighbors(&Urn::from("b"), LineageDirection::Upstream)
            .is_empty());
    }

    #[test]
    fn reachable_follows_cycles_without_looping() {
        let nodes: Vec<RawNode> = ["a", "b", "c"].iter().map(|u| RawNode::new(u)).collect();
        let edges = vec![
            RawEdge::new("a", "b"),
            RawEdge::new("b", "c"),
            RawEdge::new("c", "a"),
        ];
        let (model, _) = normalize(&nodes, &edges);
        let r = model.reachable(&Urn::from("a"), LineageDirection::Downstream);
        assert_eq!(r, HashSet::from([Urn::from("b"), Urn::from("c")]));
    }
}
