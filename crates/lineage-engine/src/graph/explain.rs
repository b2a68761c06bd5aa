use std::collections::{HashMap, HashSet, VecDeque};

use lineage_core::{LineageDirection, RelationshipType, Urn};

use crate::graph::model::{EdgeIx, GraphModel, NodeIx};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    pub from: Urn,
    pub to: Urn,
    pub edge_id: String,
    pub relationship: RelationshipType,
}

/// Shortest chain of edges linking `a` to `b`. `Downstream` follows edge
/// direction, `Upstream` walks against it, `Both` ignores direction. Steps are
/// reported in edge orientation.
pub fn shortest_path(
    model: &GraphModel,
    a: &Urn,
    b: &Urn,
    max_depth: usize,
    direction: LineageDirection,
) -> Option<Vec<PathStep>> {
    if max_depth == 0 {
        return None;
    }
    let start = model.index_of(a)?;
    let end = model.index_of(b)?;
    if start == end {
        return Some(Vec::new());
    }

    let mut visited: HashSet<NodeIx> = HashSet::new();
    let mut prev: HashMap<NodeIx, (NodeIx, EdgeIx)> = HashMap::new();
    let mut q: VecDeque<(NodeIx, usize)> = VecDeque::new();
    visited.insert(start);
    q.push_back((start, 0));

    let follow_out = matches!(
        direction,
        LineageDirection::Downstream | LineageDirection::Both
    );
    let follow_in = matches!(direction, LineageDirection::Upstream | LineageDirection::Both);

    while let Some((cur, depth)) = q.pop_front() {
        if depth >= max_depth {
            continue;
        }
        let mut candidates: Vec<(NodeIx, EdgeIx)> = Vec::new();
        if follow_out {
            candidates.extend(
                model
                    .out_edge_ixs(cur)
                    .iter()
                    .map(|ex| (model.edges()[*ex].to, *ex)),
            );
        }
        if follow_in {
            candidates.extend(
                model
                    .in_edge_ixs(cur)
                    .iter()
                    .map(|ex| (model.edges()[*ex].from, *ex)),
            );
        }
        for (next, ex) in candidates {
            if !visited.insert(next) {
                continue;
            }
            prev.insert(next, (cur, ex));
            if next == end {
                return Some(reconstruct_path(model, &prev, start, end));
            }
            q.push_back((next, depth + 1));
        }
    }

    None
}

fn reconstruct_path(
    model: &GraphModel,
    prev: &HashMap<NodeIx, (NodeIx, EdgeIx)>,
    start: NodeIx,
    end: NodeIx,
) -> Vec<PathStep> {
    let mut steps = Vec::new();
    let mut cur = end;
    while cur != start {
        let Some(&(p, ex)) = prev.get(&cur) else {
            break;
        };
        let edge = &model.edges()[ex];
        let (from, to) = model.edge_endpoints(edge);
        steps.push(PathStep {
            from: from.clone(),
            to: to.clone(),
            edge_id: edge.id.clone(),
            relationship: edge.relationship,
        });
        cur = p;
    }
    steps.reverse();
    steps
}
