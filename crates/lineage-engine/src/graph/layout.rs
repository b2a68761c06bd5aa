use glam::Vec2;
use lineage_core::Urn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::graph::model::{GraphModel, NodeIx};

pub const LANE_SPACING: f32 = 240.0;
pub const NODE_SPACING: f32 = 96.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum LayoutDirection {
    #[default]
    #[serde(rename = "TB")]
    TopBottom,
    #[serde(rename = "LR")]
    LeftRight,
}

impl LayoutDirection {
    pub fn parse(input: &str) -> anyhow::Result<Self> {
        match input.trim().to_ascii_uppercase().as_str() {
            "TB" => Ok(Self::TopBottom),
            "LR" => Ok(Self::LeftRight),
            _ => anyhow::bail!("invalid direction: {input} (expected TB|LR)"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TopBottom => "TB",
            Self::LeftRight => "LR",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    pub lane_spacing: f32,
    pub node_spacing: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            lane_spacing: LANE_SPACING,
            node_spacing: NODE_SPACING,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 && self.height() <= 0.0
    }

    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec2>, pad: f32) -> Self {
        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(f32::NEG_INFINITY);
        for p in points {
            min = min.min(*p);
            max = max.max(*p);
        }
        if !min.x.is_finite() {
            return Self::default();
        }
        Self::new(min - Vec2::splat(pad), max + Vec2::splat(pad))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub direction: LayoutDirection,
    pub positions: HashMap<Urn, Vec2>,
    pub ranks: HashMap<Urn, u32>,
    pub bounds: Bounds,
}

impl Layout {
    pub fn position(&self, urn: &Urn) -> Option<Vec2> {
        self.positions.get(urn).copied()
    }

    pub fn rank(&self, urn: &Urn) -> Option<u32> {
        self.ranks.get(urn).copied()
    }
}

const UNVISITED: u8 = 0;
const ON_STACK: u8 = 1;
const DONE: u8 = 2;

/// Rank per node index. An explicit `layer` wins; otherwise the rank is the
/// longest path from a source, ignoring predecessors that are still on the
/// DFS stack (back-edges of a cycle).
pub fn compute_ranks(model: &GraphModel) -> Vec<u32> {
    let n = model.len();
    let mut state = vec![UNVISITED; n];
    let mut best = vec![0u32; n];
    let mut rank = vec![0u32; n];
    let mut back_edges = 0usize;

    let preds: Vec<Vec<NodeIx>> = (0..n)
        .map(|ix| model.incoming(ix).map(|e| e.from).collect())
        .collect();

    for root in 0..n {
        if state[root] != UNVISITED {
            continue;
        }
        let mut stack: Vec<(NodeIx, usize)> = vec![(root, 0)];
        state[root] = ON_STACK;

        while let Some(top) = stack.last_mut() {
            let cur = top.0;
            if let Some(&p) = preds[cur].get(top.1) {
                top.1 += 1;
                match state[p] {
                    DONE => best[cur] = best[cur].max(rank[p].saturating_add(1)),
                    ON_STACK => back_edges += 1,
                    _ => {
                        state[p] = ON_STACK;
                        stack.push((p, 0));
                    }
                }
                continue;
            }
            stack.pop();
            rank[cur] = model.node(cur).layer.unwrap_or(best[cur]);
            state[cur] = DONE;
        }
    }

    if back_edges > 0 {
        tracing::debug!(back_edges, "ignored cyclic edges while ranking");
    }
    rank
}

/// Layered placement: primary axis by rank, cross axis by first appearance
/// within the rank, each rank centred on the cross axis.
pub fn layout(model: &GraphModel, direction: LayoutDirection, cfg: &LayoutConfig) -> Layout {
    let ranks = compute_ranks(model);

    let mut by_rank: HashMap<u32, Vec<NodeIx>> = HashMap::new();
    for (ix, r) in ranks.iter().enumerate() {
        by_rank.entry(*r).or_default().push(ix);
    }

    let mut positions: HashMap<Urn, Vec2> = HashMap::with_capacity(model.len());
    for (r, members) in by_rank.iter() {
        let primary = *r as f32 * cfg.lane_spacing;
        let centring = (members.len() as f32 - 1.0) * cfg.node_spacing * 0.5;
        for (i, ix) in members.iter().enumerate() {
            let cross = i as f32 * cfg.node_spacing - centring;
            let p = match direction {
                LayoutDirection::TopBottom => Vec2::new(cross, primary),
                LayoutDirection::LeftRight => Vec2::new(primary, cross),
            };
            positions.insert(model.node(*ix).urn.clone(), p);
        }
    }

    let bounds = Bounds::from_points(positions.values(), cfg.node_spacing * 0.5);
    let ranks = ranks
        .into_iter()
        .enumerate()
        .map(|(ix, r)| (model.node(ix).urn.clone(), r))
        .collect();

    Layout {
        direction,
        positions,
        ranks,
        bounds,
    }
}
