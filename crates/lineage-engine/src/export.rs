use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;

use crate::graph::layout::{Layout, LayoutDirection};
use crate::graph::model::GraphModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Dot,
}

impl ExportFormat {
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "dot" | "graphviz" => Ok(Self::Dot),
            _ => anyhow::bail!("invalid export format: {input} (expected json|dot)"),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Dot => "dot",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Dot => "text/vnd.graphviz",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedNode<'a> {
    urn: &'a str,
    label: &'a str,
    #[serde(rename = "type")]
    node_type: &'static str,
    rank: u32,
    x: f32,
    y: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    row_count: Option<u64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedEdge<'a> {
    id: &'a str,
    from: &'a str,
    to: &'a str,
    relationship_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    confidence: Option<f32>,
}

#[derive(Serialize)]
struct ExportedGraph<'a> {
    direction: &'static str,
    nodes: Vec<ExportedNode<'a>>,
    edges: Vec<ExportedEdge<'a>>,
}

pub fn render(model: &GraphModel, layout: &Layout, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => to_json(model, layout),
        ExportFormat::Dot => Ok(to_dot(model, layout.direction)),
    }
}

fn to_json(model: &GraphModel, layout: &Layout) -> Result<String> {
    let nodes = model
        .nodes()
        .iter()
        .map(|n| {
            let pos = layout.position(&n.urn).unwrap_or_default();
            ExportedNode {
                urn: n.urn.as_str(),
                label: &n.label,
                node_type: n.kind.node_type().as_str(),
                rank: layout.rank(&n.urn).unwrap_or(0),
                x: pos.x,
                y: pos.y,
                row_count: n.kind.row_count(),
            }
        })
        .collect();
    let edges = model
        .edges()
        .iter()
        .map(|e| {
            let (from, to) = model.edge_endpoints(e);
            ExportedEdge {
                id: &e.id,
                from: from.as_str(),
                to: to.as_str(),
                relationship_type: e.relationship.as_str(),
                confidence: e.confidence,
            }
        })
        .collect();

    let graph = ExportedGraph {
        direction: layout.direction.as_str(),
        nodes,
        edges,
    };
    serde_json::to_string_pretty(&graph).context("serialize lineage export")
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

fn to_dot(model: &GraphModel, direction: LayoutDirection) -> String {
    let mut out = String::new();
    // String formatting cannot fail
    let _ = writeln!(out, "digraph lineage {{");
    let _ = writeln!(out, "    rankdir=\"{}\";", direction.as_str());
    let _ = writeln!(out, "    node [ shape=\"box\" style=\"rounded\" ];");
    for n in model.nodes() {
        let _ = writeln!(
            out,
            "    {} [ label={} ];",
            quote(n.urn.as_str()),
            quote(&n.label)
        );
    }
    for e in model.edges() {
        let (from, to) = model.edge_endpoints(e);
        let _ = writeln!(
            out,
            "    {} -> {} [ label={} ];",
            quote(from.as_str()),
            quote(to.as_str()),
            quote(e.relationship.as_str())
        );
    }
    out.push_str("}\n");
    out
}
