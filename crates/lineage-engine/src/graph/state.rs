use lineage_core::{LineageDirection, Urn};
use std::collections::HashSet;

use crate::graph::model::{GraphModel, LineageEdge};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeVisual {
    pub dimmed: bool,
    pub highlighted: bool,
    pub matched: bool,
    pub selected: bool,
    pub hovered: bool,
    pub impact_selected: bool,
    pub downstream: bool,
    pub pulse: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdgeVisual {
    pub dimmed: bool,
    pub highlighted: bool,
    pub downstream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightMode {
    Default,
    Search,
    Focus,
    Impact,
}

/// Selection, hover, search and impact state. `highlighted` and `downstream`
/// are derived from the rest and only change through `recompute`.
#[derive(Debug, Clone)]
pub struct InteractionState {
    selected: Option<Urn>,
    hovered: Option<Urn>,
    search_query: String,
    matched: HashSet<Urn>,
    search_hits: Vec<Urn>,
    search_hit_limit: usize,
    impact: Option<Urn>,
    pulse: Option<Urn>,

    highlighted: HashSet<Urn>,
    downstream: HashSet<Urn>,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self::new(30)
    }
}

impl InteractionState {
    pub fn new(search_hit_limit: usize) -> Self {
        Self {
            selected: None,
            hovered: None,
            search_query: String::new(),
            matched: HashSet::new(),
            search_hits: Vec::new(),
            search_hit_limit: search_hit_limit.max(1),
            impact: None,
            pulse: None,
            highlighted: HashSet::new(),
            downstream: HashSet::new(),
        }
    }

    pub fn selected(&self) -> Option<&Urn> {
        self.selected.as_ref()
    }

    pub fn hovered(&self) -> Option<&Urn> {
        self.hovered.as_ref()
    }

    pub fn impact(&self) -> Option<&Urn> {
        self.impact.as_ref()
    }

    pub fn pulse(&self) -> Option<&Urn> {
        self.pulse.as_ref()
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    pub fn search_active(&self) -> bool {
        !self.search_query.trim().is_empty()
    }

    /// Nodes passing the search filter; with no query this is every node of
    /// the last snapshot seen. A fresh state has seen none, so prefer
    /// `is_match` for filter checks.
    pub fn matched(&self) -> &HashSet<Urn> {
        &self.matched
    }

    /// True when no search is active, else whether `urn` matched the query.
    pub fn is_match(&self, urn: &Urn) -> bool {
        !self.search_active() || self.matched.contains(urn)
    }

    pub fn search_hits(&self) -> &[Urn] {
        &self.search_hits
    }

    pub fn highlighted(&self) -> &HashSet<Urn> {
        &self.highlighted
    }

    pub fn downstream(&self) -> &HashSet<Urn> {
        &self.downstream
    }

    pub fn mode(&self) -> HighlightMode {
        if self.impact.is_some() {
            HighlightMode::Impact
        } else if self.selected.is_some() || self.hovered.is_some() {
            HighlightMode::Focus
        } else if self.search_active() {
            HighlightMode::Search
        } else {
            HighlightMode::Default
        }
    }

    fn known(model: &GraphModel, urn: Option<Urn>) -> Option<Urn> {
        urn.filter(|u| model.contains(u))
    }

    /// Plain selection; leaves impact mode.
    pub fn select(&mut self, model: &GraphModel, urn: Option<Urn>) -> bool {
        let urn = Self::known(model, urn);
        let changed = self.selected != urn || self.impact.is_some();
        self.selected = urn;
        self.impact = None;
        if self.pulse != self.selected {
            self.pulse = None;
        }
        self.recompute(model);
        changed
    }

    /// Selects `urn` and enters impact mode on it.
    pub fn select_impact(&mut self, model: &GraphModel, urn: Urn) -> bool {
        let Some(urn) = Self::known(model, Some(urn)) else {
            return false;
        };
        let changed = self.selected.as_ref() != Some(&urn) || self.impact.as_ref() != Some(&urn);
        self.selected = Some(urn.clone());
        self.impact = Some(urn);
        self.recompute(model);
        changed
    }

    pub fn set_impact(&mut self, model: &GraphModel, urn: Option<Urn>) {
        self.impact = Self::known(model, urn);
        self.recompute(model);
    }

    pub fn hover(&mut self, model: &GraphModel, urn: Option<Urn>) -> bool {
        let urn = Self::known(model, urn);
        if self.hovered == urn {
            return false;
        }
        self.hovered = urn;
        self.recompute(model);
        true
    }

    /// Updates the query and match set. Returns the first hit, which callers
    /// jump to.
    pub fn set_search(&mut self, model: &GraphModel, query: &str) -> Option<Urn> {
        self.search_query = query.to_string();
        self.recompute_matches(model);
        self.pulse = self.search_hits.first().cloned();
        self.recompute(model);
        self.pulse.clone()
    }

    pub fn clear_search(&mut self, model: &GraphModel) {
        self.search_query.clear();
        self.recompute_matches(model);
        self.pulse = None;
        self.recompute(model);
    }

    /// The snapshot changed under us: references to old urns are dropped,
    /// the search query is re-evaluated against the new node set.
    pub fn reset_for_snapshot(&mut self, model: &GraphModel) {
        self.selected = None;
        self.hovered = None;
        self.impact = None;
        self.pulse = None;
        self.recompute_matches(model);
        self.recompute(model);
    }

    fn recompute_matches(&mut self, model: &GraphModel) {
        self.search_hits.clear();
        let q = self.search_query.trim().to_lowercase();
        if q.is_empty() {
            self.matched = model.nodes().iter().map(|n| n.urn.clone()).collect();
            return;
        }

        self.matched = model
            .nodes()
            .iter()
            .filter(|n| n.matches(&q))
            .map(|n| n.urn.clone())
            .collect();
        self.search_hits = model
            .nodes()
            .iter()
            .filter(|n| self.matched.contains(&n.urn))
            .take(self.search_hit_limit)
            .map(|n| n.urn.clone())
            .collect();
    }

    fn recompute(&mut self, model: &GraphModel) {
        self.highlighted.clear();
        for focus in [&self.selected, &self.hovered].into_iter().flatten() {
            self.highlighted.insert(focus.clone());
            self.highlighted
                .extend(model.neighbors(focus, LineageDirection::Both));
        }

        self.downstream = match &self.impact {
            Some(urn) => model.reachable(urn, LineageDirection::Downstream),
            None => HashSet::new(),
        };
    }

    pub fn node_visual(&self, urn: &Urn) -> NodeVisual {
        let mut v = NodeVisual {
            selected: self.selected.as_ref() == Some(urn),
            hovered: self.hovered.as_ref() == Some(urn),
            matched: self.search_active() && self.matched.contains(urn),
            pulse: self.pulse.as_ref() == Some(urn),
            ..Default::default()
        };

        if let Some(impact) = &self.impact {
            v.impact_selected = impact == urn;
            v.downstream = !v.impact_selected && self.downstream.contains(urn);
            v.dimmed = !v.impact_selected && !v.downstream;
            return v;
        }

        v.highlighted = self.highlighted.contains(urn);
        v.dimmed = !self.is_match(urn);
        v
    }

    pub fn edge_visual(&self, model: &GraphModel, edge: &LineageEdge) -> EdgeVisual {
        let (from, to) = model.edge_endpoints(edge);

        if let Some(impact) = &self.impact {
            let from_in = from == impact || self.downstream.contains(from);
            let downstream = from_in && self.downstream.contains(to);
            return EdgeVisual {
                dimmed: !downstream,
                highlighted: false,
                downstream,
            };
        }

        EdgeVisual {
            dimmed: !(self.is_match(from) && self.is_match(to)),
            highlighted: self.highlighted.contains(from) && self.highlighted.contains(to),
            downstream: false,
        }
    }
}
