use anyhow::Result;
use glam::Vec2;
use lineage_core::{GraphPayload, LineageDirection, TraceEvidence, Urn};
use std::time::Duration;

use crate::export::{self, ExportFormat};
use crate::graph::explain::{shortest_path, PathStep};
use crate::graph::layout::{layout, Layout, LayoutConfig, LayoutDirection};
use crate::graph::model::{normalize, GraphModel, LineageEdge, LineageNode, NormalizeReport};
use crate::graph::state::{EdgeVisual, InteractionState, NodeVisual};
use crate::query::{LineageQueries, QueryData, QueryError, QueryKey, QueryStatus, RequestOutcome};
use crate::view::minimap::{MinimapConfig, MinimapProjection, Rect};
use crate::view::viewport::{GestureOutcome, HitTarget, ViewTransform, Viewport, ViewportConfig};

/// Query parameters used when the view issues its own requests.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryScope {
    pub scope: String,
    pub data_source_id: Option<String>,
    pub summary_limit: u32,
    pub drill_depth: u32,
    pub drill_direction: LineageDirection,
    pub drill_limit: u32,
    pub impact_radius: u32,
    pub impact_limit: u32,
}

impl Default for QueryScope {
    fn default() -> Self {
        Self {
            scope: "default".to_string(),
            data_source_id: None,
            summary_limit: 500,
            drill_depth: 2,
            drill_direction: LineageDirection::Both,
            drill_limit: 200,
            impact_radius: 3,
            impact_limit: 500,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewOptions {
    pub direction: LayoutDirection,
    pub layout: LayoutConfig,
    pub viewport: ViewportConfig,
    pub minimap: MinimapConfig,
    pub search_hit_limit: usize,
    /// Screen-space pick radius in pixels.
    pub pick_radius: f32,
    pub path_max_depth: usize,
    pub viewport_size: Vec2,
    pub queries: QueryScope,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::TopBottom,
            layout: LayoutConfig::default(),
            viewport: ViewportConfig::default(),
            minimap: MinimapConfig::default(),
            search_hit_limit: 30,
            pick_radius: 18.0,
            path_max_depth: 12,
            viewport_size: Vec2::new(1280.0, 720.0),
            queries: QueryScope::default(),
        }
    }
}

pub struct NodeView<'a> {
    pub node: &'a LineageNode,
    pub position: Vec2,
    pub visual: NodeVisual,
}

pub struct EdgeView<'a> {
    pub edge: &'a LineageEdge,
    pub from: Vec2,
    pub to: Vec2,
    pub visual: EdgeVisual,
}

type NodeSelectHook = Box<dyn FnMut(Option<&LineageNode>)>;
type ExportHook = Box<dyn FnMut(ExportFormat, &str)>;

/// Owns the displayed snapshot and everything derived from it. All mutation
/// happens through these methods on the caller's thread; only the query layer
/// does work elsewhere, and its results are folded in by `pump`.
pub struct LineageView {
    opts: ViewOptions,
    model: GraphModel,
    layout: Layout,
    report: NormalizeReport,
    viewport: Viewport,
    viewport_size: Vec2,
    interaction: InteractionState,
    queries: LineageQueries,
    active: Option<QueryKey>,
    controls: Vec<Rect>,
    on_node_select: Option<NodeSelectHook>,
    on_export: Option<ExportHook>,
}

impl LineageView {
    pub fn new(queries: LineageQueries, opts: ViewOptions) -> Self {
        Self {
            model: GraphModel::default(),
            layout: Layout {
                direction: opts.direction,
                ..Default::default()
            },
            report: NormalizeReport::default(),
            viewport: Viewport::new(opts.viewport),
            viewport_size: opts.viewport_size,
            interaction: InteractionState::new(opts.search_hit_limit),
            queries,
            active: None,
            controls: Vec::new(),
            on_node_select: None,
            on_export: None,
            opts,
        }
    }

    pub fn on_node_select(&mut self, f: impl FnMut(Option<&LineageNode>) + 'static) {
        self.on_node_select = Some(Box::new(f));
    }

    pub fn on_export(&mut self, f: impl FnMut(ExportFormat, &str) + 'static) {
        self.on_export = Some(Box::new(f));
    }

    pub fn options(&self) -> &ViewOptions {
        &self.opts
    }

    pub fn model(&self) -> &GraphModel {
        &self.model
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn last_report(&self) -> &NormalizeReport {
        &self.report
    }

    pub fn transform(&self) -> ViewTransform {
        self.viewport.transform()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_size(&self) -> Vec2 {
        self.viewport_size
    }

    pub fn interaction(&self) -> &InteractionState {
        &self.interaction
    }

    pub fn queries(&self) -> &LineageQueries {
        &self.queries
    }

    // ----- Queries -----

    pub fn active_key(&self) -> Option<&QueryKey> {
        self.active.as_ref()
    }

    pub fn active_status(&self) -> QueryStatus {
        self.active
            .as_ref()
            .map(|k| self.queries.status(k))
            .unwrap_or_default()
    }

    pub fn active_error(&self) -> Option<&QueryError> {
        let key = self.active.as_ref()?;
        self.queries.entry(key)?.error.as_ref()
    }

    pub fn load_summary(&mut self) -> RequestOutcome {
        let q = &self.opts.queries;
        let key = QueryKey::summary(&q.scope, q.data_source_id.as_deref(), q.summary_limit);
        self.show(key)
    }

    pub fn drill(&mut self, urn: Urn) -> RequestOutcome {
        let q = &self.opts.queries;
        let key = QueryKey::drill(urn, q.drill_depth, q.drill_direction, q.drill_limit);
        self.show(key)
    }

    pub fn drill_with(
        &mut self,
        urn: Urn,
        depth: u32,
        direction: LineageDirection,
    ) -> RequestOutcome {
        let key = QueryKey::drill(urn, depth, direction, self.opts.queries.drill_limit);
        self.show(key)
    }

    pub fn show_impacts(&mut self, urn: Urn) -> RequestOutcome {
        let q = &self.opts.queries;
        let key = QueryKey::impacts(urn, q.impact_radius, q.impact_limit);
        self.show(key)
    }

    pub fn show_provenance(&mut self, urn: Urn) -> RequestOutcome {
        self.show(QueryKey::provenance(urn))
    }

    /// Makes `key` the displayed graph. A cached result is applied at once.
    pub fn show(&mut self, key: QueryKey) -> RequestOutcome {
        let outcome = self.queries.request(key.clone());
        if outcome == RequestOutcome::Disabled {
            return outcome;
        }
        self.active = Some(key);
        if outcome == RequestOutcome::Cached {
            self.apply_active();
        }
        outcome
    }

    /// Fetches row-level evidence for an edge. Does not touch the snapshot.
    pub fn request_trace(&mut self, edge_id: &str) -> RequestOutcome {
        self.queries.request(QueryKey::trace(edge_id))
    }

    pub fn trace(&self, edge_id: &str) -> Option<&TraceEvidence> {
        self.queries
            .data(&QueryKey::trace(edge_id))
            .and_then(QueryData::trace)
    }

    pub fn trace_status(&self, edge_id: &str) -> QueryStatus {
        self.queries.status(&QueryKey::trace(edge_id))
    }

    /// Applies finished queries. Returns true when the snapshot was replaced.
    pub fn pump(&mut self) -> bool {
        let changed = self.queries.pump();
        self.absorb(changed)
    }

    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let changed = self.queries.wait_idle(timeout);
        self.absorb(changed)
    }

    fn absorb(&mut self, changed: Vec<QueryKey>) -> bool {
        let hit = self
            .active
            .as_ref()
            .is_some_and(|k| changed.contains(k));
        hit && self.apply_active()
    }

    fn apply_active(&mut self) -> bool {
        let Some(key) = self.active.clone() else {
            return false;
        };
        let Some(entry) = self.queries.entry(&key) else {
            return false;
        };
        if entry.status != QueryStatus::Success {
            // last-known-good snapshot stays on screen
            return false;
        }
        let Some(QueryData::Graph(payload)) = entry.data.clone() else {
            return false;
        };

        self.replace_snapshot(&payload);
        if let QueryKey::Impacts { urn, .. } = &key {
            self.enter_impact_mode(urn.clone());
        }
        true
    }

    /// Swaps in a new node set: relayout, reset the viewport and every
    /// reference to urns of the previous snapshot.
    pub fn replace_snapshot(&mut self, payload: &GraphPayload) -> NormalizeReport {
        let had_selection = self.interaction.selected().is_some();
        let (model, report) = normalize(&payload.nodes, &payload.edges);
        self.model = model;
        self.report = report.clone();
        self.layout = layout(&self.model, self.opts.direction, &self.opts.layout);
        self.interaction.reset_for_snapshot(&self.model);
        self.viewport.reset();
        self.fit_to_view();

        tracing::info!(
            nodes = self.model.len(),
            edges = self.model.edges().len(),
            direction = self.opts.direction.as_str(),
            "lineage snapshot applied"
        );
        if had_selection {
            self.notify_selection();
        }
        report
    }

    /// Drops every cached result and refetches the displayed graph.
    pub fn invalidate_queries(&mut self) -> Option<RequestOutcome> {
        self.queries.invalidate_all();
        let key = self.active.clone()?;
        Some(self.queries.request(key))
    }

    // ----- Layout and viewport -----

    pub fn set_direction(&mut self, direction: LayoutDirection) {
        if self.opts.direction == direction {
            return;
        }
        self.opts.direction = direction;
        self.layout = layout(&self.model, direction, &self.opts.layout);
        self.fit_to_view();
    }

    pub fn set_viewport_size(&mut self, size: Vec2) {
        self.viewport_size = size.max(Vec2::ONE);
    }

    pub fn fit_to_view(&mut self) {
        if self.model.is_empty() {
            self.viewport.reset();
            return;
        }
        let padding = self.viewport.cfg.fit_padding;
        self.viewport
            .fit_to_bounds(self.layout.bounds, self.viewport_size, padding);
    }

    pub fn jump_to(&mut self, urn: &Urn) -> bool {
        let Some(pos) = self.layout.position(urn) else {
            return false;
        };
        self.viewport.jump_to(pos, self.viewport_size);
        true
    }

    // ----- Interaction -----

    /// Returns the first hit, which the viewport jumps to.
    pub fn search(&mut self, query: &str) -> Option<Urn> {
        let first = self.interaction.set_search(&self.model, query)?;
        self.jump_to(&first);
        Some(first)
    }

    pub fn clear_search(&mut self) {
        self.interaction.clear_search(&self.model);
    }

    pub fn select(&mut self, urn: Option<Urn>) -> bool {
        let before = self.interaction.selected().cloned();
        self.interaction.select(&self.model, urn);
        let changed = self.interaction.selected() != before.as_ref();
        if changed {
            self.notify_selection();
        }
        changed
    }

    pub fn hover(&mut self, urn: Option<Urn>) -> bool {
        self.interaction.hover(&self.model, urn)
    }

    pub fn enter_impact_mode(&mut self, urn: Urn) -> bool {
        let before = self.interaction.selected().cloned();
        if !self.interaction.select_impact(&self.model, urn) {
            return false;
        }
        if self.interaction.selected() != before.as_ref() {
            self.notify_selection();
        }
        true
    }

    pub fn exit_impact_mode(&mut self) {
        self.interaction.set_impact(&self.model, None);
    }

    fn notify_selection(&mut self) {
        let node = self.interaction.selected().and_then(|u| self.model.get(u));
        if let Some(hook) = self.on_node_select.as_mut() {
            hook(node);
        }
    }

    /// "Why is `to` downstream of `from`", as a chain of edges.
    pub fn explain_path(&self, from: &Urn, to: &Urn) -> Option<Vec<PathStep>> {
        shortest_path(
            &self.model,
            from,
            to,
            self.opts.path_max_depth,
            LineageDirection::Downstream,
        )
    }

    /// Nearest node within the pick radius of a screen point.
    pub fn node_at(&self, screen: Vec2) -> Option<Urn> {
        let t = self.viewport.transform();
        let mut best: Option<(f32, &Urn)> = None;
        for n in self.model.nodes() {
            let Some(pos) = self.layout.position(&n.urn) else {
                continue;
            };
            let d = t.to_screen(pos).distance(screen);
            if d <= self.opts.pick_radius && best.map(|(bd, _)| d < bd).unwrap_or(true) {
                best = Some((d, &n.urn));
            }
        }
        best.map(|(_, urn)| urn.clone())
    }

    // ----- Gestures -----

    /// Screen rectangles owned by host controls; presses there never pan.
    pub fn set_control_regions(&mut self, regions: Vec<Rect>) {
        self.controls = regions;
    }

    pub fn minimap_frame(&self) -> Rect {
        self.opts.minimap.frame(self.viewport_size)
    }

    pub fn hit_target(&self, screen: Vec2) -> HitTarget {
        if self.controls.iter().any(|r| r.contains(screen)) {
            HitTarget::Control
        } else if !self.model.is_empty() && self.minimap_frame().contains(screen) {
            HitTarget::Minimap
        } else {
            HitTarget::Canvas
        }
    }

    pub fn pointer_down(&mut self, screen: Vec2) -> GestureOutcome {
        let target = self.hit_target(screen);
        let outcome = self.viewport.pointer_down(screen, target);
        self.follow(outcome);
        outcome
    }

    pub fn pointer_move(&mut self, screen: Vec2) -> GestureOutcome {
        let outcome = self.viewport.pointer_move(screen);
        self.follow(outcome);
        if outcome == GestureOutcome::None && self.hit_target(screen) == HitTarget::Canvas {
            let hovered = self.node_at(screen);
            self.hover(hovered);
        }
        outcome
    }

    pub fn pointer_up(&mut self) {
        self.viewport.pointer_up();
    }

    pub fn pointer_leave(&mut self) {
        self.viewport.pointer_leave();
        self.hover(None);
    }

    pub fn wheel(&mut self, screen: Vec2, delta_y: f32) -> GestureOutcome {
        let target = self.hit_target(screen);
        self.viewport.wheel(screen, delta_y, target)
    }

    /// Click selection: picks the node under the pointer or clears.
    pub fn click(&mut self, screen: Vec2) -> Option<Urn> {
        if self.hit_target(screen) != HitTarget::Canvas {
            return None;
        }
        let picked = self.node_at(screen);
        self.select(picked.clone());
        picked
    }

    fn follow(&mut self, outcome: GestureOutcome) {
        if let GestureOutcome::MinimapJump(screen) = outcome {
            self.minimap_jump(screen);
        }
    }

    /// Recentres the main viewport on the graph point under a minimap press.
    pub fn minimap_jump(&mut self, screen: Vec2) {
        let frame = self.minimap_frame();
        let local = (screen - frame.min).clamp(Vec2::ZERO, frame.size);
        let graph = self.minimap().minimap_to_graph(local);
        self.viewport.center_on(graph, self.viewport_size);
    }

    // ----- Derived views -----

    pub fn minimap(&self) -> MinimapProjection {
        MinimapProjection::compute(
            self.layout.bounds,
            self.viewport.transform(),
            self.viewport_size,
            self.opts.minimap.size(),
            self.opts.minimap.shrink,
        )
    }

    pub fn node_visuals(&self) -> Vec<NodeView<'_>> {
        self.model
            .nodes()
            .iter()
            .map(|node| NodeView {
                node,
                position: self.layout.position(&node.urn).unwrap_or_default(),
                visual: self.interaction.node_visual(&node.urn),
            })
            .collect()
    }

    pub fn edge_visuals(&self) -> Vec<EdgeView<'_>> {
        self.model
            .edges()
            .iter()
            .map(|edge| {
                let (from, to) = self.model.edge_endpoints(edge);
                EdgeView {
                    edge,
                    from: self.layout.position(from).unwrap_or_default(),
                    to: self.layout.position(to).unwrap_or_default(),
                    visual: self.interaction.edge_visual(&self.model, edge),
                }
            })
            .collect()
    }

    pub fn export(&mut self, format: ExportFormat) -> Result<String> {
        let out = export::render(&self.model, &self.layout, format)?;
        if let Some(hook) = self.on_export.as_mut() {
            hook(format, &out);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::testing::ScriptedBackend;
    use lineage_core::{RawEdge, RawNode};
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::Arc;

    const WAIT: Duration = Duration::from_secs(5);

    fn shop() -> GraphPayload {
        GraphPayload {
            nodes: ["customers", "orders", "order_items", "audit_log"]
                .iter()
                .map(|u| RawNode::new(u))
                .collect(),
            edges: vec![
                RawEdge::new("customers", "orders"),
                RawEdge::new("orders", "order_items"),
            ],
        }
    }

    fn view_with(backend: Arc<ScriptedBackend>) -> LineageView {
        let queries = LineageQueries::new(backend).expect("runtime");
        LineageView::new(queries, ViewOptions::default())
    }

    fn summary_key(view: &LineageView) -> QueryKey {
        let q = &view.options().queries;
        QueryKey::summary(&q.scope, q.data_source_id.as_deref(), q.summary_limit)
    }

    fn loaded() -> (LineageView, Arc<ScriptedBackend>) {
        let backend = Arc::new(ScriptedBackend::default());
        let mut view = view_with(backend.clone());
        backend.respond(summary_key(&view), 0, Ok(shop()));
        view.load_summary();
        assert!(view.wait_idle(WAIT));
        (view, backend)
    }

    fn screen_of(view: &LineageView, urn: &str) -> Vec2 {
        let pos = view.layout().position(&Urn::from(urn)).expect("laid out");
        view.transform().to_screen(pos)
    }

    #[test]
    fn summary_completion_replaces_snapshot_and_fits() {
        let (view, _) = loaded();
        assert_eq!(view.model().len(), 4);
        assert_eq!(view.active_status(), QueryStatus::Success);

        let b = view.layout().bounds;
        let centre = view.transform().to_screen(b.center());
        assert!((centre - view.viewport_size() * 0.5).length() < 1e-2);
    }

    #[test]
    fn search_jumps_to_first_match() {
        let (mut view, _) = loaded();
        let hit = view.search("ORDERS");
        assert_eq!(hit, Some(Urn::from("orders")));

        let on_screen = screen_of(&view, "orders");
        assert!((on_screen - view.viewport_size() * 0.5).length() < 1e-2);
        assert!((view.transform().k - 1.2).abs() < 1e-5);
        assert!(view
            .node_visuals()
            .iter()
            .any(|v| v.node.urn.as_str() == "customers" && v.visual.dimmed));
    }

    #[test]
    fn impacts_snapshot_enters_impact_mode() {
        let backend = Arc::new(ScriptedBackend::default());
        let mut view = view_with(backend.clone());
        let key = QueryKey::impacts(Urn::from("customers"), 3, 500);
        backend.respond(key, 0, Ok(shop()));

        view.show_impacts(Urn::from("customers"));
        assert!(view.wait_idle(WAIT));

        let visuals = view.node_visuals();
        let flag = |urn: &str| {
            visuals
                .iter()
                .find(|v| v.node.urn.as_str() == urn)
                .map(|v| v.visual)
                .expect("node present")
        };
        assert!(flag("customers").impact_selected);
        assert!(flag("orders").downstream);
        assert!(flag("order_items").downstream);
        assert!(flag("audit_log").dimmed);
        assert!(view.edge_visuals().iter().all(|e| e.visual.downstream));
    }

    #[test]
    fn failed_drill_keeps_last_good_snapshot() {
        let (mut view, backend) = loaded();
        let q = view.options().queries.clone();
        let key = QueryKey::drill(
            Urn::from("orders"),
            q.drill_depth,
            q.drill_direction,
            q.drill_limit,
        );
        backend.respond(key.clone(), 0, Err(QueryError::Transport("reset".into())));

        view.drill(Urn::from("orders"));
        assert!(!view.wait_idle(WAIT));
        assert_eq!(view.active_key(), Some(&key));
        assert_eq!(view.active_status(), QueryStatus::Error);
        assert!(matches!(view.active_error(), Some(QueryError::Transport(_))));
        assert_eq!(view.model().len(), 4);
    }

    #[test]
    fn background_completion_does_not_replace_display() {
        let (mut view, backend) = loaded();
        let trace_key = QueryKey::trace("customers->orders");
        backend.respond_trace(
            trace_key,
            0,
            Ok(TraceEvidence {
                edge_id: "customers->orders".into(),
                coverage_pct: Some(87.5),
                ..Default::default()
            }),
        );

        view.select(Some(Urn::from("orders")));
        view.request_trace("customers->orders");
        assert!(!view.wait_idle(WAIT));

        assert_eq!(
            view.trace("customers->orders").and_then(|t| t.coverage_pct),
            Some(87.5)
        );
        assert_eq!(view.interaction().selected(), Some(&Urn::from("orders")));
    }

    #[test]
    fn cached_key_is_reapplied_without_a_round_trip() {
        let (mut view, backend) = loaded();
        let key = QueryKey::provenance(Urn::from("order_items"));
        backend.respond(
            key.clone(),
            0,
            Ok(ScriptedBackend::chain(&["customers", "orders", "order_items"])),
        );
        view.show_provenance(Urn::from("order_items"));
        assert!(view.wait_idle(WAIT));
        assert_eq!(view.model().len(), 3);

        assert_eq!(view.load_summary(), RequestOutcome::Cached);
        assert_eq!(view.model().len(), 4);
        assert_eq!(backend.calls(&summary_key(&view)), 1);
    }

    #[test]
    fn selection_fires_callback_and_snapshot_reset_clears_it() {
        let (mut view, backend) = loaded();
        let seen: Rc<RefCell<Vec<Option<String>>>> = Rc::default();
        let sink = seen.clone();
        view.on_node_select(move |n| sink.borrow_mut().push(n.map(|n| n.urn.0.clone())));

        let at = screen_of(&view, "orders");
        assert_eq!(view.click(at + Vec2::new(3.0, -2.0)), Some(Urn::from("orders")));
        assert!(!view.select(Some(Urn::from("orders"))));

        let key = QueryKey::provenance(Urn::from("orders"));
        backend.respond(key, 0, Ok(ScriptedBackend::chain(&["customers", "orders"])));
        view.show_provenance(Urn::from("orders"));
        view.wait_idle(WAIT);

        assert_eq!(
            *seen.borrow(),
            vec![Some("orders".to_string()), None]
        );
        assert!(view.interaction().selected().is_none());
    }

    #[test]
    fn drag_pans_and_minimap_press_recentres() {
        let (mut view, _) = loaded();
        let start = view.transform();

        view.pointer_down(Vec2::new(100.0, 100.0));
        view.pointer_move(Vec2::new(130.0, 90.0));
        view.pointer_up();
        let dragged = view.transform();
        assert!((dragged.x - start.x - 30.0).abs() < 1e-3);
        assert!((dragged.y - start.y + 10.0).abs() < 1e-3);

        let frame = view.minimap_frame();
        let target = view.layout().position(&Urn::from("order_items")).unwrap();
        let press = frame.min + view.minimap().graph_to_minimap(target);
        assert_eq!(view.hit_target(press), HitTarget::Minimap);
        view.pointer_down(press);
        view.pointer_up();

        let centred = view.transform().to_screen(target);
        assert!((centred - view.viewport_size() * 0.5).length() <= 1.0);
        assert_eq!(view.transform().k, dragged.k);
    }

    #[test]
    fn controls_swallow_presses_and_wheel_zooms_canvas() {
        let (mut view, _) = loaded();
        view.set_control_regions(vec![Rect {
            min: Vec2::ZERO,
            size: Vec2::new(200.0, 40.0),
        }]);
        let before = view.transform();
        assert_eq!(view.pointer_down(Vec2::new(10.0, 10.0)), GestureOutcome::None);
        view.pointer_move(Vec2::new(80.0, 30.0));
        assert_eq!(view.transform(), before);
        assert_eq!(view.wheel(Vec2::new(10.0, 10.0), -1.0), GestureOutcome::None);

        assert_eq!(
            view.wheel(Vec2::new(640.0, 360.0), -1.0),
            GestureOutcome::Zoomed
        );
        assert!(view.transform().k > before.k);
    }

    #[test]
    fn direction_change_relayouts_and_export_fires_hook() {
        let (mut view, _) = loaded();
        view.set_direction(LayoutDirection::LeftRight);
        let orders = view.layout().position(&Urn::from("orders")).unwrap();
        assert_eq!(orders.x, 240.0);

        let exported: Rc<RefCell<Vec<ExportFormat>>> = Rc::default();
        let sink = exported.clone();
        view.on_export(move |f, _| sink.borrow_mut().push(f));
        let dot = view.export(ExportFormat::Dot).unwrap();
        assert!(dot.contains("rankdir=\"LR\""));
        assert_eq!(*exported.borrow(), vec![ExportFormat::Dot]);
    }

    #[test]
    fn explains_downstream_path() {
        let (view, _) = loaded();
        let path = view
            .explain_path(&Urn::from("customers"), &Urn::from("order_items"))
            .expect("path");
        assert_eq!(path.len(), 2);
        assert!(view
            .explain_path(&Urn::from("order_items"), &Urn::from("customers"))
            .is_none());
    }
}
