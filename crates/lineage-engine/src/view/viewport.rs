use glam::Vec2;

use crate::graph::layout::Bounds;

pub const ZOOM_STEP: f32 = 1.08;
pub const K_MIN: f32 = 0.1;
pub const K_MAX: f32 = 2.5;

/// Screen = graph * k + (x, y).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    pub x: f32,
    pub y: f32,
    pub k: f32,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ViewTransform {
    pub const IDENTITY: Self = Self {
        x: 0.0,
        y: 0.0,
        k: 1.0,
    };

    pub fn translation(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn to_screen(&self, graph: Vec2) -> Vec2 {
        graph * self.k + self.translation()
    }

    pub fn to_graph(&self, screen: Vec2) -> Vec2 {
        (screen - self.translation()) / self.k
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportConfig {
    pub k_min: f32,
    pub k_max: f32,
    pub zoom_step: f32,
    pub jump_scale: f32,
    pub fit_padding: f32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            k_min: K_MIN,
            k_max: K_MAX,
            zoom_step: ZOOM_STEP,
            jump_scale: 1.2,
            fit_padding: 40.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
}

impl ZoomDirection {
    /// Wheel convention: scrolling up (negative delta) zooms in.
    pub fn from_wheel(delta_y: f32) -> Option<Self> {
        if delta_y < 0.0 {
            Some(Self::In)
        } else if delta_y > 0.0 {
            Some(Self::Out)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitTarget {
    Canvas,
    Minimap,
    Control,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gesture {
    Idle,
    Dragging { last: Vec2 },
    /// Pointer went down on the minimap; moves jump instead of pan.
    Scrubbing,
}

/// What a pointer event asks the owner to do besides mutating the transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    None,
    Panned,
    Zoomed,
    MinimapJump(Vec2),
}

#[derive(Debug, Clone)]
pub struct Viewport {
    pub cfg: ViewportConfig,
    transform: ViewTransform,
    gesture: Gesture,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ViewportConfig::default())
    }
}

impl Viewport {
    pub fn new(cfg: ViewportConfig) -> Self {
        Self {
            cfg,
            transform: ViewTransform::IDENTITY,
            gesture: Gesture::Idle,
        }
    }

    pub fn transform(&self) -> ViewTransform {
        self.transform
    }

    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    pub fn reset(&mut self) {
        self.transform = ViewTransform::IDENTITY;
        self.gesture = Gesture::Idle;
    }

    /// An inverted range pins every scale to `k_min`.
    fn clamp_k(&self, k: f32) -> f32 {
        let lo = self.cfg.k_min;
        k.max(lo).min(self.cfg.k_max.max(lo))
    }

    /// Raw screen delta, no scale correction.
    pub fn pan(&mut self, delta: Vec2) {
        self.transform.x += delta.x;
        self.transform.y += delta.y;
    }

    /// Zoom around `screen_point` so the graph point under it stays put.
    pub fn zoom(&mut self, screen_point: Vec2, direction: ZoomDirection) -> bool {
        let t = self.transform;
        let factor = match direction {
            ZoomDirection::In => self.cfg.zoom_step,
            ZoomDirection::Out => 1.0 / self.cfg.zoom_step,
        };
        let k = self.clamp_k(t.k * factor);
        if (k - t.k).abs() <= f32::EPSILON {
            return false;
        }
        let ratio = k / t.k;
        self.transform = ViewTransform {
            x: screen_point.x - (screen_point.x - t.x) * ratio,
            y: screen_point.y - (screen_point.y - t.y) * ratio,
            k,
        };
        true
    }

    pub fn fit_to_bounds(&mut self, bounds: Bounds, viewport_size: Vec2, padding: f32) {
        let avail = (viewport_size - Vec2::splat(padding * 2.0)).max(Vec2::ONE);
        let extent = bounds.size().max(Vec2::ONE);
        let k = self.clamp_k((avail.x / extent.x).min(avail.y / extent.y));
        self.set_centered(bounds.center(), viewport_size, k);
    }

    pub fn jump_to(&mut self, node_position: Vec2, viewport_size: Vec2) {
        let k = self.clamp_k(self.cfg.jump_scale);
        self.set_centered(node_position, viewport_size, k);
    }

    /// Recentre on a graph point keeping the current scale.
    pub fn center_on(&mut self, graph_point: Vec2, viewport_size: Vec2) {
        let k = self.transform.k;
        self.set_centered(graph_point, viewport_size, k);
    }

    fn set_centered(&mut self, graph_point: Vec2, viewport_size: Vec2, k: f32) {
        let t = viewport_size * 0.5 - graph_point * k;
        self.transform = ViewTransform { x: t.x, y: t.y, k };
    }

    // ----- Gesture state machine -----

    pub fn pointer_down(&mut self, pos: Vec2, target: HitTarget) -> GestureOutcome {
        match target {
            HitTarget::Control => GestureOutcome::None,
            HitTarget::Minimap => {
                self.gesture = Gesture::Scrubbing;
                GestureOutcome::MinimapJump(pos)
            }
            HitTarget::Canvas => {
                self.gesture = Gesture::Dragging { last: pos };
                GestureOutcome::None
            }
        }
    }

    pub fn pointer_move(&mut self, pos: Vec2) -> GestureOutcome {
        match self.gesture {
            Gesture::Idle => GestureOutcome::None,
            Gesture::Dragging { last } => {
                self.pan(pos - last);
                self.gesture = Gesture::Dragging { last: pos };
                GestureOutcome::Panned
            }
            Gesture::Scrubbing => GestureOutcome::MinimapJump(pos),
        }
    }

    pub fn pointer_up(&mut self) {
        self.gesture = Gesture::Idle;
    }

    pub fn pointer_leave(&mut self) {
        self.gesture = Gesture::Idle;
    }

    /// Zooming is instantaneous and does not change the gesture state, but a
    /// minimap scrub swallows wheel input.
    pub fn wheel(&mut self, pos: Vec2, delta_y: f32, target: HitTarget) -> GestureOutcome {
        if target != HitTarget::Canvas || self.gesture == Gesture::Scrubbing {
            return GestureOutcome::None;
        }
        let Some(direction) = ZoomDirection::from_wheel(delta_y) else {
            return GestureOutcome::None;
        };
        if self.zoom(pos, direction) {
            GestureOutcome::Zoomed
        } else {
            GestureOutcome::None
        }
    }
}
