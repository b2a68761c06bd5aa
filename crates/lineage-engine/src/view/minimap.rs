use glam::Vec2;

use crate::graph::layout::Bounds;
use crate::view::viewport::ViewTransform;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimapConfig {
    pub width: f32,
    pub height: f32,
    pub shrink: f32,
    pub margin: f32,
}

impl Default for MinimapConfig {
    fn default() -> Self {
        Self {
            width: 200.0,
            height: 140.0,
            shrink: 0.9,
            margin: 12.0,
        }
    }
}

impl MinimapConfig {
    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    /// Minimap frame in main-viewport screen space, anchored bottom-right.
    pub fn frame(&self, viewport_size: Vec2) -> Rect {
        let size = self.size();
        Rect {
            min: viewport_size - size - Vec2::splat(self.margin),
            size,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub min: Vec2,
    pub size: Vec2,
}

impl Rect {
    pub fn max(&self) -> Vec2 {
        self.min + self.size
    }

    pub fn contains(&self, p: Vec2) -> bool {
        let max = self.max();
        p.x >= self.min.x && p.y >= self.min.y && p.x <= max.x && p.y <= max.y
    }
}

/// Uniformly scaled projection of the whole graph into the minimap, plus the
/// rectangle of the graph currently visible in the main viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinimapProjection {
    pub scale: f32,
    pub offset: Vec2,
    pub size: Vec2,
    pub viewport_rect: Rect,
}

impl MinimapProjection {
    pub fn compute(
        bounds: Bounds,
        transform: ViewTransform,
        viewport_size: Vec2,
        minimap_size: Vec2,
        shrink: f32,
    ) -> Self {
        let extent = bounds.size().max(Vec2::ONE);
        let scale = (minimap_size.x / extent.x).min(minimap_size.y / extent.y) * shrink;
        let offset = minimap_size * 0.5 - bounds.center() * scale;

        let viewport_rect = Rect {
            min: Vec2::new(
                -transform.x / transform.k * scale + offset.x,
                -transform.y / transform.k * scale + offset.y,
            ),
            size: viewport_size * scale / transform.k,
        };

        Self {
            scale,
            offset,
            size: minimap_size,
            viewport_rect,
        }
    }

    pub fn graph_to_minimap(&self, graph: Vec2) -> Vec2 {
        graph * self.scale + self.offset
    }

    pub fn minimap_to_graph(&self, local: Vec2) -> Vec2 {
        (local - self.offset) / self.scale
    }
}
