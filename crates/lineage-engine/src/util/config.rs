use anyhow::Context;
use directories::ProjectDirs;
use glam::Vec2;
use lineage_core::LineageDirection;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::engine::{QueryScope, ViewOptions};
use crate::graph::layout::{LayoutConfig, LayoutDirection, LANE_SPACING, NODE_SPACING};
use crate::view::minimap::MinimapConfig;
use crate::view::viewport::{ViewportConfig, K_MAX, K_MIN, ZOOM_STEP};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimapSettings {
    pub width: f32,
    pub height: f32,
    pub shrink: f32,
    pub margin: f32,
}

impl Default for MinimapSettings {
    fn default() -> Self {
        let m = MinimapConfig::default();
        Self {
            width: m.width,
            height: m.height,
            shrink: m.shrink,
            margin: m.margin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub backend_url: String,
    /// Name of the environment variable holding the bearer token.
    pub bearer_token_env: String,
    pub query_timeout_secs: u64,

    pub scope: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<String>,
    pub summary_limit: u32,
    pub drill_depth: u32,
    pub drill_direction: LineageDirection,
    pub drill_limit: u32,
    pub impact_radius: u32,
    pub impact_limit: u32,

    pub direction: LayoutDirection,
    pub lane_spacing: f32,
    pub node_spacing: f32,

    pub zoom_min: f32,
    pub zoom_max: f32,
    pub zoom_step: f32,
    pub jump_scale: f32,
    pub fit_padding: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,

    pub search_hit_limit: usize,
    pub pick_radius: f32,
    pub path_max_depth: usize,

    pub minimap: MinimapSettings,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        let q = QueryScope::default();
        Self {
            backend_url: "http://localhost:3000/api".to_string(),
            bearer_token_env: "LINEAGE_API_TOKEN".to_string(),
            query_timeout_secs: 30,
            scope: q.scope,
            data_source_id: q.data_source_id,
            summary_limit: q.summary_limit,
            drill_depth: q.drill_depth,
            drill_direction: q.drill_direction,
            drill_limit: q.drill_limit,
            impact_radius: q.impact_radius,
            impact_limit: q.impact_limit,
            direction: LayoutDirection::TopBottom,
            lane_spacing: LANE_SPACING,
            node_spacing: NODE_SPACING,
            zoom_min: K_MIN,
            zoom_max: K_MAX,
            zoom_step: ZOOM_STEP,
            jump_scale: 1.2,
            fit_padding: 40.0,
            viewport_width: 1280.0,
            viewport_height: 720.0,
            search_hit_limit: 30,
            pick_radius: 18.0,
            path_max_depth: 12,
            minimap: MinimapSettings::default(),
        }
    }
}

impl ViewerConfig {
    pub fn bearer_token(&self) -> Option<String> {
        if self.bearer_token_env.trim().is_empty() {
            return None;
        }
        std::env::var(&self.bearer_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }

    pub fn query_scope(&self) -> QueryScope {
        QueryScope {
            scope: self.scope.clone(),
            data_source_id: self.data_source_id.clone(),
            summary_limit: self.summary_limit,
            drill_depth: self.drill_depth,
            drill_direction: self.drill_direction,
            drill_limit: self.drill_limit,
            impact_radius: self.impact_radius,
            impact_limit: self.impact_limit,
        }
    }

    /// Out-of-range zoom bounds are swapped rather than rejected. Bounds at or
    /// below zero collapse onto the smallest positive scale.
    pub fn view_options(&self) -> ViewOptions {
        let (lo, hi) = if self.zoom_min <= self.zoom_max {
            (self.zoom_min, self.zoom_max)
        } else {
            (self.zoom_max, self.zoom_min)
        };
        let k_min = lo.max(f32::EPSILON);
        let k_max = hi.max(k_min);
        ViewOptions {
            direction: self.direction,
            layout: LayoutConfig {
                lane_spacing: self.lane_spacing,
                node_spacing: self.node_spacing,
            },
            viewport: ViewportConfig {
                k_min,
                k_max,
                zoom_step: self.zoom_step.max(1.0 + f32::EPSILON),
                jump_scale: self.jump_scale,
                fit_padding: self.fit_padding.max(0.0),
            },
            minimap: MinimapConfig {
                width: self.minimap.width,
                height: self.minimap.height,
                shrink: self.minimap.shrink,
                margin: self.minimap.margin,
            },
            search_hit_limit: self.search_hit_limit,
            pick_radius: self.pick_radius,
            path_max_depth: self.path_max_depth,
            viewport_size: Vec2::new(self.viewport_width, self.viewport_height).max(Vec2::ONE),
            queries: self.query_scope(),
        }
    }

    /// `viewer.toml` under the platform config directory, if there is one.
    pub fn file_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "lineage-engine").map(|d| d.config_dir().join("viewer.toml"))
    }

    pub fn load() -> Self {
        Self::file_path()
            .map(|path| Self::load_from(&path))
            .unwrap_or_default()
    }

    /// Missing or malformed files fall back to defaults; keys absent from the
    /// file keep their default values.
    pub fn load_from(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "cannot read viewer config: {e}");
                return Self::default();
            }
        };
        toml::from_str(&contents).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), "ignoring malformed viewer config: {e}");
            Self::default()
        })
    }

    /// Writes to the platform config file and returns where it went.
    pub fn save(&self) -> anyhow::Result<PathBuf> {
        let path = Self::file_path().context("no config directory available")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let dir = path.parent().filter(|d| !d.as_os_str().is_empty());
        if let Some(dir) = dir {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating config directory {}", dir.display()))?;
        }
        let data = toml::to_string_pretty(self).context("serializing viewer config")?;
        fs::write(path, data).with_context(|| format!("writing {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::viewport::{Viewport, ZoomDirection};
    use tempfile::tempdir;

    #[test]
    fn viewer_config_roundtrip_save_load() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("viewer.toml");
        let cfg = ViewerConfig {
            scope: "warehouse".to_string(),
            data_source_id: Some("pg-main".to_string()),
            direction: LayoutDirection::LeftRight,
            drill_direction: LineageDirection::Upstream,
            ..Default::default()
        };

        cfg.save_to(&path).expect("save config");
        let loaded = ViewerConfig::load_from(&path);

        assert_eq!(cfg, loaded);
    }

    #[test]
    fn partial_file_fills_defaults_and_garbage_falls_back() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("viewer.toml");

        fs::write(&path, "direction = \"LR\"\n[minimap]\nwidth = 320.0\n").expect("write");
        let cfg = ViewerConfig::load_from(&path);
        assert_eq!(cfg.direction, LayoutDirection::LeftRight);
        assert_eq!(cfg.minimap.width, 320.0);
        assert_eq!(cfg.minimap.height, 140.0);
        assert_eq!(cfg.summary_limit, 500);

        fs::write(&path, "direction = [").expect("write");
        assert_eq!(ViewerConfig::load_from(&path), ViewerConfig::default());
        assert_eq!(
            ViewerConfig::load_from(&dir.path().join("missing.toml")),
            ViewerConfig::default()
        );
    }

    #[test]
    fn view_options_sanitise_zoom_range() {
        let cfg = ViewerConfig {
            zoom_min: 3.0,
            zoom_max: 0.5,
            ..Default::default()
        };
        let opts = cfg.view_options();
        assert_eq!(opts.viewport.k_min, 0.5);
        assert_eq!(opts.viewport.k_max, 3.0);
        assert_eq!(opts.queries.scope, "default");
        assert_eq!(opts.viewport_size, Vec2::new(1280.0, 720.0));
    }

    #[test]
    fn negative_zoom_range_collapses_to_a_usable_scale() {
        let cfg = ViewerConfig {
            zoom_min: -2.0,
            zoom_max: -1.0,
            ..Default::default()
        };
        let opts = cfg.view_options();
        assert!(opts.viewport.k_min > 0.0);
        assert!(opts.viewport.k_min <= opts.viewport.k_max);

        let mut viewport = Viewport::new(opts.viewport);
        viewport.zoom(Vec2::new(10.0, 10.0), ZoomDirection::In);
        assert!(viewport.transform().k > 0.0);
    }

    #[test]
    fn blank_token_env_disables_auth() {
        let cfg = ViewerConfig {
            bearer_token_env: " ".to_string(),
            ..Default::default()
        };
        assert!(cfg.bearer_token().is_none());
    }
}
