//! # Atelier Renderer
//!
//! Viewport-synchronized drawing support for the Atelier canvas: the infinite
//! grid and per-layer thumbnails. Items themselves are drawn by the host.
//!
//! ## Components
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                  Renderer                   │
//! ├──────────────────────┬──────────────────────┤
//! │ GridDriver           │ ThumbnailCache       │
//! │  RedrawScheduler     │  SceneHost (trait)   │
//! │  GridRenderer        │  letterbox + PNG     │
//! │   PrimitivePool      │                      │
//! └──────────────────────┴──────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod grid;
pub mod host;
pub mod image;
pub mod pool;
pub mod schedule;
pub mod thumbnail;

pub use error::{RenderError, RenderResult};
pub use grid::{DrawOutcome, GridConfig, GridFrame, GridPhase, GridRenderer, GridStyle};
pub use host::{HostStateGuard, SceneHost};
pub use pool::{
    GridPrimitive, PoolConfig, PoolStats, PrimitiveGeometry, PrimitiveHandle, PrimitiveKind,
    PrimitivePool,
};
pub use schedule::{GridDriver, RedrawDecision, RedrawReason, RedrawScheduler, SchedulerConfig};
pub use thumbnail::{CacheStats, ThumbnailCache, ThumbnailCacheEntry, ThumbnailConfig};

use atelier_core::{LayerId, OrderingStore, StoreChange, SurfaceSize, Viewport};
use serde::{Deserialize, Serialize};

/// Configuration for the renderer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Grid drawing and pooling.
    pub grid: GridConfig,
    /// Grid redraw policy.
    pub scheduler: SchedulerConfig,
    /// Layer thumbnails.
    pub thumbnails: ThumbnailConfig,
}

impl RendererConfig {
    /// Parse from JSON; missing sections take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Config`] if the JSON is malformed.
    pub fn from_json(json: &str) -> RenderResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// The renderer for one canvas session.
#[derive(Debug)]
pub struct Renderer {
    config: RendererConfig,
    grid: GridDriver,
    thumbnails: ThumbnailCache,
    frame_count: u64,
}

impl Renderer {
    /// Create a new renderer with the given configuration.
    #[must_use]
    pub fn new(config: RendererConfig) -> Self {
        let grid = GridDriver::new(config.grid.clone(), config.scheduler);
        let thumbnails = ThumbnailCache::new(config.thumbnails);
        Self {
            config,
            grid,
            thumbnails,
            frame_count: 0,
        }
    }

    /// Get the renderer configuration.
    #[must_use]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// The grid driver.
    #[must_use]
    pub fn grid(&self) -> &GridDriver {
        &self.grid
    }

    /// The grid driver, mutably (style changes, pan end).
    pub fn grid_mut(&mut self) -> &mut GridDriver {
        &mut self.grid
    }

    /// The thumbnail cache.
    #[must_use]
    pub fn thumbnails(&self) -> &ThumbnailCache {
        &self.thumbnails
    }

    /// Grid frames published so far.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Attach to a surface and draw the first grid frame.
    pub fn mount(
        &mut self,
        viewport: &Viewport,
        surface: SurfaceSize,
        now_ms: u64,
    ) -> Option<DrawOutcome> {
        tracing::debug!(?surface, "Renderer mounted");
        let outcome = self.grid.mount(viewport, surface, now_ms);
        self.count(outcome)
    }

    /// Resize the rendering surface.
    pub fn resize(&mut self, surface: SurfaceSize) {
        self.grid.resize(surface);
    }

    /// Animation-frame tick.
    pub fn frame(&mut self, viewport: &Viewport, now_ms: u64) -> Option<DrawOutcome> {
        let outcome = self.grid.frame(viewport, now_ms);
        self.count(outcome)
    }

    /// The viewport changed.
    pub fn viewport_changed(&mut self, viewport: &Viewport, panning: bool) -> Option<DrawOutcome> {
        let outcome = self.grid.viewport_changed(viewport, panning);
        self.count(outcome)
    }

    fn count(&mut self, outcome: Option<DrawOutcome>) -> Option<DrawOutcome> {
        if matches!(outcome, Some(DrawOutcome::Drawn(_))) {
            self.frame_count += 1;
        }
        outcome
    }

    /// Feed ordering-store notifications to the caches.
    ///
    /// A replaced order (project load) also schedules a grid redraw.
    pub fn apply_store_changes(&mut self, changes: &[StoreChange]) {
        self.thumbnails.apply_changes(changes);
        if changes.contains(&StoreChange::Replaced) {
            self.grid.project_changed();
        }
    }

    /// Layer thumbnail, see [`ThumbnailCache::get_thumbnail`].
    pub fn thumbnail(
        &mut self,
        layer: LayerId,
        store: &OrderingStore,
        host: &mut dyn SceneHost,
        now_ms: u64,
    ) -> Option<String> {
        self.thumbnails.get_thumbnail(layer, store, host, now_ms)
    }

    /// Periodic housekeeping for the thumbnail cache.
    pub fn maintenance(&mut self, store: &OrderingStore, now_ms: u64) -> usize {
        self.thumbnails.maintenance(store, now_ms)
    }

    /// Cancel scheduled work and release every pooled resource.
    pub fn teardown(&mut self) {
        self.grid.teardown();
        self.thumbnails.clear();
        tracing::debug!("Renderer torn down after {} frames", self.frame_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_json_partial() {
        let config = RendererConfig::from_json(
            r#"{ "grid": { "spacing": 40.0, "style": "dots" }, "thumbnails": { "size": 32 } }"#,
        )
        .expect("valid json");
        assert_eq!(config.grid.spacing, 40.0);
        assert_eq!(config.grid.style, GridStyle::Dots);
        assert_eq!(config.grid.pool.capacity, 50);
        assert_eq!(config.scheduler.dot_debounce_ms, 100);
        assert_eq!(config.thumbnails.size, 32);
        assert_eq!(config.thumbnails.ttl_ms, 1000);
    }

    #[test]
    fn test_config_rejects_malformed() {
        assert!(matches!(
            RendererConfig::from_json("{ grid: }"),
            Err(RenderError::Config(_))
        ));
    }

    #[test]
    fn test_frame_count_tracks_drawn_frames() {
        let mut renderer = Renderer::new(RendererConfig::default());
        let v = Viewport::default();
        renderer.mount(&v, SurfaceSize::new(0.0, 0.0), 0);
        assert_eq!(renderer.frame_count(), 0);

        renderer.resize(SurfaceSize::new(320.0, 240.0));
        renderer.frame(&v, 16);
        assert_eq!(renderer.frame_count(), 1);

        renderer.apply_store_changes(&[StoreChange::Replaced]);
        renderer.frame(&v, 32);
        assert_eq!(renderer.frame_count(), 2);

        renderer.teardown();
        assert_eq!(renderer.frame(&v, 48), None);
    }
}
