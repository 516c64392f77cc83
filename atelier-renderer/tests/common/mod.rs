//! Shared fixtures for renderer integration tests.

#![allow(dead_code)]

use std::collections::HashMap;

use atelier_core::{Item, ItemId, LayerId, WorldRect};
use atelier_renderer::{RenderError, RenderResult, SceneHost};
use image::{Rgba, RgbaImage};

/// Install a test-writer subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("atelier_renderer=debug")
        .try_init();
}

/// In-memory scene host that paints each item's bounds as a flat color.
#[derive(Debug, Default)]
pub struct PaintHost {
    pub helpers_visible: bool,
    pub active_layer: Option<LayerId>,
    pub surfaces: HashMap<ItemId, RgbaImage>,
    pub raster_calls: usize,
    pub fail_next: bool,
}

impl PaintHost {
    pub fn new() -> Self {
        Self {
            helpers_visible: true,
            ..Self::default()
        }
    }
}

impl SceneHost for PaintHost {
    fn item_surface(&self, item: &Item) -> Option<RgbaImage> {
        self.surfaces.get(&item.id).cloned()
    }

    fn helpers_visible(&self) -> bool {
        self.helpers_visible
    }

    fn set_helpers_visible(&mut self, visible: bool) {
        self.helpers_visible = visible;
    }

    fn active_layer(&self) -> Option<LayerId> {
        self.active_layer
    }

    fn set_active_layer(&mut self, layer: Option<LayerId>) {
        self.active_layer = layer;
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn rasterize(
        &mut self,
        items: &[&Item],
        region: WorldRect,
        width: u32,
        height: u32,
    ) -> RenderResult<RgbaImage> {
        self.raster_calls += 1;
        if std::mem::take(&mut self.fail_next) {
            return Err(RenderError::Rasterize("context lost".to_string()));
        }
        let mut img = RgbaImage::new(width, height);
        let sx = f64::from(width) / region.width;
        let sy = f64::from(height) / region.height;
        for item in items {
            let b = item.bounds;
            let x0 = ((b.x - region.x) * sx).floor().max(0.0) as u32;
            let y0 = ((b.y - region.y) * sy).floor().max(0.0) as u32;
            let x1 = (((b.right() - region.x) * sx).ceil() as u32).min(width);
            let y1 = (((b.bottom() - region.y) * sy).ceil() as u32).min(height);
            for y in y0..y1 {
                for x in x0..x1 {
                    img.put_pixel(x, y, Rgba([40, 90, 200, 255]));
                }
            }
        }
        Ok(img)
    }
}
