//! The scene host: the editor surface that actually owns pixels.
//!
//! The engine never draws items itself. Thumbnails ask the host for
//! pre-rendered item surfaces or an offscreen rasterization of a region, and
//! toggle host state (helper chrome, active layer) around the capture.

use atelier_core::{Item, LayerId, WorldRect};
use image::RgbaImage;

use crate::error::RenderResult;

/// Operations the rendering host provides.
pub trait SceneHost {
    /// Pre-rendered surface of a rich item (decoded image, 3D viewport
    /// snapshot). `None` if the host has nothing ready.
    fn item_surface(&self, item: &Item) -> Option<RgbaImage>;

    /// Whether helper chrome is currently drawn.
    fn helpers_visible(&self) -> bool;

    /// Show or hide helper chrome.
    fn set_helpers_visible(&mut self, visible: bool);

    /// Layer the editor currently targets.
    fn active_layer(&self) -> Option<LayerId>;

    /// Change the targeted layer.
    fn set_active_layer(&mut self, layer: Option<LayerId>);

    /// Rasterize `items` (back to front) clipped to `region` into a
    /// `width` x `height` image.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::Rasterize`] if the offscreen pass fails.
    fn rasterize(
        &mut self,
        items: &[&Item],
        region: WorldRect,
        width: u32,
        height: u32,
    ) -> RenderResult<RgbaImage>;
}

/// Restores helper visibility and the active layer when dropped.
///
/// Wraps the host for the duration of a capture so every exit path, errors
/// included, leaves the editor as it was.
pub struct HostStateGuard<'a> {
    host: &'a mut dyn SceneHost,
    helpers_visible: bool,
    active_layer: Option<LayerId>,
}

impl<'a> HostStateGuard<'a> {
    /// Record the host's current state.
    pub fn new(host: &'a mut dyn SceneHost) -> Self {
        let helpers_visible = host.helpers_visible();
        let active_layer = host.active_layer();
        Self {
            host,
            helpers_visible,
            active_layer,
        }
    }

    /// The wrapped host.
    pub fn host(&mut self) -> &mut dyn SceneHost {
        &mut *self.host
    }
}

impl Drop for HostStateGuard<'_> {
    fn drop(&mut self) {
        self.host.set_helpers_visible(self.helpers_visible);
        self.host.set_active_layer(self.active_layer);
    }
}

impl std::fmt::Debug for HostStateGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostStateGuard")
            .field("helpers_visible", &self.helpers_visible)
            .field("active_layer", &self.active_layer)
            .finish_non_exhaustive()
    }
}
