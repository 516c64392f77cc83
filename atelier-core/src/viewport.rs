//! Coordinate transforms between world space and the visible screen.
//!
//! ```text
//!   world ──(+ pan)──▶ panned ──(× zoom)──▶ device px ──(÷ dpr)──▶ CSS px
//! ```
//!
//! Pan is stored in world units, so it is applied before scaling. Every
//! rendering surface (grid, DOM overlays, node graph) reads the same
//! [`Viewport`] snapshot and these functions, which keeps them numerically
//! consistent with each other.

use serde::{Deserialize, Serialize};

use crate::geometry::{ScreenPoint, SurfaceSize, WorldPoint, WorldRect};

/// Minimum zoom level.
pub const MIN_ZOOM: f64 = 0.1;

/// Maximum zoom level.
pub const MAX_ZOOM: f64 = 3.0;

/// Zoom multiplier per wheel tick (scroll-up zooms in by this factor).
pub const WHEEL_ZOOM_FACTOR: f64 = 1.1;

/// Fraction of the surface used by [`ViewportController::fit_rect`].
pub const FIT_MARGIN: f64 = 0.9;

/// The pan/zoom state of a canvas session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    /// Zoom level (1.0 = 100%).
    pub zoom: f64,
    /// Pan offset X in world units.
    pub pan_x: f64,
    /// Pan offset Y in world units.
    pub pan_y: f64,
    /// Ratio between physical and CSS pixels.
    pub device_pixel_ratio: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            device_pixel_ratio: 1.0,
        }
    }
}

impl Viewport {
    /// Create a viewport.
    #[must_use]
    pub const fn new(zoom: f64, pan_x: f64, pan_y: f64, device_pixel_ratio: f64) -> Self {
        Self {
            zoom,
            pan_x,
            pan_y,
            device_pixel_ratio,
        }
    }

    /// CSS pixels per world unit, `None` if zoom or dpr is unusable.
    #[must_use]
    pub fn screen_scale(&self) -> Option<f64> {
        let usable = |v: f64| v.is_finite() && v > 0.0;
        if usable(self.zoom) && usable(self.device_pixel_ratio) {
            Some(self.zoom / self.device_pixel_ratio)
        } else {
            None
        }
    }

    /// Whether every field is finite and the scale is usable.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.screen_scale().is_some() && self.pan_x.is_finite() && self.pan_y.is_finite()
    }

    /// Clamp zoom into `[MIN_ZOOM, MAX_ZOOM]` and dpr to at least 1.
    ///
    /// Non-finite fields are left as-is so callers can detect them.
    #[must_use]
    pub fn clamped(self) -> Self {
        let zoom = if self.zoom.is_finite() {
            self.zoom.clamp(MIN_ZOOM, MAX_ZOOM)
        } else {
            self.zoom
        };
        let device_pixel_ratio = if self.device_pixel_ratio.is_finite() {
            self.device_pixel_ratio.max(1.0)
        } else {
            self.device_pixel_ratio
        };
        Self {
            zoom,
            device_pixel_ratio,
            ..self
        }
    }
}

/// Map a world point to CSS pixels.
///
/// An unusable viewport, or a result that is not finite (overflow), falls
/// back to the identity transform; non-finite input maps to the origin.
#[must_use]
pub fn world_to_screen(pt: WorldPoint, viewport: &Viewport) -> ScreenPoint {
    let mapped = viewport.screen_scale().filter(|_| viewport.is_valid()).map(|scale| {
        ScreenPoint::new(
            (pt.x + viewport.pan_x) * scale,
            (pt.y + viewport.pan_y) * scale,
        )
    });
    match mapped {
        Some(screen) if screen.is_finite() => screen,
        _ => {
            warn_fallback(viewport, pt.x, pt.y);
            let identity = ScreenPoint::new(pt.x, pt.y);
            if identity.is_finite() {
                identity
            } else {
                ScreenPoint::new(0.0, 0.0)
            }
        }
    }
}

/// Map CSS pixels to a world point. Exact inverse of [`world_to_screen`],
/// with the same fallback.
#[must_use]
pub fn screen_to_world(pt: ScreenPoint, viewport: &Viewport) -> WorldPoint {
    let mapped = viewport.screen_scale().filter(|_| viewport.is_valid()).map(|scale| {
        WorldPoint::new(pt.x / scale - viewport.pan_x, pt.y / scale - viewport.pan_y)
    });
    match mapped {
        Some(world) if world.is_finite() => world,
        _ => {
            warn_fallback(viewport, pt.x, pt.y);
            let identity = WorldPoint::new(pt.x, pt.y);
            if identity.is_finite() {
                identity
            } else {
                WorldPoint::new(0.0, 0.0)
            }
        }
    }
}

fn warn_fallback(viewport: &Viewport, x: f64, y: f64) {
    tracing::warn!(
        zoom = viewport.zoom,
        pan_x = viewport.pan_x,
        pan_y = viewport.pan_y,
        dpr = viewport.device_pixel_ratio,
        x,
        y,
        "Transform produced a non-finite point, using identity transform"
    );
}

/// Convert DOM pointer coordinates (`clientX`/`clientY`) to world space.
///
/// `canvas_origin` is the canvas element's top-left corner in client
/// coordinates.
#[must_use]
pub fn client_to_world(
    client: ScreenPoint,
    canvas_origin: ScreenPoint,
    viewport: &Viewport,
) -> WorldPoint {
    screen_to_world(
        ScreenPoint::new(client.x - canvas_origin.x, client.y - canvas_origin.y),
        viewport,
    )
}

/// Zoom to `new_zoom` while keeping the world point under `anchor` fixed.
///
/// `new_zoom` is clamped to `[MIN_ZOOM, MAX_ZOOM]`. Invalid input returns the
/// viewport unchanged.
#[must_use]
pub fn zoom_around_point(viewport: &Viewport, anchor: ScreenPoint, new_zoom: f64) -> Viewport {
    if !new_zoom.is_finite() || !anchor.is_finite() || !viewport.is_valid() {
        tracing::warn!(new_zoom, "Ignoring zoom with non-finite input");
        return *viewport;
    }

    let zoom = new_zoom.clamp(MIN_ZOOM, MAX_ZOOM);
    let dpr = viewport.device_pixel_ratio;
    let world = screen_to_world(anchor, viewport);

    let next = Viewport {
        zoom,
        pan_x: anchor.x * dpr / zoom - world.x,
        pan_y: anchor.y * dpr / zoom - world.y,
        device_pixel_ratio: dpr,
    };

    if next.is_valid() {
        next
    } else {
        tracing::warn!(?next, "Zoom produced non-finite pan, keeping previous viewport");
        *viewport
    }
}

/// The world rectangle covered by a surface of the given CSS size.
#[must_use]
pub fn visible_world_rect(viewport: &Viewport, surface: SurfaceSize) -> WorldRect {
    let top_left = screen_to_world(ScreenPoint::new(0.0, 0.0), viewport);
    let bottom_right = screen_to_world(ScreenPoint::new(surface.width, surface.height), viewport);
    WorldRect::from_corners(top_left, bottom_right)
}

/// Owner of the live viewport.
///
/// Keeps the last known-good value so that any mutation producing
/// NaN/Infinity is replaced rather than propagated into layout.
#[derive(Debug, Clone)]
pub struct ViewportController {
    current: Viewport,
    last_valid: Viewport,
    rejected: u64,
}

impl Default for ViewportController {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl ViewportController {
    /// Create a controller. An invalid initial viewport is replaced by the default.
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        let mut controller = Self {
            current: Viewport::default(),
            last_valid: Viewport::default(),
            rejected: 0,
        };
        controller.commit(viewport);
        controller
    }

    /// Read-only copy for one frame.
    #[must_use]
    pub fn snapshot(&self) -> Viewport {
        self.current
    }

    /// Number of mutations replaced by the last valid viewport.
    #[must_use]
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }

    /// Replace the viewport. Returns `false` if the value was rejected.
    pub fn set(&mut self, viewport: Viewport) -> bool {
        self.commit(viewport)
    }

    /// Update the device pixel ratio (e.g. window moved between monitors).
    pub fn set_device_pixel_ratio(&mut self, dpr: f64) -> bool {
        self.commit(Viewport {
            device_pixel_ratio: dpr,
            ..self.current
        })
    }

    /// Pan by a pointer delta in CSS pixels.
    pub fn pan_by_screen(&mut self, dx: f64, dy: f64) -> bool {
        let Some(scale) = self.current.screen_scale() else {
            return self.commit(self.last_valid);
        };
        self.commit(Viewport {
            pan_x: self.current.pan_x + dx / scale,
            pan_y: self.current.pan_y + dy / scale,
            ..self.current
        })
    }

    /// Pointer-anchored zoom to an absolute level.
    pub fn zoom_at(&mut self, anchor: ScreenPoint, new_zoom: f64) -> bool {
        if !new_zoom.is_finite() {
            tracing::warn!(new_zoom, "Rejected non-finite zoom level");
            self.rejected += 1;
            return false;
        }
        let next = zoom_around_point(&self.current, anchor, new_zoom);
        self.commit(next)
    }

    /// Pointer-anchored zoom by one wheel step. Negative delta zooms in.
    pub fn zoom_by_wheel(&mut self, anchor: ScreenPoint, delta_y: f64) -> bool {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return false;
        }
        let factor = if delta_y < 0.0 {
            WHEEL_ZOOM_FACTOR
        } else {
            1.0 / WHEEL_ZOOM_FACTOR
        };
        self.zoom_at(anchor, self.current.zoom * factor)
    }

    /// Zoom and pan so that `rect` fills the surface with a small margin.
    pub fn fit_rect(&mut self, rect: WorldRect, surface: SurfaceSize) -> bool {
        if rect.is_empty() || !rect.is_finite() || surface.is_degenerate() {
            tracing::debug!(?rect, ?surface, "Skipping fit to empty rect or surface");
            return false;
        }
        let dpr = self.current.device_pixel_ratio;
        let zoom_x = surface.width * dpr / rect.width;
        let zoom_y = surface.height * dpr / rect.height;
        let zoom = (zoom_x.min(zoom_y) * FIT_MARGIN).clamp(MIN_ZOOM, MAX_ZOOM);
        let center = rect.center();

        self.commit(Viewport {
            zoom,
            pan_x: surface.width / 2.0 * dpr / zoom - center.x,
            pan_y: surface.height / 2.0 * dpr / zoom - center.y,
            device_pixel_ratio: dpr,
        })
    }

    fn commit(&mut self, candidate: Viewport) -> bool {
        let candidate = candidate.clamped();
        if candidate.is_valid() {
            self.current = candidate;
            self.last_valid = candidate;
            true
        } else {
            tracing::warn!(
                ?candidate,
                fallback = ?self.last_valid,
                "Invalid viewport, restoring last valid value"
            );
            self.current = self.last_valid;
            self.rejected += 1;
            false
        }
    }
}
