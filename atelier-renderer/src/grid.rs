//! Virtualized infinite grid.
//!
//! Each redraw walks a fixed pipeline:
//!
//! ```text
//! Idle ─▶ ComputeWindow ─▶ Tile ─▶ Recycle ─▶ Publish ─▶ Idle
//!              │
//!              └─ zero-sized surface ─▶ Deferred (retry next frame)
//! ```
//!
//! The tiled window is the visible world rect plus zoom-dependent padding,
//! clamped to a fixed multiple of the visible size, so the primitive count
//! depends on the surface and zoom, never on how far the user has panned.

use atelier_core::{visible_world_rect, SurfaceSize, Viewport, WorldPoint, WorldRect};
use serde::{Deserialize, Serialize};

use crate::error::RenderResult;
use crate::pool::{
    GridPrimitive, PoolConfig, PrimitiveGeometry, PrimitiveHandle, PrimitiveKind, PrimitivePool,
};

/// Below this zoom minor lines are not emitted.
pub const MINOR_LOD_THRESHOLD: f64 = 0.3;

/// Every n-th line is major.
pub const MAJOR_EVERY: i64 = 5;

/// Tiled size limit as a multiple of the visible world size.
pub const MAX_WINDOW_MULTIPLE: f64 = 6.0;

/// How the grid is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridStyle {
    /// Major and minor lines.
    #[default]
    Lines,
    /// Dots at intersections plus the two axes.
    Dots,
    /// Plain background, no primitives.
    Solid,
}

/// Grid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Base spacing between lines in world units.
    pub spacing: f64,
    /// Drawing style.
    pub style: GridStyle,
    /// Padding per side as a fraction of the visible size at zoom >= 1.
    pub padding_base: f64,
    /// Dot radius in CSS pixels.
    pub dot_radius: f64,
    /// Upper bound on primitives emitted per frame. The effective budget is
    /// also capped by the pool's pressure threshold, see
    /// [`GridConfig::frame_budget`].
    pub max_primitives: usize,
    /// Pool limits.
    pub pool: PoolConfig,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            spacing: 25.0,
            style: GridStyle::Lines,
            padding_base: 0.25,
            dot_radius: 1.0,
            max_primitives: 8192,
            pool: PoolConfig::default(),
        }
    }
}

impl GridConfig {
    /// Parse from JSON; missing fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed.
    pub fn from_json(json: &str) -> RenderResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Primitives a single frame may emit.
    ///
    /// A full frame plus a full reuse FIFO stays within
    /// `pool.max_drawables`, so forced cleanups only happen when the pool
    /// limits are reconfigured below what a frame needs. Never less than 3
    /// (one dot plus both axes).
    #[must_use]
    pub fn frame_budget(&self) -> usize {
        let headroom = self.pool.max_drawables.saturating_sub(self.pool.capacity);
        self.max_primitives.min(headroom).max(3)
    }
}

/// Pipeline step, exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridPhase {
    /// Nothing in progress.
    Idle,
    /// Computing the padded world window.
    ComputeWindow,
    /// Emitting primitive descriptions.
    Tile,
    /// Reusing, recycling or allocating primitives.
    Recycle,
    /// Handing the frame to the host.
    Publish,
}

/// A primitive the tiler wants drawn this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileDemand {
    /// Classification.
    pub kind: PrimitiveKind,
    /// Geometry.
    pub geometry: PrimitiveGeometry,
}

/// Summary of a published frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridFrame {
    /// Tiled world window.
    pub window: WorldRect,
    /// Major lines emitted.
    pub major: usize,
    /// Minor lines emitted.
    pub minor: usize,
    /// Dots emitted.
    pub dots: usize,
    /// Primitives taken from the pool this frame.
    pub recycled: u64,
    /// Primitives allocated this frame.
    pub allocated: u64,
}

impl GridFrame {
    /// Total primitives in the frame.
    #[must_use]
    pub fn total(&self) -> usize {
        self.major + self.minor + self.dots
    }
}

/// Result of a redraw request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawOutcome {
    /// Frame published.
    Drawn(GridFrame),
    /// Surface unusable; retry next animation frame.
    Deferred,
}

/// Padding multiplier per side: grows as zoom shrinks, capped at 3x base.
#[must_use]
pub fn padding_multiplier(padding_base: f64, zoom: f64) -> f64 {
    padding_base * (1.0 / zoom).clamp(1.0, 3.0)
}

/// World window to tile for a viewport and surface.
///
/// `None` when the surface is degenerate or the viewport unusable.
#[must_use]
pub fn grid_window(
    viewport: &Viewport,
    surface: SurfaceSize,
    padding_base: f64,
) -> Option<WorldRect> {
    if surface.is_degenerate() || !viewport.is_valid() {
        return None;
    }
    let visible = visible_world_rect(viewport, surface);
    let m = padding_multiplier(padding_base, viewport.zoom);
    let padded = visible.expand(visible.width * m, visible.height * m);
    let window = padded.clamp_size_around(
        visible.center(),
        visible.width * MAX_WINDOW_MULTIPLE,
        visible.height * MAX_WINDOW_MULTIPLE,
    );
    window.is_finite().then_some(window)
}

#[allow(clippy::cast_possible_truncation)]
fn line_range(min: f64, max: f64, spacing: f64) -> (i64, i64) {
    ((min / spacing).ceil() as i64, (max / spacing).floor() as i64)
}

/// Line indices in `lo..=hi` that are multiples of `stride`.
fn multiples(lo: i64, hi: i64, stride: i64) -> impl Iterator<Item = i64> {
    let first = lo.saturating_add((stride - lo.rem_euclid(stride)) % stride);
    (first..=hi).step_by(usize::try_from(stride).unwrap_or(usize::MAX))
}

fn multiples_in(lo: i64, hi: i64, stride: i64) -> usize {
    let first = lo.saturating_add((stride - lo.rem_euclid(stride)) % stride);
    if first > hi {
        0
    } else {
        usize::try_from(hi.saturating_sub(first) / stride + 1).unwrap_or(usize::MAX)
    }
}

fn kind_for(index: i64) -> PrimitiveKind {
    if index.rem_euclid(MAJOR_EVERY) == 0 {
        PrimitiveKind::Major
    } else {
        PrimitiveKind::Minor
    }
}

/// Emit the primitives for one frame.
///
/// Lines: one per multiple of `spacing` inside `window`, major when the line
/// index is a multiple of [`MAJOR_EVERY`]. Minor lines are dropped below
/// [`MINOR_LOD_THRESHOLD`]. If the result would exceed
/// [`GridConfig::frame_budget`], the stride is coarsened by factors of five.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn tile(window: WorldRect, zoom: f64, config: &GridConfig) -> Vec<TileDemand> {
    let spacing = config.spacing;
    if !(spacing.is_finite() && spacing > 0.0) || !window.is_finite() {
        return Vec::new();
    }
    let (x_lo, x_hi) = line_range(window.x, window.right(), spacing);
    let (y_lo, y_hi) = line_range(window.y, window.bottom(), spacing);

    let mut stride: i64 = if zoom < MINOR_LOD_THRESHOLD { MAJOR_EVERY } else { 1 };
    let budget = config.frame_budget();
    // Past this stride each axis holds at most one multiple
    let span = x_hi
        .saturating_sub(x_lo)
        .max(y_hi.saturating_sub(y_lo))
        .max(0)
        .saturating_add(1);

    match config.style {
        GridStyle::Solid => Vec::new(),
        GridStyle::Lines => {
            while stride <= span
                && multiples_in(x_lo, x_hi, stride)
                    .saturating_add(multiples_in(y_lo, y_hi, stride))
                    > budget
            {
                stride = stride.saturating_mul(MAJOR_EVERY);
            }
            let mut out = Vec::new();
            for i in multiples(x_lo, x_hi, stride) {
                let x = i as f64 * spacing;
                out.push(TileDemand {
                    kind: kind_for(i),
                    geometry: PrimitiveGeometry::Line {
                        from: WorldPoint::new(x, window.y),
                        to: WorldPoint::new(x, window.bottom()),
                    },
                });
            }
            for j in multiples(y_lo, y_hi, stride) {
                let y = j as f64 * spacing;
                out.push(TileDemand {
                    kind: kind_for(j),
                    geometry: PrimitiveGeometry::Line {
                        from: WorldPoint::new(window.x, y),
                        to: WorldPoint::new(window.right(), y),
                    },
                });
            }
            out
        }
        GridStyle::Dots => {
            while stride <= span
                && multiples_in(x_lo, x_hi, stride)
                    .saturating_mul(multiples_in(y_lo, y_hi, stride))
                    .saturating_add(2)
                    > budget
            {
                stride = stride.saturating_mul(MAJOR_EVERY);
            }
            let mut out = axis_lines(window);
            let columns: Vec<i64> = multiples(x_lo, x_hi, stride).collect();
            for j in multiples(y_lo, y_hi, stride) {
                for &i in &columns {
                    out.push(TileDemand {
                        kind: PrimitiveKind::Dot,
                        geometry: PrimitiveGeometry::Dot {
                            center: WorldPoint::new(i as f64 * spacing, j as f64 * spacing),
                            radius: config.dot_radius,
                        },
                    });
                }
            }
            out
        }
    }
}

/// The x = 0 and y = 0 axes, where they cross the window.
fn axis_lines(window: WorldRect) -> Vec<TileDemand> {
    let mut out = Vec::with_capacity(2);
    if window.x <= 0.0 && window.right() >= 0.0 {
        out.push(TileDemand {
            kind: PrimitiveKind::Major,
            geometry: PrimitiveGeometry::Line {
                from: WorldPoint::new(0.0, window.y),
                to: WorldPoint::new(0.0, window.bottom()),
            },
        });
    }
    if window.y <= 0.0 && window.bottom() >= 0.0 {
        out.push(TileDemand {
            kind: PrimitiveKind::Major,
            geometry: PrimitiveGeometry::Line {
                from: WorldPoint::new(window.x, 0.0),
                to: WorldPoint::new(window.right(), 0.0),
            },
        });
    }
    out
}

/// Pooled grid renderer.
#[derive(Debug)]
pub struct GridRenderer {
    config: GridConfig,
    pool: PrimitivePool,
    active: Vec<PrimitiveHandle>,
    phase: GridPhase,
    style_version: u32,
    last_frame: Option<GridFrame>,
    retry_pending: bool,
}

impl GridRenderer {
    /// Create a renderer.
    #[must_use]
    pub fn new(config: GridConfig) -> Self {
        let pool = PrimitivePool::new(config.pool);
        Self {
            config,
            pool,
            active: Vec::new(),
            phase: GridPhase::Idle,
            style_version: 0,
            last_frame: None,
            retry_pending: false,
        }
    }

    /// Current pipeline step.
    #[must_use]
    pub fn phase(&self) -> GridPhase {
        self.phase
    }

    /// Grid configuration.
    #[must_use]
    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    /// The primitive pool.
    #[must_use]
    pub fn pool(&self) -> &PrimitivePool {
        &self.pool
    }

    /// Summary of the last published frame.
    #[must_use]
    pub fn last_frame(&self) -> Option<&GridFrame> {
        self.last_frame.as_ref()
    }

    /// Whether the last draw was deferred.
    #[must_use]
    pub fn retry_pending(&self) -> bool {
        self.retry_pending
    }

    /// Current style generation.
    #[must_use]
    pub fn style_version(&self) -> u32 {
        self.style_version
    }

    /// Change the drawing style. Takes effect on the next draw.
    pub fn set_style(&mut self, style: GridStyle) {
        if self.config.style == style {
            return;
        }
        self.config.style = style;
        self.style_version = self.style_version.wrapping_add(1);
        tracing::debug!("Grid style set to {style:?} (version {})", self.style_version);
    }

    /// Primitives the host should draw.
    pub fn primitives(&self) -> impl Iterator<Item = &GridPrimitive> {
        self.pool.visible()
    }

    /// Hide or show every dot while keeping axis lines (used during pans).
    pub fn set_dots_visible(&mut self, visible: bool) {
        for &handle in &self.active {
            if let Some(p) = self.pool.get_mut(handle) {
                if p.kind == PrimitiveKind::Dot {
                    p.visible = visible;
                }
            }
        }
    }

    /// Run one redraw cycle.
    pub fn draw(&mut self, viewport: &Viewport, surface: SurfaceSize) -> DrawOutcome {
        self.phase = GridPhase::ComputeWindow;
        let Some(window) = grid_window(viewport, surface, self.config.padding_base) else {
            tracing::debug!(?surface, "Grid draw deferred: unusable surface or viewport");
            self.phase = GridPhase::Idle;
            self.retry_pending = true;
            return DrawOutcome::Deferred;
        };
        self.retry_pending = false;

        self.phase = GridPhase::Tile;
        let demand = tile(window, viewport.zoom, &self.config);

        self.phase = GridPhase::Recycle;
        let before = *self.pool.stats();
        self.recycle(&demand);
        if self.pool.under_pressure() {
            self.pool.cleanup();
        }
        let after = *self.pool.stats();

        self.phase = GridPhase::Publish;
        let mut frame = GridFrame {
            window,
            major: 0,
            minor: 0,
            dots: 0,
            recycled: after.recycled - before.recycled,
            allocated: after.allocated - before.allocated,
        };
        for d in &demand {
            match d.kind {
                PrimitiveKind::Major => frame.major += 1,
                PrimitiveKind::Minor => frame.minor += 1,
                PrimitiveKind::Dot => frame.dots += 1,
            }
        }
        tracing::trace!(
            "Grid frame: {} major, {} minor, {} dots, window {:?}",
            frame.major,
            frame.minor,
            frame.dots,
            window
        );
        self.last_frame = Some(frame);
        self.phase = GridPhase::Idle;
        DrawOutcome::Drawn(frame)
    }

    /// Reuse last frame's primitives in place, then the FIFO, then allocate.
    fn recycle(&mut self, demand: &[TileDemand]) {
        let version = self.style_version;
        let previous = std::mem::take(&mut self.active);
        let mut reusable = previous.into_iter();
        let mut active = Vec::with_capacity(demand.len());

        for d in demand {
            let reused = reusable
                .by_ref()
                .find(|&h| self.pool.update(h, d.kind, d.geometry, version));
            let handle =
                reused.unwrap_or_else(|| self.pool.acquire(d.kind, d.geometry, version));
            active.push(handle);
        }
        for leftover in reusable {
            self.pool.retire(leftover);
        }
        self.active = active;
    }

    /// Release every primitive (component teardown).
    pub fn teardown(&mut self) {
        self.active.clear();
        self.pool.release_all();
        self.phase = GridPhase::Idle;
        self.retry_pending = false;
        self.last_frame = None;
    }
}
