//! Redraw scheduling for the grid.
//!
//! The host forwards viewport changes and animation-frame ticks; the
//! scheduler decides whether the grid needs a new frame. Pans below a
//! spacing-relative threshold reuse the previous frame. Dot grids hide their
//! dots while a pan is in progress and redraw once the pan has settled.

use atelier_core::{SurfaceSize, Viewport};
use serde::{Deserialize, Serialize};

use crate::grid::{DrawOutcome, GridConfig, GridRenderer, GridStyle};

/// Scheduler tuning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Lines redraw after panning `spacing / lines_pan_divisor`.
    pub lines_pan_divisor: f64,
    /// Dots redraw after panning `spacing / dots_pan_divisor`.
    pub dots_pan_divisor: f64,
    /// Delay between pan end and the dot redraw.
    pub dot_debounce_ms: u64,
    /// Interval of the backstop redraw. Zero disables it.
    pub fallback_poll_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lines_pan_divisor: 2.0,
            dots_pan_divisor: 3.0,
            dot_debounce_ms: 100,
            fallback_poll_ms: 2000,
        }
    }
}

/// Why a redraw was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawReason {
    /// First frame after mount.
    Mount,
    /// The host loaded another project.
    ProjectChanged,
    /// Pan distance crossed the threshold.
    PanThreshold,
    /// Zoom changed.
    ZoomChanged,
    /// Device pixel ratio changed.
    PixelRatioChanged,
    /// Surface was resized.
    Resized,
    /// Grid style changed.
    StyleChanged,
    /// Previous draw was deferred on an unusable surface.
    SurfaceRetry,
    /// Dot pan settled after the debounce.
    PanSettled,
    /// Backstop timer fired.
    FallbackPoll,
}

/// What the host should do now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedrawDecision {
    /// Keep the current frame.
    Idle,
    /// Draw a new frame.
    Redraw(RedrawReason),
    /// Hide dots until the pan ends; axis lines stay.
    SuppressCoarse,
}

/// Decides when the grid redraws.
#[derive(Debug, Clone)]
pub struct RedrawScheduler {
    config: SchedulerConfig,
    spacing: f64,
    style: GridStyle,
    mounted: bool,
    last_drawn: Option<Viewport>,
    pending: Option<RedrawReason>,
    coarse_hidden: bool,
    settle_at_ms: Option<u64>,
    next_poll_ms: Option<u64>,
}

impl RedrawScheduler {
    /// Create an unmounted scheduler.
    #[must_use]
    pub fn new(config: SchedulerConfig, spacing: f64, style: GridStyle) -> Self {
        Self {
            config,
            spacing,
            style,
            mounted: false,
            last_drawn: None,
            pending: None,
            coarse_hidden: false,
            settle_at_ms: None,
            next_poll_ms: None,
        }
    }

    /// Scheduler tuning.
    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Whether mounted and not cancelled.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    /// Whether dots are currently hidden for a pan.
    #[must_use]
    pub fn coarse_hidden(&self) -> bool {
        self.coarse_hidden
    }

    /// Redraw queued for the next frame.
    #[must_use]
    pub fn pending(&self) -> Option<RedrawReason> {
        self.pending
    }

    /// Pan distance, in world units, that triggers a redraw.
    #[must_use]
    pub fn pan_threshold(&self) -> f64 {
        let divisor = match self.style {
            GridStyle::Dots => self.config.dots_pan_divisor,
            GridStyle::Lines | GridStyle::Solid => self.config.lines_pan_divisor,
        };
        self.spacing / divisor
    }

    /// Component mounted: draw on the next frame and arm the backstop.
    pub fn mount(&mut self, now_ms: u64) {
        self.mounted = true;
        self.pending = Some(RedrawReason::Mount);
        self.arm_poll(now_ms);
    }

    /// External signal that a different project is loaded.
    pub fn project_changed(&mut self) {
        self.request(RedrawReason::ProjectChanged);
    }

    /// The surface changed size.
    pub fn resized(&mut self) {
        self.request(RedrawReason::Resized);
    }

    /// Switch style and queue a redraw.
    pub fn set_style(&mut self, style: GridStyle) {
        if self.style != style {
            self.style = style;
            self.coarse_hidden = false;
            self.request(RedrawReason::StyleChanged);
        }
    }

    /// The last draw was deferred; retry on the next frame.
    pub fn surface_deferred(&mut self) {
        if self.mounted {
            self.pending = Some(RedrawReason::SurfaceRetry);
        }
    }

    fn request(&mut self, reason: RedrawReason) {
        if !self.mounted {
            return;
        }
        // Mount wins over anything queued before the first frame
        if self.pending != Some(RedrawReason::Mount) {
            self.pending = Some(reason);
        }
    }

    fn arm_poll(&mut self, now_ms: u64) {
        self.next_poll_ms = (self.config.fallback_poll_ms > 0)
            .then(|| now_ms.saturating_add(self.config.fallback_poll_ms));
    }

    /// Decide on a viewport change.
    pub fn on_viewport(&mut self, viewport: &Viewport, panning: bool) -> RedrawDecision {
        if !self.mounted {
            return RedrawDecision::Idle;
        }
        if let Some(reason) = self.pending {
            return RedrawDecision::Redraw(reason);
        }
        let Some(last) = self.last_drawn else {
            return RedrawDecision::Redraw(RedrawReason::Mount);
        };
        if (viewport.zoom - last.zoom).abs() > f64::EPSILON {
            return RedrawDecision::Redraw(RedrawReason::ZoomChanged);
        }
        if (viewport.device_pixel_ratio - last.device_pixel_ratio).abs() > f64::EPSILON {
            return RedrawDecision::Redraw(RedrawReason::PixelRatioChanged);
        }

        if panning && self.style == GridStyle::Dots {
            self.settle_at_ms = None;
            if self.coarse_hidden {
                return RedrawDecision::Idle;
            }
            self.coarse_hidden = true;
            tracing::trace!("Dot grid hidden for pan");
            return RedrawDecision::SuppressCoarse;
        }

        let moved = (viewport.pan_x - last.pan_x).hypot(viewport.pan_y - last.pan_y);
        if moved > self.pan_threshold() {
            RedrawDecision::Redraw(RedrawReason::PanThreshold)
        } else {
            RedrawDecision::Idle
        }
    }

    /// The pan gesture finished. Dot grids redraw after the debounce.
    pub fn pan_ended(&mut self, now_ms: u64) {
        if self.coarse_hidden {
            self.settle_at_ms = Some(now_ms.saturating_add(self.config.dot_debounce_ms));
        }
    }

    /// Animation-frame and timer tick.
    pub fn poll(&mut self, now_ms: u64) -> RedrawDecision {
        if !self.mounted {
            return RedrawDecision::Idle;
        }
        if let Some(reason) = self.pending {
            return RedrawDecision::Redraw(reason);
        }
        if self.settle_at_ms.is_some_and(|at| now_ms >= at) {
            self.settle_at_ms = None;
            return RedrawDecision::Redraw(RedrawReason::PanSettled);
        }
        if self.next_poll_ms.is_some_and(|at| now_ms >= at) {
            self.arm_poll(now_ms);
            if !self.coarse_hidden {
                return RedrawDecision::Redraw(RedrawReason::FallbackPoll);
            }
        }
        RedrawDecision::Idle
    }

    /// A frame was published for `viewport`.
    pub fn redrawn(&mut self, viewport: Viewport) {
        self.last_drawn = Some(viewport);
        self.pending = None;
        self.coarse_hidden = false;
        self.settle_at_ms = None;
    }

    /// Cancel every scheduled redraw (teardown).
    pub fn cancel(&mut self) {
        self.mounted = false;
        self.pending = None;
        self.last_drawn = None;
        self.coarse_hidden = false;
        self.settle_at_ms = None;
        self.next_poll_ms = None;
        tracing::debug!("Grid redraw schedule cancelled");
    }
}

/// Grid renderer plus its scheduler, fed by host events.
#[derive(Debug)]
pub struct GridDriver {
    renderer: GridRenderer,
    scheduler: RedrawScheduler,
    surface: SurfaceSize,
}

impl GridDriver {
    /// Create an unmounted driver.
    #[must_use]
    pub fn new(grid: GridConfig, schedule: SchedulerConfig) -> Self {
        let scheduler = RedrawScheduler::new(schedule, grid.spacing, grid.style);
        Self {
            renderer: GridRenderer::new(grid),
            scheduler,
            surface: SurfaceSize::default(),
        }
    }

    /// The renderer.
    #[must_use]
    pub fn renderer(&self) -> &GridRenderer {
        &self.renderer
    }

    /// The scheduler.
    #[must_use]
    pub fn scheduler(&self) -> &RedrawScheduler {
        &self.scheduler
    }

    /// Current surface size.
    #[must_use]
    pub fn surface(&self) -> SurfaceSize {
        self.surface
    }

    /// Mount on a surface and draw the first frame.
    pub fn mount(
        &mut self,
        viewport: &Viewport,
        surface: SurfaceSize,
        now_ms: u64,
    ) -> Option<DrawOutcome> {
        self.surface = surface;
        self.scheduler.mount(now_ms);
        self.frame(viewport, now_ms)
    }

    /// Surface resized.
    pub fn resize(&mut self, surface: SurfaceSize) {
        if self.surface != surface {
            self.surface = surface;
            self.scheduler.resized();
        }
    }

    /// Switch grid style.
    pub fn set_style(&mut self, style: GridStyle) {
        self.renderer.set_style(style);
        self.scheduler.set_style(style);
    }

    /// Another project was loaded.
    pub fn project_changed(&mut self) {
        self.scheduler.project_changed();
    }

    /// Viewport changed. Returns the outcome when a frame was drawn.
    pub fn viewport_changed(&mut self, viewport: &Viewport, panning: bool) -> Option<DrawOutcome> {
        match self.scheduler.on_viewport(viewport, panning) {
            RedrawDecision::Idle => None,
            RedrawDecision::SuppressCoarse => {
                self.renderer.set_dots_visible(false);
                None
            }
            RedrawDecision::Redraw(reason) => Some(self.redraw(viewport, reason)),
        }
    }

    /// The pan gesture ended.
    pub fn pan_ended(&mut self, now_ms: u64) {
        self.scheduler.pan_ended(now_ms);
    }

    /// Animation-frame tick.
    pub fn frame(&mut self, viewport: &Viewport, now_ms: u64) -> Option<DrawOutcome> {
        match self.scheduler.poll(now_ms) {
            RedrawDecision::Redraw(reason) => Some(self.redraw(viewport, reason)),
            RedrawDecision::Idle | RedrawDecision::SuppressCoarse => None,
        }
    }

    fn redraw(&mut self, viewport: &Viewport, reason: RedrawReason) -> DrawOutcome {
        tracing::trace!(?reason, "Grid redraw");
        let outcome = self.renderer.draw(viewport, self.surface);
        match outcome {
            DrawOutcome::Drawn(_) => self.scheduler.redrawn(*viewport),
            DrawOutcome::Deferred => self.scheduler.surface_deferred(),
        }
        outcome
    }

    /// Cancel scheduled work and release every primitive.
    pub fn teardown(&mut self) {
        self.scheduler.cancel();
        self.renderer.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mounted(style: GridStyle) -> RedrawScheduler {
        let mut s = RedrawScheduler::new(SchedulerConfig::default(), 30.0, style);
        s.mount(0);
        assert_eq!(s.poll(0), RedrawDecision::Redraw(RedrawReason::Mount));
        s.redrawn(Viewport::default());
        s
    }

    fn panned(x: f64) -> Viewport {
        Viewport {
            pan_x: x,
            ..Viewport::default()
        }
    }

    #[test]
    fn test_unmounted_is_idle() {
        let mut s = RedrawScheduler::new(SchedulerConfig::default(), 30.0, GridStyle::Lines);
        s.project_changed();
        assert_eq!(s.poll(10), RedrawDecision::Idle);
        assert_eq!(s.on_viewport(&panned(500.0), false), RedrawDecision::Idle);
    }

    #[test]
    fn test_lines_half_spacing_threshold() {
        let mut s = mounted(GridStyle::Lines);
        assert_eq!(s.on_viewport(&panned(14.0), true), RedrawDecision::Idle);
        assert_eq!(
            s.on_viewport(&panned(16.0), true),
            RedrawDecision::Redraw(RedrawReason::PanThreshold)
        );
    }

    #[test]
    fn test_dots_third_spacing_threshold() {
        let mut s = mounted(GridStyle::Dots);
        assert_eq!(s.on_viewport(&panned(9.0), false), RedrawDecision::Idle);
        assert_eq!(
            s.on_viewport(&panned(11.0), false),
            RedrawDecision::Redraw(RedrawReason::PanThreshold)
        );
    }

    #[test]
    fn test_dots_suppressed_during_pan_then_debounced() {
        let mut s = mounted(GridStyle::Dots);
        assert_eq!(s.on_viewport(&panned(100.0), true), RedrawDecision::SuppressCoarse);
        assert_eq!(s.on_viewport(&panned(200.0), true), RedrawDecision::Idle);

        s.pan_ended(1000);
        assert_eq!(s.poll(1050), RedrawDecision::Idle);
        assert_eq!(s.poll(1100), RedrawDecision::Redraw(RedrawReason::PanSettled));
        s.redrawn(panned(200.0));
        assert!(!s.coarse_hidden());
    }

    #[test]
    fn test_zoom_always_redraws() {
        let mut s = mounted(GridStyle::Dots);
        let zoomed = Viewport {
            zoom: 1.5,
            ..Viewport::default()
        };
        assert_eq!(
            s.on_viewport(&zoomed, true),
            RedrawDecision::Redraw(RedrawReason::ZoomChanged)
        );
    }

    #[test]
    fn test_project_changed_and_fallback_poll() {
        let mut s = mounted(GridStyle::Lines);
        s.project_changed();
        assert_eq!(s.poll(5), RedrawDecision::Redraw(RedrawReason::ProjectChanged));
        s.redrawn(Viewport::default());

        assert_eq!(s.poll(1999), RedrawDecision::Idle);
        assert_eq!(s.poll(2000), RedrawDecision::Redraw(RedrawReason::FallbackPoll));
        s.redrawn(Viewport::default());
        assert_eq!(s.poll(2001), RedrawDecision::Idle);
    }

    #[test]
    fn test_cancel_drops_pending_work() {
        let mut s = mounted(GridStyle::Dots);
        s.on_viewport(&panned(100.0), true);
        s.pan_ended(10);
        s.cancel();
        assert_eq!(s.poll(500), RedrawDecision::Idle);
        assert!(!s.is_mounted());
    }

    #[test]
    fn test_driver_retries_deferred_surface() {
        let mut driver = GridDriver::new(GridConfig::default(), SchedulerConfig::default());
        let v = Viewport::default();
        assert_eq!(driver.mount(&v, SurfaceSize::new(0.0, 0.0), 0), Some(DrawOutcome::Deferred));
        assert_eq!(driver.scheduler().pending(), Some(RedrawReason::SurfaceRetry));

        driver.resize(SurfaceSize::new(640.0, 480.0));
        let outcome = driver.frame(&v, 16);
        assert!(matches!(outcome, Some(DrawOutcome::Drawn(_))));
        assert_eq!(driver.scheduler().pending(), None);
    }

    #[test]
    fn test_driver_teardown_releases_pool() {
        let mut driver = GridDriver::new(GridConfig::default(), SchedulerConfig::default());
        driver.mount(&Viewport::default(), SurfaceSize::new(640.0, 480.0), 0);
        assert!(driver.renderer().pool().live_count() > 0);
        driver.teardown();
        assert_eq!(driver.renderer().pool().drawable_count(), 0);
        assert_eq!(driver.frame(&Viewport::default(), 5000), None);
    }
}
