//! Canvas session state.
//!
//! Ties the viewport, ordering store and instance registry to the input
//! stream. Pointer input is converted to world space (DPR-aware) before
//! hit-testing; layer-panel drags produce a drop indicator on every
//! `dragover` and commit on drop.

use serde::{Deserialize, Serialize};

use crate::event::{DragEntity, DragEvent, DragPhase, InputEvent, PointerButton};
use crate::geometry::{ScreenPoint, WorldPoint};
use crate::item::{ItemId, LayerId};
use crate::ordering::{DropPosition, NoOpReason, OrderingStore, ReorderOutcome};
use crate::registry::InstanceRegistry;
use crate::viewport::{client_to_world, Viewport, ViewportController};

/// List a drop indicator is drawn in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "list", content = "layer", rename_all = "lowercase")]
pub enum DropList {
    /// The layer list.
    Layers,
    /// The item list of a layer.
    Items(LayerId),
}

/// Where the dragged entry would land if released now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropIndicator {
    /// List containing the drop position.
    pub list: DropList,
    /// Final index of the dragged entry in that list.
    pub index: usize,
}

/// What a processed event changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionUpdate {
    /// Nothing visible changed.
    None,
    /// Viewport changed; overlays must re-project.
    Viewport(Viewport),
    /// Selection changed.
    Selection(Option<ItemId>),
    /// Drop indicator moved or disappeared.
    Indicator(Option<DropIndicator>),
    /// A drag was committed.
    Reordered(ReorderOutcome),
}

/// The complete interactive state of one canvas.
#[derive(Debug, Clone, Default)]
pub struct CanvasSession {
    viewport: ViewportController,
    store: OrderingStore,
    registry: InstanceRegistry,
    /// Canvas element's top-left corner in client coordinates.
    canvas_origin: ScreenPoint,
    /// Last pointer position while a middle-button pan is active.
    pan_anchor: Option<ScreenPoint>,
    selection: Option<ItemId>,
    indicator: Option<DropIndicator>,
    /// Timestamp of the newest drag event seen in the current gesture.
    drag_clock_ms: Option<u64>,
}

impl CanvasSession {
    /// Create a session with the given viewport.
    #[must_use]
    pub fn new(viewport: Viewport) -> Self {
        Self {
            viewport: ViewportController::new(viewport),
            ..Self::default()
        }
    }

    /// Set where the canvas element sits in client coordinates.
    pub fn set_canvas_origin(&mut self, origin: ScreenPoint) {
        self.canvas_origin = origin;
    }

    /// Viewport snapshot for this frame.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport.snapshot()
    }

    /// Mutable viewport controller.
    pub fn viewport_mut(&mut self) -> &mut ViewportController {
        &mut self.viewport
    }

    /// The ordering store.
    #[must_use]
    pub fn store(&self) -> &OrderingStore {
        &self.store
    }

    /// Mutable ordering store.
    pub fn store_mut(&mut self) -> &mut OrderingStore {
        &mut self.store
    }

    /// The asset instance registry.
    #[must_use]
    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// Mutable asset instance registry.
    pub fn registry_mut(&mut self) -> &mut InstanceRegistry {
        &mut self.registry
    }

    /// Currently selected item.
    #[must_use]
    pub fn selection(&self) -> Option<ItemId> {
        self.selection
    }

    /// Current drop indicator, if a drag is over a valid target.
    #[must_use]
    pub fn indicator(&self) -> Option<DropIndicator> {
        self.indicator
    }

    /// Whether a pan gesture is in progress.
    #[must_use]
    pub fn is_panning(&self) -> bool {
        self.pan_anchor.is_some()
    }

    /// Convert client coordinates to world space.
    #[must_use]
    pub fn client_to_world(&self, client_x: f64, client_y: f64) -> WorldPoint {
        client_to_world(
            ScreenPoint::new(client_x, client_y),
            self.canvas_origin,
            &self.viewport.snapshot(),
        )
    }

    /// Process an input event.
    pub fn process_event(&mut self, event: &InputEvent) -> SessionUpdate {
        match event {
            InputEvent::Pointer {
                client_x,
                client_y,
                button,
                pressed,
            } => self.on_pointer(*client_x, *client_y, *button, *pressed),
            InputEvent::PointerMove { client_x, client_y } => {
                self.on_pointer_move(*client_x, *client_y)
            }
            InputEvent::Wheel {
                client_x,
                client_y,
                delta_y,
            } => {
                let anchor = self.local(*client_x, *client_y);
                if self.viewport.zoom_by_wheel(anchor, *delta_y) {
                    SessionUpdate::Viewport(self.viewport.snapshot())
                } else {
                    SessionUpdate::None
                }
            }
            InputEvent::Drag(drag) => self.on_drag(drag),
            InputEvent::DevicePixelRatio(dpr) => {
                if self.viewport.set_device_pixel_ratio(*dpr) {
                    SessionUpdate::Viewport(self.viewport.snapshot())
                } else {
                    SessionUpdate::None
                }
            }
        }
    }

    fn local(&self, client_x: f64, client_y: f64) -> ScreenPoint {
        ScreenPoint::new(client_x - self.canvas_origin.x, client_y - self.canvas_origin.y)
    }

    fn on_pointer(
        &mut self,
        client_x: f64,
        client_y: f64,
        button: PointerButton,
        pressed: bool,
    ) -> SessionUpdate {
        match (button, pressed) {
            (PointerButton::Middle, true) => {
                self.pan_anchor = Some(ScreenPoint::new(client_x, client_y));
                SessionUpdate::None
            }
            (PointerButton::Middle, false) => {
                self.pan_anchor = None;
                SessionUpdate::None
            }
            (PointerButton::Primary, true) => {
                let world = self.client_to_world(client_x, client_y);
                let hit = self.store.hit_test(world);
                if hit == self.selection {
                    return SessionUpdate::None;
                }
                tracing::debug!("Selection {:?} at world ({}, {})", hit, world.x, world.y);
                self.selection = hit;
                SessionUpdate::Selection(hit)
            }
            _ => SessionUpdate::None,
        }
    }

    fn on_pointer_move(&mut self, client_x: f64, client_y: f64) -> SessionUpdate {
        let Some(last) = self.pan_anchor else {
            return SessionUpdate::None;
        };
        self.pan_anchor = Some(ScreenPoint::new(client_x, client_y));
        if self.viewport.pan_by_screen(client_x - last.x, client_y - last.y) {
            SessionUpdate::Viewport(self.viewport.snapshot())
        } else {
            SessionUpdate::None
        }
    }

    fn on_drag(&mut self, drag: &DragEvent) -> SessionUpdate {
        match drag.phase {
            DragPhase::Start => {
                self.indicator = None;
                self.drag_clock_ms = Some(drag.timestamp_ms);
                SessionUpdate::Indicator(None)
            }
            DragPhase::Over => {
                if self.drag_clock_ms.is_some_and(|t| drag.timestamp_ms < t) {
                    tracing::trace!(
                        timestamp_ms = drag.timestamp_ms,
                        "Ignoring out-of-order dragover"
                    );
                    return SessionUpdate::None;
                }
                self.drag_clock_ms = Some(drag.timestamp_ms);
                let next = self.predict(drag);
                if next == self.indicator {
                    return SessionUpdate::None;
                }
                self.indicator = next;
                SessionUpdate::Indicator(next)
            }
            DragPhase::Drop => {
                let promised = self.predict(drag);
                let outcome = self.commit(drag);
                if let (Some(p), Some(landed)) = (promised, outcome.final_index()) {
                    if p.index != landed {
                        tracing::warn!(
                            "Drop landed at {landed}, indicator promised {}",
                            p.index
                        );
                    }
                }
                self.indicator = None;
                self.drag_clock_ms = None;
                SessionUpdate::Reordered(outcome)
            }
            DragPhase::Cancel => {
                self.indicator = None;
                self.drag_clock_ms = None;
                SessionUpdate::Indicator(None)
            }
        }
    }

    fn predict(&self, drag: &DragEvent) -> Option<DropIndicator> {
        let above = DropPosition::from_row_offset(drag.row_offset_y, drag.row_height).is_above();
        match (drag.source, drag.target?) {
            (DragEntity::Layer(source), DragEntity::Layer(target)) => {
                let index = self.store.predict_layer_insert_index(source, target, above)?;
                Some(DropIndicator {
                    list: DropList::Layers,
                    index,
                })
            }
            (DragEntity::Item(source), DragEntity::Item(target)) => {
                let index = self.store.predict_item_insert_index(source, target, above)?;
                let layer = self.store.item(target)?.layer_id;
                Some(DropIndicator {
                    list: DropList::Items(layer),
                    index,
                })
            }
            (DragEntity::Item(source), DragEntity::Layer(layer)) => {
                let current = self.store.item(source)?.layer_id;
                self.store.layer(layer)?;
                (current != layer).then_some(DropIndicator {
                    list: DropList::Items(layer),
                    index: 0,
                })
            }
            (DragEntity::Layer(_), DragEntity::Item(_)) => None,
        }
    }

    fn commit(&mut self, drag: &DragEvent) -> ReorderOutcome {
        let above = DropPosition::from_row_offset(drag.row_offset_y, drag.row_height).is_above();
        let Some(target) = drag.target else {
            return ReorderOutcome::Unchanged(NoOpReason::UnknownTarget);
        };
        match (drag.source, target) {
            (DragEntity::Layer(source), DragEntity::Layer(target)) => {
                self.store.reorder_layer(source, target, above)
            }
            (DragEntity::Item(source), DragEntity::Item(target)) => {
                self.store
                    .reorder_item(source, target, above, &mut self.registry)
            }
            (DragEntity::Item(source), DragEntity::Layer(layer)) => {
                self.store
                    .move_item_to_layer(source, layer, &mut self.registry)
            }
            (DragEntity::Layer(_), DragEntity::Item(_)) => {
                ReorderOutcome::Unchanged(NoOpReason::UnknownTarget)
            }
        }
    }
}
