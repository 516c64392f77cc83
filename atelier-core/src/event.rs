//! Input events delivered by the DOM host.
//!
//! Pointer coordinates are `clientX`/`clientY` in CSS pixels; conversion to
//! world space happens in [`crate::state::CanvasSession`].

use serde::{Deserialize, Serialize};

use crate::item::{ItemId, LayerId};

/// Phase of a layer-panel drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DragPhase {
    /// Drag started.
    Start,
    /// Pointer is over a potential drop target (`dragover`).
    Over,
    /// Pointer released over a target.
    Drop,
    /// Drag cancelled (escape, left the panel).
    Cancel,
}

/// What is being dragged, or what it is dragged onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum DragEntity {
    /// A layer row (as a target of an item drag: the layer header).
    Layer(LayerId),
    /// An item row.
    Item(ItemId),
}

/// A drag event from the layer panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DragEvent {
    /// Drag phase.
    pub phase: DragPhase,
    /// Dragged entity.
    pub source: DragEntity,
    /// Row under the pointer, if any.
    pub target: Option<DragEntity>,
    /// Pointer offset from the top of the target row, in CSS pixels.
    pub row_offset_y: f64,
    /// Height of the target row, in CSS pixels.
    pub row_height: f64,
    /// Timestamp in milliseconds. `Over` events older than the newest one
    /// already seen in the gesture are dropped.
    pub timestamp_ms: u64,
}

impl DragEvent {
    /// Create a drag event with no target.
    #[must_use]
    pub fn new(phase: DragPhase, source: DragEntity, timestamp_ms: u64) -> Self {
        Self {
            phase,
            source,
            target: None,
            row_offset_y: 0.0,
            row_height: 0.0,
            timestamp_ms,
        }
    }

    /// Set the target row and pointer offset inside it.
    #[must_use]
    pub fn over(mut self, target: DragEntity, row_offset_y: f64, row_height: f64) -> Self {
        self.target = Some(target);
        self.row_offset_y = row_offset_y;
        self.row_height = row_height;
        self
    }
}

/// Mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    /// Primary button.
    Primary,
    /// Middle button (pans the canvas).
    Middle,
    /// Secondary button.
    Secondary,
}

/// All input events the engine consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InputEvent {
    /// Button press or release on the canvas.
    Pointer {
        /// X in CSS pixels (`clientX`).
        client_x: f64,
        /// Y in CSS pixels (`clientY`).
        client_y: f64,
        /// Button.
        button: PointerButton,
        /// Whether the button is pressed.
        pressed: bool,
    },

    /// Pointer movement over the canvas.
    PointerMove {
        /// X in CSS pixels (`clientX`).
        client_x: f64,
        /// Y in CSS pixels (`clientY`).
        client_y: f64,
    },

    /// Wheel or trackpad scroll.
    Wheel {
        /// X in CSS pixels (`clientX`).
        client_x: f64,
        /// Y in CSS pixels (`clientY`).
        client_y: f64,
        /// Scroll delta; negative scrolls up.
        delta_y: f64,
    },

    /// Layer-panel drag and drop.
    Drag(DragEvent),

    /// The device pixel ratio changed.
    DevicePixelRatio(f64),
}
