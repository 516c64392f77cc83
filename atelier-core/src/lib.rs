//! # Atelier Core
//!
//! Spatial core of an infinite-canvas design tool: where things appear and
//! in what order they are composited.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                atelier-core                 │
//! ├─────────────────────────────────────────────┤
//! │  Coordinate Transform │  Ordering Store     │
//! │  - world <-> screen   │  - layers / items   │
//! │  - anchored zoom      │  - drop prediction  │
//! │  - last-valid guard   │  - change feed      │
//! ├─────────────────────────────────────────────┤
//! │  Canvas Session       │  Instance Registry  │
//! │  - pointer / wheel    │  - image / 3D owner │
//! │  - drag and drop      │    layer tracking   │
//! └─────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod event;
pub mod geometry;
pub mod item;
pub mod ordering;
pub mod registry;
pub mod state;
pub mod viewport;

pub use error::{CanvasError, CanvasResult};
pub use event::{DragEntity, DragEvent, DragPhase, InputEvent, PointerButton};
pub use geometry::{ScreenPoint, SurfaceSize, WorldPoint, WorldRect};
pub use item::{InstanceId, Item, ItemId, ItemKind, Layer, LayerId};
pub use ordering::{
    DropPosition, NoOpReason, OrderSnapshot, OrderingStore, ReorderOutcome, StoreChange,
};
pub use registry::{
    AssetInstance, InstanceChange, InstanceKind, InstanceRegistry, LayerAssociation, NoInstances,
};
pub use state::{CanvasSession, DropIndicator, DropList, SessionUpdate};
pub use viewport::{
    client_to_world, screen_to_world, visible_world_rect, world_to_screen, zoom_around_point,
    Viewport, ViewportController, MAX_ZOOM, MIN_ZOOM,
};

/// Atelier core version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
