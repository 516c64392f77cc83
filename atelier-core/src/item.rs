//! Layers and items - the units of draw order.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geometry::{WorldPoint, WorldRect};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            /// Create a new unique ID.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID.
            #[must_use]
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a layer.
    LayerId
);
uuid_id!(
    /// Unique identifier for an item.
    ItemId
);
uuid_id!(
    /// Unique identifier for an asset instance (image or 3D model).
    InstanceId
);

/// What an item draws. Set at creation and matched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ItemKind {
    /// A vector path.
    Path,
    /// A raster image backed by an asset instance.
    Image {
        /// Asset instance rendered by this item.
        instance: InstanceId,
    },
    /// A 3D model viewport backed by an asset instance.
    Model {
        /// Asset instance rendered by this item.
        instance: InstanceId,
    },
    /// Editor chrome (selection handles, background rects). Never part of
    /// thumbnails or hit-testing.
    Helper,
}

impl ItemKind {
    /// Kinds that carry their own pre-rendered surface.
    #[must_use]
    pub const fn is_rich(&self) -> bool {
        match self {
            Self::Image { .. } | Self::Model { .. } => true,
            Self::Path | Self::Helper => false,
        }
    }

    /// Asset instance backing this item, if any.
    #[must_use]
    pub const fn instance(&self) -> Option<InstanceId> {
        match self {
            Self::Image { instance } | Self::Model { instance } => Some(*instance),
            Self::Path | Self::Helper => None,
        }
    }
}

/// A named layer. `order` is its dense index in the layer list (0 = top).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Unique identifier.
    pub id: LayerId,
    /// Display name.
    pub name: String,
    /// Whether the layer is drawn.
    pub visible: bool,
    /// Whether the layer's items accept pointer interaction.
    pub locked: bool,
    /// Position in the layer list.
    pub order: u32,
}

impl Layer {
    /// Create a visible, unlocked layer.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: LayerId::new(),
            name: name.into(),
            visible: true,
            locked: false,
            order: 0,
        }
    }
}

/// A drawable item. `z_index` is its dense index within its layer (0 = front).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier.
    pub id: ItemId,
    /// Owning layer.
    pub layer_id: LayerId,
    /// Content kind.
    pub kind: ItemKind,
    /// Whether the item is drawn.
    pub visible: bool,
    /// Whether the item accepts pointer interaction.
    pub locked: bool,
    /// Position within the owning layer.
    pub z_index: u32,
    /// Bounds in world units.
    pub bounds: WorldRect,
}

impl Item {
    /// Create a visible, unlocked item. The owning layer is assigned on insert.
    #[must_use]
    pub fn new(kind: ItemKind, bounds: WorldRect) -> Self {
        Self {
            id: ItemId::new(),
            layer_id: LayerId::from_uuid(Uuid::nil()),
            kind,
            visible: true,
            locked: false,
            z_index: 0,
            bounds,
        }
    }

    /// Set whether the item is visible.
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set whether the item is locked.
    #[must_use]
    pub fn with_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    /// Check if a world point is within this item.
    #[must_use]
    pub fn contains_point(&self, p: WorldPoint) -> bool {
        self.bounds.contains(p)
    }
}
