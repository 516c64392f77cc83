//! Asset instance registry.
//!
//! Image and 3D model instances live outside the ordering store but record
//! which layer owns them. The store updates that association through the
//! [`LayerAssociation`] trait when an item moves between layers, so the
//! registry is passed in explicitly instead of living in ambient state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::item::{InstanceId, ItemId, LayerId};

/// Kind of asset instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceKind {
    /// Raster image.
    Image,
    /// 3D model.
    Model,
}

/// An asset instance and its layer association.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInstance {
    /// Unique identifier.
    pub id: InstanceId,
    /// Item rendering this instance.
    pub item_id: ItemId,
    /// Instance kind.
    pub kind: InstanceKind,
    /// Layer that currently owns the item.
    pub layer_id: LayerId,
}

/// Change notification emitted by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceChange {
    /// Instance that changed.
    pub instance: InstanceId,
    /// Previous owning layer.
    pub from_layer: LayerId,
    /// New owning layer.
    pub to_layer: LayerId,
}

/// Contract for updating instance ownership after a cross-layer move.
pub trait LayerAssociation {
    /// Re-point every instance rendered by `item` to `layer`.
    ///
    /// Returns the number of instances updated.
    fn reassign_layer(&mut self, item: ItemId, layer: LayerId) -> usize;
}

/// Registry that never tracks anything, for callers without asset instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInstances;

impl LayerAssociation for NoInstances {
    fn reassign_layer(&mut self, _item: ItemId, _layer: LayerId) -> usize {
        0
    }
}

/// Registry of image and 3D model instances.
#[derive(Debug, Clone, Default)]
pub struct InstanceRegistry {
    instances: HashMap<InstanceId, AssetInstance>,
    pending: Vec<InstanceChange>,
}

impl InstanceRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an instance, replacing any previous entry with the same id.
    pub fn register(&mut self, instance: AssetInstance) {
        self.instances.insert(instance.id, instance);
    }

    /// Remove an instance.
    pub fn unregister(&mut self, id: InstanceId) -> Option<AssetInstance> {
        self.instances.remove(&id)
    }

    /// Look up an instance.
    #[must_use]
    pub fn get(&self, id: InstanceId) -> Option<&AssetInstance> {
        self.instances.get(&id)
    }

    /// All instances rendered by an item.
    pub fn for_item(&self, item: ItemId) -> impl Iterator<Item = &AssetInstance> {
        self.instances.values().filter(move |i| i.item_id == item)
    }

    /// Number of registered instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Check if the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Take queued change notifications.
    pub fn drain_changes(&mut self) -> Vec<InstanceChange> {
        std::mem::take(&mut self.pending)
    }
}

impl LayerAssociation for InstanceRegistry {
    fn reassign_layer(&mut self, item: ItemId, layer: LayerId) -> usize {
        let mut updated = 0;
        for instance in self.instances.values_mut().filter(|i| i.item_id == item) {
            if instance.layer_id == layer {
                continue;
            }
            self.pending.push(InstanceChange {
                instance: instance.id,
                from_layer: instance.layer_id,
                to_layer: layer,
            });
            instance.layer_id = layer;
            updated += 1;
        }
        if updated > 0 {
            tracing::debug!("Reassigned {updated} instance(s) of item {item} to layer {layer}");
        }
        updated
    }
}
