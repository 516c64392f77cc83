//! Layer and item ordering.
//!
//! The store keeps an ordered list of layers (index 0 is the top of the
//! layer panel) and, per layer, an ordered list of items (index 0 is the
//! front). `Layer::order` and `Item::z_index` always mirror those positions,
//! so both are dense and gapless after every mutation.
//!
//! ## Drop arithmetic
//!
//! Moving an entry removes it first, which shifts every later index down by
//! one. The insertion index therefore depends on which side of the target the
//! source started on:
//!
//! ```text
//! source before target:  above -> target - 1   below -> target
//! source after target:   above -> target       below -> target + 1
//! source in other list:  above -> target       below -> target + 1
//! ```
//!
//! [`OrderingStore::predict_layer_insert_index`] and
//! [`OrderingStore::predict_item_insert_index`] run the same arithmetic
//! without mutating, so a drop indicator drawn during `dragover` shows exactly
//! where the committed move lands.

use serde::{Deserialize, Serialize};

use crate::geometry::{WorldPoint, WorldRect};
use crate::item::{Item, ItemId, ItemKind, Layer, LayerId};
use crate::registry::LayerAssociation;
use crate::{CanvasError, CanvasResult};

/// Which half of a drop target the pointer is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DropPosition {
    /// Insert before the target.
    Above,
    /// Insert after the target.
    Below,
}

impl DropPosition {
    /// Derive the drop side from the pointer's offset inside a panel row.
    #[must_use]
    pub fn from_row_offset(offset_y: f64, row_height: f64) -> Self {
        if offset_y < row_height / 2.0 {
            Self::Above
        } else {
            Self::Below
        }
    }

    /// Whether this is [`DropPosition::Above`].
    #[must_use]
    pub const fn is_above(self) -> bool {
        matches!(self, Self::Above)
    }
}

/// Why a reorder left the store untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoOpReason {
    /// The dragged entry no longer exists.
    UnknownSource,
    /// The drop target no longer exists.
    UnknownTarget,
    /// Source and target are the same entry.
    SameTarget,
    /// The computed position equals the current one.
    AlreadyInPlace,
}

/// Result of a reorder request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReorderOutcome {
    /// Moved within one list.
    Moved {
        /// Index before the move.
        from: usize,
        /// Index after the move.
        to: usize,
    },
    /// Moved an item into another layer.
    MovedAcross {
        /// Layer the item left.
        from_layer: LayerId,
        /// Layer the item joined.
        to_layer: LayerId,
        /// Index in the destination layer.
        to: usize,
    },
    /// Nothing changed.
    Unchanged(NoOpReason),
}

impl ReorderOutcome {
    /// Whether the store was mutated.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        !matches!(self, Self::Unchanged(_))
    }

    /// Final index of the moved entry, if any.
    #[must_use]
    pub const fn final_index(&self) -> Option<usize> {
        match self {
            Self::Moved { to, .. } | Self::MovedAcross { to, .. } => Some(*to),
            Self::Unchanged(_) => None,
        }
    }
}

/// Change notification for downstream caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum StoreChange {
    /// A layer was created.
    LayerAdded(LayerId),
    /// A layer and its items were removed.
    LayerRemoved(LayerId),
    /// Layer metadata (name, visibility, lock) changed.
    LayerChanged(LayerId),
    /// The layer list order changed.
    LayersReordered,
    /// Items in a layer were added, removed, edited or reordered.
    ItemsChanged(LayerId),
    /// An item moved between layers.
    ItemMoved {
        /// The moved item.
        item: ItemId,
        /// Layer it left.
        from_layer: LayerId,
        /// Layer it joined.
        to_layer: LayerId,
    },
    /// The whole order was replaced (project load).
    Replaced,
}

/// Insertion index for a drag-and-drop move.
///
/// `source` is the source's index in the target's list, or `None` when it
/// comes from another list.
#[must_use]
pub const fn drop_insert_index(source: Option<usize>, target: usize, place_above: bool) -> usize {
    match source {
        Some(s) if s < target => {
            if place_above {
                target - 1
            } else {
                target
            }
        }
        _ => {
            if place_above {
                target
            } else {
                target + 1
            }
        }
    }
}

/// Serializable copy of the full order, handed to project persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    /// All layers; `order` gives their position.
    pub layers: Vec<Layer>,
    /// All items; `layer_id` and `z_index` give their position.
    pub items: Vec<Item>,
}

impl OrderSnapshot {
    /// Serialize to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> CanvasResult<String> {
        serde_json::to_string(self).map_err(CanvasError::Serialization)
    }

    /// Deserialize from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails.
    pub fn from_json(json: &str) -> CanvasResult<Self> {
        serde_json::from_str(json).map_err(CanvasError::Serialization)
    }
}

#[derive(Debug, Clone)]
struct LayerEntry {
    layer: Layer,
    items: Vec<Item>,
}

/// Ordered layers and their ordered items.
#[derive(Debug, Clone, Default)]
pub struct OrderingStore {
    layers: Vec<LayerEntry>,
    changes: Vec<StoreChange>,
}

impl OrderingStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // Layers
    // ------------------------------------------------------------------

    /// Create a layer at the top of the list.
    pub fn create_layer(&mut self, name: impl Into<String>) -> LayerId {
        self.insert_layer(Layer::new(name), 0)
    }

    /// Insert a layer at `index` (clamped to the list length).
    pub fn insert_layer(&mut self, layer: Layer, index: usize) -> LayerId {
        let id = layer.id;
        let index = index.min(self.layers.len());
        self.layers.insert(
            index,
            LayerEntry {
                layer,
                items: Vec::new(),
            },
        );
        self.renumber_layers();
        self.changes.push(StoreChange::LayerAdded(id));
        id
    }

    /// Delete a layer, returning the items it held.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer is not found.
    pub fn delete_layer(&mut self, id: LayerId) -> CanvasResult<Vec<Item>> {
        let index = self
            .layer_index(id)
            .ok_or_else(|| CanvasError::LayerNotFound(id.to_string()))?;
        let entry = self.layers.remove(index);
        self.renumber_layers();
        self.changes.push(StoreChange::LayerRemoved(id));
        Ok(entry.items)
    }

    /// Rename a layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer is not found.
    pub fn rename_layer(&mut self, id: LayerId, name: impl Into<String>) -> CanvasResult<()> {
        self.layer_mut(id)?.name = name.into();
        self.changes.push(StoreChange::LayerChanged(id));
        Ok(())
    }

    /// Show or hide a layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer is not found.
    pub fn set_layer_visible(&mut self, id: LayerId, visible: bool) -> CanvasResult<()> {
        self.layer_mut(id)?.visible = visible;
        self.changes.push(StoreChange::LayerChanged(id));
        Ok(())
    }

    /// Lock or unlock a layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer is not found.
    pub fn set_layer_locked(&mut self, id: LayerId, locked: bool) -> CanvasResult<()> {
        self.layer_mut(id)?.locked = locked;
        self.changes.push(StoreChange::LayerChanged(id));
        Ok(())
    }

    /// Get a layer by ID.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|e| e.layer.id == id).map(|e| &e.layer)
    }

    /// Layers from top to bottom.
    pub fn layers(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter().map(|e| &e.layer)
    }

    /// Layer IDs from top to bottom.
    #[must_use]
    pub fn layer_order(&self) -> Vec<LayerId> {
        self.layers.iter().map(|e| e.layer.id).collect()
    }

    /// Number of layers.
    #[must_use]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Move `source` next to `target` in the layer list.
    pub fn reorder_layer(
        &mut self,
        source: LayerId,
        target: LayerId,
        place_above: bool,
    ) -> ReorderOutcome {
        let Some(from) = self.layer_index(source) else {
            tracing::debug!("Layer reorder ignored: unknown source {source}");
            return ReorderOutcome::Unchanged(NoOpReason::UnknownSource);
        };
        let Some(target_index) = self.layer_index(target) else {
            tracing::debug!("Layer reorder ignored: unknown target {target}");
            return ReorderOutcome::Unchanged(NoOpReason::UnknownTarget);
        };
        if from == target_index {
            return ReorderOutcome::Unchanged(NoOpReason::SameTarget);
        }

        let to = drop_insert_index(Some(from), target_index, place_above);
        if to == from {
            return ReorderOutcome::Unchanged(NoOpReason::AlreadyInPlace);
        }

        let entry = self.layers.remove(from);
        self.layers.insert(to, entry);
        self.renumber_layers();
        self.changes.push(StoreChange::LayersReordered);
        tracing::debug!("Moved layer {source} from {from} to {to}");
        ReorderOutcome::Moved { from, to }
    }

    /// Index `source` would occupy after [`Self::reorder_layer`] with the same
    /// arguments. `None` if either layer is unknown.
    #[must_use]
    pub fn predict_layer_insert_index(
        &self,
        source: LayerId,
        target: LayerId,
        place_above: bool,
    ) -> Option<usize> {
        let from = self.layer_index(source)?;
        let target_index = self.layer_index(target)?;
        if from == target_index {
            return Some(from);
        }
        Some(drop_insert_index(Some(from), target_index, place_above))
    }

    // ------------------------------------------------------------------
    // Items
    // ------------------------------------------------------------------

    /// Add an item at the front of a layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer is not found or the item id is taken.
    pub fn add_item(&mut self, layer: LayerId, item: Item) -> CanvasResult<ItemId> {
        self.insert_item(layer, item, 0)
    }

    /// Insert an item at `index` (clamped) within a layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer is not found or the item id is taken.
    pub fn insert_item(
        &mut self,
        layer: LayerId,
        mut item: Item,
        index: usize,
    ) -> CanvasResult<ItemId> {
        if self.locate_item(item.id).is_some() {
            return Err(CanvasError::DuplicateId(item.id.to_string()));
        }
        let layer_index = self
            .layer_index(layer)
            .ok_or_else(|| CanvasError::LayerNotFound(layer.to_string()))?;

        let id = item.id;
        item.layer_id = layer;
        let items = &mut self.layers[layer_index].items;
        let index = index.min(items.len());
        items.insert(index, item);
        renumber_items(items);
        self.changes.push(StoreChange::ItemsChanged(layer));
        Ok(id)
    }

    /// Remove an item from whichever layer holds it.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is not found.
    pub fn remove_item(&mut self, id: ItemId) -> CanvasResult<Item> {
        let (layer_index, item_index) = self
            .locate_item(id)
            .ok_or_else(|| CanvasError::ItemNotFound(id.to_string()))?;
        let entry = &mut self.layers[layer_index];
        let item = entry.items.remove(item_index);
        renumber_items(&mut entry.items);
        self.changes.push(StoreChange::ItemsChanged(entry.layer.id));
        Ok(item)
    }

    /// Show or hide an item.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is not found.
    pub fn set_item_visible(&mut self, id: ItemId, visible: bool) -> CanvasResult<()> {
        self.edit_item(id, |item| item.visible = visible)
    }

    /// Lock or unlock an item.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is not found.
    pub fn set_item_locked(&mut self, id: ItemId, locked: bool) -> CanvasResult<()> {
        self.edit_item(id, |item| item.locked = locked)
    }

    /// Move or resize an item.
    ///
    /// # Errors
    ///
    /// Returns an error if the item is not found or the bounds are not finite.
    pub fn set_item_bounds(&mut self, id: ItemId, bounds: WorldRect) -> CanvasResult<()> {
        if !bounds.is_finite() {
            return Err(CanvasError::InvalidOperation(format!(
                "non-finite bounds for item {id}"
            )));
        }
        self.edit_item(id, |item| item.bounds = bounds)
    }

    /// Get an item by ID.
    #[must_use]
    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.locate_item(id)
            .map(|(l, i)| &self.layers[l].items[i])
    }

    /// Items of a layer from front to back.
    #[must_use]
    pub fn items_in_layer(&self, id: LayerId) -> Option<&[Item]> {
        self.layers
            .iter()
            .find(|e| e.layer.id == id)
            .map(|e| e.items.as_slice())
    }

    /// Item IDs of a layer from front to back.
    #[must_use]
    pub fn item_order(&self, id: LayerId) -> Option<Vec<ItemId>> {
        self.items_in_layer(id)
            .map(|items| items.iter().map(|i| i.id).collect())
    }

    /// Total number of items across all layers.
    #[must_use]
    pub fn total_item_count(&self) -> usize {
        self.layers.iter().map(|e| e.items.len()).sum()
    }

    /// Visible items in compositing order: bottom layer first, back to front.
    #[must_use]
    pub fn draw_order(&self) -> Vec<ItemId> {
        self.layers
            .iter()
            .rev()
            .filter(|e| e.layer.visible)
            .flat_map(|e| e.items.iter().rev())
            .filter(|i| i.visible)
            .map(|i| i.id)
            .collect()
    }

    /// Top-most visible, unlocked, non-helper item under a world point.
    #[must_use]
    pub fn hit_test(&self, point: WorldPoint) -> Option<ItemId> {
        if !point.is_finite() {
            return None;
        }
        self.layers
            .iter()
            .filter(|e| e.layer.visible && !e.layer.locked)
            .flat_map(|e| e.items.iter())
            .find(|i| {
                i.visible && !i.locked && i.kind != ItemKind::Helper && i.contains_point(point)
            })
            .map(|i| i.id)
    }

    /// Move `source` next to `target`, within or across layers.
    ///
    /// Cross-layer moves re-point the item's asset instances to the
    /// destination layer through `registry` before returning.
    pub fn reorder_item(
        &mut self,
        source: ItemId,
        target: ItemId,
        place_above: bool,
        registry: &mut dyn LayerAssociation,
    ) -> ReorderOutcome {
        let Some((src_layer, from)) = self.locate_item(source) else {
            tracing::debug!("Item reorder ignored: unknown source {source}");
            return ReorderOutcome::Unchanged(NoOpReason::UnknownSource);
        };
        let Some((dst_layer, target_index)) = self.locate_item(target) else {
            tracing::debug!("Item reorder ignored: unknown target {target}");
            return ReorderOutcome::Unchanged(NoOpReason::UnknownTarget);
        };
        if source == target {
            return ReorderOutcome::Unchanged(NoOpReason::SameTarget);
        }

        if src_layer == dst_layer {
            let to = drop_insert_index(Some(from), target_index, place_above);
            if to == from {
                return ReorderOutcome::Unchanged(NoOpReason::AlreadyInPlace);
            }
            let entry = &mut self.layers[src_layer];
            let item = entry.items.remove(from);
            entry.items.insert(to, item);
            renumber_items(&mut entry.items);
            self.changes.push(StoreChange::ItemsChanged(entry.layer.id));
            tracing::debug!("Moved item {source} from {from} to {to}");
            return ReorderOutcome::Moved { from, to };
        }

        let to = drop_insert_index(None, target_index, place_above);
        self.move_across(source, src_layer, from, dst_layer, to, registry)
    }

    /// Index `source` would occupy after [`Self::reorder_item`] with the same
    /// arguments. `None` if either item is unknown.
    #[must_use]
    pub fn predict_item_insert_index(
        &self,
        source: ItemId,
        target: ItemId,
        place_above: bool,
    ) -> Option<usize> {
        let (src_layer, from) = self.locate_item(source)?;
        let (dst_layer, target_index) = self.locate_item(target)?;
        if source == target {
            return Some(from);
        }
        let same_layer = (src_layer == dst_layer).then_some(from);
        Some(drop_insert_index(same_layer, target_index, place_above))
    }

    /// Move an item to the front of another layer (drop onto a layer header
    /// or an empty layer).
    pub fn move_item_to_layer(
        &mut self,
        item: ItemId,
        layer: LayerId,
        registry: &mut dyn LayerAssociation,
    ) -> ReorderOutcome {
        let Some((src_layer, from)) = self.locate_item(item) else {
            return ReorderOutcome::Unchanged(NoOpReason::UnknownSource);
        };
        let Some(dst_layer) = self.layer_index(layer) else {
            return ReorderOutcome::Unchanged(NoOpReason::UnknownTarget);
        };
        if src_layer == dst_layer {
            return ReorderOutcome::Unchanged(NoOpReason::SameTarget);
        }
        self.move_across(item, src_layer, from, dst_layer, 0, registry)
    }

    fn move_across(
        &mut self,
        id: ItemId,
        src_layer: usize,
        from: usize,
        dst_layer: usize,
        to: usize,
        registry: &mut dyn LayerAssociation,
    ) -> ReorderOutcome {
        let from_layer = self.layers[src_layer].layer.id;
        let to_layer = self.layers[dst_layer].layer.id;

        let mut item = self.layers[src_layer].items.remove(from);
        renumber_items(&mut self.layers[src_layer].items);

        item.layer_id = to_layer;
        let items = &mut self.layers[dst_layer].items;
        let to = to.min(items.len());
        items.insert(to, item);
        renumber_items(items);

        registry.reassign_layer(id, to_layer);
        self.changes.push(StoreChange::ItemMoved {
            item: id,
            from_layer,
            to_layer,
        });
        tracing::debug!("Moved item {id} from layer {from_layer} to {to_layer} at {to}");
        ReorderOutcome::MovedAcross {
            from_layer,
            to_layer,
            to,
        }
    }

    // ------------------------------------------------------------------
    // Persistence and notifications
    // ------------------------------------------------------------------

    /// Copy of the current order for project save.
    #[must_use]
    pub fn snapshot(&self) -> OrderSnapshot {
        OrderSnapshot {
            layers: self.layers.iter().map(|e| e.layer.clone()).collect(),
            items: self
                .layers
                .iter()
                .flat_map(|e| e.items.iter().cloned())
                .collect(),
        }
    }

    /// Replace the whole order (project load).
    ///
    /// Entries are sorted by their stored `order`/`z_index` and renumbered
    /// densely, so gaps or duplicates in saved indices are repaired.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate ids or items referencing unknown layers.
    /// The store is unchanged on error.
    pub fn replace_order(&mut self, snapshot: OrderSnapshot) -> CanvasResult<()> {
        let OrderSnapshot { mut layers, mut items } = snapshot;

        let mut seen_layers = std::collections::HashSet::new();
        for layer in &layers {
            if !seen_layers.insert(layer.id) {
                return Err(CanvasError::DuplicateId(layer.id.to_string()));
            }
        }
        let mut seen_items = std::collections::HashSet::new();
        for item in &items {
            if !seen_items.insert(item.id) {
                return Err(CanvasError::DuplicateId(item.id.to_string()));
            }
            if !seen_layers.contains(&item.layer_id) {
                return Err(CanvasError::LayerNotFound(item.layer_id.to_string()));
            }
        }

        layers.sort_by_key(|l| l.order);
        items.sort_by_key(|i| i.z_index);

        let mut entries: Vec<LayerEntry> = layers
            .into_iter()
            .map(|layer| LayerEntry {
                layer,
                items: Vec::new(),
            })
            .collect();
        for item in items {
            if let Some(entry) = entries.iter_mut().find(|e| e.layer.id == item.layer_id) {
                entry.items.push(item);
            }
        }
        for entry in &mut entries {
            renumber_items(&mut entry.items);
        }

        self.layers = entries;
        self.renumber_layers();
        self.changes.push(StoreChange::Replaced);
        tracing::debug!(
            "Replaced order: {} layers, {} items",
            self.layers.len(),
            self.total_item_count()
        );
        Ok(())
    }

    /// Take queued change notifications.
    pub fn drain_changes(&mut self) -> Vec<StoreChange> {
        std::mem::take(&mut self.changes)
    }

    /// Check that every index is dense and every item points at its layer.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.layers.iter().enumerate().all(|(li, e)| {
            usize::try_from(e.layer.order).is_ok_and(|o| o == li)
                && e.items.iter().enumerate().all(|(ii, item)| {
                    item.layer_id == e.layer.id
                        && usize::try_from(item.z_index).is_ok_and(|z| z == ii)
                })
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn layer_index(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|e| e.layer.id == id)
    }

    fn layer_mut(&mut self, id: LayerId) -> CanvasResult<&mut Layer> {
        self.layers
            .iter_mut()
            .find(|e| e.layer.id == id)
            .map(|e| &mut e.layer)
            .ok_or_else(|| CanvasError::LayerNotFound(id.to_string()))
    }

    fn locate_item(&self, id: ItemId) -> Option<(usize, usize)> {
        self.layers.iter().enumerate().find_map(|(li, e)| {
            e.items.iter().position(|i| i.id == id).map(|ii| (li, ii))
        })
    }

    fn edit_item<F>(&mut self, id: ItemId, f: F) -> CanvasResult<()>
    where
        F: FnOnce(&mut Item),
    {
        let (li, ii) = self
            .locate_item(id)
            .ok_or_else(|| CanvasError::ItemNotFound(id.to_string()))?;
        let entry = &mut self.layers[li];
        f(&mut entry.items[ii]);
        self.changes.push(StoreChange::ItemsChanged(entry.layer.id));
        Ok(())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn renumber_layers(&mut self) {
        for (i, entry) in self.layers.iter_mut().enumerate() {
            entry.layer.order = i as u32;
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn renumber_items(items: &mut [Item]) {
    for (i, item) in items.iter_mut().enumerate() {
        item.z_index = i as u32;
    }
}
