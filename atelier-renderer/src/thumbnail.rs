//! Per-layer thumbnail cache.
//!
//! Thumbnails are small PNG `data:` URLs regenerated lazily: a read inside
//! the TTL returns the cached URL, anything older is rebuilt synchronously.
//! Ordering-store change notifications drop affected entries early.
//!
//! A layer whose only visible content is a single image or 3D model reuses
//! the host's pre-rendered surface for that item. Everything else goes
//! through an offscreen composite of the layer's bounds with helper chrome
//! hidden.

use std::collections::HashMap;

use atelier_core::{Item, ItemKind, LayerId, OrderingStore, StoreChange, WorldRect};
use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::error::{RenderError, RenderResult};
use crate::host::{HostStateGuard, SceneHost};
use crate::image::{encode_png_data_url, letterbox};

/// Thumbnail cache configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Edge length of the square thumbnail in pixels.
    pub size: u32,
    /// How long a generated thumbnail is served from cache.
    pub ttl_ms: u64,
    /// Offscreen raster resolution relative to `size`.
    pub oversample: u32,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            size: 64,
            ttl_ms: 1000,
            oversample: 2,
        }
    }
}

/// A cached thumbnail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailCacheEntry {
    /// Layer the thumbnail shows.
    pub layer_id: LayerId,
    /// `data:image/png;base64,...`
    pub data_url: String,
    /// Generation time.
    pub generated_at_ms: u64,
}

impl ThumbnailCacheEntry {
    /// Whether the entry may still be served at `now_ms`.
    #[must_use]
    pub fn is_fresh(&self, now_ms: u64, ttl_ms: u64) -> bool {
        now_ms.saturating_sub(self.generated_at_ms) < ttl_ms
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads served from cache.
    pub hits: u64,
    /// Reads that needed regeneration.
    pub misses: u64,
    /// Thumbnails generated.
    pub regenerations: u64,
    /// Generation attempts that failed.
    pub failures: u64,
    /// Entries dropped by change notifications or maintenance.
    pub evictions: u64,
}

/// Where a layer's thumbnail pixels come from.
enum Source<'a> {
    /// The host's surface for a lone image or model.
    ItemSurface(&'a Item),
    /// Offscreen composite, back to front.
    Composite(Vec<&'a Item>),
}

impl<'a> Source<'a> {
    /// `None` when nothing visible remains once helpers are excluded.
    fn for_layer(items: &'a [Item]) -> Option<Self> {
        let visible: Vec<&Item> = items
            .iter()
            .filter(|item| item.visible && !matches!(item.kind, ItemKind::Helper))
            .collect();
        if visible.is_empty() {
            return None;
        }
        if let [only] = visible[..] {
            if only.kind.is_rich() {
                return Some(Self::ItemSurface(only));
            }
        }
        Some(Self::Composite(visible.into_iter().rev().collect()))
    }
}

/// Layer thumbnail cache.
#[derive(Debug, Default)]
pub struct ThumbnailCache {
    entries: HashMap<LayerId, ThumbnailCacheEntry>,
    config: ThumbnailConfig,
    stats: CacheStats,
}

impl ThumbnailCache {
    /// Create a cache with the given configuration.
    #[must_use]
    pub fn new(config: ThumbnailConfig) -> Self {
        Self {
            entries: HashMap::new(),
            config,
            stats: CacheStats::default(),
        }
    }

    /// Cache configuration.
    #[must_use]
    pub fn config(&self) -> &ThumbnailConfig {
        &self.config
    }

    /// Cache statistics.
    #[must_use]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Number of cached thumbnails.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached entry for a layer, fresh or not.
    #[must_use]
    pub fn entry(&self, layer: LayerId) -> Option<&ThumbnailCacheEntry> {
        self.entries.get(&layer)
    }

    /// Thumbnail for a layer, or `None` when there is nothing to show or
    /// generation failed (logged).
    pub fn get_thumbnail(
        &mut self,
        layer: LayerId,
        store: &OrderingStore,
        host: &mut dyn SceneHost,
        now_ms: u64,
    ) -> Option<String> {
        match self.try_thumbnail(layer, store, host, now_ms) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!(%layer, "Thumbnail generation failed: {e}");
                None
            }
        }
    }

    /// Thumbnail for a layer.
    ///
    /// `Ok(None)` means the layer is unknown or has no visible content.
    ///
    /// # Errors
    ///
    /// Returns an error if rasterization or encoding fails. The stale entry,
    /// if any, is dropped.
    pub fn try_thumbnail(
        &mut self,
        layer: LayerId,
        store: &OrderingStore,
        host: &mut dyn SceneHost,
        now_ms: u64,
    ) -> RenderResult<Option<String>> {
        if let Some(entry) = self.entries.get(&layer) {
            if entry.is_fresh(now_ms, self.config.ttl_ms) {
                self.stats.hits += 1;
                return Ok(Some(entry.data_url.clone()));
            }
        }
        self.stats.misses += 1;

        let generated = store
            .items_in_layer(layer)
            .map_or(Ok(None), |items| self.render(layer, items, host));

        match generated {
            Ok(Some(data_url)) => {
                self.stats.regenerations += 1;
                tracing::debug!(%layer, bytes = data_url.len(), "Thumbnail regenerated");
                self.entries.insert(
                    layer,
                    ThumbnailCacheEntry {
                        layer_id: layer,
                        data_url: data_url.clone(),
                        generated_at_ms: now_ms,
                    },
                );
                Ok(Some(data_url))
            }
            Ok(None) => {
                self.entries.remove(&layer);
                Ok(None)
            }
            Err(e) => {
                self.stats.failures += 1;
                self.entries.remove(&layer);
                Err(e)
            }
        }
    }

    fn render(
        &self,
        layer: LayerId,
        items: &[Item],
        host: &mut dyn SceneHost,
    ) -> RenderResult<Option<String>> {
        let Some(source) = Source::for_layer(items) else {
            return Ok(None);
        };
        let mut guard = HostStateGuard::new(host);
        let raster = match source {
            Source::ItemSurface(item) => {
                let surface = guard.host().item_surface(item);
                match surface {
                    Some(surface) => surface,
                    None => {
                        tracing::trace!(item = %item.id, "No item surface, compositing");
                        self.composite(&mut guard, layer, &[item])?
                    }
                }
            }
            Source::Composite(items) => self.composite(&mut guard, layer, &items)?,
        };
        let thumb = letterbox(&raster, self.config.size);
        encode_png_data_url(&thumb).map(Some)
    }

    fn composite(
        &self,
        guard: &mut HostStateGuard<'_>,
        layer: LayerId,
        items: &[&Item],
    ) -> RenderResult<RgbaImage> {
        let region = WorldRect::union_all(items.iter().map(|item| item.bounds))
            .filter(WorldRect::is_finite)
            .ok_or_else(|| RenderError::Rasterize(format!("Layer {layer} has no finite bounds")))?;
        // Zero-area content (a straight path) still gets a pixel
        let region = if region.is_empty() {
            region.expand(0.5, 0.5)
        } else {
            region
        };
        let target = self.config.size.saturating_mul(self.config.oversample.max(1));
        let (width, height) = raster_dimensions(region, target);

        let host = guard.host();
        host.set_helpers_visible(false);
        host.set_active_layer(Some(layer));
        host.rasterize(items, region, width, height)
    }

    /// Drop a layer's entry. Returns whether one existed.
    pub fn invalidate(&mut self, layer: LayerId) -> bool {
        let removed = self.entries.remove(&layer).is_some();
        if removed {
            self.stats.evictions += 1;
        }
        removed
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.stats.evictions += self.entries.len() as u64;
        self.entries.clear();
    }

    /// Drop entries affected by ordering-store changes.
    pub fn apply_changes(&mut self, changes: &[StoreChange]) {
        for change in changes {
            match *change {
                StoreChange::LayerRemoved(id)
                | StoreChange::LayerChanged(id)
                | StoreChange::ItemsChanged(id) => {
                    self.invalidate(id);
                }
                StoreChange::ItemMoved {
                    from_layer, to_layer, ..
                } => {
                    self.invalidate(from_layer);
                    self.invalidate(to_layer);
                }
                StoreChange::Replaced => self.clear(),
                StoreChange::LayerAdded(_) | StoreChange::LayersReordered => {}
            }
        }
    }

    /// Drop expired entries and entries for layers the store no longer has.
    ///
    /// Returns the number of entries dropped.
    pub fn maintenance(&mut self, store: &OrderingStore, now_ms: u64) -> usize {
        let ttl = self.config.ttl_ms;
        let before = self.entries.len();
        self.entries
            .retain(|id, entry| entry.is_fresh(now_ms, ttl) && store.layer(*id).is_some());
        let dropped = before - self.entries.len();
        self.stats.evictions += dropped as u64;
        if dropped > 0 {
            tracing::debug!("Thumbnail maintenance dropped {dropped} entries");
        }
        dropped
    }
}

/// Raster size with the longer side at `target`, preserving aspect.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn raster_dimensions(region: WorldRect, target: u32) -> (u32, u32) {
    let target = target.max(1);
    let long = region.width.max(region.height);
    let scale = f64::from(target) / long;
    let w = (region.width * scale).round().clamp(1.0, f64::from(target)) as u32;
    let h = (region.height * scale).round().clamp(1.0, f64::from(target)) as u32;
    (w, h)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_core::{InstanceId, ItemId};
    use image::Rgba;

    #[derive(Default)]
    struct MockHost {
        helpers_visible: bool,
        active: Option<LayerId>,
        surfaces: HashMap<ItemId, RgbaImage>,
        rasterized: Vec<(usize, WorldRect, u32, u32)>,
        helpers_during_raster: Option<bool>,
        fail: bool,
    }

    impl SceneHost for MockHost {
        fn item_surface(&self, item: &Item) -> Option<RgbaImage> {
            self.surfaces.get(&item.id).cloned()
        }

        fn helpers_visible(&self) -> bool {
            self.helpers_visible
        }

        fn set_helpers_visible(&mut self, visible: bool) {
            self.helpers_visible = visible;
        }

        fn active_layer(&self) -> Option<LayerId> {
            self.active
        }

        fn set_active_layer(&mut self, layer: Option<LayerId>) {
            self.active = layer;
        }

        fn rasterize(
            &mut self,
            items: &[&Item],
            region: WorldRect,
            width: u32,
            height: u32,
        ) -> RenderResult<RgbaImage> {
            self.helpers_during_raster = Some(self.helpers_visible);
            if self.fail {
                return Err(RenderError::Rasterize("offscreen context lost".to_string()));
            }
            self.rasterized.push((items.len(), region, width, height));
            Ok(RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 255])))
        }
    }

    fn host() -> MockHost {
        MockHost {
            helpers_visible: true,
            ..MockHost::default()
        }
    }

    fn path(x: f64, y: f64, w: f64, h: f64) -> Item {
        Item::new(ItemKind::Path, WorldRect::new(x, y, w, h))
    }

    #[test]
    fn test_empty_layer_is_none() {
        let mut store = OrderingStore::new();
        let layer = store.create_layer("Empty");
        let mut host = host();
        let mut cache = ThumbnailCache::default();

        assert_eq!(cache.get_thumbnail(layer, &store, &mut host, 0), None);
        assert!(host.rasterized.is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_helpers_and_hidden_items_are_not_content() {
        let mut store = OrderingStore::new();
        let layer = store.create_layer("Chrome");
        store
            .add_item(layer, Item::new(ItemKind::Helper, WorldRect::new(0.0, 0.0, 10.0, 10.0)))
            .expect("layer exists");
        store
            .add_item(layer, path(0.0, 0.0, 5.0, 5.0).with_visible(false))
            .expect("layer exists");
        let mut host = host();
        let mut cache = ThumbnailCache::default();

        assert_eq!(cache.try_thumbnail(layer, &store, &mut host, 0).expect("no error"), None);
    }

    #[test]
    fn test_composite_hides_helpers_and_restores() {
        let mut store = OrderingStore::new();
        let layer = store.create_layer("Shapes");
        let other = store.create_layer("Other");
        store.add_item(layer, path(0.0, 0.0, 100.0, 50.0)).expect("layer exists");
        store.add_item(layer, path(50.0, 25.0, 100.0, 50.0)).expect("layer exists");
        let mut host = host();
        host.active = Some(other);
        let mut cache = ThumbnailCache::default();

        let url = cache.get_thumbnail(layer, &store, &mut host, 0).expect("thumbnail");
        assert!(url.starts_with("data:image/png;base64,"));

        let (count, region, w, h) = host.rasterized[0];
        assert_eq!(count, 2);
        assert_eq!(region, WorldRect::new(0.0, 0.0, 150.0, 75.0));
        assert_eq!((w, h), (128, 64));
        assert_eq!(host.helpers_during_raster, Some(false));
        assert!(host.helpers_visible);
        assert_eq!(host.active, Some(other));
    }

    #[test]
    fn test_single_rich_item_uses_surface() {
        let mut store = OrderingStore::new();
        let layer = store.create_layer("Photo");
        let image = Item::new(
            ItemKind::Image {
                instance: InstanceId::new(),
            },
            WorldRect::new(0.0, 0.0, 300.0, 200.0),
        );
        let mut host = host();
        host.surfaces
            .insert(image.id, RgbaImage::from_pixel(30, 20, Rgba([255, 0, 0, 255])));
        store.add_item(layer, image).expect("layer exists");
        let mut cache = ThumbnailCache::default();

        assert!(cache.get_thumbnail(layer, &store, &mut host, 0).is_some());
        assert!(host.rasterized.is_empty());
    }

    #[test]
    fn test_rich_item_without_surface_falls_back() {
        let mut store = OrderingStore::new();
        let layer = store.create_layer("Model");
        let model = Item::new(
            ItemKind::Model {
                instance: InstanceId::new(),
            },
            WorldRect::new(0.0, 0.0, 40.0, 40.0),
        );
        store.add_item(layer, model).expect("layer exists");
        let mut host = host();
        let mut cache = ThumbnailCache::default();

        assert!(cache.get_thumbnail(layer, &store, &mut host, 0).is_some());
        assert_eq!(host.rasterized.len(), 1);
    }

    #[test]
    fn test_ttl() {
        let mut store = OrderingStore::new();
        let layer = store.create_layer("Shapes");
        store.add_item(layer, path(0.0, 0.0, 10.0, 10.0)).expect("layer exists");
        let mut host = host();
        let mut cache = ThumbnailCache::default();

        cache.get_thumbnail(layer, &store, &mut host, 5000);
        cache.get_thumbnail(layer, &store, &mut host, 5999);
        assert_eq!(host.rasterized.len(), 1);
        assert_eq!(cache.stats().hits, 1);

        cache.get_thumbnail(layer, &store, &mut host, 6000);
        assert_eq!(host.rasterized.len(), 2);
        assert_eq!(cache.stats().regenerations, 2);
    }

    #[test]
    fn test_failure_restores_host_and_drops_entry() {
        let mut store = OrderingStore::new();
        let layer = store.create_layer("Shapes");
        store.add_item(layer, path(0.0, 0.0, 10.0, 10.0)).expect("layer exists");
        let mut host = host();
        let mut cache = ThumbnailCache::default();
        cache.get_thumbnail(layer, &store, &mut host, 0);
        assert_eq!(cache.len(), 1);

        host.fail = true;
        let result = cache.try_thumbnail(layer, &store, &mut host, 2000);
        assert!(matches!(result, Err(RenderError::Rasterize(_))));
        assert!(host.helpers_visible);
        assert_eq!(host.active, None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().failures, 1);
    }

    #[test]
    fn test_store_changes_invalidate() {
        let mut store = OrderingStore::new();
        let a = store.create_layer("A");
        let b = store.create_layer("B");
        store.add_item(a, path(0.0, 0.0, 10.0, 10.0)).expect("layer exists");
        store.add_item(b, path(0.0, 0.0, 10.0, 10.0)).expect("layer exists");
        let mut host = host();
        let mut cache = ThumbnailCache::default();
        cache.get_thumbnail(a, &store, &mut host, 0);
        cache.get_thumbnail(b, &store, &mut host, 0);

        cache.apply_changes(&[StoreChange::LayersReordered, StoreChange::ItemsChanged(a)]);
        assert!(cache.entry(a).is_none());
        assert!(cache.entry(b).is_some());

        cache.apply_changes(&[StoreChange::Replaced]);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_maintenance_drops_expired_and_orphaned() {
        let mut store = OrderingStore::new();
        let a = store.create_layer("A");
        let b = store.create_layer("B");
        store.add_item(a, path(0.0, 0.0, 10.0, 10.0)).expect("layer exists");
        store.add_item(b, path(0.0, 0.0, 10.0, 10.0)).expect("layer exists");
        let mut host = host();
        let mut cache = ThumbnailCache::default();
        cache.get_thumbnail(a, &store, &mut host, 0);
        cache.get_thumbnail(b, &store, &mut host, 900);

        store.delete_layer(b).expect("layer exists");
        assert_eq!(cache.maintenance(&store, 500), 1);
        assert!(cache.entry(a).is_some());
        assert_eq!(cache.maintenance(&store, 1000), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_raster_dimensions_keep_aspect() {
        assert_eq!(raster_dimensions(WorldRect::new(0.0, 0.0, 200.0, 100.0), 128), (128, 64));
        assert_eq!(raster_dimensions(WorldRect::new(0.0, 0.0, 1.0, 1000.0), 128), (1, 128));
    }
}
