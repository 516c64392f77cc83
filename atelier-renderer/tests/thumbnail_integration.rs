//! Integration tests for layer thumbnails (atelier-renderer).
//!
//! Thumbnails are generated against a real ordering store and kept in sync
//! through its change feed.

mod common;

use atelier_core::{
    CanvasSession, InstanceId, Item, ItemKind, NoInstances, OrderingStore, WorldRect,
};
use atelier_renderer::image::decode_data_url;
use atelier_renderer::{Renderer, RendererConfig, ThumbnailCache, ThumbnailConfig};
use common::PaintHost;
use image::{Rgba, RgbaImage};

fn rect(x: f64, y: f64, w: f64, h: f64) -> WorldRect {
    WorldRect::new(x, y, w, h)
}

#[test]
fn test_thumbnail_is_square_png() {
    common::init_tracing();
    let mut store = OrderingStore::new();
    let layer = store.create_layer("Sketch");
    store
        .add_item(layer, Item::new(ItemKind::Path, rect(0.0, 0.0, 400.0, 100.0)))
        .expect("layer exists");
    let mut host = PaintHost::new();
    let mut cache = ThumbnailCache::new(ThumbnailConfig::default());

    let url = cache.get_thumbnail(layer, &store, &mut host, 0).expect("thumbnail");
    let img = decode_data_url(&url).expect("valid png");
    assert_eq!(img.dimensions(), (64, 64));
    // 4:1 content: letterbox bars top and bottom
    assert_eq!(img.get_pixel(32, 0)[3], 0);
    assert_eq!(img.get_pixel(32, 32)[3], 255);
}

#[test]
fn test_empty_and_unknown_layers() {
    let mut store = OrderingStore::new();
    let empty = store.create_layer("Empty");
    let gone = store.create_layer("Gone");
    store.delete_layer(gone).expect("layer exists");
    let mut host = PaintHost::new();
    let mut cache = ThumbnailCache::default();

    assert_eq!(cache.try_thumbnail(empty, &store, &mut host, 0).expect("no error"), None);
    assert_eq!(cache.try_thumbnail(gone, &store, &mut host, 0).expect("no error"), None);
    assert_eq!(host.raster_calls, 0);
}

#[test]
fn test_single_image_uses_host_surface() {
    let mut store = OrderingStore::new();
    let layer = store.create_layer("Photo");
    let photo = Item::new(
        ItemKind::Image {
            instance: InstanceId::new(),
        },
        rect(0.0, 0.0, 640.0, 480.0),
    );
    let mut host = PaintHost::new();
    host.surfaces
        .insert(photo.id, RgbaImage::from_pixel(64, 48, Rgba([250, 10, 10, 255])));
    store.add_item(layer, photo).expect("layer exists");
    // A helper in the same layer does not turn this into a composite
    store
        .add_item(layer, Item::new(ItemKind::Helper, rect(-10.0, -10.0, 660.0, 500.0)))
        .expect("layer exists");

    let mut cache = ThumbnailCache::default();
    let url = cache.get_thumbnail(layer, &store, &mut host, 0).expect("thumbnail");
    assert_eq!(host.raster_calls, 0);
    let img = decode_data_url(&url).expect("valid png");
    assert_eq!(*img.get_pixel(32, 32), Rgba([250, 10, 10, 255]));
}

#[test]
fn test_item_move_invalidates_both_layers() {
    common::init_tracing();
    let mut store = OrderingStore::new();
    let a = store.create_layer("A");
    let b = store.create_layer("B");
    let moving = store
        .add_item(a, Item::new(ItemKind::Path, rect(0.0, 0.0, 10.0, 10.0)))
        .expect("layer exists");
    store
        .add_item(a, Item::new(ItemKind::Path, rect(20.0, 0.0, 10.0, 10.0)))
        .expect("layer exists");
    store
        .add_item(b, Item::new(ItemKind::Path, rect(0.0, 20.0, 10.0, 10.0)))
        .expect("layer exists");
    store.drain_changes();

    let mut host = PaintHost::new();
    let mut renderer = Renderer::new(RendererConfig::default());
    renderer.thumbnail(a, &store, &mut host, 0).expect("thumbnail");
    renderer.thumbnail(b, &store, &mut host, 0).expect("thumbnail");
    assert_eq!(host.raster_calls, 2);

    store.move_item_to_layer(moving, b, &mut NoInstances);
    renderer.apply_store_changes(&store.drain_changes());
    assert!(renderer.thumbnails().is_empty());

    // Regenerated well inside the TTL because the entries were dropped
    renderer.thumbnail(a, &store, &mut host, 10).expect("thumbnail");
    renderer.thumbnail(b, &store, &mut host, 10).expect("thumbnail");
    assert_eq!(host.raster_calls, 4);
}

#[test]
fn test_failed_render_leaves_host_untouched() {
    let mut session = CanvasSession::default();
    let layer = session.store_mut().create_layer("Shapes");
    let other = session.store_mut().create_layer("Other");
    session
        .store_mut()
        .add_item(layer, Item::new(ItemKind::Path, rect(0.0, 0.0, 10.0, 10.0)))
        .expect("layer exists");

    let mut host = PaintHost::new();
    host.active_layer = Some(other);
    host.fail_next = true;
    let mut renderer = Renderer::new(RendererConfig::default());

    assert_eq!(renderer.thumbnail(layer, session.store(), &mut host, 0), None);
    assert!(host.helpers_visible);
    assert_eq!(host.active_layer, Some(other));
    assert_eq!(renderer.thumbnails().stats().failures, 1);

    // The next read retries immediately
    assert!(renderer.thumbnail(layer, session.store(), &mut host, 1).is_some());
}

#[test]
fn test_maintenance_after_layer_delete() {
    let mut store = OrderingStore::new();
    let layer = store.create_layer("Temp");
    store
        .add_item(layer, Item::new(ItemKind::Path, rect(0.0, 0.0, 10.0, 10.0)))
        .expect("layer exists");
    let mut host = PaintHost::new();
    let mut renderer = Renderer::new(RendererConfig::default());
    renderer.thumbnail(layer, &store, &mut host, 0).expect("thumbnail");

    store.delete_layer(layer).expect("layer exists");
    assert_eq!(renderer.maintenance(&store, 1), 1);
    assert!(renderer.thumbnails().is_empty());
}
