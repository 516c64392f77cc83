//! Integration tests for the canvas session (atelier-core).
//!
//! Drives the session through input events the way the DOM host does and
//! checks the store, registry and viewport end states.

use atelier_core::{
    AssetInstance, CanvasSession, DragEntity, DragEvent, DragPhase, DropIndicator, DropList,
    InputEvent, InstanceId, InstanceKind, Item, ItemKind, LayerId, OrderSnapshot, OrderingStore,
    PointerButton, ReorderOutcome, ScreenPoint, SessionUpdate, StoreChange, Viewport, WorldRect,
};

const ROW: f64 = 24.0;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("atelier_core=debug")
        .try_init();
}

/// Session with layers `[A, B, C, D]` (top to bottom).
fn session_with_layers() -> (CanvasSession, [LayerId; 4]) {
    let mut session = CanvasSession::default();
    let store = session.store_mut();
    let d = store.create_layer("D");
    let c = store.create_layer("C");
    let b = store.create_layer("B");
    let a = store.create_layer("A");
    (session, [a, b, c, d])
}

fn drag(phase: DragPhase, source: DragEntity, target: DragEntity, upper_half: bool) -> InputEvent {
    let offset = if upper_half { ROW * 0.25 } else { ROW * 0.75 };
    InputEvent::Drag(DragEvent::new(phase, source, 0).over(target, offset, ROW))
}

// ==========================================================================
// Layer panel
// ==========================================================================

#[test]
fn test_layer_drag_indicator_matches_commit() {
    init_tracing();
    let (mut session, [a, b, c, d]) = session_with_layers();

    let start = InputEvent::Drag(DragEvent::new(DragPhase::Start, DragEntity::Layer(d), 0));
    assert_eq!(session.process_event(&start), SessionUpdate::Indicator(None));

    let over = drag(DragPhase::Over, DragEntity::Layer(d), DragEntity::Layer(a), true);
    let expected = DropIndicator {
        list: DropList::Layers,
        index: 0,
    };
    assert_eq!(session.process_event(&over), SessionUpdate::Indicator(Some(expected)));
    // Same position again: nothing to repaint
    assert_eq!(session.process_event(&over), SessionUpdate::None);

    let drop = drag(DragPhase::Drop, DragEntity::Layer(d), DragEntity::Layer(a), true);
    let SessionUpdate::Reordered(outcome) = session.process_event(&drop) else {
        panic!("drop must commit");
    };
    assert_eq!(outcome.final_index(), Some(0));
    assert_eq!(session.store().layer_order(), vec![d, a, b, c]);
    assert!(session.indicator().is_none());
    assert!(session.store().is_consistent());
}

#[test]
fn test_layer_drag_cancel_clears_indicator() {
    let (mut session, [a, _, c, _]) = session_with_layers();
    let over = drag(DragPhase::Over, DragEntity::Layer(a), DragEntity::Layer(c), false);
    session.process_event(&over);
    assert!(session.indicator().is_some());

    let cancel = InputEvent::Drag(DragEvent::new(DragPhase::Cancel, DragEntity::Layer(a), 10));
    assert_eq!(session.process_event(&cancel), SessionUpdate::Indicator(None));
    assert_eq!(session.store().layer_order().len(), 4);
}

// ==========================================================================
// Item moves and asset instances
// ==========================================================================

#[test]
fn test_cross_layer_item_drag_updates_registry() {
    init_tracing();
    let (mut session, [a, b, _, _]) = session_with_layers();
    let instance = InstanceId::new();
    let photo = Item::new(ItemKind::Image { instance }, WorldRect::new(0.0, 0.0, 100.0, 80.0));
    let photo_id = photo.id;

    let store = session.store_mut();
    let target = store
        .add_item(b, Item::new(ItemKind::Path, WorldRect::new(0.0, 0.0, 10.0, 10.0)))
        .expect("layer exists");
    store
        .add_item(b, Item::new(ItemKind::Path, WorldRect::new(5.0, 5.0, 10.0, 10.0)))
        .expect("layer exists");
    store.add_item(a, photo).expect("layer exists");
    store.drain_changes();

    session.registry_mut().register(AssetInstance {
        id: instance,
        item_id: photo_id,
        kind: InstanceKind::Image,
        layer_id: a,
    });

    let before = session.store().total_item_count();
    let over = drag(DragPhase::Over, DragEntity::Item(photo_id), DragEntity::Item(target), false);
    let SessionUpdate::Indicator(Some(indicator)) = session.process_event(&over) else {
        panic!("indicator expected");
    };
    assert_eq!(indicator.list, DropList::Items(b));

    let drop = drag(DragPhase::Drop, DragEntity::Item(photo_id), DragEntity::Item(target), false);
    let SessionUpdate::Reordered(outcome) = session.process_event(&drop) else {
        panic!("drop must commit");
    };
    assert_eq!(
        outcome,
        ReorderOutcome::MovedAcross {
            from_layer: a,
            to_layer: b,
            to: indicator.index,
        }
    );
    assert_eq!(session.store().total_item_count(), before);
    assert_eq!(session.store().item(photo_id).map(|i| i.layer_id), Some(b));
    assert_eq!(session.registry().get(instance).map(|i| i.layer_id), Some(b));

    let moves = session.registry_mut().drain_changes();
    assert_eq!(moves.len(), 1);
    assert_eq!((moves[0].from_layer, moves[0].to_layer), (a, b));

    let changes = session.store_mut().drain_changes();
    assert!(changes.contains(&StoreChange::ItemMoved {
        item: photo_id,
        from_layer: a,
        to_layer: b,
    }));
}

#[test]
fn test_drop_above_first_of_three() {
    let mut store = OrderingStore::new();
    let layer = store.create_layer("Shapes");
    let ids: Vec<_> = (0..3)
        .map(|i| {
            let bounds = WorldRect::new(f64::from(i) * 20.0, 0.0, 10.0, 10.0);
            store
                .add_item(layer, Item::new(ItemKind::Path, bounds))
                .expect("layer exists")
        })
        .collect();
    let order = store.item_order(layer).expect("layer exists");
    let (first, last) = (order[0], order[2]);
    assert_eq!(ids.len(), 3);

    assert_eq!(store.predict_item_insert_index(last, first, true), Some(0));
    let outcome = store.reorder_item(last, first, true, &mut atelier_core::NoInstances);
    assert_eq!(outcome.final_index(), Some(0));
    assert_eq!(store.item_order(layer).expect("layer exists")[0], last);
}

// ==========================================================================
// Pointer input and viewport
// ==========================================================================

#[test]
fn test_click_selects_through_pan_and_dpr() {
    let mut session = CanvasSession::new(Viewport::new(2.0, -100.0, -50.0, 2.0));
    session.set_canvas_origin(ScreenPoint::new(10.0, 10.0));
    let layer = session.store_mut().create_layer("Shapes");
    let item = session
        .store_mut()
        .add_item(layer, Item::new(ItemKind::Path, WorldRect::new(100.0, 50.0, 40.0, 40.0)))
        .expect("layer exists");

    // zoom / dpr == 1, so world (120, 70) sits at screen (20, 20)
    let click = InputEvent::Pointer {
        client_x: 30.0,
        client_y: 30.0,
        button: PointerButton::Primary,
        pressed: true,
    };
    assert_eq!(session.process_event(&click), SessionUpdate::Selection(Some(item)));
    assert_eq!(session.selection(), Some(item));
}

#[test]
fn test_invalid_dpr_keeps_last_valid_viewport() {
    let mut session = CanvasSession::new(Viewport::new(1.5, 10.0, 20.0, 1.0));
    let before = session.viewport();
    assert_eq!(
        session.process_event(&InputEvent::DevicePixelRatio(f64::NAN)),
        SessionUpdate::None
    );
    assert_eq!(session.viewport(), before);
}

#[test]
fn test_events_from_json() {
    let json = r#"{
        "type": "Wheel",
        "data": { "client_x": 10.0, "client_y": 5.0, "delta_y": -1.0 }
    }"#;
    let event: InputEvent = serde_json::from_str(json).expect("valid event");
    let mut session = CanvasSession::default();
    let SessionUpdate::Viewport(v) = session.process_event(&event) else {
        panic!("wheel must zoom");
    };
    assert!(v.zoom > 1.0);
}

// ==========================================================================
// Persistence
// ==========================================================================

#[test]
fn test_snapshot_json_restores_order() {
    let (mut session, [a, b, c, d]) = session_with_layers();
    session.store_mut().reorder_layer(c, a, true);
    for layer in [a, b] {
        session
            .store_mut()
            .add_item(layer, Item::new(ItemKind::Path, WorldRect::new(0.0, 0.0, 1.0, 1.0)))
            .expect("layer exists");
    }
    let json = session.store().snapshot().to_json().expect("serializable");

    let mut restored = OrderingStore::new();
    restored
        .replace_order(OrderSnapshot::from_json(&json).expect("valid snapshot"))
        .expect("consistent snapshot");
    assert_eq!(restored.layer_order(), vec![c, a, b, d]);
    assert_eq!(restored.total_item_count(), 2);
    assert!(restored.is_consistent());
    assert_eq!(restored.drain_changes(), vec![StoreChange::Replaced]);
}
