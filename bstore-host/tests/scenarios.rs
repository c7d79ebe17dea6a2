//! End-to-end scenarios driving a `SurfaceHost` directly with a manual clock.

use bstore_common::{Rect, Size};
use bstore_host::{
    BackingStore, Config, FixedMemory, HostError, ManualClock, PaintUpdate, SurfaceEvent,
    SurfaceHost, SurfaceId,
};
use bstore_pixelbuffer::PixelFormat;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const BLACK: [u8; 4] = [0, 0, 0, 255];
const WHITE: [u8; 4] = [255, 255, 255, 255];
const SIZE: Size = Size::new(640, 480);
const WINDOW: Duration = Duration::from_millis(3000);

fn host_with_capacity(capacity: i32) -> (SurfaceHost, ManualClock) {
    let clock = ManualClock::new();
    let config = Config::builder()
        .cache_capacity(capacity)
        .debounce_window(WINDOW)
        .build()
        .unwrap();
    let host = SurfaceHost::with_parts(
        &config,
        &FixedMemory(2048),
        Arc::new(clock.clone()),
        PixelFormat::rgb888(),
    )
    .unwrap();
    (host, clock)
}

fn fill(host: &mut SurfaceHost, id: SurfaceId, rgba: [u8; 4]) -> bool {
    let update = PaintUpdate::solid(Rect::from_size(SIZE), &PixelFormat::rgb888(), rgba);
    host.paint(id, SIZE, &update).unwrap()
}

#[test]
fn thumbnail_survives_eviction() {
    let (mut host, _clock) = host_with_capacity(2);
    let a = host.create_surface();
    let b = host.create_surface();
    let c = host.create_surface();

    fill(&mut host, a, BLACK);
    fill(&mut host, b, WHITE);
    fill(&mut host, c, WHITE);

    assert!(host.backing_store(a).unwrap().is_none());
    let thumb = host.thumbnail(a).unwrap();
    assert!(!thumb.is_empty());
    assert_eq!(thumb.average_rgb(), Some([0, 0, 0]));
    assert_eq!(thumb.dimensions(), Some((160, 120)));
    assert_eq!(host.generator().stats().salvaged, 1);
}

#[test]
fn debounce_prevents_flicker() {
    let (mut host, clock) = host_with_capacity(1);
    let a = host.create_surface();
    let b = host.create_surface();

    // A ends up with a salvaged black thumbnail and no backing store.
    fill(&mut host, a, BLACK);
    fill(&mut host, b, WHITE);
    assert!(host.backing_store(a).unwrap().is_none());

    host.handle(SurfaceEvent::Hidden(a)).unwrap();
    host.handle(SurfaceEvent::Shown(a)).unwrap();
    assert!(host.generator().is_pending(a));

    clock.advance(Duration::from_millis(100));
    fill(&mut host, a, WHITE);
    assert!(host.backing_store(a).unwrap().is_some());

    // Within the window the stale thumbnail is kept on purpose.
    let thumb = host.thumbnail(a).unwrap();
    assert_eq!(thumb.average_rgb(), Some([0, 0, 0]));

    clock.advance(WINDOW);
    assert_eq!(host.run_expired_timers(), 1);
    assert!(!host.generator().is_pending(a));

    let thumb = host.thumbnail(a).unwrap();
    assert_eq!(thumb.average_rgb(), Some([255, 255, 255]));
}

#[test]
fn fresh_surface_has_empty_thumbnail() {
    let (mut host, _clock) = host_with_capacity(2);
    let id = host.create_surface();

    let thumb = host.thumbnail(id).unwrap();
    assert!(thumb.is_empty());
    assert_eq!(thumb.average_rgb(), None);
}

#[test]
fn at_most_one_store_per_surface() {
    let (mut host, _clock) = host_with_capacity(3);
    let a = host.create_surface();
    let b = host.create_surface();
    let sizes = [
        Size::new(100, 100),
        Size::new(200, 100),
        Size::new(200, 100),
        Size::new(50, 75),
        Size::new(100, 100),
    ];

    for (i, size) in sizes.iter().enumerate() {
        let owner = if i % 2 == 0 { a } else { b };
        let update = PaintUpdate::solid(Rect::from_size(*size), &PixelFormat::rgb888(), WHITE);
        host.paint(owner, *size, &update).unwrap();

        let store = host.backing_store(owner).unwrap().unwrap();
        assert_eq!(store.size(), *size);
        assert_eq!(store.owner(), owner);
        assert!(host.manager().len() <= 2);
    }

    // Resizes replace stores; they are never salvaged.
    assert_eq!(host.generator().stats().salvaged, 0);
    assert_eq!(host.manager().stats().evictions, 0);
}

#[test]
fn partial_first_paint_needs_full_paint() {
    let (mut host, _clock) = host_with_capacity(2);
    let id = host.create_surface();

    let partial = PaintUpdate::solid(Rect::new(0, 0, 64, 64), &PixelFormat::rgb888(), WHITE);
    assert!(host.paint(id, SIZE, &partial).unwrap());
    // Same size again: the store exists, so partial paints are trusted.
    assert!(!host.paint(id, SIZE, &partial).unwrap());

    let other = host.create_surface();
    assert!(!fill(&mut host, other, WHITE));
}

#[test]
fn lookups_do_not_change_eviction_order() {
    let (mut host, _clock) = host_with_capacity(2);
    let a = host.create_surface();
    let b = host.create_surface();
    let c = host.create_surface();

    fill(&mut host, a, BLACK);
    fill(&mut host, b, BLACK);
    for _ in 0..5 {
        assert!(host.backing_store(a).unwrap().is_some());
        assert!(host.manager().get_backing_store(a, SIZE).is_some());
    }
    fill(&mut host, c, BLACK);

    assert!(host.backing_store(a).unwrap().is_none());
    assert!(host.backing_store(b).unwrap().is_some());
}

#[test]
fn observers_see_pixels_before_destruction() {
    let clock = ManualClock::new();
    let config = Config::builder().cache_capacity(1).build().unwrap();
    let mut host = SurfaceHost::with_parts(
        &config,
        &FixedMemory(512),
        Arc::new(clock),
        PixelFormat::rgb888(),
    )
    .unwrap();

    let a = host.create_surface();
    let b = host.create_surface();
    fill(&mut host, a, WHITE);

    // The generator's salvage is the load-bearing observer; check it read
    // the real pixels rather than a dropped buffer.
    fill(&mut host, b, BLACK);
    assert_eq!(
        host.generator().cached_thumbnail(a).average_rgb(),
        Some([255, 255, 255])
    );
}

#[test]
fn manager_observers_run_in_order_before_drop() {
    use bstore_host::BackingStoreManager;

    let mut manager = BackingStoreManager::new(1, PixelFormat::rgb888());
    let seen = Arc::new(Mutex::new(Vec::new()));
    for tag in ["first", "second"] {
        let seen = Arc::clone(&seen);
        manager.add_eviction_observer(Arc::new(move |_owner: &SurfaceId, store: &BackingStore| {
            seen.lock().push((tag, store.buffer().average_rgb()));
        }));
    }

    let mut registry = bstore_host::SurfaceRegistry::new();
    let a = registry.create();
    let b = registry.create();
    let size = Size::new(4, 4);
    let red = PaintUpdate::solid(Rect::from_size(size), &PixelFormat::rgb888(), [255, 0, 0, 255]);
    manager.prepare_backing_store(a, size, &red).unwrap();
    manager.prepare_backing_store(b, size, &red).unwrap();

    assert_eq!(
        *seen.lock(),
        vec![("first", Some([255, 0, 0])), ("second", Some([255, 0, 0]))]
    );
}

#[test]
fn explicit_removal_does_not_salvage() {
    let (mut host, _clock) = host_with_capacity(2);
    let a = host.create_surface();
    fill(&mut host, a, WHITE);

    host.handle(SurfaceEvent::Destroyed(a)).unwrap();
    assert_eq!(host.generator().stats().salvaged, 0);
    assert!(host.manager().is_empty());
    assert!(!host.manager().is_cache_allocated());
}

#[test]
fn stale_surface_is_rejected() {
    let (mut host, _clock) = host_with_capacity(2);
    let a = host.create_surface();
    host.destroy_surface(a).unwrap();
    let reused = host.create_surface();

    let err = host.thumbnail(a).unwrap_err();
    assert!(matches!(err, HostError::UnknownSurface(id) if id == a));
    assert!(err.is_caller_error());

    let update = PaintUpdate::solid(Rect::from_size(SIZE), &PixelFormat::rgb888(), WHITE);
    assert!(host.paint(a, SIZE, &update).is_err());
    assert!(host.backing_store(reused).unwrap().is_none());
}

#[test]
fn disabled_cache_still_answers() {
    let (mut host, _clock) = host_with_capacity(0);
    let a = host.create_surface();

    assert!(!fill(&mut host, a, WHITE));
    host.handle(SurfaceEvent::Shown(a)).unwrap();
    host.handle(SurfaceEvent::Hidden(a)).unwrap();

    assert!(!host.manager().is_cache_allocated());
    assert!(host.thumbnail(a).unwrap().is_empty());
}

#[test]
fn hidden_surface_gets_thumbnail() {
    let (mut host, _clock) = host_with_capacity(2);
    let a = host.create_surface();
    fill(&mut host, a, WHITE);

    host.set_visible(a, false).unwrap();
    assert_eq!(
        host.generator().cached_thumbnail(a).average_rgb(),
        Some([255, 255, 255])
    );
}

#[test]
fn scroll_counts_as_update() {
    let (mut host, _clock) = host_with_capacity(2);
    let a = host.create_surface();
    fill(&mut host, a, WHITE);
    assert!(!host.thumbnail(a).unwrap().is_empty());

    assert!(host.scroll(a, 0, 10, Rect::from_size(SIZE)).unwrap());
    assert!(host.generator().cached_thumbnail(a).is_empty());
}

#[test]
fn extreme_offsets_leave_the_host_usable() {
    let (mut host, _clock) = host_with_capacity(2);
    let a = host.create_surface();
    fill(&mut host, a, WHITE);

    let clip = Rect::from_size(SIZE);
    assert!(host.scroll(a, i32::MAX, 0, clip).unwrap());
    assert!(host.scroll(a, 0, i32::MIN, clip).unwrap());

    let far = PaintUpdate::solid(Rect::new(i32::MAX - 1, 0, 4, 1), &PixelFormat::rgb888(), BLACK);
    assert!(!host.paint(a, SIZE, &far).unwrap());

    let store = host.backing_store(a).unwrap().unwrap();
    assert_eq!(store.buffer().average_rgb(), Some([255, 255, 255]));
}
