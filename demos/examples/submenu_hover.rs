// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Long press to open, hover intent on a submenu, keyboard inside the flyout.
//!
//! Time is simulated: the demo advances [`Timers`] by hand where a real host
//! would drive it from its event loop and frame callback.
//!
//! Run:
//! - `cargo run -p understory_menu_demos --example submenu_hover`

use std::cell::RefCell;
use std::rc::Rc;

use futures::channel::oneshot;
use kurbo::{Point, Rect, Size};
use tracing_subscriber::EnvFilter;
use understory_menu::bus::EventBus;
use understory_menu::menu::{ContextMenu, MenuConfig};
use understory_menu::placement::{FlyoutPlacement, Side, VerticalAlign};
use understory_menu::surface::MenuSurface;
use understory_menu::timer::Timers;
use understory_menu::tree::{ItemId, ItemTree, MenuItem, Submenu};
use understory_menu::trigger::{
    Collect, ContextMenuTrigger, PAYLOAD_POLL_INTERVAL, TriggerConfig, TriggerInput,
};
use understory_menu::types::{EventResponse, Key, MenuId};

/// Records flyout placements; the flyout sits past the right edge.
#[derive(Clone, Default)]
struct Layer(Rc<RefCell<Vec<(ItemId, Option<FlyoutPlacement>)>>>);

impl MenuSurface for Layer {
    fn viewport(&self) -> Size {
        Size::new(400.0, 300.0)
    }

    fn menu_bounds(&self) -> Option<Rect> {
        Some(Rect::new(0.0, 0.0, 150.0, 100.0))
    }

    fn set_menu_origin(&mut self, _origin: Point) {}

    fn set_menu_visible(&mut self, _visible: bool) {}

    fn submenu_bounds(&self, _submenu: ItemId) -> Option<Rect> {
        Some(Rect::new(300.0, 40.0, 450.0, 140.0))
    }

    fn set_submenu_placement(&mut self, submenu: ItemId, placement: Option<FlyoutPlacement>) {
        self.0.borrow_mut().push((submenu, placement));
    }
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    let bus: EventBus<&'static str> = EventBus::new();
    let timers = Timers::new();
    let id = MenuId::new("canvas").unwrap();

    let chosen = Rc::new(RefCell::new(None));
    let mut items = ItemTree::new();
    items.insert(None, MenuItem::new("Cut")).unwrap();
    let share = items.insert(None, Submenu::new("Share").hover_delay(300)).unwrap();
    items.insert(Some(share), MenuItem::new("Mail")).unwrap();
    let sink = chosen.clone();
    let link = items
        .insert(
            Some(share),
            MenuItem::new("Copy link").on_activate(move |a| {
                *sink.borrow_mut() = a.data;
            }),
        )
        .unwrap();

    let layer = Layer::default();
    let menu = ContextMenu::mount(
        id.clone(),
        &bus,
        &timers,
        items,
        MenuConfig::default(),
        layer.clone(),
    )
    .unwrap();

    // The payload (the shape under the finger) is resolved asynchronously.
    let pending = Rc::new(RefCell::new(None));
    let slot = pending.clone();
    let trigger = ContextMenuTrigger::new(
        id,
        &bus,
        &timers,
        TriggerConfig::default().with_collect(move || {
            let (sender, receiver) = oneshot::channel();
            *slot.borrow_mut() = Some(sender);
            Collect::Deferred(receiver)
        }),
    );

    trigger
        .handle(TriggerInput::TouchStart {
            position: Point::new(40.0, 40.0),
        })
        .unwrap();
    timers.advance(999);
    assert!(!menu.is_visible());
    timers.advance(1);
    // Held long enough, but the payload is not in yet.
    assert!(!menu.is_visible());
    pending.borrow_mut().take().unwrap().send("circle-3").unwrap();
    timers.advance(PAYLOAD_POLL_INTERVAL);
    assert!(menu.is_visible());
    assert_eq!(
        trigger.handle(TriggerInput::TouchEnd).unwrap(),
        EventResponse::PREVENT_DEFAULT
    );
    timers.run_frame();
    timers.run_frame();

    // Hover intent: a quick pass does nothing, lingering opens the flyout.
    menu.submenu_pointer_enter(share);
    timers.advance(100);
    menu.submenu_pointer_leave(share);
    timers.advance(1_000);
    assert!(!menu.is_submenu_open(share));

    menu.submenu_pointer_enter(share);
    timers.advance(300);
    assert!(menu.is_submenu_open(share));
    timers.run_frame();
    tracing::info!(placements = ?layer.0.borrow(), "flyout placed");
    assert_eq!(
        layer.0.borrow().last(),
        Some(&(
            share,
            Some(FlyoutPlacement {
                vertical: VerticalAlign::Top,
                side: Side::Left,
            })
        ))
    );

    // Keys now go to the flyout.
    assert_eq!(menu.key_scope(), Some(share));
    menu.handle_key(Key::Up).unwrap();
    assert_eq!(menu.submenu_selected(share), Some(link));
    menu.handle_key(Key::Enter).unwrap();

    println!("== Chosen ==\n  {:?}", chosen.borrow());
    assert_eq!(*chosen.borrow(), Some("circle-3"));
    assert!(!menu.is_visible());
    assert!(!menu.is_submenu_open(share));
}
