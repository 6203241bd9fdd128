// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Right-click a trigger, walk the menu with the keyboard, activate an item.
//!
//! The "surface" here is a shared log of the writes a real toolkit would
//! apply to its popup.
//!
//! Run:
//! - `cargo run -p understory_menu_demos --example menu_basics`
//! - `RUST_LOG=understory_menu=debug cargo run -p understory_menu_demos --example menu_basics`

use std::cell::RefCell;
use std::rc::Rc;

use kurbo::{Point, Rect, Size};
use tracing_subscriber::EnvFilter;
use understory_menu::bus::EventBus;
use understory_menu::menu::{ContextMenu, DocumentEvent, Listeners, MenuConfig};
use understory_menu::surface::MenuSurface;
use understory_menu::timer::Timers;
use understory_menu::tree::{Entry, ItemTree, MenuItem};
use understory_menu::trigger::{Collect, ContextMenuTrigger, TriggerConfig, TriggerInput};
use understory_menu::types::{EventResponse, Key, MenuId, PointerButton};

#[derive(Default)]
struct Popup {
    bounds: Rect,
    visible: bool,
    log: Vec<String>,
}

#[derive(Clone)]
struct SharedPopup(Rc<RefCell<Popup>>);

impl MenuSurface for SharedPopup {
    fn viewport(&self) -> Size {
        Size::new(1024.0, 768.0)
    }

    fn menu_bounds(&self) -> Option<Rect> {
        Some(self.0.borrow().bounds)
    }

    fn set_menu_origin(&mut self, origin: Point) {
        let mut popup = self.0.borrow_mut();
        popup.bounds = popup.bounds.with_origin(origin);
        popup.log.push(format!("origin {origin:?}"));
    }

    fn set_menu_visible(&mut self, visible: bool) {
        let mut popup = self.0.borrow_mut();
        popup.visible = visible;
        popup.log.push(format!("visible {visible}"));
    }
}

fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();

    // The payload is the row that was right-clicked.
    let bus: EventBus<u32> = EventBus::new();
    let timers = Timers::new();
    let id = MenuId::new("file-row").unwrap();

    let log = Rc::new(RefCell::new(Vec::new()));
    let mut items = ItemTree::new();
    let sink = log.clone();
    items
        .insert(
            None,
            MenuItem::new("Open").on_activate(move |a| {
                sink.borrow_mut()
                    .push(format!("open row {:?}", a.data));
            }),
        )
        .unwrap();
    items
        .insert(None, MenuItem::new("Rename").disabled(true))
        .unwrap();
    items.insert(None, Entry::Divider).unwrap();
    let sink = log.clone();
    let delete = items
        .insert(
            None,
            MenuItem::new("Delete").on_activate(move |a| {
                sink.borrow_mut()
                    .push(format!("delete row {:?}", a.data));
            }),
        )
        .unwrap();

    let popup = SharedPopup(Rc::new(RefCell::new(Popup {
        bounds: Rect::new(0.0, 0.0, 180.0, 120.0),
        ..Popup::default()
    })));
    let menu = ContextMenu::mount(
        id.clone(),
        &bus,
        &timers,
        items,
        MenuConfig::default(),
        popup.clone(),
    )
    .unwrap();
    let trigger = ContextMenuTrigger::new(
        id,
        &bus,
        &timers,
        TriggerConfig::default().with_collect(|| Collect::Ready(17)),
    );

    // Right-click near the bottom-right corner.
    let response = trigger
        .handle(TriggerInput::ContextMenu {
            button: PointerButton::Secondary,
            position: Point::new(1000.0, 700.0),
            shift: false,
        })
        .unwrap();
    assert!(response.contains(EventResponse::PREVENT_DEFAULT));
    assert!(menu.is_visible());
    assert!(menu.listeners().contains(Listeners::KEY_DOWN));

    // Two frames: measure, then place and reveal.
    timers.run_frame();
    timers.run_frame();
    println!("== Surface ==\n  {:?}", popup.0.borrow().log);
    assert_eq!(popup.0.borrow().bounds.origin(), Point::new(820.0, 580.0));
    assert!(popup.0.borrow().visible);

    // Down, Down skips the disabled item and the divider.
    for key in [Key::Down, Key::Down] {
        menu.handle_document_event(DocumentEvent::KeyDown(key))
            .unwrap();
    }
    assert_eq!(menu.selected(), Some(delete));
    menu.handle_document_event(DocumentEvent::KeyDown(Key::Enter))
        .unwrap();
    assert!(!menu.is_visible());
    assert_eq!(menu.listeners(), Listeners::empty());

    timers.run_frame();
    assert!(!popup.0.borrow().visible);

    println!("== Activations ==\n  {:?}", log.borrow());
    assert_eq!(*log.borrow(), vec!["delete row Some(17)".to_string()]);
}
