// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_menu --heading-base-level=0

//! Understory Menu: toolkit-agnostic context menu state.
//!
//! ## Overview
//!
//! This crate owns the behavior of a context menu and none of its pixels.
//! The host toolkit renders, lays out and hit tests; this crate decides when
//! a menu is visible, where it goes, which item is selected, and which
//! submenu is open.
//!
//! - [`EventBus`](crate::bus::EventBus) carries show and hide events between
//!   triggers and menus. Menus are addressed by [`MenuId`](crate::types::MenuId);
//!   a hide without an id closes every menu on the bus.
//! - [`ContextMenuTrigger`](crate::trigger::ContextMenuTrigger) turns right
//!   clicks, context-menu requests and long presses into show events.
//! - [`ContextMenu`](crate::menu::ContextMenu) is the visibility state machine
//!   for one menu and its submenus. It reads measurements from and writes
//!   placement to a [`MenuSurface`](crate::surface::MenuSurface).
//! - [`ItemTree`](crate::tree::ItemTree) holds the menu's children: items,
//!   dividers, submenus and transparent groups.
//! - [`nav`](crate::nav) walks one level of that tree for keyboard selection.
//! - [`placement`](crate::placement) clamps menus and flyouts to the viewport.
//!
//! ## Time
//!
//! Nothing here reads a clock. Long presses, hover intent and next-frame
//! placement go through [`Timers`](crate::timer::Timers), which the host
//! advances from its own event loop and frame callback. Tests advance it by
//! hand.
//!
//! ## Threading
//!
//! Everything is single-threaded and `!Send`. Handles share state through
//! `Rc`, and scheduled work holds weak references, so unmounting or dropping
//! a menu or trigger makes its pending work a no-op.
//!
//! ## Example
//!
//! ```
//! use kurbo::{Point, Rect, Size};
//! use understory_menu::bus::EventBus;
//! use understory_menu::menu::{ContextMenu, MenuConfig};
//! use understory_menu::surface::MenuSurface;
//! use understory_menu::timer::Timers;
//! use understory_menu::tree::{ItemTree, MenuItem};
//! use understory_menu::trigger::{ContextMenuTrigger, TriggerConfig, TriggerInput};
//! use understory_menu::types::{MenuId, PointerButton};
//!
//! struct Popup;
//! impl MenuSurface for Popup {
//!     fn viewport(&self) -> Size { Size::new(640.0, 480.0) }
//!     fn menu_bounds(&self) -> Option<Rect> { Some(Rect::new(0.0, 0.0, 160.0, 90.0)) }
//!     fn set_menu_origin(&mut self, _origin: Point) {}
//!     fn set_menu_visible(&mut self, _visible: bool) {}
//! }
//!
//! let bus: EventBus = EventBus::new();
//! let timers = Timers::new();
//! let id = MenuId::new("canvas").unwrap();
//!
//! let mut items = ItemTree::new();
//! items.insert(None, MenuItem::new("Undo")).unwrap();
//! let menu =
//!     ContextMenu::mount(id.clone(), &bus, &timers, items, MenuConfig::default(), Popup).unwrap();
//! let trigger = ContextMenuTrigger::new(id, &bus, &timers, TriggerConfig::default());
//!
//! trigger
//!     .handle(TriggerInput::ContextMenu {
//!         button: PointerButton::Secondary,
//!         position: Point::new(600.0, 20.0),
//!         shift: false,
//!     })
//!     .unwrap();
//! assert!(menu.is_visible());
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

pub mod bus;
pub mod error;
pub mod menu;
pub mod nav;
pub mod placement;
pub mod surface;
pub mod timer;
pub mod tree;
pub mod trigger;
pub mod types;

pub use error::{HandlerError, MenuError, PublishError};
