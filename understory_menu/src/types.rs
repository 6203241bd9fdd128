// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core types: menu identities, bus events, keys, and input responses.
//!
//! ## Overview
//!
//! These types describe the show/hide protocol carried by the
//! [`EventBus`](crate::bus::EventBus) and the small vocabulary shared by
//! [triggers](crate::trigger) and [menus](crate::menu).

use alloc::rc::Rc;
use alloc::string::String;
use core::fmt;

use kurbo::Point;

use crate::error::MenuError;
use crate::tree::ItemId;

/// String key naming one menu instance.
///
/// Show and hide events carry a `MenuId` so that unrelated menus sharing a
/// bus ignore each other. Cloning is cheap.
///
/// ```
/// use understory_menu::types::MenuId;
///
/// let id = MenuId::new("file-menu").unwrap();
/// assert_eq!(id.as_str(), "file-menu");
/// assert!(MenuId::new("").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MenuId(Rc<str>);

impl MenuId {
    /// Create an identity from a non-empty string.
    ///
    /// Returns [`MenuError::EmptyId`] for an empty string.
    pub fn new(id: impl Into<String>) -> Result<Self, MenuError> {
        let id: String = id.into();
        if id.is_empty() {
            return Err(MenuError::EmptyId);
        }
        Ok(Self(Rc::from(id)))
    }

    /// Borrow the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for MenuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

impl fmt::Display for MenuId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request to show one menu at a position.
///
/// Published by a [trigger](crate::trigger::ContextMenuTrigger) after it has
/// collected its payload.
#[derive(Clone, Debug, PartialEq)]
pub struct ShowEvent<P = ()> {
    /// The menu that should open.
    pub id: MenuId,
    /// Anchor position in viewport coordinates.
    pub position: Point,
    /// Payload collected by the trigger, if any.
    pub data: Option<P>,
}

impl<P> ShowEvent<P> {
    /// Returns true if this event is addressed to `id`.
    pub fn targets(&self, id: &MenuId) -> bool {
        self.id == *id
    }
}

/// Request to hide one menu, or every menu when `id` is `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HideEvent {
    /// The menu that should close; `None` closes all menus.
    pub id: Option<MenuId>,
}

impl HideEvent {
    /// A hide addressed to every menu on the bus.
    pub const fn all() -> Self {
        Self { id: None }
    }

    /// A hide addressed to a single menu.
    pub fn only(id: MenuId) -> Self {
        Self { id: Some(id) }
    }

    /// Returns true if this event applies to `id`.
    pub fn targets(&self, id: &MenuId) -> bool {
        self.id.as_ref().is_none_or(|target| target == id)
    }
}

/// Why a menu went from visible to hidden.
///
/// Passed to [`MenuConfig::on_hide`](crate::menu::MenuConfig::on_hide).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HideCause {
    /// A hide event arrived on the bus (including outside clicks, Escape and
    /// item activation, which all publish a global hide).
    Event(HideEvent),
    /// The document scrolled.
    Scroll,
    /// The window was resized.
    Resize,
    /// A native context-menu request reached the document or the menu itself.
    ContextMenu,
}

/// Traversal direction for keyboard selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Towards the end of the item sequence (Down).
    Forward,
    /// Towards the start of the item sequence (Up).
    Backward,
}

/// Keys understood by menu navigation.
///
/// Hosts map their native key codes onto this set; anything else should be
/// passed as [`Key::Other`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Key {
    /// Left arrow.
    Left,
    /// Up arrow.
    Up,
    /// Right arrow.
    Right,
    /// Down arrow.
    Down,
    /// Enter / Return.
    Enter,
    /// Escape.
    Escape,
    /// Any other key. Never handled.
    Other,
}

/// Pointer buttons, as reported by the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PointerButton {
    /// Usually the left button.
    Primary,
    /// Usually the wheel button.
    Auxiliary,
    /// Usually the right button.
    Secondary,
}

bitflags::bitflags! {
    /// What the host should do with the native event it forwarded.
    ///
    /// Returned by [`ContextMenuTrigger::handle`](crate::trigger::ContextMenuTrigger::handle)
    /// and by the menu's input entry points.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EventResponse: u8 {
        /// Suppress the platform default (for example the native context menu).
        const PREVENT_DEFAULT  = 0b0000_0001;
        /// Stop the event from reaching ancestors.
        const STOP_PROPAGATION = 0b0000_0010;
    }
}

/// Snapshot of a menu's top-level visibility state.
///
/// Returned by [`ContextMenu::state`](crate::menu::ContextMenu::state).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VisibilityState {
    /// Whether the menu is currently shown.
    pub visible: bool,
    /// Anchor position recorded by the last accepted show event.
    pub position: Point,
    /// Selected top-level item, if any.
    pub selected: Option<ItemId>,
    /// Whether the selected submenu item is forced open by the keyboard.
    pub force_submenu_open: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> MenuId {
        MenuId::new(s).unwrap()
    }

    #[test]
    fn empty_menu_id_is_rejected() {
        assert_eq!(MenuId::new(""), Err(MenuError::EmptyId));
    }

    #[test]
    fn hide_without_id_targets_everyone() {
        let all = HideEvent::all();
        assert!(all.targets(&id("a")));
        assert!(all.targets(&id("b")));

        let only = HideEvent::only(id("a"));
        assert!(only.targets(&id("a")));
        assert!(!only.targets(&id("b")));
    }

    #[test]
    fn show_targets_exact_id() {
        let ev = ShowEvent::<()> {
            id: id("a"),
            position: Point::ZERO,
            data: None,
        };
        assert!(ev.targets(&id("a")));
        assert!(!ev.targets(&id("ab")));
    }

    #[test]
    fn menu_id_formats_as_plain_string() {
        assert_eq!(alloc::format!("{}", id("ctx")), "ctx");
        assert_eq!(alloc::format!("{:?}", id("ctx")), "\"ctx\"");
    }
}
