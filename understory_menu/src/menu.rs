// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The menu: visibility, selection, submenus and placement for one [`MenuId`].
//!
//! ## Overview
//!
//! A [`ContextMenu`] subscribes to an [`EventBus`] at mount and reacts to the
//! show and hide events addressed to its id. While visible it also wants a
//! second tier of document-level input (outside clicks, scrolling, keys);
//! [`ContextMenu::listeners`] says which, so a host only forwards those while
//! they matter.
//!
//! The menu never draws. Layout results come in through a [`MenuSurface`],
//! and placement is written back to it one frame after it was measured:
//!
//! 1. A show event makes the menu visible and records the anchor.
//! 2. On the next frame the surface is measured and the origin computed.
//! 3. On the frame after that the origin is written and the surface shown.
//!
//! Hiding writes `set_menu_visible(false)` on the next frame.
//!
//! ## Levels and key scope
//!
//! The top-level menu and every open submenu flyout are *levels*, each with
//! its own [`NavState`]. Keys go to the deepest open level. A submenu is
//! open while its parent level is open and either the pointer has hovered it
//! open or the parent's selection forces it open from the keyboard. Every
//! change recomputes that for all submenus and only opens or closes on a net
//! change, so hover and keyboard never fight over a flyout.
//!
//! ## Re-entrancy
//!
//! Callbacks and bus publishes never run while the menu's state is
//! borrowed. A callback may call back into the menu, publish on the bus, or
//! drop the menu's trigger.
//!
//! ```
//! use kurbo::{Point, Rect, Size};
//! use understory_menu::bus::EventBus;
//! use understory_menu::menu::{ContextMenu, MenuConfig};
//! use understory_menu::surface::MenuSurface;
//! use understory_menu::timer::Timers;
//! use understory_menu::tree::{ItemTree, MenuItem};
//! use understory_menu::types::{Key, MenuId, ShowEvent};
//!
//! struct Popup(Rect);
//! impl MenuSurface for Popup {
//!     fn viewport(&self) -> Size { Size::new(800.0, 600.0) }
//!     fn menu_bounds(&self) -> Option<Rect> { Some(self.0) }
//!     fn set_menu_origin(&mut self, origin: Point) { self.0 = self.0.with_origin(origin); }
//!     fn set_menu_visible(&mut self, _visible: bool) {}
//! }
//!
//! let bus: EventBus = EventBus::new();
//! let timers = Timers::new();
//! let mut items = ItemTree::new();
//! let open = items.insert(None, MenuItem::new("Open")).unwrap();
//!
//! let id = MenuId::new("files").unwrap();
//! let menu = ContextMenu::mount(
//!     id.clone(),
//!     &bus,
//!     &timers,
//!     items,
//!     MenuConfig::default(),
//!     Popup(Rect::new(0.0, 0.0, 120.0, 40.0)),
//! )
//! .unwrap();
//!
//! bus.publish_show(&ShowEvent { id, position: Point::new(10.0, 10.0), data: None })
//!     .unwrap();
//! assert!(menu.is_visible());
//!
//! menu.handle_key(Key::Down).unwrap();
//! assert_eq!(menu.selected(), Some(open));
//! menu.handle_key(Key::Enter).unwrap();
//! assert!(!menu.is_visible());
//! ```

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::{Rc, Weak};
use alloc::string::ToString;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use kurbo::Point;

use crate::bus::{EventBus, Subscription};
use crate::error::{HandlerError, MenuError, PublishError};
use crate::nav::{self, KeyOutcome, NavState};
use crate::placement::{place_flyout, place_menu};
use crate::surface::MenuSurface;
use crate::timer::{TimerId, Timers};
use crate::tree::{Activate, Activation, Entry, ItemId, ItemKind, ItemTree};
use crate::types::{EventResponse, HideCause, HideEvent, Key, MenuId, ShowEvent, VisibilityState};

/// Default hover-intent delay for submenus.
pub const DEFAULT_HOVER_DELAY: u64 = 500;

bitflags::bitflags! {
    /// Document events that do not hide a visible menu.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Suppress: u8 {
        /// Keep the menu open while the document scrolls.
        const SCROLL       = 0b0000_0001;
        /// Keep the menu open when the window is resized.
        const RESIZE       = 0b0000_0010;
        /// Keep the menu open on native context-menu requests elsewhere.
        const CONTEXT_MENU = 0b0000_0100;
    }
}

bitflags::bitflags! {
    /// Document-level events a visible menu wants forwarded.
    ///
    /// Empty while the menu is hidden.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Listeners: u8 {
        /// Pointer presses anywhere.
        const POINTER_DOWN = 0b0000_0001;
        /// Touches anywhere.
        const TOUCH_START  = 0b0000_0010;
        /// Document scrolling.
        const SCROLL       = 0b0000_0100;
        /// Native context-menu requests.
        const CONTEXT_MENU = 0b0000_1000;
        /// Key presses.
        const KEY_DOWN     = 0b0001_0000;
        /// Window resizes.
        const RESIZE       = 0b0010_0000;
    }
}

/// Document-level input forwarded by the host.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum DocumentEvent {
    /// A pointer button went down somewhere.
    PointerDown {
        /// Position in viewport coordinates.
        position: Point,
    },
    /// A touch began somewhere.
    TouchStart {
        /// Position in viewport coordinates.
        position: Point,
    },
    /// The document scrolled.
    Scroll,
    /// A native context-menu request outside the menu.
    ContextMenu,
    /// The window was resized.
    Resize,
    /// A key was pressed.
    KeyDown(Key),
}

/// Called after the menu becomes visible.
pub type OnShow<P> = Rc<dyn Fn(&ShowEvent<P>)>;
/// Called after the menu becomes hidden.
pub type OnHide = Rc<dyn Fn(&HideCause)>;
/// Called when the pointer leaves the menu, with the payload it was shown with.
pub type OnPointerLeave<P> = Rc<dyn Fn(Option<&P>)>;

/// Configuration for a [`ContextMenu`].
pub struct MenuConfig<P = ()> {
    /// Open the menu to the left of the anchor, and flyouts to the left of
    /// their titles.
    pub rtl: bool,
    /// Hide every menu when the pointer leaves this one.
    pub hide_on_leave: bool,
    /// Document events that do not hide the menu.
    pub suppress: Suppress,
    /// Hover-intent delay for submenus that do not set their own.
    pub hover_delay: u64,
    /// Show callback.
    pub on_show: Option<OnShow<P>>,
    /// Hide callback.
    pub on_hide: Option<OnHide>,
    /// Pointer-leave callback.
    pub on_pointer_leave: Option<OnPointerLeave<P>>,
}

impl<P> Default for MenuConfig<P> {
    fn default() -> Self {
        Self {
            rtl: false,
            hide_on_leave: false,
            suppress: Suppress::empty(),
            hover_delay: DEFAULT_HOVER_DELAY,
            on_show: None,
            on_hide: None,
            on_pointer_leave: None,
        }
    }
}

impl<P> fmt::Debug for MenuConfig<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuConfig")
            .field("rtl", &self.rtl)
            .field("hide_on_leave", &self.hide_on_leave)
            .field("suppress", &self.suppress)
            .field("hover_delay", &self.hover_delay)
            .field("on_show", &self.on_show.is_some())
            .field("on_hide", &self.on_hide.is_some())
            .field("on_pointer_leave", &self.on_pointer_leave.is_some())
            .finish()
    }
}

impl<P> MenuConfig<P> {
    /// Set right-to-left placement.
    pub fn with_rtl(mut self, rtl: bool) -> Self {
        self.rtl = rtl;
        self
    }

    /// Hide every menu when the pointer leaves this one.
    pub fn with_hide_on_leave(mut self, hide: bool) -> Self {
        self.hide_on_leave = hide;
        self
    }

    /// Set the document events that do not hide the menu.
    pub fn with_suppress(mut self, suppress: Suppress) -> Self {
        self.suppress = suppress;
        self
    }

    /// Set the default submenu hover delay.
    pub fn with_hover_delay(mut self, delay: u64) -> Self {
        self.hover_delay = delay;
        self
    }

    /// Set the show callback.
    pub fn with_on_show(mut self, f: impl Fn(&ShowEvent<P>) + 'static) -> Self {
        self.on_show = Some(Rc::new(f));
        self
    }

    /// Set the hide callback.
    pub fn with_on_hide(mut self, f: impl Fn(&HideCause) + 'static) -> Self {
        self.on_hide = Some(Rc::new(f));
        self
    }

    /// Set the pointer-leave callback.
    pub fn with_on_pointer_leave(mut self, f: impl Fn(Option<&P>) + 'static) -> Self {
        self.on_pointer_leave = Some(Rc::new(f));
        self
    }
}

/// Work that must run after the state borrow is released.
enum Effect<P> {
    Publish(HideEvent),
    Activate(Activate<P>, Activation<P>),
    Shown(OnShow<P>, ShowEvent<P>),
    Hidden(OnHide, HideCause),
    PointerLeft(OnPointerLeave<P>, Option<P>),
}

fn run_effects<P: Clone + 'static>(
    bus: &EventBus<P>,
    effects: Vec<Effect<P>>,
) -> Result<(), PublishError> {
    for effect in effects {
        match effect {
            Effect::Publish(event) => {
                bus.publish_hide(&event)?;
            }
            Effect::Activate(f, activation) => f(&activation),
            Effect::Shown(f, event) => f(&event),
            Effect::Hidden(f, cause) => f(&cause),
            Effect::PointerLeft(f, data) => f(data.as_ref()),
        }
    }
    Ok(())
}

/// Sub-state of one submenu flyout.
#[derive(Debug, Default)]
struct Flyout {
    /// Opened by hover intent.
    visible: bool,
    /// Currently open, as last reconciled.
    shown: bool,
    nav: NavState,
    open_timer: Option<TimerId>,
    close_timer: Option<TimerId>,
    frame: Option<TimerId>,
}

impl Flyout {
    fn cancel_hover(&mut self, timers: &Timers) {
        for id in [self.open_timer.take(), self.close_timer.take()]
            .into_iter()
            .flatten()
        {
            timers.cancel(id);
        }
    }
}

struct MenuInner<P> {
    this: Weak<RefCell<Self>>,
    id: MenuId,
    config: MenuConfig<P>,
    tree: ItemTree<P>,
    surface: Option<Box<dyn MenuSurface>>,
    bus: EventBus<P>,
    subscription: Option<Subscription>,
    timers: Timers,
    mounted: bool,
    visible: bool,
    position: Point,
    data: Option<P>,
    nav: NavState,
    flyouts: BTreeMap<ItemId, Flyout>,
    key_scope: Vec<ItemId>,
    frames: Vec<TimerId>,
}

/// Run `f` against the menu from a timer or frame task.
fn with_inner<P>(weak: &Weak<RefCell<MenuInner<P>>>, f: impl FnOnce(&mut MenuInner<P>)) {
    let Some(inner) = weak.upgrade() else {
        return;
    };
    let Ok(mut m) = inner.try_borrow_mut() else {
        tracing::warn!("menu busy when a scheduled task ran");
        return;
    };
    if m.mounted {
        f(&mut m);
    }
}

/// Run `f` against the menu from a bus handler, then its effects.
fn deliver<P: Clone + 'static>(
    weak: &Weak<RefCell<MenuInner<P>>>,
    f: impl FnOnce(&mut MenuInner<P>) -> Vec<Effect<P>>,
) -> Result<(), HandlerError> {
    let Some(inner) = weak.upgrade() else {
        return Ok(());
    };
    let (effects, bus) = {
        let Ok(mut m) = inner.try_borrow_mut() else {
            tracing::warn!("menu busy during bus delivery");
            return Ok(());
        };
        if !m.mounted {
            return Ok(());
        }
        (f(&mut m), m.bus.clone())
    };
    run_effects(&bus, effects).map_err(|err| HandlerError::new(err.to_string()))
}

impl<P: Clone + 'static> MenuInner<P> {
    fn on_show(&mut self, event: &ShowEvent<P>) -> Vec<Effect<P>> {
        if !event.targets(&self.id) {
            return Vec::new();
        }
        if self.visible {
            tracing::trace!(menu = %self.id, "show ignored, already visible");
            return Vec::new();
        }
        self.visible = true;
        self.position = event.position;
        self.data = event.data.clone();
        self.nav.clear();
        self.schedule_placement();
        tracing::debug!(menu = %self.id, x = event.position.x, y = event.position.y, "shown");
        self.config
            .on_show
            .clone()
            .map(|f| Effect::Shown(f, event.clone()))
            .into_iter()
            .collect()
    }

    fn on_bus_hide(&mut self, event: &HideEvent) -> Vec<Effect<P>> {
        if !event.targets(&self.id) {
            tracing::trace!(menu = %self.id, "hide for another menu");
            return Vec::new();
        }
        self.hide(HideCause::Event(event.clone()))
    }

    fn hide(&mut self, cause: HideCause) -> Vec<Effect<P>> {
        if !self.visible {
            tracing::trace!(menu = %self.id, "hide ignored, not visible");
            return Vec::new();
        }
        self.visible = false;
        self.nav.clear();
        let timers = &self.timers;
        for flyout in self.flyouts.values_mut() {
            flyout.visible = false;
            flyout.cancel_hover(timers);
        }
        self.reconcile();
        self.cancel_frames();
        let weak = self.this.clone();
        let frame = self.timers.request_frame(move || {
            with_inner(&weak, |m| {
                if !m.visible
                    && let Some(surface) = m.surface.as_mut()
                {
                    surface.set_menu_visible(false);
                }
            });
        });
        self.frames.push(frame);
        tracing::debug!(menu = %self.id, ?cause, "hidden");
        self.config
            .on_hide
            .clone()
            .map(|f| Effect::Hidden(f, cause))
            .into_iter()
            .collect()
    }

    fn cancel_frames(&mut self) {
        for id in self.frames.drain(..) {
            self.timers.cancel(id);
        }
    }

    fn schedule_placement(&mut self) {
        self.cancel_frames();
        let weak = self.this.clone();
        let frame = self.timers.request_frame(move || {
            with_inner(&weak, |m| {
                if !m.visible {
                    return;
                }
                let origin = m.menu_origin();
                let weak = m.this.clone();
                let second = m.timers.request_frame(move || {
                    with_inner(&weak, |m| {
                        if !m.visible {
                            return;
                        }
                        if let Some(surface) = m.surface.as_mut() {
                            surface.set_menu_origin(origin);
                            surface.set_menu_visible(true);
                        }
                    });
                });
                m.frames.push(second);
            });
        });
        self.frames.push(frame);
    }

    /// Where the menu goes, from its measured size. The raw anchor if it
    /// cannot be measured.
    fn menu_origin(&self) -> Point {
        let Some(surface) = self.surface.as_ref() else {
            return self.position;
        };
        match surface.menu_bounds() {
            Some(bounds) => place_menu(
                self.position,
                bounds.size(),
                surface.viewport(),
                self.config.rtl,
            ),
            None => self.position,
        }
    }

    fn contains(&self, position: Point) -> bool {
        let Some(surface) = self.surface.as_ref() else {
            return false;
        };
        if surface.menu_bounds().is_some_and(|r| r.contains(position)) {
            return true;
        }
        self.flyouts
            .iter()
            .filter(|(_, f)| f.shown)
            .any(|(&s, _)| surface.submenu_bounds(s).is_some_and(|r| r.contains(position)))
    }

    fn level_nav(&mut self, level: Option<ItemId>) -> Option<(&ItemTree<P>, &mut NavState)> {
        match level {
            None => Some((&self.tree, &mut self.nav)),
            Some(s) => self.flyouts.get_mut(&s).map(|f| (&self.tree, &mut f.nav)),
        }
    }

    fn level_is_open(&self, level: Option<ItemId>) -> bool {
        match level {
            None => self.visible,
            Some(s) => self.flyouts.get(&s).is_some_and(|f| f.shown),
        }
    }

    fn forces(&self, submenu: ItemId) -> bool {
        match self.tree.level_of(submenu) {
            Some(None) => self.nav.forces(submenu),
            Some(Some(parent)) => self
                .flyouts
                .get(&parent)
                .is_some_and(|f| f.nav.forces(submenu)),
            None => false,
        }
    }

    /// Bring every flyout in line with its effective visibility.
    fn reconcile(&mut self) {
        let order = self.tree.submenus();
        let mut open: BTreeMap<ItemId, bool> = BTreeMap::new();
        for &s in &order {
            let parent_open = match self.tree.level_of(s) {
                Some(None) => self.visible,
                Some(Some(parent)) => open.get(&parent).copied().unwrap_or(false),
                None => false,
            };
            let forced = self.forces(s);
            let flyout = self.flyouts.entry(s).or_default();
            if !parent_open {
                flyout.visible = false;
            }
            let effective = parent_open && self.tree.is_enabled(s) && (flyout.visible || forced);
            open.insert(s, effective);
        }
        for &s in order.iter().rev() {
            let shown = self.flyouts.get(&s).is_some_and(|f| f.shown);
            if shown && open.get(&s) != Some(&true) {
                self.close_flyout(s);
            }
        }
        for &s in &order {
            let shown = self.flyouts.get(&s).is_some_and(|f| f.shown);
            if !shown && open.get(&s) == Some(&true) {
                self.open_flyout(s);
            }
        }
    }

    fn open_flyout(&mut self, s: ItemId) {
        let flyout = self.flyouts.entry(s).or_default();
        flyout.shown = true;
        flyout.nav.clear();
        if let Some(frame) = flyout.frame.take() {
            self.timers.cancel(frame);
        }
        let weak = self.this.clone();
        flyout.frame = Some(self.timers.request_frame(move || {
            with_inner(&weak, |m| m.position_flyout(s));
        }));
        self.key_scope.push(s);
        tracing::debug!(menu = %self.id, submenu = ?s, "submenu opened");
    }

    fn close_flyout(&mut self, s: ItemId) {
        if let Some(flyout) = self.flyouts.get_mut(&s) {
            flyout.shown = false;
            flyout.visible = false;
            flyout.nav.clear();
            flyout.cancel_hover(&self.timers);
            if let Some(frame) = flyout.frame.take() {
                self.timers.cancel(frame);
            }
        }
        self.key_scope.retain(|&open| open != s);
        if let Some(surface) = self.surface.as_mut() {
            surface.set_submenu_placement(s, None);
        }
        tracing::debug!(menu = %self.id, submenu = ?s, "submenu closed");
    }

    fn position_flyout(&mut self, s: ItemId) {
        let Some(flyout) = self.flyouts.get_mut(&s) else {
            return;
        };
        flyout.frame = None;
        if !flyout.shown {
            return;
        }
        let rtl = self.config.rtl
            || matches!(self.tree.entry(s), Some(Entry::Submenu(submenu)) if submenu.rtl);
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        let placement = surface
            .submenu_bounds(s)
            .map(|bounds| place_flyout(bounds, surface.viewport(), rtl))
            .unwrap_or_default();
        surface.set_submenu_placement(s, Some(placement));
    }

    /// Close submenu `s` and release it in its parent.
    fn dismiss_flyout(&mut self, s: ItemId) {
        match self.tree.level_of(s) {
            Some(None) if self.nav.forces(s) => self.nav.force_submenu_open = false,
            Some(Some(parent)) => {
                if let Some(p) = self.flyouts.get_mut(&parent)
                    && p.nav.forces(s)
                {
                    p.nav.force_submenu_open = false;
                }
            }
            _ => {}
        }
        if let Some(flyout) = self.flyouts.get_mut(&s) {
            flyout.visible = false;
            flyout.cancel_hover(&self.timers);
        }
        self.reconcile();
    }

    fn key(&mut self, key: Key) -> (EventResponse, Vec<Effect<P>>) {
        if !self.visible {
            tracing::trace!(menu = %self.id, ?key, "key ignored, not visible");
            return (EventResponse::empty(), Vec::new());
        }
        let level = self.key_scope.last().copied();
        let Some((tree, state)) = self.level_nav(level) else {
            return (EventResponse::empty(), Vec::new());
        };
        let outcome = nav::handle_key(tree, level, state, key);
        match outcome {
            KeyOutcome::Ignored => (EventResponse::empty(), Vec::new()),
            KeyOutcome::Handled => {
                self.reconcile();
                (EventResponse::PREVENT_DEFAULT, Vec::new())
            }
            KeyOutcome::Dismiss(key) => {
                let effects = match level {
                    None if matches!(key, Key::Escape | Key::Enter) => {
                        alloc::vec![Effect::Publish(HideEvent::all())]
                    }
                    None => Vec::new(),
                    Some(s) => {
                        self.dismiss_flyout(s);
                        Vec::new()
                    }
                };
                (EventResponse::PREVENT_DEFAULT, effects)
            }
            KeyOutcome::Activate(item) => self.activation(item),
        }
    }

    fn activation(&mut self, item: ItemId) -> (EventResponse, Vec<Effect<P>>) {
        if !self.visible {
            return (EventResponse::empty(), Vec::new());
        }
        let (callback, prevent_close) = match self.tree.entry(item) {
            Some(Entry::Item(entry)) if !entry.disabled => {
                (entry.on_activate.clone(), entry.prevent_close)
            }
            Some(Entry::Submenu(entry)) if !entry.disabled => match &entry.on_activate {
                Some(f) => (Some(f.clone()), entry.prevent_close),
                None => return (EventResponse::PREVENT_DEFAULT, Vec::new()),
            },
            _ => {
                tracing::trace!(menu = %self.id, ?item, "not activatable");
                return (EventResponse::empty(), Vec::new());
            }
        };
        tracing::debug!(menu = %self.id, ?item, "activated");
        let mut effects = Vec::new();
        if let Some(f) = callback {
            let activation = Activation {
                menu: self.id.clone(),
                item,
                data: self.data.clone(),
            };
            effects.push(Effect::Activate(f, activation));
        }
        if !prevent_close {
            effects.push(Effect::Publish(HideEvent::all()));
        }
        (EventResponse::PREVENT_DEFAULT, effects)
    }

    fn document(&mut self, event: DocumentEvent) -> (EventResponse, Vec<Effect<P>>) {
        if !self.visible {
            tracing::trace!(menu = %self.id, ?event, "document event ignored, not visible");
            return (EventResponse::empty(), Vec::new());
        }
        let suppress = self.config.suppress;
        match event {
            DocumentEvent::PointerDown { position } | DocumentEvent::TouchStart { position } => {
                if self.contains(position) {
                    (EventResponse::empty(), Vec::new())
                } else {
                    (
                        EventResponse::empty(),
                        alloc::vec![Effect::Publish(HideEvent::all())],
                    )
                }
            }
            DocumentEvent::Scroll if !suppress.contains(Suppress::SCROLL) => {
                (EventResponse::empty(), self.hide(HideCause::Scroll))
            }
            DocumentEvent::Resize if !suppress.contains(Suppress::RESIZE) => {
                (EventResponse::empty(), self.hide(HideCause::Resize))
            }
            DocumentEvent::ContextMenu if !suppress.contains(Suppress::CONTEXT_MENU) => {
                (EventResponse::empty(), self.hide(HideCause::ContextMenu))
            }
            DocumentEvent::KeyDown(key) => self.key(key),
            DocumentEvent::Scroll | DocumentEvent::Resize | DocumentEvent::ContextMenu => {
                (EventResponse::empty(), Vec::new())
            }
        }
    }

    fn hover_item(&mut self, item: ItemId) {
        if !self.visible || !self.tree.is_enabled(item) {
            return;
        }
        let Some(level) = self.tree.level_of(item) else {
            return;
        };
        if !self.level_is_open(level) {
            return;
        }
        let Some((_, state)) = self.level_nav(level) else {
            return;
        };
        if state.selected != Some(item) {
            state.select(Some(item));
            self.reconcile();
        }
    }

    fn leave_item(&mut self, item: ItemId) {
        if !self.visible {
            return;
        }
        // The pointer is on its way into the open flyout.
        if self.flyouts.get(&item).is_some_and(|f| f.shown) {
            return;
        }
        let Some(level) = self.tree.level_of(item) else {
            return;
        };
        if let Some((_, state)) = self.level_nav(level) {
            state.clear();
            self.reconcile();
        }
    }

    fn submenu_enter(&mut self, s: ItemId) {
        if !self.visible || self.tree.kind(s) != Some(ItemKind::Submenu) {
            return;
        }
        let enabled = self.tree.is_enabled(s);
        let delay = match self.tree.entry(s) {
            Some(Entry::Submenu(submenu)) => submenu.hover_delay.unwrap_or(self.config.hover_delay),
            _ => self.config.hover_delay,
        };
        let flyout = self.flyouts.entry(s).or_default();
        if let Some(id) = flyout.close_timer.take() {
            self.timers.cancel(id);
        }
        if !enabled || flyout.visible {
            return;
        }
        if let Some(id) = flyout.open_timer.take() {
            self.timers.cancel(id);
        }
        let weak = self.this.clone();
        flyout.open_timer = Some(self.timers.schedule(delay, move || {
            with_inner(&weak, |m| {
                if let Some(flyout) = m.flyouts.get_mut(&s) {
                    flyout.open_timer = None;
                    flyout.visible = true;
                }
                m.reconcile();
            });
        }));
    }

    fn submenu_leave(&mut self, s: ItemId) {
        let delay = match self.tree.entry(s) {
            Some(Entry::Submenu(submenu)) => submenu.hover_delay.unwrap_or(self.config.hover_delay),
            _ => return,
        };
        let Some(flyout) = self.flyouts.get_mut(&s) else {
            return;
        };
        if let Some(id) = flyout.open_timer.take() {
            self.timers.cancel(id);
        }
        if !flyout.visible {
            return;
        }
        if let Some(id) = flyout.close_timer.take() {
            self.timers.cancel(id);
        }
        let weak = self.this.clone();
        flyout.close_timer = Some(self.timers.schedule(delay, move || {
            with_inner(&weak, |m| {
                if let Some(flyout) = m.flyouts.get_mut(&s) {
                    flyout.close_timer = None;
                    flyout.visible = false;
                }
                m.reconcile();
            });
        }));
    }

    /// Drop state for removed items and selections that went stale.
    fn revalidate(&mut self) {
        let dead: Vec<ItemId> = self
            .flyouts
            .keys()
            .copied()
            .filter(|&s| self.tree.kind(s) != Some(ItemKind::Submenu))
            .collect();
        for s in dead {
            if let Some(mut flyout) = self.flyouts.remove(&s) {
                flyout.cancel_hover(&self.timers);
                if let Some(frame) = flyout.frame.take() {
                    self.timers.cancel(frame);
                }
            }
            self.key_scope.retain(|&open| open != s);
        }
        self.nav.revalidate(&self.tree, None);
        for (&s, flyout) in &mut self.flyouts {
            flyout.nav.revalidate(&self.tree, Some(s));
        }
        self.reconcile();
    }

    fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        if let Some(subscription) = self.subscription.take() {
            self.bus.unregister(subscription);
        }
        self.cancel_frames();
        for flyout in self.flyouts.values_mut() {
            flyout.cancel_hover(&self.timers);
            if let Some(frame) = flyout.frame.take() {
                self.timers.cancel(frame);
            }
        }
        self.flyouts.clear();
        self.key_scope.clear();
        self.visible = false;
        self.surface = None;
        tracing::debug!(menu = %self.id, "unmounted");
    }
}

/// A mounted context menu.
///
/// Dropping the menu unmounts it.
pub struct ContextMenu<P: Clone + 'static = ()> {
    inner: Rc<RefCell<MenuInner<P>>>,
}

impl<P: Clone + 'static> fmt::Debug for ContextMenu<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(m) => f
                .debug_struct("ContextMenu")
                .field("id", &m.id)
                .field("visible", &m.visible)
                .field("position", &m.position)
                .field("nav", &m.nav)
                .field("key_scope", &m.key_scope)
                .field("mounted", &m.mounted)
                .finish_non_exhaustive(),
            Err(_) => f.debug_struct("ContextMenu").finish_non_exhaustive(),
        }
    }
}

impl<P: Clone + 'static> ContextMenu<P> {
    /// Mount a hidden menu and subscribe it to `bus`.
    ///
    /// Fails with [`MenuError::NoChildren`] if `items` is empty.
    pub fn mount(
        id: MenuId,
        bus: &EventBus<P>,
        timers: &Timers,
        items: ItemTree<P>,
        config: MenuConfig<P>,
        surface: impl MenuSurface + 'static,
    ) -> Result<Self, MenuError> {
        if items.is_empty() {
            return Err(MenuError::NoChildren);
        }
        let inner = Rc::new_cyclic(|this| {
            RefCell::new(MenuInner {
                this: this.clone(),
                id,
                config,
                tree: items,
                surface: Some(Box::new(surface) as Box<dyn MenuSurface>),
                bus: bus.clone(),
                subscription: None,
                timers: timers.clone(),
                mounted: true,
                visible: false,
                position: Point::ZERO,
                data: None,
                nav: NavState::default(),
                flyouts: BTreeMap::new(),
                key_scope: Vec::new(),
                frames: Vec::new(),
            })
        });
        let on_show = Rc::downgrade(&inner);
        let on_hide = Rc::downgrade(&inner);
        let subscription = bus.register(
            move |event| deliver(&on_show, |m| m.on_show(event)),
            move |event| deliver(&on_hide, |m| m.on_bus_hide(event)),
        );
        inner.borrow_mut().subscription = Some(subscription);
        tracing::debug!(menu = %inner.borrow().id, "mounted");
        Ok(Self { inner })
    }

    fn dispatch(
        &self,
        f: impl FnOnce(&mut MenuInner<P>) -> (EventResponse, Vec<Effect<P>>),
    ) -> Result<EventResponse, PublishError> {
        let (response, effects, bus) = {
            let Ok(mut m) = self.inner.try_borrow_mut() else {
                tracing::warn!("menu input while busy");
                return Ok(EventResponse::empty());
            };
            if !m.mounted {
                return Ok(EventResponse::empty());
            }
            let (response, effects) = f(&mut m);
            (response, effects, m.bus.clone())
        };
        run_effects(&bus, effects)?;
        Ok(response)
    }

    fn update(&self, f: impl FnOnce(&mut MenuInner<P>)) {
        // Nothing here publishes, so no effects.
        let _ = self.dispatch(|m| {
            f(m);
            (EventResponse::empty(), Vec::new())
        });
    }

    /// The menu's id.
    pub fn id(&self) -> MenuId {
        self.inner.borrow().id.clone()
    }

    /// Whether the menu is visible.
    pub fn is_visible(&self) -> bool {
        self.inner.borrow().visible
    }

    /// Anchor of the last accepted show event.
    pub fn position(&self) -> Point {
        self.inner.borrow().position
    }

    /// Payload of the last accepted show event.
    pub fn payload(&self) -> Option<P> {
        self.inner.borrow().data.clone()
    }

    /// Snapshot of the top-level state.
    pub fn state(&self) -> VisibilityState {
        let m = self.inner.borrow();
        VisibilityState {
            visible: m.visible,
            position: m.position,
            selected: m.nav.selected,
            force_submenu_open: m.nav.force_submenu_open,
        }
    }

    /// Selected top-level item.
    pub fn selected(&self) -> Option<ItemId> {
        self.inner.borrow().nav.selected
    }

    /// Selected item inside submenu `submenu`'s flyout.
    pub fn submenu_selected(&self, submenu: ItemId) -> Option<ItemId> {
        self.inner
            .borrow()
            .flyouts
            .get(&submenu)
            .and_then(|f| f.nav.selected)
    }

    /// Whether submenu `submenu`'s flyout is open.
    pub fn is_submenu_open(&self, submenu: ItemId) -> bool {
        self.inner
            .borrow()
            .flyouts
            .get(&submenu)
            .is_some_and(|f| f.shown)
    }

    /// The level keys are routed to: `None` for the top level, or the
    /// deepest open submenu.
    pub fn key_scope(&self) -> Option<ItemId> {
        self.inner.borrow().key_scope.last().copied()
    }

    /// Document events the host should forward right now.
    pub fn listeners(&self) -> Listeners {
        let m = self.inner.borrow();
        if !m.visible {
            return Listeners::empty();
        }
        let mut listeners = Listeners::POINTER_DOWN | Listeners::TOUCH_START | Listeners::KEY_DOWN;
        let suppress = m.config.suppress;
        if !suppress.contains(Suppress::SCROLL) {
            listeners |= Listeners::SCROLL;
        }
        if !suppress.contains(Suppress::RESIZE) {
            listeners |= Listeners::RESIZE;
        }
        if !suppress.contains(Suppress::CONTEXT_MENU) {
            listeners |= Listeners::CONTEXT_MENU;
        }
        listeners
    }

    /// Read the item tree, for rendering.
    pub fn with_items<R>(&self, f: impl FnOnce(&ItemTree<P>) -> R) -> R {
        f(&self.inner.borrow().tree)
    }

    /// Mutate the item tree.
    ///
    /// Selections that no longer point at a live, enabled item are cleared,
    /// and flyouts of removed or disabled submenus close.
    pub fn update_items<R>(&self, f: impl FnOnce(&mut ItemTree<P>) -> R) -> R {
        let mut m = self.inner.borrow_mut();
        let out = f(&mut m.tree);
        if m.mounted {
            m.revalidate();
        }
        out
    }

    /// Handle a key press, routed to the deepest open level.
    pub fn handle_key(&self, key: Key) -> Result<EventResponse, PublishError> {
        self.dispatch(|m| m.key(key))
    }

    /// Handle a forwarded document event.
    pub fn handle_document_event(
        &self,
        event: DocumentEvent,
    ) -> Result<EventResponse, PublishError> {
        self.dispatch(|m| m.document(event))
    }

    /// The pointer moved over `item`; enabled items become selected.
    pub fn item_pointer_move(&self, item: ItemId) {
        self.update(|m| m.hover_item(item));
    }

    /// The pointer left `item`; its level loses its selection.
    ///
    /// Leaving the title of an open submenu keeps the selection, so a
    /// keyboard-opened flyout stays open while the pointer moves into it.
    pub fn item_pointer_leave(&self, item: ItemId) {
        self.update(|m| m.leave_item(item));
    }

    /// Activate `item` by pointer.
    ///
    /// Runs the item's callback, then hides every menu unless the item
    /// prevents it. Disabled items, dividers and groups do nothing.
    pub fn activate(&self, item: ItemId) -> Result<EventResponse, PublishError> {
        self.dispatch(|m| m.activation(item))
    }

    /// The pointer entered submenu `submenu` (title or flyout).
    pub fn submenu_pointer_enter(&self, submenu: ItemId) {
        self.update(|m| m.submenu_enter(submenu));
    }

    /// The pointer left submenu `submenu` (title and flyout).
    pub fn submenu_pointer_leave(&self, submenu: ItemId) {
        self.update(|m| m.submenu_leave(submenu));
    }

    /// The pointer left the menu.
    pub fn pointer_leave_menu(&self) -> Result<EventResponse, PublishError> {
        self.dispatch(|m| {
            if !m.visible {
                return (EventResponse::empty(), Vec::new());
            }
            let mut effects = Vec::new();
            if let Some(f) = m.config.on_pointer_leave.clone() {
                effects.push(Effect::PointerLeft(f, m.data.clone()));
            }
            if m.config.hide_on_leave {
                effects.push(Effect::Publish(HideEvent::all()));
            }
            (EventResponse::PREVENT_DEFAULT, effects)
        })
    }

    /// A native context-menu request inside the menu. Hides this menu.
    pub fn context_menu_inside(&self) -> Result<EventResponse, PublishError> {
        self.dispatch(|m| {
            if !m.visible {
                return (EventResponse::empty(), Vec::new());
            }
            (EventResponse::PREVENT_DEFAULT, m.hide(HideCause::ContextMenu))
        })
    }

    /// Unsubscribe, cancel every timer and release the surface.
    ///
    /// Later input, bus events and pending tasks are no-ops.
    pub fn unmount(&self) {
        match self.inner.try_borrow_mut() {
            Ok(mut m) => m.unmount(),
            Err(_) => tracing::warn!("menu unmounted while busy"),
        }
    }
}

impl<P: Clone + 'static> Drop for ContextMenu<P> {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::{FlyoutPlacement, Side, VerticalAlign};
    use crate::surface::testing::{Recording, Write};
    use crate::tree::{MenuItem, Submenu};
    use alloc::vec;
    use kurbo::{Rect, Size};

    const VIEWPORT: Size = Size::new(800.0, 600.0);

    struct Fixture {
        bus: EventBus<u32>,
        timers: Timers,
        surface: Recording,
        menu: ContextMenu<u32>,
        activated: Rc<RefCell<Vec<Activation<u32>>>>,
        hidden: Rc<RefCell<Vec<HideCause>>>,
        copy: ItemId,
        paste: ItemId,
        more: ItemId,
        alpha: ItemId,
        beta: ItemId,
        delete: ItemId,
    }

    // Copy, Paste (disabled), ---, More > [Alpha, Beta], Group[Delete]
    fn fixture(config: MenuConfig<u32>) -> Fixture {
        let activated = Rc::new(RefCell::new(Vec::new()));
        let record = |activated: &Rc<RefCell<Vec<Activation<u32>>>>| {
            let activated = activated.clone();
            move |a: &Activation<u32>| activated.borrow_mut().push(a.clone())
        };
        let mut tree = ItemTree::new();
        let copy = tree
            .insert(None, MenuItem::new("Copy").on_activate(record(&activated)))
            .unwrap();
        let paste = tree
            .insert(None, MenuItem::new("Paste").disabled(true))
            .unwrap();
        tree.insert(None, Entry::Divider).unwrap();
        let more = tree.insert(None, Submenu::new("More")).unwrap();
        let alpha = tree
            .insert(Some(more), MenuItem::new("Alpha").on_activate(record(&activated)))
            .unwrap();
        let beta = tree
            .insert(Some(more), MenuItem::new("Beta").prevent_close(true))
            .unwrap();
        let group = tree.insert(None, Entry::Group).unwrap();
        let delete = tree.insert(Some(group), MenuItem::new("Delete")).unwrap();

        let hidden = Rc::new(RefCell::new(Vec::new()));
        let on_hide = hidden.clone();
        let config = config.with_on_hide(move |cause| on_hide.borrow_mut().push(cause.clone()));

        let bus = EventBus::new();
        let timers = Timers::new();
        let surface = Recording::new(VIEWPORT, Some(Rect::new(0.0, 0.0, 100.0, 200.0)));
        let menu = ContextMenu::mount(
            MenuId::new("main").unwrap(),
            &bus,
            &timers,
            tree,
            config,
            surface.clone(),
        )
        .unwrap();
        Fixture {
            bus,
            timers,
            surface,
            menu,
            activated,
            hidden,
            copy,
            paste,
            more,
            alpha,
            beta,
            delete,
        }
    }

    impl Fixture {
        fn show_at(&self, x: f64, y: f64, data: Option<u32>) {
            let event = ShowEvent {
                id: MenuId::new("main").unwrap(),
                position: Point::new(x, y),
                data,
            };
            self.bus.publish_show(&event).unwrap();
        }

        fn show(&self) {
            self.show_at(10.0, 10.0, None);
            self.frames();
        }

        fn frames(&self) {
            self.timers.run_frame();
            self.timers.run_frame();
        }

        fn key(&self, key: Key) -> EventResponse {
            self.menu.handle_key(key).unwrap()
        }

        fn flyout_writes(&self) -> Vec<Write> {
            self.surface
                .writes()
                .into_iter()
                .filter(|w| matches!(w, Write::Flyout(..)))
                .collect()
        }
    }

    #[test]
    fn mount_rejects_empty_tree() {
        let bus: EventBus = EventBus::new();
        let err = ContextMenu::mount(
            MenuId::new("m").unwrap(),
            &bus,
            &Timers::new(),
            ItemTree::new(),
            MenuConfig::default(),
            Recording::new(VIEWPORT, None),
        )
        .unwrap_err();
        assert_eq!(err, MenuError::NoChildren);
        assert!(bus.is_empty());
    }

    #[test]
    fn show_records_position_and_payload() {
        let f = fixture(MenuConfig::default());
        assert!(!f.menu.is_visible());
        f.show_at(30.0, 40.0, Some(7));
        let state = f.menu.state();
        assert!(state.visible);
        assert_eq!(state.position, Point::new(30.0, 40.0));
        assert_eq!(state.selected, None);
        assert_eq!(f.menu.payload(), Some(7));
    }

    #[test]
    fn distinct_ids_are_isolated() {
        let f = fixture(MenuConfig::default());
        let other = ShowEvent {
            id: MenuId::new("other").unwrap(),
            position: Point::ZERO,
            data: None,
        };
        f.bus.publish_show(&other).unwrap();
        assert!(!f.menu.is_visible());

        f.show();
        f.bus
            .publish_hide(&HideEvent::only(MenuId::new("other").unwrap()))
            .unwrap();
        assert!(f.menu.is_visible());
        f.bus.publish_hide(&HideEvent::all()).unwrap();
        assert!(!f.menu.is_visible());
    }

    #[test]
    fn show_while_visible_is_ignored() {
        let shows = Rc::new(RefCell::new(0));
        let counter = shows.clone();
        let f = fixture(MenuConfig::default().with_on_show(move |_| *counter.borrow_mut() += 1));
        f.show_at(10.0, 10.0, None);
        f.key(Key::Down);
        assert_eq!(f.menu.selected(), Some(f.copy));
        f.show_at(99.0, 99.0, None);
        assert_eq!(*shows.borrow(), 1);
        assert_eq!(f.menu.position(), Point::new(10.0, 10.0));
        assert_eq!(f.menu.selected(), Some(f.copy));
    }

    #[test]
    fn menus_on_one_bus_only_react_to_their_id() {
        let f = fixture(MenuConfig::default());
        let side_id = MenuId::new("side").unwrap();
        let mut tree = ItemTree::new();
        tree.insert(None, MenuItem::new("Pin")).unwrap();
        let side = ContextMenu::mount(
            side_id.clone(),
            &f.bus,
            &f.timers,
            tree,
            MenuConfig::default(),
            Recording::new(VIEWPORT, Some(Rect::new(0.0, 0.0, 80.0, 40.0))),
        )
        .unwrap();

        f.show();
        f.bus
            .publish_show(&ShowEvent {
                id: side_id,
                position: Point::new(300.0, 300.0),
                data: None,
            })
            .unwrap();
        assert!(f.menu.is_visible());
        assert!(side.is_visible());

        f.bus
            .publish_hide(&HideEvent::only(MenuId::new("main").unwrap()))
            .unwrap();
        assert!(!f.menu.is_visible());
        assert!(side.is_visible());
        f.show_at(50.0, 60.0, None);
        assert!(f.menu.is_visible());
        assert!(side.is_visible());
        assert_eq!(side.position(), Point::new(300.0, 300.0));

        f.bus.publish_hide(&HideEvent::all()).unwrap();
        assert!(!f.menu.is_visible());
        assert!(!side.is_visible());
    }

    #[test]
    fn placement_lands_on_second_frame() {
        let f = fixture(MenuConfig::default());
        f.show_at(750.0, 500.0, None);
        assert!(f.surface.writes().is_empty());
        f.timers.run_frame();
        assert!(f.surface.writes().is_empty());
        f.timers.run_frame();
        assert_eq!(
            f.surface.writes(),
            vec![Write::Origin(Point::new(650.0, 300.0)), Write::Visible(true)]
        );
    }

    #[test]
    fn rtl_placement_opens_left_of_anchor() {
        let f = fixture(MenuConfig::default().with_rtl(true));
        f.show_at(400.0, 10.0, None);
        f.frames();
        assert_eq!(f.surface.writes()[0], Write::Origin(Point::new(300.0, 10.0)));
    }

    #[test]
    fn hide_before_placement_cancels_it() {
        let f = fixture(MenuConfig::default());
        f.show_at(10.0, 10.0, None);
        f.timers.run_frame();
        f.bus.publish_hide(&HideEvent::all()).unwrap();
        f.frames();
        assert_eq!(f.surface.writes(), vec![Write::Visible(false)]);
    }

    #[test]
    fn listeners_follow_visibility_and_suppression() {
        let f = fixture(MenuConfig::default().with_suppress(Suppress::SCROLL));
        assert_eq!(f.menu.listeners(), Listeners::empty());
        f.show();
        let l = f.menu.listeners();
        assert!(l.contains(Listeners::POINTER_DOWN | Listeners::KEY_DOWN | Listeners::RESIZE));
        assert!(!l.contains(Listeners::SCROLL));
        f.bus.publish_hide(&HideEvent::all()).unwrap();
        assert_eq!(f.menu.listeners(), Listeners::empty());
    }

    #[test]
    fn outside_pointer_hides_inside_does_not() {
        let f = fixture(MenuConfig::default());
        f.show();
        // Placed at (10, 10), 100x200.
        f.menu
            .handle_document_event(DocumentEvent::PointerDown {
                position: Point::new(50.0, 50.0),
            })
            .unwrap();
        assert!(f.menu.is_visible());
        f.menu
            .handle_document_event(DocumentEvent::TouchStart {
                position: Point::new(500.0, 500.0),
            })
            .unwrap();
        assert!(!f.menu.is_visible());
        assert!(matches!(f.hidden.borrow()[0], HideCause::Event(HideEvent { id: None })));
    }

    #[test]
    fn scroll_hides_unless_suppressed() {
        let f = fixture(MenuConfig::default());
        f.show();
        f.menu
            .handle_document_event(DocumentEvent::Scroll)
            .unwrap();
        assert!(!f.menu.is_visible());
        assert_eq!(*f.hidden.borrow(), vec![HideCause::Scroll]);

        let f = fixture(MenuConfig::default().with_suppress(Suppress::all()));
        f.show();
        for event in [DocumentEvent::Scroll, DocumentEvent::Resize, DocumentEvent::ContextMenu] {
            f.menu.handle_document_event(event).unwrap();
        }
        assert!(f.menu.is_visible());
    }

    #[test]
    fn context_menu_inside_hides_locally() {
        let f = fixture(MenuConfig::default().with_suppress(Suppress::CONTEXT_MENU));
        f.show();
        let r = f.menu.context_menu_inside().unwrap();
        assert_eq!(r, EventResponse::PREVENT_DEFAULT);
        assert_eq!(*f.hidden.borrow(), vec![HideCause::ContextMenu]);
    }

    #[test]
    fn hide_writes_surface_on_next_frame() {
        let f = fixture(MenuConfig::default());
        f.show();
        f.bus.publish_hide(&HideEvent::all()).unwrap();
        assert_eq!(f.surface.writes().last(), Some(&Write::Visible(true)));
        f.timers.run_frame();
        assert_eq!(f.surface.writes().last(), Some(&Write::Visible(false)));
    }

    #[test]
    fn arrow_keys_walk_and_wrap() {
        let f = fixture(MenuConfig::default());
        f.show();
        assert_eq!(f.key(Key::Down), EventResponse::PREVENT_DEFAULT);
        assert_eq!(f.menu.selected(), Some(f.copy));
        f.key(Key::Down);
        assert_eq!(f.menu.selected(), Some(f.more));
        f.key(Key::Down);
        assert_eq!(f.menu.selected(), Some(f.delete));
        f.key(Key::Down);
        assert_eq!(f.menu.selected(), Some(f.copy));
        f.key(Key::Up);
        assert_eq!(f.menu.selected(), Some(f.delete));
        assert!(f.key(Key::Other).is_empty());
    }

    #[test]
    fn keys_are_ignored_while_hidden() {
        let f = fixture(MenuConfig::default());
        assert!(f.key(Key::Down).is_empty());
        assert_eq!(f.menu.selected(), None);
    }

    #[test]
    fn enter_activates_with_payload_and_hides() {
        let f = fixture(MenuConfig::default());
        f.show_at(10.0, 10.0, Some(42));
        f.key(Key::Down);
        f.key(Key::Enter);
        let activated = f.activated.borrow();
        assert_eq!(activated.len(), 1);
        assert_eq!(activated[0].item, f.copy);
        assert_eq!(activated[0].data, Some(42));
        assert_eq!(activated[0].menu.as_str(), "main");
        assert!(!f.menu.is_visible());
    }

    #[test]
    fn escape_hides_left_does_not_at_top_level() {
        let f = fixture(MenuConfig::default());
        f.show();
        assert_eq!(f.key(Key::Left), EventResponse::PREVENT_DEFAULT);
        assert!(f.menu.is_visible());
        f.key(Key::Escape);
        assert!(!f.menu.is_visible());
    }

    #[test]
    fn enter_without_selection_hides() {
        let f = fixture(MenuConfig::default());
        f.show();
        f.key(Key::Enter);
        assert!(!f.menu.is_visible());
    }

    #[test]
    fn pointer_activation_respects_disabled_and_prevent_close() {
        let f = fixture(MenuConfig::default());
        f.show();
        assert!(f.menu.activate(f.paste).unwrap().is_empty());
        assert!(f.menu.is_visible());

        f.menu.activate(f.beta).unwrap();
        assert!(f.menu.is_visible());

        f.menu.activate(f.alpha).unwrap();
        assert!(!f.menu.is_visible());
        assert_eq!(f.activated.borrow()[0].item, f.alpha);
    }

    #[test]
    fn hover_selects_enabled_items_only() {
        let f = fixture(MenuConfig::default());
        f.show();
        f.menu.item_pointer_move(f.paste);
        assert_eq!(f.menu.selected(), None);
        f.menu.item_pointer_move(f.copy);
        assert_eq!(f.menu.selected(), Some(f.copy));
        f.menu.item_pointer_leave(f.copy);
        assert_eq!(f.menu.selected(), None);
    }

    #[test]
    fn right_forces_submenu_and_routes_keys() {
        let f = fixture(MenuConfig::default());
        f.show();
        f.key(Key::Down);
        f.key(Key::Down);
        f.key(Key::Right);
        assert!(f.menu.state().force_submenu_open);
        assert!(f.menu.is_submenu_open(f.more));
        assert_eq!(f.menu.key_scope(), Some(f.more));

        f.key(Key::Down);
        assert_eq!(f.menu.submenu_selected(f.more), Some(f.alpha));
        assert_eq!(f.menu.selected(), Some(f.more));

        f.key(Key::Left);
        assert!(!f.menu.is_submenu_open(f.more));
        assert_eq!(f.menu.key_scope(), None);
        assert!(f.menu.is_visible());
        assert_eq!(f.menu.selected(), Some(f.more));
        assert!(!f.menu.state().force_submenu_open);
    }

    #[test]
    fn leaving_an_open_submenu_title_keeps_it_open() {
        let f = fixture(MenuConfig::default());
        f.show();
        f.menu.item_pointer_move(f.more);
        f.menu.item_pointer_leave(f.more);
        assert_eq!(f.menu.selected(), None);

        f.menu.item_pointer_move(f.more);
        f.key(Key::Right);
        assert!(f.menu.is_submenu_open(f.more));
        f.menu.item_pointer_leave(f.more);
        assert_eq!(f.menu.selected(), Some(f.more));
        assert!(f.menu.state().force_submenu_open);
        assert!(f.menu.is_submenu_open(f.more));
    }

    #[test]
    fn enter_in_submenu_activates_its_item() {
        let f = fixture(MenuConfig::default());
        f.show();
        f.menu.item_pointer_move(f.more);
        f.key(Key::Enter);
        assert!(f.menu.is_submenu_open(f.more));
        f.key(Key::Down);
        f.key(Key::Enter);
        assert_eq!(f.activated.borrow()[0].item, f.alpha);
        assert!(!f.menu.is_visible());
        assert!(!f.menu.is_submenu_open(f.more));
    }

    #[test]
    fn hover_intent_opens_and_closes_after_delay() {
        let f = fixture(MenuConfig::default().with_hover_delay(200));
        f.show();
        f.menu.submenu_pointer_enter(f.more);
        f.timers.advance(199);
        assert!(!f.menu.is_submenu_open(f.more));
        f.timers.advance(1);
        assert!(f.menu.is_submenu_open(f.more));

        f.menu.submenu_pointer_leave(f.more);
        f.timers.advance(199);
        assert!(f.menu.is_submenu_open(f.more));
        // Coming back in time cancels the close.
        f.menu.submenu_pointer_enter(f.more);
        f.timers.advance(1_000);
        assert!(f.menu.is_submenu_open(f.more));

        f.menu.submenu_pointer_leave(f.more);
        f.timers.advance(200);
        assert!(!f.menu.is_submenu_open(f.more));
    }

    #[test]
    fn brief_hover_never_opens() {
        let f = fixture(MenuConfig::default());
        f.show();
        f.menu.submenu_pointer_enter(f.more);
        f.timers.advance(100);
        f.menu.submenu_pointer_leave(f.more);
        f.timers.advance(10_000);
        assert!(!f.menu.is_submenu_open(f.more));
        assert!(f.flyout_writes().is_empty());
    }

    #[test]
    fn hover_and_force_only_act_on_net_change() {
        let f = fixture(MenuConfig::default());
        f.show();
        f.menu.item_pointer_move(f.more);
        f.key(Key::Right);
        f.timers.run_frame();
        assert_eq!(f.flyout_writes().len(), 1);

        // Hover intent on a forced flyout changes nothing.
        f.menu.submenu_pointer_enter(f.more);
        f.timers.advance(DEFAULT_HOVER_DELAY);
        f.timers.run_frame();
        assert_eq!(f.flyout_writes().len(), 1);

        // Releasing the force keeps the hover-opened flyout.
        f.menu.item_pointer_move(f.copy);
        assert!(!f.menu.state().force_submenu_open);
        assert!(f.menu.is_submenu_open(f.more));
        assert_eq!(f.flyout_writes().len(), 1);

        f.menu.submenu_pointer_leave(f.more);
        f.timers.advance(DEFAULT_HOVER_DELAY);
        assert!(!f.menu.is_submenu_open(f.more));
        assert_eq!(f.flyout_writes().last(), Some(&Write::Flyout(f.more, None)));
    }

    #[test]
    fn hover_opened_submenu_takes_keys() {
        let f = fixture(MenuConfig::default());
        f.show();
        f.menu.submenu_pointer_enter(f.more);
        f.timers.advance(DEFAULT_HOVER_DELAY);
        assert_eq!(f.menu.key_scope(), Some(f.more));
        f.key(Key::Up);
        assert_eq!(f.menu.submenu_selected(f.more), Some(f.beta));
        assert_eq!(f.menu.selected(), None);
    }

    #[test]
    fn flyout_placement_uses_measured_bounds() {
        let f = fixture(MenuConfig::default());
        f.surface
            .set_flyout(f.more, Rect::new(700.0, 500.0, 900.0, 700.0));
        f.show();
        f.menu.item_pointer_move(f.more);
        f.key(Key::Right);
        f.timers.run_frame();
        assert_eq!(
            f.flyout_writes(),
            vec![Write::Flyout(
                f.more,
                Some(FlyoutPlacement {
                    vertical: VerticalAlign::Bottom,
                    side: Side::Left,
                })
            )]
        );
        f.key(Key::Escape);
        assert_eq!(f.flyout_writes().last(), Some(&Write::Flyout(f.more, None)));
    }

    #[test]
    fn pointer_inside_open_flyout_is_not_outside() {
        let f = fixture(MenuConfig::default());
        f.surface
            .set_flyout(f.more, Rect::new(110.0, 10.0, 210.0, 110.0));
        f.show();
        f.menu.item_pointer_move(f.more);
        f.key(Key::Right);
        f.menu
            .handle_document_event(DocumentEvent::PointerDown {
                position: Point::new(150.0, 50.0),
            })
            .unwrap();
        assert!(f.menu.is_visible());
    }

    #[test]
    fn hide_closes_submenus() {
        let f = fixture(MenuConfig::default());
        f.show();
        f.menu.item_pointer_move(f.more);
        f.key(Key::Right);
        f.bus.publish_hide(&HideEvent::all()).unwrap();
        assert!(!f.menu.is_submenu_open(f.more));
        assert_eq!(f.menu.key_scope(), None);

        // Reopening starts clean.
        f.show();
        assert!(!f.menu.is_submenu_open(f.more));
        assert_eq!(f.menu.selected(), None);
    }

    #[test]
    fn hide_for_another_menu_leaves_submenus_open() {
        let f = fixture(MenuConfig::default());
        f.show();
        f.menu.item_pointer_move(f.more);
        f.key(Key::Right);
        f.bus
            .publish_hide(&HideEvent::only(MenuId::new("other").unwrap()))
            .unwrap();
        assert!(f.menu.is_submenu_open(f.more));
    }

    #[test]
    fn removing_or_disabling_selection_clears_it() {
        let f = fixture(MenuConfig::default());
        f.show();
        f.key(Key::Down);
        assert_eq!(f.menu.selected(), Some(f.copy));
        f.menu
            .update_items(|tree| tree.set_disabled(f.copy, true))
            .unwrap();
        assert_eq!(f.menu.selected(), None);

        f.menu.item_pointer_move(f.more);
        f.key(Key::Right);
        assert!(f.menu.is_submenu_open(f.more));
        assert!(f.menu.update_items(|tree| tree.remove(f.more)));
        assert_eq!(f.menu.selected(), None);
        assert_eq!(f.menu.key_scope(), None);
        assert!(!f.menu.is_submenu_open(f.more));
    }

    #[test]
    fn pointer_leave_reports_and_optionally_hides() {
        let left = Rc::new(RefCell::new(Vec::new()));
        let sink = left.clone();
        let f = fixture(
            MenuConfig::default()
                .with_hide_on_leave(true)
                .with_on_pointer_leave(move |data| sink.borrow_mut().push(data.copied())),
        );
        f.show_at(0.0, 0.0, Some(3));
        f.menu.pointer_leave_menu().unwrap();
        assert_eq!(*left.borrow(), vec![Some(3)]);
        assert!(!f.menu.is_visible());
    }

    #[test]
    fn callbacks_may_reenter_the_menu() {
        let f = fixture(MenuConfig::default());
        let bus = f.bus.downgrade();
        // A later subscriber that answers every hide by reopening the menu.
        f.bus.register(
            |_| Ok(()),
            move |_| {
                let Some(bus) = bus.upgrade() else {
                    return Ok(());
                };
                let event = ShowEvent {
                    id: MenuId::new("main").unwrap(),
                    position: Point::new(5.0, 5.0),
                    data: None,
                };
                bus.publish_show(&event)
                    .map(drop)
                    .map_err(|e| HandlerError::new(e.to_string()))
            },
        );
        f.show();
        f.key(Key::Escape);
        assert_eq!(f.hidden.borrow().len(), 1);
        assert!(f.menu.is_visible());
        assert_eq!(f.menu.position(), Point::new(5.0, 5.0));
    }

    #[test]
    fn unmount_silences_everything() {
        let f = fixture(MenuConfig::default());
        f.show_at(10.0, 10.0, None);
        f.menu.item_pointer_move(f.more);
        f.menu.submenu_pointer_enter(f.more);
        f.menu.unmount();
        assert!(f.bus.is_empty());
        assert_eq!(f.timers.pending(), 0);

        f.show_at(20.0, 20.0, None);
        f.frames();
        f.timers.advance(10_000);
        assert!(!f.menu.is_visible());
        assert!(f.key(Key::Down).is_empty());
        assert!(f.surface.writes().is_empty());
    }

    #[test]
    fn drop_unsubscribes() {
        let f = fixture(MenuConfig::default());
        let Fixture { bus, menu, .. } = f;
        assert_eq!(bus.len(), 1);
        drop(menu);
        assert!(bus.is_empty());
    }
}
