// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Triggers: turn clicks, context-menu requests, and long presses into show events.
//!
//! ## Overview
//!
//! A [`ContextMenuTrigger`] stands for the element a user right-clicks or
//! presses. The host forwards that element's input as [`TriggerInput`]; the
//! trigger answers with an [`EventResponse`] telling the host whether to
//! suppress the native behavior.
//!
//! A qualifying interaction publishes a global hide followed by a show for
//! the trigger's menu. The show carries the pointer position (minus the
//! configured offset) and whatever the payload collector returned. If the
//! collector hands back a [`oneshot::Receiver`], the trigger checks it every
//! [`PAYLOAD_POLL_INTERVAL`] time units and publishes the show once a value
//! arrives. Dropping the sender means the menu never opens for that
//! interaction, and so does unmounting the trigger first.
//!
//! ## Long press
//!
//! Primary-button presses and touches arm a hold timer of
//! [`TriggerConfig::hold_to_display`] time units. Releasing or leaving the
//! element before it elapses disarms it. A new press replaces a pending one,
//! so at most one show fires per hold.
//!
//! ```
//! use kurbo::Point;
//! use understory_menu::bus::EventBus;
//! use understory_menu::timer::Timers;
//! use understory_menu::trigger::{ContextMenuTrigger, TriggerConfig, TriggerInput};
//! use understory_menu::types::{EventResponse, MenuId, PointerButton};
//!
//! let bus: EventBus = EventBus::new();
//! let timers = Timers::new();
//! let trigger = ContextMenuTrigger::new(
//!     MenuId::new("ctx").unwrap(),
//!     &bus,
//!     &timers,
//!     TriggerConfig::default(),
//! );
//! let response = trigger
//!     .handle(TriggerInput::ContextMenu {
//!         button: PointerButton::Secondary,
//!         position: Point::new(20.0, 30.0),
//!         shift: false,
//!     })
//!     .unwrap();
//! assert!(response.contains(EventResponse::PREVENT_DEFAULT));
//! assert_eq!(bus.last_shown().unwrap().position, Point::new(20.0, 30.0));
//! ```

use alloc::rc::{Rc, Weak};
use core::cell::RefCell;
use core::fmt;

use futures::channel::oneshot;
use kurbo::{Point, Vec2};

use crate::bus::EventBus;
use crate::error::PublishError;
use crate::timer::{TimerId, Timers};
use crate::types::{EventResponse, HideEvent, MenuId, PointerButton, ShowEvent};

/// Default long-press duration.
pub const DEFAULT_HOLD_TO_DISPLAY: u64 = 1000;

/// How often a pending payload receiver is checked.
pub const PAYLOAD_POLL_INTERVAL: u64 = 16;

/// Input forwarded from the trigger element.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum TriggerInput {
    /// A pointer button went down over the element.
    PointerDown {
        /// Which button.
        button: PointerButton,
        /// Pointer position in viewport coordinates.
        position: Point,
        /// Whether shift was held.
        shift: bool,
    },
    /// A pointer button went up over the element.
    PointerUp {
        /// Which button.
        button: PointerButton,
    },
    /// The pointer left the element.
    PointerLeave {
        /// The button reported with the leave event.
        button: PointerButton,
    },
    /// A touch began on the element.
    TouchStart {
        /// Position of the first touch point.
        position: Point,
    },
    /// The touch ended.
    TouchEnd,
    /// The platform asked for a context menu (usually right click).
    ContextMenu {
        /// Which button.
        button: PointerButton,
        /// Pointer position in viewport coordinates.
        position: Point,
        /// Whether shift was held.
        shift: bool,
    },
    /// A click completed on the element.
    Click {
        /// Which button.
        button: PointerButton,
        /// Pointer position in viewport coordinates.
        position: Point,
        /// Whether shift was held.
        shift: bool,
    },
}

/// Result of a payload collector.
pub enum Collect<P> {
    /// No payload.
    Nothing,
    /// Payload available now.
    Ready(P),
    /// Payload arrives later through the channel; the show waits for it.
    Deferred(oneshot::Receiver<P>),
}

impl<P> fmt::Debug for Collect<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nothing => f.write_str("Nothing"),
            Self::Ready(_) => f.write_str("Ready(..)"),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Produces the payload attached to a show event.
pub type Collector<P> = Rc<dyn Fn() -> Collect<P>>;

/// Configuration for a [`ContextMenuTrigger`].
pub struct TriggerConfig<P = ()> {
    /// Long-press duration; `None` disables long press.
    pub hold_to_display: Option<u64>,
    /// Button whose click or context-menu request opens the menu.
    pub mouse_button: PointerButton,
    /// Ignore every interaction.
    pub disabled: bool,
    /// Ignore interactions while shift is held.
    pub disable_if_shift_pressed: bool,
    /// Subtracted from the pointer position.
    pub offset: Vec2,
    /// Payload collector.
    pub collect: Option<Collector<P>>,
}

impl<P> Default for TriggerConfig<P> {
    fn default() -> Self {
        Self {
            hold_to_display: Some(DEFAULT_HOLD_TO_DISPLAY),
            mouse_button: PointerButton::Secondary,
            disabled: false,
            disable_if_shift_pressed: false,
            offset: Vec2::ZERO,
            collect: None,
        }
    }
}

impl<P> fmt::Debug for TriggerConfig<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerConfig")
            .field("hold_to_display", &self.hold_to_display)
            .field("mouse_button", &self.mouse_button)
            .field("disabled", &self.disabled)
            .field("disable_if_shift_pressed", &self.disable_if_shift_pressed)
            .field("offset", &self.offset)
            .field("collect", &self.collect.is_some())
            .finish()
    }
}

impl<P> TriggerConfig<P> {
    /// Set the long-press duration, or disable long press with `None`.
    pub fn with_hold_to_display(mut self, hold: Option<u64>) -> Self {
        self.hold_to_display = hold;
        self
    }

    /// Set the button that opens the menu.
    pub fn with_mouse_button(mut self, button: PointerButton) -> Self {
        self.mouse_button = button;
        self
    }

    /// Disable the trigger.
    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Ignore interactions while shift is held.
    pub fn with_disable_if_shift_pressed(mut self, disable: bool) -> Self {
        self.disable_if_shift_pressed = disable;
        self
    }

    /// Set the offset subtracted from pointer positions.
    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// Set the payload collector.
    pub fn with_collect(mut self, collect: impl Fn() -> Collect<P> + 'static) -> Self {
        self.collect = Some(Rc::new(collect));
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Hold {
    Pointer,
    Touch,
}

struct TriggerInner<P> {
    this: Weak<RefCell<Self>>,
    id: MenuId,
    config: TriggerConfig<P>,
    bus: EventBus<P>,
    timers: Timers,
    pointer_hold: Option<TimerId>,
    touch_hold: Option<TimerId>,
    payload_poll: Option<TimerId>,
    touch_handled: bool,
    mounted: bool,
}

impl<P: Clone + 'static> TriggerInner<P> {
    fn arm(&mut self, hold: Hold, delay: u64, position: Point, shift: bool) {
        self.disarm(hold);
        let weak = self.this.clone();
        let id = self.timers.schedule(delay, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let fired = {
                let Ok(mut t) = inner.try_borrow_mut() else {
                    tracing::warn!("trigger busy when its hold elapsed");
                    return;
                };
                match hold {
                    Hold::Pointer => t.pointer_hold = None,
                    Hold::Touch => t.touch_hold = None,
                }
                t.prepare(position, shift)
            };
            if let Some(show) = fired {
                if hold == Hold::Touch {
                    inner.borrow_mut().touch_handled = true;
                }
                if let Err(err) = show.publish() {
                    tracing::warn!(%err, "long press could not be delivered");
                }
            }
        });
        match hold {
            Hold::Pointer => self.pointer_hold = Some(id),
            Hold::Touch => self.touch_hold = Some(id),
        }
    }

    fn disarm(&mut self, hold: Hold) {
        let slot = match hold {
            Hold::Pointer => &mut self.pointer_hold,
            Hold::Touch => &mut self.touch_hold,
        };
        if let Some(id) = slot.take() {
            self.timers.cancel(id);
        }
    }

    fn abandon_payload(&mut self) {
        if let Some(id) = self.payload_poll.take() {
            self.timers.cancel(id);
        }
    }

    // Everything a qualifying interaction needs, captured so publishing can
    // happen with no borrow held.
    fn prepare(&mut self, position: Point, shift: bool) -> Option<PendingShow<P>> {
        if !self.mounted || self.config.disabled {
            return None;
        }
        if self.config.disable_if_shift_pressed && shift {
            return None;
        }
        self.disarm(Hold::Pointer);
        self.disarm(Hold::Touch);
        self.abandon_payload();
        Some(PendingShow {
            trigger: self.this.clone(),
            bus: self.bus.clone(),
            id: self.id.clone(),
            position: position - self.config.offset,
            collect: self.config.collect.clone(),
        })
    }
}

struct PendingShow<P> {
    trigger: Weak<RefCell<TriggerInner<P>>>,
    bus: EventBus<P>,
    id: MenuId,
    position: Point,
    collect: Option<Collector<P>>,
}

impl<P: Clone + 'static> PendingShow<P> {
    fn publish(self) -> Result<(), PublishError> {
        tracing::debug!(menu = %self.id, x = self.position.x, y = self.position.y, "trigger fired");
        self.bus.publish_hide(&HideEvent::all())?;
        let collected = self.collect.as_ref().map_or(Collect::Nothing, |c| c());
        let event = |data| ShowEvent {
            id: self.id.clone(),
            position: self.position,
            data,
        };
        match collected {
            Collect::Nothing => self.bus.publish_show(&event(None)).map(drop),
            Collect::Ready(data) => self.bus.publish_show(&event(Some(data))).map(drop),
            Collect::Deferred(receiver) => {
                AwaitPayload {
                    trigger: self.trigger,
                    id: self.id,
                    position: self.position,
                    receiver,
                }
                .poll();
                Ok(())
            }
        }
    }
}

// A show waiting on its payload. Polled on a timer; there is no executor.
struct AwaitPayload<P> {
    trigger: Weak<RefCell<TriggerInner<P>>>,
    id: MenuId,
    position: Point,
    receiver: oneshot::Receiver<P>,
}

impl<P: Clone + 'static> AwaitPayload<P> {
    fn poll(mut self) {
        let Some(inner) = self.trigger.upgrade() else {
            return;
        };
        let (bus, timers) = {
            let Ok(mut t) = inner.try_borrow_mut() else {
                tracing::warn!("trigger busy when its payload was polled");
                return;
            };
            t.payload_poll = None;
            if !t.mounted {
                return;
            }
            (t.bus.clone(), t.timers.clone())
        };
        let received = self.receiver.try_recv();
        match received {
            Ok(Some(data)) => {
                let event = ShowEvent {
                    id: self.id,
                    position: self.position,
                    data: Some(data),
                };
                if let Err(err) = bus.publish_show(&event) {
                    tracing::warn!(%err, "deferred show could not be delivered");
                }
            }
            Ok(None) => {
                let poll = timers.schedule(PAYLOAD_POLL_INTERVAL, move || self.poll());
                inner.borrow_mut().payload_poll = Some(poll);
            }
            Err(oneshot::Canceled) => {
                tracing::trace!(menu = %self.id, "payload sender dropped");
            }
        }
    }
}

/// The element that opens a menu.
///
/// Dropping the trigger (or calling [`ContextMenuTrigger::unmount`]) cancels
/// any pending long press or payload.
pub struct ContextMenuTrigger<P: Clone + 'static = ()> {
    inner: Rc<RefCell<TriggerInner<P>>>,
}

impl<P: Clone + 'static> fmt::Debug for ContextMenuTrigger<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(t) => f
                .debug_struct("ContextMenuTrigger")
                .field("id", &t.id)
                .field("config", &t.config)
                .field("pointer_hold", &t.pointer_hold)
                .field("touch_hold", &t.touch_hold)
                .field("mounted", &t.mounted)
                .finish_non_exhaustive(),
            Err(_) => f.debug_struct("ContextMenuTrigger").finish_non_exhaustive(),
        }
    }
}

impl<P: Clone + 'static> ContextMenuTrigger<P> {
    /// Create a trigger for menu `id`.
    pub fn new(id: MenuId, bus: &EventBus<P>, timers: &Timers, config: TriggerConfig<P>) -> Self {
        let inner = Rc::new_cyclic(|this| {
            RefCell::new(TriggerInner {
                this: this.clone(),
                id,
                config,
                bus: bus.clone(),
                timers: timers.clone(),
                pointer_hold: None,
                touch_hold: None,
                payload_poll: None,
                touch_handled: false,
                mounted: true,
            })
        });
        Self { inner }
    }

    /// The menu this trigger opens.
    pub fn id(&self) -> MenuId {
        self.inner.borrow().id.clone()
    }

    /// Enable or disable the trigger.
    pub fn set_disabled(&self, disabled: bool) {
        self.inner.borrow_mut().config.disabled = disabled;
    }

    /// Returns true while a long press is armed.
    pub fn is_holding(&self) -> bool {
        let t = self.inner.borrow();
        t.pointer_hold.is_some() || t.touch_hold.is_some()
    }

    /// Feed one input event from the trigger element.
    ///
    /// Publishing happens synchronously; a failing bus subscriber surfaces
    /// here as [`PublishError`].
    pub fn handle(&self, input: TriggerInput) -> Result<EventResponse, PublishError> {
        let mut t = self.inner.borrow_mut();
        if !t.mounted {
            return Ok(EventResponse::empty());
        }
        let hold = t.config.hold_to_display;
        match input {
            TriggerInput::PointerDown {
                button: PointerButton::Primary,
                position,
                shift,
            } => match hold {
                Some(delay) => {
                    t.arm(Hold::Pointer, delay, position, shift);
                    Ok(EventResponse::STOP_PROPAGATION)
                }
                None => Ok(EventResponse::empty()),
            },
            TriggerInput::PointerUp {
                button: PointerButton::Primary,
            }
            | TriggerInput::PointerLeave {
                button: PointerButton::Primary,
            } => {
                t.disarm(Hold::Pointer);
                Ok(EventResponse::empty())
            }
            TriggerInput::TouchStart { position } => {
                t.touch_handled = false;
                match hold {
                    Some(delay) => {
                        t.arm(Hold::Touch, delay, position, false);
                        Ok(EventResponse::STOP_PROPAGATION)
                    }
                    None => Ok(EventResponse::empty()),
                }
            }
            TriggerInput::TouchEnd => {
                t.disarm(Hold::Touch);
                // Swallow the synthetic click that follows a long press.
                if t.touch_handled {
                    Ok(EventResponse::PREVENT_DEFAULT)
                } else {
                    Ok(EventResponse::empty())
                }
            }
            TriggerInput::ContextMenu {
                button,
                position,
                shift,
            }
            | TriggerInput::Click {
                button,
                position,
                shift,
            } if button == t.config.mouse_button => {
                let Some(show) = t.prepare(position, shift) else {
                    return Ok(EventResponse::empty());
                };
                drop(t);
                show.publish()?;
                Ok(EventResponse::PREVENT_DEFAULT | EventResponse::STOP_PROPAGATION)
            }
            _ => Ok(EventResponse::empty()),
        }
    }

    /// Cancel pending long presses and payloads, and ignore further input.
    pub fn unmount(&self) {
        let Ok(mut t) = self.inner.try_borrow_mut() else {
            tracing::warn!("trigger unmounted while busy");
            return;
        };
        t.mounted = false;
        t.disarm(Hold::Pointer);
        t.disarm(Hold::Touch);
        t.abandon_payload();
    }
}

impl<P: Clone + 'static> Drop for ContextMenuTrigger<P> {
    fn drop(&mut self) {
        self.unmount();
    }
}
