// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Show/hide event bus.
//!
//! ## Overview
//!
//! Triggers publish [`ShowEvent`]s and [`HideEvent`]s; menus subscribe.
//! Delivery is synchronous and goes to every subscriber in registration
//! order. Subscribers filter by [`MenuId`](crate::types::MenuId) themselves.
//!
//! ## Re-entrancy
//!
//! The subscriber list is snapshotted before delivery, so handlers may
//! register, unregister, or publish. A subscriber removed during delivery is
//! skipped for the rest of that delivery; one added during delivery first
//! sees the next event.
//!
//! ## Failure
//!
//! The first handler returning an error stops delivery. The error is
//! returned from [`EventBus::publish_show`] / [`EventBus::publish_hide`].
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use understory_menu::bus::EventBus;
//! use understory_menu::types::HideEvent;
//!
//! let bus: EventBus = EventBus::new();
//! let hides = Rc::new(Cell::new(0));
//! let seen = hides.clone();
//! let sub = bus.register(|_| Ok(()), move |_| {
//!     seen.set(seen.get() + 1);
//!     Ok(())
//! });
//! bus.publish_hide(&HideEvent::all()).unwrap();
//! assert_eq!(hides.get(), 1);
//! assert!(bus.unregister(sub));
//! ```

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::cell::RefCell;

use crate::error::{HandlerError, PublishError};
use crate::types::{HideEvent, ShowEvent};

/// Handler invoked for every show event.
pub type ShowHandler<P> = Rc<dyn Fn(&ShowEvent<P>) -> Result<(), HandlerError>>;

/// Handler invoked for every hide event.
pub type HideHandler = Rc<dyn Fn(&HideEvent) -> Result<(), HandlerError>>;

/// Opaque handle returned by [`EventBus::register`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(u64);

struct Entry<P> {
    subscription: Subscription,
    on_show: ShowHandler<P>,
    on_hide: HideHandler,
}

struct Registry<P> {
    next: u64,
    entries: Vec<Entry<P>>,
    last_shown: Option<ShowEvent<P>>,
}

impl<P> Registry<P> {
    fn contains(&self, subscription: Subscription) -> bool {
        self.entries
            .iter()
            .any(|e| e.subscription == subscription)
    }
}

/// Cloneable handle to a shared subscriber registry.
///
/// Construct one per isolated menu world and pass it to triggers and menus.
/// Clones share the same registry.
pub struct EventBus<P = ()> {
    inner: Rc<RefCell<Registry<P>>>,
}

impl<P> Clone for EventBus<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P> core::fmt::Debug for EventBus<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let subscribers = self.inner.try_borrow().map(|r| r.entries.len()).ok();
        f.debug_struct("EventBus")
            .field("subscribers", &subscribers)
            .finish_non_exhaustive()
    }
}

impl<P: Clone + 'static> Default for EventBus<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone + 'static> EventBus<P> {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(Registry {
                next: 1,
                entries: Vec::new(),
                last_shown: None,
            })),
        }
    }

    /// Register a pair of handlers and return a handle for [`EventBus::unregister`].
    pub fn register(
        &self,
        on_show: impl Fn(&ShowEvent<P>) -> Result<(), HandlerError> + 'static,
        on_hide: impl Fn(&HideEvent) -> Result<(), HandlerError> + 'static,
    ) -> Subscription {
        let mut reg = self.inner.borrow_mut();
        let subscription = Subscription(reg.next);
        reg.next += 1;
        reg.entries.push(Entry {
            subscription,
            on_show: Rc::new(on_show),
            on_hide: Rc::new(on_hide),
        });
        tracing::trace!(?subscription, "bus subscriber registered");
        subscription
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unregister(&self, subscription: Subscription) -> bool {
        let mut reg = self.inner.borrow_mut();
        let before = reg.entries.len();
        reg.entries.retain(|e| e.subscription != subscription);
        let removed = reg.entries.len() != before;
        if removed {
            tracing::trace!(?subscription, "bus subscriber unregistered");
        }
        removed
    }

    /// Returns true if `subscription` is still registered.
    pub fn is_registered(&self, subscription: Subscription) -> bool {
        self.inner.borrow().contains(subscription)
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    /// Returns true if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The most recent show event published on this bus.
    ///
    /// Menus use it to hand the trigger payload to item activations.
    pub fn last_shown(&self) -> Option<ShowEvent<P>> {
        self.inner.borrow().last_shown.clone()
    }

    /// Deliver a show event to every subscriber.
    ///
    /// Returns the number of handlers that ran.
    pub fn publish_show(&self, event: &ShowEvent<P>) -> Result<usize, PublishError> {
        let snapshot: Vec<(Subscription, ShowHandler<P>)> = {
            let mut reg = self.inner.borrow_mut();
            reg.last_shown = Some(event.clone());
            reg.entries
                .iter()
                .map(|e| (e.subscription, e.on_show.clone()))
                .collect()
        };
        tracing::trace!(menu = %event.id, subscribers = snapshot.len(), "publish show");
        self.deliver(snapshot, |handler| handler(event))
    }

    /// Deliver a hide event to every subscriber.
    ///
    /// Returns the number of handlers that ran.
    pub fn publish_hide(&self, event: &HideEvent) -> Result<usize, PublishError> {
        let snapshot: Vec<(Subscription, HideHandler)> = self
            .inner
            .borrow()
            .entries
            .iter()
            .map(|e| (e.subscription, e.on_hide.clone()))
            .collect();
        tracing::trace!(menu = ?event.id, subscribers = snapshot.len(), "publish hide");
        self.deliver(snapshot, |handler| handler(event))
    }

    /// Create a handle that does not keep the registry alive.
    pub fn downgrade(&self) -> WeakEventBus<P> {
        WeakEventBus {
            inner: Rc::downgrade(&self.inner),
        }
    }

    fn deliver<H>(
        &self,
        snapshot: Vec<(Subscription, H)>,
        call: impl Fn(&H) -> Result<(), HandlerError>,
    ) -> Result<usize, PublishError> {
        let mut delivered = 0;
        for (subscription, handler) in snapshot {
            // Skip subscribers removed by an earlier handler in this delivery.
            if !self.inner.borrow().contains(subscription) {
                continue;
            }
            call(&handler).map_err(|source| PublishError::Handler {
                subscription,
                source,
            })?;
            delivered += 1;
        }
        Ok(delivered)
    }
}

/// Non-owning bus handle, used by subscribers that must not keep the bus alive.
pub struct WeakEventBus<P = ()> {
    inner: Weak<RefCell<Registry<P>>>,
}

impl<P> Clone for WeakEventBus<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P> core::fmt::Debug for WeakEventBus<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WeakEventBus")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

impl<P> WeakEventBus<P> {
    /// Recover a strong handle if the bus still exists.
    pub fn upgrade(&self) -> Option<EventBus<P>> {
        self.inner.upgrade().map(|inner| EventBus { inner })
    }
}
