// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Construction mistakes fail fast with [`MenuError`]. Events that do not
//! apply to a menu are not errors; they are ignored. Bus delivery stops at the
//! first failing handler and reports a [`PublishError`].

use alloc::string::String;

use crate::bus::Subscription;
use crate::tree::ItemId;

/// Misuse detected while building or mutating a menu.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum MenuError {
    /// A [`MenuId`](crate::types::MenuId) was built from an empty string.
    #[error("menu id must not be empty")]
    EmptyId,
    /// A menu was mounted with an item tree that has no children.
    #[error("menu has no children")]
    NoChildren,
    /// The item is not (or no longer) part of the tree.
    #[error("unknown item {0:?}")]
    UnknownItem(ItemId),
    /// Children can only be inserted under groups and submenus.
    #[error("item {0:?} cannot contain children")]
    NotAContainer(ItemId),
}

/// Failure reported by a bus subscriber.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{reason}")]
pub struct HandlerError {
    reason: String,
}

impl HandlerError {
    /// Create a handler error with a human readable reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason given by the handler.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Delivery of a bus event was interrupted.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// A subscriber failed; later subscribers did not see the event.
    #[error("subscriber {subscription:?} failed: {source}")]
    Handler {
        /// The subscriber that failed.
        subscription: Subscription,
        /// What it reported.
        #[source]
        source: HandlerError,
    },
}
