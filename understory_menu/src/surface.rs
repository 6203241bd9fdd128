// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The host-side rendering seam.
//!
//! A [`MenuSurface`] is whatever actually draws the menu: a DOM node, a
//! popup window, a layer in a scene graph. The menu asks it for measurements
//! after layout and writes placement and visibility back. All geometry is in
//! viewport coordinates.
//!
//! The menu drops its surface on unmount, so nothing is written after that.

use kurbo::{Point, Rect, Size};

use crate::placement::FlyoutPlacement;
use crate::tree::ItemId;

/// Rendering target for one menu and its submenu flyouts.
pub trait MenuSurface {
    /// Size of the viewport the menu must stay inside.
    fn viewport(&self) -> Size;

    /// Laid-out bounds of the menu, or `None` if it is not rendered.
    fn menu_bounds(&self) -> Option<Rect>;

    /// Move the menu's top-left corner.
    fn set_menu_origin(&mut self, origin: Point);

    /// Show or hide the menu.
    fn set_menu_visible(&mut self, visible: bool);

    /// Laid-out bounds of a submenu's flyout.
    ///
    /// Queried one frame after the flyout opens at its default placement,
    /// and for outside-click tests while it is open.
    fn submenu_bounds(&self, submenu: ItemId) -> Option<Rect> {
        let _ = submenu;
        None
    }

    /// Place a submenu flyout, or reset it to its hidden default with `None`.
    fn set_submenu_placement(&mut self, submenu: ItemId, placement: Option<FlyoutPlacement>) {
        let _ = (submenu, placement);
    }
}
