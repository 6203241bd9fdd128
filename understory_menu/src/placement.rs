// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Viewport-aware placement for menus and submenu flyouts.
//!
//! ## Top-level menus
//!
//! [`place_menu`] takes the anchor point from the show event, the measured
//! menu size, and the viewport size, and returns the menu's top-left corner:
//!
//! - If the menu would overflow the bottom edge it opens upward (`y - h`);
//!   if it would overflow the right edge it opens leftward (`x - w`).
//! - If a coordinate is still negative, the menu is centered along that
//!   axis, or pinned to `0` when it is larger than the viewport.
//!
//! In right-to-left mode the menu first tries to open to the left of the
//! anchor, falls back to the right, and centers horizontally if it then
//! overflows the right edge.
//!
//! ```
//! use kurbo::{Point, Size};
//! use understory_menu::placement::place_menu;
//!
//! let viewport = Size::new(800.0, 600.0);
//! let menu = Size::new(200.0, 300.0);
//! // Near the bottom-right corner: flips up and to the left.
//! let origin = place_menu(Point::new(700.0, 500.0), menu, viewport, false);
//! assert_eq!(origin, Point::new(500.0, 200.0));
//! ```
//!
//! ## Flyouts
//!
//! [`place_flyout`] picks one of four quadrants for a submenu from the
//! flyout's bounds measured at its default placement (top-aligned, to the
//! right of its title).

use kurbo::{Point, Rect, Size};

/// Center a span of `len` within `available`, or pin it to `0` if it does not fit.
fn center(len: f64, available: f64) -> f64 {
    if len < available {
        (available - len) / 2.0
    } else {
        0.0
    }
}

/// Top-left corner for a menu opening at `anchor`, left-to-right.
pub fn clamp_to_viewport(anchor: Point, size: Size, viewport: Size) -> Point {
    let mut top = anchor.y;
    let mut left = anchor.x;

    if anchor.y + size.height > viewport.height {
        top -= size.height;
    }
    if anchor.x + size.width > viewport.width {
        left -= size.width;
    }
    if top < 0.0 {
        top = center(size.height, viewport.height);
    }
    if left < 0.0 {
        left = center(size.width, viewport.width);
    }
    Point::new(left, top)
}

/// Top-left corner for a menu opening at `anchor`, right-to-left.
pub fn clamp_to_viewport_rtl(anchor: Point, size: Size, viewport: Size) -> Point {
    let mut top = anchor.y;
    // Prefer the left side of the anchor.
    let mut left = anchor.x - size.width;

    if anchor.y + size.height > viewport.height {
        top -= size.height;
    }
    if left < 0.0 {
        left += size.width;
    }
    if top < 0.0 {
        top = center(size.height, viewport.height);
    }
    if left + size.width > viewport.width {
        left = center(size.width, viewport.width);
    }
    Point::new(left, top)
}

/// Top-left corner for a menu, dispatching on `rtl`.
pub fn place_menu(anchor: Point, size: Size, viewport: Size, rtl: bool) -> Point {
    if rtl {
        clamp_to_viewport_rtl(anchor, size, viewport)
    } else {
        clamp_to_viewport(anchor, size, viewport)
    }
}

/// Which edge of the flyout lines up with its submenu title.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum VerticalAlign {
    /// Flyout top aligned with the title top; grows downward.
    #[default]
    Top,
    /// Flyout bottom aligned with the title bottom; grows upward.
    Bottom,
}

/// Which side of the submenu title the flyout opens on.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Side {
    /// To the right of the title.
    #[default]
    Right,
    /// To the left of the title.
    Left,
}

/// One of the four flyout quadrants.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FlyoutPlacement {
    /// Vertical alignment against the title.
    pub vertical: VerticalAlign,
    /// Horizontal side of the title.
    pub side: Side,
}

/// Choose a flyout quadrant from its default-placement bounds.
///
/// - Bottom-aligned when the flyout overflows the bottom edge.
/// - Left-to-right: opens right while it ends before the right edge,
///   otherwise left.
/// - Right-to-left: opens left unless that would cross the left edge.
pub fn place_flyout(bounds: Rect, viewport: Size, rtl: bool) -> FlyoutPlacement {
    let vertical = if bounds.y1 > viewport.height {
        VerticalAlign::Bottom
    } else {
        VerticalAlign::Top
    };
    let side = if rtl {
        if bounds.x0 < 0.0 { Side::Right } else { Side::Left }
    } else if bounds.x1 < viewport.width {
        Side::Right
    } else {
        Side::Left
    };
    FlyoutPlacement { vertical, side }
}
