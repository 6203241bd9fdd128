// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Keyboard navigation over one menu level.
//!
//! ## Overview
//!
//! A *level* is either the top-level menu (`None`) or the flyout of a
//! submenu entry (`Some(submenu)`). The same functions serve both: they take
//! the [`ItemTree`], the level and the level's [`NavState`] explicitly, and
//! report what the owner should do through [`KeyOutcome`].
//!
//! The navigable sequence is rebuilt on every call from the current tree:
//! groups are flattened, dividers are skipped, and the children of nested
//! submenus belong to their own level.
//!
//! ```
//! use understory_menu::nav::select_next;
//! use understory_menu::tree::{ItemTree, MenuItem};
//! use understory_menu::types::Direction;
//!
//! let mut tree: ItemTree = ItemTree::new();
//! let a = tree.insert(None, MenuItem::new("A")).unwrap();
//! let _b = tree.insert(None, MenuItem::new("B").disabled(true)).unwrap();
//! let c = tree.insert(None, MenuItem::new("C")).unwrap();
//!
//! assert_eq!(select_next(&tree, None, Some(a), Direction::Forward), Some(c));
//! assert_eq!(select_next(&tree, None, Some(a), Direction::Backward), Some(c));
//! ```

use alloc::vec::Vec;

use crate::tree::{ItemId, ItemKind, ItemTree};
use crate::types::{Direction, Key};

/// Selection state of one menu level.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct NavState {
    /// The selected item, if any.
    pub selected: Option<ItemId>,
    /// Whether the selected submenu is held open by the keyboard.
    pub force_submenu_open: bool,
}

impl NavState {
    /// Forget the selection.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Select `item` and release any forced submenu.
    pub fn select(&mut self, item: Option<ItemId>) {
        self.selected = item;
        self.force_submenu_open = false;
    }

    /// Returns true if `submenu` is selected and forced open.
    pub fn forces(&self, submenu: ItemId) -> bool {
        self.force_submenu_open && self.selected == Some(submenu)
    }

    /// Force the selected item open if it is a submenu.
    ///
    /// Returns true if a submenu is now forced open.
    pub fn force_open<P>(&mut self, tree: &ItemTree<P>) -> bool {
        let is_submenu = self
            .selected
            .is_some_and(|id| tree.kind(id) == Some(ItemKind::Submenu));
        if is_submenu {
            self.force_submenu_open = true;
        }
        is_submenu
    }

    /// Drop a selection that no longer refers to a live, enabled item in `level`.
    ///
    /// Returns true if anything changed.
    pub fn revalidate<P>(&mut self, tree: &ItemTree<P>, level: Option<ItemId>) -> bool {
        let before = *self;
        if let Some(id) = self.selected
            && (!tree.is_enabled(id) || tree.level_of(id) != Some(level))
        {
            self.clear();
        }
        if self.force_submenu_open
            && !self
                .selected
                .is_some_and(|id| tree.kind(id) == Some(ItemKind::Submenu))
        {
            self.force_submenu_open = false;
        }
        *self != before
    }
}

/// What a key press asks the level's owner to do.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Not a navigation key; let the host handle it.
    Ignored,
    /// Handled entirely within the [`NavState`].
    Handled,
    /// Close this level. The key is reported because the top level only
    /// closes for Escape and Enter.
    Dismiss(Key),
    /// Activate this enabled item.
    Activate(ItemId),
}

impl KeyOutcome {
    /// Returns true for every outcome except [`KeyOutcome::Ignored`].
    pub fn is_handled(self) -> bool {
        !matches!(self, Self::Ignored)
    }
}

/// The navigable items of `level`, in order, dividers removed.
///
/// Disabled items are included; callers skip them while scanning.
pub fn navigable<P>(tree: &ItemTree<P>, level: Option<ItemId>) -> Vec<ItemId> {
    fn collect<P>(tree: &ItemTree<P>, parent: Option<ItemId>, out: &mut Vec<ItemId>) {
        for &child in tree.children(parent) {
            match tree.kind(child) {
                Some(ItemKind::Group) => collect(tree, Some(child), out),
                Some(ItemKind::Item | ItemKind::Submenu) => out.push(child),
                Some(ItemKind::Divider) | None => {}
            }
        }
    }
    let mut out = Vec::new();
    collect(tree, level, &mut out);
    out
}

/// Find the next enabled item from `current` in `direction`, wrapping around.
///
/// With no current selection the scan starts just before the first item
/// (forward) or just after the last (backward). Returns `None` when every
/// item is disabled, or when a full wrap finds nothing but `current`.
pub fn select_next<P>(
    tree: &ItemTree<P>,
    level: Option<ItemId>,
    current: Option<ItemId>,
    direction: Direction,
) -> Option<ItemId> {
    let items = navigable(tree, level);
    if items.iter().all(|id| !tree.is_enabled(*id)) {
        return None;
    }
    let len = items.len();
    let start = current.and_then(|c| items.iter().position(|id| *id == c));
    let step = |i: Option<usize>| -> usize {
        match (direction, i) {
            (Direction::Forward, None) => 0,
            (Direction::Backward, None) => len - 1,
            (Direction::Forward, Some(i)) => (i + 1) % len,
            (Direction::Backward, Some(i)) => (i + len - 1) % len,
        }
    };
    let mut i = step(start);
    // At least one item is enabled, so this terminates within one wrap.
    while Some(i) != start && !tree.is_enabled(items[i]) {
        i = step(Some(i));
    }
    (Some(i) != start).then(|| items[i])
}

/// Apply a key press to one level's selection.
///
/// - Left / Escape: [`KeyOutcome::Dismiss`].
/// - Up / Down: move the selection backward / forward.
/// - Right: force the selected submenu open.
/// - Enter: force the selected submenu open, else activate the selected
///   enabled item, else dismiss.
pub fn handle_key<P>(
    tree: &ItemTree<P>,
    level: Option<ItemId>,
    state: &mut NavState,
    key: Key,
) -> KeyOutcome {
    match key {
        Key::Left | Key::Escape => KeyOutcome::Dismiss(key),
        Key::Up | Key::Down => {
            let direction = if key == Key::Up {
                Direction::Backward
            } else {
                Direction::Forward
            };
            if let Some(next) = select_next(tree, level, state.selected, direction) {
                state.select(Some(next));
            }
            KeyOutcome::Handled
        }
        Key::Right => {
            state.force_open(tree);
            KeyOutcome::Handled
        }
        Key::Enter => {
            if state.force_open(tree) {
                return KeyOutcome::Handled;
            }
            match state.selected {
                Some(id) if tree.is_enabled(id) => KeyOutcome::Activate(id),
                _ => KeyOutcome::Dismiss(key),
            }
        }
        Key::Other => KeyOutcome::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{Entry, MenuItem, Submenu};
    use alloc::vec;

    struct Fixture {
        tree: ItemTree,
        ids: Vec<ItemId>,
    }

    // Build a flat level from (label, enabled) pairs.
    fn flat(items: &[(&str, bool)]) -> Fixture {
        let mut tree = ItemTree::new();
        let ids = items
            .iter()
            .map(|(label, enabled)| {
                tree.insert(None, MenuItem::new(*label).disabled(!enabled))
                    .unwrap()
            })
            .collect();
        Fixture { tree, ids }
    }

    #[test]
    fn wraps_over_disabled_items() {
        let f = flat(&[("A", true), ("B", false), ("C", true)]);
        let [a, _, c] = f.ids[..] else { unreachable!() };
        assert_eq!(select_next(&f.tree, None, Some(a), Direction::Forward), Some(c));
        assert_eq!(select_next(&f.tree, None, Some(a), Direction::Backward), Some(c));
        assert_eq!(select_next(&f.tree, None, Some(c), Direction::Forward), Some(a));
    }

    #[test]
    fn no_selection_starts_at_either_end() {
        let f = flat(&[("A", true), ("B", true), ("C", true)]);
        assert_eq!(
            select_next(&f.tree, None, None, Direction::Forward),
            Some(f.ids[0])
        );
        assert_eq!(
            select_next(&f.tree, None, None, Direction::Backward),
            Some(f.ids[2])
        );
    }

    #[test]
    fn all_disabled_selects_nothing() {
        let f = flat(&[("A", false), ("B", false)]);
        let mut state = NavState::default();
        assert_eq!(select_next(&f.tree, None, None, Direction::Forward), None);
        assert_eq!(handle_key(&f.tree, None, &mut state, Key::Down), KeyOutcome::Handled);
        assert_eq!(state, NavState::default());
    }

    #[test]
    fn empty_level_selects_nothing() {
        let tree: ItemTree = ItemTree::new();
        assert_eq!(select_next(&tree, None, None, Direction::Forward), None);
    }

    #[test]
    fn single_enabled_item_does_not_move() {
        let f = flat(&[("A", true), ("B", false)]);
        let a = f.ids[0];
        assert_eq!(select_next(&f.tree, None, Some(a), Direction::Forward), None);
        assert_eq!(select_next(&f.tree, None, Some(a), Direction::Backward), None);
    }

    #[test]
    fn groups_flatten_and_dividers_vanish() {
        let mut tree: ItemTree = ItemTree::new();
        let a = tree.insert(None, MenuItem::new("A")).unwrap();
        tree.insert(None, Entry::Divider).unwrap();
        let g = tree.insert(None, Entry::Group).unwrap();
        let b = tree.insert(Some(g), MenuItem::new("B")).unwrap();
        let s = tree.insert(Some(g), Submenu::new("S")).unwrap();
        let _nested = tree.insert(Some(s), MenuItem::new("nested")).unwrap();
        let c = tree.insert(None, MenuItem::new("C")).unwrap();
        assert_eq!(navigable(&tree, None), vec![a, b, s, c]);
    }

    #[test]
    fn selection_is_recomputed_after_tree_changes() {
        let mut f = flat(&[("A", true), ("B", true), ("C", true)]);
        let [a, b, c] = f.ids[..] else { unreachable!() };
        f.tree.remove(b);
        assert_eq!(select_next(&f.tree, None, Some(a), Direction::Forward), Some(c));
    }

    #[test]
    fn enter_forces_submenu_open() {
        let mut tree: ItemTree = ItemTree::new();
        let s = tree.insert(None, Submenu::new("S")).unwrap();
        tree.insert(Some(s), MenuItem::new("x")).unwrap();
        let mut state = NavState {
            selected: Some(s),
            force_submenu_open: false,
        };
        assert_eq!(handle_key(&tree, None, &mut state, Key::Enter), KeyOutcome::Handled);
        assert!(state.forces(s));
        // Moving the selection releases the forced submenu.
        assert_eq!(handle_key(&tree, None, &mut state, Key::Down), KeyOutcome::Handled);
        assert!(!state.force_submenu_open);
    }

    #[test]
    fn enter_activates_or_dismisses() {
        let f = flat(&[("A", true)]);
        let mut state = NavState::default();
        assert_eq!(
            handle_key(&f.tree, None, &mut state, Key::Enter),
            KeyOutcome::Dismiss(Key::Enter)
        );
        state.select(Some(f.ids[0]));
        assert_eq!(
            handle_key(&f.tree, None, &mut state, Key::Enter),
            KeyOutcome::Activate(f.ids[0])
        );
    }

    #[test]
    fn right_on_plain_item_is_consumed_without_forcing() {
        let f = flat(&[("A", true)]);
        let mut state = NavState {
            selected: Some(f.ids[0]),
            force_submenu_open: false,
        };
        assert_eq!(handle_key(&f.tree, None, &mut state, Key::Right), KeyOutcome::Handled);
        assert!(!state.force_submenu_open);
        assert_eq!(handle_key(&f.tree, None, &mut state, Key::Other), KeyOutcome::Ignored);
    }

    #[test]
    fn revalidate_drops_disabled_or_removed_selection() {
        let mut f = flat(&[("A", true), ("B", true)]);
        let mut state = NavState {
            selected: Some(f.ids[0]),
            force_submenu_open: false,
        };
        assert!(!state.revalidate(&f.tree, None));
        f.tree.set_disabled(f.ids[0], true).unwrap();
        assert!(state.revalidate(&f.tree, None));
        assert_eq!(state.selected, None);

        state.select(Some(f.ids[1]));
        f.tree.remove(f.ids[1]);
        assert!(state.revalidate(&f.tree, None));
        assert_eq!(state.selected, None);
    }
}
