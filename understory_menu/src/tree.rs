// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Menu children: items, dividers, submenus, and wrapper groups.
//!
//! ## Overview
//!
//! [`ItemTree`] stores the children of one menu (and, nested under submenu
//! entries, the children of its flyouts). Every entry gets an [`ItemId`] when
//! it is inserted. Ids are generational: removing an entry frees its slot,
//! and reusing the slot yields a new id that never compares equal to the old
//! one.
//!
//! [`Entry::Group`] is a wrapper with no behavior of its own. Navigation sees
//! through groups as if their children were inlined in the parent.
//!
//! ```
//! use understory_menu::tree::{Entry, ItemTree, MenuItem, Submenu};
//!
//! let mut tree: ItemTree = ItemTree::new();
//! let copy = tree.insert(None, MenuItem::new("Copy")).unwrap();
//! tree.insert(None, Entry::Divider).unwrap();
//! let share = tree.insert(None, Submenu::new("Share")).unwrap();
//! let mail = tree.insert(Some(share), MenuItem::new("Mail")).unwrap();
//!
//! assert_eq!(tree.level_of(copy), Some(None));
//! assert_eq!(tree.level_of(mail), Some(Some(share)));
//! ```

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::error::MenuError;
use crate::types::MenuId;

/// Identifier for an entry in an [`ItemTree`].
///
/// A slot index plus a generation counter. Stale ids never alias a newer
/// entry because the generation must match.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(u32, u32);

impl ItemId {
    const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Context handed to an item's activation callback.
#[derive(Clone, Debug, PartialEq)]
pub struct Activation<P = ()> {
    /// Menu that owns the item.
    pub menu: MenuId,
    /// The activated item.
    pub item: ItemId,
    /// Payload of the show event that opened the menu.
    pub data: Option<P>,
}

/// Callback run when an item is activated by click or Enter.
pub type Activate<P> = Rc<dyn Fn(&Activation<P>)>;

/// A plain, clickable menu item.
pub struct MenuItem<P = ()> {
    /// Text label, for hosts that render from the tree.
    pub label: String,
    /// Disabled items cannot be selected or activated.
    pub disabled: bool,
    /// Keep the menu open after activation.
    pub prevent_close: bool,
    /// Activation callback.
    pub on_activate: Option<Activate<P>>,
}

impl<P> MenuItem<P> {
    /// Create an enabled item with the given label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            disabled: false,
            prevent_close: false,
            on_activate: None,
        }
    }

    /// Set whether this item is disabled.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Keep the menu open after this item is activated.
    pub fn prevent_close(mut self, prevent_close: bool) -> Self {
        self.prevent_close = prevent_close;
        self
    }

    /// Set the activation callback.
    pub fn on_activate(mut self, f: impl Fn(&Activation<P>) + 'static) -> Self {
        self.on_activate = Some(Rc::new(f));
        self
    }
}

impl<P> fmt::Debug for MenuItem<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuItem")
            .field("label", &self.label)
            .field("disabled", &self.disabled)
            .field("prevent_close", &self.prevent_close)
            .field("on_activate", &self.on_activate.is_some())
            .finish()
    }
}

/// An item that opens a nested flyout menu.
///
/// Children inserted under a submenu entry belong to its flyout.
pub struct Submenu<P = ()> {
    /// Text label of the submenu title.
    pub label: String,
    /// Disabled submenus never open.
    pub disabled: bool,
    /// Keep the menu open after the title is activated.
    pub prevent_close: bool,
    /// Hover-intent delay; the menu's default when `None`.
    pub hover_delay: Option<u64>,
    /// Prefer opening the flyout to the left.
    pub rtl: bool,
    /// Callback run when the title itself is clicked.
    pub on_activate: Option<Activate<P>>,
}

impl<P> Submenu<P> {
    /// Create an enabled submenu with the given title.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            disabled: false,
            prevent_close: false,
            hover_delay: None,
            rtl: false,
            on_activate: None,
        }
    }

    /// Set whether this submenu is disabled.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }

    /// Keep the menu open after the title is clicked.
    pub fn prevent_close(mut self, prevent_close: bool) -> Self {
        self.prevent_close = prevent_close;
        self
    }

    /// Override the hover-intent delay.
    pub fn hover_delay(mut self, delay: u64) -> Self {
        self.hover_delay = Some(delay);
        self
    }

    /// Prefer opening the flyout to the left.
    pub fn rtl(mut self, rtl: bool) -> Self {
        self.rtl = rtl;
        self
    }

    /// Set the callback run when the title is clicked.
    pub fn on_activate(mut self, f: impl Fn(&Activation<P>) + 'static) -> Self {
        self.on_activate = Some(Rc::new(f));
        self
    }
}

impl<P> fmt::Debug for Submenu<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submenu")
            .field("label", &self.label)
            .field("disabled", &self.disabled)
            .field("prevent_close", &self.prevent_close)
            .field("hover_delay", &self.hover_delay)
            .field("rtl", &self.rtl)
            .field("on_activate", &self.on_activate.is_some())
            .finish()
    }
}

/// One child of a menu.
#[derive(Debug)]
pub enum Entry<P = ()> {
    /// A plain item.
    Item(MenuItem<P>),
    /// A submenu title with a nested flyout.
    Submenu(Submenu<P>),
    /// A visual separator; never selectable.
    Divider,
    /// A wrapper whose children are navigated as if inlined.
    Group,
}

impl<P> From<MenuItem<P>> for Entry<P> {
    fn from(item: MenuItem<P>) -> Self {
        Self::Item(item)
    }
}

impl<P> From<Submenu<P>> for Entry<P> {
    fn from(submenu: Submenu<P>) -> Self {
        Self::Submenu(submenu)
    }
}

/// Discriminant of an [`Entry`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ItemKind {
    /// [`Entry::Item`].
    Item,
    /// [`Entry::Submenu`].
    Submenu,
    /// [`Entry::Divider`].
    Divider,
    /// [`Entry::Group`].
    Group,
}

impl<P> Entry<P> {
    /// The kind of this entry.
    pub fn kind(&self) -> ItemKind {
        match self {
            Self::Item(_) => ItemKind::Item,
            Self::Submenu(_) => ItemKind::Submenu,
            Self::Divider => ItemKind::Divider,
            Self::Group => ItemKind::Group,
        }
    }

    /// Items and submenus are enabled unless flagged; dividers and groups never are.
    pub fn is_enabled(&self) -> bool {
        match self {
            Self::Item(item) => !item.disabled,
            Self::Submenu(submenu) => !submenu.disabled,
            Self::Divider | Self::Group => false,
        }
    }
}

struct Node<P> {
    generation: u32,
    parent: Option<ItemId>,
    children: Vec<ItemId>,
    entry: Entry<P>,
}

/// Ordered tree of menu children.
pub struct ItemTree<P = ()> {
    nodes: Vec<Option<Node<P>>>, // slots
    generations: Vec<u32>,       // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    roots: Vec<ItemId>,
}

impl<P> fmt::Debug for ItemTree<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemTree")
            .field("nodes_total", &self.nodes.len())
            .field("nodes_alive", &self.len())
            .field("roots", &self.roots.len())
            .finish_non_exhaustive()
    }
}

impl<P> Default for ItemTree<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> ItemTree<P> {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            roots: Vec::new(),
        }
    }

    fn node(&self, id: ItemId) -> Option<&Node<P>> {
        self.nodes
            .get(id.idx())
            .and_then(Option::as_ref)
            .filter(|n| n.generation == id.1)
    }

    fn node_mut(&mut self, id: ItemId) -> Option<&mut Node<P>> {
        self.nodes
            .get_mut(id.idx())
            .and_then(Option::as_mut)
            .filter(|n| n.generation == id.1)
    }

    /// Append an entry under `parent` (or at the top level if `None`).
    ///
    /// Only groups and submenus accept children.
    pub fn insert(
        &mut self,
        parent: Option<ItemId>,
        entry: impl Into<Entry<P>>,
    ) -> Result<ItemId, MenuError> {
        if let Some(p) = parent {
            match self.kind(p) {
                None => return Err(MenuError::UnknownItem(p)),
                Some(ItemKind::Group | ItemKind::Submenu) => {}
                Some(_) => return Err(MenuError::NotAContainer(p)),
            }
        }
        let node = |generation| Node {
            generation,
            parent,
            children: Vec::new(),
            entry: entry.into(),
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(node(generation));
            (idx, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(node(generation)));
            self.generations.push(generation);
            (self.nodes.len() - 1, generation)
        };
        #[allow(
            clippy::cast_possible_truncation,
            reason = "ItemId uses 32-bit indices; menus are far smaller."
        )]
        let id = ItemId::new(idx as u32, generation);
        match parent.and_then(|p| self.node_mut(p)) {
            Some(p) => p.children.push(id),
            None => self.roots.push(id),
        }
        Ok(id)
    }

    /// Remove an entry and everything under it. Returns false if it was not alive.
    pub fn remove(&mut self, id: ItemId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        let parent = node.parent;
        match parent.and_then(|p| self.node_mut(p)) {
            Some(p) => p.children.retain(|c| *c != id),
            None => self.roots.retain(|c| *c != id),
        }
        self.free_subtree(id);
        true
    }

    fn free_subtree(&mut self, id: ItemId) {
        let children = self
            .node_mut(id)
            .map(|n| core::mem::take(&mut n.children))
            .unwrap_or_default();
        for child in children {
            self.free_subtree(child);
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    /// Returns true if `id` refers to a live entry.
    pub fn is_alive(&self, id: ItemId) -> bool {
        self.node(id).is_some()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Returns true if the tree has no top-level children.
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Borrow an entry.
    pub fn entry(&self, id: ItemId) -> Option<&Entry<P>> {
        self.node(id).map(|n| &n.entry)
    }

    /// Mutably borrow an entry.
    pub fn entry_mut(&mut self, id: ItemId) -> Option<&mut Entry<P>> {
        self.node_mut(id).map(|n| &mut n.entry)
    }

    /// Kind of a live entry.
    pub fn kind(&self, id: ItemId) -> Option<ItemKind> {
        self.entry(id).map(Entry::kind)
    }

    /// Label of an item or submenu.
    pub fn label(&self, id: ItemId) -> Option<&str> {
        match self.entry(id)? {
            Entry::Item(item) => Some(&item.label),
            Entry::Submenu(submenu) => Some(&submenu.label),
            Entry::Divider | Entry::Group => None,
        }
    }

    /// Returns true for live, enabled items and submenus.
    pub fn is_enabled(&self, id: ItemId) -> bool {
        self.entry(id).is_some_and(Entry::is_enabled)
    }

    /// Enable or disable an item or submenu. Dividers and groups are left alone.
    pub fn set_disabled(&mut self, id: ItemId, disabled: bool) -> Result<(), MenuError> {
        match self.entry_mut(id) {
            None => Err(MenuError::UnknownItem(id)),
            Some(Entry::Item(item)) => {
                item.disabled = disabled;
                Ok(())
            }
            Some(Entry::Submenu(submenu)) => {
                submenu.disabled = disabled;
                Ok(())
            }
            Some(Entry::Divider | Entry::Group) => Ok(()),
        }
    }

    /// Direct children of `parent`, or the top level for `None`.
    ///
    /// Empty for dead parents and for leaves.
    pub fn children(&self, parent: Option<ItemId>) -> &[ItemId] {
        match parent {
            None => &self.roots,
            Some(p) => self.node(p).map(|n| n.children.as_slice()).unwrap_or(&[]),
        }
    }

    /// Direct parent of an entry (which may be a group).
    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.node(id).and_then(|n| n.parent)
    }

    /// The menu level an entry is navigated in.
    ///
    /// `Some(None)` for the top-level menu, `Some(Some(s))` for entries in
    /// the flyout of submenu `s`, `None` for dead ids. Groups are transparent.
    pub fn level_of(&self, id: ItemId) -> Option<Option<ItemId>> {
        let mut cur = self.node(id)?.parent;
        while let Some(p) = cur {
            match self.kind(p) {
                Some(ItemKind::Submenu) => return Some(Some(p)),
                Some(_) => cur = self.parent(p),
                None => return None,
            }
        }
        Some(None)
    }

    /// Every live submenu, parents before their nested submenus.
    pub fn submenus(&self) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut stack: Vec<ItemId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if self.kind(id) == Some(ItemKind::Submenu) {
                out.push(id);
            }
            stack.extend(self.children(Some(id)).iter().rev().copied());
        }
        out
    }
}
