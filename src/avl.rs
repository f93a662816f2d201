// SPDX-License-Identifier: MIT OR Apache-2.0

//! Slab-backed AVL tree with a caller-supplied comparator
//!
//! Nodes live in a slab owned by the tree and are addressed by [`NodeId`]
//! handles. Besides the tree links every node carries a `next` link, so the
//! nodes also form a singly-linked list in sorted order that is kept in step
//! with the tree on every insert and remove.
//!
//! The tree never compares items itself. [`AvlTree::lookup`] takes the
//! comparator as a callback and returns a [`Location`] that [`AvlTree::insert`]
//! uses to splice a new node in O(1), and that
//! [`AvlTree::prev_of_lookup`]/[`AvlTree::next_of_lookup`] use to find the
//! neighbours of a key that is not in the tree.

use std::cmp::Ordering;

const LEFT: usize = 0;
const RIGHT: usize = 1;

// Node flags: bit 0 is the child slot, bits 1..=3 the lean state.
const IS_RIGHT_CHILD: u8 = 1;
const LEAN_LEFT2: u8 = 0 << 1;
const LEAN_LEFT: u8 = 1 << 1;
const BALANCED: u8 = 2 << 1;
const LEAN_RIGHT: u8 = 3 << 1;
const LEAN_RIGHT2: u8 = 4 << 1;
const LEAN_MASK: u8 = 7 << 1;
const LEAN_STEP: u8 = 1 << 1;

/// Stable handle to a node of an [`AvlTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Insertion point recorded by [`AvlTree::lookup`]
///
/// Only valid until the next mutation of the tree it came from.
#[derive(Debug, Clone, Copy)]
pub struct Location {
    up: Option<NodeId>,
    lr_idx: usize,
    /// Node whose `next` link the new node is spliced after, `None` for the
    /// list head.
    prev: Option<NodeId>,
    generation: u64,
}

#[derive(Debug)]
struct Node<T> {
    item: T,
    lr: [Option<NodeId>; 2],
    up: Option<NodeId>,
    next: Option<NodeId>,
    flags: u8,
}

#[derive(Debug)]
enum Slot<T> {
    Used(Node<T>),
    Free,
}

/// Balanced ordered set over items of type `T`
#[derive(Debug)]
pub struct AvlTree<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    root: Option<NodeId>,
    list: Option<NodeId>,
    len: usize,
    generation: u64,
}

impl<T> Default for AvlTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> AvlTree<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
            list: None,
            len: 0,
            generation: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drop every node at once
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.root = None;
        self.list = None;
        self.len = 0;
        self.generation += 1;
    }

    pub fn get(&self, id: NodeId) -> Option<&T> {
        match self.slots.get(id.index()) {
            Some(Slot::Used(node)) => Some(&node.item),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut T> {
        match self.slots.get_mut(id.index()) {
            Some(Slot::Used(node)) => Some(&mut node.item),
            _ => None,
        }
    }

    /// First node in sorted order
    pub fn first(&self) -> Option<NodeId> {
        self.list
    }

    /// Successor in sorted order
    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).next
    }

    /// Predecessor in sorted order
    pub fn prev(&self, id: NodeId) -> Option<NodeId> {
        self.find_prev(id)
    }

    /// Walk the order list
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            tree: self,
            cur: self.list,
        }
    }

    /// Search for `key`.
    ///
    /// `cmp(item, key)` must return how `item` orders relative to `key`. When
    /// no node compares equal the returned [`Location`] is where `key` belongs.
    pub fn lookup<K, F>(&self, key: &K, mut cmp: F) -> (Option<NodeId>, Location)
    where
        K: ?Sized,
        F: FnMut(&T, &K) -> Ordering,
    {
        let mut loc = Location {
            up: None,
            lr_idx: LEFT,
            prev: None,
            generation: self.generation,
        };
        let mut cur = self.root;

        while let Some(id) = cur {
            let node = self.node(id);
            match cmp(&node.item, key) {
                Ordering::Equal => return (Some(id), loc),
                Ordering::Less => {
                    loc.up = Some(id);
                    loc.prev = Some(id);
                    loc.lr_idx = RIGHT;
                    cur = node.lr[RIGHT];
                }
                Ordering::Greater => {
                    loc.up = Some(id);
                    loc.lr_idx = LEFT;
                    cur = node.lr[LEFT];
                }
            }
        }

        (None, loc)
    }

    /// Node that sorts right before a looked-up key, found or not
    pub fn prev_of_lookup(&self, loc: &Location) -> Option<NodeId> {
        debug_assert_eq!(loc.generation, self.generation, "stale avl location");
        loc.prev
    }

    /// Node that sorts right after a key that was not found
    pub fn next_of_lookup(&self, loc: &Location) -> Option<NodeId> {
        debug_assert_eq!(loc.generation, self.generation, "stale avl location");
        match loc.prev {
            Some(prev) => self.node(prev).next,
            None => self.list,
        }
    }

    /// Insert `item` at a location returned by a failed [`AvlTree::lookup`]
    pub fn insert(&mut self, loc: &Location, item: T) -> NodeId {
        debug_assert_eq!(loc.generation, self.generation, "stale avl location");
        let lr_idx = loc.lr_idx;
        let id = self.alloc(Node {
            item,
            lr: [None, None],
            up: loc.up,
            next: None,
            flags: lr_idx as u8 | BALANCED,
        });
        self.len += 1;
        self.generation += 1;

        let Some(mut up) = loc.up else {
            self.root = Some(id);
            self.list = Some(id);
            return id;
        };

        let next = self.next_link(loc.prev);
        self.node_mut(id).next = next;
        self.set_next_link(loc.prev, Some(id));

        self.node_mut(up).lr[lr_idx] = Some(id);
        self.lean_on_add(up, lr_idx);
        if self.lean(up) == BALANCED {
            return id;
        }

        while let Some(parent) = self.node(up).up {
            let child_idx = self.lr_idx(up);
            up = parent;
            self.lean_on_add(up, child_idx);
            match self.lean(up) {
                // Subtree grew, keep walking up
                LEAN_LEFT | LEAN_RIGHT => continue,
                LEAN_LEFT2 => {
                    self.roll_left(up, false);
                    break;
                }
                LEAN_RIGHT2 => {
                    self.roll_right(up, false);
                    break;
                }
                // Height unchanged
                _ => break,
            }
        }

        id
    }

    /// Unlink a node and return its item
    pub fn remove(&mut self, id: NodeId) -> T {
        let lr_idx = self.lr_idx(id);
        let prev = self.find_prev(id);
        let n_up = self.node(id).up;
        let n_next = self.node(id).next;
        self.generation += 1;

        // Pick the physical replacement: successor when there is a right
        // subtree, predecessor when there is only a left one.
        let (p, p_child) = if self.node(id).lr[RIGHT].is_some() {
            let p = self.link(n_next);
            (p, self.node(p).lr[RIGHT])
        } else if self.node(id).lr[LEFT].is_some() {
            let p = self.link(prev);
            (p, self.node(p).lr[LEFT])
        } else {
            self.set_parent_link(n_up, lr_idx, None);
            self.set_next_link(prev, n_next);
            self.fix_after_remove(n_up, lr_idx);
            return self.release(id);
        };

        let p_up = self.link(self.node(p).up);
        let p_lr = self.lr_idx(p);
        self.node_mut(p_up).lr[p_lr] = p_child;
        if let Some(child) = p_child {
            self.node_mut(child).up = Some(p_up);
            self.set_lr_idx(child, p_lr);
        }

        let fix = if p_up == id { p } else { p_up };

        self.node_mut(p).up = n_up;
        self.set_parent_link(n_up, lr_idx, Some(p));

        let [left, right] = self.node(id).lr;
        self.node_mut(p).lr = [left, right];
        for child in [left, right].into_iter().flatten() {
            self.node_mut(child).up = Some(p);
        }
        self.node_mut(p).flags = self.node(id).flags;
        self.set_next_link(prev, n_next);

        self.fix_after_remove(Some(fix), p_lr);
        self.release(id)
    }

    // Walk up from `n`, whose `lr_idx` subtree just lost one level of height.
    fn fix_after_remove(&mut self, n: Option<NodeId>, lr_idx: usize) {
        let mut cur = n;
        let mut shrunk = lr_idx;

        while let Some(mut n) = cur {
            self.lean_on_remove(n, shrunk);
            shrunk = self.lr_idx(n);
            match self.lean(n) {
                LEAN_LEFT | LEAN_RIGHT => return,
                LEAN_LEFT2 => {
                    n = self.roll_left(n, false);
                    if self.lean(n) != BALANCED {
                        return;
                    }
                }
                LEAN_RIGHT2 => {
                    n = self.roll_right(n, false);
                    if self.lean(n) != BALANCED {
                        return;
                    }
                }
                // Balanced: this subtree got shorter too
                _ => {}
            }
            cur = self.node(n).up;
        }
    }

    // Right rotation around `c` (its left child `a` becomes the subtree root).
    fn roll_left(&mut self, c: NodeId, helper: bool) -> NodeId {
        let mut a = self.link(self.node(c).lr[LEFT]);
        let mut b = self.node(a).lr[RIGHT];
        let mut a_lean = BALANCED;
        let mut c_lean = BALANCED;
        let lr_idx = self.lr_idx(c);

        if helper {
            if self.lean(a) == LEAN_LEFT {
                c_lean = LEAN_RIGHT;
            }
        } else if self.lean(a) == LEAN_RIGHT {
            if self.lean(self.link(b)) == LEAN_LEFT {
                c_lean = LEAN_RIGHT;
            }
            a = self.roll_right(a, true);
            b = self.node(a).lr[RIGHT];
        } else if self.lean(a) == BALANCED {
            // Only reachable on remove
            a_lean = LEAN_RIGHT;
            c_lean = LEAN_LEFT;
        }

        let c_up = self.node(c).up;
        self.node_mut(a).flags = a_lean | lr_idx as u8;
        self.node_mut(a).up = c_up;
        self.set_parent_link(c_up, lr_idx, Some(a));

        self.node_mut(c).flags = c_lean | IS_RIGHT_CHILD;
        self.node_mut(c).up = Some(a);
        self.node_mut(a).lr[RIGHT] = Some(c);

        self.node_mut(c).lr[LEFT] = b;
        if let Some(b) = b {
            self.set_lr_idx(b, LEFT);
            self.node_mut(b).up = Some(c);
        }
        a
    }

    // Left rotation around `a` (its right child `c` becomes the subtree root).
    fn roll_right(&mut self, a: NodeId, helper: bool) -> NodeId {
        let mut c = self.link(self.node(a).lr[RIGHT]);
        let mut b = self.node(c).lr[LEFT];
        let mut a_lean = BALANCED;
        let mut c_lean = BALANCED;
        let lr_idx = self.lr_idx(a);

        if helper {
            if self.lean(c) == LEAN_RIGHT {
                a_lean = LEAN_LEFT;
            }
        } else if self.lean(c) == LEAN_LEFT {
            if self.lean(self.link(b)) == LEAN_RIGHT {
                a_lean = LEAN_LEFT;
            }
            c = self.roll_left(c, true);
            b = self.node(c).lr[LEFT];
        } else if self.lean(c) == BALANCED {
            // Only reachable on remove
            a_lean = LEAN_RIGHT;
            c_lean = LEAN_LEFT;
        }

        let a_up = self.node(a).up;
        self.node_mut(c).flags = c_lean | lr_idx as u8;
        self.node_mut(c).up = a_up;
        self.set_parent_link(a_up, lr_idx, Some(c));

        self.node_mut(a).flags = a_lean;
        self.node_mut(a).up = Some(c);
        self.node_mut(c).lr[LEFT] = Some(a);

        self.node_mut(a).lr[RIGHT] = b;
        if let Some(b) = b {
            self.set_lr_idx(b, RIGHT);
            self.node_mut(b).up = Some(a);
        }
        c
    }

    fn find_prev(&self, id: NodeId) -> Option<NodeId> {
        if let Some(mut n) = self.node(id).lr[LEFT] {
            while let Some(right) = self.node(n).lr[RIGHT] {
                n = right;
            }
            return Some(n);
        }

        let mut n = id;
        loop {
            let lr_idx = self.lr_idx(n);
            let up = self.node(n).up?;
            if lr_idx == RIGHT {
                return Some(up);
            }
            n = up;
        }
    }

    fn alloc(&mut self, node: Node<T>) -> NodeId {
        if let Some(index) = self.free.pop() {
            self.slots[index as usize] = Slot::Used(node);
            return NodeId(index);
        }
        self.slots.push(Slot::Used(node));
        NodeId((self.slots.len() - 1) as u32)
    }

    fn release(&mut self, id: NodeId) -> T {
        self.len -= 1;
        self.free.push(id.0);
        match std::mem::replace(&mut self.slots[id.index()], Slot::Free) {
            Slot::Used(node) => node.item,
            Slot::Free => panic!("avl node {:?} released twice", id),
        }
    }

    fn node(&self, id: NodeId) -> &Node<T> {
        match &self.slots[id.index()] {
            Slot::Used(node) => node,
            Slot::Free => panic!("stale avl node handle {:?}", id),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node<T> {
        match &mut self.slots[id.index()] {
            Slot::Used(node) => node,
            Slot::Free => panic!("stale avl node handle {:?}", id),
        }
    }

    // A link the rebalancing logic knows is present.
    fn link(&self, id: Option<NodeId>) -> NodeId {
        match id {
            Some(id) => id,
            None => panic!("avl structure corrupted: missing link"),
        }
    }

    fn next_link(&self, prev: Option<NodeId>) -> Option<NodeId> {
        match prev {
            Some(prev) => self.node(prev).next,
            None => self.list,
        }
    }

    fn set_next_link(&mut self, prev: Option<NodeId>, next: Option<NodeId>) {
        match prev {
            Some(prev) => self.node_mut(prev).next = next,
            None => self.list = next,
        }
    }

    fn set_parent_link(&mut self, up: Option<NodeId>, lr_idx: usize, child: Option<NodeId>) {
        match up {
            Some(up) => self.node_mut(up).lr[lr_idx] = child,
            None => self.root = child,
        }
    }

    fn lr_idx(&self, id: NodeId) -> usize {
        (self.node(id).flags & IS_RIGHT_CHILD) as usize
    }

    fn set_lr_idx(&mut self, id: NodeId, lr_idx: usize) {
        let node = self.node_mut(id);
        node.flags = (node.flags & !IS_RIGHT_CHILD) | lr_idx as u8;
    }

    fn lean(&self, id: NodeId) -> u8 {
        self.node(id).flags & LEAN_MASK
    }

    fn lean_on_add(&mut self, id: NodeId, grown: usize) {
        let node = self.node_mut(id);
        node.flags = if grown == LEFT {
            node.flags.wrapping_sub(LEAN_STEP)
        } else {
            node.flags.wrapping_add(LEAN_STEP)
        };
    }

    fn lean_on_remove(&mut self, id: NodeId, shrunk: usize) {
        self.lean_on_add(id, 1 - shrunk);
    }
}

/// Panics on a handle whose node was removed.
impl<T> std::ops::Index<NodeId> for AvlTree<T> {
    type Output = T;

    fn index(&self, id: NodeId) -> &T {
        &self.node(id).item
    }
}

impl<T> std::ops::IndexMut<NodeId> for AvlTree<T> {
    fn index_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.node_mut(id).item
    }
}

/// Iterator over the order list of an [`AvlTree`]
pub struct Iter<'a, T> {
    tree: &'a AvlTree<T>,
    cur: Option<NodeId>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = (NodeId, &'a T);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        let node = self.tree.node(id);
        self.cur = node.next;
        Some((id, &node.item))
    }
}
