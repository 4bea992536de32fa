//! Arena-backed causal forest.
//!
//! Callback records form a forest of invocation trees. Rather than intrusive
//! parent/sibling link fields embedded in each record, nodes live in a slot
//! arena and refer to each other through [`NodeRef`] — a stable index plus a
//! generation counter that detects use after removal (ABA safety).
//!
//! The forest **owns** node storage. Removal releases exactly one slot and
//! never recurses: callers that want to drop a subtree must remove the
//! descendants explicitly, leaf-first. Any access through a ref whose slot
//! was since vacated panics, which is the intended fatal response to a
//! dangling cross-reference in an instrumentation layer.

use core::fmt;
use core::hash::{Hash, Hasher};
use smallvec::SmallVec;

/// A reference to a node in a [`Forest`].
///
/// Packs a slot index and a generation counter. Generations start at 1, so
/// the all-zero value is never issued and serves as the null sentinel
/// ([`NodeRef::NONE`]) in payloads and encodings.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct NodeRef {
    index: u32,
    generation: u32,
}

impl NodeRef {
    /// The null ref. Never names a live node.
    pub const NONE: Self = Self {
        index: 0,
        generation: 0,
    };

    /// Whether this is the null ref.
    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.generation == 0
    }

    /// Packs the ref into a single opaque identifier.
    ///
    /// The packed value is what appears in textual encodings. It is only
    /// meaningful within the run that produced it.
    #[inline]
    #[must_use]
    pub const fn to_raw(self) -> u64 {
        ((self.index as u64) << 32) | self.generation as u64
    }

    /// Rebuilds a ref from a packed identifier.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self {
            index: (raw >> 32) as u32,
            generation: raw as u32,
        }
    }
}

impl fmt::Debug for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeRef({}:{})", self.index, self.generation)
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.to_raw())
    }
}

impl Hash for NodeRef {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.to_raw());
    }
}

enum Slot<T> {
    Occupied {
        value: T,
        generation: u32,
        parent: Option<NodeRef>,
        children: SmallVec<[NodeRef; 4]>,
    },
    Vacant {
        next_free: Option<u32>,
        generation: u32,
    },
}

/// A forest of ordered trees stored in a slot arena.
///
/// Sibling order is attachment order and is stable: attaching N children and
/// reading each child's index yields `0..N` with no gaps.
pub struct Forest<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<u32>,
    len: usize,
}

impl<T> Forest<T> {
    /// Creates an empty forest.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            len: 0,
        }
    }

    /// Number of live nodes.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the forest holds no nodes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Inserts a detached root node and returns its ref.
    pub fn insert(&mut self, value: T) -> NodeRef {
        self.len += 1;
        if let Some(index) = self.free_head {
            let slot = &mut self.slots[index as usize];
            let generation = match slot {
                Slot::Vacant {
                    next_free,
                    generation,
                } => {
                    self.free_head = *next_free;
                    *generation
                }
                Slot::Occupied { .. } => unreachable!("free list points at occupied slot"),
            };
            *slot = Slot::Occupied {
                value,
                generation,
                parent: None,
                children: SmallVec::new(),
            };
            NodeRef { index, generation }
        } else {
            let index = u32::try_from(self.slots.len()).expect("forest slot count overflow");
            self.slots.push(Slot::Occupied {
                value,
                generation: 1,
                parent: None,
                children: SmallVec::new(),
            });
            NodeRef {
                index,
                generation: 1,
            }
        }
    }

    /// Attaches `child` as the last child of `parent`.
    ///
    /// # Panics
    ///
    /// Panics if either ref is stale, if `child` already has a parent, or if
    /// `parent == child`.
    pub fn attach(&mut self, parent: NodeRef, child: NodeRef) {
        assert_ne!(parent, child, "node cannot be its own tree parent");
        assert!(self.contains(parent), "attach: stale parent ref {parent:?}");
        match self.slot_mut(child) {
            Slot::Occupied {
                parent: child_parent,
                ..
            } => {
                assert!(
                    child_parent.is_none(),
                    "attach: child {child:?} already has a parent"
                );
                *child_parent = Some(parent);
            }
            Slot::Vacant { .. } => unreachable!(),
        }
        match self.slot_mut(parent) {
            Slot::Occupied { children, .. } => children.push(child),
            Slot::Vacant { .. } => unreachable!(),
        }
    }

    /// Removes one node and returns its value.
    ///
    /// The node is unlinked from its parent's child list. Children are *not*
    /// removed; their parent refs go stale and any later navigation through
    /// them panics. Remove descendants first.
    ///
    /// # Panics
    ///
    /// Panics if `node` is stale.
    pub fn remove(&mut self, node: NodeRef) -> T {
        let parent = self.parent(node);
        if let Some(parent) = parent {
            if self.contains(parent) {
                match self.slot_mut(parent) {
                    Slot::Occupied { children, .. } => children.retain(|c| *c != node),
                    Slot::Vacant { .. } => unreachable!(),
                }
            }
        }
        let slot = &mut self.slots[node.index as usize];
        let next_generation = node.generation.wrapping_add(1).max(1);
        let old = std::mem::replace(
            slot,
            Slot::Vacant {
                next_free: self.free_head,
                generation: next_generation,
            },
        );
        self.free_head = Some(node.index);
        self.len -= 1;
        match old {
            Slot::Occupied { value, .. } => value,
            Slot::Vacant { .. } => unreachable!("remove checked occupancy via parent()"),
        }
    }

    /// Whether `node` names a live node.
    #[must_use]
    pub fn contains(&self, node: NodeRef) -> bool {
        match self.slots.get(node.index as usize) {
            Some(Slot::Occupied { generation, .. }) => *generation == node.generation,
            _ => false,
        }
    }

    /// Shared access to a node's value.
    ///
    /// # Panics
    ///
    /// Panics if `node` is stale.
    #[must_use]
    pub fn get(&self, node: NodeRef) -> &T {
        match self.slot(node) {
            Slot::Occupied { value, .. } => value,
            Slot::Vacant { .. } => unreachable!(),
        }
    }

    /// Exclusive access to a node's value.
    ///
    /// # Panics
    ///
    /// Panics if `node` is stale.
    pub fn get_mut(&mut self, node: NodeRef) -> &mut T {
        match self.slot_mut(node) {
            Slot::Occupied { value, .. } => value,
            Slot::Vacant { .. } => unreachable!(),
        }
    }

    /// The node's tree parent, or `None` for roots.
    ///
    /// # Panics
    ///
    /// Panics if `node` is stale.
    #[must_use]
    pub fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        match self.slot(node) {
            Slot::Occupied { parent, .. } => *parent,
            Slot::Vacant { .. } => unreachable!(),
        }
    }

    /// The node's children, in attachment order.
    ///
    /// # Panics
    ///
    /// Panics if `node` is stale.
    #[must_use]
    pub fn children(&self, node: NodeRef) -> &[NodeRef] {
        match self.slot(node) {
            Slot::Occupied { children, .. } => children,
            Slot::Vacant { .. } => unreachable!(),
        }
    }

    /// Distance from the node to its root. Roots are at depth 0.
    ///
    /// # Panics
    ///
    /// Panics if `node` or any ancestor ref is stale.
    #[must_use]
    pub fn depth(&self, node: NodeRef) -> usize {
        let mut depth = 0;
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Zero-based position among siblings. Roots report 0.
    ///
    /// # Panics
    ///
    /// Panics if `node` or its parent ref is stale.
    #[must_use]
    pub fn child_index(&self, node: NodeRef) -> usize {
        match self.parent(node) {
            None => 0,
            Some(parent) => self
                .children(parent)
                .iter()
                .position(|c| *c == node)
                .expect("child missing from parent's child list"),
        }
    }

    /// Iterates over all live nodes in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeRef, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| match slot {
                Slot::Occupied {
                    value, generation, ..
                } => Some((
                    NodeRef {
                        index: index as u32,
                        generation: *generation,
                    },
                    value,
                )),
                Slot::Vacant { .. } => None,
            })
    }

    fn slot(&self, node: NodeRef) -> &Slot<T> {
        let slot = self
            .slots
            .get(node.index as usize)
            .unwrap_or_else(|| panic!("stale node ref {node:?}"));
        match slot {
            Slot::Occupied { generation, .. } if *generation == node.generation => slot,
            _ => panic!("stale node ref {node:?}"),
        }
    }

    fn slot_mut(&mut self, node: NodeRef) -> &mut Slot<T> {
        match self.slots.get(node.index as usize) {
            Some(Slot::Occupied { generation, .. }) if *generation == node.generation => {}
            _ => panic!("stale node ref {node:?}"),
        }
        &mut self.slots[node.index as usize]
    }
}

impl<T> Default for Forest<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for Forest<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(r, v)| (r, v)))
            .finish()
    }
}
