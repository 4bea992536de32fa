//! Logical callback nodes and their registry.
//!
//! A logical callback node (LCBN) is the causal record of one callback
//! invocation: what it was attached to, where it sits in the forest of
//! invocation trees, when it registered/started/finished, and which other
//! callbacks it causally depends on. Every scheduling strategy reads and
//! writes this model and nothing else.
//!
//! The [`Registry`] owns the forest. Dependency edges and registrar links
//! are non-owning [`NodeRef`]s: they must never outlive their target, and a
//! stale one panics on use. All misuse here is a programming error in the
//! instrumented runtime, so the failure mode is a fatal assert, never a
//! recoverable error.

mod text;

pub use text::{decode, ParseError};

use crate::stamp::Stamp;
use crate::thread;
use crate::tree::{Forest, NodeRef};
use core::fmt;
use std::str::FromStr;

// ============================================================================
// Callback classification
// ============================================================================

/// What a callback's context is: a long-lived handle or a one-shot request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextKind {
    /// A long-lived handle (timer, socket, idle watcher, ...).
    Handle,
    /// A one-shot request (write, connect, work item, ...).
    Request,
}

impl ContextKind {
    /// The token used in the textual record format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Handle => "handle",
            Self::Request => "request",
        }
    }
}

impl fmt::Display for ContextKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "handle" => Ok(Self::Handle),
            "request" => Ok(Self::Request),
            _ => Err(()),
        }
    }
}

/// Whether a callback's registration fires once or repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackBehavior {
    /// May fire repeatedly from one registration.
    Repeating,
    /// Fires at most once.
    OneShot,
}

impl CallbackBehavior {
    /// The token used in the textual record format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Repeating => "repeating",
            Self::OneShot => "one-shot",
        }
    }
}

impl fmt::Display for CallbackBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallbackBehavior {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "repeating" => Ok(Self::Repeating),
            "one-shot" => Ok(Self::OneShot),
            _ => Err(()),
        }
    }
}

/// The closed set of callback kinds the instrumented runtime raises.
///
/// Each kind maps to a [`ContextKind`] and a [`CallbackBehavior`]; the
/// mapping is fixed, not stored per node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackType {
    /// Timer expiry.
    Timer,
    /// Idle watcher.
    Idle,
    /// Prepare watcher (runs before I/O polling).
    Prepare,
    /// Check watcher (runs after I/O polling).
    Check,
    /// Cross-thread async wakeup.
    Async,
    /// Handle close completion.
    Close,
    /// Data available on a stream.
    Read,
    /// Incoming connection on a listener.
    Connection,
    /// Write request completion.
    Write,
    /// Connect request completion.
    Connect,
    /// Work item executing on the thread pool.
    Work,
    /// Work item completion delivered back on the event loop.
    AfterWork,
    /// Name resolution completion.
    GetaddrinfoDone,
}

impl CallbackType {
    /// Every callback type, in a fixed order.
    pub const ALL: [Self; 13] = [
        Self::Timer,
        Self::Idle,
        Self::Prepare,
        Self::Check,
        Self::Async,
        Self::Close,
        Self::Read,
        Self::Connection,
        Self::Write,
        Self::Connect,
        Self::Work,
        Self::AfterWork,
        Self::GetaddrinfoDone,
    ];

    /// The kind of context this callback type is attached to.
    #[must_use]
    pub const fn context_kind(self) -> ContextKind {
        match self {
            Self::Timer
            | Self::Idle
            | Self::Prepare
            | Self::Check
            | Self::Async
            | Self::Close
            | Self::Read
            | Self::Connection => ContextKind::Handle,
            Self::Write
            | Self::Connect
            | Self::Work
            | Self::AfterWork
            | Self::GetaddrinfoDone => ContextKind::Request,
        }
    }

    /// Whether this callback type fires once or repeats.
    #[must_use]
    pub const fn behavior(self) -> CallbackBehavior {
        match self {
            Self::Timer
            | Self::Idle
            | Self::Prepare
            | Self::Check
            | Self::Async
            | Self::Read
            | Self::Connection => CallbackBehavior::Repeating,
            Self::Close
            | Self::Write
            | Self::Connect
            | Self::Work
            | Self::AfterWork
            | Self::GetaddrinfoDone => CallbackBehavior::OneShot,
        }
    }

    /// The token used in the textual record format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timer => "timer",
            Self::Idle => "idle",
            Self::Prepare => "prepare",
            Self::Check => "check",
            Self::Async => "async",
            Self::Close => "close",
            Self::Read => "read",
            Self::Connection => "connection",
            Self::Write => "write",
            Self::Connect => "connect",
            Self::Work => "work",
            Self::AfterWork => "after-work",
            Self::GetaddrinfoDone => "getaddrinfo-done",
        }
    }
}

impl fmt::Display for CallbackType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CallbackType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or(())
    }
}

// ============================================================================
// Lcbn
// ============================================================================

/// An opaque identity handle for a context, callback, or invocation info.
///
/// Only meaningful within the run that produced it. Renders as lowercase
/// hex (`0x2a`) in the textual record format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u64);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// One logical callback node.
///
/// Created at registration time with most fields empty; mutated in place by
/// [`Registry`] operations as execution begins and ends. Tree position lives
/// in the registry's forest, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lcbn {
    context: Handle,
    cb: Handle,
    cb_type: CallbackType,
    global_exec_id: Option<u64>,
    global_reg_id: Option<u64>,
    info: Option<Handle>,
    registrar: Option<NodeRef>,
    registration_time: Stamp,
    start_time: Option<Stamp>,
    end_time: Option<Stamp>,
    executing_thread: Option<u64>,
    active: bool,
    finished: bool,
    dependencies: Vec<NodeRef>,
}

impl Lcbn {
    fn new(context: Handle, cb: Handle, cb_type: CallbackType) -> Self {
        Self {
            context,
            cb,
            cb_type,
            global_exec_id: None,
            global_reg_id: None,
            info: None,
            registrar: None,
            registration_time: Stamp::now(),
            start_time: None,
            end_time: None,
            executing_thread: None,
            active: false,
            finished: false,
            dependencies: Vec::new(),
        }
    }

    /// The context this callback is attached to.
    #[must_use]
    pub const fn context(&self) -> Handle {
        self.context
    }

    /// The callback's function identity.
    #[must_use]
    pub const fn cb(&self) -> Handle {
        self.cb
    }

    /// The callback's type tag.
    #[must_use]
    pub const fn cb_type(&self) -> CallbackType {
        self.cb_type
    }

    /// Global execution-order id, if assigned.
    #[must_use]
    pub const fn exec_id(&self) -> Option<u64> {
        self.global_exec_id
    }

    /// Global registration-order id, if assigned.
    #[must_use]
    pub const fn reg_id(&self) -> Option<u64> {
        self.global_reg_id
    }

    /// Invocation-time metadata, set once execution begins.
    #[must_use]
    pub const fn info(&self) -> Option<Handle> {
        self.info
    }

    /// The node whose execution caused this registration, if recorded.
    ///
    /// Distinct from tree parentage, which models invocation/response
    /// nesting.
    #[must_use]
    pub const fn registrar(&self) -> Option<NodeRef> {
        self.registrar
    }

    /// When the callback was registered.
    #[must_use]
    pub const fn registration_time(&self) -> Stamp {
        self.registration_time
    }

    /// When execution began, if it has.
    #[must_use]
    pub const fn start_time(&self) -> Option<Stamp> {
        self.start_time
    }

    /// When execution finished, if it has.
    #[must_use]
    pub const fn end_time(&self) -> Option<Stamp> {
        self.end_time
    }

    /// Id of the thread that executed the callback, if it ran.
    #[must_use]
    pub const fn executing_thread(&self) -> Option<u64> {
        self.executing_thread
    }

    /// Whether the callback is currently executing.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the callback has completed.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Causal predecessors, in insertion order. Duplicates permitted.
    #[must_use]
    pub fn dependencies(&self) -> &[NodeRef] {
        &self.dependencies
    }
}

// ============================================================================
// Registry
// ============================================================================

/// The registry of logical callback nodes for one run.
///
/// Owns the forest of invocation trees and the two monotonic counters for
/// registration-order and execution-order ids.
#[derive(Debug, Default)]
pub struct Registry {
    forest: Forest<Lcbn>,
    next_reg_id: u64,
    next_exec_id: u64,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.forest.len()
    }

    /// Whether the registry holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.forest.is_empty()
    }

    /// Registers a new callback node, detached from any tree.
    ///
    /// Global ids are unset, both lifecycle flags false, and the
    /// registration time stamped from the monotonic clock.
    pub fn create(&mut self, context: Handle, cb: Handle, cb_type: CallbackType) -> NodeRef {
        self.forest.insert(Lcbn::new(context, cb, cb_type))
    }

    /// Attaches `child` as the last tree child of `parent`.
    ///
    /// Sibling order is attachment order. Emits a diagnostic attachment
    /// event with the child's depth and sibling index.
    ///
    /// # Panics
    ///
    /// Panics if either ref is stale or `child` already has a parent.
    pub fn add_child(&mut self, parent: NodeRef, child: NodeRef) {
        self.forest.attach(parent, child);
        tracing::debug!(
            parent = %parent,
            child = %child,
            depth = self.forest.depth(child),
            child_index = self.forest.child_index(child),
            "attached callback node"
        );
    }

    /// Destroys one node, releasing its dependency list and storage.
    ///
    /// No-op on `None`. Never recurses into tree children: dropping a
    /// subtree must be explicit, leaf-first, so that dangling registrar or
    /// dependency edges elsewhere surface as stale-ref panics instead of
    /// silent corruption.
    ///
    /// # Panics
    ///
    /// Panics if the ref is stale.
    pub fn destroy(&mut self, node: Option<NodeRef>) {
        if let Some(node) = node {
            drop(self.forest.remove(node));
        }
    }

    /// Marks the node active and stamps its start time.
    ///
    /// Records the calling thread (if registered) as the executing thread.
    ///
    /// # Panics
    ///
    /// Panics if the node already finished or the ref is stale.
    pub fn mark_begin(&mut self, node: NodeRef) {
        let lcbn = self.forest.get_mut(node);
        assert!(!lcbn.finished, "mark_begin on a finished node");
        lcbn.active = true;
        lcbn.start_time = Some(Stamp::now());
        lcbn.executing_thread = thread::current_id();
    }

    /// Marks the node finished and stamps its end time.
    ///
    /// Calling twice re-stamps the end time; callers must not.
    ///
    /// # Panics
    ///
    /// Panics if the ref is stale.
    pub fn mark_end(&mut self, node: NodeRef) {
        let lcbn = self.forest.get_mut(node);
        lcbn.active = false;
        lcbn.finished = true;
        lcbn.end_time = Some(Stamp::now());
    }

    /// Appends a causal edge: `succ` depends on `pred`.
    ///
    /// Edge order is insertion order and is preserved in serialization.
    /// Duplicate edges are permitted.
    ///
    /// # Panics
    ///
    /// Panics on a self-edge or a stale ref.
    pub fn add_dependency(&mut self, pred: NodeRef, succ: NodeRef) {
        assert_ne!(pred, succ, "node cannot depend on itself");
        assert!(self.forest.contains(pred), "stale dependency target {pred:?}");
        self.forest.get_mut(succ).dependencies.push(pred);
    }

    /// Records which node's execution caused this registration.
    ///
    /// # Panics
    ///
    /// Panics if either ref is stale.
    pub fn set_registrar(&mut self, node: NodeRef, registrar: NodeRef) {
        assert!(
            self.forest.contains(registrar),
            "stale registrar ref {registrar:?}"
        );
        self.forest.get_mut(node).registrar = Some(registrar);
    }

    /// Attaches invocation-time metadata. May be set exactly once.
    ///
    /// # Panics
    ///
    /// Panics if info was already set or the ref is stale.
    pub fn set_info(&mut self, node: NodeRef, info: Handle) {
        let lcbn = self.forest.get_mut(node);
        assert!(lcbn.info.is_none(), "invocation info already set");
        lcbn.info = Some(info);
    }

    /// Assigns the next global registration-order id.
    ///
    /// # Panics
    ///
    /// Panics if the node already has one or the ref is stale.
    pub fn assign_reg_id(&mut self, node: NodeRef) -> u64 {
        let id = self.next_reg_id;
        let lcbn = self.forest.get_mut(node);
        assert!(lcbn.global_reg_id.is_none(), "registration id already assigned");
        lcbn.global_reg_id = Some(id);
        self.next_reg_id += 1;
        id
    }

    /// Assigns the next global execution-order id.
    ///
    /// # Panics
    ///
    /// Panics if the node already has one or the ref is stale.
    pub fn assign_exec_id(&mut self, node: NodeRef) -> u64 {
        let id = self.next_exec_id;
        let lcbn = self.forest.get_mut(node);
        assert!(lcbn.global_exec_id.is_none(), "execution id already assigned");
        lcbn.global_exec_id = Some(id);
        self.next_exec_id += 1;
        id
    }

    /// Shared access to a node's record.
    ///
    /// # Panics
    ///
    /// Panics if the ref is stale.
    #[must_use]
    pub fn node(&self, node: NodeRef) -> &Lcbn {
        self.forest.get(node)
    }

    /// The node's context handle.
    #[must_use]
    pub fn context(&self, node: NodeRef) -> Handle {
        self.forest.get(node).context
    }

    /// The node's callback handle.
    #[must_use]
    pub fn cb(&self, node: NodeRef) -> Handle {
        self.forest.get(node).cb
    }

    /// The node's callback type.
    #[must_use]
    pub fn cb_type(&self, node: NodeRef) -> CallbackType {
        self.forest.get(node).cb_type
    }

    /// The node's tree parent, or `None` for roots.
    #[must_use]
    pub fn parent(&self, node: NodeRef) -> Option<NodeRef> {
        self.forest.parent(node)
    }

    /// The node's tree children, in attachment order.
    #[must_use]
    pub fn children(&self, node: NodeRef) -> &[NodeRef] {
        self.forest.children(node)
    }

    /// The node's depth in its tree. Roots are 0.
    #[must_use]
    pub fn depth(&self, node: NodeRef) -> usize {
        self.forest.depth(node)
    }

    /// Zero-based position among siblings. Roots report 0.
    #[must_use]
    pub fn child_index(&self, node: NodeRef) -> usize {
        self.forest.child_index(node)
    }

    /// Iterates over all live nodes.
    pub fn iter(&self) -> impl Iterator<Item = (NodeRef, &Lcbn)> {
        self.forest.iter()
    }

    /// Structural equality across (possibly distinct) registries.
    ///
    /// Walks both parent chains simultaneously; at every level the callback
    /// type and sibling index must match, and both walks must reach a root
    /// at the same step. Matches corresponding nodes across independently
    /// built trees (a recorded run and a replayed run) despite different
    /// node identities. Two `None`s are equal; exactly one `None` never is.
    ///
    /// Iterative on purpose: parent chains can be deep.
    ///
    /// # Panics
    ///
    /// Panics if a ref on either chain is stale.
    #[must_use]
    pub fn structural_eq(
        &self,
        a: Option<NodeRef>,
        other: &Registry,
        b: Option<NodeRef>,
    ) -> bool {
        let mut a = a;
        let mut b = b;
        loop {
            match (a, b) {
                (None, None) => return true,
                (None, Some(_)) | (Some(_), None) => return false,
                (Some(x), Some(y)) => {
                    if self.cb_type(x) != other.cb_type(y)
                        || self.child_index(x) != other.child_index(y)
                    {
                        return false;
                    }
                    a = self.parent(x);
                    b = other.parent(y);
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests_support {
    use super::*;

    /// A registry with one timer root, one timer child carrying two
    /// dependencies, returning the child.
    pub(crate) fn sample_registry() -> (Registry, NodeRef) {
        let mut r = Registry::new();
        let root = r.create(Handle(0x10), Handle(0x20), CallbackType::Timer);
        let dep = r.create(Handle(0x11), Handle(0x21), CallbackType::Check);
        let child = r.create(Handle(0x12), Handle(0x22), CallbackType::Timer);
        r.add_child(root, child);
        r.add_dependency(root, child);
        r.add_dependency(dep, child);
        r.assign_reg_id(root);
        r.assign_reg_id(dep);
        r.assign_reg_id(child);
        (r, child)
    }
}
