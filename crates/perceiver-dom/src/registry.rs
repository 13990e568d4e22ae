//! Epoch-tagged element registry: handle arena + signature index.
//!
//! The registry is the sole owner of handle allocation. Handles are valid
//! only within the epoch that minted them; an epoch ends on invalidation
//! (mutation burst or navigation) and the next scan rebuilds the arena from
//! handle 1. Signatures are the durable identity across epochs.

use std::collections::HashMap;
use std::fmt;

use page_port::NodeId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::signature::ElementSignature;

/// Epoch-scoped integer reference to a registered node.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(pub u32);

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One generation of the registry's scan.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Epoch(pub u64);

#[derive(Default)]
struct Arena {
    epoch: u64,
    next: u32,
    by_handle: HashMap<Handle, NodeId>,
    by_node: HashMap<NodeId, Handle>,
    by_signature: HashMap<String, Handle>,
}

impl Arena {
    fn reset(&mut self) {
        self.epoch += 1;
        self.next = 0;
        self.by_handle.clear();
        self.by_node.clear();
        self.by_signature.clear();
    }
}

/// Explicitly owned handle arena, shared by `Arc` and passed to the resolver
/// and controller rather than living as ambient state.
pub struct Registry {
    inner: RwLock<Arena>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arena::default()),
        }
    }

    pub fn epoch(&self) -> Epoch {
        Epoch(self.inner.read().epoch)
    }

    /// End the current epoch: clear the arena, restart handle numbering.
    /// Every outstanding handle becomes dangling.
    pub fn invalidate(&self) -> Epoch {
        let mut arena = self.inner.write();
        arena.reset();
        debug!(epoch = arena.epoch, "registry invalidated");
        Epoch(arena.epoch)
    }

    /// Allocate (or return the existing) handle for a node in this epoch and
    /// index its signature. The registry is the only component that mints
    /// handles.
    pub fn ensure(&self, node: NodeId, signature: &ElementSignature) -> Handle {
        let mut arena = self.inner.write();
        if let Some(h) = arena.by_node.get(&node) {
            return *h;
        }
        arena.next += 1;
        let handle = Handle(arena.next);
        arena.by_handle.insert(handle, node);
        arena.by_node.insert(node, handle);
        let key = signature.canonical_key();
        arena.by_signature.entry(key).or_insert(handle);
        handle
    }

    /// Node for a handle, if the handle belongs to the current epoch.
    pub fn node_of(&self, handle: Handle) -> Option<NodeId> {
        self.inner.read().by_handle.get(&handle).copied()
    }

    pub fn handle_of(&self, node: NodeId) -> Option<Handle> {
        self.inner.read().by_node.get(&node).copied()
    }

    /// Reverse index: canonical signature key to current handle.
    pub fn handle_by_signature(&self, key: &str) -> Option<Handle> {
        self.inner.read().by_signature.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Nodes registered in the current epoch, in handle order.
    pub fn nodes(&self) -> Vec<(Handle, NodeId)> {
        let arena = self.inner.read();
        let mut out: Vec<(Handle, NodeId)> =
            arena.by_handle.iter().map(|(h, n)| (*h, *n)).collect();
        out.sort_by_key(|(h, _)| *h);
        out
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig(text: &str) -> ElementSignature {
        ElementSignature {
            tag: Some("button".into()),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    #[test]
    fn handles_are_unique_and_stable_within_epoch() {
        let registry = Registry::new();
        let a = registry.ensure(page_port::NodeId(1), &sig("a"));
        let b = registry.ensure(page_port::NodeId(2), &sig("b"));
        assert_ne!(a, b);
        assert_eq!(registry.ensure(page_port::NodeId(1), &sig("a")), a);
        assert_eq!(registry.node_of(a), Some(page_port::NodeId(1)));
    }

    #[test]
    fn invalidate_dangles_handles_and_restarts_numbering() {
        let registry = Registry::new();
        let a = registry.ensure(page_port::NodeId(1), &sig("a"));
        assert_eq!(a, Handle(1));
        let before = registry.epoch();
        registry.invalidate();
        assert!(registry.epoch() > before);
        assert_eq!(registry.node_of(a), None);
        // Numbering restarts at 1 in the new epoch.
        let fresh = registry.ensure(page_port::NodeId(9), &sig("z"));
        assert_eq!(fresh, Handle(1));
    }

    #[test]
    fn signature_index_points_at_current_handle() {
        let registry = Registry::new();
        let key = sig("go").canonical_key();
        registry.ensure(page_port::NodeId(5), &sig("go"));
        let h1 = registry.handle_by_signature(&key).unwrap();
        registry.invalidate();
        assert_eq!(registry.handle_by_signature(&key), None);
        registry.ensure(page_port::NodeId(77), &sig("go"));
        let h2 = registry.handle_by_signature(&key).unwrap();
        assert_eq!(registry.node_of(h2), Some(page_port::NodeId(77)));
        assert_eq!(h1, h2); // same number, different epoch, different node
    }
}
