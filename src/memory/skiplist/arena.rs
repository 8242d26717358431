use std::collections::TryReserveError;
use std::ops::{Index, IndexMut};

use crate::kv::kv_pair::{Key, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

pub type Link = Option<NodeId>;

#[derive(Debug)]
pub struct SkipNode {
    pub key: Key,
    pub value: Value,
    // forward[i] is the next node on level i; its length is the node's height
    pub forward: Vec<Link>,
}

impl SkipNode {
    /// Allocates the forward array up front so that a failed allocation
    /// surfaces before the node is linked anywhere.
    pub fn try_new(key: Key, value: Value, height: usize) -> Result<Self, TryReserveError> {
        let mut forward = Vec::new();
        forward.try_reserve_exact(height)?;
        forward.resize(height, None);
        Ok(Self { key, value, forward })
    }

    pub fn height(&self) -> usize {
        self.forward.len()
    }
}

/// Slab of skip nodes addressed by `NodeId`. Removed slots are recycled
/// through a free list, so an id stays valid until its node is removed.
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<Option<SkipNode>>,
    free: Vec<usize>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes room for one more node, so the next `insert` cannot allocate.
    pub fn try_reserve(&mut self) -> Result<(), TryReserveError> {
        if self.free.is_empty() {
            self.slots.try_reserve(1)?;
        }
        Ok(())
    }

    pub fn insert(&mut self, node: SkipNode) -> NodeId {
        match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    pub fn remove(&mut self, id: NodeId) -> Option<SkipNode> {
        let node = self.slots.get_mut(id.0)?.take()?;
        self.free.push(id.0);
        Some(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&SkipNode> {
        self.slots.get(id.0)?.as_ref()
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl Index<NodeId> for NodeArena {
    type Output = SkipNode;

    fn index(&self, id: NodeId) -> &SkipNode {
        match self.get(id) {
            Some(node) => node,
            None => panic!("dangling node id {:?}", id),
        }
    }
}

impl IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, id: NodeId) -> &mut SkipNode {
        match self.slots.get_mut(id.0) {
            Some(Some(node)) => node,
            _ => panic!("dangling node id {:?}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{NodeArena, SkipNode};

    #[test]
    fn test_try_new() {
        let node = SkipNode::try_new(3, 30, 4).unwrap();
        assert_eq!(node.height(), 4);
        assert!(node.forward.iter().all(|link| link.is_none()));
    }

    #[test]
    fn test_insert_remove() {
        let mut arena = NodeArena::new();
        let a = arena.insert(SkipNode::try_new(1, 10, 1).unwrap());
        let b = arena.insert(SkipNode::try_new(2, 20, 2).unwrap());
        assert_eq!(arena.len(), 2);
        assert_eq!(arena[a].key, 1);
        assert_eq!(arena[b].value, 20);

        let removed = arena.remove(a).unwrap();
        assert_eq!(removed.key, 1);
        assert_eq!(arena.len(), 1);
        assert!(arena.get(a).is_none());
        // a slot is only freed once
        assert!(arena.remove(a).is_none());
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_slot_reuse() {
        let mut arena = NodeArena::new();
        let a = arena.insert(SkipNode::try_new(1, 10, 1).unwrap());
        arena.insert(SkipNode::try_new(2, 20, 1).unwrap());
        arena.remove(a);

        assert!(arena.try_reserve().is_ok());
        let c = arena.insert(SkipNode::try_new(3, 30, 3).unwrap());
        assert_eq!(c, a);
        assert_eq!(arena[c].key, 3);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    #[should_panic(expected = "dangling node id")]
    fn test_index_removed_node() {
        let mut arena = NodeArena::new();
        let a = arena.insert(SkipNode::try_new(1, 10, 1).unwrap());
        arena.remove(a);
        let _ = arena[a].key;
    }
}
