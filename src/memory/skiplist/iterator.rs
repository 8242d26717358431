use std::sync::RwLockReadGuard;

use crate::kv::kv_pair::KeyValuePair;

use super::arena::Link;
use super::SkipListCore;

/// Walks level 0 of a `SkipListIndex` in ascending key order.
pub struct Iter<'a, R> {
    core: RwLockReadGuard<'a, SkipListCore<R>>,
    next: Link,
}

impl<'a, R> Iter<'a, R> {
    pub(crate) fn new(core: RwLockReadGuard<'a, SkipListCore<R>>) -> Self {
        let next = core.first();
        Self { core, next }
    }

    pub fn peek(&self) -> Option<KeyValuePair> {
        self.next.map(|id| {
            let node = self.core.node(id);
            KeyValuePair::new(node.key, node.value)
        })
    }
}

impl<R> Iterator for Iter<'_, R> {
    type Item = KeyValuePair;

    fn next(&mut self) -> Option<KeyValuePair> {
        let id = self.next?;
        let node = self.core.node(id);
        self.next = node.forward[0];
        Some(KeyValuePair::new(node.key, node.value))
    }
}
