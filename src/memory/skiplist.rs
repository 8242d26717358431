use std::collections::TryReserveError;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{ensure, Context, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use tracing::{debug, info, trace, warn};

use crate::kv::kv_pair::{Key, KeyValuePair, Value};

use self::arena::{Link, NodeArena, NodeId, SkipNode};
use self::iterator::Iter;
use self::level::random_height;
use super::skiplist_options::SkipListOptions;

pub mod arena;
pub mod iterator;
pub mod level;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    // the stored value is left untouched
    AlreadyExists,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Keys present on one level, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelListing {
    pub level: usize,
    pub entries: Vec<KeyValuePair>,
}

/// Ordered `i64 -> i64` index backed by a skip list.
///
/// Mutations are serialized by a single write lock over the whole structure.
/// Lookups and enumeration take the shared side of the same lock, so they
/// run alongside each other but never observe a half-spliced node or a slot
/// that has been freed. `size` is kept in an atomic and is read lock-free.
pub struct SkipListIndex<R = StdRng> {
    core: RwLock<SkipListCore<R>>,
    size: AtomicUsize,
}

// predecessor of a node at some level: either the head sentinel or a node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Position {
    Head,
    Node(NodeId),
}

pub(crate) struct SkipListCore<R> {
    arena: NodeArena,
    // head[i] is the first node on level i
    head: Vec<Link>,
    max_level: usize,
    // number of levels holding at least one node
    current_level: usize,
    rng: R,
}

impl SkipListIndex<StdRng> {
    pub fn new(max_level: usize) -> Result<Self> {
        Self::with_rng(max_level, StdRng::from_os_rng())
    }

    pub fn open(options: SkipListOptions) -> Result<Self> {
        options.validate()?;
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self::with_rng(options.max_level, rng)
    }
}

impl<R: Rng> SkipListIndex<R> {
    pub fn with_rng(max_level: usize, rng: R) -> Result<Self> {
        ensure!(
            max_level > 0,
            "max_level must be a positive integer, got {}",
            max_level
        );
        let mut head = Vec::new();
        head.try_reserve_exact(max_level)
            .with_context(|| format!("failed to allocate head for max_level {}", max_level))?;
        head.resize(max_level, None);
        info!(max_level, "creating skip list index");
        let core = SkipListCore {
            arena: NodeArena::new(),
            head,
            max_level,
            current_level: 0,
            rng,
        };
        Ok(Self {
            core: RwLock::new(core),
            size: AtomicUsize::new(0),
        })
    }

    /// Inserts `key` if it is absent. An existing key keeps its value.
    ///
    /// Only fails if memory for the new node cannot be reserved, in which
    /// case the index is left exactly as it was.
    pub fn insert(&self, key: Key, value: Value) -> Result<InsertOutcome> {
        let mut core = self.write();
        let outcome = core
            .insert(key, value)
            .with_context(|| format!("failed to allocate node for key {}", key))?;
        if outcome == InsertOutcome::Inserted {
            self.size.fetch_add(1, Ordering::Release);
        }
        debug!(key, value, ?outcome, current_level = core.current_level, "insert");
        Ok(outcome)
    }

    pub fn delete(&self, key: Key) -> DeleteOutcome {
        let mut core = self.write();
        let outcome = core.delete(key);
        if outcome == DeleteOutcome::Deleted {
            self.size.fetch_sub(1, Ordering::Release);
        }
        debug!(key, ?outcome, current_level = core.current_level, "delete");
        outcome
    }

    fn write(&self) -> RwLockWriteGuard<'_, SkipListCore<R>> {
        self.core.write().unwrap_or_else(|poisoned| {
            warn!("skip list lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl<R> SkipListIndex<R> {
    pub fn search(&self, key: Key) -> Option<Value> {
        let core = self.read();
        let value = core.find(key).map(|id| core.arena[id].value);
        trace!(key, found = value.is_some(), "search");
        value
    }

    pub fn contains(&self, key: Key) -> bool {
        self.search(key).is_some()
    }

    /// Number of live entries. Lock-free; a concurrent mutation may or may
    /// not be reflected yet.
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.size()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    pub fn max_level(&self) -> usize {
        self.read().max_level
    }

    pub fn current_level(&self) -> usize {
        self.read().current_level
    }

    /// Every populated level from the bottom up, with its entries in key order.
    pub fn enumerate(&self) -> Vec<LevelListing> {
        let core = self.read();
        (0..core.current_level)
            .map(|level| LevelListing {
                level,
                entries: core
                    .level_ids(level)
                    .map(|id| {
                        let node = &core.arena[id];
                        KeyValuePair::new(node.key, node.value)
                    })
                    .collect(),
            })
            .collect()
    }

    /// Iterates all entries in key order. Holds the shared lock until dropped,
    /// so inserts and deletes on other threads wait for it.
    pub fn iter(&self) -> Iter<'_, R> {
        Iter::new(self.read())
    }

    fn read(&self) -> RwLockReadGuard<'_, SkipListCore<R>> {
        self.core.read().unwrap_or_else(|poisoned| {
            warn!("skip list lock poisoned, recovering");
            poisoned.into_inner()
        })
    }
}

impl<R> fmt::Display for SkipListIndex<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for listing in self.enumerate() {
            write!(f, "Level {}:", listing.level)?;
            for kv in &listing.entries {
                write!(f, "{};", kv)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl<R> fmt::Debug for SkipListIndex<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.read();
        f.debug_struct("SkipListIndex")
            .field("size", &self.size())
            .field("max_level", &core.max_level)
            .field("current_level", &core.current_level)
            .finish()
    }
}

impl<R> SkipListCore<R> {
    fn next(&self, at: Position, level: usize) -> Link {
        match at {
            Position::Head => self.head[level],
            Position::Node(id) => self.arena[id].forward[level],
        }
    }

    fn set_next(&mut self, at: Position, level: usize, link: Link) {
        match at {
            Position::Head => self.head[level] = link,
            Position::Node(id) => self.arena[id].forward[level] = link,
        }
    }

    // Walks from the top populated level down to level 0, moving right past
    // every key smaller than `key`. `record` sees the last position reached
    // on each level; the level 0 position is returned.
    fn descend(&self, key: Key, mut record: impl FnMut(usize, Position)) -> Position {
        let mut at = Position::Head;
        for level in (0..self.current_level).rev() {
            while let Some(next) = self.next(at, level) {
                if self.arena[next].key >= key {
                    break;
                }
                at = Position::Node(next);
            }
            record(level, at);
        }
        at
    }

    fn find(&self, key: Key) -> Option<NodeId> {
        let at = self.descend(key, |_, _| {});
        self.next(at, 0).filter(|&id| self.arena[id].key == key)
    }

    pub(crate) fn first(&self) -> Link {
        self.head[0]
    }

    pub(crate) fn node(&self, id: NodeId) -> &SkipNode {
        &self.arena[id]
    }

    fn level_ids(&self, level: usize) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.head[level], move |&id| self.arena[id].forward[level])
    }
}

impl<R: Rng> SkipListCore<R> {
    fn insert(
        &mut self,
        key: Key,
        value: Value,
    ) -> Result<InsertOutcome, TryReserveError> {
        let mut update = Vec::new();
        update.try_reserve_exact(self.current_level)?;
        update.resize(self.current_level, Position::Head);
        let at = self.descend(key, |level, position| update[level] = position);

        if let Some(id) = self.next(at, 0) {
            if self.arena[id].key == key {
                return Ok(InsertOutcome::AlreadyExists);
            }
        }

        let height = random_height(&mut self.rng, self.max_level);
        // all allocation happens before the first link is rewritten
        if height > update.len() {
            // levels above current_level keep the head as their predecessor
            update.try_reserve_exact(height - update.len())?;
            update.resize(height, Position::Head);
        }
        let node = SkipNode::try_new(key, value, height)?;
        self.arena.try_reserve()?;

        self.current_level = self.current_level.max(height);
        let id = self.arena.insert(node);
        for (level, &predecessor) in update.iter().enumerate().take(height) {
            let next = self.next(predecessor, level);
            self.arena[id].forward[level] = next;
            self.set_next(predecessor, level, Some(id));
        }
        Ok(InsertOutcome::Inserted)
    }
}

impl<R> SkipListCore<R> {
    fn delete(&mut self, key: Key) -> DeleteOutcome {
        let mut update = vec![Position::Head; self.current_level];
        let at = self.descend(key, |level, position| update[level] = position);

        let target = match self.next(at, 0) {
            Some(id) if self.arena[id].key == key => id,
            _ => return DeleteOutcome::NotFound,
        };

        for (level, &predecessor) in update.iter().enumerate() {
            // the target's own levels have ended
            if self.next(predecessor, level) != Some(target) {
                break;
            }
            let next = self.arena[target].forward[level];
            self.set_next(predecessor, level, next);
        }
        self.arena.remove(target);

        while self.current_level > 0 && self.head[self.current_level - 1].is_none() {
            self.current_level -= 1;
        }
        DeleteOutcome::Deleted
    }
}

#[cfg(test)]
impl<R> SkipListIndex<R> {
    // Asserts every structural invariant of the index.
    fn check_invariants(&self) {
        use std::collections::HashSet;

        let core = self.read();
        assert!(core.current_level <= core.max_level);
        assert_eq!(core.head.len(), core.max_level);

        let levels: Vec<Vec<NodeId>> = (0..core.current_level)
            .map(|level| core.level_ids(level).collect())
            .collect();
        for (level, ids) in levels.iter().enumerate() {
            // strictly increasing keys, which also rules out duplicates
            for pair in ids.windows(2) {
                assert!(core.arena[pair[0]].key < core.arena[pair[1]].key);
            }
            for &id in ids {
                assert!(core.arena[id].height() > level);
            }
        }
        // current_level is the highest populated level
        if core.current_level > 0 {
            assert!(core.head[core.current_level - 1].is_some());
        }
        for level in core.current_level..core.max_level {
            assert!(core.head[level].is_none());
        }

        let bottom = levels.first().cloned().unwrap_or_default();
        assert_eq!(bottom.len(), self.size());
        assert_eq!(core.arena.len(), self.size());

        // a node of height h is linked on exactly levels 0..h
        let members: Vec<HashSet<NodeId>> = levels
            .iter()
            .map(|ids| ids.iter().copied().collect())
            .collect();
        for &id in &bottom {
            let height = core.arena[id].height();
            assert!(height >= 1 && height <= core.max_level);
            for (level, set) in members.iter().enumerate() {
                assert_eq!(set.contains(&id), level < height);
            }
        }
    }
}
