use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;

use ahash::AHashMap;

/// Interning cache for sorted state sets. Equal sets are mapped to the same
/// underlying allocation and receive a stable sequence id, so set equality
/// reduces to an id comparison.
///
/// When the last handle of a set is dropped the entry is evicted and the
/// registered hooks fire, before the set memory is released. Dependent caches
/// keyed by the id register a hook so that no entry outlives its key.
pub struct SetCache {
    inner: Rc<RefCell<CacheInner>>,
}

struct CacheInner {
    table: AHashMap<Rc<Vec<usize>>, u64>,
    hooks: Vec<Box<dyn Fn(u64)>>,
    next_id: u64,
}

impl CacheInner {
    fn evict(&mut self, set: &Vec<usize>, id: u64) {
        for hook in &self.hooks {
            hook(id);
        }

        self.table.remove(set);
    }
}

impl SetCache {
    pub fn new() -> SetCache {
        SetCache {
            inner: Rc::new(RefCell::new(CacheInner {
                table: AHashMap::new(),
                hooks: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Registers a hook that is invoked with the id of every evicted set.
    pub fn register_hook(&self, hook: impl Fn(u64) + 'static) {
        self.inner.borrow_mut().hooks.push(Box::new(hook));
    }

    /// Interns the given sorted set and returns a handle to it.
    pub fn lookup(&self, set: Vec<usize>) -> CachedSet {
        debug_assert!(
            set.windows(2).all(|window| window[0] < window[1]),
            "Interned sets must be sorted and duplicate free"
        );

        let mut inner = self.inner.borrow_mut();

        if let Some((existing, &id)) = inner.table.get_key_value(&set) {
            let set = Rc::clone(existing);
            return CachedSet {
                set,
                id,
                cache: Rc::clone(&self.inner),
            };
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let set = Rc::new(set);
        inner.table.insert(Rc::clone(&set), id);

        CachedSet {
            set,
            id,
            cache: Rc::clone(&self.inner),
        }
    }
}

impl Default for SetCache {
    fn default() -> SetCache {
        SetCache::new()
    }
}

/// A handle to an interned sorted state set. Handles with equal ids refer to
/// equal sets.
pub struct CachedSet {
    set: Rc<Vec<usize>>,
    id: u64,
    cache: Rc<RefCell<CacheInner>>,
}

impl CachedSet {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.set
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.set.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

impl Clone for CachedSet {
    fn clone(&self) -> CachedSet {
        CachedSet {
            set: Rc::clone(&self.set),
            id: self.id,
            cache: Rc::clone(&self.cache),
        }
    }
}

impl Drop for CachedSet {
    fn drop(&mut self) {
        // Two references remain for the last handle: this one and the one
        // held by the intern table.
        if Rc::strong_count(&self.set) == 2 {
            self.cache.borrow_mut().evict(&self.set, self.id);
        }
    }
}

impl PartialEq for CachedSet {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for CachedSet {}

impl fmt::Debug for CachedSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.set)
    }
}

/// Memoization table for a binary operation, with invalidation of every entry
/// that mentions a given operand in the first or second position.
pub struct CachedBinaryOp<K1, K2, V> {
    table: AHashMap<(K1, K2), V>,
    first_index: AHashMap<K1, Vec<(K1, K2)>>,
    second_index: AHashMap<K2, Vec<(K1, K2)>>,
}

impl<K1, K2, V> CachedBinaryOp<K1, K2, V>
where
    K1: Copy + Eq + Hash,
    K2: Copy + Eq + Hash,
    V: Clone,
{
    pub fn new() -> CachedBinaryOp<K1, K2, V> {
        CachedBinaryOp {
            table: AHashMap::new(),
            first_index: AHashMap::new(),
            second_index: AHashMap::new(),
        }
    }

    /// Returns the memoized result for the operands, computing and storing it
    /// on a miss.
    pub fn lookup(&mut self, first: K1, second: K2, op: impl FnOnce() -> V) -> V {
        if let Some(value) = self.table.get(&(first, second)) {
            return value.clone();
        }

        let value = op();
        self.table.insert((first, second), value.clone());
        self.first_index.entry(first).or_default().push((first, second));
        self.second_index.entry(second).or_default().push((first, second));

        value
    }

    /// Drops every entry whose first operand equals the given key.
    pub fn invalidate_first(&mut self, first: &K1) {
        if let Some(keys) = self.first_index.remove(first) {
            for key in keys {
                self.table.remove(&key);
            }
        }
    }

    /// Drops every entry whose second operand equals the given key.
    pub fn invalidate_second(&mut self, second: &K2) {
        if let Some(keys) = self.second_index.remove(second) {
            for key in keys {
                self.table.remove(&key);
            }
        }
    }
}

impl<K1, K2, V> Default for CachedBinaryOp<K1, K2, V>
where
    K1: Copy + Eq + Hash,
    K2: Copy + Eq + Hash,
    V: Clone,
{
    fn default() -> CachedBinaryOp<K1, K2, V> {
        CachedBinaryOp::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_yields_identical_ids() {
        let cache = SetCache::new();

        let first = cache.lookup(vec![1, 2, 5]);
        let second = cache.lookup(vec![1, 2, 5]);
        let other = cache.lookup(vec![1, 3]);

        assert_eq!(first.id(), second.id());
        assert_ne!(first.id(), other.id());
        assert_eq!(first.as_slice(), &[1, 2, 5]);
    }

    #[test]
    fn test_eviction_fires_hooks() {
        let cache = SetCache::new();
        let evicted = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&evicted);
        cache.register_hook(move |id| log.borrow_mut().push(id));

        let handle = cache.lookup(vec![1, 2]);
        let alias = handle.clone();
        let id = handle.id();

        drop(handle);
        assert!(evicted.borrow().is_empty(), "An aliased set must not be evicted");

        drop(alias);
        assert_eq!(*evicted.borrow(), vec![id]);

        // A new interning of the same contents gets a fresh id.
        let reborn = cache.lookup(vec![1, 2]);
        assert_ne!(reborn.id(), id);
    }

    #[test]
    fn test_cached_binary_op_invalidation() {
        let mut op: CachedBinaryOp<u64, u64, bool> = CachedBinaryOp::new();

        assert!(op.lookup(1, 2, || true));
        // A hit does not recompute.
        assert!(op.lookup(1, 2, || unreachable!("The result should be memoized")));

        op.invalidate_first(&1);
        assert!(!op.lookup(1, 2, || false));

        op.invalidate_second(&2);
        assert!(op.lookup(1, 2, || true));
    }
}
