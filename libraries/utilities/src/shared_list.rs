use crate::CachingAllocator;

/// Arena of reference counted singly linked chunk lists. A list is addressed
/// by its head node; the chunks are vectors owned by a [CachingAllocator] so
/// that released lists return their storage to the free lists.
///
/// Lists can be aliased with [SharedListPool::copy]. An aliased head is never
/// mutated: appending to it pushes a fresh private chunk in front, so the
/// other owners keep observing the original contents.
pub struct SharedListPool {
    nodes: Vec<Node>,
    free: Vec<usize>,
}

struct Node {
    ref_count: usize,
    next: Option<usize>,
    chunk: usize,
}

impl SharedListPool {
    pub fn new() -> SharedListPool {
        SharedListPool {
            nodes: Vec::new(),
            free: Vec::new(),
        }
    }

    fn allocate(&mut self, chunk: usize) -> usize {
        let node = Node {
            ref_count: 1,
            next: None,
            chunk,
        };

        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                index
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Appends an element to the list rooted at `head`. Returns true iff the
    /// list was empty, so a head was just created; the caller uses this
    /// signal to schedule work for a list that became non empty.
    pub fn append(
        &mut self,
        head: &mut Option<usize>,
        element: usize,
        vectors: &mut CachingAllocator,
    ) -> bool {
        match *head {
            None => {
                let chunk = vectors.acquire();
                vectors.get_mut(chunk).push(element);
                *head = Some(self.allocate(chunk));

                true
            }
            Some(node) => {
                if self.nodes[node].ref_count > 1 {
                    // The head is aliased; push a private chunk in front. The
                    // reference held through this list moves to the new node.
                    let chunk = vectors.acquire();
                    vectors.get_mut(chunk).push(element);

                    let new_node = self.allocate(chunk);
                    self.nodes[new_node].next = Some(node);
                    *head = Some(new_node);
                } else {
                    let chunk = self.nodes[node].chunk;
                    vectors.get_mut(chunk).push(element);
                }

                false
            }
        }
    }

    /// Bumps the reference count of the list and returns an alias of it.
    pub fn copy(&mut self, head: usize) -> usize {
        self.nodes[head].ref_count += 1;
        head
    }

    /// Drops one reference to the list. Nodes whose count reaches zero are
    /// returned to the pool together with their chunks; the walk stops at the
    /// first node that is still referenced elsewhere.
    pub fn release(&mut self, head: usize, vectors: &mut CachingAllocator) {
        let mut current = Some(head);

        while let Some(node) = current {
            self.nodes[node].ref_count -= 1;
            if self.nodes[node].ref_count > 0 {
                break;
            }

            vectors.reclaim(self.nodes[node].chunk);
            current = self.nodes[node].next;
            self.free.push(node);
        }
    }

    /// Appends every element of the list to `out`, newest chunk first.
    pub fn collect(&self, head: usize, vectors: &CachingAllocator, out: &mut Vec<usize>) {
        let mut current = Some(head);

        while let Some(node) = current {
            out.extend_from_slice(vectors.get(self.nodes[node].chunk));
            current = self.nodes[node].next;
        }
    }
}

impl Default for SharedListPool {
    fn default() -> SharedListPool {
        SharedListPool::new()
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_append_signals_new_head() {
        let mut vectors = CachingAllocator::new();
        let mut lists = SharedListPool::new();

        let mut head = None;
        assert!(lists.append(&mut head, 1, &mut vectors));
        assert!(!lists.append(&mut head, 2, &mut vectors));

        let mut contents = Vec::new();
        lists.collect(head.unwrap(), &vectors, &mut contents);
        assert_eq!(contents, vec![1, 2]);
    }

    #[test]
    fn test_aliases_do_not_observe_appends() {
        let mut vectors = CachingAllocator::new();
        let mut lists = SharedListPool::new();

        let mut head = None;
        lists.append(&mut head, 1, &mut vectors);

        let alias = lists.copy(head.unwrap());

        // Appending through the original owner must leave the alias intact.
        assert!(!lists.append(&mut head, 2, &mut vectors));

        let mut contents = Vec::new();
        lists.collect(alias, &vectors, &mut contents);
        assert_eq!(contents, vec![1]);

        let mut contents = Vec::new();
        lists.collect(head.unwrap(), &vectors, &mut contents);
        assert_eq!(contents, vec![2, 1]);

        // Releasing the owner keeps the shared tail alive for the alias.
        lists.release(head.unwrap(), &mut vectors);

        let mut contents = Vec::new();
        lists.collect(alias, &vectors, &mut contents);
        assert_eq!(contents, vec![1]);

        lists.release(alias, &mut vectors);
    }

    #[test]
    fn test_release_recycles_nodes_and_chunks() {
        let mut vectors = CachingAllocator::new();
        let mut lists = SharedListPool::new();

        let mut head = None;
        lists.append(&mut head, 1, &mut vectors);
        lists.release(head.unwrap(), &mut vectors);

        // The chunk returned to the allocator and the node to the pool.
        let mut other = None;
        lists.append(&mut other, 7, &mut vectors);
        assert_eq!(other, head);
    }
}
