/// A free list arena that hands out reusable vectors addressed by a stable
/// slot index. Reclaimed slots keep their allocation so that a subsequent
/// acquire returns an empty vector with its capacity preserved.
pub struct CachingAllocator {
    entries: Vec<Vec<usize>>,
    free: Vec<usize>,
}

impl CachingAllocator {
    pub fn new() -> CachingAllocator {
        CachingAllocator {
            entries: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Returns the slot of an empty vector, either recycled or fresh.
    pub fn acquire(&mut self) -> usize {
        match self.free.pop() {
            Some(slot) => {
                self.entries[slot].clear();
                slot
            }
            None => {
                self.entries.push(Vec::new());
                self.entries.len() - 1
            }
        }
    }

    /// Returns the slot of a vector holding a copy of the contents of the
    /// given source slot.
    pub fn acquire_copy(&mut self, source: usize) -> usize {
        let slot = self.acquire();
        debug_assert!(slot != source, "A live slot cannot be recycled");

        let mut data = std::mem::take(&mut self.entries[slot]);
        data.extend_from_slice(&self.entries[source]);
        self.entries[slot] = data;

        slot
    }

    /// Returns the slot to the free list. The index must come from a previous
    /// [CachingAllocator::acquire] call and must not be reclaimed twice.
    pub fn reclaim(&mut self, slot: usize) {
        debug_assert!(slot < self.entries.len(), "Slot {slot} was never allocated");
        debug_assert!(!self.free.contains(&slot), "Slot {slot} is reclaimed twice");

        self.free.push(slot);
    }

    pub fn get(&self, slot: usize) -> &Vec<usize> {
        &self.entries[slot]
    }

    pub fn get_mut(&mut self, slot: usize) -> &mut Vec<usize> {
        &mut self.entries[slot]
    }
}

impl Default for CachingAllocator {
    fn default() -> CachingAllocator {
        CachingAllocator::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recycling_preserves_capacity() {
        let mut allocator = CachingAllocator::new();

        let slot = allocator.acquire();
        allocator.get_mut(slot).extend_from_slice(&[1, 2, 3]);
        let capacity = allocator.get(slot).capacity();

        allocator.reclaim(slot);

        let recycled = allocator.acquire();
        assert_eq!(recycled, slot);
        assert!(allocator.get(recycled).is_empty());
        assert_eq!(allocator.get(recycled).capacity(), capacity);
    }

    #[test]
    fn test_acquire_copy() {
        let mut allocator = CachingAllocator::new();

        let source = allocator.acquire();
        allocator.get_mut(source).extend_from_slice(&[4, 5]);

        let copy = allocator.acquire_copy(source);
        assert_eq!(allocator.get(copy), &vec![4, 5]);
        assert_eq!(allocator.get(source), &vec![4, 5]);
    }
}
