use utilities::CachingAllocator;

use crate::LabelIndex;
use crate::StateIndex;

// Administrative prefix slots of a counter row.
const REF_COUNT: usize = 0;
const MASTER: usize = 1;
const BODY: usize = 2;

/// Per block arrival counters, one row per label with an incoming transition.
///
/// A row is a vector [ref_count, master, counts...] stored in the engine
/// owned [CachingAllocator]; its body is indexed by the compact per label key
/// of a predecessor state and `master` is the sum of the body. Rows are
/// shared between a parent block and its split off children and diverge copy
/// on write at the first decrement.
pub struct SharedCounter {
    rows: Vec<Option<usize>>,
}

/// Key tables translating (label, state) pairs to a compact body index. The
/// key is only defined for states with an outgoing transition of the label;
/// `range` is the body length per label.
pub struct CounterKeys {
    key: Vec<usize>,
    range: Vec<usize>,
    num_of_states: usize,
}

impl CounterKeys {
    pub fn new(num_of_labels: usize, num_of_states: usize) -> CounterKeys {
        CounterKeys {
            key: vec![usize::MAX; num_of_labels * num_of_states],
            range: vec![0; num_of_labels],
            num_of_states,
        }
    }

    pub fn set_key(&mut self, label: LabelIndex, state: StateIndex, index: usize) {
        self.key[label * self.num_of_states + state] = index;
    }

    pub fn set_range(&mut self, label: LabelIndex, range: usize) {
        self.range[label] = range;
    }

    pub fn range(&self, label: LabelIndex) -> usize {
        self.range[label]
    }

    fn index(&self, label: LabelIndex, state: StateIndex) -> usize {
        let index = self.key[label * self.num_of_states + state];
        debug_assert!(
            index != usize::MAX,
            "State {state} has no outgoing transition with label {label}"
        );

        index
    }
}

impl SharedCounter {
    pub fn new(num_of_labels: usize) -> SharedCounter {
        SharedCounter {
            rows: vec![None; num_of_labels],
        }
    }

    /// Counts one more arrival from the given predecessor state. The row must
    /// not be aliased; rows are only shared after initialization, when no
    /// increments happen anymore.
    pub fn incr(
        &mut self,
        rows: &mut CachingAllocator,
        keys: &CounterKeys,
        label: LabelIndex,
        state: StateIndex,
    ) {
        match self.rows[label] {
            Some(slot) => {
                let row = rows.get_mut(slot);
                debug_assert_eq!(
                    row[REF_COUNT], 1,
                    "An aliased row must be detached before it is incremented"
                );

                row[MASTER] += 1;
                row[BODY + keys.index(label, state)] += 1;
            }
            None => {
                let slot = rows.acquire();
                let row = rows.get_mut(slot);
                row.resize(BODY + keys.range(label), 0);

                row[REF_COUNT] = 1;
                row[MASTER] = 1;
                row[BODY + keys.index(label, state)] = 1;

                self.rows[label] = Some(slot);
            }
        }
    }

    /// Removes one arrival from the given predecessor state and returns the
    /// remaining count for that state. When the overall row count reaches
    /// zero the row is released; a row shared with another block is detached
    /// copy on write before the decrement.
    pub fn decr(
        &mut self,
        rows: &mut CachingAllocator,
        keys: &CounterKeys,
        label: LabelIndex,
        state: StateIndex,
    ) -> usize {
        let slot = self.rows[label].expect("Decrement of a missing counter row");

        let row = rows.get_mut(slot);
        if row[MASTER] == 1 {
            // The last arrival disappears with this decrement.
            debug_assert_eq!(row[BODY + keys.index(label, state)], 1);

            if row[REF_COUNT] == 1 {
                rows.reclaim(slot);
            } else {
                row[REF_COUNT] -= 1;
            }

            self.rows[label] = None;
            return 0;
        }

        let slot = if row[REF_COUNT] > 1 {
            row[REF_COUNT] -= 1;

            let private = rows.acquire_copy(slot);
            rows.get_mut(private)[REF_COUNT] = 1;
            self.rows[label] = Some(private);

            private
        } else {
            slot
        };

        let row = rows.get_mut(slot);
        row[MASTER] -= 1;

        let index = BODY + keys.index(label, state);
        row[index] -= 1;
        row[index]
    }

    /// Aliases the row of the parent counter for the given label. Used when a
    /// block is split off: the child starts with the parent's counter view
    /// until a decrement forces divergence.
    pub fn copy_row(&mut self, rows: &mut CachingAllocator, label: LabelIndex, parent: &SharedCounter) {
        debug_assert!(self.rows[label].is_none(), "The row for label {label} is already present");

        let slot = parent.rows[label].expect("The parent block has no row for an inset label");
        rows.get_mut(slot)[REF_COUNT] += 1;

        self.rows[label] = Some(slot);
    }

    /// Returns the current count for the given predecessor state, or zero
    /// when the row is absent.
    #[cfg(test)]
    pub fn count(
        &self,
        rows: &CachingAllocator,
        keys: &CounterKeys,
        label: LabelIndex,
        state: StateIndex,
    ) -> usize {
        match self.rows[label] {
            Some(slot) => rows.get(slot)[BODY + keys.index(label, state)],
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn keys_for_single_label(states: usize) -> CounterKeys {
        let mut keys = CounterKeys::new(1, states);
        keys.set_range(0, states);
        for state in 0..states {
            keys.set_key(0, state, state);
        }

        keys
    }

    #[test]
    fn test_row_lifecycle() {
        let mut rows = CachingAllocator::new();
        let keys = keys_for_single_label(3);
        let mut counter = SharedCounter::new(1);

        counter.incr(&mut rows, &keys, 0, 1);
        counter.incr(&mut rows, &keys, 0, 1);
        counter.incr(&mut rows, &keys, 0, 2);
        assert_eq!(counter.count(&rows, &keys, 0, 1), 2);

        assert_eq!(counter.decr(&mut rows, &keys, 0, 1), 1);
        assert_eq!(counter.decr(&mut rows, &keys, 0, 1), 0);
        assert_eq!(counter.count(&rows, &keys, 0, 1), 0);

        // The final decrement releases the row.
        assert_eq!(counter.decr(&mut rows, &keys, 0, 2), 0);
        assert_eq!(counter.count(&rows, &keys, 0, 2), 0);
    }

    #[test]
    fn test_copy_on_write_divergence() {
        let mut rows = CachingAllocator::new();
        let keys = keys_for_single_label(2);

        let mut parent = SharedCounter::new(1);
        parent.incr(&mut rows, &keys, 0, 0);
        parent.incr(&mut rows, &keys, 0, 1);

        let mut child = SharedCounter::new(1);
        child.copy_row(&mut rows, 0, &parent);
        assert_eq!(child.count(&rows, &keys, 0, 0), 1);

        // Decrementing the child must not affect the parent's counts.
        assert_eq!(child.decr(&mut rows, &keys, 0, 0), 0);
        assert_eq!(parent.count(&rows, &keys, 0, 0), 1);
        assert_eq!(parent.count(&rows, &keys, 0, 1), 1);
    }
}
