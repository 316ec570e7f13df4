use crate::StateIndex;

/// Arena of intrusive circular doubly linked list nodes, one per LTS state.
/// Every block of the refined partition owns its member states through a head
/// index into this arena; moving a state between the lists of a block is a
/// constant time relinking.
pub struct StateList {
    nodes: Vec<Node>,
}

struct Node {
    block: usize,
    next: StateIndex,
    prev: StateIndex,
}

impl StateList {
    /// Creates a node per state, all linked into a single circular list owned
    /// by block zero.
    pub fn new(num_of_states: usize) -> StateList {
        debug_assert!(num_of_states > 0, "Cannot build lists over the empty state set");

        let nodes = (0..num_of_states)
            .map(|state| Node {
                block: 0,
                next: (state + 1) % num_of_states,
                prev: (state + num_of_states - 1) % num_of_states,
            })
            .collect();

        StateList { nodes }
    }

    /// Returns the block owning the given state.
    pub fn block(&self, state: StateIndex) -> usize {
        self.nodes[state].block
    }

    pub fn set_block(&mut self, state: StateIndex, block: usize) {
        self.nodes[state].block = block;
    }

    pub fn next_of(&self, state: StateIndex) -> StateIndex {
        self.nodes[state].next
    }

    /// Unlinks the state from the circular list rooted at `src` and links it
    /// into the one rooted at `dst`. The state must be a member of the source
    /// list; the head of the source moves along when the state was the head.
    pub fn move_elem(&mut self, state: StateIndex, src: &mut Option<StateIndex>, dst: &mut Option<StateIndex>) {
        debug_assert!(src.is_some(), "Cannot move a state out of an empty list");

        let next = self.nodes[state].next;
        let prev = self.nodes[state].prev;

        if next == state {
            *src = None;
        } else {
            *src = Some(next);
            self.nodes[next].prev = prev;
            self.nodes[prev].next = next;
        }

        match *dst {
            None => {
                *dst = Some(state);
                self.nodes[state].next = state;
                self.nodes[state].prev = state;
            }
            Some(head) => {
                let tail = self.nodes[head].prev;
                self.nodes[state].next = head;
                self.nodes[state].prev = tail;
                self.nodes[head].prev = state;
                self.nodes[tail].next = state;
            }
        }
    }

    /// Iterates the circular list rooted at the given head.
    pub fn iter(&self, head: Option<StateIndex>) -> StateListIter<'_> {
        StateListIter {
            nodes: &self.nodes,
            head: head.unwrap_or_default(),
            current: head,
        }
    }
}

pub struct StateListIter<'a> {
    nodes: &'a [Node],
    head: StateIndex,
    current: Option<StateIndex>,
}

impl<'a> Iterator for StateListIter<'a> {
    type Item = StateIndex;

    fn next(&mut self) -> Option<Self::Item> {
        let state = self.current?;

        let next = self.nodes[state].next;
        self.current = if next == self.head { None } else { Some(next) };

        Some(state)
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_move_between_lists() {
        let mut list = StateList::new(4);

        let mut main = Some(0);
        let mut tmp = None;

        list.move_elem(2, &mut main, &mut tmp);
        list.move_elem(0, &mut main, &mut tmp);

        let mut members: Vec<StateIndex> = list.iter(main).collect();
        members.sort_unstable();
        assert_eq!(members, vec![1, 3]);

        let mut members: Vec<StateIndex> = list.iter(tmp).collect();
        members.sort_unstable();
        assert_eq!(members, vec![0, 2]);

        // Moving the remaining states empties the source list.
        list.move_elem(1, &mut main, &mut tmp);
        list.move_elem(3, &mut main, &mut tmp);
        assert!(main.is_none());

        let mut members: Vec<StateIndex> = list.iter(tmp).collect();
        members.sort_unstable();
        assert_eq!(members, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_singleton_list() {
        let mut list = StateList::new(2);

        let mut main = Some(0);
        let mut tmp = None;

        list.move_elem(1, &mut main, &mut tmp);
        assert_eq!(list.iter(main).collect::<Vec<_>>(), vec![0]);
        assert_eq!(list.iter(tmp).collect::<Vec<_>>(), vec![1]);

        list.move_elem(1, &mut tmp, &mut main);
        assert!(tmp.is_none());
        assert_eq!(list.iter(main).count(), 2);
    }
}
