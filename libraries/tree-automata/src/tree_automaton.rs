use std::fmt;

use ahash::AHashSet;
use smallvec::SmallVec;

/// The index type for a state.
pub type StateIndex = usize;

/// The index type for a symbol of the ranked alphabet.
pub type SymbolIndex = usize;

/// The index of a transition within its automaton.
pub type TransitionId = usize;

/// The child states of a transition. Most ranked alphabets have small
/// arities, so the tuple is stored inline.
pub type StateTuple = SmallVec<[StateIndex; 2]>;

/// A single bottom up transition symbol(children) -> target. A transition
/// with an empty child tuple is a leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub symbol: SymbolIndex,
    pub children: StateTuple,
    pub target: StateIndex,
}

impl Transition {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// A bottom up finite tree automaton over a shared state space: when two
/// automata take part in an inclusion check their states are drawn from one
/// id range, so that a preorder over the union addresses both.
pub struct TreeAutomaton {
    transitions: Vec<Transition>,
    leaves: Vec<Vec<TransitionId>>,
    final_states: AHashSet<StateIndex>,

    num_of_states: usize,
}

impl TreeAutomaton {
    /// Creates an automaton over the given state space and alphabet, without
    /// transitions.
    pub fn new(num_of_states: usize, num_of_symbols: usize) -> TreeAutomaton {
        TreeAutomaton {
            transitions: Vec::new(),
            leaves: vec![Vec::new(); num_of_symbols],
            final_states: AHashSet::new(),
            num_of_states,
        }
    }

    pub fn add_transition(&mut self, symbol: SymbolIndex, children: &[StateIndex], target: StateIndex) -> TransitionId {
        debug_assert!(symbol < self.num_of_symbols(), "The symbol {symbol} is outside of the alphabet");
        debug_assert!(
            target < self.num_of_states && children.iter().all(|&child| child < self.num_of_states),
            "The transition {symbol}({children:?}) -> {target} mentions an unknown state"
        );

        let id = self.transitions.len();

        if children.is_empty() {
            self.leaves[symbol].push(id);
        }

        self.transitions.push(Transition {
            symbol,
            children: SmallVec::from_slice(children),
            target,
        });

        id
    }

    pub fn add_final_state(&mut self, state: StateIndex) {
        debug_assert!(state < self.num_of_states, "The final state {state} is unknown");

        self.final_states.insert(state);
    }

    pub fn is_final(&self, state: StateIndex) -> bool {
        self.final_states.contains(&state)
    }

    /// Returns per symbol the leaf transitions of that symbol. The table
    /// length is the size of the alphabet.
    pub fn leaves(&self) -> &[Vec<TransitionId>] {
        &self.leaves
    }

    pub fn transition(&self, id: TransitionId) -> &Transition {
        &self.transitions[id]
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn num_of_states(&self) -> usize {
        self.num_of_states
    }

    pub fn num_of_symbols(&self) -> usize {
        self.leaves.len()
    }

    pub fn num_of_transitions(&self) -> usize {
        self.transitions.len()
    }
}

impl fmt::Debug for TreeAutomaton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of states: {}", self.num_of_states)?;
        writeln!(f, "Number of symbols: {}", self.num_of_symbols())?;

        for transition in &self.transitions {
            writeln!(
                f,
                "{}{:?} -> {}{}",
                transition.symbol,
                transition.children.as_slice(),
                transition.target,
                if self.is_final(transition.target) { " (final)" } else { "" }
            )?;
        }

        Ok(())
    }
}

/// Occurrence index of an automaton: for every state the non leaf transitions
/// in which it occurs, grouped by symbol and child position. This is the
/// expansion index of the smaller automaton in an inclusion check.
pub struct OccurrenceIndex {
    index: Vec<Vec<Vec<Vec<TransitionId>>>>,
}

impl OccurrenceIndex {
    pub fn new(aut: &TreeAutomaton) -> OccurrenceIndex {
        let mut index = vec![vec![Vec::new(); aut.num_of_symbols()]; aut.num_of_states()];

        for (id, transition) in aut.transitions().iter().enumerate() {
            for (position, &child) in transition.children.iter().enumerate() {
                let positions: &mut Vec<Vec<TransitionId>> = &mut index[child][transition.symbol];

                if positions.len() <= position {
                    positions.resize(position + 1, Vec::new());
                }

                positions[position].push(id);
            }
        }

        OccurrenceIndex { index }
    }

    /// Returns per symbol and child position the transitions in which the
    /// state occurs at that position.
    pub fn lookup(&self, state: StateIndex) -> &[Vec<Vec<TransitionId>>] {
        &self.index[state]
    }
}

/// Position index of an automaton: per symbol and child position the
/// transitions carrying a given state at that position. This is the
/// evaluation index of the bigger automaton in an inclusion check.
pub struct PositionIndex {
    index: Vec<Vec<Vec<Vec<TransitionId>>>>,
}

impl PositionIndex {
    pub fn new(aut: &TreeAutomaton) -> PositionIndex {
        let mut index = vec![Vec::new(); aut.num_of_symbols()];

        for (id, transition) in aut.transitions().iter().enumerate() {
            for (position, &child) in transition.children.iter().enumerate() {
                let positions: &mut Vec<Vec<Vec<TransitionId>>> = &mut index[transition.symbol];

                if positions.len() <= position {
                    positions.resize(position + 1, Vec::new());
                }

                if positions[position].len() <= child {
                    positions[position].resize(child + 1, Vec::new());
                }

                positions[position][child].push(id);
            }
        }

        PositionIndex { index }
    }

    /// Returns the transitions of the symbol carrying the state at the child
    /// position, or an empty slice when there are none.
    pub fn lookup(&self, symbol: SymbolIndex, position: usize, state: StateIndex) -> &[TransitionId] {
        const EMPTY: &[TransitionId] = &[];

        self.index
            .get(symbol)
            .and_then(|positions| positions.get(position))
            .and_then(|states| states.get(state))
            .map_or(EMPTY, |transitions| transitions.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    fn example_automaton() -> TreeAutomaton {
        // a -> 0, b(0, 0) -> 1, b(1, 0) -> 2 with 1 and 2 final.
        let mut aut = TreeAutomaton::new(3, 2);
        aut.add_transition(0, &[], 0);
        aut.add_transition(1, &[0, 0], 1);
        aut.add_transition(1, &[1, 0], 2);
        aut.add_final_state(1);
        aut.add_final_state(2);

        aut
    }

    #[test]
    fn test_leaves_table() {
        let aut = example_automaton();

        assert_eq!(aut.leaves().len(), 2);
        assert_eq!(aut.leaves()[0], vec![0]);
        assert!(aut.leaves()[1].is_empty());

        assert!(aut.transition(0).is_leaf());
        assert!(!aut.transition(1).is_leaf());
        assert!(aut.is_final(2) && !aut.is_final(0));
    }

    #[test]
    fn test_occurrence_index() {
        let aut = example_automaton();
        let index = OccurrenceIndex::new(&aut);

        // State 0 occurs in transition 1 at both positions and in transition
        // 2 at the second position.
        let positions = &index.lookup(0)[1];
        assert_eq!(positions[0], vec![1]);
        assert_eq!(positions[1], vec![1, 2]);

        let positions = &index.lookup(1)[1];
        assert_eq!(positions[0], vec![2]);

        assert!(index.lookup(2)[1].is_empty());
    }

    #[test]
    fn test_position_index() {
        let aut = example_automaton();
        let index = PositionIndex::new(&aut);

        assert_eq!(index.lookup(1, 0, 0), &[1]);
        assert_eq!(index.lookup(1, 0, 1), &[2]);
        assert_eq!(index.lookup(1, 1, 0), &[1, 2]);

        // Out of range lookups yield no transitions.
        assert!(index.lookup(0, 0, 0).is_empty());
        assert!(index.lookup(1, 2, 0).is_empty());
        assert!(index.lookup(5, 0, 0).is_empty());
    }
}
