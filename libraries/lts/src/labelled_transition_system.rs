use std::fmt;

/// The index type for a label.
pub type LabelIndex = usize;

/// The index for a state.
pub type StateIndex = usize;

/// Represents a labelled transition system with label indexed adjacency in
/// both directions, so that the successors and the predecessors of a state
/// under a given label are available in constant time.
#[derive(PartialEq, Eq)]
pub struct LabelledTransitionSystem {
    post: Vec<Vec<Vec<StateIndex>>>,
    pre: Vec<Vec<Vec<StateIndex>>>,

    bw_labels: Vec<Vec<LabelIndex>>,

    num_of_transitions: usize,
}

impl LabelledTransitionSystem {
    /// Creates a system with the given number of states and labels and no
    /// transitions.
    pub fn new(num_of_states: usize, num_of_labels: usize) -> LabelledTransitionSystem {
        LabelledTransitionSystem {
            post: vec![vec![Vec::new(); num_of_states]; num_of_labels],
            pre: vec![vec![Vec::new(); num_of_states]; num_of_labels],
            bw_labels: vec![Vec::new(); num_of_states],
            num_of_transitions: 0,
        }
    }

    pub fn add_transition(&mut self, from: StateIndex, label: LabelIndex, to: StateIndex) {
        debug_assert!(
            from < self.num_of_states() && to < self.num_of_states(),
            "The transition {from} --[{label}]-> {to} mentions an unknown state"
        );
        debug_assert!(
            label < self.num_of_labels(),
            "The transition {from} --[{label}]-> {to} mentions an unknown label"
        );

        self.post[label][from].push(to);

        if self.pre[label][to].is_empty() {
            self.bw_labels[to].push(label);
        }
        self.pre[label][to].push(from);

        self.num_of_transitions += 1;
    }

    /// Returns the number of states.
    pub fn num_of_states(&self) -> StateIndex {
        self.bw_labels.len()
    }

    /// Returns the number of labels.
    pub fn num_of_labels(&self) -> LabelIndex {
        self.post.len()
    }

    /// Returns the number of transitions.
    pub fn num_of_transitions(&self) -> usize {
        self.num_of_transitions
    }

    /// Returns per state the successors under the given label.
    pub fn post(&self, label: LabelIndex) -> &[Vec<StateIndex>] {
        &self.post[label]
    }

    /// Returns per state the predecessors under the given label.
    pub fn pre(&self, label: LabelIndex) -> &[Vec<StateIndex>] {
        &self.pre[label]
    }

    /// Returns the labels with at least one transition into the given state.
    pub fn bw_labels(&self, state: StateIndex) -> &[LabelIndex] {
        &self.bw_labels[state]
    }

    /// Iterate over all transitions (from, label, to) of the system.
    pub fn iter_transitions(&self) -> impl Iterator<Item = (StateIndex, LabelIndex, StateIndex)> + '_ {
        self.post.iter().enumerate().flat_map(|(label, successors)| {
            successors.iter().enumerate().flat_map(move |(from, targets)| {
                targets.iter().map(move |&to| (from, label, to))
            })
        })
    }
}

impl fmt::Display for LabelledTransitionSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of states: {}", self.num_of_states())?;
        writeln!(f, "Number of labels: {}", self.num_of_labels())?;
        write!(f, "Number of transitions: {}", self.num_of_transitions)
    }
}

impl fmt::Debug for LabelledTransitionSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self)?;

        for (from, label, to) in self.iter_transitions() {
            writeln!(f, "{from} --[{label}]-> {to}")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_adjacency_is_consistent() {
        let mut lts = LabelledTransitionSystem::new(3, 2);
        lts.add_transition(0, 0, 1);
        lts.add_transition(0, 1, 1);
        lts.add_transition(2, 0, 1);
        lts.add_transition(1, 1, 1);

        assert_eq!(lts.num_of_transitions(), 4);
        assert_eq!(lts.post(0)[0], vec![1]);
        assert_eq!(lts.pre(0)[1], vec![0, 2]);
        assert_eq!(lts.pre(1)[1], vec![0, 1]);

        // Backward labels are registered once per label.
        assert_eq!(lts.bw_labels(1), &[0, 1]);
        assert!(lts.bw_labels(0).is_empty());

        assert_eq!(lts.iter_transitions().count(), 4);
    }
}
