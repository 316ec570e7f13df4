use rand::Rng;

use crate::LabelledTransitionSystem;
use crate::StateIndex;

/// Generates a random LTS with the desired number of states, labels and out
/// degree for every state.
pub fn random_lts(num_of_states: usize, num_of_labels: usize, outdegree: usize) -> LabelledTransitionSystem {
    let mut lts = LabelledTransitionSystem::new(num_of_states, num_of_labels);

    let mut rng = rand::thread_rng();

    for from in 0..num_of_states {
        // Introduce outgoing transitions for this state based on the desired out degree.
        let mut outgoing: Vec<(usize, StateIndex)> = Vec::new();

        for _ in 0..rng.gen_range(0..outdegree) {
            // Pick a random label and state.
            let label = rng.gen_range(0..num_of_labels);
            let to = rng.gen_range(0..num_of_states);

            match outgoing.binary_search(&(label, to)) {
                Ok(_) => {} // transition already introduced
                Err(pos) => {
                    outgoing.insert(pos, (label, to));
                }
            }
        }

        for (label, to) in outgoing {
            lts.add_transition(from, label, to);
        }
    }

    lts
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_random_lts() {
        let lts = random_lts(10, 3, 3);

        assert_eq!(lts.num_of_states(), 10);
        assert_eq!(lts.num_of_labels(), 3);
    }
}
