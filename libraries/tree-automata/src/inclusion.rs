use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::rc::Rc;

use log::debug;
use log::trace;

use utilities::CachedBinaryOp;
use utilities::CachedSet;
use utilities::SetCache;

use crate::antichain::Config;
use crate::antichain::ConfigAntichain;
use crate::antichain::StateAntichain;
use crate::OccurrenceIndex;
use crate::PositionIndex;
use crate::StateIndex;
use crate::SymbolIndex;
use crate::TransitionId;
use crate::TreeAutomaton;

/// Outcome description and refutation witness of an inclusion check. On a
/// refutation the trace holds the smaller transitions that together build a
/// tree accepted by the smaller automaton but not covered by the bigger one.
pub struct InclusionContext {
    description: String,
    trace: Vec<TransitionId>,
}

impl InclusionContext {
    pub fn new() -> InclusionContext {
        InclusionContext {
            description: String::new(),
            trace: Vec::new(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn trace(&self) -> &[TransitionId] {
        &self.trace
    }

    fn set_description(&mut self, description: &str) {
        self.description = description.to_string();
    }

    fn set_trace(&mut self, trace: Vec<TransitionId>) {
        self.trace = trace;
    }
}

impl Default for InclusionContext {
    fn default() -> InclusionContext {
        InclusionContext::new()
    }
}

/// Worklist element: a configuration waiting to be expanded. The order
/// prefers small bigger sets, then small smaller states, then the intern id
/// of the bigger set, which makes the search deterministic.
struct NextElem {
    size: usize,
    smaller: StateIndex,
    id: u64,
    config: Rc<Config>,
}

impl NextElem {
    fn new(smaller: StateIndex, config: &Rc<Config>) -> NextElem {
        NextElem {
            size: config.bigger.len(),
            smaller,
            id: config.bigger.id(),
            config: Rc::clone(config),
        }
    }

    fn key(&self) -> (usize, StateIndex, u64) {
        (self.size, self.smaller, self.id)
    }
}

impl PartialEq for NextElem {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for NextElem {}

impl PartialOrd for NextElem {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NextElem {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

/// Returns true when the two sorted sequences share an element.
fn check_intersection(left: &[usize], right: &[usize]) -> bool {
    let mut i = 0;
    let mut j = 0;

    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => return true,
        }
    }

    false
}

/// Returns the ordered intersection of two sorted sequences.
fn intersect_sorted(left: &[usize], right: &[usize]) -> Vec<usize> {
    let mut result = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < left.len() && j < right.len() {
        match left[i].cmp(&right[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                result.push(left[i]);
                i += 1;
                j += 1;
            }
        }
    }

    result
}

/// Returns the union of the given smaller transition with the traces of the
/// chosen child configurations.
fn merge_traces(transition: TransitionId, choices: &[Vec<Rc<Config>>], selection: &[usize]) -> Vec<TransitionId> {
    let mut trace = vec![transition];

    for (position, configs) in choices.iter().enumerate() {
        trace.extend_from_slice(&configs[selection[position]].trace);
    }

    trace.sort_unstable();
    trace.dedup();

    trace
}

/// Builds the per position choice lists for a smaller transition: the pinned
/// position offers only the popped configuration, every other position offers
/// all processed configurations of its child state. Returns None when some
/// child has no cover yet.
fn build_choices(
    processed: &ConfigAntichain,
    children: &[StateIndex],
    pinned: usize,
    popped: &Rc<Config>,
) -> Option<Vec<Vec<Rc<Config>>>> {
    let mut choices = Vec::with_capacity(children.len());

    for (position, &child) in children.iter().enumerate() {
        if position == pinned {
            choices.push(vec![Rc::clone(popped)]);
        } else {
            choices.push(processed.lookup(child)?.to_vec());
        }
    }

    Some(choices)
}

/// Decides whether the language of the smaller automaton is included in the
/// language of the bigger one, modulo the preorder given through its upper
/// sets `ind` and lower sets `inv` over the shared state space.
///
/// The context receives a human readable outcome description, and on a
/// refutation the witness trace of smaller transitions.
pub fn check_inclusion(
    smaller: &TreeAutomaton,
    bigger: &TreeAutomaton,
    ind: &[Vec<StateIndex>],
    inv: &[Vec<StateIndex>],
    context: &mut InclusionContext,
) -> bool {
    debug_assert!(
        ind.len() >= smaller.num_of_states().max(bigger.num_of_states())
            && inv.len() >= smaller.num_of_states().max(bigger.num_of_states()),
        "The preorder does not cover the shared state space"
    );
    debug_assert!(
        ind.iter().enumerate().all(|(state, upper)| upper.binary_search(&state).is_ok()),
        "The preorder must be reflexive with sorted upper sets"
    );

    debug!(
        "Checking upward inclusion between automata with {} and {} transitions",
        smaller.num_of_transitions(),
        bigger.num_of_transitions()
    );

    let cache = SetCache::new();
    let lte_cache: Rc<RefCell<CachedBinaryOp<u64, u64, bool>>> = Rc::new(RefCell::new(CachedBinaryOp::new()));
    let eval_cache: Rc<RefCell<CachedBinaryOp<(SymbolIndex, usize), u64, Rc<Vec<TransitionId>>>>> =
        Rc::new(RefCell::new(CachedBinaryOp::new()));

    {
        // Entries keyed by an interned set must not outlive it.
        let lte_cache = Rc::clone(&lte_cache);
        let eval_cache = Rc::clone(&eval_cache);

        cache.register_hook(move |id| {
            let mut lte_cache = lte_cache.borrow_mut();
            lte_cache.invalidate_first(&id);
            lte_cache.invalidate_second(&id);

            eval_cache.borrow_mut().invalidate_second(&id);
        });
    }

    // x is below y when every member of x has an upper state in y.
    let lte = |x: &CachedSet, y: &CachedSet| -> bool {
        if x.id() == y.id() {
            return true;
        }

        lte_cache.borrow_mut().lookup(x.id(), y.id(), || {
            x.iter().all(|state| check_intersection(&ind[state], y.as_slice()))
        })
    };
    let gte = |x: &CachedSet, y: &CachedSet| lte(y, x);

    let position_index = PositionIndex::new(bigger);

    // The bigger transitions of a symbol whose given child position is
    // covered by the given set.
    let eval_transitions = |symbol: SymbolIndex, position: usize, set: &CachedSet| -> Rc<Vec<TransitionId>> {
        eval_cache.borrow_mut().lookup((symbol, position), set.id(), || {
            let mut transitions = Vec::new();

            for state in set.iter() {
                transitions.extend_from_slice(position_index.lookup(symbol, position, state));
            }

            transitions.sort_unstable();
            transitions.dedup();

            Rc::new(transitions)
        })
    };

    let mut post = StateAntichain::new();
    let mut processed = ConfigAntichain::new();
    let mut temporary = ConfigAntichain::new();
    let mut next: BTreeSet<NextElem> = BTreeSet::new();

    // Seed the antichain from the leaf transitions.

    if bigger.leaves().len() < smaller.leaves().len() {
        context.set_description("Inclusion refuted! Reason: leaves set sizes incompatible");
        return false;
    }

    for symbol in 0..smaller.leaves().len() {
        post.clear();
        let mut is_accepting = false;

        for &id in &bigger.leaves()[symbol] {
            let target = bigger.transition(id).target;

            if post.contains(&ind[target]) {
                continue;
            }

            post.refine(&inv[target]);
            post.insert(target);

            is_accepting = is_accepting || bigger.is_final(target);
        }

        let tmp = post.sorted_data();
        let ptr = cache.lookup(tmp);

        for &id in &smaller.leaves()[symbol] {
            let target = smaller.transition(id).target;

            if !is_accepting && smaller.is_final(target) {
                context.set_description("Inclusion refuted! Reason: leaves not covered");
                context.set_trace(vec![id]);
                return false;
            }

            // Skip configurations that the preorder or the antichain already
            // covers.
            if check_intersection(&ind[target], ptr.as_slice()) {
                continue;
            }
            if processed.contains(&ind[target], &ptr, &lte) {
                continue;
            }

            processed.refine(&inv[target], &ptr, &gte, |state, erased| {
                next.remove(&NextElem::new(state, erased));
            });

            let config = Rc::new(Config {
                bigger: ptr.clone(),
                trace: Rc::new(vec![id]),
            });

            processed.insert(target, Rc::clone(&config));
            next.insert(NextElem::new(target, &config));
        }
    }

    // Expand configurations until the antichain is saturated or a
    // counterexample tree is assembled.

    let occurrence_index = OccurrenceIndex::new(smaller);

    while let Some(element) = next.pop_first() {
        let q = element.smaller;
        let popped = element.config;

        trace!("Expanding the configuration ({q}, {:?})", popped.bigger);

        for (symbol, positions) in occurrence_index.lookup(q).iter().enumerate() {
            for (pinned, transitions) in positions.iter().enumerate() {
                for &t in transitions {
                    let transition = smaller.transition(t);

                    let Some(choices) = build_choices(&processed, &transition.children, pinned, &popped)
                    else {
                        continue;
                    };

                    // Walk the Cartesian product of the choice lists.
                    let mut selection = vec![0usize; choices.len()];

                    'product: loop {
                        post.clear();

                        let first = eval_transitions(symbol, 0, &choices[0][selection[0]].bigger);
                        let mut bigger_transitions: Vec<TransitionId> = (*first).clone();

                        for position in 1..choices.len() {
                            let other =
                                eval_transitions(symbol, position, &choices[position][selection[position]].bigger);
                            bigger_transitions = intersect_sorted(&bigger_transitions, &other);
                        }

                        let mut is_bigger_accepting = false;
                        for &id in &bigger_transitions {
                            let target = bigger.transition(id).target;

                            if post.contains(&ind[target]) {
                                continue;
                            }

                            post.refine(&inv[target]);
                            post.insert(target);

                            is_bigger_accepting = is_bigger_accepting || bigger.is_final(target);
                        }

                        let is_smaller_accepting = smaller.is_final(transition.target);

                        if post.is_empty() || (!is_bigger_accepting && is_smaller_accepting) {
                            // The assembled context accepts in the smaller
                            // automaton with no counterpart in the bigger one.
                            context.set_description("Inclusion refuted! Reason: smaller accepts, bigger does not");
                            context.set_trace(merge_traces(t, &choices, &selection));
                            return false;
                        }

                        let tmp = post.sorted_data();

                        if !check_intersection(&ind[transition.target], &tmp) {
                            let ptr = cache.lookup(tmp);

                            if !temporary.contains(&ind[transition.target], &ptr, &lte) {
                                temporary.refine(&inv[transition.target], &ptr, &gte, |_, _| {});

                                let config = Rc::new(Config {
                                    bigger: ptr,
                                    trace: Rc::new(merge_traces(t, &choices, &selection)),
                                });

                                temporary.insert(transition.target, config);
                            }
                        }

                        // Advance to the next assignment.
                        let mut position = 0;
                        loop {
                            if position == selection.len() {
                                break 'product;
                            }

                            selection[position] += 1;
                            if selection[position] < choices[position].len() {
                                break;
                            }

                            selection[position] = 0;
                            position += 1;
                        }
                    }

                    // Promote the configurations gathered for this transition
                    // into the processed antichain, in a deterministic order.
                    let mut entries = temporary.drain();
                    entries.sort_by_key(|(state, config)| (*state, config.bigger.id()));

                    for (state, config) in entries {
                        if processed.contains(&ind[state], &config.bigger, &lte) {
                            continue;
                        }

                        processed.refine(&inv[state], &config.bigger, &gte, |erased_state, erased| {
                            next.remove(&NextElem::new(erased_state, erased));
                        });

                        processed.insert(state, Rc::clone(&config));
                        next.insert(NextElem::new(state, &config));
                    }
                }
            }
        }
    }

    context.set_description("Inclusion proved!");
    true
}
