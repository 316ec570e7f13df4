use std::rc::Rc;

use ahash::AHashMap;
use utilities::CachedSet;

use crate::StateIndex;
use crate::TransitionId;

/// Accumulator for the antichain of head states reached by one symbol
/// evaluation. Members are kept pairwise incomparable under the preorder that
/// the caller supplies through upper and lower sets.
pub struct StateAntichain {
    data: Vec<StateIndex>,
}

impl StateAntichain {
    pub fn new() -> StateAntichain {
        StateAntichain { data: Vec::new() }
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Returns true when some member of the upper set is already present, so
    /// the candidate it belongs to is dominated.
    pub fn contains(&self, upper: &[StateIndex]) -> bool {
        upper.iter().any(|state| self.data.contains(state))
    }

    /// Removes every member that lies in the sorted lower set of a newly
    /// inserted state.
    pub fn refine(&mut self, lower: &[StateIndex]) {
        self.data.retain(|state| lower.binary_search(state).is_err());
    }

    pub fn insert(&mut self, state: StateIndex) {
        self.data.push(state);
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the members as a sorted set.
    pub fn sorted_data(&self) -> Vec<StateIndex> {
        let mut data = self.data.clone();
        data.sort_unstable();

        data
    }
}

impl Default for StateAntichain {
    fn default() -> StateAntichain {
        StateAntichain::new()
    }
}

/// A configuration of the inclusion search: an interned set of bigger states
/// reachable on the same contexts as the smaller state it is stored under,
/// together with the smaller transitions that produced it.
pub struct Config {
    pub bigger: CachedSet,
    pub trace: Rc<Vec<TransitionId>>,
}

/// Antichain over configurations, keyed by the smaller state. For every key
/// the stored bigger sets are pairwise incomparable under the supplied
/// comparison, and a configuration is only kept when no stored one subsumes
/// it.
pub struct ConfigAntichain {
    data: AHashMap<StateIndex, Vec<Rc<Config>>>,
}

impl ConfigAntichain {
    pub fn new() -> ConfigAntichain {
        ConfigAntichain {
            data: AHashMap::new(),
        }
    }

    /// Returns true when a stored configuration subsumes the candidate: its
    /// key lies in the candidate's upper set and its bigger set satisfies
    /// `cmp(stored, candidate)`.
    pub fn contains(
        &self,
        upper: &[StateIndex],
        set: &CachedSet,
        mut cmp: impl FnMut(&CachedSet, &CachedSet) -> bool,
    ) -> bool {
        for state in upper {
            if let Some(configs) = self.data.get(state) {
                if configs.iter().any(|config| cmp(&config.bigger, set)) {
                    return true;
                }
            }
        }

        false
    }

    /// Erases every stored configuration that the candidate subsumes: its key
    /// lies in the candidate's lower set and its bigger set satisfies
    /// `cmp(stored, candidate)`. The eraser is invoked for every removal so
    /// that worklist entries can be withdrawn alongside.
    pub fn refine(
        &mut self,
        lower: &[StateIndex],
        set: &CachedSet,
        mut cmp: impl FnMut(&CachedSet, &CachedSet) -> bool,
        mut eraser: impl FnMut(StateIndex, &Rc<Config>),
    ) {
        for &state in lower {
            let Some(configs) = self.data.get_mut(&state) else {
                continue;
            };

            let mut index = 0;
            while index < configs.len() {
                if cmp(&configs[index].bigger, set) {
                    let config = configs.remove(index);
                    eraser(state, &config);
                } else {
                    index += 1;
                }
            }

            if configs.is_empty() {
                self.data.remove(&state);
            }
        }
    }

    pub fn insert(&mut self, state: StateIndex, config: Rc<Config>) {
        self.data.entry(state).or_default().push(config);
    }

    /// Returns the configurations stored under the given smaller state.
    pub fn lookup(&self, state: StateIndex) -> Option<&[Rc<Config>]> {
        self.data.get(&state).map(|configs| configs.as_slice())
    }

    /// Removes and returns all stored configurations.
    pub fn drain(&mut self) -> Vec<(StateIndex, Rc<Config>)> {
        let mut entries = Vec::new();

        for (state, configs) in self.data.drain() {
            for config in configs {
                entries.push((state, config));
            }
        }

        entries
    }
}

impl Default for ConfigAntichain {
    fn default() -> ConfigAntichain {
        ConfigAntichain::new()
    }
}
