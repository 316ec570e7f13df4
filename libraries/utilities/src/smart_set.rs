use std::fmt;

/// A set over the bounded universe 0..capacity that keeps a multiplicity per
/// element. All operations are constant time; iteration visits every current
/// member exactly once in an unspecified but deterministic order.
pub struct SmartSet {
    count: Vec<usize>,
    position: Vec<usize>,
    elements: Vec<usize>,
}

impl SmartSet {
    pub fn new(capacity: usize) -> SmartSet {
        SmartSet {
            count: vec![0; capacity],
            position: vec![0; capacity],
            elements: Vec::new(),
        }
    }

    pub fn contains(&self, element: usize) -> bool {
        self.count[element] > 0
    }

    /// Increments the multiplicity of the element, adding it to the set when
    /// it was absent.
    pub fn add(&mut self, element: usize) {
        self.count[element] += 1;

        if self.count[element] == 1 {
            self.position[element] = self.elements.len();
            self.elements.push(element);
        }
    }

    /// Decrements the multiplicity of the element, removing it from the set
    /// when the count reaches zero. Absent elements are left untouched.
    pub fn remove(&mut self, element: usize) {
        if self.count[element] == 0 {
            return;
        }

        self.count[element] -= 1;

        if self.count[element] == 0 {
            let position = self.position[element];
            let last = self.elements[self.elements.len() - 1];

            self.elements.swap_remove(position);
            if position < self.elements.len() {
                self.position[last] = position;
            }
        }
    }

    /// Removes the element like [SmartSet::remove], but the element must have
    /// a positive multiplicity.
    pub fn remove_strict(&mut self, element: usize) {
        debug_assert!(
            self.count[element] > 0,
            "Element {element} cannot be removed strictly since it is not in the set"
        );

        self.remove(element);
    }

    /// Replaces the contents by the given elements, each with multiplicity one.
    pub fn assign_flat(&mut self, elements: impl IntoIterator<Item = usize>) {
        self.clear();

        for element in elements {
            if !self.contains(element) {
                self.add(element);
            }
        }
    }

    pub fn clear(&mut self) {
        for &element in &self.elements {
            self.count[element] = 0;
        }

        self.elements.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.elements.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl fmt::Debug for SmartSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;

        let mut first = true;
        for element in self.iter() {
            if !first {
                write!(f, ", ")?;
            }

            write!(f, "{element}")?;
            first = false;
        }

        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_multiplicity() {
        let mut set = SmartSet::new(10);

        set.add(3);
        set.add(3);
        assert!(set.contains(3));
        assert_eq!(set.len(), 1);

        set.remove(3);
        assert!(set.contains(3), "One removal of a doubly added element keeps it in the set");

        set.remove(3);
        assert!(!set.contains(3));
        assert!(set.is_empty());

        // Removing an absent element is allowed and has no effect.
        set.remove(3);
        assert!(!set.contains(3));
    }

    #[test]
    fn test_iteration_visits_members_once() {
        let mut set = SmartSet::new(10);

        for element in [5, 1, 5, 7, 1] {
            set.add(element);
        }

        let mut elements: Vec<usize> = set.iter().collect();
        elements.sort_unstable();
        assert_eq!(elements, vec![1, 5, 7]);
    }

    #[test]
    fn test_assign_flat() {
        let mut set = SmartSet::new(10);
        set.add(2);
        set.add(2);

        set.assign_flat([1, 4, 4, 9]);

        assert!(!set.contains(2));
        assert_eq!(set.len(), 3);

        // Multiplicity after assign_flat is one for every member.
        set.remove(4);
        assert!(!set.contains(4));
    }
}
