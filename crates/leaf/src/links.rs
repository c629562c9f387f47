use std::collections::HashMap;
use std::hash::Hash;

/// Many-to-many links between two key spaces, queryable from either side.
///
/// Per-key link order is insertion order; removals keep the survivors' order.
#[derive(Debug, Clone)]
pub struct LinkSet<A, B> {
    forward: HashMap<A, Vec<B>>,
    backward: HashMap<B, Vec<A>>,
    links: usize,
}

impl<A, B> Default for LinkSet<A, B> {
    fn default() -> Self {
        Self {
            forward: HashMap::new(),
            backward: HashMap::new(),
            links: 0,
        }
    }
}

impl<A: Copy + Eq + Hash, B: Copy + Eq + Hash> LinkSet<A, B> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Callers guarantee the pair is not already linked.
    pub fn insert(&mut self, a: A, b: B) {
        debug_assert!(!self.contains(a, b), "duplicate link");
        self.forward.entry(a).or_default().push(b);
        self.backward.entry(b).or_default().push(a);
        self.links += 1;
    }

    pub fn contains(&self, a: A, b: B) -> bool {
        self.forward.get(&a).is_some_and(|bs| bs.contains(&b))
    }

    pub fn remove(&mut self, a: A, b: B) -> bool {
        let Some(bs) = self.forward.get_mut(&a) else {
            return false;
        };
        let before = bs.len();
        bs.retain(|x| *x != b);
        if bs.len() == before {
            return false;
        }
        if bs.is_empty() {
            self.forward.remove(&a);
        }
        if let Some(as_) = self.backward.get_mut(&b) {
            as_.retain(|x| *x != a);
            if as_.is_empty() {
                self.backward.remove(&b);
            }
        }
        self.links -= 1;
        true
    }

    /// Unlinks `a` from everything; returns what it was linked to.
    pub fn remove_a(&mut self, a: A) -> Vec<B> {
        let bs = self.forward.remove(&a).unwrap_or_default();
        for b in &bs {
            if let Some(as_) = self.backward.get_mut(b) {
                as_.retain(|x| *x != a);
                if as_.is_empty() {
                    self.backward.remove(b);
                }
            }
        }
        self.links -= bs.len();
        bs
    }

    /// Unlinks `b` from everything; returns what it was linked to.
    pub fn remove_b(&mut self, b: B) -> Vec<A> {
        let as_ = self.backward.remove(&b).unwrap_or_default();
        for a in &as_ {
            if let Some(bs) = self.forward.get_mut(a) {
                bs.retain(|x| *x != b);
                if bs.is_empty() {
                    self.forward.remove(a);
                }
            }
        }
        self.links -= as_.len();
        as_
    }

    pub fn of_a(&self, a: A) -> &[B] {
        self.forward.get(&a).map_or(&[], Vec::as_slice)
    }

    pub fn of_b(&self, b: B) -> &[A] {
        self.backward.get(&b).map_or(&[], Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.links
    }

    pub fn is_empty(&self) -> bool {
        self.links == 0
    }

    pub fn clear(&mut self) {
        self.forward.clear();
        self.backward.clear();
        self.links = 0;
    }
}
