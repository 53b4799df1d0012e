use std::cmp::Ordering;

/// Marking as sorted `(place index, tokens)` pairs (zero counts omitted)
pub type PackedMarking = Vec<(usize, u64)>;

///
/// State in the open set of the alignment search
///
/// Ordered such that a [`std::collections::BinaryHeap`] pops the tuple with the lowest `f`
/// first; ties prefer trusted heuristics, then lower `h`, then earlier insertion.
#[derive(Debug, Clone)]
pub struct SearchTuple {
    /// Estimated total cost `g + h`
    pub f: u64,
    /// Cost from the initial marking
    pub g: u64,
    /// Heuristic estimate of the remaining cost
    pub h: u64,
    /// Reached marking
    pub m: PackedMarking,
    /// Index of the search node (parent and fired transition) in the search arena
    pub node: usize,
    /// Firing count vector the heuristic was derived from
    pub x: Vec<f64>,
    /// Whether `h` stems from an actual solve (and not just from derivation)
    pub trusted: bool,
    /// Insertion counter
    pub counter: u64,
}

impl SearchTuple {
    fn key(&self) -> (u64, bool, u64, u64) {
        (self.f, !self.trusted, self.h, self.counter)
    }
}

impl PartialEq for SearchTuple {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for SearchTuple {}

impl PartialOrd for SearchTuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SearchTuple {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap
        other.key().cmp(&self.key())
    }
}

/// Parent pointer and fired transition (column index) of a search state
#[derive(Debug, Clone, Copy)]
pub struct SearchNode {
    /// Index of the parent node
    pub parent: Option<usize>,
    /// Transition fired to reach this node
    pub transition: Option<usize>,
}

///
/// Derive the heuristic of a successor from its parent without solving
///
/// Firing `t` (cost `cost`) uses up one firing of `t` in the parent's solution `x`.
/// The result is trusted if the remaining vector is still (numerically) non-negative.
pub fn derive_heuristic(x: &[f64], t: usize, h: u64, cost: u64) -> (u64, Vec<f64>, bool) {
    let mut x_new = x.to_vec();
    if let Some(v) = x_new.get_mut(t) {
        *v -= 1.0;
    }
    let trusted = x_new.iter().all(|v| *v >= -0.001);
    (h.saturating_sub(cost), x_new, trusted)
}
