use std::collections::HashMap;

use nalgebra::{DMatrix, DVector};

use super::petri_net_struct::{ArcType, Marking, PetriNet, PlaceID, TransitionID};

///
/// Stable indices of the places and transitions of a [`PetriNet`]
///
/// Both are ordered by name, then by id, so that repeated runs produce identical matrices.
#[derive(Debug, Clone)]
pub struct NetIndex {
    /// Places by row index
    pub places: Vec<PlaceID>,
    /// Transitions by column index
    pub transitions: Vec<TransitionID>,
    /// Place to row index
    pub place_index: HashMap<PlaceID, usize>,
    /// Transition to column index
    pub transition_index: HashMap<TransitionID, usize>,
}

impl NetIndex {
    /// Create the index dictionaries for a net
    pub fn new(net: &PetriNet) -> Self {
        let places: Vec<PlaceID> = net.sorted_places().into_iter().map(|p| p.id()).collect();
        let transitions: Vec<TransitionID> = net
            .sorted_transitions()
            .into_iter()
            .map(|t| t.id())
            .collect();
        Self {
            place_index: places.iter().enumerate().map(|(i, p)| (*p, i)).collect(),
            transition_index: transitions
                .iter()
                .enumerate()
                .map(|(i, t)| (*t, i))
                .collect(),
            places,
            transitions,
        }
    }

    /// Encode a marking as a vector with one entry per place
    ///
    /// Tokens in places outside the net are ignored.
    pub fn encode_marking(&self, m: &Marking) -> DVector<i64> {
        let mut result: DVector<i64> = DVector::zeros(self.places.len());
        for (p, n) in m.iter() {
            if let Some(i) = self.place_index.get(p) {
                result[*i] = *n as i64;
            }
        }
        result
    }
}

///
/// Incidence matrix `A` of a [`PetriNet`]
///
/// `A[p, t]` is the number of tokens `t` produces in `p` minus the number it consumes from `p`.
#[derive(Debug, Clone)]
pub struct IncidenceMatrix {
    /// |P| x |T| matrix
    pub a: DMatrix<i64>,
    /// Row and column indices
    pub index: NetIndex,
}

impl IncidenceMatrix {
    /// Compute the incidence matrix of a net
    pub fn new(net: &PetriNet) -> Self {
        let index = NetIndex::new(net);
        let mut a: DMatrix<i64> = DMatrix::zeros(index.places.len(), index.transitions.len());
        for arc in &net.arcs {
            match arc.from_to {
                ArcType::PlaceTransition(p, t) => {
                    if let (Some(row), Some(col)) = (
                        index.place_index.get(&PlaceID(p)),
                        index.transition_index.get(&TransitionID(t)),
                    ) {
                        a[(*row, *col)] -= arc.weight as i64;
                    }
                }
                ArcType::TransitionPlace(t, p) => {
                    if let (Some(row), Some(col)) = (
                        index.place_index.get(&PlaceID(p)),
                        index.transition_index.get(&TransitionID(t)),
                    ) {
                        a[(*row, *col)] += arc.weight as i64;
                    }
                }
            }
        }
        Self { a, index }
    }

    /// Encode a marking as a vector over the rows of `A`
    pub fn encode_marking(&self, m: &Marking) -> DVector<i64> {
        self.index.encode_marking(m)
    }
}

///
/// Consumption matrix `C` of a [`PetriNet`]
///
/// `C[p, t]` is minus the number of tokens `t` consumes from `p` (0 if `t` does not consume from `p`).
#[derive(Debug, Clone)]
pub struct ConsumptionMatrix {
    /// |P| x |T| matrix
    pub c: DMatrix<i64>,
    /// Row and column indices
    pub index: NetIndex,
}

impl ConsumptionMatrix {
    /// Compute the consumption matrix of a net
    pub fn new(net: &PetriNet) -> Self {
        let index = NetIndex::new(net);
        let mut c: DMatrix<i64> = DMatrix::zeros(index.places.len(), index.transitions.len());
        for arc in &net.arcs {
            if let ArcType::PlaceTransition(p, t) = arc.from_to {
                if let (Some(row), Some(col)) = (
                    index.place_index.get(&PlaceID(p)),
                    index.transition_index.get(&TransitionID(t)),
                ) {
                    c[(*row, *col)] -= arc.weight as i64;
                }
            }
        }
        Self { c, index }
    }

    /// Encode a marking as a vector over the rows of `C`
    pub fn encode_marking(&self, m: &Marking) -> DVector<i64> {
        self.index.encode_marking(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incidence_and_consumption() {
        let mut net = PetriNet::new();
        let p = net.add_place("p");
        let q = net.add_place("q");
        let t = net.add_transition("t", Some("t".into()));
        let u = net.add_transition("u", None);
        net.add_arc(ArcType::place_to_transition(p, t), Some(2))
            .unwrap();
        net.add_arc(ArcType::transition_to_place(t, q), None)
            .unwrap();
        net.add_arc(ArcType::place_to_transition(q, u), None)
            .unwrap();
        net.add_arc(ArcType::transition_to_place(u, q), None)
            .unwrap();

        let inc = IncidenceMatrix::new(&net);
        assert_eq!(inc.index.places, vec![p, q]);
        assert_eq!(inc.index.transitions, vec![t, u]);
        assert_eq!(inc.a, DMatrix::from_row_slice(2, 2, &[-2, 0, 1, 0]));

        let cons = ConsumptionMatrix::new(&net);
        assert_eq!(cons.c, DMatrix::from_row_slice(2, 2, &[-2, 0, 0, -1]));

        let m: Marking = [(q, 3)].into_iter().collect();
        assert_eq!(inc.encode_marking(&m), DVector::from_vec(vec![0, 3]));
    }

    #[test]
    fn index_is_stable() {
        let mut net = PetriNet::new();
        for name in ["c", "a", "b"] {
            net.add_place(name);
        }
        let first = NetIndex::new(&net);
        let second = NetIndex::new(&net);
        assert_eq!(first.places, second.places);
        let names: Vec<&str> = first
            .places
            .iter()
            .map(|p| net.place(p).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
