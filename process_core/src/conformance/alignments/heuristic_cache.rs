use std::collections::HashMap;

use log::trace;

use crate::conformance::marking_equation::MarkingEquationSolver;

use super::search_tuple::PackedMarking;

///
/// Heuristic values shared between the states of one alignment search
///
/// Search states are identified by their model-side marking together with the position in the
/// trace. Two caches are kept:
///
/// * exact values (`h`, `x`) per state, obtained from solves and from replaying their solutions,
/// * the cost of the cheapest (relaxed) run that fires a given transition at least once, which
///   bounds the remaining cost of every state reached by that transition.
#[derive(Debug)]
pub struct HeuristicCache<'a> {
    exact: HashMap<(PackedMarking, usize), (u64, Vec<f64>)>,
    min_cost_solver: MarkingEquationSolver<'a>,
    min_total_cost_given_trans: Vec<Option<Option<u64>>>,
    lp_solved: usize,
}

impl<'a> HeuristicCache<'a> {
    /// Create an empty cache
    ///
    /// `min_cost_solver` has to be set up at the initial marking of the search.
    pub fn new(min_cost_solver: MarkingEquationSolver<'a>, n_transitions: usize) -> Self {
        Self {
            exact: HashMap::new(),
            min_cost_solver,
            min_total_cost_given_trans: vec![None; n_transitions],
            lp_solved: 0,
        }
    }

    /// Cached heuristic value of a state
    pub fn lookup(&self, model_marking: &PackedMarking, trace_index: usize) -> Option<&(u64, Vec<f64>)> {
        self.exact.get(&(model_marking.clone(), trace_index))
    }

    /// Store a heuristic value, keeping the larger one if the state is already cached
    pub fn insert(&mut self, model_marking: PackedMarking, trace_index: usize, h: u64, x: Vec<f64>) {
        match self.exact.get_mut(&(model_marking.clone(), trace_index)) {
            Some(entry) if entry.0 >= h => {}
            Some(entry) => *entry = (h, x),
            None => {
                self.exact.insert((model_marking, trace_index), (h, x));
            }
        }
    }

    ///
    /// Minimal cost of a run from the initial to the final marking that fires transition
    /// (column) `t` at least once
    ///
    /// Solved on first request. `None` if no such (relaxed) run exists.
    pub fn min_total_cost(&mut self, t: usize) -> Option<u64> {
        if let Some(known) = self.min_total_cost_given_trans.get(t).copied().flatten() {
            return known;
        }
        self.lp_solved += 1;
        let value = self
            .min_cost_solver
            .solve_with_min_firing(t)
            .map(|sol| sol.h as u64);
        trace!("minimal cost given column {}: {:?}", t, value);
        if let Some(slot) = self.min_total_cost_given_trans.get_mut(t) {
            *slot = Some(value);
        }
        value
    }

    /// Number of linear programs solved for the minimal costs
    pub fn lp_solved(&self) -> usize {
        self.lp_solved
    }

    /// Number of cached states
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    /// Whether no state is cached
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}
