//! Marking equation heuristics for alignments
//!
//! The marking equation `A·x = fm − m`, `x ≥ 0` is satisfied by the firing count vector of
//! every firing sequence leading from `m` to `fm`. Its cost minimum `cᵀx` therefore
//! underestimates the cost of reaching `fm` from `m`.

/// Extended marking equation (split points over the trace)
pub mod extended;
/// Replay of firing count vectors
pub mod firing_sequence;

use log::trace;
use nalgebra::DVector;

use crate::conformance::alignments::cost_function::{
    construct_standard_cost_function, CostFunction,
};
use crate::lp::{LpProblem, LpSolution, SparseRow};
use crate::petri_net::incidence::IncidenceMatrix;
use crate::petri_net::petri_net_struct::{Marking, PetriNet};

use self::firing_sequence::{candidates_from_solution, search_path_among_sol, FiringSequence};

/// Tolerance used when rounding LP objectives up to integral heuristic values
const ROUNDING_EPS: f64 = 1e-6;

/// Heuristic value together with the firing count vector it was obtained from
#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicSolution {
    /// Lower bound on the remaining cost (objective rounded up to the next integer)
    pub h: f64,
    /// Firing count per transition (indexed like the incidence matrix columns)
    pub x: Vec<f64>,
}

impl HeuristicSolution {
    pub(crate) fn from_lp(sol: LpSolution) -> Self {
        let h = (sol.primal() - ROUNDING_EPS).ceil().max(0.0);
        Self {
            h,
            x: sol.into_x(),
        }
    }
}

///
/// Common interface of the marking equation based heuristics
///
/// The alignment search is generic over this trait.
pub trait HeuristicSolver {
    /// Incidence matrix (and thereby the row/column order) the solver works on
    fn incidence(&self) -> &IncidenceMatrix;
    /// The net the solver was built for
    fn net(&self) -> &PetriNet;
    /// The final marking
    fn final_marking(&self) -> &Marking;
    /// The marking the next [`HeuristicSolver::solve`] starts from
    fn current_marking(&self) -> Marking;
    /// Replace the marking the heuristic is computed from (encoded over the incidence rows)
    fn change_initial_vector(&mut self, m: &DVector<i64>);
    /// Solve, returning `None` if the program is infeasible
    fn solve(&mut self) -> Option<HeuristicSolution>;

    /// Tighten the heuristic after the replay of a solution got stuck
    ///
    /// Returns `true` if the solver changed, i.e., a re-solve may yield a better bound.
    fn refine(&mut self, _replay: &FiringSequence) -> bool {
        false
    }

    /// Replace the marking the heuristic is computed from
    fn change_initial(&mut self, m: &Marking) {
        let v = self.incidence().encode_marking(m);
        self.change_initial_vector(&v);
    }

    /// Replay the firing count vector `x` from the current marking
    ///
    /// See [`search_path_among_sol`].
    fn firing_sequence(&self, x: &[f64]) -> FiringSequence {
        let candidates = candidates_from_solution(&self.incidence().index.transitions, x);
        search_path_among_sol(
            self.net(),
            &self.current_marking(),
            self.final_marking(),
            &candidates,
        )
    }
}

/// Cost vector over the incidence columns (missing entries fall back to the standard costs)
pub(crate) fn cost_vector(
    net: &PetriNet,
    incidence: &IncidenceMatrix,
    cost_function: Option<&CostFunction>,
) -> Vec<f64> {
    let standard = construct_standard_cost_function(net);
    incidence
        .index
        .transitions
        .iter()
        .map(|t| {
            cost_function
                .and_then(|c| c.get(t))
                .or_else(|| standard.get(t))
                .copied()
                .unwrap_or(0) as f64
        })
        .collect()
}

/// Sparse rows of the incidence matrix
pub(crate) fn incidence_rows(incidence: &IncidenceMatrix) -> Vec<SparseRow> {
    incidence
        .a
        .row_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .filter(|(_, v)| **v != 0)
                .map(|(j, v)| (j, *v as f64))
                .collect()
        })
        .collect()
}

///
/// Marking equation solver
///
/// Precomputes `A`, `c` and the encoded final marking; [`HeuristicSolver::change_initial`]
/// only updates the right-hand side `fm − m`.
#[derive(Debug, Clone)]
pub struct MarkingEquationSolver<'a> {
    net: &'a PetriNet,
    incidence: IncidenceMatrix,
    a_rows: Vec<SparseRow>,
    costs: Vec<f64>,
    fm: Marking,
    fm_vec: DVector<i64>,
    current: DVector<i64>,
    integer: bool,
}

impl<'a> MarkingEquationSolver<'a> {
    /// Build the solver for `net` with initial marking `im` and final marking `fm`
    ///
    /// Without a cost function the standard costs are used. `integer` selects the ILP
    /// instead of its LP relaxation.
    pub fn build(
        net: &'a PetriNet,
        im: &Marking,
        fm: &Marking,
        cost_function: Option<&CostFunction>,
        integer: bool,
    ) -> Self {
        let incidence = IncidenceMatrix::new(net);
        Self::with_incidence(net, incidence, im, fm, cost_function, integer)
    }

    pub(crate) fn with_incidence(
        net: &'a PetriNet,
        incidence: IncidenceMatrix,
        im: &Marking,
        fm: &Marking,
        cost_function: Option<&CostFunction>,
        integer: bool,
    ) -> Self {
        let costs = cost_vector(net, &incidence, cost_function);
        let a_rows = incidence_rows(&incidence);
        let fm_vec = incidence.encode_marking(fm);
        let current = incidence.encode_marking(im);
        Self {
            net,
            incidence,
            a_rows,
            costs,
            fm: fm.clone(),
            fm_vec,
            current,
            integer,
        }
    }

    /// Cost vector (indexed like the incidence columns)
    pub fn costs(&self) -> &[f64] {
        &self.costs
    }

    fn problem(&self) -> LpProblem {
        let b_eq: Vec<f64> = (&self.fm_vec - &self.current)
            .iter()
            .map(|v| *v as f64)
            .collect();
        LpProblem {
            c: self.costs.clone(),
            a_ub: Vec::new(),
            b_ub: Vec::new(),
            a_eq: self.a_rows.clone(),
            b_eq,
            integer: self.integer,
        }
    }

    ///
    /// Solve the marking equation with the additional requirement that transition
    /// (column) `t` fires at least once
    ///
    /// Its value bounds the total cost of every run from the current marking that uses `t`.
    pub fn solve_with_min_firing(&mut self, t: usize) -> Option<HeuristicSolution> {
        let mut problem = self.problem();
        problem.a_ub.push(vec![(t, -1.0)]);
        problem.b_ub.push(-1.0);
        let sol = problem.solve().map(HeuristicSolution::from_lp);
        trace!("min-firing LP for column {}: {:?}", t, sol.as_ref().map(|s| s.h));
        sol
    }
}

impl HeuristicSolver for MarkingEquationSolver<'_> {
    fn incidence(&self) -> &IncidenceMatrix {
        &self.incidence
    }

    fn net(&self) -> &PetriNet {
        self.net
    }

    fn final_marking(&self) -> &Marking {
        &self.fm
    }

    fn current_marking(&self) -> Marking {
        self.incidence
            .index
            .places
            .iter()
            .zip(self.current.iter())
            .map(|(p, n)| (*p, (*n).max(0) as u64))
            .collect()
    }

    fn change_initial_vector(&mut self, m: &DVector<i64>) {
        self.current = m.clone();
    }

    fn solve(&mut self) -> Option<HeuristicSolution> {
        self.problem().solve().map(HeuristicSolution::from_lp)
    }
}
