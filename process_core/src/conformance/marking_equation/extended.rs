//! Extended marking equation
//!
//! The remaining trace is cut at split points `s₁ < … < s_{k−1}`. Segment `i` is described
//! by a firing count vector `xᵢ`; the move consuming event `sᵢ` that starts segment `i + 1`
//! by `yᵢ`. Each `yᵢ` fires exactly one transition (a log or synchronous move of event `sᵢ`),
//! and that transition has to be enabled by the marking reached after the preceding segments:
//!
//! ```text
//! A·(Σ xᵢ + Σ yᵢ)                          = fm − m
//! m + A·(x₁ + … + xᵢ + y₁ + … + yᵢ₋₁) + C·yᵢ ≥ 0     (i = 1..k−1)
//! Σ yᵢ                                      = 1       (i = 1..k−1)
//! ```
//!
//! Any remaining run of the synchronous product satisfies these constraints, so the optimum
//! is a lower bound on the remaining alignment cost that is at least as tight as the
//! plain marking equation.
use std::collections::BTreeSet;

use log::trace;
use nalgebra::DVector;

use crate::conformance::alignments::cost_function::CostFunction;
use crate::lp::{LpProblem, SparseRow};
use crate::petri_net::incidence::{ConsumptionMatrix, IncidenceMatrix};
use crate::petri_net::petri_net_struct::{
    Marking, NetSide, PetriNet, PROP_EVENT_INDEX, PROP_NET_SIDE, PROP_TRACE_INDEX,
};

use super::firing_sequence::FiringSequence;
use super::{cost_vector, incidence_rows, HeuristicSolution, HeuristicSolver};

/// Default maximal number of segments the trace is cut into
pub const DEFAULT_EME_MAX_K: usize = 4;

/// Evenly spaced split points for a trace of length `trace_len`, cutting it into at most `max_k` segments
pub fn default_split_points(trace_len: usize, max_k: usize) -> Vec<usize> {
    let k = max_k.min(trace_len);
    if k <= 1 {
        return Vec::new();
    }
    (1..k)
        .map(|i| i * trace_len / k)
        .filter(|s| *s >= 1 && *s < trace_len)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

///
/// Extended marking equation solver for a synchronous product
///
#[derive(Debug, Clone)]
pub struct ExtendedMarkingEquationSolver<'a> {
    net: &'a PetriNet,
    incidence: IncidenceMatrix,
    consumption_rows: Vec<SparseRow>,
    a_rows: Vec<SparseRow>,
    costs: Vec<f64>,
    /// Trace event consumed by each column (log and synchronous moves)
    event_of_column: Vec<Option<usize>>,
    /// Trace position of each row (trace net places)
    trace_index_of_row: Vec<Option<usize>>,
    trace_len: usize,
    split_points: BTreeSet<usize>,
    fm: Marking,
    fm_vec: DVector<i64>,
    current: DVector<i64>,
    integer: bool,
}

impl<'a> ExtendedMarkingEquationSolver<'a> {
    ///
    /// Build the solver for a synchronous product of a trace of length `trace_len`
    ///
    /// Without explicit `split_points`, evenly spaced ones are chosen so that the trace is
    /// cut into at most `max_k` segments.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        trace_len: usize,
        sync_net: &'a PetriNet,
        im: &Marking,
        fm: &Marking,
        cost_function: Option<&CostFunction>,
        split_points: Option<Vec<usize>>,
        max_k: usize,
        integer: bool,
    ) -> Self {
        let incidence = IncidenceMatrix::new(sync_net);
        let consumption = ConsumptionMatrix::new(sync_net);
        let costs = cost_vector(sync_net, &incidence, cost_function);
        let a_rows = incidence_rows(&incidence);
        let consumption_rows = consumption
            .c
            .row_iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(_, v)| **v != 0)
                    .map(|(j, v)| (j, *v as f64))
                    .collect()
            })
            .collect();
        let event_of_column = incidence
            .index
            .transitions
            .iter()
            .map(|t| {
                sync_net
                    .transition(t)
                    .and_then(|tr| tr.properties.get(PROP_EVENT_INDEX))
                    .and_then(|p| p.as_index())
            })
            .collect();
        let trace_index_of_row = incidence
            .index
            .places
            .iter()
            .map(|p| {
                let place = sync_net.place(p)?;
                let side = place.properties.get(PROP_NET_SIDE).and_then(|s| s.as_side());
                if side == Some(NetSide::Model) {
                    return None;
                }
                place
                    .properties
                    .get(PROP_TRACE_INDEX)
                    .and_then(|i| i.as_index())
            })
            .collect();
        let split_points = split_points
            .unwrap_or_else(|| default_split_points(trace_len, max_k))
            .into_iter()
            .filter(|s| *s < trace_len)
            .collect();
        let fm_vec = incidence.encode_marking(fm);
        let current = incidence.encode_marking(im);
        Self {
            net: sync_net,
            incidence,
            consumption_rows,
            a_rows,
            costs,
            event_of_column,
            trace_index_of_row,
            trace_len,
            split_points,
            fm: fm.clone(),
            fm_vec,
            current,
            integer,
        }
    }

    /// Currently used split points
    pub fn split_points(&self) -> Vec<usize> {
        self.split_points.iter().copied().collect()
    }

    /// Add a split point (ignored if outside of the trace)
    pub fn add_split_point(&mut self, s: usize) -> bool {
        s < self.trace_len && self.split_points.insert(s)
    }

    /// Position of the trace token in the current marking
    fn current_trace_index(&self) -> usize {
        self.trace_index_of_row
            .iter()
            .zip(self.current.iter())
            .find_map(|(idx, n)| if *n > 0 { *idx } else { None })
            .unwrap_or(self.trace_len)
    }

    fn problem(&self) -> LpProblem {
        let idx = self.current_trace_index();
        let splits: Vec<usize> = self.split_points.range(idx..).copied().collect();
        let n = self.costs.len();
        let k = splits.len() + 1;

        let mut c: Vec<f64> = Vec::with_capacity(k * n);
        for _ in 0..k {
            c.extend_from_slice(&self.costs);
        }
        // y variables only exist for the moves of the split event
        let mut y_vars: Vec<Vec<(usize, usize)>> = Vec::with_capacity(splits.len());
        for s in &splits {
            let vars = (0..n)
                .filter(|j| self.event_of_column[*j] == Some(*s))
                .map(|j| {
                    c.push(self.costs[j]);
                    (j, c.len() - 1)
                })
                .collect();
            y_vars.push(vars);
        }

        let a = &self.incidence.a;
        let mut a_eq: Vec<SparseRow> = Vec::new();
        let mut b_eq: Vec<f64> = Vec::new();
        let mut a_ub: Vec<SparseRow> = Vec::new();
        let mut b_ub: Vec<f64> = Vec::new();

        for (p, row) in self.a_rows.iter().enumerate() {
            let mut eq_row: SparseRow = Vec::new();
            for seg in 0..k {
                eq_row.extend(row.iter().map(|(j, v)| (seg * n + j, *v)));
            }
            for vars in &y_vars {
                eq_row.extend(
                    vars.iter()
                        .filter(|(j, _)| a[(p, *j)] != 0)
                        .map(|(j, var)| (*var, a[(p, *j)] as f64)),
                );
            }
            a_eq.push(eq_row);
            b_eq.push((self.fm_vec[p] - self.current[p]) as f64);
        }

        for (i, vars) in y_vars.iter().enumerate() {
            for (p, row) in self.a_rows.iter().enumerate() {
                let mut ub_row: SparseRow = Vec::new();
                for seg in 0..=i {
                    ub_row.extend(row.iter().map(|(j, v)| (seg * n + j, -*v)));
                }
                for earlier in &y_vars[..i] {
                    ub_row.extend(
                        earlier
                            .iter()
                            .filter(|(j, _)| a[(p, *j)] != 0)
                            .map(|(j, var)| (*var, -(a[(p, *j)] as f64))),
                    );
                }
                let consumed = &self.consumption_rows[p];
                ub_row.extend(vars.iter().filter_map(|(j, var)| {
                    consumed
                        .iter()
                        .find(|(cj, _)| cj == j)
                        .map(|(_, v)| (*var, -*v))
                }));
                a_ub.push(ub_row);
                b_ub.push(self.current[p] as f64);
            }
            a_eq.push(vars.iter().map(|(_, var)| (*var, 1.0)).collect());
            b_eq.push(1.0);
        }

        LpProblem {
            c,
            a_ub,
            b_ub,
            a_eq,
            b_eq,
            integer: self.integer,
        }
    }
}

impl HeuristicSolver for ExtendedMarkingEquationSolver<'_> {
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
        let sol = self.problem().solve()?;
        let n = self.costs.len();
        let idx = self.current_trace_index();
        let splits: Vec<usize> = self.split_points.range(idx..).copied().collect();
        let segments = n * (splits.len() + 1);

        // sum the per-segment counts, then add the split moves
        let mut x = vec![0.0; n];
        for (i, v) in sol.x()[..segments].iter().enumerate() {
            x[i % n] += v;
        }
        let mut var = segments;
        for s in &splits {
            for j in 0..n {
                if self.event_of_column[j] == Some(*s) {
                    x[j] += sol.x()[var];
                    var += 1;
                }
            }
        }
        trace!(
            "EME solved with {} split points, objective {}",
            splits.len(),
            sol.primal()
        );
        Some(HeuristicSolution {
            h: HeuristicSolution::from_lp(sol).h,
            x,
        })
    }

    /// Add a split point at the first trace event the replay of a solution could not explain
    fn refine(&mut self, replay: &FiringSequence) -> bool {
        if replay.reaches_fm {
            return false;
        }
        let next = self.current_trace_index() + replay.explained_events;
        self.add_split_point(next)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::conformance::alignments::cost_function::construct_standard_cost_function;
    use crate::conformance::marking_equation::MarkingEquationSolver;
    use crate::petri_net::petri_net_struct::ArcType;
    use crate::petri_net::sync_product::construct_sync_product;
    use crate::petri_net::trace_net::construct_trace_net_from_activities;

    /// Model: a -> (b | c) -> d with a silent skip over b|c
    fn model() -> (PetriNet, Marking, Marking) {
        let mut net = PetriNet::with_name("model");
        let p: Vec<_> = (0..4).map(|i| net.add_place(format!("p{}", i))).collect();
        let a = net.add_transition("a", Some("a".into()));
        let b = net.add_transition("b", Some("b".into()));
        let c = net.add_transition("c", Some("c".into()));
        let d = net.add_transition("d", Some("d".into()));
        for (from, t, to) in [(0, a, 1), (1, b, 2), (1, c, 2), (2, d, 3)] {
            net.add_arc(ArcType::place_to_transition(p[from], t), None)
                .unwrap();
            net.add_arc(ArcType::transition_to_place(t, p[to]), None)
                .unwrap();
        }
        let im = [(p[0], 1)].into_iter().collect();
        let fm = [(p[3], 1)].into_iter().collect();
        (net, im, fm)
    }

    #[test]
    fn split_points_are_evenly_spaced() {
        assert_eq!(default_split_points(0, 4), Vec::<usize>::new());
        assert_eq!(default_split_points(1, 4), Vec::<usize>::new());
        assert_eq!(default_split_points(2, 4), vec![1]);
        assert_eq!(default_split_points(8, 4), vec![2, 4, 6]);
        assert_eq!(default_split_points(10, 3), vec![3, 6]);
    }

    #[test]
    fn eme_dominates_me() {
        let (mn, mim, mfm) = model();
        for trace in [
            vec!["a", "b", "d"],
            vec!["d", "b", "a"],
            vec!["a", "d", "c", "b"],
            vec!["b", "b", "b", "a"],
        ] {
            let (tn, tim, tfm) = construct_trace_net_from_activities(&trace).unwrap();
            let (sn, im, fm) = construct_sync_product(&tn, &tim, &tfm, &mn, &mim, &mfm).unwrap();
            let costs = construct_standard_cost_function(&sn);
            let mut me = MarkingEquationSolver::build(&sn, &im, &fm, Some(&costs), false);
            let mut eme = ExtendedMarkingEquationSolver::build(
                trace.len(),
                &sn,
                &im,
                &fm,
                Some(&costs),
                None,
                DEFAULT_EME_MAX_K,
                false,
            );
            let h_me = me.solve().unwrap().h;
            let sol = eme.solve().unwrap();
            assert!(sol.h >= h_me, "{:?}: {} < {}", trace, sol.h, h_me);
            assert_eq!(sol.x.len(), sn.transitions.len());
        }
    }

    #[test]
    fn eme_sees_reordering() {
        // the marking equation cannot see that d before a is out of order
        let (mn, mim, mfm) = model();
        let trace = ["d", "b", "a"];
        let (tn, tim, tfm) = construct_trace_net_from_activities(&trace).unwrap();
        let (sn, im, fm) = construct_sync_product(&tn, &tim, &tfm, &mn, &mim, &mfm).unwrap();
        let mut me = MarkingEquationSolver::build(&sn, &im, &fm, None, false);
        let mut eme = ExtendedMarkingEquationSolver::build(
            trace.len(),
            &sn,
            &im,
            &fm,
            None,
            Some(vec![1, 2]),
            DEFAULT_EME_MAX_K,
            false,
        );
        assert_eq!(me.solve().unwrap().h, 0.0);
        assert!(eme.solve().unwrap().h > 0.0);
    }
}
