//! A* search over the reachability graph of a synchronous product
//!
//! States are markings of the synchronous product. Heuristic values come from a
//! [`HeuristicSolver`] and are propagated to successors without solving
//! (see [`derive_heuristic`]); a state whose derived value is not backed by a solution is
//! re-solved before it is expanded.
use std::collections::{BinaryHeap, HashSet};
use std::time::Instant;

use log::{debug, trace};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::conformance::marking_equation::extended::ExtendedMarkingEquationSolver;
use crate::conformance::marking_equation::{HeuristicSolver, MarkingEquationSolver};
use crate::lp::MAX_ALLOWED_HEURISTICS;
use crate::petri_net::incidence::NetIndex;
use crate::petri_net::petri_net_struct::{
    Marking, NetSide, PetriNet, PlaceID, TransitionID, PROP_NET_SIDE, PROP_TRACE_INDEX,
};

use super::cost_function::{construct_standard_cost_function, CostFunction};
use super::heuristic_cache::HeuristicCache;
use super::search_tuple::{derive_heuristic, PackedMarking, SearchNode, SearchTuple};
use super::{AlignmentConfig, HeuristicVariant};

/// Counters of an alignment search
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchStatistics {
    /// States expanded
    pub visited_states: usize,
    /// States pushed to the open set
    pub queued_states: usize,
    /// Enabled transitions considered
    pub traversed_arcs: usize,
    /// Linear programs solved
    pub lp_solved: usize,
}

/// Result of an alignment search
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// Cheapest firing sequence from the initial to the final marking
    Found {
        /// Fired transitions
        path: Vec<TransitionID>,
        /// Total cost of `path`
        cost: u64,
        /// Counters
        statistics: SearchStatistics,
    },
    /// The final marking is not reachable
    Exhausted(SearchStatistics),
    /// The deadline passed before the search finished
    Timeout(SearchStatistics),
}

///
/// Index-based view on a net used during the search
///
/// Markings are stored as [`PackedMarking`]s over the row order of `index`.
struct CompiledNet {
    index: NetIndex,
    pre: Vec<Vec<(usize, u64)>>,
    post: Vec<Vec<(usize, u64)>>,
    /// Transitions consuming from each place
    consumers: Vec<Vec<usize>>,
    /// Transitions with an empty preset
    always_enabled: Vec<usize>,
    costs: Vec<u64>,
    degenerate: Vec<bool>,
    model_place: Vec<bool>,
    trace_index: Vec<Option<usize>>,
}

impl CompiledNet {
    fn new(net: &PetriNet, index: NetIndex, cost_function: &CostFunction) -> Self {
        let n_places = index.places.len();
        let standard = construct_standard_cost_function(net);
        let mut pre = Vec::with_capacity(index.transitions.len());
        let mut post = Vec::with_capacity(index.transitions.len());
        let mut consumers = vec![Vec::new(); n_places];
        let mut always_enabled = Vec::new();
        let mut costs = Vec::with_capacity(index.transitions.len());
        let mut degenerate = Vec::with_capacity(index.transitions.len());

        for (col, t) in index.transitions.iter().enumerate() {
            let to_rows = |arcs: Vec<(PlaceID, u32)>| {
                let mut rows: Vec<(usize, u64)> = arcs
                    .into_iter()
                    .filter_map(|(p, w)| index.place_index.get(&p).map(|r| (*r, w as u64)))
                    .collect();
                rows.sort();
                rows
            };
            let t_pre = to_rows(net.weighted_preset_of_transition(*t));
            if t_pre.is_empty() {
                always_enabled.push(col);
            }
            for (row, _) in &t_pre {
                consumers[*row].push(col);
            }
            pre.push(t_pre);
            post.push(to_rows(net.weighted_postset_of_transition(*t)));
            costs.push(
                cost_function
                    .get(t)
                    .or_else(|| standard.get(t))
                    .copied()
                    .unwrap_or(0),
            );
            degenerate.push(
                net.transition(t)
                    .and_then(|tr| tr.sync_move())
                    .is_some_and(|m| m.is_degenerate()),
            );
        }

        let mut model_place = Vec::with_capacity(n_places);
        let mut trace_index = Vec::with_capacity(n_places);
        for p in &index.places {
            let place = net.place(p);
            let side = place
                .and_then(|pl| pl.properties.get(PROP_NET_SIDE))
                .and_then(|s| s.as_side());
            let position = place
                .and_then(|pl| pl.properties.get(PROP_TRACE_INDEX))
                .and_then(|i| i.as_index());
            // places of a plain net (no side) belong to the model
            model_place.push(side != Some(NetSide::Trace));
            trace_index.push(if side == Some(NetSide::Trace) {
                position
            } else {
                None
            });
        }

        Self {
            index,
            pre,
            post,
            consumers,
            always_enabled,
            costs,
            degenerate,
            model_place,
            trace_index,
        }
    }

    fn pack(&self, m: &Marking) -> PackedMarking {
        let mut packed: PackedMarking = m
            .iter()
            .filter_map(|(p, n)| self.index.place_index.get(p).map(|r| (*r, *n)))
            .filter(|(_, n)| *n > 0)
            .collect();
        packed.sort();
        packed
    }

    fn tokens(m: &PackedMarking, row: usize) -> u64 {
        m.binary_search_by_key(&row, |(r, _)| *r)
            .map(|i| m[i].1)
            .unwrap_or(0)
    }

    fn to_vector(&self, m: &PackedMarking) -> DVector<i64> {
        let mut v: DVector<i64> = DVector::zeros(self.index.places.len());
        for (row, n) in m {
            v[*row] = *n as i64;
        }
        v
    }

    fn is_enabled(&self, m: &PackedMarking, t: usize) -> bool {
        self.pre[t]
            .iter()
            .all(|(row, w)| Self::tokens(m, *row) >= *w)
    }

    /// Enabled transitions, in column order
    fn enabled(&self, m: &PackedMarking) -> Vec<usize> {
        let mut candidates: Vec<usize> = m
            .iter()
            .flat_map(|(row, _)| self.consumers[*row].iter().copied())
            .chain(self.always_enabled.iter().copied())
            .collect();
        candidates.sort_unstable();
        candidates.dedup();
        candidates.retain(|t| self.is_enabled(m, *t));
        candidates
    }

    /// Fire `t` (assumed to be enabled)
    fn fire(&self, m: &PackedMarking, t: usize) -> PackedMarking {
        let mut result = m.clone();
        for (row, w) in &self.pre[t] {
            if let Ok(i) = result.binary_search_by_key(row, |(r, _)| *r) {
                result[i].1 = result[i].1.saturating_sub(*w);
                if result[i].1 == 0 {
                    result.remove(i);
                }
            }
        }
        for (row, w) in &self.post[t] {
            match result.binary_search_by_key(row, |(r, _)| *r) {
                Ok(i) => result[i].1 += *w,
                Err(i) => result.insert(i, (*row, *w)),
            }
        }
        result
    }

    /// Cache key: model-side marking and position in the trace
    fn cache_key(&self, m: &PackedMarking) -> (PackedMarking, usize) {
        let model = m
            .iter()
            .filter(|(row, _)| self.model_place[*row])
            .copied()
            .collect();
        let position = m
            .iter()
            .find_map(|(row, _)| self.trace_index[*row])
            .unwrap_or(0);
        (model, position)
    }
}

/// Heuristic value of an objective (values beyond [`MAX_ALLOWED_HEURISTICS`] saturate)
fn to_heuristic(h: f64) -> u64 {
    if !h.is_finite() || h > MAX_ALLOWED_HEURISTICS {
        u64::MAX
    } else {
        h.max(0.0) as u64
    }
}

///
/// Solve the heuristic at marking `m`
///
/// With `replay`, the solution is replayed: a solver that can refine itself (EME) is refined
/// and re-solved once if the replay gets stuck, and the cache (if any) receives the values of
/// all markings visited by the replay.
fn solve_at<S: HeuristicSolver>(
    solver: &mut S,
    net: &CompiledNet,
    m: &PackedMarking,
    cache: &mut Option<HeuristicCache<'_>>,
    replay: bool,
    statistics: &mut SearchStatistics,
) -> Option<(u64, Vec<f64>)> {
    solver.change_initial_vector(&net.to_vector(m));
    statistics.lp_solved += 1;
    let mut sol = solver.solve()?;
    if !replay {
        return Some((to_heuristic(sol.h), sol.x));
    }

    let mut sequence = solver.firing_sequence(&sol.x);
    if solver.refine(&sequence) {
        statistics.lp_solved += 1;
        match solver.solve() {
            Some(refined) if refined.h >= sol.h => {
                trace!("refined heuristic from {} to {}", sol.h, refined.h);
                sol = refined;
                sequence = solver.firing_sequence(&sol.x);
            }
            _ => {}
        }
    }

    let h = to_heuristic(sol.h);
    if let Some(cache) = cache.as_mut() {
        let (mm, idx) = net.cache_key(m);
        cache.insert(mm, idx, h, sol.x.clone());
        // every marking on the replayed prefix inherits the rest of the solution
        let mut marking = m.clone();
        let mut rest_h = h;
        let mut rest_x = sol.x.clone();
        for t in &sequence.sequence {
            let Some(col) = net.index.transition_index.get(t).copied() else {
                break;
            };
            marking = net.fire(&marking, col);
            rest_h = rest_h.saturating_sub(net.costs[col]);
            rest_x[col] -= 1.0;
            let (mm, idx) = net.cache_key(&marking);
            cache.insert(mm, idx, rest_h, rest_x.clone());
        }
    }
    Some((h, sol.x))
}

fn with_statistics(mut statistics: SearchStatistics, cache: &Option<HeuristicCache<'_>>) -> SearchStatistics {
    statistics.lp_solved += cache.as_ref().map_or(0, |c| c.lp_solved());
    statistics
}

fn reconstruct(arena: &[SearchNode], node: usize) -> Vec<usize> {
    let mut path = Vec::new();
    let mut current = Some(node);
    while let Some(i) = current {
        if let Some(t) = arena[i].transition {
            path.push(t);
        }
        current = arena[i].parent;
    }
    path.reverse();
    path
}

///
/// Replace the derived heuristic of `curr` by a solved (or cached) one
///
/// `None` if the solver finds the final marking unreachable from `curr.m`.
fn refresh<S: HeuristicSolver>(
    mut curr: SearchTuple,
    net: &CompiledNet,
    solver: Option<&mut S>,
    cache: &mut Option<HeuristicCache<'_>>,
    replay: bool,
    statistics: &mut SearchStatistics,
) -> Option<SearchTuple> {
    let cached = cache.as_ref().and_then(|c| {
        let (mm, idx) = net.cache_key(&curr.m);
        c.lookup(&mm, idx).cloned()
    });
    let (h, x) = match (cached, solver) {
        (Some(entry), _) => entry,
        (None, Some(s)) => solve_at(s, net, &curr.m, cache, replay, statistics)?,
        (None, None) => (curr.h, curr.x.clone()),
    };
    curr.h = curr.h.max(h);
    curr.f = curr.g.saturating_add(curr.h);
    curr.x = x;
    curr.trusted = true;
    Some(curr)
}

///
/// The search loop
///
/// Without a solver, `h = 0` for all states (Dijkstra).
fn search<S: HeuristicSolver>(
    net: &CompiledNet,
    im: &Marking,
    fm: &Marking,
    mut solver: Option<S>,
    mut cache: Option<HeuristicCache<'_>>,
    replay: bool,
    deadline: Option<Instant>,
) -> SearchOutcome {
    let mut statistics = SearchStatistics::default();
    let im = net.pack(im);
    let fm = net.pack(fm);

    let (h0, x0) = match solver.as_mut() {
        Some(s) => match solve_at(s, net, &im, &mut cache, replay, &mut statistics) {
            Some(v) => v,
            None => {
                debug!("heuristic infeasible at the initial marking");
                return SearchOutcome::Exhausted(statistics);
            }
        },
        None => (0, Vec::new()),
    };

    let mut arena = vec![SearchNode {
        parent: None,
        transition: None,
    }];
    let mut open: BinaryHeap<SearchTuple> = BinaryHeap::new();
    let mut closed: HashSet<PackedMarking> = HashSet::new();
    let mut counter: u64 = 0;
    open.push(SearchTuple {
        f: h0,
        g: 0,
        h: h0,
        m: im,
        node: 0,
        x: x0,
        trusted: true,
        counter,
    });

    while let Some(curr) = open.pop() {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            debug!(
                "alignment timed out after {} visited states",
                statistics.visited_states
            );
            return SearchOutcome::Timeout(with_statistics(statistics, &cache));
        }

        if !curr.trusted {
            if closed.contains(&curr.m) {
                continue;
            }
            match refresh(curr, net, solver.as_mut(), &mut cache, replay, &mut statistics) {
                Some(refreshed) => open.push(refreshed),
                None => trace!("heuristic infeasible, final marking unreachable from state"),
            }
            continue;
        }

        if curr.h as f64 > MAX_ALLOWED_HEURISTICS {
            debug!("dropping state with heuristic {}", curr.h);
            continue;
        }
        if closed.contains(&curr.m) {
            continue;
        }
        if curr.m == fm {
            let path = reconstruct(&arena, curr.node)
                .into_iter()
                .map(|col| net.index.transitions[col])
                .collect();
            return SearchOutcome::Found {
                path,
                cost: curr.g,
                statistics: with_statistics(statistics, &cache),
            };
        }

        closed.insert(curr.m.clone());
        statistics.visited_states += 1;

        for t in net.enabled(&curr.m) {
            if net.degenerate[t] {
                continue;
            }
            statistics.traversed_arcs += 1;
            let m_new = net.fire(&curr.m, t);
            if closed.contains(&m_new) {
                continue;
            }
            let cost = net.costs[t];
            let g = curr.g.saturating_add(cost);
            let (mut h, x, trusted) = if solver.is_some() {
                derive_heuristic(&curr.x, t, curr.h, cost)
            } else {
                (0, Vec::new(), true)
            };
            if let Some(min_cost) = cache.as_mut().and_then(|c| c.min_total_cost(t)) {
                h = h.max(min_cost.saturating_sub(g));
            }

            arena.push(SearchNode {
                parent: Some(curr.node),
                transition: Some(t),
            });
            counter += 1;
            statistics.queued_states += 1;
            open.push(SearchTuple {
                f: g.saturating_add(h),
                g,
                h,
                m: m_new,
                node: arena.len() - 1,
                x,
                trusted,
                counter,
            });
        }
    }

    SearchOutcome::Exhausted(with_statistics(statistics, &cache))
}

fn run<S: HeuristicSolver>(
    solver: S,
    sync_net: &PetriNet,
    im: &Marking,
    fm: &Marking,
    cost_function: &CostFunction,
    config: &AlignmentConfig,
    deadline: Option<Instant>,
) -> SearchOutcome {
    let incidence = solver.incidence().clone();
    let net = CompiledNet::new(sync_net, incidence.index.clone(), cost_function);
    let cache = config.use_heuristic_cache.then(|| {
        let n = incidence.index.transitions.len();
        let min_cost_solver = MarkingEquationSolver::with_incidence(
            sync_net,
            incidence,
            im,
            fm,
            Some(cost_function),
            config.integer_lp,
        );
        HeuristicCache::new(min_cost_solver, n)
    });
    let replay =
        cache.is_some() || matches!(config.heuristic, HeuristicVariant::ExtendedMarkingEquation { .. });
    search(&net, im, fm, Some(solver), cache, replay, deadline)
}

///
/// Compute a cheapest firing sequence of `sync_net` from `im` to `fm`
///
/// `trace_len` is the length of the aligned trace (used for the split points of the extended
/// marking equation). The search gives up at `deadline`.
pub fn align_sync_product(
    sync_net: &PetriNet,
    im: &Marking,
    fm: &Marking,
    cost_function: &CostFunction,
    trace_len: usize,
    config: &AlignmentConfig,
    deadline: Option<Instant>,
) -> SearchOutcome {
    match config.heuristic {
        HeuristicVariant::Dijkstra => {
            let net = CompiledNet::new(sync_net, NetIndex::new(sync_net), cost_function);
            search::<MarkingEquationSolver<'_>>(&net, im, fm, None, None, false, deadline)
        }
        HeuristicVariant::MarkingEquation => {
            let solver = MarkingEquationSolver::build(
                sync_net,
                im,
                fm,
                Some(cost_function),
                config.integer_lp,
            );
            run(solver, sync_net, im, fm, cost_function, config, deadline)
        }
        HeuristicVariant::ExtendedMarkingEquation { max_k } => {
            let solver = ExtendedMarkingEquationSolver::build(
                trace_len,
                sync_net,
                im,
                fm,
                Some(cost_function),
                None,
                max_k,
                config.integer_lp,
            );
            run(solver, sync_net, im, fm, cost_function, config, deadline)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::petri_net::petri_net_struct::{ArcType, MoveKind};
    use crate::petri_net::sync_product::construct_sync_product;
    use crate::petri_net::trace_net::construct_trace_net_from_activities;

    /// a -> b -> c with c skippable by a silent transition
    fn model() -> (PetriNet, Marking, Marking) {
        let mut net = PetriNet::with_name("abc");
        let p: Vec<_> = (0..4).map(|i| net.add_place(format!("p{}", i))).collect();
        let a = net.add_transition("a", Some("a".into()));
        let b = net.add_transition("b", Some("b".into()));
        let c = net.add_transition("c", Some("c".into()));
        let skip = net.add_transition("skip", None);
        for (from, t, to) in [(0, a, 1), (1, b, 2), (2, c, 3), (2, skip, 3)] {
            net.add_arc(ArcType::place_to_transition(p[from], t), None)
                .unwrap();
            net.add_arc(ArcType::transition_to_place(t, p[to]), None)
                .unwrap();
        }
        let im = [(p[0], 1)].into_iter().collect();
        let fm = [(p[3], 1)].into_iter().collect();
        (net, im, fm)
    }

    fn align(trace: &[&str], config: &AlignmentConfig) -> (PetriNet, SearchOutcome) {
        let (mn, mim, mfm) = model();
        let (tn, tim, tfm) = construct_trace_net_from_activities(trace).unwrap();
        let (sn, im, fm) = construct_sync_product(&tn, &tim, &tfm, &mn, &mim, &mfm).unwrap();
        let costs = construct_standard_cost_function(&sn);
        let outcome = align_sync_product(&sn, &im, &fm, &costs, trace.len(), config, None);
        (sn, outcome)
    }

    fn kinds(net: &PetriNet, path: &[TransitionID]) -> Vec<MoveKind> {
        path.iter()
            .map(|t| net.transition(t).unwrap().sync_move().unwrap().kind)
            .collect()
    }

    #[test]
    fn variants_agree_on_cost() {
        let variants = [
            HeuristicVariant::Dijkstra,
            HeuristicVariant::MarkingEquation,
            HeuristicVariant::extended(),
        ];
        for (trace, expected) in [
            (vec!["a", "b", "c"], 0),
            (vec!["a", "b"], 1),
            (vec!["a", "x", "b"], 10001),
            (vec!["a", "c"], 10000),
            (vec![], 20001),
        ] {
            for heuristic in variants {
                for use_heuristic_cache in [false, true] {
                    let config = AlignmentConfig {
                        heuristic,
                        use_heuristic_cache,
                        ..Default::default()
                    };
                    let (_, outcome) = align(&trace, &config);
                    match outcome {
                        SearchOutcome::Found { cost, .. } => {
                            assert_eq!(cost, expected, "{:?} with {:?}", trace, config)
                        }
                        other => panic!("{:?}: {:?}", trace, other),
                    }
                }
            }
        }
    }

    #[test]
    fn moves_in_order() {
        let (sn, outcome) = align(&["a", "x", "b", "c"], &AlignmentConfig::default());
        let SearchOutcome::Found {
            path, statistics, ..
        } = outcome
        else {
            panic!("no alignment");
        };
        assert_eq!(
            kinds(&sn, &path),
            vec![MoveKind::Sync, MoveKind::LogMove, MoveKind::Sync, MoveKind::Sync]
        );
        assert!(statistics.lp_solved >= 1);
        assert!(statistics.visited_states >= 4);
    }

    #[test]
    fn unreachable_final_marking() {
        let (mn, mim, _) = model();
        let mut dead = mn.clone();
        let island = dead.add_place("island");
        let fm: Marking = [(island, 1)].into_iter().collect();
        let (tn, tim, tfm) = construct_trace_net_from_activities(&["a"]).unwrap();
        let (sn, im, sfm) = construct_sync_product(&tn, &tim, &tfm, &dead, &mim, &fm).unwrap();
        let costs = construct_standard_cost_function(&sn);
        for heuristic in [HeuristicVariant::Dijkstra, HeuristicVariant::MarkingEquation] {
            let config = AlignmentConfig {
                heuristic,
                ..Default::default()
            };
            let outcome = align_sync_product(&sn, &im, &sfm, &costs, 1, &config, None);
            assert!(matches!(outcome, SearchOutcome::Exhausted(_)));
        }
    }

    #[test]
    fn states_without_solution_are_dropped() {
        // p0 -a-> p1, and a silent transition into a trap place
        let mut mn = PetriNet::with_name("trap");
        let p0 = mn.add_place("p0");
        let p1 = mn.add_place("p1");
        let trap = mn.add_place("trap");
        let a = mn.add_transition("a", Some("a".into()));
        let leak = mn.add_transition("leak", None);
        for (from, t, to) in [(p0, a, p1), (p0, leak, trap)] {
            mn.add_arc(ArcType::place_to_transition(from, t), None)
                .unwrap();
            mn.add_arc(ArcType::transition_to_place(t, to), None)
                .unwrap();
        }
        let mim: Marking = [(p0, 1)].into_iter().collect();
        let mfm: Marking = [(p1, 1)].into_iter().collect();
        let (tn, tim, tfm) = construct_trace_net_from_activities(&["a"]).unwrap();
        let (sn, im, fm) = construct_sync_product(&tn, &tim, &tfm, &mn, &mim, &mfm).unwrap();
        let costs = construct_standard_cost_function(&sn);

        let mut solver = MarkingEquationSolver::build(&sn, &im, &fm, Some(&costs), false);
        let net = CompiledNet::new(&sn, solver.incidence().index.clone(), &costs);
        let start = net.pack(&im);
        let mut statistics = SearchStatistics::default();
        let mut cache = None;
        let refreshed: Vec<bool> = net
            .enabled(&start)
            .into_iter()
            .map(|t| {
                let untrusted = SearchTuple {
                    f: 0,
                    g: net.costs[t],
                    h: 0,
                    m: net.fire(&start, t),
                    node: 0,
                    x: Vec::new(),
                    trusted: false,
                    counter: 0,
                };
                refresh(untrusted, &net, Some(&mut solver), &mut cache, false, &mut statistics)
                    .is_some_and(|r| r.trusted && r.f >= r.g)
            })
            .collect();
        assert_eq!(refreshed.iter().filter(|ok| !**ok).count(), 1, "{:?}", refreshed);
        assert!(refreshed.len() >= 3);

        let config = AlignmentConfig::default();
        let outcome = align_sync_product(&sn, &im, &fm, &costs, 1, &config, None);
        assert!(matches!(outcome, SearchOutcome::Found { cost: 0, .. }));
    }

    #[test]
    fn passed_deadline_times_out() {
        let (mn, mim, mfm) = model();
        let (tn, tim, tfm) = construct_trace_net_from_activities(&["a", "b", "c"]).unwrap();
        let (sn, im, fm) = construct_sync_product(&tn, &tim, &tfm, &mn, &mim, &mfm).unwrap();
        let costs = construct_standard_cost_function(&sn);
        let outcome = align_sync_product(
            &sn,
            &im,
            &fm,
            &costs,
            3,
            &AlignmentConfig::default(),
            Some(Instant::now()),
        );
        assert!(matches!(outcome, SearchOutcome::Timeout(_)));
    }
}
