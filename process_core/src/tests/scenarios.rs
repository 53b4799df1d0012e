use std::collections::BTreeSet;

use super::*;
use crate::conformance::alignments::cost_function::{
    CostFunction, STD_MODEL_LOG_MOVE_COST, STD_TAU_COST,
};
use crate::conformance::alignments::log_alignment::apply_log;
use crate::conformance::marking_equation::{HeuristicSolver, MarkingEquationSolver};
use crate::dfg::dfg_struct::DirectlyFollowsGraph;
use crate::discovery::alpha::candidate_building::{
    build_candidates, maximal_pairs, AlphaAbstraction,
};
use crate::discovery::alpha::full::alpha_miner_discover_petri_net;
use crate::discovery::inductive::full::{inductive_miner_discover_tree, InductiveMinerConfig};
use crate::event_log::event_log_struct::{EventLog, EventLogClassifier};
use crate::petri_net::petri_net_struct::ArcType;
use crate::utils::test_utils::init_logger;

fn pairs(acts: &AlphaAbstraction, rel: &BTreeSet<(usize, usize)>) -> Vec<(String, String)> {
    rel.iter()
        .map(|(a, b)| (acts.activities[*a].clone(), acts.activities[*b].clone()))
        .collect()
}

fn owned(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
    pairs
        .iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect()
}

#[test]
fn alpha_on_interleaved_log() {
    init_logger();
    let log = EventLog::from_activity_traces(&[vec!["a", "b", "c", "d"], vec!["a", "c", "b", "d"]]);
    let dfg = DirectlyFollowsGraph::discover_dfg(&log).unwrap();
    let abstraction = AlphaAbstraction::from_dfg(&dfg);
    assert_eq!(
        pairs(&abstraction, &abstraction.dfg),
        owned(&[
            ("a", "b"),
            ("a", "c"),
            ("b", "c"),
            ("b", "d"),
            ("c", "b"),
            ("c", "d")
        ])
    );
    assert_eq!(
        pairs(&abstraction, &abstraction.parallel),
        owned(&[("b", "c"), ("c", "b")])
    );
    assert_eq!(
        pairs(&abstraction, &abstraction.causal),
        owned(&[("a", "b"), ("a", "c"), ("b", "d"), ("c", "d")])
    );
    let maximal: Vec<(Vec<&str>, Vec<&str>)> = maximal_pairs(&build_candidates(&abstraction))
        .iter()
        .map(|(a, b)| (abstraction.acts_to_names(a), abstraction.acts_to_names(b)))
        .collect();
    assert_eq!(
        maximal,
        vec![
            (vec!["a"], vec!["b"]),
            (vec!["a"], vec!["c"]),
            (vec!["b"], vec!["d"]),
            (vec!["c"], vec!["d"]),
        ]
    );

    let (net, im, fm) =
        alpha_miner_discover_petri_net(&log, &EventLogClassifier::default()).unwrap();
    assert_eq!(net.places.len(), 6);
    assert_eq!(net.transitions.len(), 4);
    // source -> a, d -> sink and two arcs per internal place
    assert_eq!(net.arcs.len(), 10);

    let aligned = apply_log(
        &log,
        &net,
        &im,
        &fm,
        &EventLogClassifier::default(),
        &AlignmentConfig::default(),
    )
    .unwrap();
    for result in &aligned.traces {
        assert_eq!(result.as_ref().map(|r| r.cost), Some(0));
    }
    assert_eq!(aligned.summary.log_fitness, 1.0);
    assert_eq!(aligned.summary.percentage_of_fitting_traces, 100.0);
}

#[test]
fn inductive_miner_keeps_rare_skip() {
    init_logger();
    let mut traces = vec![vec!["a", "b", "c"]; 100];
    traces.push(vec!["a", "c"]);
    let log = EventLog::from_activity_traces(&traces);
    let tree = inductive_miner_discover_tree(
        &log,
        &EventLogClassifier::default(),
        &InductiveMinerConfig::default(),
    )
    .unwrap();
    assert_eq!(tree.to_string(), "->( 'a', X( 'b', tau ), 'c' )");

    let model = tree.to_petri_net().unwrap();
    let full = align(&model, &["a", "b", "c"]);
    assert_eq!(full.cost, 0);
    assert_eq!(full.fitness, 1.0);
    // only the silent skip of b is used
    let skipped = align(&model, &["a", "c"]);
    assert_eq!(skipped.cost, STD_TAU_COST);
    assert_eq!(skipped.fitness, 1.0);
    assert_eq!(skipped.log_projection(), vec!["a", "c"]);
}

#[test]
fn log_move_for_unknown_activity() {
    let model = tree_net(seq(vec![leaf("a"), leaf("b")]));
    let result = align(&model, &["a", "x", "b"]);
    assert_eq!(result.describe(false), vec!["(a, a)", "(x, >>)", "(b, b)"]);
    assert_eq!(result.cost, STD_MODEL_LOG_MOVE_COST);
}

#[test]
fn model_move_for_skipped_activity() {
    let model = tree_net(seq(vec![leaf("a"), leaf("c"), leaf("b")]));
    let result = align(&model, &["a", "b"]);
    assert_eq!(result.describe(false), vec!["(a, a)", "(>>, c)", "(b, b)"]);
    assert_eq!(result.cost, STD_MODEL_LOG_MOVE_COST);
}

#[test]
fn loop_tree_alignments() {
    let model = tree_net(looped(leaf("a"), leaf("b")));
    // entering and leaving the loop are silent moves
    for trace in [vec!["a", "b", "a"], vec!["a", "b", "a", "b", "a"]] {
        let result = align(&model, &trace);
        assert_eq!(result.cost, 2 * STD_TAU_COST);
        assert_eq!(result.fitness, 1.0);
        assert_eq!(result.log_projection(), trace);
    }
    let empty = align(&model, &[]);
    assert_eq!(empty.cost, STD_MODEL_LOG_MOVE_COST + 2 * STD_TAU_COST);
    assert_eq!(empty.describe(false), vec!["(>>, None)", "(>>, a)", "(>>, None)"]);
    assert_eq!(empty.fitness, 0.0);
}

#[test]
fn marking_equation_on_single_transition() {
    let mut net = PetriNet::new();
    let p = net.add_place("p");
    let q = net.add_place("q");
    let t = net.add_transition("t", Some("t".into()));
    net.add_arc(ArcType::place_to_transition(p, t), None).unwrap();
    net.add_arc(ArcType::transition_to_place(t, q), None).unwrap();
    let im: Marking = [(p, 1)].into_iter().collect();
    let fm: Marking = [(q, 1)].into_iter().collect();
    let costs: CostFunction = [(t, 1)].into_iter().collect();

    let mut solver = MarkingEquationSolver::build(&net, &im, &fm, Some(&costs), false);
    let sol = solver.solve().unwrap();
    assert_eq!(sol.h, 1.0);
    assert_eq!(sol.x.len(), 1);
    assert!((sol.x[0] - 1.0).abs() < 1e-6);
    let replay = solver.firing_sequence(&sol.x);
    assert!(replay.reaches_fm);
    assert_eq!(replay.sequence, vec![t]);
}
