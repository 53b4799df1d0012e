use std::collections::BTreeSet;
use std::fmt::Display;
use std::time::Instant;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{
    dfg::dfg_struct::{Activity, DirectlyFollowsGraph},
    event_log::{
        activity_projection::EventLogActivityProjection,
        event_log_struct::{EventLog, EventLogClassifier, EventLogError},
    },
    petri_net::petri_net_struct::{Marking, PetriNet},
    process_tree::process_tree_struct::{Node, OperatorType, ProcessTree, ProcessTreeError},
};

use super::cuts::{find_cut, Cut, DEFAULT_LOOP_THRESHOLD};
use super::sublog::{
    activity_once_per_trace, has_empty_trace, remove_activity, split_exclusive, split_loop,
    split_parallel, split_sequence, strict_tau_loop, sublog_dfg, tau_loop, without_empty_traces,
    SubLog,
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
/// Algorithm parameters for the inductive miner (directly-follows based)
pub struct InductiveMinerConfig {
    /// Redo candidates of a loop cut need a direction below this threshold
    pub loop_threshold: f64,
    /// Relations weaker than this share of the strongest outgoing relation of their source are
    /// removed before discovery (`0.0` keeps all)
    pub noise_threshold: f64,
}

impl Default for InductiveMinerConfig {
    fn default() -> Self {
        Self {
            loop_threshold: DEFAULT_LOOP_THRESHOLD,
            noise_threshold: 0.0,
        }
    }
}

impl InductiveMinerConfig {
    /// Serialize parameters to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize parameters from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

///
/// Errors when discovering a Petri net with the inductive miner
///
#[derive(Debug, Clone)]
pub enum InductiveMinerError {
    /// An event has no activity
    NoActivity(EventLogError),
    /// The discovered tree could not be converted
    Tree(ProcessTreeError),
}

impl Display for InductiveMinerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InductiveMinerError::NoActivity(e) => write!(f, "{}", e),
            InductiveMinerError::Tree(e) => write!(f, "Invalid process tree: {}", e),
        }
    }
}

impl std::error::Error for InductiveMinerError {}

impl From<EventLogError> for InductiveMinerError {
    fn from(e: EventLogError) -> Self {
        Self::NoActivity(e)
    }
}

impl From<ProcessTreeError> for InductiveMinerError {
    fn from(e: ProcessTreeError) -> Self {
        Self::Tree(e)
    }
}

/// Remove relations weaker than `threshold` times the strongest outgoing relation of their source
fn filter_noise(dfg: &DirectlyFollowsGraph, threshold: f64) -> DirectlyFollowsGraph {
    let mut filtered = dfg.clone();
    if threshold <= 0.0 {
        return filtered;
    }
    filtered.directly_follows_relations.retain(|(a, _), w| {
        let strongest = dfg
            .directly_follows_relations
            .iter()
            .filter(|((from, _), _)| from == a)
            .map(|(_, w)| *w)
            .max()
            .unwrap_or(0);
        *w as f64 >= threshold * strongest as f64
    });
    filtered
}

///
/// Sub-graph of `part` whose start (end) activities also include the activities entered from
/// (left towards) outside of `part`
///
fn project_with_boundary(
    dfg: &DirectlyFollowsGraph,
    part: &BTreeSet<Activity>,
) -> DirectlyFollowsGraph {
    let mut sub = dfg.project(part);
    for ((a, b), w) in &dfg.directly_follows_relations {
        match (part.contains(a), part.contains(b)) {
            (false, true) => sub.add_start_activity(b.clone(), *w),
            (true, false) => sub.add_end_activity(a.clone(), *w),
            _ => {}
        }
    }
    sub
}

fn skippable(node: Node) -> Node {
    Node::operator(OperatorType::ExclusiveChoice, vec![node, Node::tau()])
}

fn leaves(acts: impl IntoIterator<Item = Activity>) -> Vec<Node> {
    acts.into_iter().map(Node::activity).collect()
}

/// Flower model over all activities of `dfg`
///
/// Skippable (redo side) if the strongest relation of `dfg` is weaker than in its parent.
fn flower(dfg: &DirectlyFollowsGraph, parent_max: u64) -> Node {
    let mut acts = leaves(dfg.activities.keys().cloned());
    let inner = if acts.len() == 1 {
        acts.remove(0)
    } else {
        Node::operator(OperatorType::ExclusiveChoice, acts)
    };
    if dfg.max_edge_weight() >= parent_max {
        Node::operator(OperatorType::Loop, vec![inner, Node::tau()])
    } else {
        Node::operator(OperatorType::Loop, vec![Node::tau(), inner])
    }
}

fn discover(dfg: &DirectlyFollowsGraph, config: &InductiveMinerConfig, parent_max: u64) -> Node {
    let mut acts = dfg.activities.keys();
    match (acts.next(), acts.next()) {
        (None, _) => return Node::tau(),
        (Some(a), None) => {
            return if dfg.contains_df_relation((a, a)) {
                Node::operator(OperatorType::Loop, vec![Node::activity(a.clone()), Node::tau()])
            } else {
                Node::activity(a.clone())
            };
        }
        _ => {}
    }

    let local_max = dfg.max_edge_weight();
    let Some(cut) = find_cut(dfg, config.loop_threshold) else {
        debug!("No cut on {} activities, using flower model", dfg.activities.len());
        return flower(dfg, parent_max);
    };
    debug!("Found cut {:?}", cut);
    match cut {
        Cut::Exclusive(parts) => Node::operator(
            OperatorType::ExclusiveChoice,
            parts
                .iter()
                .map(|p| discover(&project_with_boundary(dfg, p), config, local_max))
                .collect(),
        ),
        Cut::Sequence(first, second) => {
            let mut first_node = discover(&project_with_boundary(dfg, &first), config, local_max);
            let mut second_node = discover(&project_with_boundary(dfg, &second), config, local_max);
            if dfg.start_activities.keys().any(|a| second.contains(a)) {
                first_node = skippable(first_node);
            }
            if dfg.end_activities.keys().any(|a| first.contains(a)) {
                second_node = skippable(second_node);
            }
            Node::operator(OperatorType::Sequence, vec![first_node, second_node])
        }
        Cut::Parallel(parts) => Node::operator(
            OperatorType::Concurrency,
            parts
                .iter()
                .map(|p| discover(&project_with_boundary(dfg, p), config, local_max))
                .collect(),
        ),
        Cut::Loop(body, redo) => Node::operator(
            OperatorType::Loop,
            vec![
                discover(&project_with_boundary(dfg, &body), config, local_max),
                discover(&project_with_boundary(dfg, &redo), config, local_max),
            ],
        ),
    }
}

///
/// Discover a [`ProcessTree`] from a [`DirectlyFollowsGraph`]
///
/// Recursively splits the activities by an exclusive choice, sequence, concurrency or loop
/// cut (tried in this order) and falls back to a flower model if no cut applies. Every
/// activity of the graph becomes exactly one leaf. Nested operators of the same type are merged.
pub fn inductive_miner_from_dfg(
    dfg: &DirectlyFollowsGraph,
    config: &InductiveMinerConfig,
) -> ProcessTree {
    let start = Instant::now();
    let dfg = filter_noise(dfg, config.noise_threshold);
    let root = discover(&dfg, config, dfg.max_edge_weight());
    let tree = ProcessTree::new(root).flatten();
    info!(
        "Inductive miner: {} activities in {:?}: {}",
        dfg.activities.len(),
        start.elapsed(),
        tree
    );
    tree
}

fn operator(op: OperatorType, logs: &[SubLog], config: &InductiveMinerConfig) -> Node {
    Node::operator(op, logs.iter().map(|l| discover_log(l, config)).collect())
}

fn discover_log(log: &SubLog, config: &InductiveMinerConfig) -> Node {
    if log.keys().all(|t| t.is_empty()) {
        return Node::tau();
    }
    if has_empty_trace(log) {
        return skippable(discover_log(&without_empty_traces(log), config));
    }

    let dfg = filter_noise(&sublog_dfg(log), config.noise_threshold);
    if dfg.activities.len() == 1 {
        let a = dfg.activities.keys().next().cloned().unwrap_or_default();
        return if log.keys().all(|t| t.len() == 1) {
            Node::activity(a)
        } else {
            Node::operator(OperatorType::Loop, vec![Node::activity(a), Node::tau()])
        };
    }

    if let Some(cut) = find_cut(&dfg, config.loop_threshold) {
        debug!("Found cut {:?}", cut);
        return match cut {
            Cut::Exclusive(parts) => operator(
                OperatorType::ExclusiveChoice,
                &split_exclusive(log, &parts),
                config,
            ),
            Cut::Sequence(first, second) => {
                let (first, second) = split_sequence(log, &first, &second);
                operator(OperatorType::Sequence, &[first, second], config)
            }
            Cut::Parallel(parts) => {
                operator(OperatorType::Concurrency, &split_parallel(log, &parts), config)
            }
            Cut::Loop(body, _) => {
                let (body, redo) = split_loop(log, &body);
                operator(OperatorType::Loop, &[body, redo], config)
            }
        };
    }

    if let Some(a) = activity_once_per_trace(log) {
        debug!("Fall-through: {} occurs once per trace", a);
        let rest = discover_log(&remove_activity(log, &a), config);
        return Node::operator(OperatorType::Concurrency, vec![Node::activity(a), rest]);
    }
    if let Some(split) = strict_tau_loop(log, &dfg).or_else(|| tau_loop(log, &dfg)) {
        debug!("Fall-through: tau loop");
        return Node::operator(
            OperatorType::Loop,
            vec![discover_log(&split, config), Node::tau()],
        );
    }
    debug!("No cut on {} activities, using flower model", dfg.activities.len());
    flower(&dfg, 0)
}

///
/// Discover a [`ProcessTree`] from trace variants and their frequencies
///
/// Like [`inductive_miner_from_dfg`], but every cut also splits the traces into sub-logs, so
/// empty traces, optional parts and repeated activities are visible to the recursion. If no cut
/// applies, the fall-throughs are tried in order: an activity occurring once per trace is put
/// in parallel to the rest, traces are split into loop iterations (first where an end activity
/// is followed by a start activity, then before every start activity), and finally a flower
/// model is used. Without noise filtering every trace of `log` is a run of the result.
pub fn inductive_miner_from_variants(log: &SubLog, config: &InductiveMinerConfig) -> ProcessTree {
    let start = Instant::now();
    let tree = ProcessTree::new(discover_log(log, config)).flatten();
    info!(
        "Inductive miner: {} variants in {:?}: {}",
        log.len(),
        start.elapsed(),
        tree
    );
    tree
}

///
/// Discover a [`ProcessTree`] from an [`EventLog`] using the given [`EventLogClassifier`]
///
/// See [`inductive_miner_from_variants`].
pub fn inductive_miner_discover_tree(
    log: &EventLog,
    classifier: &EventLogClassifier,
    config: &InductiveMinerConfig,
) -> Result<ProcessTree, EventLogError> {
    let projection = EventLogActivityProjection::try_from_log(log, classifier)?;
    let mut variants = SubLog::new();
    for (acts, count) in &projection.traces {
        *variants.entry(projection.acts_to_names(acts)).or_insert(0) += count;
    }
    Ok(inductive_miner_from_variants(&variants, config))
}

///
/// Discover a [`PetriNet`] (with initial and final marking) from an [`EventLog`]
///
/// See [`inductive_miner_discover_tree`] and [`ProcessTree::to_petri_net`].
pub fn inductive_miner_discover_petri_net(
    log: &EventLog,
    classifier: &EventLogClassifier,
    config: &InductiveMinerConfig,
) -> Result<(PetriNet, Marking, Marking), InductiveMinerError> {
    let tree = inductive_miner_discover_tree(log, classifier, config)?;
    Ok(tree.to_petri_net()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::init_logger;

    fn mine(traces: &[(Vec<&str>, u64)]) -> ProcessTree {
        let mut dfg = DirectlyFollowsGraph::new();
        for (trace, count) in traces {
            dfg.add_trace(trace, *count);
        }
        inductive_miner_from_dfg(&dfg, &InductiveMinerConfig::default())
    }

    #[test]
    fn optional_middle_activity() {
        init_logger();
        let tree = mine(&[(vec!["a", "b", "c"], 100), (vec!["a", "c"], 1)]);
        assert_eq!(tree.to_string(), "->( 'a', X( 'b', tau ), 'c' )");
        assert!(tree.is_valid());
    }

    #[test]
    fn choice_and_concurrency() {
        let tree = mine(&[(vec!["a", "b"], 1), (vec!["b", "a"], 1), (vec!["c"], 1)]);
        assert_eq!(tree.to_string(), "X( +( 'a', 'b' ), 'c' )");
    }

    #[test]
    fn loop_with_redo() {
        let tree = mine(&[
            (vec!["a", "b", "a"], 1),
            (vec!["a", "b", "a", "b", "a"], 1),
            (vec!["a"], 1),
        ]);
        assert_eq!(tree.to_string(), "*( 'a', 'b' )");
    }

    #[test]
    fn self_loop_and_base_cases() {
        assert_eq!(mine(&[]).to_string(), "tau");
        assert_eq!(mine(&[(vec!["a"], 3)]).to_string(), "'a'");
        assert_eq!(mine(&[(vec!["a", "a"], 3)]).to_string(), "*( 'a', tau )");
    }

    #[test]
    fn every_activity_once() {
        let tree = mine(&[
            (vec!["a", "b", "c", "d", "e"], 5),
            (vec!["a", "c", "b", "d", "f"], 3),
            (vec!["a", "d", "e"], 1),
            (vec!["a", "b", "c", "b", "c", "d", "f"], 2),
        ]);
        let acts = tree.activities();
        assert_eq!(
            acts.keys().copied().collect::<Vec<_>>(),
            vec!["a", "b", "c", "d", "e", "f"]
        );
        assert!(acts.values().all(|n| *n == 1));
        assert!(tree.is_valid());
    }

    fn mine_variants(traces: &[(Vec<&str>, u64)]) -> ProcessTree {
        let mut log = SubLog::new();
        for (trace, count) in traces {
            let trace = trace.iter().map(|a| a.to_string()).collect();
            *log.entry(trace).or_insert(0) += count;
        }
        inductive_miner_from_variants(&log, &InductiveMinerConfig::default())
    }

    #[test]
    fn variants_with_skips_and_empty_traces() {
        init_logger();
        let tree = mine_variants(&[(vec!["a", "b", "c"], 100), (vec!["a", "c"], 1)]);
        assert_eq!(tree.to_string(), "->( 'a', X( 'b', tau ), 'c' )");
        assert_eq!(mine_variants(&[]).to_string(), "tau");
        assert_eq!(mine_variants(&[(vec![], 4)]).to_string(), "tau");
        assert_eq!(
            mine_variants(&[(vec!["a"], 2), (vec![], 1)]).to_string(),
            "X( 'a', tau )"
        );
        assert_eq!(
            mine_variants(&[(vec!["a", "a"], 1), (vec!["a"], 1)]).to_string(),
            "*( 'a', tau )"
        );
    }

    #[test]
    fn nested_parts_keep_repetitions() {
        // body {a, d} is concurrent, and `a` repeats inside its part
        let tree = mine_variants(&[
            (vec!["a", "d", "a", "e", "d"], 1),
            (vec!["a", "a"], 1),
            (vec!["d", "e", "e", "a"], 1),
        ]);
        assert!(tree.is_valid());
        let Node::Operator(root) = &tree.root else {
            panic!("expected an operator at the root of {}", tree);
        };
        assert_eq!(root.operator_type, OperatorType::Loop);
        let shown = tree.to_string();
        assert!(shown.contains("*( 'a', tau )"), "{}", shown);
        assert!(shown.contains("*( 'e', tau )"), "{}", shown);
    }

    #[test]
    fn activity_once_per_trace_fall_through() {
        let tree = mine_variants(&[(vec!["b", "a", "b"], 1), (vec!["b", "b", "a"], 1)]);
        assert_eq!(tree.to_string(), "+( 'a', *( 'b', tau ) )");
    }

    #[test]
    fn tau_loop_fall_through() {
        let tree = mine_variants(&[
            (vec!["a", "b", "c", "a", "b", "c"], 1),
            (vec!["a", "b", "c"], 2),
        ]);
        let Node::Operator(root) = &tree.root else {
            panic!("expected an operator at the root of {}", tree);
        };
        assert_eq!(root.operator_type, OperatorType::Loop);
        assert!(tree.activities().values().all(|n| *n == 1));
    }

    #[test]
    fn noise_filtering_drops_rare_relations() {
        let mut dfg = DirectlyFollowsGraph::new();
        dfg.add_trace(&["a", "b"], 100);
        dfg.add_trace(&["b", "a"], 1);
        let config = InductiveMinerConfig {
            noise_threshold: 0.05,
            ..Default::default()
        };
        let filtered = filter_noise(&dfg, config.noise_threshold);
        assert!(filtered.contains_df_relation(("a", "b")));
        assert!(filtered.contains_df_relation(("b", "a")), "only outgoing relation of b");

        dfg.add_trace(&["b", "c"], 100);
        let filtered = filter_noise(&dfg, config.noise_threshold);
        assert!(!filtered.contains_df_relation(("b", "a")));
        assert_eq!(
            InductiveMinerConfig::from_json(&config.to_json().unwrap()).unwrap(),
            config
        );
    }
}
