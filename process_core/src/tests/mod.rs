use std::collections::HashMap;

use crate::conformance::alignments::log_alignment::{apply_activities, worst_model_cost};
use crate::conformance::alignments::{AlignmentConfig, AlignmentResult};
use crate::petri_net::petri_net_struct::{Marking, PetriNet, TransitionID};
use crate::process_tree::process_tree_struct::{Node, OperatorType, ProcessTree};

mod scenarios;

/// Align `acts` against the net with the given configuration, failing on timeouts
fn align_with(
    (net, im, fm): &(PetriNet, Marking, Marking),
    acts: &[&str],
    config: &AlignmentConfig,
) -> AlignmentResult {
    let worst = worst_model_cost(net, im, fm, config).unwrap();
    apply_activities(acts, net, im, fm, config, worst, None)
        .unwrap()
        .expect("no time limit set")
}

fn align(model: &(PetriNet, Marking, Marking), acts: &[&str]) -> AlignmentResult {
    align_with(model, acts, &AlignmentConfig::default())
}

fn seq(children: Vec<Node>) -> Node {
    Node::operator(OperatorType::Sequence, children)
}

fn xor(children: Vec<Node>) -> Node {
    Node::operator(OperatorType::ExclusiveChoice, children)
}

fn and(children: Vec<Node>) -> Node {
    Node::operator(OperatorType::Concurrency, children)
}

fn looped(body: Node, redo: Node) -> Node {
    Node::operator(OperatorType::Loop, vec![body, redo])
}

fn leaf(a: &str) -> Node {
    Node::activity(a)
}

fn tree_net(root: Node) -> (PetriNet, Marking, Marking) {
    ProcessTree::new(root).to_petri_net().unwrap()
}

/// Fire the transitions named `names` from `im`, `None` if one of them is not enabled
fn fire_by_names(net: &PetriNet, im: &Marking, names: &[&str]) -> Option<Marking> {
    let by_name: HashMap<&str, TransitionID> = net
        .transitions
        .values()
        .map(|t| (t.name.as_str(), t.id()))
        .collect();
    names
        .iter()
        .try_fold(im.clone(), |m, name| net.execute(*by_name.get(name)?, &m))
}
