use std::time::Instant;

use log::{info, warn};

use crate::{
    dfg::dfg_struct::DirectlyFollowsGraph,
    event_log::event_log_struct::{EventLog, EventLogClassifier, EventLogError},
    petri_net::petri_net_struct::{ArcType, Marking, PetriNet, TransitionID},
};

use super::candidate_building::{build_candidates, maximal_pairs, AlphaAbstraction};

/// Name of the place holding the initial token
pub const SOURCE_PLACE: &str = "source";
/// Name of the place holding the final token
pub const SINK_PLACE: &str = "sink";

///
/// Discover a [`PetriNet`] using the classical α-miner
///
/// Activities are derived from the events with the given [`EventLogClassifier`]. Returns the net
/// together with its initial and final marking.
pub fn alpha_miner_discover_petri_net(
    log: &EventLog,
    classifier: &EventLogClassifier,
) -> Result<(PetriNet, Marking, Marking), EventLogError> {
    let dfg = DirectlyFollowsGraph::discover_dfg_with_classifier(log, classifier)?;
    Ok(alpha_miner_from_dfg(&dfg))
}

///
/// Discover a [`PetriNet`] from a [`DirectlyFollowsGraph`] using the classical α-miner
///
/// One transition per activity (created in sorted order), a `source` place feeding the start
/// activities, a `sink` place fed by the end activities and one place per maximal pair `(A, B)`.
/// Initial marking `{source: 1}`, final marking `{sink: 1}`.
pub fn alpha_miner_from_dfg(dfg: &DirectlyFollowsGraph) -> (PetriNet, Marking, Marking) {
    let start = Instant::now();
    let abstraction = AlphaAbstraction::from_dfg(dfg);
    let cnds = build_candidates(&abstraction);
    let maximal = maximal_pairs(&cnds);
    info!(
        "α-miner: {} activities, {} candidates, {} maximal pairs",
        abstraction.activities.len(),
        cnds.len(),
        maximal.len()
    );

    let (net, im, fm) = build_net(&abstraction, &maximal);
    info!("α-miner: built net in {:?}", start.elapsed());
    (net, im, fm)
}

fn build_net(
    abstraction: &AlphaAbstraction,
    maximal: &[(Vec<usize>, Vec<usize>)],
) -> (PetriNet, Marking, Marking) {
    let mut pn = PetriNet::with_name("alpha");
    let transitions: Vec<TransitionID> = abstraction
        .activities
        .iter()
        .map(|a| pn.add_transition(a.clone(), Some(a.clone())))
        .collect();

    let source = pn.add_place(SOURCE_PLACE);
    let sink = pn.add_place(SINK_PLACE);
    let mut arcs = Vec::new();
    for s in &abstraction.start_activities {
        arcs.push(ArcType::place_to_transition(source, transitions[*s]));
    }
    for e in &abstraction.end_activities {
        arcs.push(ArcType::transition_to_place(transitions[*e], sink));
    }
    for (a, b) in maximal {
        let name = format!(
            "({{{}}}, {{{}}})",
            abstraction.acts_to_names(a).join(", "),
            abstraction.acts_to_names(b).join(", ")
        );
        let place = pn.add_place(name);
        for x in a {
            arcs.push(ArcType::transition_to_place(transitions[*x], place));
        }
        for y in b {
            arcs.push(ArcType::place_to_transition(place, transitions[*y]));
        }
    }
    for arc in arcs {
        if let Err(e) = pn.add_arc(arc, None) {
            warn!("α-miner: skipping arc: {}", e);
        }
    }

    let im: Marking = [(source, 1)].into_iter().collect();
    let fm: Marking = [(sink, 1)].into_iter().collect();
    pn.initial_marking = Some(im.clone());
    pn.final_markings = Some(vec![fm.clone()]);
    (pn, im, fm)
}
