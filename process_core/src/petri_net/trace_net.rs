use std::fmt::Display;

use crate::conformance::alignments::cost_function::{CostFunction, STD_MODEL_LOG_MOVE_COST};
use crate::event_log::event_log_struct::{EventLogClassifier, EventLogError, Trace};

use super::petri_net_struct::{
    ArcType, Marking, PetriNet, PlaceID, PropertyValue, StructureError, PROP_EVENT_INDEX,
    PROP_TRACE_INDEX,
};

///
/// Errors when building the trace net of a [`Trace`]
///
#[derive(Debug, Clone)]
pub enum TraceNetError {
    /// An event lacks a classifier attribute
    Activities(EventLogError),
    /// The chain could not be assembled
    Structure(StructureError),
}

impl Display for TraceNetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceNetError::Activities(e) => write!(f, "{}", e),
            TraceNetError::Structure(e) => write!(f, "Invalid trace net: {}", e),
        }
    }
}

impl std::error::Error for TraceNetError {}

impl From<EventLogError> for TraceNetError {
    fn from(e: EventLogError) -> Self {
        Self::Activities(e)
    }
}

impl From<StructureError> for TraceNetError {
    fn from(e: StructureError) -> Self {
        Self::Structure(e)
    }
}

///
/// Build the trace net of an activity sequence
///
/// The net is a single chain `p_0 -> t_0 -> p_1 -> ... -> t_{n-1} -> p_n`, where `t_i` carries the
/// `i`-th activity as label. Places store their position under [`PROP_TRACE_INDEX`],
/// transitions their event index under [`PROP_EVENT_INDEX`].
///
/// Returns the net together with its initial (`{p_0: 1}`) and final (`{p_n: 1}`) marking.
pub fn construct_trace_net_from_activities<S: AsRef<str>>(
    activities: &[S],
) -> Result<(PetriNet, Marking, Marking), StructureError> {
    let mut net = PetriNet::with_name("trace net");
    let mut place = net.add_place("p_0");
    set_index(&mut net, place, PROP_TRACE_INDEX, 0);
    let mut im = Marking::new();
    im.add(place, 1);

    for (i, act) in activities.iter().enumerate() {
        let t = net.add_transition(format!("t_{}", i), Some(act.as_ref().to_string()));
        if let Some(trans) = net.transition_mut(&t) {
            trans
                .properties
                .insert(PROP_EVENT_INDEX.to_string(), PropertyValue::Index(i));
        }
        let next = net.add_place(format!("p_{}", i + 1));
        set_index(&mut net, next, PROP_TRACE_INDEX, i + 1);
        net.add_arc(ArcType::place_to_transition(place, t), None)?;
        net.add_arc(ArcType::transition_to_place(t, next), None)?;
        place = next;
    }

    let mut fm = Marking::new();
    fm.add(place, 1);
    net.initial_marking = Some(im.clone());
    net.final_markings = Some(vec![fm.clone()]);
    Ok((net, im, fm))
}

fn set_index(net: &mut PetriNet, p: PlaceID, key: &str, index: usize) {
    if let Some(place) = net.place_mut(&p) {
        place
            .properties
            .insert(key.to_string(), PropertyValue::Index(index));
    }
}

///
/// Build the trace net of a [`Trace`], reading activities with the passed classifier
///
pub fn construct_trace_net(
    trace: &Trace,
    classifier: &EventLogClassifier,
) -> Result<(PetriNet, Marking, Marking), TraceNetError> {
    let activities = trace.activities(classifier)?;
    Ok(construct_trace_net_from_activities(&activities)?)
}

///
/// Build the trace net of a [`Trace`] together with a cost function assigning each
/// trace transition the cost of its event
///
/// Events without an entry in `costs` get [`STD_MODEL_LOG_MOVE_COST`].
pub fn construct_trace_net_cost_aware(
    trace: &Trace,
    classifier: &EventLogClassifier,
    costs: &[u64],
) -> Result<(PetriNet, Marking, Marking, CostFunction), TraceNetError> {
    let (net, im, fm) = construct_trace_net(trace, classifier)?;
    let cost_function = net
        .transitions
        .values()
        .map(|t| {
            let index = t
                .properties
                .get(PROP_EVENT_INDEX)
                .and_then(|p| p.as_index());
            let cost = index
                .and_then(|i| costs.get(i).copied())
                .unwrap_or(STD_MODEL_LOG_MOVE_COST);
            (t.id(), cost)
        })
        .collect();
    Ok((net, im, fm, cost_function))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_net_is_a_chain() {
        let trace = Trace::from_activities(&["a", "b", "a"]);
        let (net, im, fm) = construct_trace_net(&trace, &EventLogClassifier::default()).unwrap();
        assert_eq!(net.places.len(), 4);
        assert_eq!(net.transitions.len(), 3);
        assert_eq!(net.arcs.len(), 6);

        let mut m = im.clone();
        let mut fired = Vec::new();
        loop {
            let enabled = net.enabled_transitions(&m);
            if enabled.is_empty() {
                break;
            }
            assert_eq!(enabled.len(), 1);
            let t = net.transition(&enabled[0]).unwrap();
            fired.push(t.label.clone().unwrap());
            m = net.execute(enabled[0], &m).unwrap();
        }
        assert_eq!(fired, vec!["a", "b", "a"]);
        assert_eq!(m, fm);

        let last = fm.iter().next().unwrap().0;
        assert_eq!(
            net.place(last)
                .unwrap()
                .properties
                .get(PROP_TRACE_INDEX)
                .and_then(|p| p.as_index()),
            Some(3)
        );
    }

    #[test]
    fn missing_attribute_and_empty_trace() {
        let trace = Trace::from_activities(&["a"]);
        let classifier = EventLogClassifier {
            name: "Resource".to_string(),
            keys: vec!["org:resource".to_string()],
        };
        assert!(matches!(
            construct_trace_net(&trace, &classifier),
            Err(TraceNetError::Activities(_))
        ));

        let (net, im, fm) = construct_trace_net_from_activities::<&str>(&[]).unwrap();
        assert_eq!(net.places.len(), 1);
        assert!(net.arcs.is_empty());
        assert_eq!(im, fm);
    }

    #[test]
    fn cost_aware_trace_net() {
        let trace = Trace::from_activities(&["a", "b"]);
        let (net, _, _, costs) =
            construct_trace_net_cost_aware(&trace, &EventLogClassifier::default(), &[5]).unwrap();
        let mut by_label: Vec<(String, u64)> = net
            .transitions
            .values()
            .map(|t| (t.label.clone().unwrap(), costs[&t.id()]))
            .collect();
        by_label.sort();
        assert_eq!(
            by_label,
            vec![("a".to_string(), 5), ("b".to_string(), STD_MODEL_LOG_MOVE_COST)]
        );
    }
}
