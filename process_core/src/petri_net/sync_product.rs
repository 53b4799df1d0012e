use std::collections::HashMap;

use crate::conformance::alignments::cost_function::{
    CostFunction, STD_MODEL_LOG_MOVE_COST, STD_SYNC_COST, STD_TAU_COST,
};

use super::petri_net_struct::{
    ArcType, Marking, MoveKind, NetSide, PetriNet, PlaceID, Properties, PropertyValue,
    StructureError, SyncMove, TransitionID, PROP_EVENT_INDEX, PROP_IS_SYNC_NET, PROP_MOVE,
    PROP_NET_SIDE, SKIP,
};

/// Costs of synchronous moves, keyed by (trace transition, model transition)
pub type SyncCostFunction = HashMap<(TransitionID, TransitionID), u64>;

/// Components of a synchronous product transition
type Origin = (Option<TransitionID>, Option<TransitionID>);

///
/// Construct the synchronous product of a trace net and a model net
///
/// Places of both nets are copied (names `(p, >>)` and `(>>, q)`); every trace transition
/// becomes a log move, every model transition a model move and every pair with equal
/// labels a synchronous move. The kind of each transition is stored as
/// [`PropertyValue::Move`] under [`PROP_MOVE`].
///
/// Fails if one of the markings references places outside of its net.
pub fn construct_sync_product(
    trace_net: &PetriNet,
    trace_im: &Marking,
    trace_fm: &Marking,
    model_net: &PetriNet,
    model_im: &Marking,
    model_fm: &Marking,
) -> Result<(PetriNet, Marking, Marking), StructureError> {
    let (net, im, fm, _) = build_sync_product(
        trace_net, trace_im, trace_fm, model_net, model_im, model_fm,
    )?;
    Ok((net, im, fm))
}

///
/// Construct the synchronous product together with its cost function
///
/// Log moves cost `trace_costs[t]`, model moves `model_costs[u]` and synchronous moves
/// `sync_costs[(t, u)]`. Missing entries fall back to the standard costs
/// (see [`crate::conformance::alignments::cost_function`]).
#[allow(clippy::too_many_arguments)]
pub fn construct_cost_aware_sync_product(
    trace_net: &PetriNet,
    trace_im: &Marking,
    trace_fm: &Marking,
    model_net: &PetriNet,
    model_im: &Marking,
    model_fm: &Marking,
    trace_costs: &CostFunction,
    model_costs: &CostFunction,
    sync_costs: &SyncCostFunction,
) -> Result<(PetriNet, Marking, Marking, CostFunction), StructureError> {
    let (net, im, fm, origins) = build_sync_product(
        trace_net, trace_im, trace_fm, model_net, model_im, model_fm,
    )?;
    let costs = origins
        .into_iter()
        .map(|(st, origin)| {
            let cost = match origin {
                (Some(t), None) => trace_costs
                    .get(&t)
                    .copied()
                    .unwrap_or(STD_MODEL_LOG_MOVE_COST),
                (None, Some(u)) => model_costs.get(&u).copied().unwrap_or_else(|| {
                    if model_net.transition(&u).is_some_and(|t| t.is_silent()) {
                        STD_TAU_COST
                    } else {
                        STD_MODEL_LOG_MOVE_COST
                    }
                }),
                (Some(t), Some(u)) => sync_costs.get(&(t, u)).copied().unwrap_or(STD_SYNC_COST),
                (None, None) => 0,
            };
            (st, cost)
        })
        .collect();
    Ok((net, im, fm, costs))
}

fn build_sync_product(
    trace_net: &PetriNet,
    trace_im: &Marking,
    trace_fm: &Marking,
    model_net: &PetriNet,
    model_im: &Marking,
    model_fm: &Marking,
) -> Result<(PetriNet, Marking, Marking, HashMap<TransitionID, Origin>), StructureError> {
    for m in [trace_im, trace_fm] {
        trace_net.check_marking(m)?;
    }
    for m in [model_im, model_fm] {
        model_net.check_marking(m)?;
    }

    let mut net = PetriNet::with_name(format!(
        "synchronous product of {} and {}",
        trace_net.name, model_net.name
    ));
    net.properties
        .insert(PROP_IS_SYNC_NET.to_string(), PropertyValue::Flag(true));

    let mut trace_places: HashMap<PlaceID, PlaceID> = HashMap::new();
    for p in trace_net.sorted_places() {
        let sp = net.add_place(format!("({}, {})", p.name, SKIP));
        copy_place_properties(&mut net, sp, &p.properties, NetSide::Trace);
        trace_places.insert(p.id(), sp);
    }
    let mut model_places: HashMap<PlaceID, PlaceID> = HashMap::new();
    for q in model_net.sorted_places() {
        let sp = net.add_place(format!("({}, {})", SKIP, q.name));
        copy_place_properties(&mut net, sp, &q.properties, NetSide::Model);
        model_places.insert(q.id(), sp);
    }

    let mut origins: HashMap<TransitionID, Origin> = HashMap::new();

    let trace_transitions = trace_net.sorted_transitions();
    let model_transitions = model_net.sorted_transitions();

    for t in &trace_transitions {
        let label = t.label.clone().unwrap_or_default();
        let sync_move = SyncMove {
            kind: MoveKind::LogMove,
            log: Some((t.name.clone(), label.clone())),
            model: None,
        };
        let st = add_sync_transition(
            &mut net,
            format!("({}, {})", t.name, SKIP),
            Some(format!("({}, {})", label, SKIP)),
            sync_move,
            t.properties.get(PROP_EVENT_INDEX).cloned(),
        );
        connect(&mut net, st, trace_net, t.id(), &trace_places)?;
        origins.insert(st, (Some(t.id()), None));
    }

    for u in &model_transitions {
        let sync_move = SyncMove {
            kind: MoveKind::ModelMove,
            log: None,
            model: Some((u.name.clone(), u.label.clone())),
        };
        let st = add_sync_transition(
            &mut net,
            format!("({}, {})", SKIP, u.name),
            u.label.as_ref().map(|l| format!("({}, {})", SKIP, l)),
            sync_move,
            None,
        );
        connect(&mut net, st, model_net, u.id(), &model_places)?;
        origins.insert(st, (None, Some(u.id())));
    }

    for t in &trace_transitions {
        for u in &model_transitions {
            let (Some(tl), Some(ul)) = (&t.label, &u.label) else {
                continue;
            };
            if tl != ul {
                continue;
            }
            let sync_move = SyncMove {
                kind: MoveKind::Sync,
                log: Some((t.name.clone(), tl.clone())),
                model: Some((u.name.clone(), Some(ul.clone()))),
            };
            let st = add_sync_transition(
                &mut net,
                format!("({}, {})", t.name, u.name),
                Some(format!("({}, {})", tl, ul)),
                sync_move,
                t.properties.get(PROP_EVENT_INDEX).cloned(),
            );
            connect(&mut net, st, trace_net, t.id(), &trace_places)?;
            connect(&mut net, st, model_net, u.id(), &model_places)?;
            origins.insert(st, (Some(t.id()), Some(u.id())));
        }
    }

    let project = |m: &Marking, mapping: &HashMap<PlaceID, PlaceID>| -> Marking {
        m.iter()
            .filter_map(|(p, n)| mapping.get(p).map(|sp| (*sp, *n)))
            .collect()
    };
    let mut im = project(trace_im, &trace_places);
    for (p, n) in project(model_im, &model_places).iter() {
        im.add(*p, *n);
    }
    let mut fm = project(trace_fm, &trace_places);
    for (p, n) in project(model_fm, &model_places).iter() {
        fm.add(*p, *n);
    }
    net.initial_marking = Some(im.clone());
    net.final_markings = Some(vec![fm.clone()]);
    Ok((net, im, fm, origins))
}

fn copy_place_properties(
    net: &mut PetriNet,
    p: PlaceID,
    properties: &Properties,
    side: NetSide,
) {
    if let Some(place) = net.place_mut(&p) {
        place.properties = properties.clone();
        place
            .properties
            .insert(PROP_NET_SIDE.to_string(), PropertyValue::Side(side));
    }
}

fn add_sync_transition(
    net: &mut PetriNet,
    name: String,
    label: Option<String>,
    sync_move: SyncMove,
    event_index: Option<PropertyValue>,
) -> TransitionID {
    let st = net.add_transition(name, label);
    if let Some(trans) = net.transition_mut(&st) {
        trans
            .properties
            .insert(PROP_MOVE.to_string(), PropertyValue::Move(sync_move));
        if let Some(index) = event_index {
            trans.properties.insert(PROP_EVENT_INDEX.to_string(), index);
        }
    }
    st
}

/// Replicate preset and postset arcs of `component` (in `source`) for the sync transition `st`
fn connect(
    net: &mut PetriNet,
    st: TransitionID,
    source: &PetriNet,
    component: TransitionID,
    places: &HashMap<PlaceID, PlaceID>,
) -> Result<(), StructureError> {
    for (p, w) in source.weighted_preset_of_transition(component) {
        let sp = places.get(&p).ok_or(StructureError::UnknownNode(p.0))?;
        net.add_arc(ArcType::place_to_transition(*sp, st), Some(w))?;
    }
    for (p, w) in source.weighted_postset_of_transition(component) {
        let sp = places.get(&p).ok_or(StructureError::UnknownNode(p.0))?;
        net.add_arc(ArcType::transition_to_place(st, *sp), Some(w))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::petri_net::trace_net::construct_trace_net_from_activities;

    fn model_ab() -> (PetriNet, Marking, Marking) {
        let mut net = PetriNet::with_name("model");
        let p0 = net.add_place("p0");
        let p1 = net.add_place("p1");
        let p2 = net.add_place("p2");
        let a = net.add_transition("ta", Some("a".into()));
        let b = net.add_transition("tb", Some("b".into()));
        let tau = net.add_transition("tau", None);
        net.add_arc(ArcType::place_to_transition(p0, a), None).unwrap();
        net.add_arc(ArcType::transition_to_place(a, p1), None).unwrap();
        net.add_arc(ArcType::place_to_transition(p1, b), None).unwrap();
        net.add_arc(ArcType::transition_to_place(b, p2), None).unwrap();
        net.add_arc(ArcType::place_to_transition(p1, tau), None).unwrap();
        net.add_arc(ArcType::transition_to_place(tau, p2), None).unwrap();
        let im = [(p0, 1)].into_iter().collect();
        let fm = [(p2, 1)].into_iter().collect();
        (net, im, fm)
    }

    #[test]
    fn sync_product_structure() {
        let (tn, tim, tfm) = construct_trace_net_from_activities(&["a", "b", "c"]).unwrap();
        let (mn, mim, mfm) = model_ab();
        let (sn, im, fm) = construct_sync_product(&tn, &tim, &tfm, &mn, &mim, &mfm).unwrap();

        assert_eq!(sn.places.len(), 4 + 3);
        // 3 log moves, 3 model moves, 2 sync moves
        assert_eq!(sn.transitions.len(), 8);
        let count = |kind: MoveKind| {
            sn.transitions
                .values()
                .filter(|t| t.sync_move().is_some_and(|m| m.kind == kind))
                .count()
        };
        assert_eq!(count(MoveKind::LogMove), 3);
        assert_eq!(count(MoveKind::ModelMove), 3);
        assert_eq!(count(MoveKind::Sync), 2);
        assert_eq!(im.total_tokens(), 2);
        assert_eq!(fm.total_tokens(), 2);

        let sync_a = sn
            .transitions
            .values()
            .find(|t| t.name == "(t_0, ta)")
            .unwrap();
        assert_eq!(sn.preset_of_transition(sync_a.id()).len(), 2);
        assert_eq!(sn.postset_of_transition(sync_a.id()).len(), 2);
        assert!(sn.is_enabled(sync_a.id(), &im));

        let silent = sn
            .transitions
            .values()
            .find(|t| t.name == "(>>, tau)")
            .unwrap();
        assert!(silent.is_silent());
        assert!(silent.sync_move().unwrap().is_silent_model_move());
    }

    #[test]
    fn cost_aware_sync_product_defaults() {
        let (tn, tim, tfm) = construct_trace_net_from_activities(&["a"]).unwrap();
        let (mn, mim, mfm) = model_ab();
        let (sn, _, _, costs) = construct_cost_aware_sync_product(
            &tn,
            &tim,
            &tfm,
            &mn,
            &mim,
            &mfm,
            &CostFunction::new(),
            &CostFunction::new(),
            &SyncCostFunction::new(),
        )
        .unwrap();
        for t in sn.transitions.values() {
            let expected = match t.name.as_str() {
                "(t_0, ta)" => 0,
                "(>>, tau)" => STD_TAU_COST,
                _ => STD_MODEL_LOG_MOVE_COST,
            };
            assert_eq!(costs[&t.id()], expected, "{}", t.name);
        }
    }

    #[test]
    fn foreign_marking_is_rejected() {
        let (tn, tim, tfm) = construct_trace_net_from_activities(&["a"]).unwrap();
        let (mn, _, mfm) = model_ab();
        let foreign: Marking = [(PlaceID(uuid::Uuid::new_v4()), 1)].into_iter().collect();
        assert!(matches!(
            construct_sync_product(&tn, &tim, &tfm, &mn, &foreign, &mfm),
            Err(StructureError::MarkingOverUnknownPlace(_))
        ));
    }
}
