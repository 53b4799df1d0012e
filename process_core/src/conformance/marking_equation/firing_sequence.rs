use crate::petri_net::petri_net_struct::{Marking, PetriNet, TransitionID};

/// Replay of a transition multiset (see [`search_path_among_sol`])
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiringSequence {
    /// Fired transitions, in firing order
    pub sequence: Vec<TransitionID>,
    /// Marking reached after firing `sequence`
    pub reached: Marking,
    /// Whether `reached` is the final marking
    pub reaches_fm: bool,
    /// Number of fired transitions that consume a trace event (synchronous and log moves)
    pub explained_events: usize,
}

///
/// Replay a multiset of transitions from `im`
///
/// Repeatedly fires the first transition (in the order of `candidates`) that is enabled and
/// still has a positive residual count. Stops when no such transition exists.
///
/// Returns the fired sequence, whether `fm` was reached and how many trace events the
/// sequence explains.
pub fn search_path_among_sol(
    net: &PetriNet,
    im: &Marking,
    fm: &Marking,
    candidates: &[(TransitionID, u64)],
) -> FiringSequence {
    let mut residual: Vec<u64> = candidates.iter().map(|(_, n)| *n).collect();
    let mut marking = im.clone();
    let mut sequence = Vec::new();
    let mut explained_events = 0;
    loop {
        let next = candidates
            .iter()
            .enumerate()
            .find(|(i, (t, _))| residual[*i] > 0 && net.is_enabled(*t, &marking));
        let Some((i, (t, _))) = next else {
            break;
        };
        residual[i] -= 1;
        marking = net.weak_execute(*t, &marking);
        if net
            .transition(t)
            .and_then(|tr| tr.sync_move())
            .is_some_and(|m| m.log.is_some())
        {
            explained_events += 1;
        }
        sequence.push(*t);
    }
    FiringSequence {
        sequence,
        reaches_fm: &marking == fm,
        reached: marking,
        explained_events,
    }
}

/// Turn a (possibly fractional) firing count vector into integral candidate counts
///
/// Entries are floored (with a small tolerance); `transitions[i]` belongs to `x[i]`.
pub fn candidates_from_solution(transitions: &[TransitionID], x: &[f64]) -> Vec<(TransitionID, u64)> {
    transitions
        .iter()
        .zip(x)
        .filter_map(|(t, v)| {
            let n = (v + 1e-6).floor();
            (n >= 1.0).then_some((*t, n as u64))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::petri_net::petri_net_struct::ArcType;

    #[test]
    fn replays_in_enabled_order() {
        let mut net = PetriNet::new();
        let p = net.add_place("p");
        let q = net.add_place("q");
        let r = net.add_place("r");
        let a = net.add_transition("a", Some("a".into()));
        let b = net.add_transition("b", Some("b".into()));
        net.add_arc(ArcType::place_to_transition(p, a), None).unwrap();
        net.add_arc(ArcType::transition_to_place(a, q), None).unwrap();
        net.add_arc(ArcType::place_to_transition(q, b), None).unwrap();
        net.add_arc(ArcType::transition_to_place(b, r), None).unwrap();
        let im: Marking = [(p, 1)].into_iter().collect();
        let fm: Marking = [(r, 1)].into_iter().collect();

        // b is listed first but only enabled after a
        let res = search_path_among_sol(&net, &im, &fm, &[(b, 1), (a, 1)]);
        assert_eq!(res.sequence, vec![a, b]);
        assert!(res.reaches_fm);
        assert_eq!(res.explained_events, 0);

        let res = search_path_among_sol(&net, &im, &fm, &[(b, 1)]);
        assert!(res.sequence.is_empty());
        assert!(!res.reaches_fm);
        assert_eq!(res.reached, im);
    }

    #[test]
    fn fractional_counts_are_floored() {
        let t1 = TransitionID(uuid::Uuid::new_v4());
        let t2 = TransitionID(uuid::Uuid::new_v4());
        let t3 = TransitionID(uuid::Uuid::new_v4());
        assert_eq!(
            candidates_from_solution(&[t1, t2, t3], &[0.9999999, 0.5, 2.0]),
            vec![(t1, 1), (t3, 2)]
        );
    }
}
