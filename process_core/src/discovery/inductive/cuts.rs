use std::collections::{BTreeMap, BTreeSet};

use ordered_float::OrderedFloat;
use petgraph::unionfind::UnionFind;

use crate::dfg::dfg_struct::{Activity, DirectlyFollowsGraph};

/// Loop cut threshold on the [`DirectlyFollowsGraph::direction`] of redo candidates
pub const DEFAULT_LOOP_THRESHOLD: f64 = 0.2;

///
/// Cut of the activities of a [`DirectlyFollowsGraph`]
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cut {
    /// Disconnected parts (exclusive choice)
    Exclusive(Vec<BTreeSet<Activity>>),
    /// First part, then second part
    Sequence(BTreeSet<Activity>, BTreeSet<Activity>),
    /// Parts that are fully interleaved (concurrency)
    Parallel(Vec<BTreeSet<Activity>>),
    /// Do part and redo part
    Loop(BTreeSet<Activity>, BTreeSet<Activity>),
}

/// Connected components of the activities of `dfg` under the symmetric relation `connected`
///
/// Components are sorted by their smallest activity.
fn components<F>(
    dfg: &DirectlyFollowsGraph,
    acts: &[&Activity],
    connected: F,
) -> Vec<BTreeSet<Activity>>
where
    F: Fn(&DirectlyFollowsGraph, &str, &str) -> bool,
{
    let mut uf = UnionFind::<usize>::new(acts.len());
    for (i, a) in acts.iter().enumerate() {
        for (j, b) in acts.iter().enumerate().skip(i + 1) {
            if connected(dfg, a.as_str(), b.as_str()) {
                uf.union(i, j);
            }
        }
    }
    let mut groups: BTreeMap<usize, BTreeSet<Activity>> = BTreeMap::new();
    for (i, label) in uf.into_labeling().into_iter().enumerate() {
        groups.entry(label).or_default().insert(acts[i].clone());
    }
    let mut result: Vec<BTreeSet<Activity>> = groups.into_values().collect();
    result.sort();
    result
}

///
/// Exclusive choice cut: weakly connected components of the graph
///
pub fn exclusive_cut(dfg: &DirectlyFollowsGraph) -> Option<Vec<BTreeSet<Activity>>> {
    let acts: Vec<&Activity> = dfg.activities.keys().collect();
    let parts = components(dfg, &acts, |dfg, a, b| {
        dfg.contains_df_relation((a, b)) || dfg.contains_df_relation((b, a))
    });
    (parts.len() >= 2).then_some(parts)
}

///
/// Sequence cut into two parts such that no relation leads from the second part back
/// to the first one
///
/// Activities are visited by decreasing direction. The first part starts with the highest,
/// the second part with the lowest direction activity. Each other activity joins the first part
/// if it leads into it and is not reached from the second part, the second part in the mirrored
/// case, and otherwise the part its direction points to. An activity that both leads into the
/// first part and is reached from the second one makes the cut fail.
pub fn sequence_cut(
    dfg: &DirectlyFollowsGraph,
) -> Option<(BTreeSet<Activity>, BTreeSet<Activity>)> {
    let mut acts: Vec<&Activity> = dfg.activities.keys().collect();
    if acts.len() < 2 {
        return None;
    }
    acts.sort_by(|a, b| {
        OrderedFloat(dfg.direction(b.as_str()))
            .cmp(&OrderedFloat(dfg.direction(a.as_str())))
            .then_with(|| a.cmp(b))
    });

    let mut first: BTreeSet<Activity> = BTreeSet::new();
    let mut second: BTreeSet<Activity> = BTreeSet::new();
    first.insert(acts[0].clone());
    second.insert(acts[acts.len() - 1].clone());
    for a in &acts[1..acts.len() - 1] {
        let leads_into_first = first
            .iter()
            .any(|b| dfg.contains_df_relation((a.as_str(), b.as_str())));
        let reached_from_second = second
            .iter()
            .any(|b| dfg.contains_df_relation((b.as_str(), a.as_str())));
        match (leads_into_first, reached_from_second) {
            (true, false) => first.insert((*a).clone()),
            (false, true) => second.insert((*a).clone()),
            (true, true) => return None,
            (false, false) if dfg.direction(a.as_str()) > 0.0 => first.insert((*a).clone()),
            (false, false) => second.insert((*a).clone()),
        };
    }

    let backwards = dfg
        .directly_follows_relations
        .iter()
        .any(|((a, b), w)| *w > 0 && second.contains(a) && first.contains(b));
    (!backwards).then_some((first, second))
}

///
/// Concurrency cut: connected components of the negated graph
///
/// Two activities are connected in the negated graph unless they directly follow each other
/// in both directions. Accepted only if all pairs of activities of different parts follow each
/// other in both directions and every part contains a start and an end activity.
pub fn parallel_cut(dfg: &DirectlyFollowsGraph) -> Option<Vec<BTreeSet<Activity>>> {
    let acts: Vec<&Activity> = dfg.activities.keys().collect();
    let parts = components(dfg, &acts, |dfg, a, b| {
        !(dfg.contains_df_relation((a, b)) && dfg.contains_df_relation((b, a)))
    });
    if parts.len() < 2 {
        return None;
    }
    for (i, part) in parts.iter().enumerate() {
        if !part.iter().any(|a| dfg.is_start_activity(a))
            || !part.iter().any(|a| dfg.is_end_activity(a))
        {
            return None;
        }
        for other in &parts[i + 1..] {
            let interleaved = part.iter().all(|a| {
                other
                    .iter()
                    .all(|b| dfg.contains_df_relation((a, b)) && dfg.contains_df_relation((b, a)))
            });
            if !interleaved {
                return None;
            }
        }
    }
    Some(parts)
}

///
/// Loop cut into a do part and a redo part
///
/// Redo candidates are the predecessors of the highest direction activity whose direction is
/// below `loop_threshold` and which are neither start nor end activities. The redo part is made
/// of the components (after removing start and end activities) containing a candidate. The cut
/// is accepted only if the redo part is entered from end activities only and leads to start
/// activities only.
pub fn loop_cut(
    dfg: &DirectlyFollowsGraph,
    loop_threshold: f64,
) -> Option<(BTreeSet<Activity>, BTreeSet<Activity>)> {
    if dfg.start_activities.is_empty() || dfg.end_activities.is_empty() {
        return None;
    }
    let top = dfg.activities.keys().max_by(|a, b| {
        OrderedFloat(dfg.direction(a.as_str()))
            .cmp(&OrderedFloat(dfg.direction(b.as_str())))
            .then_with(|| b.cmp(a))
    })?;
    let is_border = |a: &str| dfg.is_start_activity(a) || dfg.is_end_activity(a);
    let candidates: BTreeSet<&str> = dfg
        .ingoing_activities(top)
        .into_iter()
        .filter(|a| dfg.direction(*a) < loop_threshold && !is_border(*a))
        .collect();
    if candidates.is_empty() {
        return None;
    }

    let inner: Vec<&Activity> = dfg
        .activities
        .keys()
        .filter(|a| !is_border(a.as_str()))
        .collect();
    let redo: BTreeSet<Activity> = components(dfg, &inner, |dfg, a, b| {
        dfg.contains_df_relation((a, b)) || dfg.contains_df_relation((b, a))
    })
    .into_iter()
    .filter(|part| part.iter().any(|a| candidates.contains(a.as_str())))
    .flatten()
    .collect();
    let body: BTreeSet<Activity> = dfg
        .activities
        .keys()
        .filter(|a| !redo.contains(*a))
        .cloned()
        .collect();

    for ((a, b), w) in &dfg.directly_follows_relations {
        if *w == 0 {
            continue;
        }
        if redo.contains(a) && body.contains(b) && !dfg.is_start_activity(b) {
            return None;
        }
        if body.contains(a) && redo.contains(b) && !dfg.is_end_activity(a) {
            return None;
        }
    }
    Some((body, redo))
}

///
/// Find a cut, trying exclusive choice, sequence, concurrency and loop in this order
///
pub fn find_cut(dfg: &DirectlyFollowsGraph, loop_threshold: f64) -> Option<Cut> {
    if let Some(parts) = exclusive_cut(dfg) {
        return Some(Cut::Exclusive(parts));
    }
    if let Some((first, second)) = sequence_cut(dfg) {
        return Some(Cut::Sequence(first, second));
    }
    if let Some(parts) = parallel_cut(dfg) {
        return Some(Cut::Parallel(parts));
    }
    loop_cut(dfg, loop_threshold).map(|(body, redo)| Cut::Loop(body, redo))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(acts: &[&str]) -> BTreeSet<Activity> {
        acts.iter().map(|a| a.to_string()).collect()
    }

    fn dfg_of(traces: &[Vec<&str>]) -> DirectlyFollowsGraph {
        DirectlyFollowsGraph::from_activity_sequences(traces)
    }

    #[test]
    fn exclusive_components() {
        let dfg = dfg_of(&[vec!["a", "b"], vec!["c"], vec!["d", "e"]]);
        assert_eq!(
            exclusive_cut(&dfg),
            Some(vec![set(&["a", "b"]), set(&["c"]), set(&["d", "e"])])
        );
        assert_eq!(exclusive_cut(&dfg_of(&[vec!["a", "b", "c"]])), None);
    }

    #[test]
    fn sequence_split() {
        let mut dfg = dfg_of(&[vec!["a", "b", "c"]]);
        dfg.add_trace(&["a", "b", "c"], 99);
        dfg.add_trace(&["a", "c"], 1);
        assert_eq!(sequence_cut(&dfg), Some((set(&["a"]), set(&["b", "c"]))));

        let looping = dfg_of(&[vec!["a", "b", "a"]]);
        assert_eq!(sequence_cut(&looping), None);
    }

    #[test]
    fn parallel_parts() {
        let dfg = dfg_of(&[vec!["a", "b"], vec!["b", "a"]]);
        assert_eq!(parallel_cut(&dfg), Some(vec![set(&["a"]), set(&["b"])]));
        assert_eq!(sequence_cut(&dfg), None);

        // b is never first
        let dfg = dfg_of(&[vec!["a", "b", "a"], vec!["a", "b", "a", "b", "a"]]);
        assert_eq!(parallel_cut(&dfg), None);
    }

    #[test]
    fn loop_parts() {
        let dfg = dfg_of(&[vec!["a", "b", "a"], vec!["a", "b", "a", "b", "a"], vec!["a"]]);
        assert_eq!(loop_cut(&dfg, DEFAULT_LOOP_THRESHOLD), Some((set(&["a"]), set(&["b"]))));
        assert_eq!(
            find_cut(&dfg, DEFAULT_LOOP_THRESHOLD),
            Some(Cut::Loop(set(&["a"]), set(&["b"])))
        );
    }

    #[test]
    fn loop_redo_must_return_to_start() {
        // Nothing leads back to a, the activity with the highest direction
        let dfg = dfg_of(&[vec!["a", "b", "d"], vec!["a", "b", "c", "b", "d"]]);
        assert_eq!(loop_cut(&dfg, DEFAULT_LOOP_THRESHOLD), None);
    }
}
