use std::collections::{BTreeMap, BTreeSet};

use crate::dfg::dfg_struct::{Activity, DirectlyFollowsGraph};

/// Trace variants (activity sequences) with their frequencies
pub type SubLog = BTreeMap<Vec<Activity>, u64>;

fn add_variant(log: &mut SubLog, trace: Vec<Activity>, count: u64) {
    *log.entry(trace).or_insert(0) += count;
}

fn project_trace(trace: &[Activity], part: &BTreeSet<Activity>) -> Vec<Activity> {
    trace.iter().filter(|a| part.contains(*a)).cloned().collect()
}

/// Directly-follows graph of a sub-log
pub fn sublog_dfg(log: &SubLog) -> DirectlyFollowsGraph {
    let mut dfg = DirectlyFollowsGraph::new();
    for (trace, count) in log {
        dfg.add_trace(trace, *count);
    }
    dfg
}

/// Whether some trace of `log` is empty
pub fn has_empty_trace(log: &SubLog) -> bool {
    log.keys().any(|t| t.is_empty())
}

/// `log` without its empty traces
pub fn without_empty_traces(log: &SubLog) -> SubLog {
    log.iter()
        .filter(|(t, _)| !t.is_empty())
        .map(|(t, c)| (t.clone(), *c))
        .collect()
}

///
/// Split for an exclusive choice cut
///
/// Every trace goes to the part holding most of its events (the first such part on ties) and is
/// projected onto it. Without noise filtering all events of a trace lie in one part.
pub fn split_exclusive(log: &SubLog, parts: &[BTreeSet<Activity>]) -> Vec<SubLog> {
    let mut result = vec![SubLog::new(); parts.len()];
    for (trace, count) in log {
        let mut best = 0;
        let mut best_hits = 0;
        for (i, part) in parts.iter().enumerate() {
            let hits = trace.iter().filter(|a| part.contains(*a)).count();
            if hits > best_hits {
                best = i;
                best_hits = hits;
            }
        }
        add_variant(&mut result[best], project_trace(trace, &parts[best]), *count);
    }
    result
}

///
/// Split for a sequence cut
///
/// Each trace is cut before its first event of `second`. The prefix is projected onto `first`,
/// the suffix onto `second`; either may be empty.
pub fn split_sequence(
    log: &SubLog,
    first: &BTreeSet<Activity>,
    second: &BTreeSet<Activity>,
) -> (SubLog, SubLog) {
    let mut first_log = SubLog::new();
    let mut second_log = SubLog::new();
    for (trace, count) in log {
        let at = trace
            .iter()
            .position(|a| second.contains(a))
            .unwrap_or(trace.len());
        add_variant(&mut first_log, project_trace(&trace[..at], first), *count);
        add_variant(&mut second_log, project_trace(&trace[at..], second), *count);
    }
    (first_log, second_log)
}

/// Split for a concurrency cut: every trace is projected onto every part
pub fn split_parallel(log: &SubLog, parts: &[BTreeSet<Activity>]) -> Vec<SubLog> {
    parts
        .iter()
        .map(|part| {
            let mut sub = SubLog::new();
            for (trace, count) in log {
                add_variant(&mut sub, project_trace(trace, part), *count);
            }
            sub
        })
        .collect()
}

///
/// Split for a loop cut
///
/// Traces are cut into maximal runs of `body` and of redo activities. Body runs go to the first,
/// redo runs to the second log. A trace starting or ending with a redo run contributes an empty
/// body run there, so that body and redo runs alternate.
pub fn split_loop(log: &SubLog, body: &BTreeSet<Activity>) -> (SubLog, SubLog) {
    let mut body_log = SubLog::new();
    let mut redo_log = SubLog::new();
    for (trace, count) in log {
        let mut runs: Vec<(bool, Vec<Activity>)> = Vec::new();
        for a in trace {
            let in_body = body.contains(a);
            match runs.last_mut() {
                Some((b, run)) if *b == in_body => run.push(a.clone()),
                _ => runs.push((in_body, vec![a.clone()])),
            }
        }
        if matches!(runs.first(), Some((false, _))) {
            runs.insert(0, (true, Vec::new()));
        }
        if matches!(runs.last(), Some((false, _))) {
            runs.push((true, Vec::new()));
        }
        for (in_body, run) in runs {
            if in_body {
                add_variant(&mut body_log, run, *count);
            } else {
                add_variant(&mut redo_log, run, *count);
            }
        }
    }
    (body_log, redo_log)
}

/// Smallest activity occurring exactly once in every trace of `log`
pub fn activity_once_per_trace(log: &SubLog) -> Option<Activity> {
    let mut candidates: Option<BTreeSet<&Activity>> = None;
    for trace in log.keys() {
        let mut occurrences: BTreeMap<&Activity, usize> = BTreeMap::new();
        for a in trace {
            *occurrences.entry(a).or_insert(0) += 1;
        }
        let once: BTreeSet<&Activity> = occurrences
            .into_iter()
            .filter(|(_, n)| *n == 1)
            .map(|(a, _)| a)
            .collect();
        candidates = Some(match candidates {
            None => once,
            Some(c) => c.intersection(&once).copied().collect(),
        });
    }
    candidates?.into_iter().next().cloned()
}

/// `log` with all events of `activity` removed
pub fn remove_activity(log: &SubLog, activity: &str) -> SubLog {
    let mut result = SubLog::new();
    for (trace, count) in log {
        let trace = trace.iter().filter(|a| *a != activity).cloned().collect();
        add_variant(&mut result, trace, *count);
    }
    result
}

fn split_traces_where<F>(log: &SubLog, cut_before: F) -> Option<SubLog>
where
    F: Fn(&Activity, &Activity) -> bool,
{
    let mut result = SubLog::new();
    let mut changed = false;
    for (trace, count) in log {
        let mut start = 0;
        for i in 1..trace.len() {
            if cut_before(&trace[i - 1], &trace[i]) {
                add_variant(&mut result, trace[start..i].to_vec(), *count);
                start = i;
                changed = true;
            }
        }
        add_variant(&mut result, trace[start..].to_vec(), *count);
    }
    changed.then_some(result)
}

///
/// Cut traces wherever an end activity is directly followed by a start activity
///
/// `None` if no trace is cut.
pub fn strict_tau_loop(log: &SubLog, dfg: &DirectlyFollowsGraph) -> Option<SubLog> {
    split_traces_where(log, |a, b| {
        dfg.is_end_activity(a) && dfg.is_start_activity(b)
    })
}

///
/// Cut traces before every (non-initial) occurrence of a start activity
///
/// `None` if no trace is cut.
pub fn tau_loop(log: &SubLog, dfg: &DirectlyFollowsGraph) -> Option<SubLog> {
    split_traces_where(log, |_, b| dfg.is_start_activity(b))
}
