use crate::event_log::activity_projection::EventLogActivityProjection;
use crate::event_log::event_log_struct::{EventLog, EventLogClassifier, EventLogError};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use std::collections::{BTreeMap, BTreeSet};

/// Activity in a directly-follows graph.
pub type Activity = String;

/// A directly-follows graph of [`Activity`]s.
/// Graph containing a set of activities, a multiset of directly-follows relations, a multiset of
/// start activities, and a multiset of end activities.
/// Both, the number of occurrences of activities and of directly follows relations are annotated
/// with their frequency.
///
/// All collections are ordered, so iterating a graph is deterministic.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectlyFollowsGraph {
    /// Activities
    pub activities: BTreeMap<Activity, u64>,
    /// Directly-follows relations
    #[serde_as(as = "Vec<(_, _)>")]
    pub directly_follows_relations: BTreeMap<(Activity, Activity), u64>,
    /// Start activities
    pub start_activities: BTreeMap<Activity, u64>,
    /// End activities
    pub end_activities: BTreeMap<Activity, u64>,
}

impl DirectlyFollowsGraph {
    /// Create new [`DirectlyFollowsGraph`] with no activities and directly-follows relations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct a [`DirectlyFollowsGraph`] from an [`EventLog`], using `concept:name` as activity
    pub fn discover_dfg(event_log: &EventLog) -> Result<Self, EventLogError> {
        Self::discover_dfg_with_classifier(event_log, &EventLogClassifier::default())
    }

    /// Construct a [`DirectlyFollowsGraph`] from an [`EventLog`] using the specified [`EventLogClassifier`] to derive the 'activity' names
    ///
    /// Fails if an event lacks one of the classifier attributes. Empty traces contribute nothing.
    pub fn discover_dfg_with_classifier(
        event_log: &EventLog,
        classifier: &EventLogClassifier,
    ) -> Result<Self, EventLogError> {
        let projection = EventLogActivityProjection::try_from_log(event_log, classifier)?;
        Ok(Self::from_projection(&projection))
    }

    /// Construct a [`DirectlyFollowsGraph`] from the variants of an [`EventLogActivityProjection`]
    pub fn from_projection(projection: &EventLogActivityProjection) -> Self {
        let mut result = Self::new();
        for (trace, count) in &projection.traces {
            let names = projection.acts_to_names(trace);
            result.add_trace(&names, *count);
        }
        result
    }

    /// Construct a [`DirectlyFollowsGraph`] from activity sequences
    pub fn from_activity_sequences<S: AsRef<str>>(traces: &[Vec<S>]) -> Self {
        let mut result = Self::new();
        for trace in traces {
            result.add_trace(trace, 1);
        }
        result
    }

    /// Add `count` occurrences of a trace
    pub fn add_trace<S: AsRef<str>>(&mut self, trace: &[S], count: u64) {
        let (Some(first), Some(last)) = (trace.first(), trace.last()) else {
            return;
        };
        self.add_start_activity(first.as_ref().to_string(), count);
        self.add_end_activity(last.as_ref().to_string(), count);
        for act in trace {
            self.add_activity(act.as_ref().to_string(), count);
        }
        for pair in trace.windows(2) {
            self.add_df_relation(
                pair[0].as_ref().to_string(),
                pair[1].as_ref().to_string(),
                count,
            );
        }
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Add an activity with a frequency.
    ///
    /// If the activity already exists, the frequency count is added to the existing activity.
    pub fn add_activity(&mut self, activity: Activity, frequency: u64) {
        *self.activities.entry(activity).or_default() += frequency;
    }

    /// Adds an activity to the multiset of start activities.
    pub fn add_start_activity(&mut self, activity: Activity, frequency: u64) {
        *self.start_activities.entry(activity).or_default() += frequency;
    }

    /// Adds an activity to the multiset of end activities.
    pub fn add_end_activity(&mut self, activity: Activity, frequency: u64) {
        *self.end_activities.entry(activity).or_default() += frequency;
    }

    /// Add a directly-follows relation with a frequency.
    ///
    /// If the directly-follows relation already exists, the frequency count is added to the
    /// existing directly-follows relation.
    pub fn add_df_relation(&mut self, from: Activity, to: Activity, frequency: u64) {
        *self
            .directly_follows_relations
            .entry((from, to))
            .or_default() += frequency;
    }

    /// Checks if an activity is already contained in the directly-follows graph.
    pub fn contains_activity<S: AsRef<str>>(&self, activity: S) -> bool {
        self.activities.contains_key(activity.as_ref())
    }

    /// Checks if an activity is a start activity in the directly-follows graph.
    pub fn is_start_activity<S: AsRef<str>>(&self, activity: S) -> bool {
        self.start_activities.contains_key(activity.as_ref())
    }

    /// Checks if an activity is an end activity in the directly-follows graph.
    pub fn is_end_activity<S: AsRef<str>>(&self, activity: S) -> bool {
        self.end_activities.contains_key(activity.as_ref())
    }

    /// Checks if a directly-follows relation is contained in the directly-follows graph.
    pub fn contains_df_relation<S: AsRef<str>>(&self, (a, b): (S, S)) -> bool {
        self.df_weight(a, b) > 0
    }

    /// Frequency of the directly-follows relation `(a, b)` (0 if absent)
    pub fn df_weight<S: AsRef<str>>(&self, a: S, b: S) -> u64 {
        self.directly_follows_relations
            .get(&(a.as_ref().to_string(), b.as_ref().to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Removes an activity from the directly-follows graph.
    pub fn remove_activity<S: AsRef<str>>(&mut self, activity: S) {
        let is_present = self.activities.remove(activity.as_ref()).is_some();

        // Removes the activity from the start and end activities if existing
        if is_present {
            self.start_activities.remove(activity.as_ref());
            self.end_activities.remove(activity.as_ref());

            self.directly_follows_relations
                .retain(|(from, to), _| from != activity.as_ref() && to != activity.as_ref());
        }
    }

    /// Returns the ingoing activities of an activity in the directly-follows graph.
    pub fn ingoing_activities<S: AsRef<str>>(&self, activity: S) -> BTreeSet<&str> {
        self.directly_follows_relations
            .iter()
            .filter(|((_, to), w)| to == activity.as_ref() && **w > 0)
            .map(|((from, _), _)| from.as_str())
            .collect()
    }

    /// Returns the outgoing activities of an activity in the directly-follows graph.
    pub fn outgoing_activities<S: AsRef<str>>(&self, activity: S) -> BTreeSet<&str> {
        self.directly_follows_relations
            .iter()
            .filter(|((from, _), w)| from == activity.as_ref() && **w > 0)
            .map(|((_, to), _)| to.as_str())
            .collect()
    }

    /// Sum of the frequencies of the ingoing directly-follows relations of an activity
    pub fn ingoing_sum<S: AsRef<str>>(&self, activity: S) -> u64 {
        self.directly_follows_relations
            .iter()
            .filter(|((_, to), _)| to == activity.as_ref())
            .map(|(_, w)| *w)
            .sum()
    }

    /// Sum of the frequencies of the outgoing directly-follows relations of an activity
    pub fn outgoing_sum<S: AsRef<str>>(&self, activity: S) -> u64 {
        self.directly_follows_relations
            .iter()
            .filter(|((from, _), _)| from == activity.as_ref())
            .map(|(_, w)| *w)
            .sum()
    }

    ///
    /// Direction of an activity: `(out − in) / (in + out + 1)`
    ///
    /// Close to 1 for activities that mostly lead to others (early activities), close to −1 for
    /// activities that are mostly reached (late activities).
    pub fn direction<S: AsRef<str>>(&self, activity: S) -> f64 {
        let ingoing = self.ingoing_sum(activity.as_ref()) as f64;
        let outgoing = self.outgoing_sum(activity.as_ref()) as f64;
        (outgoing - ingoing) / (ingoing + outgoing + 1.0)
    }

    /// Highest frequency of any directly-follows relation (0 without relations)
    pub fn max_edge_weight(&self) -> u64 {
        self.directly_follows_relations
            .values()
            .copied()
            .max()
            .unwrap_or(0)
    }

    ///
    /// Sub-graph induced by a set of activities
    ///
    /// Keeps the activities of `keep`, the relations between them and their start/end frequencies.
    pub fn project(&self, keep: &BTreeSet<Activity>) -> Self {
        let filter = |m: &BTreeMap<Activity, u64>| -> BTreeMap<Activity, u64> {
            m.iter()
                .filter(|(a, _)| keep.contains(*a))
                .map(|(a, w)| (a.clone(), *w))
                .collect()
        };
        Self {
            activities: filter(&self.activities),
            directly_follows_relations: self
                .directly_follows_relations
                .iter()
                .filter(|((a, b), _)| keep.contains(a) && keep.contains(b))
                .map(|(k, w)| (k.clone(), *w))
                .collect(),
            start_activities: filter(&self.start_activities),
            end_activities: filter(&self.end_activities),
        }
    }
}

#[cfg(test)]
mod tests {
    pub const SAMPLE_JSON_DFG: &str = r#"
{
    "activities": {
        "Sleep": 13,
        "Cook": 3,
        "Work": 11,
        "Have fun": 9
    },
    "directly_follows_relations": [
        [
            ["Work","Sleep"],
            4
        ],
        [
            ["Have fun","Sleep"],
            9
        ],
        [
            ["Work","Have fun"],
            6
        ],
        [
            ["Cook","Have fun"],
            3
        ]
    ],
    "start_activities": {
        "Work": 8,
        "Cook": 3
    },
    "end_activities": {
        "Work": 1,
        "Sleep": 10
    }
}"#;

    use super::*;

    #[test]
    fn directly_follows_graph() {
        let mut graph = DirectlyFollowsGraph::new();
        graph.add_activity("Work".into(), 11);
        graph.add_start_activity("Work".into(), 8);
        graph.add_end_activity("Work".into(), 1);

        graph.add_activity("Cook".into(), 3);
        graph.add_start_activity("Cook".into(), 3);

        graph.add_activity("Have fun".into(), 9);
        graph.add_df_relation("Work".into(), "Have fun".into(), 6);
        graph.add_df_relation("Cook".into(), "Have fun".into(), 3);

        graph.add_activity("Sleep".into(), 13);
        graph.add_df_relation("Work".into(), "Sleep".into(), 4);
        graph.add_df_relation("Have fun".into(), "Sleep".into(), 9);
        graph.add_end_activity("Sleep".into(), 10);

        let mut test_map = BTreeMap::new();
        test_map.insert("Work".to_string(), 11);
        test_map.insert("Cook".to_string(), 3);
        test_map.insert("Have fun".to_string(), 9);
        test_map.insert("Sleep".to_string(), 13);
        assert_eq!(graph.activities, test_map);

        let parsed = DirectlyFollowsGraph::from_json(SAMPLE_JSON_DFG).unwrap();
        assert_eq!(parsed, graph);
        assert_eq!(
            DirectlyFollowsGraph::from_json(&graph.to_json().unwrap()).unwrap(),
            graph
        );
    }

    #[test]
    fn discover_from_log() {
        let log = EventLog::from_activity_traces(&[
            vec!["a", "b", "c", "d"],
            vec!["a", "c", "b", "d"],
            vec![],
        ]);
        let dfg = DirectlyFollowsGraph::discover_dfg(&log).unwrap();
        assert_eq!(dfg.activities.len(), 4);
        assert_eq!(dfg.directly_follows_relations.len(), 6);
        assert!(dfg.contains_df_relation(("b", "c")));
        assert!(dfg.contains_df_relation(("c", "b")));
        assert!(!dfg.contains_df_relation(("d", "a")));
        assert_eq!(dfg.start_activities.get("a"), Some(&2));
        assert_eq!(dfg.end_activities.get("d"), Some(&2));
        assert_eq!(
            dfg.outgoing_activities("a"),
            ["b", "c"].into_iter().collect()
        );
        assert_eq!(dfg.ingoing_sum("d"), 2);
        assert!(dfg.direction("a") > 0.5);
        assert!(dfg.direction("d") < -0.5);
        assert_eq!(dfg.direction("b"), 0.0);
    }

    #[test]
    fn projection_keeps_inner_relations() {
        let dfg = DirectlyFollowsGraph::from_activity_sequences(&[vec!["a", "b", "c"]]);
        let sub = dfg.project(&["b".to_string(), "c".to_string()].into_iter().collect());
        assert_eq!(sub.activities.len(), 2);
        assert_eq!(sub.directly_follows_relations.len(), 1);
        assert!(sub.start_activities.is_empty());
        assert_eq!(sub.end_activities.get("c"), Some(&1));
        assert_eq!(sub.max_edge_weight(), 1);
    }
}
