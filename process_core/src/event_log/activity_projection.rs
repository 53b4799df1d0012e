use std::collections::{BTreeSet, HashMap};

use rayon::prelude::*;

use super::event_log_struct::{EventLog, EventLogClassifier, EventLogError};

#[derive(Debug, Clone)]
/// Projection of an event log on just activity labels
///
/// Activities are sorted, so that activity indices are stable across runs.
/// Traces are grouped into variants (in order of their first occurrence in the log).
pub struct EventLogActivityProjection {
    /// Sorted activity labels
    pub activities: Vec<String>,
    /// Activity label to index into `activities`
    pub act_to_index: HashMap<String, usize>,
    /// Variants (activity index sequence) together with their frequency
    pub traces: Vec<(Vec<usize>, u64)>,
    /// For each trace of the original log: the index of its variant in `traces`
    pub trace_to_variant: Vec<usize>,
}

impl EventLogActivityProjection {
    /// Project an [`EventLog`] using the passed [`EventLogClassifier`]
    ///
    /// Fails if any event lacks one of the classifier attributes.
    pub fn try_from_log(
        log: &EventLog,
        classifier: &EventLogClassifier,
    ) -> Result<Self, EventLogError> {
        let acts_per_trace: Vec<Vec<String>> = log
            .traces
            .par_iter()
            .enumerate()
            .map(|(i, t)| t.activities(classifier).map_err(|e| e.at_trace(i)))
            .collect::<Result<_, _>>()?;
        Ok(Self::from_activity_sequences(acts_per_trace))
    }

    /// Build a projection from plain activity sequences
    pub fn from_activity_sequences(acts_per_trace: Vec<Vec<String>>) -> Self {
        let activity_set: BTreeSet<&String> = acts_per_trace.iter().flatten().collect();
        let activities: Vec<String> = activity_set.into_iter().cloned().collect();
        let act_to_index: HashMap<String, usize> = activities
            .iter()
            .enumerate()
            .map(|(i, act)| (act.clone(), i))
            .collect();
        let mut variant_index: HashMap<Vec<usize>, usize> = HashMap::new();
        let mut traces: Vec<(Vec<usize>, u64)> = Vec::new();
        let mut trace_to_variant = Vec::with_capacity(acts_per_trace.len());
        for t in &acts_per_trace {
            let trace: Vec<usize> = t.iter().map(|act| act_to_index[act]).collect();
            let index = *variant_index.entry(trace.clone()).or_insert_with(|| {
                traces.push((trace, 0));
                traces.len() - 1
            });
            traces[index].1 += 1;
            trace_to_variant.push(index);
        }
        EventLogActivityProjection {
            activities,
            act_to_index,
            traces,
            trace_to_variant,
        }
    }

    /// Translate activity indices back to their labels
    pub fn acts_to_names(&self, acts: &[usize]) -> Vec<String> {
        acts.iter()
            .map(|act| self.activities[*act].clone())
            .collect()
    }
}
