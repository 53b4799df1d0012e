/// Common identifying field for event identities (i.e., activities)
///
/// _Note_: While the concept XES extension is the de-facto standard for identifying activity names,
/// some logs might not use `concept:name` or have events without a `concept:name` attribute.
/// Pass an [`EventLogClassifier`](super::event_log_struct::EventLogClassifier) with other keys in that case.
pub const ACTIVITY_NAME: &str = "concept:name";
