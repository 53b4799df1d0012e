use chrono::{serde::ts_milliseconds, DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::constants::ACTIVITY_NAME;

///
/// Possible attribute values of events and traces
///
/// Classifiers read them through [`AttributeValue::as_class_identity`].
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "content")]
pub enum AttributeValue {
    /// String values
    String(String),
    #[serde(with = "ts_milliseconds")]
    /// DateTime values
    Date(DateTime<Utc>),
    /// Integer values
    Int(i64),
    /// Float values
    Float(f64),
    /// Boolean values
    Boolean(bool),
    /// IDs (UUIDs)
    ID(Uuid),
    /// Used to represent invalid values (e.g., DateTime which could not be parsed)
    None(),
}

impl AttributeValue {
    ///
    /// Value as part of a class identity
    ///
    /// Strings are taken as they are, other values in their canonical text form (dates as
    /// RFC 3339). [`AttributeValue::None`] has no identity.
    pub fn as_class_identity(&self) -> Option<String> {
        match self {
            AttributeValue::String(v) => Some(v.clone()),
            AttributeValue::Date(v) => Some(v.to_rfc3339()),
            AttributeValue::Int(v) => Some(v.to_string()),
            AttributeValue::Float(v) => Some(v.to_string()),
            AttributeValue::Boolean(v) => Some(v.to_string()),
            AttributeValue::ID(v) => Some(v.to_string()),
            AttributeValue::None() => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
///
/// Attribute made up of the key and value
///
pub struct Attribute {
    /// Attribute key
    pub key: String,
    /// Attribute value
    pub value: AttributeValue,
}

impl Attribute {
    ///
    /// Helper to create a new attribute
    ///
    pub fn new(key: String, attribute_val: AttributeValue) -> Self {
        Self {
            key,
            value: attribute_val,
        }
    }
}

///
/// Attributes are [`Vec`]s of [`Attribute`]s
///
/// See the [`XESEditableAttribute`] trait for convenient functions to add or remove attributes by key.
pub type Attributes = Vec<Attribute>;

///
/// Trait to easily add and look up attributes
///
pub trait XESEditableAttribute {
    ///
    /// Add a new attribute (with key and value)
    ///
    /// Note: Does _not_ check if attribute was already present.
    ///
    fn add_to_attributes(&mut self, key: String, value: AttributeValue);
    ///
    /// Get an attribute by key
    ///
    /// _Complexity_: Does linear lookup (i.e., in O(n)).
    fn get_by_key(&self, key: &str) -> Option<&Attribute>;
    ///
    /// Remove attribute with given key
    ///
    /// Returns `true` if the attribute was present and `false` otherwise
    fn remove_with_key(&mut self, key: &str) -> bool;
}

impl XESEditableAttribute for Attributes {
    fn add_to_attributes(&mut self, key: String, value: AttributeValue) {
        self.push(Attribute::new(key, value));
    }

    fn get_by_key(&self, key: &str) -> Option<&Attribute> {
        self.iter().find(|attr| attr.key == key)
    }

    fn remove_with_key(&mut self, key: &str) -> bool {
        let index_opt = self.iter().position(|a| a.key == key);
        if let Some(index) = index_opt {
            self.remove(index);
            return true;
        }
        false
    }
}

///
/// An event consists of multiple (event) attributes ([Attributes])
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event attributes
    pub attributes: Attributes,
}

impl Event {
    /// Create a new event with the provided activity
    ///
    /// Implicitly assumes usage of the concept XES extension (i.e., uses [`ACTIVITY_NAME`] as key)
    pub fn new(activity: String) -> Self {
        Event {
            attributes: vec![Attribute::new(
                ACTIVITY_NAME.to_string(),
                AttributeValue::String(activity),
            )],
        }
    }
}

///
/// A trace consists of a list of events and trace attributes (See also [`Event`] and [`Attributes`])
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Trace {
    /// Trace-level attributes
    pub attributes: Attributes,
    /// Events contained in trace
    pub events: Vec<Event>,
}

impl Trace {
    /// Create a new empty trace
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a trace with one event per passed activity (using [`ACTIVITY_NAME`] as key)
    pub fn from_activities<S: AsRef<str>>(activities: &[S]) -> Self {
        Self {
            attributes: Attributes::new(),
            events: activities
                .iter()
                .map(|a| Event::new(a.as_ref().to_string()))
                .collect(),
        }
    }

    /// Get the activity sequence of this trace using the given classifier
    ///
    /// Fails with [`EventLogError::NoActivity`] for the first event that lacks one of the classifier keys
    pub fn activities(&self, classifier: &EventLogClassifier) -> Result<Vec<String>, EventLogError> {
        self.events
            .iter()
            .enumerate()
            .map(|(i, e)| {
                classifier
                    .try_get_class_identity(e)
                    .map_err(|err| err.at_event(i))
            })
            .collect()
    }
}

///
/// Event log consisting of a list of [`Trace`]s and log [`Attributes`]
///
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EventLog {
    /// Top-level attributes
    pub attributes: Attributes,
    /// Traces contained in log
    pub traces: Vec<Trace>,
}

impl EventLog {
    /// Create a new empty event log
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an event log from activity sequences (one trace per sequence)
    pub fn from_activity_traces<S: AsRef<str>>(traces: &[Vec<S>]) -> Self {
        Self {
            attributes: Attributes::new(),
            traces: traces.iter().map(|t| Trace::from_activities(t)).collect(),
        }
    }
}

///
/// Errors that occur when reading activities from events
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventLogError {
    /// An event lacks the configured activity attribute (or its value is [`AttributeValue::None`])
    NoActivity {
        /// Index of the trace in its log
        trace_index: usize,
        /// Index of the event in its trace
        event_index: usize,
        /// Missing attribute key
        key: String,
    },
}

impl EventLogError {
    fn at_event(self, index: usize) -> Self {
        match self {
            EventLogError::NoActivity {
                trace_index, key, ..
            } => EventLogError::NoActivity {
                trace_index,
                event_index: index,
                key,
            },
        }
    }

    pub(crate) fn at_trace(self, index: usize) -> Self {
        match self {
            EventLogError::NoActivity {
                event_index, key, ..
            } => EventLogError::NoActivity {
                trace_index: index,
                event_index,
                key,
            },
        }
    }
}

impl std::fmt::Display for EventLogError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventLogError::NoActivity {
                trace_index,
                event_index,
                key,
            } => write!(
                f,
                "Event {} of trace {} has no activity attribute '{}'",
                event_index, trace_index, key
            ),
        }
    }
}

impl std::error::Error for EventLogError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
/// Event classifier
///
/// Enables classifying events by a set of attributes to consider for the _class identity_ (i.e., the activity)
pub struct EventLogClassifier {
    /// Name of the classifier
    pub name: String,
    /// List of attribute keys to consider for the _class identity_
    pub keys: Vec<String>,
}

impl Default for EventLogClassifier {
    fn default() -> Self {
        Self {
            name: "Activity".to_string(),
            keys: vec![ACTIVITY_NAME.to_string()],
        }
    }
}

impl EventLogClassifier {
    /// Delimiter for combining the values defined by the classifer to form a single class identity string
    pub const DELIMITER: &'static str = "+";

    ///
    /// Get the class identity, failing with [`EventLogError::NoActivity`] if a key is missing
    ///
    pub fn try_get_class_identity(&self, ev: &Event) -> Result<String, EventLogError> {
        let mut parts = Vec::with_capacity(self.keys.len());
        for k in &self.keys {
            match ev
                .attributes
                .get_by_key(k)
                .and_then(|at| at.value.as_class_identity())
            {
                Some(s) => parts.push(s),
                None => {
                    return Err(EventLogError::NoActivity {
                        trace_index: 0,
                        event_index: 0,
                        key: k.clone(),
                    })
                }
            }
        }
        Ok(parts.join(EventLogClassifier::DELIMITER))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifier_identity() {
        let mut ev = Event::new("Register".to_string());
        ev.attributes.add_to_attributes(
            "org:resource".to_string(),
            AttributeValue::String("Anne".to_string()),
        );
        ev.attributes
            .add_to_attributes("amount".to_string(), AttributeValue::Int(50));
        ev.attributes
            .add_to_attributes("urgent".to_string(), AttributeValue::Boolean(true));
        let classifier = |keys: &[&str]| EventLogClassifier {
            name: keys.join(" and "),
            keys: keys.iter().map(|k| k.to_string()).collect(),
        };
        assert_eq!(
            classifier(&[ACTIVITY_NAME, "org:resource"]).try_get_class_identity(&ev),
            Ok("Register+Anne".to_string())
        );
        assert_eq!(
            classifier(&[ACTIVITY_NAME, "amount", "urgent"]).try_get_class_identity(&ev),
            Ok("Register+50+true".to_string())
        );
        assert_eq!(
            EventLogClassifier::default().try_get_class_identity(&ev),
            Ok("Register".to_string())
        );
    }

    #[test]
    fn non_string_values_as_identity() {
        let date = DateTime::parse_from_rfc3339("2024-03-01T09:30:00+00:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(
            AttributeValue::Date(date).as_class_identity().as_deref(),
            Some("2024-03-01T09:30:00+00:00")
        );
        assert_eq!(
            AttributeValue::Float(1.5).as_class_identity().as_deref(),
            Some("1.5")
        );
        let id = Uuid::new_v4();
        assert_eq!(AttributeValue::ID(id).as_class_identity(), Some(id.to_string()));
        assert_eq!(AttributeValue::None().as_class_identity(), None);

        let mut trace = Trace::from_activities(&["a"]);
        trace.events[0].attributes[0].value = AttributeValue::None();
        assert!(trace.activities(&EventLogClassifier::default()).is_err());

        let json = serde_json::to_string(&AttributeValue::Date(date)).unwrap();
        assert_eq!(
            serde_json::from_str::<AttributeValue>(&json).unwrap(),
            AttributeValue::Date(date)
        );
    }

    #[test]
    fn missing_activity_is_reported() {
        let mut trace = Trace::from_activities(&["a", "b"]);
        trace.events[1].attributes.remove_with_key(ACTIVITY_NAME);
        let res = trace.activities(&EventLogClassifier::default());
        assert_eq!(
            res,
            Err(EventLogError::NoActivity {
                trace_index: 0,
                event_index: 1,
                key: ACTIVITY_NAME.to_string()
            })
        );
    }
}
