use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::Display;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Property key: index of a place in its trace net (0..=n)
pub const PROP_TRACE_INDEX: &str = "trace_index";
/// Property key: index of the event a (trace net or synchronous product) transition stands for
pub const PROP_EVENT_INDEX: &str = "event_index";
/// Property key: kind of a synchronous product transition (see [`SyncMove`])
pub const PROP_MOVE: &str = "move_kind";
/// Property key: side (trace or model) a synchronous product place originates from
pub const PROP_NET_SIDE: &str = "net_side";
/// Property key: set on the synchronous product net itself
pub const PROP_IS_SYNC_NET: &str = "is_sync_net";

/// Symbol used for the "no move" side of an alignment step
pub const SKIP: &str = ">>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Origin of a place in a synchronous product
pub enum NetSide {
    /// Place copied from the trace net
    Trace,
    /// Place copied from the model net
    Model,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
/// Kind of an alignment move (i.e., of a synchronous product transition)
pub enum MoveKind {
    /// Log and model move together
    Sync,
    /// Only the log moves
    LogMove,
    /// Only the model moves
    ModelMove,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Origin of a synchronous product transition
///
/// The log side holds the `(name, label)` of the trace net transition,
/// the model side the `(name, label)` of the model transition (label `None` for silent transitions).
pub struct SyncMove {
    /// Move kind
    pub kind: MoveKind,
    /// Trace net transition (name and activity)
    pub log: Option<(String, String)>,
    /// Model transition (name and optional label)
    pub model: Option<(String, Option<String>)>,
}

impl SyncMove {
    /// Whether this move has neither a log nor a model component
    pub fn is_degenerate(&self) -> bool {
        self.log.is_none() && self.model.is_none()
    }

    /// Whether this is a model move on a silent transition
    pub fn is_silent_model_move(&self) -> bool {
        self.kind == MoveKind::ModelMove && matches!(self.model, Some((_, None)))
    }

    /// Label pair of this move: `(log label or >>, model label)`
    ///
    /// Silent model transitions yield `None` on the model side.
    pub fn label_pair(&self) -> (String, Option<String>) {
        let log = self
            .log
            .as_ref()
            .map(|(_, l)| l.clone())
            .unwrap_or_else(|| SKIP.to_string());
        let model = match &self.model {
            Some((_, l)) => l.clone(),
            None => Some(SKIP.to_string()),
        };
        (log, model)
    }

    /// Name pair of this move: `(log transition name or >>, model transition name or >>)`
    pub fn name_pair(&self) -> (String, String) {
        (
            self.log
                .as_ref()
                .map(|(n, _)| n.clone())
                .unwrap_or_else(|| SKIP.to_string()),
            self.model
                .as_ref()
                .map(|(n, _)| n.clone())
                .unwrap_or_else(|| SKIP.to_string()),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
/// Typed value in the properties bag of nets, places and transitions
pub enum PropertyValue {
    /// Position (e.g., index in a trace)
    Index(usize),
    /// Boolean flag
    Flag(bool),
    /// Free text
    Text(String),
    /// Side of a synchronous product place
    Side(NetSide),
    /// Move kind of a synchronous product transition
    Move(SyncMove),
}

impl PropertyValue {
    /// Get inner value if this is a [`PropertyValue::Index`]
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PropertyValue::Index(i) => Some(*i),
            _ => None,
        }
    }
    /// Get inner value if this is a [`PropertyValue::Flag`]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            PropertyValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
    /// Get inner value if this is a [`PropertyValue::Side`]
    pub fn as_side(&self) -> Option<NetSide> {
        match self {
            PropertyValue::Side(s) => Some(*s),
            _ => None,
        }
    }
    /// Get inner value if this is a [`PropertyValue::Move`]
    pub fn as_move(&self) -> Option<&SyncMove> {
        match self {
            PropertyValue::Move(m) => Some(m),
            _ => None,
        }
    }
}

/// String-keyed properties of a Petri net element
pub type Properties = BTreeMap<String, PropertyValue>;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
/// Place in a Petri net
pub struct Place {
    id: Uuid,
    /// Position among the places of the net (insertion order)
    #[serde(default)]
    order: usize,
    /// Place name
    pub name: String,
    /// Metadata
    pub properties: Properties,
}

impl Place {
    /// Get the id of this place
    pub fn id(&self) -> PlaceID {
        PlaceID(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
/// Transition in a Petri net
pub struct Transition {
    id: Uuid,
    /// Position among the transitions of the net (insertion order)
    #[serde(default)]
    order: usize,
    /// Transition name
    pub name: String,
    /// Transition label (None if this transition is _invisible_)
    pub label: Option<String>,
    /// Metadata
    pub properties: Properties,
}

impl Transition {
    /// Get the id of this transition
    pub fn id(&self) -> TransitionID {
        TransitionID(self.id)
    }

    /// Whether the transition is silent (has no label)
    pub fn is_silent(&self) -> bool {
        self.label.is_none()
    }

    /// Synchronous product move kind of this transition (if set)
    pub fn sync_move(&self) -> Option<&SyncMove> {
        self.properties.get(PROP_MOVE).and_then(|p| p.as_move())
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(tag = "type", content = "nodes")]
/// Arc type in a Petri net
pub enum ArcType {
    /// From Place to Transition
    PlaceTransition(Uuid, Uuid),
    /// From Transition to Place
    TransitionPlace(Uuid, Uuid),
}

impl ArcType {
    /// Create new from place to transition
    pub fn place_to_transition(from: PlaceID, to: TransitionID) -> ArcType {
        ArcType::PlaceTransition(from.0, to.0)
    }
    /// Create new from transition to place
    pub fn transition_to_place(from: TransitionID, to: PlaceID) -> ArcType {
        ArcType::TransitionPlace(from.0, to.0)
    }
    /// Source and target ids of this arc
    pub fn endpoints(&self) -> (Uuid, Uuid) {
        match *self {
            ArcType::PlaceTransition(from, to) => (from, to),
            ArcType::TransitionPlace(from, to) => (from, to),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
/// Arc in a Petri net
///
/// Connecting a transition and a place (or the other way around)
pub struct Arc {
    /// Source and target of Arc
    pub from_to: ArcType,
    /// Weight (i.e., how many tokens this arc moves)
    pub weight: u32,
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize, Hash, Eq, PartialOrd, Ord)]
/// Place ID
pub struct PlaceID(pub Uuid);
impl PlaceID {
    /// Get UUID
    pub fn get_uuid(self) -> Uuid {
        self.0
    }
}
impl From<&Place> for PlaceID {
    fn from(value: &Place) -> Self {
        PlaceID(value.id)
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Serialize, Deserialize, Hash, Eq, PartialOrd, Ord)]
/// Transition ID
pub struct TransitionID(pub Uuid);
impl From<&Transition> for TransitionID {
    fn from(value: &Transition) -> Self {
        TransitionID(value.id)
    }
}
impl TransitionID {
    /// Get UUID
    pub fn get_uuid(self) -> Uuid {
        self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
/// Marking of a Petri net: a multiset assigning [`PlaceID`]s a positive number of tokens
///
/// Places without tokens are never stored, so two markings are equal iff they
/// have the same support and the same counts.
pub struct Marking(BTreeMap<PlaceID, u64>);

impl Marking {
    /// Create an empty marking
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens in place `p`
    pub fn get(&self, p: &PlaceID) -> u64 {
        self.0.get(p).copied().unwrap_or(0)
    }

    /// Set the number of tokens in place `p` (removing the entry for 0)
    pub fn set(&mut self, p: PlaceID, tokens: u64) {
        if tokens == 0 {
            self.0.remove(&p);
        } else {
            self.0.insert(p, tokens);
        }
    }

    /// Add tokens to place `p`
    pub fn add(&mut self, p: PlaceID, tokens: u64) {
        if tokens > 0 {
            *self.0.entry(p).or_insert(0) += tokens;
        }
    }

    /// Remove tokens from place `p`, saturating at zero
    pub fn remove(&mut self, p: PlaceID, tokens: u64) {
        let remaining = self.get(&p).saturating_sub(tokens);
        self.set(p, remaining);
    }

    /// Whether place `p` holds at least one token
    pub fn contains_key(&self, p: &PlaceID) -> bool {
        self.0.contains_key(p)
    }

    /// Iterate over marked places (sorted by id) and their token count
    pub fn iter(&self) -> impl Iterator<Item = (&PlaceID, &u64)> {
        self.0.iter()
    }

    /// Number of marked places
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no place holds a token
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of tokens
    pub fn total_tokens(&self) -> u64 {
        self.0.values().sum()
    }

    /// Restrict the marking to the places accepted by `keep`
    pub fn project(&self, keep: impl Fn(&PlaceID) -> bool) -> Marking {
        Marking(
            self.0
                .iter()
                .filter(|(p, _)| keep(p))
                .map(|(p, n)| (*p, *n))
                .collect(),
        )
    }
}

impl FromIterator<(PlaceID, u64)> for Marking {
    fn from_iter<I: IntoIterator<Item = (PlaceID, u64)>>(iter: I) -> Self {
        let mut m = Marking::new();
        for (p, n) in iter {
            m.add(p, n);
        }
        m
    }
}

///
/// Errors for structurally malformed Petri nets
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StructureError {
    /// Referenced node (place or transition) does not exist
    UnknownNode(Uuid),
    /// Arc would connect two places or two transitions
    ArcBetweenSameKind(Uuid, Uuid),
    /// An arc between the same source and target already exists
    ParallelArc(Uuid, Uuid),
    /// Arcs need a positive weight
    ZeroWeight(Uuid, Uuid),
    /// A place or transition with the same id is already part of the net
    DuplicateNode(Uuid),
    /// Marking puts tokens into a place that is not part of the net
    MarkingOverUnknownPlace(PlaceID),
}

impl Display for StructureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StructureError::UnknownNode(id) => write!(f, "Unknown node {}", id),
            StructureError::ArcBetweenSameKind(from, to) => write!(
                f,
                "Arc {} -> {} does not connect a place with a transition",
                from, to
            ),
            StructureError::ParallelArc(from, to) => {
                write!(f, "Duplicate arc {} -> {}", from, to)
            }
            StructureError::ZeroWeight(from, to) => {
                write!(f, "Arc {} -> {} has weight 0", from, to)
            }
            StructureError::DuplicateNode(id) => write!(f, "Node {} already exists", id),
            StructureError::MarkingOverUnknownPlace(p) => {
                write!(f, "Marking references unknown place {}", p.0)
            }
        }
    }
}

impl std::error::Error for StructureError {}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
///
/// A Petri net of [`Place`]s and [`Transition`]s
///
/// Bipartite graph of [`Place`]s and [`Transition`]s with [`Arc`]s connecting them, as well as initial and final [`Marking`]s
pub struct PetriNet {
    /// Name of the net
    pub name: String,
    /// Places
    pub places: HashMap<Uuid, Place>,
    /// Transitions
    pub transitions: HashMap<Uuid, Transition>,
    /// Arcs
    pub arcs: Vec<Arc>,
    /// Initial marking
    pub initial_marking: Option<Marking>,
    /// Final markings (any of them are accepted as a final marking)
    pub final_markings: Option<Vec<Marking>>,
    /// Metadata
    pub properties: Properties,
}

impl PetriNet {
    /// Create new [`PetriNet`] with no places or transitions
    pub fn new() -> Self {
        Self::default()
    }

    /// Create new empty [`PetriNet`] with the given name
    pub fn with_name<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Add a place with a freshly generated UUID
    pub fn add_place<S: Into<String>>(&mut self, name: S) -> PlaceID {
        let place_id = Uuid::new_v4();
        self.places.insert(
            place_id,
            Place {
                id: place_id,
                order: self.places.len(),
                name: name.into(),
                properties: Properties::new(),
            },
        );
        PlaceID(place_id)
    }

    /// Add a place with the passed UUID
    ///
    /// Fails if a node with that id already exists
    pub fn add_place_with_id<S: Into<String>>(
        &mut self,
        name: S,
        place_id: Uuid,
    ) -> Result<PlaceID, StructureError> {
        if self.contains_node(&place_id) {
            return Err(StructureError::DuplicateNode(place_id));
        }
        self.places.insert(
            place_id,
            Place {
                id: place_id,
                order: self.places.len(),
                name: name.into(),
                properties: Properties::new(),
            },
        );
        Ok(PlaceID(place_id))
    }

    /// Add a transition with a name and an optional label (`None` for silent transitions)
    pub fn add_transition<S: Into<String>>(
        &mut self,
        name: S,
        label: Option<String>,
    ) -> TransitionID {
        let transition_id = Uuid::new_v4();
        self.transitions.insert(
            transition_id,
            Transition {
                id: transition_id,
                order: self.transitions.len(),
                name: name.into(),
                label,
                properties: Properties::new(),
            },
        );
        TransitionID(transition_id)
    }

    /// Add a transition with the passed UUID
    ///
    /// Fails if a node with that id already exists
    pub fn add_transition_with_id<S: Into<String>>(
        &mut self,
        name: S,
        label: Option<String>,
        transition_id: Uuid,
    ) -> Result<TransitionID, StructureError> {
        if self.contains_node(&transition_id) {
            return Err(StructureError::DuplicateNode(transition_id));
        }
        self.transitions.insert(
            transition_id,
            Transition {
                id: transition_id,
                order: self.transitions.len(),
                name: name.into(),
                label,
                properties: Properties::new(),
            },
        );
        Ok(TransitionID(transition_id))
    }

    /// Add an arc (weight defaults to 1)
    ///
    /// Fails if an endpoint does not exist or has the wrong kind, if the weight is 0
    /// or if an arc with the same source and target already exists.
    pub fn add_arc(&mut self, from_to: ArcType, weight: Option<u32>) -> Result<(), StructureError> {
        let weight = weight.unwrap_or(1);
        let (from, to) = from_to.endpoints();
        for id in [from, to] {
            if !self.contains_node(&id) {
                return Err(StructureError::UnknownNode(id));
            }
        }
        let kinds_ok = match from_to {
            ArcType::PlaceTransition(p, t) => {
                self.places.contains_key(&p) && self.transitions.contains_key(&t)
            }
            ArcType::TransitionPlace(t, p) => {
                self.transitions.contains_key(&t) && self.places.contains_key(&p)
            }
        };
        if !kinds_ok {
            return Err(StructureError::ArcBetweenSameKind(from, to));
        }
        if weight == 0 {
            return Err(StructureError::ZeroWeight(from, to));
        }
        if self.arcs.iter().any(|a| a.from_to == from_to) {
            return Err(StructureError::ParallelArc(from, to));
        }
        self.arcs.push(Arc { from_to, weight });
        Ok(())
    }

    /// Whether a place or transition with this id exists
    pub fn contains_node(&self, id: &Uuid) -> bool {
        self.places.contains_key(id) || self.transitions.contains_key(id)
    }

    /// Get a place by id
    pub fn place(&self, p: &PlaceID) -> Option<&Place> {
        self.places.get(&p.0)
    }

    /// Get a mutable place by id
    pub fn place_mut(&mut self, p: &PlaceID) -> Option<&mut Place> {
        self.places.get_mut(&p.0)
    }

    /// Get a transition by id
    pub fn transition(&self, t: &TransitionID) -> Option<&Transition> {
        self.transitions.get(&t.0)
    }

    /// Get a mutable transition by id
    pub fn transition_mut(&mut self, t: &TransitionID) -> Option<&mut Transition> {
        self.transitions.get_mut(&t.0)
    }

    /// Places sorted by name, equal names in insertion order
    pub fn sorted_places(&self) -> Vec<&Place> {
        self.places
            .values()
            .sorted_by(|a, b| (&a.name, a.order, a.id).cmp(&(&b.name, b.order, b.id)))
            .collect()
    }

    /// Transitions sorted by name, equal names in insertion order
    pub fn sorted_transitions(&self) -> Vec<&Transition> {
        self.transitions
            .values()
            .sorted_by(|a, b| (&a.name, a.order, a.id).cmp(&(&b.name, b.order, b.id)))
            .collect()
    }

    /// Get the preset of a [`PetriNet`] place
    pub fn preset_of_place(&self, p: PlaceID) -> Vec<TransitionID> {
        self.arcs
            .iter()
            .filter_map(|x: &Arc| match x.from_to {
                ArcType::TransitionPlace(from, to) if to == p.0 => Some(TransitionID(from)),
                _ => None,
            })
            .collect()
    }

    /// Get the preset of [`PetriNet`] transition
    pub fn preset_of_transition(&self, t: TransitionID) -> Vec<PlaceID> {
        self.weighted_preset_of_transition(t)
            .into_iter()
            .map(|(p, _)| p)
            .collect()
    }

    /// Get the preset of [`PetriNet`] transition together with the arc weights
    pub fn weighted_preset_of_transition(&self, t: TransitionID) -> Vec<(PlaceID, u32)> {
        self.arcs
            .iter()
            .filter_map(|x: &Arc| match x.from_to {
                ArcType::PlaceTransition(from, to) if to == t.0 => Some((PlaceID(from), x.weight)),
                _ => None,
            })
            .collect()
    }

    /// Get postset of [`PetriNet`] place
    pub fn postset_of_place(&self, p: PlaceID) -> Vec<TransitionID> {
        self.arcs
            .iter()
            .filter_map(|x: &Arc| match x.from_to {
                ArcType::PlaceTransition(from, to) if from == p.0 => Some(TransitionID(to)),
                _ => None,
            })
            .collect()
    }

    /// Get postset of [`PetriNet`] transition
    pub fn postset_of_transition(&self, t: TransitionID) -> Vec<PlaceID> {
        self.weighted_postset_of_transition(t)
            .into_iter()
            .map(|(p, _)| p)
            .collect()
    }

    /// Get postset of [`PetriNet`] transition together with the arc weights
    pub fn weighted_postset_of_transition(&self, t: TransitionID) -> Vec<(PlaceID, u32)> {
        self.arcs
            .iter()
            .filter_map(|x: &Arc| match x.from_to {
                ArcType::TransitionPlace(from, to) if from == t.0 => Some((PlaceID(to), x.weight)),
                _ => None,
            })
            .collect()
    }

    /// Check if transition `t` is enabled in marking `m`
    pub fn is_enabled(&self, t: TransitionID, m: &Marking) -> bool {
        self.weighted_preset_of_transition(t)
            .iter()
            .all(|(p, w)| m.get(p) >= *w as u64)
    }

    /// All transitions enabled in marking `m` (sorted by name, then by id)
    pub fn enabled_transitions(&self, m: &Marking) -> Vec<TransitionID> {
        self.sorted_transitions()
            .into_iter()
            .map(|t| t.id())
            .filter(|t| self.is_enabled(*t, m))
            .collect()
    }

    /// Fire transition `t` in marking `m`
    ///
    /// Returns `None` if `t` is not enabled in `m`.
    pub fn execute(&self, t: TransitionID, m: &Marking) -> Option<Marking> {
        if !self.is_enabled(t, m) {
            return None;
        }
        Some(self.weak_execute(t, m))
    }

    /// Fire transition `t` in marking `m`, ignoring enabledness
    ///
    /// Token counts of unmarked input places stay at zero.
    pub fn weak_execute(&self, t: TransitionID, m: &Marking) -> Marking {
        let mut res = m.clone();
        for (p, w) in self.weighted_preset_of_transition(t) {
            res.remove(p, w as u64);
        }
        for (p, w) in self.weighted_postset_of_transition(t) {
            res.add(p, w as u64);
        }
        res
    }

    /// Check that a marking only references places of this net
    pub fn check_marking(&self, m: &Marking) -> Result<(), StructureError> {
        match m.iter().find(|(p, _)| !self.places.contains_key(&p.0)) {
            Some((p, _)) => Err(StructureError::MarkingOverUnknownPlace(*p)),
            None => Ok(()),
        }
    }

    /// Labels of all visible transitions
    pub fn visible_labels(&self) -> HashSet<&str> {
        self.transitions
            .values()
            .filter_map(|t| t.label.as_deref())
            .collect()
    }

    /// Check if place is in initial marking
    pub fn is_in_initial_marking(&self, p: &PlaceID) -> bool {
        self.initial_marking
            .as_ref()
            .is_some_and(|m| m.contains_key(p))
    }

    /// Check if place is in _any_ final marking
    pub fn is_in_a_final_marking(&self, p: &PlaceID) -> bool {
        self.final_markings
            .as_ref()
            .is_some_and(|ms| ms.iter().any(|m| m.contains_key(p)))
    }

    /// Export Petri net to a PNML file
    ///
    /// The PNML file is written to the specified filepath
    pub fn export_pnml<P: AsRef<std::path::Path>>(&self, path: P) -> Result<(), quick_xml::Error> {
        super::export_pnml::export_petri_net_to_pnml_path(self, path)
    }
}
