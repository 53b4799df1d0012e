//! Alignments between traces and Petri nets
//!
//! An alignment is a least-cost firing sequence of the synchronous product of a trace net and
//! a model net from its initial to its final marking.

/// A* search over synchronous products
pub mod astar;
/// Standard cost functions
pub mod cost_function;
/// Caches of heuristic values shared between search states
pub mod heuristic_cache;
/// Aligning traces and event logs
pub mod log_alignment;
/// Open set entries of the A* search
pub mod search_tuple;

use std::fmt::Display;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::event_log::event_log_struct::EventLogError;
use crate::petri_net::petri_net_struct::{MoveKind, PetriNet, StructureError, TransitionID, SKIP};

use self::astar::SearchStatistics;
use self::cost_function::STD_MODEL_LOG_MOVE_COST;
use crate::conformance::marking_equation::extended::DEFAULT_EME_MAX_K;

///
/// Errors that can occur when aligning
///
#[derive(Debug, Clone)]
pub enum AlignmentError {
    /// The model (or the synchronous product) is malformed
    Structure(StructureError),
    /// The final marking of the model can not be reached from its initial marking
    Soundness(String),
    /// An event has no activity
    NoActivity(EventLogError),
}

impl Display for AlignmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlignmentError::Structure(e) => write!(f, "Malformed Petri net: {}", e),
            AlignmentError::Soundness(msg) => write!(f, "Model is not relaxed sound: {}", msg),
            AlignmentError::NoActivity(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for AlignmentError {}

impl From<StructureError> for AlignmentError {
    fn from(e: StructureError) -> Self {
        Self::Structure(e)
    }
}

impl From<EventLogError> for AlignmentError {
    fn from(e: EventLogError) -> Self {
        Self::NoActivity(e)
    }
}

///
/// Heuristic guiding the alignment search
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeuristicVariant {
    /// No heuristic (`h = 0`)
    Dijkstra,
    /// Marking equation
    MarkingEquation,
    /// Extended marking equation, cutting the trace into at most `max_k` segments
    ExtendedMarkingEquation {
        /// Maximal number of segments
        max_k: usize,
    },
}

impl Default for HeuristicVariant {
    fn default() -> Self {
        Self::MarkingEquation
    }
}

impl HeuristicVariant {
    /// Extended marking equation with the default number of segments
    pub fn extended() -> Self {
        Self::ExtendedMarkingEquation {
            max_k: DEFAULT_EME_MAX_K,
        }
    }
}

///
/// Alignment configuration
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentConfig {
    /// Heuristic guiding the search
    pub heuristic: HeuristicVariant,
    /// Reuse heuristic values between states with the same model marking and trace position
    pub use_heuristic_cache: bool,
    /// Time budget per trace
    pub max_align_time_trace: Option<Duration>,
    /// Time budget for a whole log
    pub max_align_time: Option<Duration>,
    /// Solve the integer program instead of its LP relaxation
    pub integer_lp: bool,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            heuristic: HeuristicVariant::default(),
            use_heuristic_cache: false,
            max_align_time_trace: None,
            max_align_time: None,
            integer_lp: false,
        }
    }
}

impl AlignmentConfig {
    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

///
/// Single step of an alignment
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentMove {
    /// Kind of the move
    pub kind: MoveKind,
    /// `(trace transition name, model transition name)`, [`SKIP`] for the absent side
    pub names: (String, String),
    /// `(activity, model label)`, [`SKIP`] for the absent side and `None` for silent model transitions
    pub labels: (String, Option<String>),
}

impl AlignmentMove {
    /// Move of the synchronous product transition `t`
    ///
    /// Transitions that were not created by a synchronous product count as model moves.
    pub fn of_transition(net: &PetriNet, t: &TransitionID) -> Option<Self> {
        let transition = net.transition(t)?;
        Some(match transition.sync_move() {
            Some(m) => Self {
                kind: m.kind,
                names: m.name_pair(),
                labels: m.label_pair(),
            },
            None => Self {
                kind: MoveKind::ModelMove,
                names: (SKIP.to_string(), transition.name.clone()),
                labels: (SKIP.to_string(), transition.label.clone()),
            },
        })
    }

    /// Describe this move as the name pair (`as_names`) or as the label pair
    pub fn describe(&self, as_names: bool) -> String {
        if as_names {
            format!("({}, {})", self.names.0, self.names.1)
        } else {
            format!(
                "({}, {})",
                self.labels.0,
                self.labels.1.as_deref().unwrap_or("None")
            )
        }
    }

    /// Whether the log side of this move is set
    pub fn has_log_step(&self) -> bool {
        matches!(self.kind, MoveKind::Sync | MoveKind::LogMove)
    }

    /// Whether the model side of this move is set
    pub fn has_model_step(&self) -> bool {
        matches!(self.kind, MoveKind::Sync | MoveKind::ModelMove)
    }
}

impl Display for AlignmentMove {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.describe(false))
    }
}

///
/// Alignment of a single trace
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    /// Moves in order
    pub alignment: Vec<AlignmentMove>,
    /// Total cost
    pub cost: u64,
    /// See [`compute_fitness`]
    pub fitness: f64,
    /// States expanded
    pub visited_states: usize,
    /// States pushed to the open set
    pub queued_states: usize,
    /// Enabled transitions considered
    pub traversed_arcs: usize,
    /// Linear programs solved
    pub lp_solved: usize,
}

impl AlignmentResult {
    pub(crate) fn new(
        net: &PetriNet,
        path: &[TransitionID],
        cost: u64,
        statistics: SearchStatistics,
    ) -> Self {
        Self {
            alignment: path
                .iter()
                .filter_map(|t| AlignmentMove::of_transition(net, t))
                .collect(),
            cost,
            fitness: if cost == 0 { 1.0 } else { 0.0 },
            visited_states: statistics.visited_states,
            queued_states: statistics.queued_states,
            traversed_arcs: statistics.traversed_arcs,
            lp_solved: statistics.lp_solved,
        }
    }

    /// Activities of the log side of the alignment
    pub fn log_projection(&self) -> Vec<&str> {
        self.alignment
            .iter()
            .filter(|m| m.has_log_step())
            .map(|m| m.labels.0.as_str())
            .collect()
    }

    /// Model transition names of the model side of the alignment
    pub fn model_projection(&self) -> Vec<&str> {
        self.alignment
            .iter()
            .filter(|m| m.has_model_step())
            .map(|m| m.names.1.as_str())
            .collect()
    }

    /// Describe the moves as name pairs (`as_names`) or as label pairs
    pub fn describe(&self, as_names: bool) -> Vec<String> {
        self.alignment.iter().map(|m| m.describe(as_names)).collect()
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl Display for AlignmentResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] (cost {})", self.describe(false).join(", "), self.cost)
    }
}

///
/// Fitness of an alignment
///
/// `1 − ⌊cost / u⌋ / ⌊(trace_len · u + worst_model_cost) / u⌋` with `u` the
/// [`STD_MODEL_LOG_MOVE_COST`]. Costs are counted in whole deviations, so silent moves do not
/// lower the fitness. `1` for cost `0` and `0` if the denominator vanishes.
pub fn compute_fitness(cost: u64, trace_len: usize, worst_model_cost: u64) -> f64 {
    if cost == 0 {
        return 1.0;
    }
    let deviations = cost / STD_MODEL_LOG_MOVE_COST;
    let bound = (trace_len as u64 * STD_MODEL_LOG_MOVE_COST + worst_model_cost)
        / STD_MODEL_LOG_MOVE_COST;
    if bound == 0 {
        return 0.0;
    }
    (1.0 - deviations as f64 / bound as f64).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fitness_bounds() {
        assert_eq!(compute_fitness(0, 0, 0), 1.0);
        assert_eq!(compute_fitness(5, 0, 0), 0.0);
        assert_eq!(compute_fitness(10000, 3, 20000), 0.8);
        assert_eq!(compute_fitness(50000, 3, 20000), 0.0);
        assert_eq!(compute_fitness(2, 2, 10002), 1.0);
        assert_eq!(compute_fitness(10001, 1, 10000), 0.5);
    }

    #[test]
    fn config_json() {
        let config = AlignmentConfig {
            heuristic: HeuristicVariant::extended(),
            max_align_time_trace: Some(Duration::from_millis(1500)),
            ..Default::default()
        };
        let json = config.to_json().unwrap();
        assert_eq!(AlignmentConfig::from_json(&json).unwrap(), config);
    }
}
