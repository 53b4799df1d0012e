#![warn(
    clippy::doc_markdown,
    missing_debug_implementations,
    rust_2018_idioms,
    missing_docs
)]

#![doc = include_str!("../README.md")]

///
/// Event logs ([`EventLog`]) and their activity projections
///
pub mod event_log {
    /// Activity projection of event logs
    pub mod activity_projection;
    /// Constants
    pub mod constants;
    /// [`EventLog`] struct and sub-structs
    pub mod event_log_struct;

    pub use event_log_struct::{
        Attribute, AttributeValue, Attributes, Event, EventLog, EventLogClassifier, Trace,
        XESEditableAttribute,
    };
}

/// Util module with smaller helper functions, structs or enums
pub mod utils;

///
/// Petri nets
///
pub mod petri_net {
    /// Export [`PetriNet`] to `.pnml`
    pub mod export_pnml;
    /// Incidence and consumption matrices
    pub mod incidence;
    /// [`PetriNet`] struct
    pub mod petri_net_struct;
    /// Synchronous product of a trace net and a model net
    pub mod sync_product;
    /// Trace nets
    pub mod trace_net;

    #[doc(inline)]
    pub use petri_net_struct::PetriNet;
}

/// Linear programming
pub mod lp;

///
/// Conformance Checking
///
pub mod conformance {
    /// Alignments
    pub mod alignments;
    /// Marking equation heuristics
    pub mod marking_equation;
}

///
/// Directly-follows graph
///
pub mod dfg {
    /// [`DirectlyFollowsGraph`] struct
    pub mod dfg_struct;

    #[doc(inline)]
    pub use crate::dfg::dfg_struct::DirectlyFollowsGraph;
}

///
/// Process Discovery
///
pub mod discovery {
    ///
    /// Classical α-miner
    ///
    pub mod alpha {
        /// Footprint relations and place candidates
        pub mod candidate_building;
        /// Full α-miner (net assembly)
        pub mod full;
    }
    ///
    /// Inductive miner (on event logs and on directly-follows graphs)
    ///
    pub mod inductive {
        /// Cut detection
        pub mod cuts;
        /// Recursive discovery of process trees
        pub mod full;
        /// Splitting trace variants along cuts, and fall-through detection
        pub mod sublog;
    }
}

///
/// Process trees
///
pub mod process_tree {
    /// Export [`ProcessTree`] to `.ptml`
    pub mod export_ptml;
    /// [`ProcessTree`] struct
    pub mod process_tree_struct;
    /// Conversion of [`ProcessTree`]s to [`PetriNet`](crate::PetriNet)s
    pub mod to_petri_net;

    #[doc(inline)]
    pub use process_tree_struct::ProcessTree;
}

#[doc(inline)]
pub use event_log::event_log_struct::EventLog;

#[doc(inline)]
pub use petri_net::petri_net_struct::PetriNet;

#[doc(inline)]
pub use petri_net::export_pnml::export_petri_net_to_pnml;

#[doc(inline)]
pub use dfg::dfg_struct::DirectlyFollowsGraph;

#[doc(inline)]
pub use process_tree::process_tree_struct::ProcessTree;

#[doc(inline)]
pub use process_tree::export_ptml::export_process_tree_to_ptml;

#[doc(inline)]
pub use conformance::alignments::log_alignment::{apply_log, apply_trace};

#[doc(inline)]
pub use conformance::alignments::{AlignmentConfig, AlignmentResult};

#[doc(inline)]
pub use discovery::alpha::full::alpha_miner_discover_petri_net;

#[doc(inline)]
pub use discovery::inductive::full::{
    inductive_miner_discover_petri_net, inductive_miner_discover_tree, InductiveMinerConfig,
};

#[cfg(test)]
mod tests;
