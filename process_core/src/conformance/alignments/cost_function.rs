use std::collections::HashMap;

use crate::petri_net::petri_net_struct::{MoveKind, PetriNet, TransitionID};

/// Cost of a visible log or model move
pub const STD_MODEL_LOG_MOVE_COST: u64 = 10000;
/// Cost of a model move on a silent transition
pub const STD_TAU_COST: u64 = 1;
/// Cost of a synchronous move
pub const STD_SYNC_COST: u64 = 0;

/// Cost per transition of a (synchronous product) net
pub type CostFunction = HashMap<TransitionID, u64>;

///
/// Derive the standard cost function of a synchronous product from its transition kinds
///
/// Synchronous moves cost [`STD_SYNC_COST`], model moves on silent transitions
/// [`STD_TAU_COST`] and all other moves [`STD_MODEL_LOG_MOVE_COST`].
/// Transitions without a move kind are treated as model moves.
pub fn construct_standard_cost_function(sync_net: &PetriNet) -> CostFunction {
    sync_net
        .transitions
        .values()
        .map(|t| {
            let cost = match t.sync_move() {
                Some(m) if m.kind == MoveKind::Sync => STD_SYNC_COST,
                Some(m) if m.is_silent_model_move() => STD_TAU_COST,
                Some(_) => STD_MODEL_LOG_MOVE_COST,
                None if t.is_silent() => STD_TAU_COST,
                None => STD_MODEL_LOG_MOVE_COST,
            };
            (t.id(), cost)
        })
        .collect()
}

/// Standard cost function for a plain model net (all of its transitions taken as model moves)
pub fn construct_model_cost_function(net: &PetriNet) -> CostFunction {
    net.transitions
        .values()
        .map(|t| {
            (
                t.id(),
                if t.is_silent() {
                    STD_TAU_COST
                } else {
                    STD_MODEL_LOG_MOVE_COST
                },
            )
        })
        .collect()
}
