use std::time::{Duration, Instant};

use log::{debug, info};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::event_log::activity_projection::EventLogActivityProjection;
use crate::event_log::event_log_struct::{EventLog, EventLogClassifier, Trace};
use crate::petri_net::petri_net_struct::{Marking, PetriNet};
use crate::petri_net::sync_product::construct_sync_product;
use crate::petri_net::trace_net::construct_trace_net_from_activities;

use super::astar::{align_sync_product, SearchOutcome};
use super::cost_function::{construct_standard_cost_function, STD_MODEL_LOG_MOVE_COST};
use super::{compute_fitness, AlignmentConfig, AlignmentError, AlignmentResult};

/// Share of the remaining log budget a single variant may use
const VARIANT_BUDGET_SHARE: f64 = 0.5;

///
/// Cost of aligning the empty trace, i.e., of the cheapest run of the model
///
/// Fails with [`AlignmentError::Soundness`] if the final marking is not reachable.
pub fn worst_model_cost(
    net: &PetriNet,
    im: &Marking,
    fm: &Marking,
    config: &AlignmentConfig,
) -> Result<u64, AlignmentError> {
    let empty: [&str; 0] = [];
    let (sync_net, sim, sfm) = sync_product_of(&empty, net, im, fm)?;
    let costs = construct_standard_cost_function(&sync_net);
    match align_sync_product(&sync_net, &sim, &sfm, &costs, 0, config, None) {
        SearchOutcome::Found { cost, .. } => Ok(cost),
        _ => Err(AlignmentError::Soundness(format!(
            "the final marking of {} is not reachable from its initial marking",
            net.name
        ))),
    }
}

fn sync_product_of<S: AsRef<str>>(
    activities: &[S],
    net: &PetriNet,
    im: &Marking,
    fm: &Marking,
) -> Result<(PetriNet, Marking, Marking), AlignmentError> {
    let (trace_net, tim, tfm) = construct_trace_net_from_activities(activities)?;
    Ok(construct_sync_product(&trace_net, &tim, &tfm, net, im, fm)?)
}

///
/// Align an activity sequence
///
/// `worst_model_cost` (see [`worst_model_cost`]) is needed for the fitness. Returns `Ok(None)`
/// if the search did not finish before `deadline`.
pub fn apply_activities<S: AsRef<str>>(
    activities: &[S],
    net: &PetriNet,
    im: &Marking,
    fm: &Marking,
    config: &AlignmentConfig,
    worst_model_cost: u64,
    deadline: Option<Instant>,
) -> Result<Option<AlignmentResult>, AlignmentError> {
    let (sync_net, sim, sfm) = sync_product_of(activities, net, im, fm)?;
    let costs = construct_standard_cost_function(&sync_net);
    match align_sync_product(
        &sync_net,
        &sim,
        &sfm,
        &costs,
        activities.len(),
        config,
        deadline,
    ) {
        SearchOutcome::Found {
            path,
            cost,
            statistics,
        } => {
            let mut result = AlignmentResult::new(&sync_net, &path, cost, statistics);
            result.fitness = compute_fitness(cost, activities.len(), worst_model_cost);
            Ok(Some(result))
        }
        SearchOutcome::Timeout(_) => Ok(None),
        SearchOutcome::Exhausted(_) => Err(AlignmentError::Soundness(format!(
            "no alignment exists for a trace of length {}",
            activities.len()
        ))),
    }
}

///
/// Align a single trace (activities read with the default classifier)
///
/// Builds the trace net and the synchronous product with `net`, then searches with the
/// standard cost function. `Ok(None)` if `max_align_time_trace` was exceeded.
pub fn apply_trace(
    trace: &Trace,
    net: &PetriNet,
    im: &Marking,
    fm: &Marking,
    config: &AlignmentConfig,
) -> Result<Option<AlignmentResult>, AlignmentError> {
    let activities = trace.activities(&EventLogClassifier::default())?;
    let worst = worst_model_cost(net, im, fm, config)?;
    let deadline = config.max_align_time_trace.map(|d| Instant::now() + d);
    apply_activities(&activities, net, im, fm, config, worst, deadline)
}

///
/// Aggregated fitness of a log alignment
///
/// Traces whose alignment timed out are left out of the fitness values and count as not fitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogAlignmentSummary {
    /// Mean fitness of the aligned traces
    pub average_trace_fitness: f64,
    /// Share of traces with fitness 1 (in percent)
    pub percentage_of_fitting_traces: f64,
    /// `1 − Σ cost / Σ (|trace| · log move cost + worst model cost)` over the aligned traces, counted
    /// in whole deviations like [`compute_fitness`]
    pub log_fitness: f64,
}

///
/// Alignments of all traces of an event log
///
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogAlignment {
    /// Alignment per trace (in log order), `None` if it timed out
    pub traces: Vec<Option<AlignmentResult>>,
    /// Aggregated fitness
    pub summary: LogAlignmentSummary,
}

impl LogAlignment {
    /// Serialize to JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

fn variant_deadline(config: &AlignmentConfig, log_start: Instant) -> Option<Instant> {
    let now = Instant::now();
    let share = config.max_align_time.map(|total| {
        let remaining = total.saturating_sub(now.duration_since(log_start));
        Duration::from_secs_f64(remaining.as_secs_f64() * VARIANT_BUDGET_SHARE)
    });
    let budget = match (config.max_align_time_trace, share) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    };
    budget.map(|b| now + b)
}

fn summarize(
    projection: &EventLogActivityProjection,
    variant_results: &[Option<AlignmentResult>],
    worst_model_cost: u64,
) -> LogAlignmentSummary {
    let mut n_traces = 0_u64;
    let mut n_aligned = 0_u64;
    let mut n_fitting = 0_u64;
    let mut fitness_sum = 0.0;
    let mut cost_sum = 0_u64;
    let mut bound_sum = 0_u64;
    for ((acts, count), result) in projection.traces.iter().zip(variant_results) {
        n_traces += count;
        let Some(result) = result else {
            continue;
        };
        n_aligned += count;
        fitness_sum += result.fitness * *count as f64;
        if result.fitness >= 1.0 {
            n_fitting += count;
        }
        cost_sum += result.cost / STD_MODEL_LOG_MOVE_COST * count;
        bound_sum += (acts.len() as u64 * STD_MODEL_LOG_MOVE_COST + worst_model_cost)
            / STD_MODEL_LOG_MOVE_COST
            * count;
    }
    LogAlignmentSummary {
        average_trace_fitness: if n_aligned > 0 {
            fitness_sum / n_aligned as f64
        } else {
            0.0
        },
        percentage_of_fitting_traces: if n_traces > 0 {
            100.0 * n_fitting as f64 / n_traces as f64
        } else {
            0.0
        },
        log_fitness: if bound_sum > 0 {
            1.0 - cost_sum as f64 / bound_sum as f64
        } else {
            1.0
        },
    }
}

///
/// Align all traces of an event log
///
/// Each trace variant is aligned once (variants in parallel). The model is checked up front:
/// a net whose final marking is unreachable is rejected with [`AlignmentError::Soundness`].
///
/// With `max_align_time` set, every variant may use half of the remaining log budget (but no
/// more than `max_align_time_trace`); variants that exceed their budget get `None`.
pub fn apply_log(
    log: &EventLog,
    net: &PetriNet,
    im: &Marking,
    fm: &Marking,
    classifier: &EventLogClassifier,
    config: &AlignmentConfig,
) -> Result<LogAlignment, AlignmentError> {
    net.check_marking(im)?;
    net.check_marking(fm)?;
    let projection = EventLogActivityProjection::try_from_log(log, classifier)?;
    let worst = worst_model_cost(net, im, fm, config)?;
    info!(
        "Aligning {} traces ({} variants), worst model cost {}",
        log.traces.len(),
        projection.traces.len(),
        worst
    );

    let log_start = Instant::now();
    let variant_results: Vec<Option<AlignmentResult>> = projection
        .traces
        .par_iter()
        .map(|(acts, _)| {
            let activities = projection.acts_to_names(acts);
            let deadline = variant_deadline(config, log_start);
            let result = apply_activities(&activities, net, im, fm, config, worst, deadline)?;
            if result.is_none() {
                debug!("alignment of variant {:?} timed out", activities);
            }
            Ok(result)
        })
        .collect::<Result<_, AlignmentError>>()?;

    let summary = summarize(&projection, &variant_results, worst);
    info!(
        "Aligned log in {:?}: log fitness {:.4}",
        log_start.elapsed(),
        summary.log_fitness
    );
    Ok(LogAlignment {
        traces: projection
            .trace_to_variant
            .iter()
            .map(|v| variant_results[*v].clone())
            .collect(),
        summary,
    })
}
