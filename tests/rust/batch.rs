// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::common::GlobalEdf;
use ::anyhow::Result;
use ::tcpnsim::{
    run_batch,
    BatchOutcome,
    CancellationToken,
    FailKind,
    GlobalSpecification,
};

//======================================================================================================================
// Helpers
//======================================================================================================================

/// Feasible set, set rejected by the scheduler, set rejected by the model, feasible set.
fn mixed_batch() -> Vec<GlobalSpecification> {
    let feasible: GlobalSpecification = common::scheduling_spec(common::periodic(&[(1.0, 2.0), (1.0, 4.0)]), 1, 0.01);
    let overloaded: GlobalSpecification =
        common::scheduling_spec(common::periodic(&[(1.5, 2.0), (1.5, 2.0)]), 1, 0.01);
    // Three seconds of work cannot fit a two-second deadline.
    let invalid: GlobalSpecification = common::scheduling_spec(common::periodic(&[(3.0, 2.0)]), 1, 0.01);
    let other: GlobalSpecification = common::scheduling_spec(common::periodic(&[(0.5, 1.0)]), 2, 0.01);
    vec![feasible, overloaded, invalid, other]
}

/// Global EDF for sets whose utilization fits the cores, a scheduler that rejects every job otherwise.
fn scheduler_for(spec: &GlobalSpecification) -> GlobalEdf {
    let utilization: f64 = spec
        .tasks
        .periodic_tasks
        .iter()
        .map(|task| task.c / (common::FREQUENCY * task.t))
        .sum();
    if utilization <= spec.cpu.number_of_cores() as f64 {
        GlobalEdf { quantum: 0.01 }
    } else {
        GlobalEdf { quantum: -1.0 }
    }
}

//======================================================================================================================
// Tests
//======================================================================================================================

#[test]
fn outcomes_come_back_in_input_order() -> Result<()> {
    common::setup();
    let specs: Vec<GlobalSpecification> = mixed_batch();
    let outcomes: Vec<BatchOutcome> = run_batch(&specs, 3, scheduler_for, &CancellationToken::new());

    tcpnsim::ensure_eq!(outcomes.len(), 4);
    match &outcomes[0] {
        BatchOutcome::Completed(trace) => {
            tcpnsim::ensure_eq!(trace.ticks(), 400);
            tcpnsim::ensure_eq!(trace.is_schedulable(), true);
        },
        other => anyhow::bail!("first run should complete, got {:?}", other),
    }
    match &outcomes[1] {
        BatchOutcome::Failed(e) => tcpnsim::ensure_eq!(e.kind, FailKind::SchedulerError),
        other => anyhow::bail!("second run should fail in the scheduler, got {:?}", other),
    }
    match &outcomes[2] {
        BatchOutcome::Failed(e) => tcpnsim::ensure_eq!(e.kind, FailKind::InvalidTaskSpec),
        other => anyhow::bail!("third run should be rejected by the model, got {:?}", other),
    }
    match outcomes[3].trace() {
        Some(trace) => tcpnsim::ensure_eq!(trace.cores, 2),
        None => anyhow::bail!("fourth run should complete, got {:?}", outcomes[3]),
    }
    Ok(())
}

#[test]
fn infeasible_sets_are_not_schedulable() -> Result<()> {
    let specs: Vec<GlobalSpecification> = mixed_batch();
    let outcomes: Vec<BatchOutcome> = run_batch(&specs[..2], 2, |_| common::Infeasible, &CancellationToken::new());
    for outcome in &outcomes {
        match outcome {
            BatchOutcome::NotSchedulable(cause) => tcpnsim::ensure_eq!(cause.is_empty(), false),
            other => anyhow::bail!("expected a not-schedulable outcome, got {:?}", other),
        }
    }
    Ok(())
}

/// A single worker produces the same traces as many.
#[test]
fn worker_count_does_not_change_results() -> Result<()> {
    let specs: Vec<GlobalSpecification> = mixed_batch();
    let sequential: Vec<BatchOutcome> = run_batch(&specs, 1, scheduler_for, &CancellationToken::new());
    let parallel: Vec<BatchOutcome> = run_batch(&specs, 8, scheduler_for, &CancellationToken::new());
    for (a, b) in sequential.iter().zip(parallel.iter()) {
        tcpnsim::ensure_eq!(a.trace(), b.trace());
    }
    Ok(())
}

#[test]
fn cancelled_batch_fails_every_run() -> Result<()> {
    let specs: Vec<GlobalSpecification> = mixed_batch();
    let cancel: CancellationToken = CancellationToken::new();
    cancel.cancel();
    let outcomes: Vec<BatchOutcome> = run_batch(&specs[..1], 2, scheduler_for, &cancel);
    match &outcomes[0] {
        BatchOutcome::Failed(e) => tcpnsim::ensure_eq!(e.kind, FailKind::Cancelled),
        other => anyhow::bail!("a cancelled run should fail, got {:?}", other),
    }
    Ok(())
}
