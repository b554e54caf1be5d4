// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Independent runs spread over worker threads.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::fail::{
        Fail,
        FailKind,
    },
    simulation::{
        scheduler::Scheduler,
        system::{
            CancellationToken,
            SystemSimulator,
        },
        trace::SimulationTrace,
    },
    specification::GlobalSpecification,
};
use ::crossbeam_channel::{
    self,
    Receiver,
    Sender,
};
use ::std::thread::{
    self,
    ScopedJoinHandle,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Result of one run of a batch.
#[derive(Debug)]
pub enum BatchOutcome {
    Completed(SimulationTrace),
    /// The scheduler found the task set infeasible.
    NotSchedulable(String),
    Failed(Fail),
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl BatchOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, BatchOutcome::Completed(_))
    }

    pub fn trace(&self) -> Option<&SimulationTrace> {
        match self {
            BatchOutcome::Completed(trace) => Some(trace),
            _ => None,
        }
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Runs every specification on `workers` threads, each run with its own model, simulator and scheduler built by
/// `make_scheduler`. Outcomes are returned in input order.
pub fn run_batch<S, F>(
    specs: &[GlobalSpecification],
    workers: usize,
    make_scheduler: F,
    cancel: &CancellationToken,
) -> Vec<BatchOutcome>
where
    S: Scheduler,
    F: Fn(&GlobalSpecification) -> S + Sync,
{
    let workers: usize = workers.clamp(1, specs.len().max(1));
    let (job_tx, job_rx): (Sender<usize>, Receiver<usize>) = crossbeam_channel::unbounded();
    let (result_tx, result_rx): (Sender<(usize, BatchOutcome)>, Receiver<(usize, BatchOutcome)>) =
        crossbeam_channel::unbounded();
    for i in 0..specs.len() {
        // The receiver outlives this loop.
        let _ = job_tx.send(i);
    }
    drop(job_tx);
    info!("run_batch(): {} run(s) on {} worker(s)", specs.len(), workers);

    thread::scope(|scope| {
        let make_scheduler: &F = &make_scheduler;
        let handles: Vec<ScopedJoinHandle<'_, ()>> = (0..workers)
            .map(|worker| {
                let job_rx: Receiver<usize> = job_rx.clone();
                let result_tx: Sender<(usize, BatchOutcome)> = result_tx.clone();
                scope.spawn(move || {
                    while let Ok(i) = job_rx.recv() {
                        debug!("run_batch(): worker {} takes run {}", worker, i);
                        let outcome: BatchOutcome = run_one(&specs[i], make_scheduler(&specs[i]), cancel);
                        if result_tx.send((i, outcome)).is_err() {
                            break;
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                error!("run_batch(): a worker panicked");
            }
        }
    });
    drop(result_tx);

    let mut outcomes: Vec<Option<BatchOutcome>> = (0..specs.len()).map(|_| None).collect();
    for (i, outcome) in result_rx.iter() {
        outcomes[i] = Some(outcome);
    }
    outcomes
        .into_iter()
        .enumerate()
        .map(|(i, outcome)| match outcome {
            Some(outcome) => outcome,
            None => BatchOutcome::Failed(Fail::new(FailKind::Cancelled, &format!("run {} produced no outcome", i))),
        })
        .collect()
}

fn run_one<S: Scheduler>(spec: &GlobalSpecification, scheduler: S, cancel: &CancellationToken) -> BatchOutcome {
    let outcome: Result<SimulationTrace, Fail> = SystemSimulator::new(spec, scheduler)
        .map(|simulator: SystemSimulator<S>| simulator.with_cancellation(cancel.clone()))
        .and_then(|mut simulator: SystemSimulator<S>| simulator.run());
    match outcome {
        Ok(trace) => BatchOutcome::Completed(trace),
        Err(e) if e.is(FailKind::InfeasibleSchedule) => {
            info!("run_one(): not schedulable: {}", e.cause);
            BatchOutcome::NotSchedulable(e.cause)
        },
        Err(e) => BatchOutcome::Failed(e),
    }
}
