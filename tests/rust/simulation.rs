// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::common::{
    GlobalEdf,
    Idle,
    Infeasible,
    FREQUENCY,
};
use ::anyhow::Result;
use ::std::{
    str::FromStr,
    sync::{
        Arc,
        Mutex,
    },
};
use ::tcpnsim::{
    model::{
        global::IndexMap,
        processor::DEFAULT_ETA,
    },
    specification::{
        config::Config,
        AperiodicTask,
        CoresSpecification,
        CpuSpecification,
        PeriodicTask,
        SimulationSpecification,
        TasksSpecification,
    },
    CancellationToken,
    Fail,
    FailKind,
    GlobalSpecification,
    Real,
    Scheduler,
    SchedulingDecision,
    SimulationTrace,
    SystemSimulator,
    SystemTask,
    TaskId,
};

//======================================================================================================================
// Schedulers
//======================================================================================================================

/// Global EDF that also records every aperiodic arrival it is told about.
struct Recording {
    inner: GlobalEdf,
    arrivals: Arc<Mutex<Vec<(f64, TaskId)>>>,
}

impl Scheduler for Recording {
    type State = common::EdfState;

    fn offline_stage(
        &self,
        spec: &GlobalSpecification,
        periodic: &[SystemTask],
        aperiodic: &[SystemTask],
    ) -> Result<(f64, Self::State), Fail> {
        self.inner.offline_stage(spec, periodic, aperiodic)
    }

    fn aperiodic_arrive(
        &self,
        state: &mut Self::State,
        time: f64,
        arrived: &[SystemTask],
        frequencies: &[f64],
        temperatures: Option<&[f64]>,
    ) -> Result<bool, Fail> {
        if let Ok(mut arrivals) = self.arrivals.lock() {
            arrivals.extend(arrived.iter().map(|task: &SystemTask| (time, task.id)));
        }
        self.inner
            .aperiodic_arrive(state, time, arrived, frequencies, temperatures)
    }

    fn schedule_policy(
        &self,
        state: &mut Self::State,
        time: f64,
        executable: &[SystemTask],
        active: &[Option<TaskId>],
        frequencies: &[f64],
        temperatures: Option<&[f64]>,
    ) -> Result<SchedulingDecision, Fail> {
        self.inner
            .schedule_policy(state, time, executable, active, frequencies, temperatures)
    }
}

/// Returns the same malformed decision at every scheduling point.
struct Sloppy;

impl Scheduler for Sloppy {
    type State = ();

    fn offline_stage(
        &self,
        spec: &GlobalSpecification,
        _periodic: &[SystemTask],
        _aperiodic: &[SystemTask],
    ) -> Result<(f64, ()), Fail> {
        Ok((spec.simulation.dt, ()))
    }

    fn schedule_policy(
        &self,
        _state: &mut (),
        _time: f64,
        _executable: &[SystemTask],
        _active: &[Option<TaskId>],
        _frequencies: &[f64],
        _temperatures: Option<&[f64]>,
    ) -> Result<SchedulingDecision, Fail> {
        // Unknown task, duplicate task, unavailable frequency, missing frequency.
        Ok(SchedulingDecision::new(vec![Some(99), Some(0), Some(0)])
            .with_frequencies(vec![123.0, FREQUENCY / 2.0])
            .with_quantum(-1.0))
    }
}

//======================================================================================================================
// Helpers
//======================================================================================================================

/// Executed time of task `i` before `tick`.
fn executed_before(trace: &SimulationTrace, i: TaskId, tick: usize) -> f64 {
    if tick == 0 {
        0.0
    } else {
        trace.executed_time(i, tick - 1)
    }
}

fn run<S: Scheduler>(spec: &GlobalSpecification, scheduler: S) -> Result<SimulationTrace, Fail> {
    SystemSimulator::new(spec, scheduler)?.run()
}

//======================================================================================================================
// Global EDF
//======================================================================================================================

/// Every job of a feasible task set receives exactly its demand inside its window, and the fluid execution places
/// agree with the discrete accounting.
#[test]
fn global_edf_meets_every_deadline() -> Result<()> {
    common::setup();
    let tasks: [(f64, f64); 3] = [(2.0, 4.0), (3.0, 8.0), (3.0, 12.0)];
    let spec: GlobalSpecification = common::scheduling_spec(common::periodic(&tasks), 2, 0.01);
    let trace: SimulationTrace = run(&spec, GlobalEdf { quantum: 0.01 })?;

    tcpnsim::ensure_eq!(trace.ticks(), 2400);
    tcpnsim::ensure_eq!(trace.deadline_misses.len(), 0);

    for (i, &(c, t)) in tasks.iter().enumerate() {
        let jobs: usize = (24.0 / t) as usize;
        for j in 0..jobs {
            let arrival: usize = (j as f64 * t / 0.01).round() as usize;
            let deadline: usize = ((j + 1) as f64 * t / 0.01).round() as usize;
            let executed: f64 = trace.executed_time(i, deadline - 1) - executed_before(&trace, i, arrival);
            if (executed - c).abs() > 1e-6 {
                anyhow::bail!("job {} of task {} executed {} s instead of {} s", j, i, executed, c);
            }
        }
    }

    // A core never runs two tasks at once.
    for k in 0..2 {
        for tick in 0..trace.ticks() {
            let running: f64 = (0..3).map(|i| trace.allocation[trace.row(i, k)][tick]).sum();
            tcpnsim::ensure_eq!(running <= 1.0, true);
        }
    }

    let fluid: f64 = trace.execution_tcpn.iter().filter_map(|row: &Vec<f64>| row.last()).sum();
    let demand: f64 = 27.0 * FREQUENCY;
    if (fluid - demand).abs() > 1e-3 * demand {
        anyhow::bail!("execution places hold {} cycles instead of {}", fluid, demand);
    }
    Ok(())
}

/// Nothing executes under a scheduler that never allocates, and the demand of the first job stays in the net.
#[test]
fn idle_scheduler_misses_every_job() -> Result<()> {
    common::setup();
    let spec: GlobalSpecification = GlobalSpecification::new(
        TasksSpecification::new(vec![PeriodicTask::new(3.0, 10.0, 10.0)], vec![]),
        CpuSpecification::new(None, CoresSpecification::new(vec![1.0], vec![1.0])),
        None,
        SimulationSpecification::new(0.1),
    );
    let mut simulator: SystemSimulator<Idle> = SystemSimulator::new(&spec, Idle)?;
    let trace: SimulationTrace = simulator.run()?;

    tcpnsim::ensure_eq!(trace.ticks(), 100);
    tcpnsim::ensure_eq!(trace.deadline_misses.len(), 1);
    tcpnsim::ensure_eq!(trace.deadline_misses[0].task, 0);
    tcpnsim::ensure_eq!(trace.execution_of(0, 0).last().copied(), Some(0.0));

    let remaining: Real = simulator.marking()[simulator.global_model().index.remaining_place(0)];
    if (remaining - 3.0).abs() > 1e-5 {
        anyhow::bail!("{} cycles left in the net instead of 3", remaining);
    }
    Ok(())
}

/// Allocation borrows the core token from the idle place and execution returns it, so the core ends the run idle
/// once its last job is done.
#[test]
fn core_token_returns_to_idle() -> Result<()> {
    common::setup();
    let spec: GlobalSpecification = common::scheduling_spec(common::periodic(&[(1.0, 2.0), (1.0, 4.0)]), 1, 0.01);
    let mut simulator: SystemSimulator<GlobalEdf> = SystemSimulator::new(&spec, GlobalEdf { quantum: 0.01 })?;
    let trace: SimulationTrace = simulator.run()?;
    tcpnsim::ensure_eq!(trace.ticks(), 400);
    tcpnsim::ensure_eq!(trace.is_schedulable(), true);

    let marking: &[Real] = simulator.marking();
    let index: &IndexMap = &simulator.global_model().index;
    let busy: Real = (0..2).map(|i| marking[index.busy_place(i, 0)]).sum();
    let idle: Real = marking[index.idle_place(0)];
    let token: Real = idle + DEFAULT_ETA as Real * busy;
    if (token - 1.0).abs() > 1e-9 {
        anyhow::bail!("core token is {} (idle {}, busy {})", token, idle, busy);
    }
    tcpnsim::ensure_eq!((idle - 1.0).abs() < 1e-6, true);

    // Two jobs of task 0 and one of task 1 went through the execution places.
    let executed: Vec<f64> = (0..2)
        .map(|i| trace.execution_tcpn[trace.row(i, 0)].last().copied().unwrap_or(0.0))
        .collect();
    tcpnsim::ensure_eq!((executed[0] - 2.0 * FREQUENCY).abs() < 1.0, true);
    tcpnsim::ensure_eq!((executed[1] - FREQUENCY).abs() < 1.0, true);
    Ok(())
}

/// Every job of a constrained-deadline task that gets no processor is reported, in deadline order.
#[test]
fn idle_scheduler_reports_every_constrained_deadline() -> Result<()> {
    common::setup();
    let tasks: TasksSpecification = TasksSpecification::new(
        vec![
            PeriodicTask::new(3.0 * FREQUENCY, 4.0, 3.5),
            PeriodicTask::new(FREQUENCY, 12.0, 12.0),
        ],
        vec![],
    );
    let spec: GlobalSpecification = common::scheduling_spec(tasks, 1, 0.01);
    let trace: SimulationTrace = run(&spec, Idle)?;

    tcpnsim::ensure_eq!(trace.ticks(), 1200);
    let misses: Vec<(TaskId, usize)> = trace
        .deadline_misses
        .iter()
        .map(|miss| (miss.task, miss.job))
        .collect();
    tcpnsim::ensure_eq!(misses, vec![(0, 1), (0, 2), (0, 3), (1, 1)]);
    let deadlines: Vec<f64> = trace.deadline_misses.iter().map(|miss| miss.deadline).collect();
    for (deadline, expected) in deadlines.iter().zip([3.5, 7.5, 11.5, 12.0].iter()) {
        if (deadline - expected).abs() > 1e-9 {
            anyhow::bail!("miss recorded at {} s instead of {} s", deadline, expected);
        }
    }
    Ok(())
}

/// A deadline past the next arrival would leave two jobs of the same task open at once.
#[test]
fn deadline_longer_than_period_is_rejected() -> Result<()> {
    let tasks: TasksSpecification = TasksSpecification::new(
        vec![
            PeriodicTask::new(3.0 * FREQUENCY, 4.0, 6.0),
            PeriodicTask::new(FREQUENCY, 12.0, 12.0),
        ],
        vec![],
    );
    let spec: GlobalSpecification = common::scheduling_spec(tasks, 1, 0.01);
    match SystemSimulator::new(&spec, Idle) {
        Err(e) => tcpnsim::ensure_eq!(e.kind, FailKind::InvalidTaskSpec),
        Ok(_) => anyhow::bail!("a deadline of 6 s on a 4 s period should be rejected"),
    }
    Ok(())
}

//======================================================================================================================
// Aperiodic Tasks
//======================================================================================================================

#[test]
fn aperiodic_task_arrives_once() -> Result<()> {
    common::setup();
    let tasks: TasksSpecification = TasksSpecification::new(
        vec![PeriodicTask::new(FREQUENCY, 4.0, 4.0)],
        vec![AperiodicTask::new(FREQUENCY, 1.5, 3.5)],
    );
    let spec: GlobalSpecification = common::scheduling_spec(tasks, 2, 0.01);
    let arrivals: Arc<Mutex<Vec<(f64, TaskId)>>> = Arc::new(Mutex::new(Vec::new()));
    let scheduler: Recording = Recording {
        inner: GlobalEdf { quantum: 0.4 },
        arrivals: arrivals.clone(),
    };
    let trace: SimulationTrace = run(&spec, scheduler)?;

    tcpnsim::ensure_eq!(trace.ticks(), 400);
    tcpnsim::ensure_eq!(trace.is_schedulable(), true);
    let arrivals: Vec<(f64, TaskId)> = match arrivals.lock() {
        Ok(arrivals) => arrivals.clone(),
        Err(_) => anyhow::bail!("arrival log poisoned"),
    };
    tcpnsim::ensure_eq!(arrivals.len(), 1);
    tcpnsim::ensure_eq!(arrivals[0].1, 1);
    tcpnsim::ensure_eq!((arrivals[0].0 - 1.5).abs() < 1e-9, true);

    // The arrival triggers a reschedule even though the quantum is not over.
    tcpnsim::ensure_eq!(trace.executed_time(1, 149), 0.0);
    tcpnsim::ensure_eq!(trace.executed_time(1, 150) > 0.0, true);
    tcpnsim::ensure_eq!((trace.executed_time(1, 349) - 1.0).abs() < 1e-6, true);
    Ok(())
}

//======================================================================================================================
// Scheduler Mistakes
//======================================================================================================================

/// Malformed decisions are coerced: unknown and duplicate tasks idle their cores, unavailable or missing frequencies
/// leave the core at its previous one.
#[test]
fn malformed_decisions_are_coerced() -> Result<()> {
    common::setup();
    let spec: GlobalSpecification = common::scheduling_spec(common::periodic(&[(1.0, 4.0)]), 3, 0.01);
    let trace: SimulationTrace = run(&spec, Sloppy)?;

    tcpnsim::ensure_eq!(trace.is_schedulable(), true);
    tcpnsim::ensure_eq!(trace.frequencies[0].iter().all(|f: &f64| *f == FREQUENCY), true);
    tcpnsim::ensure_eq!(trace.frequencies[1].iter().all(|f: &f64| *f == FREQUENCY / 2.0), true);
    tcpnsim::ensure_eq!(trace.frequencies[2].iter().all(|f: &f64| *f == FREQUENCY), true);
    tcpnsim::ensure_eq!(trace.quantum.iter().all(|q: &f64| *q == 0.01), true);

    tcpnsim::ensure_eq!(trace.execution_of(0, 0).last().copied(), Some(0.0));
    tcpnsim::ensure_eq!(trace.execution_of(0, 2).last().copied(), Some(0.0));
    match trace.execution_of(0, 1).last() {
        Some(seconds) if (seconds - 2.0).abs() < 1e-6 => (),
        other => anyhow::bail!("task 0 ran {:?} s on core 1 instead of 2 s", other),
    }
    match trace.execution_tcpn[trace.row(0, 1)].last() {
        Some(cycles) if (cycles - FREQUENCY).abs() < 1e-3 * FREQUENCY => (),
        other => anyhow::bail!("core 1 executed {:?} cycles instead of {}", other, FREQUENCY),
    }
    Ok(())
}

#[test]
fn infeasible_task_set_is_reported() -> Result<()> {
    let spec: GlobalSpecification = common::scheduling_spec(common::periodic(&[(1.0, 4.0)]), 1, 0.01);
    match run(&spec, Infeasible) {
        Err(e) => tcpnsim::ensure_eq!(e.kind, FailKind::InfeasibleSchedule),
        Ok(_) => anyhow::bail!("the offline stage rejected the task set"),
    }
    Ok(())
}

#[test]
fn non_positive_quantum_is_a_scheduler_error() -> Result<()> {
    let spec: GlobalSpecification = common::scheduling_spec(common::periodic(&[(1.0, 4.0)]), 1, 0.01);
    match run(&spec, GlobalEdf { quantum: 0.0 }) {
        Err(e) => tcpnsim::ensure_eq!(e.kind, FailKind::SchedulerError),
        Ok(_) => anyhow::bail!("a zero quantum cannot drive the loop"),
    }
    Ok(())
}

//======================================================================================================================
// Cancellation
//======================================================================================================================

#[test]
fn cancelled_run_stops() -> Result<()> {
    let spec: GlobalSpecification = common::scheduling_spec(common::periodic(&[(1.0, 4.0)]), 1, 0.01);
    let cancel: CancellationToken = CancellationToken::new();
    let mut simulator: SystemSimulator<GlobalEdf> =
        SystemSimulator::new(&spec, GlobalEdf { quantum: 0.01 })?.with_cancellation(cancel.clone());
    cancel.cancel();
    match simulator.run() {
        Err(e) => tcpnsim::ensure_eq!(e.kind, FailKind::Cancelled),
        Ok(_) => anyhow::bail!("a cancelled run should not complete"),
    }
    Ok(())
}

//======================================================================================================================
// Configuration
//======================================================================================================================

#[test]
fn yaml_document_matches_programmatic_specification() -> Result<()> {
    let config: Config = Config::from_str(
        r#"
tasks:
  periodic:
    - { c: 2000, t: 4, d: 4 }
    - { c: 3000, t: 8, d: 8 }
cpu:
  cores:
    available_frequencies: [500, 1000]
    operating_frequencies: [1000, 1000]
simulation:
  dt: 0.01
"#,
    )?;
    let expected: GlobalSpecification =
        common::scheduling_spec(common::periodic(&[(2.0, 4.0), (3.0, 8.0)]), 2, 0.01);
    tcpnsim::ensure_eq!(config.global_specification()?, expected);
    Ok(())
}
