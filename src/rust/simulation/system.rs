// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    model::global::{
        GlobalModel,
        IndexMap,
    },
    runtime::{
        fail::{
            Fail,
            FailKind,
        },
        types::Real,
    },
    simulation::{
        scheduler::{
            Scheduler,
            SchedulingDecision,
            TaskId,
        },
        task::SystemTask,
        trace::{
            DeadlineMiss,
            SimulationTrace,
            TickRecord,
        },
    },
    specification::GlobalSpecification,
    tcpn::simulator::TcpnSimulator,
};
use ::std::{
    collections::HashSet,
    sync::{
        atomic::{
            AtomicBool,
            Ordering,
        },
        Arc,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Shared flag aborting runs between two ticks.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

/// Drives one run: asks the scheduler for decisions, turns them into controls and steps the global net.
pub struct SystemSimulator<S: Scheduler> {
    spec: GlobalSpecification,
    global: GlobalModel,
    simulator: TcpnSimulator,
    scheduler: S,
    cancel: CancellationToken,
    marking: Vec<Real>,
}

/// Mutable state of a run in progress.
struct RunState {
    tasks: Vec<SystemTask>,
    frequencies: Vec<f64>,
    assignment: Vec<Option<TaskId>>,
    quantum: f64,
    /// Ticks left before the next scheduling point.
    quantum_left: u64,
    /// Accumulated execution time of every (task, core) pair (s).
    executed: Vec<f64>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl<S: Scheduler> SystemSimulator<S> {
    /// Assembles the global model of `spec`. Fails on invalid tasks, geometry or configuration.
    pub fn new(spec: &GlobalSpecification, scheduler: S) -> Result<Self, Fail> {
        let global: GlobalModel = GlobalModel::new(spec)?;
        let simulator: TcpnSimulator = TcpnSimulator::new("global", &global.model, spec.simulation.integrator)?
            .with_cache_capacity(spec.simulation.operator_cache_capacity);
        let marking: Vec<Real> = global.model.marking.clone();
        Ok(Self {
            spec: spec.clone(),
            global,
            simulator,
            scheduler,
            cancel: CancellationToken::new(),
            marking,
        })
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn global_model(&self) -> &GlobalModel {
        &self.global
    }

    /// Marking at the end of the last run, or the initial one.
    pub fn marking(&self) -> &[Real] {
        &self.marking
    }

    /// Simulates one hyperperiod.
    pub fn run(&mut self) -> Result<SimulationTrace, Fail> {
        let n: usize = self.global.index.tasks;
        let m: usize = self.global.index.cores;
        let dt: f64 = self.spec.simulation.dt;

        let periodic: Vec<SystemTask> = self
            .spec
            .tasks
            .periodic_tasks
            .iter()
            .enumerate()
            .map(|(id, task)| SystemTask::periodic(id, task))
            .collect();
        let aperiodic: Vec<SystemTask> = self
            .spec
            .tasks
            .aperiodic_tasks
            .iter()
            .enumerate()
            .map(|(j, task)| SystemTask::aperiodic(periodic.len() + j, task))
            .collect();

        let (quantum, mut state): (f64, S::State) = {
            timer!("simulation::system::offline_stage");
            self.scheduler.offline_stage(&self.spec, &periodic, &aperiodic)?
        };
        if quantum <= 0.0 || !quantum.is_finite() {
            let cause: String = format!("offline stage returned quantum {}", quantum);
            error!("run(): {}", cause);
            return Err(Fail::new(FailKind::SchedulerError, &cause));
        }

        let hyperperiod: f64 = self.spec.hyperperiod()?;
        let ticks: u64 = (hyperperiod / dt).round() as u64;
        // Twice the positivity bound also damps the allocation loop between idle and busy places.
        let sub_steps: usize = self
            .spec
            .simulation
            .fragmentation()
            .max(2 * self.simulator.stable_sub_steps(dt)?);
        self.simulator.prepare(dt, sub_steps)?;
        info!(
            "run(): {} tick(s) of {} s, {} sub-step(s) per tick, quantum {} s",
            ticks, dt, sub_steps, quantum
        );

        let mut run: RunState = RunState {
            tasks: periodic.into_iter().chain(aperiodic).collect(),
            frequencies: self.spec.cpu.cores.operating_frequencies.clone(),
            assignment: vec![None; m],
            quantum,
            quantum_left: 0,
            executed: vec![0.0; n * m],
        };
        let cells: Option<usize> = if self.spec.simulation.record_temperature_map {
            self.global.index.thermal_cells().map(|cells| cells.len)
        } else {
            None
        };
        let mut trace: SimulationTrace = SimulationTrace::new(n, m, self.global.is_thermal(), cells);
        let mut marking: Vec<Real> = self.global.model.marking.clone();

        for tick in 0..ticks {
            if self.cancel.is_cancelled() {
                let cause: String = format!("run cancelled at tick {}", tick);
                warn!("run(): {}", cause);
                return Err(Fail::new(FailKind::Cancelled, &cause));
            }
            self.simulator.set_tick(tick);
            self.tick(tick, &mut run, &mut state, &mut marking, &mut trace)?;
        }

        // Windows closing on the last instant of the horizon.
        for task in run.tasks.iter_mut() {
            if let Some(deadline) = task.next_deadline {
                if to_tick(deadline, dt) <= ticks && task.expire() {
                    warn!("run(): task {} missed its deadline at {} s", task.id, deadline);
                    trace.deadline_misses.push(DeadlineMiss {
                        task: task.id,
                        job: task.jobs,
                        deadline,
                    });
                }
            }
        }

        self.marking = marking;
        info!(
            "run(): done, {} deadline miss(es) over {} tick(s)",
            trace.deadline_misses.len(),
            trace.ticks()
        );
        Ok(trace)
    }

    fn tick(
        &mut self,
        tick: u64,
        run: &mut RunState,
        state: &mut S::State,
        marking: &mut Vec<Real>,
        trace: &mut SimulationTrace,
    ) -> Result<(), Fail> {
        let dt: f64 = self.spec.simulation.dt;
        let time: f64 = tick as f64 * dt;
        let n: usize = self.global.index.tasks;

        // Job windows.
        for task in run.tasks.iter_mut() {
            if let Some(deadline) = task.next_deadline {
                if to_tick(deadline, dt) <= tick && task.expire() {
                    warn!("tick(): task {} missed its deadline at {} s (tick {})", task.id, deadline, tick);
                    trace.deadline_misses.push(DeadlineMiss {
                        task: task.id,
                        job: task.jobs,
                        deadline,
                    });
                }
            }
        }
        let mut arrived: Vec<SystemTask> = Vec::new();
        for task in run.tasks.iter_mut() {
            if let Some(arrival) = task.next_arrival {
                if to_tick(arrival, dt) <= tick {
                    task.release(arrival);
                    if !task.is_periodic() {
                        marking[self.global.index.remaining_place(task.id)] += task.c as Real;
                        arrived.push(task.clone());
                    }
                }
            }
        }

        let temperatures: Option<Vec<f64>> = self
            .global
            .core_temperatures(marking)?
            .map(|t: Vec<Real>| t.into_iter().map(|x: Real| x as f64).collect());
        if !arrived.is_empty() {
            timer!("simulation::system::aperiodic_arrive");
            debug!("tick(): {} aperiodic task(s) arrived at {} s", arrived.len(), time);
            if self.scheduler.aperiodic_arrive(
                state,
                time,
                &arrived,
                &run.frequencies,
                temperatures.as_deref(),
            )? {
                run.quantum_left = 0;
            }
        }

        if run.quantum_left == 0 {
            timer!("simulation::system::schedule_policy");
            let executable: Vec<SystemTask> = run
                .tasks
                .iter()
                .filter(|task: &&SystemTask| task.is_executable())
                .cloned()
                .collect();
            let decision: SchedulingDecision = self.scheduler.schedule_policy(
                state,
                time,
                &executable,
                &run.assignment,
                &run.frequencies,
                temperatures.as_deref(),
            )?;
            self.apply(tick, run, decision, &executable);
            run.quantum_left = ((run.quantum / dt).round() as u64).max(1) - 1;
        } else {
            run.quantum_left -= 1;
        }

        // Control and integration.
        let control: Vec<Real> = self.control(run);
        self.simulator.set_control(&control)?;
        *marking = self.simulator.step(marking)?;
        for &p in self.global.index.remaining_places() {
            if marking[p] < 0.0 {
                marking[p] = 0.0;
            }
        }

        // Execution accounting.
        let m: usize = run.frequencies.len();
        let mut allocation: Vec<f64> = vec![0.0; n * m];
        let mut energy: Vec<f64> = vec![0.0; m];
        for k in 0..m {
            if let Some(i) = run.assignment[k] {
                let frequency: f64 = run.frequencies[k];
                if !run.tasks[i].is_executable() || frequency <= 0.0 {
                    continue;
                }
                allocation[k * n + i] = 1.0;
                let cycles: f64 = run.tasks[i].execute(frequency * dt);
                let seconds: f64 = cycles / frequency;
                run.executed[k * n + i] += seconds;
                if let Some(power) = &self.global.power {
                    energy[k] += power.power(i, frequency) * seconds;
                }
            }
        }

        let executed_cycles: Vec<f64> = self
            .global
            .executed_cycles(marking)?
            .into_iter()
            .map(|x: Real| x as f64)
            .collect();
        let core_temperatures: Option<Vec<f64>> = self
            .global
            .core_temperatures(marking)?
            .map(|t: Vec<Real>| t.into_iter().map(|x: Real| x as f64).collect());
        let max_core_temperatures: Option<Vec<f64>> = self
            .global
            .max_core_temperatures(marking)
            .map(|t: Vec<Real>| t.into_iter().map(|x: Real| x as f64).collect());
        let temperature_map: Option<Vec<f64>> = if self.spec.simulation.record_temperature_map {
            self.global
                .temperature_map(marking)
                .map(|map: &[Real]| map.iter().map(|x: &Real| *x as f64).collect())
        } else {
            None
        };
        trace.record(TickRecord {
            time: time + dt,
            allocation: &allocation,
            execution: &run.executed,
            execution_tcpn: &executed_cycles,
            frequencies: &run.frequencies,
            temperature_map: temperature_map.as_deref(),
            core_temperatures: core_temperatures.as_deref(),
            max_core_temperatures: max_core_temperatures.as_deref(),
            energy: if self.global.is_thermal() { Some(energy.as_slice()) } else { None },
            quantum: run.quantum,
        });
        Ok(())
    }

    /// Applies a decision, coercing every mistake to a safe default.
    fn apply(&self, tick: u64, run: &mut RunState, decision: SchedulingDecision, executable: &[SystemTask]) {
        let m: usize = run.frequencies.len();
        let mut assignment: Vec<Option<TaskId>> = decision.assignment;
        if assignment.len() != m {
            warn!(
                "apply(): tick {}: assignment has {} entries for {} cores",
                tick,
                assignment.len(),
                m
            );
            assignment.resize(m, None);
        }
        let mut taken: HashSet<TaskId> = HashSet::new();
        for (k, slot) in assignment.iter_mut().enumerate() {
            if let Some(i) = *slot {
                if !executable.iter().any(|task: &SystemTask| task.id == i) {
                    warn!("apply(): tick {}: core {} got non-executable task {}, idling", tick, k, i);
                    *slot = None;
                } else if !taken.insert(i) {
                    warn!("apply(): tick {}: task {} assigned twice, core {} idles", tick, i, k);
                    *slot = None;
                }
            }
        }
        run.assignment = assignment;

        if let Some(frequencies) = decision.next_frequencies {
            if frequencies.len() != m {
                warn!(
                    "apply(): tick {}: {} frequencies for {} cores",
                    tick,
                    frequencies.len(),
                    m
                );
            }
            for (k, frequency) in frequencies.into_iter().take(m).enumerate() {
                if self.spec.cpu.cores.is_available(frequency) {
                    run.frequencies[k] = frequency;
                } else {
                    warn!(
                        "apply(): tick {}: core {} frequency {} is not available, keeping {}",
                        tick, k, frequency, run.frequencies[k]
                    );
                }
            }
        }

        if let Some(quantum) = decision.next_quantum {
            if quantum > 0.0 && quantum.is_finite() {
                run.quantum = quantum;
            } else {
                warn!("apply(): tick {}: invalid quantum {}, keeping {}", tick, quantum, run.quantum);
            }
        }
    }

    /// Control vector of the current assignment and frequencies. Transitions outside the processor and heat
    /// injection blocks run at full rate.
    fn control(&self, run: &RunState) -> Vec<Real> {
        let index: &IndexMap = &self.global.index;
        let n: usize = index.tasks;
        let max_frequency: f64 = self.spec.max_frequency();
        let mut control: Vec<Real> = vec![1.0; self.global.model.transitions()];
        for (k, &frequency) in run.frequencies.iter().enumerate() {
            let relative: f64 = frequency / max_frequency;
            for i in 0..n {
                let running: bool = run.assignment[k] == Some(i) && run.tasks[i].is_executable();
                control[index.alloc_transition(i, k)] = if running { relative as Real } else { 0.0 };
                control[index.exec_transition(i, k)] = relative as Real;
                if let (Some(heat), Some(power)) = (index.heat_transition(i, k), &self.global.power) {
                    control[heat] = power.ratio(i, frequency) as Real;
                }
            }
        }
        control
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Tick at which an instant falls.
fn to_tick(time: f64, dt: f64) -> u64 {
    (time / dt).round().max(0.0) as u64
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
