// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![allow(dead_code)]

//======================================================================================================================
// Imports
//======================================================================================================================

use ::tcpnsim::{
    runtime::{
        fail::{
            Fail,
            FailKind,
        },
        logging,
    },
    specification::{
        BoardSpecification,
        CoresSpecification,
        CpuSpecification,
        EnvironmentSpecification,
        GlobalSpecification,
        MaterialCuboid,
        Origin,
        PeriodicTask,
        PowerModel,
        SimulationSpecification,
        TasksSpecification,
    },
    Scheduler,
    SchedulingDecision,
    SystemTask,
    TaskId,
};
use ::std::cmp::Ordering;

//======================================================================================================================
// Constants
//======================================================================================================================

/// Reference frequency of the scheduling scenarios (Hz).
pub const FREQUENCY: f64 = 1000.0;

pub const COPPER: (f64, f64, f64) = (8933.0, 385.0, 400.0);
pub const SILICON: (f64, f64, f64) = (2330.0, 712.0, 148.0);

//======================================================================================================================
// Schedulers
//======================================================================================================================

/// Global earliest-deadline-first: the `m` executable jobs with the earliest deadlines run, each one staying on its
/// core when possible.
pub struct GlobalEdf {
    pub quantum: f64,
}

pub struct EdfState {
    pub cores: usize,
    pub arrivals: Vec<(f64, TaskId)>,
}

impl Scheduler for GlobalEdf {
    type State = EdfState;

    fn offline_stage(
        &self,
        spec: &GlobalSpecification,
        _periodic: &[SystemTask],
        _aperiodic: &[SystemTask],
    ) -> Result<(f64, EdfState), Fail> {
        Ok((
            self.quantum,
            EdfState {
                cores: spec.cpu.number_of_cores(),
                arrivals: Vec::new(),
            },
        ))
    }

    fn aperiodic_arrive(
        &self,
        state: &mut EdfState,
        time: f64,
        arrived: &[SystemTask],
        _frequencies: &[f64],
        _temperatures: Option<&[f64]>,
    ) -> Result<bool, Fail> {
        state.arrivals.extend(arrived.iter().map(|task: &SystemTask| (time, task.id)));
        Ok(true)
    }

    fn schedule_policy(
        &self,
        state: &mut EdfState,
        _time: f64,
        executable: &[SystemTask],
        active: &[Option<TaskId>],
        _frequencies: &[f64],
        _temperatures: Option<&[f64]>,
    ) -> Result<SchedulingDecision, Fail> {
        let mut queue: Vec<&SystemTask> = executable.iter().collect();
        queue.sort_by(|a: &&SystemTask, b: &&SystemTask| {
            let da: f64 = a.next_deadline.unwrap_or(f64::INFINITY);
            let db: f64 = b.next_deadline.unwrap_or(f64::INFINITY);
            da.partial_cmp(&db).unwrap_or(Ordering::Equal).then(a.id.cmp(&b.id))
        });
        let selected: Vec<TaskId> = queue.iter().take(state.cores).map(|task: &&SystemTask| task.id).collect();

        let mut assignment: Vec<Option<TaskId>> = vec![None; state.cores];
        for (k, slot) in assignment.iter_mut().enumerate() {
            if let Some(Some(id)) = active.get(k) {
                if selected.contains(id) {
                    *slot = Some(*id);
                }
            }
        }
        for id in selected {
            if assignment.contains(&Some(id)) {
                continue;
            }
            if let Some(slot) = assignment.iter_mut().find(|slot: &&mut Option<TaskId>| slot.is_none()) {
                *slot = Some(id);
            }
        }
        Ok(SchedulingDecision::new(assignment))
    }
}

/// Never allocates anything.
pub struct Idle;

impl Scheduler for Idle {
    type State = usize;

    fn offline_stage(
        &self,
        spec: &GlobalSpecification,
        _periodic: &[SystemTask],
        _aperiodic: &[SystemTask],
    ) -> Result<(f64, usize), Fail> {
        Ok((spec.simulation.dt, spec.cpu.number_of_cores()))
    }

    fn schedule_policy(
        &self,
        cores: &mut usize,
        _time: f64,
        _executable: &[SystemTask],
        _active: &[Option<TaskId>],
        _frequencies: &[f64],
        _temperatures: Option<&[f64]>,
    ) -> Result<SchedulingDecision, Fail> {
        Ok(SchedulingDecision::new(vec![None; *cores]))
    }
}

/// Keeps task 0 on core 0 for the whole run.
pub struct Pinned;

impl Scheduler for Pinned {
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
        executable: &[SystemTask],
        _active: &[Option<TaskId>],
        _frequencies: &[f64],
        _temperatures: Option<&[f64]>,
    ) -> Result<SchedulingDecision, Fail> {
        let running: Option<TaskId> = executable.iter().find(|task: &&SystemTask| task.id == 0).map(|_| 0);
        Ok(SchedulingDecision::new(vec![running]))
    }
}

/// Rejects every task set.
pub struct Infeasible;

impl Scheduler for Infeasible {
    type State = ();

    fn offline_stage(
        &self,
        _spec: &GlobalSpecification,
        _periodic: &[SystemTask],
        _aperiodic: &[SystemTask],
    ) -> Result<(f64, ()), Fail> {
        Err(Fail::new(FailKind::InfeasibleSchedule, "utilization exceeds the core count"))
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
        Ok(SchedulingDecision::default())
    }
}

//======================================================================================================================
// Specifications
//======================================================================================================================

/// Initializes logging once for the whole test binary.
pub fn setup() {
    logging::initialize();
}

/// Periodic task set `(c, t)` with implicit deadlines, `c` given in seconds at [FREQUENCY].
pub fn periodic(tasks: &[(f64, f64)]) -> TasksSpecification {
    TasksSpecification::new(
        tasks
            .iter()
            .map(|&(c, t)| PeriodicTask::new(c * FREQUENCY, t, t))
            .collect(),
        vec![],
    )
}

/// Non-thermal run of `tasks` on `m` cores at [FREQUENCY].
pub fn scheduling_spec(tasks: TasksSpecification, m: usize, dt: f64) -> GlobalSpecification {
    GlobalSpecification::new(
        tasks,
        CpuSpecification::new(
            None,
            CoresSpecification::new(vec![FREQUENCY / 2.0, FREQUENCY], vec![FREQUENCY; m]),
        ),
        None,
        SimulationSpecification::new(dt),
    )
}

pub fn material(x: f64, y: f64, z: f64, (density, specific_heat, conductivity): (f64, f64, f64)) -> MaterialCuboid {
    MaterialCuboid {
        x,
        y,
        z,
        density,
        specific_heat,
        conductivity,
    }
}

/// One 1 mm silicon core on the left cell of a 2x1x1 mm copper board, cooled by convection at 25 C. The core runs a
/// single task at full clock for 40 s and dissipates `alpha + beta` watts.
pub fn thermal_spec(frequency: f64, alpha: f64, beta: f64) -> GlobalSpecification {
    let mut cores: CoresSpecification = CoresSpecification::new(vec![frequency], vec![frequency]);
    cores.physical = Some(material(0.001, 0.001, 0.001, SILICON));
    cores.power = Some(PowerModel::Frequency { alpha, beta });
    cores.origins = Some(vec![Origin { x: 0.0, y: 0.0 }]);
    GlobalSpecification::new(
        TasksSpecification::new(vec![PeriodicTask::new(40.0 * frequency, 40.0, 40.0)], vec![]),
        CpuSpecification::new(
            Some(BoardSpecification {
                physical: material(0.002, 0.001, 0.001, COPPER),
            }),
            cores,
        ),
        Some(EnvironmentSpecification::new(5000.0, 25.0, 80.0)),
        SimulationSpecification::thermal(0.1, 0.001),
    )
}
