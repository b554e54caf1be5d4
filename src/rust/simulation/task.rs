// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    simulation::scheduler::TaskId,
    specification::{
        AperiodicTask,
        PeriodicTask,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Fraction of a job's demand under which the job is complete.
pub const COMPLETION_TOLERANCE: f64 = 1e-9;

//======================================================================================================================
// Structures
//======================================================================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    Periodic,
    Aperiodic,
}

/// Runtime view of a task handed to schedulers.
#[derive(Clone, Debug, PartialEq)]
pub struct SystemTask {
    /// Global id: periodic tasks first, then aperiodic ones, in declaration order.
    pub id: TaskId,
    pub kind: TaskKind,
    /// Demand of one job (cycles).
    pub c: f64,
    /// Period (s). Aperiodic tasks have none.
    pub t: Option<f64>,
    /// Relative deadline (s).
    pub d: f64,
    /// Arrival of the first job (s).
    pub a: f64,
    /// Demand left in the current job (cycles).
    pub pending_c: f64,
    /// Arrival of the next job, if any (s).
    pub next_arrival: Option<f64>,
    /// Absolute deadline of the current job, while its window is open (s).
    pub next_deadline: Option<f64>,
    /// Jobs released so far.
    pub jobs: usize,
    pub energy: Option<f64>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SystemTask {
    pub fn periodic(id: TaskId, task: &PeriodicTask) -> Self {
        Self {
            id,
            kind: TaskKind::Periodic,
            c: task.c,
            t: Some(task.t),
            d: task.d,
            a: 0.0,
            pending_c: 0.0,
            next_arrival: Some(0.0),
            next_deadline: None,
            jobs: 0,
            energy: task.energy,
        }
    }

    /// The deadline of an aperiodic task is absolute.
    pub fn aperiodic(id: TaskId, task: &AperiodicTask) -> Self {
        Self {
            id,
            kind: TaskKind::Aperiodic,
            c: task.c,
            t: None,
            d: task.d - task.a,
            a: task.a,
            pending_c: 0.0,
            next_arrival: Some(task.a),
            next_deadline: None,
            jobs: 0,
            energy: task.energy,
        }
    }

    pub fn is_periodic(&self) -> bool {
        self.kind == TaskKind::Periodic
    }

    /// Whether the current job still has demand left.
    pub fn is_executable(&self) -> bool {
        self.pending_c > COMPLETION_TOLERANCE * self.c
    }

    /// Opens the window of the job arriving at `time`.
    pub fn release(&mut self, time: f64) {
        self.pending_c = self.c;
        self.next_deadline = Some(time + self.d);
        self.jobs += 1;
        self.next_arrival = self.t.map(|t: f64| time + t);
    }

    /// Closes the current job window. Returns whether demand was left.
    pub fn expire(&mut self) -> bool {
        let missed: bool = self.is_executable();
        self.pending_c = 0.0;
        self.next_deadline = None;
        missed
    }

    /// Executes up to `cycles` of the current job. Returns the executed cycles.
    pub fn execute(&mut self, cycles: f64) -> f64 {
        let executed: f64 = cycles.min(self.pending_c).max(0.0);
        self.pending_c -= executed;
        if !self.is_executable() {
            self.pending_c = 0.0;
        }
        executed
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
