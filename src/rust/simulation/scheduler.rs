// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::fail::Fail,
    simulation::task::SystemTask,
    specification::GlobalSpecification,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Global task id.
pub type TaskId = usize;

/// Outcome of one scheduling decision.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SchedulingDecision {
    /// Task run by every core, `None` for an idle core.
    pub assignment: Vec<Option<TaskId>>,
    /// Length of the next quantum (s). The current one is kept when absent.
    pub next_quantum: Option<f64>,
    /// Frequency of every core from now on (Hz). The current ones are kept when absent.
    pub next_frequencies: Option<Vec<f64>>,
}

//======================================================================================================================
// Traits
//======================================================================================================================

/// Scheduling policy driving one run.
///
/// The policy itself is immutable; whatever it learns across calls lives in its `State`, created by the offline stage
/// and threaded by the simulation loop through every later call. Returned errors abort the run.
pub trait Scheduler {
    type State;

    /// Runs once before the first tick. Returns the base quantum (s) and the initial state. Fails with
    /// `InfeasibleSchedule` when the task set cannot be scheduled.
    fn offline_stage(
        &self,
        spec: &GlobalSpecification,
        periodic: &[SystemTask],
        aperiodic: &[SystemTask],
    ) -> Result<(f64, Self::State), Fail>;

    /// Called on the tick where aperiodic tasks arrive. Returns whether the loop must reschedule now.
    fn aperiodic_arrive(
        &self,
        _state: &mut Self::State,
        _time: f64,
        _arrived: &[SystemTask],
        _frequencies: &[f64],
        _temperatures: Option<&[f64]>,
    ) -> Result<bool, Fail> {
        Ok(false)
    }

    /// Called at every quantum boundary with the executable tasks and the assignment in force.
    fn schedule_policy(
        &self,
        state: &mut Self::State,
        time: f64,
        executable: &[SystemTask],
        active: &[Option<TaskId>],
        frequencies: &[f64],
        temperatures: Option<&[f64]>,
    ) -> Result<SchedulingDecision, Fail>;
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SchedulingDecision {
    pub fn new(assignment: Vec<Option<TaskId>>) -> Self {
        Self {
            assignment,
            next_quantum: None,
            next_frequencies: None,
        }
    }

    pub fn with_quantum(mut self, quantum: f64) -> Self {
        self.next_quantum = Some(quantum);
        self
    }

    pub fn with_frequencies(mut self, frequencies: Vec<f64>) -> Self {
        self.next_frequencies = Some(frequencies);
        self
    }
}
