// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    model::incidence::{
        IncidenceModel,
        NetBuilder,
        Place,
        PlaceRange,
        Transition,
        TransitionRange,
    },
    runtime::{
        fail::Fail,
        types::Real,
    },
    specification::TasksSpecification,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Release sub-net of a task set.
///
/// Each periodic task owns a waiting place holding one token and a release transition that reads it at rate `1/t`
/// and feeds `c` cycles per firing into the task's remaining-cycles place. Aperiodic tasks only own a
/// remaining-cycles place; their demand is injected when they arrive.
#[derive(Clone, Debug)]
pub struct TasksSubModel {
    pub model: IncidenceModel,
    /// Waiting place of every periodic task.
    pub waiting: PlaceRange,
    /// Remaining-cycles place of every task, indexed by global task id. This is the allocation interface consumed by
    /// the processor sub-net.
    pub remaining: PlaceRange,
    /// Release transition of every periodic task.
    pub release: TransitionRange,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl TasksSubModel {
    /// Builds the release sub-net. Fails with `InvalidTaskSpec` when a task cannot meet its deadline at
    /// `max_frequency`.
    pub fn new(tasks: &TasksSpecification, max_frequency: f64) -> Result<Self, Fail> {
        tasks.validate(max_frequency)?;

        let n_periodic: usize = tasks.periodic_tasks.len();
        let mut builder: NetBuilder = NetBuilder::new();
        let waiting: PlaceRange = builder.add_places(n_periodic, 1.0);
        let remaining: PlaceRange = builder.add_places(tasks.len(), 0.0);
        let release: TransitionRange = builder.add_transitions(n_periodic, 0.0);

        for (i, task) in tasks.periodic_tasks.iter().enumerate() {
            let w: Place = waiting.at(i);
            let r: Transition = release.at(i);
            builder
                .set_rate(r, (1.0 / task.t) as Real)
                .pre(w, r, 1.0)
                .post(w, r, 1.0)
                .pi(r, w, 1.0)
                .post(remaining.at(i), r, task.c as Real);
        }

        Ok(Self {
            model: builder.build("tasks")?,
            waiting,
            remaining,
            release,
        })
    }

    /// Remaining-cycles place of task `i`.
    pub fn remaining_place(&self, i: usize) -> Place {
        self.remaining.at(i)
    }

    /// Release transition of task `i`, if periodic.
    pub fn release_transition(&self, i: usize) -> Option<Transition> {
        if i < self.release.len {
            Some(self.release.at(i))
        } else {
            None
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
