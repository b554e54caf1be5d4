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
        fail::{
            Fail,
            FailKind,
        },
        types::Real,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Ratio between execution and allocation dynamics.
pub const DEFAULT_ETA: f64 = 100.0;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Execution sub-net of `m` cores shared by `n` tasks.
///
/// Core `k` owns `n` busy places, `n` exec places and one idle place, laid out as `[busy | exec | idle]` in a block
/// of `2n + 1` places. The allocation transition of task `i` on core `k` takes `eta` from the idle token for every
/// cycle it moves into the busy place; the execution transition drains the busy place into the exec place, which
/// therefore accumulates executed cycles, and gives `eta` back to idle. `idle + eta * sum(busy)` stays at 1.
///
/// Both transitions fire at `2 * eta * F` and are scaled online by the control vector. Under equal controls the
/// token settles half idle and half busy, and execution then runs at exactly the controlled clock.
#[derive(Clone, Debug)]
pub struct ProcessorSubModel {
    pub model: IncidenceModel,
    pub tasks: usize,
    pub cores: usize,
    pub eta: f64,
    /// Place block of every core.
    pub core_places: Vec<PlaceRange>,
    /// Allocation transitions, indexed `k * n + i`.
    pub alloc: TransitionRange,
    /// Execution transitions, indexed `k * n + i`.
    pub exec: TransitionRange,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl ProcessorSubModel {
    /// Builds the execution sub-net for `n` tasks on `m` cores clocked at most at `max_frequency`.
    pub fn new(n: usize, m: usize, max_frequency: f64, eta: f64) -> Result<Self, Fail> {
        if m == 0 || max_frequency <= 0.0 || eta <= 0.0 {
            let cause: String = format!(
                "cannot model {} cores at {} Hz with eta {}",
                m, max_frequency, eta
            );
            error!("ProcessorSubModel::new(): {}", cause);
            return Err(Fail::new(FailKind::InvalidConfig, &cause));
        }

        let mut builder: NetBuilder = NetBuilder::new();
        let rate: Real = (2.0 * eta * max_frequency) as Real;
        let core_places: Vec<PlaceRange> = (0..m).map(|_| builder.add_places(2 * n + 1, 0.0)).collect();
        let alloc: TransitionRange = builder.add_transitions(n * m, rate);
        let exec: TransitionRange = builder.add_transitions(n * m, rate);

        for (k, places) in core_places.iter().enumerate() {
            let idle: Place = places.at(2 * n);
            builder.set_marking(idle, 1.0);
            for i in 0..n {
                let busy: Place = places.at(i);
                let executed: Place = places.at(n + i);
                let t_alloc: Transition = alloc.at(k * n + i);
                let t_exec: Transition = exec.at(k * n + i);
                builder
                    .pre(idle, t_alloc, eta as Real)
                    .post(busy, t_alloc, 1.0)
                    .pi(t_alloc, idle, (1.0 / eta) as Real)
                    .pre(busy, t_exec, 1.0)
                    .post(executed, t_exec, 1.0)
                    .post(idle, t_exec, eta as Real)
                    .pi(t_exec, busy, 1.0);
            }
        }

        Ok(Self {
            model: builder.build("processor")?,
            tasks: n,
            cores: m,
            eta,
            core_places,
            alloc,
            exec,
        })
    }

    pub fn busy_place(&self, i: usize, k: usize) -> Place {
        self.core_places[k].at(i)
    }

    pub fn exec_place(&self, i: usize, k: usize) -> Place {
        self.core_places[k].at(self.tasks + i)
    }

    pub fn idle_place(&self, k: usize) -> Place {
        self.core_places[k].at(2 * self.tasks)
    }

    /// Weight turning the busy marking of a running task into its share of the core, 1 once allocation settles.
    pub fn occupancy_weight(&self) -> Real {
        (2.0 * self.eta) as Real
    }

    pub fn alloc_transition(&self, i: usize, k: usize) -> Transition {
        self.alloc.at(k * self.tasks + i)
    }

    pub fn exec_transition(&self, i: usize, k: usize) -> Transition {
        self.exec.at(k * self.tasks + i)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
