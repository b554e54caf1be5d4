// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::fail::{
        Fail,
        FailKind,
    },
    specification::{
        PowerModel,
        TasksSpecification,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Power dissipated by each task, resolved once per run from the power model.
///
/// The heat injection transition of a (task, core) pair fires at the task's reference power, the power at full clock.
/// The simulation loop scales it by [`PowerTable::ratio`] for the core's current frequency.
#[derive(Clone, Debug, PartialEq)]
pub struct PowerTable {
    model: PowerModel,
    max_frequency: f64,
    /// Power at full clock of every task (W).
    reference: Vec<f64>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl PowerTable {
    /// Resolves the power of every task. The energy model needs the energy of every task.
    pub fn new(model: PowerModel, tasks: &TasksSpecification, max_frequency: f64) -> Result<Self, Fail> {
        let mut reference: Vec<f64> = Vec::with_capacity(tasks.len());
        for id in 0..tasks.len() {
            let power: f64 = match model {
                PowerModel::Energy => match (tasks.energy(id), tasks.cycles(id)) {
                    (Some(energy), Some(cycles)) if cycles > 0.0 => energy * max_frequency / cycles,
                    _ => {
                        let cause: String = format!("task {} has no energy for the energy power model", id);
                        error!("PowerTable::new(): {}", cause);
                        return Err(Fail::new(FailKind::InvalidTaskSpec, &cause));
                    },
                },
                PowerModel::Frequency { alpha, beta } => alpha + beta,
            };
            if power < 0.0 || !power.is_finite() {
                let cause: String = format!("task {} dissipates invalid power {}", id, power);
                error!("PowerTable::new(): {}", cause);
                return Err(Fail::new(FailKind::InvalidConfig, &cause));
            }
            reference.push(power);
        }
        Ok(Self {
            model,
            max_frequency,
            reference,
        })
    }

    /// Power of `task` at full clock (W).
    pub fn reference(&self, task: usize) -> f64 {
        self.reference[task]
    }

    /// Power of `task` running at `frequency` (W).
    pub fn power(&self, task: usize, frequency: f64) -> f64 {
        let relative: f64 = frequency / self.max_frequency;
        match self.model {
            PowerModel::Energy => self.reference[task] * relative,
            PowerModel::Frequency { alpha, beta } => alpha * relative.powi(3) + beta,
        }
    }

    /// Ratio between the power at `frequency` and the reference power.
    pub fn ratio(&self, task: usize, frequency: f64) -> f64 {
        let reference: f64 = self.reference[task];
        if reference > 0.0 {
            self.power(task, frequency) / reference
        } else {
            0.0
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
