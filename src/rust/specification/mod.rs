// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Problem specification consumed by the model builders and the simulation loop.

//======================================================================================================================
// Exports
//======================================================================================================================

pub mod config;
pub mod cpu;
pub mod environment;
pub mod simulation;
pub mod tasks;

pub use self::{
    cpu::{
        BoardSpecification,
        CoresSpecification,
        CpuSpecification,
        LeakageModel,
        MaterialCuboid,
        Origin,
        PowerModel,
    },
    environment::EnvironmentSpecification,
    simulation::SimulationSpecification,
    tasks::{
        AperiodicTask,
        PeriodicTask,
        TasksSpecification,
    },
};

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::{
    Fail,
    FailKind,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Everything needed to build and run one simulation.
#[derive(Clone, Debug, PartialEq)]
pub struct GlobalSpecification {
    pub tasks: TasksSpecification,
    pub cpu: CpuSpecification,
    pub environment: Option<EnvironmentSpecification>,
    pub simulation: SimulationSpecification,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl GlobalSpecification {
    pub fn new(
        tasks: TasksSpecification,
        cpu: CpuSpecification,
        environment: Option<EnvironmentSpecification>,
        simulation: SimulationSpecification,
    ) -> Self {
        Self {
            tasks,
            cpu,
            environment,
            simulation,
        }
    }

    /// Reference frequency `F` of the run.
    pub fn max_frequency(&self) -> f64 {
        self.cpu.cores.max_frequency()
    }

    pub fn hyperperiod(&self) -> Result<f64, Fail> {
        self.tasks.hyperperiod(self.simulation.decimals)
    }

    /// Checks the cross-field constraints of the whole specification.
    pub fn validate(&self) -> Result<(), Fail> {
        self.cpu.validate()?;
        if self.tasks.is_empty() {
            return Err(invalid_config("the task set is empty"));
        }
        self.tasks.validate(self.max_frequency())?;

        let dt: f64 = self.simulation.dt;
        if dt <= 0.0 || !dt.is_finite() {
            return Err(invalid_config(&format!("time step {} must be positive", dt)));
        }
        let hyperperiod: f64 = self.hyperperiod()?;
        if (hyperperiod / dt).round() < 1.0 {
            return Err(invalid_config(&format!(
                "hyperperiod {} is shorter than one time step {}",
                hyperperiod, dt
            )));
        }

        if self.simulation.simulate_thermal {
            self.validate_thermal()?;
        }
        Ok(())
    }

    fn validate_thermal(&self) -> Result<(), Fail> {
        if self.cpu.board.is_none() || self.cpu.cores.physical.is_none() {
            return Err(invalid_config("thermal simulation needs board and core geometry"));
        }
        match self.simulation.mesh_step {
            Some(step) if step > 0.0 => (),
            _ => return Err(invalid_config("thermal simulation needs a positive mesh step")),
        }
        match &self.environment {
            Some(environment) if environment.convection >= 0.0 => (),
            Some(_) => return Err(invalid_config("convection coefficient must be non-negative")),
            None => return Err(invalid_config("thermal simulation needs an environment")),
        }
        match self.cpu.cores.power {
            Some(PowerModel::Energy) => {
                for id in 0..self.tasks.len() {
                    if self.tasks.energy(id).is_none() {
                        let cause: String = format!("task {} has no energy for the energy power model", id);
                        error!("validate_thermal(): {}", cause);
                        return Err(Fail::new(FailKind::InvalidTaskSpec, &cause));
                    }
                }
            },
            Some(PowerModel::Frequency { .. }) => (),
            None => return Err(invalid_config("thermal simulation needs a power model")),
        }
        Ok(())
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn invalid_config(cause: &str) -> Fail {
    error!("validate(): {}", cause);
    Fail::new(FailKind::InvalidConfig, cause)
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
