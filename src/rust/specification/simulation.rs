// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::tcpn::simulator::Integrator;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Numerical knobs of one run.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulationSpecification {
    /// Base time step (s).
    pub dt: f64,
    /// Edge of the cubic thermal cells (m). Required by thermal runs.
    pub mesh_step: Option<f64>,
    pub simulate_thermal: bool,
    /// Minimum number of integration sub-steps per tick for the task and processor sub-systems.
    pub tasks_fragmentation: usize,
    /// Minimum number of integration sub-steps per tick for the thermal sub-system.
    pub thermal_fragmentation: usize,
    pub integrator: Integrator,
    /// Number of prepared operators kept per simulator.
    pub operator_cache_capacity: usize,
    /// Whether the per-cell temperature trace is recorded.
    pub record_temperature_map: bool,
    /// Decimal digits kept when computing the hyperperiod.
    pub decimals: u32,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SimulationSpecification {
    pub const DEFAULT_TASKS_FRAGMENTATION: usize = 16;
    pub const DEFAULT_THERMAL_FRAGMENTATION: usize = 128;
    pub const DEFAULT_OPERATOR_CACHE_CAPACITY: usize = 64;
    pub const DEFAULT_DECIMALS: u32 = 5;

    /// Creates a specification without thermal simulation.
    pub fn new(dt: f64) -> Self {
        Self {
            dt,
            mesh_step: None,
            simulate_thermal: false,
            tasks_fragmentation: Self::DEFAULT_TASKS_FRAGMENTATION,
            thermal_fragmentation: Self::DEFAULT_THERMAL_FRAGMENTATION,
            integrator: Integrator::default(),
            operator_cache_capacity: Self::DEFAULT_OPERATOR_CACHE_CAPACITY,
            record_temperature_map: true,
            decimals: Self::DEFAULT_DECIMALS,
        }
    }

    /// Creates a specification with thermal simulation on a mesh of the given step.
    pub fn thermal(dt: f64, mesh_step: f64) -> Self {
        Self {
            mesh_step: Some(mesh_step),
            simulate_thermal: true,
            ..Self::new(dt)
        }
    }

    /// Minimum number of sub-steps per tick for the enabled sub-systems.
    pub fn fragmentation(&self) -> usize {
        let fragmentation: usize = if self.simulate_thermal {
            self.tasks_fragmentation.max(self.thermal_fragmentation)
        } else {
            self.tasks_fragmentation
        };
        fragmentation.max(1)
    }
}
