// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::common::Pinned;
use ::anyhow::Result;
use ::tcpnsim::{
    specification::Origin,
    FailKind,
    GlobalModel,
    GlobalSpecification,
    Integrator,
    SimulationTrace,
    SystemSimulator,
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Steady core temperature of [common::thermal_spec] at 0.1 W: 20 C across the convective surface, 0.25 C along the
/// board and 0.463 C through the board-core interface.
const STEADY_CORE_TEMPERATURE: f64 = 45.7128;

//======================================================================================================================
// Helpers
//======================================================================================================================

fn run_to_steady_state(integrator: Integrator) -> Result<SimulationTrace> {
    common::setup();
    let mut spec: GlobalSpecification = common::thermal_spec(10.0, 0.08, 0.02);
    spec.simulation.integrator = integrator;
    let mut simulator: SystemSimulator<Pinned> = SystemSimulator::new(&spec, Pinned)?;
    Ok(simulator.run()?)
}

fn last(rows: &Option<Vec<Vec<f64>>>, row: usize) -> Result<f64> {
    match rows.as_ref().and_then(|rows: &Vec<Vec<f64>>| rows.get(row)).and_then(|row: &Vec<f64>| row.last()) {
        Some(value) => Ok(*value),
        None => anyhow::bail!("row {} was not recorded", row),
    }
}

fn check_steady_state(trace: &SimulationTrace) -> Result<()> {
    tcpnsim::ensure_eq!(trace.ticks(), 400);
    tcpnsim::ensure_eq!(trace.is_schedulable(), true);

    let core: f64 = last(&trace.core_temperatures, 0)?;
    if (core - STEADY_CORE_TEMPERATURE).abs() > 1e-2 {
        anyhow::bail!("core settled at {} C instead of {} C", core, STEADY_CORE_TEMPERATURE);
    }
    // Single-cell core.
    tcpnsim::ensure_eq!(last(&trace.max_core_temperatures, 0)?, core);

    // Board cell under the core, exposed board cell, core cell.
    tcpnsim::ensure_eq!(trace.temperature_map.as_ref().map(|map: &Vec<Vec<f64>>| map.len()), Some(3));
    let under: f64 = last(&trace.temperature_map, 0)?;
    let exposed: f64 = last(&trace.temperature_map, 1)?;
    tcpnsim::ensure_eq!((exposed - 45.0).abs() < 1e-2, true);
    tcpnsim::ensure_eq!((under - 45.25).abs() < 1e-2, true);
    tcpnsim::ensure_eq!(last(&trace.temperature_map, 2)?, core);

    match trace.total_energy(0) {
        Some(energy) if (energy - 4.0).abs() < 1e-6 => (),
        other => anyhow::bail!("core 0 consumed {:?} J instead of 4 J", other),
    }
    Ok(())
}

//======================================================================================================================
// Steady State
//======================================================================================================================

#[test]
fn explicit_integration_reaches_the_steady_state() -> Result<()> {
    let trace: SimulationTrace = run_to_steady_state(Integrator::EulerPower)?;
    check_steady_state(&trace)
}

#[test]
fn implicit_integration_reaches_the_steady_state() -> Result<()> {
    let trace: SimulationTrace = run_to_steady_state(Integrator::ImplicitEuler)?;
    check_steady_state(&trace)
}

/// Temperatures rise monotonically from ambient while the core keeps dissipating.
#[test]
fn core_heats_up_from_ambient() -> Result<()> {
    let trace: SimulationTrace = run_to_steady_state(Integrator::EulerPower)?;
    let core: &Vec<f64> = match trace.core_temperatures.as_ref().and_then(|rows: &Vec<Vec<f64>>| rows.first()) {
        Some(core) => core,
        None => anyhow::bail!("thermal run without core temperatures"),
    };
    tcpnsim::ensure_eq!(core[0] > 25.0, true);
    let monotonic: bool = core.windows(2).all(|w: &[f64]| w[1] >= w[0] - 1e-9);
    tcpnsim::ensure_eq!(monotonic, true);
    Ok(())
}

//======================================================================================================================
// Geometry
//======================================================================================================================

#[test]
fn overlapping_cores_are_rejected() -> Result<()> {
    let mut spec: GlobalSpecification = common::thermal_spec(10.0, 0.08, 0.02);
    spec.cpu.cores.operating_frequencies = vec![10.0; 2];
    spec.cpu.cores.origins = Some(vec![Origin { x: 0.0, y: 0.0 }, Origin { x: 0.0, y: 0.0 }]);
    match GlobalModel::new(&spec) {
        Err(e) => tcpnsim::ensure_eq!(e.kind, FailKind::GeometryError),
        Ok(_) => anyhow::bail!("two cores on the same cell should be rejected"),
    }
    Ok(())
}

#[test]
fn mesh_step_must_tile_the_board() -> Result<()> {
    let mut spec: GlobalSpecification = common::thermal_spec(10.0, 0.08, 0.02);
    spec.simulation.mesh_step = Some(0.0015);
    match GlobalModel::new(&spec) {
        Err(e) => tcpnsim::ensure_eq!(e.kind, FailKind::GeometryError),
        Ok(_) => anyhow::bail!("a 1.5 mm mesh cannot tile a 2 mm board"),
    }
    Ok(())
}

#[test]
fn core_off_the_board_is_rejected() -> Result<()> {
    let mut spec: GlobalSpecification = common::thermal_spec(10.0, 0.08, 0.02);
    spec.cpu.cores.origins = Some(vec![Origin { x: 0.0015, y: 0.0 }]);
    match GlobalModel::new(&spec) {
        Err(e) => tcpnsim::ensure_eq!(e.kind, FailKind::GeometryError),
        Ok(_) => anyhow::bail!("a core hanging over the edge should be rejected"),
    }
    Ok(())
}

/// Without explicit origins the cores are spread over the board.
#[test]
fn generated_placement_builds_a_model() -> Result<()> {
    let mut spec: GlobalSpecification = common::thermal_spec(10.0, 0.08, 0.02);
    spec.cpu.cores.operating_frequencies = vec![10.0; 2];
    spec.cpu.cores.origins = None;
    let model: GlobalModel = GlobalModel::new(&spec)?;
    tcpnsim::ensure_eq!(model.is_thermal(), true);
    tcpnsim::ensure_eq!(model.index.thermal_cells().map(|cells| cells.len), Some(4));
    let first: Option<usize> = model.index.core_temperature_place(0);
    let second: Option<usize> = model.index.core_temperature_place(1);
    tcpnsim::ensure_neq!(first, second);
    Ok(())
}
