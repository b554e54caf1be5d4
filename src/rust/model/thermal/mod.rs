// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Heat-transfer sub-net of the board and its cores.
//!
//! Every cuboid is meshed into cubic cells of edge `e`; the marking of a cell is its temperature. Heat flowing from
//! cell `a` to a face-adjacent cell `b` of the same material is modeled by a transition reading `a` at rate
//! `k / (rho * cp * e^2)`, paired with the symmetric one, so the net flow is proportional to the temperature
//! difference. Transitions between materials carry a post weight equal to the ratio of volumetric heat capacities.

pub mod power;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    model::{
        incidence::{
            IncidenceModel,
            NetBuilder,
            Place,
            PlaceRange,
            Transition,
            TransitionRange,
        },
        thermal::power::PowerTable,
    },
    runtime::{
        fail::{
            Fail,
            FailKind,
        },
        types::Real,
    },
    specification::{
        EnvironmentSpecification,
        GlobalSpecification,
        LeakageModel,
        MaterialCuboid,
        Origin,
    },
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Tolerance under which a core origin is considered aligned with the mesh.
const ALIGNMENT_TOLERANCE: f64 = 1e-6;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Cells of one meshed cuboid. Layer `z = 0` is the bottom one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mesh {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    pub places: PlaceRange,
}

/// Heat-transfer sub-net.
#[derive(Clone, Debug)]
pub struct ThermalSubModel {
    pub model: IncidenceModel,
    pub board: Mesh,
    pub cores: Vec<Mesh>,
    /// Place held at the ambient temperature.
    pub ambient: Place,
    /// Place holding one unit token, present when leakage is modeled.
    pub unit: Option<Place>,
    /// Heat injection transitions, indexed `k * n + i`. Their pre, post and enabling arcs on the busy place of the
    /// same pair are added by the global assembler.
    pub heat: TransitionRange,
    pub tasks: usize,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Mesh {
    /// Meshes `cuboid` into cells of edge `step` starting at the next free place of `builder`.
    fn new(builder: &mut NetBuilder, cuboid: &MaterialCuboid, step: f64, temperature: Real) -> Result<Self, Fail> {
        let (nx, ny, nz): (usize, usize, usize) = cuboid.cells(step)?;
        Ok(Self {
            nx,
            ny,
            nz,
            places: builder.add_places(nx * ny * nz, temperature),
        })
    }

    pub fn cell(&self, x: usize, y: usize, z: usize) -> Place {
        debug_assert!(x < self.nx && y < self.ny && z < self.nz);
        self.places.at(x + self.nx * (y + self.ny * z))
    }

    /// Representative cell reported as the temperature of the cuboid.
    pub fn center(&self) -> Place {
        self.cell(self.nx / 2, self.ny / 2, self.nz / 2)
    }

    pub fn len(&self) -> usize {
        self.places.len
    }

    pub fn is_empty(&self) -> bool {
        self.places.len == 0
    }
}

impl ThermalSubModel {
    /// Builds the heat-transfer sub-net of a validated thermal specification.
    pub fn new(spec: &GlobalSpecification, power: &PowerTable) -> Result<Self, Fail> {
        let (board, core, environment, step): (&MaterialCuboid, &MaterialCuboid, &EnvironmentSpecification, f64) =
            match (
                &spec.cpu.board,
                &spec.cpu.cores.physical,
                &spec.environment,
                spec.simulation.mesh_step,
            ) {
                (Some(board), Some(core), Some(environment), Some(step)) => {
                    (&board.physical, core, environment, step)
                },
                _ => {
                    let cause: &str = "thermal sub-model needs board, core geometry, environment and mesh step";
                    error!("ThermalSubModel::new(): {}", cause);
                    return Err(Fail::new(FailKind::InvalidConfig, cause));
                },
            };
        let origins: Vec<Origin> = spec.cpu.core_origins(step)?;
        let n: usize = spec.tasks.len();
        let m: usize = spec.cpu.number_of_cores();
        let t_env: Real = environment.temperature as Real;

        let mut builder: NetBuilder = NetBuilder::new();
        let board_mesh: Mesh = Mesh::new(&mut builder, board, step, t_env)?;
        let mut core_meshes: Vec<Mesh> = Vec::with_capacity(m);
        for _ in 0..m {
            core_meshes.push(Mesh::new(&mut builder, core, step, t_env)?);
        }
        let ambient: Place = builder.add_places(1, t_env).at(0);
        let unit: Option<Place> = spec.cpu.cores.leakage.map(|_| builder.add_places(1, 1.0).at(0));

        add_conduction(&mut builder, &board_mesh, board, step);
        for mesh in &core_meshes {
            add_conduction(&mut builder, mesh, core, step);
        }

        let footprints: Vec<(usize, usize)> = origins
            .iter()
            .map(|origin: &Origin| align(origin, step))
            .collect::<Result<Vec<(usize, usize)>, Fail>>()?;
        let mut covered: Vec<bool> = vec![false; board_mesh.nx * board_mesh.ny];
        for (mesh, &(ox, oy)) in core_meshes.iter().zip(footprints.iter()) {
            add_interlayer(&mut builder, &board_mesh, board, mesh, core, (ox, oy), step)?;
            for y in oy..oy + mesh.ny {
                for x in ox..ox + mesh.nx {
                    covered[x + board_mesh.nx * y] = true;
                }
            }
        }

        add_convection(&mut builder, &board_mesh, board, &covered, ambient, environment.convection, step);

        if let (Some(leakage), Some(unit)) = (spec.cpu.cores.leakage, unit) {
            add_leakage(&mut builder, &core_meshes, leakage, unit);
        }

        // Heat injection: one transition per (task, core) pair.
        let heat: TransitionRange = builder.add_transitions(n * m, 0.0);
        let core_volume: f64 = core.x * core.y * core.z;
        let weight: Real = (1.0 / (core.heat_capacity() * core_volume)) as Real;
        for (k, mesh) in core_meshes.iter().enumerate() {
            for i in 0..n {
                let t: Transition = heat.at(k * n + i);
                builder.set_rate(t, power.reference(i) as Real);
                for cell in mesh.places.iter() {
                    builder.post(cell, t, weight);
                }
            }
        }

        debug!(
            "ThermalSubModel::new(): board of {}x{}x{} cells, {} core(s)",
            board_mesh.nx, board_mesh.ny, board_mesh.nz, m
        );

        Ok(Self {
            model: builder.build("thermal")?,
            board: board_mesh,
            cores: core_meshes,
            ambient,
            unit,
            heat,
            tasks: n,
        })
    }

    pub fn heat_transition(&self, i: usize, k: usize) -> Transition {
        self.heat.at(k * self.tasks + i)
    }

    /// Cell reported as the temperature of core `k`.
    pub fn center_cell(&self, k: usize) -> Place {
        self.cores[k].center()
    }

    /// Board and core cells, which are contiguous and come first.
    pub fn cells(&self) -> PlaceRange {
        let len: usize = self.board.len() + self.cores.iter().map(Mesh::len).sum::<usize>();
        PlaceRange { start: 0, len }
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Adds a pair of opposite transitions between every two face-adjacent cells of a mesh.
fn add_conduction(builder: &mut NetBuilder, mesh: &Mesh, material: &MaterialCuboid, step: f64) {
    let rate: Real = (material.conductivity / (material.heat_capacity() * step * step)) as Real;
    for z in 0..mesh.nz {
        for y in 0..mesh.ny {
            for x in 0..mesh.nx {
                let a: Place = mesh.cell(x, y, z);
                let neighbours: [(bool, usize, usize, usize); 3] = [
                    (x + 1 < mesh.nx, x + 1, y, z),
                    (y + 1 < mesh.ny, x, y + 1, z),
                    (z + 1 < mesh.nz, x, y, z + 1),
                ];
                for (exists, bx, by, bz) in neighbours {
                    if exists {
                        let b: Place = mesh.cell(bx, by, bz);
                        add_flow(builder, a, b, rate, 1.0);
                        add_flow(builder, b, a, rate, 1.0);
                    }
                }
            }
        }
    }
}

/// Couples the bottom layer of a core with the board cells underneath.
fn add_interlayer(
    builder: &mut NetBuilder,
    board_mesh: &Mesh,
    board: &MaterialCuboid,
    core_mesh: &Mesh,
    core: &MaterialCuboid,
    (ox, oy): (usize, usize),
    step: f64,
) -> Result<(), Fail> {
    if ox + core_mesh.nx > board_mesh.nx || oy + core_mesh.ny > board_mesh.ny {
        let cause: String = format!("core footprint at cell ({}, {}) exceeds the board", ox, oy);
        error!("add_interlayer(): {}", cause);
        return Err(Fail::new(FailKind::GeometryError, &cause));
    }
    // Series conductance of the two half cells.
    let conductance: f64 = 2.0 * board.conductivity * core.conductivity / (board.conductivity + core.conductivity);
    let board_rate: Real = (conductance / (board.heat_capacity() * step * step)) as Real;
    let core_rate: Real = (conductance / (core.heat_capacity() * step * step)) as Real;
    let board_to_core: Real = (board.heat_capacity() / core.heat_capacity()) as Real;
    let core_to_board: Real = (core.heat_capacity() / board.heat_capacity()) as Real;

    let top: usize = board_mesh.nz - 1;
    for y in 0..core_mesh.ny {
        for x in 0..core_mesh.nx {
            let b: Place = board_mesh.cell(ox + x, oy + y, top);
            let c: Place = core_mesh.cell(x, y, 0);
            add_flow(builder, b, c, board_rate, board_to_core);
            add_flow(builder, c, b, core_rate, core_to_board);
        }
    }
    Ok(())
}

/// Drains every uncovered top cell of the board towards the ambient place, and feeds them back from it.
fn add_convection(
    builder: &mut NetBuilder,
    board_mesh: &Mesh,
    board: &MaterialCuboid,
    covered: &[bool],
    ambient: Place,
    convection: f64,
    step: f64,
) {
    let rate: Real = (convection / (board.heat_capacity() * step)) as Real;
    let top: usize = board_mesh.nz - 1;
    let exposed: Vec<Place> = (0..board_mesh.ny)
        .flat_map(|y| (0..board_mesh.nx).map(move |x| (x, y)))
        .filter(|&(x, y)| !covered[x + board_mesh.nx * y])
        .map(|(x, y)| board_mesh.cell(x, y, top))
        .collect();
    if exposed.is_empty() {
        return;
    }
    for &cell in &exposed {
        let drain: Transition = builder.add_transitions(1, rate).at(0);
        builder.pre(cell, drain, 1.0).pi(drain, cell, 1.0);
    }
    let source: Transition = builder.add_transitions(1, rate).at(0);
    builder.pre(ambient, source, 1.0).post(ambient, source, 1.0).pi(source, ambient, 1.0);
    for &cell in &exposed {
        builder.post(cell, source, 1.0);
    }
}

/// Adds `delta * T + alpha` to the temperature derivative of every core cell.
fn add_leakage(builder: &mut NetBuilder, core_meshes: &[Mesh], leakage: LeakageModel, unit: Place) {
    for mesh in core_meshes {
        for cell in mesh.places.iter() {
            let amplify: Transition = builder.add_transitions(1, leakage.delta as Real).at(0);
            builder.pre(cell, amplify, 1.0).post(cell, amplify, 2.0).pi(amplify, cell, 1.0);
        }
    }
    let offset: Transition = builder.add_transitions(1, 1.0).at(0);
    builder.pre(unit, offset, 1.0).post(unit, offset, 1.0).pi(offset, unit, 1.0);
    for mesh in core_meshes {
        for cell in mesh.places.iter() {
            builder.post(cell, offset, leakage.alpha as Real);
        }
    }
}

/// Transition reading `from` at `rate`, consuming from it and producing `weight` into `to`.
fn add_flow(builder: &mut NetBuilder, from: Place, to: Place, rate: Real, weight: Real) {
    let t: Transition = builder.add_transitions(1, rate).at(0);
    builder.pre(from, t, 1.0).post(to, t, weight).pi(t, from, 1.0);
}

/// Converts a core origin into mesh cell coordinates.
fn align(origin: &Origin, step: f64) -> Result<(usize, usize), Fail> {
    let x: f64 = origin.x / step;
    let y: f64 = origin.y / step;
    if (x - x.round()).abs() > ALIGNMENT_TOLERANCE || (y - y.round()).abs() > ALIGNMENT_TOLERANCE {
        let cause: String = format!("core origin ({}, {}) is not aligned with mesh step {}", origin.x, origin.y, step);
        error!("align(): {}", cause);
        return Err(Fail::new(FailKind::GeometryError, &cause));
    }
    Ok((x.round() as usize, y.round() as usize))
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
