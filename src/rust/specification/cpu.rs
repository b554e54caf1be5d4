// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::fail::{
    Fail,
    FailKind,
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Tolerance applied to geometric comparisons (m).
const GEOMETRY_TOLERANCE: f64 = 1e-9;

/// Tolerance under which a cuboid side is considered a whole number of mesh cells.
const TILING_TOLERANCE: f64 = 1e-6;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Homogeneous material block.
#[derive(Clone, Debug, PartialEq)]
pub struct MaterialCuboid {
    /// Width (m).
    pub x: f64,
    /// Depth (m).
    pub y: f64,
    /// Height (m).
    pub z: f64,
    /// Density (kg/m^3).
    pub density: f64,
    /// Specific heat capacity (J/(kg K)).
    pub specific_heat: f64,
    /// Thermal conductivity (W/(m K)).
    pub conductivity: f64,
}

/// Position of a core's lower-left corner on the board (m).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Origin {
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoardSpecification {
    pub physical: MaterialCuboid,
}

/// Heat dissipated by a core while it runs a task.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PowerModel {
    /// Each job dissipates its declared energy spread over its cycles.
    Energy,
    /// `alpha * (f/F)^3 + beta` watts while running.
    Frequency { alpha: f64, beta: f64 },
}

/// Temperature-dependent leakage, `dT/dt += delta * T + alpha` on every core cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LeakageModel {
    pub alpha: f64,
    pub delta: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CoresSpecification {
    /// Geometry and material of one core. Required by thermal runs.
    pub physical: Option<MaterialCuboid>,
    /// Heat injected by running tasks. Required by thermal runs.
    pub power: Option<PowerModel>,
    pub leakage: Option<LeakageModel>,
    /// Frequencies a scheduler may select (Hz).
    pub available_frequencies: Vec<f64>,
    /// Initial frequency of each core (Hz). Its length is the core count.
    pub operating_frequencies: Vec<f64>,
    /// Core placement. Generated when absent.
    pub origins: Option<Vec<Origin>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CpuSpecification {
    pub board: Option<BoardSpecification>,
    pub cores: CoresSpecification,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl MaterialCuboid {
    /// Volumetric heat capacity `rho * cp` (J/(m^3 K)).
    pub fn heat_capacity(&self) -> f64 {
        self.density * self.specific_heat
    }

    /// Number of cubic cells of edge `step` along each axis.
    pub fn cells(&self, step: f64) -> Result<(usize, usize, usize), Fail> {
        Ok((tile(self.x, step, "x")?, tile(self.y, step, "y")?, tile(self.z, step, "z")?))
    }
}

impl CoresSpecification {
    /// Creates a core set without physical description.
    pub fn new(available_frequencies: Vec<f64>, operating_frequencies: Vec<f64>) -> Self {
        Self {
            physical: None,
            power: None,
            leakage: None,
            available_frequencies,
            operating_frequencies,
            origins: None,
        }
    }

    pub fn number_of_cores(&self) -> usize {
        self.operating_frequencies.len()
    }

    /// Reference frequency `F`, the largest available one.
    pub fn max_frequency(&self) -> f64 {
        self.available_frequencies.iter().cloned().fold(0.0, f64::max)
    }

    /// Checks whether `frequency` is one of the available frequencies.
    pub fn is_available(&self, frequency: f64) -> bool {
        self.available_frequencies
            .iter()
            .any(|f: &f64| (f - frequency).abs() <= 1e-9 * f.abs().max(1.0))
    }
}

impl CpuSpecification {
    pub fn new(board: Option<BoardSpecification>, cores: CoresSpecification) -> Self {
        Self { board, cores }
    }

    pub fn number_of_cores(&self) -> usize {
        self.cores.number_of_cores()
    }

    /// Checks the frequency sets and, when the geometry is known, the core placement.
    pub fn validate(&self) -> Result<(), Fail> {
        let cores: &CoresSpecification = &self.cores;
        if cores.operating_frequencies.is_empty() {
            return Err(invalid_config("at least one core is needed"));
        }
        if cores.available_frequencies.is_empty() || cores.available_frequencies.iter().any(|f: &f64| *f <= 0.0) {
            return Err(invalid_config("available frequencies must be positive and non-empty"));
        }
        for (k, f) in cores.operating_frequencies.iter().enumerate() {
            if !cores.is_available(*f) {
                return Err(invalid_config(&format!(
                    "core {} operating frequency {} is not available",
                    k, f
                )));
            }
        }
        if let (Some(board), Some(core), Some(origins)) = (&self.board, &cores.physical, &cores.origins) {
            check_origins(&board.physical, core, origins, self.number_of_cores())?;
        }
        Ok(())
    }

    /// Returns the placement of every core, generating one by recursive bisection of the board when none was given.
    pub fn core_origins(&self, mesh_step: f64) -> Result<Vec<Origin>, Fail> {
        let (board, core): (&MaterialCuboid, &MaterialCuboid) = match (&self.board, &self.cores.physical) {
            (Some(board), Some(core)) => (&board.physical, core),
            _ => return Err(invalid_config("core placement needs board and core geometry")),
        };
        let m: usize = self.number_of_cores();
        let origins: Vec<Origin> = match &self.cores.origins {
            Some(origins) => origins.clone(),
            None => {
                let (bx, by, _): (usize, usize, usize) = board.cells(mesh_step)?;
                let (cx, cy, _): (usize, usize, usize) = core.cells(mesh_step)?;
                let mut cells: Vec<(usize, usize)> = Vec::with_capacity(m);
                bisect(0, 0, bx, by, cx, cy, m, &mut cells)?;
                cells
                    .into_iter()
                    .map(|(x, y)| Origin {
                        x: x as f64 * mesh_step,
                        y: y as f64 * mesh_step,
                    })
                    .collect()
            },
        };
        check_origins(board, core, &origins, m)?;
        Ok(origins)
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Number of cells of edge `step` along a side of length `length`.
fn tile(length: f64, step: f64, axis: &str) -> Result<usize, Fail> {
    if step <= 0.0 || length <= 0.0 {
        return Err(geometry_error(&format!(
            "side {} = {} cannot be meshed with step {}",
            axis, length, step
        )));
    }
    let cells: f64 = length / step;
    let rounded: f64 = cells.round();
    if rounded < 1.0 || (cells - rounded).abs() > TILING_TOLERANCE {
        return Err(geometry_error(&format!(
            "mesh step {} does not tile side {} = {}",
            step, axis, length
        )));
    }
    Ok(rounded as usize)
}

/// Places `count` cores of `cx x cy` cells inside the region, splitting it along its longest side.
#[allow(clippy::too_many_arguments)]
fn bisect(
    x0: usize,
    y0: usize,
    width: usize,
    depth: usize,
    cx: usize,
    cy: usize,
    count: usize,
    out: &mut Vec<(usize, usize)>,
) -> Result<(), Fail> {
    if count == 0 {
        return Ok(());
    }
    if width < cx || depth < cy {
        return Err(geometry_error(&format!(
            "no room for {} more core(s) in a {}x{} cell region",
            count, width, depth
        )));
    }
    if count == 1 {
        out.push((x0 + (width - cx) / 2, y0 + (depth - cy) / 2));
        return Ok(());
    }
    let first: usize = count / 2;
    if width >= depth {
        let split: usize = width * first / count;
        bisect(x0, y0, split, depth, cx, cy, first, out)?;
        bisect(x0 + split, y0, width - split, depth, cx, cy, count - first, out)
    } else {
        let split: usize = depth * first / count;
        bisect(x0, y0, width, split, cx, cy, first, out)?;
        bisect(x0, y0 + split, width, depth - split, cx, cy, count - first, out)
    }
}

/// Checks that every core lies on the board and that no two cores overlap.
fn check_origins(board: &MaterialCuboid, core: &MaterialCuboid, origins: &[Origin], m: usize) -> Result<(), Fail> {
    if origins.len() != m {
        return Err(geometry_error(&format!("{} origins for {} cores", origins.len(), m)));
    }
    for (k, o) in origins.iter().enumerate() {
        if o.x < -GEOMETRY_TOLERANCE
            || o.y < -GEOMETRY_TOLERANCE
            || o.x + core.x > board.x + GEOMETRY_TOLERANCE
            || o.y + core.y > board.y + GEOMETRY_TOLERANCE
        {
            return Err(geometry_error(&format!("core {} at ({}, {}) exceeds the board", k, o.x, o.y)));
        }
    }
    for (a, oa) in origins.iter().enumerate() {
        for (b, ob) in origins.iter().enumerate().skip(a + 1) {
            let overlap_x: f64 = (oa.x + core.x).min(ob.x + core.x) - oa.x.max(ob.x);
            let overlap_y: f64 = (oa.y + core.y).min(ob.y + core.y) - oa.y.max(ob.y);
            if overlap_x > GEOMETRY_TOLERANCE && overlap_y > GEOMETRY_TOLERANCE {
                return Err(geometry_error(&format!("cores {} and {} overlap", a, b)));
            }
        }
    }
    Ok(())
}

fn geometry_error(cause: &str) -> Fail {
    error!("cpu_specification: {}", cause);
    Fail::new(FailKind::GeometryError, cause)
}

fn invalid_config(cause: &str) -> Fail {
    error!("cpu_specification: {}", cause);
    Fail::new(FailKind::InvalidConfig, cause)
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
