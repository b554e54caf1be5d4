// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    collections::sparse::SparseMatrix,
    model::{
        incidence::{
            Block,
            IncidenceModel,
            PlaceRange,
        },
        processor::{
            ProcessorSubModel,
            DEFAULT_ETA,
        },
        tasks::TasksSubModel,
        thermal::{
            power::PowerTable,
            ThermalSubModel,
        },
    },
    runtime::{
        fail::{
            Fail,
            FailKind,
        },
        types::Real,
    },
    specification::{
        GlobalSpecification,
        PowerModel,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Global indices of the places and transitions the simulation loop reads and drives.
///
/// Pair-indexed vectors are laid out `k * n + i` for task `i` on core `k`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IndexMap {
    pub tasks: usize,
    pub cores: usize,
    pub tasks_block: Block,
    pub processor_block: Block,
    pub thermal_block: Option<Block>,
    remaining: Vec<usize>,
    release: Vec<Option<usize>>,
    busy: Vec<usize>,
    exec_places: Vec<usize>,
    idle: Vec<usize>,
    alloc: Vec<usize>,
    exec: Vec<usize>,
    heat: Vec<usize>,
    core_centers: Vec<usize>,
    core_cells: Vec<PlaceRange>,
    thermal_cells: Option<PlaceRange>,
}

/// Observables extracted from the global marking.
#[derive(Clone, Debug, PartialEq)]
pub struct Selector {
    /// Centre cell of every core (m x places).
    pub core_temperature: Option<SparseMatrix>,
    /// Executed-cycles place of every (task, core) pair (n*m x places).
    pub core_execution: SparseMatrix,
}

/// System-wide net of one run.
#[derive(Clone, Debug)]
pub struct GlobalModel {
    pub model: IncidenceModel,
    pub index: IndexMap,
    pub selector: Selector,
    /// Present in thermal runs.
    pub power: Option<PowerTable>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl IndexMap {
    fn pair(&self, i: usize, k: usize) -> usize {
        debug_assert!(i < self.tasks && k < self.cores);
        k * self.tasks + i
    }

    /// Remaining-cycles place of task `i`.
    pub fn remaining_place(&self, i: usize) -> usize {
        self.remaining[i]
    }

    pub fn remaining_places(&self) -> &[usize] {
        &self.remaining
    }

    /// Release transition of task `i`, if periodic.
    pub fn release_transition(&self, i: usize) -> Option<usize> {
        self.release[i]
    }

    pub fn busy_place(&self, i: usize, k: usize) -> usize {
        self.busy[self.pair(i, k)]
    }

    pub fn exec_place(&self, i: usize, k: usize) -> usize {
        self.exec_places[self.pair(i, k)]
    }

    pub fn idle_place(&self, k: usize) -> usize {
        self.idle[k]
    }

    pub fn alloc_transition(&self, i: usize, k: usize) -> usize {
        self.alloc[self.pair(i, k)]
    }

    pub fn exec_transition(&self, i: usize, k: usize) -> usize {
        self.exec[self.pair(i, k)]
    }

    /// Heat injection transition of task `i` on core `k`, in thermal runs.
    pub fn heat_transition(&self, i: usize, k: usize) -> Option<usize> {
        self.heat.get(self.pair(i, k)).copied()
    }

    /// Place holding the reported temperature of core `k`, in thermal runs.
    pub fn core_temperature_place(&self, k: usize) -> Option<usize> {
        self.core_centers.get(k).copied()
    }

    /// Cells of core `k`, in thermal runs.
    pub fn core_cells(&self, k: usize) -> Option<PlaceRange> {
        self.core_cells.get(k).copied()
    }

    /// Board and core cells, in thermal runs.
    pub fn thermal_cells(&self) -> Option<PlaceRange> {
        self.thermal_cells
    }
}

impl GlobalModel {
    /// Validates `spec` and assembles the global net: marking `[tasks | processor | thermal]`, transitions
    /// `[release | alloc | exec | thermal | heat injection]`.
    pub fn new(spec: &GlobalSpecification) -> Result<Self, Fail> {
        timer!("model::global::new");
        spec.validate()?;

        let n: usize = spec.tasks.len();
        let m: usize = spec.cpu.number_of_cores();
        let max_frequency: f64 = spec.max_frequency();

        let tasks: TasksSubModel = TasksSubModel::new(&spec.tasks, max_frequency)?;
        let processor: ProcessorSubModel = ProcessorSubModel::new(n, m, max_frequency, DEFAULT_ETA)?;
        let (power, thermal): (Option<PowerTable>, Option<ThermalSubModel>) = if spec.simulation.simulate_thermal {
            let model: PowerModel = spec.cpu.cores.power.ok_or_else(|| {
                let cause: &str = "thermal run without power model";
                error!("GlobalModel::new(): {}", cause);
                Fail::new(FailKind::InvalidConfig, cause)
            })?;
            let power: PowerTable = PowerTable::new(model, &spec.tasks, max_frequency)?;
            let thermal: ThermalSubModel = ThermalSubModel::new(spec, &power)?;
            (Some(power), Some(thermal))
        } else {
            (None, None)
        };

        let mut parts: Vec<&IncidenceModel> = vec![&tasks.model, &processor.model];
        if let Some(thermal) = &thermal {
            parts.push(&thermal.model);
        }
        let (mut model, blocks): (IncidenceModel, Vec<Block>) = IncidenceModel::compose(&parts)?;
        let tasks_block: Block = blocks[0];
        let processor_block: Block = blocks[1];
        let thermal_block: Option<Block> = blocks.get(2).copied();

        let mut index: IndexMap = IndexMap {
            tasks: n,
            cores: m,
            tasks_block,
            processor_block,
            thermal_block,
            remaining: (0..n).map(|i| tasks_block.place(tasks.remaining_place(i))).collect(),
            release: (0..n)
                .map(|i| tasks.release_transition(i).map(|t| tasks_block.transition(t)))
                .collect(),
            ..Default::default()
        };
        for k in 0..m {
            index.idle.push(processor_block.place(processor.idle_place(k)));
            for i in 0..n {
                index.busy.push(processor_block.place(processor.busy_place(i, k)));
                index.exec_places.push(processor_block.place(processor.exec_place(i, k)));
                index.alloc.push(processor_block.transition(processor.alloc_transition(i, k)));
                index.exec.push(processor_block.transition(processor.exec_transition(i, k)));
            }
        }
        if let (Some(thermal), Some(block)) = (&thermal, thermal_block) {
            for k in 0..m {
                index.core_centers.push(block.place(thermal.center_cell(k)));
                let cells: PlaceRange = thermal.cores[k].places;
                index.core_cells.push(PlaceRange {
                    start: block.places.start + cells.start,
                    len: cells.len,
                });
                for i in 0..n {
                    index.heat.push(block.transition(thermal.heat_transition(i, k)));
                }
            }
            let cells: PlaceRange = thermal.cells();
            index.thermal_cells = Some(PlaceRange {
                start: block.places.start + cells.start,
                len: cells.len,
            });
        }

        // Allocation drains the remaining cycles of the task.
        for k in 0..m {
            for i in 0..n {
                model.pre.set(index.remaining_place(i), index.alloc_transition(i, k), 1.0)?;
            }
        }
        // Heat injection follows the busy place that drives execution, and leaves it untouched.
        if thermal.is_some() {
            let weight: Real = processor.occupancy_weight();
            for k in 0..m {
                for i in 0..n {
                    if let Some(heat) = index.heat_transition(i, k) {
                        let busy: usize = index.busy_place(i, k);
                        model.pre.set(busy, heat, 1.0)?;
                        model.post.set(busy, heat, 1.0)?;
                        model.pi.set(heat, busy, weight)?;
                    }
                }
            }
        }
        model.check_dimensions("global")?;

        let places: usize = model.places();
        let core_execution: SparseMatrix = SparseMatrix::from_triplets(
            n * m,
            places,
            index.exec_places.iter().enumerate().map(|(row, &p)| (row, p, 1.0)),
        )?;
        let core_temperature: Option<SparseMatrix> = if index.core_centers.is_empty() {
            None
        } else {
            Some(SparseMatrix::from_triplets(
                m,
                places,
                index.core_centers.iter().enumerate().map(|(k, &p)| (k, p, 1.0)),
            )?)
        };

        info!(
            "GlobalModel::new(): {} task(s) on {} core(s), {} places, {} transitions",
            n,
            m,
            model.places(),
            model.transitions()
        );

        Ok(Self {
            model,
            index,
            selector: Selector {
                core_temperature,
                core_execution,
            },
            power,
        })
    }

    pub fn is_thermal(&self) -> bool {
        self.index.thermal_block.is_some()
    }

    /// Reported temperature of every core, in thermal runs.
    pub fn core_temperatures(&self, marking: &[Real]) -> Result<Option<Vec<Real>>, Fail> {
        match &self.selector.core_temperature {
            Some(selector) => Ok(Some(selector.mul_vec(marking)?)),
            None => Ok(None),
        }
    }

    /// Hottest cell of every core, in thermal runs.
    pub fn max_core_temperatures(&self, marking: &[Real]) -> Option<Vec<Real>> {
        if !self.is_thermal() {
            return None;
        }
        Some(
            self.index
                .core_cells
                .iter()
                .map(|cells: &PlaceRange| marking[cells.indices()].iter().cloned().fold(Real::MIN, Real::max))
                .collect(),
        )
    }

    /// Temperature of every board and core cell, in thermal runs.
    pub fn temperature_map<'a>(&self, marking: &'a [Real]) -> Option<&'a [Real]> {
        self.index.thermal_cells().map(|cells: PlaceRange| &marking[cells.indices()])
    }

    /// Cycles accumulated in the execution place of every (task, core) pair.
    pub fn executed_cycles(&self, marking: &[Real]) -> Result<Vec<Real>, Fail> {
        self.selector.core_execution.mul_vec(marking)
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
