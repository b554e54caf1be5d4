// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::simulation::scheduler::TaskId;

//======================================================================================================================
// Structures
//======================================================================================================================

/// A job whose window closed before its demand was met.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeadlineMiss {
    pub task: TaskId,
    /// Job number, starting at 1.
    pub job: usize,
    /// Absolute deadline (s).
    pub deadline: f64,
}

/// Per-tick record of one run.
///
/// Column `j` of every matrix holds the state at the end of tick `j`, at `time[j]`. Rows of (task, core) matrices are
/// indexed `k * n + i`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SimulationTrace {
    pub tasks: usize,
    pub cores: usize,
    pub time: Vec<f64>,
    /// 1 while task `i` is assigned to core `k` and has demand left.
    pub allocation: Vec<Vec<f64>>,
    /// Accumulated execution time (s).
    pub execution: Vec<Vec<f64>>,
    /// Accumulated executed cycles, read from the net.
    pub execution_tcpn: Vec<Vec<f64>>,
    pub frequencies: Vec<Vec<f64>>,
    /// Temperature of every board and core cell, when requested in thermal runs.
    pub temperature_map: Option<Vec<Vec<f64>>>,
    pub core_temperatures: Option<Vec<Vec<f64>>>,
    pub max_core_temperatures: Option<Vec<Vec<f64>>>,
    /// Energy consumed by every core during each tick (J).
    pub energy: Option<Vec<Vec<f64>>>,
    pub deadline_misses: Vec<DeadlineMiss>,
    /// Quantum in force during each tick (s).
    pub quantum: Vec<f64>,
}

/// Observables of one tick.
pub struct TickRecord<'a> {
    pub time: f64,
    pub allocation: &'a [f64],
    pub execution: &'a [f64],
    pub execution_tcpn: &'a [f64],
    pub frequencies: &'a [f64],
    pub temperature_map: Option<&'a [f64]>,
    pub core_temperatures: Option<&'a [f64]>,
    pub max_core_temperatures: Option<&'a [f64]>,
    pub energy: Option<&'a [f64]>,
    pub quantum: f64,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl SimulationTrace {
    /// Creates an empty trace. Thermal series are allocated when `thermal` is set, the temperature map when `cells`
    /// is given.
    pub fn new(tasks: usize, cores: usize, thermal: bool, cells: Option<usize>) -> Self {
        let pairs: usize = tasks * cores;
        let series = |rows: usize| -> Vec<Vec<f64>> { vec![Vec::new(); rows] };
        Self {
            tasks,
            cores,
            time: Vec::new(),
            allocation: series(pairs),
            execution: series(pairs),
            execution_tcpn: series(pairs),
            frequencies: series(cores),
            temperature_map: if thermal { cells.map(series) } else { None },
            core_temperatures: if thermal { Some(series(cores)) } else { None },
            max_core_temperatures: if thermal { Some(series(cores)) } else { None },
            energy: if thermal { Some(series(cores)) } else { None },
            deadline_misses: Vec::new(),
            quantum: Vec::new(),
        }
    }

    pub fn ticks(&self) -> usize {
        self.time.len()
    }

    /// Row of task `i` on core `k`.
    pub fn row(&self, i: TaskId, k: usize) -> usize {
        k * self.tasks + i
    }

    /// Accumulated execution time of task `i` on core `k`, per tick.
    pub fn execution_of(&self, i: TaskId, k: usize) -> &[f64] {
        &self.execution[self.row(i, k)]
    }

    /// Accumulated execution time of task `i` over every core at the end of `tick`.
    pub fn executed_time(&self, i: TaskId, tick: usize) -> f64 {
        (0..self.cores).map(|k| self.execution[self.row(i, k)][tick]).sum()
    }

    pub fn is_schedulable(&self) -> bool {
        self.deadline_misses.is_empty()
    }

    /// Energy consumed by core `k` over the whole run, in thermal runs.
    pub fn total_energy(&self, k: usize) -> Option<f64> {
        self.energy.as_ref().map(|energy: &Vec<Vec<f64>>| energy[k].iter().sum())
    }

    /// Appends the observables of one tick.
    pub fn record(&mut self, record: TickRecord<'_>) {
        self.time.push(record.time);
        self.quantum.push(record.quantum);
        push_column(&mut self.allocation, record.allocation);
        push_column(&mut self.execution, record.execution);
        push_column(&mut self.execution_tcpn, record.execution_tcpn);
        push_column(&mut self.frequencies, record.frequencies);
        let optional: [(&mut Option<Vec<Vec<f64>>>, Option<&[f64]>); 4] = [
            (&mut self.temperature_map, record.temperature_map),
            (&mut self.core_temperatures, record.core_temperatures),
            (&mut self.max_core_temperatures, record.max_core_temperatures),
            (&mut self.energy, record.energy),
        ];
        for (series, column) in optional {
            if let (Some(series), Some(column)) = (series.as_mut(), column) {
                push_column(series, column);
            }
        }
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn push_column(series: &mut [Vec<f64>], column: &[f64]) {
    debug_assert_eq!(series.len(), column.len());
    for (row, value) in series.iter_mut().zip(column.iter()) {
        row.push(*value);
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
