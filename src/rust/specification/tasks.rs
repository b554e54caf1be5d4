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
// Structures
//======================================================================================================================

/// Periodic task.
#[derive(Clone, Debug, PartialEq)]
pub struct PeriodicTask {
    /// Worst-case execution demand (cycles).
    pub c: f64,
    /// Period (s).
    pub t: f64,
    /// Relative deadline (s).
    pub d: f64,
    /// Energy dissipated by one job (J).
    pub energy: Option<f64>,
}

/// Aperiodic task.
#[derive(Clone, Debug, PartialEq)]
pub struct AperiodicTask {
    /// Worst-case execution demand (cycles).
    pub c: f64,
    /// Arrival time (s).
    pub a: f64,
    /// Absolute deadline (s).
    pub d: f64,
    /// Energy dissipated by the job (J).
    pub energy: Option<f64>,
}

/// Task set of one run. Global task ids number periodic tasks first, then aperiodic ones, in declaration order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TasksSpecification {
    pub periodic_tasks: Vec<PeriodicTask>,
    pub aperiodic_tasks: Vec<AperiodicTask>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl PeriodicTask {
    pub fn new(c: f64, t: f64, d: f64) -> Self {
        Self { c, t, d, energy: None }
    }

    /// Sets the energy dissipated by one job.
    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = Some(energy);
        self
    }
}

impl AperiodicTask {
    pub fn new(c: f64, a: f64, d: f64) -> Self {
        Self { c, a, d, energy: None }
    }

    /// Sets the energy dissipated by the job.
    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = Some(energy);
        self
    }
}

impl TasksSpecification {
    pub fn new(periodic_tasks: Vec<PeriodicTask>, aperiodic_tasks: Vec<AperiodicTask>) -> Self {
        Self {
            periodic_tasks,
            aperiodic_tasks,
        }
    }

    /// Total number of tasks.
    pub fn len(&self) -> usize {
        self.periodic_tasks.len() + self.aperiodic_tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Worst-case demand of the task with the given global id.
    pub fn cycles(&self, id: usize) -> Option<f64> {
        let n_periodic: usize = self.periodic_tasks.len();
        if id < n_periodic {
            Some(self.periodic_tasks[id].c)
        } else {
            self.aperiodic_tasks.get(id - n_periodic).map(|task: &AperiodicTask| task.c)
        }
    }

    /// Energy per job of the task with the given global id.
    pub fn energy(&self, id: usize) -> Option<f64> {
        let n_periodic: usize = self.periodic_tasks.len();
        if id < n_periodic {
            self.periodic_tasks[id].energy
        } else {
            self.aperiodic_tasks.get(id - n_periodic).and_then(|task: &AperiodicTask| task.energy)
        }
    }

    /// Checks every task against the reference (maximum) frequency of the processor.
    pub fn validate(&self, max_frequency: f64) -> Result<(), Fail> {
        for (i, task) in self.periodic_tasks.iter().enumerate() {
            if !is_positive(task.c) || !is_positive(task.t) {
                return Err(invalid_task(i, &format!("needs positive cycles and period, got c={} t={}", task.c, task.t)));
            }
            // One job open at a time.
            if task.d > task.t {
                return Err(invalid_task(i, &format!("deadline {} is longer than its period {}", task.d, task.t)));
            }
            if !task.d.is_finite() || task.d * max_frequency < task.c {
                return Err(invalid_task(
                    i,
                    &format!("deadline {} is shorter than {} cycles at {} Hz", task.d, task.c, max_frequency),
                ));
            }
        }
        let n_periodic: usize = self.periodic_tasks.len();
        for (j, task) in self.aperiodic_tasks.iter().enumerate() {
            if !is_positive(task.c) || !task.a.is_finite() || task.a < 0.0 {
                return Err(invalid_task(
                    n_periodic + j,
                    &format!("needs positive cycles and a non-negative arrival, got c={} a={}", task.c, task.a),
                ));
            }
            if !task.d.is_finite() || (task.d - task.a) * max_frequency < task.c {
                return Err(invalid_task(
                    n_periodic + j,
                    &format!(
                        "window [{}, {}] is shorter than {} cycles at {} Hz",
                        task.a, task.d, task.c, max_frequency
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Least common multiple of the periods. Periods are scaled by `10^decimals` and rounded before the integer
    /// computation. Without periodic tasks this is the latest aperiodic deadline.
    pub fn hyperperiod(&self, decimals: u32) -> Result<f64, Fail> {
        if self.periodic_tasks.is_empty() {
            return match self.aperiodic_tasks.iter().map(|task: &AperiodicTask| task.d).reduce(f64::max) {
                Some(h) => Ok(h),
                None => {
                    let cause: &str = "empty task set has no hyperperiod";
                    error!("hyperperiod(): {}", cause);
                    Err(Fail::new(FailKind::InvalidTaskSpec, cause))
                },
            };
        }

        let scale: f64 = 10f64.powi(decimals as i32);
        let mut lcm: u128 = 1;
        for task in &self.periodic_tasks {
            let period: u128 = (task.t * scale).round() as u128;
            if period == 0 {
                let cause: String = format!("period {} vanishes at {} decimals", task.t, decimals);
                error!("hyperperiod(): {}", cause);
                return Err(Fail::new(FailKind::InvalidTaskSpec, &cause));
            }
            lcm = match (lcm / gcd(lcm, period)).checked_mul(period) {
                Some(lcm) => lcm,
                None => {
                    let cause: String = format!("hyperperiod overflows at period {} with {} decimals", task.t, decimals);
                    error!("hyperperiod(): {}", cause);
                    return Err(Fail::new(FailKind::InvalidTaskSpec, &cause));
                },
            };
        }
        Ok(lcm as f64 / scale)
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let r: u128 = a % b;
        a = b;
        b = r;
    }
    a
}

fn is_positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}

fn invalid_task(id: usize, reason: &str) -> Fail {
    let cause: String = format!("task {} {}", id, reason);
    error!("validate(): {}", cause);
    Fail::new(FailKind::InvalidTaskSpec, &cause)
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
