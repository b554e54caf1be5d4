// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    collections::dense::DenseMatrix,
    model::incidence::IncidenceModel,
    runtime::{
        fail::{
            Fail,
            FailKind,
        },
        types::{
            Real,
            EPSILON,
        },
    },
};
use ::std::{
    collections::{
        HashMap,
        VecDeque,
    },
    str::FromStr,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Discretization of `dm/dt = A m` over one step of `h * k`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Integrator {
    /// `M = (I + A h)^k`.
    #[default]
    EulerPower,
    /// `M = ((I - A h)^-1)^k`.
    ImplicitEuler,
}

/// Step parameters of a prepared simulator.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Discretization {
    step: Real,
    sub_steps: usize,
}

/// Advances the marking of one net by a fixed step under a per-transition control vector.
///
/// The simulator is uninitialized until [`TcpnSimulator::prepare`] fixes the step; from then on it holds the operator
/// `M` for the current control, and [`TcpnSimulator::step`] returns `M * marking`. Operators of recently used controls
/// are cached, keyed by the exact bit pattern of the control vector.
#[derive(Debug)]
pub struct TcpnSimulator {
    label: String,
    model: IncidenceModel,
    integrator: Integrator,
    control: Vec<Real>,
    discretization: Option<Discretization>,
    operator: Option<DenseMatrix>,
    cache: HashMap<Vec<u64>, DenseMatrix>,
    /// Insertion order of cached operators.
    cache_order: VecDeque<Vec<u64>>,
    cache_capacity: usize,
    tick: Option<u64>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl TcpnSimulator {
    /// Default number of cached operators.
    pub const DEFAULT_CACHE_CAPACITY: usize = 64;

    /// Creates an uninitialized simulator for `model`, with every transition fully enabled.
    pub fn new(label: &str, model: &IncidenceModel, integrator: Integrator) -> Result<Self, Fail> {
        model.check_dimensions(label)?;
        Ok(Self {
            label: label.to_string(),
            model: model.clone(),
            integrator,
            control: vec![1.0; model.transitions()],
            discretization: None,
            operator: None,
            cache: HashMap::new(),
            cache_order: VecDeque::new(),
            cache_capacity: Self::DEFAULT_CACHE_CAPACITY,
            tick: None,
        })
    }

    /// Sets the number of cached operators. Zero disables the cache.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn integrator(&self) -> Integrator {
        self.integrator
    }

    pub fn control(&self) -> &[Real] {
        &self.control
    }

    /// Prepared operator, if any.
    pub fn operator(&self) -> Option<&DenseMatrix> {
        self.operator.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.operator.is_some()
    }

    pub fn cached_operators(&self) -> usize {
        self.cache.len()
    }

    /// Records the tick reported in numerical failures.
    pub fn set_tick(&mut self, tick: u64) {
        self.tick = Some(tick);
    }

    /// Fixes the step to `step` split into `sub_steps` integration steps and computes the operator of the current
    /// control. Previously cached operators are dropped.
    pub fn prepare(&mut self, step: f64, sub_steps: usize) -> Result<(), Fail> {
        timer!("tcpn::simulator::prepare");
        if sub_steps == 0 {
            return Err(self.numerical_error("prepare", "zero sub-steps"));
        }
        if step <= 0.0 || !step.is_finite() {
            return Err(self.numerical_error("prepare", &format!("step {} must be positive", step)));
        }
        let discretization: Discretization = Discretization {
            step: step as Real,
            sub_steps,
        };
        self.cache.clear();
        self.cache_order.clear();
        self.operator = None;
        self.discretization = Some(discretization);
        let operator: DenseMatrix = self.compute_operator(&self.control, discretization)?;
        let control: Vec<Real> = self.control.clone();
        self.remember(&control, &operator);
        self.operator = Some(operator);
        trace!(
            "prepare(): {} ready with step {} in {} sub-step(s)",
            self.label,
            step,
            sub_steps
        );
        Ok(())
    }

    /// Replaces the control vector. When the simulator is ready, the operator is recomputed or taken from the cache.
    pub fn set_control(&mut self, control: &[Real]) -> Result<(), Fail> {
        if control.len() != self.model.transitions() {
            let cause: String = format!(
                "control vector has {} entries for {} transitions",
                control.len(),
                self.model.transitions()
            );
            return Err(self.numerical_error("set_control", &cause));
        }
        if let Some(u) = control.iter().find(|u: &&Real| **u < 0.0 || !u.is_finite()) {
            return Err(self.numerical_error("set_control", &format!("invalid control entry {}", u)));
        }
        if self.operator.is_some() && control == self.control.as_slice() {
            return Ok(());
        }
        self.control = control.to_vec();

        let discretization: Discretization = match self.discretization {
            Some(discretization) => discretization,
            None => return Ok(()),
        };
        let key: Vec<u64> = control_key(control);
        if let Some(operator) = self.cache.get(&key) {
            self.operator = Some(operator.clone());
            return Ok(());
        }
        timer!("tcpn::simulator::set_control");
        let operator: DenseMatrix = self.compute_operator(control, discretization)?;
        self.remember(control, &operator);
        self.operator = Some(operator);
        Ok(())
    }

    /// Returns `M * marking`.
    pub fn step(&self, marking: &[Real]) -> Result<Vec<Real>, Fail> {
        let operator: &DenseMatrix = match &self.operator {
            Some(operator) => operator,
            None => return Err(self.numerical_error("step", "simulator is not prepared")),
        };
        if marking.len() != operator.cols() {
            let cause: String = format!("marking has {} places, expected {}", marking.len(), operator.cols());
            return Err(self.numerical_error("step", &cause));
        }
        let next: Vec<Real> = operator.mul_vec(marking)?;
        if next.iter().any(|x: &Real| !x.is_finite()) {
            return Err(self.numerical_error("step", "marking diverged"));
        }
        Ok(next)
    }

    /// Integrates `marking` over `step` with `sub_steps` explicit Euler steps on the sparse net, under the current
    /// control. Does not need the simulator to be prepared.
    pub fn euler(&self, marking: &[Real], step: f64, sub_steps: usize) -> Result<Vec<Real>, Fail> {
        if sub_steps == 0 {
            return Err(self.numerical_error("euler", "zero sub-steps"));
        }
        if marking.len() != self.model.places() {
            let cause: String = format!("marking has {} places, expected {}", marking.len(), self.model.places());
            return Err(self.numerical_error("euler", &cause));
        }
        let h: Real = (step / sub_steps as f64) as Real;
        let columns: Vec<Vec<(usize, Real)>> = self.model.incidence()?.columns();
        let enabling: Vec<Vec<(usize, Real)>> = self.model.pi.row_lists();
        let mut m: Vec<Real> = marking.to_vec();
        let mut dm: Vec<Real> = vec![0.0; m.len()];
        for _ in 0..sub_steps {
            dm.iter_mut().for_each(|x: &mut Real| *x = 0.0);
            for t in 0..self.model.transitions() {
                let rate: Real = self.model.lambda[t] * self.control[t];
                if rate == 0.0 {
                    continue;
                }
                let flow: Real = rate * enabling[t].iter().map(|&(q, w)| w * m[q]).sum::<Real>();
                for &(p, c) in &columns[t] {
                    dm[p] += c * flow;
                }
            }
            m.iter_mut().zip(dm.iter()).for_each(|(x, d)| *x += h * d);
        }
        Ok(m)
    }

    /// Smallest number of sub-steps for which `h * max_p |A[p, p]| <= 1` with every transition fully enabled. Under
    /// that bound the Euler operator of a net whose consumed places are all read by their transitions has no negative
    /// entry.
    pub fn stable_sub_steps(&self, step: f64) -> Result<usize, Fail> {
        let generator: DenseMatrix = self.model.generator(&vec![1.0; self.model.transitions()])?;
        let stiffness: f64 = step * generator.max_abs_diagonal() as f64;
        Ok((stiffness.ceil() as usize).max(1))
    }

    /// Whether the prepared operator has no negative entry, in which case stepping preserves non-negative markings.
    pub fn is_positive(&self) -> bool {
        match &self.operator {
            Some(operator) => operator.min_entry() >= -EPSILON,
            None => false,
        }
    }

    fn compute_operator(&self, control: &[Real], discretization: Discretization) -> Result<DenseMatrix, Fail> {
        let h: Real = discretization.step / discretization.sub_steps as Real;
        let generator: DenseMatrix = self.model.generator(control)?;
        let single: DenseMatrix = match self.integrator {
            Integrator::EulerPower => generator.identity_plus(h)?,
            Integrator::ImplicitEuler => generator
                .identity_plus(-h)?
                .inverse()
                .map_err(|e: Fail| self.numerical_error("compute_operator", &e.cause))?,
        };
        let operator: DenseMatrix = single.pow(discretization.sub_steps)?;
        if !operator.is_finite() {
            return Err(self.numerical_error("compute_operator", "operator has non-finite entries"));
        }
        Ok(operator)
    }

    fn remember(&mut self, control: &[Real], operator: &DenseMatrix) {
        if self.cache_capacity == 0 {
            return;
        }
        let key: Vec<u64> = control_key(control);
        if self.cache.contains_key(&key) {
            return;
        }
        while self.cache.len() >= self.cache_capacity {
            match self.cache_order.pop_front() {
                Some(oldest) => {
                    self.cache.remove(&oldest);
                },
                None => break,
            }
        }
        self.cache_order.push_back(key.clone());
        self.cache.insert(key, operator.clone());
    }

    fn numerical_error(&self, function: &str, cause: &str) -> Fail {
        let cause: String = match self.tick {
            Some(tick) => format!("{} (tick {}): {}", self.label, tick, cause),
            None => format!("{}: {}", self.label, cause),
        };
        error!("{}(): {}", function, cause);
        Fail::new(FailKind::NumericalError, &cause)
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl FromStr for Integrator {
    type Err = Fail;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "euler_power" => Ok(Integrator::EulerPower),
            "implicit_euler" => Ok(Integrator::ImplicitEuler),
            _ => {
                let cause: String = format!("unknown integrator {:?}", s);
                error!("from_str(): {}", cause);
                Err(Fail::new(FailKind::InvalidConfig, &cause))
            },
        }
    }
}

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

fn control_key(control: &[Real]) -> Vec<u64> {
    control.iter().map(|u: &Real| u64::from(u.to_bits())).collect()
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================
