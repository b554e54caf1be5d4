// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::rand::{
    rngs::SmallRng,
    Rng,
    SeedableRng,
};
use ::tcpnsim::{
    model::{
        incidence::{
            IncidenceModel,
            NetBuilder,
            Place,
            PlaceRange,
            Transition,
            TransitionRange,
        },
        tasks::TasksSubModel,
    },
    specification::{
        PeriodicTask,
        TasksSpecification,
    },
    Integrator,
    Real,
    TcpnSimulator,
};

//======================================================================================================================
// Helpers
//======================================================================================================================

/// Random net where every transition reads exactly the place it consumes from and never feeds it back, so its
/// generator is Metzler with a diagonal that only shrinks with the control.
fn random_metzler_model(rng: &mut SmallRng) -> Result<IncidenceModel> {
    let places: usize = rng.gen_range(2..7);
    let transitions: usize = rng.gen_range(1..9);
    let mut builder: NetBuilder = NetBuilder::new();
    let p: PlaceRange = builder.add_places(places, 0.0);
    let t: TransitionRange = builder.add_transitions(transitions, 0.0);
    for place in p.iter() {
        builder.set_marking(place, rng.gen_range(0.0..10.0));
    }
    for transition in t.iter() {
        let source: usize = rng.gen_range(0..places);
        builder
            .set_rate(transition, rng.gen_range(0.1..5.0))
            .pre(p.at(source), transition, rng.gen_range(0.1..2.0))
            .pi(transition, p.at(source), 1.0);
        for _ in 0..rng.gen_range(0..3) {
            let target: Place = p.at((source + rng.gen_range(1..places)) % places);
            builder.post(target, transition, rng.gen_range(0.0..2.0));
        }
    }
    Ok(builder.build("random")?)
}

fn random_control(rng: &mut SmallRng, transitions: usize) -> Vec<Real> {
    (0..transitions).map(|_| rng.gen_range(0.0..=1.0)).collect()
}

//======================================================================================================================
// Conservation
//======================================================================================================================

/// Stepping a Metzler net with a stable number of sub-steps never produces negative markings.
#[test]
fn stepping_preserves_non_negativity() -> Result<()> {
    common::setup();
    let mut rng: SmallRng = SmallRng::seed_from_u64(0x7c9f);
    for _ in 0..64 {
        let model: IncidenceModel = random_metzler_model(&mut rng)?;
        let mut simulator: TcpnSimulator = TcpnSimulator::new("random", &model, Integrator::EulerPower)?;
        let step: f64 = rng.gen_range(0.01..2.0);
        let sub_steps: usize = simulator.stable_sub_steps(step)?;
        simulator.set_control(&random_control(&mut rng, model.transitions()))?;
        simulator.prepare(step, sub_steps)?;
        tcpnsim::ensure_eq!(simulator.is_positive(), true);

        let mut marking: Vec<Real> = model.marking.clone();
        for _ in 0..10 {
            marking = simulator.step(&marking)?;
            if let Some(x) = marking.iter().find(|x: &&Real| **x < -1e-9) {
                anyhow::bail!("negative marking {} after stepping {:?}", x, model);
            }
        }
    }
    Ok(())
}

//======================================================================================================================
// Idempotence
//======================================================================================================================

#[test]
fn prepare_is_idempotent() -> Result<()> {
    let mut rng: SmallRng = SmallRng::seed_from_u64(17);
    for _ in 0..16 {
        let model: IncidenceModel = random_metzler_model(&mut rng)?;
        let mut simulator: TcpnSimulator = TcpnSimulator::new("random", &model, Integrator::EulerPower)?;
        simulator.prepare(0.5, 32)?;
        let first: Vec<Real> = match simulator.operator() {
            Some(operator) => operator.as_slice().to_vec(),
            None => anyhow::bail!("prepared simulator has no operator"),
        };
        simulator.prepare(0.5, 32)?;
        let second: Vec<Real> = match simulator.operator() {
            Some(operator) => operator.as_slice().to_vec(),
            None => anyhow::bail!("prepared simulator has no operator"),
        };
        let identical: bool = first.iter().zip(second.iter()).all(|(a, b)| a.to_bits() == b.to_bits());
        tcpnsim::ensure_eq!(identical, true);
    }
    Ok(())
}

//======================================================================================================================
// Multi-Step Equivalence
//======================================================================================================================

/// One application of the prepared operator matches `sub_steps` explicit Euler steps.
#[test]
fn operator_matches_iterated_euler() -> Result<()> {
    let mut rng: SmallRng = SmallRng::seed_from_u64(2024);
    for _ in 0..32 {
        let model: IncidenceModel = random_metzler_model(&mut rng)?;
        let mut simulator: TcpnSimulator = TcpnSimulator::new("random", &model, Integrator::EulerPower)?;
        let sub_steps: usize = rng.gen_range(1..200);
        simulator.set_control(&random_control(&mut rng, model.transitions()))?;
        simulator.prepare(0.1, sub_steps)?;

        let fast: Vec<Real> = simulator.step(&model.marking)?;
        let slow: Vec<Real> = simulator.euler(&model.marking, 0.1, sub_steps)?;
        for (a, b) in fast.iter().zip(slow.iter()) {
            if (a - b).abs() > 1e-6 * b.abs().max(1.0) {
                anyhow::bail!("operator gives {} where iterated Euler gives {}", a, b);
            }
        }
    }
    Ok(())
}

//======================================================================================================================
// Rate Consistency
//======================================================================================================================

/// Without allocation, one period of a periodic task releases exactly its demand.
#[test]
fn release_transition_delivers_one_job_per_period() -> Result<()> {
    let tasks: TasksSpecification = TasksSpecification::new(vec![PeriodicTask::new(3.0, 10.0, 10.0)], vec![]);
    let sub: TasksSubModel = TasksSubModel::new(&tasks, 1.0)?;
    let mut simulator: TcpnSimulator = TcpnSimulator::new("tasks", &sub.model, Integrator::EulerPower)?;
    simulator.prepare(0.1, 4)?;

    let mut marking: Vec<Real> = sub.model.marking.clone();
    for _ in 0..100 {
        marking = simulator.step(&marking)?;
    }
    let remaining: Real = marking[sub.remaining_place(0).0];
    tcpnsim::ensure_eq!((remaining - 3.0).abs() < 1e-5, true);
    tcpnsim::ensure_eq!(marking[sub.waiting.at(0).0], 1.0);
    Ok(())
}

/// A transition whose rate is scaled to zero by the control leaves the marking untouched.
#[test]
fn disabled_transitions_do_not_fire() -> Result<()> {
    let mut builder: NetBuilder = NetBuilder::new();
    let p: PlaceRange = builder.add_places(2, 1.0);
    let t: TransitionRange = builder.add_transitions(1, 3.0);
    let transfer: Transition = t.at(0);
    builder
        .pre(p.at(0), transfer, 1.0)
        .post(p.at(1), transfer, 1.0)
        .pi(transfer, p.at(0), 1.0);
    let model: IncidenceModel = builder.build("transfer")?;

    let mut simulator: TcpnSimulator = TcpnSimulator::new("transfer", &model, Integrator::ImplicitEuler)?;
    simulator.set_control(&[0.0])?;
    simulator.prepare(1.0, 10)?;
    tcpnsim::ensure_eq!(simulator.step(&model.marking)?, vec![1.0, 1.0]);

    simulator.set_control(&[1.0])?;
    let moved: Vec<Real> = simulator.step(&model.marking)?;
    tcpnsim::ensure_eq!(moved[0] < 0.1, true);
    tcpnsim::ensure_eq!((moved[0] + moved[1] - 2.0).abs() < 1e-9, true);
    Ok(())
}
