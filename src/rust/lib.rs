// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Joint simulation of multicore real-time scheduling, processor execution and heat transfer on top of a Timed
//! Continuous Petri Net (TCPN) engine.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

#[macro_use]
extern crate log;

#[macro_use]
pub mod perftools;

pub mod batch;
pub mod collections;
pub mod model;
pub mod runtime;
pub mod simulation;
pub mod specification;
pub mod tcpn;

pub use self::{
    batch::{
        run_batch,
        BatchOutcome,
    },
    model::global::{
        GlobalModel,
        IndexMap,
    },
    runtime::{
        fail::{
            Fail,
            FailKind,
        },
        types::Real,
    },
    simulation::{
        scheduler::{
            Scheduler,
            SchedulingDecision,
            TaskId,
        },
        system::{
            CancellationToken,
            SystemSimulator,
        },
        task::SystemTask,
        trace::{
            DeadlineMiss,
            SimulationTrace,
        },
    },
    specification::GlobalSpecification,
    tcpn::simulator::{
        Integrator,
        TcpnSimulator,
    },
};

//======================================================================================================================
// Macros
//======================================================================================================================

/// Ensures that two expressions are equal, bailing out of the enclosing `anyhow` context otherwise.
#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    ::anyhow::bail!(
                        "ensure failed: `(left == right)` left: `{:?}`, right: `{:?}` at {}:{}",
                        left_val,
                        right_val,
                        file!(),
                        line!()
                    );
                }
            },
        }
    }};
}

/// Ensures that two expressions are not equal, bailing out of the enclosing `anyhow` context otherwise.
#[macro_export]
macro_rules! ensure_neq {
    ($left:expr, $right:expr) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if *left_val == *right_val {
                    ::anyhow::bail!(
                        "ensure failed: `(left != right)` left: `{:?}`, right: `{:?}` at {}:{}",
                        left_val,
                        right_val,
                        file!(),
                        line!()
                    );
                }
            },
        }
    }};
}
