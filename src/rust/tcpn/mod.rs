// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Discrete-time integration of continuous Petri nets.

pub mod simulator;
