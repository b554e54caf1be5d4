// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Continuous Petri net models of the task set, the processor and the heat flow, and their composition.

pub mod global;
pub mod incidence;
pub mod processor;
pub mod tasks;
pub mod thermal;
