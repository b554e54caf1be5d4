// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//! Time-stepping driver of one run.

pub mod scheduler;
pub mod system;
pub mod task;
pub mod trace;
