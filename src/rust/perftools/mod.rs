// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

#[cfg(feature = "profiler")]
pub mod profiler;

//======================================================================================================================
// Macros
//======================================================================================================================

/// Opens a profiling scope that lasts until the end of the enclosing block.
#[cfg(feature = "profiler")]
#[macro_export]
macro_rules! timer {
    ($name:expr) => {
        let _guard = $crate::perftools::profiler::PROFILER.with(|p| p.borrow_mut().sync_scope($name));
    };
}

/// Opens a profiling scope that lasts until the end of the enclosing block.
#[cfg(not(feature = "profiler"))]
#[macro_export]
macro_rules! timer {
    ($name:expr) => {};
}
