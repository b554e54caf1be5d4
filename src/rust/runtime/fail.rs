// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::std::{
    error,
    fmt,
    io,
};

//==============================================================================
// Structures
//==============================================================================

/// Failure taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailKind {
    /// Non-positive cycles or period, or a deadline shorter than the worst-case execution at full clock.
    InvalidTaskSpec,
    /// Overlapping or out-of-bounds core placement, or a mesh step that does not tile a cuboid.
    GeometryError,
    /// A scheduler found no feasible allocation for the task set.
    InfeasibleSchedule,
    /// Singular or non-finite operator.
    NumericalError,
    /// Malformed or inconsistent problem specification.
    InvalidConfig,
    /// A scheduler hook raised an error.
    SchedulerError,
    /// The run was cancelled between two ticks.
    Cancelled,
    /// I/O error.
    Io,
}

/// Failure
#[derive(Clone)]
pub struct Fail {
    /// Error kind.
    pub kind: FailKind,
    /// Cause.
    pub cause: String,
}

//==============================================================================
// Associate Functions
//==============================================================================

/// Associate Functions for Failures
impl Fail {
    /// Creates a new Failure
    pub fn new(kind: FailKind, cause: &str) -> Self {
        Self {
            kind,
            cause: cause.to_string(),
        }
    }

    /// Checks whether the target failure is of the given kind.
    pub fn is(&self, kind: FailKind) -> bool {
        self.kind == kind
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

/// Display Trait Implementation for Failures
impl fmt::Display for Fail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error {:?}: {:?}", self.kind, self.cause)
    }
}

/// Debug trait Implementation for Failures
impl fmt::Debug for Fail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error {:?}: {:?}", self.kind, self.cause)
    }
}

/// Error Trait Implementation for Failures
impl error::Error for Fail {}

/// Conversion Trait Implementation for Fail
impl From<io::Error> for Fail {
    fn from(e: io::Error) -> Self {
        Self {
            kind: FailKind::Io,
            cause: format!("I/O error: {}", e),
        }
    }
}

//==============================================================================
// Unit Tests
//==============================================================================
