// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

cfg_if::cfg_if! {
    if #[cfg(feature = "single-precision")] {
        /// Scalar used by markings, incidence weights and transition operators.
        pub type Real = f32;
    } else {
        /// Scalar used by markings, incidence weights and transition operators.
        pub type Real = f64;
    }
}

/// Relative tolerance under which a scalar is considered zero.
pub const EPSILON: Real = 1e-12;
