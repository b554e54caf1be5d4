// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Structures
//======================================================================================================================

/// Surroundings of the board.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentSpecification {
    /// Convection coefficient to ambient (W/(m^2 K)).
    pub convection: f64,
    /// Ambient temperature (C).
    pub temperature: f64,
    /// Highest temperature a core may reach (C). Reported to schedulers, never enforced.
    pub max_temperature: f64,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl EnvironmentSpecification {
    pub fn new(convection: f64, temperature: f64, max_temperature: f64) -> Self {
        Self {
            convection,
            temperature,
            max_temperature,
        }
    }
}
