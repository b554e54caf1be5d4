// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::flexi_logger::{
    Logger,
    LoggerHandle,
};
use ::std::sync::Once;

//==============================================================================
// Constants
//==============================================================================

/// Log specification used when `RUST_LOG` is not set.
const DEFAULT_LOG_SPEC: &str = "warn";

//==============================================================================
// Static Variables
//==============================================================================

/// Guardian to the logging initialize function.
static INIT_LOG: Once = Once::new();

//==============================================================================
// Standalone Functions
//==============================================================================

/// Initializes logging features.
pub fn initialize() {
    INIT_LOG.call_once(|| {
        // Level is taken from RUST_LOG when present.
        match Logger::try_with_env_or_str(DEFAULT_LOG_SPEC).and_then(|logger: Logger| logger.start()) {
            // The handle must outlive every logging call.
            Ok(handle) => ::std::mem::forget::<LoggerHandle>(handle),
            Err(e) => eprintln!("initialize(): failed to start logger ({:?})", e),
        }
    });
}
