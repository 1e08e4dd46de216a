// Licensed under the Apache-2.0 license

//! HIL interface for the generic power-domain framework.

use agdsp_error::AgdspError;
use std::sync::Arc;

/// A power domain as seen by the framework. The framework calls `power_on`
/// before the first consumer runs and `power_off` after the last one stops.
pub trait GenericPowerDomain: Send + Sync {
    fn name(&self) -> &str;
    fn power_on(&self) -> Result<(), AgdspError>;
    fn power_off(&self) -> Result<(), AgdspError>;
}

pub trait PowerDomainProvider: Send + Sync {
    /// Registers `domain` so consumers can attach to it by name.
    fn add_provider(&self, domain: Arc<dyn GenericPowerDomain>) -> Result<(), AgdspError>;

    /// Unregisters the domain called `name`. Unknown names are ignored.
    fn remove_provider(&self, name: &str);
}
