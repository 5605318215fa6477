//! Runtime for simulated API services.
//!
//! Dispatches named operations against an explicit [`sim_core::Store`],
//! validating arguments, injecting simulated errors and delivering failures
//! in the configured error mode.

pub mod error_mode;
pub mod error_simulation;
pub mod operations;
pub mod simulator;

pub use error_mode::{error_dict, ErrorMode, ErrorModeSwitch, ErrorPolicy};
pub use error_simulation::{ErrorDefinition, ErrorSimulator, ErrorTypeConfig};
pub use operations::{ArgRequirement, ArgType, OperationFn, OperationRegistry, OperationSchema};
pub use simulator::Simulator;
