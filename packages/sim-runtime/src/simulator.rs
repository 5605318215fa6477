//! Operation dispatch against an explicit store.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use sim_core::{SimConfig, SimError, Store};

use crate::error_mode::{ErrorModeSwitch, ErrorPolicy};
use crate::error_simulation::ErrorSimulator;
use crate::operations::{OperationFn, OperationRegistry, OperationSchema};

/// A simulated service: a store, its operations and the error settings
/// applied to every call.
pub struct Simulator {
    store: Arc<Store>,
    registry: OperationRegistry,
    error_mode: ErrorModeSwitch,
    error_simulator: Option<Arc<ErrorSimulator>>,
}

impl Simulator {
    /// Creates a simulator over `store` in raise mode.
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            registry: OperationRegistry::new(),
            error_mode: ErrorModeSwitch::default(),
            error_simulator: None,
        }
    }

    /// Creates a simulator using the configured error mode, with
    /// `OVERWRITE_ERROR_MODE` taking precedence.
    pub fn from_config(store: Arc<Store>, config: &SimConfig) -> Result<Self, SimError> {
        Ok(Self {
            error_mode: ErrorModeSwitch::from_env(config.error_mode)?,
            ..Self::new(store)
        })
    }

    pub fn with_policy(self, policy: ErrorPolicy) -> Self {
        self.error_mode.set_policy(policy);
        self
    }

    pub fn with_error_simulator(mut self, simulator: Arc<ErrorSimulator>) -> Self {
        self.error_simulator = Some(simulator);
        self
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn error_mode(&self) -> &ErrorModeSwitch {
        &self.error_mode
    }

    pub fn error_simulator(&self) -> Option<&Arc<ErrorSimulator>> {
        self.error_simulator.as_ref()
    }

    pub fn register(&self, name: impl Into<String>, func: OperationFn) {
        self.registry.register(name, func);
    }

    pub fn register_with_schema(
        &self,
        name: impl Into<String>,
        func: OperationFn,
        schema: OperationSchema,
    ) {
        self.registry.register_with_schema(name, func, schema);
    }

    /// Calls an operation.
    ///
    /// The operation is looked up, its arguments validated, a simulated
    /// error possibly injected, and the function invoked. The outcome is
    /// delivered according to the active error mode, so in error-dict mode
    /// failures come back as `Ok` values.
    ///
    /// # Arguments
    /// * `name` - Operation name
    /// * `args` - JSON object of call arguments
    pub fn call(&self, name: &str, args: &Value) -> Result<Value, SimError> {
        let start = Instant::now();
        let result = self.invoke(name, args);
        match &result {
            Ok(_) => tracing::debug!(
                operation = name,
                elapsed_us = start.elapsed().as_micros() as u64,
                "operation succeeded"
            ),
            Err(err) => tracing::debug!(
                operation = name,
                exception = err.exception_type(),
                error = %err,
                "operation failed"
            ),
        }
        self.error_mode.apply(result)
    }

    fn invoke(&self, name: &str, args: &Value) -> Result<Value, SimError> {
        let func = self
            .registry
            .get(name)
            .ok_or_else(|| SimError::OperationNotFound(name.to_string()))?;
        self.registry.validate_args(name, args)?;
        if let Some(simulator) = &self.error_simulator {
            simulator.maybe_fail(name)?;
        }
        func(&self.store, args)
    }
}
