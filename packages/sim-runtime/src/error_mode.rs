//! Switchable error delivery for simulated operations.
//!
//! In [`ErrorMode::Raise`] an operation's error reaches the caller as `Err`.
//! In [`ErrorMode::ErrorDict`] it is folded into an `Ok` value of the form
//! `{"exceptionType": "...", "message": "..."}`.

use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

pub use sim_core::ErrorMode;
use sim_core::SimError;

/// Environment variable that forces the error mode at startup.
pub const ERROR_MODE_ENV: &str = "OVERWRITE_ERROR_MODE";
/// Environment variable enabling error report logging.
pub const PRINT_REPORTS_ENV: &str = "PRINT_ERROR_REPORTS";

/// Error delivery settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorPolicy {
    pub mode: ErrorMode,
    /// Log a report for every error converted into a dict
    #[serde(default)]
    pub print_error_reports: bool,
}

/// Shared, lock-free holder of the active [`ErrorPolicy`].
#[derive(Debug)]
pub struct ErrorModeSwitch {
    policy: ArcSwap<ErrorPolicy>,
}

impl Default for ErrorModeSwitch {
    fn default() -> Self {
        Self::new(ErrorPolicy::default())
    }
}

impl ErrorModeSwitch {
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy: ArcSwap::new(Arc::new(policy)),
        }
    }

    /// Starts from `mode`, then applies `OVERWRITE_ERROR_MODE` and
    /// `PRINT_ERROR_REPORTS` when set.
    ///
    /// # Returns
    /// `Err(SimError::InvalidInput)` when `OVERWRITE_ERROR_MODE` holds an
    /// unknown mode.
    pub fn from_env(mode: ErrorMode) -> Result<Self, SimError> {
        let mut policy = ErrorPolicy {
            mode,
            print_error_reports: false,
        };
        if let Ok(value) = std::env::var(ERROR_MODE_ENV) {
            policy.mode = value.parse()?;
        }
        if let Ok(value) = std::env::var(PRINT_REPORTS_ENV) {
            policy.print_error_reports = matches!(value.trim(), "1" | "true" | "True");
        }
        Ok(Self::new(policy))
    }

    pub fn policy(&self) -> ErrorPolicy {
        **self.policy.load()
    }

    pub fn mode(&self) -> ErrorMode {
        self.policy.load().mode
    }

    pub fn set_mode(&self, mode: ErrorMode) {
        self.policy.rcu(|current| ErrorPolicy {
            mode,
            ..**current
        });
        tracing::debug!(%mode, "error mode changed");
    }

    pub fn set_policy(&self, policy: ErrorPolicy) {
        self.policy.store(Arc::new(policy));
    }

    /// Switches to `mode` until the returned guard is dropped.
    pub fn scoped(&self, mode: ErrorMode) -> ScopedErrorMode<'_> {
        let previous = self.policy();
        self.set_mode(mode);
        ScopedErrorMode {
            switch: self,
            previous,
        }
    }

    /// Delivers an operation result according to the active mode.
    pub fn apply(&self, result: Result<Value, SimError>) -> Result<Value, SimError> {
        let policy = self.policy();
        match (policy.mode, result) {
            (_, Ok(value)) => Ok(value),
            (ErrorMode::Raise, Err(err)) => Err(err),
            (ErrorMode::ErrorDict, Err(err)) => {
                let dict = error_dict(&err);
                if policy.print_error_reports {
                    tracing::warn!(report = %dict, "operation failed");
                }
                Ok(dict)
            }
        }
    }
}

/// Restores the previous policy on drop.
pub struct ScopedErrorMode<'a> {
    switch: &'a ErrorModeSwitch,
    previous: ErrorPolicy,
}

impl Drop for ScopedErrorMode<'_> {
    fn drop(&mut self) {
        self.switch.set_policy(self.previous);
    }
}

/// Renders an error as `{"exceptionType", "message"}`.
///
/// Validation errors also carry their `issues` list.
pub fn error_dict(err: &SimError) -> Value {
    let mut dict = json!({
        "exceptionType": err.exception_type(),
        "message": err.to_string(),
    });
    if let (SimError::Validation(errors), Some(obj)) = (err, dict.as_object_mut()) {
        obj.insert("issues".to_string(), json!(errors.issues));
    }
    dict
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raise_mode_passes_errors_through() {
        let switch = ErrorModeSwitch::default();
        let result = switch.apply(Err(SimError::not_found("Space", "A")));
        assert!(matches!(result, Err(SimError::NotFound { .. })));
        assert_eq!(switch.apply(Ok(json!(1))).unwrap(), json!(1));
    }

    #[test]
    fn test_error_dict_mode() {
        let switch = ErrorModeSwitch::default();
        switch.set_mode(ErrorMode::ErrorDict);
        let value = switch
            .apply(Err(SimError::not_found("Space", "A")))
            .unwrap();
        assert_eq!(
            value,
            json!({"exceptionType": "NotFoundError", "message": "Space 'A' not found"})
        );
    }

    #[test]
    fn test_validation_error_dict_has_issues() {
        let mut errors = sim_core::ValidationErrors::new("create_space");
        errors.push("displayName", "Field required");
        let dict = error_dict(&SimError::Validation(errors));
        assert_eq!(dict["exceptionType"], "ValidationError");
        assert_eq!(dict["issues"][0]["path"], "displayName");
        assert_eq!(dict["issues"][0]["message"], "Field required");
    }

    #[test]
    fn test_scoped_mode_restores_previous() {
        let switch = ErrorModeSwitch::new(ErrorPolicy {
            mode: ErrorMode::Raise,
            print_error_reports: true,
        });
        {
            let _guard = switch.scoped(ErrorMode::ErrorDict);
            assert_eq!(switch.mode(), ErrorMode::ErrorDict);
            assert!(switch.policy().print_error_reports);
        }
        assert_eq!(switch.mode(), ErrorMode::Raise);
    }
}
