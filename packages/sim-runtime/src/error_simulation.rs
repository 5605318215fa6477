//! Probabilistic error injection for simulated operations.
//!
//! Each operation lists the errors it can raise ([`ErrorDefinition`]). Each
//! error type has a probability, an optional dampen factor applied after every
//! hit, and an optional cap on how many times it fires. A global cap bounds
//! the number of injected errors per run.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sim_core::SimError;

/// Probability settings for one exception type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorTypeConfig {
    /// Chance in `[0, 1]` that the error fires on a call
    pub probability: f64,
    /// After each hit the probability is multiplied by `1 - dampen_factor`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dampen_factor: Option<f64>,
    /// Stop firing after this many hits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_errors_simulated: Option<u32>,
}

impl ErrorTypeConfig {
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            dampen_factor: None,
            num_errors_simulated: None,
        }
    }

    fn validate(&self, error_type: &str) -> Result<(), SimError> {
        check_unit(error_type, "probability", self.probability)?;
        if let Some(d) = self.dampen_factor {
            check_unit(error_type, "dampen_factor", d)?;
        }
        Ok(())
    }
}

fn validate_config(config: &BTreeMap<String, ErrorTypeConfig>) -> Result<(), SimError> {
    config.iter().try_for_each(|(name, cfg)| cfg.validate(name))
}

fn check_unit(error_type: &str, name: &str, value: f64) -> Result<(), SimError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimError::InvalidInput(format!(
            "{} for '{}' must be between 0 and 1, got {}",
            name, error_type, value
        )))
    }
}

/// An error an operation may raise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDefinition {
    /// Exception type name, also the key into the error config
    pub exception: String,
    pub message: String,
}

impl ErrorDefinition {
    pub fn into_error(self) -> SimError {
        SimError::Simulated {
            exception: self.exception,
            message: self.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Tracker {
    probability: f64,
    count: u32,
}

#[derive(Debug, Clone, Default)]
struct State {
    config: BTreeMap<String, ErrorTypeConfig>,
    definitions: HashMap<String, Vec<ErrorDefinition>>,
    tracker: BTreeMap<String, Tracker>,
    max_errors_per_run: Option<u32>,
    current_error_count: u32,
}

impl State {
    fn new(
        config: BTreeMap<String, ErrorTypeConfig>,
        definitions: HashMap<String, Vec<ErrorDefinition>>,
        max_errors_per_run: Option<u32>,
    ) -> Self {
        let mut state = Self {
            config,
            definitions,
            max_errors_per_run,
            ..Default::default()
        };
        state.rebuild_tracker(false);
        state
    }

    /// Resets tracked probabilities from the config, optionally keeping counts.
    fn rebuild_tracker(&mut self, preserve_counts: bool) {
        let previous = std::mem::take(&mut self.tracker);
        self.tracker = self
            .config
            .iter()
            .map(|(name, cfg)| {
                let count = if preserve_counts {
                    previous.get(name).map_or(0, |t| t.count)
                } else {
                    0
                };
                (
                    name.clone(),
                    Tracker {
                        probability: cfg.probability,
                        count,
                    },
                )
            })
            .collect();
    }

    fn config_mut(&mut self, error_type: &str) -> Result<&mut ErrorTypeConfig, SimError> {
        self.config
            .get_mut(error_type)
            .ok_or_else(|| SimError::not_found("Error type", error_type))
    }
}

/// Decides whether a simulated call fails, and with which error.
#[derive(Debug)]
pub struct ErrorSimulator {
    state: Mutex<State>,
    initial: State,
}

impl Default for ErrorSimulator {
    fn default() -> Self {
        Self::new(BTreeMap::new(), HashMap::new(), None)
    }
}

impl ErrorSimulator {
    /// Creates a simulator.
    ///
    /// # Arguments
    /// * `config` - Exception type to probability settings
    /// * `definitions` - Operation name to the errors it may raise
    /// * `max_errors_per_run` - Cap on injected errors, `None` for unlimited
    pub fn new(
        config: BTreeMap<String, ErrorTypeConfig>,
        definitions: HashMap<String, Vec<ErrorDefinition>>,
        max_errors_per_run: Option<u32>,
    ) -> Self {
        let state = State::new(config, definitions, max_errors_per_run);
        Self {
            initial: state.clone(),
            state: Mutex::new(state),
        }
    }

    /// Loads config and definitions from JSON files.
    ///
    /// Missing, unparseable or out-of-range files are logged and treated as empty.
    pub fn from_files(
        config_path: &Path,
        definitions_path: &Path,
        max_errors_per_run: Option<u32>,
    ) -> Self {
        let config = read_error_config(config_path);
        let definitions = read_json_or_default(definitions_path, "error definitions");
        Self::new(config, definitions, max_errors_per_run)
    }

    /// Replaces the error config from a file, keeping hit counts.
    pub fn load_error_config(&self, path: &Path) {
        let config = read_error_config(path);
        let mut state = self.state.lock();
        state.config = config;
        state.rebuild_tracker(true);
    }

    /// Replaces the error definitions from a file.
    pub fn load_error_definitions(&self, path: &Path) {
        self.state.lock().definitions = read_json_or_default(path, "error definitions");
    }

    /// Applies the `error` section of a central config document.
    ///
    /// The expected shape is
    /// `{"error": {"global": {..}, "services": {name: {"config": {..}, "max_errors_per_run": n}}}}`.
    /// Service entries override global ones. Malformed documents are logged
    /// and ignored.
    pub fn load_central_config(&self, central: &Value, service: &str) {
        let Some(error) = central.get("error").and_then(Value::as_object) else {
            tracing::warn!("central config has no 'error' section, keeping current error config");
            return;
        };

        let mut merged: BTreeMap<String, ErrorTypeConfig> = BTreeMap::new();
        if let Some(global) = error.get("global") {
            match serde_json::from_value::<BTreeMap<String, ErrorTypeConfig>>(global.clone()) {
                Ok(global) => merged.extend(global),
                Err(e) => {
                    tracing::warn!(error = %e, "invalid global error config, ignoring");
                    return;
                }
            }
        }

        let service_entry = error.get("services").and_then(|s| s.get(service));
        if let Some(config) = service_entry.and_then(|s| s.get("config")) {
            match serde_json::from_value::<BTreeMap<String, ErrorTypeConfig>>(config.clone()) {
                Ok(service_config) => merged.extend(service_config),
                Err(e) => {
                    tracing::warn!(service, error = %e, "invalid service error config, ignoring");
                    return;
                }
            }
        }
        if let Err(e) = validate_config(&merged) {
            tracing::warn!(error = %e, "error config out of range, ignoring");
            return;
        }

        let max = service_entry
            .and_then(|s| s.get("max_errors_per_run"))
            .or_else(|| error.get("max_errors_per_run"))
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok());

        let mut state = self.state.lock();
        state.config = merged;
        state.rebuild_tracker(true);
        if max.is_some() {
            state.max_errors_per_run = max;
        }
        tracing::debug!(service, error_types = state.config.len(), "central error config loaded");
    }

    /// Reads a central config file; see [`ErrorSimulator::load_central_config`].
    pub fn load_central_config_file(&self, path: &Path, service: &str) {
        let central: Value = read_json_or_default(path, "central config");
        self.load_central_config(&central, service);
    }

    /// Picks the error to inject for `operation`, if any.
    ///
    /// Definitions are tried in order. Types without config, or whose hit
    /// count reached `num_errors_simulated`, are skipped. The first type whose
    /// roll falls under its current probability wins; its count goes up and
    /// its probability is dampened.
    pub fn select_error<R: Rng>(
        &self,
        operation: &str,
        rng: &mut R,
    ) -> Option<ErrorDefinition> {
        let mut state = self.state.lock();
        if state
            .max_errors_per_run
            .is_some_and(|max| state.current_error_count >= max)
        {
            return None;
        }

        let definitions = state.definitions.get(operation)?.clone();
        for definition in definitions {
            let Some(cfg) = state.config.get(&definition.exception).cloned() else {
                continue;
            };
            let Some(tracker) = state.tracker.get_mut(&definition.exception) else {
                continue;
            };
            if cfg
                .num_errors_simulated
                .is_some_and(|limit| tracker.count >= limit)
            {
                continue;
            }
            if rng.gen::<f64>() < tracker.probability {
                tracker.count += 1;
                if let Some(d) = cfg.dampen_factor {
                    tracker.probability *= 1.0 - d;
                }
                state.current_error_count += 1;
                tracing::debug!(
                    operation,
                    exception = %definition.exception,
                    total = state.current_error_count,
                    "simulated error selected"
                );
                return Some(definition);
            }
        }
        None
    }

    /// Fails with [`SimError::Simulated`] when an error is selected.
    pub fn maybe_fail(&self, operation: &str) -> Result<(), SimError> {
        match self.select_error(operation, &mut rand::thread_rng()) {
            Some(definition) => Err(definition.into_error()),
            None => Ok(()),
        }
    }

    pub fn update_probability(&self, error_type: &str, probability: f64) -> Result<(), SimError> {
        check_unit(error_type, "probability", probability)?;
        let mut state = self.state.lock();
        state.config_mut(error_type)?.probability = probability;
        if let Some(t) = state.tracker.get_mut(error_type) {
            t.probability = probability;
        }
        Ok(())
    }

    pub fn update_dampen_factor(
        &self,
        error_type: &str,
        dampen_factor: Option<f64>,
    ) -> Result<(), SimError> {
        if let Some(d) = dampen_factor {
            check_unit(error_type, "dampen_factor", d)?;
        }
        self.state.lock().config_mut(error_type)?.dampen_factor = dampen_factor;
        Ok(())
    }

    pub fn update_num_errors_simulated(
        &self,
        error_type: &str,
        limit: Option<u32>,
    ) -> Result<(), SimError> {
        self.state.lock().config_mut(error_type)?.num_errors_simulated = limit;
        Ok(())
    }

    pub fn set_max_errors_per_run(&self, max: Option<u32>) {
        self.state.lock().max_errors_per_run = max;
    }

    /// Inserts or replaces an error type, resetting its tracked probability.
    pub fn add_or_update_error_type(
        &self,
        error_type: impl Into<String>,
        config: ErrorTypeConfig,
    ) -> Result<(), SimError> {
        let error_type = error_type.into();
        config.validate(&error_type)?;
        let mut state = self.state.lock();
        let count = state.tracker.get(&error_type).map_or(0, |t| t.count);
        state.tracker.insert(
            error_type.clone(),
            Tracker {
                probability: config.probability,
                count,
            },
        );
        state.config.insert(error_type, config);
        Ok(())
    }

    /// Registers the errors an operation may raise.
    pub fn set_definitions(&self, operation: impl Into<String>, definitions: Vec<ErrorDefinition>) {
        self.state.lock().definitions.insert(operation.into(), definitions);
    }

    /// Restores every tracked probability to its configured value.
    pub fn reset_probabilities(&self) {
        let mut state = self.state.lock();
        let State {
            config, tracker, ..
        } = &mut *state;
        for (name, t) in tracker.iter_mut() {
            if let Some(cfg) = config.get(name) {
                t.probability = cfg.probability;
            }
        }
    }

    /// Returns to the configuration the simulator was built with.
    pub fn reload_initial_config(&self) {
        *self.state.lock() = self.initial.clone();
        tracing::info!("error simulator reloaded initial config");
    }

    pub fn current_error_count(&self) -> u32 {
        self.state.lock().current_error_count
    }

    pub fn max_errors_per_run(&self) -> Option<u32> {
        self.state.lock().max_errors_per_run
    }

    /// Current configuration for an error type.
    pub fn error_type(&self, error_type: &str) -> Option<ErrorTypeConfig> {
        self.state.lock().config.get(error_type).cloned()
    }

    /// Snapshot of probabilities, limits and counts for diagnostics.
    pub fn debug_state(&self) -> Value {
        let state = self.state.lock();
        let probabilities: BTreeMap<&str, f64> = state
            .tracker
            .iter()
            .map(|(n, t)| (n.as_str(), t.probability))
            .collect();
        let counts: BTreeMap<&str, u32> = state
            .tracker
            .iter()
            .map(|(n, t)| (n.as_str(), t.count))
            .collect();
        let dampen: BTreeMap<&str, Option<f64>> = state
            .config
            .iter()
            .map(|(n, c)| (n.as_str(), c.dampen_factor))
            .collect();
        let limits: BTreeMap<&str, Option<u32>> = state
            .config
            .iter()
            .map(|(n, c)| (n.as_str(), c.num_errors_simulated))
            .collect();
        json!({
            "current_probabilities": probabilities,
            "dampen_factors": dampen,
            "error_limits": limits,
            "error_counts": counts,
            "total_errors_simulated": state.current_error_count,
            "max_errors_per_run": state.max_errors_per_run,
        })
    }
}

fn read_error_config(path: &Path) -> BTreeMap<String, ErrorTypeConfig> {
    let config = read_json_or_default(path, "error config");
    match validate_config(&config) {
        Ok(()) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "error config out of range, using empty");
            BTreeMap::new()
        }
    }
}

fn read_json_or_default<T>(path: &Path, what: &str) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    let contents = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "{} file not found, using empty", what);
            return T::default();
        }
    };
    serde_json::from_str(&contents).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "invalid JSON in {} file, using empty", what);
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::mock::StepRng;

    /// Rolls 0.0 every time, so any positive probability hits.
    fn always_hit() -> StepRng {
        StepRng::new(0, 0)
    }

    /// Rolls just under 1.0 every time.
    fn never_hit() -> StepRng {
        StepRng::new(u64::MAX, 0)
    }

    fn simulator(max: Option<u32>) -> ErrorSimulator {
        let config = BTreeMap::from([
            (
                "ValueError".to_string(),
                ErrorTypeConfig {
                    probability: 0.5,
                    dampen_factor: Some(0.1),
                    num_errors_simulated: Some(3),
                },
            ),
            (
                "TypeError".to_string(),
                ErrorTypeConfig {
                    probability: 0.3,
                    dampen_factor: Some(0.2),
                    num_errors_simulated: None,
                },
            ),
        ]);
        let definitions = HashMap::from([(
            "create_space".to_string(),
            vec![
                ErrorDefinition {
                    exception: "ValueError".to_string(),
                    message: "Test error message".to_string(),
                },
                ErrorDefinition {
                    exception: "TypeError".to_string(),
                    message: "Type error message".to_string(),
                },
            ],
        )]);
        ErrorSimulator::new(config, definitions, max)
    }

    #[test]
    fn test_no_definitions_selects_nothing() {
        let sim = ErrorSimulator::default();
        assert!(sim.select_error("anything", &mut always_hit()).is_none());
        assert!(sim.maybe_fail("anything").is_ok());
    }

    #[test]
    fn test_first_hit_wins_and_dampens() {
        let sim = simulator(None);
        let hit = sim.select_error("create_space", &mut always_hit()).unwrap();
        assert_eq!(hit.exception, "ValueError");
        assert_eq!(sim.current_error_count(), 1);

        let state = sim.debug_state();
        let p = state["current_probabilities"]["ValueError"].as_f64().unwrap();
        assert!((p - 0.45).abs() < 1e-9);
        assert_eq!(state["error_counts"]["ValueError"], 1);
    }

    #[test]
    fn test_per_type_limit_falls_through() {
        let sim = simulator(None);
        for _ in 0..3 {
            let hit = sim.select_error("create_space", &mut always_hit()).unwrap();
            assert_eq!(hit.exception, "ValueError");
        }
        let hit = sim.select_error("create_space", &mut always_hit()).unwrap();
        assert_eq!(hit.exception, "TypeError");
    }

    #[test]
    fn test_run_cap() {
        let sim = simulator(Some(2));
        assert!(sim.select_error("create_space", &mut always_hit()).is_some());
        assert!(sim.select_error("create_space", &mut always_hit()).is_some());
        assert!(sim.select_error("create_space", &mut always_hit()).is_none());
        assert_eq!(sim.current_error_count(), 2);
    }

    #[test]
    fn test_miss_leaves_state_untouched() {
        let sim = simulator(None);
        assert!(sim.select_error("create_space", &mut never_hit()).is_none());
        assert_eq!(sim.current_error_count(), 0);
    }

    #[test]
    fn test_maybe_fail_returns_simulated_error() {
        let sim = simulator(None);
        sim.add_or_update_error_type("ValueError", ErrorTypeConfig::new(1.0))
            .unwrap();
        let err = sim.maybe_fail("create_space").unwrap_err();
        assert_eq!(err.exception_type(), "ValueError");
        assert_eq!(err.to_string(), "Test error message");
    }

    #[test]
    fn test_mutators_validate() {
        let sim = simulator(None);
        sim.update_probability("ValueError", 0.8).unwrap();
        assert_eq!(sim.error_type("ValueError").unwrap().probability, 0.8);
        assert!(sim.update_probability("ValueError", 1.5).is_err());
        assert!(sim.update_probability("KeyError", 0.5).is_err());

        sim.update_dampen_factor("ValueError", Some(0.3)).unwrap();
        assert!(sim.update_dampen_factor("ValueError", Some(-0.1)).is_err());

        sim.update_num_errors_simulated("ValueError", None).unwrap();
        assert_eq!(sim.error_type("ValueError").unwrap().num_errors_simulated, None);

        assert!(sim
            .add_or_update_error_type(
                "CustomError",
                ErrorTypeConfig {
                    probability: 0.6,
                    dampen_factor: Some(1.5),
                    num_errors_simulated: None,
                },
            )
            .is_err());

        sim.set_max_errors_per_run(Some(10));
        assert_eq!(sim.max_errors_per_run(), Some(10));
    }

    #[test]
    fn test_reset_and_reload() {
        let sim = simulator(Some(10));
        sim.select_error("create_space", &mut always_hit());
        sim.reset_probabilities();
        assert_eq!(sim.debug_state()["current_probabilities"]["ValueError"], 0.5);
        assert_eq!(sim.current_error_count(), 1);

        sim.update_probability("ValueError", 0.9).unwrap();
        sim.set_max_errors_per_run(None);
        sim.reload_initial_config();
        assert_eq!(sim.error_type("ValueError").unwrap().probability, 0.5);
        assert_eq!(sim.current_error_count(), 0);
        assert_eq!(sim.max_errors_per_run(), Some(10));
    }

    #[test]
    fn test_central_config_service_overrides_global() {
        let sim = ErrorSimulator::default();
        sim.load_central_config(
            &json!({
                "error": {
                    "global": {"ValueError": {"probability": 0.8}, "TypeError": {"probability": 0.1}},
                    "services": {
                        "chat": {"config": {"TypeError": {"probability": 0.6}}, "max_errors_per_run": 10}
                    }
                }
            }),
            "chat",
        );
        assert_eq!(sim.error_type("ValueError").unwrap().probability, 0.8);
        assert_eq!(sim.error_type("TypeError").unwrap().probability, 0.6);
        assert_eq!(sim.max_errors_per_run(), Some(10));
    }

    #[test]
    fn test_central_config_malformed_is_ignored() {
        let sim = simulator(None);
        sim.load_central_config(&json!({"invalid": "structure"}), "chat");
        sim.load_central_config(&json!({"error": {"global": {"ValueError": "x"}}}), "chat");
        assert_eq!(sim.error_type("ValueError").unwrap().probability, 0.5);
    }

    #[test]
    fn test_missing_files_give_empty_simulator() {
        let dir = tempfile::tempdir().unwrap();
        let bad = dir.path().join("bad.json");
        std::fs::write(&bad, "{ invalid json").unwrap();
        let sim = ErrorSimulator::from_files(&dir.path().join("missing.json"), &bad, None);
        assert_eq!(sim.debug_state()["current_probabilities"], json!({}));
    }

    #[test]
    fn test_out_of_range_file_config_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.json");
        std::fs::write(&config, r#"{"ValueError": {"probability": 2.0}}"#).unwrap();
        let definitions = dir.path().join("definitions.json");
        std::fs::write(&definitions, "{}").unwrap();

        let sim = ErrorSimulator::from_files(&config, &definitions, None);
        assert!(sim.error_type("ValueError").is_none());

        let sim = simulator(None);
        std::fs::write(&config, r#"{"ValueError": {"probability": 0.4, "dampen_factor": -1.0}}"#)
            .unwrap();
        sim.load_error_config(&config);
        assert!(sim.error_type("ValueError").is_none());
    }
}
