//! Stepped experiment runner.

use crate::clock::JsClock;
use crate::{from_value_or_default, serialize};
use navier_core::{DriverSettings, ExperimentOptions, ExperimentRunner};
use wasm_bindgen::prelude::*;

/// WASM-exported experiment runner.
/// Allows progress reporting by running batches of trials at a time.
#[wasm_bindgen]
pub struct WasmExperimentRunner {
    runner: Option<ExperimentRunner<JsClock>>,
}

#[wasm_bindgen]
impl WasmExperimentRunner {
    /// Create a runner from experiment options and (optional) driver settings.
    #[wasm_bindgen(constructor)]
    pub fn new(options_val: JsValue, settings_val: JsValue) -> Result<WasmExperimentRunner, JsValue> {
        console_error_panic_hook::set_once();

        let options: ExperimentOptions = from_value_or_default(options_val, "experiment options")?;
        let settings: DriverSettings = from_value_or_default(settings_val, "driver settings")?;

        let config = options
            .into_config()
            .map_err(|e| JsValue::from_str(&format!("Invalid experiment options: {}", e)))?;

        let runner = ExperimentRunner::with_clock(config, settings, JsClock)
            .map_err(|e| JsValue::from_str(&format!("Experiment init failed: {:#}", e)))?;

        Ok(WasmExperimentRunner {
            runner: Some(runner),
        })
    }

    /// Check if every trial has run.
    pub fn is_done(&self) -> bool {
        self.runner.as_ref().map_or(true, |runner| runner.is_done())
    }

    /// Run a batch of trials and return their reports.
    pub fn run_trials(&mut self, batch_size: u32) -> Result<JsValue, JsValue> {
        let runner = self
            .runner
            .as_mut()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        let reports = runner
            .run_trials(batch_size as usize)
            .map_err(|e| JsValue::from_str(&format!("Trial failed: {:#}", e)))?;

        serialize(&reports)
    }

    /// Get progress information.
    pub fn get_progress(&self) -> Result<JsValue, JsValue> {
        let runner = self
            .runner
            .as_ref()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        serialize(&runner.progress())
    }

    /// Get the aggregate statistics and release the runner.
    pub fn get_summary(&mut self) -> Result<JsValue, JsValue> {
        let runner = self
            .runner
            .take()
            .ok_or_else(|| JsValue::from_str("Runner not initialized"))?;

        serialize(&runner.summary())
    }
}
