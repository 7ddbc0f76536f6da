//! WASM bindings for the navier core library.

mod clock;
mod runner;

pub use runner::WasmExperimentRunner;

use navier_core::{FlowIntegrator, SimulationConfig};
use serde::de::DeserializeOwned;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Deserializes `value`, falling back to the default when it is `undefined` or `null`.
pub(crate) fn from_value_or_default<T>(value: JsValue, what: &str) -> Result<T, JsValue>
where
    T: DeserializeOwned + Default,
{
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid {}: {}", what, e)))
}

pub(crate) fn serialize<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    to_value(value).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Runs the flow integrator once and returns `{ u, model, grad }`.
#[wasm_bindgen]
pub fn simulate_flow(config_val: JsValue) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();

    let config: SimulationConfig = from_value_or_default(config_val, "simulation config")?;
    config
        .validate()
        .map_err(|e| JsValue::from_str(&format!("Invalid simulation config: {}", e)))?;

    let arrays = FlowIntegrator::new(config).run();
    serialize(&arrays)
}

/// The default simulation configuration, for callers that tweak a few fields.
#[wasm_bindgen]
pub fn default_config() -> Result<JsValue, JsValue> {
    serialize(&SimulationConfig::default())
}

#[cfg(all(test, target_arch = "wasm32"))]
mod tests {
    use super::*;
    use navier_core::FlowArrays;
    use wasm_bindgen_test::wasm_bindgen_test;

    #[wasm_bindgen_test]
    fn simulate_flow_uses_defaults_for_undefined() {
        let result = simulate_flow(JsValue::UNDEFINED).expect("arrays");
        let arrays: FlowArrays = from_value(result).expect("decode");
        assert_eq!(arrays.len(), 1024);
        assert_eq!(arrays.sensitivities().len(), 1023);
    }

    #[wasm_bindgen_test]
    fn simulate_flow_rejects_short_length() {
        let config = SimulationConfig {
            length: 50,
            n_intervals: 1,
            ..SimulationConfig::default()
        };
        let err = simulate_flow(to_value(&config).expect("config")).expect_err("should reject");
        let message = err.as_string().unwrap_or_default();
        assert!(message.contains("length must be at least 100"));
    }

    #[wasm_bindgen_test]
    fn default_config_round_trips() {
        let value = default_config().expect("config");
        let config: SimulationConfig = from_value(value).expect("decode");
        assert_eq!(config, SimulationConfig::default());
    }
}
