use js_sys::{Function, Reflect};
use navier_core::traits::Stopwatch;
use wasm_bindgen::{JsCast, JsValue};

/// `performance.now()` when the host provides it, `Date.now()` otherwise.
pub(crate) struct JsClock;

impl Stopwatch for JsClock {
    fn now_ms(&self) -> f64 {
        performance_now().unwrap_or_else(js_sys::Date::now)
    }
}

fn performance_now() -> Option<f64> {
    let performance = Reflect::get(&js_sys::global(), &JsValue::from_str("performance")).ok()?;
    if performance.is_undefined() {
        return None;
    }
    let now: Function = Reflect::get(&performance, &JsValue::from_str("now"))
        .ok()?
        .dyn_into()
        .ok()?;
    now.call0(&performance).ok()?.as_f64()
}
