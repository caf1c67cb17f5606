//! WebAssembly bindings for Timeblock
//!
//! The extension's JS shell keeps the browser-facing state. These bindings
//! expose the parts of the core that need no storage access: schema
//! migration, the payload codec, pattern helpers and block set evaluation.

mod console;

use serde_json::Value;
use tb_core::schema::{parse_block_set_data, parse_general_options};
use tb_core::types::ActiveTime;
use tb_core::youtube::category_name;
use tb_core::{BlockSet, ListType, TimeState};
use wasm_bindgen::prelude::*;

// ===== Conversions =====

fn js_error(err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// `undefined` becomes `None`; everything else goes through JSON text.
fn to_json(value: &JsValue) -> Result<Option<Value>, JsValue> {
    if value.is_undefined() {
        return Ok(None);
    }
    let text: String = js_sys::JSON::stringify(value)?.into();
    serde_json::from_str(&text).map(Some).map_err(js_error)
}

fn from_json(value: &Value) -> Result<JsValue, JsValue> {
    js_sys::JSON::parse(&value.to_string())
}

fn list_type(list: &str) -> Result<ListType, JsValue> {
    ListType::from_str(list).ok_or_else(|| JsValue::from_str(&format!("Unknown list type: {list}")))
}

/// Numeric code of a time state: 0 time left, 1 block, 2 over time.
fn time_state_code(state: TimeState) -> u8 {
    if state == TimeState::BLOCK {
        1
    } else if state == TimeState::OVER_TIME {
        2
    } else {
        0
    }
}

// ===== Setup =====

#[wasm_bindgen]
pub fn init_logging(verbose: bool) {
    console::init(verbose);
}

// ===== Schema =====

/// Migrate stored block set data to the current shape.
#[wasm_bindgen]
pub fn migrate_block_set_data(raw: JsValue) -> Result<JsValue, JsValue> {
    let value = to_json(&raw)?;
    let data = parse_block_set_data(value.as_ref()).map_err(js_error)?;
    from_json(&data.to_value())
}

#[wasm_bindgen]
pub fn migrate_general_options(raw: JsValue) -> Result<JsValue, JsValue> {
    let value = to_json(&raw)?;
    let options = parse_general_options(value.as_ref()).map_err(js_error)?;
    from_json(&options.to_value())
}

// ===== Codec =====

#[wasm_bindgen]
pub fn compress(value: JsValue) -> Result<String, JsValue> {
    let value = to_json(&value)?.unwrap_or(Value::Null);
    tb_core::compress(&value).map_err(js_error)
}

#[wasm_bindgen]
pub fn decompress(encoded: &str) -> Result<JsValue, JsValue> {
    let value = tb_core::decompress(encoded).map_err(js_error)?;
    from_json(&value)
}

// ===== Patterns =====

/// Regex source of a wildcard pattern.
#[wasm_bindgen]
pub fn pattern_to_regexp_source(pattern: &str) -> String {
    tb_core::pattern::pattern_to_regex_source(pattern)
}

#[wasm_bindgen]
pub fn url_to_pattern(url: &str) -> String {
    tb_core::url_to_pattern(url)
}

#[wasm_bindgen]
pub fn youtube_category_name(id: &str) -> Option<String> {
    category_name(id).map(str::to_string)
}

// ===== Block Set =====

/// A block set with compiled rules, kept on the wasm side between calls.
#[wasm_bindgen]
pub struct WasmBlockSet {
    inner: BlockSet,
}

#[wasm_bindgen]
impl WasmBlockSet {
    #[wasm_bindgen(constructor)]
    pub fn new(id: u32, raw: JsValue, time_elapsed: f64) -> Result<WasmBlockSet, JsValue> {
        let value = to_json(&raw)?;
        let time_elapsed = if time_elapsed.is_finite() && time_elapsed > 0.0 {
            time_elapsed as u64
        } else {
            0
        };
        let inner = BlockSet::create(id, value.as_ref(), time_elapsed).map_err(js_error)?;
        Ok(WasmBlockSet { inner })
    }

    /// 0 ignored, 1 blacklisted, 2 whitelisted.
    pub fn test(&self, url: &str, channel_id: Option<String>, category_id: Option<String>) -> u8 {
        self.inner
            .test(url, channel_id.as_deref(), category_id.as_deref()) as u8
    }

    /// Whether the block set is active on `day` (0 = Monday) at `time` ms
    /// since midnight.
    pub fn is_active_at(&self, day: u32, time: f64) -> bool {
        self.inner.is_in_active_weekday(day as usize) && self.inner.is_in_active_time(time.max(0.0) as u64)
    }

    pub fn time_state(&self) -> u8 {
        time_state_code(self.inner.time_state())
    }

    pub fn set_time_elapsed(&mut self, time_elapsed: f64) {
        self.inner.set_time_elapsed(time_elapsed.max(0.0) as u64);
    }

    pub fn set_active_time(&mut self, from: f64, to: f64) -> Result<(), JsValue> {
        let window = ActiveTime::new(from.max(0.0) as u64, to.max(0.0) as u64);
        self.inner.set_active_time(window).map_err(js_error)
    }

    pub fn add_pattern(&mut self, list: &str, pattern: &str) -> Result<(), JsValue> {
        self.inner.add_pattern(list_type(list)?, pattern).map_err(js_error)
    }

    pub fn remove_pattern(&mut self, list: &str, pattern: &str) -> Result<bool, JsValue> {
        Ok(self.inner.remove_pattern(list_type(list)?, pattern))
    }

    pub fn add_regexp(&mut self, list: &str, source: &str) -> Result<(), JsValue> {
        self.inner.add_regexp(list_type(list)?, source).map_err(js_error)
    }

    pub fn add_yt_category(&mut self, list: &str, category_id: &str) -> Result<(), JsValue> {
        self.inner.add_yt_category(list_type(list)?, category_id).map_err(js_error)
    }

    /// Current data in its persisted shape.
    pub fn data(&self) -> Result<JsValue, JsValue> {
        from_json(&self.inner.data().to_value())
    }

    /// Current data in its compressed persisted form.
    pub fn compressed_data(&self) -> Result<String, JsValue> {
        tb_core::compress(&self.inner.data().to_value()).map_err(js_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_state_code() {
        assert_eq!(time_state_code(TimeState::TIME_LEFT), 0);
        assert_eq!(time_state_code(TimeState::BLOCK), 1);
        assert_eq!(time_state_code(TimeState::OVER_TIME), 2);
    }
}
