//! Browser bindings (wasm32 only)
//!
//! - `dom.rs` - WebDocument: live page DOM behind `Document`
//! - `chrome.rs` - ChromeStorage + ChromeBus: extension storage and messaging
//! - `engine.rs` - EngineModule + ModuleLoader: the dynamically imported engine
//! - `bindings.rs` - ContentScript / PopupScript / BackgroundScript exports

mod bindings;
mod chrome;
mod dom;
mod engine;

pub use bindings::{BackgroundScript, ContentScript, PopupScript};
pub use chrome::{ChromeBus, ChromeStorage};
pub use dom::WebDocument;
pub use engine::{EngineModule, ModuleLoader};

use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};

/// Serialize to plain JS objects (maps become objects, not `Map`s)
pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

/// Best-effort message of a thrown JS value
pub(crate) fn js_message(e: &JsValue) -> String {
    if let Some(msg) = e.as_string() {
        return msg;
    }
    match e.dyn_ref::<js_sys::Error>() {
        Some(error) => String::from(error.message()),
        None => format!("{:?}", e),
    }
}
