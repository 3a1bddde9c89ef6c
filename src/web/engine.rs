//! EngineModule: the analysis engine's JS module namespace
//!
//! The module is imported dynamically by a JS callback handed to the
//! loader, then initialized through its default export. Initialization is
//! where a restrictive page CSP shows up, so that failure becomes
//! `Loaded::Unavailable` instead of an error.

use js_sys::{Function, Promise};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

use super::{js_message, to_js};
use crate::diagnostic::Diagnostic;
use crate::engine::{AnalysisError, Engine, EngineLoader, Loaded};
use crate::rules::RuleStates;

#[wasm_bindgen]
extern "C" {
    /// Namespace object of the imported engine module
    #[derive(Debug, Clone)]
    pub type EngineModule;

    #[wasm_bindgen(method, catch, js_name = "default")]
    fn init(this: &EngineModule) -> Result<Promise, JsValue>;

    #[wasm_bindgen(method, catch)]
    fn scan_text(this: &EngineModule, text: &str, options: &JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch, js_name = "fix")]
    fn fix_text(this: &EngineModule, text: &str, options: &JsValue) -> Result<String, JsValue>;

    #[wasm_bindgen(method, catch)]
    fn to_monotonic(this: &EngineModule, text: &str) -> Result<String, JsValue>;
}

fn rule_options(rules: &RuleStates) -> Result<JsValue, AnalysisError> {
    to_js(rules).map_err(|e| AnalysisError::Decode(e.to_string()))
}

fn thrown(e: JsValue) -> AnalysisError {
    AnalysisError::Engine(js_message(&e))
}

impl Engine for EngineModule {
    async fn scan(&self, text: &str, rules: &RuleStates) -> Result<Vec<Diagnostic>, AnalysisError> {
        let raw = self.scan_text(text, &rule_options(rules)?).map_err(thrown)?;
        serde_wasm_bindgen::from_value(raw).map_err(|e| AnalysisError::Decode(e.to_string()))
    }

    async fn fix(&self, text: &str, rules: &RuleStates) -> Result<String, AnalysisError> {
        self.fix_text(text, &rule_options(rules)?).map_err(thrown)
    }

    async fn normalize(&self, text: &str) -> Result<String, AnalysisError> {
        self.to_monotonic(text).map_err(thrown)
    }
}

/// Loads the engine through a JS `() => import(url)` callback
pub struct ModuleLoader {
    import: Function,
}

impl ModuleLoader {
    pub fn new(import: Function) -> Self {
        Self { import }
    }

    async fn try_load(&self) -> Result<EngineModule, JsValue> {
        let imported = self.import.call0(&JsValue::NULL)?;
        let module: EngineModule = JsFuture::from(Promise::resolve(&imported)).await?.unchecked_into();
        JsFuture::from(module.init()?).await?;
        Ok(module)
    }
}

impl EngineLoader for ModuleLoader {
    type Engine = EngineModule;

    async fn load(&self) -> Loaded<EngineModule> {
        match self.try_load().await {
            Ok(module) => Loaded::Ready(module),
            Err(e) => Loaded::Unavailable(js_message(&e)),
        }
    }
}
