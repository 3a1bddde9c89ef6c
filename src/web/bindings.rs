//! WASM exports for the three extension contexts
//!
//! # Usage (content script)
//! ```javascript,ignore
//! import init, { ContentScript } from './pkg/grs_overlay.js';
//!
//! await init();
//! const content = new ContentScript(() => import(chrome.runtime.getURL('pkg/grs_wasm.js')));
//! chrome.runtime.onMessage.addListener((message, _sender, sendResponse) => {
//!   content.handleMessage(message).then(sendResponse);
//!   return true;
//! });
//! ```
//!
//! Each export owns its coordinator through `Rc<RefCell<_>>`. A message that
//! arrives while a pipeline is still running in the same context is
//! acknowledged as `skipped` rather than interleaving DOM mutations.

use std::cell::RefCell;
use std::rc::Rc;
use std::str::FromStr;

use js_sys::{Function, Promise};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, JsFuture};

use super::chrome::{ChromeBus, ChromeStorage};
use super::dom::WebDocument;
use super::engine::{EngineModule, ModuleLoader};
use super::to_js;
use crate::background::BackgroundCoordinator;
use crate::coordinator::ContentCoordinator;
use crate::popup::PopupController;
use crate::protocol::{Ack, ActionMessage};
use crate::rules::RuleCode;

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn decode(message: JsValue) -> Result<Value, JsValue> {
    serde_wasm_bindgen::from_value(message).map_err(|e| JsValue::from_str(&format!("Invalid message: {}", e)))
}

fn ack_to_js(ack: &Ack) -> Result<JsValue, JsValue> {
    to_js(ack).map_err(js_error)
}

/// Resolves after `ms` milliseconds (immediately outside a window)
async fn sleep(ms: i32) {
    let promise = Promise::new(&mut |resolve, _reject| {
        let scheduled = web_sys::window()
            .map(|window| window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms));
        if !matches!(scheduled, Some(Ok(_))) {
            let _ = resolve.call0(&JsValue::NULL);
        }
    });
    let _ = JsFuture::from(promise).await;
}

// =============================================================================
// Content
// =============================================================================

type ContentCore = ContentCoordinator<WebDocument, ModuleLoader, ChromeStorage, ChromeBus>;

/// Content context of one page
#[wasm_bindgen]
pub struct ContentScript {
    inner: Rc<RefCell<ContentCore>>,
}

#[wasm_bindgen]
impl ContentScript {
    /// `import_engine` must return (a promise of) the engine module namespace
    #[wasm_bindgen(constructor)]
    pub fn new(import_engine: Function) -> Result<ContentScript, JsValue> {
        let document = WebDocument::current().map_err(js_error)?;
        let body = document.body().map_err(js_error)?;
        let coordinator =
            ContentCoordinator::new(document, body, ModuleLoader::new(import_engine), ChromeStorage)
                .with_fallback(ChromeBus);
        Ok(Self {
            inner: Rc::new(RefCell::new(coordinator)),
        })
    }

    /// Handle one runtime message; resolves to its `Ack`
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&self, message: JsValue) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            let message = decode(message)?;
            let ack = match inner.try_borrow_mut() {
                Ok(mut coordinator) => coordinator.handle_message(message).await,
                Err(_) => match ActionMessage::from_value(message) {
                    Ok(action) => {
                        log::warn!("[content] {} ignored, another pipeline is running", action.kind());
                        Ack::skipped(action.kind())
                    }
                    Err(name) => Ack::unknown(&name),
                },
            };
            ack_to_js(&ack)
        })
    }

    /// Remove every marker from the page
    pub fn clear(&self) -> Result<usize, JsValue> {
        let mut coordinator = self.inner.try_borrow_mut().map_err(js_error)?;
        coordinator.clear().map_err(js_error)
    }
}

// =============================================================================
// Popup
// =============================================================================

#[wasm_bindgen]
pub struct PopupScript {
    inner: Rc<PopupController<ChromeStorage, ChromeBus>>,
}

#[wasm_bindgen]
impl PopupScript {
    #[wasm_bindgen(constructor)]
    pub fn new() -> PopupScript {
        Self {
            inner: Rc::new(PopupController::new(ChromeStorage, ChromeBus)),
        }
    }

    /// Stored `{selectedColor, ruleStates}` for initializing the controls
    pub fn load(&self) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move { to_js(&inner.load().await).map_err(js_error) })
    }

    /// Debounced color input; resolves to `null` when superseded
    #[wasm_bindgen(js_name = selectColor)]
    pub fn select_color(&self, color: String, settle_ms: i32) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            match inner.select_color(&color, sleep(settle_ms)).await {
                Some(ack) => ack_to_js(&ack),
                None => Ok(JsValue::NULL),
            }
        })
    }

    #[wasm_bindgen(js_name = toggleRule)]
    pub fn toggle_rule(&self, rule: String) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            let rule = RuleCode::from_str(&rule).map_err(js_error)?;
            ack_to_js(&inner.toggle_rule(rule).await)
        })
    }

    pub fn scan(&self) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move { ack_to_js(&inner.scan().await) })
    }

    pub fn normalize(&self) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move { ack_to_js(&inner.normalize().await) })
    }

    pub fn fix(&self) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move { ack_to_js(&inner.fix().await) })
    }
}

impl Default for PopupScript {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Background
// =============================================================================

#[wasm_bindgen]
pub struct BackgroundScript {
    inner: Rc<BackgroundCoordinator<EngineModule, ChromeBus>>,
}

#[wasm_bindgen]
impl BackgroundScript {
    /// Load the engine with `import_engine`, then serve
    pub async fn create(import_engine: Function) -> BackgroundScript {
        let coordinator = BackgroundCoordinator::load(&ModuleLoader::new(import_engine), ChromeBus).await;
        Self {
            inner: Rc::new(coordinator),
        }
    }

    #[wasm_bindgen(js_name = hasEngine)]
    pub fn has_engine(&self) -> bool {
        self.inner.has_engine()
    }

    /// Toolbar action clicked on tab `tab_id`
    #[wasm_bindgen(js_name = onActionClicked)]
    pub fn on_action_clicked(&self, tab_id: i32) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move { ack_to_js(&inner.on_action_clicked(tab_id).await) })
    }

    /// Serve one engine request from a content context
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&self, message: JsValue) -> Promise {
        let inner = self.inner.clone();
        future_to_promise(async move {
            let message = decode(message)?;
            to_js(&inner.handle_message(message).await).map_err(js_error)
        })
    }
}
