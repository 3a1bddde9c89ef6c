//! Extension platform APIs: `chrome.storage.local`, `chrome.tabs`, `chrome.runtime`

use serde::Deserialize;
use serde_json::{Map, Value};
use wasm_bindgen::prelude::*;

use super::{js_message, to_js};
use crate::config::{KeyValueStore, StoreError};
use crate::protocol::{DeliveryError, MessageBus, Target};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = get)]
    async fn storage_get(keys: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "storage", "local"], js_name = set)]
    async fn storage_set(items: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = query)]
    async fn tabs_query(query: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "tabs"], js_name = sendMessage)]
    async fn tabs_send_message(tab_id: i32, message: JsValue) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(catch, js_namespace = ["chrome", "runtime"], js_name = sendMessage)]
    async fn runtime_send_message(message: JsValue) -> Result<JsValue, JsValue>;
}

// =============================================================================
// Storage
// =============================================================================

/// `chrome.storage.local`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeStorage;

impl KeyValueStore for ChromeStorage {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let keys = to_js(keys).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let stored = storage_get(keys)
            .await
            .map_err(|e| StoreError::Backend(js_message(&e)))?;
        serde_wasm_bindgen::from_value(stored).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<(), StoreError> {
        let items = to_js(&entries).map_err(|e| StoreError::Serialization(e.to_string()))?;
        storage_set(items)
            .await
            .map_err(|e| StoreError::Backend(js_message(&e)))?;
        Ok(())
    }
}

// =============================================================================
// Messaging
// =============================================================================

#[derive(Deserialize)]
struct Tab {
    id: Option<i32>,
}

/// `chrome.tabs.sendMessage` / `chrome.runtime.sendMessage`
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromeBus;

impl ChromeBus {
    async fn active_tab(&self) -> Result<i32, DeliveryError> {
        let query = to_js(&serde_json::json!({ "active": true, "currentWindow": true }))
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;
        let tabs = tabs_query(query)
            .await
            .map_err(|e| DeliveryError::Transport(js_message(&e)))?;
        let tabs: Vec<Tab> =
            serde_wasm_bindgen::from_value(tabs).map_err(|e| DeliveryError::Decode(e.to_string()))?;
        tabs.into_iter()
            .find_map(|tab| tab.id)
            .ok_or_else(|| DeliveryError::NoReceiver("no active tab".to_string()))
    }
}

fn send_failure(target: Target, e: JsValue) -> DeliveryError {
    let message = js_message(&e);
    if message.contains("Receiving end does not exist") {
        DeliveryError::NoReceiver(format!("{}: {}", target, message))
    } else {
        DeliveryError::Transport(message)
    }
}

impl MessageBus for ChromeBus {
    async fn send(&self, target: Target, message: Value) -> Result<Value, DeliveryError> {
        let message = to_js(&message).map_err(|e| DeliveryError::Transport(e.to_string()))?;
        let reply = match target {
            Target::ActiveTab => {
                let tab = self.active_tab().await?;
                tabs_send_message(tab, message).await
            }
            Target::Tab(tab) => tabs_send_message(tab, message).await,
            Target::Background => runtime_send_message(message).await,
        }
        .map_err(|e| send_failure(target, e))?;

        if reply.is_undefined() {
            return Err(DeliveryError::NoReceiver(format!("{} sent no reply", target)));
        }
        serde_wasm_bindgen::from_value(reply).map_err(|e| DeliveryError::Decode(e.to_string()))
    }
}
