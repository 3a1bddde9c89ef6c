//! BackgroundCoordinator: the privileged extension context
//!
//! Page CSP never applies here, so this context owns an engine instance for
//! content contexts that could not load their own. It also turns clicks on
//! the toolbar action into a scan of the clicked tab.

use serde_json::Value;

use crate::engine::{remote, Engine, EngineLoader, EngineRequest, EngineResponse, Loaded};
use crate::protocol::{send_action, Ack, ActionKind, ActionMessage, MessageBus, Target};

pub struct BackgroundCoordinator<E, B> {
    engine: Option<E>,
    bus: B,
}

impl<E: Engine, B: MessageBus> BackgroundCoordinator<E, B> {
    pub fn new(engine: Loaded<E>, bus: B) -> Self {
        let engine = match engine {
            Loaded::Ready(engine) => Some(engine),
            Loaded::Unavailable(reason) => {
                log::error!("[background] Engine unavailable, fallback disabled: {}", reason);
                None
            }
        };
        Self { engine, bus }
    }

    /// Instantiate the engine with `loader`
    pub async fn load<L>(loader: &L, bus: B) -> Self
    where
        L: EngineLoader<Engine = E>,
    {
        Self::new(loader.load().await, bus)
    }

    pub fn has_engine(&self) -> bool {
        self.engine.is_some()
    }

    /// Toolbar action clicked on `tab`
    pub async fn on_action_clicked(&self, tab: i32) -> Ack {
        match send_action(&self.bus, Target::Tab(tab), &ActionMessage::Scan).await {
            Ok(ack) => ack,
            Err(e) => {
                log::warn!("[background] Could not reach tab {}: {}", tab, e);
                Ack::failed(ActionKind::Scan, e)
            }
        }
    }

    pub async fn handle_engine_request(&self, request: EngineRequest) -> EngineResponse {
        remote::serve(self.engine.as_ref(), request).await
    }

    /// Decode, serve and encode one raw engine request
    pub async fn handle_message(&self, message: Value) -> Value {
        let response = match serde_json::from_value::<EngineRequest>(message) {
            Ok(request) => self.handle_engine_request(request).await,
            Err(e) => {
                log::warn!("[background] Malformed engine request: {}", e);
                EngineResponse::Failed {
                    message: e.to_string(),
                }
            }
        };
        serde_json::to_value(&response).unwrap_or(Value::Null)
    }
}
