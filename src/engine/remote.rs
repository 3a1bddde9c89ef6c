//! RemoteEngine: engine calls forwarded to the background worker
//!
//! When a page's CSP blocks WebAssembly, the content context cannot
//! instantiate the engine itself. The background worker always can, so the
//! content side proxies every call as an [`EngineRequest`] and the
//! background answers with an [`EngineResponse`] produced by [`serve`].

use serde::{Deserialize, Serialize};

use crate::diagnostic::Diagnostic;
use crate::engine::{AnalysisError, Engine, Loaded};
use crate::protocol::{DeliveryError, MessageBus, Target};
use crate::rules::RuleStates;

/// Engine call addressed to the background worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum EngineRequest {
    /// Is an engine instantiated over there?
    #[serde(rename = "engineStatus")]
    Status,
    #[serde(rename = "engineScan")]
    Scan { text: String, rules: RuleStates },
    #[serde(rename = "engineFix")]
    Fix { text: String, rules: RuleStates },
    #[serde(rename = "engineNormalize")]
    Normalize { text: String },
}

/// Background reply to an [`EngineRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EngineResponse {
    Ready,
    Diagnostics { diagnostics: Vec<Diagnostic> },
    Text { text: String },
    Failed { message: String },
    Unavailable { reason: String },
}

/// Answer one request with a local engine (background side)
pub async fn serve<E: Engine>(engine: Option<&E>, request: EngineRequest) -> EngineResponse {
    let Some(engine) = engine else {
        return EngineResponse::Unavailable {
            reason: "engine not instantiated in background".to_string(),
        };
    };

    let result = match request {
        EngineRequest::Status => return EngineResponse::Ready,
        EngineRequest::Scan { text, rules } => engine
            .scan(&text, &rules)
            .await
            .map(|diagnostics| EngineResponse::Diagnostics { diagnostics }),
        EngineRequest::Fix { text, rules } => {
            engine.fix(&text, &rules).await.map(|text| EngineResponse::Text { text })
        }
        EngineRequest::Normalize { text } => {
            engine.normalize(&text).await.map(|text| EngineResponse::Text { text })
        }
    };

    result.unwrap_or_else(|e| EngineResponse::Failed { message: e.to_string() })
}

/// Engine proxy over the message bus
pub struct RemoteEngine<'a, B> {
    bus: &'a B,
}

impl<'a, B: MessageBus> RemoteEngine<'a, B> {
    /// Ask the background whether it can serve engine calls
    pub async fn connect(bus: &'a B) -> Loaded<Self> {
        let engine = Self { bus };
        match engine.call(EngineRequest::Status).await {
            Ok(EngineResponse::Ready) => Loaded::Ready(engine),
            Ok(EngineResponse::Unavailable { reason }) => Loaded::Unavailable(reason),
            Ok(other) => Loaded::Unavailable(format!("unexpected status reply: {:?}", other)),
            Err(e) => Loaded::Unavailable(e.to_string()),
        }
    }

    async fn call(&self, request: EngineRequest) -> Result<EngineResponse, AnalysisError> {
        let message =
            serde_json::to_value(&request).map_err(|e| AnalysisError::Decode(e.to_string()))?;
        let reply = self.bus.send(Target::Background, message).await?;
        serde_json::from_value(reply).map_err(|e| DeliveryError::Decode(e.to_string()).into())
    }

    fn unexpected(response: EngineResponse) -> AnalysisError {
        match response {
            EngineResponse::Failed { message } => AnalysisError::Engine(message),
            EngineResponse::Unavailable { reason } => AnalysisError::Unavailable(reason),
            other => AnalysisError::Decode(format!("unexpected reply: {:?}", other)),
        }
    }
}

impl<B: MessageBus> Engine for RemoteEngine<'_, B> {
    async fn scan(&self, text: &str, rules: &RuleStates) -> Result<Vec<Diagnostic>, AnalysisError> {
        let request = EngineRequest::Scan {
            text: text.to_string(),
            rules: rules.clone(),
        };
        match self.call(request).await? {
            EngineResponse::Diagnostics { diagnostics } => Ok(diagnostics),
            other => Err(Self::unexpected(other)),
        }
    }

    async fn fix(&self, text: &str, rules: &RuleStates) -> Result<String, AnalysisError> {
        let request = EngineRequest::Fix {
            text: text.to_string(),
            rules: rules.clone(),
        };
        match self.call(request).await? {
            EngineResponse::Text { text } => Ok(text),
            other => Err(Self::unexpected(other)),
        }
    }

    async fn normalize(&self, text: &str) -> Result<String, AnalysisError> {
        let request = EngineRequest::Normalize {
            text: text.to_string(),
        };
        match self.call(request).await? {
            EngineResponse::Text { text } => Ok(text),
            other => Err(Self::unexpected(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RuleCode;
    use crate::testing::{BackgroundBus, FakeEngine};
    use pollster::block_on;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let value = serde_json::to_value(EngineRequest::Normalize { text: "ά".into() }).unwrap();
        assert_eq!(value, json!({ "action": "engineNormalize", "text": "ά" }));
    }

    #[test]
    fn test_remote_calls_round_trip() {
        let bus = BackgroundBus::new(Some(FakeEngine::greek()));
        let remote = block_on(RemoteEngine::connect(&bus)).ready().unwrap();

        let diagnostics = block_on(remote.scan("καλημερα", &RuleStates::all_enabled())).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, RuleCode::MultisyllableNotAccented);

        let fixed = block_on(remote.fix("καλημερα", &RuleStates::all_enabled())).unwrap();
        assert_eq!(fixed, "καλημέρα");
    }

    #[test]
    fn test_connect_reports_unavailable_background() {
        let bus = BackgroundBus::new(None);
        assert!(matches!(block_on(RemoteEngine::connect(&bus)), Loaded::Unavailable(_)));
    }

    #[test]
    fn test_engine_failure_surfaces_as_analysis_error() {
        let bus = BackgroundBus::new(Some(FakeEngine::greek().poisoned("κακό")));
        let remote = block_on(RemoteEngine::connect(&bus)).ready().unwrap();

        let err = block_on(remote.scan("κακό", &RuleStates::all_enabled())).unwrap_err();
        assert!(matches!(err, AnalysisError::Engine(_)));
    }
}
