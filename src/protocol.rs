//! Cross-context message protocol
//!
//! The popup and background send [`ActionMessage`]s to a page's content
//! context; every handler replies with an [`Ack`]. Wire names match the
//! extension's existing message vocabulary:
//!
//! | Action      | Wire            | Payload             |
//! |-------------|-----------------|---------------------|
//! | `Scan`      | `runScan`       | -                   |
//! | `Normalize` | `runToMono`     | -                   |
//! | `Fix`       | `runFix`        | -                   |
//! | `SetRule`   | `setRule`       | `rule`, `enabled?`  |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

use crate::rules::RuleCode;

// =============================================================================
// Actions
// =============================================================================

/// Action tag without payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Scan,
    Normalize,
    Fix,
    SetRule,
}

impl ActionKind {
    pub fn wire_name(&self) -> &'static str {
        match self {
            ActionKind::Scan => "runScan",
            ActionKind::Normalize => "runToMono",
            ActionKind::Fix => "runFix",
            ActionKind::SetRule => "setRule",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Message sent to a content context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum ActionMessage {
    #[serde(rename = "runScan")]
    Scan,
    #[serde(rename = "runToMono")]
    Normalize,
    #[serde(rename = "runFix")]
    Fix,
    /// Persist a rule's enablement, then rescan. Without `enabled` the rule is toggled.
    #[serde(rename = "setRule")]
    SetRule {
        rule: RuleCode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        enabled: Option<bool>,
    },
}

impl ActionMessage {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionMessage::Scan => ActionKind::Scan,
            ActionMessage::Normalize => ActionKind::Normalize,
            ActionMessage::Fix => ActionKind::Fix,
            ActionMessage::SetRule { .. } => ActionKind::SetRule,
        }
    }

    /// Decode a raw message; the error carries the action name for the reply
    pub fn from_value(value: Value) -> Result<Self, String> {
        let name = value
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("<missing>")
            .to_string();
        serde_json::from_value(value).map_err(|e| {
            log::debug!("[protocol] Could not decode {}: {}", name, e);
            name
        })
    }
}

// =============================================================================
// Acknowledgement
// =============================================================================

/// How a handler finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Finished,
    /// Engine could not be instantiated; nothing was annotated
    Unavailable,
    Failed,
    /// Action not recognized
    Unknown,
    /// Another pipeline was already running in this context
    Skipped,
}

/// Status acknowledgement returned for every message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: String,
    pub outcome: Outcome,
}

impl Ack {
    pub fn finished(kind: ActionKind) -> Self {
        Self {
            status: format!("{} finished", kind),
            outcome: Outcome::Finished,
        }
    }

    pub fn unavailable(kind: ActionKind, reason: &str) -> Self {
        Self {
            status: format!("{} unavailable: {}", kind, reason),
            outcome: Outcome::Unavailable,
        }
    }

    pub fn failed(kind: ActionKind, error: impl fmt::Display) -> Self {
        Self {
            status: format!("{} failed: {}", kind, error),
            outcome: Outcome::Failed,
        }
    }

    pub fn unknown(action: &str) -> Self {
        Self {
            status: format!("unknown action: {}", action),
            outcome: Outcome::Unknown,
        }
    }

    pub fn skipped(kind: ActionKind) -> Self {
        Self {
            status: format!("{} skipped: pipeline in flight", kind),
            outcome: Outcome::Skipped,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome == Outcome::Finished
    }
}

// =============================================================================
// Message bus
// =============================================================================

/// Receiver of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Content context of the active tab in the current window
    ActiveTab,
    /// Content context of a specific tab
    Tab(i32),
    /// The background worker
    Background,
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::ActiveTab => write!(f, "active tab"),
            Target::Tab(id) => write!(f, "tab {}", id),
            Target::Background => write!(f, "background"),
        }
    }
}

/// Message could not be delivered or answered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Nobody is listening (no active tab, content script not injected...)
    NoReceiver(String),
    /// The platform reported a send failure
    Transport(String),
    /// Reply did not match the expected shape
    Decode(String),
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::NoReceiver(msg) => write!(f, "No receiver: {}", msg),
            DeliveryError::Transport(msg) => write!(f, "Send failed: {}", msg),
            DeliveryError::Decode(msg) => write!(f, "Malformed reply: {}", msg),
        }
    }
}

impl std::error::Error for DeliveryError {}

/// Asynchronous one-shot messaging between contexts
#[allow(async_fn_in_trait)]
pub trait MessageBus {
    async fn send(&self, target: Target, message: Value) -> Result<Value, DeliveryError>;
}

impl<B: MessageBus> MessageBus for Rc<B> {
    async fn send(&self, target: Target, message: Value) -> Result<Value, DeliveryError> {
        (**self).send(target, message).await
    }
}

/// Bus with no receivers, for contexts that never message anyone
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBus;

impl MessageBus for NoBus {
    async fn send(&self, target: Target, _message: Value) -> Result<Value, DeliveryError> {
        Err(DeliveryError::NoReceiver(target.to_string()))
    }
}

/// Send an action to a content context and decode its [`Ack`]
pub async fn send_action<B: MessageBus>(
    bus: &B,
    target: Target,
    message: &ActionMessage,
) -> Result<Ack, DeliveryError> {
    let value = serde_json::to_value(message).map_err(|e| DeliveryError::Decode(e.to_string()))?;
    let reply = bus.send(target, value).await?;
    serde_json::from_value(reply).map_err(|e| DeliveryError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_names() {
        assert_eq!(serde_json::to_value(ActionMessage::Scan).unwrap(), json!({ "action": "runScan" }));
        assert_eq!(
            serde_json::to_value(ActionMessage::Normalize).unwrap(),
            json!({ "action": "runToMono" })
        );
        assert_eq!(
            serde_json::to_value(ActionMessage::SetRule { rule: RuleCode::DuplicatedWord, enabled: Some(false) })
                .unwrap(),
            json!({ "action": "setRule", "rule": "DW", "enabled": false })
        );
    }

    #[test]
    fn test_decode_set_rule_without_enabled() {
        let message = ActionMessage::from_value(json!({ "action": "setRule", "rule": "MS" })).unwrap();
        assert_eq!(message, ActionMessage::SetRule { rule: RuleCode::MixedScripts, enabled: None });
        assert_eq!(message.kind(), ActionKind::SetRule);
    }

    #[test]
    fn test_unknown_action_reports_name() {
        assert_eq!(ActionMessage::from_value(json!({ "action": "runDance" })), Err("runDance".to_string()));
        assert_eq!(ActionMessage::from_value(json!({ "rule": "DW" })), Err("<missing>".to_string()));
        assert_eq!(
            ActionMessage::from_value(json!({ "action": "setRule", "rule": "NOPE" })),
            Err("setRule".to_string())
        );
    }

    #[test]
    fn test_ack_statuses() {
        assert_eq!(Ack::finished(ActionKind::Scan).status, "runScan finished");
        assert_eq!(Ack::unknown("runDance").status, "unknown action: runDance");
        assert_eq!(
            serde_json::to_value(Ack::unavailable(ActionKind::Fix, "blocked")).unwrap(),
            json!({ "status": "runFix unavailable: blocked", "outcome": "unavailable" })
        );
    }
}
