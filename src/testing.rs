//! Test doubles: a dictionary-driven engine, loaders and message buses

use serde_json::Value;
use std::cell::{Cell, RefCell};

use crate::diagnostic::Diagnostic;
use crate::engine::{remote, AnalysisError, Engine, EngineLoader, EngineRequest, Loaded};
use crate::protocol::{Ack, ActionMessage, DeliveryError, MessageBus, Target};
use crate::rules::{RuleCode, RuleStates};

#[derive(Debug, Clone)]
struct Entry {
    word: String,
    kind: RuleCode,
    fix: String,
}

/// Flags fixed words; deterministic and stateless
#[derive(Debug, Clone, Default)]
pub struct FakeEngine {
    entries: Vec<Entry>,
    scripted: Vec<(String, Vec<Diagnostic>)>,
    poisoned: Vec<String>,
}

const POLYTONIC: &[(char, char)] = &[
    ('ἀ', 'α'),
    ('ἐ', 'ε'),
    ('ἡ', 'η'),
    ('ὁ', 'ο'),
    ('ὰ', 'ά'),
    ('ὶ', 'ί'),
    ('ὸ', 'ό'),
    ('ῆ', 'ή'),
    ('ῶ', 'ώ'),
];

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine knowing a couple of Greek mistakes
    pub fn greek() -> Self {
        Self::new()
            .flag("καλημερα", RuleCode::MultisyllableNotAccented, "καλημέρα")
            .flag("το το", RuleCode::DuplicatedWord, "το")
    }

    pub fn flag(mut self, word: &str, kind: RuleCode, fix: &str) -> Self {
        self.entries.push(Entry {
            word: word.to_string(),
            kind,
            fix: fix.to_string(),
        });
        self
    }

    /// Return exactly `diagnostics` whenever the input equals `text`
    pub fn script(mut self, text: &str, diagnostics: Vec<Diagnostic>) -> Self {
        self.scripted.push((text.to_string(), diagnostics));
        self
    }

    /// Throw for this exact input
    pub fn poisoned(mut self, text: &str) -> Self {
        self.poisoned.push(text.to_string());
        self
    }

    fn check_poison(&self, text: &str) -> Result<(), AnalysisError> {
        if self.poisoned.iter().any(|p| p == text) {
            return Err(AnalysisError::Engine(format!("cannot analyze {:?}", text)));
        }
        Ok(())
    }
}

impl Engine for FakeEngine {
    async fn scan(&self, text: &str, rules: &RuleStates) -> Result<Vec<Diagnostic>, AnalysisError> {
        self.check_poison(text)?;
        if let Some((_, diagnostics)) = self.scripted.iter().find(|(t, _)| t == text) {
            return Ok(diagnostics.clone());
        }

        let mut diagnostics = Vec::new();
        for entry in self.entries.iter().filter(|e| rules.is_enabled(e.kind)) {
            for (byte_start, _) in text.match_indices(&entry.word) {
                let start = text[..byte_start].chars().count();
                let end = start + entry.word.chars().count();
                diagnostics.push(Diagnostic::new(entry.kind, start, end, entry.fix.clone()));
            }
        }
        Ok(diagnostics)
    }

    async fn fix(&self, text: &str, rules: &RuleStates) -> Result<String, AnalysisError> {
        self.check_poison(text)?;
        Ok(self
            .entries
            .iter()
            .filter(|e| rules.is_enabled(e.kind))
            .fold(text.to_string(), |acc, e| acc.replace(&e.word, &e.fix)))
    }

    async fn normalize(&self, text: &str) -> Result<String, AnalysisError> {
        self.check_poison(text)?;
        Ok(text
            .chars()
            .map(|c| {
                POLYTONIC
                    .iter()
                    .find(|(from, _)| *from == c)
                    .map(|(_, to)| *to)
                    .unwrap_or(c)
            })
            .collect())
    }
}

/// Loader handing out a clone of a fixed engine, or nothing
#[derive(Debug, Default)]
pub struct FixedLoader {
    engine: Option<FakeEngine>,
    pub loads: Cell<usize>,
}

impl FixedLoader {
    pub fn new(engine: FakeEngine) -> Self {
        Self {
            engine: Some(engine),
            loads: Cell::new(0),
        }
    }

    /// Loader that behaves like a CSP-blocked page
    pub fn blocked() -> Self {
        Self::default()
    }
}

impl EngineLoader for FixedLoader {
    type Engine = FakeEngine;

    async fn load(&self) -> Loaded<FakeEngine> {
        self.loads.set(self.loads.get() + 1);
        match &self.engine {
            Some(engine) => Loaded::Ready(engine.clone()),
            None => Loaded::Unavailable("wasm blocked by page CSP".to_string()),
        }
    }
}

/// Bus whose background end serves engine requests
#[derive(Debug, Default)]
pub struct BackgroundBus {
    engine: Option<FakeEngine>,
    pub requests: Cell<usize>,
}

impl BackgroundBus {
    pub fn new(engine: Option<FakeEngine>) -> Self {
        Self {
            engine,
            requests: Cell::new(0),
        }
    }
}

impl MessageBus for BackgroundBus {
    async fn send(&self, target: Target, message: Value) -> Result<Value, DeliveryError> {
        if target != Target::Background {
            return Err(DeliveryError::NoReceiver(target.to_string()));
        }
        self.requests.set(self.requests.get() + 1);
        let request: EngineRequest =
            serde_json::from_value(message).map_err(|e| DeliveryError::Decode(e.to_string()))?;
        let response = remote::serve(self.engine.as_ref(), request).await;
        serde_json::to_value(response).map_err(|e| DeliveryError::Decode(e.to_string()))
    }
}

/// Bus recording action messages sent to tabs
#[derive(Debug)]
pub struct TabBus {
    open: bool,
    pub sent: RefCell<Vec<(Target, ActionMessage)>>,
}

impl TabBus {
    pub fn new() -> Self {
        Self {
            open: true,
            sent: RefCell::new(Vec::new()),
        }
    }

    /// No tab is listening
    pub fn closed() -> Self {
        Self {
            open: false,
            sent: RefCell::new(Vec::new()),
        }
    }

    pub fn messages(&self) -> Vec<ActionMessage> {
        self.sent.borrow().iter().map(|(_, m)| m.clone()).collect()
    }
}

impl MessageBus for TabBus {
    async fn send(&self, target: Target, message: Value) -> Result<Value, DeliveryError> {
        if !self.open {
            return Err(DeliveryError::NoReceiver("no active tab".to_string()));
        }
        let action: ActionMessage =
            serde_json::from_value(message).map_err(|e| DeliveryError::Decode(e.to_string()))?;
        let ack = Ack::finished(action.kind());
        self.sent.borrow_mut().push((target, action));
        serde_json::to_value(ack).map_err(|e| DeliveryError::Decode(e.to_string()))
    }
}
