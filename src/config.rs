//! Shared configuration: highlight color + rule enablement
//!
//! Persisted in the extension's key-value storage under two keys:
//! - `selectedColor`: CSS color string, default `#FFFF00`
//! - `ruleStates`: object of rule code -> bool, default all `true`
//!
//! The store itself is injected through [`KeyValueStore`]; pipelines receive
//! a loaded [`Configuration`] value instead of reading storage mid-algorithm.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::OnceLock;

use crate::rules::{RuleCode, RuleStates};

pub const SELECTED_COLOR_KEY: &str = "selectedColor";
pub const RULE_STATES_KEY: &str = "ruleStates";
pub const DEFAULT_COLOR: &str = "#FFFF00";

// =============================================================================
// Color
// =============================================================================

/// Rejected color string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColorError(pub String);

impl fmt::Display for ColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid CSS color: {:?}", self.0)
    }
}

impl std::error::Error for ColorError {}

fn color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"^(#([0-9A-Fa-f]{3,4}|[0-9A-Fa-f]{6}|[0-9A-Fa-f]{8})|[A-Za-z]+|(rgb|rgba|hsl|hsla)\([0-9.,%\s]+\))$",
        )
        .expect("color pattern is valid")
    })
}

/// Validated CSS color used as marker background
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(String);

impl Color {
    pub fn parse(value: &str) -> Result<Self, ColorError> {
        let trimmed = value.trim();
        if color_pattern().is_match(trimmed) {
            Ok(Color(trimmed.to_string()))
        } else {
            Err(ColorError(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Color {
    fn default() -> Self {
        Color(DEFAULT_COLOR.to_string())
    }
}

impl TryFrom<String> for Color {
    type Error = ColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Color::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Everything a pipeline run needs from storage
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub selected_color: Color,
    pub rule_states: RuleStates,
}

impl Configuration {
    /// Build from raw stored entries, falling back to defaults per key
    pub fn from_entries(entries: &Map<String, Value>) -> Self {
        let selected_color = match entries.get(SELECTED_COLOR_KEY) {
            None | Some(Value::Null) => Color::default(),
            Some(Value::String(raw)) => Color::parse(raw).unwrap_or_else(|e| {
                log::warn!("[config] {}; using {}", e, DEFAULT_COLOR);
                Color::default()
            }),
            Some(other) => {
                log::warn!("[config] Non-string {}: {}", SELECTED_COLOR_KEY, other);
                Color::default()
            }
        };

        Self {
            selected_color,
            rule_states: rule_states_from_entries(entries),
        }
    }
}

fn rule_states_from_entries(entries: &Map<String, Value>) -> RuleStates {
    match entries.get(RULE_STATES_KEY) {
        None | Some(Value::Null) => RuleStates::all_enabled(),
        Some(value) => RuleStates::deserialize(value).unwrap_or_else(|e| {
            log::warn!("[config] Malformed {}: {}; enabling all rules", RULE_STATES_KEY, e);
            RuleStates::all_enabled()
        }),
    }
}

// =============================================================================
// Storage
// =============================================================================

/// Storage backend failure
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend rejected or failed the operation
    Backend(String),
    /// Value could not be converted
    Serialization(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Backend(msg) => write!(f, "Storage error: {}", msg),
            StoreError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

/// Persisted key-value storage shared by every context
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    /// Stored entries for `keys`; absent keys are simply missing from the map
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError>;

    /// Write complete values for each entry
    async fn set(&self, entries: Map<String, Value>) -> Result<(), StoreError>;
}

impl<S: KeyValueStore> KeyValueStore for Rc<S> {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        (**self).get(keys).await
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<(), StoreError> {
        (**self).set(entries).await
    }
}

/// In-process store for native hosts and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw stored value, bypassing defaults
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.entries.borrow().get(key).cloned()
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, keys: &[&str]) -> Result<Map<String, Value>, StoreError> {
        let entries = self.entries.borrow();
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set(&self, entries: Map<String, Value>) -> Result<(), StoreError> {
        self.entries.borrow_mut().extend(entries);
        Ok(())
    }
}

// =============================================================================
// ConfigStore
// =============================================================================

/// Typed access to the persisted configuration
#[derive(Debug, Clone, Default)]
pub struct ConfigStore<S> {
    store: S,
}

impl<S: KeyValueStore> ConfigStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    pub async fn load(&self) -> Result<Configuration, StoreError> {
        let entries = self.store.get(&[SELECTED_COLOR_KEY, RULE_STATES_KEY]).await?;
        Ok(Configuration::from_entries(&entries))
    }

    /// Load, or fall back to defaults when storage fails
    pub async fn load_or_default(&self) -> Configuration {
        self.load().await.unwrap_or_else(|e| {
            log::warn!("[config] {}; using default configuration", e);
            Configuration::default()
        })
    }

    pub async fn rule_states(&self) -> Result<RuleStates, StoreError> {
        let entries = self.store.get(&[RULE_STATES_KEY]).await?;
        Ok(rule_states_from_entries(&entries))
    }

    pub async fn save_color(&self, color: &Color) -> Result<(), StoreError> {
        let mut entries = Map::new();
        entries.insert(SELECTED_COLOR_KEY.to_string(), Value::String(color.to_string()));
        self.store.set(entries).await
    }

    pub async fn save_rule_states(&self, states: &RuleStates) -> Result<(), StoreError> {
        let value =
            serde_json::to_value(states).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut entries = Map::new();
        entries.insert(RULE_STATES_KEY.to_string(), value);
        self.store.set(entries).await
    }

    /// Read-modify-write one rule, persisting the full map
    pub async fn set_rule(&self, rule: RuleCode, enabled: bool) -> Result<RuleStates, StoreError> {
        let mut states = self.rule_states().await?;
        states.set(rule, enabled);
        self.save_rule_states(&states).await?;
        Ok(states)
    }

    /// Flip one rule, persisting the full map; returns the new state
    pub async fn toggle_rule(&self, rule: RuleCode) -> Result<bool, StoreError> {
        let mut states = self.rule_states().await?;
        let enabled = states.toggle(rule);
        self.save_rule_states(&states).await?;
        Ok(enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;
    use serde_json::json;

    #[test]
    fn test_fresh_install_defaults() {
        let config = ConfigStore::new(MemoryStore::new());
        let loaded = block_on(config.load()).unwrap();

        assert_eq!(loaded.selected_color.as_str(), "#FFFF00");
        for rule in RuleCode::ALL {
            assert!(loaded.rule_states.is_enabled(rule));
        }
    }

    #[test]
    fn test_set_rule_writes_full_map() {
        let store = Rc::new(MemoryStore::new());
        let config = ConfigStore::new(store.clone());

        block_on(config.set_rule(RuleCode::DuplicatedWord, false)).unwrap();

        let raw = store.raw(RULE_STATES_KEY).unwrap();
        assert_eq!(raw.as_object().unwrap().len(), RuleCode::ALL.len());
        assert_eq!(raw["DW"], json!(false));
        assert_eq!(raw["MA"], json!(true));
    }

    #[test]
    fn test_toggle_rule_round_trip() {
        let config = ConfigStore::new(MemoryStore::new());
        assert!(!block_on(config.toggle_rule(RuleCode::MixedScripts)).unwrap());
        assert!(block_on(config.toggle_rule(RuleCode::MixedScripts)).unwrap());
    }

    #[test]
    fn test_invalid_stored_color_falls_back() {
        let store = MemoryStore::new();
        let mut entries = Map::new();
        entries.insert(SELECTED_COLOR_KEY.into(), json!("red; background-image: url(x)"));
        block_on(store.set(entries)).unwrap();

        let loaded = block_on(ConfigStore::new(store).load()).unwrap();
        assert_eq!(loaded.selected_color, Color::default());
    }

    #[test]
    fn test_malformed_rule_states_enable_all() {
        let store = MemoryStore::new();
        let mut entries = Map::new();
        entries.insert(RULE_STATES_KEY.into(), json!([1, 2, 3]));
        block_on(store.set(entries)).unwrap();

        let states = block_on(ConfigStore::new(store).rule_states()).unwrap();
        assert_eq!(states, RuleStates::all_enabled());
    }

    #[test]
    fn test_color_parse() {
        for ok in ["#FFFF00", "#abc", "#a1b2c3d4", "yellow", "rgb(255, 0, 0)", "hsla(60, 100%, 50%, 0.4)"] {
            assert!(Color::parse(ok).is_ok(), "{} should parse", ok);
        }
        for bad in ["", "#12", "url(x)", "red;", "\"><script>"] {
            assert!(Color::parse(bad).is_err(), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_configuration_wire_format() {
        let config: Configuration = serde_json::from_value(json!({
            "selectedColor": "#00FF00",
            "ruleStates": { "AC": false }
        }))
        .unwrap();
        assert_eq!(config.selected_color.as_str(), "#00FF00");
        assert!(!config.rule_states.is_enabled(RuleCode::AmbiguousChar));
    }
}
