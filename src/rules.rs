//! RuleCode + RuleStates: the closed rule vocabulary of the analysis engine
//!
//! `RuleStates` is the per-rule enablement map shared by every context. It is
//! always total: a code missing from stored data resolves to enabled.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// =============================================================================
// RuleCode
// =============================================================================

/// Issue category reported by the analysis engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RuleCode {
    /// MissingDoubleAccents
    #[serde(rename = "MDA")]
    MissingDoubleAccents,
    /// MissingAccentCapital
    #[serde(rename = "MAC")]
    MissingAccentCapital,
    /// DuplicatedWord
    #[serde(rename = "DW")]
    DuplicatedWord,
    /// AddFinalN
    #[serde(rename = "AFN")]
    AddFinalN,
    /// RemoveFinalN
    #[serde(rename = "RFN")]
    RemoveFinalN,
    /// OutdatedSpelling
    #[serde(rename = "OS")]
    OutdatedSpelling,
    /// MonosyllableAccented
    #[serde(rename = "MA")]
    MonosyllableAccented,
    /// MultisyllableNotAccented
    #[serde(rename = "MNA")]
    MultisyllableNotAccented,
    /// MixedScripts
    #[serde(rename = "MS")]
    MixedScripts,
    /// AmbiguousChar
    #[serde(rename = "AC")]
    AmbiguousChar,
}

impl RuleCode {
    /// Every known code, in the order the popup lists them
    pub const ALL: [RuleCode; 10] = [
        RuleCode::MissingDoubleAccents,
        RuleCode::MissingAccentCapital,
        RuleCode::DuplicatedWord,
        RuleCode::AddFinalN,
        RuleCode::RemoveFinalN,
        RuleCode::OutdatedSpelling,
        RuleCode::MonosyllableAccented,
        RuleCode::MultisyllableNotAccented,
        RuleCode::MixedScripts,
        RuleCode::AmbiguousChar,
    ];

    /// Short wire code (`"MDA"`, `"DW"`, ...)
    pub fn code(&self) -> &'static str {
        match self {
            RuleCode::MissingDoubleAccents => "MDA",
            RuleCode::MissingAccentCapital => "MAC",
            RuleCode::DuplicatedWord => "DW",
            RuleCode::AddFinalN => "AFN",
            RuleCode::RemoveFinalN => "RFN",
            RuleCode::OutdatedSpelling => "OS",
            RuleCode::MonosyllableAccented => "MA",
            RuleCode::MultisyllableNotAccented => "MNA",
            RuleCode::MixedScripts => "MS",
            RuleCode::AmbiguousChar => "AC",
        }
    }
}

impl fmt::Display for RuleCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Unrecognized rule code string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRule(pub String);

impl fmt::Display for UnknownRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unknown rule code: {}", self.0)
    }
}

impl std::error::Error for UnknownRule {}

impl FromStr for RuleCode {
    type Err = UnknownRule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RuleCode::ALL
            .iter()
            .copied()
            .find(|rule| rule.code() == s)
            .ok_or_else(|| UnknownRule(s.to_string()))
    }
}

// =============================================================================
// RuleStates
// =============================================================================

/// Total enablement map over [`RuleCode::ALL`]
///
/// Only explicit `false` entries are stored; every other code reads as enabled.
/// Serializes as a JSON object with one boolean per known code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleStates {
    disabled: BTreeSet<RuleCode>,
}

impl RuleStates {
    /// Fresh map with every rule enabled
    pub fn all_enabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, rule: RuleCode) -> bool {
        !self.disabled.contains(&rule)
    }

    pub fn set(&mut self, rule: RuleCode, enabled: bool) {
        if enabled {
            self.disabled.remove(&rule);
        } else {
            self.disabled.insert(rule);
        }
    }

    /// Flip a rule and return its new state
    pub fn toggle(&mut self, rule: RuleCode) -> bool {
        let enabled = !self.is_enabled(rule);
        self.set(rule, enabled);
        enabled
    }

    /// `(rule, enabled)` for every known code
    pub fn iter(&self) -> impl Iterator<Item = (RuleCode, bool)> + '_ {
        RuleCode::ALL.iter().map(move |&rule| (rule, self.is_enabled(rule)))
    }

    pub fn enabled_count(&self) -> usize {
        RuleCode::ALL.len() - self.disabled.len()
    }
}

impl Serialize for RuleStates {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(RuleCode::ALL.len()))?;
        for (rule, enabled) in self.iter() {
            map.serialize_entry(rule.code(), &enabled)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RuleStates {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StatesVisitor;

        impl<'de> Visitor<'de> for StatesVisitor {
            type Value = RuleStates;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of rule codes to booleans")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<RuleStates, A::Error> {
                let mut states = RuleStates::all_enabled();
                while let Some((key, value)) = access.next_entry::<String, serde_json::Value>()? {
                    // Unknown codes and non-boolean values never disable anything
                    match (key.parse::<RuleCode>(), value) {
                        (Ok(rule), serde_json::Value::Bool(enabled)) => states.set(rule, enabled),
                        (Err(e), _) => log::debug!("[rules] Ignoring stored key: {}", e),
                        (Ok(rule), other) => {
                            log::debug!("[rules] Ignoring non-boolean state for {}: {}", rule, other)
                        }
                    }
                }
                Ok(states)
            }
        }

        deserializer.deserialize_map(StatesVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_states_enable_every_rule() {
        let states = RuleStates::all_enabled();
        for rule in RuleCode::ALL {
            assert!(states.is_enabled(rule), "{} should default to enabled", rule);
        }
        assert_eq!(states.enabled_count(), 10);
    }

    #[test]
    fn test_missing_keys_resolve_to_enabled() {
        let states: RuleStates = serde_json::from_value(json!({ "DW": false })).unwrap();
        assert!(!states.is_enabled(RuleCode::DuplicatedWord));
        assert!(states.is_enabled(RuleCode::MixedScripts));
        assert_eq!(states.enabled_count(), 9);
    }

    #[test]
    fn test_unknown_and_malformed_entries_ignored() {
        let states: RuleStates =
            serde_json::from_value(json!({ "XYZ": false, "MA": "no", "AC": false })).unwrap();
        assert!(states.is_enabled(RuleCode::MonosyllableAccented));
        assert!(!states.is_enabled(RuleCode::AmbiguousChar));
    }

    #[test]
    fn test_serializes_full_map() {
        let mut states = RuleStates::all_enabled();
        states.set(RuleCode::OutdatedSpelling, false);

        let value = serde_json::to_value(&states).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 10);
        assert_eq!(object["OS"], json!(false));
        assert_eq!(object["MNA"], json!(true));
    }

    #[test]
    fn test_toggle_flips_state() {
        let mut states = RuleStates::all_enabled();
        assert!(!states.toggle(RuleCode::DuplicatedWord));
        assert!(states.toggle(RuleCode::DuplicatedWord));
        assert!(states.is_enabled(RuleCode::DuplicatedWord));
    }

    #[test]
    fn test_code_round_trips_through_from_str() {
        assert_eq!("MNA".parse::<RuleCode>(), Ok(RuleCode::MultisyllableNotAccented));
        assert!("mna".parse::<RuleCode>().is_err());
    }
}
