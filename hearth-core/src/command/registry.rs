//! Device registry: identifier → on/off state, with alias resolution.
//!
//! Recognized speech is messy — "kitchen light", "the kitchen ceiling
//! light" and "kitchen-ceiling-light" must all land on the same device.
//! Resolution tries, in order: exact alias match, partial alias match
//! (either direction), direct identifier, and hyphenated identifier.
//!
//! State writes go through one `RwLock` so concurrent control calls
//! serialize instead of losing updates.

use std::collections::HashMap;
use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Static description of one controllable device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Stable identifier, e.g. `kitchen-ceiling-light`.
    pub id: String,
    /// Display name, e.g. `Ceiling Light`.
    pub name: String,
    /// Room the device lives in.
    pub room: String,
    /// Spoken aliases, e.g. `kitchen light`.
    pub aliases: Vec<String>,
    /// Power state the device starts in.
    pub default_on: bool,
}

/// Result of applying an intent to a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceAction {
    /// Resolved device identifier.
    pub device_id: String,
    /// Power state after the action.
    pub turned_on: bool,
}

impl DeviceAction {
    /// One-line confirmation suitable for speech output.
    pub fn message(&self) -> String {
        let state = if self.turned_on { "on" } else { "off" };
        format!("Successfully turned {state} {}", self.device_id)
    }
}

/// Why an apply was refused. These are user-facing outcomes, not faults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    UnknownDevice(String),
    UnsupportedAction(String),
}

impl fmt::Display for ApplyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApplyError::UnknownDevice(name) => write!(f, "Device \"{name}\" not found"),
            ApplyError::UnsupportedAction(action) => {
                write!(f, "Action \"{action}\" not supported")
            }
        }
    }
}

/// The set of known devices and their mutable power states.
pub struct DeviceRegistry {
    specs: Vec<DeviceSpec>,
    /// Lowercased alias (and id) → device id.
    alias_index: HashMap<String, String>,
    states: RwLock<HashMap<String, bool>>,
}

impl DeviceRegistry {
    pub fn new(specs: Vec<DeviceSpec>) -> Self {
        let mut alias_index = HashMap::new();
        let mut states = HashMap::new();
        for spec in &specs {
            alias_index.insert(spec.id.to_lowercase(), spec.id.clone());
            for alias in &spec.aliases {
                alias_index.insert(alias.to_lowercase(), spec.id.clone());
            }
            states.insert(spec.id.clone(), spec.default_on);
        }
        Self {
            specs,
            alias_index,
            states: RwLock::new(states),
        }
    }

    pub fn specs(&self) -> &[DeviceSpec] {
        &self.specs
    }

    /// Comma-joined identifier list for the intent parser's vocabulary.
    pub fn vocabulary(&self) -> String {
        self.specs
            .iter()
            .map(|s| s.id.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Map a spoken device name to its identifier.
    pub fn resolve(&self, spoken: &str) -> Option<String> {
        let name = spoken.trim().to_lowercase();
        if name.is_empty() {
            return None;
        }

        if let Some(id) = self.alias_index.get(&name) {
            return Some(id.clone());
        }

        // Partial match in either direction: "the kitchen light" vs the
        // alias "kitchen light".
        for (alias, id) in &self.alias_index {
            if name.contains(alias.as_str()) || alias.contains(&name) {
                return Some(id.clone());
            }
        }

        // Last resort: the spoken form may already be the id modulo
        // separators.
        let hyphenated = name.replace([' ', '_'], "-");
        self.alias_index.get(&hyphenated).cloned()
    }

    /// Current power state of a device id.
    pub fn state(&self, id: &str) -> Option<bool> {
        self.states.read().get(id).copied()
    }

    /// Snapshot of every device's power state.
    pub fn states(&self) -> HashMap<String, bool> {
        self.states.read().clone()
    }

    /// Resolve `spoken` and apply `intent` to it.
    pub fn apply(&self, spoken: &str, intent: &str) -> Result<DeviceAction, ApplyError> {
        let id = self
            .resolve(spoken)
            .ok_or_else(|| ApplyError::UnknownDevice(spoken.to_string()))?;

        let turn_on = match intent.to_lowercase().as_str() {
            "turn_on" | "activate" | "enable" | "on" => true,
            "turn_off" | "deactivate" | "disable" | "off" => false,
            other => return Err(ApplyError::UnsupportedAction(other.to_string())),
        };

        let mut states = self.states.write();
        states.insert(id.clone(), turn_on);

        tracing::info!(device = %id, on = turn_on, "device state changed");
        Ok(DeviceAction {
            device_id: id,
            turned_on: turn_on,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(vec![
            DeviceSpec {
                id: "kitchen-ceiling-light".into(),
                name: "Ceiling Light".into(),
                room: "Kitchen".into(),
                aliases: vec![
                    "kitchen ceiling light".into(),
                    "kitchen light".into(),
                    "kitchen main light".into(),
                ],
                default_on: true,
            },
            DeviceSpec {
                id: "bedroom-fan".into(),
                name: "Fan".into(),
                room: "Bedroom".into(),
                aliases: vec!["bedroom fan".into(), "fan".into()],
                default_on: false,
            },
        ])
    }

    #[test]
    fn resolves_exact_alias() {
        let reg = registry();
        assert_eq!(
            reg.resolve("kitchen light").as_deref(),
            Some("kitchen-ceiling-light")
        );
    }

    #[test]
    fn resolves_partial_alias() {
        let reg = registry();
        assert_eq!(
            reg.resolve("the kitchen light").as_deref(),
            Some("kitchen-ceiling-light")
        );
    }

    #[test]
    fn resolves_spaced_identifier() {
        let reg = registry();
        assert_eq!(
            reg.resolve("kitchen ceiling light").as_deref(),
            Some("kitchen-ceiling-light")
        );
    }

    #[test]
    fn unknown_device_is_none() {
        let reg = registry();
        assert!(reg.resolve("garage door").is_none());
    }

    #[test]
    fn apply_turn_on_and_synonyms() {
        let reg = registry();
        let action = reg.apply("fan", "turn_on").unwrap();
        assert_eq!(action.device_id, "bedroom-fan");
        assert!(action.turned_on);
        assert_eq!(reg.state("bedroom-fan"), Some(true));

        let action = reg.apply("fan", "off").unwrap();
        assert!(!action.turned_on);
        assert_eq!(reg.state("bedroom-fan"), Some(false));
    }

    #[test]
    fn apply_rejects_unknown_action() {
        let reg = registry();
        let err = reg.apply("fan", "dim").unwrap_err();
        assert_eq!(err, ApplyError::UnsupportedAction("dim".into()));
        // State untouched by the refused action.
        assert_eq!(reg.state("bedroom-fan"), Some(false));
    }

    #[test]
    fn concurrent_writers_serialize() {
        use std::sync::Arc;
        let reg = Arc::new(registry());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let reg = Arc::clone(&reg);
                std::thread::spawn(move || {
                    let intent = if i % 2 == 0 { "turn_on" } else { "turn_off" };
                    for _ in 0..100 {
                        reg.apply("fan", intent).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        // Whatever won, the state is a coherent bool.
        assert!(reg.state("bedroom-fan").is_some());
    }
}
