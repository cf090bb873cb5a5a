//! Script embedding settings

use serde::{Deserialize, Serialize};

/// Limits and conventions applied when marshalling script values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptSettings {
    /// Deepest table nesting accepted from a script push. Also stops cyclic
    /// objects.
    pub max_depth: usize,
    /// Read canonical integer property names (`"7"`, `"-3"`) as integer keys.
    pub integer_keys: bool,
}

impl Default for ScriptSettings {
    fn default() -> Self {
        Self {
            max_depth: 64,
            integer_keys: true,
        }
    }
}

impl ScriptSettings {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let settings = ScriptSettings::from_json(r#"{ "max_depth": 8 }"#).unwrap();
        assert_eq!(settings.max_depth, 8);
        assert!(settings.integer_keys);
    }
}
