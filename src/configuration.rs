//! Configurations: ordered feature-to-value assignments, round-trippable
//! to flat JSON objects with string values (`{"feature": "true", ...}`).

use indexmap::IndexMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smol_str::SmolStr;

use crate::error::FeatureError;

/// A tagged configuration value. Booleans render as `"true"`/`"false"`,
/// integers as decimal strings; [`Text`](Self::Text) keeps foreign values
/// lossless.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigurationValue {
    Bool(bool),
    Integer(i64),
    Text(SmolStr),
}

impl ConfigurationValue {
    /// Recover the tag from a rendered value: `"true"`/`"false"` are
    /// booleans, decimal strings are integers, everything else is text.
    pub fn from_rendered(value: &str) -> Self {
        match value {
            "true" => Self::Bool(true),
            "false" => Self::Bool(false),
            _ => value
                .parse::<i64>()
                .map(Self::Integer)
                .unwrap_or_else(|_| Self::Text(SmolStr::new(value))),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConfigurationValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

impl From<bool> for ConfigurationValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ConfigurationValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

/// An ordered mapping from feature name to assigned value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    options: IndexMap<SmolStr, ConfigurationValue>,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) an option.
    pub fn set_option(&mut self, name: impl Into<SmolStr>, value: ConfigurationValue) {
        self.options.insert(name.into(), value);
    }

    pub fn value(&self, name: &str) -> Option<&ConfigurationValue> {
        self.options.get(name)
    }

    /// Options in insertion order.
    pub fn options(&self) -> impl Iterator<Item = (&str, &ConfigurationValue)> {
        self.options.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Emit as a flat JSON object with string values.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("configuration serialization cannot fail")
    }

    /// Parse a configuration from a JSON string. Non-objects, nested
    /// values, and syntax errors produce a diagnostic and no
    /// configuration.
    pub fn from_json(input: &str) -> Result<Self, FeatureError> {
        serde_json::from_str(input).map_err(|error| {
            FeatureError::Error(format!("failed to read configuration: {error}"))
        })
    }
}

impl Serialize for Configuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.options.len()))?;
        for (name, value) in &self.options {
            map.serialize_entry(name.as_str(), &value.to_string())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Configuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ConfigurationVisitor;

        impl<'de> Visitor<'de> for ConfigurationVisitor {
            type Value = Configuration;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a flat object of string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut configuration = Configuration::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    configuration.set_option(
                        SmolStr::new(name),
                        ConfigurationValue::from_rendered(&value),
                    );
                }
                Ok(configuration)
            }
        }

        deserializer.deserialize_map(ConfigurationVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_roundtrip_preserves_order_and_tags() {
        let mut configuration = Configuration::new();
        configuration.set_option("root", true.into());
        configuration.set_option("a", false.into());
        configuration.set_option("Num1", 42.into());
        let json = configuration.to_json();
        assert_eq!(json, r#"{"root":"true","a":"false","Num1":"42"}"#);

        let parsed = Configuration::from_json(&json).unwrap();
        assert_eq!(parsed, configuration);
        assert_eq!(parsed.value("Num1").unwrap().as_integer(), Some(42));
        assert_eq!(parsed.value("a").unwrap().as_bool(), Some(false));
    }

    #[test]
    fn test_unknown_text_values_survive() {
        let parsed = Configuration::from_json(r#"{"mode":"fast"}"#).unwrap();
        assert_eq!(
            parsed.value("mode"),
            Some(&ConfigurationValue::Text("fast".into()))
        );
        assert_eq!(parsed.to_json(), r#"{"mode":"fast"}"#);
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert!(Configuration::from_json("[1, 2]").is_err());
        assert!(Configuration::from_json("42").is_err());
    }

    #[test]
    fn test_nested_values_are_rejected() {
        assert!(Configuration::from_json(r#"{"a": ["nested"]}"#).is_err());
        assert!(Configuration::from_json(r#"{"a": {"b": "c"}}"#).is_err());
    }

    #[test]
    fn test_syntax_error_is_diagnosed() {
        let err = Configuration::from_json("{oops").unwrap_err();
        assert!(err.to_string().starts_with("failed to read configuration"));
    }

    #[test]
    fn test_negative_integers_tag_correctly() {
        assert_eq!(
            ConfigurationValue::from_rendered("-3"),
            ConfigurationValue::Integer(-3)
        );
    }
}
