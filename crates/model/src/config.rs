//! Schema and serialization configuration

use serde::{Deserialize, Serialize};

/// Options applied when a record type is built and its field types resolved.
///
/// Deserializable so schemas can be configured from files:
///
/// ```rust,ignore
/// let config: ModelConfig = serde_json::from_str(r#"{"private_prefix": "__"}"#)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Attribute names starting with this prefix are private unless a field
    /// says otherwise. An empty prefix disables the rule.
    pub private_prefix: String,

    /// A field whose default is `Null` accepts `Null` even when its declared
    /// type does not.
    pub implicit_optional: bool,

    /// Drop `int` from unions that also contain `float`.
    pub prefer_float_in_unions: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            private_prefix: "_".to_owned(),
            implicit_optional: true,
            prefer_float_in_unions: true,
        }
    }
}

impl ModelConfig {
    /// No implicit optionals and no union rewriting.
    pub fn strict() -> Self {
        Self {
            implicit_optional: false,
            prefer_float_in_unions: false,
            ..Self::default()
        }
    }

    pub fn is_private(&self, attr: &str) -> bool {
        !self.private_prefix.is_empty() && attr.starts_with(&self.private_prefix)
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_private_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.private_prefix = prefix.into();
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_implicit_optional(mut self, enabled: bool) -> Self {
        self.implicit_optional = enabled;
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn with_prefer_float_in_unions(mut self, enabled: bool) -> Self {
        self.prefer_float_in_unions = enabled;
        self
    }
}

/// Options for [`Record::as_dict`](crate::record::Record::as_dict).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AsDictOptions {
    /// Include private fields.
    pub private: bool,
    /// Key entries by wire alias instead of attribute name.
    pub alias: bool,
    /// Include named properties that are not excluded.
    pub properties: bool,
    /// Locale handed to field transforms.
    pub locale: Option<String>,
}

impl AsDictOptions {
    #[must_use = "builder methods must be chained or built"]
    pub fn private(mut self, enabled: bool) -> Self {
        self.private = enabled;
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn alias(mut self, enabled: bool) -> Self {
        self.alias = enabled;
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn properties(mut self, enabled: bool) -> Self {
        self.properties = enabled;
        self
    }

    #[must_use = "builder methods must be chained or built"]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: ModelConfig =
            serde_json::from_str(r#"{"prefer_float_in_unions": false}"#).unwrap();
        assert_eq!(config.private_prefix, "_");
        assert!(config.implicit_optional);
        assert!(!config.prefer_float_in_unions);
    }

    #[test]
    fn empty_prefix_disables_privacy() {
        let config = ModelConfig::default().with_private_prefix("");
        assert!(!config.is_private("_secret"));
        assert!(ModelConfig::default().is_private("_secret"));
    }
}
