//! Configuration structures for building tickers from external files.
//!
//! These structs are designed to be deserialized from a configuration file
//! (e.g., a TOML file) using `serde`, so an application can define its
//! schedule and the recognized specification fields outside the code.

use serde::Deserialize;

use crate::parser::{Fields, Parser};

/// File-level configuration for a [`Ticker`](crate::ticker::Ticker).
#[derive(Debug, Clone, Deserialize)]
pub struct TickerConfig {
    /// The crontab specification, e.g. `"*/5 * * * *"` or `"@hourly"`.
    pub spec: String,

    /// The specification fields the parser recognizes, in field order.
    /// Defaults to the standard five-field crontab plus descriptors.
    #[serde(default = "default_fields")]
    pub fields: Vec<FieldName>,
}

impl TickerConfig {
    /// Creates a configuration for `spec` with the standard field set.
    pub fn new(spec: impl Into<String>) -> Self {
        Self {
            spec: spec.into(),
            fields: default_fields(),
        }
    }

    /// The configured fields as a [`Fields`] set.
    pub fn fields(&self) -> Fields {
        self.fields
            .iter()
            .fold(Fields::empty(), |set, name| set | name.as_flag())
    }

    /// Builds the parser described by this configuration.
    pub fn parser(&self) -> Parser {
        Parser::new(self.fields())
    }
}

/// A single recognized specification field, as named in configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldName {
    Second,
    SecondOptional,
    Minute,
    Hour,
    Dom,
    Month,
    Dow,
    DowOptional,
    Descriptor,
}

impl FieldName {
    fn as_flag(self) -> Fields {
        match self {
            FieldName::Second => Fields::SECOND,
            FieldName::SecondOptional => Fields::SECOND_OPTIONAL,
            FieldName::Minute => Fields::MINUTE,
            FieldName::Hour => Fields::HOUR,
            FieldName::Dom => Fields::DOM,
            FieldName::Month => Fields::MONTH,
            FieldName::Dow => Fields::DOW,
            FieldName::DowOptional => Fields::DOW_OPTIONAL,
            FieldName::Descriptor => Fields::DESCRIPTOR,
        }
    }
}

// --- Default value functions for serde ---

fn default_fields() -> Vec<FieldName> {
    vec![
        FieldName::Minute,
        FieldName::Hour,
        FieldName::Dom,
        FieldName::Month,
        FieldName::Dow,
        FieldName::Descriptor,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fields_match_standard_parser() {
        let config = TickerConfig::new("* * * * *");
        assert_eq!(config.parser(), Parser::standard());
    }

    #[test]
    fn deserializes_field_names() {
        let config: TickerConfig = serde_json::from_str(
            r#"{
                "spec": "* * * * * *",
                "fields": ["second", "minute", "hour", "dom", "month", "dow", "descriptor"]
            }"#,
        )
        .expect("valid configuration");
        assert!(config.fields().contains(Fields::SECOND));
        assert!(config.parser().parse(&config.spec).is_ok());
    }

    #[test]
    fn missing_fields_fall_back_to_the_default_set() {
        let config: TickerConfig =
            serde_json::from_str(r#"{ "spec": "@daily" }"#).expect("valid configuration");
        assert_eq!(config.parser(), Parser::standard());
    }
}
