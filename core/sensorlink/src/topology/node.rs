//! Parsed, validated view of one topology node entry.

use crate::config::{self, ConfigurationError};

/// The validated configuration of one topology node.
///
/// Produced by a single validation pass: either the whole entry is valid, or
/// parsing fails with an error naming the node and the offending field.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSpec {
    /// The node name (the key of the entry in its section).
    pub name: String,
    /// The channel this node is wired to.
    pub channel: String,
    /// The sensor this node belongs to.
    pub sensor: String,
    /// The declared tuple field names, in declaration order.
    pub fields: Vec<String>,
    /// The message-builder key.
    pub builder: String,
    /// The broker-type key, resolved against the builder registry.
    pub broker: String,
    /// Node-specific properties, if declared.
    pub properties: Option<toml::Table>,
}

pub(super) const CHANNEL: &str = "channel";
pub(super) const SENSOR: &str = "sensor";
pub(super) const FIELDS: &str = "fields";
pub(super) const BUILDER: &str = "builder";
pub(super) const BROKER: &str = "broker";
pub(super) const PROPERTIES: &str = "properties";

impl NodeSpec {
    /// Parses one node entry. `scope` is the configuration path of the entry
    /// (for instance `spouts.s1`), used to name violations.
    pub fn parse(name: &str, entry: &toml::Value, scope: &str) -> Result<Self, ConfigurationError> {
        let table = entry
            .as_table()
            .ok_or_else(|| ConfigurationError::bad_type(scope.to_owned(), "table", entry))?;

        Ok(Self {
            name: name.to_owned(),
            channel: config::require_str(table, CHANNEL, scope)?,
            sensor: config::require_str(table, SENSOR, scope)?,
            fields: config::require_str_array(table, FIELDS, scope)?,
            builder: config::require_str(table, BUILDER, scope)?,
            broker: config::require_str(table, BROKER, scope)?,
            properties: config::optional_table(table, PROPERTIES, scope)?.cloned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::str::FromStr;

    fn entry(s: &str) -> toml::Value {
        toml::Value::Table(toml::Table::from_str(s).unwrap())
    }

    #[test]
    fn parses_a_complete_node() {
        let e = entry(
            r#"
            channel = "q1"
            sensor = "s1"
            fields = ["a", "b"]
            builder = "identity"
            broker = "rabbitMQ"
            [properties]
            queueName = "q1"
            "#,
        );
        let spec = NodeSpec::parse("node1", &e, "spouts.node1").unwrap();
        assert_eq!(spec.name, "node1");
        assert_eq!(spec.channel, "q1");
        assert_eq!(spec.sensor, "s1");
        assert_eq!(spec.fields, vec!["a", "b"]);
        assert_eq!(spec.builder, "identity");
        assert_eq!(spec.broker, "rabbitMQ");
        let props = spec.properties.unwrap();
        assert_eq!(props.get("queueName").unwrap().as_str(), Some("q1"));
    }

    #[test]
    fn parsed_nodes_compare_by_value() {
        let e = entry(
            r#"
            channel = "q1"
            sensor = "s1"
            fields = ["a"]
            builder = "identity"
            broker = "rabbitMQ"
            [properties]
            queueName = "q1"
            "#,
        );
        let spec = NodeSpec::parse("n", &e, "spouts.n").unwrap();
        assert_eq!(spec, spec.clone());
    }

    #[test]
    fn properties_are_optional() {
        let e = entry(
            r#"
            channel = "q1"
            sensor = "s1"
            fields = []
            builder = "identity"
            broker = "rabbitMQ"
            "#,
        );
        assert!(NodeSpec::parse("n", &e, "spouts.n").unwrap().properties.is_none());
    }

    #[test]
    fn scalar_fields_value_is_rejected_citing_the_field() {
        let e = entry(
            r#"
            channel = "q1"
            sensor = "s1"
            fields = "a"
            builder = "identity"
            broker = "rabbitMQ"
            "#,
        );
        let err = NodeSpec::parse("n", &e, "spouts.n").unwrap_err();
        assert_eq!(err.path(), "spouts.n.fields");
    }

    #[test]
    fn missing_broker_is_rejected() {
        let e = entry(
            r#"
            channel = "q1"
            sensor = "s1"
            fields = []
            builder = "identity"
            "#,
        );
        let err = NodeSpec::parse("n", &e, "spouts.n").unwrap_err();
        assert_eq!(err.path(), "spouts.n.broker");
    }
}
