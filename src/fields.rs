//! Field sets and the composite message value.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::Value;

/// Key that always carries the configured service name.
pub const SERVICE_NAME_KEY: &str = "service_name";

/// Structured key-value context attached to a log line.
pub type Fields = BTreeMap<String, Value>;

/// Merge `overrides` on top of `defaults` into a fresh map and force
/// [`SERVICE_NAME_KEY`] to `service_name`.
///
/// Neither input is modified.
pub fn merge_fields(defaults: &Fields, overrides: &Fields, service_name: &str) -> Fields {
    let mut all = Fields::new();
    for (k, v) in defaults.iter().chain(overrides.iter()) {
        all.insert(k.clone(), v.clone());
    }
    all.insert(
        SERVICE_NAME_KEY.to_string(),
        Value::String(service_name.to_string()),
    );
    all
}

/// An ordered sequence of loosely typed values logged as one composite value.
///
/// The items are never interpolated into each other. The whole sequence
/// renders as `[a b c]`, strings without quotes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message(Vec<Value>);

impl Message {
    /// A message from any sequence of values.
    pub fn new<I, V>(items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self(items.into_iter().map(Into::into).collect())
    }

    /// The parts, in order.
    pub fn items(&self) -> &[Value] {
        &self.0
    }

    /// Whether the message has no parts.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, item) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match item {
                Value::String(s) => f.write_str(s)?,
                other => write!(f, "{}", other)?,
            }
        }
        f.write_str("]")
    }
}

impl From<&str> for Message {
    fn from(s: &str) -> Self {
        Self(vec![Value::from(s)])
    }
}

impl From<String> for Message {
    fn from(s: String) -> Self {
        Self(vec![Value::from(s)])
    }
}

impl From<Value> for Message {
    fn from(v: Value) -> Self {
        Self(vec![v])
    }
}

impl From<Vec<Value>> for Message {
    fn from(items: Vec<Value>) -> Self {
        Self(items)
    }
}
