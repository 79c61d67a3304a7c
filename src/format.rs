//! Records and the two output formats.

use serde_json::{Map, Value};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config::PRODUCTION;
use crate::{Fields, Level, Message};

/// A single log event after field merging.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub time: OffsetDateTime,
    pub level: Level,
    pub message: Message,
    pub fields: Fields,
}

impl Record {
    /// A record stamped with the current UTC time.
    pub fn new(level: Level, message: Message, fields: Fields) -> Self {
        Self {
            time: OffsetDateTime::now_utc(),
            level,
            message,
            fields,
        }
    }

    /// RFC 3339 timestamp, empty if the time cannot be formatted.
    pub fn timestamp(&self) -> String {
        self.time.format(&Rfc3339).unwrap_or_default()
    }
}

/// Line format written by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    /// `key=value` pairs for humans.
    Text,
    /// One JSON object per line.
    Json,
}

impl Formatter {
    /// JSON in production, text anywhere else.
    pub fn for_environment(environment: &str) -> Self {
        if environment == PRODUCTION {
            Formatter::Json
        } else {
            Formatter::Text
        }
    }

    /// Append `record` as one newline-terminated line to `buf`.
    pub fn format(&self, record: &Record, buf: &mut Vec<u8>) {
        match self {
            Formatter::Text => format_text(record, buf),
            Formatter::Json => format_json(record, buf),
        }
        buf.push(b'\n');
    }
}

/// Build a JSON object from `fields` plus reserved keys, renaming clashing
/// fields to `fields.<key>`.
pub(crate) fn json_object<const N: usize>(
    fields: &Fields,
    reserved: [(&str, Value); N],
) -> Map<String, Value> {
    let mut obj = Map::new();
    for (k, v) in fields {
        let key = if reserved.iter().any(|(r, _)| *r == k.as_str()) {
            format!("fields.{}", k)
        } else {
            k.clone()
        };
        obj.insert(key, v.clone());
    }
    for (k, v) in reserved {
        obj.insert(k.to_string(), v);
    }
    obj
}

fn format_json(record: &Record, buf: &mut Vec<u8>) {
    let obj = json_object(
        &record.fields,
        [
            ("time", Value::String(record.timestamp())),
            ("level", Value::String(record.level.to_string())),
            ("msg", Value::String(record.message.to_string())),
        ],
    );
    // A map of JSON values always serializes.
    let _ = serde_json::to_writer(&mut *buf, &Value::Object(obj));
}

fn format_text(record: &Record, buf: &mut Vec<u8>) {
    let mut line = String::new();
    push_pair(&mut line, "time", &record.timestamp());
    push_pair(&mut line, "level", record.level.as_str());
    push_pair(&mut line, "msg", &record.message.to_string());
    for (k, v) in &record.fields {
        let rendered = match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        push_pair(&mut line, k, &rendered);
    }
    buf.extend_from_slice(line.as_bytes());
}

fn push_pair(line: &mut String, key: &str, value: &str) {
    if !line.is_empty() {
        line.push(' ');
    }
    line.push_str(key);
    line.push('=');
    if needs_quoting(value) {
        line.push_str(&format!("{:?}", value));
    } else {
        line.push_str(value);
    }
}

fn needs_quoting(value: &str) -> bool {
    value.is_empty()
        || !value.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '/' | '@' | '^' | '+')
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(fields: Fields) -> Record {
        Record::new(Level::Info, Message::from("hello world"), fields)
    }

    fn render(formatter: Formatter, record: &Record) -> String {
        let mut buf = Vec::new();
        formatter.format(record, &mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_for_environment() {
        assert_eq!(Formatter::for_environment("production"), Formatter::Json);
        assert_eq!(Formatter::for_environment("staging"), Formatter::Text);
        assert_eq!(Formatter::for_environment("development"), Formatter::Text);
        assert_eq!(Formatter::for_environment("Production"), Formatter::Text);
    }

    #[test]
    fn test_text_format() {
        let mut fields = Fields::new();
        fields.insert("service_name".to_string(), json!("svc"));
        fields.insert("attempt".to_string(), json!(3));
        fields.insert("path".to_string(), json!("/a b"));
        let line = render(Formatter::Text, &record(fields));

        assert!(line.ends_with('\n'));
        assert!(line.starts_with("time="));
        assert!(line.contains(r#"level=info msg="[hello world]" attempt=3 path="/a b" service_name=svc"#));
    }

    #[test]
    fn test_json_format() {
        let mut fields = Fields::new();
        fields.insert("service_name".to_string(), json!("svc"));
        fields.insert("count".to_string(), json!(7));
        let line = render(Formatter::Json, &record(fields));

        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["level"], json!("info"));
        assert_eq!(value["msg"], json!("[hello world]"));
        assert_eq!(value["service_name"], json!("svc"));
        assert_eq!(value["count"], json!(7));
        assert!(value["time"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_json_format_renames_clashing_fields() {
        let mut fields = Fields::new();
        fields.insert("msg".to_string(), json!("mine"));
        fields.insert("level".to_string(), json!(1));
        let line = render(Formatter::Json, &record(fields));

        let value: Value = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(value["msg"], json!("[hello world]"));
        assert_eq!(value["fields.msg"], json!("mine"));
        assert_eq!(value["fields.level"], json!(1));
    }

    #[test]
    fn test_needs_quoting() {
        assert!(!needs_quoting("abc-1.2_x/y@z^+"));
        assert!(needs_quoting(""));
        assert!(needs_quoting("a b"));
        assert!(needs_quoting("a=b"));
    }
}
