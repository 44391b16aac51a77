//! Record validation and request construction.
//!
//! Parses the repaired text into a list of JSON values, turns each value into
//! a [`MetadataRecord`] (or a non-fatal [`RecordError`]), and renders a
//! [`ChatRequest`] line for every valid record.

use crate::error::{BatchError, RecordError};
use crate::prompts::{user_prompt, MISSING_AUTHORS, TEMPERATURE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

/// Prefix of every request's `custom_id`; results are joined back on it.
pub const CUSTOM_ID_PREFIX: &str = "extract-";

/// HTTP method written into every request line.
pub const REQUEST_METHOD: &str = "POST";

/// Parse repaired text into the top-level array of records.
///
/// `source` only labels errors.
pub fn parse_records(text: &str, source: &Path) -> Result<Vec<Value>, BatchError> {
    let value: Value = serde_json::from_str(text).map_err(|e| BatchError::MalformedInput {
        path: source.to_path_buf(),
        detail: e.to_string(),
    })?;

    match value {
        Value::Array(items) => Ok(items),
        other => Err(BatchError::NotAnArray {
            path: source.to_path_buf(),
            found: json_type_name(&other).to_string(),
        }),
    }
}

fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// One validated paper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataRecord {
    pub id: String,
    pub title: String,
    /// Trimmed, never empty.
    pub abstract_text: String,
    pub authors: Option<String>,
}

impl MetadataRecord {
    /// Validate the `index`-th element of the input array.
    ///
    /// `_id` and `title` are absent when null, `false`, `""`, `0`, `[]` or `{}`;
    /// any other value is kept, non-strings rendered as text;
    /// `abstract` must be a non-empty string; `author` may be a string or an
    /// array of strings (joined with `", "`). Anything else counts as absent.
    pub fn from_value(index: usize, value: &Value) -> Result<Self, RecordError> {
        let obj = value
            .as_object()
            .ok_or(RecordError::NotAnObject { index })?;

        let missing = |field: &str| RecordError::MissingField {
            index,
            field: field.to_string(),
        };

        let id = scalar_text(obj.get("_id")).ok_or_else(|| missing("_id"))?;
        let title = scalar_text(obj.get("title")).ok_or_else(|| missing("title"))?;
        let raw_abstract = match obj.get("abstract") {
            Some(Value::String(s)) if !s.is_empty() => s,
            _ => return Err(missing("abstract")),
        };

        let abstract_text = raw_abstract.trim();
        if abstract_text.is_empty() {
            return Err(RecordError::EmptyAbstract { index, id });
        }

        Ok(Self {
            id,
            title,
            abstract_text: abstract_text.to_string(),
            authors: authors_text(obj.get("author")),
        })
    }

    pub fn custom_id(&self) -> String {
        format!("{CUSTOM_ID_PREFIX}{}", self.id)
    }

    /// Author string for the prompt, or `"N/A"`.
    pub fn authors_or_placeholder(&self) -> &str {
        self.authors.as_deref().unwrap_or(MISSING_AUTHORS)
    }

    pub fn user_prompt(&self) -> String {
        user_prompt(&self.title, self.authors_or_placeholder(), &self.abstract_text)
    }
}

fn scalar_text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) if s.is_empty() => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::Array(a) if a.is_empty() => None,
        Value::Object(o) if o.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(display_text(other)),
    }
}

/// Text for a non-string field value, in the form downstream ids and prompts
/// already use: `True`, `['Deep', 'Nets']`, `{'k': 1}`.
fn display_text(v: &Value) -> String {
    match v {
        Value::Null => "None".to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => "False".to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
        Value::Array(items) => {
            let inner: Vec<String> = items.iter().map(display_text).collect();
            format!("[{}]", inner.join(", "))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| {
                    let key = display_text(&Value::String(k.clone()));
                    format!("{key}: {}", display_text(v))
                })
                .collect();
            format!("{{{}}}", inner.join(", "))
        }
    }
}

// An empty string or empty list counts as absent; a whitespace-only string
// trims to "" and is kept.
fn authors_text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(s.trim().to_string()),
        Value::Array(items) if !items.is_empty() => {
            let names: Vec<&str> = items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .collect();
            if names.is_empty() {
                None
            } else {
                Some(names.join(", "))
            }
        }
        _ => None,
    }
}

/// One chat message inside a request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// The `body` of a batch request line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestBody {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: String,
}

/// A single line of a batch input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub custom_id: String,
    pub method: String,
    pub url: String,
    pub body: RequestBody,
}

impl ChatRequest {
    /// Build the request for `record`: system message, then user prompt.
    pub fn for_record(record: &MetadataRecord, model: &str, system_prompt: &str) -> Self {
        Self {
            custom_id: record.custom_id(),
            method: REQUEST_METHOD.to_string(),
            url: zhipu_batch::CHAT_COMPLETIONS_ENDPOINT.to_string(),
            body: RequestBody {
                model: model.to_string(),
                messages: vec![
                    ChatMessage::system(system_prompt),
                    ChatMessage::user(record.user_prompt()),
                ],
                temperature: TEMPERATURE.to_string(),
            },
        }
    }

    /// The record id this request was built from.
    pub fn record_id(&self) -> Option<&str> {
        self.custom_id.strip_prefix(CUSTOM_ID_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rec(v: Value) -> Result<MetadataRecord, RecordError> {
        MetadataRecord::from_value(0, &v)
    }

    #[test]
    fn test_valid_record() {
        let r = rec(json!({
            "_id": "p1",
            "title": "Title",
            "abstract": "  An abstract.\n",
            "author": " Ada Lovelace "
        }))
        .unwrap();
        assert_eq!(r.id, "p1");
        assert_eq!(r.abstract_text, "An abstract.");
        assert_eq!(r.authors.as_deref(), Some("Ada Lovelace"));
        assert_eq!(r.custom_id(), "extract-p1");
    }

    #[test]
    fn test_missing_fields_reported_in_order() {
        let e = rec(json!({"title": "T", "abstract": "A"})).unwrap_err();
        assert_eq!(
            e,
            RecordError::MissingField {
                index: 0,
                field: "_id".into()
            }
        );

        let e = rec(json!({"_id": "p", "abstract": "A"})).unwrap_err();
        assert!(matches!(e, RecordError::MissingField { ref field, .. } if field == "title"));

        let e = rec(json!({"_id": "p2", "title": "T2"})).unwrap_err();
        assert!(matches!(e, RecordError::MissingField { ref field, .. } if field == "abstract"));
    }

    #[test]
    fn test_falsy_values_count_as_missing() {
        for v in [
            json!({"_id": "", "title": "T", "abstract": "A"}),
            json!({"_id": null, "title": "T", "abstract": "A"}),
            json!({"_id": 0, "title": "T", "abstract": "A"}),
            json!({"_id": "p", "title": "", "abstract": "A"}),
            json!({"_id": "p", "title": "T", "abstract": ""}),
            json!({"_id": "p", "title": "T", "abstract": null}),
            json!({"_id": "p", "title": "T", "abstract": 5}),
        ] {
            assert!(
                matches!(rec(v.clone()), Err(RecordError::MissingField { .. })),
                "should be missing: {v}"
            );
        }
    }

    #[test]
    fn test_whitespace_abstract_is_empty() {
        let e = rec(json!({"_id": "p3", "title": "T", "abstract": " \t "})).unwrap_err();
        assert_eq!(
            e,
            RecordError::EmptyAbstract {
                index: 0,
                id: "p3".into()
            }
        );
    }

    #[test]
    fn test_truthy_non_string_fields_rendered() {
        let r = rec(json!({"_id": true, "title": ["Deep", "Nets"], "abstract": "A"})).unwrap();
        assert_eq!(r.custom_id(), "extract-True");
        assert_eq!(r.title, "['Deep', 'Nets']");
        assert!(r.user_prompt().contains("Title: ['Deep', 'Nets']\n"));

        let r = rec(json!({"_id": "p", "title": {"en": "T"}, "abstract": "A"})).unwrap();
        assert_eq!(r.title, "{'en': 'T'}");

        for v in [
            json!({"_id": false, "title": "T", "abstract": "A"}),
            json!({"_id": "p", "title": [], "abstract": "A"}),
            json!({"_id": "p", "title": {}, "abstract": "A"}),
        ] {
            assert!(
                matches!(rec(v.clone()), Err(RecordError::MissingField { .. })),
                "should be missing: {v}"
            );
        }
    }

    #[test]
    fn test_numeric_id_accepted() {
        let r = rec(json!({"_id": 42, "title": "T", "abstract": "A"})).unwrap();
        assert_eq!(r.custom_id(), "extract-42");
    }

    #[test]
    fn test_not_an_object() {
        assert_eq!(
            MetadataRecord::from_value(3, &json!(["p1"])).unwrap_err(),
            RecordError::NotAnObject { index: 3 }
        );
    }

    #[test]
    fn test_authors_variants() {
        let base = |author: Value| {
            rec(json!({"_id": "p", "title": "T", "abstract": "A", "author": author})).unwrap()
        };
        assert_eq!(base(json!("")).authors_or_placeholder(), "N/A");
        assert_eq!(base(Value::Null).authors_or_placeholder(), "N/A");
        assert_eq!(base(json!("   ")).authors_or_placeholder(), "");
        assert_eq!(base(json!(["A. B", " C. D "])).authors_or_placeholder(), "A. B, C. D");
        assert_eq!(base(json!([])).authors_or_placeholder(), "N/A");

        let r = rec(json!({"_id": "p", "title": "T", "abstract": "A"})).unwrap();
        assert!(r.user_prompt().contains("Authors: N/A\n"));
    }

    #[test]
    fn test_chat_request_shape() {
        let r = rec(json!({"_id": "p1", "title": "T", "abstract": "A B"})).unwrap();
        let req = ChatRequest::for_record(&r, "glm-4-flash", "SYS");
        let v = serde_json::to_value(&req).unwrap();

        assert_eq!(v["custom_id"], "extract-p1");
        assert_eq!(v["method"], "POST");
        assert_eq!(v["url"], "/v4/chat/completions");
        assert_eq!(v["body"]["model"], "glm-4-flash");
        assert_eq!(v["body"]["temperature"], "0.1");
        assert_eq!(v["body"]["messages"][0]["role"], "system");
        assert_eq!(v["body"]["messages"][0]["content"], "SYS");
        assert_eq!(v["body"]["messages"][1]["role"], "user");
        assert!(v["body"]["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("Abstract: A B\n"));
        assert_eq!(req.record_id(), Some("p1"));
    }

    #[test]
    fn test_serialised_field_order() {
        let r = rec(json!({"_id": "p1", "title": "T", "abstract": "A"})).unwrap();
        let line = serde_json::to_string(&ChatRequest::for_record(&r, "m", "s")).unwrap();
        assert!(line.starts_with(r#"{"custom_id":"extract-p1","method":"POST","url":"/v4/chat/completions","body":{"model":"m""#));
    }

    #[test]
    fn test_parse_records() {
        let items = parse_records(r#"[{"_id":"a"}, 1]"#, Path::new("m.json")).unwrap();
        assert_eq!(items.len(), 2);

        let err = parse_records(r#"{"_id":"a"}"#, Path::new("m.json")).unwrap_err();
        assert!(matches!(err, BatchError::NotAnArray { ref found, .. } if found == "object"));

        let err = parse_records("[{", Path::new("m.json")).unwrap_err();
        assert!(matches!(err, BatchError::MalformedInput { .. }));
        assert_eq!(err.stage(), "parse");
    }
}
