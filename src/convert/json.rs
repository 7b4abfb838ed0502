//! JSON/JSONB tree walking.
//!
//! Two symmetric halves. Decode: a depth-first token stream over the native
//! jsonb tree (the host iterator's begin/end/key/value/elem vocabulary)
//! drives a sink that builds nested dynamic objects and arrays. Encode: a
//! recursive walk of a dynamic value drives a [`JsonSink`]; the sink
//! abstraction lets the same walk build either the native tree or a dynamic
//! value graph. The textual path (parse/stringify round trip) lives here
//! too.

use chrono::DateTime;
use tracing::warn;

use crate::datum::JsonbValue;
use crate::error::{BridgeError, BridgeResult};
use crate::value::{DynamicValue, PlainObject, format_number};

/// Scalar leaf in the JSON model. Numbers keep their decimal text until a
/// backend decides how to represent them.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonScalar {
    Null,
    Bool(bool),
    Numeric(String),
    String(String),
}

/// Output sink for JSON structure: push/pop containers, append keys and
/// scalar leaves.
pub trait JsonSink {
    fn begin_object(&mut self);
    fn end_object(&mut self);
    fn begin_array(&mut self);
    fn end_array(&mut self);
    fn key(&mut self, key: String);
    fn scalar(&mut self, value: JsonScalar);
}

/// Token of the depth-first jsonb walk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JsonToken<'a> {
    BeginObject,
    EndObject,
    BeginArray,
    EndArray,
    Key(&'a str),
    /// Scalar value of the pending object key.
    Value(&'a JsonbValue),
    /// Scalar array element.
    Elem(&'a JsonbValue),
    Done,
}

enum TokenFrame<'a> {
    Object {
        entries: std::slice::Iter<'a, (String, JsonbValue)>,
        pending: Option<&'a JsonbValue>,
    },
    Array {
        items: std::slice::Iter<'a, JsonbValue>,
    },
}

/// Depth-first token iterator over a native jsonb tree. Yields `Done` once
/// after the final container closes.
pub struct JsonbTokens<'a> {
    root: Option<&'a JsonbValue>,
    frames: Vec<TokenFrame<'a>>,
    done: bool,
}

impl<'a> JsonbTokens<'a> {
    pub fn new(root: &'a JsonbValue) -> JsonbTokens<'a> {
        JsonbTokens { root: Some(root), frames: Vec::new(), done: false }
    }

    fn open(&mut self, node: &'a JsonbValue) -> JsonToken<'a> {
        match node {
            JsonbValue::Object(entries) => {
                self.frames.push(TokenFrame::Object { entries: entries.iter(), pending: None });
                JsonToken::BeginObject
            }
            JsonbValue::Array(items) => {
                self.frames.push(TokenFrame::Array { items: items.iter() });
                JsonToken::BeginArray
            }
            scalar => JsonToken::Elem(scalar),
        }
    }
}

impl<'a> Iterator for JsonbTokens<'a> {
    type Item = JsonToken<'a>;

    fn next(&mut self) -> Option<JsonToken<'a>> {
        if self.done {
            return None;
        }
        if let Some(root) = self.root.take() {
            // A scalar root yields a single leaf token; the empty frame
            // stack then produces Done.
            return Some(self.open(root));
        }
        let Some(frame) = self.frames.last_mut() else {
            self.done = true;
            return Some(JsonToken::Done);
        };
        match frame {
            TokenFrame::Object { entries, pending } => {
                if let Some(value) = pending.take() {
                    return Some(match value {
                        JsonbValue::Object(_) | JsonbValue::Array(_) => self.open(value),
                        scalar => JsonToken::Value(scalar),
                    });
                }
                match entries.next() {
                    Some((key, value)) => {
                        *pending = Some(value);
                        Some(JsonToken::Key(key))
                    }
                    None => {
                        self.frames.pop();
                        Some(JsonToken::EndObject)
                    }
                }
            }
            TokenFrame::Array { items } => match items.next() {
                Some(item @ (JsonbValue::Object(_) | JsonbValue::Array(_))) => {
                    Some(self.open(item))
                }
                Some(scalar) => Some(JsonToken::Elem(scalar)),
                None => {
                    self.frames.pop();
                    Some(JsonToken::EndArray)
                }
            },
        }
    }
}

/// Sink that builds a nested dynamic value graph.
#[derive(Default)]
pub struct DynamicGraphSink {
    stack: Vec<GraphFrame>,
    root: Option<DynamicValue>,
}

enum GraphFrame {
    Object { object: PlainObject, pending_key: Option<String> },
    Array { items: Vec<DynamicValue> },
}

impl DynamicGraphSink {
    pub fn new() -> DynamicGraphSink {
        DynamicGraphSink::default()
    }

    fn push_value(&mut self, value: DynamicValue) {
        match self.stack.last_mut() {
            Some(GraphFrame::Object { object, pending_key }) => {
                // A key always precedes its value in the token stream.
                let key = pending_key.take().unwrap_or_default();
                object.insert(key, value);
            }
            Some(GraphFrame::Array { items }) => items.push(value),
            None => self.root = Some(value),
        }
    }

    pub fn finish(mut self) -> DynamicValue {
        self.root.take().unwrap_or(DynamicValue::Null)
    }
}

impl JsonSink for DynamicGraphSink {
    fn begin_object(&mut self) {
        self.stack.push(GraphFrame::Object { object: PlainObject::new(), pending_key: None });
    }

    fn end_object(&mut self) {
        if let Some(GraphFrame::Object { object, .. }) = self.stack.pop() {
            self.push_value(DynamicValue::Object(object));
        }
    }

    fn begin_array(&mut self) {
        self.stack.push(GraphFrame::Array { items: Vec::new() });
    }

    fn end_array(&mut self) {
        if let Some(GraphFrame::Array { items }) = self.stack.pop() {
            self.push_value(DynamicValue::Array(items));
        }
    }

    fn key(&mut self, key: String) {
        if let Some(GraphFrame::Object { pending_key, .. }) = self.stack.last_mut() {
            *pending_key = Some(key);
        }
    }

    fn scalar(&mut self, value: JsonScalar) {
        let dynamic = match value {
            JsonScalar::Null => DynamicValue::Null,
            JsonScalar::Bool(b) => DynamicValue::Boolean(b),
            // Decimal-to-double widening happens here, at the dynamic edge.
            JsonScalar::Numeric(text) => DynamicValue::Number(text.parse().unwrap_or(f64::NAN)),
            JsonScalar::String(s) => DynamicValue::String(s),
        };
        self.push_value(dynamic);
    }
}

/// Sink that builds a native jsonb tree.
#[derive(Default)]
pub struct JsonbTreeSink {
    stack: Vec<TreeFrame>,
    root: Option<JsonbValue>,
}

enum TreeFrame {
    Object { entries: Vec<(String, JsonbValue)>, pending_key: Option<String> },
    Array { items: Vec<JsonbValue> },
}

impl JsonbTreeSink {
    pub fn new() -> JsonbTreeSink {
        JsonbTreeSink::default()
    }

    fn push_value(&mut self, value: JsonbValue) {
        match self.stack.last_mut() {
            Some(TreeFrame::Object { entries, pending_key }) => {
                let key = pending_key.take().unwrap_or_default();
                entries.push((key, value));
            }
            Some(TreeFrame::Array { items }) => items.push(value),
            None => self.root = Some(value),
        }
    }

    pub fn finish(mut self) -> JsonbValue {
        self.root.take().unwrap_or(JsonbValue::Null)
    }
}

impl JsonSink for JsonbTreeSink {
    fn begin_object(&mut self) {
        self.stack.push(TreeFrame::Object { entries: Vec::new(), pending_key: None });
    }

    fn end_object(&mut self) {
        if let Some(TreeFrame::Object { entries, .. }) = self.stack.pop() {
            self.push_value(JsonbValue::Object(entries));
        }
    }

    fn begin_array(&mut self) {
        self.stack.push(TreeFrame::Array { items: Vec::new() });
    }

    fn end_array(&mut self) {
        if let Some(TreeFrame::Array { items }) = self.stack.pop() {
            self.push_value(JsonbValue::Array(items));
        }
    }

    fn key(&mut self, key: String) {
        if let Some(TreeFrame::Object { pending_key, .. }) = self.stack.last_mut() {
            *pending_key = Some(key);
        }
    }

    fn scalar(&mut self, value: JsonScalar) {
        let node = match value {
            JsonScalar::Null => JsonbValue::Null,
            JsonScalar::Bool(b) => JsonbValue::Bool(b),
            JsonScalar::Numeric(text) => JsonbValue::Numeric(text),
            JsonScalar::String(s) => JsonbValue::String(s),
        };
        self.push_value(node);
    }
}

fn leaf_scalar(node: &JsonbValue) -> JsonScalar {
    match node {
        JsonbValue::Null => JsonScalar::Null,
        JsonbValue::Bool(b) => JsonScalar::Bool(*b),
        JsonbValue::Numeric(text) => JsonScalar::Numeric(text.clone()),
        JsonbValue::String(s) => JsonScalar::String(s.clone()),
        JsonbValue::Array(_) | JsonbValue::Object(_) => {
            unreachable!("containers are opened, not emitted as leaves")
        }
    }
}

/// Decode a native jsonb tree into nested dynamic values.
pub fn decode_tree(root: &JsonbValue) -> BridgeResult<DynamicValue> {
    let mut sink = DynamicGraphSink::new();
    for token in JsonbTokens::new(root) {
        match token {
            JsonToken::BeginObject => sink.begin_object(),
            JsonToken::EndObject => sink.end_object(),
            JsonToken::BeginArray => sink.begin_array(),
            JsonToken::EndArray => sink.end_array(),
            JsonToken::Key(key) => sink.key(key.to_string()),
            JsonToken::Value(node) | JsonToken::Elem(node) => sink.scalar(leaf_scalar(node)),
            JsonToken::Done => break,
        }
    }
    Ok(sink.finish())
}

/// Encode a dynamic value into a native jsonb tree. A scalar root is
/// wrapped in a single-element array so the stored document has a defined
/// root shape.
pub fn encode_to_tree(value: &DynamicValue) -> JsonbValue {
    let mut sink = JsonbTreeSink::new();
    match value {
        DynamicValue::Object(_) | DynamicValue::Array(_) => encode_dynamic(value, &mut sink),
        scalar => {
            sink.begin_array();
            encode_dynamic(scalar, &mut sink);
            sink.end_array();
        }
    }
    sink.finish()
}

/// Recursive structural walk of a dynamic value into a sink. `Undefined`
/// entries are dropped entirely, at both object keys and array elements.
pub fn encode_dynamic(value: &DynamicValue, sink: &mut dyn JsonSink) {
    match value {
        DynamicValue::Object(object) => {
            sink.begin_object();
            for (key, entry) in object.iter() {
                if matches!(entry, DynamicValue::Undefined) {
                    continue;
                }
                sink.key(key.to_string());
                encode_dynamic(entry, sink);
            }
            sink.end_object();
        }
        DynamicValue::Array(items) => {
            sink.begin_array();
            for item in items {
                if matches!(item, DynamicValue::Undefined) {
                    continue;
                }
                encode_dynamic(item, sink);
            }
            sink.end_array();
        }
        leaf => sink.scalar(encode_leaf(leaf)),
    }
}

fn encode_leaf(value: &DynamicValue) -> JsonScalar {
    match value {
        DynamicValue::Null => JsonScalar::Null,
        DynamicValue::Boolean(b) => JsonScalar::Bool(*b),
        DynamicValue::Int32(v) => JsonScalar::Numeric(itoa::Buffer::new().format(*v).to_string()),
        DynamicValue::UInt32(v) => JsonScalar::Numeric(itoa::Buffer::new().format(*v).to_string()),
        DynamicValue::Number(n) => JsonScalar::Numeric(format_number(*n)),
        DynamicValue::String(s) => JsonScalar::String(s.clone()),
        DynamicValue::Date(ms) => match time_as_8601(*ms) {
            Some(iso) => JsonScalar::String(iso),
            None => JsonScalar::Null,
        },
        other => {
            warn!(kind = other.kind_name(), "unaccounted value kind in json conversion, coercing to string");
            JsonScalar::String(other.to_text())
        }
    }
}

/// ISO 8601 with millisecond precision and a trailing `Z`. Returns `None`
/// for NaN or out-of-range epoch values.
pub fn time_as_8601(millis: f64) -> Option<String> {
    if !millis.is_finite() {
        return None;
    }
    let ts = DateTime::from_timestamp_millis(millis as i64)?;
    Some(ts.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
}

/// Parse a JSON document's text into a native jsonb tree.
pub fn jsonb_from_json_text(text: &str) -> Result<JsonbValue, String> {
    let value: serde_json::Value = serde_json::from_str(text).map_err(|e| e.to_string())?;
    Ok(jsonb_from_serde(&value))
}

fn jsonb_from_serde(value: &serde_json::Value) -> JsonbValue {
    match value {
        serde_json::Value::Null => JsonbValue::Null,
        serde_json::Value::Bool(b) => JsonbValue::Bool(*b),
        serde_json::Value::Number(n) => JsonbValue::Numeric(n.to_string()),
        serde_json::Value::String(s) => JsonbValue::String(s.clone()),
        serde_json::Value::Array(items) => {
            JsonbValue::Array(items.iter().map(jsonb_from_serde).collect())
        }
        serde_json::Value::Object(entries) => JsonbValue::Object(
            entries.iter().map(|(k, v)| (k.clone(), jsonb_from_serde(v))).collect(),
        ),
    }
}

/// Serialize a native jsonb tree to JSON text. Numeric nodes print their
/// decimal text unchanged, so no precision is lost.
pub fn jsonb_to_json_text(tree: &JsonbValue) -> String {
    let mut out = String::new();
    write_jsonb(tree, &mut out);
    out
}

fn write_jsonb(node: &JsonbValue, out: &mut String) {
    match node {
        JsonbValue::Null => out.push_str("null"),
        JsonbValue::Bool(true) => out.push_str("true"),
        JsonbValue::Bool(false) => out.push_str("false"),
        JsonbValue::Numeric(text) => out.push_str(text),
        JsonbValue::String(s) => write_json_string(s, out),
        JsonbValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_jsonb(item, out);
            }
            out.push(']');
        }
        JsonbValue::Object(entries) => {
            out.push('{');
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_json_string(key, out);
                out.push_str(": ");
                write_jsonb(value, out);
            }
            out.push('}');
        }
    }
}

fn write_json_string(s: &str, out: &mut String) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}

/// Decode JSON document text into nested dynamic values (the engine's
/// JSON.parse side of the textual path).
pub fn decode_json_text(text: &str) -> BridgeResult<DynamicValue> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| BridgeError::DatumConversion(format!("invalid json: {e}")))?;
    Ok(dynamic_from_serde(&value))
}

fn dynamic_from_serde(value: &serde_json::Value) -> DynamicValue {
    match value {
        serde_json::Value::Null => DynamicValue::Null,
        serde_json::Value::Bool(b) => DynamicValue::Boolean(*b),
        serde_json::Value::Number(n) => DynamicValue::Number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => DynamicValue::String(s.clone()),
        serde_json::Value::Array(items) => {
            DynamicValue::Array(items.iter().map(dynamic_from_serde).collect())
        }
        serde_json::Value::Object(entries) => DynamicValue::Object(
            entries.iter().map(|(k, v)| (k.clone(), dynamic_from_serde(v))).collect(),
        ),
    }
}

/// Stringify a dynamic value as JSON text (the engine's JSON.stringify side
/// of the textual path): undefined object entries are dropped, undefined
/// array elements become null, dates render as ISO 8601, non-finite numbers
/// become null.
pub fn stringify_dynamic(value: &DynamicValue) -> String {
    serde_from_dynamic(value).to_string()
}

fn serde_from_dynamic(value: &DynamicValue) -> serde_json::Value {
    use serde_json::Value;
    match value {
        DynamicValue::Undefined | DynamicValue::Null => Value::Null,
        DynamicValue::Boolean(b) => Value::Bool(*b),
        DynamicValue::Int32(v) => Value::from(*v),
        DynamicValue::UInt32(v) => Value::from(*v),
        DynamicValue::BigInt(v) => Value::from(*v),
        DynamicValue::Number(n) => {
            serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null)
        }
        DynamicValue::String(s) => Value::String(s.clone()),
        DynamicValue::Date(ms) => match time_as_8601(*ms) {
            Some(iso) => Value::String(iso),
            None => Value::Null,
        },
        DynamicValue::TypedBuffer(buf) => {
            // Typed arrays stringify as index-keyed objects.
            let text = buf.to_text();
            let mut map = serde_json::Map::new();
            for (i, part) in text.split(',').enumerate() {
                if part.is_empty() {
                    continue;
                }
                let num = part
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null);
                map.insert(i.to_string(), num);
            }
            Value::Object(map)
        }
        DynamicValue::Object(object) => {
            let mut map = serde_json::Map::new();
            for (key, entry) in object.iter() {
                if matches!(entry, DynamicValue::Undefined) {
                    continue;
                }
                map.insert(key.to_string(), serde_from_dynamic(entry));
            }
            Value::Object(map)
        }
        DynamicValue::Array(items) => {
            Value::Array(items.iter().map(serde_from_dynamic).collect())
        }
    }
}
