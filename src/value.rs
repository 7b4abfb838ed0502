//! The dynamic (scripting-engine side) value model.
//!
//! A closed set of runtime kinds: primitives, 64-bit integers, millisecond
//! dates, tagged byte buffers, insertion-ordered objects and arrays. The
//! codecs only read or construct these values; they never retain them.

use bytes::Bytes;

/// A dynamically-typed scripting value.
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicValue {
    Undefined,
    Null,
    Boolean(bool),
    Int32(i32),
    UInt32(u32),
    /// 64-bit signed integer, exact beyond 2^53.
    BigInt(i64),
    Number(f64),
    String(String),
    /// Milliseconds since the Unix epoch. May be NaN (an invalid date).
    Date(f64),
    TypedBuffer(TypedBuffer),
    Object(PlainObject),
    Array(Vec<DynamicValue>),
}

impl DynamicValue {
    /// Both `undefined` and `null` map to SQL NULL; there is no distinct
    /// database-side null.
    pub fn is_nullish(&self) -> bool {
        matches!(self, DynamicValue::Undefined | DynamicValue::Null)
    }

    /// Runtime kind name, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            DynamicValue::Undefined => "Undefined",
            DynamicValue::Null => "Null",
            DynamicValue::Boolean(_) => "Boolean",
            DynamicValue::Int32(_) => "Int32",
            DynamicValue::UInt32(_) => "Uint32",
            DynamicValue::BigInt(_) => "BigInt",
            DynamicValue::Number(_) => "Number",
            DynamicValue::String(_) => "String",
            DynamicValue::Date(_) => "Date",
            DynamicValue::TypedBuffer(_) => "Typed Array",
            DynamicValue::Object(_) => "Object",
            DynamicValue::Array(_) => "Array",
        }
    }

    /// Lexical form of the value, as a scripting engine would stringify it.
    /// This feeds the textual input-function fallback.
    pub fn to_text(&self) -> String {
        match self {
            DynamicValue::Undefined => "undefined".to_string(),
            DynamicValue::Null => "null".to_string(),
            DynamicValue::Boolean(b) => if *b { "true" } else { "false" }.to_string(),
            DynamicValue::Int32(v) => itoa::Buffer::new().format(*v).to_string(),
            DynamicValue::UInt32(v) => itoa::Buffer::new().format(*v).to_string(),
            DynamicValue::BigInt(v) => itoa::Buffer::new().format(*v).to_string(),
            DynamicValue::Number(n) => format_number(*n),
            DynamicValue::String(s) => s.clone(),
            DynamicValue::Date(ms) => crate::convert::json::time_as_8601(*ms)
                .unwrap_or_else(|| "Invalid Date".to_string()),
            DynamicValue::TypedBuffer(buf) => buf.to_text(),
            DynamicValue::Object(_) => "[object Object]".to_string(),
            DynamicValue::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|v| match v {
                        DynamicValue::Undefined | DynamicValue::Null => String::new(),
                        other => other.to_text(),
                    })
                    .collect();
                parts.join(",")
            }
        }
    }
}

/// Number-to-text with integral values printed without a fractional part,
/// the way a scripting engine prints them.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == n.trunc() && n.abs() < 1e15 {
        itoa::Buffer::new().format(n as i64).to_string()
    } else {
        ryu::Buffer::new().format(n).to_string()
    }
}

impl From<bool> for DynamicValue {
    fn from(v: bool) -> Self {
        DynamicValue::Boolean(v)
    }
}

impl From<i32> for DynamicValue {
    fn from(v: i32) -> Self {
        DynamicValue::Int32(v)
    }
}

impl From<i64> for DynamicValue {
    fn from(v: i64) -> Self {
        DynamicValue::BigInt(v)
    }
}

impl From<f64> for DynamicValue {
    fn from(v: f64) -> Self {
        DynamicValue::Number(v)
    }
}

impl From<&str> for DynamicValue {
    fn from(v: &str) -> Self {
        DynamicValue::String(v.to_string())
    }
}

impl From<String> for DynamicValue {
    fn from(v: String) -> Self {
        DynamicValue::String(v)
    }
}

/// Element kind of a [`TypedBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Float32,
    Float64,
    Int64,
}

impl BufferKind {
    /// Size of one element in bytes.
    pub fn elem_size(self) -> usize {
        match self {
            BufferKind::Int8 | BufferKind::UInt8 => 1,
            BufferKind::Int16 | BufferKind::UInt16 => 2,
            BufferKind::Int32 | BufferKind::UInt32 | BufferKind::Float32 => 4,
            BufferKind::Float64 | BufferKind::Int64 => 8,
        }
    }
}

/// A tagged, fixed-element-kind contiguous byte buffer, used for low-copy
/// exchange of binary and array data.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedBuffer {
    kind: BufferKind,
    data: Bytes,
}

impl TypedBuffer {
    pub fn new(kind: BufferKind, data: Bytes) -> Self {
        TypedBuffer { kind, data }
    }

    pub fn kind(&self) -> BufferKind {
        self.kind
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len() / self.kind.elem_size()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Comma-joined element list, matching typed-array stringification.
    /// Element bytes are in the datum packed (network) order.
    pub(crate) fn to_text(&self) -> String {
        let size = self.kind.elem_size();
        let mut parts = Vec::with_capacity(self.len());
        for chunk in self.data.chunks_exact(size) {
            let s = match self.kind {
                BufferKind::Int8 => itoa::Buffer::new().format(chunk[0] as i8).to_string(),
                BufferKind::UInt8 => itoa::Buffer::new().format(chunk[0]).to_string(),
                BufferKind::Int16 => itoa::Buffer::new()
                    .format(i16::from_be_bytes([chunk[0], chunk[1]]))
                    .to_string(),
                BufferKind::UInt16 => itoa::Buffer::new()
                    .format(u16::from_be_bytes([chunk[0], chunk[1]]))
                    .to_string(),
                BufferKind::Int32 => itoa::Buffer::new()
                    .format(i32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .to_string(),
                BufferKind::UInt32 => itoa::Buffer::new()
                    .format(u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .to_string(),
                BufferKind::Float32 => {
                    let v = f32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                    format_number(v as f64)
                }
                BufferKind::Float64 => {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(chunk);
                    format_number(f64::from_be_bytes(b))
                }
                BufferKind::Int64 => {
                    let mut b = [0u8; 8];
                    b.copy_from_slice(chunk);
                    itoa::Buffer::new().format(i64::from_be_bytes(b)).to_string()
                }
            };
            parts.push(s);
        }
        parts.join(",")
    }
}

/// An insertion-ordered string-keyed map. Key order is load-bearing: both
/// the row codec and the JSON walker preserve it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlainObject {
    entries: Vec<(String, DynamicValue)>,
}

impl PlainObject {
    pub fn new() -> Self {
        PlainObject::default()
    }

    /// Insert a key, replacing the value in place if the key exists.
    pub fn insert(&mut self, key: impl Into<String>, value: DynamicValue) {
        let key = key.into();
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            entry.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DynamicValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl<K: Into<String>> FromIterator<(K, DynamicValue)> for PlainObject {
    fn from_iter<T: IntoIterator<Item = (K, DynamicValue)>>(iter: T) -> Self {
        let mut obj = PlainObject::new();
        for (k, v) in iter {
            obj.insert(k, v);
        }
        obj
    }
}
