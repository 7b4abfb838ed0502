//! In-memory type catalog seeded with the builtin types.
//!
//! Models the slice of pg_type the bridge cares about: builtin scalars and
//! their array types, plus registration hooks for composite types, domains,
//! and the reserved typed-array domains. Also supplies the textual
//! input/output conversion functions, which are the universal escape hatch
//! for kind-mismatched encodes and unknown-type decodes.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};

use crate::catalog::{
    Attribute, InputFn, OutputFn, TupleDescriptor, TypeAlign, TypeCatalog, TypeCategory,
    TypeLayout,
};
use crate::convert::json;
use crate::datum::Datum;
use crate::descriptor::reserved_domain_name;
use crate::encoding::{self, ServerEncoding};
use crate::error::{BridgeError, BridgeResult};
use crate::oid::{self, Oid};
use crate::value::BufferKind;

#[derive(Debug, Clone)]
struct TypeEntry {
    name: String,
    category: TypeCategory,
    preferred: bool,
    layout: TypeLayout,
    element: Option<Oid>,
    is_domain: bool,
    domain_base: Option<Oid>,
}

/// An in-memory [`TypeCatalog`].
pub struct BuiltinCatalog {
    types: HashMap<Oid, TypeEntry>,
    tupdescs: HashMap<Oid, Arc<TupleDescriptor>>,
    encoding: ServerEncoding,
    integer_datetimes: bool,
}

impl Default for BuiltinCatalog {
    fn default() -> Self {
        BuiltinCatalog::new()
    }
}

impl BuiltinCatalog {
    /// A catalog pre-seeded with the builtin scalar and array types, UTF-8
    /// server encoding and integer timestamps.
    pub fn new() -> BuiltinCatalog {
        let mut catalog = BuiltinCatalog {
            types: HashMap::new(),
            tupdescs: HashMap::new(),
            encoding: ServerEncoding::Utf8,
            integer_datetimes: true,
        };
        catalog.seed_builtins();
        catalog
    }

    pub fn with_encoding(mut self, encoding: ServerEncoding) -> BuiltinCatalog {
        self.encoding = encoding;
        self
    }

    /// Switch the host timestamp unit to float seconds (pre-integer-datetimes
    /// servers).
    pub fn with_float_datetimes(mut self) -> BuiltinCatalog {
        self.integer_datetimes = false;
        self
    }

    /// Register a composite (row) type with its ordered attribute list.
    pub fn register_composite(&mut self, type_oid: Oid, name: &str, attrs: Vec<Attribute>) {
        self.types.insert(
            type_oid,
            TypeEntry {
                name: name.to_string(),
                category: TypeCategory::Composite,
                preferred: false,
                layout: TypeLayout::variable(),
                element: None,
                is_domain: false,
                domain_base: None,
            },
        );
        self.tupdescs
            .insert(type_oid, Arc::new(TupleDescriptor { type_oid, typmod: -1, attrs }));
    }

    /// Register an array type over an existing element type.
    pub fn register_array(&mut self, array_oid: Oid, name: &str, element_oid: Oid) {
        self.types.insert(
            array_oid,
            TypeEntry {
                name: name.to_string(),
                category: TypeCategory::Array,
                preferred: false,
                layout: TypeLayout::variable(),
                element: Some(element_oid),
                is_domain: false,
                domain_base: None,
            },
        );
    }

    /// Register a plain domain over a base type. The domain reports its
    /// base's category and layout and shares its conversion functions.
    pub fn register_domain(&mut self, domain_oid: Oid, name: &str, base_oid: Oid) {
        let base = self.types.get(&base_oid).cloned();
        let (category, layout, element) = match base {
            Some(b) => (b.category, b.layout, b.element),
            None => (TypeCategory::UserDefined, TypeLayout::variable(), None),
        };
        self.types.insert(
            domain_oid,
            TypeEntry {
                name: name.to_string(),
                category,
                preferred: false,
                layout,
                element,
                is_domain: true,
                domain_base: Some(base_oid),
            },
        );
    }

    /// Register one of the reserved typed-array domains. The domain sits
    /// over the matching builtin array type and carries the reserved name
    /// the descriptor resolver recognizes.
    pub fn register_typed_array_domain(&mut self, domain_oid: Oid, kind: BufferKind) -> BridgeResult<()> {
        let name = reserved_domain_name(kind).ok_or_else(|| {
            BridgeError::TypeResolution(format!("no reserved domain for buffer kind {kind:?}"))
        })?;
        let base = match kind {
            BufferKind::Int16 => oid::INT2_ARRAY,
            BufferKind::Int32 => oid::INT4_ARRAY,
            BufferKind::Float32 => oid::FLOAT4_ARRAY,
            BufferKind::Float64 => oid::FLOAT8_ARRAY,
            BufferKind::Int64 => oid::INT8_ARRAY,
            _ => unreachable!("reserved_domain_name covers the same kinds"),
        };
        self.register_domain(domain_oid, name, base);
        Ok(())
    }

    fn entry(&self, oid: Oid) -> BridgeResult<&TypeEntry> {
        self.types
            .get(&oid)
            .ok_or_else(|| BridgeError::TypeResolution(format!("cache lookup failed for type {oid}")))
    }

    /// Follow a domain to the builtin type whose conversion functions apply.
    /// The chain is bounded so a mis-registered domain cycle fails instead
    /// of spinning.
    fn io_target(&self, oid: Oid) -> BridgeResult<Oid> {
        let mut current = oid;
        let mut seen = Vec::new();
        loop {
            let entry = self.entry(current)?;
            match entry.domain_base {
                Some(base) if entry.is_domain => {
                    if seen.contains(&current) {
                        return Err(BridgeError::TypeResolution(format!(
                            "domain chain for type {oid} contains a cycle"
                        )));
                    }
                    seen.push(current);
                    current = base;
                }
                _ => return Ok(current),
            }
        }
    }

    fn seed_builtins(&mut self) {
        use TypeAlign::*;
        use TypeCategory::*;

        let scalars: &[(Oid, &str, TypeCategory, bool, TypeLayout)] = &[
            (oid::BOOL, "bool", Boolean, true, TypeLayout::fixed(1, Char)),
            (oid::BYTEA, "bytea", UserDefined, false, TypeLayout::variable()),
            (oid::INT8, "int8", Numeric, false, TypeLayout::fixed(8, Double)),
            (oid::INT2, "int2", Numeric, false, TypeLayout::fixed(2, Short)),
            (oid::INT4, "int4", Numeric, false, TypeLayout::fixed(4, Int)),
            (oid::TEXT, "text", String, true, TypeLayout::variable()),
            (oid::OID, "oid", Numeric, false, TypeLayout::fixed(4, Int)),
            (oid::JSON, "json", UserDefined, false, TypeLayout::variable()),
            (oid::XML, "xml", UserDefined, false, TypeLayout::variable()),
            (oid::FLOAT4, "float4", Numeric, false, TypeLayout::fixed(4, Int)),
            (oid::FLOAT8, "float8", Numeric, true, TypeLayout::fixed(8, Double)),
            (oid::UNKNOWN, "unknown", Unknown, false, TypeLayout::variable()),
            (oid::BPCHAR, "bpchar", String, false, TypeLayout::variable()),
            (oid::VARCHAR, "varchar", String, false, TypeLayout::variable()),
            (oid::DATE, "date", DateTime, false, TypeLayout::fixed(4, Int)),
            (oid::TIMESTAMP, "timestamp", DateTime, false, TypeLayout::fixed(8, Double)),
            (oid::TIMESTAMPTZ, "timestamptz", DateTime, true, TypeLayout::fixed(8, Double)),
            (oid::NUMERIC, "numeric", Numeric, false, TypeLayout::variable()),
            (oid::RECORD, "record", Pseudo, false, TypeLayout::variable()),
            (oid::JSONB, "jsonb", UserDefined, false, TypeLayout::variable()),
        ];
        for &(type_oid, name, category, preferred, layout) in scalars {
            self.types.insert(
                type_oid,
                TypeEntry {
                    name: name.to_string(),
                    category,
                    preferred,
                    layout,
                    element: None,
                    is_domain: false,
                    domain_base: None,
                },
            );
        }

        let arrays: &[(Oid, &str, Oid)] = &[
            (oid::BOOL_ARRAY, "_bool", oid::BOOL),
            (oid::BYTEA_ARRAY, "_bytea", oid::BYTEA),
            (oid::INT2_ARRAY, "_int2", oid::INT2),
            (oid::INT4_ARRAY, "_int4", oid::INT4),
            (oid::TEXT_ARRAY, "_text", oid::TEXT),
            (oid::BPCHAR_ARRAY, "_bpchar", oid::BPCHAR),
            (oid::VARCHAR_ARRAY, "_varchar", oid::VARCHAR),
            (oid::INT8_ARRAY, "_int8", oid::INT8),
            (oid::FLOAT4_ARRAY, "_float4", oid::FLOAT4),
            (oid::FLOAT8_ARRAY, "_float8", oid::FLOAT8),
            (oid::OID_ARRAY, "_oid", oid::OID),
            (oid::XML_ARRAY, "_xml", oid::XML),
            (oid::JSON_ARRAY, "_json", oid::JSON),
            (oid::DATE_ARRAY, "_date", oid::DATE),
            (oid::TIMESTAMP_ARRAY, "_timestamp", oid::TIMESTAMP),
            (oid::TIMESTAMPTZ_ARRAY, "_timestamptz", oid::TIMESTAMPTZ),
            (oid::NUMERIC_ARRAY, "_numeric", oid::NUMERIC),
            (oid::JSONB_ARRAY, "_jsonb", oid::JSONB),
        ];
        for &(array_oid, name, element_oid) in arrays {
            self.register_array(array_oid, name, element_oid);
        }

        // The record-array type is category pseudo, like record itself; the
        // dispatch layer routes it by OID.
        self.types.insert(
            oid::RECORD_ARRAY,
            TypeEntry {
                name: "_record".to_string(),
                category: TypeCategory::Pseudo,
                preferred: false,
                layout: TypeLayout::variable(),
                element: Some(oid::RECORD),
                is_domain: false,
                domain_base: None,
            },
        );
    }
}

impl TypeCatalog for BuiltinCatalog {
    fn type_category(&self, oid: Oid) -> BridgeResult<(TypeCategory, bool)> {
        let entry = self.entry(oid)?;
        Ok((entry.category, entry.preferred))
    }

    fn type_layout(&self, oid: Oid) -> BridgeResult<TypeLayout> {
        Ok(self.entry(oid)?.layout)
    }

    fn type_name(&self, oid: Oid) -> BridgeResult<String> {
        Ok(self.entry(oid)?.name.clone())
    }

    fn is_domain(&self, oid: Oid) -> bool {
        self.types.get(&oid).map(|e| e.is_domain).unwrap_or(false)
    }

    fn element_type(&self, oid: Oid) -> Option<Oid> {
        self.types.get(&oid).and_then(|e| e.element)
    }

    fn tuple_descriptor(&self, type_oid: Oid, _typmod: i32) -> BridgeResult<Arc<TupleDescriptor>> {
        self.tupdescs.get(&type_oid).cloned().ok_or_else(|| {
            BridgeError::TypeResolution(format!("no tuple descriptor for type {type_oid}"))
        })
    }

    fn input_function(&self, type_oid: Oid) -> BridgeResult<InputFn> {
        let target = self.io_target(type_oid)?;
        let encoding = self.encoding;
        let integer_datetimes = self.integer_datetimes;
        let func: InputFn = match target {
            oid::BOOL => Arc::new(|text| bool_in(text)),
            oid::INT2 => Arc::new(|text| int2_in(text)),
            oid::INT4 => Arc::new(|text| int4_in(text)),
            oid::INT8 => Arc::new(|text| int8_in(text)),
            oid::OID => Arc::new(|text| oid_in(text)),
            oid::FLOAT4 => Arc::new(|text| float4_in(text)),
            oid::FLOAT8 => Arc::new(|text| float8_in(text)),
            oid::NUMERIC => Arc::new(|text| numeric_in(text)),
            oid::DATE => Arc::new(|text| date_in(text)),
            oid::TIMESTAMP | oid::TIMESTAMPTZ => {
                Arc::new(move |text| timestamp_in(text, integer_datetimes))
            }
            oid::BYTEA => Arc::new(|text| bytea_in(text)),
            oid::JSON => Arc::new(move |text| json_in(text, encoding)),
            oid::JSONB => Arc::new(|text| jsonb_in(text)),
            oid::TEXT | oid::VARCHAR | oid::BPCHAR | oid::XML | oid::UNKNOWN => {
                Arc::new(move |text| text_in(text, encoding))
            }
            other => {
                return Err(BridgeError::TypeResolution(format!(
                    "no input function for type {other}"
                )));
            }
        };
        Ok(func)
    }

    fn output_function(&self, type_oid: Oid) -> BridgeResult<OutputFn> {
        let target = self.io_target(type_oid)?;
        let encoding = self.encoding;
        let integer_datetimes = self.integer_datetimes;
        let func: OutputFn = match target {
            oid::BOOL => Arc::new(|datum| bool_out(datum)),
            oid::INT2 => Arc::new(|datum| int2_out(datum)),
            oid::INT4 => Arc::new(|datum| int4_out(datum)),
            oid::INT8 => Arc::new(|datum| int8_out(datum)),
            oid::OID => Arc::new(|datum| oid_out(datum)),
            oid::FLOAT4 => Arc::new(|datum| float4_out(datum)),
            oid::FLOAT8 => Arc::new(|datum| float8_out(datum)),
            oid::NUMERIC => Arc::new(|datum| numeric_out(datum)),
            oid::DATE => Arc::new(|datum| date_out(datum)),
            oid::TIMESTAMP | oid::TIMESTAMPTZ => {
                Arc::new(move |datum| timestamp_out(datum, integer_datetimes))
            }
            oid::BYTEA => Arc::new(|datum| bytea_out(datum)),
            oid::JSONB => Arc::new(|datum| jsonb_out(datum)),
            oid::TEXT | oid::VARCHAR | oid::BPCHAR | oid::XML | oid::UNKNOWN | oid::JSON => {
                Arc::new(move |datum| text_out(datum, encoding))
            }
            other => {
                return Err(BridgeError::TypeResolution(format!(
                    "no output function for type {other}"
                )));
            }
        };
        Ok(func)
    }

    fn server_encoding(&self) -> ServerEncoding {
        self.encoding
    }

    fn integer_datetimes(&self) -> bool {
        self.integer_datetimes
    }
}

// Textual conversion functions. Error strings mirror the server's messages;
// they surface unchanged through DatumConversion.

fn bool_in(text: &str) -> Result<Datum, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "y" | "yes" | "on" | "1" => Ok(Datum::bool(true)),
        "f" | "false" | "n" | "no" | "off" | "0" => Ok(Datum::bool(false)),
        other => Err(format!("invalid input syntax for type boolean: \"{other}\"")),
    }
}

fn bool_out(datum: &Datum) -> Result<String, String> {
    let bytes = datum.expect_bytes().map_err(|e| e.to_string())?;
    Ok(if bytes.first().copied().unwrap_or(0) != 0 { "t" } else { "f" }.to_string())
}

fn int2_in(text: &str) -> Result<Datum, String> {
    text.trim()
        .parse::<i16>()
        .map(Datum::int2)
        .map_err(|_| format!("invalid input syntax for type smallint: \"{text}\""))
}

fn int4_in(text: &str) -> Result<Datum, String> {
    text.trim()
        .parse::<i32>()
        .map(Datum::int4)
        .map_err(|_| format!("invalid input syntax for type integer: \"{text}\""))
}

fn int8_in(text: &str) -> Result<Datum, String> {
    text.trim()
        .parse::<i64>()
        .map(Datum::int8)
        .map_err(|_| format!("invalid input syntax for type bigint: \"{text}\""))
}

fn oid_in(text: &str) -> Result<Datum, String> {
    text.trim()
        .parse::<u32>()
        .map(Datum::oid)
        .map_err(|_| format!("invalid input syntax for type oid: \"{text}\""))
}

fn float4_in(text: &str) -> Result<Datum, String> {
    text.trim()
        .parse::<f32>()
        .map(Datum::float4)
        .map_err(|_| format!("invalid input syntax for type real: \"{text}\""))
}

fn float8_in(text: &str) -> Result<Datum, String> {
    text.trim()
        .parse::<f64>()
        .map(Datum::float8)
        .map_err(|_| format!("invalid input syntax for type double precision: \"{text}\""))
}

fn numeric_in(text: &str) -> Result<Datum, String> {
    let trimmed = text.trim();
    if trimmed.parse::<f64>().is_err() {
        return Err(format!("invalid input syntax for type numeric: \"{text}\""));
    }
    // The canonical payload is the decimal text itself; precision survives.
    Ok(Datum::bytes(trimmed.as_bytes().to_vec()))
}

fn numeric_out(datum: &Datum) -> Result<String, String> {
    let bytes = datum.expect_bytes().map_err(|e| e.to_string())?;
    std::str::from_utf8(bytes)
        .map(|s| s.to_string())
        .map_err(|_| "corrupt numeric payload".to_string())
}

fn int_out<T: itoa::Integer>(v: T) -> String {
    itoa::Buffer::new().format(v).to_string()
}

fn int2_out(datum: &Datum) -> Result<String, String> {
    read_fixed::<2>(datum).map(|b| int_out(i16::from_be_bytes(b)))
}

fn int4_out(datum: &Datum) -> Result<String, String> {
    read_fixed::<4>(datum).map(|b| int_out(i32::from_be_bytes(b)))
}

fn int8_out(datum: &Datum) -> Result<String, String> {
    read_fixed::<8>(datum).map(|b| int_out(i64::from_be_bytes(b)))
}

fn oid_out(datum: &Datum) -> Result<String, String> {
    read_fixed::<4>(datum).map(|b| int_out(u32::from_be_bytes(b)))
}

fn float4_out(datum: &Datum) -> Result<String, String> {
    read_fixed::<4>(datum).map(|b| crate::value::format_number(f32::from_be_bytes(b) as f64))
}

fn float8_out(datum: &Datum) -> Result<String, String> {
    read_fixed::<8>(datum).map(|b| crate::value::format_number(f64::from_be_bytes(b)))
}

fn read_fixed<const N: usize>(datum: &Datum) -> Result<[u8; N], String> {
    let bytes = datum.expect_bytes().map_err(|e| e.to_string())?;
    if bytes.len() != N {
        return Err(format!("expected {N} bytes, got {}", bytes.len()));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    Ok(out)
}

fn pg_epoch_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap()
}

fn date_in(text: &str) -> Result<Datum, String> {
    let date = NaiveDate::parse_from_str(text.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid input syntax for type date: \"{text}\""))?;
    let days = (date - pg_epoch_date()).num_days();
    i32::try_from(days)
        .map(Datum::int4)
        .map_err(|_| "date out of range".to_string())
}

fn date_out(datum: &Datum) -> Result<String, String> {
    let days = i32::from_be_bytes(read_fixed::<4>(datum)?);
    let date = pg_epoch_date()
        .checked_add_signed(Duration::days(days as i64))
        .ok_or_else(|| "date out of range".to_string())?;
    Ok(date.format("%Y-%m-%d").to_string())
}

fn parse_timestamp_text(text: &str) -> Result<NaiveDateTime, String> {
    let trimmed = text
        .trim()
        .trim_end_matches('Z')
        .trim_end_matches("+00:00")
        .trim_end_matches("+00");
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(ts);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(ts) = date.and_hms_opt(0, 0, 0) {
            return Ok(ts);
        }
    }
    Err(format!("invalid input syntax for type timestamp: \"{text}\""))
}

fn timestamp_in(text: &str, integer_datetimes: bool) -> Result<Datum, String> {
    let ts = parse_timestamp_text(text)?;
    let pg_epoch = pg_epoch_date().and_hms_opt(0, 0, 0).unwrap();
    let delta = ts - pg_epoch;
    let usec = delta.num_microseconds().ok_or_else(|| "timestamp out of range".to_string())?;
    if integer_datetimes {
        Ok(Datum::int8(usec))
    } else {
        Ok(Datum::float8(usec as f64 / 1_000_000.0))
    }
}

fn timestamp_out(datum: &Datum, integer_datetimes: bool) -> Result<String, String> {
    let usec = if integer_datetimes {
        i64::from_be_bytes(read_fixed::<8>(datum)?)
    } else {
        (f64::from_be_bytes(read_fixed::<8>(datum)?) * 1_000_000.0) as i64
    };
    let pg_epoch = pg_epoch_date().and_hms_opt(0, 0, 0).unwrap();
    let ts = pg_epoch
        .checked_add_signed(Duration::microseconds(usec))
        .ok_or_else(|| "timestamp out of range".to_string())?;
    Ok(ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string())
}

fn bytea_in(text: &str) -> Result<Datum, String> {
    let trimmed = text.trim();
    if let Some(hex) = trimmed.strip_prefix("\\x") {
        if hex.len() % 2 != 0 {
            return Err("invalid hexadecimal data: odd number of digits".to_string());
        }
        let mut out = Vec::with_capacity(hex.len() / 2);
        let digits = hex.as_bytes();
        for pair in digits.chunks_exact(2) {
            let hi = hex_digit(pair[0])?;
            let lo = hex_digit(pair[1])?;
            out.push(hi << 4 | lo);
        }
        Ok(Datum::bytes(out))
    } else {
        Ok(Datum::bytes(trimmed.as_bytes().to_vec()))
    }
}

fn hex_digit(b: u8) -> Result<u8, String> {
    match b {
        b'0'..=b'9' => Ok(b - b'0'),
        b'a'..=b'f' => Ok(b - b'a' + 10),
        b'A'..=b'F' => Ok(b - b'A' + 10),
        _ => Err(format!("invalid hexadecimal digit: \"{}\"", b as char)),
    }
}

fn bytea_out(datum: &Datum) -> Result<String, String> {
    let bytes = datum.expect_bytes().map_err(|e| e.to_string())?;
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes.iter() {
        out.push_str(&format!("{b:02x}"));
    }
    Ok(out)
}

fn text_in(text: &str, server_encoding: ServerEncoding) -> Result<Datum, String> {
    encoding::encode_text(text, server_encoding)
        .map(Datum::Bytes)
        .map_err(|e| e.to_string())
}

fn text_out(datum: &Datum, server_encoding: ServerEncoding) -> Result<String, String> {
    let bytes = datum.expect_bytes().map_err(|e| e.to_string())?;
    encoding::decode_text(bytes, server_encoding).map_err(|e| e.to_string())
}

fn json_in(text: &str, server_encoding: ServerEncoding) -> Result<Datum, String> {
    serde_json::from_str::<serde_json::Value>(text)
        .map_err(|e| format!("invalid input syntax for type json: {e}"))?;
    text_in(text, server_encoding)
}

fn jsonb_in(text: &str) -> Result<Datum, String> {
    json::jsonb_from_json_text(text)
        .map(Datum::Jsonb)
        .map_err(|e| format!("invalid input syntax for type json: {e}"))
}

fn jsonb_out(datum: &Datum) -> Result<String, String> {
    let tree = datum.expect_jsonb().map_err(|e| e.to_string())?;
    Ok(json::jsonb_to_json_text(tree))
}
