//! The host (database side) value model.
//!
//! Scalars are binary payloads in network byte order, as they travel on the
//! wire. Arrays arrive deconstructed (the host's array primitives yield a
//! flat element/null list with dimension info), composites arrive as tuples
//! carrying their own type identity, and `jsonb` arrives as the native tree.

use bytes::Bytes;

use crate::error::{BridgeError, BridgeResult};
use crate::oid::Oid;

/// A database value tagged by its type descriptor.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// Scalar binary payload, network byte order. Text-like types carry raw
    /// bytes in the server encoding; `numeric` carries its canonical decimal
    /// text.
    Bytes(Bytes),
    /// Deconstructed array value.
    Array(ArrayDatum),
    /// Composite (row) value.
    Row(RowDatum),
    /// Native jsonb tree.
    Jsonb(JsonbValue),
}

impl Datum {
    pub fn bool(v: bool) -> Datum {
        Datum::Bytes(Bytes::from(vec![v as u8]))
    }

    pub fn int2(v: i16) -> Datum {
        Datum::Bytes(Bytes::copy_from_slice(&v.to_be_bytes()))
    }

    pub fn int4(v: i32) -> Datum {
        Datum::Bytes(Bytes::copy_from_slice(&v.to_be_bytes()))
    }

    pub fn int8(v: i64) -> Datum {
        Datum::Bytes(Bytes::copy_from_slice(&v.to_be_bytes()))
    }

    pub fn oid(v: u32) -> Datum {
        Datum::Bytes(Bytes::copy_from_slice(&v.to_be_bytes()))
    }

    pub fn float4(v: f32) -> Datum {
        Datum::Bytes(Bytes::copy_from_slice(&v.to_be_bytes()))
    }

    pub fn float8(v: f64) -> Datum {
        Datum::Bytes(Bytes::copy_from_slice(&v.to_be_bytes()))
    }

    /// Raw byte payload (text in server encoding, bytea, numeric text).
    pub fn bytes(data: impl Into<Bytes>) -> Datum {
        Datum::Bytes(data.into())
    }

    /// The scalar payload, or an error if this datum is not a scalar.
    pub fn expect_bytes(&self) -> BridgeResult<&Bytes> {
        match self {
            Datum::Bytes(b) => Ok(b),
            other => Err(BridgeError::DatumConversion(format!(
                "expected scalar payload, got {}",
                other.variant_name()
            ))),
        }
    }

    pub fn expect_array(&self) -> BridgeResult<&ArrayDatum> {
        match self {
            Datum::Array(a) => Ok(a),
            other => Err(BridgeError::DatumConversion(format!(
                "expected array datum, got {}",
                other.variant_name()
            ))),
        }
    }

    pub fn expect_row(&self) -> BridgeResult<&RowDatum> {
        match self {
            Datum::Row(r) => Ok(r),
            other => Err(BridgeError::DatumConversion(format!(
                "expected row datum, got {}",
                other.variant_name()
            ))),
        }
    }

    pub fn expect_jsonb(&self) -> BridgeResult<&JsonbValue> {
        match self {
            Datum::Jsonb(j) => Ok(j),
            other => Err(BridgeError::DatumConversion(format!(
                "expected jsonb datum, got {}",
                other.variant_name()
            ))),
        }
    }

    fn variant_name(&self) -> &'static str {
        match self {
            Datum::Bytes(_) => "scalar",
            Datum::Array(_) => "array",
            Datum::Row(_) => "row",
            Datum::Jsonb(_) => "jsonb",
        }
    }
}

/// A deconstructed array: flat element list plus dimension count. `None`
/// elements are SQL NULLs.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDatum {
    pub element_oid: Oid,
    pub ndim: u32,
    pub elements: Vec<Option<Datum>>,
}

impl ArrayDatum {
    /// Single-dimension array with lower bound 1.
    pub fn one_dim(element_oid: Oid, elements: Vec<Option<Datum>>) -> ArrayDatum {
        ArrayDatum { element_oid, ndim: 1, elements }
    }

    pub fn has_null(&self) -> bool {
        self.elements.iter().any(|e| e.is_none())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Packed bytes of all elements in order, as stored in the array's data
    /// area. Fails if any element is NULL or not a scalar.
    pub fn packed_bytes(&self) -> BridgeResult<Bytes> {
        let mut out = Vec::new();
        for elem in &self.elements {
            let datum = elem.as_ref().ok_or_else(|| {
                BridgeError::DatumConversion("NULL element in packed array".to_string())
            })?;
            out.extend_from_slice(datum.expect_bytes()?);
        }
        Ok(Bytes::from(out))
    }
}

/// A composite value: tuple with embedded type identity, one optional datum
/// per attribute in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct RowDatum {
    pub type_oid: Oid,
    pub typmod: i32,
    pub fields: Vec<Option<Datum>>,
}

/// Node of the native jsonb tree. Numbers keep their decimal text so no
/// precision is lost inside the database representation.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonbValue {
    Null,
    Bool(bool),
    Numeric(String),
    String(String),
    Array(Vec<JsonbValue>),
    Object(Vec<(String, JsonbValue)>),
}

impl JsonbValue {
    pub fn is_scalar(&self) -> bool {
        !matches!(self, JsonbValue::Array(_) | JsonbValue::Object(_))
    }
}
