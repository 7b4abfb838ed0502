//! Array codec.
//!
//! Decode walks a deconstructed array into a dynamic array, recursing
//! through the scalar or row codec per element. The reserved typed-array
//! domains short-circuit both directions: a clean single-dimension array of
//! fixed-width elements moves as one packed buffer, and a typed buffer
//! whose element kind matches the target's element type is sliced straight
//! back into element payloads without re-encoding.

use crate::context::ConversionContext;
use crate::convert::{composite, scalar};
use crate::datum::{ArrayDatum, Datum};
use crate::descriptor::{self, TypeDescriptor};
use crate::error::{BridgeError, BridgeResult};
use crate::oid;
use crate::value::{DynamicValue, TypedBuffer};

pub fn decode(
    ctx: &mut ConversionContext<'_>,
    datum: &Datum,
    desc: &TypeDescriptor,
) -> BridgeResult<DynamicValue> {
    let array = datum.expect_array()?;

    if let Some(kind) = desc.ext_buffer {
        if array.ndim > 1 || array.has_null() {
            return Err(BridgeError::ValueShape(
                "NULL element, or multi-dimension array not allowed in external array type"
                    .to_string(),
            ));
        }
        let packed = array.packed_bytes()?;
        return Ok(DynamicValue::TypedBuffer(TypedBuffer::new(kind, packed)));
    }

    let element_oid = desc.element_oid();
    let element_desc = ctx.resolve(element_oid)?;
    let composite_element = element_desc.is_composite || element_oid == oid::RECORD;
    let mut out = Vec::with_capacity(array.len());
    for element in &array.elements {
        let value = match element {
            None => DynamicValue::Null,
            Some(datum) if composite_element => composite::decode(ctx, datum)?,
            Some(datum) => scalar::decode(ctx, datum, &element_desc)?,
        };
        out.push(value);
    }
    Ok(DynamicValue::Array(out))
}

pub fn encode(
    ctx: &mut ConversionContext<'_>,
    value: &DynamicValue,
    desc: &TypeDescriptor,
) -> BridgeResult<Option<Datum>> {
    if value.is_nullish() {
        return Ok(None);
    }

    if let DynamicValue::TypedBuffer(buffer) = value {
        // Pass-through only when the buffer's element kind matches the
        // target element type; otherwise the shape error below applies.
        let element_oid = match desc.ext_buffer {
            Some(kind) if kind == buffer.kind() => descriptor::element_oid_for_kind(kind),
            Some(_) => None,
            None => desc
                .element
                .filter(|&e| descriptor::kind_for_element_oid(e) == Some(buffer.kind())),
        };
        let Some(element_oid) = element_oid else {
            return Err(BridgeError::ValueShape("value is not an Array".to_string()));
        };
        let size = buffer.kind().elem_size();
        let data = buffer.as_bytes();
        let mut elements = Vec::with_capacity(buffer.len());
        for i in 0..buffer.len() {
            elements.push(Some(Datum::Bytes(data.slice(i * size..(i + 1) * size))));
        }
        return Ok(Some(Datum::Array(ArrayDatum::one_dim(element_oid, elements))));
    }

    let DynamicValue::Array(items) = value else {
        return Err(BridgeError::ValueShape("value is not an Array".to_string()));
    };

    let element_oid = desc.element_oid();
    let element_desc = ctx.resolve(element_oid)?;
    let mut elements = Vec::with_capacity(items.len());
    for item in items {
        elements.push(scalar::encode(ctx, item, &element_desc)?);
    }
    Ok(Some(Datum::Array(ArrayDatum::one_dim(element_oid, elements))))
}
