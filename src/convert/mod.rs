//! Conversion entry points.
//!
//! Dispatch is by type category: array-category types (and the record-array
//! pseudo-type, which is category pseudo) go to the array codec, composite
//! types and anonymous records to the row codec, everything else to the
//! scalar codec. The scalar codec routes composite targets itself so that
//! the composite check happens before the null check, in both directions.

pub mod array;
pub mod composite;
pub mod json;
pub mod scalar;

use crate::catalog::TypeCategory;
use crate::context::ConversionContext;
use crate::datum::Datum;
use crate::error::BridgeResult;
use crate::oid::{self, Oid};
use crate::value::DynamicValue;

/// Decode a datum of the given type into a dynamic value. `None` is SQL
/// NULL and decodes to `null`.
pub fn to_dynamic(
    ctx: &mut ConversionContext<'_>,
    datum: Option<&Datum>,
    type_oid: Oid,
) -> BridgeResult<DynamicValue> {
    let Some(datum) = datum else {
        return Ok(DynamicValue::Null);
    };
    let desc = ctx.resolve(type_oid)?;
    if desc.category == TypeCategory::Array || desc.type_oid == oid::RECORD_ARRAY {
        array::decode(ctx, datum, &desc)
    } else if desc.is_composite || desc.type_oid == oid::RECORD {
        composite::decode(ctx, datum)
    } else {
        scalar::decode(ctx, datum, &desc)
    }
}

/// Encode a dynamic value as a datum of the given type. `Ok(None)` is SQL
/// NULL; `undefined` and `null` both produce it.
pub fn to_datum(
    ctx: &mut ConversionContext<'_>,
    value: &DynamicValue,
    type_oid: Oid,
) -> BridgeResult<Option<Datum>> {
    let desc = ctx.resolve(type_oid)?;
    if desc.category == TypeCategory::Array {
        array::encode(ctx, value, &desc)
    } else {
        scalar::encode(ctx, value, &desc)
    }
}

/// The type a value suggests for itself when no target type is declared,
/// for deferred parameter typing. Container values have no inferred type;
/// they need a declared target.
pub fn inferred_oid(value: &DynamicValue) -> Option<Oid> {
    match value {
        DynamicValue::Undefined | DynamicValue::Null | DynamicValue::String(_) => Some(oid::TEXT),
        DynamicValue::Boolean(_) => Some(oid::BOOL),
        DynamicValue::Int32(_) => Some(oid::INT4),
        DynamicValue::UInt32(_) | DynamicValue::BigInt(_) => Some(oid::INT8),
        DynamicValue::Number(_) => Some(oid::FLOAT8),
        DynamicValue::Date(_) => Some(oid::TIMESTAMP),
        DynamicValue::TypedBuffer(_) | DynamicValue::Object(_) | DynamicValue::Array(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BuiltinCatalog;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_sql_null_decodes_to_null() {
        let catalog = BuiltinCatalog::new();
        let mut ctx = ConversionContext::new(&catalog);
        assert_eq!(to_dynamic(&mut ctx, None, oid::INT4).unwrap(), DynamicValue::Null);
    }

    #[test]
    fn test_dispatch_scalar_and_array() {
        let catalog = BuiltinCatalog::new();
        let mut ctx = ConversionContext::new(&catalog);
        let scalar = to_dynamic(&mut ctx, Some(&Datum::int4(5)), oid::INT4).unwrap();
        assert_eq!(scalar, DynamicValue::Int32(5));
        let arr = Datum::Array(crate::datum::ArrayDatum::one_dim(
            oid::INT4,
            vec![Some(Datum::int4(5))],
        ));
        let decoded = to_dynamic(&mut ctx, Some(&arr), oid::INT4_ARRAY).unwrap();
        assert_eq!(decoded, DynamicValue::Array(vec![DynamicValue::Int32(5)]));
    }

    #[test]
    fn test_inferred_oids() {
        assert_eq!(inferred_oid(&DynamicValue::Null), Some(oid::TEXT));
        assert_eq!(inferred_oid(&DynamicValue::Boolean(true)), Some(oid::BOOL));
        assert_eq!(inferred_oid(&DynamicValue::Int32(1)), Some(oid::INT4));
        assert_eq!(inferred_oid(&DynamicValue::BigInt(1)), Some(oid::INT8));
        assert_eq!(inferred_oid(&DynamicValue::Number(1.5)), Some(oid::FLOAT8));
        assert_eq!(inferred_oid(&DynamicValue::Date(0.0)), Some(oid::TIMESTAMP));
        assert_eq!(inferred_oid(&DynamicValue::Array(vec![])), None);
    }
}
