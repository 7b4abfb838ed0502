//! Composite (row) codec.
//!
//! A row datum carries its own type identity, so decode resolves the tuple
//! descriptor from the value rather than from the declared type; anonymous
//! record values work the same as named composites. Encode walks the target
//! type's attribute list and pulls fields from the object by name, so extra
//! object keys are ignored and absent attributes become SQL NULL.

use crate::context::ConversionContext;
use crate::convert;
use crate::datum::{Datum, RowDatum};
use crate::descriptor::TypeDescriptor;
use crate::error::{BridgeError, BridgeResult};
use crate::value::{DynamicValue, PlainObject};

pub fn decode(ctx: &mut ConversionContext<'_>, datum: &Datum) -> BridgeResult<DynamicValue> {
    let row = datum.expect_row()?;
    let tupdesc = ctx.tuple_descriptor(row.type_oid, row.typmod)?;
    if row.fields.len() != tupdesc.attrs.len() {
        return Err(BridgeError::DatumConversion(format!(
            "row has {} fields but type {} has {} attributes",
            row.fields.len(),
            row.type_oid,
            tupdesc.attrs.len()
        )));
    }
    let mut object = PlainObject::new();
    for (attr, field) in tupdesc.attrs.iter().zip(&row.fields) {
        if attr.dropped {
            continue;
        }
        let value = convert::to_dynamic(ctx, field.as_ref(), attr.type_oid)?;
        object.insert(attr.name.clone(), value);
    }
    Ok(DynamicValue::Object(object))
}

pub fn encode(
    ctx: &mut ConversionContext<'_>,
    value: &DynamicValue,
    desc: &TypeDescriptor,
) -> BridgeResult<Option<Datum>> {
    if value.is_nullish() {
        return Ok(None);
    }
    let DynamicValue::Object(object) = value else {
        return Err(BridgeError::ValueShape("value is not an Object".to_string()));
    };
    let tupdesc = ctx.tuple_descriptor(desc.type_oid, -1)?;
    let mut fields = Vec::with_capacity(tupdesc.attrs.len());
    for attr in &tupdesc.attrs {
        if attr.dropped {
            fields.push(None);
            continue;
        }
        let field = match object.get(&attr.name) {
            Some(entry) => convert::to_datum(ctx, entry, attr.type_oid)?,
            None => None,
        };
        fields.push(field);
    }
    Ok(Some(Datum::Row(RowDatum {
        type_oid: tupdesc.type_oid,
        typmod: tupdesc.typmod,
        fields,
    })))
}
