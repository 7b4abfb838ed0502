//! Scalar codec: binary payloads to dynamic values and back.
//!
//! Both directions dispatch on the type OID. Decode reads the network-order
//! payload directly for the types it knows and falls back to the type's
//! textual output function for everything else. Encode matches on the
//! (OID, value-kind) pair; any combination without a dedicated arm falls
//! through to the lexical cast at the bottom, which stringifies the value
//! and runs it through the type's input function. That fallthrough is what
//! makes the layer permissive: a string assigned to an integer column either
//! parses or fails with the database's own message.

use crate::context::ConversionContext;
use crate::convert::{composite, json};
use crate::datum::Datum;
use crate::descriptor::TypeDescriptor;
use crate::error::{BridgeError, BridgeResult};
use crate::oid;
use crate::value::{BufferKind, DynamicValue, TypedBuffer, format_number};

/// Milliseconds between the Unix epoch and the database epoch (2000-01-01).
pub(crate) const EPOCH_OFFSET_MS: f64 = 946_684_800_000.0;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Decode a scalar datum of a known non-array, non-composite type.
pub fn decode(
    ctx: &mut ConversionContext<'_>,
    datum: &Datum,
    desc: &TypeDescriptor,
) -> BridgeResult<DynamicValue> {
    match desc.type_oid {
        oid::OID => Ok(DynamicValue::UInt32(read_u32(datum)?)),
        oid::BOOL => Ok(DynamicValue::Boolean(read_bool(datum)?)),
        oid::INT2 => Ok(DynamicValue::Int32(read_i16(datum)? as i32)),
        oid::INT4 => Ok(DynamicValue::Int32(read_i32(datum)?)),
        oid::INT8 => {
            let v = read_i64(datum)?;
            if ctx.config().bigint_graceful {
                // Graceful mode avoids 64-bit integer values entirely.
                if i32::try_from(v).is_ok() {
                    Ok(DynamicValue::Number(v as f64))
                } else {
                    Ok(DynamicValue::String(itoa::Buffer::new().format(v).to_string()))
                }
            } else {
                Ok(DynamicValue::BigInt(v))
            }
        }
        oid::FLOAT4 => Ok(DynamicValue::Number(read_f32(datum)? as f64)),
        oid::FLOAT8 => Ok(DynamicValue::Number(read_f64(datum)?)),
        oid::NUMERIC => {
            let text = numeric_text(datum)?;
            let n = text.parse::<f64>().map_err(|_| {
                BridgeError::DatumConversion(format!("malformed numeric payload: {text:?}"))
            })?;
            Ok(DynamicValue::Number(n))
        }
        oid::DATE => {
            let days = read_i32(datum)?;
            Ok(DynamicValue::Date(days as f64 * MS_PER_DAY + EPOCH_OFFSET_MS))
        }
        oid::TIMESTAMP | oid::TIMESTAMPTZ => {
            let ms = if ctx.catalog().integer_datetimes() {
                read_i64(datum)? as f64 / 1000.0 + EPOCH_OFFSET_MS
            } else {
                read_f64(datum)? * 1000.0 + EPOCH_OFFSET_MS
            };
            Ok(DynamicValue::Date(ms))
        }
        oid::TEXT | oid::VARCHAR | oid::BPCHAR | oid::XML => {
            let payload = datum.expect_bytes()?;
            let text = crate::encoding::decode_text(payload, ctx.catalog().server_encoding())?;
            Ok(DynamicValue::String(text))
        }
        oid::BYTEA => {
            let payload = datum.expect_bytes()?;
            Ok(DynamicValue::TypedBuffer(TypedBuffer::new(BufferKind::UInt8, payload.clone())))
        }
        oid::JSON => {
            let payload = datum.expect_bytes()?;
            let text = crate::encoding::decode_text(payload, ctx.catalog().server_encoding())?;
            json::decode_json_text(&text)
        }
        oid::JSONB => {
            if ctx.config().jsonb_direct {
                json::decode_tree(datum.expect_jsonb()?)
            } else {
                let text = ctx.call_output(oid::JSONB, datum)?;
                json::decode_json_text(&text)
            }
        }
        other => {
            let text = ctx.call_output(other, datum)?;
            Ok(DynamicValue::String(text))
        }
    }
}

/// Encode a dynamic value as a scalar datum of the target type. `None` means
/// SQL NULL. Composite targets are routed to the row codec before the null
/// check so the row codec owns the whole of that path.
pub fn encode(
    ctx: &mut ConversionContext<'_>,
    value: &DynamicValue,
    desc: &TypeDescriptor,
) -> BridgeResult<Option<Datum>> {
    if desc.is_composite || desc.type_oid == oid::RECORD {
        return composite::encode(ctx, value, desc);
    }
    if value.is_nullish() {
        return Ok(None);
    }
    let config = ctx.config();
    match desc.type_oid {
        oid::OID => {
            if let Some(n) = numeric_value(value) {
                return Ok(Some(Datum::oid(js_uint32(n))));
            }
        }
        oid::BOOL => {
            if let DynamicValue::Boolean(b) = value {
                return Ok(Some(Datum::bool(*b)));
            }
        }
        oid::INT2 => {
            if let Some(n) = numeric_value(value) {
                let v = if config.check_integer_overflow {
                    let wide = js_int64(n);
                    i16::try_from(wide).map_err(|_| {
                        BridgeError::DatumConversion("smallint out of range".to_string())
                    })?
                } else {
                    js_int32(n) as i16
                };
                return Ok(Some(Datum::int2(v)));
            }
        }
        oid::INT4 => {
            if let Some(n) = numeric_value(value) {
                let v = if config.check_integer_overflow {
                    let wide = js_int64(n);
                    i32::try_from(wide).map_err(|_| {
                        BridgeError::DatumConversion("integer out of range".to_string())
                    })?
                } else {
                    js_int32(n)
                };
                return Ok(Some(Datum::int4(v)));
            }
        }
        oid::INT8 => {
            if let DynamicValue::BigInt(v) = value {
                return Ok(Some(Datum::int8(*v)));
            }
            if let Some(n) = numeric_value(value) {
                return Ok(Some(Datum::int8(js_int64(n))));
            }
        }
        oid::FLOAT4 => {
            if let Some(n) = numeric_value(value) {
                return Ok(Some(Datum::float4(n as f32)));
            }
        }
        oid::FLOAT8 => {
            if let Some(n) = numeric_value(value) {
                return Ok(Some(Datum::float8(n)));
            }
        }
        oid::NUMERIC => {
            if let DynamicValue::BigInt(v) = value {
                let text = itoa::Buffer::new().format(*v).to_string();
                return ctx.call_input(oid::NUMERIC, &text).map(Some);
            }
            if let Some(n) = numeric_value(value) {
                return Ok(Some(Datum::bytes(format_number(n))));
            }
        }
        oid::DATE => {
            if let DynamicValue::Date(ms) = value {
                return Ok(Some(Datum::int4(epoch_ms_to_date_days(*ms))));
            }
        }
        oid::TIMESTAMP | oid::TIMESTAMPTZ => {
            if let DynamicValue::Date(ms) = value {
                let datum = if ctx.catalog().integer_datetimes() {
                    Datum::int8(epoch_ms_to_timestamp_usec(*ms))
                } else {
                    Datum::float8((*ms - EPOCH_OFFSET_MS) / 1000.0)
                };
                return Ok(Some(datum));
            }
        }
        oid::BYTEA => {
            if let DynamicValue::TypedBuffer(buf) = value {
                return Ok(Some(Datum::Bytes(buf.as_bytes().clone())));
            }
        }
        oid::JSONB => {
            if config.jsonb_direct {
                return Ok(Some(Datum::Jsonb(json::encode_to_tree(value))));
            }
            if matches!(value, DynamicValue::Object(_) | DynamicValue::Array(_)) {
                let text = json::stringify_dynamic(value);
                return ctx.call_input(oid::JSONB, &text).map(Some);
            }
        }
        oid::JSON => {
            if matches!(value, DynamicValue::Object(_) | DynamicValue::Array(_)) {
                let text = json::stringify_dynamic(value);
                let payload =
                    crate::encoding::encode_text(&text, ctx.catalog().server_encoding())?;
                return Ok(Some(Datum::Bytes(payload)));
            }
        }
        oid::TEXT | oid::VARCHAR | oid::BPCHAR | oid::XML => {
            if let DynamicValue::String(s) = value {
                let payload = crate::encoding::encode_text(s, ctx.catalog().server_encoding())?;
                return Ok(Some(Datum::Bytes(payload)));
            }
        }
        _ => {}
    }
    // Lexical cast: stringify and let the type's input function decide.
    let text = value.to_text();
    ctx.call_input(desc.type_oid, &text).map(Some)
}

/// Number-like kinds participating in numeric encode arms, widened to f64.
/// BigInt is deliberately excluded; its arms are explicit so 64-bit
/// precision survives.
fn numeric_value(value: &DynamicValue) -> Option<f64> {
    match value {
        DynamicValue::Int32(v) => Some(*v as f64),
        DynamicValue::UInt32(v) => Some(*v as f64),
        DynamicValue::Number(n) => Some(*n),
        _ => None,
    }
}

/// Engine ToInt32: truncate, then wrap modulo 2^32 into the signed range.
/// NaN and infinities map to 0.
pub(crate) fn js_int32(n: f64) -> i32 {
    let t = n.trunc();
    if !t.is_finite() {
        return 0;
    }
    t.rem_euclid(4_294_967_296.0) as u32 as i32
}

/// Engine ToUint32.
pub(crate) fn js_uint32(n: f64) -> u32 {
    let t = n.trunc();
    if !t.is_finite() {
        return 0;
    }
    t.rem_euclid(4_294_967_296.0) as u32
}

/// Engine IntegerValue: truncate toward zero, saturating at the 64-bit
/// bounds; NaN maps to 0.
pub(crate) fn js_int64(n: f64) -> i64 {
    if n.is_nan() {
        return 0;
    }
    // `as` saturates at the bounds for finite and infinite values alike.
    n.trunc() as i64
}

fn epoch_ms_to_date_days(ms: f64) -> i32 {
    ((ms - EPOCH_OFFSET_MS) / MS_PER_DAY) as i32
}

fn epoch_ms_to_timestamp_usec(ms: f64) -> i64 {
    // Millisecond cast first, then scale; sub-millisecond precision is not
    // representable on the dynamic side anyway.
    ((ms - EPOCH_OFFSET_MS) as i64) * 1000
}

fn read_fixed<const N: usize>(datum: &Datum) -> BridgeResult<[u8; N]> {
    let payload = datum.expect_bytes()?;
    <[u8; N]>::try_from(payload.as_ref()).map_err(|_| {
        BridgeError::DatumConversion(format!(
            "scalar payload length mismatch: expected {N} bytes, got {}",
            payload.len()
        ))
    })
}

fn read_bool(datum: &Datum) -> BridgeResult<bool> {
    Ok(read_fixed::<1>(datum)?[0] != 0)
}

fn read_i16(datum: &Datum) -> BridgeResult<i16> {
    Ok(i16::from_be_bytes(read_fixed(datum)?))
}

fn read_i32(datum: &Datum) -> BridgeResult<i32> {
    Ok(i32::from_be_bytes(read_fixed(datum)?))
}

fn read_u32(datum: &Datum) -> BridgeResult<u32> {
    Ok(u32::from_be_bytes(read_fixed(datum)?))
}

fn read_i64(datum: &Datum) -> BridgeResult<i64> {
    Ok(i64::from_be_bytes(read_fixed(datum)?))
}

fn read_f32(datum: &Datum) -> BridgeResult<f32> {
    Ok(f32::from_be_bytes(read_fixed(datum)?))
}

fn read_f64(datum: &Datum) -> BridgeResult<f64> {
    Ok(f64::from_be_bytes(read_fixed(datum)?))
}

fn numeric_text(datum: &Datum) -> BridgeResult<String> {
    let payload = datum.expect_bytes()?;
    String::from_utf8(payload.to_vec())
        .map_err(|_| BridgeError::DatumConversion("malformed numeric payload".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BuiltinCatalog;
    use crate::context::Config;
    use pretty_assertions::assert_eq;

    fn ctx(catalog: &BuiltinCatalog) -> ConversionContext<'_> {
        ConversionContext::new(catalog)
    }

    #[test]
    fn test_decode_int4() {
        let catalog = BuiltinCatalog::new();
        let mut ctx = ctx(&catalog);
        let desc = ctx.resolve(oid::INT4).unwrap();
        let v = decode(&mut ctx, &Datum::int4(-7), &desc).unwrap();
        assert_eq!(v, DynamicValue::Int32(-7));
    }

    #[test]
    fn test_decode_int8_default_is_bigint() {
        let catalog = BuiltinCatalog::new();
        let mut ctx = ctx(&catalog);
        let desc = ctx.resolve(oid::INT8).unwrap();
        let v = decode(&mut ctx, &Datum::int8(9_007_199_254_740_993), &desc).unwrap();
        assert_eq!(v, DynamicValue::BigInt(9_007_199_254_740_993));
    }

    #[test]
    fn test_decode_int8_graceful_splits_on_32_bits() {
        let catalog = BuiltinCatalog::new();
        let config = Config { bigint_graceful: true, ..Config::default() };
        let mut ctx = ConversionContext::with_config(&catalog, config);
        let desc = ctx.resolve(oid::INT8).unwrap();
        assert_eq!(
            decode(&mut ctx, &Datum::int8(41), &desc).unwrap(),
            DynamicValue::Number(41.0)
        );
        assert_eq!(
            decode(&mut ctx, &Datum::int8(1 << 40), &desc).unwrap(),
            DynamicValue::String("1099511627776".to_string())
        );
    }

    #[test]
    fn test_date_round_trip_epoch_shift() {
        let catalog = BuiltinCatalog::new();
        let mut ctx = ctx(&catalog);
        let desc = ctx.resolve(oid::DATE).unwrap();
        // 2020-01-01 is 7305 days after the database epoch.
        let decoded = decode(&mut ctx, &Datum::int4(7305), &desc).unwrap();
        assert_eq!(decoded, DynamicValue::Date(1_577_836_800_000.0));
        let encoded = encode(&mut ctx, &decoded, &desc).unwrap();
        assert_eq!(encoded, Some(Datum::int4(7305)));
    }

    #[test]
    fn test_timestamp_round_trip_integer_datetimes() {
        let catalog = BuiltinCatalog::new();
        let mut ctx = ctx(&catalog);
        let desc = ctx.resolve(oid::TIMESTAMPTZ).unwrap();
        let usec = 7305i64 * 86_400_000_000 + 1_500_000; // 2020-01-01 00:00:01.5
        let decoded = decode(&mut ctx, &Datum::int8(usec), &desc).unwrap();
        assert_eq!(decoded, DynamicValue::Date(1_577_836_801_500.0));
        let encoded = encode(&mut ctx, &decoded, &desc).unwrap();
        assert_eq!(encoded, Some(Datum::int8(usec)));
    }

    #[test]
    fn test_timestamp_float_mode() {
        let catalog = BuiltinCatalog::new().with_float_datetimes();
        let mut ctx = ConversionContext::new(&catalog);
        let desc = ctx.resolve(oid::TIMESTAMP).unwrap();
        let decoded = decode(&mut ctx, &Datum::float8(1.5), &desc).unwrap();
        assert_eq!(decoded, DynamicValue::Date(EPOCH_OFFSET_MS + 1500.0));
        let encoded = encode(&mut ctx, &decoded, &desc).unwrap();
        assert_eq!(encoded, Some(Datum::float8(1.5)));
    }

    #[test]
    fn test_encode_int2_truncates_without_overflow_check() {
        let catalog = BuiltinCatalog::new();
        let mut ctx = ctx(&catalog);
        let desc = ctx.resolve(oid::INT2).unwrap();
        let encoded = encode(&mut ctx, &DynamicValue::Int32(0x1_0001), &desc).unwrap();
        assert_eq!(encoded, Some(Datum::int2(1)));
    }

    #[test]
    fn test_encode_int2_overflow_check_rejects() {
        let catalog = BuiltinCatalog::new();
        let config = Config { check_integer_overflow: true, ..Config::default() };
        let mut ctx = ConversionContext::with_config(&catalog, config);
        let desc = ctx.resolve(oid::INT2).unwrap();
        let err = encode(&mut ctx, &DynamicValue::Int32(40_000), &desc).unwrap_err();
        assert!(err.to_string().contains("smallint out of range"));
    }

    #[test]
    fn test_encode_nullish_is_sql_null() {
        let catalog = BuiltinCatalog::new();
        let mut ctx = ctx(&catalog);
        let desc = ctx.resolve(oid::INT4).unwrap();
        assert_eq!(encode(&mut ctx, &DynamicValue::Null, &desc).unwrap(), None);
        assert_eq!(encode(&mut ctx, &DynamicValue::Undefined, &desc).unwrap(), None);
    }

    #[test]
    fn test_encode_string_to_int_goes_through_input_function() {
        let catalog = BuiltinCatalog::new();
        let mut ctx = ctx(&catalog);
        let desc = ctx.resolve(oid::INT4).unwrap();
        let encoded = encode(&mut ctx, &DynamicValue::String("42".into()), &desc).unwrap();
        assert_eq!(encoded, Some(Datum::int4(42)));
        let err = encode(&mut ctx, &DynamicValue::String("nope".into()), &desc).unwrap_err();
        assert!(err.to_string().contains("invalid input syntax"));
    }

    #[test]
    fn test_numeric_decode_parses_decimal_text() {
        let catalog = BuiltinCatalog::new();
        let mut ctx = ctx(&catalog);
        let desc = ctx.resolve(oid::NUMERIC).unwrap();
        let v = decode(&mut ctx, &Datum::bytes("12.50"), &desc).unwrap();
        assert_eq!(v, DynamicValue::Number(12.5));
    }

    #[test]
    fn test_bytea_round_trip_shares_payload() {
        let catalog = BuiltinCatalog::new();
        let mut ctx = ctx(&catalog);
        let desc = ctx.resolve(oid::BYTEA).unwrap();
        let datum = Datum::bytes(vec![1u8, 2, 3]);
        let decoded = decode(&mut ctx, &datum, &desc).unwrap();
        let DynamicValue::TypedBuffer(buf) = &decoded else { panic!("expected buffer") };
        assert_eq!(buf.kind(), BufferKind::UInt8);
        assert_eq!(buf.as_bytes().as_ref(), &[1, 2, 3]);
        assert_eq!(encode(&mut ctx, &decoded, &desc).unwrap(), Some(datum));
    }

    #[test]
    fn test_js_int32_wraps() {
        assert_eq!(js_int32(4_294_967_297.0), 1);
        assert_eq!(js_int32(-1.5), -1);
        assert_eq!(js_int32(f64::NAN), 0);
        assert_eq!(js_int32(2_147_483_648.0), i32::MIN);
    }

    #[test]
    fn test_js_int64_saturates() {
        assert_eq!(js_int64(1e20), i64::MAX);
        assert_eq!(js_int64(-1e20), i64::MIN);
        assert_eq!(js_int64(f64::NAN), 0);
        assert_eq!(js_int64(-2.9), -2);
    }

    #[test]
    fn test_unknown_type_decodes_through_output_function() {
        let catalog = BuiltinCatalog::new();
        let mut ctx = ctx(&catalog);
        let desc = ctx.resolve(oid::UNKNOWN).unwrap();
        let v = decode(&mut ctx, &Datum::bytes("raw"), &desc).unwrap();
        assert_eq!(v, DynamicValue::String("raw".to_string()));
    }
}
