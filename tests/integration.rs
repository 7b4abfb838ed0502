use bytes::Bytes;
use pretty_assertions::assert_eq;

use datum_bridge::{
    ArrayDatum, Attribute, BridgeError, BufferKind, BuiltinCatalog, Config, ConversionContext,
    Datum, DynamicValue, JsonbValue, PlainObject, RowDatum, ServerEncoding, TypedBuffer,
    inferred_oid, oid, to_datum, to_dynamic,
};

fn round_trip(ctx: &mut ConversionContext<'_>, datum: Datum, type_oid: u32) -> DynamicValue {
    let value = to_dynamic(ctx, Some(&datum), type_oid).expect("decode failed");
    let back = to_datum(ctx, &value, type_oid).expect("encode failed");
    assert_eq!(back, Some(datum));
    value
}

#[test]
fn test_scalar_round_trips() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    assert_eq!(round_trip(&mut ctx, Datum::bool(true), oid::BOOL), DynamicValue::Boolean(true));
    assert_eq!(round_trip(&mut ctx, Datum::int2(-3), oid::INT2), DynamicValue::Int32(-3));
    assert_eq!(round_trip(&mut ctx, Datum::int4(12345), oid::INT4), DynamicValue::Int32(12345));
    assert_eq!(
        round_trip(&mut ctx, Datum::int8(1 << 40), oid::INT8),
        DynamicValue::BigInt(1 << 40)
    );
    assert_eq!(round_trip(&mut ctx, Datum::float8(2.5), oid::FLOAT8), DynamicValue::Number(2.5));
    assert_eq!(
        round_trip(&mut ctx, Datum::bytes("hello"), oid::TEXT),
        DynamicValue::String("hello".to_string())
    );
}

#[test]
fn test_sql_null_round_trip() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    assert_eq!(to_dynamic(&mut ctx, None, oid::TEXT).unwrap(), DynamicValue::Null);
    assert_eq!(to_datum(&mut ctx, &DynamicValue::Null, oid::TEXT).unwrap(), None);
    assert_eq!(to_datum(&mut ctx, &DynamicValue::Undefined, oid::INT4).unwrap(), None);
}

#[test]
fn test_date_round_trip_epoch_shift() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    // 2020-01-01 is 7305 days after the database epoch.
    let value = round_trip(&mut ctx, Datum::int4(7305), oid::DATE);
    assert_eq!(value, DynamicValue::Date(1_577_836_800_000.0));
}

#[test]
fn test_timestamptz_round_trip() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    let usec = 7305i64 * 86_400_000_000 + 123_000;
    let value = round_trip(&mut ctx, Datum::int8(usec), oid::TIMESTAMPTZ);
    assert_eq!(value, DynamicValue::Date(1_577_836_800_123.0));
}

#[test]
fn test_bigint_graceful_mode() {
    let catalog = BuiltinCatalog::new();
    let config = Config { bigint_graceful: true, ..Config::default() };
    let mut ctx = ConversionContext::with_config(&catalog, config);
    assert_eq!(
        to_dynamic(&mut ctx, Some(&Datum::int8(7)), oid::INT8).unwrap(),
        DynamicValue::Number(7.0)
    );
    assert_eq!(
        to_dynamic(&mut ctx, Some(&Datum::int8(i64::MAX)), oid::INT8).unwrap(),
        DynamicValue::String("9223372036854775807".to_string())
    );
}

#[test]
fn test_integer_overflow_check() {
    let catalog = BuiltinCatalog::new();
    let config = Config { check_integer_overflow: true, ..Config::default() };
    let mut ctx = ConversionContext::with_config(&catalog, config);
    let err = to_datum(&mut ctx, &DynamicValue::Number(1e10), oid::INT4).unwrap_err();
    assert!(err.to_string().contains("integer out of range"));
    // In range still encodes.
    assert_eq!(
        to_datum(&mut ctx, &DynamicValue::Number(100.0), oid::INT4).unwrap(),
        Some(Datum::int4(100))
    );
}

#[test]
fn test_lexical_cast_fallback() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    // A string assigned to an integer column parses through the input function.
    assert_eq!(
        to_datum(&mut ctx, &DynamicValue::String("42".into()), oid::INT4).unwrap(),
        Some(Datum::int4(42))
    );
    // A boolean assigned to a text column stringifies.
    assert_eq!(
        to_datum(&mut ctx, &DynamicValue::Boolean(false), oid::TEXT).unwrap(),
        Some(Datum::bytes("false"))
    );
    // And garbage fails with the database's own message.
    let err = to_datum(&mut ctx, &DynamicValue::String("x".into()), oid::INT4).unwrap_err();
    assert!(err.to_string().contains("invalid input syntax for type integer"));
}

#[test]
fn test_array_round_trips_various_sizes() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    for n in [0usize, 1, 1000] {
        let elements: Vec<Option<Datum>> = (0..n).map(|i| Some(Datum::int4(i as i32))).collect();
        let datum = Datum::Array(ArrayDatum::one_dim(oid::INT4, elements));
        let value = round_trip(&mut ctx, datum, oid::INT4_ARRAY);
        let DynamicValue::Array(items) = value else { panic!("expected array") };
        assert_eq!(items.len(), n);
    }
}

#[test]
fn test_array_null_elements_survive() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    let datum = Datum::Array(ArrayDatum::one_dim(
        oid::TEXT,
        vec![Some(Datum::bytes("a")), None],
    ));
    let value = round_trip(&mut ctx, datum, oid::TEXT_ARRAY);
    assert_eq!(
        value,
        DynamicValue::Array(vec![
            DynamicValue::String("a".to_string()),
            DynamicValue::Null,
        ])
    );
}

#[test]
fn test_typed_array_domain_fast_path() {
    let mut catalog = BuiltinCatalog::new();
    catalog.register_typed_array_domain(60_000, BufferKind::Float64).unwrap();
    let mut ctx = ConversionContext::new(&catalog);
    let datum = Datum::Array(ArrayDatum::one_dim(
        oid::FLOAT8,
        vec![Some(Datum::float8(1.5)), Some(Datum::float8(-2.25))],
    ));
    let packed = datum.expect_array().unwrap().packed_bytes().unwrap();
    let value = round_trip(&mut ctx, datum, 60_000);
    let DynamicValue::TypedBuffer(buf) = value else { panic!("expected typed buffer") };
    assert_eq!(buf.kind(), BufferKind::Float64);
    assert_eq!(buf.as_bytes(), &packed);
}

#[test]
fn test_typed_array_domain_rejects_null_element() {
    let mut catalog = BuiltinCatalog::new();
    catalog.register_typed_array_domain(60_000, BufferKind::Int32).unwrap();
    let mut ctx = ConversionContext::new(&catalog);
    let datum = Datum::Array(ArrayDatum::one_dim(oid::INT4, vec![Some(Datum::int4(1)), None]));
    let err = to_dynamic(&mut ctx, Some(&datum), 60_000).unwrap_err();
    assert!(matches!(err, BridgeError::ValueShape(_)));
    assert_eq!(
        err.to_string(),
        "NULL element, or multi-dimension array not allowed in external array type"
    );
}

#[test]
fn test_typed_buffer_encodes_into_typed_domain() {
    let mut catalog = BuiltinCatalog::new();
    catalog.register_typed_array_domain(60_000, BufferKind::Int16).unwrap();
    let mut ctx = ConversionContext::new(&catalog);
    let buffer = DynamicValue::TypedBuffer(TypedBuffer::new(
        BufferKind::Int16,
        Bytes::from(vec![0u8, 1, 0, 2]),
    ));
    let encoded = to_datum(&mut ctx, &buffer, 60_000).unwrap();
    assert_eq!(
        encoded,
        Some(Datum::Array(ArrayDatum::one_dim(
            oid::INT2,
            vec![Some(Datum::int2(1)), Some(Datum::int2(2))],
        )))
    );
}

#[test]
fn test_non_array_into_typed_domain_rejected() {
    let mut catalog = BuiltinCatalog::new();
    catalog.register_typed_array_domain(60_000, BufferKind::Int32).unwrap();
    let mut ctx = ConversionContext::new(&catalog);
    let err = to_datum(&mut ctx, &DynamicValue::Int32(1), 60_000).unwrap_err();
    assert_eq!(err.to_string(), "value is not an Array");
}

#[test]
fn test_composite_round_trip() {
    let mut catalog = BuiltinCatalog::new();
    catalog.register_composite(
        50_000,
        "pair",
        vec![Attribute::new("a", oid::INT4), Attribute::new("b", oid::TEXT)],
    );
    let mut ctx = ConversionContext::new(&catalog);
    let datum = Datum::Row(RowDatum {
        type_oid: 50_000,
        typmod: -1,
        fields: vec![Some(Datum::int4(1)), Some(Datum::bytes("x"))],
    });
    let value = round_trip(&mut ctx, datum, 50_000);
    let DynamicValue::Object(obj) = value else { panic!("expected object") };
    assert_eq!(obj.get("a"), Some(&DynamicValue::Int32(1)));
    assert_eq!(obj.get("b"), Some(&DynamicValue::String("x".to_string())));
}

#[test]
fn test_composite_missing_key_becomes_null() {
    let mut catalog = BuiltinCatalog::new();
    catalog.register_composite(
        50_000,
        "pair",
        vec![Attribute::new("a", oid::INT4), Attribute::new("b", oid::TEXT)],
    );
    let mut ctx = ConversionContext::new(&catalog);
    let mut obj = PlainObject::new();
    obj.insert("b", DynamicValue::String("only".into()));
    let encoded = to_datum(&mut ctx, &DynamicValue::Object(obj), 50_000).unwrap();
    let Some(Datum::Row(row)) = encoded else { panic!("expected row") };
    assert_eq!(row.fields, vec![None, Some(Datum::bytes("only"))]);
}

#[test]
fn test_anonymous_record_decodes_by_value_identity() {
    let mut catalog = BuiltinCatalog::new();
    catalog.register_composite(
        50_000,
        "pair",
        vec![Attribute::new("a", oid::INT4), Attribute::new("b", oid::TEXT)],
    );
    let mut ctx = ConversionContext::new(&catalog);
    // Declared type is the record pseudo-type; the row knows its real type.
    let datum = Datum::Row(RowDatum {
        type_oid: 50_000,
        typmod: -1,
        fields: vec![Some(Datum::int4(9)), None],
    });
    let value = to_dynamic(&mut ctx, Some(&datum), oid::RECORD).unwrap();
    let DynamicValue::Object(obj) = value else { panic!("expected object") };
    assert_eq!(obj.get("a"), Some(&DynamicValue::Int32(9)));
    assert_eq!(obj.get("b"), Some(&DynamicValue::Null));
}

#[test]
fn test_jsonb_direct_decode_nested_document() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    let tree = JsonbValue::Object(vec![(
        "k".to_string(),
        JsonbValue::Array(vec![
            JsonbValue::Numeric("1".to_string()),
            JsonbValue::Numeric("2.5".to_string()),
            JsonbValue::Null,
            JsonbValue::String("s".to_string()),
        ]),
    )]);
    let value = to_dynamic(&mut ctx, Some(&Datum::Jsonb(tree)), oid::JSONB).unwrap();
    let DynamicValue::Object(obj) = value else { panic!("expected object") };
    assert_eq!(
        obj.get("k"),
        Some(&DynamicValue::Array(vec![
            DynamicValue::Number(1.0),
            DynamicValue::Number(2.5),
            DynamicValue::Null,
            DynamicValue::String("s".to_string()),
        ]))
    );
}

#[test]
fn test_jsonb_direct_encode_drops_undefined_and_renders_dates() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    let mut obj = PlainObject::new();
    obj.insert("gone", DynamicValue::Undefined);
    obj.insert("d", DynamicValue::Date(1_577_836_800_000.0));
    let encoded = to_datum(&mut ctx, &DynamicValue::Object(obj), oid::JSONB).unwrap();
    let Some(Datum::Jsonb(tree)) = encoded else { panic!("expected jsonb") };
    assert_eq!(
        tree,
        JsonbValue::Object(vec![(
            "d".to_string(),
            JsonbValue::String("2020-01-01T00:00:00.000Z".to_string()),
        )])
    );
}

#[test]
fn test_jsonb_direct_encode_wraps_scalar_root() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    let encoded = to_datum(&mut ctx, &DynamicValue::Int32(7), oid::JSONB).unwrap();
    assert_eq!(
        encoded,
        Some(Datum::Jsonb(JsonbValue::Array(vec![JsonbValue::Numeric("7".to_string())])))
    );
}

#[test]
fn test_jsonb_textual_mode_round_trip() {
    let catalog = BuiltinCatalog::new();
    let config = Config { jsonb_direct: false, ..Config::default() };
    let mut ctx = ConversionContext::with_config(&catalog, config);
    let mut obj = PlainObject::new();
    obj.insert("n", DynamicValue::Number(2.5));
    obj.insert("s", DynamicValue::String("x".into()));
    let encoded = to_datum(&mut ctx, &DynamicValue::Object(obj), oid::JSONB).unwrap();
    assert!(matches!(encoded, Some(Datum::Jsonb(_))));
    let decoded = to_dynamic(&mut ctx, encoded.as_ref(), oid::JSONB).unwrap();
    let DynamicValue::Object(back) = decoded else { panic!("expected object") };
    assert_eq!(back.get("n"), Some(&DynamicValue::Number(2.5)));
    assert_eq!(back.get("s"), Some(&DynamicValue::String("x".to_string())));
}

#[test]
fn test_json_text_type_round_trip() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    let datum = Datum::bytes(r#"{"k": [1, 2.5, null, "s"]}"#);
    let value = to_dynamic(&mut ctx, Some(&datum), oid::JSON).unwrap();
    let DynamicValue::Object(obj) = &value else { panic!("expected object") };
    assert_eq!(
        obj.get("k"),
        Some(&DynamicValue::Array(vec![
            DynamicValue::Number(1.0),
            DynamicValue::Number(2.5),
            DynamicValue::Null,
            DynamicValue::String("s".to_string()),
        ]))
    );
    let back = to_datum(&mut ctx, &value, oid::JSON).unwrap();
    assert_eq!(back, Some(Datum::bytes(r#"{"k":[1.0,2.5,null,"s"]}"#)));
}

#[test]
fn test_bytea_decodes_to_byte_buffer() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    let value = round_trip(&mut ctx, Datum::bytes(vec![0u8, 255, 7]), oid::BYTEA);
    let DynamicValue::TypedBuffer(buf) = value else { panic!("expected buffer") };
    assert_eq!(buf.kind(), BufferKind::UInt8);
    assert_eq!(buf.as_bytes().as_ref(), &[0, 255, 7]);
}

#[test]
fn test_latin1_text_bridge() {
    let catalog = BuiltinCatalog::new().with_encoding(ServerEncoding::Latin1);
    let mut ctx = ConversionContext::new(&catalog);
    // 0xe9 is e-acute in latin1.
    let value = to_dynamic(&mut ctx, Some(&Datum::bytes(vec![0xe9u8])), oid::TEXT).unwrap();
    assert_eq!(value, DynamicValue::String("\u{e9}".to_string()));
    let back = to_datum(&mut ctx, &value, oid::TEXT).unwrap();
    assert_eq!(back, Some(Datum::bytes(vec![0xe9u8])));
}

#[test]
fn test_numeric_round_trip_through_text() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    let value = to_dynamic(&mut ctx, Some(&Datum::bytes("2.5")), oid::NUMERIC).unwrap();
    assert_eq!(value, DynamicValue::Number(2.5));
    let back = to_datum(&mut ctx, &value, oid::NUMERIC).unwrap();
    assert_eq!(back, Some(Datum::bytes("2.5")));
    // Exact 64-bit integers take the input-function path.
    let big = to_datum(&mut ctx, &DynamicValue::BigInt(9_007_199_254_740_993), oid::NUMERIC)
        .unwrap();
    assert_eq!(big, Some(Datum::bytes("9007199254740993")));
}

#[test]
fn test_inferred_parameter_types() {
    assert_eq!(inferred_oid(&DynamicValue::String("x".into())), Some(oid::TEXT));
    assert_eq!(inferred_oid(&DynamicValue::Number(1.5)), Some(oid::FLOAT8));
    assert_eq!(inferred_oid(&DynamicValue::Object(PlainObject::new())), None);
}

#[test]
fn test_unknown_oid_fails_resolution() {
    let catalog = BuiltinCatalog::new();
    let mut ctx = ConversionContext::new(&catalog);
    let err = to_dynamic(&mut ctx, Some(&Datum::int4(1)), 987_654).unwrap_err();
    assert!(matches!(err, BridgeError::TypeResolution(_)));
}
