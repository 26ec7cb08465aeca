//! AuxData type grammar and codec properties: print/parse idempotence,
//! encode/decode idempotence in both directions, strict decode failures,
//! and registry-backed table access.

use gtirb::auxdata::{self, codec, register_schema, registered_schema, AuxDataTable};
use gtirb::{Addr, AuxDataError, Offset, TypeExpr, Value};
use uuid::Uuid;

#[test]
fn type_expressions_print_canonically_and_reparse() {
    let cases = [
        TypeExpr::Uint64,
        TypeExpr::mapping(TypeExpr::Uuid, TypeExpr::Uint64),
        TypeExpr::sequence(TypeExpr::set(TypeExpr::String)),
        TypeExpr::Tuple(vec![TypeExpr::Addr, TypeExpr::Offset, TypeExpr::Double]),
        TypeExpr::Variant(vec![
            TypeExpr::Bool,
            TypeExpr::mapping(TypeExpr::Offset, TypeExpr::sequence(TypeExpr::Int32)),
        ]),
    ];
    for ty in cases {
        let printed = ty.to_string();
        assert_eq!(TypeExpr::parse(&printed).expect(&printed), ty);
    }

    let ty = TypeExpr::mapping(
        TypeExpr::Uuid,
        TypeExpr::Tuple(vec![TypeExpr::Uint16, TypeExpr::Bool]),
    );
    assert_eq!(ty.to_string(), "mapping<UUID,tuple<uint16,bool>>");
    assert_eq!(
        TypeExpr::parse("mapping< UUID , tuple< uint16, bool > >").expect("whitespace ok"),
        ty
    );
}

#[test]
fn malformed_type_expressions_fail() {
    for bad in [
        "",
        "quux",
        "sequence",
        "sequence<",
        "sequence<uint64",
        "sequence<uint64>>",
        "mapping<uint64>",
        "uint64 extra",
    ] {
        assert!(TypeExpr::parse(bad).is_err(), "{:?} should not parse", bad);
    }
}

fn round_trip(ty: &TypeExpr, value: &Value) {
    let bytes = codec::encode(ty, value).expect("encodes");
    let back = codec::decode(ty, &bytes).expect("decodes");
    assert_eq!(&back, value, "decode(encode(v)) == v for {}", ty);
    let again = codec::encode(ty, &back).expect("re-encodes");
    assert_eq!(again, bytes, "encode(decode(bytes)) == bytes for {}", ty);
}

#[test]
fn codec_round_trips() {
    round_trip(&TypeExpr::Bool, &Value::Bool(true));
    round_trip(&TypeExpr::Int32, &Value::I32(-7));
    round_trip(&TypeExpr::Uint64, &Value::U64(0xdead_beef));
    round_trip(&TypeExpr::Double, &Value::F64(2.5));
    round_trip(&TypeExpr::Float, &Value::F32(-0.5));
    round_trip(&TypeExpr::String, &Value::String("αβγ".to_owned()));
    round_trip(&TypeExpr::Addr, &Value::Addr(Addr(0x1000)));
    round_trip(&TypeExpr::Uuid, &Value::Uuid(Uuid::new_v4()));
    round_trip(
        &TypeExpr::Offset,
        &Value::Offset(Offset::new(Uuid::new_v4(), 0x40)),
    );

    round_trip(
        &TypeExpr::mapping(TypeExpr::Uint8, TypeExpr::sequence(TypeExpr::String)),
        &Value::mapping_of(vec![
            (Value::U8(2), Value::Sequence(vec![Value::String("b".into())])),
            (Value::U8(1), Value::Sequence(vec![])),
        ]),
    );
    round_trip(
        &TypeExpr::set(TypeExpr::Uint16),
        &Value::set_of(vec![Value::U16(300), Value::U16(2), Value::U16(300)]),
    );
    round_trip(
        &TypeExpr::Variant(vec![TypeExpr::Bool, TypeExpr::Uint16]),
        &Value::Variant { tag: 1, value: Box::new(Value::U16(513)) },
    );
    round_trip(
        &TypeExpr::Tuple(vec![TypeExpr::Uint32, TypeExpr::String]),
        &Value::Tuple(vec![Value::U32(9), Value::String("x".into())]),
    );
}

#[test]
fn wire_is_little_endian() {
    let bytes = codec::encode(&TypeExpr::Uint32, &Value::U32(0x0102_0304)).expect("encodes");
    assert_eq!(bytes, vec![0x04, 0x03, 0x02, 0x01]);

    let string = codec::encode(&TypeExpr::String, &Value::String("hi".into())).expect("encodes");
    assert_eq!(&string[..8], &2u64.to_le_bytes());
    assert_eq!(&string[8..], b"hi");
}

#[test]
fn strict_decode_failures() {
    assert!(matches!(
        codec::decode(&TypeExpr::Uint32, &[1, 2]),
        Err(AuxDataError::PayloadTruncated { .. })
    ));
    assert!(matches!(
        codec::decode(&TypeExpr::Uint32, &[1, 2, 3, 4, 5]),
        Err(AuxDataError::TrailingBytes { len: 1 })
    ));

    let variant = TypeExpr::Variant(vec![TypeExpr::Bool]);
    let mut bytes = 9u64.to_le_bytes().to_vec();
    bytes.push(0);
    assert!(matches!(
        codec::decode(&variant, &bytes),
        Err(AuxDataError::VariantTagOutOfRange { tag: 9, arity: 1 })
    ));

    let set = TypeExpr::set(TypeExpr::Uint8);
    let dup = [2u64.to_le_bytes().to_vec(), vec![5, 5]].concat();
    assert!(matches!(
        codec::decode(&set, &dup),
        Err(AuxDataError::UnorderedElement { container: "set" })
    ));
    let misordered = [2u64.to_le_bytes().to_vec(), vec![6, 5]].concat();
    assert!(matches!(
        codec::decode(&set, &misordered),
        Err(AuxDataError::UnorderedElement { container: "set" })
    ));

    let map = TypeExpr::mapping(TypeExpr::Uint8, TypeExpr::Uint8);
    let dup_keys = [2u64.to_le_bytes().to_vec(), vec![1, 10, 1, 11]].concat();
    assert!(matches!(
        codec::decode(&map, &dup_keys),
        Err(AuxDataError::UnorderedElement { container: "mapping" })
    ));

    assert!(matches!(
        codec::encode(&TypeExpr::Uint8, &Value::Bool(false)),
        Err(AuxDataError::TypeMismatch { .. })
    ));
}

#[test]
fn table_round_trip_and_raw_access() {
    let mut table = AuxDataTable::new();
    let ty = TypeExpr::mapping(TypeExpr::Uuid, TypeExpr::Uint64);
    let key = Uuid::new_v4();
    let value = Value::mapping_of(vec![(Value::Uuid(key), Value::U64(8))]);
    table.set("alignment", &ty, &value).expect("encodes");

    let back = table.get("alignment").expect("decodes").expect("present");
    assert_eq!(back.mapping_get(&Value::Uuid(key)), Some(&Value::U64(8)));
    let (type_name, raw) = table.raw("alignment").expect("raw");
    assert_eq!(type_name, "mapping<UUID,uint64>");
    assert_eq!(raw, codec::encode(&ty, &value).expect("encodes"));

    assert_eq!(table.get("absent").expect("ok"), None);
    assert!(table.remove("alignment").is_some());
    assert!(table.is_empty());
}

#[test]
fn unknown_entries_pass_through_verbatim() {
    let mut table = AuxDataTable::new();
    table.set_raw("vendorBlob", "widget<frob>", vec![1, 2, 3]);
    assert_eq!(table.raw("vendorBlob"), Some(("widget<frob>", &[1u8, 2, 3][..])));
    // The stored type is unparseable, so decode reports it rather than
    // guessing.
    assert!(table.get("vendorBlob").is_err());
}

#[test]
fn canonical_container_constructors() {
    let set = Value::set_of(vec![Value::U8(9), Value::U8(3), Value::U8(9)]);
    assert_eq!(set, Value::Set(vec![Value::U8(3), Value::U8(9)]));

    let map = Value::mapping_of(vec![
        (Value::U8(7), Value::Bool(true)),
        (Value::U8(7), Value::Bool(false)),
        (Value::U8(1), Value::Bool(false)),
    ]);
    assert_eq!(
        map,
        Value::Mapping(vec![
            (Value::U8(1), Value::Bool(false)),
            (Value::U8(7), Value::Bool(true)),
        ])
    );
}

#[test]
fn registry_round_trip() {
    register_schema("testSchema", TypeExpr::sequence(TypeExpr::Bool));
    assert_eq!(
        registered_schema("testSchema"),
        Some(TypeExpr::sequence(TypeExpr::Bool))
    );
    assert_eq!(registered_schema("noSuchSchema"), None);

    auxdata::register_sanctioned_schemata();
    assert_eq!(
        registered_schema("alignment"),
        Some(TypeExpr::mapping(TypeExpr::Uuid, TypeExpr::Uint64))
    );

    let mut table = AuxDataTable::new();
    let err = table.set_registered("neverRegistered", &Value::Bool(true));
    assert!(matches!(err, Err(AuxDataError::UnknownSchema { .. })));
    table
        .set_registered("alignment", &Value::mapping_of(vec![]))
        .expect("registered schema");
}
