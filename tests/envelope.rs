//! Envelope framing failures and the non-fatal integrity findings the
//! read path reports for dangling references.

use gtirb::proto::{
    encode_len_field, encode_message_field, encode_string_field, encode_varint_field,
};
use gtirb::{
    Context, DecodeError, EnvelopeError, Error, IntegrityWarning, Ir, Module, Node,
    SCHEMA_VERSION,
};
use uuid::Uuid;

fn frame(version: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = b"GTIRB".to_vec();
    out.extend_from_slice(&[0, 0, version]);
    out.extend_from_slice(payload);
    out
}

fn read(bytes: &[u8]) -> Result<(Context, gtirb::LoadResult), Error> {
    let mut ctx = Context::new();
    let loaded = Ir::read(&mut ctx, &mut &bytes[..])?;
    Ok((ctx, loaded))
}

#[test]
fn junk_magic_is_a_bad_envelope() {
    let mut bytes = b"JUNK!".to_vec();
    bytes.extend_from_slice(&[0, 0, SCHEMA_VERSION]);
    match read(&bytes) {
        Err(Error::Envelope(EnvelopeError::BadMagic)) => {}
        other => panic!("expected BadMagic, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn short_header_is_a_bad_envelope() {
    match read(b"GTIR") {
        Err(Error::Envelope(EnvelopeError::TruncatedHeader { got: 4, need: 8 })) => {}
        other => panic!("expected TruncatedHeader, got {:?}", other.map(|_| ())),
    }
    match read(b"GTIRB\0") {
        Err(Error::Envelope(EnvelopeError::TruncatedHeader { got: 6, .. })) => {}
        other => panic!("expected TruncatedHeader, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn unknown_version_is_a_bad_envelope() {
    let bytes = frame(255, &[]);
    match read(&bytes) {
        Err(Error::Envelope(EnvelopeError::UnknownVersion { version: 255 })) => {}
        other => panic!("expected UnknownVersion, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn trailing_garbage_is_a_decode_error() {
    // 0xFF parses as a truncated varint tag: field 31, then nothing.
    let bytes = frame(SCHEMA_VERSION, &[0xFF]);
    match read(&bytes) {
        Err(Error::Decode(_)) => {}
        other => panic!("expected a decode error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn missing_required_uuid_is_a_decode_error() {
    // An IR message whose module has no uuid field.
    let module = encode_string_field(2, "nameless");
    let mut payload = encode_len_field(1, Uuid::new_v4().as_bytes());
    payload.extend(encode_message_field(2, &module));
    match read(&frame(SCHEMA_VERSION, &payload)) {
        Err(Error::Decode(DecodeError::MissingField { message: "Module", name: "uuid" })) => {}
        other => panic!("expected MissingField, got {:?}", other.map(|_| ())),
    }
}

/// Builds a minimal valid payload: an IR with one module whose only symbol
/// references `referent`, plus one CFG edge between two unknown UUIDs.
fn payload_with_dangling_refs(referent: Uuid) -> Vec<u8> {
    let mut symbol = encode_len_field(1, Uuid::new_v4().as_bytes());
    symbol.extend(encode_string_field(2, "ghost"));
    symbol.extend(encode_len_field(6, referent.as_bytes()));

    let mut module = encode_len_field(1, Uuid::new_v4().as_bytes());
    module.extend(encode_string_field(2, "m"));
    module.extend(encode_message_field(12, &symbol));

    let mut edge = encode_len_field(1, Uuid::new_v4().as_bytes());
    edge.extend(encode_len_field(2, Uuid::new_v4().as_bytes()));
    edge.extend(encode_message_field(3, &encode_varint_field(1, 0)));
    let cfg = encode_message_field(2, &edge);

    let mut payload = encode_len_field(1, Uuid::new_v4().as_bytes());
    payload.extend(encode_message_field(2, &module));
    payload.extend(encode_message_field(3, &cfg));
    payload
}

#[test]
fn dangling_references_warn_but_load() {
    let referent = Uuid::new_v4();
    let bytes = frame(SCHEMA_VERSION, &payload_with_dangling_refs(referent));
    let (ctx, loaded) = read(&bytes).expect("loads despite dangling refs");

    // Symbol referent cleared, edge dropped, all surfaced as warnings.
    let module = loaded.ir.modules(&ctx)[0];
    let ghost = module.find_symbols(&ctx, "ghost")[0];
    assert_eq!(ghost.payload(&ctx), None);
    assert_eq!(loaded.ir.cfg(&ctx).edge_count(), 0);

    assert!(loaded
        .warnings
        .iter()
        .any(|w| matches!(w, IntegrityWarning::DanglingReferent { referent: r, .. } if *r == referent)));
    assert_eq!(
        loaded
            .warnings
            .iter()
            .filter(|w| matches!(w, IntegrityWarning::DanglingCfgEndpoint { .. }))
            .count(),
        2
    );
}

#[test]
fn duplicate_uuids_in_payload_fail() {
    let uuid = Uuid::new_v4();
    let mut module = encode_len_field(1, uuid.as_bytes());
    module.extend(encode_string_field(2, "m"));
    let mut payload = encode_len_field(1, uuid.as_bytes());
    payload.extend(encode_message_field(2, &module));
    match read(&frame(SCHEMA_VERSION, &payload)) {
        Err(Error::Usage(gtirb::UsageError::DuplicateUuid { uuid: u })) => assert_eq!(u, uuid),
        other => panic!("expected DuplicateUuid, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn module_handles_survive_context_queries() {
    // A loaded module is findable by UUID through the context table.
    let mut ctx = Context::new();
    let ir = Ir::new(&mut ctx);
    let module = Module::new(&mut ctx, "m");
    ir.add_module(&mut ctx, module);
    let mut bytes = Vec::new();
    ir.write(&ctx, &mut bytes).expect("writes");

    let (ctx2, loaded) = read(&bytes).expect("reads");
    let m2 = loaded.ir.modules(&ctx2)[0];
    assert_eq!(ctx2.find(&m2.uuid(&ctx2)), Some(Node::Module(m2)));
}
