//! Full-envelope round trips: graph-level equality after write/read, and
//! byte-level idempotence of write∘read on canonical envelopes.

use std::collections::BTreeSet;
use std::io::{Seek, SeekFrom};

use gtirb::{
    Addr, ByteInterval, ByteOrder, CodeBlock, Context, DataBlock, DecodeMode, EdgeLabel,
    EdgeType, ExprAttribute, FileFormat, Ir, Isa, Module, Node, ProxyBlock, Section, SectionFlag,
    Symbol, SymbolPayload, SymbolicExpression, TypeExpr, Value, Visibility, SCHEMA_VERSION,
};

/// A small but fully decorated image: PE/X64, one `.text` section, an addressed
/// interval with six bytes, one 4-byte code block, plus enough decoration
/// (symbols, CFG, symbolic expressions, AuxData) to exercise every field.
fn build_rich_ir(ctx: &mut Context) -> (Ir, Module, ByteInterval, CodeBlock) {
    let ir = Ir::new(ctx);
    let module = Module::new(ctx, "foo.exe");
    module.set_binary_path(ctx, "/opt/foo.exe");
    module.set_file_format(ctx, FileFormat::Pe);
    module.set_isa(ctx, Isa::X64);
    module.set_byte_order(ctx, ByteOrder::Little);
    module.set_preferred_addr(ctx, Addr(0x40_0000));
    module.set_rebase_delta(ctx, -0x1000);
    ir.add_module(ctx, module);

    let text = Section::new(ctx, ".text");
    text.add_flag(ctx, SectionFlag::Readable);
    text.add_flag(ctx, SectionFlag::Executable);
    text.add_flag(ctx, SectionFlag::Loaded);
    module.add_section(ctx, text);

    let bytes = ByteInterval::new(ctx, Some(Addr(0x1000)), 6);
    bytes.set_contents(ctx, vec![0x90, 0x90, 0x90, 0xC3, 0x00, 0x00]);
    bytes.set_byte_order(ctx, ByteOrder::Little);
    text.add_byte_interval(ctx, bytes);

    let block = CodeBlock::new(ctx, 4);
    block.set_decode_mode(ctx, DecodeMode::Default);
    bytes.add_code_block(ctx, 0, block).expect("fits");
    let tail = DataBlock::new(ctx, 2);
    bytes.add_data_block(ctx, 4, tail).expect("fits");
    module.set_entry_point(ctx, Some(block));

    let main = Symbol::new(ctx, "main");
    main.set_referent(ctx, block.uuid(ctx));
    main.set_visibility(ctx, Visibility::Global);
    module.add_symbol(ctx, main);
    let end = Symbol::new(ctx, "main_end");
    end.set_referent(ctx, block.uuid(ctx));
    end.set_at_end(ctx, true);
    end.set_visibility(ctx, Visibility::Local);
    module.add_symbol(ctx, end);
    let absolute = Symbol::new(ctx, "image_base");
    absolute.set_address(ctx, Addr(0x40_0000));
    module.add_symbol(ctx, absolute);

    let external = ProxyBlock::new(ctx);
    module.add_proxy_block(ctx, external);

    let mut expr = SymbolicExpression::addr_const(main.uuid(ctx), 2);
    expr.attributes.insert(ExprAttribute::GotRelative);
    bytes.insert_symbolic_expression(ctx, 4, expr).expect("offset below size");

    let fall = EdgeLabel::new(EdgeType::Fallthrough, false, true);
    let call = EdgeLabel::new(EdgeType::Call, true, false);
    let block_id = block.uuid(ctx);
    let external_id = external.uuid(ctx);
    ir.cfg_mut(ctx).add_edge(block_id, external_id, call);
    ir.cfg_mut(ctx).add_edge(external_id, block_id, fall);

    ir.aux_data_mut(ctx)
        .set(
            "comments",
            &TypeExpr::mapping(TypeExpr::Offset, TypeExpr::String),
            &Value::mapping_of(vec![(
                Value::Offset(gtirb::Offset::new(block_id, 0)),
                Value::String("entry".into()),
            )]),
        )
        .expect("encodes");
    module
        .aux_data_mut(ctx)
        .set(
            "alignment",
            &TypeExpr::mapping(TypeExpr::Uuid, TypeExpr::Uint64),
            &Value::mapping_of(vec![(Value::Uuid(block_id), Value::U64(8))]),
        )
        .expect("encodes");
    // An entry nobody registered: must pass through untouched.
    module
        .aux_data_mut(ctx)
        .set_raw("vendorExtra", "widget<frob>", vec![0xDE, 0xAD]);

    (ir, module, bytes, block)
}

fn write_to_vec(ctx: &Context, ir: Ir) -> Vec<u8> {
    let mut out = Vec::new();
    ir.write(ctx, &mut out).expect("writes");
    out
}

#[test]
fn file_round_trip_preserves_the_graph() {
    let mut ctx = Context::new();
    let (ir, module, bytes, block) = build_rich_ir(&mut ctx);
    let module_uuid = module.uuid(&ctx);
    let interval_uuid = bytes.uuid(&ctx);
    let block_uuid = block.uuid(&ctx);

    let mut file = tempfile::tempfile().expect("temp file");
    ir.write(&ctx, &mut file).expect("writes");
    file.seek(SeekFrom::Start(0)).expect("seeks");

    let mut ctx2 = Context::new();
    let loaded = Ir::read(&mut ctx2, &mut file).expect("reads");
    assert!(loaded.warnings.is_empty(), "clean file loads clean: {:?}", loaded.warnings);
    let ir2 = loaded.ir;
    assert_eq!(ir2.version(&ctx2), SCHEMA_VERSION);
    assert_eq!(ir2.uuid(&ctx2), ir.uuid(&ctx));

    let m2 = ir2.modules(&ctx2)[0];
    assert_eq!(m2.uuid(&ctx2), module_uuid);
    assert_eq!(m2.name(&ctx2), "foo.exe");
    assert_eq!(m2.binary_path(&ctx2), "/opt/foo.exe");
    assert_eq!(m2.file_format(&ctx2), FileFormat::Pe);
    assert_eq!(m2.isa(&ctx2), Isa::X64);
    assert_eq!(m2.byte_order(&ctx2), ByteOrder::Little);
    assert_eq!(m2.preferred_addr(&ctx2), Addr(0x40_0000));
    assert_eq!(m2.rebase_delta(&ctx2), -0x1000);

    let text2 = m2.sections(&ctx2)[0];
    assert_eq!(text2.name(&ctx2), ".text");
    assert_eq!(
        text2.flags(&ctx2),
        &BTreeSet::from([SectionFlag::Readable, SectionFlag::Executable, SectionFlag::Loaded])
    );

    let bi2 = text2.byte_intervals(&ctx2)[0];
    assert_eq!(bi2.uuid(&ctx2), interval_uuid);
    assert_eq!(bi2.address(&ctx2), Some(Addr(0x1000)));
    assert_eq!(bi2.size(&ctx2), 6);
    assert_eq!(bi2.contents(&ctx2), &[0x90, 0x90, 0x90, 0xC3, 0x00, 0x00]);

    let block2 = match ctx2.find(&block_uuid) {
        Some(Node::CodeBlock(cb)) => cb,
        other => panic!("code block UUID resolves to {:?}", other),
    };
    assert_eq!(block2.address(&ctx2), Some(Addr(0x1000)));
    assert_eq!(
        block2.bytes::<u8>(&ctx2, ByteOrder::Undefined),
        Some(vec![0x90, 0x90, 0x90, 0xC3])
    );
    assert_eq!(m2.entry_point(&ctx2).map(|cb| cb.uuid(&ctx2)), Some(block_uuid));

    // Symbols, including derived addresses reconstructed through indices.
    assert_eq!(m2.find_symbols(&ctx2, "main").len(), 1);
    let end2 = m2.find_symbols(&ctx2, "main_end")[0];
    assert!(end2.at_end(&ctx2));
    assert_eq!(end2.visibility(&ctx2), Visibility::Local);
    assert_eq!(end2.address(&ctx2), Some(Addr(0x1004)));
    assert_eq!(m2.find_symbols_at(&ctx2, Addr(0x1004)), vec![end2]);
    let abs2 = m2.find_symbols(&ctx2, "image_base")[0];
    assert_eq!(abs2.payload(&ctx2), Some(SymbolPayload::Addr(Addr(0x40_0000))));

    // Symbolic expression with its attribute set.
    let expr2 = bi2.symbolic_expression(&ctx2, 4).expect("expression survives");
    assert!(expr2.attributes.contains(&ExprAttribute::GotRelative));
    let main2 = m2.find_symbols(&ctx2, "main")[0];
    assert_eq!(expr2.symbols(), vec![main2.uuid(&ctx2)]);

    // CFG equality is label-set equality.
    assert_eq!(ir.cfg(&ctx), ir2.cfg(&ctx2));

    // AuxData at both levels, known and unknown.
    let alignment = m2.aux_data(&ctx2).get("alignment").expect("decodes").expect("present");
    assert_eq!(alignment.mapping_get(&Value::Uuid(block_uuid)), Some(&Value::U64(8)));
    assert!(ir2.aux_data(&ctx2).get("comments").expect("decodes").is_some());
    assert_eq!(
        m2.aux_data(&ctx2).raw("vendorExtra"),
        Some(("widget<frob>", &[0xDE, 0xAD][..]))
    );
}

#[test]
fn write_read_write_is_byte_identical() {
    let mut ctx = Context::new();
    let (ir, ..) = build_rich_ir(&mut ctx);
    let first = write_to_vec(&ctx, ir);

    let mut ctx2 = Context::new();
    let loaded = Ir::read(&mut ctx2, &mut first.as_slice()).expect("reads");
    let second = write_to_vec(&ctx2, loaded.ir);
    assert_eq!(first, second);

    // And once more, for fixpoint rather than coincidence.
    let mut ctx3 = Context::new();
    let again = Ir::read(&mut ctx3, &mut second.as_slice()).expect("reads");
    assert_eq!(write_to_vec(&ctx3, again.ir), second);
}

#[test]
fn alignment_aux_data_round_trip() {
    let mut ctx = Context::new();
    let ir = Ir::new(&mut ctx);
    let module = Module::new(&mut ctx, "m");
    ir.add_module(&mut ctx, module);
    let section = Section::new(&mut ctx, ".data");
    module.add_section(&mut ctx, section);
    let bi = ByteInterval::new(&mut ctx, Some(Addr(0x2000)), 8);
    section.add_byte_interval(&mut ctx, bi);
    let b1 = DataBlock::new(&mut ctx, 8);
    bi.add_data_block(&mut ctx, 0, b1).expect("fits");
    let b1_uuid = b1.uuid(&ctx);

    module
        .aux_data_mut(&mut ctx)
        .set(
            "alignment",
            &TypeExpr::mapping(TypeExpr::Uuid, TypeExpr::Uint64),
            &Value::mapping_of(vec![(Value::Uuid(b1_uuid), Value::U64(8))]),
        )
        .expect("encodes");

    let encoded = write_to_vec(&ctx, ir);
    let mut ctx2 = Context::new();
    let loaded = Ir::read(&mut ctx2, &mut encoded.as_slice()).expect("reads");
    let m2 = loaded.ir.modules(&ctx2)[0];
    let value = m2.aux_data(&ctx2).get("alignment").expect("decodes").expect("present");
    assert_eq!(value.mapping_get(&Value::Uuid(b1_uuid)), Some(&Value::U64(8)));
}

#[test]
fn empty_ir_round_trips() {
    let mut ctx = Context::new();
    let ir = Ir::new(&mut ctx);
    let bytes = write_to_vec(&ctx, ir);
    assert_eq!(&bytes[..5], b"GTIRB");
    assert_eq!(bytes[5..7], [0, 0]);
    assert_eq!(bytes[7], SCHEMA_VERSION);

    let mut ctx2 = Context::new();
    let loaded = Ir::read(&mut ctx2, &mut bytes.as_slice()).expect("reads");
    assert!(loaded.warnings.is_empty());
    assert!(loaded.ir.modules(&ctx2).is_empty());
    assert_eq!(write_to_vec(&ctx2, loaded.ir), bytes);
}
