//! Tests that build IR graphs through the API directly and verify the
//! structural invariants: parent back-references, derived addresses, the
//! tri-state container protocol, and typed byte access.

use gtirb::{
    Addr, Block, ByteInterval, ByteOrder, ChangeStatus, CodeBlock, Context, DataBlock, Ir,
    Module, Node, ProxyBlock, Section, UsageError,
};

/// One module with one `.text` section holding an addressed interval.
fn text_fixture(ctx: &mut Context) -> (Ir, Module, Section, ByteInterval) {
    let ir = Ir::new(ctx);
    let module = Module::new(ctx, "fixture");
    ir.add_module(ctx, module);
    let text = Section::new(ctx, ".text");
    module.add_section(ctx, text);
    let bytes = ByteInterval::new(ctx, Some(Addr(0x1000)), 0x100);
    text.add_byte_interval(ctx, bytes);
    (ir, module, text, bytes)
}

#[test]
fn parents_track_containment() {
    let mut ctx = Context::new();
    let (ir, module, text, bytes) = text_fixture(&mut ctx);

    assert_eq!(module.ir(&ctx), Some(ir));
    assert_eq!(text.module(&ctx), Some(module));
    assert_eq!(bytes.section(&ctx), Some(text));

    let cb = CodeBlock::new(&mut ctx, 4);
    assert_eq!(cb.byte_interval(&ctx), None);
    bytes.add_code_block(&mut ctx, 0x10, cb).expect("in bounds");
    assert_eq!(cb.byte_interval(&ctx), Some(bytes));
    assert_eq!(cb.offset(&ctx), 0x10);

    bytes.remove_block(&mut ctx, Block::Code(cb));
    assert_eq!(cb.byte_interval(&ctx), None);
    // The handle is still alive in the arena after detachment.
    assert_eq!(ctx.find(&cb.uuid(&ctx)), Some(Node::CodeBlock(cb)));
}

#[test]
fn add_child_is_tri_state() {
    let mut ctx = Context::new();
    let ir = Ir::new(&mut ctx);
    let module = Module::new(&mut ctx, "m");
    assert_eq!(ir.add_module(&mut ctx, module), ChangeStatus::Accepted);
    assert_eq!(ir.add_module(&mut ctx, module), ChangeStatus::NoChange);

    let other = Ir::new(&mut ctx);
    assert_eq!(other.add_module(&mut ctx, module), ChangeStatus::Rejected);
    assert_eq!(module.ir(&ctx), Some(ir));

    assert_eq!(ir.remove_module(&mut ctx, module), ChangeStatus::Accepted);
    assert_eq!(ir.remove_module(&mut ctx, module), ChangeStatus::NoChange);
    assert_eq!(module.ir(&ctx), None);
}

#[test]
fn block_addresses_derive_from_interval() {
    let mut ctx = Context::new();
    let (_, _, _, bytes) = text_fixture(&mut ctx);

    let cb = CodeBlock::new(&mut ctx, 4);
    bytes.add_code_block(&mut ctx, 0x20, cb).expect("in bounds");
    assert_eq!(cb.address(&ctx), Some(Addr(0x1020)));

    bytes.set_address(&mut ctx, Some(Addr(0x4000)));
    assert_eq!(cb.address(&ctx), Some(Addr(0x4020)));

    bytes.set_address(&mut ctx, None);
    assert_eq!(cb.address(&ctx), None);
}

#[test]
fn block_extent_is_checked() {
    let mut ctx = Context::new();
    let (_, _, _, bytes) = text_fixture(&mut ctx);

    let cb = CodeBlock::new(&mut ctx, 0x200);
    let err = bytes.add_code_block(&mut ctx, 0, cb).expect_err("overruns");
    assert_eq!(
        err,
        UsageError::BlockExtent { offset: 0, size: 0x200, interval_size: 0x100 }
    );
    // Rejected insertion leaves both sides untouched.
    assert_eq!(cb.byte_interval(&ctx), None);
    assert_eq!(bytes.block_count(&ctx), 0);

    let cb = CodeBlock::new(&mut ctx, 0x10);
    bytes.add_code_block(&mut ctx, 0xF0, cb).expect("exactly fits");
    assert!(cb.set_size(&mut ctx, 0x11).is_err());
    assert_eq!(cb.size(&ctx), 0x10, "rejected resize must not stick");
    cb.set_size(&mut ctx, 0x08).expect("shrinking is fine");
}

#[test]
fn interval_shrink_is_checked_against_children() {
    let mut ctx = Context::new();
    let (_, _, _, bytes) = text_fixture(&mut ctx);
    let db = DataBlock::new(&mut ctx, 8);
    bytes.add_data_block(&mut ctx, 0x40, db).expect("in bounds");

    let err = bytes.set_size(&mut ctx, 0x47).expect_err("cuts the block");
    assert_eq!(err, UsageError::IntervalShrink { new_size: 0x47, child_end: 0x48 });
    assert_eq!(bytes.size(&ctx), 0x100);

    bytes.set_size(&mut ctx, 0x48).expect("exactly covers the block");
}

#[test]
fn expression_offsets_are_bounded() {
    let mut ctx = Context::new();
    let (_, module, _, bytes) = text_fixture(&mut ctx);
    let sym = gtirb::Symbol::new(&mut ctx, "anchor");
    module.add_symbol(&mut ctx, sym);
    let expr = gtirb::SymbolicExpression::addr_const(sym.uuid(&ctx), 0);

    let err = bytes
        .insert_symbolic_expression(&mut ctx, 0x100, expr.clone())
        .expect_err("offset must be strictly below size");
    assert_eq!(err, UsageError::ExpressionOffset { offset: 0x100, interval_size: 0x100 });

    bytes.insert_symbolic_expression(&mut ctx, 0xFF, expr.clone()).expect("in bounds");
    assert_eq!(bytes.symbolic_expression(&ctx, 0xFF), Some(&expr));
    assert_eq!(bytes.remove_symbolic_expression(&mut ctx, 0xFF), Some(expr));
    assert_eq!(bytes.symbolic_expression(&ctx, 0xFF), None);
}

#[test]
fn zero_fill_past_contents() {
    let mut ctx = Context::new();
    let (_, _, _, bytes) = text_fixture(&mut ctx);
    bytes.set_contents(&mut ctx, vec![0x90, 0x90, 0x90, 0xC3]);

    assert_eq!(bytes.initialized_size(&ctx), 4);
    assert_eq!(bytes.size(&ctx), 0x100);
    let all = bytes.bytes::<u8>(&ctx, ByteOrder::Undefined);
    assert_eq!(all.len(), 0x100);
    assert_eq!(&all[..4], &[0x90, 0x90, 0x90, 0xC3]);
    assert!(all[4..].iter().all(|&b| b == 0));
}

#[test]
fn typed_byte_views_swap_per_element() {
    let mut ctx = Context::new();
    let (_, _, _, bytes) = text_fixture(&mut ctx);
    bytes.set_contents(&mut ctx, vec![0x01, 0x02, 0x03, 0x04]);

    let le = bytes.bytes_in::<u32>(&ctx, 0, 4, ByteOrder::Little);
    assert_eq!(le, vec![0x0403_0201]);
    let be = bytes.bytes_in::<u32>(&ctx, 0, 4, ByteOrder::Big);
    assert_eq!(be, vec![0x0102_0304]);

    // Writes land in the requested order and extend the payload.
    bytes
        .write_bytes::<u16>(&mut ctx, 6, &[0xBEEF], ByteOrder::Big)
        .expect("in bounds");
    assert_eq!(bytes.contents(&ctx), &[0x01, 0x02, 0x03, 0x04, 0, 0, 0xBE, 0xEF]);

    let err = bytes.write_bytes::<u64>(&mut ctx, 0xFC, &[1], ByteOrder::Little);
    assert!(err.is_err(), "write past the interval end must fail");
}

#[test]
fn code_block_bytes_view() {
    let mut ctx = Context::new();
    let (_, _, _, bytes) = text_fixture(&mut ctx);
    bytes.set_contents(&mut ctx, vec![0xAA, 0x90, 0x90, 0x90, 0xC3, 0xBB]);

    let cb = CodeBlock::new(&mut ctx, 4);
    bytes.add_code_block(&mut ctx, 1, cb).expect("in bounds");
    assert_eq!(
        cb.bytes::<u8>(&ctx, ByteOrder::Undefined),
        Some(vec![0x90, 0x90, 0x90, 0xC3])
    );

    let detached = CodeBlock::new(&mut ctx, 4);
    assert_eq!(detached.bytes::<u8>(&ctx, ByteOrder::Undefined), None);
}

#[test]
fn merged_block_view_is_address_ordered() {
    let mut ctx = Context::new();
    let (_, module, text, low) = text_fixture(&mut ctx);
    let high = ByteInterval::new(&mut ctx, Some(Addr(0x2000)), 0x40);
    text.add_byte_interval(&mut ctx, high);
    let data_section = Section::new(&mut ctx, ".data");
    module.add_section(&mut ctx, data_section);
    let mid = ByteInterval::new(&mut ctx, Some(Addr(0x1800)), 0x40);
    data_section.add_byte_interval(&mut ctx, mid);

    let b_low = CodeBlock::new(&mut ctx, 4);
    low.add_code_block(&mut ctx, 0x8, b_low).expect("fits");
    let b_mid = DataBlock::new(&mut ctx, 4);
    mid.add_data_block(&mut ctx, 0x0, b_mid).expect("fits");
    let b_high = CodeBlock::new(&mut ctx, 4);
    high.add_code_block(&mut ctx, 0x4, b_high).expect("fits");

    let walked: Vec<(Addr, Block)> = module.blocks(&ctx).collect();
    assert_eq!(
        walked,
        vec![
            (Addr(0x1008), Block::Code(b_low)),
            (Addr(0x1800), Block::Data(b_mid)),
            (Addr(0x2004), Block::Code(b_high)),
        ]
    );
}

#[test]
fn section_extent_spans_intervals() {
    let mut ctx = Context::new();
    let (_, _, text, _) = text_fixture(&mut ctx);
    assert_eq!(text.address(&ctx), Some(Addr(0x1000)));
    assert_eq!(text.size(&ctx), Some(0x100));

    let tail = ByteInterval::new(&mut ctx, Some(Addr(0x1400)), 0x80);
    text.add_byte_interval(&mut ctx, tail);
    assert_eq!(text.address(&ctx), Some(Addr(0x1000)));
    assert_eq!(text.size(&ctx), Some(0x480));

    let floating = Section::new(&mut ctx, ".float");
    let bi = ByteInterval::new(&mut ctx, None, 0x10);
    floating.add_byte_interval(&mut ctx, bi);
    assert_eq!(floating.address(&ctx), None);
    assert_eq!(floating.size(&ctx), None);
}

#[test]
fn duplicate_uuid_registration_fails() {
    let mut ctx = Context::new();
    let module = Module::new(&mut ctx, "m");
    let uuid = module.uuid(&ctx);
    let err = CodeBlock::with_uuid(&mut ctx, uuid, 4).expect_err("uuid is taken");
    assert_eq!(err, UsageError::DuplicateUuid { uuid });
}

#[test]
fn entry_point_and_proxies() {
    let mut ctx = Context::new();
    let (_, module, _, bytes) = text_fixture(&mut ctx);
    let cb = CodeBlock::new(&mut ctx, 4);
    bytes.add_code_block(&mut ctx, 0, cb).expect("fits");
    module.set_entry_point(&mut ctx, Some(cb));
    assert_eq!(module.entry_point(&ctx), Some(cb));

    let pb = ProxyBlock::new(&mut ctx);
    assert_eq!(module.add_proxy_block(&mut ctx, pb), ChangeStatus::Accepted);
    assert_eq!(module.add_proxy_block(&mut ctx, pb), ChangeStatus::NoChange);
    assert_eq!(module.proxy_blocks(&ctx), &[pb]);
    assert_eq!(module.remove_proxy_block(&mut ctx, pb), ChangeStatus::Accepted);
    assert_eq!(pb.module(&ctx), None);
}

#[test]
fn addr_arithmetic() {
    assert_eq!(Addr(0x1000) + 0x10, Addr(0x1010));
    assert_eq!(Addr(u64::MAX) + 1, Addr(0));
    assert_eq!(Addr(0x1010).distance(Addr(0x1000)), 0x10);
}
