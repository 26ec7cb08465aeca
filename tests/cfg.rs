//! CFG semantics: labeled multigraph with set-like edge identity, and the
//! deliberate decoupling from block containment.

use gtirb::{
    Addr, Block, ByteInterval, ChangeStatus, CodeBlock, Context, EdgeLabel, EdgeType, Ir,
    Module, ProxyBlock, Section,
};
use uuid::Uuid;

fn label(kind: EdgeType) -> EdgeLabel {
    EdgeLabel::new(kind, false, true)
}

#[test]
fn edges_are_set_like_per_label() {
    let mut ctx = Context::new();
    let ir = Ir::new(&mut ctx);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();

    let cfg = ir.cfg_mut(&mut ctx);
    assert_eq!(cfg.add_edge(a, b, label(EdgeType::Branch)), ChangeStatus::Accepted);
    assert_eq!(cfg.add_edge(a, b, label(EdgeType::Branch)), ChangeStatus::NoChange);
    // Same endpoints, different label: a parallel edge.
    assert_eq!(cfg.add_edge(a, b, label(EdgeType::Call)), ChangeStatus::Accepted);
    assert_eq!(cfg.edge_count(), 2);

    assert_eq!(cfg.remove_edge(a, b, label(EdgeType::Branch)), ChangeStatus::Accepted);
    assert_eq!(cfg.remove_edge(a, b, label(EdgeType::Branch)), ChangeStatus::NoChange);
    assert_eq!(cfg.out_edges(&a), vec![(b, label(EdgeType::Call))]);
    assert_eq!(cfg.in_edges(&b), vec![(a, label(EdgeType::Call))]);
    assert!(cfg.out_edges(&b).is_empty());
}

#[test]
fn equality_is_order_independent() {
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let c = Uuid::new_v4();

    let mut ctx = Context::new();
    let x = Ir::new(&mut ctx);
    x.cfg_mut(&mut ctx).add_edge(a, b, label(EdgeType::Branch));
    x.cfg_mut(&mut ctx).add_edge(b, c, label(EdgeType::Fallthrough));

    let y = Ir::new(&mut ctx);
    y.cfg_mut(&mut ctx).add_edge(b, c, label(EdgeType::Fallthrough));
    y.cfg_mut(&mut ctx).add_edge(a, b, label(EdgeType::Branch));

    assert_eq!(x.cfg(&ctx), y.cfg(&ctx));
    y.cfg_mut(&mut ctx).add_edge(c, a, label(EdgeType::Return));
    assert_ne!(x.cfg(&ctx), y.cfg(&ctx));
}

#[test]
fn detaching_a_block_leaves_incident_edges() {
    let mut ctx = Context::new();
    let ir = Ir::new(&mut ctx);
    let module = Module::new(&mut ctx, "m");
    ir.add_module(&mut ctx, module);
    let section = Section::new(&mut ctx, ".text");
    module.add_section(&mut ctx, section);
    let bi = ByteInterval::new(&mut ctx, Some(Addr(0x1000)), 0x10);
    section.add_byte_interval(&mut ctx, bi);

    let entry = CodeBlock::new(&mut ctx, 4);
    bi.add_code_block(&mut ctx, 0, entry).expect("fits");
    let tail = CodeBlock::new(&mut ctx, 4);
    bi.add_code_block(&mut ctx, 4, tail).expect("fits");
    let external = ProxyBlock::new(&mut ctx);
    module.add_proxy_block(&mut ctx, external);

    let entry_id = entry.uuid(&ctx);
    let tail_id = tail.uuid(&ctx);
    let external_id = external.uuid(&ctx);
    let fall = EdgeLabel::new(EdgeType::Fallthrough, false, true);
    let call = EdgeLabel::new(EdgeType::Call, false, true);
    ir.cfg_mut(&mut ctx).add_edge(entry_id, tail_id, fall);
    ir.cfg_mut(&mut ctx).add_edge(tail_id, external_id, call);

    // Detach-and-reattach is a normal rewriting move; the graph must not
    // self-edit underneath it.
    bi.remove_block(&mut ctx, Block::Code(tail));
    assert_eq!(ir.cfg(&ctx).edge_count(), 2);
    assert_eq!(ir.cfg(&ctx).out_edges(&tail_id), vec![(external_id, call)]);

    bi.add_code_block(&mut ctx, 4, tail).expect("fits again");
    assert_eq!(ir.cfg(&ctx).in_edges(&tail_id), vec![(entry_id, fall)]);
}

#[test]
fn conditional_and_direct_flags_distinguish_labels() {
    let mut ctx = Context::new();
    let ir = Ir::new(&mut ctx);
    let a = Uuid::new_v4();
    let b = Uuid::new_v4();
    let cfg = ir.cfg_mut(&mut ctx);

    cfg.add_edge(a, b, EdgeLabel::new(EdgeType::Branch, true, true));
    assert_eq!(
        cfg.add_edge(a, b, EdgeLabel::new(EdgeType::Branch, false, true)),
        ChangeStatus::Accepted,
        "conditionality is part of edge identity"
    );
    assert_eq!(
        cfg.add_edge(a, b, EdgeLabel::new(EdgeType::Branch, true, false)),
        ChangeStatus::Accepted
    );
    assert_eq!(cfg.edge_count(), 3);
}
