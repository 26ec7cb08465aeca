//! The framed on-disk envelope and the graph <-> message codec.
//!
//! ```text
//! Envelope: b"GTIRB" | reserved(2 bytes, zero) | version(u8) | IR message
//! ```
//!
//! The writer is a deterministic depth-first walk: modules in insertion
//! order, sections and intervals in insertion order, blocks in ascending
//! offset, AuxData entries in name order, CFG vertices in traversal order
//! and edges in insertion order. Reading materializes the graph in two
//! passes: the first allocates every node and registers its UUID, the
//! second resolves cross-references, accumulating integrity warnings for
//! anything dangling.

pub(crate) mod msg;
pub(crate) mod v0;

use std::path::Path;

use log::{debug, warn};
use uuid::Uuid;

use crate::addr::{Addr, ByteOrder};
use crate::context::Context;
use crate::error::{DecodeError, EnvelopeError, Error, IntegrityWarning};
use crate::ir::block::DecodeMode;
use crate::ir::cfg::{EdgeLabel, EdgeType};
use crate::ir::module::{FileFormat, Isa};
use crate::ir::section::SectionFlag;
use crate::ir::symbol::{SymbolPayload, Visibility};
use crate::ir::symexpr::{ExprAttribute, ExprKind, SymbolicExpression};
use crate::ir::LoadResult;
use crate::node::{Block, ByteInterval, CodeBlock, DataBlock, Ir, Module, Node, ProxyBlock, Section, Symbol};

use msg::{
    AuxEntryMsg, BlockKindMsg, BlockMsg, CfgMsg, EdgeMsg, ExprEntryMsg, ExprKindMsg, ExprMsg,
    IntervalMsg, IrMsg, ModuleMsg, PayloadMsg, ProxyMsg, SectionMsg, SymbolMsg,
};

pub const MAGIC: &[u8; 5] = b"GTIRB";
/// Current envelope schema version.
pub const SCHEMA_VERSION: u8 = 1;
/// Oldest version the upgrade pipeline still reads.
pub const OLDEST_VERSION: u8 = 0;

const HEADER_LEN: usize = MAGIC.len() + 3;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

fn split_envelope(bytes: &[u8]) -> Result<(u8, &[u8]), EnvelopeError> {
    if bytes.len() < HEADER_LEN {
        return Err(EnvelopeError::TruncatedHeader { got: bytes.len(), need: HEADER_LEN });
    }
    if &bytes[..MAGIC.len()] != MAGIC {
        return Err(EnvelopeError::BadMagic);
    }
    let version = bytes[HEADER_LEN - 1];
    Ok((version, &bytes[HEADER_LEN..]))
}

fn frame(version: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[0, 0, version]);
    out.extend_from_slice(payload);
    out
}

/// Decodes an envelope into a live IR, upgrading old versions in flight.
pub(crate) fn read_envelope(ctx: &mut Context, bytes: &[u8]) -> Result<LoadResult, Error> {
    let (version, payload) = split_envelope(bytes)?;
    let ir_msg = decode_versioned(version, payload)?;
    let result = materialize(ctx, &ir_msg)?;
    for warning in &result.warnings {
        warn!("integrity: {warning}");
    }
    Ok(result)
}

fn decode_versioned(version: u8, payload: &[u8]) -> Result<IrMsg, Error> {
    match version {
        SCHEMA_VERSION => Ok(msg::decode_ir(payload)?),
        OLDEST_VERSION => {
            debug!("upgrading envelope from schema version 0");
            let legacy = v0::decode_ir_v0(payload)?;
            Ok(v0::upgrade_ir(legacy)?)
        }
        other => Err(EnvelopeError::UnknownVersion { version: other }.into()),
    }
}

/// Encodes a live IR into envelope bytes at the current schema version.
pub(crate) fn write_envelope(ctx: &Context, ir: Ir) -> Result<Vec<u8>, Error> {
    let ir_msg = build_ir_msg(ctx, ir);
    Ok(frame(SCHEMA_VERSION, &msg::encode_ir(&ir_msg)))
}

/// Offline file migration: rewrites `path_in` at the current schema version.
/// Current-version files are copied through byte-identically.
pub fn upgrade(path_in: impl AsRef<Path>, path_out: impl AsRef<Path>) -> Result<(), Error> {
    let bytes = std::fs::read(path_in)?;
    let (version, payload) = split_envelope(&bytes)?;
    let out = match version {
        SCHEMA_VERSION => bytes,
        _ => {
            let ir_msg = decode_versioned(version, payload)?;
            frame(SCHEMA_VERSION, &msg::encode_ir(&ir_msg))
        }
    };
    std::fs::write(path_out, out)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Graph -> message
// ---------------------------------------------------------------------------

fn build_ir_msg(ctx: &Context, ir: Ir) -> IrMsg {
    let data = ctx.ir(ir);
    IrMsg {
        uuid: Some(data.uuid),
        modules: data.modules.iter().map(|&m| build_module_msg(ctx, m)).collect(),
        cfg: build_cfg_msg(ctx, ir),
        aux: build_aux_entries(&data.aux),
    }
}

fn build_aux_entries(table: &crate::auxdata::AuxDataTable) -> Vec<AuxEntryMsg> {
    table
        .iter()
        .map(|(name, entry)| AuxEntryMsg {
            name: name.to_owned(),
            type_name: entry.type_name().to_owned(),
            data: entry.raw_bytes().to_vec(),
        })
        .collect()
}

fn build_module_msg(ctx: &Context, module: Module) -> ModuleMsg {
    let data = ctx.module(module);
    ModuleMsg {
        uuid: Some(data.uuid),
        name: data.name.clone(),
        binary_path: data.binary_path.clone(),
        preferred_addr: data.preferred_addr.0,
        rebase_delta: data.rebase_delta,
        file_format: data.file_format.wire_tag(),
        isa: data.isa.wire_tag(),
        byte_order: data.byte_order.wire_tag(),
        entry_point: data.entry_point.map(|cb| cb.uuid(ctx)),
        proxies: data
            .proxy_blocks
            .iter()
            .map(|&pb| ProxyMsg { uuid: Some(pb.uuid(ctx)) })
            .collect(),
        sections: data.sections.iter().map(|&s| build_section_msg(ctx, s)).collect(),
        symbols: data.symbols.iter().map(|&s| build_symbol_msg(ctx, s)).collect(),
        aux: build_aux_entries(&data.aux),
    }
}

fn build_section_msg(ctx: &Context, section: Section) -> SectionMsg {
    let data = ctx.section(section);
    SectionMsg {
        uuid: Some(data.uuid),
        name: data.name.clone(),
        flags: data.flags.iter().map(|f| f.wire_tag()).collect(),
        intervals: data.intervals.iter().map(|&bi| build_interval_msg(ctx, bi)).collect(),
    }
}

fn build_interval_msg(ctx: &Context, bi: ByteInterval) -> IntervalMsg {
    let data = ctx.interval(bi);
    let mut blocks = Vec::new();
    for (&offset, list) in &data.blocks {
        for block in list {
            let kind = match *block {
                Block::Code(cb) => {
                    let cd = ctx.code_block(cb);
                    BlockKindMsg::Code {
                        uuid: cd.uuid,
                        size: cd.size,
                        decode_mode: cd.decode_mode.wire_tag(),
                    }
                }
                Block::Data(db) => {
                    let dd = ctx.data_block(db);
                    BlockKindMsg::Data { uuid: dd.uuid, size: dd.size }
                }
            };
            blocks.push(BlockMsg { offset, kind });
        }
    }
    IntervalMsg {
        uuid: Some(data.uuid),
        address: data.address.map(|a| a.0),
        size: data.size,
        contents: data.contents.clone(),
        byte_order: data.order.wire_tag(),
        blocks,
        exprs: data
            .exprs
            .iter()
            .map(|(&offset, expr)| ExprEntryMsg { offset, expr: build_expr_msg(expr) })
            .collect(),
    }
}

fn build_expr_msg(expr: &SymbolicExpression) -> ExprMsg {
    ExprMsg {
        attrs: expr.attributes.iter().map(|a| a.wire_tag()).collect(),
        kind: Some(match expr.kind {
            ExprKind::AddrConst { symbol, offset } => ExprKindMsg::AddrConst { symbol, offset },
            ExprKind::AddrAddr { sym1, sym2, scale, offset } => {
                ExprKindMsg::AddrAddr { sym1, sym2, scale, offset }
            }
            ExprKind::SymConst { symbol, offset } => ExprKindMsg::SymConst { symbol, offset },
        }),
    }
}

fn build_symbol_msg(ctx: &Context, sym: Symbol) -> SymbolMsg {
    let data = ctx.symbol(sym);
    SymbolMsg {
        uuid: Some(data.uuid),
        name: data.name.clone(),
        at_end: data.at_end,
        visibility: data.visibility.wire_tag(),
        payload: data.payload.map(|p| match p {
            SymbolPayload::Addr(a) => PayloadMsg::Value(a.0),
            SymbolPayload::Referent(uuid) => PayloadMsg::Referent(uuid),
        }),
    }
}

fn build_cfg_msg(ctx: &Context, ir: Ir) -> CfgMsg {
    // The vertex set is by definition the code and proxy blocks of the IR,
    // listed in traversal order so output is stable.
    let mut vertices = Vec::new();
    for &module in &ctx.ir(ir).modules {
        for &section in &ctx.module(module).sections {
            for &bi in &ctx.section(section).intervals {
                for list in ctx.interval(bi).blocks.values() {
                    for block in list {
                        if let Block::Code(cb) = *block {
                            vertices.push(cb.uuid(ctx));
                        }
                    }
                }
            }
        }
        for &pb in &ctx.module(module).proxy_blocks {
            vertices.push(pb.uuid(ctx));
        }
    }
    let edges = ctx
        .ir(ir)
        .cfg
        .edges()
        .map(|(source, target, label)| EdgeMsg {
            source: Some(source),
            target: Some(target),
            kind: label.kind.wire_tag(),
            conditional: label.conditional,
            direct: label.direct,
        })
        .collect();
    CfgMsg { vertices, edges }
}

// ---------------------------------------------------------------------------
// Message -> graph
// ---------------------------------------------------------------------------

fn bad_tag(tag: u64, context: &'static str) -> Error {
    DecodeError::BadEnumTag { tag, context }.into()
}

fn materialize(ctx: &mut Context, ir_msg: &IrMsg) -> Result<LoadResult, Error> {
    let mut warnings = Vec::new();

    // Pass 1: allocate every node, register UUIDs, build containment.
    let ir = Ir::with_uuid(ctx, ir_msg.uuid.expect("decoder enforces uuid"))?;
    for entry in &ir_msg.aux {
        ir.aux_data_mut(ctx).set_raw(entry.name.clone(), entry.type_name.clone(), entry.data.clone());
    }

    let mut modules: Vec<Module> = Vec::with_capacity(ir_msg.modules.len());
    for mmsg in &ir_msg.modules {
        let module = materialize_module(ctx, ir, mmsg)?;
        modules.push(module);
    }

    // Symbols allocate before any payload resolves; a referent may name a
    // symbol of a later module.
    let mut symbol_handles: Vec<Vec<Symbol>> = Vec::with_capacity(ir_msg.modules.len());
    for mmsg in &ir_msg.modules {
        let mut handles = Vec::with_capacity(mmsg.symbols.len());
        for smsg in &mmsg.symbols {
            handles.push(Symbol::with_uuid(
                ctx,
                smsg.uuid.expect("decoder enforces uuid"),
                smsg.name.as_str(),
            )?);
        }
        symbol_handles.push(handles);
    }

    // Pass 2: resolve cross-references now that every UUID is registered.
    for ((module, mmsg), handles) in modules.iter().zip(&ir_msg.modules).zip(&symbol_handles) {
        materialize_symbols(ctx, *module, mmsg, handles, &mut warnings)?;
        resolve_entry_point(ctx, *module, mmsg, &mut warnings);
    }
    materialize_cfg(ctx, ir, &ir_msg.cfg, &mut warnings)?;
    check_expression_symbols(ctx, ir, &mut warnings);

    Ok(LoadResult { ir, warnings })
}

fn materialize_module(ctx: &mut Context, ir: Ir, mmsg: &ModuleMsg) -> Result<Module, Error> {
    let module = Module::with_uuid(ctx, mmsg.uuid.expect("decoder enforces uuid"), mmsg.name.as_str())?;
    module.set_binary_path(ctx, mmsg.binary_path.as_str());
    module.set_preferred_addr(ctx, Addr(mmsg.preferred_addr));
    module.set_rebase_delta(ctx, mmsg.rebase_delta);
    module.set_file_format(
        ctx,
        FileFormat::from_wire_tag(mmsg.file_format)
            .ok_or_else(|| bad_tag(mmsg.file_format, "FileFormat"))?,
    );
    module.set_isa(ctx, Isa::from_wire_tag(mmsg.isa).ok_or_else(|| bad_tag(mmsg.isa, "ISA"))?);
    module.set_byte_order(
        ctx,
        ByteOrder::from_wire_tag(mmsg.byte_order)
            .ok_or_else(|| bad_tag(mmsg.byte_order, "ByteOrder"))?,
    );
    ir.add_module(ctx, module);

    for entry in &mmsg.aux {
        module
            .aux_data_mut(ctx)
            .set_raw(entry.name.clone(), entry.type_name.clone(), entry.data.clone());
    }
    for pmsg in &mmsg.proxies {
        let pb = ProxyBlock::with_uuid(ctx, pmsg.uuid.expect("decoder enforces uuid"))?;
        module.add_proxy_block(ctx, pb);
    }
    for smsg in &mmsg.sections {
        let section = materialize_section(ctx, smsg)?;
        module.add_section(ctx, section);
    }
    Ok(module)
}

fn materialize_section(ctx: &mut Context, smsg: &SectionMsg) -> Result<Section, Error> {
    let section = Section::with_uuid(ctx, smsg.uuid.expect("decoder enforces uuid"), smsg.name.as_str())?;
    for &tag in &smsg.flags {
        let flag = SectionFlag::from_wire_tag(tag).ok_or_else(|| bad_tag(tag, "SectionFlag"))?;
        section.add_flag(ctx, flag);
    }
    for imsg in &smsg.intervals {
        let bi = materialize_interval(ctx, imsg)?;
        section.add_byte_interval(ctx, bi);
    }
    Ok(section)
}

fn materialize_interval(ctx: &mut Context, imsg: &IntervalMsg) -> Result<ByteInterval, Error> {
    let bi = ByteInterval::with_uuid(
        ctx,
        imsg.uuid.expect("decoder enforces uuid"),
        imsg.address.map(Addr),
        imsg.size,
    )?;
    bi.set_contents(ctx, imsg.contents.clone());
    bi.set_byte_order(
        ctx,
        ByteOrder::from_wire_tag(imsg.byte_order)
            .ok_or_else(|| bad_tag(imsg.byte_order, "ByteOrder"))?,
    );
    for bmsg in &imsg.blocks {
        match bmsg.kind {
            BlockKindMsg::Code { uuid, size, decode_mode } => {
                let cb = CodeBlock::with_uuid(ctx, uuid, size)?;
                let mode = DecodeMode::from_wire_tag(decode_mode)
                    .ok_or_else(|| bad_tag(decode_mode, "DecodeMode"))?;
                cb.set_decode_mode(ctx, mode);
                bi.add_code_block(ctx, bmsg.offset, cb)?;
            }
            BlockKindMsg::Data { uuid, size } => {
                let db = DataBlock::with_uuid(ctx, uuid, size)?;
                bi.add_data_block(ctx, bmsg.offset, db)?;
            }
        }
    }
    for emsg in &imsg.exprs {
        let expr = materialize_expr(&emsg.expr)?;
        bi.insert_symbolic_expression(ctx, emsg.offset, expr)?;
    }
    Ok(bi)
}

fn materialize_expr(emsg: &ExprMsg) -> Result<SymbolicExpression, Error> {
    let kind = match *emsg.kind.as_ref().expect("decoder enforces kind") {
        ExprKindMsg::AddrConst { symbol, offset } => ExprKind::AddrConst { symbol, offset },
        ExprKindMsg::AddrAddr { sym1, sym2, scale, offset } => {
            ExprKind::AddrAddr { sym1, sym2, scale, offset }
        }
        ExprKindMsg::SymConst { symbol, offset } => ExprKind::SymConst { symbol, offset },
    };
    let mut expr = SymbolicExpression::new(kind);
    for &tag in &emsg.attrs {
        let attr =
            ExprAttribute::from_wire_tag(tag).ok_or_else(|| bad_tag(tag, "ExprAttribute"))?;
        expr.attributes.insert(attr);
    }
    Ok(expr)
}

fn materialize_symbols(
    ctx: &mut Context,
    module: Module,
    mmsg: &ModuleMsg,
    handles: &[Symbol],
    warnings: &mut Vec<IntegrityWarning>,
) -> Result<(), Error> {
    for (smsg, &sym) in mmsg.symbols.iter().zip(handles) {
        let uuid = smsg.uuid.expect("decoder enforces uuid");
        sym.set_at_end(ctx, smsg.at_end);
        sym.set_visibility(
            ctx,
            Visibility::from_wire_tag(smsg.visibility)
                .ok_or_else(|| bad_tag(smsg.visibility, "Visibility"))?,
        );
        match smsg.payload {
            Some(PayloadMsg::Value(v)) => sym.set_address(ctx, Addr(v)),
            Some(PayloadMsg::Referent(referent)) => {
                if ctx.find(&referent).is_some() {
                    sym.set_referent(ctx, referent);
                } else {
                    // Leave the payload empty; the UUID is unrecoverable.
                    warnings.push(IntegrityWarning::DanglingReferent { symbol: uuid, referent });
                }
            }
            None => {}
        }
        module.add_symbol(ctx, sym);
    }
    Ok(())
}

fn resolve_entry_point(
    ctx: &mut Context,
    module: Module,
    mmsg: &ModuleMsg,
    warnings: &mut Vec<IntegrityWarning>,
) {
    if let Some(entry) = mmsg.entry_point {
        match ctx.find(&entry) {
            Some(Node::CodeBlock(cb)) => module.set_entry_point(ctx, Some(cb)),
            _ => warnings.push(IntegrityWarning::DanglingEntryPoint {
                module: module.uuid(ctx),
                entry,
            }),
        }
    }
}

fn is_cfg_endpoint(ctx: &Context, uuid: &Uuid) -> bool {
    matches!(ctx.find(uuid), Some(Node::CodeBlock(_)) | Some(Node::ProxyBlock(_)))
}

fn materialize_cfg(
    ctx: &mut Context,
    ir: Ir,
    cmsg: &CfgMsg,
    warnings: &mut Vec<IntegrityWarning>,
) -> Result<(), Error> {
    for vertex in &cmsg.vertices {
        if is_cfg_endpoint(ctx, vertex) {
            ir.cfg_mut(ctx).add_vertex(*vertex);
        }
    }
    for emsg in &cmsg.edges {
        let source = emsg.source.expect("decoder enforces source");
        let target = emsg.target.expect("decoder enforces target");
        let mut dangling = false;
        for endpoint in [source, target] {
            if !is_cfg_endpoint(ctx, &endpoint) {
                warnings.push(IntegrityWarning::DanglingCfgEndpoint { endpoint });
                dangling = true;
            }
        }
        if dangling {
            continue;
        }
        let kind = EdgeType::from_wire_tag(emsg.kind).ok_or_else(|| bad_tag(emsg.kind, "EdgeType"))?;
        ir.cfg_mut(ctx)
            .add_edge(source, target, EdgeLabel::new(kind, emsg.conditional, emsg.direct));
    }
    Ok(())
}

fn check_expression_symbols(ctx: &Context, ir: Ir, warnings: &mut Vec<IntegrityWarning>) {
    for &module in ir.modules(ctx) {
        for &section in module.sections(ctx).iter() {
            for &bi in section.byte_intervals(ctx).iter() {
                for (offset, expr) in bi.symbolic_expressions(ctx) {
                    for symbol in expr.symbols() {
                        if !matches!(ctx.find(&symbol), Some(Node::Symbol(_))) {
                            warnings.push(IntegrityWarning::DanglingExpressionSymbol {
                                interval: bi.uuid(ctx),
                                offset,
                                symbol,
                            });
                        }
                    }
                }
            }
        }
    }
}
