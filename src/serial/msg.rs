//! Current-schema message shapes and their wire codec.
//!
//! Field numbers (wire type in parentheses: v = varint, l = len-delimited):
//!
//! ```text
//! Ir:        uuid=1(l) module=2(l,rep) cfg=3(l) aux_data=4(l,rep)
//! AuxEntry:  name=1(l) type_name=2(l) data=3(l)
//! Module:    uuid=1(l) name=2(l) binary_path=3(l) preferred_addr=4(v)
//!            rebase_delta=5(v,zigzag) file_format=6(v) isa=7(v)
//!            byte_order=8(v) entry_point=9(l) proxy=10(l,rep)
//!            section=11(l,rep) symbol=12(l,rep) aux_data=13(l,rep)
//! Proxy:     uuid=1(l)
//! Section:   uuid=1(l) name=2(l) flag=3(v,rep) interval=4(l,rep)
//! Interval:  uuid=1(l) has_address=2(v) address=3(v) size=4(v)
//!            contents=5(l) byte_order=6(v) block=7(l,rep)
//!            symbolic_expression=8(l,rep)
//! Block:     offset=1(v) code=2(l) | data=3(l)
//! CodeBlk:   uuid=1(l) size=2(v) decode_mode=3(v)
//! DataBlk:   uuid=1(l) size=2(v)
//! Symbol:    uuid=1(l) name=2(l) at_end=3(v) visibility=4(v)
//!            value=5(v) | referent=6(l)
//! ExprEntry: offset=1(v) expression=2(l)
//! Expr:      attribute=1(v,rep) addr_const=2(l) | addr_addr=3(l)
//!            | sym_const=4(l)
//! AddrConst: symbol=1(l) offset=2(v,zigzag)
//! AddrAddr:  sym1=1(l) sym2=2(l) scale=3(v,zigzag) offset=4(v,zigzag)
//! SymConst:  symbol=1(l) offset=2(v,zigzag)
//! Cfg:       vertex=1(l,rep) edge=2(l,rep)
//! Edge:      source=1(l) target=2(l) label=3(l)
//! Label:     type=1(v) conditional=2(v) direct=3(v)
//! ```
//!
//! Unknown fields are skipped on decode; the writer only ever emits the
//! fields above, in ascending field order, which is what makes the envelope
//! byte-stable across a read/write cycle.

use uuid::Uuid;

use crate::error::DecodeError;
use crate::proto::{
    encode_bool_field, encode_len_field, encode_message_field, encode_sint_field,
    encode_string_field, encode_varint_field, unzigzag, Reader,
};

#[derive(Debug, Default)]
pub(crate) struct IrMsg {
    pub uuid: Option<Uuid>,
    pub modules: Vec<ModuleMsg>,
    pub cfg: CfgMsg,
    pub aux: Vec<AuxEntryMsg>,
}

#[derive(Debug, Default)]
pub(crate) struct AuxEntryMsg {
    pub name: String,
    pub type_name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub(crate) struct ModuleMsg {
    pub uuid: Option<Uuid>,
    pub name: String,
    pub binary_path: String,
    pub preferred_addr: u64,
    pub rebase_delta: i64,
    pub file_format: u64,
    pub isa: u64,
    pub byte_order: u64,
    pub entry_point: Option<Uuid>,
    pub proxies: Vec<ProxyMsg>,
    pub sections: Vec<SectionMsg>,
    pub symbols: Vec<SymbolMsg>,
    pub aux: Vec<AuxEntryMsg>,
}

#[derive(Debug, Default)]
pub(crate) struct ProxyMsg {
    pub uuid: Option<Uuid>,
}

#[derive(Debug, Default)]
pub(crate) struct SectionMsg {
    pub uuid: Option<Uuid>,
    pub name: String,
    pub flags: Vec<u64>,
    pub intervals: Vec<IntervalMsg>,
}

#[derive(Debug, Default)]
pub(crate) struct IntervalMsg {
    pub uuid: Option<Uuid>,
    pub address: Option<u64>,
    pub size: u64,
    pub contents: Vec<u8>,
    pub byte_order: u64,
    pub blocks: Vec<BlockMsg>,
    pub exprs: Vec<ExprEntryMsg>,
}

#[derive(Debug)]
pub(crate) struct BlockMsg {
    pub offset: u64,
    pub kind: BlockKindMsg,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum BlockKindMsg {
    Code { uuid: Uuid, size: u64, decode_mode: u64 },
    Data { uuid: Uuid, size: u64 },
}

#[derive(Debug, Default)]
pub(crate) struct SymbolMsg {
    pub uuid: Option<Uuid>,
    pub name: String,
    pub at_end: bool,
    pub visibility: u64,
    pub payload: Option<PayloadMsg>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum PayloadMsg {
    Value(u64),
    Referent(Uuid),
}

#[derive(Debug, Default)]
pub(crate) struct ExprEntryMsg {
    pub offset: u64,
    pub expr: ExprMsg,
}

#[derive(Debug, Default)]
pub(crate) struct ExprMsg {
    pub attrs: Vec<u64>,
    pub kind: Option<ExprKindMsg>,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ExprKindMsg {
    AddrConst { symbol: Uuid, offset: i64 },
    AddrAddr { sym1: Uuid, sym2: Uuid, scale: i64, offset: i64 },
    SymConst { symbol: Uuid, offset: i64 },
}

#[derive(Debug, Default)]
pub(crate) struct CfgMsg {
    pub vertices: Vec<Uuid>,
    pub edges: Vec<EdgeMsg>,
}

#[derive(Debug, Default)]
pub(crate) struct EdgeMsg {
    pub source: Option<Uuid>,
    pub target: Option<Uuid>,
    pub kind: u64,
    pub conditional: bool,
    pub direct: bool,
}

fn require<T>(
    value: Option<T>,
    message: &'static str,
    name: &'static str,
) -> Result<T, DecodeError> {
    value.ok_or(DecodeError::MissingField { message, name })
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn uuid_field(field: u32, uuid: &Uuid) -> Vec<u8> {
    encode_len_field(field, uuid.as_bytes())
}

pub(crate) fn encode_ir(msg: &IrMsg) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(uuid_field(1, msg.uuid.as_ref().expect("writer always sets uuid")));
    for module in &msg.modules {
        out.extend(encode_message_field(2, &encode_module(module)));
    }
    out.extend(encode_message_field(3, &encode_cfg(&msg.cfg)));
    for entry in &msg.aux {
        out.extend(encode_message_field(4, &encode_aux_entry(entry)));
    }
    out
}

fn encode_aux_entry(msg: &AuxEntryMsg) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(encode_string_field(1, &msg.name));
    out.extend(encode_string_field(2, &msg.type_name));
    out.extend(encode_len_field(3, &msg.data));
    out
}

fn encode_module(msg: &ModuleMsg) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(uuid_field(1, msg.uuid.as_ref().expect("writer always sets uuid")));
    out.extend(encode_string_field(2, &msg.name));
    out.extend(encode_string_field(3, &msg.binary_path));
    out.extend(encode_varint_field(4, msg.preferred_addr));
    out.extend(encode_sint_field(5, msg.rebase_delta));
    out.extend(encode_varint_field(6, msg.file_format));
    out.extend(encode_varint_field(7, msg.isa));
    out.extend(encode_varint_field(8, msg.byte_order));
    if let Some(entry) = &msg.entry_point {
        out.extend(uuid_field(9, entry));
    }
    for proxy in &msg.proxies {
        out.extend(encode_message_field(10, &encode_proxy(proxy)));
    }
    for section in &msg.sections {
        out.extend(encode_message_field(11, &encode_section(section)));
    }
    for symbol in &msg.symbols {
        out.extend(encode_message_field(12, &encode_symbol(symbol)));
    }
    for entry in &msg.aux {
        out.extend(encode_message_field(13, &encode_aux_entry(entry)));
    }
    out
}

fn encode_proxy(msg: &ProxyMsg) -> Vec<u8> {
    uuid_field(1, msg.uuid.as_ref().expect("writer always sets uuid"))
}

fn encode_section(msg: &SectionMsg) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(uuid_field(1, msg.uuid.as_ref().expect("writer always sets uuid")));
    out.extend(encode_string_field(2, &msg.name));
    for &flag in &msg.flags {
        out.extend(encode_varint_field(3, flag));
    }
    for interval in &msg.intervals {
        out.extend(encode_message_field(4, &encode_interval(interval)));
    }
    out
}

fn encode_interval(msg: &IntervalMsg) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(uuid_field(1, msg.uuid.as_ref().expect("writer always sets uuid")));
    out.extend(encode_bool_field(2, msg.address.is_some()));
    if let Some(addr) = msg.address {
        out.extend(encode_varint_field(3, addr));
    }
    out.extend(encode_varint_field(4, msg.size));
    out.extend(encode_len_field(5, &msg.contents));
    out.extend(encode_varint_field(6, msg.byte_order));
    for block in &msg.blocks {
        out.extend(encode_message_field(7, &encode_block(block)));
    }
    for expr in &msg.exprs {
        out.extend(encode_message_field(8, &encode_expr_entry(expr)));
    }
    out
}

fn encode_block(msg: &BlockMsg) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(encode_varint_field(1, msg.offset));
    match &msg.kind {
        BlockKindMsg::Code { uuid, size, decode_mode } => {
            let mut inner = uuid_field(1, uuid);
            inner.extend(encode_varint_field(2, *size));
            inner.extend(encode_varint_field(3, *decode_mode));
            out.extend(encode_message_field(2, &inner));
        }
        BlockKindMsg::Data { uuid, size } => {
            let mut inner = uuid_field(1, uuid);
            inner.extend(encode_varint_field(2, *size));
            out.extend(encode_message_field(3, &inner));
        }
    }
    out
}

fn encode_symbol(msg: &SymbolMsg) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(uuid_field(1, msg.uuid.as_ref().expect("writer always sets uuid")));
    out.extend(encode_string_field(2, &msg.name));
    out.extend(encode_bool_field(3, msg.at_end));
    out.extend(encode_varint_field(4, msg.visibility));
    match &msg.payload {
        Some(PayloadMsg::Value(v)) => out.extend(encode_varint_field(5, *v)),
        Some(PayloadMsg::Referent(uuid)) => out.extend(uuid_field(6, uuid)),
        None => {}
    }
    out
}

fn encode_expr_entry(msg: &ExprEntryMsg) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(encode_varint_field(1, msg.offset));
    out.extend(encode_message_field(2, &encode_expr(&msg.expr)));
    out
}

fn encode_expr(msg: &ExprMsg) -> Vec<u8> {
    let mut out = Vec::new();
    for &attr in &msg.attrs {
        out.extend(encode_varint_field(1, attr));
    }
    match msg.kind.as_ref().expect("writer always sets expression kind") {
        ExprKindMsg::AddrConst { symbol, offset } => {
            let mut inner = uuid_field(1, symbol);
            inner.extend(encode_sint_field(2, *offset));
            out.extend(encode_message_field(2, &inner));
        }
        ExprKindMsg::AddrAddr { sym1, sym2, scale, offset } => {
            let mut inner = uuid_field(1, sym1);
            inner.extend(uuid_field(2, sym2));
            inner.extend(encode_sint_field(3, *scale));
            inner.extend(encode_sint_field(4, *offset));
            out.extend(encode_message_field(3, &inner));
        }
        ExprKindMsg::SymConst { symbol, offset } => {
            let mut inner = uuid_field(1, symbol);
            inner.extend(encode_sint_field(2, *offset));
            out.extend(encode_message_field(4, &inner));
        }
    }
    out
}

fn encode_cfg(msg: &CfgMsg) -> Vec<u8> {
    let mut out = Vec::new();
    for vertex in &msg.vertices {
        out.extend(uuid_field(1, vertex));
    }
    for edge in &msg.edges {
        out.extend(encode_message_field(2, &encode_edge(edge)));
    }
    out
}

fn encode_edge(msg: &EdgeMsg) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(uuid_field(1, msg.source.as_ref().expect("writer always sets source")));
    out.extend(uuid_field(2, msg.target.as_ref().expect("writer always sets target")));
    let mut label = encode_varint_field(1, msg.kind);
    label.extend(encode_bool_field(2, msg.conditional));
    label.extend(encode_bool_field(3, msg.direct));
    out.extend(encode_message_field(3, &label));
    out
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

pub(crate) fn decode_ir(data: &[u8]) -> Result<IrMsg, DecodeError> {
    let mut msg = IrMsg::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.uuid = Some(r.uuid(field)?),
            2 => msg.modules.push(decode_module(r.bytes(field)?)?),
            3 => msg.cfg = decode_cfg(r.bytes(field)?)?,
            4 => msg.aux.push(decode_aux_entry(r.bytes(field)?)?),
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.uuid, "Ir", "uuid")?;
    Ok(msg)
}

pub(crate) fn decode_aux_entry(data: &[u8]) -> Result<AuxEntryMsg, DecodeError> {
    let mut msg = AuxEntryMsg::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.name = r.string(field)?,
            2 => msg.type_name = r.string(field)?,
            3 => msg.data = r.bytes(field)?.to_vec(),
            _ => r.skip(field, wire)?,
        }
    }
    Ok(msg)
}

fn decode_module(data: &[u8]) -> Result<ModuleMsg, DecodeError> {
    let mut msg = ModuleMsg::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.uuid = Some(r.uuid(field)?),
            2 => msg.name = r.string(field)?,
            3 => msg.binary_path = r.string(field)?,
            4 => msg.preferred_addr = r.varint()?,
            5 => msg.rebase_delta = unzigzag(r.varint()?),
            6 => msg.file_format = r.varint()?,
            7 => msg.isa = r.varint()?,
            8 => msg.byte_order = r.varint()?,
            9 => msg.entry_point = Some(r.uuid(field)?),
            10 => msg.proxies.push(decode_proxy(r.bytes(field)?)?),
            11 => msg.sections.push(decode_section(r.bytes(field)?)?),
            12 => msg.symbols.push(decode_symbol(r.bytes(field)?)?),
            13 => msg.aux.push(decode_aux_entry(r.bytes(field)?)?),
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.uuid, "Module", "uuid")?;
    Ok(msg)
}

fn decode_proxy(data: &[u8]) -> Result<ProxyMsg, DecodeError> {
    let mut msg = ProxyMsg::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.uuid = Some(r.uuid(field)?),
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.uuid, "ProxyBlock", "uuid")?;
    Ok(msg)
}

fn decode_section(data: &[u8]) -> Result<SectionMsg, DecodeError> {
    let mut msg = SectionMsg::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.uuid = Some(r.uuid(field)?),
            2 => msg.name = r.string(field)?,
            3 => msg.flags.push(r.varint()?),
            4 => msg.intervals.push(decode_interval(r.bytes(field)?)?),
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.uuid, "Section", "uuid")?;
    Ok(msg)
}

fn decode_interval(data: &[u8]) -> Result<IntervalMsg, DecodeError> {
    let mut msg = IntervalMsg::default();
    let mut has_address = false;
    let mut address = 0u64;
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.uuid = Some(r.uuid(field)?),
            2 => has_address = r.varint()? != 0,
            3 => address = r.varint()?,
            4 => msg.size = r.varint()?,
            5 => msg.contents = r.bytes(field)?.to_vec(),
            6 => msg.byte_order = r.varint()?,
            7 => msg.blocks.push(decode_block(r.bytes(field)?)?),
            8 => msg.exprs.push(decode_expr_entry(r.bytes(field)?)?),
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.uuid, "ByteInterval", "uuid")?;
    if has_address {
        msg.address = Some(address);
    }
    Ok(msg)
}

fn decode_block(data: &[u8]) -> Result<BlockMsg, DecodeError> {
    let mut offset = 0u64;
    let mut kind = None;
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => offset = r.varint()?,
            2 => {
                let inner = r.bytes(field)?;
                let (uuid, size, decode_mode) = decode_code_block(inner)?;
                kind = Some(BlockKindMsg::Code { uuid, size, decode_mode });
            }
            3 => {
                let inner = r.bytes(field)?;
                let (uuid, size) = decode_data_block(inner)?;
                kind = Some(BlockKindMsg::Data { uuid, size });
            }
            _ => r.skip(field, wire)?,
        }
    }
    let kind = require(kind, "Block", "code|data")?;
    Ok(BlockMsg { offset, kind })
}

fn decode_code_block(data: &[u8]) -> Result<(Uuid, u64, u64), DecodeError> {
    let mut uuid = None;
    let mut size = 0u64;
    let mut decode_mode = 0u64;
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => uuid = Some(r.uuid(field)?),
            2 => size = r.varint()?,
            3 => decode_mode = r.varint()?,
            _ => r.skip(field, wire)?,
        }
    }
    Ok((require(uuid, "CodeBlock", "uuid")?, size, decode_mode))
}

fn decode_data_block(data: &[u8]) -> Result<(Uuid, u64), DecodeError> {
    let mut uuid = None;
    let mut size = 0u64;
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => uuid = Some(r.uuid(field)?),
            2 => size = r.varint()?,
            _ => r.skip(field, wire)?,
        }
    }
    Ok((require(uuid, "DataBlock", "uuid")?, size))
}

fn decode_symbol(data: &[u8]) -> Result<SymbolMsg, DecodeError> {
    let mut msg = SymbolMsg::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.uuid = Some(r.uuid(field)?),
            2 => msg.name = r.string(field)?,
            3 => msg.at_end = r.varint()? != 0,
            4 => msg.visibility = r.varint()?,
            5 => msg.payload = Some(PayloadMsg::Value(r.varint()?)),
            6 => msg.payload = Some(PayloadMsg::Referent(r.uuid(field)?)),
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.uuid, "Symbol", "uuid")?;
    Ok(msg)
}

fn decode_expr_entry(data: &[u8]) -> Result<ExprEntryMsg, DecodeError> {
    let mut msg = ExprEntryMsg::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.offset = r.varint()?,
            2 => msg.expr = decode_expr(r.bytes(field)?)?,
            _ => r.skip(field, wire)?,
        }
    }
    Ok(msg)
}

fn decode_expr(data: &[u8]) -> Result<ExprMsg, DecodeError> {
    let mut msg = ExprMsg::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.attrs.push(r.varint()?),
            2 => {
                let inner = r.bytes(field)?;
                let (symbol, offset) = decode_sym_offset(inner, "AddrConst")?;
                msg.kind = Some(ExprKindMsg::AddrConst { symbol, offset });
            }
            3 => {
                let inner = r.bytes(field)?;
                msg.kind = Some(decode_addr_addr(inner)?);
            }
            4 => {
                let inner = r.bytes(field)?;
                let (symbol, offset) = decode_sym_offset(inner, "SymConst")?;
                msg.kind = Some(ExprKindMsg::SymConst { symbol, offset });
            }
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.kind.as_ref(), "SymbolicExpression", "kind")?;
    Ok(msg)
}

fn decode_sym_offset(data: &[u8], message: &'static str) -> Result<(Uuid, i64), DecodeError> {
    let mut symbol = None;
    let mut offset = 0i64;
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => symbol = Some(r.uuid(field)?),
            2 => offset = unzigzag(r.varint()?),
            _ => r.skip(field, wire)?,
        }
    }
    Ok((require(symbol, message, "symbol")?, offset))
}

fn decode_addr_addr(data: &[u8]) -> Result<ExprKindMsg, DecodeError> {
    let mut sym1 = None;
    let mut sym2 = None;
    let mut scale = 0i64;
    let mut offset = 0i64;
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => sym1 = Some(r.uuid(field)?),
            2 => sym2 = Some(r.uuid(field)?),
            3 => scale = unzigzag(r.varint()?),
            4 => offset = unzigzag(r.varint()?),
            _ => r.skip(field, wire)?,
        }
    }
    Ok(ExprKindMsg::AddrAddr {
        sym1: require(sym1, "AddrAddr", "sym1")?,
        sym2: require(sym2, "AddrAddr", "sym2")?,
        scale,
        offset,
    })
}

pub(crate) fn decode_cfg(data: &[u8]) -> Result<CfgMsg, DecodeError> {
    let mut msg = CfgMsg::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.vertices.push(r.uuid(field)?),
            2 => msg.edges.push(decode_edge(r.bytes(field)?)?),
            _ => r.skip(field, wire)?,
        }
    }
    Ok(msg)
}

fn decode_edge(data: &[u8]) -> Result<EdgeMsg, DecodeError> {
    let mut msg = EdgeMsg::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.source = Some(r.uuid(field)?),
            2 => msg.target = Some(r.uuid(field)?),
            3 => {
                let inner = r.bytes(field)?;
                let mut lr = Reader::new(inner);
                while let Some((lfield, lwire)) = lr.tag()? {
                    match lfield {
                        1 => msg.kind = lr.varint()?,
                        2 => msg.conditional = lr.varint()? != 0,
                        3 => msg.direct = lr.varint()? != 0,
                        _ => lr.skip(lfield, lwire)?,
                    }
                }
            }
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.source.as_ref(), "Edge", "source")?;
    require(msg.target.as_ref(), "Edge", "target")?;
    Ok(msg)
}
