//! Schema version 0: legacy message shapes and their translation forward.
//!
//! Version 0 predates byte intervals. Bytes lived in a module-level image
//! byte map (dense regions of `address -> bytes`), code blocks and data
//! objects sat in flat per-module tables keyed by absolute address, symbols
//! carried a `storageKind`, and CFG edge labels were three parallel arrays.
//!
//! Legacy field numbers:
//!
//! ```text
//! IrV0:        uuid=1 module=2(rep) aux_data=3(rep) cfg=4
//! ModuleV0:    uuid=1 name=2 binary_path=3 preferred_addr=4
//!              rebase_delta=5(zigzag) file_format=6 isa=7
//!              image_byte_map=8 section=9(rep) symbol=10(rep)
//!              block=11(rep) data_object=12(rep) proxy=13(rep)
//!              aux_data=14(rep)
//! ImageByteMap: region=1(rep);  Region: address=1 data=2
//! SectionV0:   uuid=1 name=2 address=3 size=4
//! SymbolV0:    uuid=1 name=2 storage_kind=3 value=4 | referent=5
//! BlockV0:     uuid=1 address=2 size=3 decode_mode=4
//! DataObjectV0: uuid=1 address=2 size=3
//! CfgV0:       vertex=1(rep) edge=2(rep) edge_type=3(rep)
//!              edge_conditional=4(rep) edge_direct=5(rep)
//! EdgeV0:      source=1 target=2
//! ```
//!
//! The translation preserves every legacy UUID and every symbol-referent
//! relationship; byte intervals are new nodes and draw fresh UUIDs.

use uuid::Uuid;

use crate::error::DecodeError;
use crate::proto::{unzigzag, Reader};
use crate::serial::msg::{
    AuxEntryMsg, BlockKindMsg, BlockMsg, CfgMsg, EdgeMsg, IntervalMsg, IrMsg, ModuleMsg,
    PayloadMsg, ProxyMsg, SectionMsg, SymbolMsg,
};

#[derive(Debug, Default)]
pub(crate) struct IrV0 {
    pub uuid: Option<Uuid>,
    pub modules: Vec<ModuleV0>,
    pub aux: Vec<AuxEntryMsg>,
    pub cfg: CfgV0,
}

#[derive(Debug, Default)]
pub(crate) struct ModuleV0 {
    pub uuid: Option<Uuid>,
    pub name: String,
    pub binary_path: String,
    pub preferred_addr: u64,
    pub rebase_delta: i64,
    pub file_format: u64,
    pub isa: u64,
    pub regions: Vec<RegionV0>,
    pub sections: Vec<SectionV0>,
    pub symbols: Vec<SymbolV0>,
    pub code_blocks: Vec<BlockV0>,
    pub data_objects: Vec<DataObjectV0>,
    pub proxies: Vec<ProxyMsg>,
    pub aux: Vec<AuxEntryMsg>,
}

#[derive(Debug, Default)]
pub(crate) struct RegionV0 {
    pub address: u64,
    pub data: Vec<u8>,
}

#[derive(Debug, Default)]
pub(crate) struct SectionV0 {
    pub uuid: Option<Uuid>,
    pub name: String,
    pub address: u64,
    pub size: u64,
}

#[derive(Debug, Default)]
pub(crate) struct SymbolV0 {
    pub uuid: Option<Uuid>,
    pub name: String,
    pub storage_kind: u64,
    pub payload: Option<PayloadMsg>,
}

#[derive(Debug, Default)]
pub(crate) struct BlockV0 {
    pub uuid: Option<Uuid>,
    pub address: u64,
    pub size: u64,
    pub decode_mode: u64,
}

#[derive(Debug, Default)]
pub(crate) struct DataObjectV0 {
    pub uuid: Option<Uuid>,
    pub address: u64,
    pub size: u64,
}

#[derive(Debug, Default)]
pub(crate) struct CfgV0 {
    pub vertices: Vec<Uuid>,
    pub edges: Vec<(Uuid, Uuid)>,
    pub types: Vec<u64>,
    pub conditionals: Vec<bool>,
    pub directs: Vec<bool>,
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

fn require<T>(
    value: Option<T>,
    message: &'static str,
    name: &'static str,
) -> Result<T, DecodeError> {
    value.ok_or(DecodeError::MissingField { message, name })
}

pub(crate) fn decode_ir_v0(data: &[u8]) -> Result<IrV0, DecodeError> {
    let mut msg = IrV0::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.uuid = Some(r.uuid(field)?),
            2 => msg.modules.push(decode_module_v0(r.bytes(field)?)?),
            3 => msg.aux.push(super::msg::decode_aux_entry(r.bytes(field)?)?),
            4 => msg.cfg = decode_cfg_v0(r.bytes(field)?)?,
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.uuid, "IrV0", "uuid")?;
    Ok(msg)
}

fn decode_module_v0(data: &[u8]) -> Result<ModuleV0, DecodeError> {
    let mut msg = ModuleV0::default();
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
            8 => msg.regions = decode_image_byte_map(r.bytes(field)?)?,
            9 => msg.sections.push(decode_section_v0(r.bytes(field)?)?),
            10 => msg.symbols.push(decode_symbol_v0(r.bytes(field)?)?),
            11 => msg.code_blocks.push(decode_block_v0(r.bytes(field)?)?),
            12 => msg.data_objects.push(decode_data_object_v0(r.bytes(field)?)?),
            13 => {
                let mut proxy = ProxyMsg::default();
                let mut pr = Reader::new(r.bytes(field)?);
                while let Some((pfield, pwire)) = pr.tag()? {
                    match pfield {
                        1 => proxy.uuid = Some(pr.uuid(pfield)?),
                        _ => pr.skip(pfield, pwire)?,
                    }
                }
                require(proxy.uuid, "ProxyV0", "uuid")?;
                msg.proxies.push(proxy);
            }
            14 => msg.aux.push(super::msg::decode_aux_entry(r.bytes(field)?)?),
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.uuid, "ModuleV0", "uuid")?;
    Ok(msg)
}

fn decode_image_byte_map(data: &[u8]) -> Result<Vec<RegionV0>, DecodeError> {
    let mut regions = Vec::new();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => {
                let mut region = RegionV0::default();
                let mut rr = Reader::new(r.bytes(field)?);
                while let Some((rfield, rwire)) = rr.tag()? {
                    match rfield {
                        1 => region.address = rr.varint()?,
                        2 => region.data = rr.bytes(rfield)?.to_vec(),
                        _ => rr.skip(rfield, rwire)?,
                    }
                }
                regions.push(region);
            }
            _ => r.skip(field, wire)?,
        }
    }
    Ok(regions)
}

fn decode_section_v0(data: &[u8]) -> Result<SectionV0, DecodeError> {
    let mut msg = SectionV0::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.uuid = Some(r.uuid(field)?),
            2 => msg.name = r.string(field)?,
            3 => msg.address = r.varint()?,
            4 => msg.size = r.varint()?,
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.uuid, "SectionV0", "uuid")?;
    Ok(msg)
}

fn decode_symbol_v0(data: &[u8]) -> Result<SymbolV0, DecodeError> {
    let mut msg = SymbolV0::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.uuid = Some(r.uuid(field)?),
            2 => msg.name = r.string(field)?,
            3 => msg.storage_kind = r.varint()?,
            4 => msg.payload = Some(PayloadMsg::Value(r.varint()?)),
            5 => msg.payload = Some(PayloadMsg::Referent(r.uuid(field)?)),
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.uuid, "SymbolV0", "uuid")?;
    Ok(msg)
}

fn decode_block_v0(data: &[u8]) -> Result<BlockV0, DecodeError> {
    let mut msg = BlockV0::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.uuid = Some(r.uuid(field)?),
            2 => msg.address = r.varint()?,
            3 => msg.size = r.varint()?,
            4 => msg.decode_mode = r.varint()?,
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.uuid, "BlockV0", "uuid")?;
    Ok(msg)
}

fn decode_data_object_v0(data: &[u8]) -> Result<DataObjectV0, DecodeError> {
    let mut msg = DataObjectV0::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.uuid = Some(r.uuid(field)?),
            2 => msg.address = r.varint()?,
            3 => msg.size = r.varint()?,
            _ => r.skip(field, wire)?,
        }
    }
    require(msg.uuid, "DataObjectV0", "uuid")?;
    Ok(msg)
}

fn decode_cfg_v0(data: &[u8]) -> Result<CfgV0, DecodeError> {
    let mut msg = CfgV0::default();
    let mut r = Reader::new(data);
    while let Some((field, wire)) = r.tag()? {
        match field {
            1 => msg.vertices.push(r.uuid(field)?),
            2 => {
                let mut source = None;
                let mut target = None;
                let mut er = Reader::new(r.bytes(field)?);
                while let Some((efield, ewire)) = er.tag()? {
                    match efield {
                        1 => source = Some(er.uuid(efield)?),
                        2 => target = Some(er.uuid(efield)?),
                        _ => er.skip(efield, ewire)?,
                    }
                }
                msg.edges.push((
                    require(source, "EdgeV0", "source")?,
                    require(target, "EdgeV0", "target")?,
                ));
            }
            3 => msg.types.push(r.varint()?),
            4 => msg.conditionals.push(r.varint()? != 0),
            5 => msg.directs.push(r.varint()? != 0),
            _ => r.skip(field, wire)?,
        }
    }
    Ok(msg)
}

// ---------------------------------------------------------------------------
// Translation to the current schema
// ---------------------------------------------------------------------------

/// Translates a decoded v0 IR into the current message shape.
pub(crate) fn upgrade_ir(v0: IrV0) -> Result<IrMsg, DecodeError> {
    let mut modules = Vec::with_capacity(v0.modules.len());
    for module in v0.modules {
        modules.push(upgrade_module(module)?);
    }
    Ok(IrMsg {
        uuid: v0.uuid,
        modules,
        cfg: upgrade_cfg(v0.cfg)?,
        aux: upgrade_aux(v0.aux),
    })
}

fn upgrade_module(v0: ModuleV0) -> Result<ModuleMsg, DecodeError> {
    // Carve the dense image byte map into per-section intervals, one per
    // contiguous region piece that intersects the section's range.
    let mut sections: Vec<SectionMsg> = v0
        .sections
        .iter()
        .map(|s| SectionMsg {
            uuid: s.uuid,
            name: s.name.clone(),
            flags: Vec::new(),
            intervals: carve_intervals(s, &v0.regions),
        })
        .collect();

    // Sections the byte map left empty still need somewhere for their
    // blocks to land: one uninitialized interval covering the whole range.
    for (section, v0_section) in sections.iter_mut().zip(&v0.sections) {
        if section.intervals.is_empty() && v0_section.size > 0 {
            section.intervals.push(uninitialized_interval(v0_section.address, v0_section.size));
        }
    }

    let mut unmapped: Option<SectionMsg> = None;
    for block in &v0.code_blocks {
        let kind = BlockKindMsg::Code {
            uuid: require(block.uuid, "BlockV0", "uuid")?,
            size: block.size,
            decode_mode: block.decode_mode,
        };
        place_block(&mut sections, &v0.sections, &mut unmapped, block.address, block.size, kind);
    }
    for object in &v0.data_objects {
        let kind = BlockKindMsg::Data {
            uuid: require(object.uuid, "DataObjectV0", "uuid")?,
            size: object.size,
        };
        place_block(&mut sections, &v0.sections, &mut unmapped, object.address, object.size, kind);
    }
    if let Some(section) = unmapped {
        sections.push(section);
    }

    let symbols = v0
        .symbols
        .into_iter()
        .map(|s| {
            Ok(SymbolMsg {
                uuid: s.uuid,
                name: s.name,
                at_end: false,
                visibility: visibility_from_storage_kind(s.storage_kind)?,
                payload: s.payload,
            })
        })
        .collect::<Result<Vec<_>, DecodeError>>()?;

    Ok(ModuleMsg {
        uuid: v0.uuid,
        name: v0.name,
        binary_path: v0.binary_path,
        preferred_addr: v0.preferred_addr,
        rebase_delta: v0.rebase_delta,
        file_format: v0.file_format,
        isa: v0.isa,
        byte_order: 0,
        entry_point: None,
        proxies: v0.proxies,
        sections,
        symbols,
        aux: upgrade_aux(v0.aux),
    })
}

fn uninitialized_interval(address: u64, size: u64) -> IntervalMsg {
    IntervalMsg {
        uuid: Some(Uuid::new_v4()),
        address: Some(address),
        size,
        contents: Vec::new(),
        byte_order: 0,
        blocks: Vec::new(),
        exprs: Vec::new(),
    }
}

/// Clips each byte-map region against one section's address range; every
/// non-empty intersection becomes one interval with the clipped bytes.
fn carve_intervals(section: &SectionV0, regions: &[RegionV0]) -> Vec<IntervalMsg> {
    let s_lo = section.address;
    let s_hi = s_lo.saturating_add(section.size);
    let mut intervals = Vec::new();
    for region in regions {
        let r_lo = region.address;
        let r_hi = r_lo.saturating_add(region.data.len() as u64);
        let lo = s_lo.max(r_lo);
        let hi = s_hi.min(r_hi);
        if lo >= hi {
            continue;
        }
        let start = (lo - r_lo) as usize;
        let len = (hi - lo) as usize;
        let mut interval = uninitialized_interval(lo, hi - lo);
        interval.contents = region.data[start..start + len].to_vec();
        intervals.push(interval);
    }
    intervals
}

/// Nests one flat v0 block into the interval that contains its extent,
/// creating a fallback interval (or, failing everything, a nameless
/// catch-all section) so no legacy UUID is dropped.
fn place_block(
    sections: &mut [SectionMsg],
    v0_sections: &[SectionV0],
    unmapped: &mut Option<SectionMsg>,
    address: u64,
    size: u64,
    kind: BlockKindMsg,
) {
    let end = address.saturating_add(size);
    let home = v0_sections
        .iter()
        .position(|s| s.address <= address && end <= s.address.saturating_add(s.size));
    if let Some(ix) = home {
        let section = &mut sections[ix];
        let container = section.intervals.iter().position(|iv| {
            let iv_lo = iv.address.expect("carved intervals are addressed");
            iv_lo <= address && end <= iv_lo.saturating_add(iv.size)
        });
        match container {
            Some(iv_ix) => {
                let iv = &mut section.intervals[iv_ix];
                let offset = address - iv.address.expect("carved intervals are addressed");
                iv.blocks.push(BlockMsg { offset, kind });
            }
            None => {
                let mut iv = uninitialized_interval(address, size);
                iv.blocks.push(BlockMsg { offset: 0, kind });
                section.intervals.push(iv);
            }
        }
        return;
    }
    let section = unmapped.get_or_insert_with(|| SectionMsg {
        uuid: Some(Uuid::new_v4()),
        name: String::new(),
        flags: Vec::new(),
        intervals: Vec::new(),
    });
    let mut iv = uninitialized_interval(address, size);
    iv.blocks.push(BlockMsg { offset: 0, kind });
    section.intervals.push(iv);
}

/// `storageKind` collapses into symbol visibility.
fn visibility_from_storage_kind(kind: u64) -> Result<u64, DecodeError> {
    // StorageKind: 0 undefined, 1 normal, 2 static, 3 extern, 4 local.
    // Visibility:  0 undefined, 1 global, 2 local, 3 static, 4 extern.
    Ok(match kind {
        0 => 0,
        1 => 1,
        2 => 3,
        3 => 4,
        4 => 2,
        other => return Err(DecodeError::BadEnumTag { tag: other, context: "StorageKind" }),
    })
}

fn upgrade_cfg(v0: CfgV0) -> Result<CfgMsg, DecodeError> {
    for (kind, len) in [
        ("type", v0.types.len()),
        ("conditional", v0.conditionals.len()),
        ("direct", v0.directs.len()),
    ] {
        if len != v0.edges.len() {
            return Err(DecodeError::EdgeArrayMismatch {
                edges: v0.edges.len(),
                labels: len,
                kind,
            });
        }
    }
    let edges = v0
        .edges
        .iter()
        .enumerate()
        .map(|(i, &(source, target))| EdgeMsg {
            source: Some(source),
            target: Some(target),
            kind: v0.types[i],
            conditional: v0.conditionals[i],
            direct: v0.directs[i],
        })
        .collect();
    Ok(CfgMsg { vertices: v0.vertices, edges })
}

fn upgrade_aux(entries: Vec<AuxEntryMsg>) -> Vec<AuxEntryMsg> {
    entries
        .into_iter()
        .map(|mut e| {
            e.type_name = rewrite_legacy_type_name(&e.type_name);
            e
        })
        .collect()
}

/// Rewrites legacy leaf spellings (`uint64-t` and friends) token by token;
/// the payload bytes themselves are already in the current wire format.
pub(crate) fn rewrite_legacy_type_name(legacy: &str) -> String {
    let mut out = String::with_capacity(legacy.len());
    let mut token = String::new();
    for ch in legacy.chars() {
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
            token.push(ch);
        } else {
            flush_token(&mut out, &mut token);
            out.push(ch);
        }
    }
    flush_token(&mut out, &mut token);
    out
}

fn flush_token(out: &mut String, token: &mut String) {
    if token.is_empty() {
        return;
    }
    let renamed = match token.as_str() {
        "int8-t" => "int8",
        "int16-t" => "int16",
        "int32-t" => "int32",
        "int64-t" => "int64",
        "uint8-t" => "uint8",
        "uint16-t" => "uint16",
        "uint32-t" => "uint32",
        "uint64-t" => "uint64",
        other => other,
    };
    out.push_str(renamed);
    token.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_type_names_rewrite() {
        assert_eq!(rewrite_legacy_type_name("uint64-t"), "uint64");
        assert_eq!(
            rewrite_legacy_type_name("mapping<UUID,sequence<int32-t>>"),
            "mapping<UUID,sequence<int32>>"
        );
        assert_eq!(rewrite_legacy_type_name("string"), "string");
    }

    #[test]
    fn storage_kind_collapse() {
        assert_eq!(visibility_from_storage_kind(1).expect("normal"), 1);
        assert_eq!(visibility_from_storage_kind(4).expect("local"), 2);
        assert_eq!(visibility_from_storage_kind(2).expect("static"), 3);
        assert!(visibility_from_storage_kind(9).is_err());
    }

    #[test]
    fn regions_carve_to_section_bounds() {
        let section = SectionV0 {
            uuid: Some(Uuid::new_v4()),
            name: ".text".into(),
            address: 0x1000,
            size: 0x10,
        };
        let regions = vec![RegionV0 { address: 0x0ff8, data: vec![0xAA; 0x20] }];
        let intervals = carve_intervals(&section, &regions);
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].address, Some(0x1000));
        assert_eq!(intervals[0].size, 0x10);
        assert_eq!(intervals[0].contents, vec![0xAA; 0x10]);
    }

    #[test]
    fn mismatched_edge_arrays_fail() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let cfg = CfgV0 {
            vertices: vec![a, b],
            edges: vec![(a, b)],
            types: vec![0],
            conditionals: vec![],
            directs: vec![false],
        };
        assert!(matches!(
            upgrade_cfg(cfg),
            Err(DecodeError::EdgeArrayMismatch { kind: "conditional", .. })
        ));
    }
}
