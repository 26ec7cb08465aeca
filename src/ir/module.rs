//! Modules: one binary image and its secondary indices.
//!
//! A module owns sections, symbols, and proxy blocks, and keeps the lookup
//! structures the rest of the library leans on:
//!
//! - sections by overlapping address span (split interval map), by start
//!   address, and by name;
//! - symbols by name, by derived address, and by referent UUID.
//!
//! Every mutation that affects an indexable key routes through the helpers
//! at the bottom of this file before the mutation becomes visible, so the
//! indices never need a rebuild pass. Address-carrying children cache the
//! key they are currently indexed under (`indexed_addr`, `indexed_extent`);
//! that is what lets a notification remove the stale entry without knowing
//! the pre-mutation state.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use uuid::Uuid;

use crate::addr::{Addr, ByteOrder};
use crate::auxdata::AuxDataTable;
use crate::context::Context;
use crate::error::UsageError;
use crate::ir::addr_map::AddrMap;
use crate::ir::block::fresh_uuid;
use crate::ir::symbol;
use crate::node::{
    Block, ByteInterval, ChangeStatus, CodeBlock, Ir, Module, ProxyBlock, Section, Symbol,
};

/// Executable file format of the image a module was lifted from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FileFormat {
    #[default]
    Undefined,
    Coff,
    Elf,
    Pe,
    IdaProDb32,
    IdaProDb64,
    Xcoff,
    Macho,
    Raw,
}

impl FileFormat {
    pub(crate) fn wire_tag(self) -> u64 {
        match self {
            FileFormat::Undefined => 0,
            FileFormat::Coff => 1,
            FileFormat::Elf => 2,
            FileFormat::Pe => 3,
            FileFormat::IdaProDb32 => 4,
            FileFormat::IdaProDb64 => 5,
            FileFormat::Xcoff => 6,
            FileFormat::Macho => 7,
            FileFormat::Raw => 8,
        }
    }

    pub(crate) fn from_wire_tag(tag: u64) -> Option<FileFormat> {
        match tag {
            0 => Some(FileFormat::Undefined),
            1 => Some(FileFormat::Coff),
            2 => Some(FileFormat::Elf),
            3 => Some(FileFormat::Pe),
            4 => Some(FileFormat::IdaProDb32),
            5 => Some(FileFormat::IdaProDb64),
            6 => Some(FileFormat::Xcoff),
            7 => Some(FileFormat::Macho),
            8 => Some(FileFormat::Raw),
            _ => None,
        }
    }
}

/// Instruction set architecture of a module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Isa {
    #[default]
    Undefined,
    Ia32,
    Ppc32,
    X64,
    Arm,
    ValidButUnsupported,
    Ppc64,
    Arm64,
    Mips32,
    Mips64,
}

impl Isa {
    pub(crate) fn wire_tag(self) -> u64 {
        match self {
            Isa::Undefined => 0,
            Isa::Ia32 => 1,
            Isa::Ppc32 => 2,
            Isa::X64 => 3,
            Isa::Arm => 4,
            Isa::ValidButUnsupported => 5,
            Isa::Ppc64 => 6,
            Isa::Arm64 => 7,
            Isa::Mips32 => 8,
            Isa::Mips64 => 9,
        }
    }

    pub(crate) fn from_wire_tag(tag: u64) -> Option<Isa> {
        match tag {
            0 => Some(Isa::Undefined),
            1 => Some(Isa::Ia32),
            2 => Some(Isa::Ppc32),
            3 => Some(Isa::X64),
            4 => Some(Isa::Arm),
            5 => Some(Isa::ValidButUnsupported),
            6 => Some(Isa::Ppc64),
            7 => Some(Isa::Arm64),
            8 => Some(Isa::Mips32),
            9 => Some(Isa::Mips64),
            _ => None,
        }
    }
}

pub struct ModuleData {
    pub(crate) uuid: Uuid,
    pub(crate) parent: Option<Ir>,
    pub(crate) name: String,
    pub(crate) binary_path: String,
    pub(crate) preferred_addr: Addr,
    pub(crate) rebase_delta: i64,
    pub(crate) file_format: FileFormat,
    pub(crate) isa: Isa,
    pub(crate) byte_order: ByteOrder,
    pub(crate) entry_point: Option<CodeBlock>,
    pub(crate) proxy_blocks: Vec<ProxyBlock>,
    pub(crate) sections: Vec<Section>,
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) aux: AuxDataTable,
    // Secondary indices.
    sections_by_name: BTreeMap<String, Vec<Section>>,
    sections_by_start: BTreeMap<u64, Vec<Section>>,
    sections_span: AddrMap<Section>,
    symbols_by_name: BTreeMap<String, Vec<Symbol>>,
    symbols_by_addr: BTreeMap<u64, Vec<Symbol>>,
    symbols_by_referent: HashMap<Uuid, Vec<Symbol>>,
}

impl Module {
    pub fn new(ctx: &mut Context, name: impl Into<String>) -> Module {
        let uuid = fresh_uuid(ctx);
        Self::with_uuid(ctx, uuid, name).expect("fresh UUID cannot collide")
    }

    pub fn with_uuid(
        ctx: &mut Context,
        uuid: Uuid,
        name: impl Into<String>,
    ) -> Result<Module, UsageError> {
        ctx.alloc_module(ModuleData {
            uuid,
            parent: None,
            name: name.into(),
            binary_path: String::new(),
            preferred_addr: Addr(0),
            rebase_delta: 0,
            file_format: FileFormat::default(),
            isa: Isa::default(),
            byte_order: ByteOrder::default(),
            entry_point: None,
            proxy_blocks: Vec::new(),
            sections: Vec::new(),
            symbols: Vec::new(),
            aux: AuxDataTable::new(),
            sections_by_name: BTreeMap::new(),
            sections_by_start: BTreeMap::new(),
            sections_span: AddrMap::new(),
            symbols_by_name: BTreeMap::new(),
            symbols_by_addr: BTreeMap::new(),
            symbols_by_referent: HashMap::new(),
        })
    }

    pub fn uuid(self, ctx: &Context) -> Uuid {
        ctx.module(self).uuid
    }

    pub fn ir(self, ctx: &Context) -> Option<Ir> {
        ctx.module(self).parent
    }

    pub fn name(self, ctx: &Context) -> &str {
        &ctx.module(self).name
    }

    pub fn set_name(self, ctx: &mut Context, name: impl Into<String>) {
        ctx.module_mut(self).name = name.into();
    }

    /// Informational path of the image on disk; never opened by the library.
    pub fn binary_path(self, ctx: &Context) -> &str {
        &ctx.module(self).binary_path
    }

    pub fn set_binary_path(self, ctx: &mut Context, path: impl Into<String>) {
        ctx.module_mut(self).binary_path = path.into();
    }

    pub fn preferred_addr(self, ctx: &Context) -> Addr {
        ctx.module(self).preferred_addr
    }

    pub fn set_preferred_addr(self, ctx: &mut Context, addr: Addr) {
        ctx.module_mut(self).preferred_addr = addr;
    }

    /// Difference between the preferred address and where the image was
    /// actually loaded.
    pub fn rebase_delta(self, ctx: &Context) -> i64 {
        ctx.module(self).rebase_delta
    }

    pub fn set_rebase_delta(self, ctx: &mut Context, delta: i64) {
        ctx.module_mut(self).rebase_delta = delta;
    }

    pub fn is_relocated(self, ctx: &Context) -> bool {
        ctx.module(self).rebase_delta != 0
    }

    pub fn file_format(self, ctx: &Context) -> FileFormat {
        ctx.module(self).file_format
    }

    pub fn set_file_format(self, ctx: &mut Context, format: FileFormat) {
        ctx.module_mut(self).file_format = format;
    }

    pub fn isa(self, ctx: &Context) -> Isa {
        ctx.module(self).isa
    }

    pub fn set_isa(self, ctx: &mut Context, isa: Isa) {
        ctx.module_mut(self).isa = isa;
    }

    pub fn byte_order(self, ctx: &Context) -> ByteOrder {
        ctx.module(self).byte_order
    }

    pub fn set_byte_order(self, ctx: &mut Context, order: ByteOrder) {
        ctx.module_mut(self).byte_order = order;
    }

    pub fn entry_point(self, ctx: &Context) -> Option<CodeBlock> {
        ctx.module(self).entry_point
    }

    pub fn set_entry_point(self, ctx: &mut Context, entry: Option<CodeBlock>) {
        ctx.module_mut(self).entry_point = entry;
    }

    pub fn aux_data(self, ctx: &Context) -> &AuxDataTable {
        &ctx.module(self).aux
    }

    pub fn aux_data_mut(self, ctx: &mut Context) -> &mut AuxDataTable {
        &mut ctx.module_mut(self).aux
    }

    // ── proxy blocks ────────────────────────────────────────────────────────

    pub fn proxy_blocks(self, ctx: &Context) -> &[ProxyBlock] {
        &ctx.module(self).proxy_blocks
    }

    pub fn add_proxy_block(self, ctx: &mut Context, pb: ProxyBlock) -> ChangeStatus {
        match pb.module(ctx) {
            Some(m) if m == self => return ChangeStatus::NoChange,
            Some(_) => return ChangeStatus::Rejected,
            None => {}
        }
        ctx.proxy_block_mut(pb).parent = Some(self);
        ctx.module_mut(self).proxy_blocks.push(pb);
        ChangeStatus::Accepted
    }

    pub fn remove_proxy_block(self, ctx: &mut Context, pb: ProxyBlock) -> ChangeStatus {
        if pb.module(ctx) != Some(self) {
            return ChangeStatus::NoChange;
        }
        ctx.module_mut(self).proxy_blocks.retain(|p| *p != pb);
        ctx.proxy_block_mut(pb).parent = None;
        ChangeStatus::Accepted
    }

    // ── sections ────────────────────────────────────────────────────────────

    pub fn sections(self, ctx: &Context) -> &[Section] {
        &ctx.module(self).sections
    }

    pub fn add_section(self, ctx: &mut Context, section: Section) -> ChangeStatus {
        match section.module(ctx) {
            Some(m) if m == self => return ChangeStatus::NoChange,
            Some(_) => return ChangeStatus::Rejected,
            None => {}
        }
        ctx.section_mut(section).parent = Some(self);
        let name = ctx.section(section).name.clone();
        let md = ctx.module_mut(self);
        md.sections.push(section);
        multi_insert(&mut md.sections_by_name, name, section);
        refresh_section_extent(ctx, section);
        ChangeStatus::Accepted
    }

    pub fn remove_section(self, ctx: &mut Context, section: Section) -> ChangeStatus {
        if section.module(ctx) != Some(self) {
            return ChangeStatus::NoChange;
        }
        let name = ctx.section(section).name.clone();
        let extent = ctx.section(section).indexed_extent;
        let md = ctx.module_mut(self);
        md.sections.retain(|s| *s != section);
        multi_remove(&mut md.sections_by_name, &name, &section);
        if let Some((lo, hi)) = extent {
            md.sections_span.remove(lo, hi, &section);
            multi_remove(&mut md.sections_by_start, &lo, &section);
        }
        let sd = ctx.section_mut(section);
        sd.indexed_extent = None;
        sd.parent = None;
        ChangeStatus::Accepted
    }

    /// Sections carrying exactly `name`, in insertion order.
    pub fn find_sections_by_name(self, ctx: &Context, name: &str) -> Vec<Section> {
        ctx.module(self)
            .sections_by_name
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Sections whose address span contains `addr`.
    pub fn find_sections_on(self, ctx: &Context, addr: Addr) -> Vec<Section> {
        ctx.module(self).sections_span.at(addr.0).into_iter().collect()
    }

    /// Sections whose address span intersects `[lo, hi)`.
    pub fn find_sections_on_range(self, ctx: &Context, lo: Addr, hi: Addr) -> Vec<Section> {
        ctx.module(self)
            .sections_span
            .in_range(lo.0, hi.0)
            .into_iter()
            .collect()
    }

    /// Sections starting exactly at `addr`.
    pub fn find_sections_at(self, ctx: &Context, addr: Addr) -> Vec<Section> {
        ctx.module(self)
            .sections_by_start
            .get(&addr.0)
            .cloned()
            .unwrap_or_default()
    }

    /// Sections starting within `[lo, hi)`.
    pub fn find_sections_at_range(self, ctx: &Context, lo: Addr, hi: Addr) -> Vec<Section> {
        ctx.module(self)
            .sections_by_start
            .range(lo.0..hi.0)
            .flat_map(|(_, v)| v.iter().copied())
            .collect()
    }

    // ── symbols ─────────────────────────────────────────────────────────────

    pub fn symbols(self, ctx: &Context) -> &[Symbol] {
        &ctx.module(self).symbols
    }

    pub fn add_symbol(self, ctx: &mut Context, sym: Symbol) -> ChangeStatus {
        match sym.module(ctx) {
            Some(m) if m == self => return ChangeStatus::NoChange,
            Some(_) => return ChangeStatus::Rejected,
            None => {}
        }
        ctx.symbol_mut(sym).parent = Some(self);
        let name = ctx.symbol(sym).name.clone();
        let referent = symbol::referent_of(ctx.symbol(sym).payload);
        let addr = symbol::derived_address(ctx, sym);
        let md = ctx.module_mut(self);
        md.symbols.push(sym);
        multi_insert(&mut md.symbols_by_name, name, sym);
        if let Some(r) = referent {
            md.symbols_by_referent.entry(r).or_default().push(sym);
        }
        if let Some(a) = addr {
            multi_insert(&mut md.symbols_by_addr, a, sym);
        }
        ctx.symbol_mut(sym).indexed_addr = addr;
        ChangeStatus::Accepted
    }

    pub fn remove_symbol(self, ctx: &mut Context, sym: Symbol) -> ChangeStatus {
        if sym.module(ctx) != Some(self) {
            return ChangeStatus::NoChange;
        }
        let name = ctx.symbol(sym).name.clone();
        let referent = symbol::referent_of(ctx.symbol(sym).payload);
        let addr = ctx.symbol(sym).indexed_addr;
        let md = ctx.module_mut(self);
        md.symbols.retain(|s| *s != sym);
        multi_remove(&mut md.symbols_by_name, &name, &sym);
        if let Some(r) = referent {
            if let Some(list) = md.symbols_by_referent.get_mut(&r) {
                list.retain(|s| *s != sym);
                if list.is_empty() {
                    md.symbols_by_referent.remove(&r);
                }
            }
        }
        if let Some(a) = addr {
            multi_remove(&mut md.symbols_by_addr, &a, &sym);
        }
        let sd = ctx.symbol_mut(sym);
        sd.indexed_addr = None;
        sd.parent = None;
        ChangeStatus::Accepted
    }

    /// Symbols named exactly `name`, in insertion order.
    pub fn find_symbols(self, ctx: &Context, name: &str) -> Vec<Symbol> {
        ctx.module(self)
            .symbols_by_name
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Symbols whose derived address is exactly `addr`.
    pub fn find_symbols_at(self, ctx: &Context, addr: Addr) -> Vec<Symbol> {
        ctx.module(self)
            .symbols_by_addr
            .get(&addr.0)
            .cloned()
            .unwrap_or_default()
    }

    /// Symbols whose derived address lies within `[lo, hi)`.
    pub fn find_symbols_at_range(self, ctx: &Context, lo: Addr, hi: Addr) -> Vec<Symbol> {
        ctx.module(self)
            .symbols_by_addr
            .range(lo.0..hi.0)
            .flat_map(|(_, v)| v.iter().copied())
            .collect()
    }

    /// Symbols whose payload references the node with `referent`'s UUID.
    pub fn find_symbols_by_referent(self, ctx: &Context, referent: &Uuid) -> Vec<Symbol> {
        ctx.module(self)
            .symbols_by_referent
            .get(referent)
            .cloned()
            .unwrap_or_default()
    }

    // ── block and interval views ────────────────────────────────────────────

    /// All blocks in the module in ascending address order (ties in
    /// unspecified order). Unaddressed intervals do not participate.
    pub fn blocks(self, ctx: &Context) -> BlockIter<'_> {
        let mut streams: Vec<IntervalBlocks<'_>> = Vec::new();
        for &section in &ctx.module(self).sections {
            for &bi in &ctx.section(section).intervals {
                if let Some(base) = ctx.interval(bi).address {
                    streams.push(IntervalBlocks {
                        base: base.0,
                        inner: ctx.interval(bi).blocks.iter(),
                        pending: Vec::new().into_iter(),
                        current_addr: 0,
                    });
                }
            }
        }
        BlockIter::new(streams)
    }

    /// Blocks whose extent contains `addr`.
    pub fn find_blocks_on(self, ctx: &Context, addr: Addr) -> Vec<Block> {
        let mut out = Vec::new();
        for bi in self.find_byte_intervals_on(ctx, addr) {
            let base = bi.address(ctx).expect("on-query yields addressed intervals").0;
            for block in bi.blocks(ctx) {
                let lo = base + block.offset(ctx);
                let hi = lo + block.size(ctx);
                if (lo..hi).contains(&addr.0) {
                    out.push(block);
                }
            }
        }
        sort_blocks(ctx, &mut out);
        out
    }

    /// Blocks starting exactly at `addr`.
    pub fn find_blocks_at(self, ctx: &Context, addr: Addr) -> Vec<Block> {
        let mut out = Vec::new();
        for bi in self.find_byte_intervals_on(ctx, addr) {
            let base = bi.address(ctx).expect("on-query yields addressed intervals").0;
            if addr.0 < base {
                continue;
            }
            if let Some(blocks) = ctx.interval(bi).blocks.get(&(addr.0 - base)) {
                out.extend(blocks.iter().copied());
            }
        }
        sort_blocks(ctx, &mut out);
        out
    }

    /// Blocks starting within `[lo, hi)`, ascending by address.
    pub fn find_blocks_at_range(self, ctx: &Context, lo: Addr, hi: Addr) -> Vec<Block> {
        let mut out = Vec::new();
        for section in self.find_sections_on_range(ctx, lo, hi) {
            for &bi in section.byte_intervals(ctx) {
                let base = match ctx.interval(bi).address {
                    Some(a) => a.0,
                    None => continue,
                };
                for (&offset, blocks) in &ctx.interval(bi).blocks {
                    let addr = base + offset;
                    if (lo.0..hi.0).contains(&addr) {
                        out.extend(blocks.iter().copied());
                    }
                }
            }
        }
        sort_blocks(ctx, &mut out);
        out
    }

    /// Addressed intervals whose extent contains `addr`.
    pub fn find_byte_intervals_on(self, ctx: &Context, addr: Addr) -> Vec<ByteInterval> {
        let mut out = Vec::new();
        for section in self.find_sections_on(ctx, addr) {
            for &bi in section.byte_intervals(ctx) {
                if let Some(base) = ctx.interval(bi).address {
                    let hi = base.0.saturating_add(ctx.interval(bi).size);
                    if (base.0..hi).contains(&addr.0) {
                        out.push(bi);
                    }
                }
            }
        }
        out
    }

    /// Intervals placed exactly at `addr`.
    pub fn find_byte_intervals_at(self, ctx: &Context, addr: Addr) -> Vec<ByteInterval> {
        let mut out = Vec::new();
        for section in self.find_sections_on(ctx, addr) {
            for &bi in section.byte_intervals(ctx) {
                if ctx.interval(bi).address == Some(addr) {
                    out.push(bi);
                }
            }
        }
        out
    }
}

fn sort_blocks(ctx: &Context, blocks: &mut [Block]) {
    blocks.sort_by_key(|b| b.address(ctx).map(|a| a.0));
}

// ---------------------------------------------------------------------------
// Merged block view
// ---------------------------------------------------------------------------

struct IntervalBlocks<'a> {
    base: u64,
    inner: std::collections::btree_map::Iter<'a, u64, Vec<Block>>,
    /// Blocks sharing the offset currently being drained.
    pending: std::vec::IntoIter<Block>,
    current_addr: u64,
}

impl<'a> IntervalBlocks<'a> {
    /// Next `(address, block)` of this interval, ascending by address.
    fn next_entry(&mut self) -> Option<(u64, Block)> {
        loop {
            if let Some(block) = self.pending.next() {
                return Some((self.current_addr, block));
            }
            let (&offset, blocks) = self.inner.next()?;
            self.current_addr = self.base + offset;
            self.pending = blocks.clone().into_iter();
        }
    }
}

/// K-way merge over the per-interval offset-ordered block collections.
pub struct BlockIter<'a> {
    streams: Vec<IntervalBlocks<'a>>,
    heap: BinaryHeap<Reverse<(u64, usize)>>,
    heads: Vec<Option<(u64, Block)>>,
}

impl<'a> BlockIter<'a> {
    fn new(mut streams: Vec<IntervalBlocks<'a>>) -> Self {
        let mut heap = BinaryHeap::new();
        let mut heads = Vec::with_capacity(streams.len());
        for (i, stream) in streams.iter_mut().enumerate() {
            let head = stream.next_entry();
            if let Some((addr, _)) = head {
                heap.push(Reverse((addr, i)));
            }
            heads.push(head);
        }
        Self { streams, heap, heads }
    }
}

impl<'a> Iterator for BlockIter<'a> {
    type Item = (Addr, Block);

    fn next(&mut self) -> Option<Self::Item> {
        let Reverse((addr, i)) = self.heap.pop()?;
        let (_, block) = self.heads[i].take().expect("head present while queued");
        let next = self.streams[i].next_entry();
        if let Some((next_addr, _)) = next {
            self.heap.push(Reverse((next_addr, i)));
        }
        self.heads[i] = next;
        Some((Addr(addr), block))
    }
}

// ---------------------------------------------------------------------------
// Index maintenance
// ---------------------------------------------------------------------------

fn multi_insert<K: Ord, V: PartialEq>(map: &mut BTreeMap<K, Vec<V>>, key: K, value: V) {
    map.entry(key).or_default().push(value);
}

fn multi_remove<K: Ord, V: PartialEq>(map: &mut BTreeMap<K, Vec<V>>, key: &K, value: &V) {
    if let Some(list) = map.get_mut(key) {
        list.retain(|v| v != value);
        if list.is_empty() {
            map.remove(key);
        }
    }
}

/// Moves a section between name-index buckets.
pub(crate) fn rename_section_in_index(
    ctx: &mut Context,
    module: Module,
    section: Section,
    old: &str,
    new: &str,
) {
    if old == new {
        return;
    }
    let md = ctx.module_mut(module);
    multi_remove(&mut md.sections_by_name, &old.to_owned(), &section);
    multi_insert(&mut md.sections_by_name, new.to_owned(), section);
}

/// Moves a symbol between name-index buckets.
pub(crate) fn rename_symbol_in_index(
    ctx: &mut Context,
    module: Module,
    sym: Symbol,
    old: &str,
    new: &str,
) {
    if old == new {
        return;
    }
    let md = ctx.module_mut(module);
    multi_remove(&mut md.symbols_by_name, &old.to_owned(), &sym);
    multi_insert(&mut md.symbols_by_name, new.to_owned(), sym);
}

/// Moves a symbol between referent-index buckets.
pub(crate) fn rereference_symbol_in_index(
    ctx: &mut Context,
    module: Module,
    sym: Symbol,
    old: Option<Uuid>,
    new: Option<Uuid>,
) {
    let md = ctx.module_mut(module);
    if let Some(r) = old {
        if let Some(list) = md.symbols_by_referent.get_mut(&r) {
            list.retain(|s| *s != sym);
            if list.is_empty() {
                md.symbols_by_referent.remove(&r);
            }
        }
    }
    if let Some(r) = new {
        md.symbols_by_referent.entry(r).or_default().push(sym);
    }
}

/// Re-keys one symbol in its module's by-address index from the cached key
/// to the freshly derived address.
pub(crate) fn reindex_symbol_addr(ctx: &mut Context, sym: Symbol) {
    let module = match ctx.symbol(sym).parent {
        Some(m) => m,
        None => return,
    };
    let old = ctx.symbol(sym).indexed_addr;
    let new = symbol::derived_address(ctx, sym);
    if old == new {
        return;
    }
    let md = ctx.module_mut(module);
    if let Some(a) = old {
        multi_remove(&mut md.symbols_by_addr, &a, &sym);
    }
    if let Some(a) = new {
        multi_insert(&mut md.symbols_by_addr, a, sym);
    }
    ctx.symbol_mut(sym).indexed_addr = new;
}

/// Re-keys every symbol (in any module) whose referent is one of `uuids`.
/// Used when an interval moves or a block resizes, since those change the
/// derived addresses of symbols bound to the affected nodes.
pub(crate) fn reindex_symbols_referring(ctx: &mut Context, uuids: &[Uuid]) {
    let mut affected: Vec<Symbol> = Vec::new();
    for m in 0..ctx.modules.len() {
        let md = &ctx.modules[m];
        for uuid in uuids {
            if let Some(list) = md.symbols_by_referent.get(uuid) {
                affected.extend(list.iter().copied());
            }
        }
    }
    for sym in affected {
        reindex_symbol_addr(ctx, sym);
    }
}

/// Re-keys one section in its module's span and start indices after any of
/// its intervals changed placement.
pub(crate) fn refresh_section_extent(ctx: &mut Context, section: Section) {
    let module = match ctx.section(section).parent {
        Some(m) => m,
        None => return,
    };
    let old = ctx.section(section).indexed_extent;
    let new = section.extent(ctx);
    if old == new {
        return;
    }
    let md = ctx.module_mut(module);
    if let Some((lo, hi)) = old {
        md.sections_span.remove(lo, hi, &section);
        multi_remove(&mut md.sections_by_start, &lo, &section);
    }
    if let Some((lo, hi)) = new {
        md.sections_span.insert(lo, hi, section);
        multi_insert(&mut md.sections_by_start, lo, section);
    }
    ctx.section_mut(section).indexed_extent = new;
}
