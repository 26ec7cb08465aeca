//! The node arena.
//!
//! A `Context` owns the storage for every node belonging to the IRs created
//! in it and maps UUIDs back to typed handles in O(1). Detaching a node from
//! its parent never frees it; arena slots live until the Context is dropped,
//! so handles cannot dangle across graph reorganizations.

use std::collections::HashMap;

use uuid::Uuid;

use crate::error::UsageError;
use crate::ir::block::{CodeBlockData, DataBlockData, ProxyBlockData};
use crate::ir::interval::ByteIntervalData;
use crate::ir::module::ModuleData;
use crate::ir::section::SectionData;
use crate::ir::symbol::SymbolData;
use crate::ir::IrData;
use crate::node::{ByteInterval, CodeBlock, DataBlock, Ir, Module, Node, ProxyBlock, Section, Symbol};

#[derive(Default)]
pub struct Context {
    pub(crate) irs: Vec<IrData>,
    pub(crate) modules: Vec<ModuleData>,
    pub(crate) sections: Vec<SectionData>,
    pub(crate) intervals: Vec<ByteIntervalData>,
    pub(crate) code_blocks: Vec<CodeBlockData>,
    pub(crate) data_blocks: Vec<DataBlockData>,
    pub(crate) proxy_blocks: Vec<ProxyBlockData>,
    pub(crate) symbols: Vec<SymbolData>,
    by_uuid: HashMap<Uuid, Node>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a UUID to the node it names, if any node in this context
    /// carries it.
    pub fn find(&self, uuid: &Uuid) -> Option<Node> {
        self.by_uuid.get(uuid).copied()
    }

    /// Registers `node` under `uuid`. Every creation path funnels through
    /// here so UUID uniqueness holds context-wide.
    pub(crate) fn register(&mut self, uuid: Uuid, node: Node) -> Result<(), UsageError> {
        if self.by_uuid.contains_key(&uuid) {
            return Err(UsageError::DuplicateUuid { uuid });
        }
        self.by_uuid.insert(uuid, node);
        Ok(())
    }

    // ── arena accessors ─────────────────────────────────────────────────────

    pub(crate) fn ir(&self, h: Ir) -> &IrData {
        &self.irs[h.0 as usize]
    }
    pub(crate) fn ir_mut(&mut self, h: Ir) -> &mut IrData {
        &mut self.irs[h.0 as usize]
    }

    pub(crate) fn module(&self, h: Module) -> &ModuleData {
        &self.modules[h.0 as usize]
    }
    pub(crate) fn module_mut(&mut self, h: Module) -> &mut ModuleData {
        &mut self.modules[h.0 as usize]
    }

    pub(crate) fn section(&self, h: Section) -> &SectionData {
        &self.sections[h.0 as usize]
    }
    pub(crate) fn section_mut(&mut self, h: Section) -> &mut SectionData {
        &mut self.sections[h.0 as usize]
    }

    pub(crate) fn interval(&self, h: ByteInterval) -> &ByteIntervalData {
        &self.intervals[h.0 as usize]
    }
    pub(crate) fn interval_mut(&mut self, h: ByteInterval) -> &mut ByteIntervalData {
        &mut self.intervals[h.0 as usize]
    }

    pub(crate) fn code_block(&self, h: CodeBlock) -> &CodeBlockData {
        &self.code_blocks[h.0 as usize]
    }
    pub(crate) fn code_block_mut(&mut self, h: CodeBlock) -> &mut CodeBlockData {
        &mut self.code_blocks[h.0 as usize]
    }

    pub(crate) fn data_block(&self, h: DataBlock) -> &DataBlockData {
        &self.data_blocks[h.0 as usize]
    }
    pub(crate) fn data_block_mut(&mut self, h: DataBlock) -> &mut DataBlockData {
        &mut self.data_blocks[h.0 as usize]
    }

    pub(crate) fn proxy_block(&self, h: ProxyBlock) -> &ProxyBlockData {
        &self.proxy_blocks[h.0 as usize]
    }
    pub(crate) fn proxy_block_mut(&mut self, h: ProxyBlock) -> &mut ProxyBlockData {
        &mut self.proxy_blocks[h.0 as usize]
    }

    pub(crate) fn symbol(&self, h: Symbol) -> &SymbolData {
        &self.symbols[h.0 as usize]
    }
    pub(crate) fn symbol_mut(&mut self, h: Symbol) -> &mut SymbolData {
        &mut self.symbols[h.0 as usize]
    }

    // ── allocation ──────────────────────────────────────────────────────────
    //
    // Each alloc_* appends to the kind's arena and registers the UUID.
    // Callers pass data with a fresh v4 UUID or one decoded from disk.

    pub(crate) fn alloc_ir(&mut self, data: IrData) -> Result<Ir, UsageError> {
        let h = Ir(self.irs.len() as u32);
        self.register(data.uuid, Node::Ir(h))?;
        self.irs.push(data);
        Ok(h)
    }

    pub(crate) fn alloc_module(&mut self, data: ModuleData) -> Result<Module, UsageError> {
        let h = Module(self.modules.len() as u32);
        self.register(data.uuid, Node::Module(h))?;
        self.modules.push(data);
        Ok(h)
    }

    pub(crate) fn alloc_section(&mut self, data: SectionData) -> Result<Section, UsageError> {
        let h = Section(self.sections.len() as u32);
        self.register(data.uuid, Node::Section(h))?;
        self.sections.push(data);
        Ok(h)
    }

    pub(crate) fn alloc_interval(
        &mut self,
        data: ByteIntervalData,
    ) -> Result<ByteInterval, UsageError> {
        let h = ByteInterval(self.intervals.len() as u32);
        self.register(data.uuid, Node::ByteInterval(h))?;
        self.intervals.push(data);
        Ok(h)
    }

    pub(crate) fn alloc_code_block(&mut self, data: CodeBlockData) -> Result<CodeBlock, UsageError> {
        let h = CodeBlock(self.code_blocks.len() as u32);
        self.register(data.uuid, Node::CodeBlock(h))?;
        self.code_blocks.push(data);
        Ok(h)
    }

    pub(crate) fn alloc_data_block(&mut self, data: DataBlockData) -> Result<DataBlock, UsageError> {
        let h = DataBlock(self.data_blocks.len() as u32);
        self.register(data.uuid, Node::DataBlock(h))?;
        self.data_blocks.push(data);
        Ok(h)
    }

    pub(crate) fn alloc_proxy_block(
        &mut self,
        data: ProxyBlockData,
    ) -> Result<ProxyBlock, UsageError> {
        let h = ProxyBlock(self.proxy_blocks.len() as u32);
        self.register(data.uuid, Node::ProxyBlock(h))?;
        self.proxy_blocks.push(data);
        Ok(h)
    }

    pub(crate) fn alloc_symbol(&mut self, data: SymbolData) -> Result<Symbol, UsageError> {
        let h = Symbol(self.symbols.len() as u32);
        self.register(data.uuid, Node::Symbol(h))?;
        self.symbols.push(data);
        Ok(h)
    }
}
