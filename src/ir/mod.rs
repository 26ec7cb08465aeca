//! The IR node hierarchy.
//!
//! ```text
//! Ir ── Module ── Section ── ByteInterval ── {CodeBlock, DataBlock}
//!        │  │                     └─ SymbolicExpression (by offset)
//!        │  └─ Symbol, ProxyBlock
//!        └─ Cfg, AuxDataTable
//! ```
//!
//! Ownership is strictly top-down; upward and cross references (parents,
//! symbol referents, CFG endpoints, expression symbols) are weak and resolve
//! through the [`Context`](crate::Context) UUID table.

pub(crate) mod addr_map;
pub mod block;
pub mod cfg;
pub mod interval;
pub mod module;
pub mod section;
pub mod symbol;
pub mod symexpr;

use uuid::Uuid;

use crate::auxdata::AuxDataTable;
use crate::context::Context;
use crate::error::{Error, IntegrityWarning, UsageError};
use crate::ir::block::fresh_uuid;
use crate::ir::cfg::Cfg;
use crate::node::{ChangeStatus, Ir, Module};
use crate::serial;

/// A successfully loaded IR plus the integrity findings the load surfaced.
#[derive(Debug)]
pub struct LoadResult {
    pub ir: Ir,
    pub warnings: Vec<IntegrityWarning>,
}

pub struct IrData {
    pub(crate) uuid: Uuid,
    pub(crate) version: u8,
    pub(crate) modules: Vec<Module>,
    pub(crate) cfg: Cfg,
    pub(crate) aux: AuxDataTable,
}

impl Ir {
    /// Creates an empty IR at the current schema version.
    pub fn new(ctx: &mut Context) -> Ir {
        let uuid = fresh_uuid(ctx);
        Self::with_uuid(ctx, uuid).expect("fresh UUID cannot collide")
    }

    pub fn with_uuid(ctx: &mut Context, uuid: Uuid) -> Result<Ir, UsageError> {
        ctx.alloc_ir(IrData {
            uuid,
            version: serial::SCHEMA_VERSION,
            modules: Vec::new(),
            cfg: Cfg::new(),
            aux: AuxDataTable::new(),
        })
    }

    pub fn uuid(self, ctx: &Context) -> Uuid {
        ctx.ir(self).uuid
    }

    /// Schema version this IR was read at (or the current one if built in
    /// memory).
    pub fn version(self, ctx: &Context) -> u8 {
        ctx.ir(self).version
    }

    pub fn modules(self, ctx: &Context) -> &[Module] {
        &ctx.ir(self).modules
    }

    pub fn add_module(self, ctx: &mut Context, module: Module) -> ChangeStatus {
        match module.ir(ctx) {
            Some(ir) if ir == self => return ChangeStatus::NoChange,
            Some(_) => return ChangeStatus::Rejected,
            None => {}
        }
        ctx.module_mut(module).parent = Some(self);
        ctx.ir_mut(self).modules.push(module);
        ChangeStatus::Accepted
    }

    pub fn remove_module(self, ctx: &mut Context, module: Module) -> ChangeStatus {
        if module.ir(ctx) != Some(self) {
            return ChangeStatus::NoChange;
        }
        ctx.ir_mut(self).modules.retain(|m| *m != module);
        ctx.module_mut(module).parent = None;
        ChangeStatus::Accepted
    }

    pub fn cfg(self, ctx: &Context) -> &Cfg {
        &ctx.ir(self).cfg
    }

    pub fn cfg_mut(self, ctx: &mut Context) -> &mut Cfg {
        &mut ctx.ir_mut(self).cfg
    }

    pub fn aux_data(self, ctx: &Context) -> &AuxDataTable {
        &ctx.ir(self).aux
    }

    pub fn aux_data_mut(self, ctx: &mut Context) -> &mut AuxDataTable {
        &mut ctx.ir_mut(self).aux
    }

    /// Reads an envelope, upgrading older schema versions as needed.
    pub fn read(ctx: &mut Context, source: &mut impl std::io::Read) -> Result<LoadResult, Error> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        serial::read_envelope(ctx, &bytes)
    }

    /// Writes the envelope for this IR.
    pub fn write(self, ctx: &Context, sink: &mut impl std::io::Write) -> Result<(), Error> {
        let bytes = serial::write_envelope(ctx, self)?;
        sink.write_all(&bytes)?;
        Ok(())
    }
}
