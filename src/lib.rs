//! GTIRB: an in-memory, mutable representation of disassembled binaries
//! with a deterministic on-disk format.
//!
//! ```text
//! envelope bytes → envelope check → version gate → [v0 upgrade]
//!   → message decode → two-pass materialize → Ir graph
//! Ir graph → depth-first walk → message encode → envelope bytes
//! ```
//!
//! Everything lives in a [`Context`] arena and is addressed through `Copy`
//! handles; containment mutations run an observer protocol that keeps the
//! per-module indices (sections by span/start/name, symbols by
//! name/address/referent) consistent without rebuild passes.
//!
//! ```no_run
//! use gtirb::{Context, Ir, Module, Section, ByteInterval, CodeBlock, Addr};
//!
//! let mut ctx = Context::new();
//! let ir = Ir::new(&mut ctx);
//! let module = Module::new(&mut ctx, "foo.exe");
//! ir.add_module(&mut ctx, module);
//!
//! let text = Section::new(&mut ctx, ".text");
//! module.add_section(&mut ctx, text);
//!
//! let bytes = ByteInterval::new(&mut ctx, Some(Addr(0x1000)), 6);
//! text.add_byte_interval(&mut ctx, bytes);
//!
//! let block = CodeBlock::new(&mut ctx, 4);
//! bytes.add_code_block(&mut ctx, 0, block).unwrap();
//! assert_eq!(block.address(&ctx), Some(Addr(0x1000)));
//! ```

pub mod addr;
pub mod auxdata;
pub mod context;
pub mod error;
pub mod ir;
pub mod node;
pub mod proto;
pub mod serial;

pub use addr::{Addr, ByteOrder, Offset};
pub use auxdata::{AuxDataTable, TypeExpr, Value};
pub use context::Context;
pub use error::{
    AuxDataError, DecodeError, EnvelopeError, Error, IntegrityWarning, UsageError,
};
pub use ir::block::DecodeMode;
pub use ir::cfg::{Cfg, EdgeLabel, EdgeType};
pub use ir::interval::ByteValue;
pub use ir::module::{FileFormat, Isa};
pub use ir::section::SectionFlag;
pub use ir::symbol::{SymbolPayload, Visibility};
pub use ir::symexpr::{ExprAttribute, ExprKind, SymbolicExpression};
pub use ir::LoadResult;
pub use node::{
    Block, ByteInterval, ChangeStatus, CodeBlock, DataBlock, Ir, Module, Node, ProxyBlock,
    Section, Symbol,
};
pub use serial::{upgrade, SCHEMA_VERSION};
