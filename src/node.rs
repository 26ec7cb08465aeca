//! Typed node handles and the untyped [`Node`] union.
//!
//! A handle is an opaque index into one of the [`Context`](crate::Context)
//! arenas. Handles are `Copy`, stay valid while the node is detached from any
//! parent, and are only invalidated by dropping the Context itself.

use crate::context::Context;
use uuid::Uuid;

/// Outcome of a container mutation.
///
/// `Rejected` guarantees that no parent pointer and no index was changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// The child was inserted or removed and all indices were updated.
    Accepted,
    /// The operation was a no-op (child already present / already absent).
    NoChange,
    /// An invariant would have been violated; nothing was changed.
    Rejected,
}

/// Handle to the root IR node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ir(pub(crate) u32);

/// Handle to a module (one binary image).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Module(pub(crate) u32);

/// Handle to a named section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Section(pub(crate) u32);

/// Handle to a contiguous byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ByteInterval(pub(crate) u32);

/// Handle to a basic block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CodeBlock(pub(crate) u32);

/// Handle to an addressable data object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DataBlock(pub(crate) u32);

/// Handle to a bodyless CFG endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProxyBlock(pub(crate) u32);

/// Handle to a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(pub(crate) u32);

/// A block that lives inside a [`ByteInterval`]: code or data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Block {
    Code(CodeBlock),
    Data(DataBlock),
}

impl Block {
    pub fn uuid(self, ctx: &Context) -> Uuid {
        match self {
            Block::Code(b) => b.uuid(ctx),
            Block::Data(b) => b.uuid(ctx),
        }
    }

    pub fn size(self, ctx: &Context) -> u64 {
        match self {
            Block::Code(b) => b.size(ctx),
            Block::Data(b) => b.size(ctx),
        }
    }

    pub fn offset(self, ctx: &Context) -> u64 {
        match self {
            Block::Code(b) => b.offset(ctx),
            Block::Data(b) => b.offset(ctx),
        }
    }

    pub fn byte_interval(self, ctx: &Context) -> Option<ByteInterval> {
        match self {
            Block::Code(b) => b.byte_interval(ctx),
            Block::Data(b) => b.byte_interval(ctx),
        }
    }

    /// The block's address, defined iff its interval has one.
    pub fn address(self, ctx: &Context) -> Option<crate::Addr> {
        match self {
            Block::Code(b) => b.address(ctx),
            Block::Data(b) => b.address(ctx),
        }
    }
}

/// Any node kind, as stored in the Context's UUID table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Ir(Ir),
    Module(Module),
    Section(Section),
    ByteInterval(ByteInterval),
    CodeBlock(CodeBlock),
    DataBlock(DataBlock),
    ProxyBlock(ProxyBlock),
    Symbol(Symbol),
}

impl Node {
    pub fn uuid(self, ctx: &Context) -> Uuid {
        match self {
            Node::Ir(n) => n.uuid(ctx),
            Node::Module(n) => n.uuid(ctx),
            Node::Section(n) => n.uuid(ctx),
            Node::ByteInterval(n) => n.uuid(ctx),
            Node::CodeBlock(n) => n.uuid(ctx),
            Node::DataBlock(n) => n.uuid(ctx),
            Node::ProxyBlock(n) => n.uuid(ctx),
            Node::Symbol(n) => n.uuid(ctx),
        }
    }

    /// The node's address, for kinds that have one.
    pub fn address(self, ctx: &Context) -> Option<crate::Addr> {
        match self {
            Node::ByteInterval(n) => n.address(ctx),
            Node::CodeBlock(n) => n.address(ctx),
            Node::DataBlock(n) => n.address(ctx),
            _ => None,
        }
    }

    /// The node's size in bytes, for kinds that have one.
    pub fn size(self, ctx: &Context) -> Option<u64> {
        match self {
            Node::ByteInterval(n) => Some(n.size(ctx)),
            Node::CodeBlock(n) => Some(n.size(ctx)),
            Node::DataBlock(n) => Some(n.size(ctx)),
            _ => None,
        }
    }
}
