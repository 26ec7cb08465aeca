//! Code, data, and proxy blocks.
//!
//! Code and data blocks live inside a byte interval at a byte offset; their
//! address is derived from the interval's. Proxy blocks carry no bytes and
//! exist only as CFG endpoints for targets outside the IR.

use uuid::Uuid;

use crate::addr::{Addr, ByteOrder};
use crate::context::Context;
use crate::error::UsageError;
use crate::ir::interval::ByteValue;
use crate::ir::module;
use crate::node::{ByteInterval, CodeBlock, DataBlock, Module, ProxyBlock};

/// Instruction decode mode for architectures with more than one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DecodeMode {
    #[default]
    Default,
    Thumb,
}

impl DecodeMode {
    pub(crate) fn wire_tag(self) -> u64 {
        match self {
            DecodeMode::Default => 0,
            DecodeMode::Thumb => 1,
        }
    }

    pub(crate) fn from_wire_tag(tag: u64) -> Option<DecodeMode> {
        match tag {
            0 => Some(DecodeMode::Default),
            1 => Some(DecodeMode::Thumb),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct CodeBlockData {
    pub(crate) uuid: Uuid,
    pub(crate) parent: Option<ByteInterval>,
    /// Byte offset within the owning interval; meaningful only when attached.
    pub(crate) offset: u64,
    pub(crate) size: u64,
    pub(crate) decode_mode: DecodeMode,
}

impl CodeBlock {
    /// Creates a detached code block of `size` bytes.
    pub fn new(ctx: &mut Context, size: u64) -> CodeBlock {
        let uuid = fresh_uuid(ctx);
        Self::with_uuid(ctx, uuid, size).expect("fresh UUID cannot collide")
    }

    /// Creates a detached code block carrying a caller-chosen UUID.
    pub fn with_uuid(ctx: &mut Context, uuid: Uuid, size: u64) -> Result<CodeBlock, UsageError> {
        ctx.alloc_code_block(CodeBlockData {
            uuid,
            parent: None,
            offset: 0,
            size,
            decode_mode: DecodeMode::Default,
        })
    }

    pub fn uuid(self, ctx: &Context) -> Uuid {
        ctx.code_block(self).uuid
    }

    pub fn byte_interval(self, ctx: &Context) -> Option<ByteInterval> {
        ctx.code_block(self).parent
    }

    pub fn offset(self, ctx: &Context) -> u64 {
        ctx.code_block(self).offset
    }

    pub fn size(self, ctx: &Context) -> u64 {
        ctx.code_block(self).size
    }

    pub fn decode_mode(self, ctx: &Context) -> DecodeMode {
        ctx.code_block(self).decode_mode
    }

    pub fn set_decode_mode(self, ctx: &mut Context, mode: DecodeMode) {
        ctx.code_block_mut(self).decode_mode = mode;
    }

    /// The block's address: interval address plus offset, when the interval
    /// is addressed.
    pub fn address(self, ctx: &Context) -> Option<Addr> {
        let data = ctx.code_block(self);
        let bi = data.parent?;
        bi.address(ctx).map(|a| a + data.offset)
    }

    /// Resizes the block. Rejected with no observable change if the new
    /// extent would overrun the owning interval.
    pub fn set_size(self, ctx: &mut Context, size: u64) -> Result<(), UsageError> {
        let (parent, offset) = {
            let data = ctx.code_block(self);
            (data.parent, data.offset)
        };
        check_extent(ctx, parent, offset, size)?;
        ctx.code_block_mut(self).size = size;
        let uuid = self.uuid(ctx);
        module::reindex_symbols_referring(ctx, &[uuid]);
        Ok(())
    }

    /// Typed view of the block's bytes in the requested order. `None` while
    /// the block is detached from any interval.
    pub fn bytes<T: ByteValue>(self, ctx: &Context, order: ByteOrder) -> Option<Vec<T>> {
        let data = ctx.code_block(self);
        let bi = data.parent?;
        Some(bi.bytes_in::<T>(ctx, data.offset, data.size, order))
    }
}

#[derive(Debug)]
pub struct DataBlockData {
    pub(crate) uuid: Uuid,
    pub(crate) parent: Option<ByteInterval>,
    pub(crate) offset: u64,
    pub(crate) size: u64,
}

impl DataBlock {
    /// Creates a detached data block of `size` bytes.
    pub fn new(ctx: &mut Context, size: u64) -> DataBlock {
        let uuid = fresh_uuid(ctx);
        Self::with_uuid(ctx, uuid, size).expect("fresh UUID cannot collide")
    }

    pub fn with_uuid(ctx: &mut Context, uuid: Uuid, size: u64) -> Result<DataBlock, UsageError> {
        ctx.alloc_data_block(DataBlockData { uuid, parent: None, offset: 0, size })
    }

    pub fn uuid(self, ctx: &Context) -> Uuid {
        ctx.data_block(self).uuid
    }

    pub fn byte_interval(self, ctx: &Context) -> Option<ByteInterval> {
        ctx.data_block(self).parent
    }

    pub fn offset(self, ctx: &Context) -> u64 {
        ctx.data_block(self).offset
    }

    pub fn size(self, ctx: &Context) -> u64 {
        ctx.data_block(self).size
    }

    pub fn address(self, ctx: &Context) -> Option<Addr> {
        let data = ctx.data_block(self);
        let bi = data.parent?;
        bi.address(ctx).map(|a| a + data.offset)
    }

    pub fn set_size(self, ctx: &mut Context, size: u64) -> Result<(), UsageError> {
        let (parent, offset) = {
            let data = ctx.data_block(self);
            (data.parent, data.offset)
        };
        check_extent(ctx, parent, offset, size)?;
        ctx.data_block_mut(self).size = size;
        let uuid = self.uuid(ctx);
        module::reindex_symbols_referring(ctx, &[uuid]);
        Ok(())
    }

    pub fn bytes<T: ByteValue>(self, ctx: &Context, order: ByteOrder) -> Option<Vec<T>> {
        let data = ctx.data_block(self);
        let bi = data.parent?;
        Some(bi.bytes_in::<T>(ctx, data.offset, data.size, order))
    }
}

#[derive(Debug)]
pub struct ProxyBlockData {
    pub(crate) uuid: Uuid,
    pub(crate) parent: Option<Module>,
}

impl ProxyBlock {
    pub fn new(ctx: &mut Context) -> ProxyBlock {
        let uuid = fresh_uuid(ctx);
        Self::with_uuid(ctx, uuid).expect("fresh UUID cannot collide")
    }

    pub fn with_uuid(ctx: &mut Context, uuid: Uuid) -> Result<ProxyBlock, UsageError> {
        ctx.alloc_proxy_block(ProxyBlockData { uuid, parent: None })
    }

    pub fn uuid(self, ctx: &Context) -> Uuid {
        ctx.proxy_block(self).uuid
    }

    pub fn module(self, ctx: &Context) -> Option<Module> {
        ctx.proxy_block(self).parent
    }
}

/// Validates a block extent against its interval's size, if attached.
fn check_extent(
    ctx: &Context,
    parent: Option<ByteInterval>,
    offset: u64,
    size: u64,
) -> Result<(), UsageError> {
    if let Some(bi) = parent {
        let interval_size = bi.size(ctx);
        match offset.checked_add(size) {
            Some(end) if end <= interval_size => {}
            _ => return Err(UsageError::BlockExtent { offset, size, interval_size }),
        }
    }
    Ok(())
}

/// Draws a UUID no live node carries yet.
pub(crate) fn fresh_uuid(ctx: &Context) -> Uuid {
    loop {
        let uuid = Uuid::new_v4();
        if ctx.find(&uuid).is_none() {
            return uuid;
        }
    }
}
