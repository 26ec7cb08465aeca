//! Byte intervals: the unit of byte ownership.
//!
//! An interval covers `size` addressable bytes of which only the first
//! `contents.len()` are materialized; reads past the payload yield zero.
//! Blocks and symbolic expressions hang off the interval keyed by byte
//! offset. The optional fixed address makes the interval (and everything in
//! it) addressable; a `None` address means the interval floats.

use std::collections::BTreeMap;

use uuid::Uuid;

use crate::addr::{Addr, ByteOrder};
use crate::context::Context;
use crate::error::UsageError;
use crate::ir::block::fresh_uuid;
use crate::ir::module;
use crate::ir::symexpr::SymbolicExpression;
use crate::node::{Block, ByteInterval, ChangeStatus, CodeBlock, DataBlock, Section};

/// A fixed-width value that can be read from and written to interval bytes
/// under either byte order.
pub trait ByteValue: Copy {
    const WIDTH: usize;
    fn from_le_slice(bytes: &[u8]) -> Self;
    fn from_be_slice(bytes: &[u8]) -> Self;
    fn write_le(self, out: &mut [u8]);
    fn write_be(self, out: &mut [u8]);
}

macro_rules! impl_byte_value {
    ($($ty:ty),*) => {$(
        impl ByteValue for $ty {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            fn from_le_slice(bytes: &[u8]) -> Self {
                <$ty>::from_le_bytes(bytes.try_into().expect("caller sized the slice"))
            }
            fn from_be_slice(bytes: &[u8]) -> Self {
                <$ty>::from_be_bytes(bytes.try_into().expect("caller sized the slice"))
            }
            fn write_le(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_le_bytes());
            }
            fn write_be(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_be_bytes());
            }
        }
    )*};
}

impl_byte_value!(u8, u16, u32, u64, i8, i16, i32, i64);

#[derive(Debug)]
pub struct ByteIntervalData {
    pub(crate) uuid: Uuid,
    pub(crate) parent: Option<Section>,
    pub(crate) address: Option<Addr>,
    pub(crate) size: u64,
    pub(crate) contents: Vec<u8>,
    pub(crate) order: ByteOrder,
    /// Blocks keyed by offset; several blocks may share an offset.
    pub(crate) blocks: BTreeMap<u64, Vec<Block>>,
    pub(crate) exprs: BTreeMap<u64, SymbolicExpression>,
}

impl ByteInterval {
    /// Creates a detached interval. `address` of `None` means floating.
    pub fn new(ctx: &mut Context, address: Option<Addr>, size: u64) -> ByteInterval {
        let uuid = fresh_uuid(ctx);
        Self::with_uuid(ctx, uuid, address, size).expect("fresh UUID cannot collide")
    }

    pub fn with_uuid(
        ctx: &mut Context,
        uuid: Uuid,
        address: Option<Addr>,
        size: u64,
    ) -> Result<ByteInterval, UsageError> {
        ctx.alloc_interval(ByteIntervalData {
            uuid,
            parent: None,
            address,
            size,
            contents: Vec::new(),
            order: ByteOrder::Undefined,
            blocks: BTreeMap::new(),
            exprs: BTreeMap::new(),
        })
    }

    pub fn uuid(self, ctx: &Context) -> Uuid {
        ctx.interval(self).uuid
    }

    pub fn section(self, ctx: &Context) -> Option<Section> {
        ctx.interval(self).parent
    }

    pub fn address(self, ctx: &Context) -> Option<Addr> {
        ctx.interval(self).address
    }

    /// Moves or floats the interval. Every derived address (blocks inside,
    /// symbols bound to them, the owning section's extent) follows.
    pub fn set_address(self, ctx: &mut Context, address: Option<Addr>) {
        if ctx.interval(self).address == address {
            return;
        }
        ctx.interval_mut(self).address = address;
        if let Some(section) = ctx.interval(self).parent {
            module::refresh_section_extent(ctx, section);
        }
        let affected = self.child_uuids(ctx);
        module::reindex_symbols_referring(ctx, &affected);
    }

    pub fn size(self, ctx: &Context) -> u64 {
        ctx.interval(self).size
    }

    /// Resizes the interval. Shrinking below any block extent or expression
    /// anchor is a usage error and changes nothing.
    pub fn set_size(self, ctx: &mut Context, size: u64) -> Result<(), UsageError> {
        let child_end = self.max_child_end(ctx);
        if size < child_end {
            return Err(UsageError::IntervalShrink { new_size: size, child_end });
        }
        {
            let data = ctx.interval_mut(self);
            data.size = size;
            if data.contents.len() as u64 > size {
                data.contents.truncate(size as usize);
            }
        }
        if let Some(section) = ctx.interval(self).parent {
            module::refresh_section_extent(ctx, section);
        }
        // The interval's own end moved; at-end symbols bound to it follow.
        let uuid = self.uuid(ctx);
        module::reindex_symbols_referring(ctx, &[uuid]);
        Ok(())
    }

    fn max_child_end(self, ctx: &Context) -> u64 {
        let data = ctx.interval(self);
        let mut end = data.exprs.keys().next_back().map(|&o| o + 1).unwrap_or(0);
        for (&offset, blocks) in &data.blocks {
            for b in blocks {
                end = end.max(offset + b.size(ctx));
            }
        }
        end
    }

    /// Bytes materialized so far; the tail up to `size` reads as zero.
    pub fn contents(self, ctx: &Context) -> &[u8] {
        &ctx.interval(self).contents
    }

    pub fn initialized_size(self, ctx: &Context) -> u64 {
        ctx.interval(self).contents.len() as u64
    }

    /// Replaces the payload. The allocated size grows if the new payload is
    /// longer than it.
    pub fn set_contents(self, ctx: &mut Context, contents: Vec<u8>) {
        let grew = {
            let data = ctx.interval_mut(self);
            let grew = contents.len() as u64 > data.size;
            if grew {
                data.size = contents.len() as u64;
            }
            data.contents = contents;
            grew
        };
        if grew {
            if let Some(section) = ctx.interval(self).parent {
                module::refresh_section_extent(ctx, section);
            }
            let uuid = self.uuid(ctx);
            module::reindex_symbols_referring(ctx, &[uuid]);
        }
    }

    pub fn byte_order(self, ctx: &Context) -> ByteOrder {
        ctx.interval(self).order
    }

    pub fn set_byte_order(self, ctx: &mut Context, order: ByteOrder) {
        ctx.interval_mut(self).order = order;
    }

    // ── blocks ──────────────────────────────────────────────────────────────

    /// Attaches a code block at `offset`.
    pub fn add_code_block(
        self,
        ctx: &mut Context,
        offset: u64,
        block: CodeBlock,
    ) -> Result<ChangeStatus, UsageError> {
        let size = block.size(ctx);
        self.add_block(ctx, offset, size, Block::Code(block))
    }

    /// Attaches a data block at `offset`.
    pub fn add_data_block(
        self,
        ctx: &mut Context,
        offset: u64,
        block: DataBlock,
    ) -> Result<ChangeStatus, UsageError> {
        let size = block.size(ctx);
        self.add_block(ctx, offset, size, Block::Data(block))
    }

    fn add_block(
        self,
        ctx: &mut Context,
        offset: u64,
        size: u64,
        block: Block,
    ) -> Result<ChangeStatus, UsageError> {
        let current = block.byte_interval(ctx);
        match current {
            Some(bi) if bi == self => return Ok(ChangeStatus::NoChange),
            Some(_) => return Ok(ChangeStatus::Rejected),
            None => {}
        }
        let interval_size = self.size(ctx);
        match offset.checked_add(size) {
            Some(end) if end <= interval_size => {}
            _ => return Err(UsageError::BlockExtent { offset, size, interval_size }),
        }
        match block {
            Block::Code(b) => {
                let data = ctx.code_block_mut(b);
                data.parent = Some(self);
                data.offset = offset;
            }
            Block::Data(b) => {
                let data = ctx.data_block_mut(b);
                data.parent = Some(self);
                data.offset = offset;
            }
        }
        ctx.interval_mut(self).blocks.entry(offset).or_default().push(block);
        let uuid = block.uuid(ctx);
        module::reindex_symbols_referring(ctx, &[uuid]);
        Ok(ChangeStatus::Accepted)
    }

    /// Detaches a block. Incident CFG edges are left alone; callers that
    /// drop the block for good must reconcile the graph themselves.
    pub fn remove_block(self, ctx: &mut Context, block: Block) -> ChangeStatus {
        if block.byte_interval(ctx) != Some(self) {
            return ChangeStatus::NoChange;
        }
        let offset = block.offset(ctx);
        {
            let data = ctx.interval_mut(self);
            if let Some(list) = data.blocks.get_mut(&offset) {
                list.retain(|b| *b != block);
                if list.is_empty() {
                    data.blocks.remove(&offset);
                }
            }
        }
        match block {
            Block::Code(b) => ctx.code_block_mut(b).parent = None,
            Block::Data(b) => ctx.data_block_mut(b).parent = None,
        }
        let uuid = block.uuid(ctx);
        module::reindex_symbols_referring(ctx, &[uuid]);
        ChangeStatus::Accepted
    }

    /// Blocks in ascending offset order; ties in insertion order.
    pub fn blocks(self, ctx: &Context) -> impl Iterator<Item = Block> + '_ {
        ctx.interval(self).blocks.values().flatten().copied()
    }

    pub fn block_count(self, ctx: &Context) -> usize {
        ctx.interval(self).blocks.values().map(Vec::len).sum()
    }

    // ── symbolic expressions ────────────────────────────────────────────────

    /// Anchors an expression at `offset`, replacing any previous one there.
    /// The offset must lie strictly below the interval's size.
    pub fn insert_symbolic_expression(
        self,
        ctx: &mut Context,
        offset: u64,
        expr: SymbolicExpression,
    ) -> Result<(), UsageError> {
        let interval_size = self.size(ctx);
        if offset >= interval_size {
            return Err(UsageError::ExpressionOffset { offset, interval_size });
        }
        ctx.interval_mut(self).exprs.insert(offset, expr);
        Ok(())
    }

    pub fn remove_symbolic_expression(
        self,
        ctx: &mut Context,
        offset: u64,
    ) -> Option<SymbolicExpression> {
        ctx.interval_mut(self).exprs.remove(&offset)
    }

    pub fn symbolic_expression(self, ctx: &Context, offset: u64) -> Option<&SymbolicExpression> {
        ctx.interval(self).exprs.get(&offset)
    }

    /// Expressions in ascending offset order.
    pub fn symbolic_expressions(
        self,
        ctx: &Context,
    ) -> impl Iterator<Item = (u64, &SymbolicExpression)> + '_ {
        ctx.interval(self).exprs.iter().map(|(&o, e)| (o, e))
    }

    // ── typed byte access ───────────────────────────────────────────────────

    /// Typed read over the whole extent. Stored byte groups are interpreted
    /// in `order`; `Undefined` falls back to the interval's declared order,
    /// and a declared `Undefined` reads as little-endian. Bytes past the
    /// payload are zero; a trailing partial element is dropped.
    pub fn bytes<T: ByteValue>(self, ctx: &Context, order: ByteOrder) -> Vec<T> {
        let size = self.size(ctx);
        self.bytes_in::<T>(ctx, 0, size, order)
    }

    /// Typed read of `len` bytes starting at `offset`.
    pub fn bytes_in<T: ByteValue>(
        self,
        ctx: &Context,
        offset: u64,
        len: u64,
        order: ByteOrder,
    ) -> Vec<T> {
        let data = ctx.interval(self);
        let big = self.effective_order(ctx, order) == ByteOrder::Big;
        let count = (len as usize) / T::WIDTH;
        let mut out = Vec::with_capacity(count);
        let mut group = vec![0u8; T::WIDTH];
        for i in 0..count {
            let start = offset as usize + i * T::WIDTH;
            for (j, slot) in group.iter_mut().enumerate() {
                *slot = data.contents.get(start + j).copied().unwrap_or(0);
            }
            out.push(if big { T::from_be_slice(&group) } else { T::from_le_slice(&group) });
        }
        out
    }

    /// Typed write at `offset`: `values` are serialized in `order` (with the
    /// same fallbacks as [`bytes`](Self::bytes)). The payload grows as
    /// needed but never past the allocated size.
    pub fn write_bytes<T: ByteValue>(
        self,
        ctx: &mut Context,
        offset: u64,
        values: &[T],
        order: ByteOrder,
    ) -> Result<(), UsageError> {
        let interval_size = self.size(ctx);
        let span = (values.len() * T::WIDTH) as u64;
        match offset.checked_add(span) {
            Some(end) if end <= interval_size => {}
            _ => {
                return Err(UsageError::BlockExtent { offset, size: span, interval_size });
            }
        }
        let big = self.effective_order(ctx, order) == ByteOrder::Big;
        let data = ctx.interval_mut(self);
        let end = (offset + span) as usize;
        if data.contents.len() < end {
            data.contents.resize(end, 0);
        }
        for (i, &v) in values.iter().enumerate() {
            let start = offset as usize + i * T::WIDTH;
            let slot = &mut data.contents[start..start + T::WIDTH];
            if big {
                v.write_be(slot);
            } else {
                v.write_le(slot);
            }
        }
        Ok(())
    }

    fn effective_order(self, ctx: &Context, requested: ByteOrder) -> ByteOrder {
        let order = match requested {
            ByteOrder::Undefined => ctx.interval(self).order,
            other => other,
        };
        match order {
            ByteOrder::Undefined => ByteOrder::Little,
            other => other,
        }
    }

    /// UUIDs whose derived addresses depend on this interval's placement.
    fn child_uuids(self, ctx: &Context) -> Vec<Uuid> {
        let data = ctx.interval(self);
        let mut out = vec![data.uuid];
        for blocks in data.blocks.values() {
            for b in blocks {
                out.push(b.uuid(ctx));
            }
        }
        out
    }
}
