//! Sections: named, flagged regions made of byte intervals.

use std::collections::BTreeSet;

use uuid::Uuid;

use crate::addr::Addr;
use crate::context::Context;
use crate::error::UsageError;
use crate::ir::block::fresh_uuid;
use crate::ir::module;
use crate::node::{ByteInterval, ChangeStatus, Module, Section};

/// Section protection / content flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SectionFlag {
    Readable,
    Writable,
    Executable,
    Loaded,
    Initialized,
    ThreadLocal,
}

impl SectionFlag {
    pub(crate) fn wire_tag(self) -> u64 {
        match self {
            SectionFlag::Readable => 1,
            SectionFlag::Writable => 2,
            SectionFlag::Executable => 3,
            SectionFlag::Loaded => 4,
            SectionFlag::Initialized => 5,
            SectionFlag::ThreadLocal => 6,
        }
    }

    pub(crate) fn from_wire_tag(tag: u64) -> Option<SectionFlag> {
        match tag {
            1 => Some(SectionFlag::Readable),
            2 => Some(SectionFlag::Writable),
            3 => Some(SectionFlag::Executable),
            4 => Some(SectionFlag::Loaded),
            5 => Some(SectionFlag::Initialized),
            6 => Some(SectionFlag::ThreadLocal),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SectionData {
    pub(crate) uuid: Uuid,
    pub(crate) parent: Option<Module>,
    pub(crate) name: String,
    pub(crate) flags: BTreeSet<SectionFlag>,
    pub(crate) intervals: Vec<ByteInterval>,
    /// Extent under which the owning module currently indexes this section.
    pub(crate) indexed_extent: Option<(u64, u64)>,
}

impl Section {
    pub fn new(ctx: &mut Context, name: impl Into<String>) -> Section {
        let uuid = fresh_uuid(ctx);
        Self::with_uuid(ctx, uuid, name).expect("fresh UUID cannot collide")
    }

    pub fn with_uuid(
        ctx: &mut Context,
        uuid: Uuid,
        name: impl Into<String>,
    ) -> Result<Section, UsageError> {
        ctx.alloc_section(SectionData {
            uuid,
            parent: None,
            name: name.into(),
            flags: BTreeSet::new(),
            intervals: Vec::new(),
            indexed_extent: None,
        })
    }

    pub fn uuid(self, ctx: &Context) -> Uuid {
        ctx.section(self).uuid
    }

    pub fn module(self, ctx: &Context) -> Option<Module> {
        ctx.section(self).parent
    }

    pub fn name(self, ctx: &Context) -> &str {
        &ctx.section(self).name
    }

    /// Renames the section; the owning module's name index is updated before
    /// the new name becomes visible.
    pub fn set_name(self, ctx: &mut Context, name: impl Into<String>) {
        let name = name.into();
        if let Some(m) = ctx.section(self).parent {
            let old = ctx.section(self).name.clone();
            module::rename_section_in_index(ctx, m, self, &old, &name);
        }
        ctx.section_mut(self).name = name;
    }

    pub fn flags(self, ctx: &Context) -> &BTreeSet<SectionFlag> {
        &ctx.section(self).flags
    }

    pub fn is_flag_set(self, ctx: &Context, flag: SectionFlag) -> bool {
        ctx.section(self).flags.contains(&flag)
    }

    pub fn add_flag(self, ctx: &mut Context, flag: SectionFlag) {
        ctx.section_mut(self).flags.insert(flag);
    }

    pub fn remove_flag(self, ctx: &mut Context, flag: SectionFlag) {
        ctx.section_mut(self).flags.remove(&flag);
    }

    pub fn byte_intervals(self, ctx: &Context) -> &[ByteInterval] {
        &ctx.section(self).intervals
    }

    /// Attaches an interval to this section. `Rejected` if it already
    /// belongs to another section.
    pub fn add_byte_interval(self, ctx: &mut Context, bi: ByteInterval) -> ChangeStatus {
        match bi.section(ctx) {
            Some(s) if s == self => return ChangeStatus::NoChange,
            Some(_) => return ChangeStatus::Rejected,
            None => {}
        }
        ctx.interval_mut(bi).parent = Some(self);
        ctx.section_mut(self).intervals.push(bi);
        module::refresh_section_extent(ctx, self);
        let affected = interval_uuids(ctx, bi);
        module::reindex_symbols_referring(ctx, &affected);
        ChangeStatus::Accepted
    }

    /// Detaches an interval. Blocks inside keep their offsets but lose their
    /// addresses until the interval is reattached somewhere addressable.
    pub fn remove_byte_interval(self, ctx: &mut Context, bi: ByteInterval) -> ChangeStatus {
        if bi.section(ctx) != Some(self) {
            return ChangeStatus::NoChange;
        }
        ctx.section_mut(self).intervals.retain(|i| *i != bi);
        ctx.interval_mut(bi).parent = None;
        module::refresh_section_extent(ctx, self);
        let affected = interval_uuids(ctx, bi);
        module::reindex_symbols_referring(ctx, &affected);
        ChangeStatus::Accepted
    }

    /// Lowest address covered by any addressed interval.
    pub fn address(self, ctx: &Context) -> Option<Addr> {
        self.extent(ctx).map(|(lo, _)| Addr(lo))
    }

    /// Span from the lowest to the highest covered address, when addressed.
    pub fn size(self, ctx: &Context) -> Option<u64> {
        self.extent(ctx).map(|(lo, hi)| hi - lo)
    }

    /// Half-open `[lo, hi)` address extent over all addressed intervals.
    pub(crate) fn extent(self, ctx: &Context) -> Option<(u64, u64)> {
        let mut extent: Option<(u64, u64)> = None;
        for &bi in &ctx.section(self).intervals {
            if let Some(addr) = ctx.interval(bi).address {
                let lo = addr.0;
                let hi = lo.saturating_add(ctx.interval(bi).size);
                extent = Some(match extent {
                    Some((curlo, curhi)) => (curlo.min(lo), curhi.max(hi)),
                    None => (lo, hi),
                });
            }
        }
        extent
    }
}

fn interval_uuids(ctx: &Context, bi: ByteInterval) -> Vec<Uuid> {
    let data = ctx.interval(bi);
    let mut out = vec![data.uuid];
    for blocks in data.blocks.values() {
        for b in blocks {
            out.push(b.uuid(ctx));
        }
    }
    out
}
