//! Symbols: names bound to an address or to another node.
//!
//! The referent side of a symbol is a weak UUID reference resolved through
//! the Context table; a symbol never owns what it names. A symbol's address
//! is derived: the literal payload if present, otherwise the referent's
//! address (plus the referent's size when the at-end flag is set). The
//! module's by-address index keys on that derived value.

use uuid::Uuid;

use crate::addr::Addr;
use crate::context::Context;
use crate::error::UsageError;
use crate::ir::block::fresh_uuid;
use crate::ir::module;
use crate::node::{Module, Node, Symbol};

/// Linkage visibility of a symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Visibility {
    Undefined,
    #[default]
    Global,
    Local,
    Static,
    Extern,
}

impl Visibility {
    pub(crate) fn wire_tag(self) -> u64 {
        match self {
            Visibility::Undefined => 0,
            Visibility::Global => 1,
            Visibility::Local => 2,
            Visibility::Static => 3,
            Visibility::Extern => 4,
        }
    }

    pub(crate) fn from_wire_tag(tag: u64) -> Option<Visibility> {
        match tag {
            0 => Some(Visibility::Undefined),
            1 => Some(Visibility::Global),
            2 => Some(Visibility::Local),
            3 => Some(Visibility::Static),
            4 => Some(Visibility::Extern),
            _ => None,
        }
    }
}

/// What a symbol is bound to, when it is bound at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolPayload {
    /// A literal address.
    Addr(Addr),
    /// A weak reference to another node in the same IR.
    Referent(Uuid),
}

#[derive(Debug)]
pub struct SymbolData {
    pub(crate) uuid: Uuid,
    pub(crate) parent: Option<Module>,
    pub(crate) name: String,
    pub(crate) payload: Option<SymbolPayload>,
    pub(crate) at_end: bool,
    pub(crate) visibility: Visibility,
    /// Address under which the owning module currently indexes this symbol.
    pub(crate) indexed_addr: Option<u64>,
}

impl Symbol {
    /// Creates a detached, unbound symbol.
    pub fn new(ctx: &mut Context, name: impl Into<String>) -> Symbol {
        let uuid = fresh_uuid(ctx);
        Self::with_uuid(ctx, uuid, name).expect("fresh UUID cannot collide")
    }

    pub fn with_uuid(
        ctx: &mut Context,
        uuid: Uuid,
        name: impl Into<String>,
    ) -> Result<Symbol, UsageError> {
        ctx.alloc_symbol(SymbolData {
            uuid,
            parent: None,
            name: name.into(),
            payload: None,
            at_end: false,
            visibility: Visibility::default(),
            indexed_addr: None,
        })
    }

    pub fn uuid(self, ctx: &Context) -> Uuid {
        ctx.symbol(self).uuid
    }

    pub fn module(self, ctx: &Context) -> Option<Module> {
        ctx.symbol(self).parent
    }

    pub fn name(self, ctx: &Context) -> &str {
        &ctx.symbol(self).name
    }

    /// Renames the symbol; the owning module's name index is updated before
    /// the new name becomes visible.
    pub fn set_name(self, ctx: &mut Context, name: impl Into<String>) {
        let name = name.into();
        let parent = ctx.symbol(self).parent;
        if let Some(m) = parent {
            let old = ctx.symbol(self).name.clone();
            module::rename_symbol_in_index(ctx, m, self, &old, &name);
        }
        ctx.symbol_mut(self).name = name;
    }

    pub fn payload(self, ctx: &Context) -> Option<SymbolPayload> {
        ctx.symbol(self).payload
    }

    /// The referent node, when the payload is a live reference.
    pub fn referent(self, ctx: &Context) -> Option<Node> {
        match ctx.symbol(self).payload {
            Some(SymbolPayload::Referent(uuid)) => ctx.find(&uuid),
            _ => None,
        }
    }

    pub fn set_payload(self, ctx: &mut Context, payload: Option<SymbolPayload>) {
        let old = ctx.symbol(self).payload;
        if old == payload {
            return;
        }
        if let Some(m) = ctx.symbol(self).parent {
            let old_ref = referent_of(old);
            let new_ref = referent_of(payload);
            if old_ref != new_ref {
                module::rereference_symbol_in_index(ctx, m, self, old_ref, new_ref);
            }
        }
        ctx.symbol_mut(self).payload = payload;
        module::reindex_symbol_addr(ctx, self);
    }

    /// Binds the symbol to a literal address.
    pub fn set_address(self, ctx: &mut Context, addr: Addr) {
        self.set_payload(ctx, Some(SymbolPayload::Addr(addr)));
    }

    /// Binds the symbol to a node by UUID.
    pub fn set_referent(self, ctx: &mut Context, referent: Uuid) {
        self.set_payload(ctx, Some(SymbolPayload::Referent(referent)));
    }

    pub fn at_end(self, ctx: &Context) -> bool {
        ctx.symbol(self).at_end
    }

    pub fn set_at_end(self, ctx: &mut Context, at_end: bool) {
        if ctx.symbol(self).at_end != at_end {
            ctx.symbol_mut(self).at_end = at_end;
            module::reindex_symbol_addr(ctx, self);
        }
    }

    pub fn visibility(self, ctx: &Context) -> Visibility {
        ctx.symbol(self).visibility
    }

    pub fn set_visibility(self, ctx: &mut Context, visibility: Visibility) {
        ctx.symbol_mut(self).visibility = visibility;
    }

    /// The symbol's derived address, if any.
    pub fn address(self, ctx: &Context) -> Option<Addr> {
        derived_address(ctx, self).map(Addr)
    }
}

pub(crate) fn referent_of(payload: Option<SymbolPayload>) -> Option<Uuid> {
    match payload {
        Some(SymbolPayload::Referent(uuid)) => Some(uuid),
        _ => None,
    }
}

/// Computes the address a symbol resolves to right now.
pub(crate) fn derived_address(ctx: &Context, sym: Symbol) -> Option<u64> {
    let data = ctx.symbol(sym);
    match data.payload? {
        SymbolPayload::Addr(a) => Some(a.0),
        SymbolPayload::Referent(uuid) => {
            let node = ctx.find(&uuid)?;
            let base = node.address(ctx)?.0;
            if data.at_end {
                Some(base.wrapping_add(node.size(ctx).unwrap_or(0)))
            } else {
                Some(base)
            }
        }
    }
}
