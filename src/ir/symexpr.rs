//! Symbolic expressions: symbol-relative values anchored at byte-interval
//! offsets.
//!
//! Symbols are referenced by UUID, never owned. Detaching a referenced
//! symbol from its module leaves the expression in place with a dangling
//! UUID; the load path surfaces such references as integrity warnings.

use std::collections::BTreeSet;

use uuid::Uuid;

/// Relocation-style attribute attached to an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExprAttribute {
    GotRelative,
    GotPageRelative,
    PltRelative,
    TlsOffset,
    PageRelative,
    LowPart,
    HighPart,
}

impl ExprAttribute {
    pub(crate) fn wire_tag(self) -> u64 {
        match self {
            ExprAttribute::GotRelative => 1,
            ExprAttribute::GotPageRelative => 2,
            ExprAttribute::PltRelative => 3,
            ExprAttribute::TlsOffset => 4,
            ExprAttribute::PageRelative => 5,
            ExprAttribute::LowPart => 6,
            ExprAttribute::HighPart => 7,
        }
    }

    pub(crate) fn from_wire_tag(tag: u64) -> Option<ExprAttribute> {
        match tag {
            1 => Some(ExprAttribute::GotRelative),
            2 => Some(ExprAttribute::GotPageRelative),
            3 => Some(ExprAttribute::PltRelative),
            4 => Some(ExprAttribute::TlsOffset),
            5 => Some(ExprAttribute::PageRelative),
            6 => Some(ExprAttribute::LowPart),
            7 => Some(ExprAttribute::HighPart),
            _ => None,
        }
    }
}

/// The expression proper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExprKind {
    /// `symbol + offset`, where the result is an address.
    AddrConst { symbol: Uuid, offset: i64 },
    /// `(sym1 - sym2) / scale + offset`.
    AddrAddr {
        sym1: Uuid,
        sym2: Uuid,
        scale: i64,
        offset: i64,
    },
    /// `symbol + offset`, where the result is a plain value.
    SymConst { symbol: Uuid, offset: i64 },
}

/// An expression plus its attribute set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicExpression {
    pub kind: ExprKind,
    pub attributes: BTreeSet<ExprAttribute>,
}

impl SymbolicExpression {
    pub fn new(kind: ExprKind) -> Self {
        Self { kind, attributes: BTreeSet::new() }
    }

    pub fn with_attributes(kind: ExprKind, attributes: BTreeSet<ExprAttribute>) -> Self {
        Self { kind, attributes }
    }

    pub fn addr_const(symbol: Uuid, offset: i64) -> Self {
        Self::new(ExprKind::AddrConst { symbol, offset })
    }

    pub fn addr_addr(sym1: Uuid, sym2: Uuid, scale: i64, offset: i64) -> Self {
        Self::new(ExprKind::AddrAddr { sym1, sym2, scale, offset })
    }

    pub fn sym_const(symbol: Uuid, offset: i64) -> Self {
        Self::new(ExprKind::SymConst { symbol, offset })
    }

    /// UUIDs of every symbol the expression mentions.
    pub fn symbols(&self) -> Vec<Uuid> {
        match &self.kind {
            ExprKind::AddrConst { symbol, .. } | ExprKind::SymConst { symbol, .. } => {
                vec![*symbol]
            }
            ExprKind::AddrAddr { sym1, sym2, .. } => vec![*sym1, *sym2],
        }
    }
}
