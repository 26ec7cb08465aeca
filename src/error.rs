use thiserror::Error;

use uuid::Uuid;

/// Top-level error type for the GTIRB load/store pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("auxdata error: {0}")]
    AuxData(#[from] AuxDataError),

    #[error("usage error: {0}")]
    Usage(#[from] UsageError),
}

// ---------------------------------------------------------------------------
// Envelope errors
// ---------------------------------------------------------------------------

/// The framed container around the IR payload is unusable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("bad magic: expected \"GTIRB\"")]
    BadMagic,

    #[error("truncated header: {got} bytes, need {need}")]
    TruncatedHeader { got: usize, need: usize },

    #[error("unknown schema version {version} with no upgrade path")]
    UnknownVersion { version: u8 },
}

// ---------------------------------------------------------------------------
// Payload decode errors
// ---------------------------------------------------------------------------

/// The payload is malformed relative to its schema version.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected end of payload while reading {context}")]
    Truncated { context: &'static str },

    #[error("varint overflows 64 bits")]
    VarintOverflow,

    #[error("unsupported wire type {wire_type} for field {field}")]
    BadWireType { field: u32, wire_type: u8 },

    #[error("field {field}: expected {expected} bytes, found {found}")]
    BadLength {
        field: u32,
        expected: usize,
        found: usize,
    },

    #[error("invalid UTF-8 in field {field}")]
    BadUtf8 { field: u32 },

    #[error("unknown enum tag {tag} for {context}")]
    BadEnumTag { tag: u64, context: &'static str },

    #[error("missing required field '{name}' in {message}")]
    MissingField {
        message: &'static str,
        name: &'static str,
    },

    #[error("CFG edge arrays disagree: {edges} edges, {labels} {kind} entries")]
    EdgeArrayMismatch {
        edges: usize,
        labels: usize,
        kind: &'static str,
    },
}

// ---------------------------------------------------------------------------
// AuxData errors
// ---------------------------------------------------------------------------

/// A type expression failed to parse, or a value does not fit its type.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuxDataError {
    #[error("unparseable type expression '{text}': {detail}")]
    BadTypeExpression { text: String, detail: String },

    #[error("value does not match type '{type_name}': {detail}")]
    TypeMismatch { type_name: String, detail: String },

    #[error("payload truncated while decoding {context}")]
    PayloadTruncated { context: &'static str },

    #[error("{len} trailing bytes after decoding value")]
    TrailingBytes { len: usize },

    #[error("variant tag {tag} out of range (arity {arity})")]
    VariantTagOutOfRange { tag: u64, arity: usize },

    #[error("duplicate or misordered element in {container}")]
    UnorderedElement { container: &'static str },

    #[error("no schema registered under name '{name}'")]
    UnknownSchema { name: String },
}

// ---------------------------------------------------------------------------
// API usage errors
// ---------------------------------------------------------------------------

/// API misuse detectable at call time. Fatal for the operation; the
/// containing structures are left unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("block extent [{offset}, {offset}+{size}) exceeds interval size {interval_size}")]
    BlockExtent {
        offset: u64,
        size: u64,
        interval_size: u64,
    },

    #[error("symbolic expression offset {offset} not below interval size {interval_size}")]
    ExpressionOffset { offset: u64, interval_size: u64 },

    #[error("interval size {new_size} cuts into a child extent ending at {child_end}")]
    IntervalShrink { new_size: u64, child_end: u64 },

    #[error("UUID {uuid} already registered in this context")]
    DuplicateUuid { uuid: Uuid },

    #[error("node {uuid} belongs to a different container")]
    ForeignChild { uuid: Uuid },
}

// ---------------------------------------------------------------------------
// Integrity warnings
// ---------------------------------------------------------------------------

/// A dangling UUID reference discovered while materializing a loaded IR.
///
/// Non-fatal: the affected field is left empty or the edge is dropped, and
/// the load succeeds with the warning attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityWarning {
    /// A symbol's referent UUID resolves to no node; the payload was cleared.
    DanglingReferent { symbol: Uuid, referent: Uuid },
    /// A module entry point UUID resolves to no code block.
    DanglingEntryPoint { module: Uuid, entry: Uuid },
    /// A CFG edge endpoint resolves to no block; the edge was dropped.
    DanglingCfgEndpoint { endpoint: Uuid },
    /// A symbolic expression names a symbol UUID that resolves to no symbol.
    /// The expression is kept as-is.
    DanglingExpressionSymbol { interval: Uuid, offset: u64, symbol: Uuid },
}

impl std::fmt::Display for IntegrityWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityWarning::DanglingReferent { symbol, referent } => {
                write!(f, "symbol {symbol} refers to missing node {referent}")
            }
            IntegrityWarning::DanglingEntryPoint { module, entry } => {
                write!(f, "module {module} entry point {entry} not found")
            }
            IntegrityWarning::DanglingCfgEndpoint { endpoint } => {
                write!(f, "CFG edge endpoint {endpoint} not found; edge dropped")
            }
            IntegrityWarning::DanglingExpressionSymbol { interval, offset, symbol } => {
                write!(
                    f,
                    "symbolic expression at {interval}+{offset:#x} names missing symbol {symbol}"
                )
            }
        }
    }
}
