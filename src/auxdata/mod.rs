//! Named, typed auxiliary tables attached to an IR or a Module.
//!
//! An entry stores its type expression (as the canonical printed string) and
//! the encoded payload. Decoding happens on demand; entries whose schema
//! this build knows nothing about pass through load/store byte-identically.

pub mod codec;
pub mod type_expr;

use std::collections::{BTreeMap, HashMap};
use std::sync::{OnceLock, RwLock};

use uuid::Uuid;

use crate::addr::{Addr, Offset};
use crate::error::AuxDataError;

pub use codec::{decode, encode};
pub use type_expr::TypeExpr;

/// Runtime representation of any AuxData value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Uuid(Uuid),
    Addr(Addr),
    Offset(Offset),
    Sequence(Vec<Value>),
    /// Canonical: ascending by encoded form, no duplicates. Build with
    /// [`Value::set_of`].
    Set(Vec<Value>),
    /// Canonical: keys ascending by encoded form, no duplicates. Build with
    /// [`Value::mapping_of`].
    Mapping(Vec<(Value, Value)>),
    Tuple(Vec<Value>),
    Variant { tag: u64, value: Box<Value> },
}

impl Value {
    /// Builds a set in canonical element order, dropping duplicates.
    pub fn set_of(items: Vec<Value>) -> Value {
        let mut keyed: Vec<(Vec<u8>, Value)> = items
            .into_iter()
            .map(|v| {
                let mut bytes = Vec::new();
                codec::encode_value(&v, &mut bytes);
                (bytes, v)
            })
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.dedup_by(|a, b| a.0 == b.0);
        Value::Set(keyed.into_iter().map(|(_, v)| v).collect())
    }

    /// Builds a mapping in canonical key order; on duplicate keys the first
    /// occurrence wins.
    pub fn mapping_of(pairs: Vec<(Value, Value)>) -> Value {
        let mut keyed: Vec<(Vec<u8>, (Value, Value))> = pairs
            .into_iter()
            .map(|(k, v)| {
                let mut bytes = Vec::new();
                codec::encode_value(&k, &mut bytes);
                (bytes, (k, v))
            })
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        keyed.dedup_by(|a, b| a.0 == b.0);
        Value::Mapping(keyed.into_iter().map(|(_, kv)| kv).collect())
    }

    /// Looks up a mapping value by key, comparing structurally.
    pub fn mapping_get(&self, key: &Value) -> Option<&Value> {
        match self {
            Value::Mapping(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

/// One stored entry: the printed type expression plus the encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxData {
    pub(crate) type_name: String,
    pub(crate) data: Vec<u8>,
}

impl AuxData {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Name → entry table. Iteration is in name order so serialization is
/// deterministic.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct AuxDataTable {
    entries: BTreeMap<String, AuxData>,
}

impl AuxDataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes `value` under `ty` and stores it, replacing any previous
    /// entry of the same name.
    pub fn set(
        &mut self,
        name: impl Into<String>,
        ty: &TypeExpr,
        value: &Value,
    ) -> Result<(), AuxDataError> {
        let data = codec::encode(ty, value)?;
        self.entries
            .insert(name.into(), AuxData { type_name: ty.to_string(), data });
        Ok(())
    }

    /// Encodes `value` under the globally registered schema for `name`.
    pub fn set_registered(
        &mut self,
        name: &str,
        value: &Value,
    ) -> Result<(), AuxDataError> {
        let ty = registered_schema(name).ok_or_else(|| AuxDataError::UnknownSchema {
            name: name.to_owned(),
        })?;
        self.set(name, &ty, value)
    }

    /// Stores an already-encoded payload verbatim. This is the pass-through
    /// path for schemata this build does not know.
    pub fn set_raw(
        &mut self,
        name: impl Into<String>,
        type_name: impl Into<String>,
        data: Vec<u8>,
    ) {
        self.entries
            .insert(name.into(), AuxData { type_name: type_name.into(), data });
    }

    /// Decodes the entry using its stored type expression.
    pub fn get(&self, name: &str) -> Result<Option<Value>, AuxDataError> {
        let entry = match self.entries.get(name) {
            Some(e) => e,
            None => return Ok(None),
        };
        let ty = TypeExpr::parse(&entry.type_name)?;
        Ok(Some(codec::decode(&ty, &entry.data)?))
    }

    /// The stored type expression and payload, undecoded.
    pub fn raw(&self, name: &str) -> Option<(&str, &[u8])> {
        self.entries
            .get(name)
            .map(|e| (e.type_name.as_str(), e.data.as_slice()))
    }

    pub fn remove(&mut self, name: &str) -> Option<AuxData> {
        self.entries.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AuxData)> {
        self.entries.iter().map(|(name, e)| (name.as_str(), e))
    }
}

// ---------------------------------------------------------------------------
// Schema registry
// ---------------------------------------------------------------------------

fn registry() -> &'static RwLock<HashMap<String, TypeExpr>> {
    static REGISTRY: OnceLock<RwLock<HashMap<String, TypeExpr>>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Associates `name` with a type expression for the rest of the process.
/// Intended to run once at program start; re-registration replaces.
pub fn register_schema(name: impl Into<String>, ty: TypeExpr) {
    registry()
        .write()
        .expect("schema registry lock poisoned")
        .insert(name.into(), ty);
}

/// The registered type expression for `name`, if any.
pub fn registered_schema(name: &str) -> Option<TypeExpr> {
    registry()
        .read()
        .expect("schema registry lock poisoned")
        .get(name)
        .cloned()
}

/// Registers the well-known schema names used across GTIRB tooling.
pub fn register_sanctioned_schemata() {
    let uuid_to_uuid_set = TypeExpr::mapping(TypeExpr::Uuid, TypeExpr::set(TypeExpr::Uuid));
    register_schema("functionBlocks", uuid_to_uuid_set.clone());
    register_schema("functionEntries", uuid_to_uuid_set);
    register_schema("functionNames", TypeExpr::mapping(TypeExpr::Uuid, TypeExpr::Uuid));
    register_schema("alignment", TypeExpr::mapping(TypeExpr::Uuid, TypeExpr::Uint64));
    register_schema("comments", TypeExpr::mapping(TypeExpr::Offset, TypeExpr::String));
    register_schema("padding", TypeExpr::mapping(TypeExpr::Offset, TypeExpr::Uint64));
    register_schema("symbolForwarding", TypeExpr::mapping(TypeExpr::Uuid, TypeExpr::Uuid));
    // The value strings carry source-language type spellings; they are
    // opaque to this crate.
    register_schema("types", TypeExpr::mapping(TypeExpr::Uuid, TypeExpr::String));
}
