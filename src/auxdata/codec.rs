//! Typed-value codec for AuxData payloads.
//!
//! Wire format (little-endian throughout, independent of host order):
//!
//! ```text
//! bool              1 byte, 0x00 / 0x01
//! intN / uintN      N/8 bytes, two's complement, little-endian
//! float / double    IEEE-754 binary32 / binary64, little-endian
//! string            u64 byte length, then UTF-8 bytes
//! UUID              16 raw bytes, canonical order
//! Addr              u64
//! Offset            UUID then u64
//! sequence<T>       u64 count, then count encodings of T
//! set<T>            like sequence; elements ascending by encoded form
//! mapping<K,V>      u64 count, then pairs; keys ascending by encoded form
//! tuple<T...>       fields concatenated, no count
//! variant<T...>     u64 zero-based tag, then the chosen field
//! ```
//!
//! Decoding is strict: trailing bytes, missing bytes, out-of-range variant
//! tags, and duplicate or misordered set elements / mapping keys all fail.
//! Strict ordering is what makes `encode(decode(bytes)) == bytes` hold.

use uuid::Uuid;

use crate::addr::{Addr, Offset};
use crate::auxdata::type_expr::TypeExpr;
use crate::auxdata::Value;
use crate::error::AuxDataError;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Validates `value` against `ty` and encodes it.
pub fn encode(ty: &TypeExpr, value: &Value) -> Result<Vec<u8>, AuxDataError> {
    check(ty, value)?;
    let mut out = Vec::new();
    encode_value(value, &mut out);
    Ok(out)
}

fn mismatch(ty: &TypeExpr, detail: impl Into<String>) -> AuxDataError {
    AuxDataError::TypeMismatch {
        type_name: ty.to_string(),
        detail: detail.into(),
    }
}

/// Structural type check; containers recurse into every element.
fn check(ty: &TypeExpr, value: &Value) -> Result<(), AuxDataError> {
    match (ty, value) {
        (TypeExpr::Bool, Value::Bool(_))
        | (TypeExpr::Int8, Value::I8(_))
        | (TypeExpr::Int16, Value::I16(_))
        | (TypeExpr::Int32, Value::I32(_))
        | (TypeExpr::Int64, Value::I64(_))
        | (TypeExpr::Uint8, Value::U8(_))
        | (TypeExpr::Uint16, Value::U16(_))
        | (TypeExpr::Uint32, Value::U32(_))
        | (TypeExpr::Uint64, Value::U64(_))
        | (TypeExpr::Float, Value::F32(_))
        | (TypeExpr::Double, Value::F64(_))
        | (TypeExpr::String, Value::String(_))
        | (TypeExpr::Uuid, Value::Uuid(_))
        | (TypeExpr::Addr, Value::Addr(_))
        | (TypeExpr::Offset, Value::Offset(_)) => Ok(()),
        (TypeExpr::Sequence(elem), Value::Sequence(items))
        | (TypeExpr::Set(elem), Value::Set(items)) => {
            for item in items {
                check(elem, item)?;
            }
            Ok(())
        }
        (TypeExpr::Mapping(key, val), Value::Mapping(pairs)) => {
            for (k, v) in pairs {
                check(key, k)?;
                check(val, v)?;
            }
            Ok(())
        }
        (TypeExpr::Tuple(tys), Value::Tuple(items)) => {
            if tys.len() != items.len() {
                return Err(mismatch(
                    ty,
                    format!("tuple arity {} vs {}", tys.len(), items.len()),
                ));
            }
            for (t, item) in tys.iter().zip(items) {
                check(t, item)?;
            }
            Ok(())
        }
        (TypeExpr::Variant(tys), Value::Variant { tag, value }) => {
            let chosen = tys.get(*tag as usize).ok_or(AuxDataError::VariantTagOutOfRange {
                tag: *tag,
                arity: tys.len(),
            })?;
            check(chosen, value)
        }
        _ => Err(mismatch(ty, format!("value shape {:?} does not fit", discriminant_name(value)))),
    }
}

fn discriminant_name(value: &Value) -> &'static str {
    match value {
        Value::Bool(_) => "bool",
        Value::I8(_) => "int8",
        Value::I16(_) => "int16",
        Value::I32(_) => "int32",
        Value::I64(_) => "int64",
        Value::U8(_) => "uint8",
        Value::U16(_) => "uint16",
        Value::U32(_) => "uint32",
        Value::U64(_) => "uint64",
        Value::F32(_) => "float",
        Value::F64(_) => "double",
        Value::String(_) => "string",
        Value::Uuid(_) => "UUID",
        Value::Addr(_) => "Addr",
        Value::Offset(_) => "Offset",
        Value::Sequence(_) => "sequence",
        Value::Set(_) => "set",
        Value::Mapping(_) => "mapping",
        Value::Tuple(_) => "tuple",
        Value::Variant { .. } => "variant",
    }
}

/// Structural encoding; the shape of the value alone determines the bytes.
/// Used both by [`encode`] and by the canonicalizing container constructors.
pub(crate) fn encode_value(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Bool(b) => out.push(*b as u8),
        Value::I8(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::U8(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::F32(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::F64(v) => out.extend_from_slice(&v.to_le_bytes()),
        Value::String(s) => {
            out.extend_from_slice(&(s.len() as u64).to_le_bytes());
            out.extend_from_slice(s.as_bytes());
        }
        Value::Uuid(u) => out.extend_from_slice(u.as_bytes()),
        Value::Addr(a) => out.extend_from_slice(&a.0.to_le_bytes()),
        Value::Offset(o) => {
            out.extend_from_slice(o.element_id.as_bytes());
            out.extend_from_slice(&o.displacement.to_le_bytes());
        }
        Value::Sequence(items) | Value::Set(items) => {
            out.extend_from_slice(&(items.len() as u64).to_le_bytes());
            for item in items {
                encode_value(item, out);
            }
        }
        Value::Mapping(pairs) => {
            out.extend_from_slice(&(pairs.len() as u64).to_le_bytes());
            for (k, v) in pairs {
                encode_value(k, out);
                encode_value(v, out);
            }
        }
        Value::Tuple(items) => {
            for item in items {
                encode_value(item, out);
            }
        }
        Value::Variant { tag, value } => {
            out.extend_from_slice(&tag.to_le_bytes());
            encode_value(value, out);
        }
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes `bytes` as a value of `ty`, consuming the whole payload.
pub fn decode(ty: &TypeExpr, bytes: &[u8]) -> Result<Value, AuxDataError> {
    let mut reader = Reader { data: bytes, pos: 0 };
    let value = reader.value(ty)?;
    if reader.pos != bytes.len() {
        return Err(AuxDataError::TrailingBytes { len: bytes.len() - reader.pos });
    }
    Ok(value)
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize, context: &'static str) -> Result<&'a [u8], AuxDataError> {
        if n > self.data.len() - self.pos {
            return Err(AuxDataError::PayloadTruncated { context });
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u64(&mut self, context: &'static str) -> Result<u64, AuxDataError> {
        Ok(u64::from_le_bytes(self.take(8, context)?.try_into().expect("len is 8")))
    }

    fn value(&mut self, ty: &TypeExpr) -> Result<Value, AuxDataError> {
        Ok(match ty {
            TypeExpr::Bool => Value::Bool(self.take(1, "bool")?[0] != 0),
            TypeExpr::Int8 => Value::I8(i8::from_le_bytes(self.take(1, "int8")?.try_into().expect("len is 1"))),
            TypeExpr::Int16 => Value::I16(i16::from_le_bytes(self.take(2, "int16")?.try_into().expect("len is 2"))),
            TypeExpr::Int32 => Value::I32(i32::from_le_bytes(self.take(4, "int32")?.try_into().expect("len is 4"))),
            TypeExpr::Int64 => Value::I64(i64::from_le_bytes(self.take(8, "int64")?.try_into().expect("len is 8"))),
            TypeExpr::Uint8 => Value::U8(self.take(1, "uint8")?[0]),
            TypeExpr::Uint16 => Value::U16(u16::from_le_bytes(self.take(2, "uint16")?.try_into().expect("len is 2"))),
            TypeExpr::Uint32 => Value::U32(u32::from_le_bytes(self.take(4, "uint32")?.try_into().expect("len is 4"))),
            TypeExpr::Uint64 => Value::U64(self.u64("uint64")?),
            TypeExpr::Float => Value::F32(f32::from_le_bytes(self.take(4, "float")?.try_into().expect("len is 4"))),
            TypeExpr::Double => Value::F64(f64::from_le_bytes(self.take(8, "double")?.try_into().expect("len is 8"))),
            TypeExpr::String => {
                let len = self.u64("string length")? as usize;
                let bytes = self.take(len, "string bytes")?;
                let text = std::str::from_utf8(bytes).map_err(|_| AuxDataError::TypeMismatch {
                    type_name: "string".to_owned(),
                    detail: "payload is not UTF-8".to_owned(),
                })?;
                Value::String(text.to_owned())
            }
            TypeExpr::Uuid => Value::Uuid(self.uuid()?),
            TypeExpr::Addr => Value::Addr(Addr(self.u64("Addr")?)),
            TypeExpr::Offset => {
                let element_id = self.uuid()?;
                let displacement = self.u64("Offset displacement")?;
                Value::Offset(Offset { element_id, displacement })
            }
            TypeExpr::Sequence(elem) => {
                let count = self.u64("sequence count")?;
                let mut items = Vec::new();
                for _ in 0..count {
                    items.push(self.value(elem)?);
                }
                Value::Sequence(items)
            }
            TypeExpr::Set(elem) => {
                let count = self.u64("set count")?;
                let mut items = Vec::new();
                let mut prev: Option<&[u8]> = None;
                for _ in 0..count {
                    let start = self.pos;
                    items.push(self.value(elem)?);
                    let encoded = &self.data[start..self.pos];
                    if let Some(prev) = prev {
                        if encoded <= prev {
                            return Err(AuxDataError::UnorderedElement { container: "set" });
                        }
                    }
                    prev = Some(encoded);
                }
                Value::Set(items)
            }
            TypeExpr::Mapping(key, val) => {
                let count = self.u64("mapping count")?;
                let mut pairs = Vec::new();
                let mut prev: Option<&[u8]> = None;
                for _ in 0..count {
                    let start = self.pos;
                    let k = self.value(key)?;
                    let encoded = &self.data[start..self.pos];
                    if let Some(prev) = prev {
                        if encoded <= prev {
                            return Err(AuxDataError::UnorderedElement { container: "mapping" });
                        }
                    }
                    prev = Some(encoded);
                    let v = self.value(val)?;
                    pairs.push((k, v));
                }
                Value::Mapping(pairs)
            }
            TypeExpr::Tuple(tys) => {
                let mut items = Vec::with_capacity(tys.len());
                for t in tys {
                    items.push(self.value(t)?);
                }
                Value::Tuple(items)
            }
            TypeExpr::Variant(tys) => {
                let tag = self.u64("variant tag")?;
                let chosen = tys.get(tag as usize).ok_or(AuxDataError::VariantTagOutOfRange {
                    tag,
                    arity: tys.len(),
                })?;
                Value::Variant { tag, value: Box::new(self.value(chosen)?) }
            }
        })
    }

    fn uuid(&mut self) -> Result<Uuid, AuxDataError> {
        let bytes = self.take(16, "UUID")?;
        Ok(Uuid::from_bytes(bytes.try_into().expect("len is 16")))
    }
}
