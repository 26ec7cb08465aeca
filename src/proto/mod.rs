//! Hand-rolled Protocol Buffers wire primitives.
//!
//! Supports the subset of proto3 wire semantics the envelope payload uses:
//! - Wire type 0 (varint): integers and enum tags as LEB-128
//! - Wire type 2 (length-delimited): strings, bytes, embedded messages
//!
//! Tag layout: `(field_number << 3) | wire_type`. Signed values travel
//! zigzag-encoded (`sint64` semantics) so small negatives stay small.

use crate::error::DecodeError;

pub const WIRE_VARINT: u8 = 0;
pub const WIRE_LEN: u8 = 2;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Encode a 64-bit unsigned integer as a LEB-128 varint.
pub fn encode_varint(mut v: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(10);
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            out.push(byte);
            break;
        } else {
            out.push(byte | 0x80);
        }
    }
    out
}

/// Zigzag-map a signed value into the unsigned varint space.
pub fn zigzag(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

/// Inverse of [`zigzag`].
pub fn unzigzag(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Encode a proto field tag: (field_number << 3) | wire_type.
fn encode_tag(field: u32, wire_type: u8) -> Vec<u8> {
    encode_varint(((field as u64) << 3) | (wire_type as u64))
}

/// Encode a varint field (wire type 0).
pub fn encode_varint_field(field: u32, v: u64) -> Vec<u8> {
    let mut out = encode_tag(field, WIRE_VARINT);
    out.extend(encode_varint(v));
    out
}

/// Encode a zigzag-signed varint field (wire type 0).
pub fn encode_sint_field(field: u32, v: i64) -> Vec<u8> {
    encode_varint_field(field, zigzag(v))
}

/// Encode a bool field as a 0/1 varint.
pub fn encode_bool_field(field: u32, v: bool) -> Vec<u8> {
    encode_varint_field(field, v as u64)
}

/// Encode a length-delimited field (wire type 2) with raw bytes.
pub fn encode_len_field(field: u32, data: &[u8]) -> Vec<u8> {
    let mut out = encode_tag(field, WIRE_LEN);
    out.extend(encode_varint(data.len() as u64));
    out.extend_from_slice(data);
    out
}

/// Encode a string field (wire type 2, UTF-8).
pub fn encode_string_field(field: u32, s: &str) -> Vec<u8> {
    encode_len_field(field, s.as_bytes())
}

/// Encode an embedded message field (wire type 2).
pub fn encode_message_field(field: u32, msg: &[u8]) -> Vec<u8> {
    encode_len_field(field, msg)
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Cursor over an encoded message, yielding one field at a time.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn byte(&mut self) -> Result<u8, DecodeError> {
        if self.pos >= self.data.len() {
            return Err(DecodeError::Truncated { context: "varint" });
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    /// Decode one LEB-128 varint.
    pub fn varint(&mut self) -> Result<u64, DecodeError> {
        let mut value: u64 = 0;
        for shift in (0..64).step_by(7) {
            let byte = self.byte()?;
            value |= ((byte & 0x7f) as u64) << shift;
            if byte & 0x80 == 0 {
                // The tenth byte may only contribute one bit.
                if shift == 63 && byte > 1 {
                    return Err(DecodeError::VarintOverflow);
                }
                return Ok(value);
            }
        }
        Err(DecodeError::VarintOverflow)
    }

    /// Decode the next field tag as `(field_number, wire_type)`. `None` at
    /// end of input.
    pub fn tag(&mut self) -> Result<Option<(u32, u8)>, DecodeError> {
        if self.is_empty() {
            return Ok(None);
        }
        let tag = self.varint()?;
        let field = (tag >> 3) as u32;
        let wire_type = (tag & 0x7) as u8;
        if wire_type != WIRE_VARINT && wire_type != WIRE_LEN {
            return Err(DecodeError::BadWireType { field, wire_type });
        }
        Ok(Some((field, wire_type)))
    }

    /// Decode the payload of a length-delimited field.
    pub fn bytes(&mut self, field: u32) -> Result<&'a [u8], DecodeError> {
        let len = self.varint()? as usize;
        if len > self.data.len() - self.pos {
            return Err(DecodeError::BadLength {
                field,
                expected: len,
                found: self.data.len() - self.pos,
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Decode a length-delimited field as UTF-8 text.
    pub fn string(&mut self, field: u32) -> Result<String, DecodeError> {
        let bytes = self.bytes(field)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::BadUtf8 { field })
    }

    /// Decode a length-delimited field holding exactly 16 UUID bytes.
    pub fn uuid(&mut self, field: u32) -> Result<uuid::Uuid, DecodeError> {
        let bytes = self.bytes(field)?;
        let raw: [u8; 16] = bytes.try_into().map_err(|_| DecodeError::BadLength {
            field,
            expected: 16,
            found: bytes.len(),
        })?;
        Ok(uuid::Uuid::from_bytes(raw))
    }

    /// Skip a field of the given wire type.
    pub fn skip(&mut self, field: u32, wire_type: u8) -> Result<(), DecodeError> {
        match wire_type {
            WIRE_VARINT => {
                self.varint()?;
                Ok(())
            }
            WIRE_LEN => {
                self.bytes(field)?;
                Ok(())
            }
            other => Err(DecodeError::BadWireType { field, wire_type: other }),
        }
    }
}
