//! Binary payload codec
//!
//! Packed layout is the row-major concatenation of per-element fixed-width
//! records, `item_size` bytes each, followed by a heap region for
//! variable-length payloads. A variable-length member occupies an 8-byte
//! inline slot: u32 offset from the start of the heap, then u32 byte
//! length, both little-endian. Heap payloads are appended in ascending
//! element-index order (and field order within an element).
//!
//! Numeric values honor the byte order declared by the `Dtype`,
//! independent of host byte order. Nothing here is ever truncated
//! silently: fixed-string overflow, array shape disagreement and
//! unrepresentable widths are all hard errors.

use bytes::Bytes;

use crate::dtype::{ByteOrder, CharSet, Dtype};
use crate::error::{TypeError, TypeResult};
use crate::value::Value;

/// Pack host values into the wire layout for `dtype`
pub fn pack_buffer(dtype: &Dtype, values: &[Value]) -> TypeResult<Bytes> {
    dtype.validate()?;
    let item_size = dtype.item_size();
    let mut fixed = vec![0u8; item_size * values.len()];
    let mut heap: Vec<u8> = Vec::new();

    for (i, value) in values.iter().enumerate() {
        let slot = &mut fixed[i * item_size..(i + 1) * item_size];
        pack_element(dtype, value, slot, &mut heap)?;
    }

    fixed.extend_from_slice(&heap);
    Ok(Bytes::from(fixed))
}

/// Unpack `count` elements of `dtype` from a wire buffer
pub fn unpack_buffer(dtype: &Dtype, buf: &[u8], count: usize) -> TypeResult<Vec<Value>> {
    dtype.validate()?;
    let item_size = dtype.item_size();
    let fixed_len = item_size * count;
    if buf.len() < fixed_len {
        return Err(TypeError::Truncated {
            needed: fixed_len,
            available: buf.len(),
        });
    }
    let heap = &buf[fixed_len..];

    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let slot = &buf[i * item_size..(i + 1) * item_size];
        out.push(unpack_element(dtype, slot, heap)?);
    }
    Ok(out)
}

fn mismatch(dtype: &Dtype, value: &Value) -> TypeError {
    TypeError::ValueMismatch {
        dtype: dtype.class_name().to_string(),
        reason: format!("got {} value", value.kind_name()),
    }
}

fn pack_element(dtype: &Dtype, value: &Value, slot: &mut [u8], heap: &mut Vec<u8>) -> TypeResult<()> {
    match dtype {
        Dtype::Integer {
            width,
            signed,
            order,
        } => {
            if *signed {
                let v = value.as_i64().ok_or_else(|| mismatch(dtype, value))?;
                write_int(slot, v as u64, *width, *order, true, v < 0)?;
            } else {
                let v = value.as_u64().ok_or_else(|| mismatch(dtype, value))?;
                write_int(slot, v, *width, *order, false, false)?;
            }
        }
        Dtype::Float { width, order } => {
            let v = value.as_f64().ok_or_else(|| mismatch(dtype, value))?;
            match width {
                2 => write_bytes(slot, &f32_to_f16_bits(v as f32).to_le_bytes(), *order),
                4 => write_bytes(slot, &(v as f32).to_le_bytes(), *order),
                8 => write_bytes(slot, &v.to_le_bytes(), *order),
                _ => {
                    return Err(TypeError::Unsupported(format!(
                        "packing {width}-byte floats"
                    )))
                }
            }
        }
        Dtype::FixedString { length, charset } => {
            let s = match value {
                Value::Str(s) => s.as_bytes(),
                Value::Bytes(b) => b.as_slice(),
                _ => return Err(mismatch(dtype, value)),
            };
            if s.len() > *length {
                return Err(TypeError::StringOverflow {
                    length: s.len(),
                    capacity: *length,
                });
            }
            if *charset == CharSet::Ascii && !s.is_ascii() {
                return Err(TypeError::ValueMismatch {
                    dtype: "string".to_string(),
                    reason: "non-ASCII bytes in ascii string".to_string(),
                });
            }
            slot[..s.len()].copy_from_slice(s);
            // Remainder stays NUL-padded.
        }
        Dtype::VarString { charset } => {
            let Value::Str(s) = value else {
                return Err(mismatch(dtype, value));
            };
            if *charset == CharSet::Ascii && !s.is_ascii() {
                return Err(TypeError::ValueMismatch {
                    dtype: "string".to_string(),
                    reason: "non-ASCII bytes in ascii string".to_string(),
                });
            }
            write_vlen_slot(slot, s.as_bytes(), heap);
        }
        Dtype::Bool => {
            let Value::Bool(b) = value else {
                return Err(mismatch(dtype, value));
            };
            slot[0] = u8::from(*b);
        }
        Dtype::Enum { base, mapping } => {
            let raw = match value {
                Value::Str(name) => mapping
                    .iter()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| TypeError::ValueMismatch {
                        dtype: "enum".to_string(),
                        reason: format!("name '{name}' not in mapping"),
                    })?,
                _ => {
                    let v = value.as_i64().ok_or_else(|| mismatch(dtype, value))?;
                    if !mapping.iter().any(|(_, mv)| *mv == v) {
                        return Err(TypeError::ValueMismatch {
                            dtype: "enum".to_string(),
                            reason: format!("value {v} not in mapping"),
                        });
                    }
                    v
                }
            };
            pack_element(base, &Value::Int(raw), slot, heap)?;
        }
        Dtype::Compound { fields, .. } => {
            let Value::Compound(entries) = value else {
                return Err(mismatch(dtype, value));
            };
            if entries.len() != fields.len() {
                return Err(TypeError::ValueMismatch {
                    dtype: "compound".to_string(),
                    reason: format!(
                        "{} entries for {} fields",
                        entries.len(),
                        fields.len()
                    ),
                });
            }
            for (field, entry) in fields.iter().zip(entries) {
                let end = field.offset + field.dtype.item_size();
                pack_element(&field.dtype, entry, &mut slot[field.offset..end], heap)?;
            }
        }
        Dtype::ArrayOf { base, dims } => {
            let Value::Array(items) = value else {
                return Err(mismatch(dtype, value));
            };
            let expected: usize = dims.iter().product();
            if items.len() != expected {
                return Err(TypeError::Unsupported(format!(
                    "array value of {} elements for declared dims {:?}",
                    items.len(),
                    dims
                )));
            }
            let base_size = base.item_size();
            for (j, item) in items.iter().enumerate() {
                pack_element(base, item, &mut slot[j * base_size..(j + 1) * base_size], heap)?;
            }
        }
        Dtype::Opaque { length } => {
            let Value::Bytes(b) = value else {
                return Err(mismatch(dtype, value));
            };
            if b.len() != *length {
                return Err(TypeError::ValueMismatch {
                    dtype: "opaque".to_string(),
                    reason: format!("{} bytes for declared length {length}", b.len()),
                });
            }
            slot.copy_from_slice(b);
        }
        Dtype::Reference { .. } => {
            let Value::Ref(token) = value else {
                return Err(mismatch(dtype, value));
            };
            write_vlen_slot(slot, token.as_bytes(), heap);
        }
    }
    Ok(())
}

fn unpack_element(dtype: &Dtype, slot: &[u8], heap: &[u8]) -> TypeResult<Value> {
    Ok(match dtype {
        Dtype::Integer {
            width,
            signed,
            order,
        } => {
            let raw = read_int(slot, *width, *order);
            if *signed {
                Value::Int(sign_extend(raw, *width))
            } else {
                Value::Uint(raw)
            }
        }
        Dtype::Float { width, order } => match width {
            2 => {
                let b = ordered_le(slot, 2, *order)?;
                Value::Float(f64::from(f16_bits_to_f32(u16::from_le_bytes([b[0], b[1]]))))
            }
            4 => {
                let b = ordered_le(slot, 4, *order)?;
                Value::Float(f64::from(f32::from_le_bytes([b[0], b[1], b[2], b[3]])))
            }
            8 => {
                let b = ordered_le(slot, 8, *order)?;
                let mut arr = [0u8; 8];
                arr.copy_from_slice(&b);
                Value::Float(f64::from_le_bytes(arr))
            }
            _ => {
                return Err(TypeError::Unsupported(format!(
                    "unpacking {width}-byte floats"
                )))
            }
        },
        Dtype::FixedString { charset, .. } => {
            let end = slot.iter().position(|&b| b == 0).unwrap_or(slot.len());
            decode_str(&slot[..end], *charset)?
        }
        Dtype::VarString { charset } => {
            let payload = read_vlen_slot(slot, heap)?;
            decode_str(payload, *charset)?
        }
        Dtype::Bool => Value::Bool(slot[0] != 0),
        Dtype::Enum { base, .. } => {
            let inner = unpack_element(base, slot, heap)?;
            // Report enum values as signed integers regardless of base sign.
            Value::Int(inner.as_i64().unwrap_or(0))
        }
        Dtype::Compound { fields, .. } => {
            let mut entries = Vec::with_capacity(fields.len());
            for field in fields {
                let end = field.offset + field.dtype.item_size();
                entries.push(unpack_element(&field.dtype, &slot[field.offset..end], heap)?);
            }
            Value::Compound(entries)
        }
        Dtype::ArrayOf { base, dims } => {
            let n: usize = dims.iter().product();
            let base_size = base.item_size();
            let mut items = Vec::with_capacity(n);
            for j in 0..n {
                items.push(unpack_element(base, &slot[j * base_size..(j + 1) * base_size], heap)?);
            }
            Value::Array(items)
        }
        Dtype::Opaque { .. } => Value::Bytes(slot.to_vec()),
        Dtype::Reference { .. } => {
            let payload = read_vlen_slot(slot, heap)?;
            let token = std::str::from_utf8(payload).map_err(|_| TypeError::ValueMismatch {
                dtype: "reference".to_string(),
                reason: "non-UTF-8 reference token".to_string(),
            })?;
            Value::Ref(token.to_string())
        }
    })
}

fn decode_str(bytes: &[u8], charset: CharSet) -> TypeResult<Value> {
    if charset == CharSet::Ascii && !bytes.is_ascii() {
        return Err(TypeError::ValueMismatch {
            dtype: "string".to_string(),
            reason: "non-ASCII bytes in ascii string".to_string(),
        });
    }
    let s = std::str::from_utf8(bytes).map_err(|_| TypeError::ValueMismatch {
        dtype: "string".to_string(),
        reason: "invalid UTF-8".to_string(),
    })?;
    Ok(Value::Str(s.to_string()))
}

fn write_vlen_slot(slot: &mut [u8], payload: &[u8], heap: &mut Vec<u8>) {
    let offset = heap.len() as u32;
    heap.extend_from_slice(payload);
    slot[..4].copy_from_slice(&offset.to_le_bytes());
    slot[4..8].copy_from_slice(&(payload.len() as u32).to_le_bytes());
}

fn read_vlen_slot<'a>(slot: &[u8], heap: &'a [u8]) -> TypeResult<&'a [u8]> {
    let offset = u32::from_le_bytes([slot[0], slot[1], slot[2], slot[3]]) as usize;
    let len = u32::from_le_bytes([slot[4], slot[5], slot[6], slot[7]]) as usize;
    let end = offset.checked_add(len).ok_or(TypeError::Truncated {
        needed: usize::MAX,
        available: heap.len(),
    })?;
    if end > heap.len() {
        return Err(TypeError::Truncated {
            needed: end,
            available: heap.len(),
        });
    }
    Ok(&heap[offset..end])
}

fn write_int(
    slot: &mut [u8],
    raw: u64,
    width: usize,
    order: ByteOrder,
    signed: bool,
    negative: bool,
) -> TypeResult<()> {
    // Range check before truncating to width bytes.
    if width < 8 {
        let bits = width as u32 * 8;
        let fits = if signed {
            let v = raw as i64;
            let min = -(1i64 << (bits - 1));
            let max = (1i64 << (bits - 1)) - 1;
            v >= min && v <= max
        } else {
            raw >> bits == 0
        };
        if !fits {
            return Err(TypeError::ValueMismatch {
                dtype: "integer".to_string(),
                reason: format!("value out of range for {width}-byte integer"),
            });
        }
    } else if !signed && negative {
        return Err(TypeError::ValueMismatch {
            dtype: "integer".to_string(),
            reason: "negative value for unsigned integer".to_string(),
        });
    }

    let le = raw.to_le_bytes();
    match order {
        ByteOrder::LittleEndian => slot[..width].copy_from_slice(&le[..width]),
        ByteOrder::BigEndian => {
            for (i, b) in le[..width].iter().enumerate() {
                slot[width - 1 - i] = *b;
            }
        }
    }
    Ok(())
}

fn read_int(slot: &[u8], width: usize, order: ByteOrder) -> u64 {
    let mut le = [0u8; 8];
    match order {
        ByteOrder::LittleEndian => le[..width].copy_from_slice(&slot[..width]),
        ByteOrder::BigEndian => {
            for i in 0..width {
                le[i] = slot[width - 1 - i];
            }
        }
    }
    u64::from_le_bytes(le)
}

fn sign_extend(raw: u64, width: usize) -> i64 {
    if width >= 8 {
        return raw as i64;
    }
    let shift = 64 - width as u32 * 8;
    ((raw << shift) as i64) >> shift
}

fn write_bytes(slot: &mut [u8], le: &[u8], order: ByteOrder) {
    match order {
        ByteOrder::LittleEndian => slot[..le.len()].copy_from_slice(le),
        ByteOrder::BigEndian => {
            for (i, b) in le.iter().enumerate() {
                slot[le.len() - 1 - i] = *b;
            }
        }
    }
}

fn ordered_le(slot: &[u8], width: usize, order: ByteOrder) -> TypeResult<Vec<u8>> {
    if slot.len() < width {
        return Err(TypeError::Truncated {
            needed: width,
            available: slot.len(),
        });
    }
    Ok(match order {
        ByteOrder::LittleEndian => slot[..width].to_vec(),
        ByteOrder::BigEndian => slot[..width].iter().rev().copied().collect(),
    })
}

/// Convert an f32 to IEEE 754 half-precision bits (round toward zero)
fn f32_to_f16_bits(v: f32) -> u16 {
    let bits = v.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32;
    let frac = bits & 0x007f_ffff;

    if exp == 255 {
        // Inf / NaN
        let nan_bit: u16 = if frac != 0 { 0x0200 } else { 0 };
        return sign | 0x7c00 | nan_bit;
    }
    let e = exp - 127 + 15;
    if e >= 31 {
        return sign | 0x7c00; // overflow to inf
    }
    if e <= 0 {
        if e < -10 {
            return sign; // underflow to zero
        }
        let f = (frac | 0x0080_0000) >> (14 - e);
        return sign | f as u16;
    }
    sign | ((e as u16) << 10) | ((frac >> 13) as u16)
}

/// Convert IEEE 754 half-precision bits to an f32
fn f16_bits_to_f32(h: u16) -> f32 {
    let sign = u32::from(h >> 15) << 31;
    let exp = u32::from(h >> 10) & 0x1f;
    let frac = u32::from(h) & 0x3ff;

    let bits = if exp == 0 {
        if frac == 0 {
            sign
        } else {
            // Subnormal: renormalize into f32 range.
            let mut e: i32 = 113;
            let mut f = frac << 13;
            while f & 0x0080_0000 == 0 {
                f <<= 1;
                e -= 1;
            }
            sign | ((e as u32) << 23) | (f & 0x007f_ffff)
        }
    } else if exp == 0x1f {
        sign | (0xff << 23) | (frac << 13)
    } else {
        sign | ((exp + 112) << 23) | (frac << 13)
    };
    f32::from_bits(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::{CompoundField, RefKind};

    fn compound_ab() -> Dtype {
        Dtype::Compound {
            fields: vec![
                CompoundField {
                    name: "a".to_string(),
                    dtype: Dtype::int(4),
                    offset: 0,
                },
                CompoundField {
                    name: "b".to_string(),
                    dtype: Dtype::FixedString {
                        length: 6,
                        charset: CharSet::Ascii,
                    },
                    offset: 4,
                },
            ],
            item_size: 10,
        }
    }

    #[test]
    fn test_int_endianness() {
        let le = pack_buffer(&Dtype::int(4), &[Value::Int(0x01020304)]).unwrap();
        assert_eq!(&le[..], &[0x04, 0x03, 0x02, 0x01]);

        let be = Dtype::Integer {
            width: 4,
            signed: true,
            order: ByteOrder::BigEndian,
        };
        let packed = pack_buffer(&be, &[Value::Int(0x01020304)]).unwrap();
        assert_eq!(&packed[..], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(
            unpack_buffer(&be, &packed, 1).unwrap(),
            vec![Value::Int(0x01020304)]
        );
    }

    #[test]
    fn test_signed_roundtrip() {
        for v in [-1i64, -128, 127, 0] {
            let packed = pack_buffer(&Dtype::int(1), &[Value::Int(v)]).unwrap();
            assert_eq!(unpack_buffer(&Dtype::int(1), &packed, 1).unwrap(), vec![Value::Int(v)]);
        }
        // Out of range is an error, not a wrap.
        assert!(pack_buffer(&Dtype::int(1), &[Value::Int(128)]).is_err());
        assert!(pack_buffer(&Dtype::uint(2), &[Value::Int(-1)]).is_err());
    }

    #[test]
    fn test_float_roundtrip() {
        for v in [0.0f64, 1.5, -2.25, 1e300] {
            let packed = pack_buffer(&Dtype::float(8), &[Value::Float(v)]).unwrap();
            assert_eq!(
                unpack_buffer(&Dtype::float(8), &packed, 1).unwrap(),
                vec![Value::Float(v)]
            );
        }
        let packed = pack_buffer(&Dtype::float(2), &[Value::Float(1.5)]).unwrap();
        assert_eq!(packed.len(), 2);
        assert_eq!(
            unpack_buffer(&Dtype::float(2), &packed, 1).unwrap(),
            vec![Value::Float(1.5)]
        );
    }

    #[test]
    fn test_quad_float_unsupported() {
        let dt = Dtype::Float {
            width: 16,
            order: ByteOrder::LittleEndian,
        };
        assert!(matches!(
            pack_buffer(&dt, &[Value::Float(1.0)]),
            Err(TypeError::Unsupported(_))
        ));
    }

    #[test]
    fn test_compound_idempotence() {
        let dt = compound_ab();
        let values = vec![
            Value::Compound(vec![Value::Int(42), Value::Str("hello".to_string())]),
            Value::Compound(vec![Value::Int(-7), Value::Str("ab".to_string())]),
        ];
        let packed = pack_buffer(&dt, &values).unwrap();
        assert_eq!(packed.len(), 20);
        assert_eq!(unpack_buffer(&dt, &packed, 2).unwrap(), values);
    }

    #[test]
    fn test_compound_layout_exact() {
        let dt = compound_ab();
        let packed = pack_buffer(
            &dt,
            &[Value::Compound(vec![
                Value::Int(1),
                Value::Str("xy".to_string()),
            ])],
        )
        .unwrap();
        assert_eq!(&packed[0..4], &[1, 0, 0, 0]);
        assert_eq!(&packed[4..10], b"xy\0\0\0\0");
    }

    #[test]
    fn test_fixed_string_overflow() {
        let dt = Dtype::FixedString {
            length: 4,
            charset: CharSet::Utf8,
        };
        let err = pack_buffer(&dt, &[Value::Str("too long".to_string())]).unwrap_err();
        assert!(matches!(err, TypeError::StringOverflow { length: 8, capacity: 4 }));
    }

    #[test]
    fn test_vlen_heap_layout() {
        let dt = Dtype::VarString {
            charset: CharSet::Utf8,
        };
        let values = vec![
            Value::Str("abc".to_string()),
            Value::Str("".to_string()),
            Value::Str("defgh".to_string()),
        ];
        let packed = pack_buffer(&dt, &values).unwrap();
        // 3 inline slots of 8 bytes, then "abc" + "defgh" in element order.
        assert_eq!(packed.len(), 24 + 8);
        assert_eq!(&packed[24..27], b"abc");
        assert_eq!(&packed[27..32], b"defgh");
        assert_eq!(unpack_buffer(&dt, &packed, 3).unwrap(), values);
    }

    #[test]
    fn test_vlen_inside_compound() {
        let dt = Dtype::Compound {
            fields: vec![
                CompoundField {
                    name: "id".to_string(),
                    dtype: Dtype::uint(4),
                    offset: 0,
                },
                CompoundField {
                    name: "name".to_string(),
                    dtype: Dtype::VarString {
                        charset: CharSet::Utf8,
                    },
                    offset: 4,
                },
            ],
            item_size: 12,
        };
        let values = vec![
            Value::Compound(vec![Value::Uint(1), Value::Str("alpha".to_string())]),
            Value::Compound(vec![Value::Uint(2), Value::Str("beta".to_string())]),
        ];
        let packed = pack_buffer(&dt, &values).unwrap();
        assert_eq!(unpack_buffer(&dt, &packed, 2).unwrap(), values);
    }

    #[test]
    fn test_enum_and_bool() {
        let dt = Dtype::Enum {
            base: Box::new(Dtype::int(2)),
            mapping: vec![("RED".to_string(), 1), ("BLUE".to_string(), 5)],
        };
        let packed = pack_buffer(&dt, &[Value::Str("BLUE".to_string()), Value::Int(1)]).unwrap();
        assert_eq!(
            unpack_buffer(&dt, &packed, 2).unwrap(),
            vec![Value::Int(5), Value::Int(1)]
        );
        assert!(pack_buffer(&dt, &[Value::Int(9)]).is_err());

        let packed = pack_buffer(&Dtype::Bool, &[Value::Bool(true), Value::Bool(false)]).unwrap();
        assert_eq!(&packed[..], &[1, 0]);
        assert_eq!(
            unpack_buffer(&Dtype::Bool, &packed, 2).unwrap(),
            vec![Value::Bool(true), Value::Bool(false)]
        );
    }

    #[test]
    fn test_array_of_shape_mismatch() {
        let dt = Dtype::ArrayOf {
            base: Box::new(Dtype::int(2)),
            dims: vec![2, 2],
        };
        let ok = Value::Array(vec![
            Value::Int(1),
            Value::Int(2),
            Value::Int(3),
            Value::Int(4),
        ]);
        let packed = pack_buffer(&dt, &[ok.clone()]).unwrap();
        assert_eq!(packed.len(), 8);
        assert_eq!(unpack_buffer(&dt, &packed, 1).unwrap(), vec![ok]);

        let bad = Value::Array(vec![Value::Int(1), Value::Int(2)]);
        assert!(matches!(
            pack_buffer(&dt, &[bad]),
            Err(TypeError::Unsupported(_))
        ));
    }

    #[test]
    fn test_opaque_and_reference() {
        let dt = Dtype::Opaque { length: 3 };
        let packed = pack_buffer(&dt, &[Value::Bytes(vec![9, 8, 7])]).unwrap();
        assert_eq!(
            unpack_buffer(&dt, &packed, 1).unwrap(),
            vec![Value::Bytes(vec![9, 8, 7])]
        );
        assert!(pack_buffer(&dt, &[Value::Bytes(vec![1])]).is_err());

        let dt = Dtype::Reference {
            kind: RefKind::Object,
        };
        let values = vec![Value::Ref("groups/g-123".to_string())];
        let packed = pack_buffer(&dt, &values).unwrap();
        assert_eq!(unpack_buffer(&dt, &packed, 1).unwrap(), values);
    }

    #[test]
    fn test_truncated_buffer() {
        let err = unpack_buffer(&Dtype::int(4), &[0u8; 6], 2).unwrap_err();
        assert!(matches!(
            err,
            TypeError::Truncated {
                needed: 8,
                available: 6
            }
        ));
    }

    #[test]
    fn test_f16_conversions() {
        for v in [0.0f32, 1.0, -1.0, 0.5, 65504.0, -0.25] {
            let bits = f32_to_f16_bits(v);
            assert_eq!(f16_bits_to_f32(bits), v, "f16 round trip of {v}");
        }
        assert!(f16_bits_to_f32(f32_to_f16_bits(f32::NAN)).is_nan());
        assert_eq!(f16_bits_to_f32(f32_to_f16_bits(1e9)), f32::INFINITY);
    }
}
