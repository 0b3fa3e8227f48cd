//! Declarative type model
//!
//! `Dtype` is the closed set of element types the remote service can
//! store. Every variant carries enough information to derive the exact
//! binary layout of one element; `item_size` is the fixed per-element
//! width in the packed buffer (variable-length payloads live in an
//! out-of-line heap and occupy a fixed inline slot).

use serde::{Deserialize, Serialize};

use crate::error::{TypeError, TypeResult};

/// Inline slot width for variable-length data: u32 heap offset + u32 length
pub const VLEN_SLOT_SIZE: usize = 8;

/// Byte order of a numeric type on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Least-significant byte first
    #[default]
    LittleEndian,
    /// Most-significant byte first
    BigEndian,
}

/// Character set of a string type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CharSet {
    /// 7-bit ASCII
    Ascii,
    /// UTF-8
    #[default]
    Utf8,
}

/// Kind of object reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefKind {
    /// Reference to a whole object
    Object,
    /// Reference to a region within a dataset
    Region,
}

/// One named field of a compound type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompoundField {
    /// Field name, unique within the compound
    pub name: String,
    /// Field element type
    pub dtype: Dtype,
    /// Byte offset of the field within one compound element
    pub offset: usize,
}

/// Element type of an array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Dtype {
    /// Fixed-width integer
    Integer {
        /// Width in bytes: 1, 2, 4 or 8
        width: usize,
        /// Signed vs unsigned
        signed: bool,
        /// Wire byte order
        order: ByteOrder,
    },
    /// Fixed-width IEEE float
    Float {
        /// Width in bytes: 2, 4, 8, 12 or 16
        width: usize,
        /// Wire byte order
        order: ByteOrder,
    },
    /// Fixed-length byte string
    FixedString {
        /// Capacity in bytes
        length: usize,
        /// Character set
        charset: CharSet,
    },
    /// Variable-length string, stored out-of-line
    VarString {
        /// Character set
        charset: CharSet,
    },
    /// Boolean, encoded as a two-member u8 enumeration on the wire
    Bool,
    /// Enumeration over an integer base type
    Enum {
        /// Base integer type (must be `Dtype::Integer`)
        base: Box<Dtype>,
        /// Ordered name -> value mapping
        mapping: Vec<(String, i64)>,
    },
    /// Record type with named, offset-addressed fields
    Compound {
        /// Ordered field list
        fields: Vec<CompoundField>,
        /// Total width of one element in bytes
        item_size: usize,
    },
    /// Fixed-shape array of a base type, inline within one element
    ArrayOf {
        /// Base element type
        base: Box<Dtype>,
        /// Array dimensions
        dims: Vec<usize>,
    },
    /// Uninterpreted fixed-length blob
    Opaque {
        /// Length in bytes
        length: usize,
    },
    /// Reference to a remote object or region, stored out-of-line
    Reference {
        /// Reference kind
        kind: RefKind,
    },
}

impl Dtype {
    /// Shorthand for a little-endian signed integer
    pub fn int(width: usize) -> Self {
        Dtype::Integer {
            width,
            signed: true,
            order: ByteOrder::LittleEndian,
        }
    }

    /// Shorthand for a little-endian unsigned integer
    pub fn uint(width: usize) -> Self {
        Dtype::Integer {
            width,
            signed: false,
            order: ByteOrder::LittleEndian,
        }
    }

    /// Shorthand for a little-endian float
    pub fn float(width: usize) -> Self {
        Dtype::Float {
            width,
            order: ByteOrder::LittleEndian,
        }
    }

    /// Fixed per-element width in the packed buffer
    ///
    /// Variable-length variants report the width of their inline slot;
    /// their payload bytes live in the trailing heap.
    pub fn item_size(&self) -> usize {
        match self {
            Dtype::Integer { width, .. } | Dtype::Float { width, .. } => *width,
            Dtype::FixedString { length, .. } | Dtype::Opaque { length } => *length,
            Dtype::VarString { .. } | Dtype::Reference { .. } => VLEN_SLOT_SIZE,
            Dtype::Bool => 1,
            Dtype::Enum { base, .. } => base.item_size(),
            Dtype::Compound { item_size, .. } => *item_size,
            Dtype::ArrayOf { base, dims } => {
                base.item_size() * dims.iter().product::<usize>().max(1)
            }
        }
    }

    /// True when any part of this type stores payload in the heap
    pub fn is_variable(&self) -> bool {
        match self {
            Dtype::VarString { .. } | Dtype::Reference { .. } => true,
            Dtype::Compound { fields, .. } => fields.iter().any(|f| f.dtype.is_variable()),
            Dtype::ArrayOf { base, .. } => base.is_variable(),
            _ => false,
        }
    }

    /// Short class name, used in error messages
    pub fn class_name(&self) -> &'static str {
        match self {
            Dtype::Integer { .. } => "integer",
            Dtype::Float { .. } => "float",
            Dtype::FixedString { .. } | Dtype::VarString { .. } => "string",
            Dtype::Bool => "bool",
            Dtype::Enum { .. } => "enum",
            Dtype::Compound { .. } => "compound",
            Dtype::ArrayOf { .. } => "array",
            Dtype::Opaque { .. } => "opaque",
            Dtype::Reference { .. } => "reference",
        }
    }

    /// Validate the type for use in a packed buffer
    ///
    /// Rejects out-of-range widths, nested compound types, overlapping or
    /// out-of-bounds compound fields, and enums over non-integer bases.
    pub fn validate(&self) -> TypeResult<()> {
        self.validate_inner(false)
    }

    fn validate_inner(&self, inside_compound: bool) -> TypeResult<()> {
        match self {
            Dtype::Integer { width, .. } => {
                if ![1, 2, 4, 8].contains(width) {
                    return Err(TypeError::Unsupported(format!(
                        "integer width {width}"
                    )));
                }
            }
            Dtype::Float { width, .. } => {
                if ![2, 4, 8, 12, 16].contains(width) {
                    return Err(TypeError::Unsupported(format!("float width {width}")));
                }
            }
            Dtype::FixedString { length, .. } | Dtype::Opaque { length } => {
                if *length == 0 {
                    return Err(TypeError::Unsupported(format!(
                        "zero-length {}",
                        self.class_name()
                    )));
                }
            }
            Dtype::Enum { base, mapping } => {
                if !matches!(**base, Dtype::Integer { .. }) {
                    return Err(TypeError::Unsupported(
                        "enum over non-integer base".to_string(),
                    ));
                }
                if mapping.is_empty() {
                    return Err(TypeError::Unsupported("enum with empty mapping".to_string()));
                }
                base.validate_inner(inside_compound)?;
            }
            Dtype::Compound { fields, item_size } => {
                if inside_compound {
                    return Err(TypeError::Unsupported(
                        "nested compound types".to_string(),
                    ));
                }
                if fields.is_empty() {
                    return Err(TypeError::Unsupported(
                        "compound with no fields".to_string(),
                    ));
                }
                // Field ranges must be non-overlapping and fit in item_size.
                let mut ranges: Vec<(usize, usize, &str)> = Vec::with_capacity(fields.len());
                for f in fields {
                    f.dtype.validate_inner(true)?;
                    let end = f.offset + f.dtype.item_size();
                    if end > *item_size {
                        return Err(TypeError::Descriptor(format!(
                            "field '{}' extends to byte {} past item size {}",
                            f.name, end, item_size
                        )));
                    }
                    ranges.push((f.offset, end, &f.name));
                }
                ranges.sort_by_key(|r| r.0);
                for pair in ranges.windows(2) {
                    if pair[1].0 < pair[0].1 {
                        return Err(TypeError::Descriptor(format!(
                            "fields '{}' and '{}' overlap",
                            pair[0].2, pair[1].2
                        )));
                    }
                }
            }
            Dtype::ArrayOf { base, dims } => {
                if dims.is_empty() || dims.contains(&0) {
                    return Err(TypeError::Descriptor(
                        "array type with empty or zero dimension".to_string(),
                    ));
                }
                base.validate_inner(inside_compound)?;
            }
            Dtype::Bool | Dtype::VarString { .. } | Dtype::Reference { .. } => {}
        }
        Ok(())
    }

    /// Restrict a compound type to a subset of its fields, preserving
    /// declaration order and offsets
    pub fn project_fields(&self, names: &[String]) -> TypeResult<Dtype> {
        let Dtype::Compound { fields, item_size } = self else {
            return Err(TypeError::Unsupported(format!(
                "field access on non-compound type {}",
                self.class_name()
            )));
        };
        let mut kept = Vec::with_capacity(names.len());
        for f in fields {
            if names.iter().any(|n| n == &f.name) {
                kept.push(f.clone());
            }
        }
        if kept.len() != names.len() {
            let missing: Vec<&String> = names
                .iter()
                .filter(|n| !fields.iter().any(|f| &f.name == *n))
                .collect();
            return Err(TypeError::ValueMismatch {
                dtype: "compound".to_string(),
                reason: format!("unknown fields {missing:?}"),
            });
        }
        Ok(Dtype::Compound {
            fields: kept,
            item_size: *item_size,
        })
    }
}
