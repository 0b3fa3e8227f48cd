//! Wire type descriptor
//!
//! The remote service describes element types as a structured JSON
//! document keyed by `class`. `encode_descriptor` and `decode_descriptor`
//! map between that document and the `Dtype` model; decode is a left
//! inverse of encode for every valid `Dtype`.
//!
//! Booleans have no dedicated wire class: they travel as a two-member
//! enumeration over u8 (`FALSE` = 0, `TRUE` = 1) and decode recognizes
//! that shape back into `Dtype::Bool`.

use serde::{Deserialize, Serialize};

use crate::dtype::{ByteOrder, CharSet, CompoundField, Dtype, RefKind};
use crate::error::{TypeError, TypeResult};

/// One field entry of a compound descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    /// Field name
    pub name: String,
    /// Field type
    #[serde(rename = "type")]
    pub dtype: TypeDescriptor,
    /// Byte offset within one element
    pub offset: usize,
}

/// One member of an enum descriptor mapping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMember {
    /// Member name
    pub name: String,
    /// Member integer value
    pub value: i64,
}

/// String length: fixed byte count or the variable-length marker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringLength {
    /// Fixed capacity in bytes
    Fixed(usize),
    /// The literal marker `"variable"`
    Variable(String),
}

/// Structured wire type descriptor
///
/// Only the keys relevant to `class` are populated; the rest serialize
/// away. See the module docs for the boolean convention.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDescriptor {
    /// One of `integer|float|string|enum|compound|array|opaque|reference`
    pub class: String,
    /// Base type, for `array` and `enum`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<Box<TypeDescriptor>>,
    /// Ordered field list, for `compound`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldDescriptor>>,
    /// Total element width, for `compound`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_size: Option<usize>,
    /// String length, for `string`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<StringLength>,
    /// Character set, for `string`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub char_set: Option<String>,
    /// Signedness, for `integer`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signed: Option<bool>,
    /// `"LE"` or `"BE"`, for `integer` and `float`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_order: Option<String>,
    /// Width in bytes, for `integer`, `float` and `opaque`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<usize>,
    /// Array dimensions, for `array`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dims: Option<Vec<usize>>,
    /// Enum mapping, for `enum`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mapping: Option<Vec<EnumMember>>,
    /// `"object"` or `"region"`, for `reference`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

const VARIABLE_MARKER: &str = "variable";

fn order_str(order: ByteOrder) -> &'static str {
    match order {
        ByteOrder::LittleEndian => "LE",
        ByteOrder::BigEndian => "BE",
    }
}

fn parse_order(s: Option<&String>) -> TypeResult<ByteOrder> {
    match s.map(String::as_str) {
        None | Some("LE") => Ok(ByteOrder::LittleEndian),
        Some("BE") => Ok(ByteOrder::BigEndian),
        Some(other) => Err(TypeError::Descriptor(format!("unknown byte order '{other}'"))),
    }
}

fn charset_str(cs: CharSet) -> &'static str {
    match cs {
        CharSet::Ascii => "ascii",
        CharSet::Utf8 => "utf8",
    }
}

fn parse_charset(s: Option<&String>) -> TypeResult<CharSet> {
    match s.map(String::as_str) {
        None | Some("utf8") => Ok(CharSet::Utf8),
        Some("ascii") => Ok(CharSet::Ascii),
        Some(other) => Err(TypeError::Descriptor(format!("unknown charset '{other}'"))),
    }
}

/// Encode a `Dtype` into its wire descriptor
pub fn encode_descriptor(dtype: &Dtype) -> TypeResult<TypeDescriptor> {
    dtype.validate()?;
    Ok(encode_unchecked(dtype))
}

fn encode_unchecked(dtype: &Dtype) -> TypeDescriptor {
    match dtype {
        Dtype::Integer {
            width,
            signed,
            order,
        } => TypeDescriptor {
            class: "integer".to_string(),
            width: Some(*width),
            signed: Some(*signed),
            byte_order: Some(order_str(*order).to_string()),
            ..Default::default()
        },
        Dtype::Float { width, order } => TypeDescriptor {
            class: "float".to_string(),
            width: Some(*width),
            byte_order: Some(order_str(*order).to_string()),
            ..Default::default()
        },
        Dtype::FixedString { length, charset } => TypeDescriptor {
            class: "string".to_string(),
            length: Some(StringLength::Fixed(*length)),
            char_set: Some(charset_str(*charset).to_string()),
            ..Default::default()
        },
        Dtype::VarString { charset } => TypeDescriptor {
            class: "string".to_string(),
            length: Some(StringLength::Variable(VARIABLE_MARKER.to_string())),
            char_set: Some(charset_str(*charset).to_string()),
            ..Default::default()
        },
        Dtype::Bool => TypeDescriptor {
            class: "enum".to_string(),
            base: Some(Box::new(encode_unchecked(&Dtype::uint(1)))),
            mapping: Some(vec![
                EnumMember {
                    name: "FALSE".to_string(),
                    value: 0,
                },
                EnumMember {
                    name: "TRUE".to_string(),
                    value: 1,
                },
            ]),
            ..Default::default()
        },
        Dtype::Enum { base, mapping } => TypeDescriptor {
            class: "enum".to_string(),
            base: Some(Box::new(encode_unchecked(base))),
            mapping: Some(
                mapping
                    .iter()
                    .map(|(name, value)| EnumMember {
                        name: name.clone(),
                        value: *value,
                    })
                    .collect(),
            ),
            ..Default::default()
        },
        Dtype::Compound { fields, item_size } => TypeDescriptor {
            class: "compound".to_string(),
            fields: Some(
                fields
                    .iter()
                    .map(|f| FieldDescriptor {
                        name: f.name.clone(),
                        dtype: encode_unchecked(&f.dtype),
                        offset: f.offset,
                    })
                    .collect(),
            ),
            item_size: Some(*item_size),
            ..Default::default()
        },
        Dtype::ArrayOf { base, dims } => TypeDescriptor {
            class: "array".to_string(),
            base: Some(Box::new(encode_unchecked(base))),
            dims: Some(dims.clone()),
            ..Default::default()
        },
        Dtype::Opaque { length } => TypeDescriptor {
            class: "opaque".to_string(),
            width: Some(*length),
            ..Default::default()
        },
        Dtype::Reference { kind } => TypeDescriptor {
            class: "reference".to_string(),
            kind: Some(
                match kind {
                    RefKind::Object => "object",
                    RefKind::Region => "region",
                }
                .to_string(),
            ),
            ..Default::default()
        },
    }
}

/// Decode a wire descriptor back into a `Dtype`
pub fn decode_descriptor(desc: &TypeDescriptor) -> TypeResult<Dtype> {
    let dtype = decode_inner(desc)?;
    dtype.validate()?;
    Ok(dtype)
}

fn decode_inner(desc: &TypeDescriptor) -> TypeResult<Dtype> {
    match desc.class.as_str() {
        "integer" => Ok(Dtype::Integer {
            width: desc
                .width
                .ok_or_else(|| TypeError::Descriptor("integer without width".to_string()))?,
            signed: desc.signed.unwrap_or(true),
            order: parse_order(desc.byte_order.as_ref())?,
        }),
        "float" => Ok(Dtype::Float {
            width: desc
                .width
                .ok_or_else(|| TypeError::Descriptor("float without width".to_string()))?,
            order: parse_order(desc.byte_order.as_ref())?,
        }),
        "string" => {
            let charset = parse_charset(desc.char_set.as_ref())?;
            match &desc.length {
                Some(StringLength::Fixed(n)) => Ok(Dtype::FixedString {
                    length: *n,
                    charset,
                }),
                Some(StringLength::Variable(marker)) if marker == VARIABLE_MARKER => {
                    Ok(Dtype::VarString { charset })
                }
                Some(StringLength::Variable(other)) => Err(TypeError::Descriptor(format!(
                    "unknown string length marker '{other}'"
                ))),
                None => Err(TypeError::Descriptor("string without length".to_string())),
            }
        }
        "enum" => {
            let base = desc
                .base
                .as_ref()
                .ok_or_else(|| TypeError::Descriptor("enum without base".to_string()))?;
            let members = desc
                .mapping
                .as_ref()
                .ok_or_else(|| TypeError::Descriptor("enum without mapping".to_string()))?;
            if is_bool_mapping(members) {
                return Ok(Dtype::Bool);
            }
            Ok(Dtype::Enum {
                base: Box::new(decode_inner(base)?),
                mapping: members.iter().map(|m| (m.name.clone(), m.value)).collect(),
            })
        }
        "compound" => {
            let fields = desc
                .fields
                .as_ref()
                .ok_or_else(|| TypeError::Descriptor("compound without fields".to_string()))?;
            let decoded: Vec<CompoundField> = fields
                .iter()
                .map(|f| {
                    Ok(CompoundField {
                        name: f.name.clone(),
                        dtype: decode_inner(&f.dtype)?,
                        offset: f.offset,
                    })
                })
                .collect::<TypeResult<_>>()?;
            let item_size = match desc.item_size {
                Some(n) => n,
                // Item size defaults to the end of the last-placed field.
                None => decoded
                    .iter()
                    .map(|f| f.offset + f.dtype.item_size())
                    .max()
                    .unwrap_or(0),
            };
            Ok(Dtype::Compound {
                fields: decoded,
                item_size,
            })
        }
        "array" => {
            let base = desc
                .base
                .as_ref()
                .ok_or_else(|| TypeError::Descriptor("array without base".to_string()))?;
            let dims = desc
                .dims
                .clone()
                .ok_or_else(|| TypeError::Descriptor("array without dims".to_string()))?;
            Ok(Dtype::ArrayOf {
                base: Box::new(decode_inner(base)?),
                dims,
            })
        }
        "opaque" => Ok(Dtype::Opaque {
            length: desc
                .width
                .ok_or_else(|| TypeError::Descriptor("opaque without width".to_string()))?,
        }),
        "reference" => match desc.kind.as_deref() {
            Some("object") | None => Ok(Dtype::Reference {
                kind: RefKind::Object,
            }),
            Some("region") => Ok(Dtype::Reference {
                kind: RefKind::Region,
            }),
            Some(other) => Err(TypeError::Descriptor(format!(
                "unknown reference kind '{other}'"
            ))),
        },
        other => Err(TypeError::Descriptor(format!("unknown class '{other}'"))),
    }
}

fn is_bool_mapping(members: &[EnumMember]) -> bool {
    members.len() == 2
        && members
            .iter()
            .any(|m| m.name == "FALSE" && m.value == 0)
        && members.iter().any(|m| m.name == "TRUE" && m.value == 1)
}
