//! cirrus-types: type model and binary codec
//!
//! Maps between a declarative type descriptor and the binary buffer layout
//! used by the remote array service:
//! - `Dtype`: closed variant model (integers, floats, strings, enums,
//!   compounds, nested arrays, opaque blobs, references)
//! - `TypeDescriptor`: the structured wire document sent with requests
//! - `pack_buffer` / `unpack_buffer`: byte-exact payload codec
//!
//! Everything here is pure computation; no I/O, no logging.

#![warn(missing_docs)]

pub mod codec;
pub mod descriptor;
pub mod dtype;
pub mod error;
pub mod value;

pub use codec::{pack_buffer, unpack_buffer};
pub use descriptor::{decode_descriptor, encode_descriptor, FieldDescriptor, TypeDescriptor};
pub use dtype::{ByteOrder, CharSet, CompoundField, Dtype, RefKind};
pub use error::{TypeError, TypeResult};
pub use value::Value;
