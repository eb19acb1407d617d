// crates/telecast/src/lib.rs
//! Signature-driven marshaling between dynamic host values and typed wire values.

mod decode;
mod encode;
mod types;
mod value;


pub use crate::types::Result;
pub use crate::types::Error;

pub use crate::value::Value;

pub use crate::encode::encode_value;
pub use crate::encode::encode_tuple;

pub use crate::decode::decode_value;
pub use crate::decode::decode_result;
