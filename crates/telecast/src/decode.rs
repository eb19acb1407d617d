// crates/telecast/src/decode.rs
use televar::WireValue;

use crate::value::Value;

/// Render a wire value as a host value, driven by the value's own type.
///
/// Decoding is total: every representable wire value has a host rendering.
/// Unsigned integers widen into the host integer, tuples surface as lists,
/// arrays as vectors.
pub fn decode_value(wire: &WireValue) -> Value {
    match wire {
        WireValue::Int32(n) => Value::Integer(i64::from(*n)),
        WireValue::UInt32(n) => Value::Integer(i64::from(*n)),
        WireValue::Double(f) => Value::Float(*f),
        WireValue::Str(s) => Value::Str(s.clone()),
        WireValue::Bytes(bytes) => Value::Bytes(bytes.clone()),
        WireValue::Tuple(items) => Value::List(items.iter().map(decode_value).collect()),
        WireValue::Array { items, .. } => Value::Vector(items.iter().map(decode_value).collect()),
    }
}

/// Shape a call reply for the host.
///
/// An absent body is void. Reply bodies arrive as tuples of the method's
/// output values: a singleton unwraps to the value itself, an empty tuple
/// is void, and two or more outputs surface together as a list.
pub fn decode_result(reply: Option<&WireValue>) -> Value {
    match reply {
        None => Value::Void,
        Some(WireValue::Tuple(items)) => match items.len() {
            0 => Value::Void,
            1 => decode_value(&items[0]),
            _ => Value::List(items.iter().map(decode_value).collect()),
        },
        Some(other) => decode_value(other),
    }
}
