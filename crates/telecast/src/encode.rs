// crates/telecast/src/encode.rs
use televar::Signature;
use televar::WireValue;

use crate::types::Result;
use crate::types::Error;
use crate::value::Value;

/// Encode a full argument list as the call body tuple.
/// Each argument converts against its own declared signature; an argument
/// that fails surfaces as `Error::Element` carrying its zero-based index.
pub fn encode_tuple(args: &[Value], sigs: &[Signature]) -> Result<WireValue> {
    if args.len() != sigs.len() {
        return Err(Error::Arity { expected: sigs.len(), actual: args.len() });
    }
    let mut items = Vec::with_capacity(args.len());
    for (index, (arg, sig)) in args.iter().zip(sigs).enumerate() {
        let wire = encode_value(arg, sig)
            .map_err(|source| Error::Element { index, source: Box::new(source) })?;
        items.push(wire);
    }
    Ok(WireValue::tuple(items))
}

/// Encode a single host value against an expected signature.
///
/// The signature drives the conversion: the same host value can satisfy
/// several targets (an integer satisfies `i`, `u`, and `d`), and the same
/// target accepts several host shapes. Unknown or unsupported signatures
/// reject every value, rendered through `Signature::describe`.
pub fn encode_value(value: &Value, sig: &Signature) -> Result<WireValue> {
    match sig.head() {
        Some('i') => match value {
            Value::Integer(n) => Ok(WireValue::Int32(*n as i32)),
            // Reals truncate toward zero.
            Value::Float(f) => Ok(WireValue::Int32(*f as i32)),
            _ => Err(mismatch(sig, value)),
        },
        Some('u') => match value {
            Value::Integer(n) => Ok(WireValue::UInt32(*n as u32)),
            _ => Err(mismatch(sig, value)),
        },
        Some('d') => match value {
            Value::Float(f) => Ok(WireValue::Double(*f)),
            Value::Integer(n) => Ok(WireValue::Double(*n as f64)),
            // Lossy on purpose: the wire has no rational type.
            Value::Rational { num, den } => Ok(WireValue::Double(*num as f64 / *den as f64)),
            _ => Err(mismatch(sig, value)),
        },
        Some('s') => match value {
            Value::Str(s) => Ok(WireValue::Str(s.clone())),
            Value::Symbol(name) => Ok(WireValue::Str(name.clone())),
            Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
                Ok(s) => Ok(WireValue::Str(s.to_string())),
                Err(_) => Err(Error::TypeMismatch {
                    expected: sig.describe(),
                    got: "bytes (not valid UTF-8)".to_string(),
                }),
            },
            _ => Err(mismatch(sig, value)),
        },
        Some('a') if sig.is_bytes() => match value {
            Value::Bytes(bytes) => Ok(WireValue::Bytes(bytes.clone())),
            // A list/vector offered against `ay` takes the general array
            // rule, which fails on the bare `y` element target.
            _ => encode_array(value, sig),
        },
        Some('a') => encode_array(value, sig),
        _ => Err(mismatch(sig, value)),
    }
}

fn encode_array(value: &Value, sig: &Signature) -> Result<WireValue> {
    let elem = match sig.element() {
        Some(elem) => elem,
        None => return Err(mismatch(sig, value)),
    };
    let items = match value {
        Value::List(items) | Value::Vector(items) => items,
        _ => return Err(mismatch(sig, value)),
    };
    let mut wired = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let wire = encode_value(item, &elem)
            .map_err(|source| Error::Element { index, source: Box::new(source) })?;
        wired.push(wire);
    }
    Ok(WireValue::array(elem, wired)?)
}

fn mismatch(sig: &Signature, value: &Value) -> Error {
    Error::TypeMismatch {
        expected: sig.describe(),
        got: value.kind().to_string(),
    }
}
