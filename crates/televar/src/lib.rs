//! # Televar
//!
//! Typed wire values and the signature micro-grammar that describes them.
//!
//! ## Philosophy
//!
//! - **Signatures are strings**: the first character alone decides the kind,
//!   so classification never allocates and never fails.
//! - **Lazy strictness**: introspection data routinely mentions types outside
//!   the supported grammar. Holding such a signature is fine; only marshaling
//!   through it is an error, and that error belongs to the caller's layer.
//! - **Typed emptiness**: arrays carry their declared element signature, so an
//!   empty array is still a correctly typed value on the wire.
//!
//! ## Grammar
//!
//! - `i` — signed 32-bit integer
//! - `u` — unsigned 32-bit integer
//! - `d` — IEEE 754 double
//! - `s` — UTF-8 string
//! - `y` — byte; supported only as an array element (`ay`)
//! - `a` + T — homogeneous array of element type T
//! - `(` T* `)` — tuple; produced for call bodies and multi-value replies,
//!   never accepted as a parameter target


use std::fmt;

/// Televar construction and classification errors.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Signature cannot drive parameter marshaling.
    Unsupported(Signature),
    /// Array item does not match the declared element signature.
    ElementMismatch { expected: Signature, actual: Signature },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Unsupported(sig) => write!(f, "Unsupported signature: {}", sig),
            Error::ElementMismatch { expected, actual } => {
                write!(f, "Array element mismatch: declared {}, found {}", expected, actual)
            }
        }
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for Televar operations.
pub type Result<T> = std::result::Result<T, Error>;

/// A wire type signature, e.g. `i`, `s`, `ai`, `aay`.
///
/// Construction never validates: unknown signatures are legal to hold and
/// compare, and report themselves as unsupported only when asked.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature(String);

impl Signature {
    pub fn new(sig: impl Into<String>) -> Self {
        Signature(sig.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading type character, `None` for the empty signature.
    pub fn head(&self) -> Option<char> {
        self.0.chars().next()
    }

    pub fn is_array(&self) -> bool {
        self.head() == Some('a')
    }

    /// True for `ay`, the byte-sequence fast path.
    pub fn is_bytes(&self) -> bool {
        self.0 == "ay"
    }

    pub fn is_tuple(&self) -> bool {
        self.head() == Some('(')
    }

    /// Element signature of an array: `ai` yields `i`, `aay` yields `ay`.
    pub fn element(&self) -> Option<Signature> {
        if self.is_array() && self.0.len() > 1 {
            Some(Signature(self.0[1..].to_string()))
        } else {
            None
        }
    }

    /// True when the signature can drive parameter marshaling.
    ///
    /// Scalars must stand alone (`i` yes, `ii` no). Arrays are supported when
    /// their element is, with `ay` special-cased because bare `y` is not a
    /// target on its own.
    pub fn supported(&self) -> bool {
        match self.head() {
            Some('i') | Some('u') | Some('d') | Some('s') => self.0.len() == 1,
            Some('a') => self.is_bytes() || self.element().is_some_and(|e| e.supported()),
            _ => false,
        }
    }

    /// Errors with `Unsupported` unless the signature can drive marshaling.
    pub fn check_supported(&self) -> Result<()> {
        if self.supported() {
            Ok(())
        } else {
            Err(Error::Unsupported(self.clone()))
        }
    }

    /// Human-readable rendering of the expected kind, for diagnostics.
    ///
    /// Falls back to the raw signature for anything without an established
    /// English name, so messages stay honest for exotic types.
    pub fn describe(&self) -> String {
        match self.head() {
            Some('i') => "integer".to_string(),
            Some('u') => "unsigned integer".to_string(),
            Some('d') => "double".to_string(),
            Some('s') => "string".to_string(),
            Some('a') => {
                if self.is_bytes() {
                    return "bytes".to_string();
                }
                match self.element().as_ref().and_then(Signature::head) {
                    Some('i') => "list/vector of integers".to_string(),
                    Some('u') => "list/vector of unsigned integers".to_string(),
                    Some('d') => "list/vector of doubles".to_string(),
                    Some('s') => "list/vector of strings".to_string(),
                    _ => self.0.clone(),
                }
            }
            _ => self.0.clone(),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Signature {
    fn from(sig: &str) -> Self {
        Signature::new(sig)
    }
}

impl From<String> for Signature {
    fn from(sig: String) -> Self {
        Signature(sig)
    }
}

/// A typed wire-level value.
///
/// Tuples are the call-body and multi-reply aggregate; they are built and
/// taken apart by the layers above, never targeted by a parameter signature.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Int32(i32),
    UInt32(u32),
    Double(f64),
    Str(String),
    Bytes(Vec<u8>),
    /// Homogeneous array carrying its declared element signature.
    Array { elem: Signature, items: Vec<WireValue> },
    Tuple(Vec<WireValue>),
}

impl WireValue {
    /// Builds an array, checking every item against the declared element
    /// signature. An empty `items` is fine; the array stays typed by `elem`.
    pub fn array(elem: Signature, items: Vec<WireValue>) -> Result<WireValue> {
        for item in &items {
            let actual = item.signature();
            if actual != elem {
                return Err(Error::ElementMismatch { expected: elem, actual });
            }
        }
        Ok(WireValue::Array { elem, items })
    }

    pub fn tuple(items: Vec<WireValue>) -> WireValue {
        WireValue::Tuple(items)
    }

    /// The signature this value answers to.
    pub fn signature(&self) -> Signature {
        match self {
            WireValue::Int32(_) => Signature::from("i"),
            WireValue::UInt32(_) => Signature::from("u"),
            WireValue::Double(_) => Signature::from("d"),
            WireValue::Str(_) => Signature::from("s"),
            WireValue::Bytes(_) => Signature::from("ay"),
            WireValue::Array { elem, .. } => Signature::new(format!("a{}", elem)),
            WireValue::Tuple(items) => {
                let mut sig = String::from("(");
                for item in items {
                    sig.push_str(item.signature().as_str());
                }
                sig.push(')');
                Signature(sig)
            }
        }
    }

    /// Variant name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            WireValue::Int32(_) => "int32",
            WireValue::UInt32(_) => "uint32",
            WireValue::Double(_) => "double",
            WireValue::Str(_) => "string",
            WireValue::Bytes(_) => "bytes",
            WireValue::Array { .. } => "array",
            WireValue::Tuple(_) => "tuple",
        }
    }
}
