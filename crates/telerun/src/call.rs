//! # Call Kernel
//!
//! Every invocation, imported or ad hoc, funnels through `Bridge::call`:
//! validate the handle, look the method up in the catalog, check arity,
//! encode the arguments against their declared signatures, invoke over the
//! transport, and decode the reply into a host value.
//!
//! The checks run strictly before the I/O. A call that fails validation,
//! lookup, arity, or encoding never touches the wire.

use std::fmt;

use telecast::Error as MarshalError;
use telecast::Value;
use telecast::decode_result;
use telecast::encode_tuple;
use televar::Signature;

use crate::bridge::Bridge;
use crate::bridge::ProxyError;
use crate::bridge::ProxyHandle;
use crate::transport;

/// Errors produced by the call path. Every variant past `Proxy` names the
/// method the caller asked for, after dash rewriting.
#[derive(Debug)]
pub enum CallError {
    /// The handle is released, stale, or from another bridge.
    InvalidHandle,
    /// Establishing a helper proxy failed (bus utilities only).
    Proxy(ProxyError),
    /// The catalog lists no such method on the proxy's interface.
    NoSuchMethod { method: String },
    /// Wrong number of arguments. Detected before any marshaling.
    ArityMismatch { method: String, expected: usize, actual: usize },
    /// An argument did not fit its declared signature. `position` is
    /// 1-based (0 names the whole argument list), `expected` is the
    /// signature's human-readable kind.
    ParameterTypeMismatch { method: String, position: usize, arity: usize, expected: String },
    /// The remote side reported a failure, or the transport gave out.
    Remote { method: String, message: String },
    /// The reply arrived but could not be turned into a host value.
    Decode { method: String, detail: String },
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidHandle => write!(f, "Invalid proxy handle"),
            Self::Proxy(source) => write!(f, "{}", source),
            Self::NoSuchMethod { method } => write!(f, "no such method: {}", method),
            Self::ArityMismatch { method, expected, actual } => {
                write!(f, "{} expected {} params, received {}", method, expected, actual)
            }
            Self::ParameterTypeMismatch { method, position, arity, expected } => {
                write!(
                    f,
                    "{}: could not convert parameter {} of {} (expected {})",
                    method, position, arity, expected
                )
            }
            Self::Remote { method, message } => {
                write!(f, "{}: call failed because {}", method, message)
            }
            Self::Decode { method, detail } => {
                write!(f, "{}: could not convert return values ({})", method, detail)
            }
        }
    }
}

impl std::error::Error for CallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Proxy(source) => Some(source),
            _ => None,
        }
    }
}

impl From<ProxyError> for CallError {
    fn from(source: ProxyError) -> Self {
        CallError::Proxy(source)
    }
}

pub type Result<T> = std::result::Result<T, CallError>;

/// Rewrites a host-facing method name to its wire form by replacing every
/// dash with an underscore. Wire names never contain dashes, so the rewrite
/// is unambiguous and safe to apply unconditionally.
pub(crate) fn wire_method_name(name: &str) -> String {
    name.replace('-', "_")
}

/// Folds an aggregate-encoding failure into the call vocabulary.
///
/// The marshaler wraps every per-argument failure in `Element` with the
/// argument's zero-based index, and defends arity on its own even though
/// the kernel checks first.
fn encode_failure(method: &str, arity: usize, sigs: &[Signature], err: MarshalError) -> CallError {
    match err {
        MarshalError::Arity { expected, actual } => CallError::ArityMismatch {
            method: method.to_string(),
            expected,
            actual,
        },
        MarshalError::Element { index, .. } => CallError::ParameterTypeMismatch {
            method: method.to_string(),
            position: index + 1,
            arity,
            expected: sigs.get(index).map(|sig| sig.describe()).unwrap_or_default(),
        },
        other => CallError::ParameterTypeMismatch {
            method: method.to_string(),
            position: 0,
            arity,
            expected: other.to_string(),
        },
    }
}

/// Folds a transport failure into the call vocabulary.
pub(crate) fn call_failure(method: &str, source: transport::Error) -> CallError {
    match source {
        transport::Error::Remote { message } => CallError::Remote {
            method: method.to_string(),
            message,
        },
        transport::Error::BadReply(detail) => CallError::Decode {
            method: method.to_string(),
            detail,
        },
        other => CallError::Remote {
            method: method.to_string(),
            message: other.to_string(),
        },
    }
}

impl Bridge {
    /// Invokes `method` on the proxy behind `handle` with `args`.
    ///
    /// The method name may use dashes in place of underscores. Arguments
    /// are encoded against the catalog's declared input signatures, and the
    /// reply is decoded and shaped: no outputs come back as void, a single
    /// output comes back bare, several come back as a list.
    pub fn call(&self, handle: ProxyHandle, method: &str, args: &[Value]) -> Result<Value> {
        let record = self.live_record(handle).ok_or(CallError::InvalidHandle)?;
        let wire_name = wire_method_name(method);
        let info = record
            .method(&wire_name)
            .ok_or_else(|| CallError::NoSuchMethod { method: wire_name.clone() })?;

        let arity = info.arity();
        if arity != args.len() {
            return Err(CallError::ArityMismatch {
                method: wire_name,
                expected: arity,
                actual: args.len(),
            });
        }
        log::trace!("[call] {} -> {} (arity {})", handle, wire_name, arity);

        let sigs: Vec<Signature> = info.input_signatures().cloned().collect();
        let body = encode_tuple(args, &sigs)
            .map_err(|err| encode_failure(&wire_name, arity, &sigs, err))?;

        let reply = record
            .remote()
            .call(&wire_name, body, self.timeout)
            .map_err(|source| call_failure(&wire_name, source))?;
        Ok(decode_result(reply.as_ref()))
    }
}
