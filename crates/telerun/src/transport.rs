// --- crates/telerun/src/transport.rs ---
//! # Transport Abstraction
//!
//! A minimal, blocking interface for reaching remote objects on a message bus.
//!
//! ## Philosophy
//!
//! - **Seam, not protocol**: the bridge never speaks a bus wire format. A
//!   `Transport` dials objects; a `RemoteObject` answers introspection and
//!   calls. Everything else lives above this line.
//! - **Parsed at the edge**: the transport owns fetching AND parsing the
//!   introspection document. The bridge only ever sees the typed catalog.
//! - **Blocking**: every call blocks until reply or error. No queues, no
//!   callbacks, no background machinery.

use std::fmt;
use std::time::Duration;

use televar::WireValue;

use crate::introspect::NodeInfo;

/// Errors arising at the transport seam.
#[derive(Debug)]
pub enum Error {
    /// The service could not be reached or refused the connection.
    Connect(String),
    /// No object answers at the requested location.
    NoSuchObject(String),
    /// The connection failed mid-operation.
    Io(String),
    /// The call did not complete in time.
    Timeout,
    /// The remote side answered the call with an error.
    Remote { message: String },
    /// A reply arrived but cannot be represented as a wire value.
    BadReply(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connect(msg) => write!(f, "Connection failed: {}", msg),
            Error::NoSuchObject(what) => write!(f, "No such object: {}", what),
            Error::Io(msg) => write!(f, "I/O error: {}", msg),
            Error::Timeout => write!(f, "Operation timed out"),
            Error::Remote { message } => write!(f, "{}", message),
            Error::BadReply(msg) => write!(f, "Bad reply: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// Which bus a real transport dials. In-process transports ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusKind {
    Session,
    System,
}

impl Default for BusKind {
    fn default() -> Self {
        BusKind::Session
    }
}

/// Dials remote objects.
pub trait Transport: Send + Sync + 'static {
    /// Connects to the object at `path` on `service`, speaking `interface`.
    fn connect(
        &self,
        bus: BusKind,
        service: &str,
        path: &str,
        interface: &str,
    ) -> Result<Box<dyn RemoteObject>>;
}

/// One connected remote object.
pub trait RemoteObject: Send + Sync {
    /// Fetches and parses the object's introspection document.
    fn describe(&self) -> Result<NodeInfo>;

    /// Invokes `method` with a tuple of arguments, blocking until the reply
    /// or an error. `Ok(None)` means the reply carried no body.
    fn call(
        &self,
        method: &str,
        args: WireValue,
        timeout: Option<Duration>,
    ) -> Result<Option<WireValue>>;
}
