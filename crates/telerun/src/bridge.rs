//! # Proxy Registry
//!
//! The bridge owns every live proxy: a slot-addressed registry of connected
//! remote objects and their catalogs, keyed by handles the host can copy,
//! store, and hand back later.
//!
//! ## Invariants
//!
//! - The process stamp is nonzero, random, and chosen exactly once.
//! - Slots are unique across every bridge in the process, so a handle can
//!   never validate against a different bridge's record.
//! - A handle is live iff its stamp matches the record in its slot.
//! - Release is idempotent: released, stale, and foreign handles are no-ops.

use std::fmt;
use std::sync::Arc;
use std::sync::OnceLock;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use dashmap::DashMap;
use telecast::Value;
use telecast::decode_result;
use televar::WireValue;

use crate::call::CallError;
use crate::call::call_failure;
use crate::call::wire_method_name;
use crate::introspect::InterfaceInfo;
use crate::introspect::MethodInfo;
use crate::introspect::NodeInfo;
use crate::transport;
use crate::transport::BusKind;
use crate::transport::RemoteObject;
use crate::transport::Transport;

/// Well-known coordinates of the bus management service.
pub const BUS_SERVICE: &str = "org.freedesktop.DBus";
pub const BUS_PATH: &str = "/";
pub const BUS_INTERFACE: &str = "org.freedesktop.DBus";

const LIST_NAMES: &str = "ListNames";

static STAMP: OnceLock<u64> = OnceLock::new();
static NEXT_SLOT: AtomicU64 = AtomicU64::new(1);

/// Process-wide identity stamp: nonzero, random, chosen once, lazily.
///
/// Zero is reserved so a zeroed forgery can never validate.
fn process_stamp() -> u64 {
    *STAMP.get_or_init(|| {
        let mut stamp: u64 = rand::random();
        while stamp == 0 {
            stamp = rand::random();
        }
        stamp
    })
}

fn next_slot() -> u64 {
    NEXT_SLOT.fetch_add(1, Ordering::Relaxed)
}

/// Errors establishing a proxy.
#[derive(Debug)]
pub enum ProxyError {
    /// The transport could not produce a remote object.
    Connect { service: String, source: transport::Error },
    /// The introspection document could not be fetched or parsed.
    Introspect { service: String, source: transport::Error },
    /// The document does not list the requested interface.
    InterfaceNotFound { service: String, interface: String },
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connect { service, source } => {
                write!(f, "Could not create proxy for {} because {}", service, source)
            }
            Self::Introspect { service, source } => {
                write!(f, "Could not introspect {} because {}", service, source)
            }
            Self::InterfaceNotFound { service, interface } => {
                write!(f, "Interface {} not found on {}", interface, service)
            }
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Connect { source, .. } => Some(source),
            Self::Introspect { source, .. } => Some(source),
            Self::InterfaceNotFound { .. } => None,
        }
    }
}

/// A checkable reference to a live proxy.
///
/// Handles are plain data: copying one copies two integers, and an old
/// handle can always be asked about safely.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct ProxyHandle {
    slot: u64,
    stamp: u64,
}

impl ProxyHandle {
    pub fn slot(&self) -> u64 {
        self.slot
    }
}

impl fmt::Display for ProxyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "proxy-{}", self.slot)
    }
}

/// Live state for one connected proxy.
///
/// Field order is load-bearing: `remote` drops before `catalog`, so the
/// transport connection is released before the introspection data.
pub(crate) struct ProxyRecord {
    stamp: u64,
    remote: Box<dyn RemoteObject>,
    catalog: NodeInfo,
    interface: String,
    service: String,
    path: String,
}

impl ProxyRecord {
    pub(crate) fn interface_info(&self) -> Option<&InterfaceInfo> {
        self.catalog.interface(&self.interface)
    }

    pub(crate) fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.interface_info().and_then(|interface| interface.method(name))
    }

    pub(crate) fn remote(&self) -> &dyn RemoteObject {
        self.remote.as_ref()
    }
}

/// The proxy registry and the owner of the transport.
pub struct Bridge {
    transport: Box<dyn Transport>,
    proxies: DashMap<u64, Arc<ProxyRecord>>,
    bus: BusKind,
    pub(crate) timeout: Option<Duration>,
}

impl Bridge {
    /// Session bus, transport-default timeout.
    pub fn new(transport: impl Transport) -> Self {
        Bridge::builder(transport).build()
    }

    pub fn builder(transport: impl Transport) -> BridgeBuilder {
        BridgeBuilder::new(transport)
    }

    /// Dials `service` at `path`, introspects it, and verifies that it
    /// implements `interface`. On success the proxy is stamped, registered,
    /// and addressable through the returned handle.
    pub fn connect(&self, service: &str, path: &str, interface: &str) -> Result<ProxyHandle, ProxyError> {
        let remote = self
            .transport
            .connect(self.bus, service, path, interface)
            .map_err(|source| ProxyError::Connect { service: service.to_string(), source })?;
        let catalog = remote
            .describe()
            .map_err(|source| ProxyError::Introspect { service: service.to_string(), source })?;
        if catalog.interface(interface).is_none() {
            return Err(ProxyError::InterfaceNotFound {
                service: service.to_string(),
                interface: interface.to_string(),
            });
        }

        let stamp = process_stamp();
        let slot = next_slot();
        let record = ProxyRecord {
            stamp,
            remote,
            catalog,
            interface: interface.to_string(),
            service: service.to_string(),
            path: path.to_string(),
        };
        self.proxies.insert(slot, Arc::new(record));
        log::debug!("[bridge] proxy-{} connected to {} at {} ({})", slot, service, path, interface);
        Ok(ProxyHandle { slot, stamp })
    }

    /// True iff the handle refers to a live proxy of this bridge.
    /// Never panics: stale and foreign handles simply answer false.
    pub fn validate(&self, handle: ProxyHandle) -> bool {
        self.proxies
            .get(&handle.slot)
            .is_some_and(|record| record.stamp == handle.stamp)
    }

    /// Releases the proxy. Idempotent: releasing an already released or
    /// invalid handle does nothing.
    pub fn release(&self, handle: ProxyHandle) {
        let removed = self
            .proxies
            .remove_if(&handle.slot, |_, record| record.stamp == handle.stamp);
        if let Some((slot, record)) = removed {
            log::debug!("[bridge] proxy-{} released ({} at {})", slot, record.service, record.path);
        }
    }

    pub(crate) fn live_record(&self, handle: ProxyHandle) -> Option<Arc<ProxyRecord>> {
        let record = self.proxies.get(&handle.slot)?;
        if record.stamp == handle.stamp {
            Some(Arc::clone(&*record))
        } else {
            None
        }
    }

    /// Method names of the proxy's interface, in catalog order.
    pub fn methods(&self, handle: ProxyHandle) -> Result<Vec<String>, CallError> {
        let record = self.live_record(handle).ok_or(CallError::InvalidHandle)?;
        Ok(record
            .interface_info()
            .map(|interface| interface.method_names())
            .unwrap_or_default())
    }

    /// Declared shape of one method. Accepts dashed names.
    pub fn method_info(&self, handle: ProxyHandle, method: &str) -> Result<MethodInfo, CallError> {
        let record = self.live_record(handle).ok_or(CallError::InvalidHandle)?;
        let wire_name = wire_method_name(method);
        record
            .method(&wire_name)
            .cloned()
            .ok_or(CallError::NoSuchMethod { method: wire_name })
    }

    /// Echoes the service name and object path the proxy was dialed with.
    pub fn location(&self, handle: ProxyHandle) -> Result<(String, String), CallError> {
        let record = self.live_record(handle).ok_or(CallError::InvalidHandle)?;
        Ok((record.service.clone(), record.path.clone()))
    }

    /// Names of every interface in the proxy's catalog.
    pub fn interfaces(&self, handle: ProxyHandle) -> Result<Vec<String>, CallError> {
        let record = self.live_record(handle).ok_or(CallError::InvalidHandle)?;
        Ok(record.catalog.interface_names())
    }

    /// The bus names currently on offer, in reply order.
    ///
    /// Connects a short-lived proxy to the bus management service, asks it
    /// to list names, and releases the proxy before returning.
    pub fn services(&self) -> Result<Vec<String>, CallError> {
        let handle = self.connect(BUS_SERVICE, BUS_PATH, BUS_INTERFACE)?;
        let guard = ProxyGuard::new(self, handle);
        let reply = self.call(guard.handle(), LIST_NAMES, &[])?;
        let items = reply.as_items().ok_or_else(|| CallError::Decode {
            method: LIST_NAMES.to_string(),
            detail: format!("expected a list of names, got {}", reply.kind()),
        })?;
        let mut names = Vec::with_capacity(items.len());
        for item in items {
            let name = item.as_str().ok_or_else(|| CallError::Decode {
                method: LIST_NAMES.to_string(),
                detail: format!("expected a name, got {}", item.kind()),
            })?;
            names.push(name.to_string());
        }
        Ok(names)
    }

    /// Best-effort listing of a service's object tree.
    ///
    /// Dials the service root and invokes the conventional empty-named
    /// method some services answer with their object layout. Services that
    /// do not follow the convention fail with whatever error they report;
    /// the shape of a successful reply is the service's business.
    pub fn objects(&self, service: &str) -> Result<Value, CallError> {
        let remote = self
            .transport
            .connect(self.bus, service, "", "")
            .map_err(|source| ProxyError::Connect { service: service.to_string(), source })?;
        log::debug!("[bridge] object listing requested from {}", service);
        let reply = remote
            .call("", WireValue::tuple(vec![]), self.timeout)
            .map_err(|source| call_failure("", source))?;
        Ok(decode_result(reply.as_ref()))
    }
}

/// Releases its handle on drop.
///
/// Pairs safely with explicit `release`: both may run, release is
/// idempotent.
pub struct ProxyGuard<'a> {
    bridge: &'a Bridge,
    handle: ProxyHandle,
}

impl<'a> ProxyGuard<'a> {
    pub fn new(bridge: &'a Bridge, handle: ProxyHandle) -> Self {
        ProxyGuard { bridge, handle }
    }

    pub fn handle(&self) -> ProxyHandle {
        self.handle
    }
}

impl Drop for ProxyGuard<'_> {
    fn drop(&mut self) {
        self.bridge.release(self.handle);
    }
}

/// Fluent configuration for a `Bridge`.
pub struct BridgeBuilder {
    transport: Box<dyn Transport>,
    bus: BusKind,
    timeout: Option<Duration>,
}

impl BridgeBuilder {
    pub fn new(transport: impl Transport) -> Self {
        BridgeBuilder {
            transport: Box::new(transport),
            bus: BusKind::default(),
            timeout: None,
        }
    }

    pub fn with_bus(mut self, bus: BusKind) -> Self {
        self.bus = bus;
        self
    }

    /// Default timeout for every call. Without one, the transport's own
    /// default applies.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Bridge {
        Bridge {
            transport: self.transport,
            proxies: DashMap::new(),
            bus: self.bus,
            timeout: self.timeout,
        }
    }
}
