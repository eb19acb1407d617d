//! # Loopback Transport
//!
//! A scriptable in-process transport: services are plain closures
//! registered under a name, with a hand-built catalog standing in for the
//! introspection document. No sockets, no bus, no serialization.
//!
//! The test suite drives the whole bridge through this transport, and it
//! doubles as a way to embed local "remote" objects in a host without a
//! real bus connection.

use std::sync::Arc;

use dashmap::DashMap;
use televar::WireValue;

use crate::introspect::NodeInfo;
use crate::transport;
use crate::transport::BusKind;
use crate::transport::RemoteObject;
use crate::transport::Transport;

/// A scripted method dispatcher: receives the wire method name and the
/// encoded argument tuple, answers with an optional reply body.
pub type Handler =
    dyn Fn(&str, &WireValue) -> transport::Result<Option<WireValue>> + Send + Sync;

struct Service {
    catalog: NodeInfo,
    handler: Arc<Handler>,
}

/// An in-process transport serving scripted objects by service name.
///
/// Clones share the service table, so a test can keep one clone for
/// scripting after handing another to the bridge. Bus kind, object path,
/// and interface are ignored when dialing: the service name alone selects
/// the scripted object.
#[derive(Clone)]
pub struct LoopbackTransport {
    services: Arc<DashMap<String, Arc<Service>>>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        LoopbackTransport { services: Arc::new(DashMap::new()) }
    }

    /// Registers (or replaces) a scripted object under `service`.
    pub fn serve<F>(&self, service: &str, catalog: NodeInfo, handler: F)
    where
        F: Fn(&str, &WireValue) -> transport::Result<Option<WireValue>> + Send + Sync + 'static,
    {
        let entry = Service { catalog, handler: Arc::new(handler) };
        self.services.insert(service.to_string(), Arc::new(entry));
    }

    /// Removes a scripted object, making later dials fail.
    pub fn retire(&self, service: &str) {
        self.services.remove(service);
    }
}

impl Default for LoopbackTransport {
    fn default() -> Self {
        LoopbackTransport::new()
    }
}

impl Transport for LoopbackTransport {
    fn connect(
        &self,
        _bus: BusKind,
        service: &str,
        _path: &str,
        _interface: &str,
    ) -> transport::Result<Box<dyn RemoteObject>> {
        match self.services.get(service) {
            Some(entry) => Ok(Box::new(LoopbackObject { service: Arc::clone(&entry) })),
            None => Err(transport::Error::NoSuchObject(service.to_string())),
        }
    }
}

struct LoopbackObject {
    service: Arc<Service>,
}

impl RemoteObject for LoopbackObject {
    fn describe(&self) -> transport::Result<NodeInfo> {
        Ok(self.service.catalog.clone())
    }

    fn call(
        &self,
        method: &str,
        args: WireValue,
        _timeout: Option<std::time::Duration>,
    ) -> transport::Result<Option<WireValue>> {
        (self.service.handler)(method, &args)
    }
}
