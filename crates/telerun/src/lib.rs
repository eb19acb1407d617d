//! # telerun
//!
//! A dynamic bridge to remote objects on a message bus: connect to a
//! service, discover its methods at runtime, and call them with host
//! values instead of generated stubs.
//!
//! ## Architecture
//!
//! - **Transport**: the seam to the bus. telerun never speaks a wire
//!   protocol itself; a `Transport` dials objects and a `RemoteObject`
//!   answers introspection and blocking calls.
//! - **Bridge**: the proxy registry. `connect` dials a service, fetches
//!   its catalog, and hands back a `ProxyHandle` the host can copy and
//!   store; handles re-validate on every use, so stale ones fail instead
//!   of dangling.
//! - **Call kernel**: every invocation funnels through `Bridge::call`,
//!   which checks the handle, the method, and the arity, marshals
//!   arguments against the catalog's declared signatures, and shapes the
//!   reply for the host.
//! - **Binder**: turns a catalog into named `MethodBinding`s in a
//!   `Namespace`, one callable per discovered method.
//!
//! ## Example
//!
//! ```rust,no_run
//! use telerun::bridge::Bridge;
//! use telecast::Value;
//! # use telerun::loopback::LoopbackTransport;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let transport = LoopbackTransport::new();
//! let bridge = Bridge::new(transport);
//! let handle = bridge.connect("org.example.Registry", "/org/example/Registry", "org.example.Registry")?;
//! let value = bridge.call(handle, "get-value", &[Value::from("volume")])?;
//! bridge.release(handle);
//! # Ok(())
//! # }
//! ```

pub mod bind;
pub mod bridge;
pub mod call;
pub mod introspect;
pub mod loopback;
pub mod transport;

#[cfg(test)]
mod tests;

pub use crate::bind::Binder;
pub use crate::bind::ImportOpts;
pub use crate::bind::MethodBinding;
pub use crate::bind::Namespace;
pub use crate::bridge::Bridge;
pub use crate::bridge::BridgeBuilder;
pub use crate::bridge::ProxyError;
pub use crate::bridge::ProxyGuard;
pub use crate::bridge::ProxyHandle;
pub use crate::call::CallError;
