//! # Dynamic Binding Generator
//!
//! This module mechanically turns a proxy's catalog into host-callable
//! bindings. It walks the methods of the proxy's interface, renames each
//! one for the host convention, and defines a `MethodBinding` per method
//! in a `Namespace`.
//!
//! ## Architecture
//!
//! - **Binder**: the entry point for importing.
//! - **MethodBinding**: one callable per discovered method, capturing the
//!   bridge and handle. Every invocation goes back through the full call
//!   kernel, so a released proxy turns its bindings stale instead of
//!   dangling.
//! - **Namespace**: a flat name-to-binding map the host looks callables
//!   up in.

use std::sync::Arc;

use dashmap::DashMap;
use telecast::Value;

use crate::bridge::Bridge;
use crate::bridge::ProxyHandle;
use crate::call::CallError;
use crate::call::Result;

/// How imported methods are renamed for the host.
///
/// The exposed name is `prefix + method`, and when `dash` is set every
/// underscore in that whole string, prefix included, becomes a dash.
pub struct ImportOpts {
    pub prefix: String,
    pub dash: bool,
}

impl Default for ImportOpts {
    fn default() -> Self {
        ImportOpts {
            prefix: String::new(),
            dash: true,
        }
    }
}

pub(crate) fn exposed_name(opts: &ImportOpts, wire_name: &str) -> String {
    let name = format!("{}{}", opts.prefix, wire_name);
    if opts.dash {
        name.replace('_', "-")
    } else {
        name
    }
}

/// One imported method, ready to invoke.
///
/// Bindings are cheap to clone and re-validate their handle on every
/// call, so holding one past its proxy's release is safe: the call fails
/// with `InvalidHandle` instead of reaching a dead remote.
#[derive(Clone)]
pub struct MethodBinding {
    bridge: Arc<Bridge>,
    handle: ProxyHandle,
    wire_name: String,
    exposed_name: String,
    arity: usize,
}

impl MethodBinding {
    pub fn invoke(&self, args: &[Value]) -> Result<Value> {
        self.bridge.call(self.handle, &self.wire_name, args)
    }

    pub fn handle(&self) -> ProxyHandle {
        self.handle
    }

    /// The catalog's name for the method.
    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    /// The renamed, host-facing name this binding was defined under.
    pub fn exposed_name(&self) -> &str {
        &self.exposed_name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }
}

/// A flat map of exposed names to bindings.
///
/// Redefining a name replaces the old binding, so importing twice with
/// the same options is harmless.
pub struct Namespace {
    bindings: DashMap<String, MethodBinding>,
}

impl Namespace {
    pub fn new() -> Self {
        Namespace { bindings: DashMap::new() }
    }

    pub fn define(&self, binding: MethodBinding) {
        self.bindings.insert(binding.exposed_name.clone(), binding);
    }

    pub fn lookup(&self, name: &str) -> Option<MethodBinding> {
        self.bindings.get(name).map(|entry| entry.value().clone())
    }

    /// Every defined name, sorted for stable listing.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.iter().map(|entry| entry.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace::new()
    }
}

/// The Binder orchestrates the wiring of imports.
pub struct Binder;

impl Binder {
    /// Defines one binding per method of the proxy's interface.
    ///
    /// Names follow `opts`: prefixed, then dashed when asked. Returns the
    /// number of bindings defined. The catalog was fetched at connect
    /// time, so importing performs no I/O.
    pub fn import(
        bridge: &Arc<Bridge>,
        handle: ProxyHandle,
        namespace: &Namespace,
        opts: &ImportOpts,
    ) -> Result<usize> {
        let record = bridge.live_record(handle).ok_or(CallError::InvalidHandle)?;
        let mut defined = 0;
        if let Some(interface) = record.interface_info() {
            for method in &interface.methods {
                let binding = MethodBinding {
                    bridge: Arc::clone(bridge),
                    handle,
                    wire_name: method.name.clone(),
                    exposed_name: exposed_name(opts, &method.name),
                    arity: method.arity(),
                };
                namespace.define(binding);
                defined += 1;
            }
        }
        log::debug!(
            "[bind] {} imported {} bindings (prefix {:?}, dash {})",
            handle,
            defined,
            opts.prefix,
            opts.dash
        );
        Ok(defined)
    }
}
