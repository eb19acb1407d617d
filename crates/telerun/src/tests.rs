//! Bridge integration tests over the loopback transport.
//!
//! A scripted registry service backs most of these: a string-to-integer
//! store with a hit/miss counter, plus a checksum method for the byte
//! fast path and a method with a signature the marshaler cannot drive.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use telecast::Value;
use televar::WireValue;

use crate::bind::Binder;
use crate::bind::ImportOpts;
use crate::bind::Namespace;
use crate::bridge::Bridge;
use crate::bridge::BUS_INTERFACE;
use crate::bridge::BUS_SERVICE;
use crate::call::CallError;
use crate::introspect::InterfaceInfo;
use crate::introspect::MethodInfo;
use crate::introspect::NodeInfo;
use crate::loopback::LoopbackTransport;
use crate::transport;
use crate::transport::BusKind;
use crate::transport::RemoteObject;
use crate::transport::Transport;

const REGISTRY_SERVICE: &str = "org.example.Registry";
const REGISTRY_PATH: &str = "/org/example/Registry";
const REGISTRY_IFACE: &str = "org.example.Registry";

fn registry_catalog() -> NodeInfo {
    NodeInfo::new().with_interface(
        InterfaceInfo::new(REGISTRY_IFACE)
            .with_method(
                MethodInfo::new("get_value")
                    .with_input("key", "s")
                    .with_output("value", "i")
                    .with_annotation("org.freedesktop.DBus.Deprecated", "false"),
            )
            .with_method(
                MethodInfo::new("set_value")
                    .with_input("key", "s")
                    .with_input("value", "i"),
            )
            .with_method(
                MethodInfo::new("stats")
                    .with_output("hits", "i")
                    .with_output("misses", "i"),
            )
            .with_method(
                MethodInfo::new("checksum")
                    .with_input("data", "ay")
                    .with_output("sum", "u"),
            )
            .with_method(MethodInfo::new("exotic").with_input("blob", "v")),
    )
}

fn tuple_str(items: &[WireValue], index: usize) -> transport::Result<String> {
    match items.get(index) {
        Some(WireValue::Str(s)) => Ok(s.clone()),
        other => Err(transport::Error::Io(format!("expected string argument, got {:?}", other))),
    }
}

fn tuple_i32(items: &[WireValue], index: usize) -> transport::Result<i32> {
    match items.get(index) {
        Some(WireValue::Int32(n)) => Ok(*n),
        other => Err(transport::Error::Io(format!("expected int32 argument, got {:?}", other))),
    }
}

/// Scripted registry behavior: a store plus hit/miss counters.
fn registry_handler()
-> impl Fn(&str, &WireValue) -> transport::Result<Option<WireValue>> + Send + Sync {
    struct State {
        store: HashMap<String, i32>,
        hits: i32,
        misses: i32,
    }
    let state = Mutex::new(State { store: HashMap::new(), hits: 0, misses: 0 });

    move |method, args| {
        let items = match args {
            WireValue::Tuple(items) => items,
            other => {
                return Err(transport::Error::Io(format!(
                    "call body must be a tuple, got {}",
                    other.kind()
                )));
            }
        };
        let mut state = state.lock().unwrap();
        match method {
            "get_value" => {
                let key = tuple_str(items, 0)?;
                let value = match state.store.get(&key).copied() {
                    Some(value) => {
                        state.hits += 1;
                        value
                    }
                    None => {
                        state.misses += 1;
                        0
                    }
                };
                Ok(Some(WireValue::tuple(vec![WireValue::Int32(value)])))
            }
            "set_value" => {
                let key = tuple_str(items, 0)?;
                let value = tuple_i32(items, 1)?;
                state.store.insert(key, value);
                Ok(None)
            }
            "stats" => Ok(Some(WireValue::tuple(vec![
                WireValue::Int32(state.hits),
                WireValue::Int32(state.misses),
            ]))),
            "checksum" => match items.first() {
                Some(WireValue::Bytes(bytes)) => {
                    let sum = bytes.iter().map(|b| u32::from(*b)).sum();
                    Ok(Some(WireValue::tuple(vec![WireValue::UInt32(sum)])))
                }
                other => Err(transport::Error::Io(format!(
                    "expected bytes argument, got {:?}",
                    other
                ))),
            },
            other => Err(transport::Error::Remote {
                message: format!("no handler for {}", other),
            }),
        }
    }
}

fn registry_transport() -> LoopbackTransport {
    let transport = LoopbackTransport::new();
    transport.serve(REGISTRY_SERVICE, registry_catalog(), registry_handler());
    transport
}

fn registry_bridge() -> Bridge {
    Bridge::new(registry_transport())
}

/// Wraps a transport and counts every remote call, so tests can assert a
/// failing path never reached the wire. Connect-time introspection is not
/// counted.
struct CountingTransport {
    inner: LoopbackTransport,
    calls: Arc<AtomicUsize>,
}

impl Transport for CountingTransport {
    fn connect(
        &self,
        bus: crate::transport::BusKind,
        service: &str,
        path: &str,
        interface: &str,
    ) -> transport::Result<Box<dyn RemoteObject>> {
        let inner = self.inner.connect(bus, service, path, interface)?;
        Ok(Box::new(CountingObject { inner, calls: Arc::clone(&self.calls) }))
    }
}

struct CountingObject {
    inner: Box<dyn RemoteObject>,
    calls: Arc<AtomicUsize>,
}

impl RemoteObject for CountingObject {
    fn describe(&self) -> transport::Result<NodeInfo> {
        self.inner.describe()
    }

    fn call(
        &self,
        method: &str,
        args: WireValue,
        timeout: Option<Duration>,
    ) -> transport::Result<Option<WireValue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.call(method, args, timeout)
    }
}

/// Wraps a transport and records what the bridge hands it: the bus kind
/// at connect time and the timeout of every remote call.
struct RecordingTransport {
    inner: LoopbackTransport,
    bus: Arc<Mutex<Option<BusKind>>>,
    timeouts: Arc<Mutex<Vec<Option<Duration>>>>,
}

impl Transport for RecordingTransport {
    fn connect(
        &self,
        bus: BusKind,
        service: &str,
        path: &str,
        interface: &str,
    ) -> transport::Result<Box<dyn RemoteObject>> {
        *self.bus.lock().unwrap() = Some(bus);
        let inner = self.inner.connect(bus, service, path, interface)?;
        Ok(Box::new(RecordingObject { inner, timeouts: Arc::clone(&self.timeouts) }))
    }
}

struct RecordingObject {
    inner: Box<dyn RemoteObject>,
    timeouts: Arc<Mutex<Vec<Option<Duration>>>>,
}

impl RemoteObject for RecordingObject {
    fn describe(&self) -> transport::Result<NodeInfo> {
        self.inner.describe()
    }

    fn call(
        &self,
        method: &str,
        args: WireValue,
        timeout: Option<Duration>,
    ) -> transport::Result<Option<WireValue>> {
        self.timeouts.lock().unwrap().push(timeout);
        self.inner.call(method, args, timeout)
    }
}

fn counting_bridge() -> (Bridge, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let transport = CountingTransport {
        inner: registry_transport(),
        calls: Arc::clone(&calls),
    };
    (Bridge::new(transport), calls)
}

fn connect_registry(bridge: &Bridge) -> crate::bridge::ProxyHandle {
    bridge
        .connect(REGISTRY_SERVICE, REGISTRY_PATH, REGISTRY_IFACE)
        .unwrap()
}

// ============================================================================
//  PROXY LIFECYCLE
// ============================================================================

#[test]
fn test_connect_validate_release() -> Result<()> {
    let bridge = registry_bridge();
    let handle = bridge.connect(REGISTRY_SERVICE, REGISTRY_PATH, REGISTRY_IFACE)?;
    assert!(bridge.validate(handle));

    bridge.release(handle);
    assert!(!bridge.validate(handle));
    Ok(())
}

#[test]
fn test_release_is_idempotent() -> Result<()> {
    let bridge = registry_bridge();
    let handle = connect_registry(&bridge);

    bridge.release(handle);
    bridge.release(handle);
    bridge.release(handle);
    assert!(!bridge.validate(handle));
    Ok(())
}

#[test]
fn test_guard_releases_on_drop() -> Result<()> {
    let bridge = registry_bridge();
    let handle = connect_registry(&bridge);
    {
        let guard = crate::bridge::ProxyGuard::new(&bridge, handle);
        assert!(bridge.validate(guard.handle()));
    }
    assert!(!bridge.validate(handle));
    Ok(())
}

#[test]
fn test_connect_unknown_service_fails() {
    let bridge = registry_bridge();
    let err = bridge
        .connect("org.example.Missing", "/", REGISTRY_IFACE)
        .unwrap_err();
    match err {
        crate::bridge::ProxyError::Connect { service, .. } => {
            assert_eq!(service, "org.example.Missing");
        }
        other => panic!("Expected Connect error, got {:?}", other),
    }
}

#[test]
fn test_connect_interface_not_found() {
    let bridge = registry_bridge();
    let err = bridge
        .connect(REGISTRY_SERVICE, REGISTRY_PATH, "org.example.Elsewhere")
        .unwrap_err();
    match err {
        crate::bridge::ProxyError::InterfaceNotFound { interface, .. } => {
            assert_eq!(interface, "org.example.Elsewhere");
        }
        other => panic!("Expected InterfaceNotFound, got {:?}", other),
    }
}

// ============================================================================
//  CALL KERNEL
// ============================================================================

#[test]
fn test_call_round_trip() -> Result<()> {
    let bridge = registry_bridge();
    let handle = connect_registry(&bridge);

    let reply = bridge.call(
        handle,
        "set_value",
        &[Value::from("volume"), Value::from(11)],
    )?;
    assert!(reply.is_void());

    let reply = bridge.call(handle, "get_value", &[Value::from("volume")])?;
    assert_eq!(reply, Value::Integer(11));
    Ok(())
}

#[test]
fn test_single_output_comes_back_bare() -> Result<()> {
    let bridge = registry_bridge();
    let handle = connect_registry(&bridge);

    // Not a one-element list: the singleton tuple unwraps.
    let reply = bridge.call(handle, "get_value", &[Value::from("anything")])?;
    assert_eq!(reply, Value::Integer(0));
    Ok(())
}

#[test]
fn test_two_outputs_come_back_listed() -> Result<()> {
    let bridge = registry_bridge();
    let handle = connect_registry(&bridge);

    bridge.call(handle, "set_value", &[Value::from("a"), Value::from(1)])?;
    bridge.call(handle, "get_value", &[Value::from("a")])?;
    bridge.call(handle, "get_value", &[Value::from("b")])?;

    let reply = bridge.call(handle, "stats", &[])?;
    assert_eq!(reply, Value::List(vec![Value::Integer(1), Value::Integer(1)]));
    Ok(())
}

#[test]
fn test_bytes_fast_path_through_call() -> Result<()> {
    let bridge = registry_bridge();
    let handle = connect_registry(&bridge);

    let reply = bridge.call(handle, "checksum", &[Value::Bytes(vec![1, 2, 3, 250])])?;
    assert_eq!(reply, Value::Integer(256));
    Ok(())
}

#[test]
fn test_no_such_method() {
    let bridge = registry_bridge();
    let handle = connect_registry(&bridge);

    let err = bridge.call(handle, "frobnicate", &[]).unwrap_err();
    match err {
        CallError::NoSuchMethod { method } => assert_eq!(method, "frobnicate"),
        other => panic!("Expected NoSuchMethod, got {:?}", other),
    }
}

#[test]
fn test_arity_checked_before_any_io() {
    let (bridge, calls) = counting_bridge();
    let handle = connect_registry(&bridge);

    let err = bridge
        .call(handle, "set_value", &[Value::from("volume")])
        .unwrap_err();
    match err {
        CallError::ArityMismatch { method, expected, actual } => {
            assert_eq!(method, "set_value");
            assert_eq!(expected, 2);
            assert_eq!(actual, 1);
        }
        other => panic!("Expected ArityMismatch, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_parameter_mismatch_names_position() {
    let (bridge, calls) = counting_bridge();
    let handle = connect_registry(&bridge);

    let err = bridge
        .call(handle, "set_value", &[Value::from("volume"), Value::from("loud")])
        .unwrap_err();
    match err {
        CallError::ParameterTypeMismatch { method, position, arity, expected } => {
            assert_eq!(method, "set_value");
            assert_eq!(position, 2);
            assert_eq!(arity, 2);
            assert_eq!(expected, "integer");
        }
        other => panic!("Expected ParameterTypeMismatch, got {:?}", other),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_unsupported_signature_renders_raw() {
    // The catalog may list types the marshaler cannot drive; calling
    // through one fails with the raw signature, and the rest of the
    // interface stays usable.
    let bridge = registry_bridge();
    let handle = connect_registry(&bridge);

    let err = bridge.call(handle, "exotic", &[Value::from(1)]).unwrap_err();
    match err {
        CallError::ParameterTypeMismatch { position, expected, .. } => {
            assert_eq!(position, 1);
            assert_eq!(expected, "v");
        }
        other => panic!("Expected ParameterTypeMismatch, got {:?}", other),
    }

    let reply = bridge.call(handle, "get_value", &[Value::from("k")]).unwrap();
    assert_eq!(reply, Value::Integer(0));
}

#[test]
fn test_dashed_names_reach_underscored_methods() -> Result<()> {
    let bridge = registry_bridge();
    let handle = connect_registry(&bridge);

    bridge.call(handle, "set-value", &[Value::from("k"), Value::from(5)])?;
    let reply = bridge.call(handle, "get-value", &[Value::from("k")])?;
    assert_eq!(reply, Value::Integer(5));
    Ok(())
}

#[test]
fn test_configured_timeout_and_bus_reach_the_transport() -> Result<()> {
    let bus = Arc::new(Mutex::new(None));
    let timeouts = Arc::new(Mutex::new(Vec::new()));
    let transport = RecordingTransport {
        inner: registry_transport(),
        bus: Arc::clone(&bus),
        timeouts: Arc::clone(&timeouts),
    };

    let bridge = Bridge::builder(transport)
        .with_bus(BusKind::System)
        .with_timeout(Duration::from_secs(5))
        .build();
    let handle = connect_registry(&bridge);
    bridge.call(handle, "get_value", &[Value::from("k")])?;

    assert_eq!(*bus.lock().unwrap(), Some(BusKind::System));
    assert_eq!(timeouts.lock().unwrap().as_slice(), &[Some(Duration::from_secs(5))]);
    Ok(())
}

#[test]
fn test_timeout_defaults_to_the_transport_default() -> Result<()> {
    let timeouts = Arc::new(Mutex::new(Vec::new()));
    let transport = RecordingTransport {
        inner: registry_transport(),
        bus: Arc::new(Mutex::new(None)),
        timeouts: Arc::clone(&timeouts),
    };

    let bridge = Bridge::new(transport);
    let handle = connect_registry(&bridge);
    bridge.call(handle, "get_value", &[Value::from("k")])?;

    assert_eq!(timeouts.lock().unwrap().as_slice(), &[None]);
    Ok(())
}

#[test]
fn test_call_after_release_is_invalid_handle() {
    let (bridge, calls) = counting_bridge();
    let handle = connect_registry(&bridge);
    bridge.release(handle);

    let err = bridge.call(handle, "get_value", &[Value::from("k")]).unwrap_err();
    assert!(matches!(err, CallError::InvalidHandle));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

// ============================================================================
//  CATALOG ACCESSORS
// ============================================================================

#[test]
fn test_methods_in_catalog_order() -> Result<()> {
    let bridge = registry_bridge();
    let handle = connect_registry(&bridge);

    let names = bridge.methods(handle)?;
    assert_eq!(names, vec!["get_value", "set_value", "stats", "checksum", "exotic"]);
    Ok(())
}

#[test]
fn test_method_info_carries_annotations() -> Result<()> {
    let bridge = registry_bridge();
    let handle = connect_registry(&bridge);

    let info = bridge.method_info(handle, "get_value")?;
    assert_eq!(info.annotations.len(), 1);
    assert_eq!(info.annotations[0].name, "org.freedesktop.DBus.Deprecated");
    assert_eq!(info.annotations[0].value, "false");

    // Unannotated methods come back with an empty list, not an error.
    let info = bridge.method_info(handle, "set_value")?;
    assert!(info.annotations.is_empty());
    Ok(())
}

#[test]
fn test_location_echoes_connect_coordinates() -> Result<()> {
    let bridge = registry_bridge();
    let handle = connect_registry(&bridge);

    let (service, path) = bridge.location(handle)?;
    assert_eq!(service, REGISTRY_SERVICE);
    assert_eq!(path, REGISTRY_PATH);

    bridge.release(handle);
    assert!(matches!(bridge.location(handle), Err(CallError::InvalidHandle)));
    Ok(())
}

#[test]
fn test_method_info_accepts_dashed_names() -> Result<()> {
    let bridge = registry_bridge();
    let handle = connect_registry(&bridge);

    let info = bridge.method_info(handle, "set-value")?;
    assert_eq!(info.name, "set_value");
    assert_eq!(info.arity(), 2);
    assert_eq!(info.inputs[0].name, "key");
    assert_eq!(info.inputs[0].signature.as_str(), "s");
    assert_eq!(info.inputs[1].signature.as_str(), "i");
    assert!(info.outputs.is_empty());
    Ok(())
}

// ============================================================================
//  DYNAMIC BINDINGS
// ============================================================================

#[test]
fn test_import_renames_with_prefix_and_dashes() -> Result<()> {
    let transport = LoopbackTransport::new();
    let catalog = NodeInfo::new().with_interface(
        InterfaceInfo::new("org.example.Pair")
            .with_method(MethodInfo::new("get_value").with_output("value", "i"))
            .with_method(MethodInfo::new("set_value").with_input("value", "i")),
    );
    transport.serve("org.example.Pair", catalog, |method, _args| match method {
        "get_value" => Ok(Some(WireValue::tuple(vec![WireValue::Int32(7)]))),
        "set_value" => Ok(None),
        other => Err(transport::Error::Remote { message: format!("no handler for {}", other) }),
    });

    let bridge = Arc::new(Bridge::new(transport));
    let handle = bridge.connect("org.example.Pair", "/", "org.example.Pair")?;

    let namespace = Namespace::new();
    let opts = ImportOpts { prefix: "x-".to_string(), dash: true };
    let defined = Binder::import(&bridge, handle, &namespace, &opts)?;

    assert_eq!(defined, 2);
    assert_eq!(namespace.names(), vec!["x-get-value", "x-set-value"]);

    // The exposed name is renamed; the wire name is not.
    let binding = namespace.lookup("x-get-value").unwrap();
    assert_eq!(binding.wire_name(), "get_value");
    assert_eq!(binding.exposed_name(), "x-get-value");
    assert_eq!(binding.arity(), 0);
    assert_eq!(binding.invoke(&[])?, Value::Integer(7));
    Ok(())
}

#[test]
fn test_import_without_dash_keeps_underscores() -> Result<()> {
    let bridge = Arc::new(registry_bridge());
    let handle = connect_registry(&bridge);

    let namespace = Namespace::new();
    let opts = ImportOpts { prefix: "reg_".to_string(), dash: false };
    Binder::import(&bridge, handle, &namespace, &opts)?;

    assert!(namespace.lookup("reg_get_value").is_some());
    assert!(namespace.lookup("reg-get-value").is_none());
    Ok(())
}

#[test]
fn test_bindings_delegate_through_kernel() -> Result<()> {
    let bridge = Arc::new(registry_bridge());
    let handle = connect_registry(&bridge);

    let namespace = Namespace::new();
    Binder::import(&bridge, handle, &namespace, &ImportOpts::default())?;

    let set = namespace.lookup("set-value").unwrap();
    let get = namespace.lookup("get-value").unwrap();
    set.invoke(&[Value::from("bound"), Value::from(3)])?;
    assert_eq!(get.invoke(&[Value::from("bound")])?, Value::Integer(3));

    // Arity enforcement reaches bindings too.
    let err = set.invoke(&[Value::from("bound")]).unwrap_err();
    assert!(matches!(err, CallError::ArityMismatch { .. }));
    Ok(())
}

#[test]
fn test_binding_goes_stale_after_release() -> Result<()> {
    let bridge = Arc::new(registry_bridge());
    let handle = connect_registry(&bridge);

    let namespace = Namespace::new();
    Binder::import(&bridge, handle, &namespace, &ImportOpts::default())?;
    let binding = namespace.lookup("get-value").unwrap();

    bridge.release(handle);
    let err = binding.invoke(&[Value::from("k")]).unwrap_err();
    assert!(matches!(err, CallError::InvalidHandle));

    let err = Binder::import(&bridge, handle, &Namespace::new(), &ImportOpts::default())
        .unwrap_err();
    assert!(matches!(err, CallError::InvalidHandle));
    Ok(())
}

// ============================================================================
//  BUS UTILITIES
// ============================================================================

fn bus_catalog() -> NodeInfo {
    NodeInfo::new().with_interface(
        InterfaceInfo::new(BUS_INTERFACE)
            .with_method(MethodInfo::new("ListNames").with_output("names", "as")),
    )
}

#[test]
fn test_services_lists_bus_names() -> Result<()> {
    let transport = registry_transport();
    transport.serve(BUS_SERVICE, bus_catalog(), |method, _args| match method {
        "ListNames" => {
            let names = WireValue::array(
                "s".into(),
                vec![
                    WireValue::Str("org.freedesktop.DBus".to_string()),
                    WireValue::Str("org.example.Registry".to_string()),
                ],
            )
            .map_err(|e| transport::Error::BadReply(e.to_string()))?;
            Ok(Some(WireValue::tuple(vec![names])))
        }
        other => Err(transport::Error::Remote { message: format!("no handler for {}", other) }),
    });

    let bridge = Bridge::new(transport);
    let names = bridge.services()?;
    assert_eq!(names, vec!["org.freedesktop.DBus", "org.example.Registry"]);
    Ok(())
}

#[test]
fn test_objects_is_best_effort() -> Result<()> {
    let transport = registry_transport();
    transport.serve("org.example.Tree", NodeInfo::new(), |method, _args| match method {
        "" => Ok(Some(WireValue::tuple(vec![WireValue::Str("/".to_string())]))),
        other => Err(transport::Error::Remote { message: format!("no handler for {}", other) }),
    });

    let bridge = Bridge::new(transport);
    assert_eq!(bridge.objects("org.example.Tree")?, Value::Str("/".to_string()));

    // A service without the convention surfaces its own error.
    let err = bridge.objects(REGISTRY_SERVICE).unwrap_err();
    assert!(matches!(err, CallError::Remote { .. }));
    Ok(())
}
