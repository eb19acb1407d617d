//! # Introspection Catalog
//!
//! Typed model of a remote object's introspection document: which
//! interfaces the object implements, which methods each interface carries,
//! and the declared signature of every argument.
//!
//! The catalog is data, not behavior. Transports produce it, the bridge
//! reads it. Lookups are linear; real documents are small.

use televar::Signature;

/// One named, typed argument of a method.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgInfo {
    pub name: String,
    pub signature: Signature,
}

impl ArgInfo {
    pub fn new(name: impl Into<String>, signature: impl Into<Signature>) -> Self {
        ArgInfo { name: name.into(), signature: signature.into() }
    }
}

/// An annotation attached to a method by the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationInfo {
    pub name: String,
    pub value: String,
}

/// One callable method and its declared shape.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodInfo {
    pub name: String,
    pub inputs: Vec<ArgInfo>,
    pub outputs: Vec<ArgInfo>,
    pub annotations: Vec<AnnotationInfo>,
}

impl MethodInfo {
    pub fn new(name: impl Into<String>) -> Self {
        MethodInfo {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            annotations: Vec::new(),
        }
    }

    pub fn with_input(mut self, name: &str, signature: &str) -> Self {
        self.inputs.push(ArgInfo::new(name, signature));
        self
    }

    pub fn with_output(mut self, name: &str, signature: &str) -> Self {
        self.outputs.push(ArgInfo::new(name, signature));
        self
    }

    pub fn with_annotation(mut self, name: &str, value: &str) -> Self {
        self.annotations.push(AnnotationInfo { name: name.to_string(), value: value.to_string() });
        self
    }

    /// Number of declared inputs; the arity a caller must satisfy.
    pub fn arity(&self) -> usize {
        self.inputs.len()
    }

    pub fn input_signatures(&self) -> impl Iterator<Item = &Signature> {
        self.inputs.iter().map(|arg| &arg.signature)
    }

    pub fn output_signatures(&self) -> impl Iterator<Item = &Signature> {
        self.outputs.iter().map(|arg| &arg.signature)
    }
}

/// One interface: a named group of methods.
#[derive(Debug, Clone, PartialEq)]
pub struct InterfaceInfo {
    pub name: String,
    pub methods: Vec<MethodInfo>,
}

impl InterfaceInfo {
    pub fn new(name: impl Into<String>) -> Self {
        InterfaceInfo { name: name.into(), methods: Vec::new() }
    }

    pub fn with_method(mut self, method: MethodInfo) -> Self {
        self.methods.push(method);
        self
    }

    /// First method with the given name. Methods are not overloadable.
    pub fn method(&self, name: &str) -> Option<&MethodInfo> {
        self.methods.iter().find(|method| method.name == name)
    }

    /// Method names in catalog order.
    pub fn method_names(&self) -> Vec<String> {
        self.methods.iter().map(|method| method.name.clone()).collect()
    }
}

/// A parsed introspection document.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeInfo {
    pub interfaces: Vec<InterfaceInfo>,
}

impl NodeInfo {
    pub fn new() -> Self {
        NodeInfo { interfaces: Vec::new() }
    }

    pub fn with_interface(mut self, interface: InterfaceInfo) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn interface(&self, name: &str) -> Option<&InterfaceInfo> {
        self.interfaces.iter().find(|interface| interface.name == name)
    }

    pub fn interface_names(&self) -> Vec<String> {
        self.interfaces.iter().map(|interface| interface.name.clone()).collect()
    }
}

impl Default for NodeInfo {
    fn default() -> Self {
        NodeInfo::new()
    }
}
