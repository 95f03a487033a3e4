//! Method descriptors (signals, slots, invokables, constructors)

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::meta::jar::JarInvoke;
use crate::meta::InvokeError;
use crate::metatype::{self, normalized_type};
use crate::object::Object;
use crate::variant::Variant;

/// Access level of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Access {
    Private,
    Protected,
    #[default]
    Public,
}

/// Kind of a method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MethodType {
    #[default]
    Method,
    Signal,
    Slot,
    Constructor,
}

bitflags! {
    /// Method attributes
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MethodAttributes: u32 {
        /// Kept for source compatibility only
        const COMPATIBILITY = 1 << 0;
        /// Overload generated for default arguments; not connectable as a slot
        const CLONED = 1 << 1;
        /// Exposed to scripting
        const SCRIPTABLE = 1 << 2;
    }
}

/// Name and parameter types of a method, e.g. `valueChanged(i32)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub name: String,
    pub parameter_types: Vec<String>,
}

impl MethodSignature {
    /// Parse `name(type, type)`; parameter types are normalized
    pub fn parse(signature: &str) -> Option<Self> {
        let signature = signature.trim();
        let open = signature.find('(')?;
        if !signature.ends_with(')') {
            return None;
        }

        let name = signature[..open].trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return None;
        }

        let params = &signature[open + 1..signature.len() - 1];
        let parameter_types = split_parameters(params)
            .into_iter()
            .map(|p| normalized_type(&p))
            .collect();

        Some(Self {
            name: name.to_string(),
            parameter_types,
        })
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameter_types.join(","))
    }
}

/// Split a parameter list on top-level commas (generic arguments stay intact)
fn split_parameters(params: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut current = String::new();

    for c in params.chars() {
        match c {
            '<' | '(' | '[' => {
                depth += 1;
                current.push(c);
            }
            '>' | ')' | ']' => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ',' if depth == 0 => out.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if !current.trim().is_empty() || !out.is_empty() {
        out.push(current);
    }
    out.into_iter().map(|p| p.trim().to_string()).collect()
}

/// Normalize a method signature
///
/// Removes insignificant whitespace and canonicalizes parameter types.
/// Strings that are not signatures are returned with whitespace stripped.
pub fn normalized_signature(signature: &str) -> String {
    match MethodSignature::parse(signature) {
        Some(parsed) => parsed.to_string(),
        None => signature.chars().filter(|c| !c.is_whitespace()).collect(),
    }
}

/// Check whether `slot` can receive the arguments of `signal`
///
/// The slot's parameter types must be a prefix of the signal's.
pub fn check_connect_args(signal: &[String], slot: &[String]) -> bool {
    slot.len() <= signal.len() && slot.iter().zip(signal).all(|(a, b)| a == b)
}

/// Descriptor of one callable member
#[derive(Clone)]
pub struct MetaMethod {
    pub(crate) name: String,
    pub(crate) return_type: String,
    pub(crate) parameter_types: Vec<String>,
    pub(crate) parameter_names: Vec<String>,
    pub(crate) access: Access,
    pub(crate) method_type: MethodType,
    pub(crate) attributes: MethodAttributes,
    pub(crate) revision: u32,
    pub(crate) tag: String,
    pub(crate) class_name: String,
    pub(crate) jar: Option<Arc<dyn JarInvoke>>,
}

impl MetaMethod {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized signature, e.g. `valueChanged(i32)`
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, self.parameter_types.join(","))
    }

    pub fn method_signature(&self) -> MethodSignature {
        MethodSignature {
            name: self.name.clone(),
            parameter_types: self.parameter_types.clone(),
        }
    }

    pub fn return_type(&self) -> &str {
        &self.return_type
    }

    /// Type id of the return type (`VOID` for methods returning nothing)
    pub fn return_type_id(&self) -> u32 {
        metatype::type_id_from_name(&self.return_type).unwrap_or(metatype::types::INVALID)
    }

    pub fn parameter_types(&self) -> &[String] {
        &self.parameter_types
    }

    pub fn parameter_count(&self) -> usize {
        self.parameter_types.len()
    }

    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn method_type(&self) -> MethodType {
        self.method_type
    }

    pub fn attributes(&self) -> MethodAttributes {
        self.attributes
    }

    pub fn revision(&self) -> u32 {
        self.revision
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Name of the declaring class
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty()
    }

    pub fn is_invokable(&self) -> bool {
        self.jar.is_some() || self.method_type == MethodType::Signal
    }

    /// Structural match against a signature in the given class
    pub fn matches(&self, signature: &MethodSignature, class_name: &str) -> bool {
        self.name == signature.name
            && self.parameter_types == signature.parameter_types
            && self.class_name == class_name
    }

    /// Invoke the method on `obj`
    ///
    /// Invoking a signal emits it. Static methods accept `None`.
    pub fn invoke(&self, obj: Option<&dyn Object>, args: &[Variant]) -> Result<Variant, InvokeError> {
        if self.method_type == MethodType::Signal {
            let sender = obj.ok_or_else(|| InvokeError::NotInvokable(self.signature()))?;
            if args.len() < self.parameter_count() {
                return Err(InvokeError::ArgumentCount {
                    expected: self.parameter_count(),
                    found: args.len(),
                });
            }
            crate::connections::emit_method(sender, self, args);
            return Ok(Variant::Invalid);
        }

        match &self.jar {
            Some(jar) => jar.invoke(obj, args),
            None => Err(InvokeError::NotInvokable(self.signature())),
        }
    }
}

impl PartialEq for MetaMethod {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.parameter_types == other.parameter_types
            && self.class_name == other.class_name
    }
}

impl Eq for MetaMethod {}

impl fmt::Debug for MetaMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetaMethod")
            .field("class", &self.class_name)
            .field("signature", &self.signature())
            .field("type", &self.method_type)
            .field("access", &self.access)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method(class: &str, name: &str, params: &[&str]) -> MetaMethod {
        MetaMethod {
            name: name.to_string(),
            return_type: "void".to_string(),
            parameter_types: params.iter().map(|p| normalized_type(p)).collect(),
            parameter_names: Vec::new(),
            access: Access::Public,
            method_type: MethodType::Signal,
            attributes: MethodAttributes::empty(),
            revision: 0,
            tag: String::new(),
            class_name: class.to_string(),
            jar: None,
        }
    }

    #[test]
    fn test_parse_signature() {
        let sig = MethodSignature::parse(" setValue( int , const QString & ) ").unwrap();
        assert_eq!(sig.name, "setValue");
        assert_eq!(sig.parameter_types, vec!["i32", "String"]);
        assert_eq!(sig.to_string(), "setValue(i32,String)");

        let empty = MethodSignature::parse("clicked()").unwrap();
        assert!(empty.parameter_types.is_empty());

        let generic = MethodSignature::parse("load(VariantMap, Vec<String>)").unwrap();
        assert_eq!(generic.parameter_types, vec!["VariantMap", "Vec<String>"]);

        assert!(MethodSignature::parse("no parens").is_none());
        assert!(MethodSignature::parse("(i32)").is_none());
    }

    #[test]
    fn test_normalized_signature() {
        assert_eq!(normalized_signature("valueChanged( float )"), "valueChanged(f32)");
        assert_eq!(normalized_signature("bad sig"), "badsig");
    }

    #[test]
    fn test_check_connect_args_prefix() {
        let signal = vec!["i32".to_string(), "String".to_string()];
        assert!(check_connect_args(&signal, &[]));
        assert!(check_connect_args(&signal, &["i32".to_string()]));
        assert!(check_connect_args(&signal, &signal));
        assert!(!check_connect_args(&signal, &["String".to_string()]));
        assert!(!check_connect_args(&["i32".to_string()], &signal));
    }

    #[test]
    fn test_equality_includes_class() {
        let a = method("Sample", "changed", &["int"]);
        let b = method("Sample", "changed", &["i32"]);
        let c = method("Other", "changed", &["i32"]);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.matches(&MethodSignature::parse("changed(int)").unwrap(), "Sample"));
    }

    #[test]
    fn test_invoke_without_jar() {
        let mut m = method("Sample", "plain", &[]);
        m.method_type = MethodType::Method;
        assert!(!m.is_invokable());
        assert_eq!(
            m.invoke(None, &[]),
            Err(InvokeError::NotInvokable("plain()".to_string()))
        );
    }
}
