//! Error kinds: typed categories attached to errors.

use std::any::{Any, TypeId};
use std::fmt;

use crate::template::TemplateFuncs;

/// The category of an error.
///
/// Kinds are compared by their concrete type, never by value, so a kind is
/// usually a unit struct:
///
/// ```rust
/// use erk::Kind;
///
/// #[derive(Debug, Clone)]
/// struct NotFound;
///
/// impl Kind for NotFound {}
/// ```
///
/// A kind that carries data is cloned every time it is handed out by an
/// error, so callers can never reach the copy stored inside the error. The
/// clone is whatever the kind's `Clone` implementation does: fields behind an
/// `Arc` stay shared, plain fields are copied.
pub trait Kind: KindBase + fmt::Debug + Send + Sync + 'static {
    /// A stable identifier for the kind.
    ///
    /// Defaults to `"<module path>:<TypeName>"`.
    fn kind_string(&self) -> String {
        namespaced(self.type_name())
    }

    /// The helper functions callable from message templates of this kind.
    ///
    /// Every call returns an independent table.
    fn template_funcs(&self) -> TemplateFuncs {
        TemplateFuncs::builtin()
    }
}

/// Object-safe plumbing implemented for every `Kind + Clone`.
pub trait KindBase {
    fn clone_kind(&self) -> Box<dyn Kind>;
    fn as_any(&self) -> &dyn Any;
    fn type_name(&self) -> &'static str;
}

impl<T: Kind + Clone> KindBase for T {
    fn clone_kind(&self) -> Box<dyn Kind> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

impl Clone for Box<dyn Kind> {
    fn clone(&self) -> Self {
        (**self).clone_kind()
    }
}

impl dyn Kind {
    /// The `TypeId` of the concrete kind.
    pub fn kind_type_id(&self) -> TypeId {
        self.as_any().type_id()
    }

    /// Returns true if the concrete kind is `K`.
    pub fn is<K: Kind>(&self) -> bool {
        self.as_any().is::<K>()
    }

    pub fn downcast_ref<K: Kind>(&self) -> Option<&K> {
        self.as_any().downcast_ref::<K>()
    }
}

/// The kind string for an optional kind. No kind yields an empty string.
pub fn kind_string_for(kind: Option<&dyn Kind>) -> String {
    kind.map(|kind| kind.kind_string()).unwrap_or_default()
}

/// Two kinds match when they share a concrete type. Two missing kinds match.
pub(crate) fn same_kind_type(a: Option<&dyn Kind>, b: Option<&dyn Kind>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.kind_type_id() == b.kind_type_id(),
        (None, None) => true,
        _ => false,
    }
}

/// Turns `a::b::Type<c::D>` into `a::b:Type<c::D>`.
pub(crate) fn namespaced(type_name: &str) -> String {
    let head = type_name.find('<').unwrap_or(type_name.len());
    match type_name[..head].rfind("::") {
        Some(split) => format!("{}:{}", &type_name[..split], &type_name[split + 2..]),
        None => type_name.to_string(),
    }
}
