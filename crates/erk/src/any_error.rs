//! Type-erased error handles and the capabilities shared by erk errors.

use std::any::{Any, TypeId};
use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::export::ExportedError;
use crate::group::{Group, Groupable};
use crate::kind::{Kind, namespaced};
use crate::params::Params;
use crate::strict::Mode;
use crate::string_error::StringError;

/// Errors that carry a kind and params, and can be exported.
///
/// [`Error`] and [`Group`] implement it. Custom implementations are wrapped
/// with [`AnyError::erk`].
pub trait Erkable: StdError + ErkableBase + Send + Sync + 'static {
    /// A copy of the kind, if any.
    fn kind(&self) -> Option<Box<dyn Kind>>;

    /// A copy of the params.
    fn params(&self) -> Params;

    /// A new error with `params` merged in. Nil values delete keys.
    fn with_params(&self, params: Params) -> AnyError;

    /// The message without executing its template.
    fn export_raw_message(&self) -> String;

    /// A detached, serializable copy of the error.
    fn export_with(&self, mode: Mode) -> ExportedError;

    /// The message rendered in `mode`.
    fn render(&self, _mode: Mode) -> String {
        self.to_string()
    }

    /// The message rendered for nesting at `indent`, for errors that
    /// support indentation.
    fn render_indented(&self, _indent: &str, _mode: Mode) -> Option<String> {
        None
    }

    /// The error this one wraps.
    fn wrapped(&self) -> Option<&AnyError> {
        None
    }

    /// Custom matching used by [`crate::is`].
    fn is(&self, _target: &AnyError, _mode: Mode) -> bool {
        false
    }

    fn as_groupable(&self) -> Option<&dyn Groupable> {
        None
    }
}

/// Object-safe plumbing implemented for every [`Erkable`].
pub trait ErkableBase {
    fn as_any(&self) -> &dyn Any;
    fn as_std_error(&self) -> &(dyn StdError + Send + Sync + 'static);
    fn type_name(&self) -> &'static str;
}

impl<T: Erkable> ErkableBase for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_std_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        self
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }
}

/// A cheaply cloneable handle to any error.
///
/// erk errors keep their capabilities behind the handle. Every other
/// `std::error::Error` is kept as is together with its concrete type, which
/// [`crate::is_a`] compares.
#[derive(Clone)]
pub struct AnyError(Repr);

#[derive(Clone)]
enum Repr {
    Erk(Arc<dyn Erkable>),
    Foreign {
        error: Arc<dyn StdError + Send + Sync>,
        type_id: TypeId,
        type_name: &'static str,
    },
}

impl AnyError {
    /// Wrap any error. [`Error`] and [`Group`] values keep their erk
    /// capabilities.
    pub fn new<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        let mut slot = Some(error);
        if let Some(error) = take::<E, Error>(&mut slot) {
            return Self::erk(error);
        }
        if let Some(group) = take::<E, Group>(&mut slot) {
            return Self::erk(group);
        }
        if let Some(shared) = take::<E, Arc<dyn Erkable>>(&mut slot) {
            return Self::from_erkable(shared);
        }

        match slot {
            Some(error) => Self(Repr::Foreign {
                error: Arc::new(error),
                type_id: TypeId::of::<E>(),
                type_name: std::any::type_name::<E>(),
            }),
            None => unreachable!("the slot is only emptied by a successful take"),
        }
    }

    /// Wrap a custom [`Erkable`].
    pub fn erk<E: Erkable>(error: E) -> Self {
        Self(Repr::Erk(Arc::new(error)))
    }

    pub fn from_erkable(error: Arc<dyn Erkable>) -> Self {
        Self(Repr::Erk(error))
    }

    /// A plain error holding only `message`.
    pub fn msg(message: impl Into<String>) -> Self {
        Self::new(StringError::new(message))
    }

    pub fn as_erkable(&self) -> Option<&dyn Erkable> {
        match &self.0 {
            Repr::Erk(error) => Some(&**error),
            Repr::Foreign { .. } => None,
        }
    }

    pub(crate) fn shared_erkable(&self) -> Option<&Arc<dyn Erkable>> {
        match &self.0 {
            Repr::Erk(error) => Some(error),
            Repr::Foreign { .. } => None,
        }
    }

    pub fn as_std_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
        match &self.0 {
            Repr::Erk(error) => (**error).as_std_error(),
            Repr::Foreign { error, .. } => &**error,
        }
    }

    pub fn downcast_ref<T: StdError + 'static>(&self) -> Option<&T> {
        match &self.0 {
            Repr::Erk(error) => (**error).as_any().downcast_ref::<T>(),
            Repr::Foreign { error, .. } => (**error).downcast_ref::<T>(),
        }
    }

    /// Returns true if the concrete error type is `T`.
    pub fn is<T: StdError + 'static>(&self) -> bool {
        self.downcast_ref::<T>().is_some()
    }

    pub fn concrete_type_id(&self) -> TypeId {
        match &self.0 {
            Repr::Erk(error) => (**error).as_any().type_id(),
            Repr::Foreign { type_id, .. } => *type_id,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match &self.0 {
            Repr::Erk(error) => (**error).type_name(),
            Repr::Foreign { type_name, .. } => *type_name,
        }
    }

    /// Returns true if both handles point at the same error.
    pub fn ptr_eq(&self, other: &AnyError) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> *const () {
        match &self.0 {
            Repr::Erk(error) => Arc::as_ptr(error) as *const (),
            Repr::Foreign { error, .. } => Arc::as_ptr(error) as *const (),
        }
    }

    /// The message rendered in `mode`.
    pub fn render(&self, mode: Mode) -> String {
        match &self.0 {
            Repr::Erk(error) => error.render(mode),
            Repr::Foreign { error, .. } => error.to_string(),
        }
    }

    /// The message rendered for nesting at `indent`, if the error supports it.
    pub fn render_indented(&self, indent: &str, mode: Mode) -> Option<String> {
        match &self.0 {
            Repr::Erk(error) => error.render_indented(indent, mode),
            Repr::Foreign { .. } => None,
        }
    }

    /// This error followed by everything it wraps, outermost first.
    pub(crate) fn chain(&self) -> Chain<'_> {
        Chain {
            next: Some(Hop::Handle(self)),
        }
    }
}

fn take<E: 'static, T: 'static>(slot: &mut Option<E>) -> Option<T> {
    (slot as &mut dyn Any).downcast_mut::<Option<T>>()?.take()
}

impl<E> From<E> for AnyError
where
    E: StdError + Send + Sync + 'static,
{
    fn from(error: E) -> Self {
        Self::new(error)
    }
}

impl fmt::Display for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Erk(error) => fmt::Display::fmt(&**error, f),
            Repr::Foreign { error, .. } => fmt::Display::fmt(&**error, f),
        }
    }
}

impl fmt::Debug for AnyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Repr::Erk(error) => fmt::Debug::fmt(&**error, f),
            Repr::Foreign { error, .. } => fmt::Debug::fmt(&**error, f),
        }
    }
}

/// One link of an error chain.
#[derive(Clone, Copy)]
pub(crate) enum Hop<'a> {
    /// An error held by a handle
    Handle(&'a AnyError),
    /// An error reached through `std::error::Error::source`
    Source(&'a (dyn StdError + 'static)),
}

impl<'a> Hop<'a> {
    pub(crate) fn erkable(self) -> Option<&'a dyn Erkable> {
        match self {
            Hop::Handle(handle) => handle.as_erkable(),
            Hop::Source(error) => known_erkable(error),
        }
    }

    /// A shared handle to the erk error at this link, if it is one.
    pub(crate) fn to_erkable(self) -> Option<Arc<dyn Erkable>> {
        match self {
            Hop::Handle(handle) => handle.shared_erkable().cloned(),
            Hop::Source(error) => {
                if let Some(error) = error.downcast_ref::<Error>() {
                    return Some(Arc::new(error.clone()));
                }
                error
                    .downcast_ref::<Group>()
                    .map(|group| Arc::new(group.clone()) as Arc<dyn Erkable>)
            }
        }
    }

    pub(crate) fn wrapped(self) -> Option<Hop<'a>> {
        match self {
            Hop::Handle(handle) => match &handle.0 {
                Repr::Erk(error) => error.wrapped().map(Hop::Handle),
                Repr::Foreign { error, .. } => error.source().map(Hop::Source),
            },
            Hop::Source(error) => match known_erkable(error) {
                Some(erkable) => erkable.wrapped().map(Hop::Handle),
                None => error.source().map(Hop::Source),
            },
        }
    }

    /// Returns true if this link is the very error held by `other`.
    ///
    /// A source stored first in its parent shares the parent's address, so
    /// the concrete type is compared too.
    pub(crate) fn is_same(self, other: &AnyError) -> bool {
        let (addr, type_id) = match self {
            Hop::Handle(handle) => (handle.addr(), Some(handle.concrete_type_id())),
            Hop::Source(error) => (
                error as *const (dyn StdError + 'static) as *const (),
                known_source_type(error).map(|(type_id, _)| type_id),
            ),
        };
        addr == other.addr() && type_id == Some(other.concrete_type_id())
    }

    pub(crate) fn type_name(self) -> &'static str {
        match self {
            Hop::Handle(handle) => handle.type_name(),
            Hop::Source(error) => source_type_name(error),
        }
    }

    /// `"<module path>:<TypeName>"` of the error at this link.
    pub(crate) fn type_tag(self) -> String {
        namespaced(self.type_name())
    }
}

impl fmt::Display for Hop<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hop::Handle(handle) => fmt::Display::fmt(handle, f),
            Hop::Source(error) => fmt::Display::fmt(error, f),
        }
    }
}

pub(crate) struct Chain<'a> {
    next: Option<Hop<'a>>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = Hop<'a>;

    fn next(&mut self) -> Option<Hop<'a>> {
        let hop = self.next.take()?;
        self.next = hop.wrapped();
        Some(hop)
    }
}

fn known_erkable<'a>(error: &'a (dyn StdError + 'static)) -> Option<&'a dyn Erkable> {
    if let Some(error) = error.downcast_ref::<Error>() {
        return Some(error);
    }
    error.downcast_ref::<Group>().map(|group| group as &dyn Erkable)
}

/// Borrowed sources have no recorded type, so only well-known ones are
/// identified.
fn known_source_type(error: &(dyn StdError + 'static)) -> Option<(TypeId, &'static str)> {
    fn identify<T: StdError + 'static>(error: &(dyn StdError + 'static)) -> Option<(TypeId, &'static str)> {
        error
            .is::<T>()
            .then(|| (TypeId::of::<T>(), std::any::type_name::<T>()))
    }

    identify::<StringError>(error)
        .or_else(|| identify::<std::io::Error>(error))
        .or_else(|| identify::<Error>(error))
        .or_else(|| identify::<Group>(error))
}

fn source_type_name(error: &(dyn StdError + 'static)) -> &'static str {
    known_source_type(error).map_or("std::error::Error", |(_, type_name)| type_name)
}
