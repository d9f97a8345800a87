//! The erk error: a kind, a message template and params.

use std::fmt;

use serde::ser::{Serialize, Serializer};

use crate::any_error::{AnyError, Erkable};
use crate::export::{ExportedError, export_hop};
use crate::kind::{Kind, kind_string_for, namespaced, same_kind_type};
use crate::params::{CAUSE_KEY, ParamValue, Params};
use crate::strict::{self, Mode, is_strict_mode};
use crate::template::{MissingKey, Template, TemplateError, TemplateFuncs};

/// An error with a kind, a templated message and params.
///
/// Errors are immutable: every `with_*` method returns a new error and
/// leaves the receiver untouched. The message is a template rendered
/// against the params each time the error is displayed.
///
/// ```rust
/// use erk::{Error, Kind};
///
/// #[derive(Debug, Clone)]
/// struct NotFound;
///
/// impl Kind for NotFound {}
///
/// let err = Error::new(NotFound, "file not found: {{.path}}").with_param("path", "/tmp/x");
/// assert_eq!(err.to_string(), "file not found: /tmp/x");
/// ```
#[derive(Clone)]
pub struct Error {
    kind: Option<Box<dyn Kind>>,
    message: String,
    params: Params,
    origin: Option<AnyError>,
}

impl Error {
    /// Create a new error with the given kind and message template.
    ///
    /// # Panics
    /// Panics in strict mode if the template does not parse.
    pub fn new<K: Kind>(kind: K, message: impl Into<String>) -> Self {
        Self::from_parts(Some(Box::new(kind)), message)
    }

    /// Create a new error with a kind, a message template and params.
    pub fn new_with<K: Kind>(kind: K, message: impl Into<String>, params: Params) -> Self {
        Self::new(kind, message).with_params(params)
    }

    /// Create a new error without a kind.
    pub fn without_kind(message: impl Into<String>) -> Self {
        Self::from_parts(None, message)
    }

    /// Create a new error from an optional boxed kind.
    pub fn from_parts(kind: Option<Box<dyn Kind>>, message: impl Into<String>) -> Self {
        let error = Self {
            kind,
            message: message.into(),
            params: Params::new(),
            origin: None,
        };

        if is_strict_mode() {
            if let Err(failure) = error.validate() {
                strict::raise(&error.kind_string(), &error.message, None, &failure);
            }
        }

        error
    }

    /// Stand-in for a plain error. Its message is the plain error's text,
    /// used verbatim.
    pub(crate) fn from_plain(origin: AnyError) -> Self {
        Self {
            kind: None,
            message: origin.to_string(),
            params: Params::new().with(CAUSE_KEY, origin.clone()),
            origin: Some(origin),
        }
    }

    /// Create a new error wrapping `cause`.
    pub fn wrap<K: Kind>(kind: K, message: impl Into<String>, cause: impl Into<AnyError>) -> Self {
        Self::new(kind, message).wrap_as(cause)
    }

    /// A copy of this error wrapping `cause`, stored under [`CAUSE_KEY`].
    pub fn wrap_as(&self, cause: impl Into<AnyError>) -> Self {
        self.with_param(CAUSE_KEY, ParamValue::Error(cause.into()))
    }

    /// A copy of this error wrapping `cause` with extra params.
    pub fn wrap_with(&self, cause: impl Into<AnyError>, params: Params) -> Self {
        self.wrap_as(cause).with_params(params)
    }

    /// A copy of this error with `params` merged in. Nil values delete keys.
    pub fn with_params(&self, params: Params) -> Self {
        let mut error = self.clone();
        if !params.is_empty() {
            error.params.apply(params);
        }
        error
    }

    pub fn with_param(&self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.with_params(Params::new().with(key, value))
    }

    pub fn without_param(&self, key: impl Into<String>) -> Self {
        self.with_params(Params::new().with(key, ParamValue::NIL))
    }

    /// A copy of this error with a different kind.
    pub fn with_kind<K: Kind>(&self, kind: K) -> Self {
        let mut error = self.clone();
        error.kind = Some(Box::new(kind));
        error
    }

    /// A copy of the kind.
    pub fn kind(&self) -> Option<Box<dyn Kind>> {
        self.kind.clone()
    }

    pub(crate) fn kind_ref(&self) -> Option<&dyn Kind> {
        self.kind.as_deref()
    }

    /// The kind string, empty when there is no kind.
    pub fn kind_string(&self) -> String {
        kind_string_for(self.kind_ref())
    }

    /// A copy of the params.
    pub fn params(&self) -> Params {
        self.params.clone()
    }

    /// The message template, unrendered.
    pub fn raw_message(&self) -> &str {
        &self.message
    }

    /// The wrapped cause, if the cause param holds an error.
    pub fn wrapped(&self) -> Option<&AnyError> {
        self.params.get(CAUSE_KEY).and_then(ParamValue::as_error)
    }

    /// The plain error this error was converted from, see [`crate::to_erk`].
    pub fn origin(&self) -> Option<&AnyError> {
        self.origin.as_ref()
    }

    pub fn template_funcs(&self) -> TemplateFuncs {
        self.kind
            .as_ref()
            .map(|kind| kind.template_funcs())
            .unwrap_or_else(TemplateFuncs::builtin)
    }

    /// Check that the message template parses.
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.origin.is_some() {
            return Ok(());
        }
        Template::parse(&self.message, &self.template_funcs()).map(|_| ())
    }

    /// Render the message.
    ///
    /// # Panics
    /// Panics in strict mode if the template fails to parse or execute.
    pub fn render(&self, mode: Mode) -> String {
        self.render_indented("", mode)
    }

    /// Render the message as nested at `indent`.
    ///
    /// A multi-line cause that cannot indent itself starts on a new line and
    /// every one of its lines is indented one level past `indent`.
    pub fn render_indented(&self, indent: &str, mode: Mode) -> String {
        if self.origin.is_some() {
            return self.message.clone();
        }

        let template = match Template::parse(&self.message, &self.template_funcs()) {
            Ok(template) => template,
            Err(failure) => return self.fall_back(&failure, None, mode),
        };

        let prepared = self.params.prepared(indent, mode);
        match template.execute(&prepared, missing_key(mode)) {
            Ok(text) => text,
            Err(failure) => self.fall_back(&failure, Some(&prepared), mode),
        }
    }

    fn fall_back(&self, failure: &TemplateError, params: Option<&Params>, mode: Mode) -> String {
        if mode.is_strict() {
            strict::raise(&self.kind_string(), &self.message, params, failure);
        }

        tracing::debug!(
            kind = %self.kind_string(),
            template = %self.message,
            error = %failure,
            "error template failed, using the raw template"
        );
        self.message.clone()
    }

    /// Returns true if the first erk error in `target`'s chain has the same
    /// kind type and the same raw message. Rendered text is not compared.
    ///
    /// In strict mode the receiver is rendered first, so invalid templates
    /// panic even when nothing matches.
    pub fn matches(&self, target: &AnyError, mode: Mode) -> bool {
        if mode.is_strict() {
            let _ = self.render(mode);
        }

        let other = target
            .chain()
            .find_map(|hop| hop.erkable()?.as_any().downcast_ref::<Error>());

        match other {
            Some(other) => same_kind_type(self.kind_ref(), other.kind_ref()) && self.message == other.message,
            None => false,
        }
    }

    /// Export using the ambient mode.
    pub fn export(&self) -> ExportedError {
        self.export_with(Mode::ambient())
    }

    /// Export this error and its chain of causes.
    pub fn export_with(&self, mode: Mode) -> ExportedError {
        let mut exported = self.export_entry(mode);
        exported.error_stack = self.error_stack(mode);
        exported
    }

    /// This error alone, without its causes.
    pub(crate) fn export_entry(&self, mode: Mode) -> ExportedError {
        ExportedError {
            kind: self.kind.as_ref().map(|kind| kind.kind_string()),
            type_name: self.origin.as_ref().map(|origin| namespaced(origin.type_name())),
            message: self.render(mode),
            params: self.params.exported(mode),
            error_stack: Vec::new(),
            errors: None,
        }
    }

    fn error_stack(&self, mode: Mode) -> Vec<ExportedError> {
        let Some(cause) = self.wrapped() else {
            return Vec::new();
        };

        // A converted plain error is this error itself, only its causes count.
        let skip = usize::from(self.origin.as_ref().is_some_and(|origin| cause.ptr_eq(origin)));
        cause.chain().skip(skip).map(|hop| export_hop(hop, mode)).collect()
    }
}

fn missing_key(mode: Mode) -> MissingKey {
    match mode {
        Mode::Strict => MissingKey::Error,
        Mode::Lenient => MissingKey::NoValue,
    }
}

impl Erkable for Error {
    fn kind(&self) -> Option<Box<dyn Kind>> {
        self.kind.clone()
    }

    fn params(&self) -> Params {
        self.params.clone()
    }

    fn with_params(&self, params: Params) -> AnyError {
        AnyError::new(Error::with_params(self, params))
    }

    fn export_raw_message(&self) -> String {
        self.message.clone()
    }

    fn export_with(&self, mode: Mode) -> ExportedError {
        Error::export_with(self, mode)
    }

    fn render(&self, mode: Mode) -> String {
        Error::render(self, mode)
    }

    fn render_indented(&self, indent: &str, mode: Mode) -> Option<String> {
        Some(Error::render_indented(self, indent, mode))
    }

    fn wrapped(&self) -> Option<&AnyError> {
        Error::wrapped(self)
    }

    fn is(&self, target: &AnyError, mode: Mode) -> bool {
        self.matches(target, mode)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Mode::ambient()))
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Some(kind) => writeln!(f, "{}", kind.kind_string())?,
            None => writeln!(f, "<no kind>")?,
        }

        writeln!(f)?;
        writeln!(f, "    Message: {}", self.message)?;

        let params: Vec<_> = self.params.iter().filter(|(key, _)| key.as_str() != CAUSE_KEY).collect();
        if !params.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Params:")?;
            for (key, value) in params {
                writeln!(f, "        {}: {:?}", key, value)?;
            }
        }

        if let Some(cause) = self.wrapped() {
            writeln!(f)?;
            writeln!(f, "    Cause: {:?}", cause)?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.wrapped()
            .map(|cause| cause.as_std_error() as &(dyn std::error::Error + 'static))
    }
}

impl Serialize for Error {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.export().serialize(serializer)
    }
}
