//! # erk
//!
//! Errors with kinds, templated messages, params and groups.
//!
//! ## Design Philosophy
//!
//! - **Kind**: Know what category of error occurred, as a type you own
//! - **Message template**: Describe the error once, fill in the details later
//! - **Params**: Keep the details as data, not only as text
//! - **Group**: Report many failures under one header
//! - **Export**: Hand a detached, serializable copy across a process boundary
//!
//! ## Usage
//!
//! ```rust
//! use erk::{AnyError, Error, Group, Kind};
//!
//! #[derive(Debug, Clone)]
//! struct ReadFailed;
//!
//! impl Kind for ReadFailed {}
//!
//! let cause = std::io::Error::other("permission denied");
//! let err = Error::wrap(ReadFailed, "cannot read {{.path}}: {{.err}}", cause)
//!     .with_param("path", "config.toml");
//! assert_eq!(err.to_string(), "cannot read config.toml: permission denied");
//!
//! let group = Group::new(ReadFailed, "cannot load config", [AnyError::from(err)]);
//! assert_eq!(
//!     group.to_string(),
//!     "cannot load config:\n - cannot read config.toml: permission denied"
//! );
//! ```
//!
//! Any `std::error::Error` converts into [`AnyError`], so `?` works with
//! [`Result`]:
//!
//! ```rust
//! fn port(text: &str) -> erk::Result<u16> {
//!     Ok(text.parse::<u16>()?)
//! }
//!
//! assert_eq!(port("http").unwrap_err().to_string(), "invalid digit found in string");
//! ```
//!
//! ## Principles
//!
//! - Errors are immutable, every `with_*` call returns a new error
//! - The wrapped cause lives in the `err` param and is rendered with `{{.err}}`
//! - Kinds are compared by type, never by value
//! - Strict mode turns broken templates into panics, see [`set_strict_mode`]

mod any_error;
mod error;
mod export;
pub mod group;
mod helpers;
mod isa;
mod kind;
mod params;
mod strict;
mod string_error;
pub mod template;

pub use any_error::{AnyError, Erkable, ErkableBase};
pub use error::Error;
pub use export::ExportedError;
pub use group::{Group, Groupable};
pub use helpers::{
    export, export_with, get_kind, get_kind_string, get_params, is_kind, is_kind_of, to_erk, with_param,
    with_params, wrap, wrap_as, wrap_with,
};
pub use isa::{is, is_a, is_a_string_error, is_with};
pub use kind::{Kind, KindBase, kind_string_for};
pub use params::{CAUSE_KEY, INDENT_SPACES, ParamValue, Params};
pub use strict::{Mode, STRICT_MODE_ENV, is_strict_mode, set_strict_mode, unset_strict_mode};
pub use string_error::StringError;
pub use template::{MissingKey, Template, TemplateError, TemplateErrorKind, TemplateFuncs};

/// Result type alias using [`AnyError`]
pub type Result<T> = std::result::Result<T, AnyError>;
