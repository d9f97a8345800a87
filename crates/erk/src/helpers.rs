//! Free functions that work on any error handle.
//!
//! They look through the error chain for the first erk error, so plain
//! errors wrapping erk errors behave like the erk errors they wrap.

use std::sync::Arc;

use crate::any_error::{AnyError, Erkable, Hop};
use crate::error::Error;
use crate::export::ExportedError;
use crate::kind::{Kind, kind_string_for, same_kind_type};
use crate::params::{CAUSE_KEY, ParamValue, Params};
use crate::strict::Mode;

fn first_erkable(err: &AnyError) -> Option<&dyn Erkable> {
    err.chain().find_map(Hop::erkable)
}

/// The kind of the first erk error in the chain.
pub fn get_kind(err: &AnyError) -> Option<Box<dyn Kind>> {
    first_erkable(err).and_then(Erkable::kind)
}

pub fn get_kind_string(err: &AnyError) -> String {
    kind_string_for(get_kind(err).as_deref())
}

/// Returns true if the error's kind has the same type as `kind`. `None`
/// matches errors without a kind.
pub fn is_kind(err: &AnyError, kind: Option<&dyn Kind>) -> bool {
    same_kind_type(get_kind(err).as_deref(), kind)
}

pub fn is_kind_of<K: Kind>(err: &AnyError) -> bool {
    get_kind(err).is_some_and(|kind| kind.is::<K>())
}

/// A copy of the params of the first erk error in the chain.
pub fn get_params(err: &AnyError) -> Params {
    first_erkable(err).map(Erkable::params).unwrap_or_default()
}

/// The first erk error in the chain, or a kind-less wrapper around `err`.
///
/// The wrapper's message is the text of `err` used verbatim, and `err` stays
/// reachable as its cause.
pub fn to_erk(err: &AnyError) -> Arc<dyn Erkable> {
    if let Some(erkable) = err.chain().find_map(Hop::to_erkable) {
        return erkable;
    }

    tracing::trace!(error = %err, "wrapping a plain error");
    Arc::new(Error::from_plain(err.clone()))
}

/// `err` with `params` merged in. Plain errors are converted with [`to_erk`].
pub fn with_params(err: &AnyError, params: Params) -> AnyError {
    if params.is_empty() {
        return err.clone();
    }
    to_erk(err).with_params(params)
}

pub fn with_param(err: &AnyError, key: impl Into<String>, value: impl Into<ParamValue>) -> AnyError {
    with_params(err, Params::new().with(key, value))
}

/// A new error of `kind` wrapping `cause`.
pub fn wrap<K: Kind>(kind: K, message: impl Into<String>, cause: impl Into<AnyError>) -> Error {
    Error::wrap(kind, message, cause)
}

/// `err` with `cause` stored under [`CAUSE_KEY`].
pub fn wrap_as(err: &AnyError, cause: impl Into<AnyError>) -> AnyError {
    with_param(err, CAUSE_KEY, ParamValue::Error(cause.into()))
}

pub fn wrap_with(err: &AnyError, cause: impl Into<AnyError>, params: Params) -> AnyError {
    with_params(&wrap_as(err, cause), params)
}

pub fn export(err: &AnyError) -> ExportedError {
    export_with(err, Mode::ambient())
}

pub fn export_with(err: &AnyError, mode: Mode) -> ExportedError {
    to_erk(err).export_with(mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::Group;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone)]
    struct Example;

    impl Kind for Example {}

    #[derive(Debug, Clone)]
    struct Other;

    impl Kind for Other {}

    #[test]
    fn test_get_kind() {
        let err = AnyError::new(Error::new(Example, "my message"));
        assert!(get_kind(&err).unwrap().is::<Example>());
        assert_eq!(get_kind_string(&err), concat!(module_path!(), ":Example"));

        let plain = AnyError::msg("plain");
        assert!(get_kind(&plain).is_none());
        assert_eq!(get_kind_string(&plain), "");
    }

    #[test]
    fn test_is_kind() {
        let err = AnyError::new(Error::new(Example, "my message"));
        assert!(is_kind(&err, Some(&Example as &dyn Kind)));
        assert!(!is_kind(&err, Some(&Other as &dyn Kind)));
        assert!(!is_kind(&err, None));
        assert!(is_kind_of::<Example>(&err));

        let plain = AnyError::msg("plain");
        assert!(is_kind(&plain, None));
        assert!(!is_kind_of::<Example>(&plain));
    }

    #[test]
    fn test_group_kind_comes_from_header() {
        let group = AnyError::new(Group::new(Example, "batch", [AnyError::msg("e1")]));
        assert!(is_kind_of::<Example>(&group));
    }

    #[test]
    fn test_get_params() {
        let err = AnyError::new(Error::new(Example, "{{.a}}").with_param("a", "x"));
        assert_eq!(get_params(&err), Params::from([("a", "x")]));
        assert!(get_params(&AnyError::msg("plain")).is_empty());
    }

    #[test]
    fn test_with_params_on_plain_error() {
        let plain = AnyError::msg("plain {{.a}}");
        let err = with_param(&plain, "a", 1);

        assert_eq!(err.render(Mode::Strict), "plain {{.a}}");
        assert_eq!(get_params(&err).get("a"), Some(&ParamValue::from(1)));
        assert!(get_params(&err).get(CAUSE_KEY).unwrap().as_error().unwrap().ptr_eq(&plain));
    }

    #[test]
    fn test_with_no_params_is_unchanged() {
        let plain = AnyError::msg("plain");
        assert!(with_params(&plain, Params::new()).ptr_eq(&plain));
    }

    #[test]
    fn test_to_erk_finds_first_erk_error() {
        let err = AnyError::new(Error::new(Example, "my message"));
        let erk = to_erk(&err);
        assert_eq!(erk.export_raw_message(), "my message");
        assert!(erk.kind().unwrap().is::<Example>());

        let plain = to_erk(&AnyError::msg("plain"));
        assert!(plain.kind().is_none());
        assert_eq!(plain.render(Mode::Strict), "plain");
    }

    #[test]
    fn test_wrap_helpers() {
        let err = AnyError::new(Error::new(Example, "failed {{.name}}: {{.err}}"));
        let cause = AnyError::msg("cause");

        let wrapped = wrap_as(&err, cause.clone());
        assert_eq!(wrapped.render(Mode::Lenient), "failed <no value>: cause");

        let wrapped = wrap_with(&err, cause.clone(), Params::from([("name", "x")]));
        assert_eq!(wrapped.render(Mode::Strict), "failed x: cause");

        let wrapped = wrap(Other, "other: {{.err}}", cause);
        assert_eq!(wrapped.render(Mode::Strict), "other: cause");
    }

    #[test]
    fn test_export_plain_error() {
        let exported = export_with(&AnyError::msg("original error"), Mode::Strict);
        assert_eq!(
            serde_json::to_string(&exported).unwrap(),
            r#"{"kind":null,"type":"erk::string_error:StringError","message":"original error"}"#
        );
    }
}
