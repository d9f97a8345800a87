//! Detached, serializable mirrors of erk errors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::any_error::Hop;
use crate::error::Error;
use crate::params::Params;
use crate::strict::Mode;

/// A read-only snapshot of an error, safe to serialize and mutate.
///
/// Errors export their chain of causes as `error_stack`, groups export
/// their members as `errors`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedError {
    pub kind: Option<String>,
    /// Type of the plain error this node was built from.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Params::is_empty")]
    pub params: Params,
    #[serde(rename = "errorStack", default, skip_serializing_if = "Vec::is_empty")]
    pub error_stack: Vec<ExportedError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ExportedError>>,
}

impl ExportedError {
    /// A node for an error with no kind or params.
    pub fn plain(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: None,
            type_name: Some(type_name.into()),
            message: message.into(),
            params: Params::new(),
            error_stack: Vec::new(),
            errors: None,
        }
    }

    /// The kind string, empty when there is no kind.
    pub fn kind_str(&self) -> &str {
        self.kind.as_deref().unwrap_or_default()
    }

    pub fn is_group(&self) -> bool {
        self.errors.is_some()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

impl fmt::Display for ExportedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Export one link of a cause chain on its own. Plain errors become
/// kind-less nodes tagged with their type.
pub(crate) fn export_hop(hop: Hop<'_>, mode: Mode) -> ExportedError {
    match hop.erkable() {
        Some(erkable) => match erkable.as_any().downcast_ref::<Error>() {
            Some(error) => error.export_entry(mode),
            None => erkable.export_with(mode),
        },
        None => ExportedError::plain(hop.type_tag(), hop.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::any_error::AnyError;
    use crate::kind::Kind;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone)]
    struct Example;

    impl Kind for Example {}

    #[test]
    fn test_json_shape() {
        let exported = ExportedError {
            kind: Some("my:Kind".to_string()),
            type_name: None,
            message: "my message".to_string(),
            params: Params::from([("a", 1)]),
            error_stack: vec![ExportedError::plain("std::io::error:Error", "cause")],
            errors: None,
        };

        assert_eq!(
            exported.to_json().unwrap(),
            r#"{"kind":"my:Kind","message":"my message","params":{"a":1},"errorStack":[{"kind":null,"type":"std::io::error:Error","message":"cause"}]}"#
        );
    }

    #[test]
    fn test_empty_fields_are_skipped() {
        let exported = ExportedError {
            kind: None,
            type_name: None,
            message: "bare".to_string(),
            params: Params::new(),
            error_stack: Vec::new(),
            errors: Some(Vec::new()),
        };

        assert_eq!(exported.to_json().unwrap(), r#"{"kind":null,"message":"bare","errors":[]}"#);
        assert!(exported.is_group());
        assert_eq!(exported.kind_str(), "");
    }

    #[test]
    fn test_from_json() {
        let exported = ExportedError::from_json(
            r#"{"kind":"my:Kind","message":"m","params":{"a":"b"},"errorStack":[{"kind":null,"type":"t","message":"c"}]}"#,
        )
        .unwrap();

        assert_eq!(exported.kind_str(), "my:Kind");
        assert_eq!(exported.params, Params::from([("a", "b")]));
        assert_eq!(exported.error_stack, vec![ExportedError::plain("t", "c")]);
        assert_eq!(exported.errors, None);
    }

    #[test]
    fn test_export_is_detached() {
        let err = Error::new(Example, "my message: {{.a}}").with_param("a", "one");
        let mut exported = err.export_with(Mode::Strict);
        exported.params.insert("a", "two");
        exported.message.push('!');

        assert_eq!(err.params(), Params::from([("a", "one")]));
        assert_eq!(err.render(Mode::Strict), "my message: one");
    }

    #[test]
    fn test_error_params_are_exported_as_text() {
        let err = Error::new(Example, "my message")
            .with_param("other", AnyError::msg("other error"))
            .wrap_as(AnyError::msg("cause"));

        let exported = err.export_with(Mode::Strict);
        assert_eq!(exported.params, Params::from([("other", "other error")]));
        assert_eq!(
            exported.error_stack,
            vec![ExportedError::plain("erk::string_error:StringError", "cause")]
        );
    }
}
