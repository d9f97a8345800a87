//! The process-wide strict mode gate.
//!
//! In strict mode an invalid message template panics as soon as it is
//! parsed or rendered. In lenient mode rendering falls back to the raw
//! template text.
//!
//! The gate is resolved once and memoized:
//!
//! 1. [`set_strict_mode`] wins until [`unset_strict_mode`] is called
//! 2. otherwise `ERK_STRICT=true` enables and any other value disables
//! 3. otherwise strict mode is on when running under a test harness

use std::path::Path;

use parking_lot::RwLock;
use strum_macros::{Display, EnumString, IntoStaticStr};

use crate::params::Params;
use crate::template::{TemplateError, TemplateErrorKind};

/// Environment variable that forces strict mode on (`true`) or off.
pub const STRICT_MODE_ENV: &str = "ERK_STRICT";

static STRICT_MODE: RwLock<Option<bool>> = parking_lot::const_rwlock(None);

/// How template failures are handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum Mode {
    /// Template failures panic
    Strict,
    /// Template failures render the raw template
    Lenient,
}

impl Mode {
    /// The mode selected by the process-wide gate.
    pub fn ambient() -> Self {
        Self::from_strict(is_strict_mode())
    }

    pub fn from_strict(strict: bool) -> Self {
        if strict { Mode::Strict } else { Mode::Lenient }
    }

    pub fn is_strict(self) -> bool {
        self == Mode::Strict
    }

    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}

/// Reports whether strict mode is enabled.
pub fn is_strict_mode() -> bool {
    if let Some(strict) = *STRICT_MODE.read() {
        return strict;
    }

    let mut gate = STRICT_MODE.write();
    if let Some(strict) = *gate {
        return strict;
    }
    let strict = detect_strict_mode();
    *gate = Some(strict);
    strict
}

/// Force strict mode on or off until [`unset_strict_mode`] is called.
pub fn set_strict_mode(enabled: bool) {
    tracing::trace!(enabled, "setting strict mode");
    *STRICT_MODE.write() = Some(enabled);
}

/// Forget the current setting so the next query detects it again.
pub fn unset_strict_mode() {
    tracing::trace!("unsetting strict mode");
    *STRICT_MODE.write() = None;
}

fn detect_strict_mode() -> bool {
    if let Ok(value) = std::env::var(STRICT_MODE_ENV) {
        return value == "true";
    }

    if running_under_test_harness() {
        tracing::warn!(
            "detected erk running in tests, so strict mode is enabled; set {}=false to disable it",
            STRICT_MODE_ENV
        );
        return true;
    }

    false
}

/// Test binaries built by cargo live in `target/<profile>/deps`.
fn running_under_test_harness() -> bool {
    if std::env::var_os("NEXTEST").is_some() {
        return true;
    }

    std::env::current_exe()
        .ok()
        .as_deref()
        .and_then(Path::parent)
        .and_then(Path::file_name)
        .is_some_and(|dir| dir == "deps")
}

const DISCLOSURE: &str = "NOTE: This message was raised because strict mode is enabled. \
Strict mode is automatically enabled in tests. \
To disable strict mode in tests, set the environment variable ERK_STRICT=false or use `erk::set_strict_mode(false)`. \
It is recommended to use strict mode for testing and development, to catch when an error message is invalid.";

const BANNER: &str = "*************************";

/// Builds the diagnostic raised when a template fails in strict mode.
pub(crate) fn failure_message(kind: &str, template: &str, params: Option<&Params>, error: &TemplateError) -> String {
    let headline = match error.kind() {
        TemplateErrorKind::ParseFailed => "Unable to parse error template",
        _ => "Unable to execute error template",
    };

    let mut message = format!("\n{BANNER}\n\n{headline}:\n\tKind: {kind}\n\tTemplate: {template}\n");
    if let Some(params) = params {
        message.push_str(&format!("\tParams: {params:?}\n"));
    }
    message.push_str(&format!("\tError: {error}\n\n{DISCLOSURE}\n\n{BANNER}\n"));
    message
}

/// Panics with the strict mode diagnostic.
pub(crate) fn raise(kind: &str, template: &str, params: Option<&Params>, error: &TemplateError) -> ! {
    panic!("{}", failure_message(kind, template, params, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{Template, TemplateFuncs};
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_set_and_unset() {
        set_strict_mode(true);
        assert!(is_strict_mode());
        assert_eq!(Mode::ambient(), Mode::Strict);

        set_strict_mode(false);
        assert!(!is_strict_mode());
        assert_eq!(Mode::ambient(), Mode::Lenient);

        unset_strict_mode();
        // Unit tests run from target/<profile>/deps.
        assert_eq!(is_strict_mode(), std::env::var(STRICT_MODE_ENV).map_or(true, |v| v == "true"));
    }

    #[test]
    #[serial]
    fn test_env_var_takes_precedence() {
        unsafe { std::env::set_var(STRICT_MODE_ENV, "false") };
        unset_strict_mode();
        assert!(!is_strict_mode());

        unsafe { std::env::set_var(STRICT_MODE_ENV, "true") };
        unset_strict_mode();
        assert!(is_strict_mode());

        unsafe { std::env::remove_var(STRICT_MODE_ENV) };
        unset_strict_mode();
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(Mode::Strict.to_string(), "strict");
        assert_eq!("lenient".parse::<Mode>().unwrap(), Mode::Lenient);
        assert_eq!(Mode::from_strict(true), Mode::Strict);
    }

    #[test]
    fn test_failure_message() {
        let error = Template::parse("my message {{}}}", &TemplateFuncs::builtin()).unwrap_err();
        let message = failure_message("my:Kind", "my message {{}}}", None, &error);

        assert!(message.starts_with("\n*************************\n\nUnable to parse error template:\n"));
        assert!(message.contains("\tKind: my:Kind\n\tTemplate: my message {{}}}\n\tError: "));
        assert!(message.contains("missing value for command\n\nNOTE: This message"));
        assert!(!message.contains("Params:"));
        assert!(message.ends_with("*************************\n"));
    }
}
