//! Matching errors against targets.

use crate::any_error::AnyError;
use crate::strict::Mode;
use crate::string_error::StringError;

/// Returns true if any error in `err`'s chain is `target` or matches it.
pub fn is(err: &AnyError, target: &AnyError) -> bool {
    is_with(err, target, Mode::ambient())
}

pub fn is_with(err: &AnyError, target: &AnyError, mode: Mode) -> bool {
    err.chain()
        .any(|hop| hop.is_same(target) || hop.erkable().is_some_and(|erkable| erkable.is(target, mode)))
}

/// Like [`is`], but also true when both errors have the same concrete type.
///
/// The type fallback is skipped for string errors since every message-only
/// error shares that type.
pub fn is_a(err: &AnyError, target: &AnyError) -> bool {
    if is(err, target) {
        return true;
    }
    !is_a_string_error(target) && err.concrete_type_id() == target.concrete_type_id()
}

/// Returns true if `err` is exactly a [`StringError`].
pub fn is_a_string_error(err: &AnyError) -> bool {
    err.is::<StringError>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::kind::Kind;

    #[derive(Debug, Clone)]
    struct Example;

    impl Kind for Example {}

    #[test]
    fn test_is_identity() {
        let err = AnyError::msg("plain");
        assert!(is(&err, &err.clone()));
        assert!(!is(&err, &AnyError::msg("plain")));
    }

    #[test]
    fn test_is_through_wrappers() {
        let root = AnyError::msg("root");
        let wrapped = AnyError::new(Error::wrap(Example, "outer: {{.err}}", root.clone()));
        assert!(is(&wrapped, &root));
        assert!(!is(&root, &wrapped));
    }

    #[test]
    fn test_is_erk_errors_by_kind_and_message() {
        let err = AnyError::new(Error::new(Example, "my message").with_param("a", 1));
        assert!(is(&err, &AnyError::new(Error::new(Example, "my message"))));
        assert!(!is(&err, &AnyError::new(Error::without_kind("my message"))));
    }

    #[test]
    fn test_is_a() {
        let io = AnyError::from(std::io::Error::other("a"));
        assert!(is_a(&io, &AnyError::from(std::io::Error::other("b"))));

        let plain = AnyError::msg("a");
        assert!(!is_a(&plain, &AnyError::msg("b")));
        assert!(is_a(&plain, &plain.clone()));

        let erk = AnyError::new(Error::new(Example, "one"));
        assert!(is_a(&erk, &AnyError::new(Error::new(Example, "two"))));
    }

    #[test]
    fn test_is_a_string_error() {
        assert!(is_a_string_error(&AnyError::msg("a")));
        assert!(!is_a_string_error(&AnyError::from(std::io::Error::other("a"))));
        assert!(!is_a_string_error(&AnyError::new(Error::without_kind("a"))));
    }
}
