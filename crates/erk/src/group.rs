//! Error groups: a header error with an ordered list of member errors.
//!
//! A group renders its header followed by one line per member, each nested
//! group indented two spaces deeper than the one holding it:
//!
//! ```text
//! batch failed:
//!  - e1
//!  - nested:
//!    - e2
//! ```

use std::fmt;
use std::sync::Arc;

use serde::ser::{Serialize, Serializer};

use crate::any_error::{AnyError, Erkable, Hop};
use crate::error::Error;
use crate::export::ExportedError;
use crate::helpers;
use crate::isa;
use crate::kind::Kind;
use crate::params::{INDENT_SPACES, Params};
use crate::strict::Mode;

/// Indent used for a top-level group.
const DEFAULT_INDENT: &str = " ";

/// Errors that hold a header and a list of member errors.
pub trait Groupable {
    fn header(&self) -> &AnyError;

    /// A copy of the members.
    fn errors(&self) -> Vec<AnyError>;

    /// A new group with `errors` appended.
    fn append_errors(&self, errors: Vec<AnyError>) -> AnyError;
}

/// A header error plus member errors.
///
/// Groups are copy-on-write: [`Group::append`] and `with_params` return new
/// groups and share everything they did not change.
#[derive(Clone)]
pub struct Group {
    header: AnyError,
    errors: Arc<Vec<AnyError>>,
}

impl Group {
    /// Create a group whose header is a new error. `None` members are skipped.
    pub fn new<K, I>(kind: K, message: impl Into<String>, members: I) -> Self
    where
        K: Kind,
        I: IntoIterator,
        I::Item: Into<Option<AnyError>>,
    {
        Self::new_as(Error::new(kind, message), members)
    }

    /// Create a group with a pre-built header.
    pub fn new_as<I>(header: impl Into<AnyError>, members: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<AnyError>>,
    {
        Self {
            header: header.into(),
            errors: Arc::new(members.into_iter().filter_map(Into::into).collect()),
        }
    }

    pub fn header(&self) -> &AnyError {
        &self.header
    }

    /// A new group with `members` appended. `None` members are skipped.
    pub fn append<I>(&self, members: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<AnyError>>,
    {
        let mut errors = Vec::clone(&self.errors);
        errors.extend(members.into_iter().filter_map(Into::into));
        Self {
            header: self.header.clone(),
            errors: Arc::new(errors),
        }
    }

    /// A copy of the members.
    pub fn errors(&self) -> Vec<AnyError> {
        Vec::clone(&self.errors)
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn render(&self, mode: Mode) -> String {
        self.render_indented(DEFAULT_INDENT, mode)
    }

    /// Render the header and one `"- member"` line per member at `indent`.
    pub fn render_indented(&self, indent: &str, mode: Mode) -> String {
        let indent = if indent.is_empty() { DEFAULT_INDENT } else { indent };
        let mut text = self.header.render(mode);

        if !self.errors.is_empty() && !text.ends_with(':') {
            text.push(':');
        }

        let nested = format!("{indent}{INDENT_SPACES}");
        for member in self.errors.iter() {
            let member_text = member
                .render_indented(&nested, mode)
                .unwrap_or_else(|| member.render(mode));
            text.push('\n');
            text.push_str(indent);
            text.push_str("- ");
            text.push_str(&member_text);
        }

        text
    }

    pub fn export(&self) -> ExportedError {
        self.export_with(Mode::ambient())
    }

    /// The header's export plus one exported node per member.
    pub fn export_with(&self, mode: Mode) -> ExportedError {
        let mut exported = helpers::export_with(&self.header, mode);
        exported.errors = Some(
            self.errors
                .iter()
                .map(|member| helpers::export_with(member, mode))
                .collect(),
        );
        exported
    }

    fn header_erkable(&self) -> Option<&dyn Erkable> {
        self.header.chain().find_map(Hop::erkable)
    }
}

impl Groupable for Group {
    fn header(&self) -> &AnyError {
        &self.header
    }

    fn errors(&self) -> Vec<AnyError> {
        Group::errors(self)
    }

    fn append_errors(&self, errors: Vec<AnyError>) -> AnyError {
        AnyError::new(self.append(errors))
    }
}

impl Erkable for Group {
    fn kind(&self) -> Option<Box<dyn Kind>> {
        self.header_erkable().and_then(Erkable::kind)
    }

    fn params(&self) -> Params {
        self.header_erkable().map(Erkable::params).unwrap_or_default()
    }

    /// Only the header changes, the members are shared.
    fn with_params(&self, params: Params) -> AnyError {
        AnyError::new(Group {
            header: helpers::with_params(&self.header, params),
            errors: Arc::clone(&self.errors),
        })
    }

    fn export_raw_message(&self) -> String {
        self.header_erkable()
            .map(Erkable::export_raw_message)
            .unwrap_or_else(|| self.header.to_string())
    }

    fn export_with(&self, mode: Mode) -> ExportedError {
        Group::export_with(self, mode)
    }

    fn render(&self, mode: Mode) -> String {
        Group::render(self, mode)
    }

    fn render_indented(&self, indent: &str, mode: Mode) -> Option<String> {
        Some(Group::render_indented(self, indent, mode))
    }

    fn is(&self, target: &AnyError, mode: Mode) -> bool {
        isa::is_with(&self.header, target, mode)
            || self.errors.iter().any(|member| isa::is_with(member, target, mode))
    }

    fn as_groupable(&self) -> Option<&dyn Groupable> {
        Some(self)
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render(Mode::ambient()))
    }
}

impl fmt::Debug for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Group")?;
        writeln!(f)?;
        writeln!(f, "    Header: {:?}", self.header)?;
        if !self.errors.is_empty() {
            writeln!(f)?;
            writeln!(f, "    Errors:")?;
            for member in self.errors.iter() {
                writeln!(f, "        - {:?}", member)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for Group {}

impl Serialize for Group {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.export().serialize(serializer)
    }
}

fn groupable_in(err: &AnyError) -> Option<&dyn Groupable> {
    err.chain().find_map(|hop| hop.erkable()?.as_groupable())
}

/// Append `members` to the first group in `err`'s chain. Without a group,
/// `err` is returned unchanged.
pub fn append<I>(err: &AnyError, members: I) -> AnyError
where
    I: IntoIterator,
    I::Item: Into<Option<AnyError>>,
{
    match groupable_in(err) {
        Some(group) => group.append_errors(members.into_iter().filter_map(Into::into).collect()),
        None => err.clone(),
    }
}

/// The members of the first group in `err`'s chain.
pub fn get_errors(err: &AnyError) -> Option<Vec<AnyError>> {
    groupable_in(err).map(Groupable::errors)
}

/// Returns true if `err`'s chain holds a group with at least one member.
pub fn any(err: &AnyError) -> bool {
    get_errors(err).is_some_and(|errors| !errors.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParamValue;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone)]
    struct Example;

    impl Kind for Example {}

    #[derive(Debug, Clone)]
    struct Other;

    impl Kind for Other {}

    fn msg(message: &str) -> AnyError {
        AnyError::msg(message)
    }

    #[test]
    fn test_render_members() {
        let group = Group::new(Example, "batch failed", [msg("e1"), msg("e2")]);
        assert_eq!(group.render(Mode::Strict), "batch failed:\n - e1\n - e2");
    }

    #[test]
    fn test_render_without_members() {
        let group = Group::new(Example, "batch failed", Vec::<AnyError>::new());
        assert_eq!(group.render(Mode::Strict), "batch failed");
    }

    #[test]
    fn test_existing_colon_is_kept() {
        let group = Group::new(Example, "batch failed:", [msg("e1")]);
        assert_eq!(group.render(Mode::Strict), "batch failed:\n - e1");
    }

    #[test]
    fn test_nested_groups() {
        let deeply = Group::new(
            Example,
            "deeply nested",
            [msg("ergNested2 err1"), msg("ergNested2 err2")],
        );
        let nested = Group::new(Example, "nested", [msg("ergNested1 err1"), AnyError::new(deeply)]);
        let group = Group::new(Example, "my message", [msg("err1"), AnyError::new(nested), msg("err2")]);

        assert_eq!(
            group.render(Mode::Strict),
            "my message:\n - err1\n - nested:\n   - ergNested1 err1\n   - deeply nested:\n     - ergNested2 err1\n     - ergNested2 err2\n - err2"
        );
    }

    #[test]
    fn test_none_members_are_skipped() {
        let group = Group::new(Example, "batch failed", [Some(msg("e1")), None, Some(msg("e2"))]);
        assert_eq!(group.len(), 2);

        let appended = group.append([None, Some(msg("e3"))]);
        assert_eq!(appended.len(), 3);
    }

    #[test]
    fn test_append_is_copy_on_write() {
        let group = Group::new(Example, "batch failed", [msg("e1")]);
        let appended = group.append([msg("e2")]);

        assert_eq!(group.render(Mode::Strict), "batch failed:\n - e1");
        assert_eq!(appended.render(Mode::Strict), "batch failed:\n - e1\n - e2");
        assert!(appended.header().ptr_eq(group.header()));
    }

    #[test]
    fn test_errors_is_a_copy() {
        let group = Group::new(Example, "batch failed", [msg("e1")]);
        let mut errors = group.errors();
        errors.push(msg("e2"));
        assert_eq!(group.len(), 1);
    }

    #[test]
    fn test_with_params_changes_only_the_header() {
        let group = Group::new(Example, "batch {{.name}} failed", [msg("e1")]).with_params(Params::from([("name", "one")]));
        let group = group.as_erkable().unwrap();

        assert_eq!(group.render(Mode::Strict), "batch one failed:\n - e1");
        assert_eq!(group.params(), Params::from([("name", "one")]));
        assert!(group.kind().unwrap().is::<Example>());

        let removed = group.with_params(Params::from([("name", ParamValue::NIL)]));
        assert!(removed.as_erkable().unwrap().params().is_empty());
    }

    #[test]
    fn test_is_matches_header_and_members() {
        let member = Error::new(Other, "member");
        let nested = Group::new(Example, "nested", [AnyError::new(member.clone())]);
        let group = Group::new(Example, "outer", [msg("e1"), AnyError::new(nested)]);

        assert!(Erkable::is(&group, &AnyError::new(Error::new(Other, "member")), Mode::Strict));
        assert!(Erkable::is(&group, &AnyError::new(Error::new(Example, "outer")), Mode::Strict));
        assert!(!Erkable::is(&group, &AnyError::new(Error::new(Example, "member")), Mode::Strict));
    }

    #[test]
    fn test_export() {
        let group = Group::new(Example, "batch failed", [msg("e1"), AnyError::new(Error::new(Other, "e2"))]);
        let exported = group.export_with(Mode::Strict);

        assert_eq!(exported.message, "batch failed");
        assert_eq!(exported.kind.as_deref(), Some(concat!(module_path!(), ":Example")));

        let members = exported.errors.unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0], ExportedError::plain("erk::string_error:StringError", "e1"));
        assert_eq!(members[1].message, "e2");
        assert_eq!(members[1].kind.as_deref(), Some(concat!(module_path!(), ":Other")));
    }

    #[test]
    fn test_free_functions() {
        let group = AnyError::new(Group::new(Example, "batch failed", Vec::<AnyError>::new()));
        assert!(!any(&group));
        assert_eq!(get_errors(&group).map(|errors| errors.len()), Some(0));

        let appended = append(&group, [msg("e1")]);
        assert!(any(&appended));
        assert_eq!(appended.render(Mode::Strict), "batch failed:\n - e1");

        let plain = msg("plain");
        assert!(append(&plain, [msg("e1")]).ptr_eq(&plain));
        assert!(get_errors(&plain).is_none());
        assert!(!any(&plain));
    }
}
