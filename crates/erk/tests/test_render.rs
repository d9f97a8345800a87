mod common;

use common::{Example, init_tracing, msg, with_strict_mode};
use erk::{AnyError, Error, Group, Kind, Mode, Params, TemplateFuncs};
use pretty_assertions::assert_eq;
use serial_test::serial;

#[test]
fn test_render_with_params() {
    init_tracing();
    let err = Error::new(Example, "my message: {{.a}}, {{.b}}!")
        .with_param("a", "hello")
        .with_param("b", "world");
    assert_eq!(err.to_string(), "my message: hello, world!");
}

#[test]
fn test_render_literal_values() {
    let err = Error::new(Example, "count={{.n}} ok={{.ok}} list={{.list}} str={{\"lit\"}}")
        .with_param("n", 3)
        .with_param("ok", true)
        .with_param("list", serde_json::json!([1, 2]));
    assert_eq!(err.to_string(), "count=3 ok=true list=[1,2] str=lit");
}

#[test]
fn test_builtin_helpers() {
    let err = Error::new(Example, "{{type .other}} {{type .a}} {{.a | inspect}}")
        .with_param("a", "hello")
        .with_param("other", std::io::Error::other("disk"));
    assert_eq!(err.to_string(), "std::io::error::Error string hello");
}

#[test]
fn test_nested_field_access() {
    let err = Error::new(Example, "user {{.user.name}}").with_param("user", serde_json::json!({"name": "ada"}));
    assert_eq!(err.to_string(), "user ada");
}

#[test]
fn test_kind_with_custom_helpers() {
    #[derive(Debug, Clone)]
    struct Shouting;

    impl Kind for Shouting {
        fn template_funcs(&self) -> TemplateFuncs {
            TemplateFuncs::builtin().with("upper", |args: &[erk::ParamValue]| match args {
                [value] => Ok(value.as_str().unwrap_or_default().to_uppercase().into()),
                _ => Err(format!("wrong number of args for upper: want 1 got {}", args.len())),
            })
        }
    }

    let err = Error::new(Shouting, "{{upper .a}}!").with_param("a", "stop");
    assert_eq!(err.to_string(), "STOP!");
}

fn parse_port(text: &str) -> erk::Result<u16> {
    let port = text
        .parse::<u16>()
        .map_err(|err| Error::wrap(Example, "bad port {{.text}}: {{.err}}", err).with_param("text", text))?;
    Ok(port)
}

#[test]
fn test_question_mark_converts_into_result() {
    assert_eq!(parse_port("8080").unwrap(), 8080);

    let err = parse_port("http").unwrap_err();
    assert_eq!(err.to_string(), "bad port http: invalid digit found in string");
    assert!(erk::is_kind_of::<Example>(&err));
}

#[test]
fn test_plain_multiline_cause_is_indented() {
    let err = Error::new(Example, "my message: {{.err}}").wrap_as(msg("a group:\n - item one\n - item two"));
    assert_eq!(err.to_string(), "my message: \n  a group:\n   - item one\n   - item two");
}

#[test]
fn test_group_cause_is_nested() {
    let group = Group::new(Example, "a group", [msg("item one"), msg("item two")]);
    let err = Error::wrap(Example, "my message: {{.err}}", group);
    assert_eq!(err.to_string(), "my message: a group:\n - item one\n - item two");
}

#[test]
fn test_error_in_group_with_multiline_cause() {
    let member = Error::new(Example, "member: {{.err}}").wrap_as(msg("line one\nline two"));
    let group = Group::new(Example, "batch", [AnyError::from(member)]);
    assert_eq!(group.to_string(), "batch:\n - member: \n     line one\n     line two");
}

#[test]
fn test_render_does_not_change_params() {
    let err = Error::new(Example, "{{.err}}").wrap_as(msg("a\nb"));
    let before = err.params();
    let _ = err.to_string();
    assert_eq!(err.params(), before);
    assert!(err.params().get(erk::CAUSE_KEY).unwrap().as_error().is_some());
}

#[serial]
#[test]
fn test_lenient_mode_renders_raw_template() {
    with_strict_mode(false, || {
        let err = Error::new(Example, "my message {{}}}");
        assert_eq!(err.to_string(), "my message {{}}}");

        let err = Error::new(Example, "hi {{.name}}").with_params(Params::new());
        assert_eq!(err.to_string(), "hi <no value>");
    });
}

#[test]
fn test_lenient_mode_from_explicit_mode() {
    let err = Error::new(Example, "hi {{.name}}");
    assert_eq!(err.render(Mode::Lenient), "hi <no value>");
}
