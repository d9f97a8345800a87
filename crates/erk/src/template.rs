//! Message templates with `{{ }}` actions.
//!
//! An action is a pipeline of commands separated by `|`. A command is either
//! a single operand or a function call followed by its arguments; the result
//! of each command is passed as the last argument of the next one.
//!
//! ```text
//! file not found: {{.path}}
//! {{.name}} is a {{type .name}}
//! {{.err | inspect}}
//! ```
//!
//! Operands are `.` (all params), field chains such as `.user.name`, string
//! literals, numbers, `true`, `false`, `nil` and function names. `{{-` and
//! `-}}` trim the whitespace next to the action; `{{/* ... */}}` is a comment.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use strum_macros::{Display, EnumString, IntoStaticStr};

use crate::params::{ParamValue, Params};

/// Printed for a key that is not present in the params.
pub const NO_VALUE: &str = "<no value>";

pub type Result<T> = std::result::Result<T, TemplateError>;

/// A helper function callable from a template.
pub type TemplateFunc = Arc<dyn Fn(&[ParamValue]) -> std::result::Result<ParamValue, String> + Send + Sync>;

/// The kind of failure while parsing or executing a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoStaticStr, Display)]
#[non_exhaustive]
pub enum TemplateErrorKind {
    /// The template source is malformed
    ParseFailed,

    /// A referenced key is missing and missing keys are not allowed
    MissingKey,

    /// A field was read from a value that has no fields
    BadField,

    /// A helper function returned an error
    CallFailed,
}

impl TemplateErrorKind {
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}

/// A template parse or execution failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateError {
    kind: TemplateErrorKind,
    position: usize,
    message: String,
}

impl TemplateError {
    fn new(kind: TemplateErrorKind, position: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            position,
            message: message.into(),
        }
    }

    fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::new(TemplateErrorKind::ParseFailed, position, message)
    }

    pub fn kind(&self) -> TemplateErrorKind {
        self.kind
    }

    /// Byte offset of the action that failed.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}: {}", self.kind, self.position, self.message)
    }
}

impl std::error::Error for TemplateError {}

/// What to do when a template references a key that is not set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum MissingKey {
    /// Print [`NO_VALUE`]
    #[default]
    NoValue,
    /// Fail the execution
    Error,
}

/// The table of helper functions available to a template.
#[derive(Clone, Default)]
pub struct TemplateFuncs {
    funcs: HashMap<String, TemplateFunc>,
}

impl TemplateFuncs {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// The default helpers:
    ///
    /// - `type`: the runtime type name of its argument
    /// - `inspect`: a verbose form of its argument, `Debug` for errors
    pub fn builtin() -> Self {
        Self::new().with("type", builtin_type).with("inspect", builtin_inspect)
    }

    pub fn with<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&[ParamValue]) -> std::result::Result<ParamValue, String> + Send + Sync + 'static,
    {
        self.insert(name, func);
        self
    }

    pub fn insert<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&[ParamValue]) -> std::result::Result<ParamValue, String> + Send + Sync + 'static,
    {
        self.funcs.insert(name.into(), Arc::new(func));
    }

    pub fn remove(&mut self, name: &str) -> Option<TemplateFunc> {
        self.funcs.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&TemplateFunc> {
        self.funcs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.funcs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.funcs.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.funcs.keys().map(String::as_str)
    }
}

impl fmt::Debug for TemplateFuncs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_set().entries(names).finish()
    }
}

fn builtin_type(args: &[ParamValue]) -> std::result::Result<ParamValue, String> {
    match args {
        [value] => Ok(ParamValue::from(value.type_name())),
        _ => Err(format!("wrong number of args for type: want 1 got {}", args.len())),
    }
}

fn builtin_inspect(args: &[ParamValue]) -> std::result::Result<ParamValue, String> {
    let text = match args {
        [ParamValue::Value(Value::String(text))] => text.clone(),
        [ParamValue::Value(value)] => value.to_string(),
        [ParamValue::Error(error)] => format!("{:?}", error),
        _ => return Err(format!("wrong number of args for inspect: want 1 got {}", args.len())),
    };
    Ok(ParamValue::from(text))
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Action { pipeline: Vec<Command>, position: usize },
}

#[derive(Debug, Clone, PartialEq)]
struct Command {
    operands: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Dot,
    Field(Vec<String>),
    Literal(Value),
    Func(String),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Dot,
    Field(Vec<String>),
    Ident(String),
    Literal(Value),
    Pipe,
}

/// A parsed template, bound to the helper functions it was parsed with.
#[derive(Clone)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
    funcs: TemplateFuncs,
}

impl Template {
    /// Parse `source`. Calls to functions missing from `funcs` fail here.
    pub fn parse(source: &str, funcs: &TemplateFuncs) -> Result<Self> {
        let nodes = Parser { source, funcs }.parse()?;
        Ok(Self {
            source: source.to_string(),
            nodes,
            funcs: funcs.clone(),
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns true if the template has at least one action.
    pub fn has_actions(&self) -> bool {
        self.nodes.iter().any(|node| matches!(node, Node::Action { .. }))
    }

    /// Render the template against `data`.
    pub fn execute(&self, data: &Params, missing: MissingKey) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        for node in &self.nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Action { pipeline, position } => {
                    tracing::trace!(position = *position, missing = %missing, "executing template action");
                    let value = self.eval_pipeline(pipeline, *position, data, missing)?;
                    out.push_str(&print(value.as_ref()));
                }
            }
        }
        Ok(out)
    }

    fn eval_pipeline(
        &self,
        pipeline: &[Command],
        position: usize,
        data: &Params,
        missing: MissingKey,
    ) -> Result<Option<ParamValue>> {
        let mut piped: Option<Option<ParamValue>> = None;

        for command in pipeline {
            let value = match command.operands.split_first() {
                Some((Operand::Func(name), args)) => {
                    let mut values = Vec::with_capacity(args.len() + 1);
                    for arg in args {
                        values.push(as_arg(self.eval_operand(arg, position, data, missing)?));
                    }
                    if let Some(previous) = piped.take() {
                        values.push(as_arg(previous));
                    }
                    Some(self.call(name, &values, position)?)
                }
                Some((operand, _)) => self.eval_operand(operand, position, data, missing)?,
                None => return Err(TemplateError::parse(position, "missing value for command")),
            };
            piped = Some(value);
        }

        Ok(piped.flatten())
    }

    fn eval_operand(
        &self,
        operand: &Operand,
        position: usize,
        data: &Params,
        missing: MissingKey,
    ) -> Result<Option<ParamValue>> {
        match operand {
            Operand::Dot => Ok(Some(ParamValue::Value(Value::Object(dot_object(data))))),
            Operand::Field(names) => lookup(names, position, data, missing),
            Operand::Literal(value) => Ok(Some(ParamValue::Value(value.clone()))),
            Operand::Func(name) => self.call(name, &[], position).map(Some),
        }
    }

    fn call(&self, name: &str, args: &[ParamValue], position: usize) -> Result<ParamValue> {
        let func = self.funcs.get(name).ok_or_else(|| {
            TemplateError::new(
                TemplateErrorKind::CallFailed,
                position,
                format!("function \"{name}\" not defined"),
            )
        })?;

        func(args).map_err(|message| {
            TemplateError::new(
                TemplateErrorKind::CallFailed,
                position,
                format!("error calling {name}: {message}"),
            )
        })
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("source", &self.source)
            .field("nodes", &self.nodes)
            .finish()
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

fn as_arg(value: Option<ParamValue>) -> ParamValue {
    value.unwrap_or(ParamValue::NIL)
}

fn dot_object(data: &Params) -> serde_json::Map<String, Value> {
    data.iter()
        .map(|(key, value)| {
            let value = match value {
                ParamValue::Value(value) => value.clone(),
                ParamValue::Error(error) => Value::String(error.to_string()),
            };
            (key.clone(), value)
        })
        .collect()
}

fn lookup(names: &[String], position: usize, data: &Params, missing: MissingKey) -> Result<Option<ParamValue>> {
    let no_entry = |name: &str| match missing {
        MissingKey::NoValue => Ok(None),
        MissingKey::Error => Err(TemplateError::new(
            TemplateErrorKind::MissingKey,
            position,
            format!("map has no entry for key \"{name}\""),
        )),
    };

    let Some((first, rest)) = names.split_first() else {
        return Ok(Some(ParamValue::Value(Value::Object(dot_object(data)))));
    };
    let mut current = match data.get(first) {
        Some(value) => value.clone(),
        None => return no_entry(first),
    };

    for name in rest {
        current = match &current {
            ParamValue::Value(Value::Object(map)) => match map.get(name) {
                Some(value) => ParamValue::Value(value.clone()),
                None => return no_entry(name),
            },
            other => {
                return Err(TemplateError::new(
                    TemplateErrorKind::BadField,
                    position,
                    format!("can't evaluate field {name} in type {}", other.type_name()),
                ));
            }
        };
    }

    Ok(Some(current))
}

fn print(value: Option<&ParamValue>) -> String {
    match value {
        None => NO_VALUE.to_string(),
        Some(ParamValue::Value(Value::String(text))) => text.clone(),
        Some(ParamValue::Value(Value::Null)) => "<nil>".to_string(),
        Some(ParamValue::Value(Value::Number(number))) if number.is_f64() => {
            number.as_f64().map_or_else(|| number.to_string(), format_float)
        }
        Some(ParamValue::Value(value)) => value.to_string(),
        Some(ParamValue::Error(error)) => error.to_string(),
    }
}

struct Parser<'a> {
    source: &'a str,
    funcs: &'a TemplateFuncs,
}

impl<'a> Parser<'a> {
    fn parse(&self) -> Result<Vec<Node>> {
        let source = self.source;
        let mut nodes = Vec::new();
        let mut cursor = 0;
        let mut trim_next = false;

        while cursor < source.len() {
            let Some(found) = source[cursor..].find("{{") else {
                push_text(&mut nodes, &source[cursor..], trim_next, false);
                break;
            };
            let open = cursor + found;
            let mut body = open + 2;
            let trim_left = source[body..].starts_with('-')
                && source[body + 1..].starts_with(|c: char| c.is_ascii_whitespace());
            if trim_left {
                body += 1;
            }
            push_text(&mut nodes, &source[cursor..open], trim_next, trim_left);

            let (end, trim_right) = if source[body..].trim_start().starts_with("/*") {
                self.skip_comment(open, body)?
            } else {
                let (tokens, end, trim_right) = self.lex_action(open, body)?;
                let pipeline = self.parse_pipeline(tokens, open)?;
                nodes.push(Node::Action {
                    pipeline,
                    position: open,
                });
                (end, trim_right)
            };

            cursor = end;
            trim_next = trim_right;
        }

        Ok(nodes)
    }

    fn skip_comment(&self, open: usize, body: usize) -> Result<(usize, bool)> {
        let source = self.source;
        let Some(close) = source[body..].find("*/") else {
            return Err(TemplateError::parse(open, "unclosed comment"));
        };
        let after = body + close + 2;
        let rest = &source[after..];
        let trimmed = rest.trim_start();
        if trimmed.starts_with("}}") {
            return Ok((after + (rest.len() - trimmed.len()) + 2, false));
        }
        if trimmed.starts_with("-}}") && trimmed.len() < rest.len() {
            return Ok((after + (rest.len() - trimmed.len()) + 3, true));
        }
        Err(TemplateError::parse(open, "comment ends before closing delimiter"))
    }

    /// Tokenizes one action, returning the tokens, the offset just past the
    /// closing delimiter and whether the action ended with `-}}`.
    fn lex_action(&self, open: usize, body: usize) -> Result<(Vec<Token>, usize, bool)> {
        let source = self.source;
        let bytes = source.as_bytes();
        let mut tokens = Vec::new();
        let mut pos = body;

        loop {
            let Some(&byte) = bytes.get(pos) else {
                return Err(TemplateError::parse(open, "unclosed action"));
            };

            match byte {
                b'}' if bytes.get(pos + 1) == Some(&b'}') => return Ok((tokens, pos + 2, false)),
                b'-' if source[pos + 1..].starts_with("}}") && bytes[pos - 1].is_ascii_whitespace() => {
                    return Ok((tokens, pos + 3, true));
                }
                byte if byte.is_ascii_whitespace() => pos += 1,
                b'|' => {
                    tokens.push(Token::Pipe);
                    pos += 1;
                }
                b'.' => {
                    let (token, next) = lex_field(source, pos);
                    tokens.push(token);
                    pos = next;
                }
                b'"' => {
                    let (text, next) = lex_quoted(source, pos, open)?;
                    tokens.push(Token::Literal(Value::String(text)));
                    pos = next;
                }
                b'`' => {
                    let Some(close) = source[pos + 1..].find('`') else {
                        return Err(TemplateError::parse(open, "unterminated raw quoted string"));
                    };
                    tokens.push(Token::Literal(Value::String(source[pos + 1..pos + 1 + close].to_string())));
                    pos += close + 2;
                }
                b'0'..=b'9' => {
                    let (value, next) = lex_number(source, pos, open)?;
                    tokens.push(Token::Literal(value));
                    pos = next;
                }
                b'-' if bytes.get(pos + 1).is_some_and(u8::is_ascii_digit) => {
                    let (value, next) = lex_number(source, pos, open)?;
                    tokens.push(Token::Literal(value));
                    pos = next;
                }
                _ if starts_ident(&source[pos..]) => {
                    let end = scan_ident(source, pos);
                    let token = match &source[pos..end] {
                        "true" => Token::Literal(Value::Bool(true)),
                        "false" => Token::Literal(Value::Bool(false)),
                        "nil" => Token::Literal(Value::Null),
                        ident => Token::Ident(ident.to_string()),
                    };
                    tokens.push(token);
                    pos = end;
                }
                _ => {
                    let unexpected = source[pos..].chars().next().unwrap_or_default();
                    return Err(TemplateError::parse(
                        open,
                        format!("unexpected {unexpected:?} in command"),
                    ));
                }
            }
        }
    }

    fn parse_pipeline(&self, tokens: Vec<Token>, open: usize) -> Result<Vec<Command>> {
        let mut commands = Vec::new();
        let mut operands = Vec::new();

        for token in tokens {
            let operand = match token {
                Token::Pipe => {
                    commands.push(finish_command(std::mem::take(&mut operands), open)?);
                    continue;
                }
                Token::Dot => Operand::Dot,
                Token::Field(names) => Operand::Field(names),
                Token::Literal(value) => Operand::Literal(value),
                Token::Ident(name) if self.funcs.contains(&name) => Operand::Func(name),
                Token::Ident(name) => {
                    return Err(TemplateError::parse(open, format!("function \"{name}\" not defined")));
                }
            };
            operands.push(operand);
        }
        commands.push(finish_command(operands, open)?);

        for (stage, command) in commands.iter().enumerate() {
            let is_call = matches!(command.operands.first(), Some(Operand::Func(_)));
            if !is_call && command.operands.len() > 1 {
                return Err(TemplateError::parse(open, "can't give argument to non-function"));
            }
            if !is_call && stage > 0 {
                return Err(TemplateError::parse(
                    open,
                    format!("non executable command in pipeline stage {}", stage + 1),
                ));
            }
        }

        Ok(commands)
    }
}

fn finish_command(operands: Vec<Operand>, open: usize) -> Result<Command> {
    if operands.is_empty() {
        return Err(TemplateError::parse(open, "missing value for command"));
    }
    Ok(Command { operands })
}

fn push_text(nodes: &mut Vec<Node>, text: &str, trim_start: bool, trim_end: bool) {
    let text = if trim_start { text.trim_start() } else { text };
    let text = if trim_end { text.trim_end() } else { text };
    if !text.is_empty() {
        nodes.push(Node::Text(text.to_string()));
    }
}

/// Prints a float the way `%v` does: shortest digits, with an exponent
/// below 1e-4 or from 1e6 up.
fn format_float(float: f64) -> String {
    let scientific = format!("{float:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return float.to_string();
    };
    match exponent.parse::<i32>() {
        Ok(exponent) if !(-4..6).contains(&exponent) => {
            let sign = if exponent < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exponent.abs())
        }
        _ => float.to_string(),
    }
}

fn is_ident_char(c: char) -> bool {
    c == '_' || c.is_alphanumeric()
}

fn starts_ident(source: &str) -> bool {
    source.chars().next().is_some_and(is_ident_char)
}

fn scan_ident(source: &str, start: usize) -> usize {
    source[start..]
        .char_indices()
        .find(|&(_, c)| !is_ident_char(c))
        .map_or(source.len(), |(offset, _)| start + offset)
}

/// Lexes `.` or a field chain such as `.a.b` starting at the first dot.
fn lex_field(source: &str, start: usize) -> (Token, usize) {
    let mut names = Vec::new();
    let mut pos = start;

    while source[pos..].starts_with('.') && starts_ident(&source[pos + 1..]) {
        let end = scan_ident(source, pos + 1);
        names.push(source[pos + 1..end].to_string());
        pos = end;
    }

    if names.is_empty() {
        (Token::Dot, start + 1)
    } else {
        (Token::Field(names), pos)
    }
}

fn lex_quoted(source: &str, start: usize, open: usize) -> Result<(String, usize)> {
    let mut text = String::new();
    let mut chars = source[start + 1..].char_indices();

    while let Some((offset, c)) = chars.next() {
        match c {
            '"' => return Ok((text, start + 1 + offset + 1)),
            '\n' => break,
            '\\' => match chars.next() {
                Some((_, 'n')) => text.push('\n'),
                Some((_, 't')) => text.push('\t'),
                Some((_, '"')) => text.push('"'),
                Some((_, '\\')) => text.push('\\'),
                Some((_, other)) => {
                    return Err(TemplateError::parse(open, format!("invalid escape \\{other}")));
                }
                None => break,
            },
            c => text.push(c),
        }
    }

    Err(TemplateError::parse(open, "unterminated quoted string"))
}

/// Lexes a number literal. Integers take `0x`, `0o`, `0b` or a leading `0`
/// for octal, and digits may be separated by `_`.
fn lex_number(source: &str, start: usize, open: usize) -> Result<(Value, usize)> {
    let bytes = source.as_bytes();
    let mut end = start + 1;
    while let Some(&byte) = bytes.get(end) {
        let exponent_sign = (byte == b'-' || byte == b'+') && matches!(bytes[end - 1], b'e' | b'E');
        if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'.' || exponent_sign {
            end += 1;
        } else {
            break;
        }
    }

    let text = &source[start..end];
    let bad_syntax = || TemplateError::parse(open, format!("bad number syntax: {text:?}"));
    if text.starts_with('_') || text.ends_with('_') || text.contains("__") {
        return Err(bad_syntax());
    }

    let digits = text.replace('_', "");
    let (negative, unsigned) = match digits.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, digits.as_str()),
    };
    let (radix, body) = match unsigned.get(..2) {
        Some("0x" | "0X") => (16, &unsigned[2..]),
        Some("0o" | "0O") => (8, &unsigned[2..]),
        Some("0b" | "0B") => (2, &unsigned[2..]),
        _ if unsigned.len() > 1 && unsigned.starts_with('0') && unsigned.bytes().all(|b| b.is_ascii_digit()) => {
            (8, &unsigned[1..])
        }
        _ => (10, unsigned),
    };

    if radix != 10 {
        let int = i64::from_str_radix(body, radix).map_err(|_| bad_syntax())?;
        return Ok((Value::from(if negative { -int } else { int }), end));
    }
    if let Ok(int) = digits.parse::<i64>() {
        return Ok((Value::from(int), end));
    }
    if !digits.bytes().all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'-' | b'+')) {
        return Err(bad_syntax());
    }
    match digits.parse::<f64>() {
        Ok(float) if float.is_finite() => Ok((Value::from(float), end)),
        _ => Err(bad_syntax()),
    }
}
