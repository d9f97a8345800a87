//! Key/value parameters bound to an error.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use crate::any_error::AnyError;
use crate::error::Error;
use crate::group::Group;
use crate::strict::Mode;
use crate::string_error::StringError;

/// The param key holding the wrapped cause of an error.
pub const CAUSE_KEY: &str = "err";

/// One level of indentation for nested error messages.
pub const INDENT_SPACES: &str = "  ";

/// A single param value: plain data or an error.
#[derive(Clone)]
pub enum ParamValue {
    Value(Value),
    Error(AnyError),
}

impl ParamValue {
    /// The nil value. Setting a key to nil through `with_params` deletes it.
    pub const NIL: ParamValue = ParamValue::Value(Value::Null);

    pub fn is_nil(&self) -> bool {
        matches!(self, ParamValue::Value(Value::Null))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            ParamValue::Value(value) => Some(value),
            ParamValue::Error(_) => None,
        }
    }

    pub fn as_error(&self) -> Option<&AnyError> {
        match self {
            ParamValue::Error(error) => Some(error),
            ParamValue::Value(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_value().and_then(Value::as_str)
    }

    /// Name of the runtime type, as shown by the `type` template helper.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Value(Value::Null) => "null",
            ParamValue::Value(Value::Bool(_)) => "bool",
            ParamValue::Value(Value::Number(_)) => "number",
            ParamValue::Value(Value::String(_)) => "string",
            ParamValue::Value(Value::Array(_)) => "array",
            ParamValue::Value(Value::Object(_)) => "object",
            ParamValue::Error(error) => error.type_name(),
        }
    }
}

impl fmt::Debug for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Value(value) => write!(f, "{}", value),
            ParamValue::Error(error) => write!(f, "{:?}", error),
        }
    }
}

/// Error values compare by identity.
impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Value(a), ParamValue::Value(b)) => a == b,
            (ParamValue::Error(a), ParamValue::Error(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    ParamValue::Value(Value::from(value))
                }
            }
        )*
    };
}

value_from!(&str, String, bool, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

impl From<Value> for ParamValue {
    fn from(value: Value) -> Self {
        ParamValue::Value(value)
    }
}

impl From<AnyError> for ParamValue {
    fn from(error: AnyError) -> Self {
        ParamValue::Error(error)
    }
}

macro_rules! error_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(error: $ty) -> Self {
                    ParamValue::Error(AnyError::from(error))
                }
            }
        )*
    };
}

error_from!(Error, Group, StringError, std::io::Error);

/// String-keyed parameters used by message templates.
///
/// Accessors on errors always hand out copies, so mutating a `Params` value
/// never reaches back into an error.
#[derive(Clone, Default, PartialEq)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Params::insert`].
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Option<ParamValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.0.remove(key)
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, ParamValue> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Merge `updates` into these params. A nil value deletes its key.
    pub fn apply(&mut self, updates: Params) {
        for (key, value) in updates.0 {
            if value.is_nil() {
                self.0.remove(&key);
            } else {
                self.0.insert(key, value);
            }
        }
    }

    /// A copy with the cause key replaced by its rendered, indented text.
    pub(crate) fn prepared(&self, indent: &str, mode: Mode) -> Params {
        let mut prepared = self.clone();
        if let Some(ParamValue::Error(cause)) = self.0.get(CAUSE_KEY) {
            prepared.insert(CAUSE_KEY, format_cause(cause, indent, mode));
        }
        prepared
    }

    /// The params as a JSON object, errors replaced by their messages.
    pub(crate) fn to_json_object(&self, mode: Mode) -> serde_json::Map<String, Value> {
        self.0
            .iter()
            .map(|(key, value)| {
                let value = match value {
                    ParamValue::Value(value) => value.clone(),
                    ParamValue::Error(error) if key == CAUSE_KEY => Value::String(format_cause(error, "", mode)),
                    ParamValue::Error(error) => Value::String(error.render(mode)),
                };
                (key.clone(), value)
            })
            .collect()
    }

    /// Detached params for an export: no cause, errors replaced by their messages.
    pub(crate) fn exported(&self, mode: Mode) -> Params {
        self.0
            .iter()
            .filter(|(key, _)| key.as_str() != CAUSE_KEY)
            .map(|(key, value)| {
                let value = match value {
                    ParamValue::Value(value) => ParamValue::Value(value.clone()),
                    ParamValue::Error(error) => ParamValue::Value(Value::String(error.render(mode))),
                };
                (key.clone(), value)
            })
            .collect()
    }
}

/// Renders a cause for embedding in the message of the error it caused.
///
/// Causes that know how to indent themselves get `indent` as is. Anything
/// else that spans several lines is pushed onto its own lines, one level
/// deeper than `indent`.
pub(crate) fn format_cause(cause: &AnyError, indent: &str, mode: Mode) -> String {
    if let Some(text) = cause.render_indented(indent, mode) {
        return text;
    }

    let text = cause.render(mode);
    if !text.contains('\n') {
        return text;
    }

    let pad = format!("{indent}{INDENT_SPACES}");
    format!("\n{pad}{}", text.replace('\n', &format!("\n{pad}")))
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.0.iter()).finish()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Params(iter.into_iter().map(|(key, value)| (key.into(), value.into())).collect())
    }
}

impl<K: Into<String>, V: Into<ParamValue>, const N: usize> From<[(K, V); N]> for Params {
    fn from(entries: [(K, V); N]) -> Self {
        entries.into_iter().collect()
    }
}

impl IntoIterator for Params {
    type Item = (String, ParamValue);
    type IntoIter = btree_map::IntoIter<String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a String, &'a ParamValue);
    type IntoIter = btree_map::Iter<'a, String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let object = self.to_json_object(Mode::ambient());
        let mut map = serializer.serialize_map(Some(object.len()))?;
        for (key, value) in &object {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Params {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = BTreeMap::<String, Value>::deserialize(deserializer)?;
        Ok(values.into_iter().collect())
    }
}
