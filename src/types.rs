//! Property type descriptors for component schemas.
//!
//! Every component field is declared against a [`PropertyType`]: a small
//! vtable carrying the field's default value and its clone/copy routines.
//! The standard descriptors cover the primitive kinds; [`create_type`]
//! builds custom ones.

use serde::Serialize;

pub type JsonValue = serde_json::Value;
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Dynamic field value held by a component instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Str(String),
    Array(Vec<Value>),
    Object(JsonMap),
    Json(JsonValue),
}

impl Value {
    /// Name of the value's kind, used in mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Bool(_) => "Boolean",
            Value::Str(_) => "String",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
            Value::Json(_) => "JSON",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

/// Clone routine: produce a detached value from a source.
pub type CloneFn = fn(&Value) -> Value;

/// Copy routine: overwrite a destination in place from a source.
pub type CopyFn = fn(&Value, &mut Value);

/// Descriptor for a field type: default value plus clone/copy vtable.
#[derive(Clone)]
pub struct PropertyType {
    pub name: &'static str,
    pub default: Value,
    pub clone: CloneFn,
    pub copy: CopyFn,
}

impl std::fmt::Debug for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyType")
            .field("name", &self.name)
            .field("default", &self.default)
            .finish()
    }
}

fn clone_value(value: &Value) -> Value {
    value.clone()
}

fn copy_value(src: &Value, dst: &mut Value) {
    dst.clone_from(src);
}

/// Build a custom property type descriptor.
pub fn create_type(name: &'static str, default: Value, clone: CloneFn, copy: CopyFn) -> PropertyType {
    PropertyType {
        name,
        default,
        clone,
        copy,
    }
}

pub fn number() -> PropertyType {
    create_type("Number", Value::Number(0.0), clone_value, copy_value)
}

pub fn boolean() -> PropertyType {
    create_type("Boolean", Value::Bool(false), clone_value, copy_value)
}

pub fn string() -> PropertyType {
    create_type("String", Value::Str(String::new()), clone_value, copy_value)
}

pub fn object() -> PropertyType {
    create_type("Object", Value::Object(JsonMap::new()), clone_value, copy_value)
}

pub fn array() -> PropertyType {
    create_type("Array", Value::Array(Vec::new()), clone_value, copy_value)
}

pub fn json() -> PropertyType {
    create_type("JSON", Value::Json(JsonValue::Null), clone_value, copy_value)
}
