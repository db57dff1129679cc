//! Typed config values and metric coercion
//!
//! [`TypedValue`] is the closed set of values a config entry may hold. Each
//! variant has one canonical text form, stored next to its [`TypeTag`].
//! [`AsStep`] and [`AsMetricValue`] describe which inputs may be used as a
//! metric step or value.

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StoreError};

/// Storage tag of a config value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Bool,
    Int,
    Float,
    Str,
    DateTime,
    Null,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::Int => "int",
            TypeTag::Float => "float",
            TypeTag::Str => "str",
            TypeTag::DateTime => "datetime",
            TypeTag::Null => "null",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bool" => Ok(TypeTag::Bool),
            "int" => Ok(TypeTag::Int),
            "float" => Ok(TypeTag::Float),
            "str" => Ok(TypeTag::Str),
            "datetime" => Ok(TypeTag::DateTime),
            "null" => Ok(TypeTag::Null),
            other => Err(StoreError::invalid(format!("unknown type tag '{}'", other))),
        }
    }
}

/// A config value with a fixed set of variants
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    DateTime(DateTime<FixedOffset>),
    Null,
}

impl TypedValue {
    /// Tag inferred from the variant
    pub fn tag(&self) -> TypeTag {
        match self {
            TypedValue::Bool(_) => TypeTag::Bool,
            TypedValue::Int(_) => TypeTag::Int,
            TypedValue::Float(_) => TypeTag::Float,
            TypedValue::Str(_) => TypeTag::Str,
            TypedValue::DateTime(_) => TypeTag::DateTime,
            TypedValue::Null => TypeTag::Null,
        }
    }

    /// Canonical text form
    pub fn serialize_value(&self) -> String {
        match self {
            TypedValue::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            TypedValue::Int(i) => i.to_string(),
            TypedValue::Float(f) => float_text(*f),
            TypedValue::Str(s) => s.clone(),
            TypedValue::DateTime(dt) => dt.to_rfc3339(),
            TypedValue::Null => String::new(),
        }
    }

    /// Tag and canonical text, as stored
    pub fn encode(&self) -> (TypeTag, String) {
        (self.tag(), self.serialize_value())
    }

    /// Rebuild a value from its stored tag and text.
    ///
    /// Unknown tags fall back to a string so files written by newer
    /// versions stay readable.
    pub fn decode(tag: &str, raw: Option<&str>) -> Result<Self> {
        let raw = match raw {
            Some(raw) => raw,
            None => return Ok(TypedValue::Null),
        };
        let tag = match tag.parse::<TypeTag>() {
            Ok(tag) => tag,
            Err(_) => return Ok(TypedValue::Str(raw.to_string())),
        };

        match tag {
            TypeTag::Null => Ok(TypedValue::Null),
            TypeTag::Bool => Ok(TypedValue::Bool(raw.eq_ignore_ascii_case("true"))),
            TypeTag::Int => raw
                .parse::<i64>()
                .map(TypedValue::Int)
                .map_err(|e| StoreError::invalid(format!("bad int '{}': {}", raw, e))),
            TypeTag::Float => raw
                .parse::<f64>()
                .map(TypedValue::Float)
                .map_err(|e| StoreError::invalid(format!("bad float '{}': {}", raw, e))),
            TypeTag::Str => Ok(TypedValue::Str(raw.to_string())),
            TypeTag::DateTime => parse_datetime(raw).map(TypedValue::DateTime),
        }
    }

    /// Convert a JSON scalar; arrays and objects yield `None`
    pub fn from_json_scalar(value: &serde_json::Value) -> Option<Self> {
        use serde_json::Value;

        match value {
            Value::Null => Some(TypedValue::Null),
            Value::Bool(b) => Some(TypedValue::Bool(*b)),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(TypedValue::Int(i))
                } else {
                    n.as_f64().map(TypedValue::Float)
                }
            }
            Value::String(s) => Some(TypedValue::Str(s.clone())),
            Value::Array(_) | Value::Object(_) => None,
        }
    }
}

fn parse_datetime(raw: &str) -> Result<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }
    // Offset-less ISO-8601 is read as UTC
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| DateTime::from_naive_utc_and_offset(naive, Utc.fix()))
        .map_err(|e| StoreError::invalid(format!("bad datetime '{}': {}", raw, e)))
}

/// Float text that keeps a fractional part when finite, so `1.0` never
/// reads back as the integer text `1`
fn float_text(f: f64) -> String {
    let text = f.to_string();
    if f.is_finite() && !text.contains(['.', 'e', 'E']) {
        format!("{}.0", text)
    } else {
        text
    }
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Null => f.write_str("null"),
            other => f.write_str(&other.serialize_value()),
        }
    }
}

/// Wire form: plain JSON scalars, datetimes as RFC 3339 strings
impl Serialize for TypedValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            TypedValue::Bool(b) => serializer.serialize_bool(*b),
            TypedValue::Int(i) => serializer.serialize_i64(*i),
            TypedValue::Float(f) => serializer.serialize_f64(*f),
            TypedValue::Str(s) => serializer.serialize_str(s),
            TypedValue::DateTime(dt) => serializer.serialize_str(&dt.to_rfc3339()),
            TypedValue::Null => serializer.serialize_none(),
        }
    }
}

impl From<bool> for TypedValue {
    fn from(v: bool) -> Self {
        TypedValue::Bool(v)
    }
}

macro_rules! typed_int_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for TypedValue {
                fn from(v: $t) -> Self {
                    TypedValue::Int(i64::from(v))
                }
            }
        )*
    };
}

typed_int_from!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for TypedValue {
    fn from(v: u64) -> Self {
        match i64::try_from(v) {
            Ok(i) => TypedValue::Int(i),
            Err(_) => TypedValue::Float(v as f64),
        }
    }
}

impl From<usize> for TypedValue {
    fn from(v: usize) -> Self {
        TypedValue::from(v as u64)
    }
}

impl From<f32> for TypedValue {
    fn from(v: f32) -> Self {
        TypedValue::Float(f64::from(v))
    }
}

impl From<f64> for TypedValue {
    fn from(v: f64) -> Self {
        TypedValue::Float(v)
    }
}

impl From<&str> for TypedValue {
    fn from(v: &str) -> Self {
        TypedValue::Str(v.to_string())
    }
}

impl From<String> for TypedValue {
    fn from(v: String) -> Self {
        TypedValue::Str(v)
    }
}

impl From<DateTime<FixedOffset>> for TypedValue {
    fn from(v: DateTime<FixedOffset>) -> Self {
        TypedValue::DateTime(v)
    }
}

impl From<DateTime<Utc>> for TypedValue {
    fn from(v: DateTime<Utc>) -> Self {
        TypedValue::DateTime(v.with_timezone(&Utc.fix()))
    }
}

impl<T: Into<TypedValue>> From<Option<T>> for TypedValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(TypedValue::Null)
    }
}

/// Inputs usable as a metric step
pub trait AsStep {
    fn as_step(&self) -> Result<i64>;
}

/// Inputs usable as a metric value
pub trait AsMetricValue {
    fn as_metric_value(&self) -> Result<f64>;
}

macro_rules! step_from_int {
    ($($t:ty),*) => {
        $(
            impl AsStep for $t {
                fn as_step(&self) -> Result<i64> {
                    i64::try_from(*self)
                        .map_err(|_| StoreError::invalid(format!("step {} out of range", self)))
                }
            }

            impl AsMetricValue for $t {
                fn as_metric_value(&self) -> Result<f64> {
                    Ok(*self as f64)
                }
            }
        )*
    };
}

step_from_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

fn float_to_step(v: f64) -> Result<i64> {
    if !v.is_finite() {
        return Err(StoreError::invalid(format!("step {} is not finite", v)));
    }
    let truncated = v.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return Err(StoreError::invalid(format!("step {} out of range", v)));
    }
    Ok(truncated as i64)
}

impl AsStep for f64 {
    fn as_step(&self) -> Result<i64> {
        float_to_step(*self)
    }
}

impl AsStep for f32 {
    fn as_step(&self) -> Result<i64> {
        float_to_step(f64::from(*self))
    }
}

impl AsStep for str {
    fn as_step(&self) -> Result<i64> {
        self.trim()
            .parse::<i64>()
            .map_err(|_| StoreError::invalid(format!("step '{}' is not an integer", self)))
    }
}

impl AsStep for String {
    fn as_step(&self) -> Result<i64> {
        self.as_str().as_step()
    }
}

impl AsStep for serde_json::Value {
    fn as_step(&self) -> Result<i64> {
        use serde_json::Value;

        match self {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(i),
                None => match n.as_f64() {
                    Some(f) => float_to_step(f),
                    None => Err(StoreError::invalid(format!("step {} out of range", n))),
                },
            },
            Value::String(s) => s.as_step(),
            other => Err(StoreError::invalid(format!("step {} is not numeric", other))),
        }
    }
}

impl<T: AsStep + ?Sized> AsStep for &T {
    fn as_step(&self) -> Result<i64> {
        (**self).as_step()
    }
}

impl AsMetricValue for f64 {
    fn as_metric_value(&self) -> Result<f64> {
        Ok(*self)
    }
}

impl AsMetricValue for f32 {
    fn as_metric_value(&self) -> Result<f64> {
        Ok(f64::from(*self))
    }
}

impl AsMetricValue for bool {
    fn as_metric_value(&self) -> Result<f64> {
        Ok(if *self { 1.0 } else { 0.0 })
    }
}

impl AsMetricValue for str {
    fn as_metric_value(&self) -> Result<f64> {
        self.trim()
            .parse::<f64>()
            .map_err(|_| StoreError::invalid(format!("value '{}' is not numeric", self)))
    }
}

impl AsMetricValue for String {
    fn as_metric_value(&self) -> Result<f64> {
        self.as_str().as_metric_value()
    }
}

impl AsMetricValue for serde_json::Value {
    fn as_metric_value(&self) -> Result<f64> {
        use serde_json::Value;

        match self {
            Value::Number(n) => n
                .as_f64()
                .ok_or_else(|| StoreError::invalid(format!("value {} is not representable", n))),
            Value::Bool(b) => b.as_metric_value(),
            Value::String(s) => s.as_metric_value(),
            other => Err(StoreError::invalid(format!("value {} is not numeric", other))),
        }
    }
}

impl<T: AsMetricValue + ?Sized> AsMetricValue for &T {
    fn as_metric_value(&self) -> Result<f64> {
        (**self).as_metric_value()
    }
}
