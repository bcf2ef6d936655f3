use std::{
    borrow::Cow,
    fmt::{self, Display, Formatter},
    sync::Arc,
};

use itertools::Itertools;
use smol_str::SmolStr;

use crate::error::runtime::RuntimeError;

/// A dynamically typed MoLang value.
///
/// Values are immutable. Arrays hold a shared snapshot of their elements, so
/// cloning a value never copies element storage.
#[derive(Debug, Clone, Default)]
pub enum Value {
    Float(f32),
    String(SmolStr),
    Boolean(bool),
    #[default]
    Null,
    Array(Arc<[Value]>),
}

impl Value {
    pub const ZERO: Value = Value::Float(0.0);
    pub const ONE: Value = Value::Float(1.0);

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Boolean(_) => "boolean",
            Value::Null => "null",
            Value::Array(_) => "array",
        }
    }

    #[inline(always)]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    #[inline(always)]
    pub fn is_string(&self) -> bool {
        matches!(self, Value::String(_))
    }

    #[inline(always)]
    pub fn is_array(&self) -> bool {
        matches!(self, Value::Array(_))
    }

    pub fn as_float(&self) -> f32 {
        match self {
            Value::Float(f) => *f,
            Value::String(s) => parse_float(s).unwrap_or(0.0),
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Null => 0.0,
            Value::Array(items) => items.first().map(Value::as_float).unwrap_or(0.0),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Float(f) => *f >= 1.0,
            Value::String(s) => string_truthiness(s),
            Value::Boolean(b) => *b,
            Value::Null => false,
            Value::Array(items) => !items.is_empty(),
        }
    }

    pub fn as_string(&self) -> Cow<'_, str> {
        match self {
            Value::Float(f) => Cow::Owned(format_float(*f)),
            Value::String(s) => Cow::Borrowed(s.as_str()),
            Value::Boolean(b) => Cow::Borrowed(if *b { "true" } else { "false" }),
            Value::Null => Cow::Borrowed("null"),
            Value::Array(items) => Cow::Owned(format!(
                "[{}]",
                items.iter().map(|item| item.as_string()).join(", ")
            )),
        }
    }

    /// Compares two values of the same variant directly and any other pair
    /// by their float coercions.
    pub fn equals_value(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| a.equals_value(b))
            }
            _ => float_eq(self.as_float(), other.as_float()),
        }
    }

    /// Equality behind `==` and `!=`: a string on either side compares
    /// textually, everything else goes through [`Value::equals_value`].
    fn operator_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::String(_), _) | (_, Value::String(_)) => self.as_string() == other.as_string(),
            _ => self.equals_value(other),
        }
    }

    pub fn add(&self, other: &Value) -> Value {
        if self.is_string() || other.is_string() {
            let mut joined = String::from(self.as_string());
            joined.push_str(&other.as_string());
            return Value::String(joined.into());
        }

        Value::Float(self.as_float() + other.as_float())
    }

    pub fn subtract(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::String(s), Value::String(pattern)) => {
                Value::String(s.replacen(pattern.as_str(), "", 1).into())
            }
            _ => Value::Float(self.as_float() - other.as_float()),
        }
    }

    pub fn multiply(&self, other: &Value) -> Value {
        match (self, other) {
            (Value::String(s), Value::Float(times)) => {
                Value::String(s.repeat(repeat_count(*times, s.len())).into())
            }
            _ => Value::Float(self.as_float() * other.as_float()),
        }
    }

    pub fn divide(&self, other: &Value) -> Value {
        Value::Float(self.as_float() / other.as_float())
    }

    pub fn less(&self, other: &Value) -> Value {
        Value::Boolean(self.as_float() < other.as_float())
    }

    pub fn less_equals(&self, other: &Value) -> Value {
        Value::Boolean(self.as_float() <= other.as_float())
    }

    pub fn greater(&self, other: &Value) -> Value {
        Value::Boolean(self.as_float() > other.as_float())
    }

    pub fn greater_equals(&self, other: &Value) -> Value {
        Value::Boolean(self.as_float() >= other.as_float())
    }

    pub fn equals(&self, other: &Value) -> Value {
        Value::Boolean(self.operator_eq(other))
    }

    pub fn not_equals(&self, other: &Value) -> Value {
        Value::Boolean(!self.operator_eq(other))
    }

    /// `!` operator. `null` stays `null`.
    pub fn flip(&self) -> Value {
        match self {
            Value::Null => Value::Null,
            Value::Boolean(b) => Value::Boolean(!b),
            _ => Value::Boolean(!self.as_bool()),
        }
    }

    /// Unary `-`. Only floats and booleans change.
    pub fn negate(&self) -> Value {
        match self {
            Value::Float(f) => Value::Float(-f),
            Value::Boolean(b) => Value::Boolean(!b),
            _ => self.clone(),
        }
    }

    /// Indexes into an array, clamping negative indices to zero and wrapping
    /// indices past the end.
    pub fn index(&self, index: &Value) -> Result<Value, RuntimeError> {
        let Value::Array(items) = self else {
            return Err(RuntimeError::NotAnArray(self.type_name()));
        };

        if items.is_empty() {
            return Err(RuntimeError::EmptyArray);
        }

        let index = index.as_float() as i64;
        let index = if index < 0 {
            0
        } else {
            (index % items.len() as i64) as usize
        };

        Ok(items[index].clone())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Float(a), Value::Float(b)) => float_eq(*a, *b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Array(a), Value::Array(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Value::Float(n) => write!(f, "{}", format_float(*n)),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "null"),
            Value::Array(items) => write!(f, "[{}]", items.iter().join(", ")),
        }
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Float(value as f32)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.into())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value.into())
    }
}

impl From<SmolStr> for Value {
    fn from(value: SmolStr) -> Self {
        Value::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::Array(value.into())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Float equality where `NaN` equals itself and `0.0` differs from `-0.0`.
#[inline(always)]
fn float_eq(a: f32, b: f32) -> bool {
    a.to_bits() == b.to_bits() || (a.is_nan() && b.is_nan())
}

/// Upper bound on the byte length of a string built by `*`.
const MAX_REPEATED_LEN: usize = 1 << 20;

/// Number of copies `*` makes of a string of `unit` bytes. Counts below one
/// and `NaN` make none; counts whose result would exceed
/// [`MAX_REPEATED_LEN`] are capped.
fn repeat_count(times: f32, unit: usize) -> usize {
    if unit == 0 || times.is_nan() || times < 1.0 {
        return 0;
    }

    let times = times as usize;
    match times.checked_mul(unit) {
        Some(len) if len <= MAX_REPEATED_LEN => times,
        _ => MAX_REPEATED_LEN / unit,
    }
}

fn parse_float(s: &str) -> Option<f32> {
    s.trim().parse::<f32>().ok()
}

fn string_truthiness(s: &str) -> bool {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("false") {
        return false;
    }

    match parse_float(s) {
        Some(f) => f >= 1.0,
        None => true,
    }
}

/// Renders a float the way MoLang hosts print numbers: always with a
/// fractional part, switching to exponent notation outside `[1e-3, 1e7)`.
pub(crate) fn format_float(value: f32) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
    }

    let abs = value.abs();
    if abs != 0.0 && !(1e-3..1e7).contains(&abs) {
        let formatted = format!("{:E}", value);
        return match formatted.split_once('E') {
            Some((mantissa, exponent)) if !mantissa.contains('.') => {
                format!("{}.0E{}", mantissa, exponent)
            }
            _ => formatted,
        };
    }

    let formatted = format!("{}", value);
    if formatted.contains('.') {
        formatted
    } else {
        format!("{}.0", formatted)
    }
}
