//! Dynamic SQL values and the field-type dispatch used by the marshaler.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::ConversionError;

/// A value bound to, or read from, a SQL statement.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// SQL NULL.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// 16-bit integer.
    SmallInt(i16),
    /// 32-bit integer.
    Int(i32),
    /// 64-bit integer.
    BigInt(i64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit float.
    Double(f64),
    /// Text.
    Text(String),
    /// Binary data.
    Bytes(Vec<u8>),
    /// Calendar date.
    Date(NaiveDate),
    /// Time of day.
    Time(NaiveTime),
    /// Date and time without zone.
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Widen any integer variant to `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::SmallInt(v) => Some(i64::from(*v)),
            Value::Int(v) => Some(i64::from(*v)),
            Value::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Short name of the variant, used in conversion errors.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::SmallInt(_) => "smallint",
            Value::Int(_) => "integer",
            Value::BigInt(_) => "bigint",
            Value::Float(_) => "real",
            Value::Double(_) => "double",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

/// The declared value type of a mapped field.
///
/// This is the key of the fixed type table consulted by the resolver.
/// `Entity` marks a field typed as another entity (a relationship field).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Bool,
    SmallInt,
    Int,
    BigInt,
    Float,
    Double,
    Text,
    Bytes,
    Date,
    Time,
    Timestamp,
    Entity,
}

/// A Rust type that can live in a mapped column.
///
/// `from_value` is lenient about the driver's representation: SQLite, for
/// instance, hands back dates as text and booleans as integers.
pub trait ColumnValue: Sized {
    /// Declared kind, used for SQL type resolution.
    const KIND: ValueKind;
    /// Whether the Rust type itself can hold NULL. Decides the default
    /// nullability of a column mapped from it.
    const NULLABLE: bool = false;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

fn mismatch(expected: &'static str, found: &Value) -> ConversionError {
    ConversionError::new(expected, found.type_name())
}

macro_rules! integer_column {
    ($ty:ty, $kind:ident, $variant:ident, $name:literal) => {
        impl ColumnValue for $ty {
            const KIND: ValueKind = ValueKind::$kind;

            fn to_value(&self) -> Value {
                Value::$variant(*self)
            }

            fn from_value(value: Value) -> Result<Self, ConversionError> {
                let wide = match &value {
                    Value::Bool(b) => i64::from(*b),
                    other => other.as_i64().ok_or_else(|| mismatch($name, other))?,
                };
                <$ty>::try_from(wide).map_err(|_| ConversionError::new($name, "out-of-range integer"))
            }
        }
    };
}

integer_column!(i16, SmallInt, SmallInt, "smallint");
integer_column!(i32, Int, Int, "integer");
integer_column!(i64, BigInt, BigInt, "bigint");

impl ColumnValue for bool {
    const KIND: ValueKind = ValueKind::Bool;

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bool(b) => Ok(b),
            other => other
                .as_i64()
                .map(|v| v != 0)
                .ok_or_else(|| mismatch("boolean", &other)),
        }
    }
}

impl ColumnValue for f64 {
    const KIND: ValueKind = ValueKind::Double;

    fn to_value(&self) -> Value {
        Value::Double(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Double(v) => Ok(v),
            Value::Float(v) => Ok(f64::from(v)),
            other => other
                .as_i64()
                .map(|v| v as f64)
                .ok_or_else(|| mismatch("double", &other)),
        }
    }
}

impl ColumnValue for f32 {
    const KIND: ValueKind = ValueKind::Float;

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Float(v) => Ok(v),
            #[allow(clippy::cast_precision_loss)]
            Value::Double(v) => Ok(v as f32),
            other => other
                .as_i64()
                .map(|v| v as f32)
                .ok_or_else(|| mismatch("real", &other)),
        }
    }
}

impl ColumnValue for String {
    const KIND: ValueKind = ValueKind::Text;

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl ColumnValue for Vec<u8> {
    const KIND: ValueKind = ValueKind::Bytes;

    fn to_value(&self) -> Value {
        Value::Bytes(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Bytes(b) => Ok(b),
            Value::Text(s) => Ok(s.into_bytes()),
            other => Err(mismatch("bytes", &other)),
        }
    }
}

impl ColumnValue for NaiveDate {
    const KIND: ValueKind = ValueKind::Date;

    fn to_value(&self) -> Value {
        Value::Date(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Date(d) => Ok(d),
            Value::Timestamp(ts) => Ok(ts.date()),
            Value::Text(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| ConversionError::new("date", "unparseable text")),
            other => Err(mismatch("date", &other)),
        }
    }
}

impl ColumnValue for NaiveTime {
    const KIND: ValueKind = ValueKind::Time;

    fn to_value(&self) -> Value {
        Value::Time(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Time(t) => Ok(t),
            Value::Text(s) => NaiveTime::parse_from_str(s.trim(), "%H:%M:%S%.f")
                .map_err(|_| ConversionError::new("time", "unparseable text")),
            other => Err(mismatch("time", &other)),
        }
    }
}

impl ColumnValue for NaiveDateTime {
    const KIND: ValueKind = ValueKind::Timestamp;

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Timestamp(ts) => Ok(ts),
            Value::Text(s) => {
                let s = s.trim();
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
                    .map_err(|_| ConversionError::new("timestamp", "unparseable text"))
            }
            other => Err(mismatch("timestamp", &other)),
        }
    }
}

impl<T: ColumnValue> ColumnValue for Option<T> {
    const KIND: ValueKind = T::KIND;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        match self {
            Some(v) => v.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Result<Self, ConversionError> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}
