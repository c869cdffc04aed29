/// Driver-native scalar values and their normalization to JSON-safe primitives
use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Number, Value as Json};

use crate::error::{Error, Result, eyre};

/// A scalar as yielded by a database cursor, before normalization.
///
/// The variants cover what the query endpoints actually return: plain JSON
/// scalars plus the driver types that need conversion (fixed-point decimals,
/// calendar dates, timestamps) and GeoJSON-shaped geometry columns.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    /// Fixed-point numeric column (DECIMAL/NUMERIC)
    Decimal(Decimal),
    /// DATE column
    Date(NaiveDate),
    /// DATETIME/TIMESTAMP column
    DateTime(NaiveDateTime),
    /// Geometry column, already shaped as a GeoJSON object
    Geometry(Json),
}

impl SourceValue {
    /// Convert to a JSON-safe primitive
    ///
    /// Shared rule set for both ends of the transport:
    /// - date/time values become ISO-8601 strings (`2019-06-01T00:00:00`),
    /// - decimals become floating-point numbers,
    /// - everything else passes through unchanged; null stays null.
    pub fn normalize(self) -> Result<Json> {
        match self {
            Self::Null => Ok(Json::Null),
            Self::Bool(b) => Ok(Json::Bool(b)),
            Self::Int(i) => Ok(Json::Number(Number::from(i))),
            Self::UInt(u) => Ok(Json::Number(Number::from(u))),
            Self::Float(f) => Ok(float_to_json(f)),
            Self::Text(s) => Ok(Json::String(s)),
            Self::Decimal(d) => {
                let f = d.to_f64().ok_or_else(|| {
                    Error::LibraryBug(eyre!("decimal {d} is outside the f64 range"))
                })?;
                Ok(float_to_json(f))
            }
            Self::Date(d) => Ok(Json::String(d.format("%Y-%m-%d").to_string())),
            // %.f prints fractional seconds only when nonzero
            Self::DateTime(dt) => Ok(Json::String(dt.format("%Y-%m-%dT%H:%M:%S%.f").to_string())),
            Self::Geometry(v) => Ok(v),
        }
    }
}

/// JSON has no NaN or infinity; non-finite values degrade to null.
fn float_to_json(f: f64) -> Json {
    match Number::from_f64(f) {
        Some(n) => Json::Number(n),
        None => {
            tracing::warn!(value = f, "non-finite float normalized to null");
            Json::Null
        }
    }
}

impl From<bool> for SourceValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for SourceValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<u64> for SourceValue {
    fn from(u: u64) -> Self {
        Self::UInt(u)
    }
}

impl From<f64> for SourceValue {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for SourceValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<Decimal> for SourceValue {
    fn from(d: Decimal) -> Self {
        Self::Decimal(d)
    }
}

impl From<NaiveDate> for SourceValue {
    fn from(d: NaiveDate) -> Self {
        Self::Date(d)
    }
}

impl From<NaiveDateTime> for SourceValue {
    fn from(dt: NaiveDateTime) -> Self {
        Self::DateTime(dt)
    }
}

impl<T: Into<SourceValue>> From<Option<T>> for SourceValue {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(v) => v.into(),
            None => Self::Null,
        }
    }
}
