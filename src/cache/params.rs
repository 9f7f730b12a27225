//! Parameter Tree Module
//!
//! Structured request parameters used as input to cache-key derivation.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::{CacheError, Result};

// == Param ==
/// One node of a request parameter tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    /// Explicit "no value"; dropped from maps during normalization
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<FixedOffset>),
    Date(NaiveDate),
    List(Vec<Param>),
    Map(Params),
}

// == Params ==
/// A named parameter set. Field order is whatever the caller used; it never
/// affects the derived key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    fields: Vec<(String, Param)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    // == With ==
    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Param>) -> Self {
        self.insert(name, value);
        self
    }

    // == Insert ==
    /// Sets a field, replacing any earlier value under the same name.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Param>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Param)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    // == From Serialize ==
    /// Converts any serializable request struct into a parameter tree.
    ///
    /// The value must serialize to a map; anything else is rejected with
    /// `InvalidParameters`.
    pub fn from_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        let json = serde_json::to_value(value)
            .map_err(|e| CacheError::InvalidParameters(e.to_string()))?;
        Self::from_json(json)
    }

    // == From JSON ==
    /// Converts a JSON object into a parameter tree.
    pub fn from_json(value: Value) -> Result<Self> {
        match Param::from(value) {
            Param::Map(params) => Ok(params),
            Param::Null => Ok(Params::new()),
            other => Err(CacheError::InvalidParameters(format!(
                "parameters must be a map, got {}",
                other.kind()
            ))),
        }
    }
}

impl Param {
    /// Short name of the variant, for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Param::Null => "null",
            Param::Bool(_) => "bool",
            Param::Int(_) | Param::UInt(_) => "integer",
            Param::Float(_) => "float",
            Param::Text(_) => "text",
            Param::Timestamp(_) => "timestamp",
            Param::Date(_) => "date",
            Param::List(_) => "list",
            Param::Map(_) => "map",
        }
    }
}

// == Conversions ==
impl From<Value> for Param {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Param::Null,
            Value::Bool(b) => Param::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Param::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Param::UInt(u)
                } else {
                    Param::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            Value::String(s) => Param::Text(s),
            Value::Array(items) => Param::List(items.into_iter().map(Param::from).collect()),
            Value::Object(map) => Param::Map(Params {
                fields: map.into_iter().map(|(k, v)| (k, Param::from(v))).collect(),
            }),
        }
    }
}

impl From<Params> for Param {
    fn from(params: Params) -> Self {
        Param::Map(params)
    }
}

impl From<&str> for Param {
    fn from(s: &str) -> Self {
        Param::Text(s.to_string())
    }
}

impl From<String> for Param {
    fn from(s: String) -> Self {
        Param::Text(s)
    }
}

impl From<bool> for Param {
    fn from(b: bool) -> Self {
        Param::Bool(b)
    }
}

impl From<i32> for Param {
    fn from(i: i32) -> Self {
        Param::Int(i as i64)
    }
}

impl From<i64> for Param {
    fn from(i: i64) -> Self {
        Param::Int(i)
    }
}

impl From<u32> for Param {
    fn from(u: u32) -> Self {
        Param::Int(u as i64)
    }
}

impl From<u64> for Param {
    fn from(u: u64) -> Self {
        Param::UInt(u)
    }
}

impl From<f64> for Param {
    fn from(f: f64) -> Self {
        Param::Float(f)
    }
}

impl From<DateTime<Utc>> for Param {
    fn from(ts: DateTime<Utc>) -> Self {
        Param::Timestamp(ts.fixed_offset())
    }
}

impl From<DateTime<FixedOffset>> for Param {
    fn from(ts: DateTime<FixedOffset>) -> Self {
        Param::Timestamp(ts)
    }
}

impl From<NaiveDate> for Param {
    fn from(d: NaiveDate) -> Self {
        Param::Date(d)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Param::Null, Into::into)
    }
}

impl<T: Into<Param>> From<Vec<T>> for Param {
    fn from(items: Vec<T>) -> Self {
        Param::List(items.into_iter().map(Into::into).collect())
    }
}
