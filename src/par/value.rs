use serde::{Deserialize, Serialize};
use std::fmt;

use super::ParError;

/// Declared type of a reduction parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParType {
    Bool,
    Int,
    Float,
    Str,
    IntList,
    FloatList,
    StrList,
}

impl ParType {
    fn element(&self) -> ParType {
        match self {
            ParType::IntList => ParType::Int,
            ParType::FloatList => ParType::Float,
            ParType::StrList => ParType::Str,
            other => *other,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, ParType::IntList | ParType::FloatList | ParType::StrList)
    }
}

impl fmt::Display for ParType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParType::Bool => "bool",
            ParType::Int => "int",
            ParType::Float => "float",
            ParType::Str => "str",
            ParType::IntList => "list of int",
            ParType::FloatList => "list of float",
            ParType::StrList => "list of str",
        };
        f.write_str(name)
    }
}

/// Value held by a reduction parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ParValue>),
}

impl ParValue {
    pub fn is_none(&self) -> bool {
        matches!(self, ParValue::None)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParValue::Float(f) => Some(*f),
            ParValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParValue]> {
        match self {
            ParValue::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    /// Parse the text of a config value for a parameter of type `dtype`.
    pub fn parse(key: &str, text: &str, dtype: ParType) -> Result<ParValue, ParError> {
        let text = text.trim();
        if text == "None" || text.is_empty() {
            return Ok(ParValue::None);
        }
        if dtype.is_list() {
            let items = text
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
                .map(|item| item.trim().trim_matches(['\'', '"']))
                .filter(|item| !item.is_empty())
                .map(|item| {
                    if item == "None" {
                        Ok(ParValue::None)
                    } else {
                        Self::parse_scalar(key, item, dtype.element())
                    }
                })
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(ParValue::List(items));
        }
        Self::parse_scalar(key, text, dtype)
    }

    fn parse_scalar(key: &str, text: &str, dtype: ParType) -> Result<ParValue, ParError> {
        let invalid = || ParError::InvalidValue {
            key: key.to_string(),
            value: text.to_string(),
            expected: dtype,
        };
        match dtype {
            ParType::Bool => match text.to_ascii_lowercase().as_str() {
                "true" => Ok(ParValue::Bool(true)),
                "false" => Ok(ParValue::Bool(false)),
                _ => Err(invalid()),
            },
            ParType::Int => text.parse().map(ParValue::Int).map_err(|_| invalid()),
            ParType::Float => text.parse().map(ParValue::Float).map_err(|_| invalid()),
            _ => Ok(ParValue::Str(text.trim_matches(['\'', '"']).to_string())),
        }
    }

    /// Coerce a programmatic value to `dtype`, promoting ints to floats and
    /// scalars to one-element lists.
    pub fn coerce(self, key: &str, dtype: ParType) -> Result<ParValue, ParError> {
        let mismatch = |value: &ParValue| ParError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: dtype,
        };
        match (dtype, self) {
            (_, ParValue::None) => Ok(ParValue::None),
            (ParType::Bool, v @ ParValue::Bool(_)) => Ok(v),
            (ParType::Int, v @ ParValue::Int(_)) => Ok(v),
            (ParType::Int, ParValue::Float(f)) if f.fract() == 0.0 => Ok(ParValue::Int(f as i64)),
            (ParType::Float, ParValue::Float(f)) => Ok(ParValue::Float(f)),
            (ParType::Float, ParValue::Int(i)) => Ok(ParValue::Float(i as f64)),
            (ParType::Str, v @ ParValue::Str(_)) => Ok(v),
            (list, ParValue::List(items)) if list.is_list() => items
                .into_iter()
                .map(|item| item.coerce(key, list.element()))
                .collect::<Result<Vec<_>, _>>()
                .map(ParValue::List),
            (list, scalar) if list.is_list() => {
                Ok(ParValue::List(vec![scalar.coerce(key, list.element())?]))
            }
            (_, other) => Err(mismatch(&other)),
        }
    }
}

impl fmt::Display for ParValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParValue::None => f.write_str("None"),
            ParValue::Bool(b) => f.write_str(if *b { "True" } else { "False" }),
            ParValue::Int(i) => write!(f, "{}", i),
            ParValue::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() && v.abs() < 1e15 {
                    write!(f, "{:.1}", v)
                } else {
                    write!(f, "{}", v)
                }
            }
            ParValue::Str(s) => f.write_str(s),
            ParValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                f.write_str(&parts.join(", "))
            }
        }
    }
}

impl From<bool> for ParValue {
    fn from(v: bool) -> Self {
        ParValue::Bool(v)
    }
}

impl From<i64> for ParValue {
    fn from(v: i64) -> Self {
        ParValue::Int(v)
    }
}

impl From<i32> for ParValue {
    fn from(v: i32) -> Self {
        ParValue::Int(v as i64)
    }
}

impl From<f64> for ParValue {
    fn from(v: f64) -> Self {
        ParValue::Float(v)
    }
}

impl From<&str> for ParValue {
    fn from(v: &str) -> Self {
        ParValue::Str(v.to_string())
    }
}

impl From<String> for ParValue {
    fn from(v: String) -> Self {
        ParValue::Str(v)
    }
}

impl<T: Into<ParValue>> From<Vec<T>> for ParValue {
    fn from(v: Vec<T>) -> Self {
        ParValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ParValue>> From<Option<T>> for ParValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(ParValue::None, Into::into)
    }
}
