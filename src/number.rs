// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use anyhow::{bail, Result};
use serde::ser::Serializer;
use serde::Serialize;

// Largest integer magnitude an f64 can hold exactly.
const F64_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0; // 2^53

/// A JSON number as seen by templates.
///
/// Integers keep their exact representation; everything else is an `f64`.
/// Equality and ordering are numeric, so `Int(3)` equals `Float(3.0)`.
#[derive(Clone, Copy)]
pub enum Number {
    UInt(u64),
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::UInt(v) => *v as f64,
            Number::Int(v) => *v as f64,
            Number::Float(f) => *f,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Number::UInt(v) => i64::try_from(*v).ok(),
            Number::Int(v) => Some(*v),
            Number::Float(f) if f.fract() == 0.0 && f.abs() <= F64_SAFE_INTEGER => Some(*f as i64),
            Number::Float(_) => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Number::UInt(v) => Some(*v),
            Number::Int(v) => u64::try_from(*v).ok(),
            Number::Float(f) if *f >= 0.0 && f.fract() == 0.0 && *f <= F64_SAFE_INTEGER => {
                Some(*f as u64)
            }
            Number::Float(_) => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        match self {
            Number::UInt(_) | Number::Int(_) => true,
            Number::Float(f) => f.is_finite() && f.fract() == 0.0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_f64() == 0.0
    }

    /// Collapse integral floats back into an integer variant.
    pub fn normalize(self) -> Number {
        match self {
            Number::Float(f) if f.fract() == 0.0 && f.abs() <= F64_SAFE_INTEGER => {
                if f >= 0.0 {
                    Number::UInt(f as u64)
                } else {
                    Number::Int(f as i64)
                }
            }
            n => n,
        }
    }
}

impl From<u64> for Number {
    fn from(n: u64) -> Self {
        Number::UInt(n)
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        if n >= 0 {
            Number::UInt(n as u64)
        } else {
            Number::Int(n)
        }
    }
}

impl From<usize> for Number {
    fn from(n: usize) -> Self {
        Number::UInt(n as u64)
    }
}

impl From<i32> for Number {
    fn from(n: i32) -> Self {
        Number::from(n as i64)
    }
}

impl From<f64> for Number {
    fn from(n: f64) -> Self {
        Number::Float(n)
    }
}

impl FromStr for Number {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(u) = s.parse::<u64>() {
            return Ok(Number::UInt(u));
        }
        if let Ok(i) = s.parse::<i64>() {
            return Ok(Number::Int(i));
        }
        match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(Number::Float(f)),
            _ => bail!("invalid number `{s}`"),
        }
    }
}

impl PartialEq for Number {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Number::UInt(a), Number::UInt(b)) => a == b,
            (Number::Int(a), Number::Int(b)) => a == b,
            (Number::UInt(a), Number::Int(b)) | (Number::Int(b), Number::UInt(a)) => {
                i64::try_from(*a).map(|a| a == *b).unwrap_or(false)
            }
            _ => self.as_f64() == other.as_f64(),
        }
    }
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Number::UInt(a), Number::UInt(b)) => a.partial_cmp(b),
            (Number::Int(a), Number::Int(b)) => a.partial_cmp(b),
            _ => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl Serialize for Number {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.normalize() {
            Number::UInt(v) => serializer.serialize_u64(v),
            Number::Int(v) => serializer.serialize_i64(v),
            Number::Float(f) => serializer.serialize_f64(f),
        }
    }
}

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::UInt(v) => write!(f, "{v}"),
            Number::Int(v) => write!(f, "{v}"),
            Number::Float(v) => write!(f, "{v:?}"),
        }
    }
}

// Shortest human form: integral floats drop the fractional part.
impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::UInt(v) => write!(f, "{v}"),
            Number::Int(v) => write!(f, "{v}"),
            Number::Float(v) if v.is_nan() => f.write_str("NaN"),
            Number::Float(v) if v.is_infinite() && *v > 0.0 => f.write_str("Infinity"),
            Number::Float(v) if v.is_infinite() => f.write_str("-Infinity"),
            Number::Float(v) if v.fract() == 0.0 && v.abs() <= F64_SAFE_INTEGER => {
                write!(f, "{}", *v as i64)
            }
            Number::Float(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_variant_equality() {
        assert_eq!(Number::UInt(3), Number::Int(3));
        assert_eq!(Number::Int(-2), Number::Float(-2.0));
        assert_ne!(Number::UInt(u64::MAX), Number::Int(-1));
        assert!(Number::Float(1.5) < Number::UInt(2));
    }

    #[test]
    fn display_is_shortest_form() {
        assert_eq!(Number::Float(3.0).to_string(), "3");
        assert_eq!(Number::Float(-0.25).to_string(), "-0.25");
        assert_eq!(Number::Int(-42).to_string(), "-42");
        assert_eq!(Number::Float(f64::INFINITY).to_string(), "Infinity");
    }

    #[test]
    fn parse() -> Result<()> {
        assert_eq!(Number::from_str("18446744073709551615")?, Number::UInt(u64::MAX));
        assert_eq!(Number::from_str("-7")?, Number::Int(-7));
        assert_eq!(Number::from_str("2.5")?, Number::Float(2.5));
        assert!(Number::from_str("abc").is_err());
        Ok(())
    }
}
