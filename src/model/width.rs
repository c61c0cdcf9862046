use std::fmt;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

/// A note width, as a percentage of the space the editor can give the text column.
///
/// Every constructor clamps into `0..=100`, so a `Width` is always in range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub struct Width(u8);

impl Width {
    pub const MIN: Width = Width(0);
    pub const MAX: Width = Width(100);

    /// Clamp an arbitrary integer into the valid range.
    pub fn clamped(value: i64) -> Self {
        Width(value.clamp(0, 100) as u8)
    }

    /// Clamp a float, rounding to the nearest percent. NaN has no width.
    pub fn from_f64(value: f64) -> Option<Self> {
        if value.is_nan() {
            return None;
        }
        Some(Width(value.round().clamp(0.0, 100.0) as u8))
    }

    /// Interpret a front-matter value as a width.
    ///
    /// Numbers and numeric strings are clamped; anything else is malformed.
    pub fn from_yaml(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Width::clamped(i)),
                None => n.as_f64().and_then(Width::from_f64),
            },
            Value::String(s) => {
                let s = s.trim();
                s.parse::<i64>()
                    .map(Width::clamped)
                    .ok()
                    .or_else(|| s.parse::<f64>().ok().and_then(Width::from_f64))
            }
            Value::Tagged(tagged) => Width::from_yaml(&tagged.value),
            _ => None,
        }
    }

    /// Parse text typed into the width field.
    ///
    /// Reads a leading integer the way a three-character number box does:
    /// surrounding whitespace and leading zeros are ignored, at most three
    /// significant digits are kept, and input without any digits counts as
    /// the minimum.
    pub fn parse_input(input: &str) -> Self {
        let s = input.trim();
        let (negative, rest) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s.strip_prefix('+').unwrap_or(s)),
        };
        let end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        if end == 0 || negative {
            return Width::MIN;
        }
        let significant: String = rest[..end].trim_start_matches('0').chars().take(3).collect();
        if significant.is_empty() {
            return Width::MIN;
        }
        significant.parse::<i64>().map_or(Width::MIN, Width::clamped)
    }

    pub fn percent(self) -> u8 {
        self.0
    }

    pub fn to_yaml(self) -> Value {
        Value::Number(u64::from(self.0).into())
    }
}

impl From<i64> for Width {
    fn from(value: i64) -> Self {
        Width::clamped(value)
    }
}

impl From<Width> for i64 {
    fn from(width: Width) -> Self {
        i64::from(width.0)
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
