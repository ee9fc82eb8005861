use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TypeError;

/// Identifier of a column inside one preparation's column-id space.
///
/// Column ids are rendered as zero-padded decimal strings (`"0004"`) and
/// allocated from a counter that only moves forward, so an id is never
/// reused within a history.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(u32);

impl ColumnId {
    /// Minimum number of digits in the rendered form.
    pub const WIDTH: usize = 4;

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The numeric value of this id.
    pub const fn value(&self) -> u32 {
        self.0
    }

    /// Move this id by `delta` positions.
    ///
    /// Fails if the result would be negative or overflow `u32`.
    pub fn offset(&self, delta: i64) -> Result<Self, TypeError> {
        let shifted = i64::from(self.0) + delta;
        u32::try_from(shifted)
            .map(Self)
            .map_err(|_| TypeError::ColumnIdOutOfRange { id: self.0, delta })
    }

    /// Parse a rendered column id. Only ASCII digits are accepted.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(TypeError::InvalidColumnId(s.to_string()));
        }
        s.parse::<u32>()
            .map(Self)
            .map_err(|_| TypeError::InvalidColumnId(s.to_string()))
    }
}

impl fmt::Debug for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ColumnId({self})")
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$}", self.0, width = Self::WIDTH)
    }
}

impl FromStr for ColumnId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ColumnId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ColumnId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
