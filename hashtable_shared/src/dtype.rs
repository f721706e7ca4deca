//! Element type tags.
//!
//! `DataType` is the closed set of element types a host graph can attach to a
//! tensor. Only a subset of it is usable as hashtable keys or values; see
//! [`crate::factory`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Runtime element type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    NoType,
    Float32,
    Int32,
    UInt8,
    Int64,
    String,
    Bool,
    Int16,
    Float64,
}

impl DataType {
    pub const ALL: [DataType; 9] = [
        DataType::NoType,
        DataType::Float32,
        DataType::Int32,
        DataType::UInt8,
        DataType::Int64,
        DataType::String,
        DataType::Bool,
        DataType::Int16,
        DataType::Float64,
    ];

    /// Lowercase name, as used in config files and console commands.
    pub fn name(&self) -> &'static str {
        match self {
            DataType::NoType => "notype",
            DataType::Float32 => "float32",
            DataType::Int32 => "int32",
            DataType::UInt8 => "uint8",
            DataType::Int64 => "int64",
            DataType::String => "string",
            DataType::Bool => "bool",
            DataType::Int16 => "int16",
            DataType::Float64 => "float64",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a type name is not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownDataType(pub String);

impl fmt::Display for UnknownDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown data type: {}", self.0)
    }
}

impl std::error::Error for UnknownDataType {}

impl FromStr for DataType {
    type Err = UnknownDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        DataType::ALL
            .iter()
            .copied()
            .find(|dtype| dtype.name() == s)
            .ok_or(UnknownDataType(s))
    }
}
