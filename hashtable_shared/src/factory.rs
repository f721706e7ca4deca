//! Type-dispatch factory.
//!
//! Maps a runtime `(key, value)` type pair onto a concrete
//! [`StaticHashtable`] instantiation. Supported pairs:
//!
//! | key \ value | int32 | float32 | string |
//! |-------------|-------|---------|--------|
//! | int32       | yes   | yes     | yes    |
//! | string      | yes   | yes     | yes    |
//!
//! Anything else yields `None`; there is no generic fallback.

use tracing::warn;

use crate::dtype::DataType;
use crate::hashtable::{LookupInterface, StaticHashtable, TableKey};

/// Key types a table can be built with.
pub const SUPPORTED_KEY_TYPES: [DataType; 2] = [DataType::Int32, DataType::String];

/// Value types a table can be built with.
pub const SUPPORTED_VALUE_TYPES: [DataType; 3] = [DataType::Int32, DataType::Float32, DataType::String];

/// Builds an empty, uninitialized table for the given type pair.
pub fn create_static_hashtable(key_type: DataType, value_type: DataType) -> Option<Box<dyn LookupInterface>> {
    let table = match key_type {
        DataType::Int32 => create_with_key::<i32>(value_type),
        DataType::String => create_with_key::<String>(value_type),
        _ => None,
    };
    if table.is_none() {
        warn!(%key_type, %value_type, "Unsupported hashtable type pair");
    }
    table
}

fn create_with_key<K: TableKey>(value_type: DataType) -> Option<Box<dyn LookupInterface>> {
    match value_type {
        DataType::Int32 => Some(Box::new(StaticHashtable::<K, i32>::new())),
        DataType::Float32 => Some(Box::new(StaticHashtable::<K, f32>::new())),
        DataType::String => Some(Box::new(StaticHashtable::<K, String>::new())),
        _ => None,
    }
}

/// Whether [`create_static_hashtable`] accepts this pair.
pub fn is_supported(key_type: DataType, value_type: DataType) -> bool {
    SUPPORTED_KEY_TYPES.contains(&key_type) && SUPPORTED_VALUE_TYPES.contains(&value_type)
}
