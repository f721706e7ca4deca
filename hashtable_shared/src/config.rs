//! Configuration system.
//!
//! Loads table definitions from JSON strings (file IO left to the app).

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::context::OpContext;
use crate::dtype::DataType;
use crate::error::LookupError;
use crate::factory::is_supported;
use crate::kernels::{hashtable, hashtable_import, HashtableParams};
use crate::resources::ResourceMap;
use crate::tensor::Tensor;

/// One table to create at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    pub resource_id: i32,
    pub key_dtype: DataType,
    pub value_dtype: DataType,
    /// Initial keys; imported together with `values` when either is non-empty.
    #[serde(default)]
    pub keys: Vec<serde_json::Value>,
    #[serde(default)]
    pub values: Vec<serde_json::Value>,
}

impl TableConfig {
    fn params(&self) -> HashtableParams {
        HashtableParams {
            table_id: self.resource_id,
            key_dtype: self.key_dtype,
            value_dtype: self.value_dtype,
        }
    }

    fn has_data(&self) -> bool {
        !self.keys.is_empty() || !self.values.is_empty()
    }
}

/// Root configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashtableConfig {
    /// `tracing` filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for HashtableConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            tables: Vec::new(),
        }
    }
}

impl HashtableConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Creates every configured table in `resources` and imports its data.
    ///
    /// Stops at the first table that fails.
    pub fn apply(&self, ctx: &mut dyn OpContext, resources: &mut ResourceMap) -> Result<(), LookupError> {
        for table in &self.tables {
            if !is_supported(table.key_dtype, table.value_dtype) {
                return Err(LookupError::UnsupportedTypes {
                    key: table.key_dtype,
                    value: table.value_dtype,
                });
            }

            let mut handle = Tensor::scalar(0i32);
            hashtable(ctx, resources, &table.params(), &mut handle)?;

            if table.has_data() {
                let keys = Tensor::from_json(table.key_dtype, &table.keys)?;
                let values = Tensor::from_json(table.value_dtype, &table.values)?;
                hashtable_import(ctx, resources, &handle, &keys, &values)?;
            }
            info!(
                resource_id = table.resource_id,
                entries = table.keys.len(),
                "Configured hashtable"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LoggingContext;
    use crate::hashtable::LookupInterface;
    use crate::resources::get_hashtable_resource;

    const SAMPLE: &str = r#"{
        "tables": [
            { "resource_id": 1, "key_dtype": "int32", "value_dtype": "string",
              "keys": [1, 2], "values": ["a", "b"] },
            { "resource_id": 2, "key_dtype": "string", "value_dtype": "float32" }
        ]
    }"#;

    #[test]
    fn parses_with_defaults() {
        let cfg = HashtableConfig::from_json_str(SAMPLE).unwrap();
        assert_eq!(cfg.log_filter, "info");
        assert_eq!(cfg.tables.len(), 2);
        assert_eq!(cfg.tables[1].value_dtype, DataType::Float32);
        assert!(cfg.tables[1].keys.is_empty());
    }

    #[test]
    fn apply_creates_and_imports() {
        let cfg = HashtableConfig::from_json_str(SAMPLE).unwrap();
        let mut ctx = LoggingContext::new();
        let mut resources = ResourceMap::new();
        cfg.apply(&mut ctx, &mut resources).unwrap();

        assert_eq!(resources.ids(), vec![1, 2]);
        let table = get_hashtable_resource(&mut resources, 1).unwrap();
        assert_eq!(table.size(), 2);
        let empty = get_hashtable_resource(&mut resources, 2).unwrap();
        assert_eq!(empty.size(), 0);
    }

    #[test]
    fn apply_rejects_unsupported_pair() {
        let cfg = HashtableConfig::from_json_str(
            r#"{ "tables": [ { "resource_id": 3, "key_dtype": "float32", "value_dtype": "int32" } ] }"#,
        )
        .unwrap();
        let mut resources = ResourceMap::new();
        let err = cfg.apply(&mut LoggingContext::new(), &mut resources).unwrap_err();
        assert!(matches!(err, LookupError::UnsupportedTypes { .. }));
        assert!(resources.is_empty());
    }

    #[test]
    fn apply_rejects_bad_values() {
        let cfg = HashtableConfig::from_json_str(
            r#"{ "tables": [ { "resource_id": 3, "key_dtype": "int32", "value_dtype": "int32",
                               "keys": [1], "values": ["one"] } ] }"#,
        )
        .unwrap();
        let mut resources = ResourceMap::new();
        let err = cfg.apply(&mut LoggingContext::new(), &mut resources).unwrap_err();
        assert!(matches!(err, LookupError::Tensor(_)));
    }
}
