//! Static hashtable engine.
//!
//! A [`StaticHashtable`] is filled exactly once by `import` and is read-only
//! afterwards. Graphs may run their initializer more than once, so every
//! import after the first succeeds without touching the table.
//!
//! Lookups broadcast a single default: element 0 of the default tensor is used
//! for every missing key, whatever the batch size.

use std::collections::HashMap;
use std::hash::Hash;

use tracing::debug;

use crate::context::{report, OpContext};
use crate::dtype::DataType;
use crate::error::LookupError;
use crate::resources::Resource;
use crate::tensor::{matching_flat_size, Tensor, TensorElement, TensorReader, TensorWriter};

/// Element types usable as hashtable keys.
pub trait TableKey: TensorElement + Eq + Hash {}

impl<T: TensorElement + Eq + Hash> TableKey for T {}

/// Type-erased hashtable operations.
pub trait LookupInterface: Resource {
    /// Looks up every element of `keys` and writes the results to `values`.
    ///
    /// `values` must already have the shape of `keys`. Fails with
    /// [`LookupError::NotInitialized`] before the first import, without
    /// writing anything.
    fn lookup(
        &self,
        ctx: &mut dyn OpContext,
        keys: &Tensor,
        values: &mut Tensor,
        default_value: &Tensor,
    ) -> Result<(), LookupError>;

    /// Populates the table. Only the first call has any effect.
    fn import(&mut self, ctx: &mut dyn OpContext, keys: &Tensor, values: &Tensor) -> Result<(), LookupError>;

    /// Number of entries.
    fn size(&self) -> usize;

    fn key_type(&self) -> DataType;

    fn value_type(&self) -> DataType;

    fn check_key_and_value_types(&self, key: DataType, value: DataType) -> bool {
        key == self.key_type() && value == self.value_type()
    }
}

/// Immutable-once-populated hashtable from `K` to `V`.
#[derive(Debug, Clone)]
pub struct StaticHashtable<K, V> {
    map: HashMap<K, V>,
    is_initialized: bool,
}

impl<K: TableKey, V: TensorElement> Default for StaticHashtable<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: TableKey, V: TensorElement> StaticHashtable<K, V> {
    pub fn new() -> Self {
        StaticHashtable {
            map: HashMap::new(),
            is_initialized: false,
        }
    }

    /// Inserts `keys[i] -> values[i]` unless the table is already populated.
    ///
    /// A key repeated within `keys` keeps its last value. Returns whether
    /// the call populated the table.
    ///
    /// # Panics
    /// Panics if `keys` and `values` differ in length.
    pub fn import_slices(&mut self, keys: &[K], values: &[V]) -> bool {
        if self.is_initialized {
            debug!(entries = self.map.len(), "Hashtable already initialized, import ignored");
            return false;
        }
        assert_eq!(keys.len(), values.len(), "key and value counts must match");

        self.map.reserve(keys.len());
        for (key, value) in keys.iter().zip(values) {
            self.map.insert(key.clone(), value.clone());
        }
        self.is_initialized = true;
        debug!(size = keys.len(), entries = self.map.len(), "Hashtable imported");
        true
    }

    /// Looks up each key, falling back to `default_values[0]` on a miss.
    pub fn lookup_slices(&self, keys: &[K], default_values: &[V]) -> Result<Vec<V>, LookupError> {
        if !self.is_initialized {
            return Err(LookupError::NotInitialized);
        }
        let default = default_values.first().ok_or(LookupError::EmptyDefault)?;
        Ok(keys.iter().map(|key| self.find(key, default).clone()).collect())
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.map.get(key)
    }

    pub fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    fn find<'a>(&'a self, key: &K, default: &'a V) -> &'a V {
        self.map.get(key).unwrap_or(default)
    }
}

impl<K: TableKey, V: TensorElement> Resource for StaticHashtable<K, V> {
    fn is_initialized(&self) -> bool {
        self.is_initialized
    }

    fn memory_usage(&self) -> usize {
        self.map
            .iter()
            .map(|(k, v)| k.footprint() + v.footprint())
            .sum()
    }
}

impl<K: TableKey, V: TensorElement> LookupInterface for StaticHashtable<K, V> {
    fn lookup(
        &self,
        ctx: &mut dyn OpContext,
        keys: &Tensor,
        values: &mut Tensor,
        default_value: &Tensor,
    ) -> Result<(), LookupError> {
        if !self.is_initialized {
            return Err(report(ctx, LookupError::NotInitialized));
        }
        let size = matching_flat_size(keys.shape(), values.shape());

        let key_reader =
            TensorReader::<K>::new(keys).map_err(|e| report(ctx, LookupError::from(e)))?;
        let default_reader =
            TensorReader::<V>::new(default_value).map_err(|e| report(ctx, LookupError::from(e)))?;
        if default_reader.is_empty() {
            return Err(report(ctx, LookupError::EmptyDefault));
        }
        let first_default = default_reader.get(0);

        let mut writer =
            TensorWriter::<V>::new(values).map_err(|e| report(ctx, LookupError::from(e)))?;
        for i in 0..size {
            writer.set(i, self.find(key_reader.get(i), first_default).clone());
        }
        writer.commit();

        debug!(size, "Hashtable lookup");
        Ok(())
    }

    fn import(&mut self, ctx: &mut dyn OpContext, keys: &Tensor, values: &Tensor) -> Result<(), LookupError> {
        if self.is_initialized {
            debug!("Hashtable already initialized, import ignored");
            return Ok(());
        }
        let size = matching_flat_size(keys.shape(), values.shape());

        let key_reader =
            TensorReader::<K>::new(keys).map_err(|e| report(ctx, LookupError::from(e)))?;
        let value_reader =
            TensorReader::<V>::new(values).map_err(|e| report(ctx, LookupError::from(e)))?;
        self.import_slices(&key_reader.as_slice()[..size], &value_reader.as_slice()[..size]);
        Ok(())
    }

    fn size(&self) -> usize {
        self.map.len()
    }

    fn key_type(&self) -> DataType {
        K::DTYPE
    }

    fn value_type(&self) -> DataType {
        V::DTYPE
    }
}
