//! Op kernels over the resource registry.
//!
//! These are the entry points a graph executor calls. Each takes a handle
//! tensor (an int32 scalar holding a resource id), validates the tensors it
//! is given against the table, and forwards to the [`LookupInterface`].
//! Failures are reported through the [`OpContext`] before being returned.

use serde::{Deserialize, Serialize};

use crate::context::{report, OpContext};
use crate::dtype::DataType;
use crate::error::LookupError;
use crate::factory::is_supported;
use crate::hashtable::LookupInterface;
use crate::resources::{
    create_hashtable_resource_if_not_available, get_hashtable_resource, Resource, ResourceMap,
};
use crate::tensor::{Tensor, TensorReader};

/// Attributes of a hashtable-creating node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtableParams {
    pub table_id: i32,
    pub key_dtype: DataType,
    pub value_dtype: DataType,
}

/// Ensures the table exists and writes its handle into `output`.
pub fn hashtable(
    ctx: &mut dyn OpContext,
    resources: &mut ResourceMap,
    params: &HashtableParams,
    output: &mut Tensor,
) -> Result<(), LookupError> {
    create_hashtable_resource_if_not_available(
        resources,
        params.table_id,
        params.key_dtype,
        params.value_dtype,
    );
    if !resources.contains(params.table_id) && !is_supported(params.key_dtype, params.value_dtype) {
        return Err(report(
            ctx,
            LookupError::UnsupportedTypes {
                key: params.key_dtype,
                value: params.value_dtype,
            },
        ));
    }
    *output = Tensor::scalar(params.table_id);
    Ok(())
}

/// Populates the table behind `handle` from `keys`/`values`.
pub fn hashtable_import(
    ctx: &mut dyn OpContext,
    resources: &mut ResourceMap,
    handle: &Tensor,
    keys: &Tensor,
    values: &Tensor,
) -> Result<(), LookupError> {
    let table = table_for(ctx, resources, handle)?;
    if table.is_initialized() {
        return Ok(());
    }
    check_types(ctx, table, keys.dtype(), values.dtype())?;
    if keys.shape() != values.shape() {
        return Err(report(
            ctx,
            LookupError::ShapeMismatch {
                keys: keys.shape().to_vec(),
                values: values.shape().to_vec(),
            },
        ));
    }
    table.import(ctx, keys, values)
}

/// Looks up `keys` in the table behind `handle`.
///
/// Once the table is known to be populated and the inputs check out,
/// `output` is reshaped to the key shape and retyped to the table's value
/// type. A failed call leaves `output` untouched.
pub fn hashtable_find(
    ctx: &mut dyn OpContext,
    resources: &mut ResourceMap,
    handle: &Tensor,
    keys: &Tensor,
    default_value: &Tensor,
    output: &mut Tensor,
) -> Result<(), LookupError> {
    let table = table_for(ctx, resources, handle)?;
    if !table.is_initialized() {
        return Err(report(ctx, LookupError::NotInitialized));
    }
    check_types(ctx, table, keys.dtype(), default_value.dtype())?;
    if default_value.flat_size() == 0 {
        return Err(report(ctx, LookupError::EmptyDefault));
    }
    *output = Tensor::zeros(table.value_type(), keys.shape())
        .map_err(|e| report(ctx, LookupError::from(e)))?;
    table.lookup(ctx, keys, output, default_value)
}

/// Writes the entry count of the table behind `handle` as an int64 scalar.
pub fn hashtable_size(
    ctx: &mut dyn OpContext,
    resources: &mut ResourceMap,
    handle: &Tensor,
    output: &mut Tensor,
) -> Result<(), LookupError> {
    let table = table_for(ctx, resources, handle)?;
    *output = Tensor::scalar(table.size() as i64);
    Ok(())
}

fn table_for<'r>(
    ctx: &mut dyn OpContext,
    resources: &'r mut ResourceMap,
    handle: &Tensor,
) -> Result<&'r mut (dyn LookupInterface + 'static), LookupError> {
    let reader =
        TensorReader::<i32>::new(handle).map_err(|e| report(ctx, LookupError::from(e)))?;
    if reader.len() != 1 {
        return Err(report(
            ctx,
            LookupError::InvalidHandle(handle.shape().to_vec()),
        ));
    }
    let resource_id = *reader.get(0);
    get_hashtable_resource(resources, resource_id)
        .ok_or_else(|| report(ctx, LookupError::MissingResource(resource_id)))
}

fn check_types(
    ctx: &mut dyn OpContext,
    table: &dyn LookupInterface,
    key: DataType,
    value: DataType,
) -> Result<(), LookupError> {
    if table.check_key_and_value_types(key, value) {
        return Ok(());
    }
    Err(report(
        ctx,
        LookupError::TypeMismatch {
            expected: (table.key_type(), table.value_type()),
            actual: (key, value),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::LoggingContext;

    fn params(table_id: i32, key_dtype: DataType, value_dtype: DataType) -> HashtableParams {
        HashtableParams {
            table_id,
            key_dtype,
            value_dtype,
        }
    }

    #[test]
    fn create_import_find_size() {
        let mut ctx = LoggingContext::new();
        let mut resources = ResourceMap::new();
        let mut handle = Tensor::scalar(0i32);

        hashtable(&mut ctx, &mut resources, &params(4, DataType::String, DataType::Int32), &mut handle).unwrap();
        assert_eq!(handle.to_vec::<i32>().unwrap(), vec![4]);

        let keys = Tensor::vector(vec!["a".to_string(), "b".to_string()]);
        hashtable_import(&mut ctx, &mut resources, &handle, &keys, &Tensor::vector(vec![1i32, 2])).unwrap();

        let query = Tensor::from_vec(&[1, 3], vec!["b".to_string(), "z".to_string(), "a".to_string()]).unwrap();
        let mut out = Tensor::scalar(0.0f32);
        hashtable_find(&mut ctx, &mut resources, &handle, &query, &Tensor::scalar(-1i32), &mut out).unwrap();
        assert_eq!(out.shape(), &[1, 3]);
        assert_eq!(out.to_vec::<i32>().unwrap(), vec![2, -1, 1]);

        let mut size = Tensor::scalar(0i64);
        hashtable_size(&mut ctx, &mut resources, &handle, &mut size).unwrap();
        assert!(size.shape().is_empty());
        assert_eq!(size.to_vec::<i64>().unwrap(), vec![2]);
        assert!(ctx.reports().is_empty());
    }

    #[test]
    fn unsupported_pair_is_reported() {
        let mut ctx = LoggingContext::new();
        let mut resources = ResourceMap::new();
        let mut handle = Tensor::scalar(0i32);
        let err = hashtable(&mut ctx, &mut resources, &params(1, DataType::Bool, DataType::Int32), &mut handle)
            .unwrap_err();
        assert_eq!(
            err,
            LookupError::UnsupportedTypes {
                key: DataType::Bool,
                value: DataType::Int32
            }
        );
        assert!(resources.is_empty());
        assert_eq!(ctx.reports().len(), 1);
    }

    #[test]
    fn mismatched_types_and_shapes_rejected() {
        let mut ctx = LoggingContext::new();
        let mut resources = ResourceMap::new();
        let mut handle = Tensor::scalar(0i32);
        hashtable(&mut ctx, &mut resources, &params(1, DataType::Int32, DataType::Float32), &mut handle).unwrap();

        let err = hashtable_import(
            &mut ctx,
            &mut resources,
            &handle,
            &Tensor::vector(vec![1i32]),
            &Tensor::vector(vec![1i32]),
        )
        .unwrap_err();
        assert!(matches!(err, LookupError::TypeMismatch { .. }));

        let err = hashtable_import(
            &mut ctx,
            &mut resources,
            &handle,
            &Tensor::vector(vec![1i32, 2]),
            &Tensor::vector(vec![1.0f32]),
        )
        .unwrap_err();
        assert!(matches!(err, LookupError::ShapeMismatch { .. }));
        assert!(!resources.get(1).unwrap().is_initialized());

        hashtable_import(
            &mut ctx,
            &mut resources,
            &handle,
            &Tensor::vector(vec![1i32]),
            &Tensor::vector(vec![1.0f32]),
        )
        .unwrap();

        let mut out = Tensor::scalar(0.0f32);
        let err = hashtable_find(
            &mut ctx,
            &mut resources,
            &handle,
            &Tensor::vector(vec![1i32]),
            &Tensor::vector(Vec::<f32>::new()),
            &mut out,
        )
        .unwrap_err();
        assert_eq!(err, LookupError::EmptyDefault);
        assert_eq!(ctx.reports().len(), 3);
    }

    #[test]
    fn find_before_import_fails() {
        let mut ctx = LoggingContext::new();
        let mut resources = ResourceMap::new();
        let mut handle = Tensor::scalar(0i32);
        hashtable(&mut ctx, &mut resources, &params(9, DataType::Int32, DataType::Int32), &mut handle).unwrap();

        let mut out = Tensor::vector(vec![7i32, 7, 7]);
        let err = hashtable_find(
            &mut ctx,
            &mut resources,
            &handle,
            &Tensor::vector(vec![1i32]),
            &Tensor::scalar(0i32),
            &mut out,
        )
        .unwrap_err();
        assert_eq!(err, LookupError::NotInitialized);
        assert_eq!(out, Tensor::vector(vec![7i32, 7, 7]));

        let err = hashtable_find(
            &mut ctx,
            &mut resources,
            &handle,
            &Tensor::vector(vec![1i32]),
            &Tensor::vector(Vec::<i32>::new()),
            &mut out,
        )
        .unwrap_err();
        assert_eq!(err, LookupError::NotInitialized);
        assert_eq!(out, Tensor::vector(vec![7i32, 7, 7]));
        assert_eq!(ctx.reports().len(), 2);
    }

    #[test]
    fn repeated_import_skips_validation() {
        let mut ctx = LoggingContext::new();
        let mut resources = ResourceMap::new();
        let mut handle = Tensor::scalar(0i32);
        hashtable(&mut ctx, &mut resources, &params(6, DataType::Int32, DataType::Int32), &mut handle).unwrap();
        hashtable_import(
            &mut ctx,
            &mut resources,
            &handle,
            &Tensor::vector(vec![1i32]),
            &Tensor::vector(vec![10i32]),
        )
        .unwrap();

        hashtable_import(
            &mut ctx,
            &mut resources,
            &handle,
            &Tensor::vector(vec![2i32, 3]),
            &Tensor::vector(vec![2.0f32]),
        )
        .unwrap();
        assert!(ctx.reports().is_empty());

        let mut size = Tensor::scalar(0i64);
        hashtable_size(&mut ctx, &mut resources, &handle, &mut size).unwrap();
        assert_eq!(size, Tensor::scalar(1i64));
    }

    #[test]
    fn non_scalar_handle_is_invalid() {
        let mut ctx = LoggingContext::new();
        let mut resources = ResourceMap::new();
        let mut out = Tensor::scalar(0i64);
        let err = hashtable_size(&mut ctx, &mut resources, &Tensor::vector(vec![1i32, 2]), &mut out).unwrap_err();
        assert_eq!(err, LookupError::InvalidHandle(vec![2]));
        assert_eq!(ctx.last_report(), Some("resource handle must hold a single id, got shape [2]"));
        assert_eq!(out, Tensor::scalar(0i64));
    }

    #[test]
    fn unknown_handle_is_missing() {
        let mut ctx = LoggingContext::new();
        let mut resources = ResourceMap::new();
        let mut out = Tensor::scalar(0i64);
        let err = hashtable_size(&mut ctx, &mut resources, &Tensor::scalar(42i32), &mut out).unwrap_err();
        assert_eq!(err, LookupError::MissingResource(42));
        assert_eq!(ctx.last_report(), Some("no hashtable resource with id 42"));
    }
}
