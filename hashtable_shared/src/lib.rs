//! `hashtable_shared`
//!
//! Static hashtable resources for graph executors.
//!
//! Design goals:
//! - Tables are populated once and read-only afterwards.
//! - Key/value element types are picked at runtime from a closed set and
//!   dispatched once, at creation, to a statically typed table.
//! - The registry owns every table; callers borrow.
//! - No `unsafe`.

pub mod config;
pub mod console;
pub mod context;
pub mod dtype;
pub mod error;
pub mod factory;
pub mod hashtable;
pub mod kernels;
pub mod resources;
pub mod tensor;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::context::{LoggingContext, OpContext};
    pub use crate::dtype::DataType;
    pub use crate::error::LookupError;
    pub use crate::factory::create_static_hashtable;
    pub use crate::hashtable::{LookupInterface, StaticHashtable};
    pub use crate::kernels::{hashtable, hashtable_find, hashtable_import, hashtable_size, HashtableParams};
    pub use crate::resources::{
        create_hashtable_resource_if_not_available, get_hashtable_resource, Resource, ResourceMap,
    };
    pub use crate::tensor::{Tensor, TensorError};
}
