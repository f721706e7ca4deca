//! Batched element buffers.
//!
//! A [`Tensor`] is a shape plus a flat run of elements of one [`DataType`].
//! Kernels never index tensor storage directly; they go through
//! [`TensorReader`] and [`TensorWriter`], which hide the difference between
//! fixed-width elements (stored in a `Vec`) and strings (stored packed in a
//! single byte buffer).
//!
//! # String layout
//! ```text
//! i32 count | i32 offset[0] .. i32 offset[count] | utf-8 payloads
//! ```
//! All integers are little-endian. Offsets are measured from the start of the
//! buffer and `offset[count]` is the total length.

use std::borrow::Cow;
use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::dtype::DataType;

/// Errors raised while reading or writing tensor storage.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorError {
    TypeMismatch { expected: DataType, actual: DataType },
    Malformed(String),
    Unsupported(DataType),
}

impl fmt::Display for TensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorError::TypeMismatch { expected, actual } => {
                write!(f, "tensor type mismatch: expected {}, got {}", expected, actual)
            }
            TensorError::Malformed(msg) => write!(f, "malformed tensor data: {}", msg),
            TensorError::Unsupported(dtype) => write!(f, "unsupported tensor type: {}", dtype),
        }
    }
}

impl std::error::Error for TensorError {}

/// Backing storage of a tensor.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float32(Vec<f32>),
    /// Packed strings, see the module docs.
    String(Bytes),
}

impl TensorData {
    pub fn dtype(&self) -> DataType {
        match self {
            TensorData::Int32(_) => DataType::Int32,
            TensorData::Int64(_) => DataType::Int64,
            TensorData::Float32(_) => DataType::Float32,
            TensorData::String(_) => DataType::String,
        }
    }

    fn zeroed(dtype: DataType, len: usize) -> Result<Self, TensorError> {
        match dtype {
            DataType::Int32 => Ok(TensorData::Int32(vec![0; len])),
            DataType::Int64 => Ok(TensorData::Int64(vec![0; len])),
            DataType::Float32 => Ok(TensorData::Float32(vec![0.0; len])),
            DataType::String => Ok(TensorData::String(pack_strings(&vec![""; len]))),
            other => Err(TensorError::Unsupported(other)),
        }
    }
}

/// Number of elements described by `shape`. A scalar (empty shape) holds one.
pub fn flat_size(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Flat size shared by two shapes.
///
/// # Panics
/// Panics if the shapes differ. Callers are expected to have validated shapes
/// before handing tensors to the engine.
pub fn matching_flat_size(a: &[usize], b: &[usize]) -> usize {
    assert_eq!(a, b, "tensor shapes must match");
    flat_size(a)
}

/// A shaped, typed element buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
}

impl Tensor {
    /// Creates a zero-filled tensor (empty strings for string tensors).
    pub fn zeros(dtype: DataType, shape: &[usize]) -> Result<Self, TensorError> {
        Ok(Tensor {
            shape: shape.to_vec(),
            data: TensorData::zeroed(dtype, flat_size(shape))?,
        })
    }

    /// Creates a tensor from flat values.
    ///
    /// Fails with `Malformed` when `values.len()` does not fit `shape`.
    pub fn from_vec<T: TensorElement>(shape: &[usize], values: Vec<T>) -> Result<Self, TensorError> {
        if values.len() != flat_size(shape) {
            return Err(TensorError::Malformed(format!(
                "{} values do not fit shape {:?}",
                values.len(),
                shape
            )));
        }
        Ok(Tensor {
            shape: shape.to_vec(),
            data: T::into_data(values),
        })
    }

    /// Creates a 1-D tensor.
    pub fn vector<T: TensorElement>(values: Vec<T>) -> Self {
        Tensor {
            shape: vec![values.len()],
            data: T::into_data(values),
        }
    }

    /// Creates a 0-D tensor holding one value.
    pub fn scalar<T: TensorElement>(value: T) -> Self {
        Tensor {
            shape: Vec::new(),
            data: T::into_data(vec![value]),
        }
    }

    /// Builds a 1-D tensor from JSON scalars.
    pub fn from_json(dtype: DataType, values: &[serde_json::Value]) -> Result<Self, TensorError> {
        fn convert<T>(
            values: &[serde_json::Value],
            dtype: DataType,
            f: impl Fn(&serde_json::Value) -> Option<T>,
        ) -> Result<Vec<T>, TensorError> {
            values
                .iter()
                .map(|v| {
                    f(v).ok_or_else(|| TensorError::Malformed(format!("expected {}, got {}", dtype, v)))
                })
                .collect()
        }

        match dtype {
            DataType::Int32 => Ok(Tensor::vector(convert(values, dtype, |v| {
                v.as_i64().and_then(|n| i32::try_from(n).ok())
            })?)),
            DataType::Int64 => Ok(Tensor::vector(convert(values, dtype, |v| v.as_i64())?)),
            DataType::Float32 => Ok(Tensor::vector(convert(values, dtype, |v| {
                v.as_f64().map(|n| n as f32)
            })?)),
            DataType::String => Ok(Tensor::vector(convert(values, dtype, |v| {
                v.as_str().map(str::to_string)
            })?)),
            other => Err(TensorError::Unsupported(other)),
        }
    }

    /// Builds a 1-D tensor by parsing each token as `dtype`.
    pub fn parse_vector(dtype: DataType, tokens: &[&str]) -> Result<Self, TensorError> {
        fn parse_all<T: std::str::FromStr>(tokens: &[&str], dtype: DataType) -> Result<Vec<T>, TensorError> {
            tokens
                .iter()
                .map(|t| {
                    t.parse::<T>()
                        .map_err(|_| TensorError::Malformed(format!("cannot parse '{}' as {}", t, dtype)))
                })
                .collect()
        }

        match dtype {
            DataType::Int32 => Ok(Tensor::vector(parse_all::<i32>(tokens, dtype)?)),
            DataType::Int64 => Ok(Tensor::vector(parse_all::<i64>(tokens, dtype)?)),
            DataType::Float32 => Ok(Tensor::vector(parse_all::<f32>(tokens, dtype)?)),
            DataType::String => Ok(Tensor::vector(
                tokens.iter().map(|t| t.to_string()).collect::<Vec<_>>(),
            )),
            other => Err(TensorError::Unsupported(other)),
        }
    }

    pub fn dtype(&self) -> DataType {
        self.data.dtype()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    pub fn flat_size(&self) -> usize {
        flat_size(&self.shape)
    }

    /// Reshapes the tensor, discarding its contents.
    pub fn resize(&mut self, shape: &[usize]) -> Result<(), TensorError> {
        self.data = TensorData::zeroed(self.dtype(), flat_size(shape))?;
        self.shape = shape.to_vec();
        Ok(())
    }

    /// Copies the elements out as `T`.
    pub fn to_vec<T: TensorElement>(&self) -> Result<Vec<T>, TensorError> {
        Ok(T::read(&self.data)?.into_owned())
    }

    /// Renders each element for display.
    pub fn display_values(&self) -> Result<Vec<String>, TensorError> {
        Ok(match &self.data {
            TensorData::Int32(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::Int64(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::Float32(v) => v.iter().map(|x| x.to_string()).collect(),
            TensorData::String(raw) => unpack_strings(raw)?
                .into_iter()
                .map(|s| format!("{:?}", s))
                .collect(),
        })
    }

    /// Bytes held by the storage.
    pub fn byte_size(&self) -> usize {
        match &self.data {
            TensorData::Int32(v) => v.len() * 4,
            TensorData::Int64(v) => v.len() * 8,
            TensorData::Float32(v) => v.len() * 4,
            TensorData::String(raw) => raw.len(),
        }
    }
}

/// Packs strings into the layout described in the module docs.
pub fn pack_strings<S: AsRef<str>>(items: &[S]) -> Bytes {
    let count = items.len();
    let header = 4 * (count + 2);
    let payload: usize = items.iter().map(|s| s.as_ref().len()).sum();

    let mut buf = BytesMut::with_capacity(header + payload);
    buf.put_i32_le(count as i32);
    let mut offset = header;
    for s in items {
        buf.put_i32_le(offset as i32);
        offset += s.as_ref().len();
    }
    buf.put_i32_le(offset as i32);
    for s in items {
        buf.put_slice(s.as_ref().as_bytes());
    }
    buf.freeze()
}

/// Unpacks strings written by [`pack_strings`].
pub fn unpack_strings(raw: &Bytes) -> Result<Vec<String>, TensorError> {
    let malformed = |msg: &str| TensorError::Malformed(msg.to_string());

    let mut cursor = raw.clone();
    if cursor.remaining() < 4 {
        return Err(malformed("missing string count"));
    }
    let count = usize::try_from(cursor.get_i32_le()).map_err(|_| malformed("negative string count"))?;
    if cursor.remaining() < 4 * (count + 1) {
        return Err(malformed("truncated offset table"));
    }

    let mut offsets = Vec::with_capacity(count + 1);
    for _ in 0..=count {
        let offset = usize::try_from(cursor.get_i32_le()).map_err(|_| malformed("negative offset"))?;
        offsets.push(offset);
    }

    let header = 4 * (count + 2);
    if offsets[0] < header || offsets[count] > raw.len() {
        return Err(malformed("offset out of bounds"));
    }

    offsets
        .windows(2)
        .map(|w| {
            if w[1] < w[0] {
                return Err(malformed("offsets not monotonic"));
            }
            String::from_utf8(raw[w[0]..w[1]].to_vec()).map_err(|_| malformed("invalid utf-8"))
        })
        .collect()
}

/// Rust element types that can live in a [`Tensor`].
pub trait TensorElement: Clone + Default + fmt::Debug + Send + Sync + 'static {
    const DTYPE: DataType;

    /// Writes go through an owned buffer that [`TensorWriter::commit`] flushes.
    const STAGED: bool = false;

    fn read(data: &TensorData) -> Result<Cow<'_, [Self]>, TensorError>;

    /// Direct mutable access; only called when `STAGED` is false.
    fn slice_mut(data: &mut TensorData) -> Result<&mut [Self], TensorError>;

    fn into_data(values: Vec<Self>) -> TensorData;

    /// Approximate heap footprint of one element.
    fn footprint(&self) -> usize {
        std::mem::size_of::<Self>()
    }
}

fn mismatch<T: TensorElement>(data: &TensorData) -> TensorError {
    TensorError::TypeMismatch {
        expected: T::DTYPE,
        actual: data.dtype(),
    }
}

macro_rules! fixed_width_element {
    ($ty:ty, $variant:ident) => {
        impl TensorElement for $ty {
            const DTYPE: DataType = DataType::$variant;

            fn read(data: &TensorData) -> Result<Cow<'_, [Self]>, TensorError> {
                match data {
                    TensorData::$variant(values) => Ok(Cow::Borrowed(values.as_slice())),
                    other => Err(mismatch::<Self>(other)),
                }
            }

            fn slice_mut(data: &mut TensorData) -> Result<&mut [Self], TensorError> {
                match data {
                    TensorData::$variant(values) => Ok(values.as_mut_slice()),
                    other => Err(mismatch::<Self>(other)),
                }
            }

            fn into_data(values: Vec<Self>) -> TensorData {
                TensorData::$variant(values)
            }
        }
    };
}

fixed_width_element!(i32, Int32);
fixed_width_element!(i64, Int64);
fixed_width_element!(f32, Float32);

impl TensorElement for String {
    const DTYPE: DataType = DataType::String;
    const STAGED: bool = true;

    fn read(data: &TensorData) -> Result<Cow<'_, [Self]>, TensorError> {
        match data {
            TensorData::String(raw) => Ok(Cow::Owned(unpack_strings(raw)?)),
            other => Err(mismatch::<Self>(other)),
        }
    }

    fn slice_mut(_data: &mut TensorData) -> Result<&mut [Self], TensorError> {
        Err(TensorError::Unsupported(DataType::String))
    }

    fn into_data(values: Vec<Self>) -> TensorData {
        TensorData::String(pack_strings(&values))
    }

    fn footprint(&self) -> usize {
        std::mem::size_of::<Self>() + self.capacity()
    }
}

/// Read access to the elements of a tensor as `T`.
pub struct TensorReader<'a, T: TensorElement> {
    values: Cow<'a, [T]>,
}

impl<'a, T: TensorElement> TensorReader<'a, T> {
    pub fn new(tensor: &'a Tensor) -> Result<Self, TensorError> {
        Ok(Self {
            values: T::read(&tensor.data)?,
        })
    }

    pub fn get(&self, index: usize) -> &T {
        &self.values[index]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }
}

enum WriteTarget<'a, T> {
    Direct(&'a mut [T]),
    Staged { tensor: &'a mut Tensor, buffer: Vec<T> },
}

/// Write access to the elements of a tensor as `T`.
///
/// Writes to staged element types are only visible in the tensor after
/// [`commit`](Self::commit); dropping an uncommitted writer discards them.
pub struct TensorWriter<'a, T: TensorElement> {
    target: WriteTarget<'a, T>,
}

impl<'a, T: TensorElement> TensorWriter<'a, T> {
    pub fn new(tensor: &'a mut Tensor) -> Result<Self, TensorError> {
        if tensor.dtype() != T::DTYPE {
            return Err(mismatch::<T>(&tensor.data));
        }
        let target = if T::STAGED {
            let len = tensor.flat_size();
            let mut buffer = T::read(&tensor.data)?.into_owned();
            buffer.resize(len, T::default());
            WriteTarget::Staged { tensor, buffer }
        } else {
            WriteTarget::Direct(T::slice_mut(&mut tensor.data)?)
        };
        Ok(Self { target })
    }

    pub fn set(&mut self, index: usize, value: T) {
        match &mut self.target {
            WriteTarget::Direct(slice) => slice[index] = value,
            WriteTarget::Staged { buffer, .. } => buffer[index] = value,
        }
    }

    /// Flushes staged writes into the tensor. No-op for fixed-width types.
    pub fn commit(self) {
        if let WriteTarget::Staged { tensor, buffer } = self.target {
            tensor.data = T::into_data(buffer);
        }
    }
}
