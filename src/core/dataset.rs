//! Leaf payloads: scalars and homogeneous arrays.

use std::fmt;

use half::f16;
use num_complex::{Complex32, Complex64};
use smallvec::SmallVec;

use crate::util::{Dimensions, Error, PlainOldDataType, PodElement, Result};

/// A single stored value.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F16(f16),
    F32(f32),
    F64(f64),
    C32(Complex32),
    C64(Complex64),
    Str(String),
}

impl Scalar {
    /// Element type of this scalar.
    pub fn pod(&self) -> PlainOldDataType {
        match self {
            Scalar::Bool(_) => PlainOldDataType::Boolean,
            Scalar::U8(_) => PlainOldDataType::Uint8,
            Scalar::I8(_) => PlainOldDataType::Int8,
            Scalar::U16(_) => PlainOldDataType::Uint16,
            Scalar::I16(_) => PlainOldDataType::Int16,
            Scalar::U32(_) => PlainOldDataType::Uint32,
            Scalar::I32(_) => PlainOldDataType::Int32,
            Scalar::U64(_) => PlainOldDataType::Uint64,
            Scalar::I64(_) => PlainOldDataType::Int64,
            Scalar::F16(_) => PlainOldDataType::Float16,
            Scalar::F32(_) => PlainOldDataType::Float32,
            Scalar::F64(_) => PlainOldDataType::Float64,
            Scalar::C32(_) => PlainOldDataType::Complex32,
            Scalar::C64(_) => PlainOldDataType::Complex64,
            Scalar::Str(_) => PlainOldDataType::String,
        }
    }

    /// Little-endian payload bytes (UTF-8 for strings).
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Scalar::Bool(v) => vec![*v as u8],
            Scalar::U8(v) => vec![*v],
            Scalar::I8(v) => v.to_le_bytes().to_vec(),
            Scalar::U16(v) => v.to_le_bytes().to_vec(),
            Scalar::I16(v) => v.to_le_bytes().to_vec(),
            Scalar::U32(v) => v.to_le_bytes().to_vec(),
            Scalar::I32(v) => v.to_le_bytes().to_vec(),
            Scalar::U64(v) => v.to_le_bytes().to_vec(),
            Scalar::I64(v) => v.to_le_bytes().to_vec(),
            Scalar::F16(v) => v.to_le_bytes().to_vec(),
            Scalar::F32(v) => v.to_le_bytes().to_vec(),
            Scalar::F64(v) => v.to_le_bytes().to_vec(),
            Scalar::C32(v) => [v.re.to_le_bytes(), v.im.to_le_bytes()].concat(),
            Scalar::C64(v) => [v.re.to_le_bytes(), v.im.to_le_bytes()].concat(),
            Scalar::Str(s) => s.as_bytes().to_vec(),
        }
    }

    /// Decode a payload written by [`Scalar::to_le_bytes`].
    pub fn from_le_bytes(pod: PlainOldDataType, bytes: &[u8]) -> Result<Self> {
        if pod == PlainOldDataType::String {
            return Ok(Scalar::Str(String::from_utf8(bytes.to_vec())?));
        }
        if pod == PlainOldDataType::Unknown || bytes.len() != pod.num_bytes() {
            return Err(Error::invalid(format!(
                "scalar of type {} with {} payload bytes",
                pod,
                bytes.len()
            )));
        }

        macro_rules! le {
            ($t:ty) => {
                le!($t, bytes)
            };
            ($t:ty, $src:expr) => {{
                let mut buf = [0u8; std::mem::size_of::<$t>()];
                buf.copy_from_slice($src);
                <$t>::from_le_bytes(buf)
            }};
        }

        Ok(match pod {
            PlainOldDataType::Boolean => Scalar::Bool(bytes[0] != 0),
            PlainOldDataType::Uint8 => Scalar::U8(bytes[0]),
            PlainOldDataType::Int8 => Scalar::I8(le!(i8)),
            PlainOldDataType::Uint16 => Scalar::U16(le!(u16)),
            PlainOldDataType::Int16 => Scalar::I16(le!(i16)),
            PlainOldDataType::Uint32 => Scalar::U32(le!(u32)),
            PlainOldDataType::Int32 => Scalar::I32(le!(i32)),
            PlainOldDataType::Uint64 => Scalar::U64(le!(u64)),
            PlainOldDataType::Int64 => Scalar::I64(le!(i64)),
            PlainOldDataType::Float16 => Scalar::F16(le!(f16)),
            PlainOldDataType::Float32 => Scalar::F32(le!(f32)),
            PlainOldDataType::Float64 => Scalar::F64(le!(f64)),
            PlainOldDataType::Complex32 => Scalar::C32(Complex32::new(le!(f32, &bytes[..4]), le!(f32, &bytes[4..]))),
            PlainOldDataType::Complex64 => Scalar::C64(Complex64::new(le!(f64, &bytes[..8]), le!(f64, &bytes[8..]))),
            PlainOldDataType::String | PlainOldDataType::Unknown => unreachable!(),
        })
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(v) => write!(f, "{}", v),
            Scalar::U8(v) => write!(f, "{}", v),
            Scalar::I8(v) => write!(f, "{}", v),
            Scalar::U16(v) => write!(f, "{}", v),
            Scalar::I16(v) => write!(f, "{}", v),
            Scalar::U32(v) => write!(f, "{}", v),
            Scalar::I32(v) => write!(f, "{}", v),
            Scalar::U64(v) => write!(f, "{}", v),
            Scalar::I64(v) => write!(f, "{}", v),
            Scalar::F16(v) => write!(f, "{}", v),
            Scalar::F32(v) => write!(f, "{}", v),
            Scalar::F64(v) => write!(f, "{}", v),
            Scalar::C32(v) => write!(f, "{}", v),
            Scalar::C64(v) => write!(f, "{}", v),
            Scalar::Str(s) => write!(f, "{:?}", s),
        }
    }
}

macro_rules! scalar_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Scalar {
            fn from(v: $t) -> Self {
                Scalar::$variant(v)
            }
        })*
    };
}

scalar_from!(
    bool => Bool, u8 => U8, i8 => I8, u16 => U16, i16 => I16, u32 => U32,
    i32 => I32, u64 => U64, i64 => I64, f16 => F16, f32 => F32, f64 => F64,
    Complex32 => C32, Complex64 => C64, String => Str,
);

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

/// A homogeneous n-dimensional array.
///
/// Elements are kept as raw little-endian bytes together with their element
/// type and shape. `strides` (in elements) describe the memory layout;
/// `None` means row-major contiguous, the only layout ever written.
#[derive(Clone)]
pub struct Array {
    pod: PlainOldDataType,
    dims: Dimensions,
    strides: Option<SmallVec<[usize; 4]>>,
    data: Vec<u8>,
}

impl Array {
    /// Create a row-major array from its elements.
    pub fn new<T: PodElement>(dims: impl Into<Dimensions>, data: Vec<T>) -> Result<Self> {
        let dims = dims.into();
        check_count(&dims, data.len())?;
        Ok(Self {
            pod: T::POD_TYPE,
            dims,
            strides: None,
            data: bytemuck::cast_slice::<T, u8>(&data).to_vec(),
        })
    }

    /// Create a 1D array.
    pub fn from_vec<T: PodElement>(data: Vec<T>) -> Self {
        let dims = Dimensions::d1(data.len());
        Self {
            pod: T::POD_TYPE,
            dims,
            strides: None,
            data: bytemuck::cast_slice::<T, u8>(&data).to_vec(),
        }
    }

    /// Create an array whose elements are laid out in column-major order.
    pub fn from_column_major<T: PodElement>(dims: impl Into<Dimensions>, data: Vec<T>) -> Result<Self> {
        let dims = dims.into();
        let strides = dims.column_major_strides();
        Self::with_strides(dims, strides.as_slice(), data)
    }

    /// Create an array view over `data` with arbitrary element strides.
    pub fn with_strides<T: PodElement>(
        dims: impl Into<Dimensions>,
        strides: &[usize],
        data: Vec<T>,
    ) -> Result<Self> {
        let dims = dims.into();
        if strides.len() != dims.rank() {
            return Err(Error::invalid(format!(
                "{} strides for an array of rank {}",
                strides.len(),
                dims.rank()
            )));
        }
        let points = dims
            .checked_num_points()
            .ok_or_else(|| Error::invalid(format!("shape {} is too large", dims)))?;
        let needed = if points == 0 {
            0
        } else {
            dims.sizes()
                .iter()
                .zip(strides)
                .try_fold(1usize, |acc, (n, s)| (n - 1).checked_mul(*s).and_then(|span| acc.checked_add(span)))
                .ok_or_else(|| Error::invalid(format!("strides {:?} overflow shape {}", strides, dims)))?
        };
        if data.len() < needed {
            return Err(Error::invalid(format!(
                "strided array needs {} elements, got {}",
                needed,
                data.len()
            )));
        }
        Ok(Self {
            pod: T::POD_TYPE,
            dims,
            strides: Some(SmallVec::from_slice(strides)),
            data: bytemuck::cast_slice::<T, u8>(&data).to_vec(),
        })
    }

    /// Create an n x n identity matrix of f64.
    pub fn identity(n: usize) -> Self {
        let mut data = vec![0.0f64; n * n];
        for i in 0..n {
            data[i * n + i] = 1.0;
        }
        Self {
            pod: PlainOldDataType::Float64,
            dims: Dimensions::d2(n, n),
            strides: None,
            data: bytemuck::cast_slice::<f64, u8>(&data).to_vec(),
        }
    }

    /// Rebuild an array from raw row-major bytes (used by backends).
    pub fn from_raw(pod: PlainOldDataType, dims: Dimensions, data: Vec<u8>) -> Result<Self> {
        if !pod.is_array_element() {
            return Err(Error::mismatch("array element type", pod.name()));
        }
        let expected = dims
            .checked_num_points()
            .and_then(|n| n.checked_mul(pod.num_bytes()))
            .ok_or_else(|| Error::invalid(format!("array {} of {} is too large", dims, pod)))?;
        if data.len() != expected {
            return Err(Error::invalid(format!(
                "array {} of {} needs {} bytes, got {}",
                dims,
                pod,
                expected,
                data.len()
            )));
        }
        Ok(Self { pod, dims, strides: None, data })
    }

    pub fn pod(&self) -> PlainOldDataType {
        self.pod
    }

    pub fn dims(&self) -> &Dimensions {
        &self.dims
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.dims.num_points()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the elements are stored row-major without gaps.
    pub fn is_contiguous(&self) -> bool {
        match &self.strides {
            None => true,
            Some(s) => s.as_slice() == self.dims.row_major_strides().as_slice(),
        }
    }

    /// Row-major contiguous copy of this array.
    pub fn to_contiguous(&self) -> Array {
        if self.strides.is_none() {
            return self.clone();
        }
        Array {
            pod: self.pod,
            dims: self.dims.clone(),
            strides: None,
            data: self.row_major_bytes(),
        }
    }

    /// Element bytes in row-major order.
    pub fn row_major_bytes(&self) -> Vec<u8> {
        let strides = match &self.strides {
            None => return self.data.clone(),
            Some(s) => s,
        };

        let elem = self.pod.num_bytes();
        let count = self.len();
        let sizes = self.dims.sizes();
        let mut out = Vec::with_capacity(count * elem);
        let mut index: SmallVec<[usize; 4]> = smallvec::smallvec![0; sizes.len()];

        for _ in 0..count {
            let offset: usize = index.iter().zip(strides.iter()).map(|(i, s)| i * s).sum();
            out.extend_from_slice(&self.data[offset * elem..(offset + 1) * elem]);

            // advance the multi-index, last axis fastest
            for axis in (0..sizes.len()).rev() {
                index[axis] += 1;
                if index[axis] < sizes[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }
        out
    }

    /// Elements in row-major order, if `T` matches the element type.
    pub fn to_vec<T: PodElement>(&self) -> Result<Vec<T>> {
        if T::POD_TYPE != self.pod {
            return Err(Error::mismatch(self.pod.name(), T::POD_TYPE.name()));
        }
        Ok(bytemuck::pod_collect_to_vec::<u8, T>(&self.row_major_bytes()))
    }
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        self.pod == other.pod
            && self.dims == other.dims
            && self.row_major_bytes() == other.row_major_bytes()
    }
}

impl fmt::Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Array")
            .field("pod", &self.pod)
            .field("dims", &self.dims)
            .field("contiguous", &self.is_contiguous())
            .finish()
    }
}

fn check_count(dims: &Dimensions, len: usize) -> Result<()> {
    let points = dims
        .checked_num_points()
        .ok_or_else(|| Error::invalid(format!("shape {} is too large", dims)))?;
    if points != len {
        return Err(Error::invalid(format!(
            "shape {} holds {} elements, got {}",
            dims, points, len
        )));
    }
    Ok(())
}

/// What a backend stores at a leaf.
#[derive(Clone, Debug, PartialEq)]
pub enum Dataset {
    Scalar(Scalar),
    Array(Array),
}

impl Dataset {
    pub fn pod(&self) -> PlainOldDataType {
        match self {
            Dataset::Scalar(s) => s.pod(),
            Dataset::Array(a) => a.pod(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_bytes_roundtrip() {
        let values = vec![
            Scalar::Bool(true),
            Scalar::I8(-5),
            Scalar::U16(65000),
            Scalar::I32(42),
            Scalar::U64(u64::MAX),
            Scalar::F16(f16::from_f32(1.5)),
            Scalar::F64(-2.25),
            Scalar::C32(Complex32::new(0.5, -1.0)),
            Scalar::C64(Complex64::new(-2.0, 3.25)),
            Scalar::Str("hello".into()),
        ];
        for v in values {
            let back = Scalar::from_le_bytes(v.pod(), &v.to_le_bytes()).unwrap();
            assert_eq!(back, v);
        }
    }

    #[test]
    fn test_scalar_bad_payload() {
        assert!(Scalar::from_le_bytes(PlainOldDataType::Int32, &[1, 2]).is_err());
        assert!(Scalar::from_le_bytes(PlainOldDataType::Unknown, &[]).is_err());
    }

    #[test]
    fn test_array_shape_check() {
        assert!(Array::new(Dimensions::d2(2, 2), vec![1i32, 2, 3]).is_err());
        let a = Array::new(Dimensions::d2(2, 2), vec![1i32, 2, 3, 4]).unwrap();
        assert_eq!(a.len(), 4);
        assert!(a.is_contiguous());
    }

    #[test]
    fn test_complex_layout() {
        let z = Scalar::C64(Complex64::new(1.0, -2.0));
        let bytes = z.to_le_bytes();
        assert_eq!(&bytes[..8], &1.0f64.to_le_bytes());
        assert_eq!(&bytes[8..], &(-2.0f64).to_le_bytes());
        assert!(Scalar::from_le_bytes(PlainOldDataType::Complex64, &bytes[..8]).is_err());
        assert_eq!(z.to_string(), "1-2i");

        let data = vec![Complex32::new(1.0, 2.0), Complex32::new(3.0, 4.0)];
        let a = Array::from_vec(data.clone());
        assert_eq!(a.pod(), PlainOldDataType::Complex32);
        assert_eq!(a.row_major_bytes().len(), 16);
        assert_eq!(a.to_vec::<Complex32>().unwrap(), data);
        assert!(a.to_vec::<f32>().is_err());
    }

    #[test]
    fn test_oversized_shapes_rejected() {
        let huge = Dimensions::from_slice(&[usize::MAX / 2, 3]);
        assert!(matches!(
            Array::from_raw(PlainOldDataType::Float64, huge.clone(), vec![0; 8]),
            Err(Error::InvalidStructure(_))
        ));
        // element count fits, byte count does not
        let wide = Dimensions::d1(usize::MAX / 4);
        assert!(matches!(
            Array::from_raw(PlainOldDataType::Float64, wide, vec![0; 8]),
            Err(Error::InvalidStructure(_))
        ));
        assert!(matches!(Array::new(huge, vec![1i32]), Err(Error::InvalidStructure(_))));
        assert!(matches!(
            Array::with_strides(Dimensions::d2(2, 2), &[usize::MAX, 1], vec![1i32, 2, 3, 4]),
            Err(Error::InvalidStructure(_))
        ));
    }

    #[test]
    fn test_column_major_to_contiguous() {
        // [[1, 2, 3], [4, 5, 6]] stored column by column
        let a = Array::from_column_major(Dimensions::d2(2, 3), vec![1i64, 4, 2, 5, 3, 6]).unwrap();
        assert!(!a.is_contiguous());

        let c = a.to_contiguous();
        assert!(c.is_contiguous());
        assert_eq!(c.to_vec::<i64>().unwrap(), vec![1, 2, 3, 4, 5, 6]);

        let row_major = Array::new(Dimensions::d2(2, 3), vec![1i64, 2, 3, 4, 5, 6]).unwrap();
        assert_eq!(a, row_major);
    }

    #[test]
    fn test_strided_view() {
        // every other element of a 1D buffer
        let a = Array::with_strides(3usize, &[2], vec![0.0f32, 9.0, 1.0, 9.0, 2.0]).unwrap();
        assert_eq!(a.to_vec::<f32>().unwrap(), vec![0.0, 1.0, 2.0]);
        assert!(Array::with_strides(3usize, &[2], vec![0.0f32; 4]).is_err());
    }

    #[test]
    fn test_identity() {
        let id = Array::identity(3);
        let v = id.to_vec::<f64>().unwrap();
        assert_eq!(v, vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        assert!(id.to_vec::<f32>().is_err());
    }

    #[test]
    fn test_from_raw_validates() {
        assert!(Array::from_raw(PlainOldDataType::String, Dimensions::d1(1), vec![0]).is_err());
        assert!(Array::from_raw(PlainOldDataType::Int16, Dimensions::d1(2), vec![0; 3]).is_err());
        let a = Array::from_raw(PlainOldDataType::Int16, Dimensions::d1(2), vec![1, 0, 2, 0]).unwrap();
        assert_eq!(a.to_vec::<i16>().unwrap(), vec![1, 2]);
    }
}
