//! Plain Old Data types - element types of stored datasets.

use bytemuck::{Pod, Zeroable};
use half::f16;
use num_complex::{Complex32, Complex64};
use std::fmt;

/// Plain Old Data type enum - represents basic storage types.
///
/// Every scalar dataset and every array element is one of these.
/// The discriminant is the on-disk type code.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PlainOldDataType {
    /// Boolean (stored as u8: 0 = false, non-zero = true)
    Boolean = 0,
    /// Unsigned 8-bit integer
    Uint8 = 1,
    /// Signed 8-bit integer
    Int8 = 2,
    /// Unsigned 16-bit integer
    Uint16 = 3,
    /// Signed 16-bit integer
    Int16 = 4,
    /// Unsigned 32-bit integer
    Uint32 = 5,
    /// Signed 32-bit integer
    Int32 = 6,
    /// Unsigned 64-bit integer
    Uint64 = 7,
    /// Signed 64-bit integer
    Int64 = 8,
    /// 16-bit floating point (IEEE 754 half precision)
    Float16 = 9,
    /// 32-bit floating point (IEEE 754 single precision)
    Float32 = 10,
    /// 64-bit floating point (IEEE 754 double precision)
    Float64 = 11,
    /// UTF-8 string (scalars only)
    String = 12,
    /// Complex of two f32 (real, imaginary)
    Complex32 = 13,
    /// Complex of two f64 (real, imaginary)
    Complex64 = 14,
    /// Unknown/invalid type
    #[default]
    Unknown = 127,
}

impl PlainOldDataType {
    /// Returns the size in bytes of a single element of this type.
    /// Strings have no fixed size and report 0.
    #[inline]
    pub const fn num_bytes(self) -> usize {
        match self {
            Self::Boolean => 1,
            Self::Uint8 => 1,
            Self::Int8 => 1,
            Self::Uint16 => 2,
            Self::Int16 => 2,
            Self::Uint32 => 4,
            Self::Int32 => 4,
            Self::Uint64 => 8,
            Self::Int64 => 8,
            Self::Float16 => 2,
            Self::Float32 => 4,
            Self::Float64 => 8,
            Self::String => 0,
            Self::Complex32 => 8,
            Self::Complex64 => 16,
            Self::Unknown => 0,
        }
    }

    /// Returns the name of this type as a string.
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Boolean => "bool_t",
            Self::Uint8 => "uint8_t",
            Self::Int8 => "int8_t",
            Self::Uint16 => "uint16_t",
            Self::Int16 => "int16_t",
            Self::Uint32 => "uint32_t",
            Self::Int32 => "int32_t",
            Self::Uint64 => "uint64_t",
            Self::Int64 => "int64_t",
            Self::Float16 => "float16_t",
            Self::Float32 => "float32_t",
            Self::Float64 => "float64_t",
            Self::String => "string",
            Self::Complex32 => "complex64_t",
            Self::Complex64 => "complex128_t",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Convert from the on-disk type code.
    pub const fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Boolean,
            1 => Self::Uint8,
            2 => Self::Int8,
            3 => Self::Uint16,
            4 => Self::Int16,
            5 => Self::Uint32,
            6 => Self::Int32,
            7 => Self::Uint64,
            8 => Self::Int64,
            9 => Self::Float16,
            10 => Self::Float32,
            11 => Self::Float64,
            12 => Self::String,
            13 => Self::Complex32,
            14 => Self::Complex64,
            _ => Self::Unknown,
        }
    }

    /// The on-disk type code.
    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Returns true if this type can be an array element.
    #[inline]
    pub const fn is_array_element(self) -> bool {
        !matches!(self, Self::String | Self::Unknown)
    }

    /// Returns true if this is a floating point type.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float16 | Self::Float32 | Self::Float64)
    }

    /// Returns true if this is a complex type.
    #[inline]
    pub const fn is_complex(self) -> bool {
        matches!(self, Self::Complex32 | Self::Complex64)
    }
}

impl fmt::Display for PlainOldDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

// === POD Trait for type-safe conversions ===

/// Trait for types that can be stored as array elements.
pub trait PodElement: Pod + Zeroable + Copy + Default + PartialEq + fmt::Debug {
    /// The corresponding PlainOldDataType enum value.
    const POD_TYPE: PlainOldDataType;

    /// Size of this type in bytes.
    const SIZE: usize = std::mem::size_of::<Self>();
}

macro_rules! impl_pod_element {
    ($t:ty, $variant:ident) => {
        impl PodElement for $t {
            const POD_TYPE: PlainOldDataType = PlainOldDataType::$variant;
        }
    };
}

impl_pod_element!(u8, Uint8);
impl_pod_element!(i8, Int8);
impl_pod_element!(u16, Uint16);
impl_pod_element!(i16, Int16);
impl_pod_element!(u32, Uint32);
impl_pod_element!(i32, Int32);
impl_pod_element!(u64, Uint64);
impl_pod_element!(i64, Int64);
impl_pod_element!(f16, Float16);
impl_pod_element!(f32, Float32);
impl_pod_element!(f64, Float64);
impl_pod_element!(Complex32, Complex32);
impl_pod_element!(Complex64, Complex64);

/// Boolean type with guaranteed 1-byte storage.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Bool(u8);

impl Bool {
    pub const TRUE: Self = Self(1);
    pub const FALSE: Self = Self(0);

    #[inline]
    pub const fn new(v: bool) -> Self {
        Self(v as u8)
    }

    #[inline]
    pub const fn get(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Bool {
    #[inline]
    fn from(v: bool) -> Self {
        Self::new(v)
    }
}

impl From<Bool> for bool {
    #[inline]
    fn from(v: Bool) -> Self {
        v.get()
    }
}

impl fmt::Debug for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl fmt::Display for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl PodElement for Bool {
    const POD_TYPE: PlainOldDataType = PlainOldDataType::Boolean;
}
