//! Runtime dtype tags and the dispatch from a tag to a concrete element type.
//!
//! A [`Dtype`] names the element type of an array at runtime. The
//! [`Element`] trait ties each supported Rust type to its tag and provides
//! explicit little-endian conversions to and from storage bytes, so no code
//! ever reinterprets memory across type boundaries.
//!
//! The [`visit_dtype!`](crate::visit_dtype) and
//! [`visit_float_dtype!`](crate::visit_float_dtype) macros turn a runtime tag
//! into a type alias and evaluate one generic body for it:
//!
//! ```
//! use xrt_runtime::dtype::{Dtype, Element};
//! use xrt_runtime::visit_dtype;
//!
//! let size = visit_dtype!(Dtype::Int16, T => core::mem::size_of::<T>());
//! assert_eq!(size, 2);
//! ```

use core::fmt;
use core::str::FromStr;

use half::f16;

use crate::error::{Error, Result};

/// Supported element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dtype {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    Float16,
    Float32,
    Float64,
}

/// Broad category of a [`Dtype`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DtypeKind {
    Bool,
    Int,
    UInt,
    Float,
}

impl Dtype {
    /// Every supported dtype, in promotion order within each kind.
    pub const ALL: [Self; 9] = [
        Self::Bool,
        Self::Int8,
        Self::Int16,
        Self::Int32,
        Self::Int64,
        Self::UInt8,
        Self::Float16,
        Self::Float32,
        Self::Float64,
    ];

    /// Size of one element in bytes.
    #[must_use]
    pub const fn item_size(self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::UInt8 => 1,
            Self::Int16 | Self::Float16 => 2,
            Self::Int32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 => 8,
        }
    }

    #[must_use]
    pub const fn kind(self) -> DtypeKind {
        match self {
            Self::Bool => DtypeKind::Bool,
            Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64 => DtypeKind::Int,
            Self::UInt8 => DtypeKind::UInt,
            Self::Float16 | Self::Float32 | Self::Float64 => DtypeKind::Float,
        }
    }

    #[must_use]
    pub const fn is_float(self) -> bool {
        matches!(self.kind(), DtypeKind::Float)
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::Float16 => "float16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dtype {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|d| d.name() == s)
            .ok_or_else(|| Error::InvalidDtype(s.to_owned()))
    }
}

/// A dtype-less scalar value, used for fills and scalar operands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Scalar {
    /// The smallest dtype kind able to hold this scalar.
    #[must_use]
    pub const fn kind(self) -> DtypeKind {
        match self {
            Self::Bool(_) => DtypeKind::Bool,
            Self::Int(_) => DtypeKind::Int,
            Self::Float(_) => DtypeKind::Float,
        }
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

macro_rules! scalar_from {
    ($variant:ident($target:ty): $($t:ty),*) => {
        $(impl From<$t> for Scalar {
            fn from(v: $t) -> Self {
                Self::$variant(<$target>::from(v))
            }
        })*
    };
}

scalar_from!(Int(i64): i8, i16, i32, i64, u8);
scalar_from!(Float(f64): f32, f64);

impl From<f16> for Scalar {
    fn from(v: f16) -> Self {
        Self::Float(v.to_f64())
    }
}

/// A Rust type that can be stored in an array.
///
/// Arithmetic follows C semantics for the concrete type: integers wrap,
/// integer division by zero yields zero, and `bool` uses logical or/and for
/// addition/multiplication.
pub trait Element:
    Copy + Default + PartialEq + PartialOrd + fmt::Debug + Send + Sync + 'static
{
    /// The runtime tag for this type.
    const DTYPE: Dtype;

    /// Decodes one element from exactly `Self::DTYPE.item_size()` bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Encodes this element into exactly `Self::DTYPE.item_size()` bytes.
    fn write_le(self, out: &mut [u8]);

    fn from_scalar(value: Scalar) -> Self;

    fn to_scalar(self) -> Scalar;

    fn is_nan(self) -> bool;

    fn is_inf(self) -> bool;

    fn add(self, rhs: Self) -> Self;

    fn sub(self, rhs: Self) -> Self;

    fn mul(self, rhs: Self) -> Self;

    fn div(self, rhs: Self) -> Self;
}

/// Floating-point elements, the only ones the transcendental kernels accept.
pub trait FloatElement: Element {
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
}

/// Converts one element to another dtype through its scalar value.
#[inline]
pub fn cast<T: Element, U: Element>(value: T) -> U {
    U::from_scalar(value.to_scalar())
}

impl Element for bool {
    const DTYPE: Dtype = Dtype::Bool;

    fn read_le(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn write_le(self, out: &mut [u8]) {
        out[0] = u8::from(self);
    }

    fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::Bool(b) => b,
            Scalar::Int(i) => i != 0,
            Scalar::Float(f) => f != 0.0,
        }
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }

    fn is_nan(self) -> bool {
        false
    }

    fn is_inf(self) -> bool {
        false
    }

    fn add(self, rhs: Self) -> Self {
        self || rhs
    }

    fn sub(self, rhs: Self) -> Self {
        self ^ rhs
    }

    fn mul(self, rhs: Self) -> Self {
        self && rhs
    }

    fn div(self, rhs: Self) -> Self {
        self && rhs
    }
}

macro_rules! int_element {
    ($($t:ty => $dtype:ident),* $(,)?) => {
        $(impl Element for $t {
            const DTYPE: Dtype = Dtype::$dtype;

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; core::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }

            fn write_le(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_le_bytes());
            }

            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Bool(b) => <$t>::from(b),
                    Scalar::Int(i) => i as $t,
                    Scalar::Float(f) => f as $t,
                }
            }

            fn to_scalar(self) -> Scalar {
                Scalar::Int(i64::from(self))
            }

            fn is_nan(self) -> bool {
                false
            }

            fn is_inf(self) -> bool {
                false
            }

            fn add(self, rhs: Self) -> Self {
                self.wrapping_add(rhs)
            }

            fn sub(self, rhs: Self) -> Self {
                self.wrapping_sub(rhs)
            }

            fn mul(self, rhs: Self) -> Self {
                self.wrapping_mul(rhs)
            }

            fn div(self, rhs: Self) -> Self {
                self.checked_div(rhs).unwrap_or_default()
            }
        })*
    };
}

int_element!(i8 => Int8, i16 => Int16, i32 => Int32, i64 => Int64, u8 => UInt8);

macro_rules! float_element {
    ($($t:ty => $dtype:ident),* $(,)?) => {
        $(impl Element for $t {
            const DTYPE: Dtype = Dtype::$dtype;

            fn read_le(bytes: &[u8]) -> Self {
                let mut buf = [0u8; core::mem::size_of::<$t>()];
                buf.copy_from_slice(bytes);
                <$t>::from_le_bytes(buf)
            }

            fn write_le(self, out: &mut [u8]) {
                out.copy_from_slice(&self.to_le_bytes());
            }

            #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
            fn from_scalar(value: Scalar) -> Self {
                match value {
                    Scalar::Bool(b) => if b { 1.0 } else { 0.0 },
                    Scalar::Int(i) => i as $t,
                    Scalar::Float(f) => f as $t,
                }
            }

            fn to_scalar(self) -> Scalar {
                Scalar::Float(f64::from(self))
            }

            fn is_nan(self) -> bool {
                <$t>::is_nan(self)
            }

            fn is_inf(self) -> bool {
                <$t>::is_infinite(self)
            }

            fn add(self, rhs: Self) -> Self {
                self + rhs
            }

            fn sub(self, rhs: Self) -> Self {
                self - rhs
            }

            fn mul(self, rhs: Self) -> Self {
                self * rhs
            }

            fn div(self, rhs: Self) -> Self {
                self / rhs
            }
        }

        impl FloatElement for $t {
            fn exp(self) -> Self {
                <$t>::exp(self)
            }

            fn ln(self) -> Self {
                <$t>::ln(self)
            }

            fn sqrt(self) -> Self {
                <$t>::sqrt(self)
            }
        })*
    };
}

float_element!(f32 => Float32, f64 => Float64);

impl Element for f16 {
    const DTYPE: Dtype = Dtype::Float16;

    fn read_le(bytes: &[u8]) -> Self {
        f16::from_le_bytes([bytes[0], bytes[1]])
    }

    fn write_le(self, out: &mut [u8]) {
        out.copy_from_slice(&self.to_le_bytes());
    }

    #[allow(clippy::cast_precision_loss)]
    fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::Bool(b) => {
                if b {
                    f16::ONE
                } else {
                    f16::ZERO
                }
            }
            Scalar::Int(i) => f16::from_f64(i as f64),
            Scalar::Float(f) => f16::from_f64(f),
        }
    }

    fn to_scalar(self) -> Scalar {
        Scalar::Float(self.to_f64())
    }

    fn is_nan(self) -> bool {
        f16::is_nan(self)
    }

    fn is_inf(self) -> bool {
        f16::is_infinite(self)
    }

    fn add(self, rhs: Self) -> Self {
        self + rhs
    }

    fn sub(self, rhs: Self) -> Self {
        self - rhs
    }

    fn mul(self, rhs: Self) -> Self {
        self * rhs
    }

    fn div(self, rhs: Self) -> Self {
        self / rhs
    }
}

// f16 has no native transcendental functions; compute in f32.
impl FloatElement for f16 {
    fn exp(self) -> Self {
        f16::from_f32(self.to_f32().exp())
    }

    fn ln(self) -> Self {
        f16::from_f32(self.to_f32().ln())
    }

    fn sqrt(self) -> Self {
        f16::from_f32(self.to_f32().sqrt())
    }
}

/// Evaluates `$body` once with `$t` bound to the Rust type of `$dtype`.
///
/// Every arm instantiates the same generic body, so the body must compile
/// for all [`Element`](crate::dtype::Element) types.
#[macro_export]
macro_rules! visit_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            $crate::dtype::Dtype::Bool => {
                type $t = bool;
                $body
            }
            $crate::dtype::Dtype::Int8 => {
                type $t = i8;
                $body
            }
            $crate::dtype::Dtype::Int16 => {
                type $t = i16;
                $body
            }
            $crate::dtype::Dtype::Int32 => {
                type $t = i32;
                $body
            }
            $crate::dtype::Dtype::Int64 => {
                type $t = i64;
                $body
            }
            $crate::dtype::Dtype::UInt8 => {
                type $t = u8;
                $body
            }
            $crate::dtype::Dtype::Float16 => {
                type $t = $crate::half::f16;
                $body
            }
            $crate::dtype::Dtype::Float32 => {
                type $t = f32;
                $body
            }
            $crate::dtype::Dtype::Float64 => {
                type $t = f64;
                $body
            }
        }
    };
}

/// Like [`visit_dtype!`](crate::visit_dtype) but only for floating-point
/// dtypes. `$body` must evaluate to a [`Result`](crate::Result); any other
/// dtype yields [`Error::UnsupportedDtype`](crate::Error::UnsupportedDtype).
#[macro_export]
macro_rules! visit_float_dtype {
    ($dtype:expr, $t:ident => $body:expr) => {
        match $dtype {
            $crate::dtype::Dtype::Float16 => {
                type $t = $crate::half::f16;
                $body
            }
            $crate::dtype::Dtype::Float32 => {
                type $t = f32;
                $body
            }
            $crate::dtype::Dtype::Float64 => {
                type $t = f64;
                $body
            }
            other => ::core::result::Result::Err($crate::error::Error::UnsupportedDtype(other)),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip<T: Element>(value: T) -> T {
        let mut buf = vec![0u8; T::DTYPE.item_size()];
        value.write_le(&mut buf);
        T::read_le(&buf)
    }

    #[test]
    fn item_sizes_match_rust_types() {
        for dtype in Dtype::ALL {
            let size = visit_dtype!(dtype, T => core::mem::size_of::<T>());
            assert_eq!(size, dtype.item_size(), "{dtype}");
        }
    }

    #[test]
    fn dtype_tags_match_visited_types() {
        for dtype in Dtype::ALL {
            assert_eq!(visit_dtype!(dtype, T => T::DTYPE), dtype);
        }
    }

    #[test]
    fn float_visitor_rejects_integers() {
        let ok: Result<Dtype> = visit_float_dtype!(Dtype::Float32, T => Ok(T::DTYPE));
        assert_eq!(ok.unwrap(), Dtype::Float32);

        let err: Result<Dtype> = visit_float_dtype!(Dtype::Int32, T => Ok(T::DTYPE));
        assert!(matches!(err, Err(Error::UnsupportedDtype(Dtype::Int32))));
    }

    #[test]
    fn byte_encoding_is_little_endian() {
        let mut buf = [0u8; 4];
        1.0f32.write_le(&mut buf);
        assert_eq!(buf, 1.0f32.to_le_bytes());
        assert_eq!(roundtrip(-7i16), -7);
        assert!(roundtrip(true));
        assert_eq!(roundtrip(f16::from_f32(0.5)), f16::from_f32(0.5));
    }

    #[test]
    fn casts_follow_c_semantics() {
        assert_eq!(cast::<f32, i32>(2.9), 2);
        assert_eq!(cast::<i64, u8>(257), 1);
        assert!(cast::<f64, bool>(0.5));
        assert!(!cast::<i8, bool>(0));
        assert_eq!(cast::<bool, f32>(true), 1.0);
    }

    #[test]
    fn nan_and_inf_predicates() {
        assert!(Element::is_nan(f32::NAN));
        assert!(!Element::is_nan(1.0f64));
        assert!(Element::is_inf(f64::NEG_INFINITY));
        assert!(Element::is_inf(f16::INFINITY));
        assert!(!Element::is_nan(3i32));
    }

    #[test]
    fn integer_division_by_zero_is_zero() {
        assert_eq!(Element::div(7i32, 0), 0);
        assert_eq!(Element::div(7i32, 2), 3);
        assert_eq!(Element::add(i8::MAX, 1), i8::MIN);
    }

    #[test]
    fn dtype_names_roundtrip() {
        for dtype in Dtype::ALL {
            assert_eq!(dtype.name().parse::<Dtype>().unwrap(), dtype);
        }
        assert!(matches!(
            "complex64".parse::<Dtype>(),
            Err(Error::InvalidDtype(name)) if name == "complex64"
        ));
    }
}
