//! Rust types with a static NDR shape
//!
//! [`NdrType`] ties a Rust type to its [`Shape`] and converts between the
//! type and the dynamic [`Value`] a compiled program runs on. Records are
//! declared with [`ndr_record!`](crate::ndr_record), which generates the
//! struct together with its shape, IDL attributes included.

use crate::shape::{Handle, Primitive, Referent, Shape};
use crate::{NdrError, Result, Value};

/// A Rust type that can be marshalled by a compiled program
pub trait NdrType: Sized + 'static {
    /// Wire shape of the type
    fn shape() -> Shape;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! impl_ndr_primitive {
    ($ty:ty, $kind:ident) => {
        impl NdrType for $ty {
            fn shape() -> Shape {
                Shape::Primitive(Primitive::$kind)
            }

            fn to_value(&self) -> Value {
                Value::$kind(*self)
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::$kind(v) => Ok(v),
                    other => Err(NdrError::value_mismatch(Primitive::$kind.name(), &other)),
                }
            }
        }
    };
}

impl_ndr_primitive!(bool, Bool);
impl_ndr_primitive!(i8, Int8);
impl_ndr_primitive!(u8, Uint8);
impl_ndr_primitive!(i16, Int16);
impl_ndr_primitive!(u16, Uint16);
impl_ndr_primitive!(i32, Int32);
impl_ndr_primitive!(u32, Uint32);
impl_ndr_primitive!(i64, Int64);
impl_ndr_primitive!(u64, Uint64);
impl_ndr_primitive!(f32, Float32);
impl_ndr_primitive!(f64, Float64);

impl NdrType for String {
    fn shape() -> Shape {
        Shape::Text
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s),
            other => Err(NdrError::value_mismatch("text", &other)),
        }
    }
}

impl<T: NdrType> NdrType for Vec<T> {
    fn shape() -> Shape {
        Shape::sequence(T::shape())
    }

    fn to_value(&self) -> Value {
        Value::Sequence(self.iter().map(T::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Sequence(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(NdrError::value_mismatch("sequence", &other)),
        }
    }
}

impl<T: NdrType, const N: usize> NdrType for [T; N] {
    fn shape() -> Shape {
        Shape::array(T::shape(), N)
    }

    fn to_value(&self) -> Value {
        Value::Array(self.iter().map(T::to_value).collect())
    }

    fn from_value(value: Value) -> Result<Self> {
        let items = match value {
            Value::Array(items) => items,
            other => return Err(NdrError::value_mismatch("array", &other)),
        };
        let items: Vec<T> = items.into_iter().map(T::from_value).collect::<Result<_>>()?;
        items.try_into().map_err(|_| NdrError::ValueMismatch {
            expected: "fixed array",
            found: "array of another length",
        })
    }
}

/// Full pointer - nullable, aliasing allowed
///
/// The `[ptr]` attribute in MIDL. Pointers built with the same handle refer
/// to the same referent: the target is transmitted once, later occurrences
/// carry only its referent id. Decoded pointers carry the referent id as
/// their handle.
#[derive(Debug, Clone, PartialEq)]
pub struct FullPtr<T>(Option<(Handle, Box<T>)>);

impl<T> FullPtr<T> {
    pub fn new(handle: u64, value: T) -> Self {
        Self(Some((Handle(handle), Box::new(value))))
    }

    pub fn null() -> Self {
        Self(None)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn handle(&self) -> Option<Handle> {
        self.0.as_ref().map(|(handle, _)| *handle)
    }

    pub fn as_ref(&self) -> Option<&T> {
        self.0.as_ref().map(|(_, b)| b.as_ref())
    }

    pub fn as_mut(&mut self) -> Option<&mut T> {
        self.0.as_mut().map(|(_, b)| b.as_mut())
    }

    pub fn into_option(self) -> Option<T> {
        self.0.map(|(_, b)| *b)
    }
}

impl<T> Default for FullPtr<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: NdrType> NdrType for FullPtr<T> {
    fn shape() -> Shape {
        Shape::pointer(T::shape())
    }

    fn to_value(&self) -> Value {
        Value::Pointer(self.0.as_ref().map(|(handle, target)| Referent {
            handle: *handle,
            target: Box::new(target.to_value()),
        }))
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Pointer(None) => Ok(Self::null()),
            Value::Pointer(Some(referent)) => {
                let target = T::from_value(*referent.target)?;
                Ok(Self(Some((referent.handle, Box::new(target)))))
            }
            other => Err(NdrError::value_mismatch("pointer", &other)),
        }
    }
}

/// Declare a struct together with its [`NdrType`] implementation.
///
/// Fields are marshalled in declaration order. IDL attributes go in an
/// `#[idl("...")]` attribute on the field:
///
/// ```
/// dcerpc_ndr::ndr_record! {
///     #[derive(Debug, Default)]
///     pub struct Buffer {
///         pub len: u32,
///         #[idl("size_is(len)")]
///         pub data: Vec<u8>,
///     }
/// }
/// ```
#[macro_export]
macro_rules! ndr_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[idl($attrs:literal)])?
                $fvis:vis $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $( $fvis $field: $ty, )*
        }

        impl $crate::NdrType for $name {
            fn shape() -> $crate::Shape {
                $crate::Shape::record(
                    $crate::RecordShape::new(stringify!($name))
                        $( .field(
                            stringify!($field),
                            <$ty as $crate::NdrType>::shape(),
                            concat!("" $(, $attrs)?),
                        ) )*
                )
            }

            fn to_value(&self) -> $crate::Value {
                $crate::Value::Record(vec![ $( $crate::NdrType::to_value(&self.$field) ),* ])
            }

            fn from_value(value: $crate::Value) -> $crate::Result<Self> {
                let found = value.kind_name();
                let $crate::Value::Record(fields) = value else {
                    return Err($crate::NdrError::ValueMismatch { expected: "record", found });
                };
                #[allow(unused_mut, unused_variables)]
                let mut fields = fields.into_iter();
                Ok(Self {
                    $( $field: $crate::NdrType::from_value(fields.next().ok_or(
                        $crate::NdrError::ValueMismatch { expected: stringify!($field), found: "nothing" },
                    )?)?, )*
                })
            }
        }
    };
}
