//! Type shapes and dynamic values
//!
//! A [`Shape`] describes how a type is laid out on the wire; a [`Value`] is
//! an instance of a shape. The program compiler consumes shapes, the
//! compiled program consumes and produces values.

use crate::attrs::FieldAttrList;
use std::sync::Arc;

/// NDR primitive kinds
///
/// | IDL type       | Kind    | Size |
/// |----------------|---------|------|
/// | boolean        | Bool    | 1    |
/// | small          | Int8    | 1    |
/// | byte           | Uint8   | 1    |
/// | short          | Int16   | 2    |
/// | unsigned short | Uint16  | 2    |
/// | long           | Int32   | 4    |
/// | unsigned long  | Uint32  | 4    |
/// | hyper          | Int64   | 8    |
/// | unsigned hyper | Uint64  | 8    |
/// | float          | Float32 | 4    |
/// | double         | Float64 | 8    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float32,
    Float64,
}

impl Primitive {
    /// Wire size, which is also the natural alignment
    pub fn size(self) -> usize {
        match self {
            Self::Bool | Self::Int8 | Self::Uint8 => 1,
            Self::Int16 | Self::Uint16 => 2,
            Self::Int32 | Self::Uint32 | Self::Float32 => 4,
            Self::Int64 | Self::Uint64 | Self::Float64 => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, Self::Bool | Self::Float32 | Self::Float64)
    }

    pub fn zero(self) -> Value {
        match self {
            Self::Bool => Value::Bool(false),
            Self::Int8 => Value::Int8(0),
            Self::Uint8 => Value::Uint8(0),
            Self::Int16 => Value::Int16(0),
            Self::Uint16 => Value::Uint16(0),
            Self::Int32 => Value::Int32(0),
            Self::Uint32 => Value::Uint32(0),
            Self::Int64 => Value::Int64(0),
            Self::Uint64 => Value::Uint64(0),
            Self::Float32 => Value::Float32(0.0),
            Self::Float64 => Value::Float64(0.0),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Uint8 => "uint8",
            Self::Int16 => "int16",
            Self::Uint16 => "uint16",
            Self::Int32 => "int32",
            Self::Uint32 => "uint32",
            Self::Int64 => "int64",
            Self::Uint64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

/// Wire shape of a type
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Primitive(Primitive),
    /// Varying character string
    Text,
    /// Fixed-size array
    Array { element: Box<Shape>, len: usize },
    /// Bounded sequence, length known at encode time
    Sequence(Box<Shape>),
    Record(Arc<RecordShape>),
    /// Full pointer
    Pointer(Box<Shape>),
}

impl Shape {
    pub fn array(element: Shape, len: usize) -> Self {
        Self::Array {
            element: Box::new(element),
            len,
        }
    }

    pub fn sequence(element: Shape) -> Self {
        Self::Sequence(Box::new(element))
    }

    pub fn pointer(target: Shape) -> Self {
        Self::Pointer(Box::new(target))
    }

    pub fn record(record: RecordShape) -> Self {
        Self::Record(Arc::new(record))
    }

    /// Value emitted where data is missing
    pub fn zero_value(&self) -> Value {
        match self {
            Self::Primitive(p) => p.zero(),
            Self::Text => Value::Text(String::new()),
            Self::Array { element, len } => Value::Array(vec![element.zero_value(); *len]),
            Self::Sequence(_) => Value::Sequence(Vec::new()),
            Self::Record(record) => {
                Value::Record(record.fields.iter().map(|f| f.shape.zero_value()).collect())
            }
            Self::Pointer(_) => Value::Pointer(None),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Primitive(p) => p.name(),
            Self::Text => "text",
            Self::Array { .. } => "array",
            Self::Sequence(_) => "sequence",
            Self::Record(_) => "record",
            Self::Pointer(_) => "pointer",
        }
    }
}

/// A record (struct) shape
#[derive(Debug, Clone, PartialEq)]
pub struct RecordShape {
    pub name: String,
    pub fields: Vec<FieldShape>,
}

impl RecordShape {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Append a field; `attrs` is an IDL attribute string such as
    /// `"size_is(Count)"`, empty for plain fields.
    pub fn field(mut self, name: impl Into<String>, shape: Shape, attrs: &str) -> Self {
        self.fields.push(FieldShape {
            name: name.into(),
            shape,
            attrs: FieldAttrList::parse(attrs),
        });
        self
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A named field of a record
#[derive(Debug, Clone, PartialEq)]
pub struct FieldShape {
    pub name: String,
    pub shape: Shape,
    pub attrs: FieldAttrList,
}

/// Caller-issued identity of a value that may be referenced more than once
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Handle(pub u64);

/// Target of a non-null full pointer
#[derive(Debug, Clone, PartialEq)]
pub struct Referent {
    pub handle: Handle,
    pub target: Box<Value>,
}

/// Dynamic value of a [`Shape`]
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int8(i8),
    Uint8(u8),
    Int16(i16),
    Uint16(u16),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Array(Vec<Value>),
    Sequence(Vec<Value>),
    /// Field values in declaration order
    Record(Vec<Value>),
    Pointer(Option<Referent>),
}

impl Value {
    /// Integer value widened to `i64`; `None` for non-integers and for
    /// unsigned values above `i64::MAX`.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Int8(v) => Some(v.into()),
            Self::Uint8(v) => Some(v.into()),
            Self::Int16(v) => Some(v.into()),
            Self::Uint16(v) => Some(v.into()),
            Self::Int32(v) => Some(v.into()),
            Self::Uint32(v) => Some(v.into()),
            Self::Int64(v) => Some(v),
            Self::Uint64(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    /// Elements of an array or sequence
    pub fn elements(&self) -> Option<&[Value]> {
        match self {
            Self::Array(v) | Self::Sequence(v) => Some(v),
            _ => None,
        }
    }

    /// Fields of a record
    pub fn fields(&self) -> Option<&[Value]> {
        match self {
            Self::Record(v) => Some(v),
            _ => None,
        }
    }

    pub fn pointer(handle: u64, target: Value) -> Self {
        Self::Pointer(Some(Referent {
            handle: Handle(handle),
            target: Box::new(target),
        }))
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int8(_) => "int8",
            Self::Uint8(_) => "uint8",
            Self::Int16(_) => "int16",
            Self::Uint16(_) => "uint16",
            Self::Int32(_) => "int32",
            Self::Uint32(_) => "uint32",
            Self::Int64(_) => "int64",
            Self::Uint64(_) => "uint64",
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::Text(_) => "text",
            Self::Array(_) => "array",
            Self::Sequence(_) => "sequence",
            Self::Record(_) => "record",
            Self::Pointer(_) => "pointer",
        }
    }
}
