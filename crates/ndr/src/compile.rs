//! Program compiler
//!
//! A [`Shape`] is compiled once into a [`Program`]: a tree of instructions
//! with every attribute resolved to sibling indices, every alignment
//! computed and every structural error reported. Running the program for
//! encoding or decoding then does no name lookups.
//!
//! Records compile to:
//!
//! 1. an optional conformance prefix, when the last field (possibly inside
//!    trailing nested records) is conformant; NDR requires its bound to
//!    precede the whole structure
//! 2. an alignment to the record's largest member alignment
//! 3. one instruction per transmitted field

use crate::attrs::{FieldAttrList, IGNORE, SIZE_IS};
use crate::bounds::{resolve_conformance, resolve_variance, BoundContext, Conformance, Variance};
use crate::options::TransferSyntax;
use crate::shape::{FieldShape, Primitive, RecordShape, Shape};
use crate::{NdrError, Result, Value};
use std::sync::Arc;
use tracing::debug;

/// Deepest fixed-array nesting with a dedicated instruction
pub const MAX_ARRAY_DIMENSIONS: usize = 4;

/// Path of field indices from a record to one of its (nested) fields
pub(crate) type FieldPath = Vec<usize>;

/// A compiled operation
#[derive(Debug, Clone)]
pub(crate) enum Op {
    Primitive(Primitive),
    Text(Box<TextOp>),
    Array1(Box<ArrayOp<1>>),
    Array2(Box<ArrayOp<2>>),
    Array3(Box<ArrayOp<3>>),
    Array4(Box<ArrayOp<4>>),
    Sequence(Box<SequenceOp>),
    /// Sequence of sequences; bounds of every dimension precede the data
    MultiSequence(Box<MultiSequenceOp>),
    Record(Box<RecordOp>),
    Pointer(Box<PointerOp>),
}

#[derive(Debug, Clone)]
pub(crate) struct TextOp {
    /// Conformant bound written just before the text
    pub inline_bound: Option<Conformance>,
    pub context: Option<BoundContext>,
}

#[derive(Debug, Clone)]
pub(crate) struct ArrayOp<const N: usize> {
    pub dims: [usize; N],
    pub element: Op,
    pub zero: Value,
}

/// Bound attributes of a sequence field
#[derive(Debug, Clone)]
pub(crate) struct SequenceBounds {
    pub conformance: Option<Conformance>,
    /// Whether the conformant bound is written just before the data rather
    /// than in an enclosing record's prefix
    pub inline: bool,
    pub variance: Variance,
    pub context: BoundContext,
}

impl SequenceBounds {
    pub fn inline_conformance(&self) -> Option<&Conformance> {
        self.conformance.as_ref().filter(|_| self.inline)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct SequenceOp {
    pub element: Op,
    pub zero: Value,
    /// `None` outside records
    pub bounds: Option<SequenceBounds>,
}

#[derive(Debug, Clone)]
pub(crate) struct MultiSequenceOp {
    /// Number of nested sequence levels, at least 2
    pub dims: usize,
    /// Innermost element
    pub element: Op,
    pub zero: Value,
    pub bounds: Option<SequenceBounds>,
}

#[derive(Debug, Clone)]
pub(crate) struct PointerOp {
    pub target: Op,
}

/// Conformant bound hoisted to the front of a record
#[derive(Debug, Clone)]
pub(crate) struct Prefix {
    /// Nested record holding the conformant field, from the hoisting record
    pub path: FieldPath,
    pub conformance: Conformance,
    pub context: BoundContext,
}

/// One transmitted field
#[derive(Debug, Clone)]
pub(crate) struct Instruction {
    pub op: Op,
    pub path: FieldPath,
}

impl Instruction {
    /// Index of the field within its record
    pub fn field(&self) -> usize {
        self.path.last().copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RecordOp {
    pub name: Arc<str>,
    pub prefix: Option<Prefix>,
    pub alignment: usize,
    pub instructions: Vec<Instruction>,
    /// Zero value of every field, used for missing and ignored fields
    pub zero: Vec<Value>,
    /// Indices of ignored fields
    pub skipped: Vec<usize>,
}

impl Op {
    /// Alignment of the first octet the op writes
    pub fn alignment(&self, syntax: TransferSyntax) -> usize {
        let length = syntax.length_size();
        match self {
            Self::Primitive(p) => p.size(),
            Self::Text(_) | Self::Pointer(_) => length,
            Self::Array1(a) => a.element.alignment(syntax),
            Self::Array2(a) => a.element.alignment(syntax),
            Self::Array3(a) => a.element.alignment(syntax),
            Self::Array4(a) => a.element.alignment(syntax),
            Self::Sequence(s) => length.max(s.element.alignment(syntax)),
            Self::MultiSequence(s) => length.max(s.element.alignment(syntax)),
            Self::Record(r) => r.alignment,
        }
    }

    fn instruction_count(&self) -> usize {
        match self {
            Self::Record(r) => {
                r.prefix.iter().count()
                    + usize::from(r.alignment > 1)
                    + r.instructions.iter().map(|i| i.op.instruction_count()).sum::<usize>()
            }
            Self::Array1(a) => 1 + a.element.instruction_count(),
            Self::Array2(a) => 1 + a.element.instruction_count(),
            Self::Array3(a) => 1 + a.element.instruction_count(),
            Self::Array4(a) => 1 + a.element.instruction_count(),
            Self::Sequence(s) => 1 + s.element.instruction_count(),
            Self::MultiSequence(s) => 1 + s.element.instruction_count(),
            Self::Pointer(p) => 1 + p.target.instruction_count(),
            Self::Primitive(_) | Self::Text(_) => 1,
        }
    }
}

/// Compiled encode/decode program for one shape and transfer syntax
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) root: Op,
    pub(crate) syntax: TransferSyntax,
    shape: Shape,
}

impl Program {
    /// Compile `shape` for `syntax`.
    ///
    /// Fails on structural errors: references to missing or non-integer
    /// fields, conflicting varying attributes, bound attributes on fields
    /// that cannot carry them, or fixed arrays nested too deeply.
    pub fn compile(shape: &Shape, syntax: TransferSyntax) -> Result<Self> {
        let compiler = Compiler { syntax };
        let root = compiler.compile(shape)?;
        let program = Self {
            root,
            syntax,
            shape: shape.clone(),
        };
        debug!(
            kind = shape.kind_name(),
            ?syntax,
            instructions = program.instruction_count(),
            "compiled NDR program"
        );
        Ok(program)
    }

    pub fn syntax(&self) -> TransferSyntax {
        self.syntax
    }

    /// Shape the program was compiled from
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Alignment of the first octet written
    pub fn alignment(&self) -> usize {
        self.root.alignment(self.syntax)
    }

    /// Total number of compiled instructions, nested ones included
    pub fn instruction_count(&self) -> usize {
        self.root.instruction_count()
    }
}

struct Compiler {
    syntax: TransferSyntax,
}

impl Compiler {
    fn compile(&self, shape: &Shape) -> Result<Op> {
        Ok(match shape {
            Shape::Primitive(p) => Op::Primitive(*p),
            Shape::Text => Op::Text(Box::new(TextOp {
                inline_bound: None,
                context: None,
            })),
            Shape::Array { .. } => self.compile_array(shape)?,
            Shape::Sequence(element) => self.compile_sequence(element, None)?,
            Shape::Record(record) => self.compile_record(record, false)?,
            Shape::Pointer(target) => Op::Pointer(Box::new(PointerOp {
                target: self.compile(target)?,
            })),
        })
    }

    /// Collapse nested fixed arrays into one instruction.
    fn compile_array(&self, shape: &Shape) -> Result<Op> {
        let mut dims = Vec::new();
        let mut element = shape;
        while let Shape::Array { element: inner, len } = element {
            dims.push(*len);
            element = inner;
        }
        if dims.len() > MAX_ARRAY_DIMENSIONS {
            return Err(NdrError::TooManyDimensions {
                dims: dims.len(),
                max: MAX_ARRAY_DIMENSIONS,
            });
        }
        let zero = element.zero_value();
        let element = self.compile(element)?;
        Ok(match dims[..] {
            [a] => Op::Array1(Box::new(ArrayOp { dims: [a], element, zero })),
            [a, b] => Op::Array2(Box::new(ArrayOp { dims: [a, b], element, zero })),
            [a, b, c] => Op::Array3(Box::new(ArrayOp { dims: [a, b, c], element, zero })),
            [a, b, c, d] => Op::Array4(Box::new(ArrayOp {
                dims: [a, b, c, d],
                element,
                zero,
            })),
            _ => {
                return Err(NdrError::TooManyDimensions {
                    dims: dims.len(),
                    max: MAX_ARRAY_DIMENSIONS,
                })
            }
        })
    }

    fn compile_sequence(&self, element: &Shape, bounds: Option<SequenceBounds>) -> Result<Op> {
        let mut dims = 1;
        let mut inner = element;
        while let Shape::Sequence(next) = inner {
            dims += 1;
            inner = next;
        }
        let zero = inner.zero_value();
        let element = self.compile(inner)?;
        Ok(if dims == 1 {
            Op::Sequence(Box::new(SequenceOp { element, zero, bounds }))
        } else {
            Op::MultiSequence(Box::new(MultiSequenceOp {
                dims,
                element,
                zero,
                bounds,
            }))
        })
    }

    /// Compile a record. `hoisted` is set when an enclosing record writes
    /// this record's conformance prefix.
    fn compile_record(&self, record: &Arc<RecordShape>, hoisted: bool) -> Result<Op> {
        let trailing = trailing_conformant(record);
        let prefix = match &trailing {
            Some((path, owner, field)) if !hoisted => {
                let conformance = resolve_conformance(owner, &field.name, &field.attrs)?;
                conformance.map(|conformance| Prefix {
                    path: path.clone(),
                    conformance,
                    context: BoundContext::new(owner, &field.name),
                })
            }
            _ => None,
        };

        let last = record.fields.len().saturating_sub(1);
        let mut instructions = Vec::with_capacity(record.fields.len());
        let mut skipped = Vec::new();
        for (index, field) in record.fields.iter().enumerate() {
            if field.attrs.is_ignored() {
                if !matches!(field.shape, Shape::Pointer(_)) {
                    return Err(invalid_target(record, field, IGNORE));
                }
                skipped.push(index);
                continue;
            }
            let tail_of_prefix = index == last && trailing.is_some();
            let op = self.compile_field(record, field, tail_of_prefix)?;
            instructions.push(Instruction { op, path: vec![index] });
        }

        let mut alignment = instructions
            .iter()
            .map(|i| i.op.alignment(self.syntax))
            .max()
            .unwrap_or(1);
        if prefix.is_some() {
            alignment = alignment.max(self.syntax.length_size());
        }

        Ok(Op::Record(Box::new(RecordOp {
            name: Arc::from(record.name.as_str()),
            prefix,
            alignment,
            instructions,
            zero: record.fields.iter().map(|f| f.shape.zero_value()).collect(),
            skipped,
        })))
    }

    fn compile_field(&self, record: &RecordShape, field: &FieldShape, hoisted: bool) -> Result<Op> {
        let attrs = &field.attrs;
        match &field.shape {
            Shape::Sequence(element) => {
                let bounds = SequenceBounds {
                    conformance: resolve_conformance(record, &field.name, attrs)?,
                    inline: !hoisted,
                    variance: resolve_variance(record, &field.name, attrs)?,
                    context: BoundContext::new(record, &field.name),
                };
                self.compile_sequence(element, Some(bounds))
            }
            Shape::Text => {
                if attrs.is_varying() {
                    return Err(invalid_target(record, field, first_kind(attrs)));
                }
                let conformance = resolve_conformance(record, &field.name, attrs)?;
                Ok(Op::Text(Box::new(TextOp {
                    inline_bound: conformance.filter(|_| !hoisted),
                    context: Some(BoundContext::new(record, &field.name)),
                })))
            }
            _ if attrs.is_conformant() || attrs.is_varying() => Err(invalid_target(record, field, first_kind(attrs))),
            Shape::Record(inner) => self.compile_record(inner, hoisted),
            shape => self.compile(shape),
        }
    }
}

/// Locate the conformant field ending `record`, descending into a trailing
/// nested record. Returns the path to the owning record, the owner and the
/// field.
fn trailing_conformant(record: &Arc<RecordShape>) -> Option<(FieldPath, Arc<RecordShape>, FieldShape)> {
    let index = record.fields.len().checked_sub(1)?;
    let field = &record.fields[index];
    match &field.shape {
        Shape::Sequence(_) | Shape::Text if field.attrs.is_conformant() => {
            Some((Vec::new(), Arc::clone(record), field.clone()))
        }
        Shape::Record(inner) => {
            let (mut path, owner, field) = trailing_conformant(inner)?;
            path.insert(0, index);
            Some((path, owner, field))
        }
        _ => None,
    }
}

fn first_kind(attrs: &FieldAttrList) -> &str {
    attrs
        .iter()
        .map(|a| a.kind.as_str())
        .find(|k| *k != IGNORE)
        .unwrap_or(SIZE_IS)
}

fn invalid_target(record: &RecordShape, field: &FieldShape, attribute: &str) -> NdrError {
    NdrError::InvalidBoundTarget {
        type_name: record.name.clone(),
        field: field.name.clone(),
        attribute: attribute.to_string(),
    }
}
