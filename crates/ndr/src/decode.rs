//! Program interpreter, decoding direction
//!
//! Reads exactly the octets the encoder wrote for the same program. Bounds
//! are read and discarded; the `(offset, count)` window of each sequence
//! determines what is rebuilt. Elements before the offset, and ignored
//! fields, come back as zero values.

use crate::compile::{ArrayOp, MultiSequenceOp, Op, PointerOp, RecordOp, SequenceBounds, SequenceOp, TextOp};
use crate::options::TransferSyntax;
use crate::shape::{Handle, Primitive, Referent};
use crate::state::State;
use crate::{DataError, NdrError, NdrReader, Program, Result, Value};
use std::io::Read;
use tracing::trace;

impl Program {
    /// Decode one value from `reader`.
    ///
    /// Fails with [`NdrError::AllocationLimitExceeded`] when a sequence or
    /// text claims more than `max_elements` elements.
    pub fn decode<R: Read>(&self, reader: &mut NdrReader<R>, state: &State, max_elements: usize) -> Result<Value> {
        let mut run = Decoding {
            r: reader,
            state,
            syntax: self.syntax,
            max_elements,
        };
        run.op(&self.root)
    }
}

struct Decoding<'a, R> {
    r: &'a mut NdrReader<R>,
    state: &'a State,
    syntax: TransferSyntax,
    max_elements: usize,
}

impl<R: Read> Decoding<'_, R> {
    fn op(&mut self, op: &Op) -> Result<Value> {
        match op {
            Op::Primitive(p) => self.primitive(*p),
            Op::Text(t) => self.text(t),
            Op::Array1(a) => self.array1(a),
            Op::Array2(a) => self.array2(a),
            Op::Array3(a) => self.array3(a),
            Op::Array4(a) => self.array4(a),
            Op::Sequence(s) => self.sequence(s),
            Op::MultiSequence(s) => self.multi_sequence(s),
            Op::Record(r) => self.record(r),
            Op::Pointer(p) => self.pointer(p),
        }
    }

    fn primitive(&mut self, p: Primitive) -> Result<Value> {
        Ok(match p {
            Primitive::Bool => Value::Bool(self.r.read_bool()?),
            Primitive::Int8 => Value::Int8(self.r.read_i8()?),
            Primitive::Uint8 => Value::Uint8(self.r.read_u8()?),
            Primitive::Int16 => Value::Int16(self.r.read_i16()?),
            Primitive::Uint16 => Value::Uint16(self.r.read_u16()?),
            Primitive::Int32 => Value::Int32(self.r.read_i32()?),
            Primitive::Uint32 => Value::Uint32(self.r.read_u32()?),
            Primitive::Int64 => Value::Int64(self.r.read_i64()?),
            Primitive::Uint64 => Value::Uint64(self.r.read_u64()?),
            Primitive::Float32 => Value::Float32(self.r.read_f32()?),
            Primitive::Float64 => Value::Float64(self.r.read_f64()?),
        })
    }

    fn check_count(&self, requested: u64) -> Result<usize> {
        match usize::try_from(requested) {
            Ok(count) if count <= self.max_elements => Ok(count),
            _ => Err(NdrError::AllocationLimitExceeded {
                requested,
                limit: self.max_elements,
            }),
        }
    }

    /// Read and discard `count` conformance bounds.
    fn skip_bounds(&mut self, count: usize) -> Result<()> {
        for _ in 0..count {
            let bound = self.r.read_length(self.syntax)?;
            trace!(bound, "conformance bound");
        }
        Ok(())
    }

    fn read_subset(&mut self) -> Result<(usize, usize)> {
        let offset = self.r.read_length(self.syntax)?;
        let count = self.r.read_length(self.syntax)?;
        let total = self.check_count(offset.saturating_add(count))?;
        let count = self.check_count(count)?;
        Ok((total - count, count))
    }

    fn text(&mut self, op: &TextOp) -> Result<Value> {
        if let Some(bound) = &op.inline_bound {
            self.skip_bounds(bound.bound_count())?;
        }
        let (_, count) = self.read_subset()?;
        let (text, substituted) = self.r.read_string(count)?;
        if substituted > 0 {
            self.state.add_error(DataError::NonAsciiCharacter { count: substituted });
        }
        Ok(Value::Text(text))
    }

    fn array1(&mut self, op: &ArrayOp<1>) -> Result<Value> {
        let [d0] = op.dims;
        self.row(&op.element, d0)
    }

    fn array2(&mut self, op: &ArrayOp<2>) -> Result<Value> {
        let [d0, d1] = op.dims;
        let mut outer = Vec::with_capacity(d0);
        for _ in 0..d0 {
            outer.push(self.row(&op.element, d1)?);
        }
        Ok(Value::Array(outer))
    }

    fn array3(&mut self, op: &ArrayOp<3>) -> Result<Value> {
        let [d0, d1, d2] = op.dims;
        let mut a = Vec::with_capacity(d0);
        for _ in 0..d0 {
            let mut b = Vec::with_capacity(d1);
            for _ in 0..d1 {
                b.push(self.row(&op.element, d2)?);
            }
            a.push(Value::Array(b));
        }
        Ok(Value::Array(a))
    }

    fn array4(&mut self, op: &ArrayOp<4>) -> Result<Value> {
        let [d0, d1, d2, d3] = op.dims;
        let mut a = Vec::with_capacity(d0);
        for _ in 0..d0 {
            let mut b = Vec::with_capacity(d1);
            for _ in 0..d1 {
                let mut c = Vec::with_capacity(d2);
                for _ in 0..d2 {
                    c.push(self.row(&op.element, d3)?);
                }
                b.push(Value::Array(c));
            }
            a.push(Value::Array(b));
        }
        Ok(Value::Array(a))
    }

    /// Innermost fixed-array row
    fn row(&mut self, element: &Op, len: usize) -> Result<Value> {
        let mut items = Vec::with_capacity(len);
        for _ in 0..len {
            items.push(self.op(element)?);
        }
        Ok(Value::Array(items))
    }

    fn inline_bounds(&mut self, bounds: Option<&SequenceBounds>) -> Result<()> {
        if let Some(conformance) = bounds.and_then(SequenceBounds::inline_conformance) {
            self.skip_bounds(conformance.bound_count())?;
        }
        Ok(())
    }

    fn sequence(&mut self, op: &SequenceOp) -> Result<Value> {
        self.inline_bounds(op.bounds.as_ref())?;
        let (offset, count) = self.read_subset()?;
        let mut items = vec![op.zero.clone(); offset];
        items.reserve(count);
        for _ in 0..count {
            items.push(self.op(&op.element)?);
        }
        Ok(Value::Sequence(items))
    }

    fn multi_sequence(&mut self, op: &MultiSequenceOp) -> Result<Value> {
        self.inline_bounds(op.bounds.as_ref())?;
        let mut windows = Vec::with_capacity(op.dims);
        let mut total: u64 = 1;
        for _ in 0..op.dims {
            let (offset, count) = self.read_subset()?;
            total = total.saturating_mul((offset + count) as u64);
            self.check_count(total)?;
            windows.push((offset, count));
        }
        trace!(dims = op.dims, ?windows, "multi-dimensional sequence");
        self.rebuild(op, &windows)
    }

    fn rebuild(&mut self, op: &MultiSequenceOp, windows: &[(usize, usize)]) -> Result<Value> {
        let Some((&(offset, count), rest)) = windows.split_first() else {
            return self.op(&op.element);
        };
        let zero = if rest.is_empty() {
            op.zero.clone()
        } else {
            Value::Sequence(Vec::new())
        };
        let mut items = vec![zero; offset];
        items.reserve(count);
        for _ in 0..count {
            items.push(self.rebuild(op, rest)?);
        }
        Ok(Value::Sequence(items))
    }

    fn record(&mut self, op: &RecordOp) -> Result<Value> {
        if let Some(prefix) = &op.prefix {
            trace!(record = %op.name, "reading conformance prefix");
            self.skip_bounds(prefix.conformance.bound_count())?;
        }
        if op.alignment > 1 {
            self.r.align(op.alignment)?;
        }
        let mut fields = op.zero.clone();
        for instruction in &op.instructions {
            let value = self.op(&instruction.op)?;
            if let Some(slot) = fields.get_mut(instruction.field()) {
                *slot = value;
            }
        }
        Ok(Value::Record(fields))
    }

    fn pointer(&mut self, op: &PointerOp) -> Result<Value> {
        let id = self.r.read_length(self.syntax)?;
        if id == 0 {
            return Ok(Value::Pointer(None));
        }
        let target = match self.state.referent(id) {
            Some(target) => target,
            None => {
                trace!(id, "reading referent");
                let target = self.op(&op.target)?;
                self.state.store_referent(id, target.clone());
                target
            }
        };
        Ok(Value::Pointer(Some(Referent {
            handle: Handle(id),
            target: Box::new(target),
        })))
    }
}
