//! Program interpreter, encoding direction
//!
//! Walks a [`Value`] alongside the compiled instructions and writes it
//! through an [`NdrWriter`]. Values that do not match the compiled shape are
//! reported as data errors and replaced by the zero value of the shape, so
//! the produced stream always matches the program.

use crate::bounds::{BoundContext, Conformance, SliceSubset};
use crate::compile::{ArrayOp, MultiSequenceOp, Op, PointerOp, RecordOp, SequenceBounds, SequenceOp, TextOp};
use crate::options::TransferSyntax;
use crate::shape::Primitive;
use crate::state::State;
use crate::{DataError, NdrWriter, Program, Result, Value};
use std::io::Write;
use tracing::trace;

impl Program {
    /// Encode `value` into `writer`, recording data errors in `state`.
    pub fn encode<W: Write>(&self, writer: &mut NdrWriter<W>, state: &State, value: &Value) -> Result<()> {
        let mut run = Encoding {
            w: writer,
            state,
            syntax: self.syntax,
        };
        run.op(&self.root, value, &[])
    }
}

struct Encoding<'a, W> {
    w: &'a mut NdrWriter<W>,
    state: &'a State,
    syntax: TransferSyntax,
}

impl<W: Write> Encoding<'_, W> {
    /// Encode one value. `siblings` are the fields of the enclosing record.
    fn op(&mut self, op: &Op, value: &Value, siblings: &[Value]) -> Result<()> {
        match op {
            Op::Primitive(p) => self.primitive(*p, value),
            Op::Text(t) => self.text(t, value, siblings),
            Op::Array1(a) => self.array1(a, value),
            Op::Array2(a) => self.array2(a, value),
            Op::Array3(a) => self.array3(a, value),
            Op::Array4(a) => self.array4(a, value),
            Op::Sequence(s) => self.sequence(s, value, siblings),
            Op::MultiSequence(s) => self.multi_sequence(s, value, siblings),
            Op::Record(r) => self.record(r, value),
            Op::Pointer(p) => self.pointer(p, value),
        }
    }

    fn mismatch(&self, expected: &'static str, found: &Value) {
        self.state.add_error(DataError::ShapeMismatch {
            expected,
            found: found.kind_name(),
        });
    }

    fn primitive(&mut self, p: Primitive, value: &Value) -> Result<()> {
        match (p, value) {
            (Primitive::Bool, Value::Bool(v)) => self.w.write_bool(*v),
            (Primitive::Int8, Value::Int8(v)) => self.w.write_i8(*v),
            (Primitive::Uint8, Value::Uint8(v)) => self.w.write_u8(*v),
            (Primitive::Int16, Value::Int16(v)) => self.w.write_i16(*v),
            (Primitive::Uint16, Value::Uint16(v)) => self.w.write_u16(*v),
            (Primitive::Int32, Value::Int32(v)) => self.w.write_i32(*v),
            (Primitive::Uint32, Value::Uint32(v)) => self.w.write_u32(*v),
            (Primitive::Int64, Value::Int64(v)) => self.w.write_i64(*v),
            (Primitive::Uint64, Value::Uint64(v)) => self.w.write_u64(*v),
            (Primitive::Float32, Value::Float32(v)) => self.w.write_f32(*v),
            (Primitive::Float64, Value::Float64(v)) => self.w.write_f64(*v),
            (p, other) => {
                self.mismatch(p.name(), other);
                self.primitive(p, &p.zero())
            }
        }
    }

    fn conformance(&mut self, conformance: &Conformance, siblings: &[Value], ctx: &BoundContext) -> Result<()> {
        let limit = self.syntax.max_length();
        for bound in conformance.values(siblings, limit, ctx, self.state).into_iter().flatten() {
            self.w.write_length(self.syntax, bound)?;
        }
        Ok(())
    }

    fn text(&mut self, op: &TextOp, value: &Value, siblings: &[Value]) -> Result<()> {
        let text = match value {
            Value::Text(s) => s.as_str(),
            other => {
                self.mismatch("text", other);
                ""
            }
        };
        if let (Some(bound), Some(ctx)) = (&op.inline_bound, &op.context) {
            self.conformance(bound, siblings, ctx)?;
        }
        let units = self.w.text_units(text);
        self.w.write_length(self.syntax, 0)?;
        self.w.write_length(self.syntax, units as u64)?;
        let substituted = self.w.write_string(text)?;
        if substituted > 0 {
            self.state.add_error(DataError::NonAsciiCharacter { count: substituted });
        }
        Ok(())
    }

    fn array1(&mut self, op: &ArrayOp<1>, value: &Value) -> Result<()> {
        let [d0] = op.dims;
        let items = rows(self.state, value, d0);
        for i in 0..d0 {
            self.op(&op.element, items.get(i).unwrap_or(&op.zero), &[])?;
        }
        Ok(())
    }

    fn array2(&mut self, op: &ArrayOp<2>, value: &Value) -> Result<()> {
        let [d0, d1] = op.dims;
        let outer = rows(self.state, value, d0);
        for i in 0..d0 {
            let inner = outer.get(i).map_or(&[][..], |row| rows(self.state, row, d1));
            for j in 0..d1 {
                self.op(&op.element, inner.get(j).unwrap_or(&op.zero), &[])?;
            }
        }
        Ok(())
    }

    fn array3(&mut self, op: &ArrayOp<3>, value: &Value) -> Result<()> {
        let [d0, d1, d2] = op.dims;
        let a = rows(self.state, value, d0);
        for i in 0..d0 {
            let b = a.get(i).map_or(&[][..], |row| rows(self.state, row, d1));
            for j in 0..d1 {
                let c = b.get(j).map_or(&[][..], |row| rows(self.state, row, d2));
                for k in 0..d2 {
                    self.op(&op.element, c.get(k).unwrap_or(&op.zero), &[])?;
                }
            }
        }
        Ok(())
    }

    fn array4(&mut self, op: &ArrayOp<4>, value: &Value) -> Result<()> {
        let [d0, d1, d2, d3] = op.dims;
        let a = rows(self.state, value, d0);
        for i in 0..d0 {
            let b = a.get(i).map_or(&[][..], |row| rows(self.state, row, d1));
            for j in 0..d1 {
                let c = b.get(j).map_or(&[][..], |row| rows(self.state, row, d2));
                for k in 0..d2 {
                    let d = c.get(k).map_or(&[][..], |row| rows(self.state, row, d3));
                    for l in 0..d3 {
                        self.op(&op.element, d.get(l).unwrap_or(&op.zero), &[])?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Write the inline bound, if any, and compute the outer window.
    fn window(&mut self, bounds: Option<&SequenceBounds>, available: usize, siblings: &[Value]) -> Result<SliceSubset> {
        let Some(bounds) = bounds else {
            return Ok(SliceSubset::whole(available));
        };
        if let Some(conformance) = bounds.inline_conformance() {
            self.conformance(conformance, siblings, &bounds.context)?;
        }
        let min = bounds.conformance.as_ref().and_then(Conformance::min_ref);
        let limit = self.syntax.max_length();
        Ok(bounds
            .variance
            .resolve(siblings, available, limit, min, &bounds.context, self.state))
    }

    fn subset(&mut self, subset: SliceSubset) -> Result<()> {
        self.w.write_length(self.syntax, subset.offset)?;
        self.w.write_length(self.syntax, subset.count)
    }

    fn sequence(&mut self, op: &SequenceOp, value: &Value, siblings: &[Value]) -> Result<()> {
        let items = self.items(value);
        let subset = self.window(op.bounds.as_ref(), items.len(), siblings)?;
        self.subset(subset)?;
        for i in subset.offset..subset.offset + subset.count {
            let item = usize::try_from(i).ok().and_then(|i| items.get(i));
            self.op(&op.element, item.unwrap_or(&op.zero), &[])?;
        }
        Ok(())
    }

    fn multi_sequence(&mut self, op: &MultiSequenceOp, value: &Value, siblings: &[Value]) -> Result<()> {
        let items = self.items(value);
        let outer = self.window(op.bounds.as_ref(), items.len(), siblings)?;

        // Inner dimensions are transmitted whole, sized by their longest row.
        let mut counts = vec![0u64; op.dims - 1];
        for item in items {
            longest_rows(item, &mut counts);
        }

        self.subset(outer)?;
        for &count in &counts {
            self.subset(SliceSubset::new(0, count))?;
        }
        trace!(dims = op.dims, ?outer, ?counts, "multi-dimensional sequence");
        self.walk(op, Some(value), outer, &counts)
    }

    fn walk(&mut self, op: &MultiSequenceOp, value: Option<&Value>, subset: SliceSubset, inner: &[u64]) -> Result<()> {
        let items = value.and_then(Value::elements).unwrap_or(&[]);
        for i in subset.offset..subset.offset + subset.count {
            let item = usize::try_from(i).ok().and_then(|i| items.get(i));
            match inner.split_first() {
                Some((&count, rest)) => self.walk(op, item, SliceSubset::new(0, count), rest)?,
                None => self.op(&op.element, item.unwrap_or(&op.zero), &[])?,
            }
        }
        Ok(())
    }

    fn items<'v>(&self, value: &'v Value) -> &'v [Value] {
        match value {
            Value::Sequence(items) => items,
            other => {
                self.mismatch("sequence", other);
                &[]
            }
        }
    }

    fn record(&mut self, op: &RecordOp, value: &Value) -> Result<()> {
        let fields = match value {
            Value::Record(fields) => {
                if fields.len() != op.zero.len() {
                    self.state.add_error(DataError::ShapeMismatch {
                        expected: "record",
                        found: "record of another arity",
                    });
                }
                fields.as_slice()
            }
            other => {
                self.mismatch("record", other);
                op.zero.as_slice()
            }
        };

        if let Some(prefix) = &op.prefix {
            let owner = prefix
                .path
                .iter()
                .try_fold(fields, |fields, &i| fields.get(i).and_then(Value::fields))
                .unwrap_or(&[]);
            trace!(record = %op.name, "writing conformance prefix");
            self.conformance(&prefix.conformance, owner, &prefix.context)?;
        }
        if op.alignment > 1 {
            self.w.align(op.alignment)?;
        }
        for instruction in &op.instructions {
            let index = instruction.field();
            let field = fields.get(index).or_else(|| op.zero.get(index));
            if let Some(field) = field {
                self.op(&instruction.op, field, fields)?;
            }
        }
        Ok(())
    }

    fn pointer(&mut self, op: &PointerOp, value: &Value) -> Result<()> {
        let referent = match value {
            Value::Pointer(referent) => referent.as_ref(),
            other => {
                self.mismatch("pointer", other);
                None
            }
        };
        let Some(referent) = referent else {
            return self.w.write_length(self.syntax, 0);
        };

        let (id, first) = self.state.register(referent.handle);
        if self.syntax == TransferSyntax::Ndr && id > u64::from(u32::MAX) {
            self.state.add_error(DataError::ReferentOverflow { id });
            return self.w.write_length(self.syntax, 0);
        }
        self.w.write_length(self.syntax, id)?;
        if first {
            trace!(id, handle = referent.handle.0, "writing referent");
            self.op(&op.target, &referent.target, &[])?;
        }
        Ok(())
    }
}

/// Rows of a fixed array level, reporting length mismatches.
fn rows<'v>(state: &State, value: &'v Value, expected: usize) -> &'v [Value] {
    match value.elements() {
        Some(items) => {
            if items.len() != expected {
                state.add_error(DataError::ArrayLengthMismatch {
                    expected,
                    found: items.len(),
                });
            }
            items
        }
        None => {
            state.add_error(DataError::ShapeMismatch {
                expected: "array",
                found: value.kind_name(),
            });
            &[]
        }
    }
}

/// Record the longest row at each nesting depth below `value`.
fn longest_rows(value: &Value, counts: &mut [u64]) {
    let Some((count, rest)) = counts.split_first_mut() else {
        return;
    };
    if let Some(items) = value.elements() {
        *count = (*count).max(items.len() as u64);
        for item in items {
            longest_rows(item, rest);
        }
    }
}
