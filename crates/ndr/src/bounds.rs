//! Conformance and variance of bounded fields
//!
//! A conformant field transmits its maximum size as one or two bounds read
//! from sibling fields (`min_is`, `max_is`, `size_is`). A varying field
//! transmits an `(offset, count)` window over its elements, derived from
//! `first_is`, `last_is` and `length_is`.
//!
//! Bounds are resolved against the enclosing record twice: field names are
//! turned into sibling indices at compile time, and the sibling values are
//! read each time the field is encoded. Bad values never abort encoding;
//! they are recorded as [`DataError`]s and an empty window is written.

use crate::attrs::{FieldAttrList, FIRST_IS, LAST_IS, LENGTH_IS, MAX_IS, MIN_IS, SIZE_IS};
use crate::shape::{RecordShape, Shape};
use crate::state::State;
use crate::{DataError, NdrError, Result, Value};
use std::sync::Arc;
use tracing::trace;

/// Offset and count of one dimension of a varying array
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SliceSubset {
    pub offset: u64,
    pub count: u64,
}

impl SliceSubset {
    pub const EMPTY: Self = Self { offset: 0, count: 0 };

    pub fn new(offset: u64, count: u64) -> Self {
        Self { offset, count }
    }

    /// Whole sequence of `len` elements
    pub fn whole(len: usize) -> Self {
        Self::new(0, len as u64)
    }
}

/// Sibling field referenced by a bound attribute
#[derive(Debug, Clone)]
pub(crate) struct FieldRef {
    pub index: usize,
    pub name: Arc<str>,
}

/// Names used in data error reports
#[derive(Debug, Clone)]
pub(crate) struct BoundContext {
    pub type_name: Arc<str>,
    pub field: Arc<str>,
}

impl BoundContext {
    pub fn new(record: &RecordShape, field: &str) -> Self {
        Self {
            type_name: Arc::from(record.name.as_str()),
            field: Arc::from(field),
        }
    }

    fn overflow(&self, r: &FieldRef, value: u64, limit: u64) -> DataError {
        DataError::BoundOverflow {
            type_name: self.type_name.to_string(),
            field: self.field.to_string(),
            reference: r.name.to_string(),
            value,
            limit,
        }
    }
}

/// Resolved conformant bound, in priority order
#[derive(Debug, Clone)]
pub(crate) enum Conformance {
    MinMax { min: FieldRef, max: FieldRef },
    Size(FieldRef),
    Min(FieldRef),
    Max(FieldRef),
}

impl Conformance {
    /// Number of bounds on the wire
    pub fn bound_count(&self) -> usize {
        match self {
            Self::MinMax { .. } => 2,
            _ => 1,
        }
    }

    pub fn min_ref(&self) -> Option<&FieldRef> {
        match self {
            Self::MinMax { min, .. } | Self::Min(min) => Some(min),
            _ => None,
        }
    }

    /// Bound values to transmit. Negative values, and values above `limit`,
    /// are reported and sent as 0.
    pub fn values(&self, siblings: &[Value], limit: u64, ctx: &BoundContext, state: &State) -> [Option<u64>; 2] {
        let bound = |r: &FieldRef| match read_ref(siblings, r, ctx, state) {
            Some(value) if value < 0 => {
                state.add_error(DataError::NegativeSize {
                    type_name: ctx.type_name.to_string(),
                    field: ctx.field.to_string(),
                    reference: r.name.to_string(),
                    value,
                });
                0
            }
            Some(value) if value as u64 > limit => {
                state.add_error(ctx.overflow(r, value as u64, limit));
                0
            }
            Some(value) => value as u64,
            None => 0,
        };
        match self {
            Self::MinMax { min, max } => [Some(bound(min)), Some(bound(max))],
            Self::Size(r) | Self::Min(r) | Self::Max(r) => [Some(bound(r)), None],
        }
    }
}

/// Resolved varying window
#[derive(Debug, Clone)]
pub(crate) enum Variance {
    /// No varying attributes: offset 0, every element
    Whole,
    Window {
        first: Option<FieldRef>,
        last: Option<FieldRef>,
        length: Option<FieldRef>,
    },
}

impl Variance {
    /// Compute the window over `available` elements. The window end
    /// (`offset + count`) never exceeds `limit`.
    pub fn resolve(
        &self,
        siblings: &[Value],
        available: usize,
        limit: u64,
        min: Option<&FieldRef>,
        ctx: &BoundContext,
        state: &State,
    ) -> SliceSubset {
        let Self::Window { first, last, length } = self else {
            return SliceSubset::whole(available);
        };

        let report = |err: DataError| {
            state.add_error(err);
            SliceSubset::EMPTY
        };
        let negative_index = |r: &FieldRef, value: i64| {
            report(DataError::NegativeIndex {
                type_name: ctx.type_name.to_string(),
                field: ctx.field.to_string(),
                reference: r.name.to_string(),
                value,
            })
        };

        let mut unreadable = false;
        let first_v = read_window_ref(first, siblings, ctx, state, &mut unreadable);
        let last_v = read_window_ref(last, siblings, ctx, state, &mut unreadable);
        let length_v = read_window_ref(length, siblings, ctx, state, &mut unreadable);
        if unreadable {
            return SliceSubset::EMPTY;
        }

        if let Some((r, v)) = first_v.filter(|(_, v)| *v < 0) {
            return negative_index(r, v);
        }
        if let Some((r, v)) = last_v.filter(|(_, v)| *v < 0) {
            return negative_index(r, v);
        }
        if let Some((r, v)) = length_v.filter(|(_, v)| *v < 0) {
            return report(DataError::NegativeLength {
                type_name: ctx.type_name.to_string(),
                field: ctx.field.to_string(),
                reference: r.name.to_string(),
                value: v,
            });
        }

        if let Some(min_ref) = min {
            let Some(min_v) = read_ref(siblings, min_ref, ctx, state) else {
                return SliceSubset::EMPTY;
            };
            if let Some((r, f)) = first_v.filter(|(_, f)| *f < min_v) {
                return report(DataError::FirstLessThanMin {
                    type_name: ctx.type_name.to_string(),
                    field: ctx.field.to_string(),
                    reference: r.name.to_string(),
                    first: f,
                    min: min_v,
                });
            }
            if let Some((r, l)) = last_v.filter(|(_, l)| *l < min_v) {
                return report(DataError::LastLessThanMin {
                    type_name: ctx.type_name.to_string(),
                    field: ctx.field.to_string(),
                    reference: r.name.to_string(),
                    last: l,
                    min: min_v,
                });
            }
        }

        // Every value is now in 0..=i64::MAX, so u64 arithmetic below cannot
        // overflow.
        let subset = match (first_v, last_v, length_v) {
            (Some((_, f)), Some((r, l)), _) => {
                if f > l {
                    return report(DataError::FirstGreaterThanLast {
                        type_name: ctx.type_name.to_string(),
                        field: ctx.field.to_string(),
                        reference: r.name.to_string(),
                        first: f,
                        last: l,
                    });
                }
                SliceSubset::new(f as u64, (l - f) as u64 + 1)
            }
            (Some((_, f)), None, Some((_, n))) => SliceSubset::new(f as u64, n as u64),
            (None, Some((_, l)), Some((r, n))) => {
                if n - l > 1 {
                    return negative_index(r, l - n + 1);
                }
                SliceSubset::new(l as u64 + 1 - n as u64, n as u64)
            }
            (None, None, Some((_, n))) => SliceSubset::new(0, n as u64),
            (Some((_, f)), None, None) => {
                SliceSubset::new(f as u64, (available as u64).saturating_sub(f as u64))
            }
            (None, Some((_, l)), None) => SliceSubset::new(0, l as u64 + 1),
            (None, None, None) => SliceSubset::whole(available),
        };

        let end = subset.offset + subset.count;
        if end > limit {
            let r = length.as_ref().or(last.as_ref()).or(first.as_ref());
            if let Some(r) = r {
                return report(ctx.overflow(r, end, limit));
            }
        }
        trace!(
            field = %ctx.field,
            offset = subset.offset,
            count = subset.count,
            "resolved varying window"
        );
        subset
    }
}

fn read_window_ref<'a>(
    r: &'a Option<FieldRef>,
    siblings: &[Value],
    ctx: &BoundContext,
    state: &State,
    unreadable: &mut bool,
) -> Option<(&'a FieldRef, i64)> {
    let r = r.as_ref()?;
    let value = read_ref(siblings, r, ctx, state);
    *unreadable |= value.is_none();
    value.map(|v| (r, v))
}

/// Read an integer sibling. Non-integer values are reported and read as 0;
/// unsigned values beyond `i64::MAX` are reported and yield `None`.
fn read_ref(siblings: &[Value], r: &FieldRef, ctx: &BoundContext, state: &State) -> Option<i64> {
    match siblings.get(r.index) {
        Some(&Value::Uint64(v)) if v > i64::MAX as u64 => {
            state.add_error(ctx.overflow(r, v, i64::MAX as u64));
            None
        }
        Some(value) => Some(value.as_i64().unwrap_or_else(|| {
            state.add_error(DataError::ShapeMismatch {
                expected: "integer",
                found: value.kind_name(),
            });
            0
        })),
        None => {
            state.add_error(DataError::ShapeMismatch {
                expected: "integer",
                found: "nothing",
            });
            Some(0)
        }
    }
}

/// Resolve a sibling name to its index, requiring an integer field.
fn field_ref(record: &RecordShape, field: &str, reference: &str) -> Result<FieldRef> {
    let index = record
        .field_index(reference)
        .ok_or_else(|| NdrError::MissingFieldReference {
            type_name: record.name.clone(),
            field: field.to_string(),
            reference: reference.to_string(),
        })?;
    match &record.fields[index].shape {
        Shape::Primitive(p) if p.is_integer() => Ok(FieldRef {
            index,
            name: Arc::from(reference),
        }),
        _ => Err(NdrError::NonIntegerReference {
            type_name: record.name.clone(),
            field: field.to_string(),
            reference: reference.to_string(),
        }),
    }
}

/// Compile the conformant bound of `field`, if it has one.
pub(crate) fn resolve_conformance(
    record: &RecordShape,
    field: &str,
    attrs: &FieldAttrList,
) -> Result<Option<Conformance>> {
    let lookup = |kind: &str| {
        attrs
            .get(kind)
            .map(|name| field_ref(record, field, name))
            .transpose()
    };
    let min = lookup(MIN_IS)?;
    let max = lookup(MAX_IS)?;
    let size = lookup(SIZE_IS)?;
    Ok(match (min, max, size) {
        (Some(min), Some(max), _) => Some(Conformance::MinMax { min, max }),
        (_, _, Some(size)) => Some(Conformance::Size(size)),
        (Some(min), None, None) => Some(Conformance::Min(min)),
        (None, Some(max), None) => Some(Conformance::Max(max)),
        (None, None, None) => None,
    })
}

/// Compile the varying window of `field`.
pub(crate) fn resolve_variance(record: &RecordShape, field: &str, attrs: &FieldAttrList) -> Result<Variance> {
    if !attrs.is_varying() {
        return Ok(Variance::Whole);
    }
    if attrs.get(LAST_IS).is_some() && attrs.get(LENGTH_IS).is_some() {
        return Err(NdrError::ConflictingVaryingBounds {
            type_name: record.name.clone(),
            field: field.to_string(),
        });
    }
    let lookup = |kind: &str| {
        attrs
            .get(kind)
            .map(|name| field_ref(record, field, name))
            .transpose()
    };
    Ok(Variance::Window {
        first: lookup(FIRST_IS)?,
        last: lookup(LAST_IS)?,
        length: lookup(LENGTH_IS)?,
    })
}
