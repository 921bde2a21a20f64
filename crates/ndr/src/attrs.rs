//! IDL field attributes
//!
//! Bounded fields carry a comma-separated attribute list produced by the IDL
//! parser, for example `"size_is(Count)"` or `"first_is(First), last_is(Last)"`.
//! The special token `ignore` marks a pointer field that is not transmitted.
//!
//! Tokens that are neither `ignore` nor `kind(argument)` are dropped; parsing
//! never fails.

use std::fmt;

/// `min_is(field)` - lower bound of a conformant array
pub const MIN_IS: &str = "min_is";
/// `max_is(field)` - upper bound of a conformant array
pub const MAX_IS: &str = "max_is";
/// `size_is(field)` - element count of a conformant array
pub const SIZE_IS: &str = "size_is";
/// `first_is(field)` - first transmitted index of a varying array
pub const FIRST_IS: &str = "first_is";
/// `last_is(field)` - last transmitted index of a varying array
pub const LAST_IS: &str = "last_is";
/// `length_is(field)` - transmitted element count of a varying array
pub const LENGTH_IS: &str = "length_is";
/// `ignore` - pointer field not transmitted
pub const IGNORE: &str = "ignore";

const CONFORMANT_KINDS: [&str; 3] = [MIN_IS, MAX_IS, SIZE_IS];
const VARYING_KINDS: [&str; 3] = [FIRST_IS, LAST_IS, LENGTH_IS];

/// A single parsed field attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldAttr {
    pub kind: String,
    pub argument: String,
}

impl FieldAttr {
    pub fn new(kind: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            argument: argument.into(),
        }
    }

    /// Parse one token. Returns `None` for malformed tokens.
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token == IGNORE {
            return Some(Self::new(IGNORE, ""));
        }
        let open = token.find('(')?;
        let close = token.rfind(')')?;
        if close <= open + 1 {
            return None;
        }
        let kind = token[..open].trim();
        let argument = token[open + 1..close].trim();
        if kind.is_empty() || argument.is_empty() {
            return None;
        }
        Some(Self::new(kind, argument))
    }
}

impl fmt::Display for FieldAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.argument.is_empty() {
            f.write_str(&self.kind)
        } else {
            write!(f, "{}({})", self.kind, self.argument)
        }
    }
}

/// Ordered list of field attributes
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FieldAttrList(Vec<FieldAttr>);

impl FieldAttrList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Parse an IDL attribute string
    pub fn parse(attrs: &str) -> Self {
        Self(attrs.split(',').filter_map(FieldAttr::parse).collect())
    }

    pub fn push(&mut self, attr: FieldAttr) {
        self.0.push(attr);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldAttr> {
        self.0.iter()
    }

    /// True if any attribute has one of the given kinds
    pub fn contains(&self, any_of: &[&str]) -> bool {
        self.0.iter().any(|a| any_of.contains(&a.kind.as_str()))
    }

    /// Argument of the first attribute of the given kind
    pub fn get(&self, kind: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|a| a.kind == kind)
            .map(|a| a.argument.as_str())
    }

    /// Bound carried via `min_is`, `max_is` or `size_is`
    pub fn is_conformant(&self) -> bool {
        self.contains(&CONFORMANT_KINDS)
    }

    /// Window carried via `first_is`, `last_is` or `length_is`
    pub fn is_varying(&self) -> bool {
        self.contains(&VARYING_KINDS)
    }

    pub fn is_ignored(&self) -> bool {
        self.contains(&[IGNORE])
    }
}

impl From<&str> for FieldAttrList {
    fn from(attrs: &str) -> Self {
        Self::parse(attrs)
    }
}

impl FromIterator<FieldAttr> for FieldAttrList {
    fn from_iter<I: IntoIterator<Item = FieldAttr>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a FieldAttrList {
    type Item = &'a FieldAttr;
    type IntoIter = std::slice::Iter<'a, FieldAttr>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for FieldAttrList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, attr) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", attr)?;
        }
        Ok(())
    }
}
