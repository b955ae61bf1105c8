//! Variables as the debugger tracks them.

use fastdbg_codec::{Value, VarType};
use serde::Serialize;

/// Arrays with at least this many elements are tracked as a single
/// placeholder instead of per element.
pub const LARGE_ARRAY_THRESHOLD: usize = 256;

/// Current contents of a variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VarValue {
    /// A single value.
    Scalar(Value),
    /// An enumerated array; each element is tracked on its own.
    Elements(Vec<Variable>),
    /// An array too large to enumerate; only its element count is known.
    LargeArray {
        /// Number of elements declared.
        count: usize,
    },
}

/// A program variable, or one element of an array variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Variable {
    /// Display name. String names end in `$`, float names in `%`;
    /// array elements are named by index.
    pub name: String,
    /// Element type.
    pub var_type: VarType,
    /// Total bytes of data, across all elements for arrays.
    pub byte_len: usize,
    /// Target address; 0 until the label file or a stop report supplies one.
    pub address: u16,
    /// Current contents.
    pub value: VarValue,
    /// Set when the user changed the value and the change has not been
    /// sent to the target yet.
    #[serde(skip)]
    pub modified: bool,
}

impl Variable {
    /// A scalar holding the default value of its type.
    pub fn scalar(name: impl Into<String>, var_type: VarType) -> Self {
        Self {
            name: name.into(),
            var_type,
            byte_len: var_type.width(),
            address: 0,
            value: VarValue::Scalar(Value::default_for(var_type)),
            modified: false,
        }
    }

    /// An array of `count` elements.
    ///
    /// Below [`LARGE_ARRAY_THRESHOLD`] every element becomes a child
    /// variable; at or above it the array collapses to a placeholder.
    pub fn array(name: impl Into<String>, var_type: VarType, count: usize) -> Self {
        let value = if count < LARGE_ARRAY_THRESHOLD {
            VarValue::Elements(
                (0..count)
                    .map(|i| Variable::scalar(i.to_string(), var_type))
                    .collect(),
            )
        } else {
            VarValue::LargeArray { count }
        };
        Self {
            name: name.into(),
            var_type,
            byte_len: var_type.width() * count,
            address: 0,
            value,
            modified: false,
        }
    }

    /// Name as it appears in the label file, without the type suffix.
    pub fn label_name(&self) -> &str {
        self.name
            .strip_suffix(self.var_type.name_suffix())
            .unwrap_or(&self.name)
    }

    /// `true` for enumerated arrays and large-array placeholders.
    pub fn is_array(&self) -> bool {
        !matches!(self.value, VarValue::Scalar(_))
    }

    /// `true` when the target must dereference this variable's slot to
    /// report it, i.e. strings and arrays.
    pub fn is_heap_resident(&self) -> bool {
        self.var_type == VarType::String || self.is_array()
    }

    /// Number of bytes the target is asked to report for a heap-resident
    /// variable. Large arrays only report their address.
    pub fn dump_len(&self) -> usize {
        match self.value {
            VarValue::LargeArray { .. } => 2,
            _ => self.byte_len,
        }
    }

    /// Width of this variable's slot in the contiguous variable area.
    /// Strings and arrays keep a pointer there.
    pub fn slot_len(&self) -> usize {
        if self.is_heap_resident() {
            2
        } else {
            self.var_type.width()
        }
    }

    /// The scalar value, if this is not an array.
    pub fn scalar_value(&self) -> Option<&Value> {
        match &self.value {
            VarValue::Scalar(v) => Some(v),
            _ => None,
        }
    }

    /// Enumerated elements, if this is an enumerated array.
    pub fn elements(&self) -> Option<&[Variable]> {
        match &self.value {
            VarValue::Elements(e) => Some(e),
            _ => None,
        }
    }

    /// Mutable access to one enumerated element.
    pub fn element_mut(&mut self, index: usize) -> Option<&mut Variable> {
        match &mut self.value {
            VarValue::Elements(e) => e.get_mut(index),
            _ => None,
        }
    }

    /// Replace the value with one reported by the target.
    pub fn refresh(&mut self, value: Value) {
        self.value = VarValue::Scalar(value);
    }

    /// Replace the value with a user edit, to be sent on the next message.
    pub fn stage(&mut self, value: Value) {
        self.value = VarValue::Scalar(value);
        self.modified = true;
    }
}
