//! Per-vertex value schema.
//!
//! A schema is an ordered list of named slots. Each slot has a value type, a
//! visibility and, for scalar slots, an optional default. The schema is fixed
//! once a run is created.

use serde::{Deserialize, Serialize};

/// Type of a per-vertex slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    /// A 64-bit signed integer.
    Long,
    /// A 64-bit float.
    Double,
    /// A variable-length array of 64-bit signed integers.
    LongArray,
    /// A variable-length array of 64-bit floats.
    DoubleArray,
}

/// Whether a slot is part of the returned result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    /// Returned to the caller.
    Public,
    /// Scratch state used only during the run.
    Private,
}

/// Initial value of a scalar slot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
    /// Default for `Long` slots.
    Long(i64),
    /// Default for `Double` slots.
    Double(f64),
}

/// One named slot of a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    /// Slot name.
    pub key: String,
    /// Slot value type.
    pub value_type: ValueType,
    /// Slot visibility.
    pub visibility: Visibility,
    /// Initial value for scalar slots; `None` means zero.
    pub default_value: Option<DefaultValue>,
}

/// An ordered list of per-vertex slots.
///
/// ```rust
/// use pregel::schema::{PregelSchema, ValueType, Visibility};
///
/// let schema = PregelSchema::builder()
///     .add("rank", ValueType::Double, Visibility::Public)
///     .add("scratch", ValueType::LongArray, Visibility::Private)
///     .build();
/// assert_eq!(schema.elements().len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PregelSchema {
    elements: Vec<Element>,
}

impl PregelSchema {
    /// Starts building a schema.
    pub fn builder() -> PregelSchemaBuilder {
        PregelSchemaBuilder::default()
    }

    /// Slots in declaration order.
    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    /// Looks up a slot by name.
    pub fn element(&self, key: &str) -> Option<&Element> {
        self.elements.iter().find(|e| e.key == key)
    }
}

/// Builder for [`PregelSchema`].
#[derive(Debug, Default)]
pub struct PregelSchemaBuilder {
    elements: Vec<Element>,
}

impl PregelSchemaBuilder {
    /// Adds a slot.
    ///
    /// # Panics
    /// Panics if `key` was already added.
    #[must_use]
    pub fn add(self, key: impl Into<String>, value_type: ValueType, visibility: Visibility) -> Self {
        self.push(key.into(), value_type, visibility, None)
    }

    /// Adds a `Long` slot initialized to `value`.
    #[must_use]
    pub fn add_long_with_default(self, key: impl Into<String>, value: i64, visibility: Visibility) -> Self {
        self.push(key.into(), ValueType::Long, visibility, Some(DefaultValue::Long(value)))
    }

    /// Adds a `Double` slot initialized to `value`.
    #[must_use]
    pub fn add_double_with_default(self, key: impl Into<String>, value: f64, visibility: Visibility) -> Self {
        self.push(key.into(), ValueType::Double, visibility, Some(DefaultValue::Double(value)))
    }

    fn push(
        mut self,
        key: String,
        value_type: ValueType,
        visibility: Visibility,
        default_value: Option<DefaultValue>,
    ) -> Self {
        assert!(
            self.elements.iter().all(|e| e.key != key),
            "duplicate schema key `{key}`"
        );
        self.elements.push(Element {
            key,
            value_type,
            visibility,
            default_value,
        });
        self
    }

    /// Finishes the schema.
    pub fn build(self) -> PregelSchema {
        PregelSchema {
            elements: self.elements,
        }
    }
}
