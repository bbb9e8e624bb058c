//! Per-vertex value storage.
//!
//! One fixed-length huge array per schema slot, each `node_count` long.
//! Scalar slots are atomic words and can be written through `&self` from any
//! partition. Array slots are plain owned slices; shared writes to them are
//! only issued by the engine for the vertex a compute step currently owns.

use core::mem;

use crate::collections::{HugeAtomicDoubleArray, HugeAtomicLongArray, HugeObjectArray};
use crate::schema::{DefaultValue, Element, PregelSchema, ValueType, Visibility};

enum Slot {
    Long(HugeAtomicLongArray),
    Double(HugeAtomicDoubleArray),
    LongArray(HugeObjectArray<Box<[i64]>>),
    DoubleArray(HugeObjectArray<Box<[f64]>>),
}

impl Slot {
    fn allocate(element: &Element, node_count: usize) -> Self {
        match element.value_type {
            ValueType::Long => {
                let initial = match element.default_value {
                    Some(DefaultValue::Long(v)) => v,
                    Some(DefaultValue::Double(v)) => v as i64,
                    None => 0,
                };
                Slot::Long(HugeAtomicLongArray::new(node_count, initial))
            }
            ValueType::Double => {
                let initial = match element.default_value {
                    Some(DefaultValue::Double(v)) => v,
                    Some(DefaultValue::Long(v)) => v as f64,
                    None => 0.0,
                };
                Slot::Double(HugeAtomicDoubleArray::new(node_count, initial))
            }
            ValueType::LongArray => Slot::LongArray(HugeObjectArray::new(node_count)),
            ValueType::DoubleArray => Slot::DoubleArray(HugeObjectArray::new(node_count)),
        }
    }

    fn value_type(&self) -> ValueType {
        match self {
            Slot::Long(_) => ValueType::Long,
            Slot::Double(_) => ValueType::Double,
            Slot::LongArray(_) => ValueType::LongArray,
            Slot::DoubleArray(_) => ValueType::DoubleArray,
        }
    }
}

/// The per-vertex values of one run.
///
/// # Panics
/// Every accessor panics when `key` is not in the schema, when the slot has a
/// different type than the accessor, or when `node >= node_count()`. These are
/// contract violations of the calling vertex program.
pub struct NodeValues {
    schema: PregelSchema,
    node_count: usize,
    slots: Vec<Slot>,
}

impl NodeValues {
    /// Allocates storage for `schema` with `node_count` vertices.
    pub fn new(schema: &PregelSchema, node_count: usize) -> Self {
        let slots = schema
            .elements()
            .iter()
            .map(|e| Slot::allocate(e, node_count))
            .collect();
        Self {
            schema: schema.clone(),
            node_count,
            slots,
        }
    }

    /// The schema these values were allocated for.
    pub fn schema(&self) -> &PregelSchema {
        &self.schema
    }

    /// Number of vertices.
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// Names of the public slots, in schema order.
    pub fn public_keys(&self) -> impl Iterator<Item = &str> {
        self.schema
            .elements()
            .iter()
            .filter(|e| e.visibility == Visibility::Public)
            .map(|e| e.key.as_str())
    }

    /// Type of the slot named `key`, if present.
    pub fn value_type(&self, key: &str) -> Option<ValueType> {
        self.index_of(key).map(|i| self.slots[i].value_type())
    }

    fn index_of(&self, key: &str) -> Option<usize> {
        self.schema.elements().iter().position(|e| e.key == key)
    }

    #[inline]
    fn slot(&self, key: &str) -> &Slot {
        match self.index_of(key) {
            Some(i) => &self.slots[i],
            None => panic!("unknown node value key `{key}`"),
        }
    }

    #[inline]
    fn slot_mut(&mut self, key: &str) -> &mut Slot {
        match self.index_of(key) {
            Some(i) => &mut self.slots[i],
            None => panic!("unknown node value key `{key}`"),
        }
    }

    /// Reads a `Long` slot.
    pub fn long_value(&self, key: &str, node: usize) -> i64 {
        match self.slot(key) {
            Slot::Long(a) => a.get(node),
            other => type_mismatch(key, other.value_type(), ValueType::Long),
        }
    }

    /// Reads a `Double` slot.
    pub fn double_value(&self, key: &str, node: usize) -> f64 {
        match self.slot(key) {
            Slot::Double(a) => a.get(node),
            other => type_mismatch(key, other.value_type(), ValueType::Double),
        }
    }

    /// Reads a `LongArray` slot; `None` if the vertex never stored one.
    pub fn long_array_value(&self, key: &str, node: usize) -> Option<&[i64]> {
        match self.slot(key) {
            Slot::LongArray(a) => a.get(node).map(|v| &v[..]),
            other => type_mismatch(key, other.value_type(), ValueType::LongArray),
        }
    }

    /// Reads a `DoubleArray` slot; `None` if the vertex never stored one.
    pub fn double_array_value(&self, key: &str, node: usize) -> Option<&[f64]> {
        match self.slot(key) {
            Slot::DoubleArray(a) => a.get(node).map(|v| &v[..]),
            other => type_mismatch(key, other.value_type(), ValueType::DoubleArray),
        }
    }

    /// Writes a `Long` slot.
    pub fn set_long(&self, key: &str, node: usize, value: i64) {
        match self.slot(key) {
            Slot::Long(a) => a.set(node, value),
            other => type_mismatch(key, other.value_type(), ValueType::Long),
        }
    }

    /// Writes a `Double` slot.
    pub fn set_double(&self, key: &str, node: usize, value: f64) {
        match self.slot(key) {
            Slot::Double(a) => a.set(node, value),
            other => type_mismatch(key, other.value_type(), ValueType::Double),
        }
    }

    /// Writes a `LongArray` slot.
    pub fn set_long_array(&mut self, key: &str, node: usize, value: Vec<i64>) {
        match self.slot_mut(key) {
            Slot::LongArray(a) => a.set(node, value.into_boxed_slice()),
            other => type_mismatch(key, other.value_type(), ValueType::LongArray),
        }
    }

    /// Writes a `DoubleArray` slot.
    pub fn set_double_array(&mut self, key: &str, node: usize, value: Vec<f64>) {
        match self.slot_mut(key) {
            Slot::DoubleArray(a) => a.set(node, value.into_boxed_slice()),
            other => type_mismatch(key, other.value_type(), ValueType::DoubleArray),
        }
    }

    /// Writes a `LongArray` slot through a shared reference.
    ///
    /// # Safety
    /// No other thread may access `node`'s array slots during the call, and no
    /// slice previously read for `node` from this slot may still be alive.
    pub(crate) unsafe fn set_long_array_shared(&self, key: &str, node: usize, value: Vec<i64>) {
        match self.slot(key) {
            // SAFETY: forwarded from the caller.
            Slot::LongArray(a) => unsafe { a.set_shared(node, value.into_boxed_slice()) },
            other => type_mismatch(key, other.value_type(), ValueType::LongArray),
        }
    }

    /// Writes a `DoubleArray` slot through a shared reference.
    ///
    /// # Safety
    /// Same contract as [`NodeValues::set_long_array_shared`].
    pub(crate) unsafe fn set_double_array_shared(&self, key: &str, node: usize, value: Vec<f64>) {
        match self.slot(key) {
            // SAFETY: forwarded from the caller.
            Slot::DoubleArray(a) => unsafe { a.set_shared(node, value.into_boxed_slice()) },
            other => type_mismatch(key, other.value_type(), ValueType::DoubleArray),
        }
    }

    /// Estimated heap footprint for `schema` over `node_count` vertices.
    ///
    /// Array slots count only their slot table; the arrays themselves are
    /// sized by the vertex program.
    pub fn memory_estimation(schema: &PregelSchema, node_count: usize) -> usize {
        schema
            .elements()
            .iter()
            .map(|e| match e.value_type {
                ValueType::Long => HugeAtomicLongArray::memory_estimation(node_count),
                ValueType::Double => HugeAtomicDoubleArray::memory_estimation(node_count),
                ValueType::LongArray => HugeObjectArray::<Box<[i64]>>::memory_estimation(node_count),
                ValueType::DoubleArray => HugeObjectArray::<Box<[f64]>>::memory_estimation(node_count),
            })
            .sum::<usize>()
            + mem::size_of::<Self>()
    }
}

#[cold]
#[track_caller]
fn type_mismatch(key: &str, actual: ValueType, requested: ValueType) -> ! {
    panic!("node value `{key}` has type {actual:?}, not {requested:?}")
}
