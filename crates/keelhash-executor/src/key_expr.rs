use std::fmt;

use keelhash_common::types::{DataType, Value};
use keelhash_storage::Record;

/// A compiled expression producing one component of a join or grouping key.
pub trait KeyExpr: fmt::Debug + Send + Sync {
    fn evaluate(&self, row: &Record) -> Value;

    fn data_type(&self) -> DataType;
}

/// Reads a single column of the input row. Out-of-range columns read as null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef {
    index: usize,
    data_type: DataType,
}

impl ColumnRef {
    pub fn new(index: usize, data_type: DataType) -> Self {
        Self { index, data_type }
    }

    pub fn index(&self) -> usize {
        self.index
    }
}

impl KeyExpr for ColumnRef {
    fn evaluate(&self, row: &Record) -> Value {
        row.get(self.index).cloned().unwrap_or(Value::Null)
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    value: Value,
}

impl Literal {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl KeyExpr for Literal {
    fn evaluate(&self, _row: &Record) -> Value {
        self.value.clone()
    }

    fn data_type(&self) -> DataType {
        self.value.data_type()
    }
}
