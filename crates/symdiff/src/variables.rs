use std::fmt::Display;

use crate::tree::{TreeError, TreeResult};

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub index: usize,
    /// NaN until the variable is bound
    pub value: f64,
}

impl Variable {
    pub fn is_bound(&self) -> bool {
        !self.value.is_nan()
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_bound() {
            write!(f, "{} = {}", self.name, self.value)
        } else {
            write!(f, "{} (unbound)", self.name)
        }
    }
}

/// Interns identifiers in first-seen order.
///
/// Indices are stable for the lifetime of the table; entries are never removed.
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    entries: Vec<Variable>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variable> {
        self.entries.iter()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Variable> {
        self.entries.iter().find(|var| var.name == name)
    }

    pub fn find_by_index(&mut self, index: usize) -> Option<&mut Variable> {
        self.entries.get_mut(index)
    }

    pub fn get(&self, index: usize) -> Option<&Variable> {
        self.entries.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.find_by_name(name).map(|var| var.index)
    }

    /// Returns the index of `name`, registering it as an unbound variable if it is new.
    pub fn find_or_add(&mut self, name: &str) -> TreeResult<usize> {
        if let Some(index) = self.index_of(name) {
            return Ok(index);
        }

        self.reserve_slot()?;
        let index = self.entries.len();
        self.entries.push(Variable {
            name: name.to_owned(),
            index,
            value: f64::NAN,
        });
        Ok(index)
    }

    /// Binds `name` to `value`, registering it first if needed.
    pub fn set_value(&mut self, name: &str, value: f64) -> TreeResult<usize> {
        let index = self.find_or_add(name)?;
        self.entries[index].value = value;
        Ok(index)
    }

    pub fn value(&self, index: usize) -> Option<f64> {
        self.get(index).map(|var| var.value)
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.get(index).map(|var| var.name.as_str())
    }

    /// Makes room for one more entry, doubling the capacity when full.
    fn reserve_slot(&mut self) -> TreeResult<()> {
        let len = self.entries.len();
        let capacity = self.entries.capacity();
        if len < capacity {
            return Ok(());
        }

        let target = capacity.max(1) * 2;
        self.entries
            .try_reserve_exact(target - len)
            .map_err(|source| TreeError::Allocation {
                what: "variables",
                requested: target - len,
                source,
            })
    }
}
