//! Result rows, including hydrated nested relations.

use brook_core::MySqlValue;

/// One cell of a result row.
///
/// Plain query results only contain `Value` cells; the relation hydrator
/// attaches `One` and `Many` cells under the registered relation names.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    /// Scalar column value
    Value(MySqlValue),
    /// A hasOne relation: the matching row, or `None` when nothing matched
    One(Option<Box<Row>>),
    /// A hasMany relation: all matching rows, possibly empty
    Many(Vec<Row>),
}

/// A result row: named cells in select order.
///
/// Lookup is linear; rows are small and the builder never holds more than a
/// page of them per relation level.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    cells: Vec<(String, Cell)>,
}

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Row::default()
    }

    /// Builds a row from scalar column pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<MySqlValue>,
    {
        Row {
            cells: pairs
                .into_iter()
                .map(|(name, value)| (name.into(), Cell::Value(value.into())))
                .collect(),
        }
    }

    /// The cell stored under `name`.
    pub fn get(&self, name: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(cell_name, _)| cell_name == name)
            .map(|(_, cell)| cell)
    }

    /// The scalar value stored under `name`, if that cell is scalar.
    pub fn value(&self, name: &str) -> Option<&MySqlValue> {
        match self.get(name) {
            Some(Cell::Value(value)) => Some(value),
            _ => None,
        }
    }

    /// Sets `name` to a scalar value, replacing any existing cell.
    pub fn set_value(&mut self, name: impl Into<String>, value: impl Into<MySqlValue>) {
        self.set(name, Cell::Value(value.into()));
    }

    /// Sets `name` to the given cell, replacing any existing cell.
    pub fn set(&mut self, name: impl Into<String>, cell: Cell) {
        let name = name.into();
        match self.cells.iter_mut().find(|(existing, _)| *existing == name) {
            Some((_, existing)) => *existing = cell,
            None => self.cells.push((name, cell)),
        }
    }

    /// Removes and returns the cell stored under `name`.
    pub fn remove(&mut self, name: &str) -> Option<Cell> {
        let index = self
            .cells
            .iter()
            .position(|(cell_name, _)| cell_name == name)?;
        Some(self.cells.remove(index).1)
    }

    /// Column names in select order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|(name, _)| name.as_str())
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True when the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// The scalar values of `keys`, in order. `None` when any key is
    /// missing, non-scalar, or NULL; such rows never participate in
    /// relation matching.
    pub fn key_tuple(&self, keys: &[String]) -> Option<Vec<MySqlValue>> {
        keys.iter()
            .map(|key| {
                self.value(key)
                    .filter(|value| !value.is_null())
                    .cloned()
            })
            .collect()
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Cell {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Value(value) => value.serialize(serializer),
            Cell::One(None) => serializer.serialize_none(),
            Cell::One(Some(row)) => row.serialize(serializer),
            Cell::Many(rows) => rows.serialize(serializer),
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Row {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.cells.len()))?;
        for (name, cell) in &self.cells {
            map.serialize_entry(name, cell)?;
        }
        map.end()
    }
}
