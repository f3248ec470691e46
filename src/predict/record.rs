use std::collections::HashMap;

/// One input value, keyed by its training-time column name in a [`Record`].
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Number(f64),
    Text(String),
}

impl Cell {
    /// Category label used by one-hot encoders. Whole numbers render without
    /// a fractional part so `1.0` matches the category `"1"`.
    pub fn category_label(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
        }
    }
}

/// A single structured row addressed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    cells: HashMap<String, Cell>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_number(mut self, column: impl Into<String>, value: f64) -> Self {
        self.set_number(column, value);
        self
    }

    pub fn with_text(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.cells.insert(column.into(), Cell::Text(value.into()));
        self
    }

    pub fn set_number(&mut self, column: impl Into<String>, value: f64) {
        self.cells.insert(column.into(), Cell::Number(value));
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}
