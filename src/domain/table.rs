use chrono::NaiveDateTime;

/// One value in a [`Table`]. `Raw` holds source JSON that has not been typed yet.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
    Timestamp(NaiveDateTime),
    Raw(serde_json::Value),
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null | Cell::Raw(serde_json::Value::Null))
    }

    /// Text used for join keys and delimited output. Null renders empty.
    pub fn render(&self) -> String {
        match self {
            Cell::Null => String::new(),
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => render_float(*v),
            Cell::Text(s) => s.clone(),
            Cell::Bool(b) => render_bool(*b).to_string(),
            Cell::Timestamp(ts) => ts.format("%Y-%m-%d %H:%M:%S%.f").to_string(),
            Cell::Raw(value) => match value {
                serde_json::Value::Null => String::new(),
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Bool(b) => render_bool(*b).to_string(),
                other => other.to_string(),
            },
        }
    }
}

impl From<serde_json::Value> for Cell {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Cell::Null,
            other => Cell::Raw(other),
        }
    }
}

pub(crate) fn render_bool(b: bool) -> &'static str {
    if b {
        "True"
    } else {
        "False"
    }
}

// 整數值的浮點數保留 ".0"，和數值欄位的其他列一致
pub(crate) fn render_float(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 {
        format!("{:.1}", v)
    } else {
        v.to_string()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub values: Vec<Cell>,
}

/// Column-oriented table; every column has `row_count` values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    columns: Vec<Column>,
    row_count: usize,
}

impl Table {
    pub fn new(row_count: usize) -> Self {
        Self {
            columns: Vec::new(),
            row_count,
        }
    }

    /// Zero-row table with the given columns.
    pub fn empty_with_columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names
                .into_iter()
                .map(|name| Column {
                    name: name.into(),
                    values: Vec::new(),
                })
                .collect(),
            row_count: 0,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut [Column] {
        &mut self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn cell(&self, column: &str, row: usize) -> Option<&Cell> {
        self.column(column).and_then(|c| c.values.get(row))
    }

    /// Appends a column, or replaces the values of an existing one with the same name.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Cell>) {
        let name = name.into();
        debug_assert_eq!(values.len(), self.row_count, "column {} misaligned", name);
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(Column { name, values }),
        }
    }

    pub fn drop_columns(&mut self, names: &[&str]) {
        self.columns.retain(|c| !names.contains(&c.name.as_str()));
    }

    pub fn rename_columns<F>(&mut self, mut rename: F)
    where
        F: FnMut(&str) -> String,
    {
        for column in &mut self.columns {
            column.name = rename(&column.name);
        }
    }

    /// Iterates rows as slices of cells in column order.
    pub fn rows(&self) -> impl Iterator<Item = Vec<&Cell>> + '_ {
        (0..self.row_count).map(move |row| self.columns.iter().map(|c| &c.values[row]).collect())
    }
}
