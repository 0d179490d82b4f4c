//! Typed in-memory table with CSV persistence

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::path::Path;

/// A single value in a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    /// Parse a raw CSV field. Empty fields and NaN become `Missing`.
    pub fn parse(field: &str) -> Self {
        if field.is_empty() {
            return Cell::Missing;
        }
        match field.parse::<f64>() {
            Ok(v) if v.is_nan() => Cell::Missing,
            Ok(v) => Cell::Number(v),
            Err(_) => Cell::Text(field.to_string()),
        }
    }

    /// Numeric view of the cell (numeric-looking text is accepted)
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| !v.is_nan()),
            Cell::Missing => None,
        }
    }

    /// Category key of the cell, `None` when missing
    pub fn category(&self) -> Option<String> {
        match self {
            Cell::Number(v) => Some(v.to_string()),
            Cell::Text(s) => Some(s.clone()),
            Cell::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(v) => write!(f, "{}", v),
            Cell::Text(s) => f.write_str(s),
            Cell::Missing => Ok(()),
        }
    }
}

/// Row-major table with named columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    /// Create an empty table with the given header
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from rows, checking every row against the header width
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Cell>>) -> io::Result<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row
    pub fn push_row(&mut self, row: Vec<Cell>) -> io::Result<()> {
        if row.len() != self.columns.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "row has {} fields, header has {}",
                    row.len(),
                    self.columns.len()
                ),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Iterate over the values of a named column
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell> + '_> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(move |row| &row[idx]))
    }

    /// Append a column, or replace it if a column with that name exists
    pub fn set_column(&mut self, name: &str, values: Vec<Cell>) -> io::Result<()> {
        if values.len() != self.rows.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "column '{}' has {} values, table has {} rows",
                    name,
                    values.len(),
                    self.rows.len()
                ),
            ));
        }
        match self.column_index(name) {
            Some(idx) => {
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row[idx] = value;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, value) in self.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            }
        }
        Ok(())
    }

    /// Copy of the table without the named columns (absent names are ignored)
    pub fn drop_columns(&self, names: &[String]) -> Table {
        let keep: Vec<usize> = (0..self.columns.len())
            .filter(|&i| !names.contains(&self.columns[i]))
            .collect();
        Table {
            columns: keep.iter().map(|&i| self.columns[i].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
                .collect(),
        }
    }

    /// Remove a column and return it alongside the remaining table
    pub fn split_column(&self, name: &str) -> Option<(Table, Vec<Cell>)> {
        let idx = self.column_index(name)?;
        let values = self.rows.iter().map(|row| row[idx].clone()).collect();
        Some((self.drop_columns(&[name.to_string()]), values))
    }

    /// Copy of the rows at `indices`, in that order
    pub fn select_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }

    /// Append all rows of another table with the same header
    pub fn concat(&self, other: &Table) -> io::Result<Table> {
        if self.columns != other.columns {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "cannot concatenate tables with different headers",
            ));
        }
        let mut rows = self.rows.clone();
        rows.extend(other.rows.iter().cloned());
        Ok(Table {
            columns: self.columns.clone(),
            rows,
        })
    }

    /// Replace every cell equal to one of `sentinels` with `Missing`
    pub fn normalize_missing(&mut self, sentinels: &[&str]) {
        for row in &mut self.rows {
            for cell in row.iter_mut() {
                if let Cell::Text(s) = cell {
                    if sentinels.contains(&s.as_str()) {
                        *cell = Cell::Missing;
                    }
                }
            }
        }
    }

    /// Count occurrences of each category in a column
    pub fn value_counts(&self, name: &str) -> Option<HashMap<String, usize>> {
        let mut counts = HashMap::new();
        for cell in self.column(name)? {
            if let Some(key) = cell.category() {
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        Some(counts)
    }

    /// Read a table from CSV with a header row
    pub fn read_csv<R: Read>(reader: R) -> io::Result<Table> {
        let mut reader = csv::Reader::from_reader(reader);
        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut table = Table::new(columns);
        for record in reader.records() {
            let record = record?;
            table.push_row(record.iter().map(Cell::parse).collect())?;
        }
        Ok(table)
    }

    /// Read a CSV file
    pub fn read_csv_file<P: AsRef<Path>>(path: P) -> io::Result<Table> {
        let file = std::fs::File::open(path)?;
        Self::read_csv(io::BufReader::new(file))
    }

    /// Write the table as CSV with a header row
    pub fn write_csv<W: Write>(&self, writer: W) -> io::Result<()> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.columns)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|cell| cell.to_string()))?;
        }
        writer.flush()?;
        Ok(())
    }
}
