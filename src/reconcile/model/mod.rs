use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::reconcile::normalize::normalize_header;

pub mod reference;

/// Scalar value stored in a cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    /// No value.
    #[default]
    Empty,
    /// Plain text.
    Text(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
    /// Date or time expressed as an Excel serial number.
    DateTime(f64),
}

impl CellValue {
    /// Returns `true` for empty cells and text made only of whitespace.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Returns the text content when the value is textual.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Interprets the value as a number, parsing text when needed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(value) | CellValue::DateTime(value) => Some(*value),
            CellValue::Text(text) => text.trim().replace(',', ".").parse().ok(),
            _ => None,
        }
    }

    /// Normalized form used for header comparisons.
    pub fn normalized(&self) -> String {
        normalize_header(&self.to_string())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) => f.write_str(text),
            CellValue::Number(value) | CellValue::DateTime(value) => write!(f, "{value}"),
            CellValue::Bool(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// Presentation tag carried alongside a cell value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellStyle {
    #[default]
    Default,
    /// Rendered with the workbook's hyperlink style.
    Hyperlink,
}

/// A single cell: its value plus an optional hyperlink target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    pub hyperlink: Option<String>,
    pub style: CellStyle,
}

impl Cell {
    fn is_populated(&self) -> bool {
        !self.value.is_empty() || self.hyperlink.is_some()
    }
}

/// A populated cell of a header row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    /// 1-based column index.
    pub column: u32,
    /// Raw header text.
    pub text: String,
}

impl Header {
    /// Normalized header text.
    pub fn normalized(&self) -> String {
        normalize_header(&self.text)
    }
}

/// In-memory worksheet addressed by 1-based `(row, column)` coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub name: String,
    cells: BTreeMap<(u32, u32), Cell>,
}

impl Sheet {
    /// Creates an empty sheet with the provided name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Returns the cell at the given position, if one was ever written.
    pub fn cell(&self, row: u32, column: u32) -> Option<&Cell> {
        self.cells.get(&(row, column))
    }

    /// Returns the value at the given position; missing cells read as empty.
    pub fn value(&self, row: u32, column: u32) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.cell(row, column).map(|cell| &cell.value).unwrap_or(&EMPTY)
    }

    /// Returns the hyperlink target at the given position.
    pub fn hyperlink(&self, row: u32, column: u32) -> Option<&str> {
        self.cell(row, column).and_then(|cell| cell.hyperlink.as_deref())
    }

    /// Writes a value, keeping any hyperlink already attached to the cell.
    pub fn set_value(&mut self, row: u32, column: u32, value: impl Into<CellValue>) {
        self.cells.entry((row, column)).or_default().value = value.into();
    }

    /// Attaches a hyperlink target and marks the cell with the hyperlink style.
    pub fn set_hyperlink(&mut self, row: u32, column: u32, target: impl Into<String>) {
        let cell = self.cells.entry((row, column)).or_default();
        cell.hyperlink = Some(target.into());
        cell.style = CellStyle::Hyperlink;
    }

    /// Index of the last row holding a value or hyperlink, `0` when empty.
    pub fn last_row(&self) -> u32 {
        self.cells
            .iter()
            .filter(|(_, cell)| cell.is_populated())
            .map(|((row, _), _)| *row)
            .max()
            .unwrap_or(0)
    }

    /// Index of the last column holding a value or hyperlink, `0` when empty.
    pub fn last_column(&self) -> u32 {
        self.cells
            .iter()
            .filter(|(_, cell)| cell.is_populated())
            .map(|((_, column), _)| *column)
            .max()
            .unwrap_or(0)
    }

    /// Iterates over the cells of one row in column order.
    pub fn row(&self, row: u32) -> impl Iterator<Item = (u32, &Cell)> + '_ {
        self.cells
            .range((row, 0)..=(row, u32::MAX))
            .map(|((_, column), cell)| (*column, cell))
    }

    /// Iterates over every stored cell in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = ((u32, u32), &Cell)> + '_ {
        self.cells.iter().map(|(position, cell)| (*position, cell))
    }

    /// Mutable access to every stored cell in row-major order.
    pub fn cells_mut(&mut self) -> impl Iterator<Item = ((u32, u32), &mut Cell)> + '_ {
        self.cells
            .iter_mut()
            .map(|(position, cell)| (*position, cell))
    }

    /// Non-empty cells of the given row, in column order.
    pub fn headers(&self, row: u32) -> Vec<Header> {
        self.row(row)
            .filter(|(_, cell)| !cell.value.is_empty())
            .map(|(column, cell)| Header {
                column,
                text: cell.value.to_string(),
            })
            .collect()
    }

    /// Finds the first column of `row` whose normalized text equals the
    /// normalized `label`.
    pub fn find_column(&self, row: u32, label: &str) -> Option<u32> {
        let wanted = normalize_header(label);
        self.headers(row)
            .into_iter()
            .find(|header| header.normalized() == wanted)
            .map(|header| header.column)
    }
}
