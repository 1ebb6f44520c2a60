//! Reading spreadsheet exports into an in-memory table.
//!
//! Both reports arrive as spreadsheets with a header row and named columns.
//! Excel/ODS workbooks are read with `calamine` (first worksheet only), CSV
//! files with `csv`. Cells keep just enough type information for the record
//! mappers: numbers, text, and native spreadsheet dates.

use crate::{DateTime, Decimal, Result};
use anyhow::{Context, bail};
use calamine::{Data, Reader, open_workbook_auto};
use std::path::{Path, PathBuf};
use std::str::FromStr;

static EMPTY: Cell = Cell::Empty;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(DateTime),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }

    /// Textual value of the cell. Integral numbers lose their `.0`, so an
    /// order id stored as a number reads the same as one stored as text.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Text(text) => text.trim().to_owned(),
            Cell::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                format!("{}", *number as i64)
            }
            Cell::Number(number) => number.to_string(),
            Cell::DateTime(datetime) => datetime.to_string(),
        }
    }

    /// Text of an identifier cell. CSV exports written from a float column
    /// carry ids like `1754594250742.0`; those read as `1754594250742`.
    pub fn to_id_text(&self) -> String {
        let text = self.to_text();
        match text.split_once('.') {
            Some((whole, fraction))
                if !whole.is_empty()
                    && whole.bytes().all(|b| b.is_ascii_digit())
                    && !fraction.is_empty()
                    && fraction.bytes().all(|b| b == b'0') =>
            {
                whole.to_owned()
            }
            _ => text,
        }
    }

    /// Monetary value of the cell. Empty cells are `None`; currency symbols,
    /// thousands separators and accounting parentheses are accepted in text.
    pub fn to_decimal(&self) -> Result<Option<Decimal>> {
        match self {
            Cell::Empty => Ok(None),
            // f64 Display is the shortest round-trip form, so 14.54 stays 14.54
            Cell::Number(number) => Decimal::from_str(&number.to_string())
                .map(Some)
                .with_context(|| format!("number {number} does not fit a decimal")),
            Cell::Text(text) => parse_money(text),
            Cell::DateTime(datetime) => bail!("expected an amount, found date {datetime}"),
        }
    }
}

fn parse_money(text: &str) -> Result<Option<Decimal>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let (negative, body) = match trimmed.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };
    let cleaned: String = body
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();

    let value = Decimal::from_str(&cleaned)
        .with_context(|| format!("'{text}' is not a valid amount"))?;
    Ok(Some(if negative { -value } else { value }))
}

#[derive(Debug, Clone)]
pub struct Table {
    source: PathBuf,
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(source: impl Into<PathBuf>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        Table {
            source: source.into(),
            headers: headers.into_iter().map(|h| h.trim().to_owned()).collect(),
            rows,
        }
    }

    /// Read the first worksheet (or the CSV file) at `path`.
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let table = match extension.as_str() {
            "csv" => read_csv(path),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook(path),
            _ => bail!("Unsupported file type: {}", path.display()),
        }
        .with_context(|| format!("Failed to read {}", path.display()))?;

        tracing::debug!(
            file = %path.display(),
            rows = table.rows.len(),
            columns = table.headers.len(),
            "loaded table"
        );
        Ok(table)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of a required column.
    pub fn column(&self, name: &str) -> Result<usize> {
        match self.optional_column(name) {
            Some(index) => Ok(index),
            None => bail!(
                "Column '{}' not found in {} (available: {})",
                name,
                self.source.display(),
                self.headers.join(", ")
            ),
        }
    }

    pub fn optional_column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|header| header == name.trim())
    }

    pub fn rows(&self) -> impl Iterator<Item = TableRow<'_>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(index, cells)| TableRow { index, cells })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TableRow<'a> {
    index: usize,
    cells: &'a [Cell],
}

impl<'a> TableRow<'a> {
    /// Row number as a spreadsheet user would see it (header is row 1).
    pub fn line(&self) -> usize {
        self.index + 2
    }

    pub fn get(&self, column: usize) -> &'a Cell {
        self.cells.get(column).unwrap_or(&EMPTY)
    }

    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }
}

fn read_csv(path: &Path) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.iter().map(ToOwned::to_owned).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = record
            .iter()
            .map(|field| {
                if field.trim().is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(field.to_owned())
                }
            })
            .collect();
        rows.push(row);
    }

    Ok(Table::new(path, headers, rows))
}

fn read_workbook(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .context("Workbook has no worksheets")??;

    let mut sheet_rows = range.rows();
    let headers = match sheet_rows.next() {
        Some(header) => header.iter().map(|cell| convert_cell(cell).to_text()).collect(),
        None => Vec::new(),
    };
    let rows = sheet_rows
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();

    Ok(Table::new(path, headers, rows))
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::String(text) => Cell::Text(text.clone()),
        Data::Float(number) => Cell::Number(*number),
        Data::Int(number) => Cell::Number(*number as f64),
        Data::Bool(value) => Cell::Text(value.to_string()),
        Data::DateTime(datetime) => datetime
            .as_datetime()
            .map(Cell::DateTime)
            .unwrap_or(Cell::Empty),
        Data::DateTimeIso(text) | Data::DurationIso(text) => Cell::Text(text.clone()),
        Data::Error(error) => {
            tracing::debug!(?error, "spreadsheet cell holds an error value");
            Cell::Empty
        }
    }
}
