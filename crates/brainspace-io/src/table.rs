//! Delimited text tables (electrode coordinates, electrode values).
//!
//! The first line is the header. Cells may be wrapped in double quotes, in
//! which case the delimiter may appear inside them and `""` is an escaped
//! quote. Blank lines are skipped; short rows are padded with empty cells.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};

/// Values treated as a missing number.
const MISSING_TOKENS: [&str; 4] = ["", "NA", "NaN", "nan"];

/// An in-memory table of string cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DataTable {
    columns: Vec<String>,
    index: HashMap<String, usize>,
    rows: Vec<Vec<String>>,
}

fn split_line(line: &str, delimiter: char) -> Result<Vec<String>> {
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    cell.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                cell.push(c);
            }
        } else if c == '"' && cell.trim().is_empty() {
            cell.clear();
            in_quotes = true;
        } else if c == delimiter {
            cells.push(std::mem::take(&mut cell));
        } else {
            cell.push(c);
        }
    }
    if in_quotes {
        bail!("Unterminated quoted cell");
    }
    cells.push(cell);
    Ok(cells)
}

impl DataTable {
    /// Build a table from a header and rows.
    pub fn new(columns: Vec<String>, mut rows: Vec<Vec<String>>) -> Result<Self> {
        let mut index = HashMap::with_capacity(columns.len());
        for (i, name) in columns.iter().enumerate() {
            if index.insert(name.clone(), i).is_some() {
                bail!("Duplicate column: {}", name);
            }
        }
        for (i, row) in rows.iter_mut().enumerate() {
            if row.len() > columns.len() {
                bail!(
                    "Row {} has {} cells but the header has {} columns",
                    i + 1,
                    row.len(),
                    columns.len()
                );
            }
            row.resize(columns.len(), String::new());
        }
        Ok(Self {
            columns,
            index,
            rows,
        })
    }

    /// Parse delimited text.
    pub fn parse(text: &str, delimiter: char) -> Result<Self> {
        let mut lines = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty());
        let Some((_, header)) = lines.next() else {
            bail!("Table has no header row");
        };
        let columns = split_line(header.trim_start_matches('\u{feff}'), delimiter)
            .context("Invalid header row")?
            .into_iter()
            .map(|name| name.trim().to_string())
            .collect();
        let rows = lines
            .map(|(n, line)| split_line(line, delimiter).with_context(|| format!("Invalid line {}", n + 1)))
            .collect::<Result<Vec<_>>>()?;
        Self::new(columns, rows)
    }

    /// Read a table from disk; `.tsv` files are tab-delimited, anything else
    /// comma-delimited.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read table: {}", path.display()))?;
        let delimiter = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("tsv") => '\t',
            _ => ',',
        };
        Self::parse(&text, delimiter).with_context(|| format!("Failed to parse table: {}", path.display()))
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Whether every named column is present.
    pub fn has_columns(&self, names: &[&str]) -> bool {
        names.iter().all(|name| self.has_column(name))
    }

    /// Raw cell text, `None` when the column does not exist.
    pub fn get_str(&self, row: usize, column: &str) -> Option<&str> {
        let col = *self.index.get(column)?;
        self.rows.get(row).map(|r| r[col].trim())
    }

    /// Numeric cell value; `NaN` when the column is absent or the cell is
    /// missing or not a number.
    pub fn get_f64(&self, row: usize, column: &str) -> f64 {
        self.get_str(row, column)
            .and_then(|cell| cell.parse::<f64>().ok())
            .unwrap_or(f64::NAN)
    }

    /// Boolean cell value; `None` when absent or unrecognised.
    pub fn get_bool(&self, row: usize, column: &str) -> Option<bool> {
        parse_bool(self.get_str(row, column)?)
    }

    /// Whether every cell of `column` is a number or a missing-number token.
    pub fn is_numeric_column(&self, column: &str) -> bool {
        let Some(&col) = self.index.get(column) else {
            return false;
        };
        self.rows.iter().all(|row| is_numeric_cell(&row[col]))
    }

    /// All cells of `column`, trimmed.
    pub fn column(&self, column: &str) -> Option<Vec<&str>> {
        let col = *self.index.get(column)?;
        Some(self.rows.iter().map(|row| row[col].trim()).collect())
    }
}

/// Whether a cell is a number or a missing-number token.
pub fn is_numeric_cell(cell: &str) -> bool {
    let cell = cell.trim();
    MISSING_TOKENS.contains(&cell) || cell.parse::<f64>().is_ok()
}

/// Parse `true/false/t/f/yes/no/1/0`, case-insensitively.
pub fn parse_bool(cell: &str) -> Option<bool> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "1" => Some(true),
        "false" | "f" | "no" | "0" => Some(false),
        _ => None,
    }
}
