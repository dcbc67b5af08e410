//! Decoding of downloaded spreadsheets and CSV files into Arrow tables.
//!
//! Both formats are first read into a [`RawTable`] of loosely typed cells.
//! The first column becomes the index; the remaining columns get a type
//! inferred from their cells (all integers, all numbers, or text).

use crate::error::{Error, Result};
use crate::table::DATE_COLUMN;
use arrow::array::{Array, ArrayRef, AsArray, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Date32Type, Field, Schema};
use arrow::record_batch::RecordBatch;
use arrow_csv::reader::Format;
use calamine::{Data, Reader, Xlsx};
use chrono::{NaiveDate, NaiveDateTime};
use diagnostics::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io::Cursor;
use std::sync::Arc;

/// Payload encoding of a remote table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Xlsx,
    Csv,
}

/// How the first column of a source is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Unique dates, written under `date`. Repeated dates keep the first row.
    Date,
    /// Labels kept verbatim, repeats included.
    Label,
}

/// One loosely typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum RawCell {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
}

impl RawCell {
    /// Interpret a textual cell: blank, integer, float, or text.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            RawCell::Empty
        } else if let Ok(i) = trimmed.parse::<i64>() {
            RawCell::Int(i)
        } else if let Ok(f) = trimmed.parse::<f64>() {
            RawCell::Float(f)
        } else {
            RawCell::Text(text.to_string())
        }
    }

    fn from_xlsx(cell: &Data) -> Self {
        match cell {
            Data::Empty => RawCell::Empty,
            Data::Int(i) => RawCell::Int(*i),
            // Spreadsheets store every number as a float
            Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => RawCell::Int(*f as i64),
            Data::Float(f) => RawCell::Float(*f),
            Data::String(s) => RawCell::Text(s.clone()),
            Data::Bool(b) => RawCell::Text(b.to_string()),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(dt) => RawCell::Date(dt.date()),
                None => RawCell::Float(dt.as_f64()),
            },
            Data::DateTimeIso(s) | Data::DurationIso(s) => RawCell::Text(s.clone()),
            Data::Error(e) => {
                warn!("Unreadable spreadsheet cell treated as empty: {reason}", reason: e.to_string());
                RawCell::Empty
            }
        }
    }

    /// Convert an index cell into a date. `date_format` is a chrono format
    /// string for sources with non-ISO dates.
    pub fn to_date(&self, date_format: Option<&str>) -> Result<NaiveDate> {
        let text = match self {
            RawCell::Date(d) => return Ok(*d),
            RawCell::Text(s) => s.trim(),
            other => return Err(Error::parse("date index", format!("not a date: '{other}'"))),
        };

        if let Some(format) = date_format {
            return NaiveDate::parse_from_str(text, format)
                .map_err(|e| Error::parse("date index", format!("'{text}' ({format}): {e}")));
        }

        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
            .map_err(|e| Error::parse("date index", format!("'{text}': {e}")))
    }
}

impl fmt::Display for RawCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawCell::Empty => Ok(()),
            RawCell::Int(i) => write!(f, "{i}"),
            RawCell::Float(x) => write!(f, "{x}"),
            RawCell::Text(s) => write!(f, "{s}"),
            RawCell::Date(d) => write!(f, "{d}"),
        }
    }
}

/// Header row plus loosely typed data rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

impl RawTable {
    /// Read the first worksheet of an xlsx workbook.
    pub fn from_xlsx(bytes: &[u8], what: &str) -> Result<Self> {
        let mut workbook: Xlsx<_> =
            Xlsx::new(Cursor::new(bytes)).map_err(|e| Error::parse(what, e))?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::parse(what, "workbook has no worksheets"))?
            .map_err(|e| Error::parse(what, e))?;

        let mut rows = range.rows();
        let headers = rows
            .next()
            .ok_or_else(|| Error::parse(what, "worksheet is empty"))?
            .iter()
            .map(|cell| RawCell::from_xlsx(cell).to_string())
            .collect();
        let rows = rows
            .map(|row| row.iter().map(RawCell::from_xlsx).collect())
            .collect();

        Ok(Self { headers, rows })
    }

    /// Read a CSV file with a header row.
    ///
    /// The schema is inferred only for its column names; every value is
    /// read as text and typed afterwards.
    pub fn from_csv(bytes: &[u8], what: &str) -> Result<Self> {
        let mut cursor = Cursor::new(bytes);
        let format = Format::default().with_header(true);
        let (inferred, _) = format
            .infer_schema(&mut cursor, Some(100))
            .map_err(|e| Error::parse(what, e))?;
        let schema = Schema::new(
            inferred
                .fields()
                .iter()
                .map(|f| Field::new(f.name(), DataType::Utf8, true))
                .collect::<Vec<_>>(),
        );
        let headers: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();

        cursor.set_position(0);
        let reader = arrow_csv::ReaderBuilder::new(Arc::new(schema))
            .with_format(format)
            .build(cursor)
            .map_err(|e| Error::parse(what, e))?;

        let mut rows = Vec::new();
        for batch in reader {
            let batch = batch.map_err(|e| Error::parse(what, e))?;
            let columns: Vec<_> = batch.columns().iter().map(|c| c.as_string::<i32>()).collect();
            for i in 0..batch.num_rows() {
                rows.push(
                    columns
                        .iter()
                        .map(|c| {
                            if c.is_null(i) {
                                RawCell::Empty
                            } else {
                                RawCell::from_text(c.value(i))
                            }
                        })
                        .collect(),
                );
            }
        }

        Ok(Self { headers, rows })
    }

    pub fn decode(bytes: &[u8], format: SourceFormat, what: &str) -> Result<Self> {
        match format {
            SourceFormat::Xlsx => Self::from_xlsx(bytes, what),
            SourceFormat::Csv => Self::from_csv(bytes, what),
        }
    }

    /// Build a table with the first column as its index. Fully blank rows
    /// are skipped.
    pub fn into_batch(self, name: &str, index: IndexKind, date_format: Option<&str>) -> Result<RecordBatch> {
        if self.headers.is_empty() {
            return Err(Error::parse(name, "no columns"));
        }
        let width = self.headers.len();
        let rows = self.rows.into_iter().filter_map(|mut row| {
            if row.iter().all(|c| *c == RawCell::Empty) {
                return None;
            }
            row.resize(width, RawCell::Empty);
            Some(row)
        });

        let mut fields = Vec::with_capacity(width);
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(width);
        let kept: Vec<Vec<RawCell>> = match index {
            IndexKind::Label => rows.collect(),
            IndexKind::Date => {
                let mut seen = BTreeSet::new();
                let mut dates = Vec::new();
                let mut kept = Vec::new();
                for row in rows {
                    let date = row[0].to_date(date_format).map_err(|e| Error::parse(name, e))?;
                    if !seen.insert(date) {
                        warn!(
                            "Duplicate date {date} in {table}, keeping first row",
                            date: date.to_string(),
                            table: name,
                        );
                        continue;
                    }
                    dates.push(Date32Type::from_naive_date(date));
                    kept.push(row);
                }
                fields.push(Field::new(DATE_COLUMN, DataType::Date32, false));
                arrays.push(Arc::new(Date32Array::from(dates)));
                kept
            }
        };

        let first = match index {
            IndexKind::Date => 1,
            IndexKind::Label => 0,
        };
        for (j, header) in self.headers.iter().enumerate().skip(first) {
            let cells: Vec<&RawCell> = kept.iter().map(|row| &row[j]).collect();
            let column = infer_column(&cells);
            fields.push(Field::new(header, column.data_type().clone(), true));
            arrays.push(column);
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
    }
}

/// Pick the narrowest column type that holds every cell.
fn infer_column(cells: &[&RawCell]) -> ArrayRef {
    let all_int = cells
        .iter()
        .all(|c| matches!(c, RawCell::Empty | RawCell::Int(_)));
    let all_numeric = cells
        .iter()
        .all(|c| matches!(c, RawCell::Empty | RawCell::Int(_) | RawCell::Float(_)));

    if all_int {
        Arc::new(Int64Array::from(
            cells
                .iter()
                .map(|c| match c {
                    RawCell::Int(i) => Some(*i),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        ))
    } else if all_numeric {
        Arc::new(Float64Array::from(
            cells
                .iter()
                .map(|c| match c {
                    RawCell::Int(i) => Some(*i as f64),
                    RawCell::Float(f) => Some(*f),
                    _ => None,
                })
                .collect::<Vec<_>>(),
        ))
    } else {
        Arc::new(StringArray::from(
            cells
                .iter()
                .map(|c| match c {
                    RawCell::Empty => None,
                    other => Some(other.to_string()),
                })
                .collect::<Vec<_>>(),
        ))
    }
}
