//! Column operations on decoded source tables.
//!
//! A source table is a single [`RecordBatch`] whose first column is its
//! index: `date` (Date32) for time series, the source's own first column for
//! pass-through tables.

use crate::error::{Error, Result};
use arrow::array::{Array, ArrayRef};
use arrow::compute::{CastOptions, cast_with_options, sort_to_indices, take};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Index column of every time series.
pub const DATE_COLUMN: &str = "date";

/// Keep the index plus exactly the named columns, in source order.
pub fn select_columns(batch: &RecordBatch, keep: &[String], table: &str) -> Result<RecordBatch> {
    let schema = batch.schema();
    for name in keep {
        if schema.index_of(name).is_err() {
            return Err(Error::MissingColumn {
                column: name.clone(),
                table: table.to_string(),
            });
        }
    }

    let mut indices = vec![0];
    indices.extend(
        schema
            .fields()
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, field)| keep.contains(field.name()))
            .map(|(i, _)| i),
    );
    Ok(batch.project(&indices)?)
}

/// Rename columns; names not present are ignored.
pub fn rename_columns(batch: &RecordBatch, renames: &BTreeMap<String, String>) -> Result<RecordBatch> {
    let names = batch
        .schema()
        .fields()
        .iter()
        .map(|f| renames.get(f.name()).unwrap_or(f.name()).clone())
        .collect();
    with_names(batch, names)
}

/// Give the index column a new name.
pub fn relabel_index(batch: &RecordBatch, label: &str) -> Result<RecordBatch> {
    let mut names: Vec<String> = batch
        .schema()
        .fields()
        .iter()
        .map(|f| f.name().clone())
        .collect();
    match names.first_mut() {
        Some(first) => *first = label.to_string(),
        None => return Err(Error::Config("table has no index column".to_string())),
    }
    with_names(batch, names)
}

fn with_names(batch: &RecordBatch, names: Vec<String>) -> Result<RecordBatch> {
    let mut seen = BTreeSet::new();
    for name in &names {
        if !seen.insert(name.as_str()) {
            return Err(Error::DuplicateColumn(name.clone()));
        }
    }
    let schema = batch.schema();
    let fields: Vec<Field> = schema
        .fields()
        .iter()
        .zip(names)
        .map(|(field, name)| field.as_ref().clone().with_name(name))
        .collect();
    Ok(RecordBatch::try_new(
        Arc::new(Schema::new(fields)),
        batch.columns().to_vec(),
    )?)
}

/// Cast `column` to Int64, failing if any value is undefined or not a
/// whole number representation. Floats truncate.
pub fn require_int(batch: &RecordBatch, column: &str, table: &str) -> Result<RecordBatch> {
    let schema = batch.schema();
    let index = schema.index_of(column).map_err(|_| Error::MissingColumn {
        column: column.to_string(),
        table: table.to_string(),
    })?;

    let array = batch.column(index);
    if array.null_count() > 0 {
        return Err(Error::parse(
            table,
            format!("column '{column}' has {} undefined values", array.null_count()),
        ));
    }
    let options = CastOptions {
        safe: false,
        ..CastOptions::default()
    };
    let cast: ArrayRef = cast_with_options(array, &DataType::Int64, &options)
        .map_err(|e| Error::parse(table, format!("column '{column}': {e}")))?;

    let mut fields: Vec<Field> = schema.fields().iter().map(|f| f.as_ref().clone()).collect();
    fields[index] = Field::new(column, DataType::Int64, false);
    let mut columns = batch.columns().to_vec();
    columns[index] = cast;
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
}

/// Reorder rows by ascending index.
pub fn sort_by_index(batch: &RecordBatch) -> Result<RecordBatch> {
    if batch.num_columns() == 0 {
        return Ok(batch.clone());
    }
    let indices = sort_to_indices(batch.column(0), None, None)?;
    let columns = batch
        .columns()
        .iter()
        .map(|column| take(column.as_ref(), &indices, None))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(RecordBatch::try_new(batch.schema(), columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{AsArray, Date32Array, Float64Array, Int64Array, StringArray};
    use arrow::datatypes::{Date32Type, Int64Type};
    use chrono::NaiveDate;

    fn day(d: u32) -> i32 {
        Date32Type::from_naive_date(NaiveDate::from_ymd_opt(2020, 3, d).expect("valid date"))
    }

    fn batch() -> RecordBatch {
        RecordBatch::try_from_iter(vec![
            (DATE_COLUMN, Arc::new(Date32Array::from(vec![day(3), day(1), day(2)])) as ArrayRef),
            ("value", Arc::new(Float64Array::from(vec![Some(3.9), Some(1.0), Some(2.0)])) as ArrayRef),
            ("note", Arc::new(StringArray::from(vec!["c", "a", "b"])) as ArrayRef),
            ("gaps", Arc::new(Int64Array::from(vec![Some(1), None, Some(3)])) as ArrayRef),
        ])
        .expect("batch")
    }

    fn names(batch: &RecordBatch) -> Vec<String> {
        batch.schema().fields().iter().map(|f| f.name().clone()).collect()
    }

    #[test]
    fn test_select_keeps_index_and_source_order() {
        let selected = select_columns(&batch(), &["gaps".to_string(), "value".to_string()], "t")
            .expect("select");
        assert_eq!(names(&selected), vec!["date", "value", "gaps"]);
    }

    #[test]
    fn test_select_missing_column() {
        let err = select_columns(&batch(), &["absent".to_string()], "t").expect_err("missing");
        assert!(matches!(err, Error::MissingColumn { ref column, .. } if column == "absent"));
    }

    #[test]
    fn test_rename_and_relabel() {
        let renamed = rename_columns(
            &batch(),
            &BTreeMap::from([("value".to_string(), "intakeCount".to_string())]),
        )
        .expect("rename");
        assert_eq!(names(&renamed), vec!["date", "intakeCount", "note", "gaps"]);

        let relabeled = relabel_index(&renamed, "day").expect("relabel");
        assert_eq!(names(&relabeled)[0], "day");

        let clash = rename_columns(
            &batch(),
            &BTreeMap::from([("note".to_string(), "value".to_string())]),
        );
        assert!(matches!(clash, Err(Error::DuplicateColumn(_))));
    }

    #[test]
    fn test_require_int_truncates_floats() {
        let cast = require_int(&batch(), "value", "t").expect("cast");
        let values = cast
            .column_by_name("value")
            .expect("column")
            .as_primitive::<Int64Type>();
        assert_eq!(values.values().to_vec(), vec![3, 1, 2]);
    }

    #[test]
    fn test_require_int_rejects_undefined_and_text() {
        assert!(matches!(require_int(&batch(), "gaps", "t"), Err(Error::Parse { .. })));
        assert!(matches!(require_int(&batch(), "note", "t"), Err(Error::Parse { .. })));
    }

    #[test]
    fn test_sort_by_index() {
        let sorted = sort_by_index(&batch()).expect("sort");
        let dates = sorted.column(0).as_primitive::<Date32Type>();
        assert_eq!(dates.values().to_vec(), vec![day(1), day(2), day(3)]);
        let notes = sorted.column_by_name("note").expect("column").as_string::<i32>();
        assert_eq!(notes.value(0), "a");
        assert_eq!(notes.value(2), "c");
    }
}
