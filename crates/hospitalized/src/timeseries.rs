//! Date-indexed tables joined and extended with SQL.
//!
//! A [`TimeSeries`] owns a DataFusion session. Each operation registers a new
//! view over the previous one, so the table is only materialized by
//! [`TimeSeries::collect`], which returns the rows ordered by date.

use crate::error::{Error, Result};
use crate::table::DATE_COLUMN;
use arrow::compute::concat_batches;
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::*;
use diagnostics::*;
use std::sync::Arc;

/// Double-quote an identifier so mixed-case names survive SQL parsing.
pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Full outer join of two date-indexed tables on `date`, keeping every date
/// present on either side.
pub fn join_sql(left: &str, left_columns: &[String], right: &str, right_columns: &[String]) -> String {
    let date = quote(DATE_COLUMN);
    let mut select = vec![format!("COALESCE(l.{date}, r.{date}) AS {date}")];
    select.extend(left_columns.iter().map(|c| format!("l.{}", quote(c))));
    select.extend(right_columns.iter().map(|c| format!("r.{}", quote(c))));
    format!(
        "SELECT {} FROM {left} l FULL OUTER JOIN {right} r ON l.{date} = r.{date}",
        select.join(", ")
    )
}

/// Replace undefined values in `fill` with 0 and cast them to integers.
pub fn fill_int_sql(table: &str, columns: &[String], fill: &[&str]) -> String {
    let mut select = vec![quote(DATE_COLUMN)];
    select.extend(columns.iter().map(|c| {
        if fill.contains(&c.as_str()) {
            format!("CAST(COALESCE({q}, 0) AS BIGINT) AS {q}", q = quote(c))
        } else {
            quote(c)
        }
    }));
    format!("SELECT {} FROM {table}", select.join(", "))
}

fn select_sql(table: &str, columns: &[String], extra: Option<(&str, &str)>) -> String {
    let mut select = vec![quote(DATE_COLUMN)];
    select.extend(columns.iter().map(|c| quote(c)));
    if let Some((name, expr)) = extra {
        select.push(format!("{expr} AS {}", quote(name)));
    }
    format!("SELECT {} FROM {table}", select.join(", "))
}

pub struct TimeSeries {
    ctx: SessionContext,
    name: String,
    current: String,
    columns: Vec<String>,
    steps: usize,
}

impl TimeSeries {
    /// Start from a table whose first column is `date`.
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Result<Self> {
        let mut series = Self {
            ctx: SessionContext::new(),
            name: name.into(),
            current: String::new(),
            columns: Vec::new(),
            steps: 0,
        };
        series.columns = value_columns(&batch, &series.name)?;
        series.current = series.register_batch(batch)?;
        Ok(series)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value columns in order, without the date.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn require(&self, column: &str) -> Result<()> {
        if self.columns.iter().any(|c| c == column) {
            Ok(())
        } else {
            Err(Error::MissingColumn {
                column: column.to_string(),
                table: self.name.clone(),
            })
        }
    }

    fn next_name(&mut self, prefix: &str) -> String {
        self.steps += 1;
        format!("{prefix}_{}", self.steps)
    }

    fn register_batch(&mut self, batch: RecordBatch) -> Result<String> {
        let name = self.next_name("source");
        let table = MemTable::try_new(batch.schema(), vec![vec![batch]])?;
        let _ = self.ctx.register_table(name.as_str(), Arc::new(table))?;
        Ok(name)
    }

    async fn step(&mut self, sql: String, columns: Vec<String>) -> Result<()> {
        debug!("{table}: {sql}", table: self.name.clone(), sql: sql.clone());
        let df = self.ctx.sql(&sql).await?;
        let name = self.next_name("step");
        let _ = self.ctx.register_table(name.as_str(), df.into_view())?;
        self.current = name;
        self.columns = columns;
        Ok(())
    }

    /// Join another date-indexed table; its columns follow the existing ones.
    pub async fn outer_join(&mut self, batch: RecordBatch) -> Result<()> {
        let right_columns = value_columns(&batch, &self.name)?;
        if let Some(dup) = right_columns.iter().find(|c| self.columns.contains(c)) {
            return Err(Error::DuplicateColumn(dup.clone()));
        }
        let right = self.register_batch(batch)?;
        let sql = join_sql(&self.current, &self.columns, &right, &right_columns);
        let mut columns = self.columns.clone();
        columns.extend(right_columns);
        self.step(sql, columns).await
    }

    /// Fill undefined values with 0 in each named column, as integers.
    pub async fn fill_int(&mut self, fill: &[&str]) -> Result<()> {
        for column in fill {
            self.require(column)?;
        }
        let sql = fill_int_sql(&self.current, &self.columns, fill);
        let columns = self.columns.clone();
        self.step(sql, columns).await
    }

    /// Append `name` computed by the SQL expression `expr`.
    pub async fn add_column(&mut self, name: &str, expr: &str) -> Result<()> {
        if self.columns.iter().any(|c| c == name) || name == DATE_COLUMN {
            return Err(Error::DuplicateColumn(name.to_string()));
        }
        let sql = select_sql(&self.current, &self.columns, Some((name, expr)));
        let mut columns = self.columns.clone();
        columns.push(name.to_string());
        self.step(sql, columns).await
    }

    /// Materialize the table, ordered by date.
    pub async fn collect(&self) -> Result<RecordBatch> {
        let sql = format!(
            "{} ORDER BY {}",
            select_sql(&self.current, &self.columns, None),
            quote(DATE_COLUMN)
        );
        let df = self.ctx.sql(&sql).await?;
        let empty_schema = df.schema().inner().clone();
        let batches = df.collect().await?;
        let schema = batches
            .first()
            .map(|b| b.schema())
            .unwrap_or(empty_schema);
        Ok(concat_batches(&schema, &batches)?)
    }
}

fn value_columns(batch: &RecordBatch, table: &str) -> Result<Vec<String>> {
    let schema = batch.schema();
    match schema.fields().first() {
        Some(field) if field.name() == DATE_COLUMN => {}
        _ => {
            return Err(Error::MissingColumn {
                column: DATE_COLUMN.to_string(),
                table: table.to_string(),
            });
        }
    }
    Ok(schema.fields().iter().skip(1).map(|f| f.name().clone()).collect())
}
