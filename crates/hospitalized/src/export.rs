use crate::error::{Error, Result};
use arrow::record_batch::RecordBatch;
use arrow_csv::WriterBuilder;
use diagnostics::*;
use std::fs::File;
use std::path::Path;

/// Write `batch` as CSV with a header row, replacing any existing file.
/// Dates are written as ISO `YYYY-MM-DD`; undefined cells as empty fields.
pub fn write_csv(batch: &RecordBatch, path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| Error::io(path, e))?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(batch)?;

    info!(
        "Wrote {rows} rows to {path}",
        rows: batch.num_rows(),
        path: path.display().to_string(),
    );
    Ok(())
}
