use rust_xlsxwriter::{Workbook, XlsxError};
use scrip_core::{Record, TABLE_HEADER};
use std::path::Path;
use thiserror::Error;

use crate::table::{read_table, StoreError};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No data available")]
    NoData,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to read table: {0}")]
    Table(#[from] StoreError),
    #[error("Failed to build workbook: {0}")]
    Xlsx(#[from] XlsxError),
}

/// Copy the table file byte-for-byte to `dest`. Returns bytes copied.
pub fn export_csv(table: &Path, dest: &Path) -> Result<u64, ExportError> {
    if read_table(table)?.is_empty() {
        return Err(ExportError::NoData);
    }
    Ok(std::fs::copy(table, dest)?)
}

/// Write every table row to a single-sheet workbook at `dest`. Returns rows written.
pub fn export_xlsx(table: &Path, dest: &Path) -> Result<usize, ExportError> {
    let records = read_table(table)?;
    if records.is_empty() {
        return Err(ExportError::NoData);
    }
    std::fs::write(dest, xlsx_bytes(&records)?)?;
    Ok(records.len())
}

/// Workbook with the table header in row 0 and one record per following row.
pub fn xlsx_bytes(records: &[Record]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, name) in TABLE_HEADER.iter().enumerate() {
        sheet.write_string(0, col as u16, *name)?;
    }
    for (idx, r) in records.iter().enumerate() {
        let row = (idx + 1) as u32;
        let doc_type = r.doc_type.to_string();
        let category = r.category.to_string();
        let cells = [
            doc_type.as_str(),
            r.date.as_str(),
            r.amount.as_str(),
            category.as_str(),
            r.file.as_str(),
        ];
        for (col, value) in cells.iter().enumerate() {
            sheet.write_string(row, col as u16, *value)?;
        }
    }

    Ok(workbook.save_to_buffer()?)
}
