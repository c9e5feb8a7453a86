use std::path::Path;

use rust_xlsxwriter::{Workbook, XlsxError};
use tracing::{debug, info};

use crate::domain::entities::merge::Row;
use crate::usecase::ports::spreadsheet::{SheetIoError, SpreadsheetSink};

/// Builds the merged workbook in memory and writes it on `save`.
pub struct XlsxSink {
    workbook: Workbook,
    sheets: Vec<String>,
}

impl Default for XlsxSink {
    fn default() -> Self {
        Self::new()
    }
}

impl XlsxSink {
    pub fn new() -> Self {
        Self {
            workbook: Workbook::new(),
            sheets: Vec::new(),
        }
    }

    pub fn sheet_names(&self) -> &[String] {
        &self.sheets
    }
}

fn write_error(sheet: &str, err: XlsxError) -> SheetIoError {
    SheetIoError::Write {
        sheet: sheet.to_string(),
        message: err.to_string(),
    }
}

impl SpreadsheetSink for XlsxSink {
    fn create_sheet(&mut self, name: &str) -> Result<(), SheetIoError> {
        if self.sheets.iter().any(|existing| existing == name) {
            return Err(SheetIoError::SheetAlreadyExists {
                sheet: name.to_string(),
            });
        }

        self.workbook
            .add_worksheet()
            .set_name(name)
            .map_err(|err| write_error(name, err))?;
        self.sheets.push(name.to_string());
        debug!(sheet = name, "created output sheet");
        Ok(())
    }

    fn write_rows(
        &mut self,
        sheet: &str,
        start_row: usize,
        rows: &[Row],
    ) -> Result<(), SheetIoError> {
        if start_row < 1 {
            return Err(SheetIoError::Write {
                sheet: sheet.to_string(),
                message: format!("invalid start row {start_row}"),
            });
        }

        let worksheet = self
            .workbook
            .worksheet_from_name(sheet)
            .map_err(|err| write_error(sheet, err))?;

        for (offset, row) in rows.iter().enumerate() {
            let row_idx = u32::try_from(start_row - 1 + offset).map_err(|_| SheetIoError::Write {
                sheet: sheet.to_string(),
                message: format!("row {} is out of range", start_row + offset),
            })?;
            for (col, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                let col_idx = u16::try_from(col).map_err(|_| SheetIoError::Write {
                    sheet: sheet.to_string(),
                    message: format!("column {} is out of range", col + 1),
                })?;
                worksheet
                    .write_string(row_idx, col_idx, value)
                    .map_err(|err| write_error(sheet, err))?;
            }
        }
        Ok(())
    }

    fn save(&mut self, path: &Path) -> Result<(), SheetIoError> {
        self.workbook.save(path).map_err(|err| SheetIoError::Save {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        info!(file = %path.display(), sheets_count = self.sheets.len(), "saved workbook");
        Ok(())
    }
}
