use std::fs::File;
use std::io::{BufReader, ErrorKind};
use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use tracing::debug;

use crate::domain::entities::merge::Row;
use crate::usecase::ports::spreadsheet::{SheetIoError, SourceOpener, SpreadsheetSource};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(v) => v.to_string(),
        Data::Float(v) => v.to_string(),
        Data::Int(v) => v.to_string(),
        Data::Bool(v) => v.to_string(),
        Data::DateTime(v) => v.to_string(),
        Data::DateTimeIso(v) => v.to_string(),
        Data::DurationIso(v) => v.to_string(),
        Data::Error(v) => format!("{v:?}"),
        Data::Empty => String::new(),
    }
}

pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            SUPPORTED_EXTENSIONS
                .iter()
                .any(|supported| ext.eq_ignore_ascii_case(supported))
        })
        .unwrap_or(false)
}

fn trim_trailing_empty(row: &mut Row) {
    while row.last().is_some_and(|cell| cell.is_empty()) {
        row.pop();
    }
}

fn open_error(path: &Path, err: calamine::Error) -> SheetIoError {
    match err {
        calamine::Error::Io(io) if io.kind() == ErrorKind::PermissionDenied => {
            SheetIoError::PermissionDenied {
                path: path.to_path_buf(),
            }
        }
        other => SheetIoError::Read {
            path: path.to_path_buf(),
            message: other.to_string(),
        },
    }
}

/// Opens workbooks from disk with calamine.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalamineOpener;

impl CalamineOpener {
    pub fn new() -> Self {
        Self
    }

    pub fn open_workbook(&self, path: &Path) -> Result<CalamineSource, SheetIoError> {
        if !path.is_file() {
            return Err(SheetIoError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        if !is_supported(path) {
            return Err(SheetIoError::InvalidFormat {
                path: path.to_path_buf(),
            });
        }

        let workbook = open_workbook_auto(path).map_err(|err| open_error(path, err))?;
        let sheet_names = workbook.sheet_names();
        debug!(file = %path.display(), sheets_count = sheet_names.len(), "opened workbook");

        Ok(CalamineSource {
            path: path.to_path_buf(),
            workbook,
            sheet_names,
        })
    }
}

impl SourceOpener for CalamineOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn SpreadsheetSource>, SheetIoError> {
        Ok(Box::new(self.open_workbook(path)?))
    }
}

pub struct CalamineSource {
    path: PathBuf,
    workbook: Sheets<BufReader<File>>,
    sheet_names: Vec<String>,
}

impl SpreadsheetSource for CalamineSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn list_sheets(&self) -> Vec<String> {
        self.sheet_names.clone()
    }

    /// Rows as displayed in the sheet: leading empty rows and columns are
    /// kept, trailing empty cells are dropped.
    fn read_all_rows(&mut self, sheet: &str) -> Result<Vec<Row>, SheetIoError> {
        if !self.sheet_exists(sheet) {
            return Err(SheetIoError::SheetNotFound {
                sheet: sheet.to_string(),
                path: self.path.clone(),
            });
        }

        let range = self
            .workbook
            .worksheet_range(sheet)
            .map_err(|err| SheetIoError::Read {
                path: self.path.clone(),
                message: format!("sheet '{sheet}': {err}"),
            })?;

        let (first_row, first_col) = range
            .start()
            .map(|(row, col)| (row as usize, col as usize))
            .unwrap_or((0, 0));

        let mut rows: Vec<Row> = vec![Vec::new(); first_row];
        for cells in range.rows() {
            let mut row: Row = vec![String::new(); first_col];
            row.extend(cells.iter().map(cell_to_string));
            trim_trailing_empty(&mut row);
            rows.push(row);
        }

        debug!(file = %self.path.display(), sheet, rows = rows.len(), "read sheet");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn supported_extensions_ignore_case() {
        assert!(is_supported(Path::new("a.xlsx")));
        assert!(is_supported(Path::new("dir/B.XLSM")));
        assert!(is_supported(Path::new("c.ods")));
        assert!(!is_supported(Path::new("d.csv")));
        assert!(!is_supported(Path::new("noext")));
    }

    #[test]
    fn trailing_empty_cells_are_trimmed() {
        let mut row = vec![String::new(), "a".to_string(), String::new(), String::new()];

        trim_trailing_empty(&mut row);

        assert_eq!(row, vec![String::new(), "a".to_string()]);
    }

    #[test]
    fn cells_render_as_text() {
        assert_eq!(cell_to_string(&Data::Float(3.0)), "3");
        assert_eq!(cell_to_string(&Data::Float(2.5)), "2.5");
        assert_eq!(cell_to_string(&Data::Int(7)), "7");
        assert_eq!(cell_to_string(&Data::Bool(true)), "true");
        assert_eq!(cell_to_string(&Data::String("x".to_string())), "x");
        assert_eq!(cell_to_string(&Data::Empty), "");
    }

    #[test]
    fn missing_files_are_reported_before_format() {
        let err = CalamineOpener::new()
            .open_workbook(Path::new("/definitely/missing/file.txt"))
            .err()
            .expect("should fail");

        assert!(matches!(err, SheetIoError::FileNotFound { .. }));
    }
}
