use std::path::{Path, PathBuf};

use crate::domain::entities::merge::Row;
use crate::domain::errors::ErrorCode;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SheetIoError {
    #[error("file not found: {}", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("unsupported file format: {}", .path.display())]
    InvalidFormat { path: PathBuf },

    #[error("permission denied: {}", .path.display())]
    PermissionDenied { path: PathBuf },

    #[error("failed to read {}: {message}", .path.display())]
    Read { path: PathBuf, message: String },

    #[error("sheet '{sheet}' not found in {}", .path.display())]
    SheetNotFound { sheet: String, path: PathBuf },

    #[error("invalid header row: {0}")]
    InvalidHeaderRow(usize),

    #[error("sheet '{sheet}' has only {rows} rows, header row {header_row} requested")]
    HeaderRowOutOfRange {
        sheet: String,
        rows: usize,
        header_row: usize,
    },

    #[error("header row {header_row} of sheet '{sheet}' is empty")]
    EmptyHeader { sheet: String, header_row: usize },

    #[error("workbook has no sheets: {}", .path.display())]
    EmptyWorkbook { path: PathBuf },

    #[error("sheet '{sheet}' already exists in the output")]
    SheetAlreadyExists { sheet: String },

    #[error("failed to write sheet '{sheet}': {message}")]
    Write { sheet: String, message: String },

    #[error("failed to save {}: {message}", .path.display())]
    Save { path: PathBuf, message: String },
}

impl SheetIoError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SheetIoError::FileNotFound { .. } => ErrorCode::FileNotFound,
            SheetIoError::InvalidFormat { .. } => ErrorCode::InvalidFormat,
            SheetIoError::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            SheetIoError::Read { .. } => ErrorCode::FileReadError,
            SheetIoError::SheetNotFound { .. } => ErrorCode::SheetNotFound,
            SheetIoError::InvalidHeaderRow(_)
            | SheetIoError::HeaderRowOutOfRange { .. }
            | SheetIoError::EmptyHeader { .. } => ErrorCode::InvalidHeaderRow,
            SheetIoError::EmptyWorkbook { .. } => ErrorCode::EmptyFile,
            SheetIoError::SheetAlreadyExists { .. } | SheetIoError::Write { .. } => {
                ErrorCode::MergeError
            }
            SheetIoError::Save { .. } => ErrorCode::SaveError,
        }
    }
}

pub trait SourceOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn SpreadsheetSource>, SheetIoError>;
}

/// One opened workbook. Dropping the handle releases it.
pub trait SpreadsheetSource {
    fn path(&self) -> &Path;

    fn list_sheets(&self) -> Vec<String>;

    fn sheet_exists(&self, sheet: &str) -> bool {
        self.list_sheets().iter().any(|name| name == sheet)
    }

    fn read_all_rows(&mut self, sheet: &str) -> Result<Vec<Row>, SheetIoError>;

    /// Rows strictly after the 1-based `header_row`.
    fn read_data_rows(&mut self, sheet: &str, header_row: usize) -> Result<Vec<Row>, SheetIoError> {
        let rows = self.read_all_rows(sheet)?;
        Ok(rows.into_iter().skip(header_row).collect())
    }

    fn close(self: Box<Self>) {}
}

pub trait SpreadsheetSink {
    fn create_sheet(&mut self, name: &str) -> Result<(), SheetIoError>;

    /// `start_row` is 1-based.
    fn write_rows(
        &mut self,
        sheet: &str,
        start_row: usize,
        rows: &[Row],
    ) -> Result<(), SheetIoError>;

    fn save(&mut self, path: &Path) -> Result<(), SheetIoError>;
}
