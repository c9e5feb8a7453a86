use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::entities::merge::{Row, SheetMergeConfig};
use crate::domain::filter::find_key_column;
use crate::domain::presets::Preset;
use crate::usecase::ports::spreadsheet::{SheetIoError, SourceOpener, SpreadsheetSource};

/// Inspects a base workbook so sheet configs can be prepared before a merge.
pub struct BaseAnalyzer {
    opener: Arc<dyn SourceOpener>,
}

impl BaseAnalyzer {
    pub fn new(opener: Arc<dyn SourceOpener>) -> Self {
        Self { opener }
    }

    pub fn sheet_names(&self, path: &Path) -> Result<Vec<String>, SheetIoError> {
        let source = self.opener.open(path)?;
        let sheets = source.list_sheets();
        source.close();

        if sheets.is_empty() {
            return Err(SheetIoError::EmptyWorkbook {
                path: path.to_path_buf(),
            });
        }
        debug!(file = %path.display(), sheets_count = sheets.len(), "listed sheets");
        Ok(sheets)
    }

    /// Non-empty cells of the 1-based `header_row`.
    pub fn headers(
        &self,
        path: &Path,
        sheet: &str,
        header_row: usize,
    ) -> Result<Vec<String>, SheetIoError> {
        let header = self.header_row(path, sheet, header_row)?;
        let titles: Vec<String> = header
            .into_iter()
            .filter(|cell| !cell.trim().is_empty())
            .collect();

        if titles.is_empty() {
            return Err(SheetIoError::EmptyHeader {
                sheet: sheet.to_string(),
                header_row,
            });
        }
        Ok(titles)
    }

    pub fn find_column(
        &self,
        path: &Path,
        sheet: &str,
        header_row: usize,
        marker: &str,
    ) -> Result<Option<usize>, SheetIoError> {
        let header = self.header_row(path, sheet, header_row)?;
        Ok(find_key_column(&header, marker))
    }

    /// Reads the first `rows` data rows below the header.
    pub fn preview(
        &self,
        path: &Path,
        sheet: &str,
        header_row: usize,
        rows: usize,
    ) -> Result<(Row, Vec<Row>), SheetIoError> {
        let all_rows = self.sheet_rows(path, sheet, header_row)?;
        let mut iter = all_rows.into_iter().skip(header_row - 1);
        let header = iter.next().unwrap_or_default();
        Ok((header, iter.take(rows).collect()))
    }

    pub fn default_sheet_configs(
        &self,
        path: &Path,
    ) -> Result<BTreeMap<String, SheetMergeConfig>, SheetIoError> {
        Ok(self
            .sheet_names(path)?
            .into_iter()
            .map(|name| {
                let config = SheetMergeConfig::disabled(name.clone());
                (name, config)
            })
            .collect())
    }

    /// Overlays `preset` on `configs`. Sheets the preset does not name are
    /// disabled; sheets it names but the workbook lacks are left out.
    pub fn apply_preset(
        &self,
        path: &Path,
        configs: &mut BTreeMap<String, SheetMergeConfig>,
        preset: &Preset,
    ) -> Result<(), SheetIoError> {
        let mut source = self.opener.open(path)?;

        for (name, config) in configs.iter_mut() {
            let Some(preset_sheet) = preset.sheets.get(name) else {
                config.enabled = false;
                continue;
            };

            *config = preset_sheet.config.clone();
            if let Some(marker) = &preset_sheet.filter_column_marker {
                config.filter_column =
                    locate_marker_column(source.as_mut(), name, config.header_row, marker);
                match config.filter_column {
                    Some(column) => info!(
                        sheet = %name,
                        column_index = column,
                        filter_values = ?config.filter_values,
                        "resolved filter column"
                    ),
                    None => warn!(
                        sheet = %name,
                        marker = %marker,
                        "filter column not found, value filter disabled"
                    ),
                }
            }
        }

        source.close();
        info!(preset = %preset.name, file = %path.display(), "applied preset");
        Ok(())
    }

    fn sheet_rows(
        &self,
        path: &Path,
        sheet: &str,
        header_row: usize,
    ) -> Result<Vec<Row>, SheetIoError> {
        if header_row < 1 {
            return Err(SheetIoError::InvalidHeaderRow(header_row));
        }

        let mut source = self.opener.open(path)?;
        if !source.sheet_exists(sheet) {
            source.close();
            return Err(SheetIoError::SheetNotFound {
                sheet: sheet.to_string(),
                path: path.to_path_buf(),
            });
        }
        let rows = source.read_all_rows(sheet);
        source.close();
        rows
    }

    fn header_row(&self, path: &Path, sheet: &str, header_row: usize) -> Result<Row, SheetIoError> {
        let rows = self.sheet_rows(path, sheet, header_row)?;
        let total = rows.len();
        rows.into_iter()
            .nth(header_row - 1)
            .ok_or_else(|| SheetIoError::HeaderRowOutOfRange {
                sheet: sheet.to_string(),
                rows: total,
                header_row,
            })
    }
}

/// Searches the header row first, then the decoration rows above it.
fn locate_marker_column(
    source: &mut dyn SpreadsheetSource,
    sheet: &str,
    header_row: usize,
    marker: &str,
) -> Option<usize> {
    let rows = match source.read_all_rows(sheet) {
        Ok(rows) => rows,
        Err(err) => {
            warn!(sheet, error = %err, "cannot read sheet while resolving filter column");
            return None;
        }
    };

    let top = header_row.min(rows.len());
    rows[..top]
        .iter()
        .rev()
        .find_map(|row| find_key_column(row, marker))
}
