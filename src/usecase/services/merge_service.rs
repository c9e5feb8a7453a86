use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::domain::entities::merge::{
    ExtractedKeySet, MergeRequest, MergeResult, Row, SheetMergeConfig, SheetStat,
};
use crate::domain::errors::{ConfigError, ErrorCode};
use crate::domain::filter::{
    extract_keys, filter_by_column_value, filter_by_keys, find_key_column, remove_blank_rows,
};
use crate::domain::plan::{order_sheets, PlanError};
use crate::usecase::ports::progress::ProgressReporter;
use crate::usecase::ports::spreadsheet::{SheetIoError, SourceOpener, SpreadsheetSink};

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("base file is not specified")]
    MissingBaseFile,

    #[error("no sheets are enabled for merging")]
    NoEnabledSheets,

    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error("sheet '{sheet}': base file {}: {source}", .path.display())]
    BaseFile {
        sheet: String,
        path: PathBuf,
        #[source]
        source: SheetIoError,
    },

    #[error("sheet '{sheet}': writing the output failed: {source}")]
    Sink {
        sheet: String,
        #[source]
        source: SheetIoError,
    },

    #[error("merge worker failed: {0}")]
    Worker(String),
}

impl MergeError {
    pub fn code(&self) -> ErrorCode {
        match self {
            MergeError::MissingBaseFile | MergeError::NoEnabledSheets | MergeError::Plan(_) => {
                ErrorCode::ConfigError
            }
            MergeError::InvalidConfig(err) => err.code(),
            MergeError::BaseFile { source, .. } => source.code(),
            MergeError::Sink { .. } | MergeError::Worker(_) => ErrorCode::MergeError,
        }
    }
}

pub struct MergeOrchestrator {
    opener: Arc<dyn SourceOpener>,
    progress: ProgressReporter,
}

#[derive(Default)]
struct SheetOutcome {
    rows_merged: usize,
    files_read: usize,
    warnings: Vec<String>,
    extracted: ExtractedKeySet,
}

struct ProgressCursor {
    current: usize,
    total: usize,
}

impl ProgressCursor {
    fn advance(&mut self, reporter: &ProgressReporter, message: String) {
        self.current += 1;
        reporter.notify(self.current, self.total, message);
    }
}

struct FilterContext<'a> {
    config: &'a SheetMergeConfig,
    header: &'a [String],
    marker: &'a str,
    keys: &'a ExtractedKeySet,
}

impl MergeOrchestrator {
    pub fn new(opener: Arc<dyn SourceOpener>) -> Self {
        Self {
            opener,
            progress: ProgressReporter::new(),
        }
    }

    pub fn progress(&self) -> &ProgressReporter {
        &self.progress
    }

    pub fn merge(
        &self,
        request: &MergeRequest,
        sink: &mut dyn SpreadsheetSink,
    ) -> Result<MergeResult, MergeError> {
        let started = Instant::now();

        if request.base_file.as_os_str().is_empty() {
            return Err(MergeError::MissingBaseFile);
        }
        if request.enabled_count() == 0 {
            return Err(MergeError::NoEnabledSheets);
        }
        for (key, config) in request.sheet_configs.iter().filter(|(_, c)| c.enabled) {
            config.validate()?;
            if *key != config.sheet_name {
                return Err(ConfigError::SheetNameMismatch {
                    key: key.clone(),
                    sheet: config.sheet_name.clone(),
                }
                .into());
            }
        }
        let plan = order_sheets(&request.sheet_configs)?;

        info!(
            base_file = %request.base_file.display(),
            additional_files_count = request.additional_files.len(),
            sheets_count = plan.len(),
            "starting merge"
        );

        let files = request.all_files();
        let mut result = MergeResult {
            processed_files: files.len(),
            ..MergeResult::default()
        };
        let mut keys = ExtractedKeySet::new();
        let mut cursor = ProgressCursor {
            current: 0,
            total: request.total_operations(),
        };

        for config in plan {
            let sheet = config.sheet_name.clone();
            info!(sheet = %sheet, "merging sheet");

            let outcome =
                self.merge_sheet(config, &files, &request.key_marker, &keys, &mut cursor, sink)?;

            if config.extract_keys {
                keys.extend(outcome.extracted);
                info!(sheet = %sheet, total_keys = keys.len(), "key extraction finished");
            }

            result.total_rows += outcome.rows_merged;
            result.warnings.extend(outcome.warnings);
            result.processed_sheets += 1;
            result.sheet_stats.insert(
                sheet,
                SheetStat {
                    rows_merged: outcome.rows_merged,
                    files_count: outcome.files_read,
                },
            );
        }

        result.duration = started.elapsed();

        info!(
            processed_files = result.processed_files,
            processed_sheets = result.processed_sheets,
            total_rows = result.total_rows,
            warnings_count = result.warnings.len(),
            duration_ms = result.duration.as_millis() as u64,
            "merge finished"
        );

        Ok(result)
    }

    fn merge_sheet(
        &self,
        config: &SheetMergeConfig,
        files: &[PathBuf],
        marker: &str,
        keys: &ExtractedKeySet,
        cursor: &mut ProgressCursor,
        sink: &mut dyn SpreadsheetSink,
    ) -> Result<SheetOutcome, MergeError> {
        let sheet = config.sheet_name.as_str();
        let sink_err = |source: SheetIoError| MergeError::Sink {
            sheet: sheet.to_string(),
            source,
        };

        sink.create_sheet(sheet).map_err(sink_err)?;

        let base_path = &files[0];
        let base_rows = self.read_base_rows(sheet, base_path)?;

        let header_block = &base_rows[..config.header_row.min(base_rows.len())];
        if header_block.len() < config.header_row {
            warn!(
                sheet,
                rows = base_rows.len(),
                header_row = config.header_row,
                "base sheet is shorter than its header row"
            );
        }
        if !header_block.is_empty() {
            sink.write_rows(sheet, 1, header_block).map_err(sink_err)?;
        }

        let header: Vec<String> = base_rows
            .get(config.header_row - 1)
            .cloned()
            .unwrap_or_default();
        if config.use_extracted_keys {
            if keys.is_empty() {
                warn!(sheet, "no extracted keys available, every row will be filtered out");
            } else if find_key_column(&header, marker).is_none() {
                warn!(sheet, marker, "key column not found, every row will be filtered out");
            }
        }

        let filters = FilterContext {
            config,
            header: &header,
            marker,
            keys,
        };
        let mut outcome = SheetOutcome::default();
        let mut base_data: Option<Vec<Row>> =
            Some(base_rows.into_iter().skip(config.header_row).collect());
        let mut next_row = config.header_row + 1;

        for (idx, path) in files.iter().enumerate() {
            let name = display_name(path);
            cursor.advance(
                &self.progress,
                format!("processing {name}, sheet {sheet} ({}/{})", idx + 1, files.len()),
            );

            let data_rows = match base_data.take() {
                Some(rows) => rows,
                None => match self.read_data_rows(path, sheet, config.header_row) {
                    Ok(rows) => rows,
                    Err(warning) => {
                        warn!(file = %path.display(), sheet, "{warning}");
                        outcome.warnings.push(warning);
                        continue;
                    }
                },
            };
            outcome.files_read += 1;

            let rows = apply_filters(&filters, data_rows, &name, &mut outcome.extracted);

            if !rows.is_empty() {
                sink.write_rows(sheet, next_row, &rows).map_err(sink_err)?;
                next_row += rows.len();
                outcome.rows_merged += rows.len();
            }

            info!(file = %name, sheet, rows_added = rows.len(), "file merged");
        }

        Ok(outcome)
    }

    fn read_base_rows(&self, sheet: &str, path: &Path) -> Result<Vec<Row>, MergeError> {
        let base_err = |source: SheetIoError| MergeError::BaseFile {
            sheet: sheet.to_string(),
            path: path.to_path_buf(),
            source,
        };

        let mut source = self.opener.open(path).map_err(base_err)?;
        if !source.sheet_exists(sheet) {
            source.close();
            return Err(base_err(SheetIoError::SheetNotFound {
                sheet: sheet.to_string(),
                path: path.to_path_buf(),
            }));
        }
        let rows = source.read_all_rows(sheet);
        source.close();
        rows.map_err(base_err)
    }

    /// Errors come back as the warning text recorded for the skipped file.
    fn read_data_rows(
        &self,
        path: &Path,
        sheet: &str,
        header_row: usize,
    ) -> Result<Vec<Row>, String> {
        let name = display_name(path);

        let mut source = self
            .opener
            .open(path)
            .map_err(|err| format!("cannot open {name}: {err}"))?;
        if !source.sheet_exists(sheet) {
            source.close();
            return Err(format!("sheet '{sheet}' not found in file {name}"));
        }
        let rows = source.read_data_rows(sheet, header_row);
        source.close();
        rows.map_err(|err| format!("cannot read data from {name}: {err}"))
    }
}

fn apply_filters(
    ctx: &FilterContext<'_>,
    rows: Vec<Row>,
    file: &str,
    extracted: &mut ExtractedKeySet,
) -> Vec<Row> {
    let sheet = ctx.config.sheet_name.as_str();
    let mut rows = remove_blank_rows(rows);

    if ctx.config.has_value_filter() {
        let before = rows.len();
        rows = filter_by_column_value(rows, ctx.config.filter_column, &ctx.config.filter_values);
        info!(
            file,
            sheet,
            before_filter = before,
            after_filter = rows.len(),
            column_index = ?ctx.config.filter_column,
            kept_values = ?ctx.config.filter_values,
            "applied column value filter"
        );
    }

    if ctx.config.extract_keys && !rows.is_empty() {
        let added = extract_keys(ctx.header, &rows, ctx.marker, extracted);
        info!(
            file,
            sheet,
            keys_added = added,
            total_keys = extracted.len(),
            "extracted keys"
        );
    }

    if ctx.config.use_extracted_keys {
        let before = rows.len();
        rows = filter_by_keys(ctx.header, rows, ctx.keys, ctx.marker);
        debug!(
            file,
            sheet,
            before_filter = before,
            after_filter = rows.len(),
            keys_count = ctx.keys.len(),
            "applied extracted key filter"
        );
    }

    rows
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
