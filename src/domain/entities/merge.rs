use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::errors::ConfigError;

pub type Row = Vec<String>;

pub const DEFAULT_KEY_MARKER: &str = "артикул";

/// Last row an xlsx worksheet can hold.
pub const MAX_HEADER_ROW: usize = 1_048_576;

fn default_header_row() -> usize {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetMergeConfig {
    pub sheet_name: String,
    #[serde(default)]
    pub enabled: bool,
    /// 1-based; rows above and including it are copied from the base file.
    #[serde(default = "default_header_row")]
    pub header_row: usize,
    /// 0-based column compared against `filter_values`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_column: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filter_values: Vec<String>,
    #[serde(default)]
    pub use_extracted_keys: bool,
    #[serde(default)]
    pub extract_keys: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl SheetMergeConfig {
    pub fn new(sheet_name: impl Into<String>, header_row: usize) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            enabled: true,
            header_row,
            filter_column: None,
            filter_values: Vec::new(),
            use_extracted_keys: false,
            extract_keys: false,
            depends_on: Vec::new(),
        }
    }

    /// A key-producing sheet whose extracted keys gate other sheets.
    pub fn template(sheet_name: impl Into<String>, header_row: usize) -> Self {
        Self {
            extract_keys: true,
            ..Self::new(sheet_name, header_row)
        }
    }

    pub fn disabled(sheet_name: impl Into<String>) -> Self {
        Self {
            enabled: false,
            ..Self::new(sheet_name, 1)
        }
    }

    pub fn with_filter(mut self, column: usize, values: Vec<String>) -> Self {
        self.filter_column = Some(column);
        self.filter_values = values;
        self
    }

    pub fn with_extracted_keys(mut self) -> Self {
        self.use_extracted_keys = true;
        self
    }

    pub fn depending_on(mut self, sheet_name: impl Into<String>) -> Self {
        self.depends_on.push(sheet_name.into());
        self
    }

    pub fn has_value_filter(&self) -> bool {
        self.filter_column.is_some() && !self.filter_values.is_empty()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sheet_name.is_empty() {
            return Err(ConfigError::EmptySheetName);
        }
        if self.header_row < 1 {
            return Err(ConfigError::InvalidHeaderRow {
                sheet: self.sheet_name.clone(),
                header_row: self.header_row,
            });
        }
        if self.header_row > MAX_HEADER_ROW {
            return Err(ConfigError::HeaderRowTooLarge {
                sheet: self.sheet_name.clone(),
                header_row: self.header_row,
                max: MAX_HEADER_ROW,
            });
        }
        if let Some(column) = self.filter_column {
            if self.filter_values.is_empty() {
                return Err(ConfigError::FilterWithoutValues {
                    sheet: self.sheet_name.clone(),
                    column,
                });
            }
        }
        if self.extract_keys && self.use_extracted_keys {
            return Err(ConfigError::KeysProducedAndConsumed {
                sheet: self.sheet_name.clone(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub base_file: PathBuf,
    pub additional_files: Vec<PathBuf>,
    pub sheet_configs: BTreeMap<String, SheetMergeConfig>,
    pub key_marker: String,
}

impl MergeRequest {
    pub fn new(base_file: impl Into<PathBuf>, additional_files: Vec<PathBuf>) -> Self {
        Self {
            base_file: base_file.into(),
            additional_files,
            sheet_configs: BTreeMap::new(),
            key_marker: DEFAULT_KEY_MARKER.to_string(),
        }
    }

    pub fn with_sheet(mut self, config: SheetMergeConfig) -> Self {
        self.sheet_configs.insert(config.sheet_name.clone(), config);
        self
    }

    pub fn with_sheets(mut self, configs: impl IntoIterator<Item = SheetMergeConfig>) -> Self {
        for config in configs {
            self.sheet_configs.insert(config.sheet_name.clone(), config);
        }
        self
    }

    pub fn with_key_marker(mut self, marker: impl Into<String>) -> Self {
        self.key_marker = marker.into();
        self
    }

    pub fn enabled_count(&self) -> usize {
        self.sheet_configs.values().filter(|c| c.enabled).count()
    }

    /// Base file first, then additional files in the given order.
    pub fn all_files(&self) -> Vec<PathBuf> {
        std::iter::once(self.base_file.clone())
            .chain(self.additional_files.iter().cloned())
            .collect()
    }

    pub fn total_operations(&self) -> usize {
        self.enabled_count() * (1 + self.additional_files.len())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SheetStat {
    pub rows_merged: usize,
    pub files_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub processed_files: usize,
    pub processed_sheets: usize,
    pub total_rows: usize,
    pub sheet_stats: BTreeMap<String, SheetStat>,
    pub warnings: Vec<String>,
    pub duration: Duration,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedKeySet {
    keys: BTreeSet<String>,
}

impl ExtractedKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn extend(&mut self, other: ExtractedKeySet) {
        self.keys.extend(other.keys);
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for ExtractedKeySet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub current: usize,
    pub total: usize,
    pub message: String,
}
